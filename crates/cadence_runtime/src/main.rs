//! Cadence demo runtime
//!
//! Boots a small simulation: a few drifting bodies, a counter global and a
//! frame budget after which the runtime asks to stop. Pass a JSON settings
//! file as the first argument to override the defaults.

use anyhow::{Context, Result};
use cadence_core::ecs::{Entity, EntityBuilder, Query, Resource, SystemResult};
use cadence_core::schedule::{IntervalPacer, RuntimeBuilder, SystemCtx};
use cadence_core::settings::RuntimeSettings;

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, Copy)]
struct Velocity {
    x: f64,
    y: f64,
}

#[derive(Debug)]
struct Landed(Entity);

struct FrameBudget {
    remaining: u64,
}

impl Resource for FrameBudget {
    fn first_cycle(&mut self) {
        tracing::info!(frames = self.remaining, "frame budget armed");
    }
}

fn spawn_bodies(ctx: &mut SystemCtx<'_>) -> SystemResult {
    for n in 0..4 {
        let speed = f64::from(n + 1);
        ctx.spawn(
            EntityBuilder::new()
                .with(Position { x: 0.0, y: 10.0 })
                .with(Velocity { x: speed, y: -speed }),
        )?;
    }
    Ok(())
}

fn integrate(ctx: &mut SystemCtx<'_>) -> SystemResult {
    let dt = ctx.delta() / 1000.0;
    let velocities: Vec<(Entity, Velocity)> = ctx
        .query::<(Entity, &Velocity)>()?
        .iter()
        .map(|(entity, velocity)| (entity, *velocity))
        .collect();
    for (entity, velocity) in velocities {
        if let Some(position) = ctx.get_mut::<Position>(entity)? {
            position.x += velocity.x * dt;
            position.y += velocity.y * dt;
        }
    }
    Ok(())
}

fn land(ctx: &mut SystemCtx<'_>) -> SystemResult {
    let grounded: Vec<Entity> = ctx
        .query_by::<(Entity, &Position)>(&Query::new().with::<Velocity>())?
        .iter()
        .filter(|(_, position)| position.y <= 0.0)
        .map(|(entity, _)| entity)
        .collect();
    for entity in grounded {
        ctx.remove::<Velocity>(entity)?;
        ctx.push(Landed(entity))?;
    }
    Ok(())
}

fn report(ctx: &mut SystemCtx<'_>) -> SystemResult {
    let landed: Vec<Entity> = ctx.read::<Landed>()?.map(|event| event.0).collect();
    for entity in landed {
        tracing::info!(%entity, cycle = ctx.cycle(), "body landed");
    }

    let budget = ctx.global_mut::<FrameBudget>()?;
    budget.remaining = budget.remaining.saturating_sub(1);
    if budget.remaining == 0 {
        ctx.request_stop();
    }
    Ok(())
}

fn summary(ctx: &mut SystemCtx<'_>) -> SystemResult {
    let moving = ctx.query::<&Velocity>()?.len();
    tracing::info!(
        entities = ctx.world().len(),
        moving,
        elapsed_ms = ctx.elapsed(),
        "shutting down"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Cadence v{}", cadence_core::VERSION);

    let settings = match std::env::args().nth(1) {
        Some(path) => RuntimeSettings::load(&path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => RuntimeSettings::default(),
    };
    let frames = u64::from(settings.frame_rate_hz) * 2;

    let physics = RuntimeBuilder::new()
        .named("physics")
        .use_component::<Position>()
        .use_component::<Velocity>()
        .use_update(integrate)
        .use_post_update(land);

    let app = RuntimeBuilder::new()
        .require("physics")
        .use_event::<Landed>()
        .use_global(move || FrameBudget { remaining: frames })
        .use_startup(spawn_bodies)
        .use_last(report)
        .use_shutdown(summary)
        .with_settings(settings.clone())
        .use_plugin(&physics);

    let mut runtime = app.build_with_pacer(IntervalPacer::from_settings(&settings))?;
    runtime.start().await?;
    runtime.run().await?;
    runtime.stop().await?;

    tracing::info!("Runtime exited cleanly");
    Ok(())
}
