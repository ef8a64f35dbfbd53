use cadence_core::ecs::{Entity, EntityBuilder, Query, Resource, RuntimeError, SystemResult};
use cadence_core::schedule::{
    AsyncStage, ManualPacer, RunState, RuntimeBuilder, Stage, SystemCtx, SystemId,
};
use cadence_core::settings::RuntimeSettings;
use cadence_core::spawn;
use futures::future::BoxFuture;

#[derive(Debug, Clone, PartialEq)]
struct TickEvent(&'static str);

#[derive(Debug)]
struct Ghost;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample(u64);

#[derive(Default)]
struct Observed {
    first_read: Vec<TickEvent>,
    second_read: usize,
    other_read: Vec<TickEvent>,
    log: Vec<&'static str>,
}
impl Resource for Observed {}

#[derive(Default)]
struct Collected(Vec<u64>);
impl Resource for Collected {}

struct Config {
    title: String,
}
impl Resource for Config {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(i32);

struct Enemy;

fn emit(ctx: &mut SystemCtx<'_>) -> SystemResult {
    ctx.push(TickEvent("tick-event"))?;
    ctx.global_mut::<Observed>()?.log.push("emit");
    Ok(())
}

fn read_twice(ctx: &mut SystemCtx<'_>) -> SystemResult {
    let first: Vec<TickEvent> = ctx.read::<TickEvent>()?.cloned().collect();
    let second = ctx.read::<TickEvent>()?.count();
    let observed = ctx.global_mut::<Observed>()?;
    observed.first_read = first;
    observed.second_read = second;
    observed.log.push("read");
    Ok(())
}

fn read_elsewhere(ctx: &mut SystemCtx<'_>) -> SystemResult {
    let seen: Vec<TickEvent> = ctx.read::<TickEvent>()?.cloned().collect();
    ctx.global_mut::<Observed>()?.other_read = seen;
    Ok(())
}

/// Pushes the current cycle. Drains its own backlog first so that it never
/// holds the buffer back.
fn stamp(ctx: &mut SystemCtx<'_>) -> SystemResult {
    ctx.read::<Sample>()?.for_each(drop);
    let cycle = ctx.cycle();
    ctx.push(Sample(cycle))?;
    Ok(())
}

fn load<'a>(ctx: &'a mut SystemCtx<'_>) -> BoxFuture<'a, SystemResult> {
    Box::pin(async move {
        tokio::task::yield_now().await;
        ctx.global_mut::<Observed>()?.log.push("load");
        SystemResult::Ok(())
    })
}

fn flush<'a>(ctx: &'a mut SystemCtx<'_>) -> BoxFuture<'a, SystemResult> {
    Box::pin(async move {
        tokio::task::yield_now().await;
        ctx.global_mut::<Observed>()?.log.push("flush");
        SystemResult::Ok(())
    })
}

#[tokio::test]
async fn startup_event_is_read_exactly_once() {
    let mut runtime = RuntimeBuilder::new()
        .use_event::<TickEvent>()
        .use_global_default::<Observed>()
        .use_startup_async(load)
        .use_startup(emit)
        .use_startup(read_twice)
        .use_startup(read_elsewhere)
        .add_async_system(AsyncStage::Shutdown, flush)
        .build_with_pacer(ManualPacer::default())
        .unwrap();

    runtime.start().await.unwrap();
    {
        let observed = runtime.globals().get::<Observed>().unwrap();
        assert_eq!(observed.first_read, vec![TickEvent("tick-event")]);
        assert_eq!(observed.second_read, 0);
        assert_eq!(observed.other_read, vec![TickEvent("tick-event")]);
        assert_eq!(observed.log, vec!["load", "emit", "read"]);
    }

    runtime.stop().await.unwrap();
    assert_eq!(
        runtime.globals().get::<Observed>().unwrap().log.last(),
        Some(&"flush")
    );
}

#[tokio::test]
async fn unregistered_events_are_rejected() {
    let mut runtime = RuntimeBuilder::new()
        .use_event::<TickEvent>()
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();

    let err = runtime.external().push(Ghost).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownEvent { .. }));
    assert!(err.to_string().starts_with("Unknown EventType: ["));
    assert_eq!(runtime.events().len(), 1);
    assert_eq!(runtime.events().total_pushed::<TickEvent>().unwrap(), 0);
}

#[tokio::test]
async fn failing_startup_system_propagates() {
    fn push_ghost(ctx: &mut SystemCtx<'_>) -> SystemResult {
        ctx.push(Ghost)?;
        Ok(())
    }

    let mut runtime = RuntimeBuilder::new()
        .use_startup(push_ghost)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    assert!(matches!(
        runtime.start().await,
        Err(RuntimeError::UnknownEvent { .. })
    ));
    assert_eq!(runtime.state(), RunState::Built);
}

#[tokio::test]
async fn empty_runtime_starts_and_stops() {
    let mut runtime = RuntimeBuilder::new()
        .use_global(|| Config {
            title: "empty".into(),
        })
        .build_with_pacer(ManualPacer::default())
        .unwrap();

    assert!(matches!(
        runtime.globals().get::<Config>(),
        Err(RuntimeError::GlobalNotInitialized { .. })
    ));
    runtime.start().await.unwrap();
    runtime.stop().await.unwrap();

    assert_eq!(runtime.state(), RunState::Stopped);
    assert_eq!(runtime.globals().get::<Config>().unwrap().title, "empty");
    assert!(runtime.world().is_empty());
}

#[tokio::test]
async fn pause_twice_is_pause_once() {
    fn count(ctx: &mut SystemCtx<'_>) -> SystemResult {
        let cycle = ctx.cycle();
        ctx.global_mut::<Collected>()?.0.push(cycle);
        Ok(())
    }

    let mut runtime = RuntimeBuilder::new()
        .use_global_default::<Collected>()
        .use_update(count)
        .build_with_pacer(ManualPacer::new(5.0))
        .unwrap();
    runtime.start().await.unwrap();
    assert!(runtime.tick().await.unwrap());

    runtime.pause();
    runtime.pause();
    assert_eq!(runtime.state(), RunState::Paused);
    assert!(!runtime.tick().await.unwrap());

    runtime.resume();
    runtime.resume();
    assert!(runtime.tick().await.unwrap());
    assert_eq!(runtime.globals().get::<Collected>().unwrap().0, vec![1, 2]);
    assert_eq!(runtime.clock().elapsed(), 10.0);
    assert_eq!(runtime.clock().delta(), 5.0);
}

#[tokio::test]
async fn trimming_never_loses_unread_events() {
    fn every_third(ctx: &mut SystemCtx<'_>) -> SystemResult {
        if ctx.cycle() % 3 != 0 {
            return Ok(());
        }
        let seen: Vec<u64> = ctx.read::<Sample>()?.map(|sample| sample.0).collect();
        ctx.global_mut::<Collected>()?.0.extend(seen);
        Ok(())
    }

    let settings = RuntimeSettings {
        track_external_reader: false,
        ..RuntimeSettings::default()
    };
    let mut runtime = RuntimeBuilder::new()
        .use_event::<Sample>()
        .use_global_default::<Collected>()
        .use_update(every_third)
        .use_last(stamp)
        .with_settings(settings)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();

    for cycle in 1..=9 {
        assert!(runtime.tick().await.unwrap());
        if cycle < 3 {
            assert!(runtime.globals().get::<Collected>().unwrap().0.is_empty());
        }
        assert!(runtime.events().buffered::<Sample>().unwrap() <= 4);
    }
    assert_eq!(
        runtime.globals().get::<Collected>().unwrap().0,
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );
    assert_eq!(runtime.events().total_pushed::<Sample>().unwrap(), 9);
}

#[tokio::test]
async fn startup_events_reach_frame_and_shutdown_readers() {
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Spawned(u32);

    #[derive(Default)]
    struct Seen {
        update: Vec<u32>,
        shutdown: Vec<u32>,
    }
    impl Resource for Seen {}

    fn announce(ctx: &mut SystemCtx<'_>) -> SystemResult {
        ctx.push(Spawned(7))?;
        Ok(())
    }

    fn on_update(ctx: &mut SystemCtx<'_>) -> SystemResult {
        let seen: Vec<u32> = ctx.read::<Spawned>()?.map(|event| event.0).collect();
        ctx.global_mut::<Seen>()?.update.extend(seen);
        let cycle = ctx.cycle() as u32;
        ctx.push(Spawned(100 + cycle))?;
        Ok(())
    }

    fn on_shutdown(ctx: &mut SystemCtx<'_>) -> SystemResult {
        let seen: Vec<u32> = ctx.read::<Spawned>()?.map(|event| event.0).collect();
        ctx.global_mut::<Seen>()?.shutdown = seen;
        Ok(())
    }

    let settings = RuntimeSettings {
        track_external_reader: false,
        ..RuntimeSettings::default()
    };
    let mut runtime = RuntimeBuilder::new()
        .use_event::<Spawned>()
        .use_global_default::<Seen>()
        .use_startup(announce)
        .use_update(on_update)
        .use_shutdown(on_shutdown)
        .with_settings(settings)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();
    assert_eq!(runtime.events().buffered::<Spawned>().unwrap(), 1);

    for _ in 0..3 {
        assert!(runtime.tick().await.unwrap());
    }
    assert_eq!(runtime.globals().get::<Seen>().unwrap().update, vec![7, 101, 102]);
    assert_eq!(runtime.events().buffered::<Spawned>().unwrap(), 4);

    runtime.stop().await.unwrap();
    assert_eq!(
        runtime.globals().get::<Seen>().unwrap().shutdown,
        vec![7, 101, 102, 103]
    );
}

#[tokio::test]
async fn host_reads_between_frames_lose_nothing_by_default() {
    let mut runtime = RuntimeBuilder::new()
        .use_event::<Sample>()
        .use_update(stamp)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    assert!(runtime.settings().track_external_reader);
    runtime.start().await.unwrap();

    for _ in 0..3 {
        runtime.tick().await.unwrap();
    }
    let seen: Vec<Sample> = runtime
        .external()
        .read::<Sample>()
        .unwrap()
        .copied()
        .collect();
    assert_eq!(seen, vec![Sample(1), Sample(2), Sample(3)]);
    assert!(runtime.external().no_unread::<Sample>().unwrap());

    runtime.tick().await.unwrap();
    assert_eq!(runtime.events().buffered::<Sample>().unwrap(), 2);
}

#[tokio::test]
async fn untracked_host_reader_does_not_pin_buffers() {
    let settings = RuntimeSettings {
        track_external_reader: false,
        ..RuntimeSettings::default()
    };
    let mut runtime = RuntimeBuilder::new()
        .use_event::<Sample>()
        .use_update(stamp)
        .with_settings(settings)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();

    for _ in 0..3 {
        runtime.tick().await.unwrap();
        assert!(runtime.events().buffered::<Sample>().unwrap() <= 2);
    }
    let seen: Vec<Sample> = runtime
        .external()
        .read::<Sample>()
        .unwrap()
        .copied()
        .collect();
    assert_eq!(seen, vec![Sample(2), Sample(3)]);
}

#[tokio::test]
async fn structurally_equal_queries_share_results() {
    fn setup(ctx: &mut SystemCtx<'_>) -> SystemResult {
        spawn!(ctx, Health(10), Enemy)?;
        spawn!(ctx, Health(5))?;
        Ok(())
    }

    let mut runtime = RuntimeBuilder::new()
        .use_component::<Health>()
        .use_component::<Enemy>()
        .use_startup(setup)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();

    let world = runtime.world_mut();
    let a = world
        .resolve(&Query::new().read::<Health>().with::<Enemy>())
        .unwrap();
    let b = world
        .resolve(&Query::new().with::<Enemy>().read::<Health>())
        .unwrap();
    assert_eq!(a, b);

    let results = world
        .query_by::<(Entity, &Health)>(&Query::new().with::<Enemy>())
        .unwrap();
    let (_, health) = results.single().unwrap();
    assert_eq!(health, &Health(10));
}

#[tokio::test]
async fn systems_mutate_the_world_through_their_context() {
    fn damage(ctx: &mut SystemCtx<'_>) -> SystemResult {
        ctx.each_mut::<Health>(&Query::new().with::<Enemy>(), |_, health| health.0 -= 3)?;
        let dead: Vec<Entity> = ctx
            .query::<(Entity, &Health)>()?
            .iter()
            .filter(|(_, health)| health.0 <= 0)
            .map(|(entity, _)| entity)
            .collect();
        for entity in dead {
            ctx.despawn(entity)?;
        }
        Ok(())
    }

    let mut runtime = RuntimeBuilder::new()
        .use_component::<Health>()
        .use_component::<Enemy>()
        .use_update(damage)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();

    let enemy = runtime
        .external()
        .spawn(EntityBuilder::new().with(Health(5)).with(Enemy))
        .unwrap();
    let friend = spawn!(runtime.external(), Health(5)).unwrap();

    runtime.tick().await.unwrap();
    assert_eq!(runtime.world().get::<Health>(enemy).unwrap(), Some(&Health(2)));
    runtime.tick().await.unwrap();
    assert!(!runtime.world().contains(enemy));
    assert!(runtime.world().contains(friend));
    assert!(matches!(
        runtime.external().despawn(enemy),
        Err(RuntimeError::InvalidEntity { .. })
    ));
}

#[tokio::test]
async fn deferred_toggles_apply_after_the_system_returns() {
    fn ping(ctx: &mut SystemCtx<'_>) -> SystemResult {
        let cycle = ctx.cycle();
        ctx.global_mut::<Collected>()?.0.push(cycle);
        Ok(())
    }

    fn mute_after_two(ctx: &mut SystemCtx<'_>) -> SystemResult {
        if ctx.cycle() == 2 {
            ctx.disable(SystemId::of_val(&ping));
        }
        if ctx.cycle() == 4 {
            ctx.request_stop();
        }
        Ok(())
    }

    let mut runtime = RuntimeBuilder::new()
        .use_global_default::<Collected>()
        .use_update(ping)
        .use_post_update(mute_after_two)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();
    runtime.run().await.unwrap();

    assert!(runtime.stop_requested());
    assert_eq!(runtime.clock().cycle(), 4);
    assert_eq!(runtime.globals().get::<Collected>().unwrap().0, vec![1, 2]);
    assert_eq!(
        runtime.is_enabled(Stage::Update, SystemId::of_val(&ping)),
        Some(false)
    );
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn locals_stay_with_their_system() {
    fn counter(ctx: &mut SystemCtx<'_>) -> SystemResult {
        let next = ctx.local::<u32>().copied().unwrap_or(0) + 1;
        ctx.set_local(next);
        if next == 3 {
            assert!(ctx.delete_local::<u32>());
            assert!(!ctx.delete_local::<u32>());
            ctx.pause();
        }
        Ok(())
    }

    fn observer(ctx: &mut SystemCtx<'_>) -> SystemResult {
        assert!(ctx.local::<u32>().is_none());
        Ok(())
    }

    let mut runtime = RuntimeBuilder::new()
        .use_update(counter)
        .use_last(observer)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();
    runtime.run().await.unwrap();
    assert_eq!(runtime.state(), RunState::Paused);
    assert_eq!(runtime.clock().cycle(), 3);
}

#[tokio::test]
async fn plugins_compose_and_requirements_are_checked() {
    #[derive(Debug, PartialEq)]
    struct Gravity(i32);
    impl Resource for Gravity {}

    fn fall(ctx: &mut SystemCtx<'_>) -> SystemResult {
        let gravity = ctx.global::<Gravity>()?.0;
        ctx.each_mut::<Health>(&Query::new(), |_, health| health.0 += gravity)?;
        Ok(())
    }

    let physics = RuntimeBuilder::new()
        .named("physics")
        .use_component::<Health>()
        .use_global(|| Gravity(-1))
        .use_update(fall);
    let game = RuntimeBuilder::new()
        .require("physics")
        .use_global(|| Gravity(-10));

    assert!(matches!(
        game.build_with_pacer(ManualPacer::default()),
        Err(RuntimeError::PluginsRequired { plugins }) if plugins == vec!["physics".to_string()]
    ));

    let mut runtime = game
        .use_plugin(&physics)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();
    assert_eq!(runtime.globals().get::<Gravity>().unwrap(), &Gravity(-1));

    let e = spawn!(runtime.external(), Health(0)).unwrap();
    runtime.tick().await.unwrap();
    assert_eq!(runtime.world().get::<Health>(e).unwrap(), Some(&Health(-1)));
}

#[tokio::test]
async fn detached_work_does_not_block_the_frame() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Flag(Arc<AtomicBool>);
    impl Resource for Flag {}

    fn fire_and_forget(ctx: &mut SystemCtx<'_>) -> SystemResult {
        let flag = ctx.global::<Flag>()?.0.clone();
        ctx.detach(async move {
            tokio::task::yield_now().await;
            flag.store(true, Ordering::SeqCst);
        });
        ctx.pause();
        Ok(())
    }

    let done = Arc::new(AtomicBool::new(false));
    let shared = done.clone();
    let mut runtime = RuntimeBuilder::new()
        .use_global(move || Flag(shared.clone()))
        .use_update(fire_and_forget)
        .build_with_pacer(ManualPacer::default())
        .unwrap();
    runtime.start().await.unwrap();
    runtime.run().await.unwrap();

    for _ in 0..100 {
        if done.load(Ordering::SeqCst) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(done.load(Ordering::SeqCst));
}
