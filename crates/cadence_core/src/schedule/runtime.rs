//! The runtime: owns the world, events and globals and drives the stages.

use crate::ecs::{
    ComponentMeta, ComponentRegistry, EventMeta, Events, GlobalDecl, Globals, RuntimeError,
    SystemResult, World,
};
use crate::schedule::context::{Requests, SystemState, Toggle};
use crate::schedule::system::SystemFn;
use crate::schedule::{FramePacer, FrameRequest, Stage, SystemCtx, SystemDescriptor, SystemId};
use crate::settings::RuntimeSettings;
use crate::time::FrameClock;
use std::time::Instant;
use tracing::Instrument;

/// Lifecycle position of a runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Built, startup stages not run yet.
    Built,
    Running,
    Paused,
    /// Shutdown has run (or was skipped because the runtime never started).
    Stopped,
}

struct SystemSlot {
    descriptor: SystemDescriptor,
    state: SystemState,
}

pub struct Runtime {
    name: Option<String>,
    world: World,
    events: Events,
    globals: Globals,
    stages: [Vec<SystemSlot>; Stage::COUNT],
    external: SystemState,
    clock: FrameClock,
    requests: Requests,
    pacer: Box<dyn FramePacer>,
    pending: Option<FrameRequest>,
    settings: RuntimeSettings,
    state: RunState,
    stop_requested: bool,
}

impl Runtime {
    pub(crate) fn new(
        name: Option<String>,
        components: Vec<ComponentMeta>,
        events: Vec<EventMeta>,
        globals: Vec<GlobalDecl>,
        stages: [Vec<SystemDescriptor>; Stage::COUNT],
        settings: RuntimeSettings,
        pacer: Box<dyn FramePacer>,
    ) -> Self {
        let mut registry = ComponentRegistry::new();
        for meta in components {
            registry.register_meta(meta);
        }
        let mut event_registry = Events::new();
        for meta in events {
            event_registry.register_meta(meta);
        }

        let event_types = event_registry.len();
        let stages = stages.map(|descriptors| {
            descriptors
                .into_iter()
                .map(|descriptor| SystemSlot {
                    state: SystemState::new(descriptor.id(), descriptor.stage(), event_types),
                    descriptor,
                })
                .collect::<Vec<_>>()
        });

        tracing::info!(
            name = name.as_deref().unwrap_or("<unnamed>"),
            components = registry.len(),
            events = event_types,
            globals = globals.len(),
            systems = stages.iter().map(Vec::len).sum::<usize>(),
            "runtime built"
        );

        Self {
            name,
            world: World::new(registry),
            events: event_registry,
            globals: Globals::new(globals),
            stages,
            external: SystemState::external(event_types),
            clock: FrameClock::new(),
            requests: Requests::default(),
            pacer,
            pending: None,
            settings,
            state: RunState::Built,
            stop_requested: false,
        }
    }

    /// Construct the globals, run the startup stages to completion and
    /// request the first frame.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        if self.state != RunState::Built {
            tracing::warn!(state = ?self.state, "start ignored");
            return Ok(());
        }

        tracing::info!("starting runtime");
        self.globals.initialize();
        for stage in Stage::STARTUP {
            self.run_awaited(stage).await?;
        }
        self.globals.first_cycle();

        self.state = RunState::Running;
        self.pending = Some(self.pacer.request_frame());
        self.apply_requests();
        tracing::info!("runtime started");
        Ok(())
    }

    /// Stop advancing frames. Calling it again, or on a runtime that is not
    /// running, does nothing.
    pub fn pause(&mut self) {
        if self.state != RunState::Running {
            return;
        }
        if let Some(request) = self.pending.take() {
            self.pacer.cancel_frame(request);
        }
        self.state = RunState::Paused;
        tracing::info!(cycle = self.clock.cycle(), "runtime paused");
    }

    pub fn resume(&mut self) {
        if self.state != RunState::Paused {
            return;
        }
        self.state = RunState::Running;
        if self.pending.is_none() && !self.stop_requested {
            self.pending = Some(self.pacer.request_frame());
        }
        tracing::info!(cycle = self.clock.cycle(), "runtime resumed");
    }

    /// Run the shutdown stage to completion and halt.
    ///
    /// A runtime that never started is marked stopped without running
    /// shutdown. Later frames and lifecycle calls are ignored.
    pub async fn stop(&mut self) -> Result<(), RuntimeError> {
        match self.state {
            RunState::Stopped => return Ok(()),
            RunState::Built => {
                self.state = RunState::Stopped;
                tracing::info!("runtime stopped before start; shutdown skipped");
                return Ok(());
            }
            RunState::Running | RunState::Paused => {}
        }

        if let Some(request) = self.pending.take() {
            self.pacer.cancel_frame(request);
        }
        self.state = RunState::Stopped;
        tracing::info!(cycle = self.clock.cycle(), "stopping runtime");
        self.run_awaited(Stage::Shutdown).await?;
        tracing::info!("runtime stopped");
        Ok(())
    }

    /// Run one frame stamped `time` (milliseconds). Ignored unless running.
    pub fn frame(&mut self, time: f64) -> Result<(), RuntimeError> {
        self.apply_requests();
        if !self.accepts_frames() {
            tracing::trace!(state = ?self.state, "frame ignored");
            return Ok(());
        }

        self.trim_events();
        self.clock.advance(time);

        let span = tracing::trace_span!("frame", cycle = self.clock.cycle());
        let _enter = span.enter();
        for stage in Stage::FRAME {
            for idx in 0..self.stages[stage.index()].len() {
                self.run_frame_system(stage, idx)?;
            }
        }
        Ok(())
    }

    /// Wait for the pacer and run the frame it fires.
    ///
    /// Returns `false` without waiting when no frame can be scheduled: the
    /// runtime is paused, stopped, not started, or a stop was requested.
    pub async fn tick(&mut self) -> Result<bool, RuntimeError> {
        if !self.accepts_frames() {
            return Ok(false);
        }
        if self.pending.is_none() {
            self.pending = Some(self.pacer.request_frame());
        }

        let Some((_, time)) = self.pacer.next_frame().await else {
            self.pending = None;
            return Ok(false);
        };
        self.pending = None;
        self.frame(time)?;

        if self.accepts_frames() && self.pending.is_none() {
            self.pending = Some(self.pacer.request_frame());
        }
        Ok(true)
    }

    /// Run frames until the runtime is paused or a stop is requested.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        while self.tick().await? {}
        tracing::debug!(cycle = self.clock.cycle(), state = ?self.state, "frame loop exited");
        Ok(())
    }

    /// Context for calls made from host code, outside any system.
    pub fn external(&mut self) -> SystemCtx<'_> {
        SystemCtx::new(
            &mut self.world,
            &mut self.events,
            &mut self.globals,
            &mut self.external,
            &self.clock,
            &mut self.requests,
        )
    }

    /// Enable every context of `system`. Returns false if it is not scheduled.
    pub fn enable(&mut self, system: SystemId) -> bool {
        self.set_enabled(system, Toggle::Enable)
    }

    pub fn disable(&mut self, system: SystemId) -> bool {
        self.set_enabled(system, Toggle::Disable)
    }

    pub fn toggle(&mut self, system: SystemId) -> bool {
        self.set_enabled(system, Toggle::Flip)
    }

    /// Whether `system` is enabled in `stage`; `None` when it is not there.
    pub fn is_enabled(&self, stage: Stage, system: SystemId) -> Option<bool> {
        self.stages[stage.index()]
            .iter()
            .find(|slot| slot.descriptor.id() == system)
            .map(|slot| slot.state.is_enabled())
    }

    pub fn systems(&self, stage: Stage) -> impl Iterator<Item = &SystemDescriptor> {
        self.stages[stage.index()].iter().map(|slot| &slot.descriptor)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    fn accepts_frames(&self) -> bool {
        self.state == RunState::Running && !self.stop_requested
    }

    /// Trim every event buffer up to the slowest reader that can still run
    /// and shift all cursors to match.
    ///
    /// Frame and shutdown contexts hold events back. Startup contexts have
    /// already run for the last time by the first frame, so they only get
    /// rebased.
    fn trim_events(&mut self) {
        let Self {
            events,
            stages,
            external,
            settings,
            ..
        } = self;

        let readers = Stage::FRAME
            .into_iter()
            .chain([Stage::Shutdown])
            .flat_map(|stage| stages[stage.index()].iter())
            .map(|slot| slot.state.cursors());
        let external_reader = settings
            .track_external_reader
            .then(|| external.cursors());
        let shifts = events.tick(readers.chain(external_reader));

        if shifts.iter().all(|&shift| shift == 0) {
            return;
        }
        for slot in stages.iter_mut().flatten() {
            slot.state.cursors_mut().rebase(&shifts);
        }
        external.cursors_mut().rebase(&shifts);
    }

    async fn run_awaited(&mut self, stage: Stage) -> Result<(), RuntimeError> {
        for idx in 0..self.stages[stage.index()].len() {
            let Self {
                world,
                events,
                globals,
                stages,
                clock,
                requests,
                settings,
                ..
            } = &mut *self;
            let SystemSlot { descriptor, state } = &mut stages[stage.index()][idx];
            if !state.is_enabled() {
                continue;
            }

            let name = descriptor.name();
            let span = tracing::debug_span!("system", system = name, %stage);
            let started = Instant::now();
            let result = {
                let mut ctx = SystemCtx::new(world, events, globals, state, clock, requests);
                match descriptor.run() {
                    SystemFn::Sync(system) => span.in_scope(|| (**system)(&mut ctx)),
                    SystemFn::Async(system) => (**system)(&mut ctx).instrument(span).await,
                }
            };
            report(name, stage, started, settings.slow_system_warn_ms, &result);

            self.apply_requests();
            result?;
        }
        Ok(())
    }

    fn run_frame_system(&mut self, stage: Stage, idx: usize) -> Result<(), RuntimeError> {
        let Self {
            world,
            events,
            globals,
            stages,
            clock,
            requests,
            settings,
            ..
        } = &mut *self;
        let SystemSlot { descriptor, state } = &mut stages[stage.index()][idx];
        if !state.is_enabled() {
            return Ok(());
        }
        let SystemFn::Sync(system) = descriptor.run() else {
            debug_assert!(false, "async system scheduled in a frame stage");
            return Ok(());
        };

        let name = descriptor.name();
        let span = tracing::trace_span!("system", system = name, %stage);
        let started = Instant::now();
        let result = {
            let mut ctx = SystemCtx::new(world, events, globals, state, clock, requests);
            span.in_scope(|| (**system)(&mut ctx))
        };
        report(name, stage, started, settings.slow_system_warn_ms, &result);

        self.apply_requests();
        result
    }

    /// Apply what systems asked for. Toggles take effect at once; pause and
    /// stop requests wait until the runtime is running.
    fn apply_requests(&mut self) {
        if self.requests.is_empty() {
            return;
        }
        for (system, toggle) in std::mem::take(&mut self.requests.toggles) {
            self.set_enabled(system, toggle);
        }
        if self.state != RunState::Running {
            return;
        }
        if std::mem::take(&mut self.requests.stop) {
            self.stop_requested = true;
            if let Some(request) = self.pending.take() {
                self.pacer.cancel_frame(request);
            }
            tracing::info!(cycle = self.clock.cycle(), "stop requested");
        }
        if std::mem::take(&mut self.requests.pause) {
            self.pause();
        }
    }

    fn set_enabled(&mut self, system: SystemId, toggle: Toggle) -> bool {
        let mut matched = false;
        for slot in self
            .stages
            .iter_mut()
            .flatten()
            .filter(|slot| slot.descriptor.id() == system)
        {
            let enabled = match toggle {
                Toggle::Enable => true,
                Toggle::Disable => false,
                Toggle::Flip => !slot.state.is_enabled(),
            };
            slot.state.set_enabled(enabled);
            matched = true;
        }
        tracing::debug!(%system, ?toggle, matched, "system toggled");
        matched
    }
}

fn report(name: &str, stage: Stage, started: Instant, warn_ms: Option<f64>, result: &SystemResult) {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if let Some(limit_ms) = warn_ms {
        if elapsed_ms > limit_ms {
            tracing::warn!(system = name, %stage, elapsed_ms, limit_ms, "slow system");
        }
    }
    if let Err(err) = result {
        tracing::error!(system = name, %stage, %err, "system failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ManualPacer, RuntimeBuilder};

    #[derive(Default)]
    struct Frames(u32);
    impl crate::ecs::Resource for Frames {}

    fn count(ctx: &mut SystemCtx<'_>) -> SystemResult {
        ctx.global_mut::<Frames>()?.0 += 1;
        Ok(())
    }

    fn pause_at_three(ctx: &mut SystemCtx<'_>) -> SystemResult {
        if ctx.global::<Frames>()?.0 == 3 {
            ctx.pause();
        }
        Ok(())
    }

    fn runtime() -> Runtime {
        RuntimeBuilder::new()
            .use_global_default::<Frames>()
            .use_update(count)
            .use_last(pause_at_three)
            .build_with_pacer(ManualPacer::new(10.0))
            .unwrap()
    }

    #[tokio::test]
    async fn run_stops_when_a_system_pauses() {
        let mut runtime = runtime();
        runtime.start().await.unwrap();
        runtime.run().await.unwrap();

        assert_eq!(runtime.state(), RunState::Paused);
        assert_eq!(runtime.globals().get::<Frames>().unwrap().0, 3);
        assert_eq!(runtime.clock().elapsed(), 30.0);

        runtime.resume();
        assert!(runtime.tick().await.unwrap());
        assert_eq!(runtime.globals().get::<Frames>().unwrap().0, 4);
        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn frames_are_ignored_outside_running() {
        let mut runtime = runtime();
        runtime.frame(0.0).unwrap();
        assert!(!runtime.tick().await.unwrap());

        runtime.start().await.unwrap();
        runtime.pause();
        runtime.pause();
        assert_eq!(runtime.state(), RunState::Paused);
        runtime.frame(5.0).unwrap();
        assert_eq!(runtime.globals().get::<Frames>().unwrap().0, 0);

        runtime.stop().await.unwrap();
        runtime.resume();
        runtime.frame(6.0).unwrap();
        assert_eq!(runtime.state(), RunState::Stopped);
        assert_eq!(runtime.clock().cycle(), 0);
    }

    #[tokio::test]
    async fn toggles_reach_every_context_of_a_system() {
        let mut runtime = RuntimeBuilder::new()
            .use_global_default::<Frames>()
            .use_update(count)
            .use_last(count)
            .build_with_pacer(ManualPacer::default())
            .unwrap();
        runtime.start().await.unwrap();

        let id = SystemId::of_val(&count);
        assert!(runtime.disable(id));
        assert_eq!(runtime.is_enabled(Stage::Update, id), Some(false));
        assert_eq!(runtime.is_enabled(Stage::Last, id), Some(false));
        runtime.frame(1.0).unwrap();
        assert_eq!(runtime.globals().get::<Frames>().unwrap().0, 0);

        assert!(runtime.toggle(id));
        runtime.frame(2.0).unwrap();
        assert_eq!(runtime.globals().get::<Frames>().unwrap().0, 2);

        assert!(!runtime.enable(SystemId::of_val(&pause_at_three)));
    }
}
