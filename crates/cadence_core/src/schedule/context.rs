//! Per-system execution context.
//!
//! Every system invocation receives a [`SystemCtx`] that borrows the world,
//! the event buffers and the globals for the duration of the call, along with
//! the state owned by that one system: its event cursors and local
//! resources. Nothing is reachable once the call returns, so there is no
//! "current system" to go stale.

use crate::ecs::{
    Component, Entity, EntityBuilder, Event, EventCursors, Events, Globals, LocalResources, Query,
    QueryData, QueryResults, Resource, RuntimeError, World,
};
use crate::schedule::{Stage, SystemId};
use crate::time::FrameClock;
use std::future::Future;

/// State a system keeps between invocations.
#[derive(Default)]
pub struct SystemState {
    id: Option<SystemId>,
    stage: Option<Stage>,
    enabled: bool,
    cursors: EventCursors,
    locals: LocalResources,
}

impl SystemState {
    pub(crate) fn new(id: SystemId, stage: Stage, event_types: usize) -> Self {
        Self {
            id: Some(id),
            stage: Some(stage),
            enabled: true,
            cursors: EventCursors::new(event_types),
            locals: LocalResources::new(),
        }
    }

    /// State for calls made from outside any system.
    pub(crate) fn external(event_types: usize) -> Self {
        Self {
            id: None,
            stage: None,
            enabled: true,
            cursors: EventCursors::new(event_types),
            locals: LocalResources::new(),
        }
    }

    pub fn id(&self) -> Option<SystemId> {
        self.id
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn cursors(&self) -> &EventCursors {
        &self.cursors
    }

    pub(crate) fn cursors_mut(&mut self) -> &mut EventCursors {
        &mut self.cursors
    }

    pub fn locals(&self) -> &LocalResources {
        &self.locals
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Toggle {
    Enable,
    Disable,
    Flip,
}

/// Changes a system asked for; the runtime applies them once it returns.
#[derive(Debug, Default)]
pub(crate) struct Requests {
    pub(crate) toggles: Vec<(SystemId, Toggle)>,
    pub(crate) pause: bool,
    pub(crate) stop: bool,
}

impl Requests {
    pub(crate) fn is_empty(&self) -> bool {
        self.toggles.is_empty() && !self.pause && !self.stop
    }
}

/// Handle passed to every system invocation.
pub struct SystemCtx<'w> {
    world: &'w mut World,
    events: &'w mut Events,
    globals: &'w mut Globals,
    state: &'w mut SystemState,
    clock: &'w FrameClock,
    requests: &'w mut Requests,
}

impl<'w> SystemCtx<'w> {
    pub(crate) fn new(
        world: &'w mut World,
        events: &'w mut Events,
        globals: &'w mut Globals,
        state: &'w mut SystemState,
        clock: &'w FrameClock,
        requests: &'w mut Requests,
    ) -> Self {
        Self {
            world,
            events,
            globals,
            state,
            clock,
            requests,
        }
    }

    /// The running system; `None` for the external context.
    pub fn system(&self) -> Option<SystemId> {
        self.state.id
    }

    pub fn stage(&self) -> Option<Stage> {
        self.state.stage
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }

    // Entities

    pub fn spawn(&mut self, builder: EntityBuilder) -> Result<Entity, RuntimeError> {
        self.world.spawn(builder)
    }

    pub fn spawn_child(
        &mut self,
        parent: Entity,
        builder: EntityBuilder,
    ) -> Result<Entity, RuntimeError> {
        self.world.spawn_child(parent, builder)
    }

    pub fn despawn(&mut self, entity: Entity) -> Result<(), RuntimeError> {
        self.world.despawn(entity)
    }

    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), RuntimeError> {
        self.world.insert(entity, value)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<Option<T>, RuntimeError> {
        self.world.remove::<T>(entity)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Result<Option<&T>, RuntimeError> {
        self.world.get::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<Option<&mut T>, RuntimeError> {
        self.world.get_mut::<T>(entity)
    }

    pub fn query<D: QueryData>(&mut self) -> Result<QueryResults<'_, D>, RuntimeError> {
        self.world.query::<D>()
    }

    pub fn query_by<D: QueryData>(
        &mut self,
        query: &Query,
    ) -> Result<QueryResults<'_, D>, RuntimeError> {
        self.world.query_by::<D>(query)
    }

    pub fn each_mut<T: Component>(
        &mut self,
        query: &Query,
        f: impl FnMut(Entity, &mut T),
    ) -> Result<(), RuntimeError> {
        self.world.each_mut(query, f)
    }

    // Resources

    pub fn set_local<T: Send + Sync + 'static>(&mut self, value: T) -> &mut T {
        self.state.locals.set(value)
    }

    pub fn local<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.state.locals.get::<T>()
    }

    pub fn local_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.state.locals.get_mut::<T>()
    }

    /// Drop this system's local `T`; false if it had none.
    pub fn delete_local<T: Send + Sync + 'static>(&mut self) -> bool {
        self.state.locals.remove::<T>()
    }

    pub fn global<G: Resource>(&self) -> Result<&G, RuntimeError> {
        self.globals.get::<G>()
    }

    pub fn global_mut<G: Resource>(&mut self) -> Result<&mut G, RuntimeError> {
        self.globals.get_mut::<G>()
    }

    // Events

    /// Append an event and return its sequence number.
    pub fn push<E: Event>(&mut self, event: E) -> Result<u64, RuntimeError> {
        let seq = self.events.push(event)?;
        tracing::trace!(event = std::any::type_name::<E>(), seq, "event pushed");
        Ok(seq)
    }

    /// Events of type `E` this system has not read yet. Reading again before
    /// anything new is pushed yields nothing.
    pub fn read<E: Event>(&mut self) -> Result<std::slice::Iter<'_, E>, RuntimeError> {
        self.events.read::<E>(&mut self.state.cursors)
    }

    pub fn no_unread<E: Event>(&self) -> Result<bool, RuntimeError> {
        self.events.no_unread::<E>(&self.state.cursors)
    }

    // Scheduling

    /// Run `task` in the background without the frame waiting for it.
    ///
    /// The task goes to the ambient tokio runtime when there is one and to a
    /// fresh thread otherwise. It is never joined and cannot borrow from the
    /// runtime.
    pub fn detach<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let system = self.state.id.map(|id| id.name()).unwrap_or("external");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                let spawned = std::thread::Builder::new()
                    .name("cadence-detached".into())
                    .spawn(move || futures::executor::block_on(task));
                if let Err(err) = spawned {
                    tracing::error!(system, %err, "failed to start detached task");
                    return;
                }
            }
        }
        tracing::trace!(system, "detached task");
    }

    /// Enable every context of `system` once the current system returns.
    pub fn enable(&mut self, system: SystemId) {
        self.requests.toggles.push((system, Toggle::Enable));
    }

    pub fn disable(&mut self, system: SystemId) {
        self.requests.toggles.push((system, Toggle::Disable));
    }

    pub fn toggle(&mut self, system: SystemId) {
        self.requests.toggles.push((system, Toggle::Flip));
    }

    /// Ask the runtime to pause after this system.
    pub fn pause(&mut self) {
        self.requests.pause = true;
    }

    /// Ask the host to stop the runtime. Frames stop being scheduled; the
    /// shutdown stage runs when the host calls `Runtime::stop`.
    pub fn request_stop(&mut self) {
        self.requests.stop = true;
    }

    // Clock

    pub fn clock(&self) -> &FrameClock {
        self.clock
    }

    pub fn cycle(&self) -> u64 {
        self.clock.cycle()
    }

    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    pub fn delta(&self) -> f64 {
        self.clock.delta()
    }
}
