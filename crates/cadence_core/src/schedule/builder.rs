//! Persistent runtime configuration.
//!
//! Every declaration returns a new builder and leaves the original untouched,
//! so a base configuration can be branched or shared as a plugin. Sections are
//! reference counted and only the section being changed is copied.

use crate::ecs::{
    Component, ComponentMeta, Event, EventMeta, GlobalDecl, Resource, RuntimeError, SystemResult,
};
use crate::schedule::{
    AsyncStage, FramePacer, IntervalPacer, Runtime, Stage, SystemCtx, SystemDescriptor,
};
use crate::settings::RuntimeSettings;
use futures::future::BoxFuture;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RuntimeBuilder {
    name: Option<Arc<str>>,
    required: Arc<Vec<String>>,
    provided: Arc<Vec<String>>,
    components: Arc<Vec<ComponentMeta>>,
    events: Arc<Vec<EventMeta>>,
    globals: Arc<Vec<GlobalDecl>>,
    stages: [Arc<Vec<SystemDescriptor>>; Stage::COUNT],
    settings: Arc<RuntimeSettings>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name this configuration so other builders can `require` it.
    pub fn named(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        let name: String = name.into();
        next.name = Some(Arc::from(name.as_str()));
        next
    }

    /// Fail `build` unless a plugin with this name has been merged in.
    pub fn require(&self, plugin: impl Into<String>) -> Self {
        let mut next = self.clone();
        push_unique(Arc::make_mut(&mut next.required), plugin.into());
        next
    }

    pub fn with_settings(&self, settings: RuntimeSettings) -> Self {
        let mut next = self.clone();
        next.settings = Arc::new(settings);
        next
    }

    pub fn use_component<T: Component>(&self) -> Self {
        let mut next = self.clone();
        let meta = ComponentMeta::of::<T>();
        if !next.components.iter().any(|known| known.type_id == meta.type_id) {
            Arc::make_mut(&mut next.components).push(meta);
        }
        next
    }

    pub fn use_event<E: Event>(&self) -> Self {
        let mut next = self.clone();
        let meta = EventMeta::of::<E>();
        if !next.events.iter().any(|known| known.type_id == meta.type_id) {
            Arc::make_mut(&mut next.events).push(meta);
        }
        next
    }

    /// Declare a global built by `init` when the runtime starts. A later
    /// declaration of the same type replaces the earlier one in place.
    pub fn use_global<G: Resource>(&self, init: impl Fn() -> G + Send + Sync + 'static) -> Self {
        let mut next = self.clone();
        upsert_global(Arc::make_mut(&mut next.globals), GlobalDecl::new(init));
        next
    }

    pub fn use_global_default<G: Resource + Default>(&self) -> Self {
        self.use_global(G::default)
    }

    /// Append a system to `stage`. A function already in that stage is not
    /// added twice.
    pub fn add_system<F>(&self, stage: Stage, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.with_descriptor(SystemDescriptor::sync(stage, system))
    }

    /// Append an asynchronous system to one of the awaited stages.
    pub fn add_async_system<F>(&self, stage: AsyncStage, system: F) -> Self
    where
        F: for<'a, 'w> Fn(&'a mut SystemCtx<'w>) -> BoxFuture<'a, SystemResult>
            + Send
            + Sync
            + 'static,
    {
        self.with_descriptor(SystemDescriptor::asynchronous(stage.into(), system))
    }

    fn with_descriptor(&self, descriptor: SystemDescriptor) -> Self {
        let mut next = self.clone();
        let list = &mut next.stages[descriptor.stage().index()];
        if !list.iter().any(|known| known.id() == descriptor.id()) {
            Arc::make_mut(list).push(descriptor);
        }
        next
    }

    pub fn use_pre_startup<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::PreStartup, system)
    }

    pub fn use_startup<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::Startup, system)
    }

    pub fn use_post_startup<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::PostStartup, system)
    }

    pub fn use_first<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::First, system)
    }

    pub fn use_pre_update<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::PreUpdate, system)
    }

    pub fn use_update<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::Update, system)
    }

    pub fn use_post_update<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::PostUpdate, system)
    }

    pub fn use_last<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::Last, system)
    }

    pub fn use_shutdown<F>(&self, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        self.add_system(Stage::Shutdown, system)
    }

    pub fn use_startup_async<F>(&self, system: F) -> Self
    where
        F: for<'a, 'w> Fn(&'a mut SystemCtx<'w>) -> BoxFuture<'a, SystemResult>
            + Send
            + Sync
            + 'static,
    {
        self.add_async_system(AsyncStage::Startup, system)
    }

    pub fn use_shutdown_async<F>(&self, system: F) -> Self
    where
        F: for<'a, 'w> Fn(&'a mut SystemCtx<'w>) -> BoxFuture<'a, SystemResult>
            + Send
            + Sync
            + 'static,
    {
        self.add_async_system(AsyncStage::Shutdown, system)
    }

    /// Merge `plugin` into this configuration.
    ///
    /// Stage lists and declared types become the ordered union of both, with
    /// entries already present here kept in place. Globals declared by the
    /// plugin replace ours of the same type. Settings stay ours.
    pub fn use_plugin(&self, plugin: &RuntimeBuilder) -> Self {
        let mut next = self.clone();

        merge_by(&mut next.components, &plugin.components, |a, b| {
            a.type_id == b.type_id
        });
        merge_by(&mut next.events, &plugin.events, |a, b| a.type_id == b.type_id);
        for (ours, theirs) in next.stages.iter_mut().zip(plugin.stages.iter()) {
            merge_by(ours, theirs, |a, b| a.id() == b.id());
        }
        if !plugin.globals.is_empty() {
            let globals = Arc::make_mut(&mut next.globals);
            for decl in plugin.globals.iter() {
                upsert_global(globals, decl.clone());
            }
        }

        let provided = Arc::make_mut(&mut next.provided);
        if let Some(name) = &plugin.name {
            push_unique(provided, name.to_string());
        }
        for name in plugin.provided.iter() {
            push_unique(provided, name.clone());
        }
        merge_by(&mut next.required, &plugin.required, |a, b| a == b);

        tracing::debug!(plugin = plugin.name.as_deref().unwrap_or("<unnamed>"), "merged plugin");
        next
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn systems(&self, stage: Stage) -> &[SystemDescriptor] {
        &self.stages[stage.index()]
    }

    pub fn components(&self) -> &[ComponentMeta] {
        &self.components
    }

    pub fn events(&self) -> &[EventMeta] {
        &self.events
    }

    pub fn globals(&self) -> &[GlobalDecl] {
        &self.globals
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Required plugins that have not been merged in.
    pub fn missing_plugins(&self) -> Vec<String> {
        self.required
            .iter()
            .filter(|name| {
                self.name.as_deref() != Some(name.as_str()) && !self.provided.contains(name)
            })
            .cloned()
            .collect()
    }

    /// Build a runtime paced by an [`IntervalPacer`] at the configured rate.
    pub fn build(&self) -> Result<Runtime, RuntimeError> {
        let pacer = IntervalPacer::from_settings(&self.settings);
        self.build_with_pacer(pacer)
    }

    pub fn build_with_pacer(&self, pacer: impl FramePacer + 'static) -> Result<Runtime, RuntimeError> {
        let missing = self.missing_plugins();
        if !missing.is_empty() {
            return Err(RuntimeError::PluginsRequired { plugins: missing });
        }

        let stages = std::array::from_fn(|idx| self.stages[idx].to_vec());
        Ok(Runtime::new(
            self.name.as_deref().map(str::to_owned),
            self.components.to_vec(),
            self.events.to_vec(),
            self.globals.to_vec(),
            stages,
            (*self.settings).clone(),
            Box::new(pacer),
        ))
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn upsert_global(globals: &mut Vec<GlobalDecl>, decl: GlobalDecl) {
    match globals.iter_mut().find(|known| known.type_id() == decl.type_id()) {
        Some(slot) => *slot = decl,
        None => globals.push(decl),
    }
}

/// Append the entries of `theirs` that `ours` lacks, copying `ours` only when
/// something is added.
fn merge_by<T: Clone>(ours: &mut Arc<Vec<T>>, theirs: &Arc<Vec<T>>, same: impl Fn(&T, &T) -> bool) {
    if Arc::ptr_eq(ours, theirs) {
        return;
    }
    let additions: Vec<T> = theirs
        .iter()
        .filter(|candidate| !ours.iter().any(|known| same(known, candidate)))
        .cloned()
        .collect();
    if !additions.is_empty() {
        Arc::make_mut(ours).extend(additions);
    }
}
