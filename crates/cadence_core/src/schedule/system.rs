use crate::ecs::SystemResult;
use crate::schedule::{Stage, SystemCtx};
use futures::future::BoxFuture;
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

pub(crate) type SyncSystemFn = Arc<dyn Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync>;

pub(crate) type AsyncSystemFn = Arc<
    dyn for<'a, 'w> Fn(&'a mut SystemCtx<'w>) -> BoxFuture<'a, SystemResult> + Send + Sync,
>;

/// Identity of a system: the type of the function or closure it was built
/// from. Two declarations of the same function share an id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SystemId {
    type_id: TypeId,
    name: &'static str,
}

impl SystemId {
    pub fn of<F: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            name: type_name::<F>(),
        }
    }

    /// Id of the system built from `system`.
    pub fn of_val<F: 'static>(_system: &F) -> Self {
        Self::of::<F>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Clone)]
pub(crate) enum SystemFn {
    Sync(SyncSystemFn),
    Async(AsyncSystemFn),
}

/// A system function together with the stage it was declared in.
#[derive(Clone)]
pub struct SystemDescriptor {
    id: SystemId,
    stage: Stage,
    run: SystemFn,
}

impl SystemDescriptor {
    pub(crate) fn sync<F>(stage: Stage, system: F) -> Self
    where
        F: Fn(&mut SystemCtx<'_>) -> SystemResult + Send + Sync + 'static,
    {
        Self {
            id: SystemId::of::<F>(),
            stage,
            run: SystemFn::Sync(Arc::new(system)),
        }
    }

    pub(crate) fn asynchronous<F>(stage: Stage, system: F) -> Self
    where
        F: for<'a, 'w> Fn(&'a mut SystemCtx<'w>) -> BoxFuture<'a, SystemResult>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: SystemId::of::<F>(),
            stage,
            run: SystemFn::Async(Arc::new(system)),
        }
    }

    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_async(&self) -> bool {
        matches!(self.run, SystemFn::Async(_))
    }

    pub(crate) fn run(&self) -> &SystemFn {
        &self.run
    }
}

impl fmt::Debug for SystemDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemDescriptor")
            .field("name", &self.id.name)
            .field("stage", &self.stage)
            .field("async", &self.is_async())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut SystemCtx<'_>) -> SystemResult {
        Ok(())
    }

    fn other(_ctx: &mut SystemCtx<'_>) -> SystemResult {
        Ok(())
    }

    #[test]
    fn identity_follows_the_function() {
        let a = SystemDescriptor::sync(Stage::Update, noop);
        let b = SystemDescriptor::sync(Stage::Last, noop);
        let c = SystemDescriptor::sync(Stage::Update, other);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id(), SystemId::of_val(&noop));
        assert!(a.name().ends_with("noop"));
        assert!(!a.is_async());
    }
}
