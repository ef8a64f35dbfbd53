//! Global and per-system resources.

use crate::ecs::RuntimeError;
use std::any::{type_name, Any, TypeId};
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::sync::Arc;

type AnyBox = Box<dyn Any + Send + Sync>;

/// Singleton state shared by every system.
///
/// `first_cycle` runs once, after every global has been constructed and the
/// startup stages have finished, right before the first frame.
pub trait Resource: Send + Sync + 'static {
    fn first_cycle(&mut self) {}
}

/// A declared global: its type and how to build it.
#[derive(Clone)]
pub struct GlobalDecl {
    type_id: TypeId,
    name: &'static str,
    init: Arc<dyn Fn() -> AnyBox + Send + Sync>,
    first_cycle: fn(&mut (dyn Any + Send + Sync)),
}

impl GlobalDecl {
    pub fn new<G: Resource>(init: impl Fn() -> G + Send + Sync + 'static) -> Self {
        Self {
            type_id: TypeId::of::<G>(),
            name: type_name::<G>(),
            init: Arc::new(move || Box::new(init()) as AnyBox),
            first_cycle: run_first_cycle::<G>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for GlobalDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalDecl").field("name", &self.name).finish()
    }
}

fn run_first_cycle<G: Resource>(value: &mut (dyn Any + Send + Sync)) {
    if let Some(global) = value.downcast_mut::<G>() {
        global.first_cycle();
    }
}

/// Storage for the declared globals of one runtime.
pub struct Globals {
    decls: Vec<GlobalDecl>,
    index: HashMap<TypeId, usize>,
    values: Vec<Option<AnyBox>>,
}

impl Globals {
    pub fn new(decls: Vec<GlobalDecl>) -> Self {
        let index = decls
            .iter()
            .enumerate()
            .map(|(idx, decl)| (decl.type_id, idx))
            .collect();
        let values = decls.iter().map(|_| None).collect();
        Self {
            decls,
            index,
            values,
        }
    }

    /// Construct every global not built yet, in declaration order.
    pub fn initialize(&mut self) {
        for (decl, slot) in self.decls.iter().zip(self.values.iter_mut()) {
            if slot.is_none() {
                *slot = Some((decl.init)());
                tracing::debug!(global = decl.name, "global constructed");
            }
        }
    }

    /// Run each global's `first_cycle` hook, in declaration order.
    pub fn first_cycle(&mut self) {
        for (decl, slot) in self.decls.iter().zip(self.values.iter_mut()) {
            if let Some(value) = slot {
                (decl.first_cycle)(&mut **value);
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn get<G: Resource>(&self) -> Result<&G, RuntimeError> {
        let idx = self.slot::<G>()?;
        self.values[idx]
            .as_ref()
            .and_then(|value| value.downcast_ref::<G>())
            .ok_or(RuntimeError::GlobalNotInitialized {
                name: type_name::<G>(),
            })
    }

    pub fn get_mut<G: Resource>(&mut self) -> Result<&mut G, RuntimeError> {
        let idx = self.slot::<G>()?;
        self.values[idx]
            .as_mut()
            .and_then(|value| value.downcast_mut::<G>())
            .ok_or(RuntimeError::GlobalNotInitialized {
                name: type_name::<G>(),
            })
    }

    fn slot<G: Resource>(&self) -> Result<usize, RuntimeError> {
        self.index
            .get(&TypeId::of::<G>())
            .copied()
            .ok_or(RuntimeError::UnknownGlobal {
                name: type_name::<G>(),
            })
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Values owned by a single system context, keyed by type.
#[derive(Default)]
pub struct LocalResources {
    values: HashMap<TypeId, AnyBox>,
}

impl LocalResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any previous local of the same type, and hand
    /// back a mutable reference to it.
    pub fn set<T: Send + Sync + 'static>(&mut self, value: T) -> &mut T {
        let slot = match self.values.entry(TypeId::of::<T>()) {
            Entry::Occupied(mut entry) => {
                entry.insert(Box::new(value));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(Box::new(value)),
        };
        slot.downcast_mut::<T>()
            .expect("local slot holds the type it is keyed by")
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Drop the local of type `T`. Returns false if there was none.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> bool {
        self.values.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
