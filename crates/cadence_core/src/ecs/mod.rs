//! Entity Component System core types.
//!
//! The world owns entities and their per-type component columns and keeps a
//! cache of query results that is updated incrementally as entities change.
//! Events and resources live beside it; the scheduler in [`crate::schedule`]
//! ties them together behind a per-system context.

mod archetype;
mod builder;
mod component;
mod entity;
mod error;
mod event;
pub mod query;
mod resource;
pub mod storage;
mod world;

pub use archetype::Signature;
pub use builder::EntityBuilder;
pub use component::{Component, ComponentId, ComponentMeta, ComponentRegistry};
pub use entity::Entity;
pub use error::{RuntimeError, SystemResult};
pub use event::{Event, EventCursors, EventId, EventMeta, Events};
pub use query::{
    CachedQuery, ComponentKey, Query, QueryCache, QueryData, QueryFilter, QueryId, QueryItem,
    QueryIter, QueryResults,
};
pub use resource::{GlobalDecl, Globals, LocalResources, Resource};
pub use storage::{Column, ErasedColumn};
pub use world::World;

/// Spawn an entity into the world using builder-style component construction.
///
/// Expands to `world.spawn(builder)` and yields its `Result`.
#[macro_export]
macro_rules! spawn {
    ($world:expr $(, $component:expr)* $(,)?) => {{
        let builder = {
            #[allow(unused_mut)]
            let mut builder = $crate::ecs::EntityBuilder::new();
            $(
                builder = builder.with($component);
            )*
            builder
        };
        $world.spawn(builder)
    }};
}
