//! Cadence core
//!
//! An entity component system runtime:
//! - Entity and component storage with cached, incrementally maintained queries
//! - Typed event buffers with per-system cursors
//! - Global and per-system resources
//! - A staged scheduler driven by an external frame pacer

pub mod ecs;
pub mod schedule;
pub mod settings;
pub mod time;

pub use ecs::{Entity, EntityBuilder, Query, Resource, RuntimeError, SystemResult, World};
pub use schedule::{Runtime, RuntimeBuilder, Stage, SystemCtx, SystemId};
pub use settings::RuntimeSettings;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
