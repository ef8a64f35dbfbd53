//! Staged scheduling.
//!
//! A [`RuntimeBuilder`] collects declarations into a persistent
//! configuration; [`RuntimeBuilder::build`] turns it into a [`Runtime`] that
//! owns the live registries. Startup and shutdown stages are awaited system
//! by system. Frame stages run synchronously once per frame fired by the
//! [`FramePacer`].

mod builder;
mod context;
mod pacer;
mod runtime;
mod stage;
mod system;

pub use builder::RuntimeBuilder;
pub use context::{SystemCtx, SystemState};
pub use pacer::{FramePacer, FrameRequest, IntervalPacer, ManualPacer};
pub use runtime::{RunState, Runtime};
pub use stage::{AsyncStage, Phase, Stage};
pub use system::{SystemDescriptor, SystemId};
