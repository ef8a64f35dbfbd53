// mod.rs - Storage module exports

mod column;

pub use column::{Column, ErasedColumn};
pub(crate) use column::new_column;
