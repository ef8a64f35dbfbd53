use crate::ecs::{Entity, Query};
use std::error::Error;
use thiserror::Error;

/// Errors raised by the registries, the query engine and the scheduler.
///
/// Every variant carries the subject it was raised for. Nothing is retried
/// internally; a failure surfaces at the call that misused the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unknown CompType: [{name}]")]
    UnknownComponent { name: &'static str },

    #[error("Invalid Entity: [{entity}]")]
    InvalidEntity { entity: Entity },

    #[error("Unknown Global Access: [{name}]")]
    UnknownGlobal { name: &'static str },

    #[error("Global Not Initialized: [{name}]")]
    GlobalNotInitialized { name: &'static str },

    #[error("Unknown EventType: [{name}]")]
    UnknownEvent { name: &'static str },

    #[error("No Results Available In Query: [{query}]")]
    NoResults { query: Query },

    #[error("More Than One Result Available In Query: [{query}] ({count} matches)")]
    MultipleResults { query: Query, count: usize },

    #[error("Plugin Or Plugins Required: [{}]", .plugins.join("] ["))]
    PluginsRequired { plugins: Vec<String> },

    /// Failure raised by application code inside a system.
    #[error(transparent)]
    System(#[from] Box<dyn Error + Send + Sync>),
}

impl RuntimeError {
    /// Wrap an application error so it can be returned from a system.
    pub fn system(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::System(err.into())
    }
}

/// Result type returned by every system.
pub type SystemResult = Result<(), RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_kind_and_subject() {
        let err = RuntimeError::UnknownEvent { name: "Ghost" };
        assert_eq!(err.to_string(), "Unknown EventType: [Ghost]");

        let err = RuntimeError::PluginsRequired {
            plugins: vec!["physics".into(), "audio".into()],
        };
        assert_eq!(err.to_string(), "Plugin Or Plugins Required: [physics] [audio]");
    }

    #[test]
    fn system_errors_wrap_strings() {
        let err = RuntimeError::system("boom");
        assert!(matches!(err, RuntimeError::System(_)));
        assert_eq!(err.to_string(), "boom");
    }
}
