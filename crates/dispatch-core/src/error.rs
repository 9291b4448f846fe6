use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not initialized: run 'dispatch init'")]
    NotInitialized,

    #[error("no current list: pass --list, set DISPATCH_LIST, or run 'dispatch use <list>'")]
    NoCurrentList,

    #[error("list not found: {0}")]
    ListNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("invalid list id '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidListId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("task {task} is blocked by incomplete dependencies: {blockers}")]
    Blocked { task: String, blockers: String },

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DispatchError {
    /// Stable machine-readable error kind, surfaced in the CLI's JSON error
    /// objects so orchestrating scripts can branch without parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotInitialized => "not_initialized",
            DispatchError::NoCurrentList => "no_current_list",
            DispatchError::ListNotFound(_) => "not_found",
            DispatchError::TaskNotFound(_) => "not_found",
            DispatchError::SnapshotNotFound(_) => "not_found",
            DispatchError::ArchiveNotFound(_) => "not_found",
            DispatchError::InvalidListId(_) => "invalid_input",
            DispatchError::InvalidInput(_) => "invalid_input",
            DispatchError::InvalidStatus(_) => "invalid_input",
            DispatchError::Blocked { .. } => "blocked",
            DispatchError::UnknownDependency { .. } => "unknown_dependency",
            DispatchError::Cycle { .. } => "cycle",
            DispatchError::Io(_) => "store",
            DispatchError::Yaml(_) => "store",
            DispatchError::Json(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_joins_path() {
        let err = DispatchError::Cycle {
            path: vec!["T1".into(), "T2".into(), "T1".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: T1 -> T2 -> T1");
        assert_eq!(err.kind(), "cycle");
    }

    #[test]
    fn io_errors_map_to_store_kind() {
        let err: DispatchError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.kind(), "store");
    }
}
