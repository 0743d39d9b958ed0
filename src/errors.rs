use crate::executor::TaskType;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("Route uri is empty")]
    EmptyUri,

    #[error("No page registered for uri: {0}")]
    RouteNotFound(String),

    #[error("Page id pool exhausted")]
    PageIdExhausted,

    #[error("Route stack has reached its max size")]
    RouteStackFull,

    #[error("Timed out waiting for the staging page to finish loading")]
    StagingBusy,

    #[error("Page not found")]
    PageNotFound,

    #[error("Pipeline context is not attached")]
    PipelineUnavailable,

    #[error("Task could not be posted to the {0} queue")]
    Dispatch(TaskType),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Task executor has been destroyed")]
    Destroyed,

    #[error("Synchronous task on the {0} queue was dropped before it ran")]
    SyncTaskDropped(TaskType),

    #[error("Cannot spawn the {0} queue thread")]
    ThreadSpawn(TaskType),

    #[error("Cannot create the timer runtime")]
    TimerRuntime,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Manifest io error: {0}")]
    Io(#[from] std::io::Error),
}
