/// svnstash Error Types
#[derive(Debug, thiserror::Error)]
pub enum StashError {
    /// No `.svn` directory above the current directory
    #[error("could not find SVN root above {0}")]
    RootNotFound(String),

    /// The stash directory could not be created
    #[error("could not create stash directory: {0}")]
    StorageInit(String),

    /// `save` found nothing to capture
    #[error("there are no changes in working copy to stash")]
    NoChangesToStash,

    /// `apply` refused to run over local modifications
    #[error("changes exist in \"{0}\"; please stash or revert them")]
    DirtyWorkingCopy(String),

    /// Index addressing outside the current store
    #[error("no stash with index \"{index}\" exists ({len} stashes)")]
    IndexOutOfRange { index: i64, len: usize },

    /// Revision log could not be retrieved or understood
    #[error("revision history unavailable: {0}")]
    HistoryUnavailable(String),

    /// Operator declined a confirmation prompt
    #[error("dying by user request")]
    UserAborted,

    /// A required executable is not on PATH
    #[error("missing external tool: {0}")]
    MissingExternalTool(String),

    /// A Subversion command exited unsuccessfully
    #[error("svn error: {0}")]
    Svn(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StashError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        StashError::Config(msg.into())
    }

    pub fn svn<S: Into<String>>(msg: S) -> Self {
        StashError::Svn(msg.into())
    }

    pub fn history<S: Into<String>>(msg: S) -> Self {
        StashError::HistoryUnavailable(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        StashError::StorageInit(msg.into())
    }

    pub fn missing_tool<S: Into<String>>(name: S) -> Self {
        StashError::MissingExternalTool(name.into())
    }

    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        StashError::IndexOutOfRange { index, len }
    }
}

pub type Result<T> = std::result::Result<T, StashError>;
