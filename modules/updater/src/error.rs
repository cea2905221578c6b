#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sentinel: the remote feed has not changed since the fingerprint the
    /// fetcher was handed. Not a failure; callers short-circuit on it.
    #[error("feed unchanged since last fetch")]
    Unchanged,

    /// A configured feed root without a trailing slash would silently
    /// swallow the last path segment when joined against.
    #[error("feed root must end in a trailing slash: {0:?}")]
    InvalidRoot(String),

    #[error("updater factory already registered: {0:?}")]
    AlreadyRegistered(String),

    #[error("malformed feed metadata: {0}")]
    Metadata(String),

    /// One or more updaters failed during a sweep; the message joins the
    /// individual failures.
    #[error("update sweep failed: {0}")]
    Sweep(String),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] scandium_module_vulnstore::Error),
}
