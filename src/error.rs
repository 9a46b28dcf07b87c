use thiserror::Error;

/// Errors returned by data-release accessors and combined datasets.
#[derive(Debug, Error)]
pub enum SnDataError {
    /// Data was requested for an object id no registered release knows about.
    #[error("The provided object Id is not valid: {0}")]
    InvalidObjId(String),

    /// A bare local id is used by more than one release.
    #[error("Multiple results for obj_id: {0}")]
    AmbiguousObjId(String),

    #[error("No table was found matching the given ID: {0}")]
    InvalidTableId(String),

    #[error("{0}")]
    InvalidArgument(String),

    /// An operation needed local data before it was downloaded.
    #[error("{0}")]
    NoDownloadedData(String),

    /// The action is not available for the release's type of data.
    #[error("{0}")]
    ObservedDataType(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] figment::Error),

    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("failed to load table: {0:#}")]
    Load(#[from] anyhow::Error),
}

impl SnDataError {
    pub(crate) fn no_downloaded_data() -> Self {
        Self::NoDownloadedData("Data has not been downloaded for this data release.".into())
    }

    pub fn is_not_downloaded(&self) -> bool {
        matches!(self, Self::NoDownloadedData(_))
    }
}

pub type Result<T, E = SnDataError> = std::result::Result<T, E>;
