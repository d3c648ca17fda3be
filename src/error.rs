use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid chunks: {0}")]
    ChunkSpec(String),
    #[error("invalid compressor: {0}")]
    CompressorSpec(String),
    #[error("invalid rounding: {0}")]
    RoundingSpec(String),
    #[error("invalid dataset: {0}")]
    Dataset(String),
    #[error("unknown codec {name:?}; valid codec names are {valid:?}")]
    UnknownCodec {
        name: String,
        valid: &'static [&'static str],
    },
    #[error("a store already exists at {}; pass force=true to overwrite", .0.display())]
    StoreExists(PathBuf),
    #[error("rechunking into {} failed", .target.display())]
    Rechunk {
        target: PathBuf,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),
    #[error(transparent)]
    Array(#[from] zarrs::array::ArrayError),
    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),
    #[error(transparent)]
    GroupCreate(#[from] zarrs::group::GroupCreateError),
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }
}
