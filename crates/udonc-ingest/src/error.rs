use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid byteCodeHex: {0}")]
    BadHex(String),

    #[error("unrecognized parameter direction `{0}`")]
    BadParameterDirection(String),

    #[error("unrecognized defType `{0}`")]
    BadDefType(String),

    #[error("heap entry key `{0}` is not a valid address")]
    BadHeapKey(String),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
