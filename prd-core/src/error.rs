use thiserror::Error;

use crate::combiner::Dimension;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Either structured data or document content is required")]
    MissingInput,

    #[error("Malformed {dimension} response from analysis provider: {details}")]
    MalformedUpstreamResponse { dimension: Dimension, details: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
