use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReadsError {
    #[error("malformed {record} record {id}: {field}: {reason}")]
    MalformedRecord {
        record: &'static str,
        id: String,
        field: String,
        reason: String,
    },

    #[error("E-utilities request failed: {0}")]
    UpstreamQuery(String),

    #[error("E-utilities returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("experiment {experiment} references BioSample {biosample}, which was not fetched")]
    UnresolvedJoin {
        experiment: String,
        biosample: String,
    },

    #[error("could not determine accession type for {0}")]
    UnclassifiableAccession(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("batch size must be at least 1 (got {0})")]
    InvalidBatchSize(usize),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
