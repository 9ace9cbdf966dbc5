use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::EntityKind;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("accession {accession} is not a {expected} accession")]
    InvalidAccession {
        expected: EntityKind,
        accession: String,
    },

    #[error("missing <{path}> in {entity} element")]
    MissingElement { entity: &'static str, path: String },

    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("malformed record for accession {accession}: {reason}")]
    MalformedRecord { accession: String, reason: String },

    #[error("no <{0}> element found in document")]
    DocumentNotFound(EntityKind),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("malformed platform {accession}: {reason}")]
    MalformedPlatform { accession: String, reason: String },

    #[error("GEO request failed: {0}")]
    GeoHttp(String),

    #[error("GEO returned status {status}: {message}")]
    GeoStatus { status: u16, message: String },

    #[error("failed to read record: {0}")]
    RecordParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid series matrix: {0}")]
    InvalidMatrix(String),

    #[error("{0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Routing,
    Structure,
    MalformedPlatform,
    Download,
    Persistence,
    Usage,
}

impl KiraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KiraError::InvalidAccession { .. } => ErrorKind::Routing,
            KiraError::MissingElement { .. }
            | KiraError::InvalidValue { .. }
            | KiraError::MalformedRecord { .. }
            | KiraError::DocumentNotFound(_)
            | KiraError::Xml(_) => ErrorKind::Structure,
            KiraError::MalformedPlatform { .. } => ErrorKind::MalformedPlatform,
            KiraError::GeoHttp(_) | KiraError::GeoStatus { .. } => ErrorKind::Download,
            KiraError::RecordParse(_) | KiraError::Filesystem(_) => ErrorKind::Persistence,
            KiraError::ConfigRead(_)
            | KiraError::ConfigParse(_)
            | KiraError::InvalidMatrix(_)
            | KiraError::InvalidArgument(_) => ErrorKind::Usage,
        }
    }

    pub fn for_accession(self, accession: &str) -> Self {
        match self {
            KiraError::MissingElement { .. }
            | KiraError::InvalidValue { .. }
            | KiraError::Xml(_) => KiraError::MalformedRecord {
                accession: accession.to_string(),
                reason: self.to_string(),
            },
            other => other,
        }
    }
}
