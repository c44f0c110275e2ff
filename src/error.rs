use crate::catalog::CatalogError;
use crate::client::ClientError;
use crate::config::ConfigError;
use crate::job::JobError;
use crate::records::RecordError;

use core::fmt;
use std::error::Error;

/// Wraps application errors into a common EtlError.
#[derive(Debug)]
pub struct EtlError {
    pub(crate) kind: EtlErrorKind,
}

impl EtlError {
    pub(crate) fn new(kind: EtlErrorKind) -> Self {
        EtlError { kind }
    }

    /// Whether the error was raised while resolving invocation parameters,
    /// i.e. before the engine was touched.
    pub fn is_config(&self) -> bool {
        matches!(self.kind, EtlErrorKind::Config(_))
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EtlError: {}", self.kind)
    }
}

impl Error for EtlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<CatalogError> for EtlError {
    fn from(error: CatalogError) -> Self {
        EtlError::new(EtlErrorKind::Catalog(error))
    }
}

impl From<ClientError> for EtlError {
    fn from(error: ClientError) -> Self {
        EtlError::new(EtlErrorKind::Client(error))
    }
}

impl From<ConfigError> for EtlError {
    fn from(error: ConfigError) -> Self {
        EtlError::new(EtlErrorKind::Config(error))
    }
}

impl From<JobError> for EtlError {
    fn from(error: JobError) -> Self {
        EtlError::new(EtlErrorKind::Job(error))
    }
}

impl From<RecordError> for EtlError {
    fn from(error: RecordError) -> Self {
        EtlError::new(EtlErrorKind::Record(error))
    }
}

#[derive(Debug)]
pub(crate) enum EtlErrorKind {
    Catalog(CatalogError),
    Client(ClientError),
    Config(ConfigError),
    Finalize { source: JobError, verification: Option<Box<EtlError>> },
    InvalidConnectionUri { source: http::uri::InvalidUri, uri: String },
    Job(JobError),
    Record(RecordError),
    Transport(tonic::transport::Error),
    Verification { written: usize, read: usize, missing: usize },
}

impl fmt::Display for EtlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog(_) => write!(f, "Catalog error"),
            Self::Client(_) => write!(f, "Client error"),
            Self::Config(_) => write!(f, "Configuration error"),
            Self::Finalize { verification: None, .. } => write!(f, "Job finalization failed"),
            Self::Finalize { verification: Some(cause), .. } => write!(
                f, "Job finalization failed after the verification step failed: {cause}"
            ),
            Self::InvalidConnectionUri { uri, .. } => write!(f, "Connection URI is invalid: '{uri}'"),
            Self::Job(_) => write!(f, "Job error"),
            Self::Record(_) => write!(f, "Record batch error"),
            Self::Transport(_) => write!(f, "Tonic transport error"),
            Self::Verification { written, read, missing } => write!(
                f, "Read-back data does not match: wrote {written} rows, read {read} rows, {missing} written rows missing"
            ),
        }
    }
}

impl Error for EtlErrorKind {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Catalog(source) => Some(source),
            Self::Client(source) => Some(source),
            Self::Config(source) => Some(source),
            Self::Finalize { source, .. } => Some(source),
            Self::InvalidConnectionUri { source, .. } => Some(source),
            Self::Job(source) => Some(source),
            Self::Record(source) => Some(source),
            Self::Transport(source) => Some(source),
            Self::Verification { .. } => None,
        }
    }
}
