use crate::io::IoError;

use std::error::Error;
use std::fmt;

#[derive(Debug)]
#[non_exhaustive]
pub struct ClientError {
    pub(crate) kind: ClientErrorKind,
}

impl ClientError {
    pub(crate) fn new(kind: ClientErrorKind) -> Self {
        ClientError { kind }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientError: {}", self.kind)
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Debug)]
pub(crate) enum ClientErrorKind {
    ConfigRequest { status: tonic::Status, keys: Vec<String> },
    ExecutePlanRequest { status: tonic::Status, operation: String },
    InvalidConnectionString { source: Option<url::ParseError>, conn_string: String, msg: String },
    InvalidHeader { name: String },
    InvalidSessionID { source: uuid::Error, session_id: String },
    Io(IoError),
    MissingSqlCommandResult(String),
    SessionIDMismatch { client_session_id: String, request_session_id: String },
    Stream(tonic::Status),
    TlsUnavailable,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigRequest { status, keys } => write!(
                f, "ConfigRequest failed with status '{status}' while setting {keys:?}"
            ),
            Self::ExecutePlanRequest { status, operation } => write!(
                f, "ExecutePlanRequest '{operation}' failed with status '{status}'"
            ),
            Self::InvalidConnectionString { conn_string, msg, .. } => write!(
                f, "Failed to parse the connection URL '{conn_string}': {msg}. Please update the URL to follow the correct format, e.g., 'sc://hostname:port'."
            ),
            Self::InvalidHeader { name } => write!(f, "'{name}' cannot be sent as a gRPC metadata header"),
            Self::InvalidSessionID { session_id, .. } => write!(f, "Failed to parse session ID: '{session_id}'"),
            Self::Io(_) => write!(f, "Failed to convert Arrow RecordBatch."),
            Self::MissingSqlCommandResult(sql) => write!(
                f, "The server returned no result relation for SQL command: {sql}"
            ),
            Self::SessionIDMismatch { client_session_id, request_session_id } => write!(
                f, "Request session ID does not match the client: {client_session_id} != {request_session_id}"
            ),
            Self::Stream(status) => write!(f, "Failed to process stream: status {status}"),
            Self::TlsUnavailable => write!(
                f, "The 'use_ssl' option requires the 'tls' feature, but it's not enabled"
            ),
        }
    }
}

impl Error for ClientErrorKind {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConfigRequest { status, .. } => Some(status),
            Self::ExecutePlanRequest { status, .. } => Some(status),
            Self::InvalidConnectionString { source: Some(source), .. } => Some(source),
            Self::InvalidSessionID { source, .. } => Some(source),
            Self::Io(source) => Some(source),
            Self::Stream(status) => Some(status),
            _ => None,
        }
    }
}

impl From<IoError> for ClientError {
    fn from(error: IoError) -> Self {
        ClientError::new(ClientErrorKind::Io(error))
    }
}
