use std::error::Error;
use std::fmt;

use crate::rpc::api::RpcError;

/// Failure taxonomy of an import run.
///
/// `Config` and `DuplicateIds` are raised before any remote call is made.
/// `UploadRejected` carries the diagnostic sub-table rendered from the
/// server's structured messages and aborts the remaining batches of the
/// dataset that produced it.
#[derive(Debug)]
pub enum ImportError {
    Config(String),
    DuplicateIds { source: String, ids: Vec<String> },
    UploadRejected {
        source: String,
        model: String,
        diagnostic: String,
    },
    Rpc(RpcError),
    Timeout(u64),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Config(msg) => write!(f, "{}", msg),
            ImportError::DuplicateIds { source, ids } => {
                write!(f, "Detected duplicate ids in {}. Dupes: {}", source, ids.join(", "))
            }
            ImportError::UploadRejected { source, model, .. } => {
                write!(f, "Server rejected import of '{}' into '{}'. See log.", source, model)
            }
            ImportError::Rpc(err) => write!(f, "{}", err),
            ImportError::Timeout(secs) => {
                write!(f, "Could not reach the server after timeout of {} seconds", secs)
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImportError::Rpc(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RpcError> for ImportError {
    fn from(error: RpcError) -> Self {
        ImportError::Rpc(error)
    }
}
