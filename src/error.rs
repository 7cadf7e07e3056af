/*!
error module defines the error types used in bgpkit-stream.
*/
use crate::stream::StreamStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// An operation was invoked while the stream was in a status that does not allow it.
    ///
    /// ## Occurs during:
    ///  - Calling [get_next_record][crate::BgpStream::get_next_record] before `start` or after `stop`
    #[error("cannot {operation} while stream is {status:?}")]
    WrongState {
        operation: &'static str,
        status: StreamStatus,
    },
    /// A filter value could not be parsed, or the filter set as a whole is inconsistent.
    ///
    /// ## Occurs during:
    ///  - Adding filters
    ///  - Validating filters at `start`
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("unknown data interface {0}")]
    UnknownInterface(String),
    #[error("data interface {interface} has no option named {option}")]
    UnknownOption { interface: String, option: String },
    /// A mandatory backend option has no value.
    ///
    /// ## Occurs during:
    ///  - `start`
    #[error("data interface {interface} requires option {option}")]
    MissingOption { interface: String, option: String },
    #[error("data interface misconfigured: {0}")]
    BackendMisconfigured(String),
    /// The backend could not be reached or queried right now. Retried under backoff in live
    /// mode, surfaced as a stream error in batch mode.
    #[error("data interface unavailable: {0}")]
    BackendUnavailable(String),
    #[error("cannot open chunk {locator}: {reason}")]
    ChunkOpen { locator: String, reason: String },
    /// A chunk turned out to be corrupted half way through. Only the affected chunk is dropped.
    #[error("corrupted chunk {locator}: {reason}")]
    Decode { locator: String, reason: String },
}

impl StreamError {
    /// Whether the error may go away by retrying the same backend query later.
    pub fn is_transient(&self) -> bool {
        matches!(self, StreamError::BackendUnavailable(_))
    }

    /// Whether the stream can keep delivering records after reporting this error.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            StreamError::Decode { .. } | StreamError::ChunkOpen { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let err = StreamError::BackendUnavailable("connection refused".to_string());
        assert!(err.is_transient());
        assert!(!err.is_soft());

        let err = StreamError::Decode {
            locator: "updates.20211001.0000.bz2".to_string(),
            reason: "truncated record".to_string(),
        };
        assert!(err.is_soft());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "corrupted chunk updates.20211001.0000.bz2: truncated record"
        );

        let err = StreamError::WrongState {
            operation: "get next record",
            status: StreamStatus::Allocated,
        };
        assert_eq!(
            err.to_string(),
            "cannot get next record while stream is Allocated"
        );
    }
}
