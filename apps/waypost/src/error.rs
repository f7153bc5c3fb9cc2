use thiserror::Error;

/// Failures recovered at the message boundary and answered with an
/// `error` reply to the offending peer. None of these terminate other
/// sessions or the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("client is not registered")]
    NotRegistered,
    #[error("target client not found or offline")]
    TargetNotFound,
    #[error("target client is not responding")]
    TargetUnreachable,
    #[error("client is busy in another session")]
    TargetBusy,
    #[error("cannot request a connection to yourself")]
    InvalidTarget,
    #[error("session not found")]
    SessionNotFound,
    #[error("not authorized for this session")]
    NotAuthorized,
    #[error("session is not active")]
    SessionNotActive,
    #[error("requester is no longer online")]
    RequesterGone,
    #[error("peer is no longer connected")]
    PeerGone,
    #[error("identifier space exhausted")]
    CapacityExhausted,
}
