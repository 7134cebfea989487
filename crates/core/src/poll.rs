//! Structured poll outcomes.
//!
//! Factories read the human-readable `message()`; everything server-side
//! branches on the enum and its stable `code()`.

use serde::Serialize;

/// Why a factory's credentials were not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthRejection {
    /// Name or crypt is not well-formed.
    MalformedRequest,
    UnknownFactory,
    FactoryInactive,
    /// No unspent, unexpired nonce was issued to this factory.
    NoActiveNonce,
    PasswordMismatch,
}

impl AuthRejection {
    pub fn message(self) -> &'static str {
        match self {
            AuthRejection::MalformedRequest => "Malformed factory name or crypt.",
            AuthRejection::UnknownFactory => "Unknown factory",
            AuthRejection::FactoryInactive => "Factory is deactivated.",
            AuthRejection::NoActiveNonce => "No active nonce found.",
            AuthRejection::PasswordMismatch => "Password mismatch.",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            AuthRejection::MalformedRequest => "MALFORMED_REQUEST",
            AuthRejection::UnknownFactory => "UNKNOWN_FACTORY",
            AuthRejection::FactoryInactive => "FACTORY_INACTIVE",
            AuthRejection::NoActiveNonce => "NO_ACTIVE_NONCE",
            AuthRejection::PasswordMismatch => "PASSWORD_MISMATCH",
        }
    }
}

/// The outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// A job was leased and is being returned.
    Ok,
    /// Nothing eligible right now. Not an error.
    NoMatch,
    Rejected(AuthRejection),
}

impl PollStatus {
    pub fn message(self) -> &'static str {
        match self {
            PollStatus::Ok => "OK",
            PollStatus::NoMatch => "No matching request.",
            PollStatus::Rejected(reason) => reason.message(),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            PollStatus::Ok => "OK",
            PollStatus::NoMatch => "NO_MATCH",
            PollStatus::Rejected(reason) => reason.code(),
        }
    }
}

impl From<AuthRejection> for PollStatus {
    fn from(reason: AuthRejection) -> Self {
        PollStatus::Rejected(reason)
    }
}
