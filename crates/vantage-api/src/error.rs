use std::time::Duration;

use thiserror::Error;

/// Error codes returned by the Host Command service in `R:ERROR` lines.
///
/// The numeric values are fixed by the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorCode {
    InvalidParameter,
    WrongNumberOfParameters,
    Syntax,
    InvalidObject,
    NotImplemented,
    Failed,
    NotConfigured,
    NotInitialized,
    NotSupported,
    ObjectOffline,
    LoginRequired,
    LoginFailed,
    Other(i32),
}

impl CommandErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            4 => Self::InvalidParameter,
            5 => Self::WrongNumberOfParameters,
            6 => Self::Syntax,
            7 => Self::InvalidObject,
            8 => Self::NotImplemented,
            12 => Self::Failed,
            14 => Self::NotConfigured,
            16 => Self::NotInitialized,
            17 => Self::NotSupported,
            20 => Self::ObjectOffline,
            21 => Self::LoginRequired,
            23 => Self::LoginFailed,
            other => Self::Other(other),
        }
    }

    /// Whether this code means the command is unknown to this firmware.
    pub fn means_unsupported(&self) -> bool {
        matches!(
            self,
            Self::NotSupported | Self::NotImplemented | Self::Syntax
        )
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParameter => 4,
            Self::WrongNumberOfParameters => 5,
            Self::Syntax => 6,
            Self::InvalidObject => 7,
            Self::NotImplemented => 8,
            Self::Failed => 12,
            Self::NotConfigured => 14,
            Self::NotInitialized => 16,
            Self::NotSupported => 17,
            Self::ObjectOffline => 20,
            Self::LoginRequired => 21,
            Self::LoginFailed => 23,
            Self::Other(code) => *code,
        }
    }
}

/// Top-level error type for the `vantage-api` crate.
///
/// Covers every failure mode across both protocol channels: connection
/// establishment, authentication, framing, request/response handling, and
/// teardown. `vantage-core` maps these into its own error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connect ─────────────────────────────────────────────────────
    /// Hostname did not resolve.
    #[error("DNS lookup failed for {host}: {message}")]
    Dns { host: String, message: String },

    /// TCP connection could not be established.
    #[error("Failed to connect to {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },

    /// TLS handshake failed.
    #[error("TLS handshake with {host} failed: {message}")]
    TlsHandshake { host: String, message: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Login was rejected. Fatal to the session; never retried.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The service requires a login and no credentials were supplied.
    #[error("Login required, but no credentials were provided")]
    LoginRequired,

    // ── Protocol ────────────────────────────────────────────────────
    /// Malformed frame or unexpected response.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A config-channel frame exceeded the size limit.
    #[error("XML frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// Structured error response from the Host Command service.
    #[error("Command error ({}): {message}", .code.code())]
    Command {
        code: CommandErrorCode,
        message: String,
    },

    // ── Request lifecycle ───────────────────────────────────────────
    /// No response within the bound. The connection is kept open.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The in-flight request was abandoned by a reconnect.
    #[error("Connection lost while request was in flight")]
    Disconnected,

    /// The session is closing.
    #[error("Request cancelled")]
    Cancelled,

    // ── Data ────────────────────────────────────────────────────────
    /// A response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode { message: String },
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is fatal to the session (bad
    /// credentials are never retried).
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. }
                | Self::LoginRequired
                | Self::Command {
                    code: CommandErrorCode::LoginFailed | CommandErrorCode::LoginRequired,
                    ..
                }
        )
    }

    /// Returns `true` if this is a "not found" error (unknown VID).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Command {
                code: CommandErrorCode::InvalidObject | CommandErrorCode::NotConfigured,
                ..
            }
        )
    }

    /// Returns `true` if the caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Dns { .. } | Self::Timeout(_) | Self::Disconnected
        )
    }
}
