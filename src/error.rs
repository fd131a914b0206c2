//! Error types for IEC 60870-5-104 protocol.

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for IEC 104 operations.
pub type Result<T> = std::result::Result<T, Iec104Error>;

/// IEC 60870-5-104 protocol error types.
///
/// Uses `Cow<'static, str>` to avoid allocations for static error messages.
#[derive(Debug, Error)]
pub enum Iec104Error {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(Cow<'static, str>),

    /// Not connected to remote
    #[error("Not connected")]
    NotConnected,

    /// Connection timeout
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(Cow<'static, str>),

    /// Invalid frame format
    #[error("Invalid frame: {0}")]
    InvalidFrame(Cow<'static, str>),

    /// Invalid ASDU
    #[error("Invalid ASDU: {0}")]
    InvalidAsdu(Cow<'static, str>),

    /// Declared length out of range, truncated payload, or capacity exceeded
    #[error("Length error: {0}")]
    Length(Cow<'static, str>),

    /// Unknown or unregistered type identifier
    #[error("Unsupported type ID: {0}")]
    UnknownTypeId(u8),

    /// Sequence number mismatch on an inbound I-frame
    #[error("Sequence number mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u16, actual: u16 },

    /// An inbound N(R) acknowledged a sequence number never sent
    #[error("N(R) {nr} acknowledges unsent frame (V(S)={vs})")]
    UnsentAcknowledged { nr: u16, vs: u16 },

    /// T0 timeout (connection establishment / handshake)
    #[error("T0 timeout: handshake not completed")]
    T0Timeout,

    /// T1 timeout (send confirmation)
    #[error("T1 timeout: no confirmation received")]
    T1Timeout,

    /// T2 timeout (acknowledgment hold-off)
    #[error("T2 timeout: acknowledgment hold-off expired")]
    T2Timeout,

    /// T3 timeout (test frame)
    #[error("T3 timeout: connection test failed")]
    T3Timeout,

    /// Too many unconfirmed frames
    #[error("Too many unconfirmed frames (K={0})")]
    TooManyUnconfirmed(u16),

    /// Handshake failed for a reason other than T0 expiry
    #[error("Handshake error: {0}")]
    Handshake(Cow<'static, str>),

    /// Operation attempted after the session closed or failed fatally
    #[error("Session closed: {0}")]
    SessionClosed(Cow<'static, str>),

    /// Server-side connection admission denial
    #[error("Connection rejected by policy: {0}")]
    PolicyViolation(Cow<'static, str>),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(Cow<'static, str>),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(Cow<'static, str>),
}

impl Iec104Error {
    /// Create a protocol error with a static message (zero allocation).
    #[inline]
    pub const fn protocol_static(msg: &'static str) -> Self {
        Self::Protocol(Cow::Borrowed(msg))
    }

    /// Create a protocol error with a dynamic message.
    #[inline]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(Cow::Owned(msg.into()))
    }

    /// Create an invalid frame error with a static message (zero allocation).
    #[inline]
    pub const fn invalid_frame_static(msg: &'static str) -> Self {
        Self::InvalidFrame(Cow::Borrowed(msg))
    }

    /// Create an invalid frame error with a dynamic message.
    #[inline]
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(Cow::Owned(msg.into()))
    }

    /// Create an invalid ASDU error with a static message (zero allocation).
    #[inline]
    pub const fn invalid_asdu_static(msg: &'static str) -> Self {
        Self::InvalidAsdu(Cow::Borrowed(msg))
    }

    /// Create an invalid ASDU error with a dynamic message.
    #[inline]
    pub fn invalid_asdu(msg: impl Into<String>) -> Self {
        Self::InvalidAsdu(Cow::Owned(msg.into()))
    }

    /// Create a length error with a static message (zero allocation).
    #[inline]
    pub const fn length_static(msg: &'static str) -> Self {
        Self::Length(Cow::Borrowed(msg))
    }

    /// Create a length error with a dynamic message.
    #[inline]
    pub fn length(msg: impl Into<String>) -> Self {
        Self::Length(Cow::Owned(msg.into()))
    }

    /// Create a handshake error with a dynamic message.
    #[inline]
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(Cow::Owned(msg.into()))
    }

    /// Create a session-closed error with a dynamic message.
    #[inline]
    pub fn session_closed(msg: impl Into<String>) -> Self {
        Self::SessionClosed(Cow::Owned(msg.into()))
    }

    /// Create a policy violation with a dynamic message.
    #[inline]
    pub fn policy_violation(msg: impl Into<String>) -> Self {
        Self::PolicyViolation(Cow::Owned(msg.into()))
    }

    /// Check if this error indicates a connection problem.
    #[inline]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::NotConnected | Self::ConnectionTimeout | Self::T3Timeout
        )
    }

    /// Check if this error is retryable.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout | Self::T1Timeout | Self::T2Timeout | Self::T3Timeout
        )
    }

    /// Check if this error should terminate the owning session.
    ///
    /// Mirrors the disposition column of the protocol's error taxonomy:
    /// most categories are fatal to the session, while a handful (policy
    /// violations, session-closed, unsupported-type-on-explicit-encode) are
    /// returned to the caller without affecting the session's lifecycle.
    #[inline]
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame(_)
                | Self::InvalidAsdu(_)
                | Self::Length(_)
                | Self::SequenceMismatch { .. }
                | Self::UnsentAcknowledged { .. }
                | Self::T0Timeout
                | Self::T1Timeout
                | Self::Handshake(_)
                | Self::Io(_)
                | Self::Codec(_)
        )
    }
}
