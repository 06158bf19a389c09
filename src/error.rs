//! Error types for the pairing core.

/// Top-level error type for the pairing reward system.
///
/// Expected negotiation outcomes (an invitation timing out or being
/// cancelled) are *not* errors; they are ordinary variants of
/// [`AcceptanceSignal`](crate::gateway::AcceptanceSignal) and
/// [`InviteOutcome`](crate::pairing::InviteOutcome).
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    /// Malformed configuration. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Persistence I/O failure. Fatal during the initial ledger load,
    /// reported (and rolled back) during a single commit.
    #[error("storage error: {0}")]
    Storage(String),

    /// A commit was requested for a member that was never created through
    /// the ledger. Programmer error; correct flows never hit this.
    #[error("no account exists for member {0}")]
    AccountNotFound(String),

    /// Transient platform interaction failure (message gone, member
    /// vanished). Caught at the gateway boundary, never fatal.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PairError>;
