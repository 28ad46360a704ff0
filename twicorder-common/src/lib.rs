//! Shared error types and observability helpers used across Twicorder crates.
//!
//! This crate is intentionally lightweight: it carries no domain model, only
//! the error taxonomy ([`TwicorderError`], [`Result`]) and the logging
//! bootstrap ([`observability`]) that every other crate in the workspace
//! depends on.

pub mod observability;

/// Error taxonomy shared by every Twicorder component.
///
/// Transport and HTTP-status errors are produced deep inside
/// `twicorder-http`/`twicorder-engine` and surface here only once they cross
/// a component boundary that needs to report them uniformly (logging,
/// query failure bookkeeping). Configuration errors are the only variant
/// that is fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum TwicorderError {
    /// The request never reached the server, or the connection was reset.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server responded, but not with a 2xx status.
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    /// A 200 response body did not match the shape a query expected.
    #[error("parse error: {0}")]
    Parse(String),

    /// Reading or writing the app-data store or output files failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration was missing, malformed, or internally inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`TwicorderError`].
pub type Result<T> = std::result::Result<T, TwicorderError>;
