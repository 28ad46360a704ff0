//! Twitter v1.1-shaped wire types, the endpoint registry, and a thin signed
//! HTTP client. This crate knows how to shape and sign one request; the
//! query state machine that drives pagination, dedup, and persistence lives
//! in `twicorder-engine`.
pub mod endpoints;
pub mod twitter;

pub use endpoints::{EndpointSpec, QueryKind, RequestMethod};
pub use twitter::{TwitterClient, TwitterClientError};
