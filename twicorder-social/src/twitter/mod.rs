//! Twitter v1.1 integration surface: wire types plus a thin signed client.
pub mod client;
pub mod types;

pub use client::{TwitterClient, TwitterClientError};
