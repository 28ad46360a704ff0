//! The Twicorder core: Scheduler, Query Exchange, the Query state machine,
//! and their collaborators (Rate-Limit Central, App-Data Store, User Cache,
//! Output Writer).
//!
//! Built on the same generic actor runtime (`actor`, `builder`, `registry`,
//! `supervise`, `system`) the rest of this workspace's actors use: bounded
//! mailboxes addressed through [`Addr`](actor::Addr), cooperative shutdown
//! via a broadcast channel, and a [`Registry`](registry::Registry) for
//! late-bound wiring.

pub mod actor;
pub mod builder;
pub mod exchange;
pub mod output;
pub mod queries;
pub mod query;
pub mod rate_limit;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod supervise;
pub mod system;
pub mod task;
pub mod user_cache;

pub use exchange::QueryExchange;
pub use output::OutputWriter;
pub use query::{Query, QueryError, QueryState};
pub use rate_limit::{RateLimit, RateLimitCentral};
pub use scheduler::Scheduler;
pub use store::AppDataStore;
pub use task::{Task, TaskManager};
pub use user_cache::{CachedUser, UserCache};
