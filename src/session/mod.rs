//! Per-destination session state
//!
//! Each destination (hostname) gets one [`Session`] holding its cookies and a
//! usage counter. The crawler injects the session's cookies into outgoing
//! requests and merges cookies returned by the fetcher back into the pool.

mod cookie;
mod pool;

pub use cookie::Cookie;
pub use pool::{Session, SessionPool, SessionPoolStats, SharedSession};
