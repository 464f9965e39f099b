//! Connection handling: multiplexed connections and the pool manager.

mod connection;
mod manager;

pub use connection::{Connection, Response};
pub use manager::{ConnectionManager, PreferredNode};
