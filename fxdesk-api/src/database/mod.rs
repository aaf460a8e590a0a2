//! Persistence layer: the store abstraction and its backends

pub mod connection;
pub mod memory;
pub mod postgres;
pub mod store;

pub use connection::{initialize_store, DatabaseConfig};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use store::{BrokerageStore, StoreTransaction};
