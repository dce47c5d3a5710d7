pub mod connection;
pub mod repositories;
pub mod schema;
pub mod store;

pub use connection::{connect, connect_with_settings, ConnectionSettings, DbPool};
pub use store::{ConnectionError, Store};
