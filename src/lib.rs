// Library crate shared by the binary and the integration tests.

pub mod config;
pub mod error;
pub mod metrics;
pub mod records;
pub mod routes;
pub mod server;
pub mod state;
