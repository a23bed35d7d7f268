mod page;
mod routes;

pub mod app;
pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod telemetry;

pub use app::start_app;
