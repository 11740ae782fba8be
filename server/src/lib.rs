//! HRMS server: configuration, HTTP routes and the GraphQL dashboard.

pub mod config;
pub mod graphql;
pub mod http;

pub use config::AppConfig;
pub use http::{AppState, ServeConfig, build_router};
