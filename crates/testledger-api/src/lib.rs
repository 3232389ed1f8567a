//! Client side of the test-ledger coordination service.
//!
//! [`Coordinator`] is the contract every run depends on: health config,
//! session creation, claiming, completion reporting, status and closure.
//! [`HttpCoordinator`] implements it over HTTP/JSON.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod models;

pub use config::ApiConfig;
pub use coordinator::Coordinator;
pub use error::ApiError;
pub use http::HttpCoordinator;
