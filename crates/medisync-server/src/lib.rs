//! MediSync HTTP and realtime server.
//!
//! Wires the domain services onto an axum router: patient registration with
//! department queue tokens, operation-theater scheduling, pharmacy inventory,
//! departments, staff accounts and a WebSocket feed of entity changes.

pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod populate;
pub mod realtime;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage_adapter;

pub use config::AppConfig;
pub use observability::init_tracing;
pub use server::{AppState, MedisyncServer, ServerBuilder, ServerError, build_app};
