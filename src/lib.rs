// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Core broadcast layer
pub mod connection_manager;
pub mod notification;
pub mod subscriber;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
pub mod websocket;

// Supporting modules
pub mod shutdown;
pub mod tasks;
