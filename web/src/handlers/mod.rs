//! HTTP request handlers shared by the order API.

pub mod health;
pub mod websocket;

pub use health::{health_check, readiness};
