//! tarwall — adversarial-traffic defense front-end.
//!
//! Exposed as a library so the server binary and the offline
//! `tarwall-train-markov` tool share the same domain modules.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod markov;
pub mod metrics;
pub mod origin;
pub mod scorer;
pub mod state;
pub mod store;
pub mod tarpit;
pub mod traffic;

pub use config::Config;
pub use error::AppError;
pub use traffic::TrafficLog;
