//! duenotify: a multi-user task service with deadline reminders.
//!
//! Users register, log in for a bearer token, and manage their own tasks
//! over a JSON HTTP API. Creating a task arms a one-shot reminder that
//! fires once 70% of the time until its deadline has passed.
//!
//! # Architecture
//!
//! - **auth**: bearer-token gate and password hashing
//! - **store**: owner-scoped SQLite persistence for users and tasks
//! - **scheduler**: in-memory delay queue of armed reminders, plus the
//!   timezone-aware reminder renderer
//! - **notify**: reminder senders (SMTP or log-only)
//! - **filter**: day/week/month due-date windows
//! - **server**: axum router and server handle

pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod notify;
pub mod scheduler;
pub mod server;
pub mod store;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
