//! hostrelay is a single-upstream streaming HTTP reverse proxy.
//!
//! It accepts every inbound request on one listener, rewrites its target
//! to a single fixed upstream origin, collapses a repeated
//! `Authorization` header to its first value, and streams the upstream's
//! response back unmodified. Upstream failures become `502 Bad Gateway`;
//! a missed header deadline becomes `504 Gateway Timeout`.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Configuration loading and validation via the
//!   [`ConfigSource`](config::ConfigSource) trait, and the immutable
//!   [`ForwardingRule`](config::rule::ForwardingRule).
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` handler for the admin listener.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Request director, header rules, forwarding engine, and the
//!   upstream transport seam.
//! - [`server`] -- Axum routers, shared application state, and graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;
