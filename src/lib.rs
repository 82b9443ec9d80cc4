// SPDX-License-Identifier: MIT
//! enginehost — supervisor and authenticated HTTP client for a local
//! code-intelligence engine.
//!
//! The engine is an external helper server that answers completion and
//! definition queries over an ephemeral loopback port. This crate owns its
//! lifecycle — spawn, health, restart, log files — and signs every request
//! with a per-session shared secret, so only this host can talk to the
//! engine it started.
//!
//! The entry point is [`CompletionGateway`]: it resolves the engine binary,
//! starts a session, and exposes `fetch_completions` / `go_to_definition`
//! plus the named lifecycle subcommands. The supervisor and signed client
//! underneath are public for callers that need finer control.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod process;
pub mod supervisor;
pub mod wire;

pub use config::HostConfig;
pub use error::{HostError, Result};
pub use gateway::{CompletionGateway, EngineCommand};
pub use wire::{CompletionCandidate, Location, QueryContext};
