// SPDX-License-Identifier: MIT
//! Error taxonomy for the engine host.

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Engine binary missing, spawn failed, or the process was not observably
    /// running immediately after launch. Fatal — there is no degraded mode.
    #[error("failed to start engine: {0}")]
    Startup(String),

    /// Terminating the engine process failed at the OS level.
    #[error("failed to stop engine: {0}")]
    Shutdown(#[source] std::io::Error),

    /// The engine answered with a non-success HTTP status.
    #[error("engine returned HTTP {status}: {body}")]
    EngineStatus { status: StatusCode, body: String },

    /// The request never completed at the transport level (connect, reset,
    /// mid-stream failure).
    #[error("could not reach engine at {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A request was issued while no engine session exists.
    #[error("engine is not running")]
    NotRunning,

    /// The engine answered with a success status but the body was not the
    /// expected JSON.
    #[error("malformed engine response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An engine-side error on a completion fetch while no source path is
    /// configured. Almost always a setup problem rather than an engine bug.
    #[error(
        "the engine reported an error while retrieving completions; no source \
         path is configured, which is probably the cause — set `source_path` \
         in the config (or pass --source-path) and restart the server"
    )]
    Misconfiguration(#[source] Box<HostError>),

    /// Uniform go-to-definition failure; the underlying cause is logged, not
    /// surfaced.
    #[error("cannot jump to definition")]
    DefinitionLookup,
}

impl HostError {
    /// True for the error classes that originate from talking to the engine:
    /// a non-success status, a transport failure, or no live session at all.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            HostError::EngineStatus { .. } | HostError::Transport { .. } | HostError::NotRunning
        )
    }
}

/// True when `err` is the connection-refused/reset class that the readiness
/// probe treats as "engine still initializing". Anything else — status
/// errors, decode errors, timeouts — is a real failure and must keep
/// propagating. Do not widen this check; it exists to avoid masking bugs
/// behind a catch-all.
pub fn is_connection_error(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }
    // reqwest wraps hyper wraps std::io; walk the chain for a reset or abort
    // on an established connection.
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            );
        }
        source = cause.source();
    }
    false
}
