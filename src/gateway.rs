// SPDX-License-Identifier: MIT
//! The façade the hosting framework talks to: completion and definition
//! queries plus named lifecycle subcommands, routed to the supervisor and the
//! signed client underneath.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, warn};

use crate::client::EngineClient;
use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::process::{OsSpawner, Spawn};
use crate::supervisor::EngineSupervisor;
use crate::wire::{
    CompletionCandidate, EngineCandidate, EngineDefinition, EngineQuery, Location, QueryContext,
};

/// Named subcommands the framework can route here. The three navigation
/// names all perform the definition lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    GoTo,
    GoToDefinition,
    GoToDeclaration,
    StopServer,
    RestartServer,
}

impl FromStr for EngineCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "goto" => Ok(Self::GoTo),
            "gotodefinition" => Ok(Self::GoToDefinition),
            "gotodeclaration" => Ok(Self::GoToDeclaration),
            "stopserver" => Ok(Self::StopServer),
            "restartserver" => Ok(Self::RestartServer),
            other => Err(format!("unknown engine command: {other}")),
        }
    }
}

pub struct CompletionGateway {
    supervisor: Arc<EngineSupervisor>,
    client: EngineClient,
    source_path_configured: bool,
}

impl CompletionGateway {
    /// Resolve the engine binary from the config, spawn the engine, and
    /// return the gateway. Fails loudly when no binary is configured or the
    /// configured path does not exist — there is no degraded mode.
    pub async fn start(config: &HostConfig) -> Result<Self> {
        Self::start_with_spawner(config, Box::new(OsSpawner)).await
    }

    /// Like [`start`](Self::start), with a custom process spawner.
    pub async fn start_with_spawner(config: &HostConfig, spawner: Box<dyn Spawn>) -> Result<Self> {
        let binary = config.resolve_binary()?;
        if config.source_path.is_none() {
            warn!("no source path configured; engine queries against library sources will fail");
        }

        let supervisor = Arc::new(EngineSupervisor::with_spawner(
            binary,
            config.source_path.clone(),
            config.keep_logfiles,
            spawner,
        ));
        supervisor.start().await?;

        let client = EngineClient::new(Arc::clone(&supervisor));
        Ok(Self {
            supervisor,
            client,
            source_path_configured: config.source_path.is_some(),
        })
    }

    /// Fetch completion candidates at the context's cursor position.
    ///
    /// An engine-side failure with no source path configured is almost always
    /// a setup problem, so it is rewritten into remediation guidance; with a
    /// source path configured the original error passes through.
    pub async fn fetch_completions(&self, ctx: &QueryContext) -> Result<Vec<CompletionCandidate>> {
        let query = EngineQuery::from_context(ctx);
        let response = match self.client.post("/list_completions", &query).await {
            Ok(value) => value,
            Err(e) if e.is_engine_error() && !self.source_path_configured => {
                return Err(HostError::Misconfiguration(Box::new(e)));
            }
            Err(e) => return Err(e),
        };

        let Some(value) = response else {
            // 204: the engine had nothing to offer.
            return Ok(Vec::new());
        };
        let candidates: Vec<EngineCandidate> = serde_json::from_value(value)?;
        Ok(candidates
            .into_iter()
            .map(CompletionCandidate::from_engine)
            .collect())
    }

    /// Resolve the symbol under the cursor to its definition.
    ///
    /// Every failure mode — engine error, empty response, malformed payload —
    /// collapses into one uniform error; the underlying cause is logged here.
    pub async fn go_to_definition(&self, ctx: &QueryContext) -> Result<Location> {
        let query = EngineQuery::from_context(ctx);
        match self.definition_inner(&query).await {
            Ok(location) => Ok(location),
            Err(e) => {
                error!("definition lookup failed: {e}");
                Err(HostError::DefinitionLookup)
            }
        }
    }

    async fn definition_inner(&self, query: &EngineQuery) -> Result<Location> {
        let Some(value) = self.client.post("/find_definition", query).await? else {
            return Err(HostError::DefinitionLookup);
        };
        let definition: EngineDefinition = serde_json::from_value(value)?;
        Ok(Location {
            file_path: definition.file_path,
            line: definition.line,
            column: definition.column + 1,
        })
    }

    /// Route a named subcommand. Navigation commands return a location;
    /// lifecycle commands return `None`.
    pub async fn run_command(
        &self,
        command: EngineCommand,
        ctx: &QueryContext,
    ) -> Result<Option<Location>> {
        match command {
            EngineCommand::GoTo | EngineCommand::GoToDefinition | EngineCommand::GoToDeclaration => {
                self.go_to_definition(ctx).await.map(Some)
            }
            EngineCommand::StopServer => {
                self.supervisor.stop().await?;
                Ok(None)
            }
            EngineCommand::RestartServer => {
                self.supervisor.restart().await?;
                Ok(None)
            }
        }
    }

    /// Stop the engine. Safe to call repeatedly.
    pub async fn shutdown(&self) -> Result<()> {
        self.supervisor.stop().await
    }

    /// Human-readable supervisor snapshot.
    pub async fn debug_info(&self) -> String {
        self.supervisor.debug_info().await
    }

    /// OS-level liveness of the engine process.
    pub async fn is_running(&self) -> bool {
        self.supervisor.is_running().await
    }

    /// Liveness plus a successful health probe.
    pub async fn is_ready(&self) -> Result<bool> {
        self.supervisor.is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_parse_case_insensitively() {
        assert_eq!("GoTo".parse::<EngineCommand>(), Ok(EngineCommand::GoTo));
        assert_eq!(
            "gotodefinition".parse::<EngineCommand>(),
            Ok(EngineCommand::GoToDefinition)
        );
        assert_eq!(
            "GoToDeclaration".parse::<EngineCommand>(),
            Ok(EngineCommand::GoToDeclaration)
        );
        assert_eq!(
            "STOPSERVER".parse::<EngineCommand>(),
            Ok(EngineCommand::StopServer)
        );
        assert_eq!(
            "RestartServer".parse::<EngineCommand>(),
            Ok(EngineCommand::RestartServer)
        );
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = "Reformat".parse::<EngineCommand>().unwrap_err();
        assert!(err.contains("unknown engine command"));
    }
}
