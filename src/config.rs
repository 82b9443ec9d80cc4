// SPDX-License-Identifier: MIT
//! Host configuration.
//!
//! Layered the usual way: struct defaults, then an optional TOML file, then
//! CLI/env overrides applied by the binary. The library only ever sees the
//! final struct.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HostError, Result};

/// Configuration consumed by [`CompletionGateway::start`].
///
/// [`CompletionGateway::start`]: crate::gateway::CompletionGateway::start
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Path to the engine binary. Required — there is no discovery fallback,
    /// and a missing binary fails the gateway constructor.
    pub engine_binary: Option<PathBuf>,
    /// Directory of extra sources the engine should index, forwarded as
    /// `--extra-source-path`. Without it, queries that need library sources
    /// come back as engine errors.
    pub source_path: Option<PathBuf>,
    /// Keep the engine's stdout/stderr logs after the server stops.
    pub keep_logfiles: bool,
}

impl HostConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HostError::Startup(format!("could not read config {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| HostError::Startup(format!("invalid config {}: {e}", path.display())))
    }

    /// The engine binary to launch. Errors when unconfigured or when the
    /// configured path does not point at a file.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        let Some(ref binary) = self.engine_binary else {
            return Err(HostError::Startup(
                "no engine binary configured; set `engine_binary` in the config or pass \
                 --engine-binary"
                    .into(),
            ));
        };
        if !binary.is_file() {
            return Err(HostError::Startup(format!(
                "engine binary not found at {}",
                binary.display()
            )));
        }
        Ok(binary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_empty() {
        let config = HostConfig::default();
        assert!(config.engine_binary.is_none());
        assert!(config.source_path.is_none());
        assert!(!config.keep_logfiles);
    }

    #[test]
    fn loads_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "engine_binary = \"/opt/engine/bin/engine\"\nkeep_logfiles = true"
        )
        .unwrap();

        let config = HostConfig::load(file.path()).expect("load");
        assert_eq!(
            config.engine_binary,
            Some(PathBuf::from("/opt/engine/bin/engine"))
        );
        assert!(config.source_path.is_none());
        assert!(config.keep_logfiles);
    }

    #[test]
    fn unconfigured_binary_fails_loudly() {
        let err = HostConfig::default().resolve_binary().unwrap_err();
        assert!(err.to_string().contains("no engine binary configured"), "{err}");
    }

    #[test]
    fn missing_binary_path_fails_loudly() {
        let config = HostConfig {
            engine_binary: Some(PathBuf::from("/definitely/not/here")),
            ..HostConfig::default()
        };
        let err = config.resolve_binary().unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[test]
    fn existing_binary_resolves() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = HostConfig {
            engine_binary: Some(file.path().to_path_buf()),
            ..HostConfig::default()
        };
        assert_eq!(config.resolve_binary().expect("resolves"), file.path());
    }
}
