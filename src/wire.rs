// SPDX-License-Identifier: MIT
//! Wire shapes for the engine HTTP protocol, plus the candidate mapping the
//! gateway hands back to callers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A completion/definition request from the hosting framework: a 1-based
/// cursor position plus the full contents of every open buffer.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub file_path: String,
    /// Buffer contents keyed by file path.
    pub buffers: HashMap<String, String>,
    /// 1-based.
    pub line: u32,
    /// 1-based.
    pub column: u32,
}

/// Request body for `/list_completions` and `/find_definition`.
#[derive(Debug, Serialize)]
pub struct EngineQuery {
    pub buffers: Vec<EngineBuffer>,
    pub line: u32,
    /// 0-based on the wire.
    pub column: u32,
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct EngineBuffer {
    pub file_path: String,
    pub contents: String,
}

impl EngineQuery {
    /// Translate a framework request into the engine's shape: the buffer map
    /// flattened to a list, the column shifted to 0-based.
    pub fn from_context(ctx: &QueryContext) -> Self {
        let buffers = ctx
            .buffers
            .iter()
            .map(|(path, contents)| EngineBuffer {
                file_path: path.clone(),
                contents: contents.clone(),
            })
            .collect();
        Self {
            buffers,
            line: ctx.line,
            column: ctx.column.saturating_sub(1),
            file_path: ctx.file_path.clone(),
        }
    }
}

/// One completion as the engine reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineCandidate {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// Definition result from `/find_definition`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineDefinition {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

/// A source location with 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

/// A completion candidate in the shape callers consume. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionCandidate {
    /// Text to insert.
    pub text: String,
    /// Engine kind tag ("Function", "Struct", ...).
    pub kind: String,
    /// Human-readable context shown next to the candidate.
    pub context: String,
    /// Where the candidate is declared, when the engine reports a usable
    /// position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl CompletionCandidate {
    /// Map an engine candidate. A location is attached only when path, line,
    /// and column are all non-empty/non-zero; the engine's 0-based column
    /// becomes 1-based. Note that column 0 therefore never yields a location,
    /// even though it is a valid engine position.
    pub fn from_engine(candidate: EngineCandidate) -> Self {
        let location = if !candidate.file_path.is_empty()
            && candidate.line != 0
            && candidate.column != 0
        {
            Some(Location {
                file_path: candidate.file_path,
                line: candidate.line,
                column: candidate.column + 1,
            })
        } else {
            None
        };
        Self {
            text: candidate.text,
            kind: candidate.kind,
            context: candidate.context,
            location,
        }
    }
}
