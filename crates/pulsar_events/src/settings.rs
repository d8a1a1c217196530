use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::preprocess::DEFAULT_MAX_LINK_EXPANSIONS;

/// Default deepest sub-event nesting compiled
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 4096;

/// Settings of the events compiler, stored as TOML next to the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CompilerSettings {
    /// Shape of the generated source
    pub output: OutputSettings,
    /// Bounds protecting the compiler from runaway event sheets
    pub limits: LimitSettings,
    /// Profiler instrumentation
    pub profiling: ProfilingSettings,
}

/// Output-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Spaces per indentation level
    pub indent_width: usize,
    /// Comment written at the top of every generated file
    pub header: String,
    /// Name of the generated function running the events
    pub entry_point: String,
}

/// Compilation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Deepest sub-event nesting compiled; deeper events are reported and skipped
    pub max_nesting_depth: usize,
    /// Link events expanded during one preprocessing pass
    pub max_link_expansions: usize,
}

/// Profiling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProfilingSettings {
    /// Wrap every event block with `profiler_begin` / `profiler_end` calls
    pub emit_hooks: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            indent_width: 4,
            header: "// Auto-generated code from Pulsar events".to_string(),
            entry_point: "run_events".to_string(),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_link_expansions: DEFAULT_MAX_LINK_EXPANSIONS,
        }
    }
}

impl CompilerSettings {
    /// Load settings from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read compiler settings {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse compiler settings {}", path.display()))
    }

    /// Load settings from the given path, or return default if not found or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Using default compiler settings: {e:#}");
                Self::default()
            }
        }
    }

    /// Save settings to the given path, creating parent directories if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let toml = toml::to_string_pretty(self).context("Failed to serialize compiler settings")?;
        fs::write(path, toml)
            .with_context(|| format!("Failed to write compiler settings {}", path.display()))
    }

    /// One indentation level of the generated code
    pub fn indent_unit(&self) -> String {
        " ".repeat(self.output.indent_width)
    }
}
