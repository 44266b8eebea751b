//! Configuration for sprig

use crate::handle::Allocation;
use crate::serial::Indent;
use crate::SprigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Sprig Configuration

[output]
# Indentation per nesting level: a string, or a number of spaces
indent = "  "
# Pretty-print by default when printing documents
pretty = true

[handles]
# "sequential" counts up from 1, "random" draws 9-digit ids and retries on collision
allocation = "sequential"
# "cascade" drops handles of a removed element's descendants,
# "detach" keeps them registered (they resolve to the detached elements)
removal = "cascade"

[search]
# "dedupe" reports each match once, "legacy" reproduces the double
# traversal that reports nested matches twice
matches = "dedupe"
"#;

/// Sprig configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub handles: HandleConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub indent: Indent,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandleConfig {
    #[serde(default)]
    pub allocation: Allocation,
    #[serde(default)]
    pub removal: RemovalPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub matches: MatchPolicy,
}

/// What happens to descendant handles when an element is removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Descendant handles are invalidated along with the element
    #[default]
    Cascade,
    /// Only the element's own handle is dropped; descendant handles keep
    /// resolving to the detached subtree
    Detach,
}

/// How multi-result searches treat nested matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Every element is reported at most once, in document order
    #[default]
    Dedupe,
    /// Every element is tested once as a walked node and once as a child of
    /// its parent, so non-root matches are reported twice
    Legacy,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            indent: Indent::default(),
            pretty: default_pretty(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| SprigError::ConfigParse(e.to_string()))
    }

    /// Write [`DEFAULT_CONFIG`] to `path`, refusing to overwrite
    pub fn init(path: &Path) -> crate::Result<()> {
        if path.exists() {
            return Err(SprigError::ConfigExists(path.to_path_buf()));
        }
        std::fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    pub fn with_indent(mut self, indent: impl Into<Indent>) -> Self {
        self.output.indent = indent.into();
        self
    }

    pub fn with_allocation(mut self, allocation: Allocation) -> Self {
        self.handles.allocation = allocation;
        self
    }

    pub fn with_removal(mut self, removal: RemovalPolicy) -> Self {
        self.handles.removal = removal;
        self
    }

    pub fn with_matches(mut self, matches: MatchPolicy) -> Self {
        self.search.matches = matches;
        self
    }
}
