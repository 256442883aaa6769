//! Runtime configuration.
//!
//! A small, typed, read-only view of the options the core consumes at
//! initialization:
//!
//! | key              | type   | default | effect                                     |
//! |------------------|--------|---------|--------------------------------------------|
//! | `node_pool_size` | uint   | 100     | initial node store capacity                |
//! | `output`         | string | `csv`   | metadata writer name; `none` disables      |
//! | `output_dir`     | string | `.`     | directory the CSV writer puts its files in |
//!
//! Each key can be overridden through the process environment
//! (`VERNIER_NODE_POOL_SIZE`, `VERNIER_OUTPUT`, `VERNIER_OUTPUT_DIR`) or
//! programmatically through the builder methods, which tests use.

use std::path::{Path, PathBuf};

/// Default initial capacity of the node store.
pub const DEFAULT_NODE_POOL_SIZE: usize = 100;

/// Default metadata writer name.
pub const DEFAULT_OUTPUT: &str = "csv";

/// Typed runtime options.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    node_pool_size: usize,
    output: String,
    output_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            node_pool_size: DEFAULT_NODE_POOL_SIZE,
            output: DEFAULT_OUTPUT.to_owned(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl RuntimeConfig {
    /// Build a configuration from the defaults plus `VERNIER_*` process
    /// environment overrides. Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("VERNIER_NODE_POOL_SIZE") {
            match raw.parse::<usize>() {
                Ok(value) => config.node_pool_size = value,
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring unparseable VERNIER_NODE_POOL_SIZE");
                }
            }
        }
        if let Ok(value) = std::env::var("VERNIER_OUTPUT") {
            config.output = value;
        }
        if let Ok(value) = std::env::var("VERNIER_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(value);
        }

        config
    }

    /// Override the initial node store capacity.
    #[must_use]
    pub fn with_node_pool_size(mut self, size: usize) -> Self {
        self.node_pool_size = size;
        self
    }

    /// Override the metadata writer name.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Override the writer output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Initial node store capacity.
    #[must_use]
    pub fn node_pool_size(&self) -> usize {
        self.node_pool_size
    }

    /// Configured metadata writer name; `"none"` disables output.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Directory for writer output files.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Log the effective configuration, one line per key.
    pub fn dump(&self) {
        tracing::debug!(node_pool_size = self.node_pool_size, "configuration");
        tracing::debug!(output = %self.output, "configuration");
        tracing::debug!(output_dir = %self.output_dir.display(), "configuration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.node_pool_size(), 100);
        assert_eq!(config.output(), "csv");
        assert_eq!(config.output_dir(), Path::new("."));
    }

    #[test]
    fn builder_overrides() {
        let config = RuntimeConfig::default()
            .with_node_pool_size(16)
            .with_output("none")
            .with_output_dir("/tmp/vernier");

        assert_eq!(config.node_pool_size(), 16);
        assert_eq!(config.output(), "none");
        assert_eq!(config.output_dir(), Path::new("/tmp/vernier"));
    }

    #[test]
    fn env_overrides_apply_and_bad_values_fall_back() {
        std::env::set_var("VERNIER_NODE_POOL_SIZE", "32");
        std::env::set_var("VERNIER_OUTPUT", "none");
        let config = RuntimeConfig::from_env();
        assert_eq!(config.node_pool_size(), 32);
        assert_eq!(config.output(), "none");

        std::env::set_var("VERNIER_NODE_POOL_SIZE", "many");
        let config = RuntimeConfig::from_env();
        assert_eq!(config.node_pool_size(), DEFAULT_NODE_POOL_SIZE);

        std::env::remove_var("VERNIER_NODE_POOL_SIZE");
        std::env::remove_var("VERNIER_OUTPUT");
    }
}
