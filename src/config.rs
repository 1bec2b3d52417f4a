//! Configuration for AtlasDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::schema::Schema;

/// Main configuration for an AtlasDB store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// The single file backing the store. A sibling `{path}.compact` file
    /// exists only while a compaction is in progress.
    pub path: PathBuf,

    /// Sync strategy: how often to fsync the log
    pub sync_strategy: SyncStrategy,

    /// Stale log frames tolerated before an automatic compaction (0 = never)
    pub compaction_threshold: usize,

    // -------------------------------------------------------------------------
    // Schema Configuration
    // -------------------------------------------------------------------------
    /// Bucket declarations registered at open time
    pub schemas: Vec<Schema>,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced frames (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./atlas.db"),
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            compaction_threshold: 1024,
            schemas: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the automatic compaction threshold (stale frames, 0 disables)
    pub fn compaction_threshold(mut self, frames: usize) -> Self {
        self.config.compaction_threshold = frames;
        self
    }

    /// Register a bucket schema
    pub fn schema(mut self, schema: Schema) -> Self {
        self.config.schemas.push(schema);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
