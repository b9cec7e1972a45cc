//! Queue configuration.

/// Configuration for opening an [`crate::OperationQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Whether to create the queue directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to flush and fsync the journal before acknowledging a write.
    pub sync_on_write: bool,

    /// Journal size in bytes above which dead records trigger compaction.
    /// `0` disables automatic compaction.
    pub compact_threshold: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            compact_threshold: 4 * 1024 * 1024, // 4 MB
        }
    }
}

impl QueueConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the queue directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the automatic compaction threshold.
    #[must_use]
    pub const fn compact_threshold(mut self, bytes: u64) -> Self {
        self.compact_threshold = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = QueueConfig::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert!(config.compact_threshold > 0);
    }

    #[test]
    fn builder_pattern() {
        let config = QueueConfig::new()
            .create_if_missing(false)
            .sync_on_write(false)
            .compact_threshold(0);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_write);
        assert_eq!(config.compact_threshold, 0);
    }
}
