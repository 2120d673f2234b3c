//! Configuration Module - GC Tuning Parameters
//!
//! Manages all configuration parameters for SGC. The collector never reads
//! module-level statics for tunables; every heap is constructed from an
//! explicit `GcConfig`.

use crate::util::constants::*;

/// Main configuration for the SGC runtime
///
/// Stores all parameters affecting collector behavior. Sizes are per heap;
/// the runtime creates `heap_count` heaps, each with its own four segments.
///
/// # Examples
///
/// ```
/// use sgc::GcConfig;
///
/// // Default configuration
/// let config = GcConfig::default();
/// assert!(config.validate().is_ok());
///
/// // Two small heaps for a test rig
/// let config = GcConfig {
///     heap_count: Some(2),
///     gen0_size: 256 * 1024,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Nursery (Gen0) segment size in bytes per heap
    ///
    /// Default: 1MB
    pub gen0_size: usize,

    /// Intermediate (Gen1) segment size in bytes per heap
    ///
    /// Gen0 survivors are promoted here; promotion fails with OutOfMemory
    /// when this segment cannot accommodate a survivor.
    /// Default: 1MB
    pub gen1_size: usize,

    /// Tenured (Gen2) segment size in bytes per heap
    ///
    /// Default: 2MB
    pub gen2_size: usize,

    /// Large-object segment size in bytes per heap
    ///
    /// Default: 2MB
    pub loh_size: usize,

    /// Objects whose total size (header included) reaches this many bytes
    /// are allocated on the large-object heap
    ///
    /// Default: 85 000
    pub large_object_threshold: usize,

    /// Card granule in bytes; one card-table byte covers this many segment
    /// bytes
    ///
    /// Must be at least 64 and a power of two.
    /// Default: 256
    pub card_size_bytes: usize,

    /// Brick granule in bytes; one brick entry covers this many segment
    /// bytes
    ///
    /// Must be a power of two.
    /// Default: 2048
    pub brick_size_bytes: usize,

    /// Thread-local nursery slab size in bytes
    ///
    /// Each mutator thread carves private slabs of this size out of its
    /// home heap's Gen0.
    /// Default: 32KB
    pub tlh_slab_bytes: usize,

    /// Number of heaps
    ///
    /// If None, one heap per logical CPU is created.
    /// Default: None (auto-detect)
    pub heap_count: Option<usize>,

    /// Map mutator threads to heaps by current CPU id
    ///
    /// When true (Linux only), the thread→heap mapping uses
    /// `sched_getcpu() mod heap_count`. When false, or when the CPU id is
    /// unavailable, a portable per-runtime round-robin assignment is used.
    ///
    /// Default: false
    pub numa_aware: bool,

    /// Enable verbose GC pause logging to stderr
    ///
    /// Default: false
    pub verbose: bool,
}

impl Default for GcConfig {
    /// Default configuration, balanced for server-style per-core heaps
    fn default() -> Self {
        GcConfig {
            gen0_size: DEFAULT_GEN0_SIZE,
            gen1_size: DEFAULT_GEN1_SIZE,
            gen2_size: DEFAULT_GEN2_SIZE,
            loh_size: DEFAULT_LOH_SIZE,
            large_object_threshold: DEFAULT_LARGE_OBJECT_THRESHOLD,
            card_size_bytes: DEFAULT_CARD_SIZE,
            brick_size_bytes: DEFAULT_BRICK_SIZE,
            tlh_slab_bytes: DEFAULT_TLH_SLAB_SIZE,
            heap_count: None,
            numa_aware: false,
            verbose: false,
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// Checks that all values are in valid ranges. Returns an error
    /// describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gen0_size == 0 || self.gen1_size == 0 || self.gen2_size == 0 || self.loh_size == 0
        {
            return Err(ConfigError::InvalidSegmentSize(
                "segment sizes must be > 0".to_string(),
            ));
        }

        if self.card_size_bytes < MIN_CARD_SIZE {
            return Err(ConfigError::InvalidCardSize(format!(
                "card_size_bytes must be >= {}",
                MIN_CARD_SIZE
            )));
        }

        if !self.card_size_bytes.is_power_of_two() {
            return Err(ConfigError::InvalidCardSize(
                "card_size_bytes must be a power of two".to_string(),
            ));
        }

        if self.brick_size_bytes == 0 || !self.brick_size_bytes.is_power_of_two() {
            return Err(ConfigError::InvalidBrickSize(
                "brick_size_bytes must be a power of two".to_string(),
            ));
        }

        if self.tlh_slab_bytes == 0 || self.tlh_slab_bytes > self.gen0_size {
            return Err(ConfigError::InvalidTlhSize(
                "tlh_slab_bytes must be > 0 and fit inside gen0_size".to_string(),
            ));
        }

        if self.large_object_threshold == 0 || self.large_object_threshold > self.loh_size {
            return Err(ConfigError::InvalidThreshold(
                "large_object_threshold must be > 0 and fit inside loh_size".to_string(),
            ));
        }

        if let Some(count) = self.heap_count {
            if count == 0 {
                return Err(ConfigError::InvalidHeapCount(
                    "heap_count must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - SGC_GEN0_SIZE, SGC_GEN1_SIZE, SGC_GEN2_SIZE, SGC_LOH_SIZE
    /// - SGC_HEAP_COUNT
    /// - SGC_CARD_SIZE, SGC_BRICK_SIZE, SGC_TLH_SLAB
    /// - SGC_VERBOSE
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let read = |name: &str| -> Option<usize> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        };

        if let Some(v) = read("SGC_GEN0_SIZE") {
            config.gen0_size = v;
        }
        if let Some(v) = read("SGC_GEN1_SIZE") {
            config.gen1_size = v;
        }
        if let Some(v) = read("SGC_GEN2_SIZE") {
            config.gen2_size = v;
        }
        if let Some(v) = read("SGC_LOH_SIZE") {
            config.loh_size = v;
        }
        if let Some(v) = read("SGC_HEAP_COUNT") {
            config.heap_count = Some(v);
        }
        if let Some(v) = read("SGC_CARD_SIZE") {
            config.card_size_bytes = v;
        }
        if let Some(v) = read("SGC_BRICK_SIZE") {
            config.brick_size_bytes = v;
        }
        if let Some(v) = read("SGC_TLH_SLAB") {
            config.tlh_slab_bytes = v;
        }
        if let Ok(v) = std::env::var("SGC_VERBOSE") {
            config.verbose = v == "1" || v.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Number of heaps to create, resolving the auto-detect default
    pub fn resolved_heap_count(&self) -> usize {
        self.heap_count.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid segment size: {0}")]
    InvalidSegmentSize(String),

    #[error("Invalid card size: {0}")]
    InvalidCardSize(String),

    #[error("Invalid brick size: {0}")]
    InvalidBrickSize(String),

    #[error("Invalid TLH size: {0}")]
    InvalidTlhSize(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Invalid heap count: {0}")]
    InvalidHeapCount(String),
}

impl From<ConfigError> for crate::error::GcError {
    fn from(err: ConfigError) -> Self {
        crate::error::GcError::Configuration(err.to_string())
    }
}
