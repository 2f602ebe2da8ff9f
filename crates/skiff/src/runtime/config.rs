//! Runtime configuration.

use skiff_common::{SkiffError, SkiffResult};
use skiff_network::Ipv4Cidr;

/// Variable scaling the start timeout of containers running under a debugger.
pub const START_TIMEOUT_FACTOR_VAR: &str = "DEBUG_START_TIMEOUT_FACTOR";

/// Variable listing network ranges the subnet allocator must never hand out.
pub const RESERVED_NETWORKS_VAR: &str = "RESERVED_NETWORKS";

/// Runtime configuration options.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Raw start timeout factor, parsed when debug mode is set up.
    pub start_timeout_factor: Option<String>,
    /// Ranges excluded from subnet allocation.
    pub reserved_networks: Vec<Ipv4Cidr>,
    /// Follow the container log stream instead of reading it once.
    pub log_follow: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            start_timeout_factor: None,
            reserved_networks: Vec::new(),
            log_follow: true,
        }
    }
}

impl RuntimeConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when `RESERVED_NETWORKS` holds an entry that is not a CIDR.
    pub fn from_env() -> SkiffResult<Self> {
        let mut config = Self::default();

        if let Ok(factor) = std::env::var(START_TIMEOUT_FACTOR_VAR) {
            if !factor.is_empty() {
                config.start_timeout_factor = Some(factor);
            }
        }

        if let Ok(reserved) = std::env::var(RESERVED_NETWORKS_VAR) {
            config.reserved_networks = parse_reserved(&reserved)?;
        }

        Ok(config)
    }

    /// Set the start timeout factor.
    #[must_use]
    pub fn with_start_timeout_factor(mut self, factor: impl Into<String>) -> Self {
        self.start_timeout_factor = Some(factor.into());
        self
    }

    /// Set the reserved network ranges.
    #[must_use]
    pub fn with_reserved_networks(mut self, reserved: impl IntoIterator<Item = Ipv4Cidr>) -> Self {
        self.reserved_networks = reserved.into_iter().collect();
        self
    }

    /// Read the log stream once instead of following it.
    #[must_use]
    pub const fn without_log_follow(mut self) -> Self {
        self.log_follow = false;
        self
    }
}

/// Parse a comma separated list of CIDR ranges, skipping empty entries.
///
/// # Errors
///
/// Returns [`SkiffError::Config`] naming the first entry that does not parse.
pub fn parse_reserved(value: &str) -> SkiffResult<Vec<Ipv4Cidr>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse().map_err(|e| SkiffError::Config {
                message: format!("{RESERVED_NETWORKS_VAR}: parse reserved network '{entry}': {e}"),
            })
        })
        .collect()
}
