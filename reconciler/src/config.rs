use snafu::ResultExt;
use std::env;

// Environment variable overriding how many launch resource versions are kept
// by retention cleanup.
const RETAINED_VERSIONS_ENV_VAR: &str = "RETAINED_LAUNCH_VERSIONS";

/// Versions kept by retention cleanup when no override is configured.
pub const DEFAULT_RETAINED_VERSIONS: usize = 10;

/// The module-wide result type.
type Result<T> = std::result::Result<T, config_error::Error>;

/// Configuration threaded into the reconciler at construction time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReconcilerConfig {
    retained_versions: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            retained_versions: DEFAULT_RETAINED_VERSIONS,
        }
    }
}

impl ReconcilerConfig {
    /// Builds a configuration keeping `retained_versions` versions on
    /// retention cleanup. Zero selects the default of
    /// [`DEFAULT_RETAINED_VERSIONS`].
    pub fn new(retained_versions: usize) -> Self {
        if retained_versions == 0 {
            Self::default()
        } else {
            ReconcilerConfig { retained_versions }
        }
    }

    pub fn from_environment() -> Result<Self> {
        match env::var(RETAINED_VERSIONS_ENV_VAR) {
            Err(_) => Ok(Self::default()),
            Ok(value) => {
                let retained = value
                    .parse::<usize>()
                    .context(config_error::InvalidRetainedVersionsSnafu {
                        env_value: value.clone(),
                    })?;
                Ok(Self::new(retained))
            }
        }
    }

    pub fn retained_versions(&self) -> usize {
        self.retained_versions
    }
}

pub mod config_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display(
            "Could not parse retained version count from environment variable '{}={}': '{}'",
            super::RETAINED_VERSIONS_ENV_VAR,
            env_value,
            source
        ))]
        InvalidRetainedVersions {
            source: std::num::ParseIntError,
            env_value: String,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_selects_the_default() {
        assert_eq!(
            ReconcilerConfig::new(0).retained_versions(),
            DEFAULT_RETAINED_VERSIONS
        );
    }

    #[test]
    fn explicit_count_is_kept() {
        assert_eq!(ReconcilerConfig::new(3).retained_versions(), 3);
    }

    #[test]
    fn default_matches_documented_value() {
        assert_eq!(
            ReconcilerConfig::default().retained_versions(),
            DEFAULT_RETAINED_VERSIONS
        );
    }
}
