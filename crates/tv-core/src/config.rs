//! Check configuration.

/// Default cap on ingested trace length. Pairwise properties are quadratic,
/// so traces are expected to stay in the tens to low thousands of entries.
pub const ENTRIES_MAX_DEFAULT: usize = 4096;

/// Configuration for one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    /// Run the validity checker before the property library.
    pub check_validity: bool,
    /// Maximum number of steps between a blocked entry and its completion.
    /// `None` keeps liveness existence-only.
    pub liveness_bound: Option<usize>,
    /// Reject traces with more entries than this.
    pub max_entries: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_validity: true,
            liveness_bound: None,
            max_entries: ENTRIES_MAX_DEFAULT,
        }
    }
}

impl CheckConfig {
    /// Properties only; skip the interleaving check.
    #[must_use]
    pub fn properties_only() -> Self {
        Self {
            check_validity: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_liveness_bound(mut self, steps: usize) -> Self {
        debug_assert!(steps > 0, "liveness bound must be positive");
        self.liveness_bound = Some(steps);
        self
    }

    /// Defaults overridden by `TV_LIVENESS_BOUND` and `TV_MAX_ENTRIES`.
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(bound) = env_usize("TV_LIVENESS_BOUND") {
            config.liveness_bound = Some(bound);
        }
        if let Some(max) = env_usize("TV_MAX_ENTRIES") {
            config.max_entries = max;
        }
        config
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckConfig::default();
        assert!(config.check_validity);
        assert_eq!(config.liveness_bound, None);
        assert_eq!(config.max_entries, ENTRIES_MAX_DEFAULT);
    }

    #[test]
    fn test_presets() {
        assert!(!CheckConfig::properties_only().check_validity);
        assert_eq!(
            CheckConfig::default().with_liveness_bound(8).liveness_bound,
            Some(8)
        );
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("TV_LIVENESS_BOUND", "12");
        std::env::set_var("TV_MAX_ENTRIES", "not a number");
        let config = CheckConfig::from_env();
        std::env::remove_var("TV_LIVENESS_BOUND");
        std::env::remove_var("TV_MAX_ENTRIES");

        assert_eq!(config.liveness_bound, Some(12));
        assert_eq!(config.max_entries, ENTRIES_MAX_DEFAULT);
        assert!(config.check_validity);
    }
}
