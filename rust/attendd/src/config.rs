use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "ATTENDD_WORKSPACE";
pub const ENV_SEED: &str = "ATTENDD_SEED";
pub const DEFAULT_LOG_FILTER: &str = "attendd=info";

/// Startup settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub seed_defaults: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            seed_defaults: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let workspace = get(ENV_WORKSPACE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let seed_defaults = get(ENV_SEED)
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);
        Self {
            workspace,
            seed_defaults,
        }
    }
}
