//! Environment variable abstraction for testability.
//!
//! The whole configuration surface of the service is environment-driven
//! (tokens, base URLs, allow-lists), so nearly every component would
//! otherwise be untestable without `unsafe` calls to
//! [`std::env::set_var`]. Production code uses [`Env::real()`]; tests use
//! [`Env::mock()`] backed by a `HashMap`.

use std::collections::HashMap;

/// Environment variable reader.
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Create an `Env` that reads from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Create an `Env` backed by explicit key-value pairs.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Look up an environment variable by name.
    pub fn var(&self, name: &str) -> Result<String, std::env::VarError> {
        match &self.overrides {
            Some(map) => map.get(name).cloned().ok_or(std::env::VarError::NotPresent),
            None => std::env::var(name),
        }
    }

    /// Look up a variable, treating absent and empty values as unset.
    pub fn var_nonempty(&self, name: &str) -> Option<String> {
        self.var(name).ok().filter(|v| !v.is_empty())
    }

    /// Look up a variable, falling back to a default when unset or empty.
    pub fn var_or(&self, name: &str, default: &str) -> String {
        self.var_nonempty(name)
            .unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_env_reads_cargo_manifest_dir() {
        let env = Env::real();
        assert!(env.var("CARGO_MANIFEST_DIR").is_ok());
    }

    #[test]
    fn mock_env_returns_set_values() {
        let env = Env::mock([("GITLAB_ACCESS_TOKEN", "glpat-x"), ("GITLAB_URL", "https://git.example.com")]);
        assert_eq!(env.var("GITLAB_ACCESS_TOKEN").unwrap(), "glpat-x");
        assert_eq!(env.var("GITLAB_URL").unwrap(), "https://git.example.com");
    }

    #[test]
    fn mock_env_returns_not_present_for_missing() {
        let env = Env::mock(Vec::<(&str, &str)>::new());
        assert!(env.var("NONEXISTENT").is_err());
    }

    #[test]
    fn var_nonempty_filters_empty_values() {
        let env = Env::mock([("EMPTY", ""), ("SET", "value")]);
        assert_eq!(env.var_nonempty("EMPTY"), None);
        assert_eq!(env.var_nonempty("SET"), Some("value".to_string()));
    }

    #[test]
    fn var_or_falls_back() {
        let env = Env::mock([("SET", "value")]);
        assert_eq!(env.var_or("SET", "default"), "value");
        assert_eq!(env.var_or("UNSET", "default"), "default");
    }
}
