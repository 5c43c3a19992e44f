//! Service settings resolved from the environment.
//!
//! The entire configuration surface is externally supplied: the extension
//! allow-list, per-platform tokens and base URLs, the reasoning input
//! budget, and the LLM provider selection. Everything is read once at
//! startup through [`Env`] into a typed [`Settings`] value that the rest
//! of the service borrows.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::env::Env;
use crate::models::Platform;

/// Supported LLM provider backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[default]
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    /// Any OpenAI-compatible API (e.g. Ollama, Together, local servers).
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderName::DeepSeek => write!(f, "deepseek"),
            ProviderName::OpenAI => write!(f, "openai"),
            ProviderName::Anthropic => write!(f, "anthropic"),
            ProviderName::OpenAICompatible => write!(f, "openai-compatible"),
        }
    }
}

impl std::str::FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepseek" => Ok(ProviderName::DeepSeek),
            "openai" => Ok(ProviderName::OpenAI),
            "anthropic" => Ok(ProviderName::Anthropic),
            "openai-compatible" => Ok(ProviderName::OpenAICompatible),
            other => Err(format!(
                "unsupported provider: '{other}'. Supported: deepseek, openai, anthropic, \
                 openai-compatible"
            )),
        }
    }
}

impl ProviderName {
    /// Provider-specific environment variable holding the API key.
    ///
    /// These match the env var names used by rig-core's `from_env()`
    /// implementations.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderName::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "OPENAI_API_KEY",
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Default model when `LLM_MODEL` is not set.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderName::DeepSeek => "deepseek-chat",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "gpt-4o",
            ProviderName::Anthropic => "claude-sonnet-4-20250514",
        }
    }
}

/// LLM provider configuration.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderConfig {
    fn from_env(env: &Env) -> Self {
        let name: ProviderName = env
            .var_nonempty(constants::ENV_PROVIDER)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let model = env.var_or(constants::ENV_MODEL, name.default_model());
        let api_key = env
            .var_nonempty(constants::ENV_API_KEY)
            .or_else(|| env.var_nonempty(name.api_key_env_var()));
        let base_url = env.var_nonempty(constants::ENV_BASE_URL);
        Self {
            name,
            model,
            api_key,
            base_url,
        }
    }
}

/// Per-platform access settings.
#[derive(Clone, Debug, Default)]
pub struct PlatformSettings {
    /// Environment-level default access token, overridable per request.
    pub token: Option<String>,
    /// Environment-level default base URL.
    pub base_url: Option<String>,
}

/// Top-level service settings.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Allow-listed file extensions, with the leading dot.
    pub extensions: Vec<String>,
    /// Maximum reasoning input size in estimated model tokens.
    pub max_input_tokens: usize,
    /// Optional prompt-template override file.
    pub prompt_file: Option<PathBuf>,
    pub provider: ProviderConfig,
    gitlab: PlatformSettings,
    github: PlatformSettings,
    gitea: PlatformSettings,
}

impl Settings {
    /// Resolve all settings from the environment.
    pub fn from_env(env: &Env) -> Self {
        let extensions = env
            .var_or(constants::ENV_SUPPORTED_EXTENSIONS, constants::DEFAULT_EXTENSIONS)
            .split(',')
            .map(|ext| ext.trim().to_string())
            .filter(|ext| !ext.is_empty())
            .collect();

        let max_input_tokens = env
            .var_nonempty(constants::ENV_MAX_INPUT_TOKENS)
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_MAX_INPUT_TOKENS);

        Self {
            extensions,
            max_input_tokens,
            prompt_file: env.var_nonempty(constants::ENV_PROMPT_FILE).map(PathBuf::from),
            provider: ProviderConfig::from_env(env),
            gitlab: PlatformSettings {
                token: env.var_nonempty(constants::ENV_GITLAB_TOKEN),
                base_url: env.var_nonempty(constants::ENV_GITLAB_URL),
            },
            github: PlatformSettings {
                token: env.var_nonempty(constants::ENV_GITHUB_TOKEN),
                base_url: Some(env.var_or(constants::ENV_GITHUB_URL, constants::DEFAULT_GITHUB_URL)),
            },
            gitea: PlatformSettings {
                token: env.var_nonempty(constants::ENV_GITEA_TOKEN),
                base_url: Some(env.var_or(constants::ENV_GITEA_URL, constants::DEFAULT_GITEA_URL)),
            },
        }
    }

    /// Access settings for one platform.
    pub fn platform(&self, platform: Platform) -> &PlatformSettings {
        match platform {
            Platform::Gitlab => &self.gitlab,
            Platform::Github => &self.github,
            Platform::Gitea => &self.gitea,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_env() {
        let settings = Settings::from_env(&Env::mock(Vec::<(&str, &str)>::new()));
        assert_eq!(settings.extensions, vec![".java", ".py", ".php"]);
        assert_eq!(settings.max_input_tokens, 10_000);
        assert_eq!(settings.provider.name, ProviderName::DeepSeek);
        assert_eq!(settings.provider.model, "deepseek-chat");
        assert!(settings.platform(Platform::Gitlab).base_url.is_none());
        assert_eq!(
            settings.platform(Platform::Github).base_url.as_deref(),
            Some("https://github.com")
        );
        assert_eq!(
            settings.platform(Platform::Gitea).base_url.as_deref(),
            Some("https://gitea.com")
        );
    }

    #[test]
    fn extension_list_is_split_and_trimmed() {
        let settings = Settings::from_env(&Env::mock([("SUPPORTED_EXTENSIONS", ".rs, .go,")]));
        assert_eq!(settings.extensions, vec![".rs", ".go"]);
    }

    #[test]
    fn token_budget_override() {
        let settings = Settings::from_env(&Env::mock([("REASONING_MAX_TOKENS", "2500")]));
        assert_eq!(settings.max_input_tokens, 2500);
    }

    #[test]
    fn malformed_token_budget_falls_back() {
        let settings = Settings::from_env(&Env::mock([("REASONING_MAX_TOKENS", "lots")]));
        assert_eq!(settings.max_input_tokens, 10_000);
    }

    #[test]
    fn platform_tokens_resolved_per_platform() {
        let settings = Settings::from_env(&Env::mock([
            ("GITLAB_ACCESS_TOKEN", "glpat-x"),
            ("GITEA_ACCESS_TOKEN", "gta-y"),
        ]));
        assert_eq!(settings.platform(Platform::Gitlab).token.as_deref(), Some("glpat-x"));
        assert!(settings.platform(Platform::Github).token.is_none());
        assert_eq!(settings.platform(Platform::Gitea).token.as_deref(), Some("gta-y"));
    }

    #[test]
    fn provider_selection_and_key_fallback() {
        let settings = Settings::from_env(&Env::mock([
            ("LLM_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-abc"),
        ]));
        assert_eq!(settings.provider.name, ProviderName::OpenAI);
        assert_eq!(settings.provider.model, "gpt-4o");
        assert_eq!(settings.provider.api_key.as_deref(), Some("sk-abc"));
    }

    #[test]
    fn generic_api_key_wins_over_provider_specific() {
        let settings = Settings::from_env(&Env::mock([
            ("LLM_API_KEY", "generic"),
            ("DEEPSEEK_API_KEY", "specific"),
        ]));
        assert_eq!(settings.provider.api_key.as_deref(), Some("generic"));
    }

    #[test]
    fn provider_name_parse_roundtrip() {
        for name in ["deepseek", "openai", "anthropic", "openai-compatible"] {
            let parsed: ProviderName = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!("gemini".parse::<ProviderName>().is_err());
    }
}
