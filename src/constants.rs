//! App-wide constants.
//!
//! Centralises the service name, environment variable names, and built-in
//! defaults so a rename only requires changing this file.

/// Display name of the service (lowercase).
pub const APP_NAME: &str = "whydiff";

/// Default listen port for the webhook server.
pub const DEFAULT_PORT: u16 = 5003;

/// Default SQLite database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/data.db";

/// Default file-extension allow-list (comma-separated).
pub const DEFAULT_EXTENSIONS: &str = ".java,.py,.php";

/// Default maximum reasoning input size, in estimated model tokens.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 10_000;

/// Default base URLs for the hosted platforms. GitLab has no default —
/// self-hosted instances must supply one via env, header, or payload.
pub const DEFAULT_GITHUB_URL: &str = "https://github.com";
pub const DEFAULT_GITEA_URL: &str = "https://gitea.com";


// ── Environment variable names ──────────────────────────────────────

pub const ENV_SUPPORTED_EXTENSIONS: &str = "SUPPORTED_EXTENSIONS";
pub const ENV_MAX_INPUT_TOKENS: &str = "REASONING_MAX_TOKENS";
pub const ENV_PROMPT_FILE: &str = "REASONING_PROMPT_FILE";

pub const ENV_GITLAB_TOKEN: &str = "GITLAB_ACCESS_TOKEN";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_ACCESS_TOKEN";
pub const ENV_GITEA_TOKEN: &str = "GITEA_ACCESS_TOKEN";

pub const ENV_GITLAB_URL: &str = "GITLAB_URL";
pub const ENV_GITHUB_URL: &str = "GITHUB_URL";
pub const ENV_GITEA_URL: &str = "GITEA_URL";

pub const ENV_PROVIDER: &str = "LLM_PROVIDER";
pub const ENV_MODEL: &str = "LLM_MODEL";
pub const ENV_API_KEY: &str = "LLM_API_KEY";
pub const ENV_BASE_URL: &str = "LLM_BASE_URL";
