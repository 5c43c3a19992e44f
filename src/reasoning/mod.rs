//! Reasoning service: bounded prompt construction, the completion call,
//! and tolerant parsing of the model response.
//!
//! The service is total: whatever happens — empty input, a failed call,
//! a malformed response — the caller receives a fully-populated
//! [`ReasoningResult`], with failures degraded into the summary field.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::ReasoningResult;
use crate::providers::{Message, ReasoningProvider};

/// Built-in system instruction, used when no template file is supplied.
const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a senior business analyst reviewing source-code changes. \
Given the code diffs and commit messages of a merge request, infer the \
underlying business intent of the change. Respond with a single JSON \
object with the fields \"summary\" (one or two sentences describing the \
business purpose), \"categories\" (a list of short tags), and \
\"details\" (a list of objects with \"area\" and \"change\" fields). \
Respond with JSON only.";

/// Built-in user template. `{diffs_text}` and `{commits_text}` are
/// interpolated at call time.
const DEFAULT_USER_PROMPT: &str = "\
## Code changes\n\n{diffs_text}\n\n## Commit messages\n\n{commits_text}\n";

/// Errors while loading a prompt-template file.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("failed to read template file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse template file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml_ng::Error,
    },
}

/// The two-message prompt template. The exact wording is an operator
/// concern; only the interpolation placeholders are contractual.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplates {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Deserialize)]
struct TemplateFile {
    business_reasoning_prompt: PromptTemplates,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Load templates from a YAML file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: TemplateFile =
            serde_yaml_ng::from_str(&content).map_err(|source| TemplateError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(file.business_reasoning_prompt)
    }

    /// Load from the optional override path, or fall back to the
    /// built-in template.
    pub fn resolve(path: Option<&Path>) -> Result<Self, TemplateError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Rough token estimate: about four characters per model token. Close
/// enough for an input budget without pulling in a tokenizer.
pub(crate) fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Truncate text to fit a token budget, preserving the prefix and
/// respecting char boundaries.
pub(crate) fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    if estimate_tokens(text) <= max_tokens {
        return text;
    }
    let max_chars = max_tokens * 4;
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Fenced code block, optionally tagged as JSON. The content capture is
/// lazy so trailing prose after the closing fence is ignored.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

/// Strip an optional markdown fence wrapper from a model response.
fn strip_code_fence(text: &str) -> &str {
    match FENCE_RE.captures(text).and_then(|cap| cap.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}

/// Builds the bounded prompt, invokes the LLM, and parses the result.
pub struct ReasoningService {
    provider: Arc<dyn ReasoningProvider>,
    templates: PromptTemplates,
    max_input_tokens: usize,
}

impl ReasoningService {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        templates: PromptTemplates,
        max_input_tokens: usize,
    ) -> Self {
        Self {
            provider,
            templates,
            max_input_tokens,
        }
    }

    /// Derive a structured business summary from diff and commit text.
    ///
    /// Never fails: call errors and unparseable responses degrade to a
    /// fallback result carrying the failure reason in `summary`.
    pub async fn reason(&self, diffs_text: &str, commits_text: &str) -> ReasoningResult {
        if diffs_text.trim().is_empty() {
            return ReasoningResult::fallback("no effective code change", "");
        }

        let diffs = truncate_to_tokens(diffs_text, self.max_input_tokens);
        let commits = if commits_text.trim().is_empty() {
            "none"
        } else {
            commits_text
        };

        let user = self
            .templates
            .user_prompt
            .replace("{diffs_text}", diffs)
            .replace("{commits_text}", commits);
        let messages = [
            Message::system(self.templates.system_prompt.clone()),
            Message::user(user),
        ];

        let raw = match self.provider.completions(&messages).await {
            Ok(raw) => raw,
            Err(err) => {
                error!(%err, "reasoning call failed");
                return ReasoningResult::fallback(format!("reasoning call failed: {err}"), "");
            }
        };

        parse_response(&raw)
    }
}

/// Parse the model's raw text into a [`ReasoningResult`].
///
/// Tolerates a fenced wrapper and normalizes the `categories` and
/// `details` fields; anything that is not a top-level JSON object
/// degrades to a fallback result that preserves the raw text for
/// diagnostic display.
fn parse_response(raw: &str) -> ReasoningResult {
    let candidate = strip_code_fence(raw.trim());

    let parsed: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "reasoning response is not valid JSON");
            return ReasoningResult::fallback(
                format!("response parse failed: {err}"),
                candidate,
            );
        }
    };

    let Value::Object(map) = parsed else {
        return ReasoningResult::fallback("unexpected response shape", candidate);
    };

    let summary = match map.get("summary").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "unable to parse".to_string(),
    };

    let categories = match map.get("categories") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    let details = match map.get("details") {
        Some(Value::Array(items)) => {
            serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "[]".to_string(),
    };

    ReasoningResult {
        summary,
        categories,
        details,
        raw: candidate.to_string(),
    }
}
