//! ReasoningProvider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core to decouple the
//! codebase from the specific LLM library. The call contract is a single
//! synchronous completion over an ordered message list.

pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the reasoning provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// One message of a completion prompt.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Trait for LLM-backed completions.
///
/// Implementations handle client construction and the provider call;
/// response interpretation stays with the caller.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Run one completion over the ordered message list and return the
    /// raw response text.
    async fn completions(&self, messages: &[Message]) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_roles() {
        let system = Message::system("You summarise diffs.");
        let user = Message::user("Here is a diff.");
        assert_eq!(system.role, Role::System);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "Here is a diff.");
    }
}
