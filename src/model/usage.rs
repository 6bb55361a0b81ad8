//! Token usage reported with a session result.

use serde::{Deserialize, Serialize};

/// Token usage statistics from a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Uncached input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Generated output tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Input tokens written to the prompt cache.
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    /// Input tokens served from the prompt cache.
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    /// Input tokens including both cache directions.
    pub fn total_input(&self) -> u64 {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }

    /// All tokens, input and output.
    pub fn total(&self) -> u64 {
        self.total_input() + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total_input() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
            cache_creation_input_tokens: 20,
            cache_read_input_tokens: 30,
        };
        assert_eq!(usage.total_input(), 150);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
            cache_creation_input_tokens: 20,
            cache_read_input_tokens: 30,
        };
        assert_eq!(usage.total(), 200);
    }

    #[test]
    fn test_token_usage_deserializes_with_missing_cache_fields() {
        let usage: TokenUsage =
            serde_json::from_str(r#"{"input_tokens":7,"output_tokens":3}"#).unwrap();
        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.cache_read_input_tokens, 0);
        assert_eq!(usage.total(), 10);
    }
}
