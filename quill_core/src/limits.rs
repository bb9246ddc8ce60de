//! Context-window sizes keyed by model identifier.

/// Applied when a model id is not in the table.
pub const DEFAULT_TOKEN_LIMIT: u64 = 1_048_576;

/// Token budget of a model's context window.
///
/// Versioned ids (`-001`, `-latest`) share their family's limit, so the
/// lookup matches on prefix.
#[must_use]
pub fn token_limit(model: &str) -> u64 {
    if model.starts_with("gemini-1.5-pro") {
        2_097_152
    } else if model.starts_with("gemini-1.5-flash")
        || model.starts_with("gemini-2.0-flash")
        || model.starts_with("gemini-2.5-pro")
        || model.starts_with("gemini-2.5-flash")
    {
        1_048_576
    } else {
        DEFAULT_TOKEN_LIMIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models() {
        assert_eq!(token_limit("gemini-1.5-pro"), 2_097_152);
        assert_eq!(token_limit("gemini-2.5-flash"), 1_048_576);
    }

    #[test]
    fn versioned_ids_share_family_limit() {
        assert_eq!(token_limit("gemini-1.5-pro-latest"), 2_097_152);
        assert_eq!(token_limit("gemini-2.0-flash-001"), 1_048_576);
    }

    #[test]
    fn unknown_model_uses_default() {
        assert_eq!(token_limit("some-future-model"), DEFAULT_TOKEN_LIMIT);
    }
}
