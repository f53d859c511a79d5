use rightsizer_types::{Result, RightsizerError};

use crate::{AnthropicAdapter, DynProvider};

/// Shorthand model aliases accepted on the command line.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("claude", "claude-sonnet-4-5-20250929"),
    ("haiku", "claude-haiku-4-5-20251001"),
];

/// Resolve a model alias to a full model id. Unknown names pass through
/// unchanged so callers can hand over a full id directly.
pub fn resolve_model(name: &str) -> String {
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, id)| (*id).to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Construct a provider by name, pulling credentials from the environment.
pub fn provider_from_env(name: &str) -> Result<DynProvider> {
    match name {
        "anthropic" => Ok(DynProvider::new(AnthropicAdapter::from_env()?)),
        other => Err(RightsizerError::Config(format!(
            "unknown inference provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolves_to_full_id() {
        assert_eq!(resolve_model("claude"), "claude-sonnet-4-5-20250929");
        assert_eq!(resolve_model("haiku"), "claude-haiku-4-5-20251001");
    }

    #[test]
    fn full_id_passes_through() {
        assert_eq!(
            resolve_model("claude-sonnet-4-5-20250929"),
            "claude-sonnet-4-5-20250929"
        );
        assert_eq!(resolve_model("some-future-model"), "some-future-model");
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let err = provider_from_env("mistral").unwrap_err();
        assert!(matches!(err, RightsizerError::Config(_)));
    }
}
