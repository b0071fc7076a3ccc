pub mod openai_compat;
pub mod traits;

use crate::config::LlmConfig;
use std::sync::Arc;

pub use traits::CompletionProvider;

/// Resolve the API key from config or environment.
///
/// Resolution order: explicit config value, then `TIEKOU_API_KEY`, then the
/// conventional `OPENAI_API_KEY` / `LLM_API_KEY` fallbacks.
fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    for env_var in ["TIEKOU_API_KEY", "OPENAI_API_KEY", "LLM_API_KEY"] {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Build the completion provider from config.
///
/// Every supported backend speaks the OpenAI-compatible chat-completions
/// shape; the base URL decides where it actually goes. A missing key is not
/// an error here: local endpoints don't need one, and a remote endpoint will
/// reject the call at request time, which the perturbation step absorbs.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn CompletionProvider> {
    let api_key = resolve_api_key(config.api_key.as_deref());
    if api_key.is_none() {
        tracing::warn!("no LLM API key configured; tone rewriting will degrade to fixed verdicts");
    }

    Arc::new(openai_compat::OpenAiCompatProvider::new(
        &config.base_url,
        api_key.as_deref(),
        config.model.clone(),
        config.timeout_secs,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins_over_environment() {
        assert_eq!(
            resolve_api_key(Some("  sk-explicit  ")),
            Some("sk-explicit".to_string())
        );
    }

    #[test]
    fn missing_key_still_builds_a_provider() {
        let config = LlmConfig {
            api_key: None,
            base_url: "http://localhost:11434/v1".into(),
            ..LlmConfig::default()
        };
        let _provider = create_provider(&config);
    }
}
