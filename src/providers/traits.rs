use async_trait::async_trait;

use crate::error::Result;

/// Opaque text-completion capability.
///
/// One prompt in, one piece of generated text out. Callers pass the sampling
/// temperature and output cap per request; everything else (backend, model,
/// transport, timeout) is the implementation's business. The agent never
/// assumes which backend sits behind this.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f64, max_tokens: u32) -> Result<String>;
}
