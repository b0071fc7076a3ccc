//! LLM micro-perturbation.
//!
//! The model is kept on a very short leash: it receives the selected mother
//! verdict and may only adjust tone and rhythm. It cannot add information,
//! soften the sentiment, or change the meaning. If the call fails in any way
//! the mother verdict goes out untouched — the caller never sees an error
//! from this step.

use std::sync::Arc;

use crate::features::Features;
use crate::providers::CompletionProvider;
use crate::verdicts::Language;

/// Low randomness keeps the rewrite close to the mother sentence.
const PERTURB_TEMPERATURE: f64 = 0.3;
/// Output cap bounds drift from the mother sentence.
const PERTURB_MAX_TOKENS: u32 = 100;

pub struct Perturbation {
    provider: Arc<dyn CompletionProvider>,
}

impl Perturbation {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Rewrite tone/rhythm of `mother_verdict`, falling back to it verbatim
    /// on any provider failure. Infallible by contract.
    pub async fn perturb(
        &self,
        mother_verdict: &str,
        features: &Features,
        language: Language,
    ) -> String {
        let prompt = build_prompt(mother_verdict, features, language);

        match self
            .provider
            .complete(&prompt, PERTURB_TEMPERATURE, PERTURB_MAX_TOKENS)
            .await
        {
            Ok(raw) => {
                let result = first_line(&raw);
                if result.is_empty() {
                    tracing::warn!("perturbation produced empty output, using mother verdict");
                    return mother_verdict.to_string();
                }
                tracing::info!(from = mother_verdict, to = %result, "perturbed verdict");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "perturbation failed, falling back to mother verdict");
                mother_verdict.to_string()
            }
        }
    }
}

/// Trim and keep only the first line of the raw completion.
fn first_line(raw: &str) -> String {
    raw.trim().lines().next().unwrap_or("").trim().to_string()
}

fn build_prompt(mother_verdict: &str, features: &Features, language: Language) -> String {
    match language {
        Language::Zh => format!(
            "你是语言润色助手。给定一个判词母句，你只能调整语气和节奏。\n\
             \n\
             【严格禁止】\n\
             1. 添加任何新信息\n\
             2. 添加建议或解释\n\
             3. 改变原句的核心含义\n\
             4. 使用温柔或安慰性语气\n\
             5. 添加形容词或副词（除非为了语气）\n\
             \n\
             【允许操作】\n\
             1. 调整语序\n\
             2. 改变停顿节奏（逗号、句号位置）\n\
             3. 调整强硬或柔和的程度\n\
             4. 使用同义替换（不改变含义）\n\
             \n\
             母句：{mother_verdict}\n\
             \n\
             时间：{}点\n\
             尝试次数：{}次\n\
             输入长度：{}字\n\
             \n\
             请根据时间和次数调整语气强度，输出调整后的判词（仅一句话）：",
            features.hour, features.attempt_count, features.char_length
        ),
        Language::En => format!(
            "You are a language polisher. Given a verdict, you can only adjust tone and rhythm.\n\
             \n\
             STRICTLY FORBIDDEN:\n\
             1. Add any new information\n\
             2. Add advice or explanation\n\
             3. Change core meaning\n\
             4. Use gentle or comforting tone\n\
             5. Add adjectives or adverbs (unless for tone)\n\
             \n\
             ALLOWED OPERATIONS:\n\
             1. Adjust word order\n\
             2. Change pause rhythm (comma, period position)\n\
             3. Adjust harshness or softness level\n\
             4. Use synonyms (without changing meaning)\n\
             \n\
             Mother verdict: {mother_verdict}\n\
             \n\
             Time: {}:00\n\
             Attempt count: {}\n\
             Input length: {} chars\n\
             \n\
             Adjust tone based on time and count, output adjusted verdict (one sentence only):",
            features.hour, features.attempt_count, features.char_length
        ),
    }
}
