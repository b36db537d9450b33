use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, PinyaService, Result};
use pinya_domain::language;
use pinya_providers::chat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationSource {
	/// The model produced the text.
	Model,
	/// Translation is disabled.
	Disabled,
	/// The query was already confidently in the target language.
	AlreadyTarget,
	/// The model call failed and the untranslated text was kept.
	Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
	pub text: String,
	pub source: TranslationSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
	Fail,
	Passthrough,
}
impl FailurePolicy {
	pub fn from_config(raw: &str) -> Self {
		if raw.trim().eq_ignore_ascii_case("fail") { Self::Fail } else { Self::Passthrough }
	}
}

impl PinyaService {
	/// Rewrites a query into the retrieval language. Never answers it.
	pub async fn translate_query(&self, text: &str) -> Result<Translation> {
		let cfg = &self.cfg.translation;

		if !cfg.enabled {
			return Ok(Translation { text: text.to_string(), source: TranslationSource::Disabled });
		}
		if cfg.skip_confident_source
			&& let Some(target) = language::resolve_language(&cfg.target_language)
			&& language::is_confidently_in(text, target)
		{
			return Ok(Translation {
				text: text.to_string(),
				source: TranslationSource::AlreadyTarget,
			});
		}

		let messages = translation_messages(&self.cfg, text);
		let llm = &self.cfg.providers.llm;
		let result = crate::with_timeout(
			"translation",
			llm.timeout_ms,
			self.providers.chat.complete(llm, &messages),
		)
		.await
		.and_then(translated_text);

		match (result, FailurePolicy::from_config(&cfg.on_failure)) {
			(Ok(translated), _) =>
				Ok(Translation { text: translated, source: TranslationSource::Model }),
			(Err(err), FailurePolicy::Fail) => {
				tracing::error!(error = %err, "Translation failed; failing the query.");

				Err(err)
			},
			(Err(err), FailurePolicy::Passthrough) => {
				tracing::warn!(error = %err, "Translation failed; falling back to original query.");

				Ok(Translation { text: text.to_string(), source: TranslationSource::Passthrough })
			},
		}
	}
}

/// Model output with surrounding whitespace removed. Blank output counts as a failed call.
fn translated_text(raw: String) -> Result<String> {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return Err(Error::Provider {
			message: "Translation model returned empty text.".to_string(),
		});
	}

	Ok(trimmed.to_string())
}

pub fn translation_messages(cfg: &pinya_config::Config, text: &str) -> Vec<Value> {
	let target = cfg.translation.target_language.as_str();
	let hint = cfg
		.translation
		.source_hint
		.as_deref()
		.map(|hint| format!(" The input is likely in {hint}."))
		.unwrap_or_default();
	let system = format!(
		"You are a translator for the {domain} community. Translate the following {domain} \
		 related query to {target}.{hint} Do not answer the question. Return ONLY the {target} \
		 translation.",
		domain = cfg.answer.domain,
	);

	vec![chat::message("system", system), chat::message("user", text)]
}
