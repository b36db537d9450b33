use serde_json::Value;

use crate::{PinyaService, Result, retrieve::ScoredRecord};
use pinya_domain::format;
use pinya_providers::chat;

const NO_CONTEXT: &str = "No database context available.";

impl PinyaService {
	/// Composes the answer text. Output is model-dependent; only coordinate emphasis is applied
	/// afterwards.
	pub async fn generate(&self, question: &str, context: &[ScoredRecord]) -> Result<String> {
		let messages = answer_messages(&self.cfg, question, context);
		let llm = &self.cfg.providers.llm;
		let raw =
			crate::with_timeout("answer", llm.timeout_ms, self.providers.chat.complete(llm, &messages))
				.await?;

		Ok(format::emphasize_coordinates(&raw))
	}
}

pub fn answer_messages(
	cfg: &pinya_config::Config,
	question: &str,
	context: &[ScoredRecord],
) -> Vec<Value> {
	let system = system_prompt(&cfg.answer, !context.is_empty());
	let user = format!("Context:\n{}\n\nUser's Question: {question}", context_block(context));

	vec![chat::message("system", system), chat::message("user", user)]
}

fn context_block(context: &[ScoredRecord]) -> String {
	if context.is_empty() {
		return NO_CONTEXT.to_string();
	}

	context
		.iter()
		.map(|record| {
			let mut entry = format!("Topic: {}\nContent: {}", record.topic, record.content);

			if record.is_spoiler() {
				entry.push_str("\nNote: This entry is a spoiler. Wrap its details in ||spoiler|| markup.");
			}

			entry
		})
		.collect::<Vec<_>>()
		.join("\n\n")
}

fn system_prompt(cfg: &pinya_config::Answer, has_context: bool) -> String {
	let name = cfg.assistant_name.as_str();
	let domain = cfg.domain.as_str();
	let refusal = cfg.refusal_text.as_str();
	let mode = if has_context {
		"Use the provided context to answer.".to_string()
	} else {
		format!("Use your general knowledge about {domain} to answer.")
	};

	format!(
		"You are {name}, a helpful assistant for a {domain} community.

Task:
1. {mode}
2. LANGUAGE MATCHING (STRICT):
   - Mirror the language of the \"User's Question\". An English question gets an English reply; a \
Tagalog or Taglish question gets a Tagalog or Taglish reply.
   - Do not let the language of the Context change the reply language.
3. ANSWERING STRATEGY:
   - Prioritize the Context. If it contains any relevant information, use it, even if partial.
   - If the Context is missing or irrelevant, use general knowledge only when you are reasonably \
confident (about 60%).
   - Reply \"{refusal}\" only when the Context is useless and you do not know the answer.
   - Never claim a stored source when no Context was provided.
4. FORMATTING (RAW MARKDOWN):
   - Bold: `**text**`. Italics: `*text*`.
   - Code: `` `text` `` inline or ``` blocks for multiple lines.
   - Lists: `- Item` or `1. Item`.
   - Links: `[Link Text](URL)`. Never paste raw URLs.
   - Blockquotes: `> Text` for tips or notes.
   - Spoilers: `||Hidden Text||`.
   - Headers: `## Title` or `**TITLE**` only. Never `# Title`.
   - Bold important locations and items, e.g. **Riverside**, **Hammer**.
   - Keep paragraphs short, two or three lines at most."
	)
}
