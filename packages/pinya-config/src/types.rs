use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub translation: Translation,
	#[serde(default)]
	pub answer: Answer,
	#[serde(default)]
	pub presentation: Presentation,
	#[serde(default)]
	pub notifications: Notifications,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	/// Dimensionality of the `vector` column. Must match the embedding provider output.
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Used when the `ai_threshold` setting has never been written.
	pub default_threshold: f32,
	pub duplicate_threshold: f32,
	pub top_k: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self { default_threshold: 0.5, duplicate_threshold: 0.9, top_k: 3 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Translation {
	pub enabled: bool,
	pub target_language: String,
	/// Either "fail" or "passthrough".
	pub on_failure: String,
	/// Skip the model call when the query is confidently in the target language already.
	pub skip_confident_source: bool,
	/// Free-form hint about the languages users write in.
	pub source_hint: Option<String>,
}
impl Default for Translation {
	fn default() -> Self {
		Self {
			enabled: true,
			target_language: "English".to_string(),
			on_failure: "passthrough".to_string(),
			skip_confident_source: false,
			source_hint: None,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Answer {
	pub assistant_name: String,
	pub domain: String,
	pub refusal_text: String,
}
impl Default for Answer {
	fn default() -> Self {
		Self {
			assistant_name: "PinyaBot".to_string(),
			domain: "Project Zomboid".to_string(),
			refusal_text: "I don't know that yet.".to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Presentation {
	/// Minimum similarity percentage for the high confidence tier.
	pub high_confidence: u32,
	/// Minimum similarity percentage for the medium confidence tier.
	pub medium_confidence: u32,
}
impl Default for Presentation {
	fn default() -> Self {
		Self { high_confidence: 45, medium_confidence: 30 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Notifications {
	pub webhook_url: Option<String>,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}
impl Default for Notifications {
	fn default() -> Self {
		Self { webhook_url: None, timeout_ms: 5_000, default_headers: Map::new() }
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub api_auth_token: Option<String>,
	pub admin_auth_token: Option<String>,
}
