mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Answer, Config, EmbeddingProviderConfig, LlmProviderConfig, Notifications, Postgres,
	Presentation, Providers, Retrieval, Security, Service, Storage, Translation,
};

use std::{fs, path::Path};

/// Answers cite at most this many records.
pub const MAX_TOP_K: u32 = 3;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.postgres.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.postgres.vector_dim."
				.to_string(),
		});
	}

	for (label, timeout_ms) in [
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.llm.timeout_ms", cfg.providers.llm.timeout_ms),
		("notifications.timeout_ms", cfg.notifications.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}
	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("llm", &cfg.providers.llm.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}

	for (label, threshold) in [
		("retrieval.default_threshold", cfg.retrieval.default_threshold),
		("retrieval.duplicate_threshold", cfg.retrieval.duplicate_threshold),
	] {
		if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
			return Err(Error::Validation {
				message: format!("{label} must be in the range (0.0, 1.0]."),
			});
		}
	}

	if !(1..=MAX_TOP_K).contains(&cfg.retrieval.top_k) {
		return Err(Error::Validation {
			message: format!("retrieval.top_k must be between 1 and {MAX_TOP_K}."),
		});
	}

	let on_failure = cfg.translation.on_failure.as_str();

	if !matches!(on_failure, "fail" | "passthrough") {
		return Err(Error::Validation {
			message: "translation.on_failure must be one of fail or passthrough.".to_string(),
		});
	}
	if cfg.translation.enabled && cfg.translation.target_language.trim().is_empty() {
		return Err(Error::Validation {
			message: "translation.target_language must be non-empty when translation is enabled."
				.to_string(),
		});
	}
	if cfg.answer.refusal_text.trim().is_empty() {
		return Err(Error::Validation {
			message: "answer.refusal_text must be non-empty.".to_string(),
		});
	}
	if cfg.presentation.high_confidence > 100 {
		return Err(Error::Validation {
			message: "presentation.high_confidence must be 100 or less.".to_string(),
		});
	}
	if cfg.presentation.medium_confidence >= cfg.presentation.high_confidence {
		return Err(Error::Validation {
			message: "presentation.medium_confidence must be less than presentation.high_confidence."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.notifications.webhook_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false)
	{
		cfg.notifications.webhook_url = None;
	}
	if cfg.translation.source_hint.as_deref().map(|hint| hint.trim().is_empty()).unwrap_or(false)
	{
		cfg.translation.source_hint = None;
	}
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}
	if cfg
		.security
		.admin_auth_token
		.as_deref()
		.map(|token| token.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.security.admin_auth_token = None;
	}
}
