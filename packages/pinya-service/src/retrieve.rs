use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, PinyaService, Result};
use pinya_domain::{retrieval, settings};
use pinya_storage::{knowledge, models::KnowledgeMatch};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredRecord {
	pub record_id: Uuid,
	pub topic: String,
	pub content: String,
	pub metadata: Value,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub similarity: f32,
}
impl ScoredRecord {
	pub fn is_spoiler(&self) -> bool {
		self.metadata.get("is_spoiler").and_then(Value::as_bool).unwrap_or(false)
	}

	pub fn author_id(&self) -> Option<String> {
		metadata_id(&self.metadata, "author_id")
	}
}
impl From<KnowledgeMatch> for ScoredRecord {
	fn from(row: KnowledgeMatch) -> Self {
		Self {
			record_id: row.record_id,
			topic: row.topic,
			content: row.content,
			metadata: row.metadata,
			created_at: row.created_at,
			similarity: row.similarity,
		}
	}
}

impl PinyaService {
	/// Records with similarity strictly above `threshold`, best first, at most `retrieval.top_k`.
	pub async fn search(&self, query_text: &str, threshold: f32) -> Result<Vec<ScoredRecord>> {
		let threshold = retrieval::validate_threshold(threshold).map_err(|_| {
			Error::InvalidRequest {
				message: "threshold must be in the range (0.0, 1.0].".to_string(),
			}
		})?;
		let vector = self.embed_one(query_text).await?;
		let limit = self.cfg.retrieval.top_k as usize;
		let rows = knowledge::search(&self.db.pool, &vector, threshold, limit as i64).await?;
		// Rows arrive in insertion order on ties; the stable re-sort keeps that order.
		let records = rows.into_iter().map(ScoredRecord::from).collect();

		Ok(retrieval::select_matches(records, threshold, limit, |record| record.similarity))
	}

	/// The operator threshold for live questions, falling back to the configured default.
	pub fn live_threshold(&self) -> f32 {
		settings::threshold_or(
			self.settings.get(settings::AI_THRESHOLD).as_deref(),
			self.cfg.retrieval.default_threshold,
		)
	}

	pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let mut vectors = self.embed_many(std::slice::from_ref(&text.to_string())).await?;

		vectors.pop().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})
	}

	pub(crate) async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let cfg = &self.cfg.providers.embedding;
		let vectors = crate::with_timeout(
			"embedding",
			cfg.timeout_ms,
			self.providers.embedding.embed(cfg, texts),
		)
		.await?;
		let expected = self.cfg.storage.postgres.vector_dim as usize;

		if vectors.len() != texts.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					vectors.len(),
					texts.len()
				),
			});
		}
		if let Some(bad) = vectors.iter().find(|vector| vector.len() != expected) {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch: expected {expected}, got {}.",
					bad.len()
				),
			});
		}

		Ok(vectors)
	}
}

/// Reads an identifier stored either as a JSON string or a number.
pub(crate) fn metadata_id(metadata: &Value, key: &str) -> Option<String> {
	match metadata.get(key)? {
		Value::String(id) if !id.is_empty() => Some(id.clone()),
		Value::Number(id) => Some(id.to_string()),
		_ => None,
	}
}
