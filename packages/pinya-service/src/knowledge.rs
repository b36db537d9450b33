use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, KnowledgeOp, PinyaService, REJECT_DUPLICATE, Result, retrieve::ScoredRecord};
use pinya_domain::{
	access::{Requester, RoleKind},
	format,
};
use pinya_storage::{
	knowledge::{self, NewRecord},
	models::KnowledgeRecord,
};

const TOPIC_SUGGESTIONS: i64 = 25;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeachRequest {
	pub requester: Requester,
	pub topic: String,
	pub content: String,
	/// Free-text spoiler answer as typed into the form (`yes`, `y`, `true`).
	#[serde(default)]
	pub spoiler: Option<String>,
	/// Skip the duplicate check.
	#[serde(default)]
	pub force: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EditRequest {
	pub requester: Requester,
	pub record_id: Uuid,
	pub topic: String,
	pub content: String,
	/// Leaves the stored spoiler flag unchanged when absent.
	#[serde(default)]
	pub spoiler: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeWriteResponse {
	pub record_id: Option<Uuid>,
	pub op: KnowledgeOp,
	pub reason_code: Option<String>,
	/// The existing record that blocked the write.
	pub duplicate_of: Option<Uuid>,
}
impl KnowledgeWriteResponse {
	pub(crate) fn written(record_id: Uuid, op: KnowledgeOp) -> Self {
		Self { record_id: Some(record_id), op, reason_code: None, duplicate_of: None }
	}

	pub(crate) fn duplicate(existing: &ScoredRecord) -> Self {
		Self {
			record_id: None,
			op: KnowledgeOp::Rejected,
			reason_code: Some(REJECT_DUPLICATE.to_string()),
			duplicate_of: Some(existing.record_id),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForgetRequest {
	pub requester: Requester,
	pub topic: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForgetResponse {
	pub topic: String,
	pub op: KnowledgeOp,
	pub deleted: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KnowledgeGetRequest {
	#[serde(default)]
	pub record_id: Option<Uuid>,
	#[serde(default)]
	pub topic: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeView {
	pub record_id: Uuid,
	pub topic: String,
	pub content: String,
	pub is_spoiler: bool,
	pub votes: i64,
	pub flags: i64,
	pub author_id: Option<String>,
	pub last_editor_id: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl From<KnowledgeRecord> for KnowledgeView {
	fn from(record: KnowledgeRecord) -> Self {
		let counter = |key: &str| record.metadata.get(key).and_then(Value::as_i64).unwrap_or(0);

		Self {
			is_spoiler: record.metadata.get("is_spoiler").and_then(Value::as_bool).unwrap_or(false),
			votes: counter("votes"),
			flags: counter("flags"),
			author_id: crate::retrieve::metadata_id(&record.metadata, "author_id"),
			last_editor_id: crate::retrieve::metadata_id(&record.metadata, "last_editor_id"),
			record_id: record.record_id,
			topic: record.topic,
			content: record.content,
			created_at: record.created_at,
			updated_at: record.updated_at,
		}
	}
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopicsRequest {
	#[serde(default)]
	pub query: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicsResponse {
	pub topics: Vec<String>,
}

/// Embedding and metadata for a record that is about to be inserted.
pub(crate) struct PreparedRecord {
	pub(crate) record_id: Uuid,
	pub(crate) topic: String,
	pub(crate) content: String,
	pub(crate) embedding: Vec<f32>,
	pub(crate) metadata: Value,
}
impl PreparedRecord {
	pub(crate) fn as_new(&self) -> NewRecord<'_> {
		NewRecord {
			record_id: self.record_id,
			topic: self.topic.as_str(),
			content: self.content.as_str(),
			embedding: self.embedding.as_slice(),
			metadata: &self.metadata,
		}
	}
}

impl PinyaService {
	pub async fn teach(&self, req: TeachRequest) -> Result<KnowledgeWriteResponse> {
		self.require_role(&req.requester, RoleKind::Librarian)?;

		let (topic, content) = validate_entry(&req.topic, &req.content)?;

		if !req.force
			&& let Some(existing) = self.find_duplicate(topic, content).await?
		{
			tracing::info!(
				topic,
				duplicate_of = %existing.record_id,
				similarity = existing.similarity,
				"Teach rejected as duplicate."
			);

			return Ok(KnowledgeWriteResponse::duplicate(&existing));
		}

		let prepared = self
			.prepare_record(topic, content, req.spoiler.as_deref(), &req.requester.user_id)
			.await?;
		let record = knowledge::insert_record(&self.db.pool, &prepared.as_new()).await?;

		self.audit(
			"Knowledge Added",
			&req.requester.user_id,
			serde_json::json!({
				"record_id": record.record_id,
				"topic": record.topic,
				"content_chars": record.content.chars().count(),
			}),
		)
		.await;

		Ok(KnowledgeWriteResponse::written(record.record_id, KnowledgeOp::Add))
	}

	/// Revises a record in place. Votes, flags and the author survive; edits skip the duplicate
	/// check.
	pub async fn edit(&self, req: EditRequest) -> Result<KnowledgeWriteResponse> {
		self.require_role(&req.requester, RoleKind::Librarian)?;

		let (topic, content) = validate_entry(&req.topic, &req.content)?;
		let embedding = self.embed_one(&crate::embedding_text(topic, content)).await?;
		let mut patch = Map::new();

		if let Some(raw) = req.spoiler.as_deref() {
			patch.insert("is_spoiler".to_string(), Value::Bool(format::parse_spoiler_flag(raw)));
		}

		patch.insert("last_editor_id".to_string(), Value::String(req.requester.user_id.clone()));

		let record = knowledge::update_record(
			&self.db.pool,
			req.record_id,
			topic,
			content,
			&embedding,
			&Value::Object(patch),
		)
		.await?
		.ok_or_else(|| Error::NotFound { message: format!("Record {} not found.", req.record_id) })?;

		self.audit(
			"Knowledge Updated",
			&req.requester.user_id,
			serde_json::json!({
				"record_id": record.record_id,
				"topic": record.topic,
				"content_chars": record.content.chars().count(),
			}),
		)
		.await;

		Ok(KnowledgeWriteResponse::written(record.record_id, KnowledgeOp::Update))
	}

	/// Removes every record filed under the topic.
	pub async fn forget(&self, req: ForgetRequest) -> Result<ForgetResponse> {
		self.require_role(&req.requester, RoleKind::Librarian)?;
		crate::require_non_empty("topic", &req.topic)?;

		let topic = req.topic.trim();
		let deleted = knowledge::delete_by_topic(&self.db.pool, topic).await?;

		if deleted == 0 {
			return Err(Error::NotFound { message: format!("Topic {topic:?} not found.") });
		}

		self.audit(
			"Knowledge Deleted",
			&req.requester.user_id,
			serde_json::json!({ "topic": topic, "deleted": deleted }),
		)
		.await;

		Ok(ForgetResponse { topic: topic.to_string(), op: KnowledgeOp::Delete, deleted })
	}

	pub async fn get_knowledge(&self, req: KnowledgeGetRequest) -> Result<KnowledgeView> {
		let record = match (req.record_id, req.topic.as_deref().map(str::trim)) {
			(Some(record_id), _) => knowledge::fetch_by_id(&self.db.pool, record_id).await?,
			(None, Some(topic)) if !topic.is_empty() =>
				knowledge::fetch_by_topic(&self.db.pool, topic).await?,
			_ =>
				return Err(Error::InvalidRequest {
					message: "record_id or topic is required.".to_string(),
				}),
		};

		record
			.map(KnowledgeView::from)
			.ok_or_else(|| Error::NotFound { message: "Knowledge record not found.".to_string() })
	}

	/// Topic suggestions: the most recent topics, or those containing the query.
	pub async fn topics(&self, req: TopicsRequest) -> Result<TopicsResponse> {
		let query = req.query.as_deref().map(str::trim).filter(|query| !query.is_empty());
		let topics = match query {
			Some(query) => knowledge::search_topics(&self.db.pool, query, TOPIC_SUGGESTIONS).await?,
			None => knowledge::recent_topics(&self.db.pool, TOPIC_SUGGESTIONS).await?,
		};

		Ok(TopicsResponse { topics })
	}

	/// True when a stored record is at least as similar as the duplicate threshold.
	pub async fn is_duplicate(&self, candidate_text: &str) -> Result<bool> {
		let matches = self.search(candidate_text, self.cfg.retrieval.duplicate_threshold).await?;

		Ok(!matches.is_empty())
	}

	pub(crate) async fn find_duplicate(
		&self,
		topic: &str,
		content: &str,
	) -> Result<Option<ScoredRecord>> {
		let query = crate::duplicate_check_text(topic, content);
		let matches = self.search(&query, self.cfg.retrieval.duplicate_threshold).await?;

		Ok(matches.into_iter().next())
	}

	pub(crate) async fn prepare_record(
		&self,
		topic: &str,
		content: &str,
		spoiler: Option<&str>,
		author_id: &str,
	) -> Result<PreparedRecord> {
		let embedding = self.embed_one(&crate::embedding_text(topic, content)).await?;
		let metadata = serde_json::json!({
			"votes": 0,
			"flags": 0,
			"is_spoiler": spoiler.map(format::parse_spoiler_flag).unwrap_or(false),
			"author_id": author_id,
		});

		Ok(PreparedRecord {
			record_id: Uuid::new_v4(),
			topic: topic.to_string(),
			content: content.to_string(),
			embedding,
			metadata,
		})
	}
}

pub(crate) fn validate_entry<'a>(topic: &'a str, content: &'a str) -> Result<(&'a str, &'a str)> {
	crate::require_non_empty("topic", topic)?;
	crate::require_non_empty("content", content)?;

	Ok((topic.trim(), content.trim()))
}
