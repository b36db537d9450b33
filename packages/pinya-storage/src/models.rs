use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnowledgeRecord {
	pub record_id: Uuid,
	pub topic: String,
	pub content: String,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnowledgeMatch {
	pub record_id: Uuid,
	pub topic: String,
	pub content: String,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub similarity: f32,
}

/// Row shape used when recomputing embeddings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecordText {
	pub record_id: Uuid,
	pub topic: String,
	pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Alias {
	pub trigger: String,
	pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Setting {
	pub key: String,
	pub value: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnowledgeGap {
	pub gap_id: Uuid,
	pub query_text: String,
	pub requester_id: String,
	pub status: String,
	pub record_id: Option<Uuid>,
	pub resolved_by: Option<String>,
	pub created_at: OffsetDateTime,
	pub resolved_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct VoteCounts {
	pub votes: i64,
	pub flags: i64,
}
