use serde_json::Value;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
	Result,
	models::{KnowledgeMatch, KnowledgeRecord, RecordText},
	vector,
};

pub struct NewRecord<'a> {
	pub record_id: Uuid,
	pub topic: &'a str,
	pub content: &'a str,
	pub embedding: &'a [f32],
	pub metadata: &'a Value,
}

pub async fn insert_record<'e, E>(executor: E, record: &NewRecord<'_>) -> Result<KnowledgeRecord>
where
	E: Executor<'e, Database = Postgres>,
{
	let row = sqlx::query_as::<_, KnowledgeRecord>(
		"\
INSERT INTO knowledge_records (record_id, topic, content, embedding, metadata)
VALUES ($1, $2, $3, $4::text::vector, $5)
RETURNING record_id, topic, content, metadata, created_at, updated_at",
	)
	.bind(record.record_id)
	.bind(record.topic)
	.bind(record.content)
	.bind(vector::vector_to_pg(record.embedding))
	.bind(record.metadata)
	.fetch_one(executor)
	.await?;

	Ok(row)
}

/// Replaces topic, content and embedding, shallow-merging `metadata_patch` into the stored
/// metadata. Returns `None` when the record does not exist.
pub async fn update_record<'e, E>(
	executor: E,
	record_id: Uuid,
	topic: &str,
	content: &str,
	embedding: &[f32],
	metadata_patch: &Value,
) -> Result<Option<KnowledgeRecord>>
where
	E: Executor<'e, Database = Postgres>,
{
	let row = sqlx::query_as::<_, KnowledgeRecord>(
		"\
UPDATE knowledge_records
SET
	topic = $2,
	content = $3,
	embedding = $4::text::vector,
	metadata = metadata || $5::jsonb,
	updated_at = now()
WHERE record_id = $1
RETURNING record_id, topic, content, metadata, created_at, updated_at",
	)
	.bind(record_id)
	.bind(topic)
	.bind(content)
	.bind(vector::vector_to_pg(embedding))
	.bind(metadata_patch)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Replaces the embedding only while the record still holds the text it was computed from.
///
/// Returns `false` when the record is gone or was edited after `text` was read.
pub async fn update_embedding<'e, E>(
	executor: E,
	text: &RecordText,
	embedding: &[f32],
) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		"\
UPDATE knowledge_records
SET embedding = $2::text::vector
WHERE record_id = $1 AND topic = $3 AND content = $4",
	)
	.bind(text.record_id)
	.bind(vector::vector_to_pg(embedding))
	.bind(text.topic.as_str())
	.bind(text.content.as_str())
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

/// Deletes every record filed under `topic`, returning how many were removed.
pub async fn delete_by_topic<'e, E>(executor: E, topic: &str) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM knowledge_records WHERE topic = $1")
		.bind(topic)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn fetch_by_id<'e, E>(executor: E, record_id: Uuid) -> Result<Option<KnowledgeRecord>>
where
	E: Executor<'e, Database = Postgres>,
{
	let row = sqlx::query_as::<_, KnowledgeRecord>(
		"\
SELECT record_id, topic, content, metadata, created_at, updated_at
FROM knowledge_records
WHERE record_id = $1",
	)
	.bind(record_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Row-locks the record for the rest of the transaction. Returns `false` when it does not exist.
pub async fn lock_record<'e, E>(executor: E, record_id: Uuid) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let found: Option<Uuid> = sqlx::query_scalar(
		"SELECT record_id FROM knowledge_records WHERE record_id = $1 FOR UPDATE",
	)
	.bind(record_id)
	.fetch_optional(executor)
	.await?;

	Ok(found.is_some())
}

/// Oldest record filed under `topic`.
pub async fn fetch_by_topic<'e, E>(executor: E, topic: &str) -> Result<Option<KnowledgeRecord>>
where
	E: Executor<'e, Database = Postgres>,
{
	let row = sqlx::query_as::<_, KnowledgeRecord>(
		"\
SELECT record_id, topic, content, metadata, created_at, updated_at
FROM knowledge_records
WHERE topic = $1
ORDER BY created_at ASC, record_id ASC
LIMIT 1",
	)
	.bind(topic)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn fetch_embedding<'e, E>(executor: E, record_id: Uuid) -> Result<Option<Vec<f32>>>
where
	E: Executor<'e, Database = Postgres>,
{
	let text: Option<String> = sqlx::query_scalar(
		"SELECT embedding::text FROM knowledge_records WHERE record_id = $1",
	)
	.bind(record_id)
	.fetch_optional(executor)
	.await?;

	text.map(|raw| vector::parse_pg_vector(&raw)).transpose()
}

/// Distinct topics, most recently created first.
pub async fn recent_topics<'e, E>(executor: E, limit: i64) -> Result<Vec<String>>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows: Vec<String> = sqlx::query_scalar(
		"\
SELECT topic
FROM knowledge_records
GROUP BY topic
ORDER BY max(created_at) DESC, topic ASC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Distinct topics containing `needle`, case-insensitively.
pub async fn search_topics<'e, E>(executor: E, needle: &str, limit: i64) -> Result<Vec<String>>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows: Vec<String> = sqlx::query_scalar(
		"\
SELECT topic
FROM knowledge_records
WHERE topic ILIKE $1 ESCAPE '\\'
GROUP BY topic
ORDER BY max(created_at) DESC, topic ASC
LIMIT $2",
	)
	.bind(contains_pattern(needle))
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Records with similarity strictly above `threshold`, best first, insertion order on ties.
pub async fn search<'e, E>(
	executor: E,
	embedding: &[f32],
	threshold: f32,
	limit: i64,
) -> Result<Vec<KnowledgeMatch>>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows = sqlx::query_as::<_, KnowledgeMatch>(
		"\
SELECT record_id, topic, content, metadata, created_at, similarity
FROM (
	SELECT
		record_id,
		topic,
		content,
		metadata,
		created_at,
		(1 - (embedding <=> $1::text::vector))::real AS similarity
	FROM knowledge_records
) scored
WHERE similarity > $2
ORDER BY similarity DESC, created_at ASC, record_id ASC
LIMIT $3",
	)
	.bind(vector::vector_to_pg(embedding))
	.bind(threshold)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn list_texts<'e, E>(executor: E) -> Result<Vec<RecordText>>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows = sqlx::query_as::<_, RecordText>(
		"SELECT record_id, topic, content FROM knowledge_records ORDER BY created_at, record_id",
	)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

fn contains_pattern(needle: &str) -> String {
	let mut out = String::with_capacity(needle.len() + 2);

	out.push('%');

	for ch in needle.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out.push('%');

	out
}
