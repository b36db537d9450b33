use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{Result, models::KnowledgeGap};

const GAP_COLUMNS: &str =
	"gap_id, query_text, requester_id, status, record_id, resolved_by, created_at, resolved_at";

pub async fn insert_gap<'e, E>(
	executor: E,
	gap_id: Uuid,
	query_text: &str,
	requester_id: &str,
) -> Result<KnowledgeGap>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
INSERT INTO knowledge_gaps (gap_id, query_text, requester_id, status)
VALUES ($1, $2, $3, 'open')
RETURNING {GAP_COLUMNS}"
	);
	let row = sqlx::query_as::<_, KnowledgeGap>(&sql)
		.bind(gap_id)
		.bind(query_text)
		.bind(requester_id)
		.fetch_one(executor)
		.await?;

	Ok(row)
}

pub async fn fetch_gap<'e, E>(executor: E, gap_id: Uuid) -> Result<Option<KnowledgeGap>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!("SELECT {GAP_COLUMNS} FROM knowledge_gaps WHERE gap_id = $1");
	let row = sqlx::query_as::<_, KnowledgeGap>(&sql).bind(gap_id).fetch_optional(executor).await?;

	Ok(row)
}

/// Row-locks the gap for the rest of the transaction.
pub async fn fetch_gap_for_update<'e, E>(executor: E, gap_id: Uuid) -> Result<Option<KnowledgeGap>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!("SELECT {GAP_COLUMNS} FROM knowledge_gaps WHERE gap_id = $1 FOR UPDATE");
	let row = sqlx::query_as::<_, KnowledgeGap>(&sql).bind(gap_id).fetch_optional(executor).await?;

	Ok(row)
}

/// Marks an open gap resolved. Returns `None` if the gap is missing or already resolved.
pub async fn mark_resolved<'e, E>(
	executor: E,
	gap_id: Uuid,
	record_id: Uuid,
	resolved_by: &str,
) -> Result<Option<KnowledgeGap>>
where
	E: Executor<'e, Database = Postgres>,
{
	let sql = format!(
		"\
UPDATE knowledge_gaps
SET
	status = 'resolved',
	record_id = $2,
	resolved_by = $3,
	resolved_at = now()
WHERE gap_id = $1 AND status = 'open'
RETURNING {GAP_COLUMNS}"
	);
	let row = sqlx::query_as::<_, KnowledgeGap>(&sql)
		.bind(gap_id)
		.bind(record_id)
		.bind(resolved_by)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}
