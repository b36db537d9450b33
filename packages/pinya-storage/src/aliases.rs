use sqlx::{Executor, Postgres};

use crate::{Result, models::Alias};

pub async fn list<'e, E>(executor: E) -> Result<Vec<Alias>>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows = sqlx::query_as::<_, Alias>(
		"SELECT trigger, replacement FROM knowledge_aliases ORDER BY trigger",
	)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Inserts or overwrites. Returns `true` when the trigger already existed.
pub async fn upsert<'e, E>(executor: E, trigger: &str, replacement: &str) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	// `xmax = 0` only for freshly inserted rows.
	let inserted: bool = sqlx::query_scalar(
		"\
INSERT INTO knowledge_aliases (trigger, replacement, updated_at)
VALUES ($1, $2, now())
ON CONFLICT (trigger) DO UPDATE
SET
	replacement = EXCLUDED.replacement,
	updated_at = EXCLUDED.updated_at
RETURNING (xmax = 0)",
	)
	.bind(trigger)
	.bind(replacement)
	.fetch_one(executor)
	.await?;

	Ok(!inserted)
}

pub async fn delete<'e, E>(executor: E, trigger: &str) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM knowledge_aliases WHERE trigger = $1")
		.bind(trigger)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}
