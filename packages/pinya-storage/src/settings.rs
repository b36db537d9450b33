use sqlx::{Executor, Postgres};

use crate::{Result, models::Setting};

pub async fn load_all<'e, E>(executor: E) -> Result<Vec<Setting>>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows = sqlx::query_as::<_, Setting>("SELECT key, value FROM pinya_settings ORDER BY key")
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

pub async fn upsert<'e, E>(executor: E, key: &str, value: &str) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO pinya_settings (key, value, updated_at)
VALUES ($1, $2, now())
ON CONFLICT (key) DO UPDATE
SET
	value = EXCLUDED.value,
	updated_at = EXCLUDED.updated_at",
	)
	.bind(key)
	.bind(value)
	.execute(executor)
	.await?;

	Ok(())
}

/// Returns `true` when a row was removed.
pub async fn delete<'e, E>(executor: E, key: &str) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM pinya_settings WHERE key = $1")
		.bind(key)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}
