use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{Result, models::VoteCounts};

/// Current vote kind cast by `voter_id`, locked for the rest of the transaction.
pub async fn fetch_vote_for_update<'e, E>(
	executor: E,
	record_id: Uuid,
	voter_id: &str,
) -> Result<Option<String>>
where
	E: Executor<'e, Database = Postgres>,
{
	let kind: Option<String> = sqlx::query_scalar(
		"\
SELECT kind
FROM knowledge_votes
WHERE record_id = $1 AND voter_id = $2
FOR UPDATE",
	)
	.bind(record_id)
	.bind(voter_id)
	.fetch_optional(executor)
	.await?;

	Ok(kind)
}

pub async fn upsert_vote<'e, E>(
	executor: E,
	record_id: Uuid,
	voter_id: &str,
	kind: &str,
) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO knowledge_votes (record_id, voter_id, kind)
VALUES ($1, $2, $3)
ON CONFLICT (record_id, voter_id) DO UPDATE
SET
	kind = EXCLUDED.kind,
	updated_at = now()",
	)
	.bind(record_id)
	.bind(voter_id)
	.bind(kind)
	.execute(executor)
	.await?;

	Ok(())
}

/// Recomputes `metadata.votes` and `metadata.flags` from the vote table.
pub async fn refresh_counts<'e, E>(executor: E, record_id: Uuid) -> Result<Option<VoteCounts>>
where
	E: Executor<'e, Database = Postgres>,
{
	let row = sqlx::query_as::<_, VoteCounts>(
		"\
WITH tally AS (
	SELECT
		count(*) FILTER (WHERE kind = 'helpful') AS votes,
		count(*) FILTER (WHERE kind = 'wrong') AS flags
	FROM knowledge_votes
	WHERE record_id = $1
)
UPDATE knowledge_records r
SET metadata = r.metadata || jsonb_build_object('votes', tally.votes, 'flags', tally.flags)
FROM tally
WHERE r.record_id = $1
RETURNING tally.votes, tally.flags",
	)
	.bind(record_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}
