use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, PinyaService, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
	Helpful,
	Wrong,
}
impl VoteKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Helpful => "helpful",
			Self::Wrong => "wrong",
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteRequest {
	pub record_id: Uuid,
	pub voter_id: String,
	pub kind: VoteKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteResponse {
	pub record_id: Uuid,
	pub kind: VoteKind,
	/// `false` when the voter had already cast this exact vote.
	pub recorded: bool,
	pub votes: i64,
	pub flags: i64,
}

impl PinyaService {
	/// One vote per voter and record. Repeating a vote is a no-op; switching moves the count.
	pub async fn vote(&self, req: VoteRequest) -> Result<VoteResponse> {
		crate::require_non_empty("voter_id", &req.voter_id)?;

		let voter_id = req.voter_id.trim();
		let mut tx = self.db.pool.begin().await?;

		if !pinya_storage::knowledge::lock_record(&mut *tx, req.record_id).await? {
			return Err(Error::NotFound { message: format!("Record {} not found.", req.record_id) });
		}

		let previous =
			pinya_storage::votes::fetch_vote_for_update(&mut *tx, req.record_id, voter_id).await?;
		let recorded = previous.as_deref() != Some(req.kind.as_str());

		if recorded {
			pinya_storage::votes::upsert_vote(&mut *tx, req.record_id, voter_id, req.kind.as_str())
				.await?;
		}

		let counts = pinya_storage::votes::refresh_counts(&mut *tx, req.record_id)
			.await?
			.ok_or_else(|| Error::NotFound {
				message: format!("Record {} not found.", req.record_id),
			})?;

		tx.commit().await?;

		tracing::debug!(
			record_id = %req.record_id,
			kind = req.kind.as_str(),
			recorded,
			"Vote processed."
		);

		Ok(VoteResponse {
			record_id: req.record_id,
			kind: req.kind,
			recorded,
			votes: counts.votes,
			flags: counts.flags,
		})
	}
}
