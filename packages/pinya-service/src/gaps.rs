use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, KnowledgeOp, PinyaService, REJECT_DUPLICATE, Result, knowledge, notify::Notification,
};
use pinya_domain::{
	access::{Requester, RoleKind},
	settings::ChannelKind,
};
use pinya_storage::{gaps, models::KnowledgeGap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
	Open,
	Resolved,
}

/// The affordance the gateway attaches to a gap message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GapAction {
	Teach,
	Edit { record_id: Uuid },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GapView {
	pub gap_id: Uuid,
	pub query_text: String,
	pub requester_id: String,
	pub status: GapStatus,
	pub record_id: Option<Uuid>,
	pub resolved_by: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub resolved_at: Option<OffsetDateTime>,
	pub action: GapAction,
}
impl From<KnowledgeGap> for GapView {
	fn from(row: KnowledgeGap) -> Self {
		let status = if row.status == "resolved" { GapStatus::Resolved } else { GapStatus::Open };
		let action = match (status, row.record_id) {
			(GapStatus::Resolved, Some(record_id)) => GapAction::Edit { record_id },
			_ => GapAction::Teach,
		};

		Self {
			gap_id: row.gap_id,
			query_text: row.query_text,
			requester_id: row.requester_id,
			status,
			record_id: row.record_id,
			resolved_by: row.resolved_by,
			created_at: row.created_at,
			resolved_at: row.resolved_at,
			action,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveGapRequest {
	pub requester: Requester,
	pub gap_id: Uuid,
	pub topic: String,
	pub content: String,
	#[serde(default)]
	pub spoiler: Option<String>,
	#[serde(default)]
	pub force: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveGapResponse {
	pub gap: GapView,
	pub op: KnowledgeOp,
	pub reason_code: Option<String>,
	pub record_id: Option<Uuid>,
	pub duplicate_of: Option<Uuid>,
	/// Whether the gap channel received the resolution event.
	pub notified: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GapGetRequest {
	pub gap_id: Uuid,
}

impl PinyaService {
	/// Persists an open gap and announces it to the gap channel when one is configured.
	pub async fn report_gap(&self, query_text: &str, requester_id: &str) -> Result<GapView> {
		let row = gaps::insert_gap(&self.db.pool, Uuid::new_v4(), query_text, requester_id).await?;
		let gap = GapView::from(row);

		tracing::info!(gap_id = %gap.gap_id, requester_id, "Knowledge gap detected.");

		match self.channel(ChannelKind::KnowledgeGaps) {
			Some(channel_id) => {
				self.publish(&Notification::GapOpened { channel_id, gap: gap.clone() }).await;
			},
			None => tracing::debug!(
				gap_id = %gap.gap_id,
				"Gap channel not configured; gap persisted only."
			),
		}

		Ok(gap)
	}

	/// Teaches the missing knowledge and flips the same gap to resolved.
	pub async fn resolve_gap(&self, req: ResolveGapRequest) -> Result<ResolveGapResponse> {
		self.require_role(&req.requester, RoleKind::Librarian)?;

		let (topic, content) = knowledge::validate_entry(&req.topic, &req.content)?;
		let current = self.load_gap(req.gap_id).await?;

		if current.status == "resolved" {
			return Err(already_resolved(req.gap_id));
		}
		if !req.force
			&& let Some(existing) = self.find_duplicate(topic, content).await?
		{
			return Ok(ResolveGapResponse {
				gap: GapView::from(current),
				op: KnowledgeOp::Rejected,
				reason_code: Some(REJECT_DUPLICATE.to_string()),
				record_id: None,
				duplicate_of: Some(existing.record_id),
				notified: false,
			});
		}

		let prepared = self
			.prepare_record(topic, content, req.spoiler.as_deref(), &req.requester.user_id)
			.await?;
		let mut tx = self.db.pool.begin().await?;
		let locked = gaps::fetch_gap_for_update(&mut *tx, req.gap_id)
			.await?
			.ok_or_else(|| gap_not_found(req.gap_id))?;

		if locked.status != "open" {
			return Err(already_resolved(req.gap_id));
		}

		let record = pinya_storage::knowledge::insert_record(&mut *tx, &prepared.as_new()).await?;
		let resolved =
			gaps::mark_resolved(&mut *tx, req.gap_id, record.record_id, &req.requester.user_id)
				.await?
				.ok_or_else(|| already_resolved(req.gap_id))?;

		tx.commit().await?;

		let gap = GapView::from(resolved);
		let notified = match self.channel(ChannelKind::KnowledgeGaps) {
			Some(channel_id) =>
				self.publish(&Notification::GapResolved { channel_id, gap: gap.clone() }).await,
			None => false,
		};

		self.audit(
			"Knowledge Added",
			&req.requester.user_id,
			serde_json::json!({
				"record_id": record.record_id,
				"topic": record.topic,
				"gap_id": gap.gap_id,
			}),
		)
		.await;

		Ok(ResolveGapResponse {
			gap,
			op: KnowledgeOp::Add,
			reason_code: None,
			record_id: Some(record.record_id),
			duplicate_of: None,
			notified,
		})
	}

	pub async fn get_gap(&self, req: GapGetRequest) -> Result<GapView> {
		Ok(GapView::from(self.load_gap(req.gap_id).await?))
	}

	async fn load_gap(&self, gap_id: Uuid) -> Result<KnowledgeGap> {
		gaps::fetch_gap(&self.db.pool, gap_id).await?.ok_or_else(|| gap_not_found(gap_id))
	}
}

fn gap_not_found(gap_id: Uuid) -> Error {
	Error::NotFound { message: format!("Gap {gap_id} not found.") }
}

fn already_resolved(gap_id: Uuid) -> Error {
	Error::Conflict { message: format!("Gap {gap_id} is already resolved.") }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(status: &str, record_id: Option<Uuid>) -> KnowledgeGap {
		KnowledgeGap {
			gap_id: Uuid::nil(),
			query_text: "healing".to_string(),
			requester_id: "42".to_string(),
			status: status.to_string(),
			record_id,
			resolved_by: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
			resolved_at: None,
		}
	}

	#[test]
	fn action_follows_status() {
		let record_id = Uuid::new_v4();

		assert_eq!(GapView::from(row("open", None)).action, GapAction::Teach);
		assert_eq!(
			GapView::from(row("resolved", Some(record_id))).action,
			GapAction::Edit { record_id }
		);
		// The taught record was forgotten afterwards.
		assert_eq!(GapView::from(row("resolved", None)).action, GapAction::Teach);
	}

	#[test]
	fn action_serializes_with_kind_tag() {
		let json = serde_json::to_value(GapAction::Edit { record_id: Uuid::nil() })
			.expect("Failed to serialize action.");

		assert_eq!(json["kind"], "edit");
		assert_eq!(json["record_id"], Uuid::nil().to_string());
	}
}
