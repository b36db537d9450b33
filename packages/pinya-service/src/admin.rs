use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, PinyaService, Result, SettingWrite};
use pinya_domain::{
	access::{self, ReplyMode, RoleKind, RoleListEdit, RoleListOutcome},
	retrieval,
	settings::{self, ChannelKind},
};

const REINDEX_BATCH: usize = 32;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigRoleRequest {
	pub actor_id: String,
	pub role: RoleKind,
	pub role_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigChannelRequest {
	pub actor_id: String,
	pub channel: ChannelKind,
	pub channel_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigThresholdRequest {
	pub actor_id: String,
	pub threshold: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyGlobalRequest {
	pub actor_id: String,
	pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyRoleRequest {
	pub actor_id: String,
	pub edit: RoleListEdit,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
	pub key: String,
	pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyRoleResponse {
	pub outcome: RoleListOutcome,
	pub allowed_roles: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusResponse {
	pub mode: ReplyMode,
	pub replies_enabled: bool,
	pub allowed_roles: Vec<String>,
	pub threshold: f32,
	pub librarian_role: Option<String>,
	pub manager_role: Option<String>,
	pub audit_channel: Option<String>,
	pub gaps_channel: Option<String>,
	/// Every stored setting, raw.
	pub settings: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReindexRequest {
	pub actor_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReindexResponse {
	pub total: u64,
	pub updated: u64,
	/// Records edited or deleted while their new embedding was computed.
	pub skipped: u64,
}

impl PinyaService {
	pub async fn config_role(&self, req: ConfigRoleRequest) -> Result<ConfigResponse> {
		let role_id = parse_snowflake("role_id", &req.role_id)?;

		self.write_setting(&req.actor_id, req.role.setting_key(), &role_id).await
	}

	pub async fn config_channel(&self, req: ConfigChannelRequest) -> Result<ConfigResponse> {
		let channel_id = parse_snowflake("channel_id", &req.channel_id)?;

		self.write_setting(&req.actor_id, req.channel.setting_key(), &channel_id).await
	}

	/// Stores the live threshold. Operators may pick any value in `[0.1, 1.0]`.
	pub async fn config_threshold(&self, req: ConfigThresholdRequest) -> Result<ConfigResponse> {
		let threshold = retrieval::validate_operator_threshold(req.threshold).map_err(|_| {
			Error::InvalidRequest {
				message: format!(
					"threshold must be between {} and {}.",
					retrieval::MIN_OPERATOR_THRESHOLD,
					retrieval::MAX_THRESHOLD
				),
			}
		})?;

		self.write_setting(&req.actor_id, settings::AI_THRESHOLD, &threshold.to_string()).await
	}

	pub async fn config_reply_global(&self, req: ReplyGlobalRequest) -> Result<ConfigResponse> {
		self.write_setting(
			&req.actor_id,
			settings::GLOBAL_REPLY_ENABLED,
			settings::format_bool(req.enabled),
		)
		.await
	}

	/// Edits the reply whitelist. No-op edits are reported and leave storage untouched.
	pub async fn config_reply_role(&self, req: ReplyRoleRequest) -> Result<ReplyRoleResponse> {
		let edit = match req.edit {
			RoleListEdit::Add(role_id) => RoleListEdit::Add(parse_snowflake("role_id", &role_id)?),
			RoleListEdit::Remove(role_id) =>
				RoleListEdit::Remove(parse_snowflake("role_id", &role_id)?),
			RoleListEdit::Clear => RoleListEdit::Clear,
		};
		let (outcome, roles) = self
			.settings
			.update(settings::ALLOWED_ROLES, |current| {
				let mut roles = access::parse_role_list(current.as_deref().unwrap_or_default());
				let outcome = access::edit_role_list(&mut roles, &edit);
				let write = match outcome {
					RoleListOutcome::AlreadyPresent | RoleListOutcome::NotPresent =>
						SettingWrite::Keep,
					RoleListOutcome::Cleared => SettingWrite::Remove,
					RoleListOutcome::Added | RoleListOutcome::Removed =>
						SettingWrite::Set(access::join_role_list(&roles)),
				};

				(write, (outcome, roles))
			})
			.await?;

		if matches!(outcome, RoleListOutcome::AlreadyPresent | RoleListOutcome::NotPresent) {
			tracing::warn!(actor_id = %req.actor_id, ?outcome, "Reply role edit changed nothing.");
		}

		Ok(ReplyRoleResponse { outcome, allowed_roles: roles })
	}

	pub fn status(&self) -> StatusResponse {
		let replies_enabled = self.replies_enabled();
		let allowed_roles = self.allowed_roles();

		StatusResponse {
			mode: access::reply_mode(replies_enabled, &allowed_roles),
			replies_enabled,
			allowed_roles,
			threshold: self.live_threshold(),
			librarian_role: self.settings.get(RoleKind::Librarian.setting_key()),
			manager_role: self.settings.get(RoleKind::Manager.setting_key()),
			audit_channel: self.channel(ChannelKind::AuditLog),
			gaps_channel: self.channel(ChannelKind::KnowledgeGaps),
			settings: self.settings.snapshot(),
		}
	}

	/// Recomputes every stored embedding, e.g. after switching embedding models.
	///
	/// A record changed after the snapshot keeps the embedding its own write produced.
	pub async fn reindex(&self, req: ReindexRequest) -> Result<ReindexResponse> {
		let rows = pinya_storage::knowledge::list_texts(&self.db.pool).await?;
		let total = rows.len() as u64;
		let mut updated = 0_u64;
		let mut skipped = 0_u64;

		for batch in rows.chunks(REINDEX_BATCH) {
			let texts: Vec<String> = batch
				.iter()
				.map(|row| crate::embedding_text(&row.topic, &row.content))
				.collect();
			let vectors = self.embed_many(&texts).await?;

			for (row, vector) in batch.iter().zip(vectors) {
				if pinya_storage::knowledge::update_embedding(&self.db.pool, row, &vector).await? {
					updated += 1;
				} else {
					skipped += 1;
				}
			}
		}

		tracing::info!(actor_id = %req.actor_id, total, updated, skipped, "Reindex finished.");

		self.audit(
			"Knowledge Reindexed",
			&req.actor_id,
			serde_json::json!({ "total": total, "updated": updated, "skipped": skipped }),
		)
		.await;

		Ok(ReindexResponse { total, updated, skipped })
	}

	async fn write_setting(&self, actor_id: &str, key: &str, value: &str) -> Result<ConfigResponse> {
		self.settings.set(key, value).await?;

		tracing::info!(actor_id, key, value, "Configuration changed.");

		Ok(ConfigResponse { key: key.to_string(), value: value.to_string() })
	}
}

/// Chat platform ids are unsigned 64-bit integers.
fn parse_snowflake(field: &str, raw: &str) -> Result<String> {
	raw.trim()
		.parse::<u64>()
		.map(|id| id.to_string())
		.map_err(|_| Error::InvalidRequest { message: format!("{field} must be a numeric id.") })
}
