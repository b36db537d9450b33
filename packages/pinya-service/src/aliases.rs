use serde::{Deserialize, Serialize};

use crate::{Error, KnowledgeOp, PinyaService, Result};
use pinya_domain::{
	access::{Requester, RoleKind},
	aliases,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetAliasRequest {
	pub requester: Requester,
	pub trigger: String,
	pub replacement: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteAliasRequest {
	pub requester: Requester,
	pub trigger: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AliasResponse {
	pub trigger: String,
	pub replacement: Option<String>,
	pub op: KnowledgeOp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AliasEntry {
	pub trigger: String,
	pub replacement: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AliasListResponse {
	pub aliases: Vec<AliasEntry>,
}

impl PinyaService {
	/// Inserts or overwrites an alias. Triggers are matched case-insensitively.
	pub async fn set_alias(&self, req: SetAliasRequest) -> Result<AliasResponse> {
		self.require_role(&req.requester, RoleKind::Librarian)?;
		crate::require_non_empty("trigger", &req.trigger)?;
		crate::require_non_empty("replacement", &req.replacement)?;

		let trigger = aliases::normalize_trigger(&req.trigger);
		let replacement = req.replacement.trim();
		let replaced = pinya_storage::aliases::upsert(&self.db.pool, &trigger, replacement).await?;

		self.audit(
			"Alias Updated",
			&req.requester.user_id,
			serde_json::json!({ "trigger": trigger, "replacement": replacement }),
		)
		.await;

		Ok(AliasResponse {
			trigger,
			replacement: Some(replacement.to_string()),
			op: if replaced { KnowledgeOp::Update } else { KnowledgeOp::Add },
		})
	}

	pub async fn delete_alias(&self, req: DeleteAliasRequest) -> Result<AliasResponse> {
		self.require_role(&req.requester, RoleKind::Librarian)?;
		crate::require_non_empty("trigger", &req.trigger)?;

		let trigger = aliases::normalize_trigger(&req.trigger);

		if !pinya_storage::aliases::delete(&self.db.pool, &trigger).await? {
			return Err(Error::NotFound { message: format!("Alias {trigger:?} not found.") });
		}

		self.audit("Alias Deleted", &req.requester.user_id, serde_json::json!({ "trigger": trigger }))
			.await;

		Ok(AliasResponse { trigger, replacement: None, op: KnowledgeOp::Delete })
	}

	pub async fn list_aliases(&self) -> Result<AliasListResponse> {
		let rows = pinya_storage::aliases::list(&self.db.pool).await?;

		Ok(AliasListResponse {
			aliases: rows
				.into_iter()
				.map(|row| AliasEntry { trigger: row.trigger, replacement: row.replacement })
				.collect(),
		})
	}

	/// Applies every stored alias to `text`, in trigger order.
	pub async fn normalize_query(&self, text: &str) -> Result<String> {
		let rows = pinya_storage::aliases::list(&self.db.pool).await?;

		Ok(aliases::apply_aliases(
			text,
			rows.iter().map(|row| (row.trigger.as_str(), row.replacement.as_str())),
		))
	}
}
