//! Well-known configuration keys and how their stored string values are read.

use serde::{Deserialize, Serialize};

use crate::retrieval;

pub const ROLE_LIBRARIAN: &str = "role_librarian";
pub const ROLE_MANAGER: &str = "role_manager";
pub const CHANNEL_AUDIT_LOG: &str = "channel_audit_log";
pub const CHANNEL_KNOWLEDGE_GAPS: &str = "channel_knowledge_gaps";
pub const AI_THRESHOLD: &str = "ai_threshold";
pub const GLOBAL_REPLY_ENABLED: &str = "global_reply_enabled";
pub const ALLOWED_ROLES: &str = "allowed_roles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
	AuditLog,
	KnowledgeGaps,
}
impl ChannelKind {
	pub fn setting_key(self) -> &'static str {
		match self {
			Self::AuditLog => CHANNEL_AUDIT_LOG,
			Self::KnowledgeGaps => CHANNEL_KNOWLEDGE_GAPS,
		}
	}
}

/// Replies stay on unless the stored value is literally `false`.
pub fn replies_enabled(raw: Option<&str>) -> bool {
	raw.map(|value| !value.trim().eq_ignore_ascii_case("false")).unwrap_or(true)
}

pub fn format_bool(value: bool) -> &'static str {
	if value { "true" } else { "false" }
}

/// Reads the live threshold, falling back to `default` when the stored value is missing or no
/// longer a valid threshold.
pub fn threshold_or(raw: Option<&str>, default: f32) -> f32 {
	raw.and_then(|value| value.trim().parse::<f32>().ok())
		.and_then(|value| retrieval::validate_threshold(value).ok())
		.unwrap_or(default)
}
