//! Capability checks evaluated against the current settings on every call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
	/// Curates knowledge: teach, edit, forget, aliases, gap resolution.
	Librarian,
	/// Reserved for configuration.
	Manager,
}
impl RoleKind {
	pub fn setting_key(self) -> &'static str {
		match self {
			Self::Librarian => settings::ROLE_LIBRARIAN,
			Self::Manager => settings::ROLE_MANAGER,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Librarian => "librarian",
			Self::Manager => "manager",
		}
	}
}
impl fmt::Display for RoleKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Who is asking, as reported by the chat gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
	pub user_id: String,
	#[serde(default)]
	pub role_ids: Vec<String>,
}
impl Requester {
	pub fn has_role(&self, role_id: &str) -> bool {
		self.role_ids.iter().any(|held| held.trim() == role_id)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
	NotConfigured { role: RoleKind },
	InvalidConfiguration { role: RoleKind, value: String },
	MissingRole { role: RoleKind },
}
impl AccessDenied {
	/// Guidance suitable for showing to the person who invoked the command.
	pub fn message(&self) -> String {
		match self {
			Self::NotConfigured { role } => format!(
				"The {role} role is not configured. Ask an admin to set it with the role config command."
			),
			Self::InvalidConfiguration { role, value } => {
				format!("Configuration error: the stored {role} role id {value:?} is not a valid id.")
			},
			Self::MissingRole { role } => format!("You need the {role} role to do that."),
		}
	}
}

/// Checks that `requester` holds the role currently configured for `role`.
pub fn check_role(
	configured: Option<&str>,
	requester: &Requester,
	role: RoleKind,
) -> Result<(), AccessDenied> {
	let Some(raw) = configured.map(str::trim).filter(|value| !value.is_empty()) else {
		return Err(AccessDenied::NotConfigured { role });
	};
	let Ok(role_id) = raw.parse::<u64>() else {
		return Err(AccessDenied::InvalidConfiguration { role, value: raw.to_string() });
	};

	if requester.has_role(role_id.to_string().as_str()) {
		Ok(())
	} else {
		Err(AccessDenied::MissingRole { role })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyDecision {
	Allowed,
	RepliesDisabled,
	RoleNotAllowed,
}

/// Decides whether a live question gets an answer at all.
pub fn reply_gate(
	replies_enabled: bool,
	allowed_roles: &[String],
	requester: &Requester,
) -> ReplyDecision {
	if !replies_enabled {
		return ReplyDecision::RepliesDisabled;
	}
	if !allowed_roles.is_empty() && !allowed_roles.iter().any(|role| requester.has_role(role)) {
		return ReplyDecision::RoleNotAllowed;
	}

	ReplyDecision::Allowed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
	Sleeping,
	Locked,
	Online,
}

pub fn reply_mode(replies_enabled: bool, allowed_roles: &[String]) -> ReplyMode {
	if !replies_enabled {
		ReplyMode::Sleeping
	} else if !allowed_roles.is_empty() {
		ReplyMode::Locked
	} else {
		ReplyMode::Online
	}
}

/// Parses the comma-separated `allowed_roles` value, dropping blanks.
pub fn parse_role_list(raw: &str) -> Vec<String> {
	raw.split(',').map(str::trim).filter(|id| !id.is_empty()).map(str::to_string).collect()
}

pub fn join_role_list(roles: &[String]) -> String {
	roles.join(",")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "role_id", rename_all = "snake_case")]
pub enum RoleListEdit {
	Add(String),
	Remove(String),
	Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleListOutcome {
	Added,
	AlreadyPresent,
	Removed,
	NotPresent,
	Cleared,
}

/// Applies `edit` in place. `AlreadyPresent` and `NotPresent` leave the list untouched.
pub fn edit_role_list(roles: &mut Vec<String>, edit: &RoleListEdit) -> RoleListOutcome {
	match edit {
		RoleListEdit::Add(role_id) => {
			let role_id = role_id.trim();

			if roles.iter().any(|held| held == role_id) {
				return RoleListOutcome::AlreadyPresent;
			}

			roles.push(role_id.to_string());

			RoleListOutcome::Added
		},
		RoleListEdit::Remove(role_id) => {
			let role_id = role_id.trim();
			let before = roles.len();

			roles.retain(|held| held != role_id);

			if roles.len() == before { RoleListOutcome::NotPresent } else { RoleListOutcome::Removed }
		},
		RoleListEdit::Clear => {
			roles.clear();

			RoleListOutcome::Cleared
		},
	}
}
