use serde_json::Value;

use crate::{PinyaService, notify::Notification};
use pinya_domain::settings::{self, ChannelKind};

impl PinyaService {
	/// Best-effort audit entry. Failures are logged and never undo the mutation being audited.
	pub(crate) async fn audit(&self, action: &str, actor_id: &str, details: Value) {
		let Some(channel_id) = self.channel(ChannelKind::AuditLog) else {
			tracing::debug!(action, "Audit channel not configured; skipping audit entry.");

			return;
		};
		let notification = Notification::AuditLog {
			channel_id,
			action: action.to_string(),
			actor_id: actor_id.to_string(),
			details,
		};

		self.publish(&notification).await;
	}

	/// Delivers a notification, logging instead of failing. Returns whether delivery succeeded.
	pub(crate) async fn publish(&self, notification: &Notification) -> bool {
		match self.notifier.notify(notification).await {
			Ok(()) => true,
			Err(err) => {
				tracing::warn!(
					error = %err,
					kind = notification.kind(),
					channel_id = notification.channel_id(),
					"Notification delivery failed."
				);

				false
			},
		}
	}

	pub(crate) fn channel(&self, kind: ChannelKind) -> Option<String> {
		self.settings.get(kind.setting_key()).filter(|value| !value.trim().is_empty())
	}

	pub(crate) fn replies_enabled(&self) -> bool {
		settings::replies_enabled(self.settings.get(settings::GLOBAL_REPLY_ENABLED).as_deref())
	}

	pub(crate) fn allowed_roles(&self) -> Vec<String> {
		pinya_domain::access::parse_role_list(
			self.settings.get(settings::ALLOWED_ROLES).unwrap_or_default().as_str(),
		)
	}
}
