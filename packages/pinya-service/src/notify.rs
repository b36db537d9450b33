use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BoxFuture, Result, gaps::GapView};

/// Events the chat gateway renders into its channels.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
	AuditLog { channel_id: String, action: String, actor_id: String, details: Value },
	/// A question nobody could answer. The gateway offers a teach action.
	GapOpened { channel_id: String, gap: GapView },
	/// Same `gap_id` as the opening event; the gateway edits that message in place.
	GapResolved { channel_id: String, gap: GapView },
}
impl Notification {
	pub fn channel_id(&self) -> &str {
		match self {
			Self::AuditLog { channel_id, .. }
			| Self::GapOpened { channel_id, .. }
			| Self::GapResolved { channel_id, .. } => channel_id,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Self::AuditLog { .. } => "audit_log",
			Self::GapOpened { .. } => "gap_opened",
			Self::GapResolved { .. } => "gap_resolved",
		}
	}
}

pub trait Notifier
where
	Self: Send + Sync,
{
	fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<()>>;
}

/// Posts notifications to `notifications.webhook_url`, or only logs them when no URL is set.
pub struct WebhookNotifier {
	cfg: pinya_config::Notifications,
}
impl WebhookNotifier {
	pub fn new(cfg: &pinya_config::Notifications) -> Self {
		Self {
			cfg: pinya_config::Notifications {
				webhook_url: cfg.webhook_url.clone(),
				timeout_ms: cfg.timeout_ms,
				default_headers: cfg.default_headers.clone(),
			},
		}
	}
}
impl Notifier for WebhookNotifier {
	fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let Some(url) = self.cfg.webhook_url.as_deref() else {
				tracing::info!(
					kind = notification.kind(),
					channel_id = notification.channel_id(),
					"No webhook configured; notification logged only."
				);

				return Ok(());
			};
			let payload = serde_json::to_value(notification).map_err(|err| {
				crate::Error::Provider { message: format!("Unserializable notification: {err}") }
			})?;

			crate::with_timeout("notification", self.cfg.timeout_ms, async {
				Ok(pinya_providers::webhook::post(&self.cfg, url, &payload).await?)
			})
			.await
		})
	}
}
