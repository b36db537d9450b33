pub mod access;
pub mod admin;
pub mod aliases;
pub mod ask;
pub mod audit;
pub mod gaps;
pub mod knowledge;
pub mod notify;
pub mod retrieve;
pub mod settings;
pub mod synthesize;
pub mod time_serde;
pub mod translate;
pub mod votes;

mod error;

pub use admin::{
	ConfigChannelRequest, ConfigResponse, ConfigRoleRequest, ConfigThresholdRequest,
	ReindexRequest, ReindexResponse, ReplyGlobalRequest, ReplyRoleRequest, ReplyRoleResponse,
	StatusResponse,
};
pub use aliases::{
	AliasEntry, AliasListResponse, AliasResponse, DeleteAliasRequest, SetAliasRequest,
};
pub use ask::{AskRequest, AskResponse, AskStatus, SourceRef};
pub use error::{Error, Result};
pub use gaps::{GapAction, GapGetRequest, GapStatus, GapView, ResolveGapRequest, ResolveGapResponse};
pub use knowledge::{
	EditRequest, ForgetRequest, ForgetResponse, KnowledgeGetRequest, KnowledgeView,
	KnowledgeWriteResponse, TeachRequest, TopicsRequest, TopicsResponse,
};
pub use notify::{Notification, Notifier, WebhookNotifier};
pub use retrieve::ScoredRecord;
pub use settings::{PgSettingsBackend, SettingWrite, SettingsBackend, SettingsStore};
pub use votes::{VoteKind, VoteRequest, VoteResponse};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pinya_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use pinya_providers::{chat, embedding};
use pinya_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const REJECT_DUPLICATE: &str = "DUPLICATE_DETECTED";

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnowledgeOp {
	Add,
	Update,
	Delete,
	None,
	Rejected,
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
		Self { embedding, chat }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), chat: provider }
	}
}

pub struct PinyaService {
	pub cfg: Config,
	pub db: Db,
	pub settings: SettingsStore,
	pub providers: Providers,
	pub notifier: Arc<dyn Notifier>,
}
impl PinyaService {
	/// Loads the settings cache from Postgres and wires the HTTP-backed providers.
	pub async fn new(cfg: Config, db: Db) -> Result<Self> {
		let notifier = Arc::new(WebhookNotifier::new(&cfg.notifications));

		Self::with_parts(cfg, db, Providers::default(), notifier).await
	}

	pub async fn with_parts(
		cfg: Config,
		db: Db,
		providers: Providers,
		notifier: Arc<dyn Notifier>,
	) -> Result<Self> {
		let backend = Arc::new(PgSettingsBackend::new(db.pool.clone()));
		let settings = SettingsStore::load(backend).await?;

		Ok(Self { cfg, db, settings, providers, notifier })
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(chat::complete(cfg, messages).await?) })
	}
}

/// Text stored and embedded for a record.
pub fn embedding_text(topic: &str, content: &str) -> String {
	format!("Topic: {topic}\nContent: {content}")
}

/// Text compared against stored records when checking for duplicates.
pub fn duplicate_check_text(topic: &str, content: &str) -> String {
	format!("{topic} {content}")
}

pub(crate) async fn with_timeout<T, F>(stage: &str, timeout_ms: u64, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
		Ok(result) => result,
		Err(_) => Err(Error::Timeout { stage: stage.to_string() }),
	}
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(Error::InvalidRequest { message: format!("{field} must be non-empty.") });
	}

	Ok(())
}
