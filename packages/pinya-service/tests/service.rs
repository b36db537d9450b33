use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};

use pinya_config::{
	Answer, Config, EmbeddingProviderConfig, LlmProviderConfig, Notifications, Postgres,
	Presentation, Retrieval, Security, Service, Storage, Translation,
};
use pinya_domain::{
	access::{ReplyDecision, Requester, RoleKind, RoleListEdit, RoleListOutcome},
	confidence::ConfidenceTier,
	settings::ChannelKind,
};
use pinya_service::{
	AskRequest, AskStatus, BoxFuture, ChatProvider, ConfigChannelRequest, ConfigRoleRequest,
	ConfigThresholdRequest, DeleteAliasRequest, EditRequest, EmbeddingProvider, Error,
	ForgetRequest, KnowledgeGetRequest, KnowledgeOp, Notification, Notifier, PinyaService,
	Providers, ReplyGlobalRequest, ReplyRoleRequest, ResolveGapRequest, Result, SetAliasRequest,
	TeachRequest, VoteKind, VoteRequest,
};
use pinya_storage::db::Db;
use pinya_testkit::TestDatabase;

const VECTOR_DIM: u32 = 256;
const LIBRARIAN_ROLE: &str = "111";
const ANSWER_TEXT: &str = "Head to Riverside at 10615x9620 with a rod.";
const TRANSLATED_TEXT: &str = "where can i find a fishing rod";

/// Bag-of-words hashing. Record labels are skipped so stored text and queries compare on content.
struct KeywordEmbedding;
impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let dim = cfg.dimensions as usize;
		let vectors = texts.iter().map(|text| keyword_vector(text, dim)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

fn keyword_vector(text: &str, dim: usize) -> Vec<f32> {
	let mut vector = vec![0.0_f32; dim];

	for token in text.split_whitespace() {
		let lower = token.to_lowercase();

		if lower == "topic:" || lower == "content:" {
			continue;
		}

		let word: String = lower.chars().filter(|ch| ch.is_alphanumeric()).collect();

		if word.is_empty() {
			continue;
		}

		let bucket = word
			.bytes()
			.fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
				(hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
			}) as usize
			% dim;

		vector[bucket] += 1.0;
	}

	vector
}

#[derive(Clone, Copy)]
enum TranslationBehavior {
	Translate,
	Fail,
}

/// Answers every synthesis call with a fixed text and scripts the translation call.
struct ScriptedChat {
	translation: TranslationBehavior,
	delay: Option<Duration>,
	calls: Arc<AtomicUsize>,
}
impl ScriptedChat {
	fn new(translation: TranslationBehavior) -> Self {
		Self { translation, delay: None, calls: Arc::new(AtomicUsize::new(0)) }
	}
}
impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let is_translation = messages
			.first()
			.and_then(|message| message.get("content"))
			.and_then(Value::as_str)
			.is_some_and(|system| system.starts_with("You are a translator"));
		let behavior = self.translation;
		let delay = self.delay;

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			match (is_translation, behavior) {
				(true, TranslationBehavior::Translate) => Ok(TRANSLATED_TEXT.to_string()),
				(true, TranslationBehavior::Fail) =>
					Err(Error::Provider { message: "translator offline".to_string() }),
				(false, _) => Ok(ANSWER_TEXT.to_string()),
			}
		})
	}
}

#[derive(Default)]
struct RecordingNotifier {
	sent: Mutex<Vec<Notification>>,
}
impl RecordingNotifier {
	fn kinds(&self) -> Vec<&'static str> {
		self.sent
			.lock()
			.map(|sent| sent.iter().map(Notification::kind).collect())
			.unwrap_or_default()
	}
}
impl Notifier for RecordingNotifier {
	fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<()>> {
		if let Ok(mut sent) = self.sent.lock() {
			sent.push(notification.clone());
		}

		Box::pin(async { Ok(()) })
	}
}

fn test_config(dsn: String) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:8080".to_string(),
			admin_bind: "127.0.0.1:8081".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage { postgres: Postgres { dsn, pool_max_conns: 2, vector_dim: VECTOR_DIM } },
		providers: pinya_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "test".to_string(),
				temperature: 0.1,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		retrieval: Retrieval::default(),
		translation: Translation { enabled: false, ..Translation::default() },
		answer: Answer::default(),
		presentation: Presentation::default(),
		notifications: Notifications::default(),
		security: Security {
			bind_localhost_only: true,
			api_auth_token: None,
			admin_auth_token: None,
		},
	}
}

struct Harness {
	service: PinyaService,
	notifier: Arc<RecordingNotifier>,
	db: TestDatabase,
}
impl Harness {
	async fn start(cfg: impl FnOnce(&mut Config), chat: ScriptedChat) -> Option<Self> {
		let Some(base_dsn) = pinya_testkit::env_dsn() else {
			eprintln!("Skipping service test; set PINYA_PG_DSN to run this test.");

			return None;
		};
		let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
		let mut config = test_config(db.dsn().to_string());

		cfg(&mut config);

		let pool = Db::connect(&config.storage.postgres).await.expect("Failed to connect.");

		pool.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

		let notifier = Arc::new(RecordingNotifier::default());
		let providers = Providers::new(Arc::new(KeywordEmbedding), Arc::new(chat));
		let service = PinyaService::with_parts(config, pool, providers, notifier.clone())
			.await
			.expect("Failed to build service.");

		Some(Self { service, notifier, db })
	}

	async fn finish(self) {
		self.service.db.pool.close().await;
		self.db.cleanup().await.expect("Failed to cleanup test database.");
	}

	async fn with_librarian_role(&self) {
		self.service
			.config_role(ConfigRoleRequest {
				actor_id: "1".to_string(),
				role: RoleKind::Librarian,
				role_id: LIBRARIAN_ROLE.to_string(),
			})
			.await
			.expect("Failed to configure librarian role.");
	}

	async fn teach(&self, topic: &str, content: &str) -> uuid::Uuid {
		let response = self
			.service
			.teach(TeachRequest {
				requester: librarian(),
				topic: topic.to_string(),
				content: content.to_string(),
				spoiler: None,
				force: false,
			})
			.await
			.expect("Failed to teach.");

		assert_eq!(response.op, KnowledgeOp::Add);

		response.record_id.expect("Expected a record id.")
	}
}

fn librarian() -> Requester {
	Requester { user_id: "900".to_string(), role_ids: vec![LIBRARIAN_ROLE.to_string()] }
}

fn member(user_id: &str) -> Requester {
	Requester { user_id: user_id.to_string(), role_ids: Vec::new() }
}

fn ask(question: &str) -> AskRequest {
	AskRequest { requester: member("42"), question: question.to_string() }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn empty_store_answers_from_general_knowledge_and_opens_gap() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	harness
		.service
		.config_channel(ConfigChannelRequest {
			actor_id: "1".to_string(),
			channel: ChannelKind::KnowledgeGaps,
			channel_id: "555".to_string(),
		})
		.await
		.expect("Failed to configure gap channel.");

	let response = harness.service.ask(ask("how do i craft a spear?")).await.expect("Ask failed.");

	assert_eq!(response.status, AskStatus::Answered);
	assert!(response.sources.is_empty());
	assert_eq!(response.top_record_id, None);
	assert_eq!(
		response.confidence.map(|confidence| confidence.tier),
		Some(ConfidenceTier::GeneralKnowledge)
	);
	assert_eq!(response.answer.as_deref(), Some("Head to Riverside at **10615x9620** with a rod."));

	let gap = response.gap.expect("Expected a gap.");

	assert_eq!(gap.query_text, "how do i craft a spear?");
	assert_eq!(gap.requester_id, "42");
	assert_eq!(harness.notifier.kinds(), vec!["gap_opened"]);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn relevant_record_ranks_first_and_lower_threshold_only_adds_matches() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	harness.with_librarian_role().await;

	let fishing = harness.teach("Fishing", "Use a fishing rod near water").await;

	harness.teach("Cooking", "Boil water in a pot on the stove").await;
	harness.teach("Farming", "Plant seeds in tilled soil and water them").await;

	let strict = harness.service.search("fishing rod near water", 0.5).await.expect("Search failed.");
	let loose = harness.service.search("fishing rod near water", 0.2).await.expect("Search failed.");

	assert_eq!(strict.first().map(|record| record.record_id), Some(fishing));
	assert!(strict.iter().all(|record| record.similarity > 0.5));
	assert!(loose.len() >= strict.len());

	for record in &strict {
		assert!(loose.iter().any(|candidate| candidate.record_id == record.record_id));
	}

	harness
		.service
		.config_threshold(ConfigThresholdRequest { actor_id: "1".to_string(), threshold: 0.3 })
		.await
		.expect("Failed to set threshold.");

	let response = harness.service.ask(ask("fishing rod?")).await.expect("Ask failed.");

	assert_eq!(response.threshold, Some(0.3));
	assert_eq!(response.top_record_id, Some(fishing));
	assert_eq!(response.contributor_id.as_deref(), Some("900"));
	assert!(response.gap.is_none());

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn duplicate_teach_is_rejected_unless_forced() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	assert!(!harness.service.is_duplicate("anything at all").await.expect("Probe failed."));

	harness.with_librarian_role().await;

	let original = harness.teach("Fishing", "Use a fishing rod near water").await;

	assert!(
		harness
			.service
			.is_duplicate("Topic: Fishing\nContent: Use a fishing rod near water")
			.await
			.expect("Probe failed.")
	);

	let mut request = TeachRequest {
		requester: librarian(),
		topic: "Fishing".to_string(),
		content: "Use a fishing rod near water".to_string(),
		spoiler: None,
		force: false,
	};
	let rejected = harness.service.teach(request.clone()).await.expect("Teach failed.");

	assert_eq!(rejected.op, KnowledgeOp::Rejected);
	assert_eq!(rejected.reason_code.as_deref(), Some(pinya_service::REJECT_DUPLICATE));
	assert_eq!(rejected.duplicate_of, Some(original));

	request.force = true;

	let forced = harness.service.teach(request).await.expect("Forced teach failed.");

	assert_eq!(forced.op, KnowledgeOp::Add);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn edit_keeps_votes_and_author() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	harness.with_librarian_role().await;

	let record_id = harness.teach("Fishing", "Use a fishing rod near water").await;

	for (voter, kind) in [("1", VoteKind::Helpful), ("2", VoteKind::Helpful), ("3", VoteKind::Wrong)]
	{
		harness
			.service
			.vote(VoteRequest { record_id, voter_id: voter.to_string(), kind })
			.await
			.expect("Vote failed.");
	}

	let editor = Requester { user_id: "901".to_string(), ..librarian() };

	harness
		.service
		.edit(EditRequest {
			requester: editor,
			record_id,
			topic: "Fishing".to_string(),
			content: "Use a fishing rod or a spear near water".to_string(),
			spoiler: Some("yes".to_string()),
		})
		.await
		.expect("Edit failed.");

	let view = harness
		.service
		.get_knowledge(KnowledgeGetRequest { record_id: Some(record_id), topic: None })
		.await
		.expect("Get failed.");

	assert_eq!(view.content, "Use a fishing rod or a spear near water");
	assert_eq!((view.votes, view.flags), (2, 1));
	assert!(view.is_spoiler);
	assert_eq!(view.author_id.as_deref(), Some("900"));
	assert_eq!(view.last_editor_id.as_deref(), Some("901"));

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn votes_are_idempotent_per_voter() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	harness.with_librarian_role().await;

	let record_id = harness.teach("Fishing", "Use a fishing rod near water").await;
	let vote = |kind| VoteRequest { record_id, voter_id: "7".to_string(), kind };
	let first = harness.service.vote(vote(VoteKind::Helpful)).await.expect("Vote failed.");
	let repeat = harness.service.vote(vote(VoteKind::Helpful)).await.expect("Vote failed.");

	assert!(first.recorded);
	assert!(!repeat.recorded);
	assert_eq!((repeat.votes, repeat.flags), (1, 0));

	let switched = harness.service.vote(vote(VoteKind::Wrong)).await.expect("Vote failed.");

	assert!(switched.recorded);
	assert_eq!((switched.votes, switched.flags), (0, 1));

	let missing = harness
		.service
		.vote(VoteRequest {
			record_id: uuid::Uuid::new_v4(),
			voter_id: "7".to_string(),
			kind: VoteKind::Helpful,
		})
		.await
		.expect_err("Expected a missing record.");

	assert!(matches!(missing, Error::NotFound { .. }));

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn deleting_missing_entries_reports_not_found() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	harness.with_librarian_role().await;

	let alias = harness
		.service
		.delete_alias(DeleteAliasRequest { requester: librarian(), trigger: "ghost".to_string() })
		.await
		.expect_err("Expected a missing alias.");
	let topic = harness
		.service
		.forget(ForgetRequest { requester: librarian(), topic: "Ghost".to_string() })
		.await
		.expect_err("Expected a missing topic.");

	assert!(matches!(alias, Error::NotFound { .. }));
	assert!(matches!(topic, Error::NotFound { .. }));

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn aliases_rewrite_questions_before_retrieval() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	harness.with_librarian_role().await;

	let added = harness
		.service
		.set_alias(SetAliasRequest {
			requester: librarian(),
			trigger: " PZ ".to_string(),
			replacement: "Project Zomboid".to_string(),
		})
		.await
		.expect("Failed to set alias.");
	let updated = harness
		.service
		.set_alias(SetAliasRequest {
			requester: librarian(),
			trigger: "pz".to_string(),
			replacement: "Project Zomboid game".to_string(),
		})
		.await
		.expect("Failed to update alias.");

	assert_eq!((added.trigger.as_str(), added.op), ("pz", KnowledgeOp::Add));
	assert_eq!(updated.op, KnowledgeOp::Update);

	let response = harness.service.ask(ask("is PZ hard?")).await.expect("Ask failed.");

	assert_eq!(response.query_text.as_deref(), Some("is Project Zomboid game hard?"));

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn gap_resolution_teaches_once() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};

	harness.with_librarian_role().await;

	let gap = harness
		.service
		.ask(ask("where is the hidden bunker?"))
		.await
		.expect("Ask failed.")
		.gap
		.expect("Expected a gap.");
	let request = ResolveGapRequest {
		requester: librarian(),
		gap_id: gap.gap_id,
		topic: "Hidden bunker".to_string(),
		content: "The bunker is under the gas station".to_string(),
		spoiler: Some("y".to_string()),
		force: false,
	};
	let resolved = harness.service.resolve_gap(request.clone()).await.expect("Resolve failed.");

	assert_eq!(resolved.op, KnowledgeOp::Add);
	assert_eq!(resolved.gap.record_id, resolved.record_id);
	assert_eq!(resolved.gap.resolved_by.as_deref(), Some("900"));
	assert!(!resolved.notified);

	let again = harness
		.service
		.resolve_gap(ResolveGapRequest { force: true, ..request })
		.await
		.expect_err("Expected a conflict.");

	assert!(matches!(again, Error::Conflict { .. }));

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn role_gates_reject_before_any_write() {
	let Some(harness) =
		Harness::start(|_| {}, ScriptedChat::new(TranslationBehavior::Translate)).await
	else {
		return;
	};
	let request = |requester| TeachRequest {
		requester,
		topic: "Fishing".to_string(),
		content: "Use a fishing rod near water".to_string(),
		spoiler: None,
		force: false,
	};
	let unconfigured =
		harness.service.teach(request(librarian())).await.expect_err("Expected a config error.");

	assert!(matches!(unconfigured, Error::ConfigurationMissing { .. }));

	harness.with_librarian_role().await;

	let forbidden =
		harness.service.teach(request(member("42"))).await.expect_err("Expected a forbidden error.");

	assert!(matches!(forbidden, Error::Forbidden { .. }));
	assert!(!harness.service.is_duplicate("fishing rod").await.expect("Probe failed."));

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn reply_gate_ignores_without_model_calls() {
	let chat = ScriptedChat::new(TranslationBehavior::Translate);
	let calls = chat.calls.clone();
	let Some(harness) = Harness::start(|_| {}, chat).await else {
		return;
	};

	harness
		.service
		.config_reply_global(ReplyGlobalRequest { actor_id: "1".to_string(), enabled: false })
		.await
		.expect("Failed to disable replies.");

	let response = harness.service.ask(ask("fishing rod?")).await.expect("Ask failed.");

	assert_eq!(response.status, AskStatus::Ignored);
	assert_eq!(response.ignored_reason, Some(ReplyDecision::RepliesDisabled));

	harness
		.service
		.config_reply_global(ReplyGlobalRequest { actor_id: "1".to_string(), enabled: true })
		.await
		.expect("Failed to enable replies.");

	let edit = harness
		.service
		.config_reply_role(ReplyRoleRequest {
			actor_id: "1".to_string(),
			edit: RoleListEdit::Add("222".to_string()),
		})
		.await
		.expect("Failed to whitelist role.");

	assert_eq!(edit.outcome, RoleListOutcome::Added);

	let response = harness.service.ask(ask("fishing rod?")).await.expect("Ask failed.");

	assert_eq!(response.ignored_reason, Some(ReplyDecision::RoleNotAllowed));
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn translation_failure_follows_policy() {
	let Some(passthrough) = Harness::start(
		|cfg| cfg.translation.enabled = true,
		ScriptedChat::new(TranslationBehavior::Fail),
	)
	.await
	else {
		return;
	};
	let response = passthrough.service.ask(ask("saan ang fishing rod?")).await.expect("Ask failed.");

	assert_eq!(response.retrieval_query.as_deref(), Some("saan ang fishing rod?"));

	passthrough.finish().await;

	let Some(strict) = Harness::start(
		|cfg| {
			cfg.translation.enabled = true;
			cfg.translation.on_failure = "fail".to_string();
		},
		ScriptedChat::new(TranslationBehavior::Fail),
	)
	.await
	else {
		return;
	};
	let err = strict.service.ask(ask("saan ang fishing rod?")).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::Provider { .. }));

	strict.finish().await;

	let Some(translated) = Harness::start(
		|cfg| cfg.translation.enabled = true,
		ScriptedChat::new(TranslationBehavior::Translate),
	)
	.await
	else {
		return;
	};
	let response = translated.service.ask(ask("saan ang fishing rod?")).await.expect("Ask failed.");

	assert_eq!(response.retrieval_query.as_deref(), Some(TRANSLATED_TEXT));
	assert_eq!(response.query_text.as_deref(), Some("saan ang fishing rod?"));

	translated.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PINYA_PG_DSN to run."]
async fn slow_synthesis_times_out() {
	let chat = ScriptedChat {
		delay: Some(Duration::from_millis(500)),
		..ScriptedChat::new(TranslationBehavior::Translate)
	};
	let Some(harness) = Harness::start(|cfg| cfg.providers.llm.timeout_ms = 50, chat).await else {
		return;
	};
	let err = harness.service.ask(ask("fishing rod?")).await.expect_err("Expected a timeout.");

	assert!(matches!(err, Error::Timeout { ref stage } if stage == "answer"));

	harness.finish().await;
}
