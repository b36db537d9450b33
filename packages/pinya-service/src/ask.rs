use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	PinyaService, Result, gaps::GapView, retrieve::ScoredRecord, translate::TranslationSource,
};
use pinya_domain::{
	access::{self, ReplyDecision, Requester},
	confidence::{self, Confidence},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskRequest {
	pub requester: Requester,
	/// The message text with any bot mention already stripped.
	pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskStatus {
	Answered,
	Ignored,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceRef {
	pub record_id: Uuid,
	pub topic: String,
	pub similarity: f32,
	pub is_spoiler: bool,
}
impl From<&ScoredRecord> for SourceRef {
	fn from(record: &ScoredRecord) -> Self {
		Self {
			record_id: record.record_id,
			topic: record.topic.clone(),
			similarity: record.similarity,
			is_spoiler: record.is_spoiler(),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskResponse {
	pub status: AskStatus,
	/// Why the question was ignored.
	pub ignored_reason: Option<ReplyDecision>,
	pub answer: Option<String>,
	/// Query after alias substitution.
	pub query_text: Option<String>,
	/// Query used for retrieval.
	pub retrieval_query: Option<String>,
	pub translation: Option<TranslationSource>,
	pub threshold: Option<f32>,
	pub confidence: Option<Confidence>,
	pub sources: Vec<SourceRef>,
	/// Record the gateway attaches vote buttons to. Absent for general-knowledge answers.
	pub top_record_id: Option<Uuid>,
	pub contributor_id: Option<String>,
	pub gap: Option<GapView>,
}
impl AskResponse {
	fn ignored(reason: ReplyDecision) -> Self {
		Self {
			status: AskStatus::Ignored,
			ignored_reason: Some(reason),
			answer: None,
			query_text: None,
			retrieval_query: None,
			translation: None,
			threshold: None,
			confidence: None,
			sources: Vec::new(),
			top_record_id: None,
			contributor_id: None,
			gap: None,
		}
	}
}

impl PinyaService {
	/// Answers a live question: gate, aliases, translation, retrieval, gap report, synthesis.
	pub async fn ask(&self, req: AskRequest) -> Result<AskResponse> {
		crate::require_non_empty("question", &req.question)?;

		let decision =
			access::reply_gate(self.replies_enabled(), &self.allowed_roles(), &req.requester);

		if decision != ReplyDecision::Allowed {
			tracing::debug!(user_id = %req.requester.user_id, ?decision, "Question ignored.");

			return Ok(AskResponse::ignored(decision));
		}

		let query_text = self.normalize_query(req.question.trim()).await?;
		let translation = self.translate_query(&query_text).await?;
		let threshold = self.live_threshold();
		let matches = self.search(&translation.text, threshold).await?;
		let gap = if matches.is_empty() {
			match self.report_gap(&query_text, &req.requester.user_id).await {
				Ok(gap) => Some(gap),
				Err(err) => {
					tracing::error!(error = %err, "Failed to record knowledge gap.");

					None
				},
			}
		} else {
			None
		};
		let answer = self.generate(&query_text, &matches).await?;
		let top = matches.first();
		let confidence =
			confidence::assess(top.map(|record| record.similarity), &self.cfg.presentation);

		tracing::info!(
			matches = matches.len(),
			threshold,
			tier = confidence.tier.label(),
			"Question answered."
		);

		Ok(AskResponse {
			status: AskStatus::Answered,
			ignored_reason: None,
			answer: Some(answer),
			query_text: Some(query_text),
			retrieval_query: Some(translation.text),
			translation: Some(translation.source),
			threshold: Some(threshold),
			confidence: Some(confidence),
			sources: matches.iter().map(SourceRef::from).collect(),
			top_record_id: top.map(|record| record.record_id),
			contributor_id: top.and_then(ScoredRecord::author_id),
			gap,
		})
	}
}
