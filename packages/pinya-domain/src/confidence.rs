use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
	High,
	Medium,
	Low,
	/// No stored record qualified; the answer came from the model's general knowledge.
	GeneralKnowledge,
}
impl ConfidenceTier {
	pub fn label(self) -> &'static str {
		match self {
			Self::High => "High Confidence",
			Self::Medium => "Medium Confidence",
			Self::Low => "Low Confidence",
			Self::GeneralKnowledge => "General Knowledge",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confidence {
	pub tier: ConfidenceTier,
	/// Top similarity as a truncated percentage.
	pub score: Option<u32>,
}

pub fn assess(top_similarity: Option<f32>, cfg: &pinya_config::Presentation) -> Confidence {
	let Some(similarity) = top_similarity else {
		return Confidence { tier: ConfidenceTier::GeneralKnowledge, score: None };
	};
	let score = (similarity.clamp(0.0, 1.0) * 100.0) as u32;
	let tier = if score >= cfg.high_confidence {
		ConfidenceTier::High
	} else if score >= cfg.medium_confidence {
		ConfidenceTier::Medium
	} else {
		ConfidenceTier::Low
	};

	Confidence { tier, score: Some(score) }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cutoffs() -> pinya_config::Presentation {
		pinya_config::Presentation { high_confidence: 45, medium_confidence: 30 }
	}

	#[test]
	fn tiers_follow_cutoffs() {
		assert_eq!(assess(Some(0.45), &cutoffs()).tier, ConfidenceTier::High);
		assert_eq!(assess(Some(0.449), &cutoffs()).tier, ConfidenceTier::Medium);
		assert_eq!(assess(Some(0.30), &cutoffs()).tier, ConfidenceTier::Medium);
		assert_eq!(assess(Some(0.29), &cutoffs()).tier, ConfidenceTier::Low);
	}

	#[test]
	fn missing_similarity_means_general_knowledge() {
		let confidence = assess(None, &cutoffs());

		assert_eq!(confidence.tier, ConfidenceTier::GeneralKnowledge);
		assert_eq!(confidence.score, None);
		assert_eq!(confidence.tier.label(), "General Knowledge");
	}

	#[test]
	fn score_is_truncated_percentage() {
		assert_eq!(assess(Some(0.876), &cutoffs()).score, Some(87));
	}
}
