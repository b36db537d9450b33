#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdError {
	NotFinite,
	OutOfRange,
}

/// Lower bound an operator may configure for the live threshold.
pub const MIN_OPERATOR_THRESHOLD: f32 = 0.1;
pub const MAX_THRESHOLD: f32 = 1.0;

/// Cosine similarity, defined as `1 - cosine distance`.
///
/// Returns `0.0` for mismatched lengths or zero vectors, mirroring pgvector treating those as
/// maximally distant for ranking purposes.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let mut dot = 0.0_f64;
	let mut norm_a = 0.0_f64;
	let mut norm_b = 0.0_f64;

	for (x, y) in a.iter().zip(b) {
		let (x, y) = (*x as f64, *y as f64);

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	(dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Keeps candidates scoring strictly above `threshold`, ordered by descending score, truncated to
/// `limit`.
///
/// The sort is stable, so candidates with equal scores keep their input order. Callers pass
/// candidates in insertion order to get the documented tie-break.
pub fn select_matches<T, F>(candidates: Vec<T>, threshold: f32, limit: usize, score: F) -> Vec<T>
where
	F: Fn(&T) -> f32,
{
	let mut kept: Vec<T> =
		candidates.into_iter().filter(|candidate| score(candidate) > threshold).collect();

	kept.sort_by(|a, b| score(b).total_cmp(&score(a)));
	kept.truncate(limit);

	kept
}

/// Validates a retrieval threshold, which must lie in `(0.0, 1.0]`.
pub fn validate_threshold(threshold: f32) -> Result<f32, ThresholdError> {
	if !threshold.is_finite() {
		return Err(ThresholdError::NotFinite);
	}
	if threshold <= 0.0 || threshold > MAX_THRESHOLD {
		return Err(ThresholdError::OutOfRange);
	}

	Ok(threshold)
}

/// Validates a threshold an operator wants to store, which must lie in `[0.1, 1.0]`.
pub fn validate_operator_threshold(threshold: f32) -> Result<f32, ThresholdError> {
	if !threshold.is_finite() {
		return Err(ThresholdError::NotFinite);
	}
	if !(MIN_OPERATOR_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
		return Err(ThresholdError::OutOfRange);
	}

	Ok(threshold)
}
