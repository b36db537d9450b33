use unicode_normalization::UnicodeNormalization;
use unicode_script::{Script, UnicodeScript};
use whatlang::Lang;

/// Resolves a configured language name ("English") or ISO 639-3 code ("eng").
pub fn resolve_language(name: &str) -> Option<Lang> {
	let trimmed = name.trim();

	Lang::from_code(trimmed.to_lowercase()).or_else(|| {
		Lang::all().iter().copied().find(|lang| lang.eng_name().eq_ignore_ascii_case(trimmed))
	})
}

/// True only when the text is confidently written in `target` already.
///
/// Short queries, mixed scripts, and anything the detector is unsure about return `false`, so
/// callers fall through to translation.
pub fn is_confidently_in(input: &str, target: Lang) -> bool {
	let normalized: String = input.nfkc().collect();

	if mixes_scripts(normalized.as_str()) {
		return false;
	}
	if !should_apply_lid(normalized.as_str()) {
		return false;
	}

	let Some(info) = whatlang::detect(normalized.as_str()) else {
		return false;
	};

	if !info.is_reliable() {
		return false;
	}
	if info.confidence() < 0.85 {
		return false;
	}

	info.lang() == target
}

fn mixes_scripts(input: &str) -> bool {
	let mut seen: Option<Script> = None;

	for ch in input.chars() {
		if !ch.is_alphabetic() {
			continue;
		}

		match ch.script() {
			Script::Common | Script::Inherited => {},
			script => match seen {
				None => seen = Some(script),
				Some(prev) if prev != script => return true,
				Some(_) => {},
			},
		}
	}

	false
}

fn should_apply_lid(input: &str) -> bool {
	let mut letters = 0usize;
	let mut non_space = 0usize;
	let mut whitespace = 0usize;

	for ch in input.chars() {
		if ch.is_whitespace() {
			whitespace += 1;

			continue;
		}

		non_space += 1;

		if ch.is_alphabetic() {
			letters += 1;
		}
	}

	// Two-word queries are too noisy for language identification.
	if letters < 16 || whitespace < 2 {
		return false;
	}

	letters as f32 / non_space as f32 >= 0.60
}
