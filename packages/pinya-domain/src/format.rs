use regex::{Captures, Regex};

const COORDINATE_PATTERN: &str = r"\b\d{4,5}x\d{4,5}\b";

/// Bolds map coordinates such as `10615x9620`. Coordinates that are already bold are left alone.
pub fn emphasize_coordinates(answer: &str) -> String {
	let Ok(re) = Regex::new(COORDINATE_PATTERN) else {
		return answer.to_string();
	};

	re.replace_all(answer, |caps: &Captures<'_>| {
		let Some(m) = caps.get(0) else {
			return String::new();
		};
		let already_bold =
			answer[..m.start()].ends_with("**") && answer[m.end()..].starts_with("**");

		if already_bold { m.as_str().to_string() } else { format!("**{}**", m.as_str()) }
	})
	.into_owned()
}

/// Interprets the free-text spoiler answer a curator types into a form.
pub fn parse_spoiler_flag(raw: &str) -> bool {
	matches!(raw.trim().to_lowercase().as_str(), "yes" | "y" | "true")
}
