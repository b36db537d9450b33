use regex::{NoExpand, RegexBuilder};

/// Canonical storage form of an alias trigger. Matching is case-insensitive, so triggers are
/// kept lower-cased to make `Base` and `base` the same alias.
pub fn normalize_trigger(trigger: &str) -> String {
	trigger.trim().to_lowercase()
}

/// Replaces every whole-word, case-insensitive occurrence of each trigger, in the order given.
///
/// Replacements are inserted literally. A later alias sees the output of earlier ones.
pub fn apply_aliases<'a, I>(text: &str, aliases: I) -> String
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	let mut out = text.to_string();

	for (trigger, replacement) in aliases {
		let trigger = trigger.trim();

		if trigger.is_empty() {
			continue;
		}

		let pattern = format!(r"\b{}\b", regex::escape(trigger));
		let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
			continue;
		};

		out = re.replace_all(&out, NoExpand(replacement)).into_owned();
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn replaces_whole_words_case_insensitively() {
		let out = apply_aliases("Where is the BASE? base camp", [("base", "Riverside safehouse")]);

		assert_eq!(out, "Where is the Riverside safehouse? Riverside safehouse camp");
	}

	#[test]
	fn does_not_touch_partial_words() {
		let out = apply_aliases("baseball bases", [("base", "safehouse")]);

		assert_eq!(out, "baseball bases");
	}

	#[test]
	fn replacement_is_literal() {
		let out = apply_aliases("ip?", [("ip", "$1 server address")]);

		assert_eq!(out, "$1 server address?");
	}

	#[test]
	fn triggers_with_regex_metacharacters_are_escaped() {
		let out = apply_aliases("how about m.p. now", [("m.p", "multiplayer")]);

		assert_eq!(out, "how about multiplayer. now");

		let untouched = apply_aliases("how about mXp now", [("m.p", "multiplayer")]);

		assert_eq!(untouched, "how about mXp now");
	}

	#[test]
	fn blank_triggers_are_skipped() {
		assert_eq!(apply_aliases("hello", [("  ", "bye")]), "hello");
	}

	#[test]
	fn normalizes_trigger_case_and_whitespace() {
		assert_eq!(normalize_trigger("  Ano IP "), "ano ip");
	}
}
