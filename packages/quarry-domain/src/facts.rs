use std::{borrow::Cow, collections::HashSet, sync::OnceLock};

use regex::Regex;
use serde_json::Value;

pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Keeps the first `max_chars` characters of `text`, appending [`TRUNCATION_MARKER`] when
/// anything was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> Cow<'_, str> {
	match text.char_indices().nth(max_chars) {
		None => Cow::Borrowed(text),
		Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
	}
}

/// Order-preserving de-duplication by exact text.
pub fn dedupe_preserve_order<I, S>(items: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for item in items {
		let item = item.into();

		if seen.insert(item.clone()) {
			out.push(item);
		}
	}

	out
}

/// Reads `{"facts": [...]}` out of a JSON value, keeping only non-blank string entries.
///
/// Returns `None` when the value is not an object with a `facts` array.
pub fn facts_from_value(value: &Value) -> Option<Vec<String>> {
	let items = value.get("facts")?.as_array()?;

	Some(
		items
			.iter()
			.filter_map(Value::as_str)
			.filter(|fact| !fact.trim().is_empty())
			.map(str::to_string)
			.collect(),
	)
}

/// Strict parse of a model reply that is supposed to be exactly `{"facts": [...]}`.
pub fn parse_facts_object(raw: &str) -> Option<Vec<String>> {
	let value: Value = serde_json::from_str(raw.trim()).ok()?;

	facts_from_value(&value)
}

/// Best-effort recovery of facts from arbitrary model text.
///
/// Tries, in order: the whole text as `{"facts": [...]}`, the first `{...}` block inside it,
/// one fact per line with bullet markers removed (at most `max_lines`), and finally the whole
/// trimmed text as a single fact.
pub fn coerce_facts(raw: &str, max_lines: usize) -> Vec<String> {
	if let Some(facts) = parse_facts_object(raw) {
		return facts;
	}
	if let Some(block) = object_block().and_then(|re| re.find(raw))
		&& let Some(facts) = parse_facts_object(block.as_str())
	{
		return facts;
	}

	let lines = split_fact_lines(raw, max_lines);

	if !lines.is_empty() {
		return lines;
	}

	let trimmed = raw.trim();

	if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] }
}

/// One fact per non-empty line, leading bullet and dash markers stripped.
pub fn split_fact_lines(raw: &str, max_lines: usize) -> Vec<String> {
	raw.lines()
		.map(strip_bullet)
		.filter(|line| !line.is_empty())
		.take(max_lines)
		.map(str::to_string)
		.collect()
}

/// Trims every fact, drops blank ones and clips the rest to `max_chars` characters.
pub fn clean_facts(facts: Vec<String>, max_chars: usize) -> Vec<String> {
	facts
		.into_iter()
		.filter_map(|fact| {
			let trimmed = fact.trim();

			if trimmed.is_empty() {
				return None;
			}

			Some(match trimmed.char_indices().nth(max_chars) {
				Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
				None => trimmed.to_string(),
			})
		})
		.collect()
}

/// Joins retrieved chunk texts into one block separated by blank lines.
pub fn join_chunk_texts<'a, I>(texts: I) -> String
where
	I: IntoIterator<Item = &'a str>,
{
	texts
		.into_iter()
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.collect::<Vec<_>>()
		.join("\n\n")
}

fn strip_bullet(line: &str) -> &str {
	line.trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | '\t' | ' ')).trim()
}

fn object_block() -> Option<&'static Regex> {
	static OBJECT_BLOCK: OnceLock<Option<Regex>> = OnceLock::new();

	OBJECT_BLOCK.get_or_init(|| Regex::new(r"(?s)\{.*\}").ok()).as_ref()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncation_is_char_safe() {
		let text = "ééééé";
		assert_eq!(truncate_text(text, 3), format!("ééé{TRUNCATION_MARKER}"));
		assert_eq!(truncate_text(text, 5), "ééééé");
		assert_eq!(truncate_text("", 0), "");
	}

	#[test]
	fn strips_bullets_but_keeps_inner_dashes() {
		assert_eq!(strip_bullet("- Fact A"), "Fact A");
		assert_eq!(strip_bullet("• Fact - B"), "Fact - B");
		assert_eq!(strip_bullet("\t* Fact C "), "Fact C");
	}
}
