use quarry_domain::facts;
use quarry_providers::completion::{ChatReply, ChatRequest, ResponseMode, ToolSpec};

use crate::{QuarryService, Result};

pub const RECORD_FACTS_TOOL: &str = "record_facts";

const JSON_SYSTEM_PROMPT: &str = "You are a precise information extractor. \
Return ONLY valid JSON: {\"facts\": [\"string\", ...]}. \
Rules: 5-12 concise standalone facts, no opinions, no duplicates, at most 280 characters each.";
const TOOL_SYSTEM_PROMPT: &str = "You are a precise information extractor. \
Call record_facts with 5-12 concise standalone facts, no opinions, no duplicates, \
at most 280 characters each.";
const TEXT_SYSTEM_PROMPT: &str = "List 5-12 concise factual statements, one per line.";

impl QuarryService {
	/// Distils `text` into short factual statements.
	///
	/// Asks for a JSON object first, then for a forced `record_facts` call, then for plain lines.
	/// Malformed replies never fail the call; only transport failures are returned as errors.
	pub async fn extract_facts(&self, text: &str, label: &str) -> Result<Vec<String>> {
		let cfg = &self.cfg.extractor;

		if text.trim().is_empty() {
			return Ok(Vec::new());
		}

		let input = facts::truncate_text(text, cfg.max_input_chars);
		let user = format!(
			"Extract key factual statements from the following context about {label}:\n\n{input}"
		);
		let mut leftover = None;
		let json_reply = self.complete(JSON_SYSTEM_PROMPT, &user, ResponseMode::JsonObject).await?;

		if let Some(reply) = json_reply {
			if let Some(found) = reply.content.as_deref().and_then(facts::parse_facts_object) {
				return Ok(facts::clean_facts(found, cfg.max_fact_chars));
			}

			tracing::debug!(label, "JSON-mode reply did not parse. Retrying with a tool call.");

			leftover = reply.content;
		}
		if let Some(reply) = self.complete(TOOL_SYSTEM_PROMPT, &user, record_facts_mode()).await? {
			if let Some(found) = tool_facts(&reply) {
				return Ok(facts::clean_facts(found, cfg.max_fact_chars));
			}

			tracing::debug!(label, "Tool-call reply did not parse. Retrying with plain text.");

			leftover = reply.content.or(reply.tool_arguments).or(leftover);
		}

		let raw = match self.complete(TEXT_SYSTEM_PROMPT, &input, ResponseMode::Text).await? {
			Some(reply) => reply.content.or(leftover).unwrap_or_default(),
			None => leftover.unwrap_or_default(),
		};

		Ok(facts::clean_facts(facts::coerce_facts(&raw, cfg.max_facts), cfg.max_fact_chars))
	}

	/// Sends one completion request, turning a refused request shape into `None`.
	async fn complete(
		&self,
		system: &str,
		user: &str,
		mode: ResponseMode,
	) -> Result<Option<ChatReply>> {
		let mode_name = mode_name(&mode);
		let request = ChatRequest::new(system, user, mode);
		let cfg = &self.cfg.providers.llm_extractor;

		match self.providers.completion.complete(cfg, &request).await {
			Ok(reply) => Ok(Some(reply)),
			Err(err) if err.is_recoverable() => {
				tracing::debug!(mode = mode_name, error = %err, "Completion mode was refused.");

				Ok(None)
			},
			Err(err) => Err(err.into()),
		}
	}
}

fn record_facts_mode() -> ResponseMode {
	ResponseMode::Tool(ToolSpec {
		name: RECORD_FACTS_TOOL.to_string(),
		description: "Record the key factual statements found in the context.".to_string(),
		parameters: serde_json::json!({
			"type": "object",
			"properties": {
				"facts": {
					"type": "array",
					"items": { "type": "string", "maxLength": 280 },
					"minItems": 5,
					"maxItems": 12,
				},
			},
			"required": ["facts"],
			"additionalProperties": false,
		}),
	})
}

fn tool_facts(reply: &ChatReply) -> Option<Vec<String>> {
	reply
		.tool_arguments
		.as_deref()
		.and_then(facts::parse_facts_object)
		.or_else(|| reply.content.as_deref().and_then(facts::parse_facts_object))
}

fn mode_name(mode: &ResponseMode) -> &'static str {
	match mode {
		ResponseMode::Text => "text",
		ResponseMode::JsonObject => "json_object",
		ResponseMode::Tool(_) => "tool",
	}
}
