use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// How the completion service is asked to shape its reply.
#[derive(Debug, Clone)]
pub enum ResponseMode {
	Text,
	JsonObject,
	/// Forces a single call to the given function.
	Tool(ToolSpec),
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
	pub name: String,
	pub description: String,
	pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
	pub messages: Vec<Value>,
	pub mode: ResponseMode,
}
impl ChatRequest {
	pub fn new(system: &str, user: &str, mode: ResponseMode) -> Self {
		Self {
			messages: vec![
				serde_json::json!({ "role": "system", "content": system }),
				serde_json::json!({ "role": "user", "content": user }),
			],
			mode,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
	pub content: Option<String>,
	/// Raw JSON arguments of the first tool call, if the model made one.
	pub tool_arguments: Option<String>,
}

pub async fn complete(
	cfg: &quarry_config::LlmProviderConfig,
	request: &ChatRequest,
) -> Result<ChatReply> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = build_body(cfg, request);
	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json = crate::read_json(res).await?;

	parse_chat_reply(json)
}

fn build_body(cfg: &quarry_config::LlmProviderConfig, request: &ChatRequest) -> Value {
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": request.messages,
	});

	match &request.mode {
		ResponseMode::Text => {},
		ResponseMode::JsonObject => {
			body["response_format"] = serde_json::json!({ "type": "json_object" });
		},
		ResponseMode::Tool(tool) => {
			body["tools"] = serde_json::json!([{
				"type": "function",
				"function": {
					"name": tool.name,
					"description": tool.description,
					"parameters": tool.parameters,
				},
			}]);
			body["tool_choice"] = serde_json::json!({
				"type": "function",
				"function": { "name": tool.name },
			});
		},
	}

	body
}

fn parse_chat_reply(json: Value) -> Result<ChatReply> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing choices[0].message.".to_string(),
		})?;
	let content = message.get("content").and_then(|c| c.as_str()).map(str::to_string);
	let tool_arguments = message
		.get("tool_calls")
		.and_then(|v| v.as_array())
		.and_then(|calls| calls.first())
		.and_then(|call| call.get("function"))
		.and_then(|function| function.get("arguments"))
		.and_then(|args| args.as_str())
		.map(str::to_string);

	Ok(ChatReply { content, tool_arguments })
}
