use crate::error::{InterpretError, Result};
use crate::types::Command;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Fixed preamble sent ahead of every raw instruction. The reply contract
/// is a bare JSON command object, optionally fenced.
const INSTRUCTION_PREAMBLE: &str = r#"You are a desktop control command interpreter.

Parse natural language instructions into structured JSON commands.

Available actions:
- click: click on screen (coordinates or element name)
- type: write text
- screenshot: take a screenshot
- open_app: open an application
- close_app: close an application
- hotkey: press a keyboard shortcut (ctrl, alt, shift, ...)
- wait: wait for seconds
- drag: drag the mouse
- move_mouse: move the mouse to coordinates
- open_url: open a URL in the browser
- switch_tab: switch browser tab
- run_program: run a program or executable

Respond with valid JSON only, no markdown, no explanations.

Example input: "take a screenshot"
Example output: {"action": "screenshot"}

Example input: "open firefox and go to youtube"
Example output: {"action": "sequence", "tasks": [{"action": "open_app", "target": "firefox"}, {"action": "open_url", "url": "https://youtube.com"}]}

Example input: "write hello world"
Example output: {"action": "type", "target": "hello world"}

Example input: "press ctrl+c"
Example output: {"action": "hotkey", "keys": ["ctrl", "c"]}

Parse the following instruction and respond ONLY with JSON:"#;

#[derive(Clone)]
pub struct ModelInterpreter {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ModelInterpreter {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(InterpretError::MissingCredentials);
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One round trip to the chat endpoint. Any failure surfaces as an
    /// `InterpretError` for the resolver to downgrade into a rule fallback.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn interpret(&self, text: &str) -> Result<Command> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: INSTRUCTION_PREAMBLE,
                },
                ChatRequestMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(InterpretError::Http(format!(
                "chat status={status} body={body}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| InterpretError::ReplyFormat("reply has no choices".to_string()))?;

        let value: serde_json::Value = serde_json::from_str(strip_code_fence(content))?;
        let mut command = Command::from_wire(&value).ok_or_else(|| {
            InterpretError::ReplyFormat(format!("reply is not a command object: {value}"))
        })?;
        // The operator's own words are the description, whatever the model
        // chose to echo back.
        command.description = text.to_string();
        Ok(command)
    }
}

/// Strips one surrounding markdown fence and an optional `json` language
/// tag; models add them despite the JSON-only instruction.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_and_json_tags_are_stripped() {
        assert_eq!(strip_code_fence("{\"action\":\"wait\"}"), "{\"action\":\"wait\"}");
        assert_eq!(
            strip_code_fence("```json\n{\"action\":\"wait\"}\n```"),
            "{\"action\":\"wait\"}"
        );
        assert_eq!(
            strip_code_fence("```\n{\"action\":\"wait\"}\n```"),
            "{\"action\":\"wait\"}"
        );
        assert_eq!(strip_code_fence("  ```json\n{}\n```  "), "{}");
    }

    #[test]
    fn missing_credentials_are_rejected_at_construction() {
        assert!(matches!(
            ModelInterpreter::new("  ", "gpt-4o-mini", None),
            Err(InterpretError::MissingCredentials)
        ));
    }
}
