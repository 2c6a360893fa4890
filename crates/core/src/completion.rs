use crate::error::CompletionError;
use crate::prompt::{ContentPart, MessageContent, PromptPlan};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

/// External chat/vision completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, plan: &PromptPlan, model: &str) -> Result<String, CompletionError>;
}

pub struct OpenAiCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiCompletionClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

pub fn request_body(plan: &PromptPlan, model: &str) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": plan.system_text })];
    messages.extend(plan.turns.iter().map(|turn| {
        json!({
            "role": turn.role.as_str(),
            "content": content_value(&turn.content),
        })
    }));

    json!({
        "model": model,
        "messages": messages,
    })
}

fn content_value(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => Value::String(text.clone()),
        MessageContent::Parts(parts) => Value::Array(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => json!({ "type": "text", "text": text }),
                    ContentPart::Image { mime_type, data } => json!({
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{mime_type};base64,{}", STANDARD.encode(data)),
                        },
                    }),
                })
                .collect(),
        ),
    }
}

fn provider_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ProviderErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| format!("{status}: {}", body.trim()))
}

fn completion_text(payload: ChatCompletion) -> Result<String, CompletionError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::InvalidResponse("response has no message content".to_string()))
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    async fn complete(&self, plan: &PromptPlan, model: &str) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body(plan, model))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Provider(provider_message(status, &body)));
        }

        let payload: ChatCompletion = response
            .json()
            .await
            .map_err(|error| CompletionError::InvalidResponse(error.to_string()))?;
        completion_text(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{PromptMode, PromptTurn, Role};

    fn vision_plan() -> PromptPlan {
        PromptPlan {
            mode: PromptMode::Vision,
            system_text: "grounding rules".to_string(),
            turns: vec![
                PromptTurn {
                    role: Role::User,
                    content: MessageContent::Text("earlier".to_string()),
                },
                PromptTurn {
                    role: Role::Assistant,
                    content: MessageContent::Text("answer".to_string()),
                },
                PromptTurn {
                    role: Role::User,
                    content: MessageContent::Parts(vec![
                        ContentPart::Text("What is the total?".to_string()),
                        ContentPart::Image {
                            mime_type: "image/png".to_string(),
                            data: b"png".to_vec(),
                        },
                    ]),
                },
            ],
        }
    }

    #[test]
    fn request_body_starts_with_system_message() {
        let body = request_body(&vision_plan(), "gpt-4o");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "grounding rules");
        assert_eq!(body["messages"][2]["role"], "assistant");
    }

    #[test]
    fn images_become_data_uri_parts() {
        let body = request_body(&vision_plan(), "gpt-4o");
        let parts = &body["messages"][3]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,cG5n");
    }

    #[test]
    fn provider_error_message_is_extracted() {
        let message = provider_message(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"Invalid API key","type":"auth"}}"#,
        );
        assert_eq!(message, "Invalid API key");

        let message = provider_message(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(message, "502 Bad Gateway: upstream down");
    }

    #[test]
    fn missing_choices_is_an_invalid_response() {
        let payload: ChatCompletion =
            serde_json::from_str(r#"{"choices":[]}"#).expect("valid json");
        assert!(matches!(
            completion_text(payload),
            Err(CompletionError::InvalidResponse(_))
        ));
    }
}
