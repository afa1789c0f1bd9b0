use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::error::ChatError;

const API_BASE: &str = "https://api.openai.com/v1";

/// One entry of the ordered message list sent to the chat-completion endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ModelEntry {
    #[allow(dead_code)]
    id: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

/// Checked before any network call; an empty key or project id never
/// reaches the wire.
pub fn check_credentials(api_key: &str, project_id: &str) -> Result<(), ChatError> {
    if api_key.trim().is_empty() {
        return Err(ChatError::MissingCredentials("API key"));
    }
    if project_id.trim().is_empty() {
        return Err(ChatError::MissingCredentials("project id"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    project_id: String,
    organization_id: Option<String>,
}

impl OpenAIClient {
    pub fn new(api_key: &str, project_id: &str, organization_id: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            project_id: project_id.to_string(),
            organization_id: organization_id
                .filter(|o| !o.is_empty())
                .map(|o| o.to_string()),
        }
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Project", &self.project_id);
        match &self.organization_id {
            Some(org) => request.header("OpenAI-Organization", org),
            None => request,
        }
    }

    /// Send the ordered message list and return the raw completion text.
    pub async fn chat(&self, model: &str, messages: &[ApiMessage]) -> Result<String, ChatError> {
        let request = ChatRequest { model, messages };

        let response = self
            .with_auth(self.client.post(format!("{}/chat/completions", API_BASE)))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Provider(format!("{}: {}", status, text)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Provider(e.to_string()))?;
        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Single attempt against the model-listing endpoint. Used as the
    /// connection test; returns how many models the credentials can see.
    pub async fn count_models(&self) -> Result<usize, ChatError> {
        let response = self
            .with_auth(self.client.get(format!("{}/models", API_BASE)))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Provider(format!("{}: {}", status, text)));
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Provider(e.to_string()))?;
        Ok(models.data.len())
    }

    /// Choices offered by the model picker.
    pub fn picker_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4.1".to_string(),
            "gpt-4-turbo".to_string(),
            "gpt-3.5-turbo".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected_before_any_request() {
        let err = check_credentials("", "proj_123").unwrap_err();
        assert!(matches!(err, ChatError::MissingCredentials(_)));

        let err = check_credentials("   ", "proj_123").unwrap_err();
        assert!(matches!(err, ChatError::MissingCredentials(_)));
    }

    #[test]
    fn empty_project_id_is_rejected_before_any_request() {
        let err = check_credentials("sk-proj-abc", "").unwrap_err();
        assert!(matches!(err, ChatError::MissingCredentials(_)));
    }

    #[test]
    fn present_credentials_pass_the_precheck() {
        assert!(check_credentials("sk-proj-abc", "proj_123").is_ok());
    }

    #[test]
    fn organization_header_is_optional() {
        let client = OpenAIClient::new("sk-proj-abc", "proj_123", Some(""));
        assert!(client.organization_id.is_none());

        let client = OpenAIClient::new("sk-proj-abc", "proj_123", Some("org_456"));
        assert_eq!(client.organization_id.as_deref(), Some("org_456"));
    }
}
