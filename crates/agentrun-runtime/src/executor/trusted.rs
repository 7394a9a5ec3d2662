//! General-purpose executor for trusted payloads.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use agentrun_core::{Task, TaskResult};

use super::{Executor, ExecutorError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes trusted tasks. When the payload carries an `llm` entry it is
/// forwarded verbatim as an OpenAI-style chat-completion body to the
/// configured provider; otherwise the task is a short simulated unit of
/// work that always succeeds.
pub struct TrustedExecutor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl TrustedExecutor {
    /// Create an executor against the given provider base URL.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn forward_chat_completion(&self, body: &Value) -> Result<Value, ExecutorError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, "Forwarding chat completion request");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutorError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| ExecutorError::Provider(e.to_string()))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| ExecutorError::Provider(format!("invalid provider response: {e}")))
    }
}

#[async_trait]
impl Executor for TrustedExecutor {
    fn name(&self) -> &'static str {
        "trusted"
    }

    async fn execute(&self, task: &Task) -> Result<TaskResult, ExecutorError> {
        if let Some(llm) = task.payload.get("llm") {
            let output = self.forward_chat_completion(llm).await?;
            info!(task_id = %task.id, "Chat completion returned");
            return Ok(TaskResult::ok(output)
                .with_logs(vec!["forwarded chat completion to provider".to_string()]));
        }

        // Simulated unit of work for payloads with nothing to route.
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(TaskResult::ok(json!({
            "message": "task executed",
            "taskId": task.id.as_str(),
        }))
        .with_logs(vec!["executed simulated work unit".to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_core::TaskSpec;
    use serde_json::Map;

    #[tokio::test]
    async fn test_plain_payload_succeeds() {
        let executor = TrustedExecutor::new("http://localhost:0", None);
        let mut payload = Map::new();
        payload.insert("_test".to_string(), json!(true));
        let task = Task::new(TaskSpec::new(payload));

        let result = executor.execute(&task).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_ref().unwrap()["taskId"], json!(task.id.as_str()));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_infrastructure_error() {
        // Port 0 is never connectable; the request must fail fast.
        let executor = TrustedExecutor::new("http://127.0.0.1:0", None);
        let mut payload = Map::new();
        payload.insert("llm".to_string(), json!({ "messages": [] }));
        let task = Task::new(TaskSpec::new(payload));

        let result = executor.execute(&task).await;
        assert!(matches!(result, Err(ExecutorError::Provider(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let executor = TrustedExecutor::new("http://example.test/v1/", None);
        assert_eq!(executor.base_url, "http://example.test/v1");
    }
}
