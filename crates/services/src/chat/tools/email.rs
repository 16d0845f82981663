use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::executor::{parse_input, ToolExecutionContext, ToolExecutor, ToolOutput};
use super::ports::{EmailProviderTrait, OutgoingEmail};
use crate::chat::errors::ToolError;

pub const EMAIL_TOOL_NAME: &str = "emailSender";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailInput {
    to: String,
    subject: String,
    message: String,
    #[serde(default)]
    sender_name: Option<String>,
}

/// Sends an email on the user's behalf. The system prompt requires the
/// model to confirm recipient and content with the user first.
pub struct EmailToolExecutor {
    provider: Arc<dyn EmailProviderTrait>,
}

impl EmailToolExecutor {
    pub fn new(provider: Arc<dyn EmailProviderTrait>) -> Self {
        Self { provider }
    }
}

fn looks_like_address(address: &str) -> bool {
    match address.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[async_trait]
impl ToolExecutor for EmailToolExecutor {
    fn name(&self) -> &str {
        EMAIL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Send an email. Only call this after the user has confirmed the recipient, subject \
         and message."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "description": "Recipient email address"},
                "subject": {"type": "string"},
                "message": {"type": "string", "description": "Plain text body"},
                "senderName": {"type": "string", "description": "Name shown as the sender"}
            },
            "required": ["to", "subject", "message"]
        })
    }

    async fn execute(
        &self,
        input: &Value,
        context: &ToolExecutionContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let input: EmailInput = parse_input(self.name(), input)?;
        if !looks_like_address(&input.to) {
            return Err(ToolError::invalid_input(
                self.name(),
                format!("'{}' is not an email address", input.to),
            ));
        }

        tracing::info!(chat_id = %context.chat_id, user_id = %context.user.id, "Sending email");

        let receipt = self
            .provider
            .send(OutgoingEmail {
                to: input.to.trim().to_string(),
                subject: input.subject,
                text: input.message,
                sender_name: input.sender_name,
            })
            .await
            .map_err(|e| ToolError::execution(EMAIL_TOOL_NAME, e))?;

        Ok(ToolOutput::Json(json!({
            "success": true,
            "data": { "id": receipt.id }
        })))
    }

    fn handle_error(&self, error: &ToolError) -> Value {
        json!({ "success": false, "error": error.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, UserId};
    use crate::chat::models::ChatId;
    use crate::chat::tools::ports::{EmailError, EmailReceipt, MockEmailProviderTrait};

    async fn run_with(
        provider: MockEmailProviderTrait,
        input: Value,
    ) -> Result<ToolOutput, ToolError> {
        let executor = EmailToolExecutor::new(Arc::new(provider));
        let chat_id = ChatId::from("c1");
        let user = AuthenticatedUser {
            id: UserId::from("u1"),
            name: "Ada".to_string(),
            email: None,
        };
        executor
            .execute(
                &input,
                &ToolExecutionContext {
                    chat_id: &chat_id,
                    user: &user,
                },
            )
            .await
    }

    #[test]
    fn test_looks_like_address() {
        assert!(looks_like_address("bob@example.com"));
        assert!(looks_like_address(" bob@example.com "));
        assert!(!looks_like_address("bob"));
        assert!(!looks_like_address("@example.com"));
        assert!(!looks_like_address("bob@localhost"));
    }

    #[tokio::test]
    async fn test_sends_email() {
        let mut provider = MockEmailProviderTrait::new();
        provider
            .expect_send()
            .withf(|email| {
                email.to == "bob@example.com"
                    && email.text == "See you"
                    && email.sender_name.as_deref() == Some("Ada")
            })
            .times(1)
            .returning(|_| {
                Ok(EmailReceipt {
                    id: "em_1".to_string(),
                })
            });

        let output = run_with(
            provider,
            json!({"to": "bob@example.com", "subject": "Hi", "message": "See you", "senderName": "Ada"}),
        )
        .await
        .unwrap();
        assert_eq!(
            output.to_value(),
            json!({"success": true, "data": {"id": "em_1"}})
        );
    }

    #[tokio::test]
    async fn test_rejects_bad_recipient() {
        let mut provider = MockEmailProviderTrait::new();
        provider.expect_send().never();

        let result = run_with(
            provider,
            json!({"to": "bob", "subject": "Hi", "message": "x"}),
        )
        .await;
        assert!(matches!(result, Err(ToolError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_provider_rejection_and_error_shape() {
        let mut provider = MockEmailProviderTrait::new();
        provider.expect_send().returning(|_| {
            Err(EmailError::Rejected {
                status: 403,
                body: "domain not verified".to_string(),
            })
        });

        let executor_error = run_with(
            provider,
            json!({"to": "bob@example.com", "subject": "Hi", "message": "x"}),
        )
        .await
        .unwrap_err();

        let executor = EmailToolExecutor::new(Arc::new(MockEmailProviderTrait::new()));
        let output = executor.handle_error(&executor_error);
        assert_eq!(output["success"], false);
        assert!(output["error"]
            .as_str()
            .unwrap()
            .contains("domain not verified"));
    }
}
