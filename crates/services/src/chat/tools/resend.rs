use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ports::{EmailError, EmailProviderTrait, EmailReceipt, OutgoingEmail};

static RESEND_API_URL: &str = "https://api.resend.com/emails";

const DEFAULT_SENDER_NAME: &str = "Your App";

pub struct ResendEmailProvider {
    api_key: String,
    from_address: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    id: String,
}

impl ResendEmailProvider {
    pub fn new(
        api_key: String,
        from_address: String,
        timeout: Duration,
    ) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::RequestFailed(e.to_string()))?;
        Ok(Self {
            api_key,
            from_address,
            client,
        })
    }

    /// `Sender Name <address>`; a blank name falls back to the default
    fn from_header(&self, sender_name: Option<&str>) -> String {
        let name = sender_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SENDER_NAME);
        format!("{} <{}>", name, self.from_address)
    }
}

#[async_trait::async_trait]
impl EmailProviderTrait for ResendEmailProvider {
    async fn send(&self, email: OutgoingEmail) -> Result<EmailReceipt, EmailError> {
        let body = ResendEmailRequest {
            from: self.from_header(email.sender_name.as_deref()),
            to: [email.to.as_str()],
            subject: &email.subject,
            text: &email.text,
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Resend rejected email: {}", body);
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let receipt: ResendEmailResponse = response
            .json()
            .await
            .map_err(|e| EmailError::RequestFailed(e.to_string()))?;
        Ok(EmailReceipt { id: receipt.id })
    }
}
