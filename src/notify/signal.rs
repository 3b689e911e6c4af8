use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::error::ChannelError;
use crate::notify::InstantMessenger;

const SEND_PATH: &str = "/v2/send";
const TEXT_MODE: &str = "styled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSettings {
    /// Base URL of the REST relay, e.g. `http://signal-api:8080`.
    pub api_server: String,
    /// Registered account number; messages are sent to the same number.
    pub number: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: &'a str,
    number: &'a str,
    recipients: [&'a str; 1],
    text_mode: &'a str,
}

pub struct SignalMessenger {
    client: Client,
    endpoint: String,
    number: String,
}

impl SignalMessenger {
    pub fn new(settings: SignalSettings) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .user_agent(concat!("mark-watch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| ChannelError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint(&settings.api_server),
            number: settings.number,
        })
    }
}

fn endpoint(api_server: &str) -> String {
    format!("{}{SEND_PATH}", api_server.trim_end_matches('/'))
}

#[async_trait]
impl InstantMessenger for SignalMessenger {
    async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendRequest {
                message: text,
                number: &self.number,
                recipients: [self.number.as_str()],
                text_mode: TEXT_MODE,
            })
            .send()
            .await
            .map_err(|err| ChannelError::Transport(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{endpoint, SendRequest};

    #[test]
    fn builds_send_endpoint() {
        assert_eq!(endpoint("http://relay:8080/"), "http://relay:8080/v2/send");
        assert_eq!(endpoint("http://relay:8080"), "http://relay:8080/v2/send");
    }

    #[test]
    fn request_body_targets_own_number() {
        let body = serde_json::to_value(SendRequest {
            message: "hello",
            number: "+33600000000",
            recipients: ["+33600000000"],
            text_mode: "styled",
        })
        .expect("serializes");
        assert_eq!(
            body,
            json!({
                "message": "hello",
                "number": "+33600000000",
                "recipients": ["+33600000000"],
                "text_mode": "styled"
            })
        );
    }
}
