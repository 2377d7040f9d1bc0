use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone)]
pub struct PushClient {
    client: Client,
    endpoint: String,
    server_key: String,
}

#[derive(Debug, Serialize)]
struct FcmNotification {
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct FcmRequest {
    to: String,
    notification: FcmNotification,
    data: HashMap<String, String>,
    priority: &'static str,
}

impl PushClient {
    pub fn new(endpoint: &str, server_key: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            server_key: server_key.to_string(),
        }
    }

    /// Send a push notification to a device token.
    ///
    /// A `None` token is a silent no-op (the partner never registered a
    /// device). Delivery failures are returned as strings so callers can
    /// log them without unwinding the request that triggered the push.
    pub async fn send(
        &self,
        token: Option<&str>,
        title: &str,
        body: &str,
        data: HashMap<String, String>,
    ) -> Result<(), String> {
        let Some(token) = token else {
            return Ok(());
        };

        let request = FcmRequest {
            to: token.to_string(),
            notification: FcmNotification {
                title: title.to_string(),
                body: body.to_string(),
            },
            data,
            priority: "high",
        };

        let response = self.client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("push send failed: {e}"))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("push API error: {body}"));
        }

        tracing::debug!(title = %title, "push notification sent");
        Ok(())
    }
}
