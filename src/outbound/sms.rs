use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::{config::TwilioConfig, AppError, AppResult};

use super::SmsProvider;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio Messages API over HTTP basic auth.
pub struct TwilioSms {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSms {
    pub fn new(config: TwilioConfig) -> Self {
        TwilioSms {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SmsProvider for TwilioSms {
    async fn send(&self, to: &str, body: &str) -> AppResult<String> {
        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(AppError::from)?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let reason = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("provider rejected the message");
            return Err(AppError::new("TWILIO/SEND", reason)
                .with_context("status", status.as_u16().to_string()));
        }

        Ok(payload
            .get("sid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}
