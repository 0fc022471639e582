use async_trait::async_trait;

use crate::AppResult;

mod email;
mod sms;

pub use email::SmtpMailer;
pub use sms::TwilioSms;

/// Provider seam behind the email endpoint.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver an HTML email; returns the message id.
    async fn send(&self, to: &[String], subject: &str, html: &str) -> AppResult<String>;
}

/// Provider seam behind the SMS endpoint.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Deliver a text; returns the provider-assigned sid.
    async fn send(&self, to: &str, body: &str) -> AppResult<String>;
}
