use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{config::SmtpConfig, id::new_uuid_v7, AppError, AppResult};

use super::EmailTransport;

/// SMTP delivery via the configured relay (Gmail by default).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|err| AppError::new("SMTP/CONFIG", err.to_string()))?
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| AppError::new("SMTP/ADDRESS", "Invalid from address")
                .with_context("from", config.from.clone()))?;
        Ok(SmtpMailer { transport, from })
    }
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> AppResult<String> {
        let mut builder = Message::builder().from(self.from.clone());
        for recipient in to {
            let mailbox: Mailbox = recipient.parse().map_err(|_| {
                AppError::new("SMTP/ADDRESS", "Invalid recipient address")
                    .with_context("to", recipient.clone())
            })?;
            builder = builder.to(mailbox);
        }

        let message_id = format!("<{}@kitchenhub>", new_uuid_v7());
        let message = builder
            .message_id(Some(message_id.clone()))
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|err| AppError::new("SMTP/BUILD", err.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|err| AppError::new("SMTP/SEND", err.to_string()))?;
        Ok(message_id)
    }
}
