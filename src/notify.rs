use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::{
    model::{PantryCategory, PantryItem},
    AppError, AppResult,
};

pub const NOTIFY_EMAIL_FAILED: &str = "NOTIFY/EMAIL_FAILED";
pub const NOTIFY_SMS_FAILED: &str = "NOTIFY/SMS_FAILED";

/// Best-effort outbound notification port. Implementations must not be
/// transactional: domain operations never roll back on a send failure.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    /// Send an HTML email; returns the provider message id.
    async fn send_email(&self, to: &[String], subject: &str, html: &str) -> AppResult<String>;

    /// Send an SMS; returns the provider message sid.
    async fn send_sms(&self, to: &str, body: &str) -> AppResult<String>;
}

/// Dispatcher that forwards through the send endpoints over HTTP, attaching
/// a bearer token when one is held.
pub struct HttpDispatcher {
    client: Client,
    base_url: String,
    bearer: Option<String>,
}

impl HttpDispatcher {
    pub fn new(base_url: impl Into<String>, bearer: Option<String>) -> Self {
        HttpDispatcher {
            client: Client::new(),
            base_url: base_url.into(),
            bearer,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path));
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token);
        }
        req
    }
}

#[async_trait]
impl NotificationPort for HttpDispatcher {
    async fn send_email(&self, to: &[String], subject: &str, html: &str) -> AppResult<String> {
        let response = self
            .post("/api/send-email")
            .json(&json!({ "to": to, "subject": subject, "html": html }))
            .send()
            .await
            .map_err(AppError::from)?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("send failed");
            return Err(AppError::new(NOTIFY_EMAIL_FAILED, reason)
                .with_context("status", status.as_u16().to_string()));
        }
        Ok(body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn send_sms(&self, to: &str, body: &str) -> AppResult<String> {
        let response = self
            .post("/api/send-sms")
            .json(&json!({ "to": to, "body": body }))
            .send()
            .await
            .map_err(AppError::from)?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let reason = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("send failed");
            return Err(AppError::new(NOTIFY_SMS_FAILED, reason)
                .with_context("status", status.as_u16().to_string()));
        }
        Ok(payload
            .get("sid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

/// Email/SMS bodies. All emails share the branded wrapper; the SMS body is
/// plain text kept short enough for a single segment.
pub mod templates {
    use super::*;

    const BRAND: &str = "Kitchen Hub";

    fn wrap(recipient_name: &str, inner: &str) -> String {
        format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
             <h2 style=\"color: #ea580c;\">{BRAND}</h2>\
             <p>Hi {recipient_name},</p>\
             {inner}\
             <p style=\"color: #666; font-size: 14px;\">\
             You're receiving this because you have email notifications enabled in {BRAND}.\
             </p></div>"
        )
    }

    pub fn new_request_subject(meal: &str) -> String {
        format!("New Meal Request: {meal}")
    }

    pub fn new_request_body(recipient_name: &str, requestor: &str, meal: &str) -> String {
        wrap(
            recipient_name,
            &format!(
                "<p><strong>{requestor}</strong> has requested <strong>{meal}</strong> \
                 for an upcoming dinner. Vote on this request in the app!</p>"
            ),
        )
    }

    pub fn chef_subject(meal: &str) -> String {
        format!("You're Cooking: {meal}")
    }

    pub fn chef_body(chef_name: &str, meal: &str, date_label: &str, time: &str) -> String {
        wrap(
            chef_name,
            &format!(
                "<p>You've been scheduled to cook <strong>{meal}</strong>!</p>\
                 <p><strong>Date:</strong> {date_label}<br>\
                 <strong>Time:</strong> {time}</p>"
            ),
        )
    }

    pub fn chef_sms(meal: &str, date_label: &str, time: &str) -> String {
        format!("{BRAND}: you're cooking {meal} on {date_label} at {time}.")
    }

    pub fn message_subject(meal: &str) -> String {
        format!("Message about your request: {meal}")
    }

    pub fn message_body(creator_name: &str, sender: &str, meal: &str, message: &str) -> String {
        wrap(
            creator_name,
            &format!(
                "<p><strong>{sender}</strong> sent you a message about your meal request \
                 \"<strong>{meal}</strong>\":</p>\
                 <div style=\"background-color: #f3f4f6; padding: 16px; border-radius: 8px; margin: 16px 0;\">\
                 <p style=\"margin: 0; white-space: pre-wrap;\">{message}</p></div>"
            ),
        )
    }

    pub fn low_stock_subject(item_name: &str) -> String {
        format!("Low Stock Alert: {item_name}")
    }

    pub fn low_stock_body(recipient_name: &str, item: &PantryItem) -> String {
        let emoji = item.category.emoji();
        wrap(
            recipient_name,
            &format!(
                "<p>{emoji} <strong>{}</strong> is running low!</p>\
                 <p><strong>Current quantity:</strong> {}</p>\
                 <p>Please add it to your shopping list.</p>",
                item.name, item.quantity
            ),
        )
    }

    pub fn shopping_list_subject() -> String {
        format!("{BRAND} Shopping List")
    }

    /// Render the low-stock items grouped by category, categories in name
    /// order.
    pub fn shopping_list_body(items: &[PantryItem]) -> String {
        let mut categories: Vec<PantryCategory> = PantryCategory::ALL.to_vec();
        categories.sort_by_key(|c| c.label());

        let mut sections = String::new();
        for category in categories {
            let mut group: Vec<&PantryItem> =
                items.iter().filter(|i| i.category == category).collect();
            if group.is_empty() {
                continue;
            }
            group.sort_by(|a, b| a.name.cmp(&b.name));
            sections.push_str(&format!(
                "<h3 style=\"margin-bottom: 4px;\">{} {}</h3><ul style=\"margin-top: 4px;\">",
                category.emoji(),
                category.label()
            ));
            for item in group {
                sections.push_str(&format!(
                    "<li><strong>{}</strong> — {}</li>",
                    item.name, item.quantity
                ));
            }
            sections.push_str("</ul>");
        }

        format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
             <h2 style=\"color: #ea580c;\">{BRAND}</h2>\
             <p>These items are running low:</p>{sections}</div>"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::templates;
    use crate::model::{PantryCategory, PantryItem, PantrySource};

    fn item(name: &str, category: PantryCategory) -> PantryItem {
        PantryItem {
            id: name.to_lowercase(),
            name: name.into(),
            quantity: "1".into(),
            category,
            source: PantrySource::Other,
            low_stock: true,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn request_body_names_requestor_and_meal() {
        let body = templates::new_request_body("Aki", "Mika", "Tacos");
        assert!(body.contains("Hi Aki,"));
        assert!(body.contains("<strong>Mika</strong>"));
        assert!(body.contains("<strong>Tacos</strong>"));
    }

    #[test]
    fn shopping_list_groups_by_category_name_order() {
        let items = vec![
            item("Rice", PantryCategory::Pantry),
            item("Peas", PantryCategory::Freezer),
            item("Milk", PantryCategory::Fridge),
        ];
        let body = templates::shopping_list_body(&items);
        let freezer = body.find("Freezer").expect("freezer section");
        let fridge = body.find("Fridge").expect("fridge section");
        let pantry = body.find("Pantry").expect("pantry section");
        assert!(freezer < fridge && fridge < pantry);
        assert!(!body.contains("Produce"));
    }
}
