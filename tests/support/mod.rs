#![allow(dead_code)] // not every test binary touches every helper

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;

use kitchenhub_lib::{
    gateway::Gateway, migrate::apply_migrations, notify::NotificationPort, store::KitchenStore,
    AppError, AppResult,
};

/// One recorded outbound send.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Email {
        to: Vec<String>,
        subject: String,
        html: String,
    },
    Sms {
        to: String,
        body: String,
    },
}

/// Notification port that records every send; can be flipped into a failing
/// mode to simulate a provider outage.
#[derive(Default)]
pub struct RecordingPort {
    sent: Mutex<Vec<Sent>>,
    fail: AtomicBool,
}

impl RecordingPort {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn emails(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Email { .. }))
            .collect()
    }

    pub fn sms(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Sms { .. }))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationPort for RecordingPort {
    async fn send_email(&self, to: &[String], subject: &str, html: &str) -> AppResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::new("NOTIFY/EMAIL_FAILED", "provider down"));
        }
        self.sent.lock().unwrap().push(Sent::Email {
            to: to.to_vec(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok("msg-1".into())
    }

    async fn send_sms(&self, to: &str, body: &str) -> AppResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::new("NOTIFY/SMS_FAILED", "provider down"));
        }
        self.sent.lock().unwrap().push(Sent::Sms {
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok("SM1".into())
    }
}

pub async fn setup_store() -> (Arc<KitchenStore>, Arc<RecordingPort>) {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    apply_migrations(&pool).await.expect("apply migrations");

    let gateway = Arc::new(Gateway::new(pool));
    let port = Arc::new(RecordingPort::default());
    let store = KitchenStore::new(gateway, port.clone());
    (store, port)
}
