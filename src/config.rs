use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

/// SMTP credentials for the email endpoint. Missing env vars leave this
/// unset and the endpoint answers "not configured".
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

/// Twilio credentials for the SMS endpoint.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub smtp: Option<SmtpConfig>,
    pub twilio: Option<TwilioConfig>,
    /// When set, /api/send-email also demands a bearer token; /api/send-sms
    /// always does.
    pub require_email_auth: bool,
    /// Where the store's dispatcher posts its sends.
    pub api_base_url: String,
    pub api_token: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        let smtp = match (var("SMTP_USER"), var("SMTP_PASSWORD")) {
            (Ok(user), Ok(password)) => {
                let from = var("SMTP_FROM").unwrap_or_else(|_| format!("Kitchen Hub <{user}>"));
                Some(SmtpConfig {
                    host: try_load("SMTP_HOST", "smtp.gmail.com"),
                    user,
                    password,
                    from,
                })
            }
            _ => {
                warn!("SMTP credentials not configured; email sending disabled");
                None
            }
        };

        let twilio = match (
            var("TWILIO_ACCOUNT_SID"),
            var("TWILIO_AUTH_TOKEN"),
            var("TWILIO_PHONE_NUMBER"),
        ) {
            (Ok(account_sid), Ok(auth_token), Ok(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => {
                warn!("Twilio credentials not configured; SMS sending disabled");
                None
            }
        };

        Self {
            port: try_load("KITCHEN_PORT", "8080"),
            db_path: PathBuf::from(try_load::<String>("KITCHEN_DB", "kitchenhub.sqlite")),
            smtp,
            twilio,
            require_email_auth: try_load::<String>("KITCHEN_EMAIL_AUTH", "false")
                .eq_ignore_ascii_case("true"),
            api_base_url: try_load("KITCHEN_API_BASE", "http://127.0.0.1:8080"),
            api_token: var("KITCHEN_API_TOKEN").ok(),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| ())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
