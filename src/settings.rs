use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// SMTP relay used for contact notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub contact_emails: Vec<String>,
    pub timeout: Duration,
    pub default_subject: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub upload_path: String,
    pub media_url: String,
    pub image_workers: usize,
    pub max_upload_bytes: usize,
    pub site_name: String,
    /// `None` when no relay is configured; enquiries are then recorded
    /// with a dispatch error.
    pub mail: Option<MailSettings>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let site_name = var("SITE_NAME").unwrap_or_else(|| "the gallery".to_string());
        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);

        let mail = match var("EMAIL_HOST") {
            None => None,
            Some(host) => Some(MailSettings {
                port: parse_or("EMAIL_PORT", var("EMAIL_PORT"), 587)?,
                use_tls: var("EMAIL_USE_TLS")
                    .map(|value| value.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                user: var("EMAIL_HOST_USER"),
                password: var("EMAIL_HOST_PASSWORD"),
                from_email: var("DEFAULT_FROM_EMAIL")
                    .ok_or(ConfigError::Missing("DEFAULT_FROM_EMAIL"))?,
                contact_emails: parse_list("CONTACT_EMAILS", var("CONTACT_EMAILS"))?,
                timeout: Duration::from_secs(parse_or(
                    "EMAIL_TIMEOUT_SECS",
                    var("EMAIL_TIMEOUT_SECS"),
                    10,
                )?),
                default_subject: format!("New contact at {}", site_name),
                host,
            }),
        };

        Ok(Self {
            database_url,
            upload_path: var("UPLOAD_PATH").unwrap_or_else(|| "./files".to_string()),
            media_url: var("MEDIA_URL").unwrap_or_else(|| "/media".to_string()),
            image_workers: parse_or("IMAGE_WORKERS", var("IMAGE_WORKERS"), default_workers)?,
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                var("MAX_UPLOAD_BYTES"),
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            site_name,
            mail,
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
        }),
    }
}

fn parse_list(name: &'static str, value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let list: Vec<String> = value
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if list.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(list)
}
