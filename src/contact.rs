use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ConfigError, GalleryError};
use crate::models::{ContactEnquiry, ContactEnquiryResponse, NewContactEnquiry};
use crate::settings::MailSettings;

pub const NAME_MAX_LENGTH: usize = 70;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const SUBJECT_MAX_LENGTH: usize = 78;
pub const BODY_MAX_LENGTH: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct EnquiryRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), GalleryError> {
    if value.chars().count() > max {
        return Err(GalleryError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

impl EnquiryRequest {
    pub fn validate(&self) -> Result<(), GalleryError> {
        if self.name.trim().is_empty() {
            return Err(GalleryError::validation("name is required"));
        }
        check_length("name", &self.name, NAME_MAX_LENGTH)?;
        check_length("email", &self.email, EMAIL_MAX_LENGTH)?;
        check_length("subject", &self.subject, SUBJECT_MAX_LENGTH)?;
        check_length("body", &self.body, BODY_MAX_LENGTH)?;
        self.email
            .parse::<Address>()
            .map_err(|err| GalleryError::validation(format!("email is invalid: {}", err)))?;
        Ok(())
    }

    fn notification(&self) -> Notification {
        Notification {
            name: self.name.clone(),
            email: self.email.clone(),
            subject: Some(self.subject.trim())
                .filter(|subject| !subject.is_empty())
                .map(str::to_string),
            body: format!(
                "New message from {} <{}>\n\nSubject: {}\n\n{}\n",
                self.name, self.email, self.subject, self.body
            ),
        }
    }
}

/// What gets sent to the site owners for one enquiry.
#[derive(Debug, Clone)]
pub struct Notification {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Email dispatch is not configured")]
    NotConfigured,

    #[error("Invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("Could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
}

impl DispatchError {
    /// The text kept on the enquiry record.
    pub fn audit_text(&self) -> String {
        match self {
            DispatchError::Smtp(err) => match err.status() {
                Some(code) => format!(
                    "SMTP response error with status code {} - \"{}\"",
                    code, err
                ),
                None => format!("SMTP error - \"{}\"", err),
            },
            other => format!("SMTP error - \"{}\"", other),
        }
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Used when no relay is configured. Every dispatch fails and is audited.
pub struct DisabledMailer;

impl Mailer for DisabledMailer {
    fn send(&self, _notification: &Notification) -> Result<(), DispatchError> {
        Err(DispatchError::NotConfigured)
    }
}

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
    recipients: Vec<Mailbox>,
    default_subject: String,
}

fn parse_mailbox(name: &'static str, value: &str) -> Result<Mailbox, ConfigError> {
    value.parse().map_err(|err: lettre::address::AddressError| ConfigError::Invalid {
        name,
        reason: format!("{}: {}", value, err),
    })
}

impl SmtpMailer {
    pub fn from_settings(mail: &MailSettings) -> Result<Self, ConfigError> {
        let builder = if mail.use_tls {
            SmtpTransport::starttls_relay(&mail.host).map_err(|err| ConfigError::Invalid {
                name: "EMAIL_HOST",
                reason: err.to_string(),
            })?
        } else {
            SmtpTransport::builder_dangerous(&mail.host)
        };
        let builder = builder.port(mail.port).timeout(Some(mail.timeout));
        let builder = match (&mail.user, &mail.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };
        let recipients = mail
            .contact_emails
            .iter()
            .map(|address| parse_mailbox("CONTACT_EMAILS", address))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            host = %mail.host,
            port = mail.port,
            tls = mail.use_tls,
            recipients = recipients.len(),
            "Contact mailer initialized"
        );
        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox("DEFAULT_FROM_EMAIL", &mail.from_email)?,
            recipients,
            default_subject: mail.default_subject.clone(),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        let address: Address =
            notification
                .email
                .parse()
                .map_err(|err: lettre::address::AddressError| DispatchError::Address {
                    address: notification.email.clone(),
                    reason: err.to_string(),
                })?;
        let reply_to = Mailbox::new(Some(notification.name.clone()), address);
        let subject = notification
            .subject
            .clone()
            .unwrap_or_else(|| self.default_subject.clone());

        let mut builder = Message::builder()
            .from(self.from.clone())
            .reply_to(reply_to)
            .subject(subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())?;
        self.transport.send(&email)?;
        tracing::info!(recipients = self.recipients.len(), "Contact notification sent");
        Ok(())
    }
}

impl ContactEnquiry {
    pub fn email_sent_ok(&self) -> bool {
        self.email_error.is_none()
    }

    pub fn to_response(&self) -> ContactEnquiryResponse {
        ContactEnquiryResponse {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            email_sent_ok: self.email_sent_ok(),
            created_time: self.created_time,
        }
    }
}

/// Records an enquiry and notifies the site owners. A failed notification
/// does not fail the enquiry; its description is stored on the record.
pub fn create_enquiry(
    conn: &SqliteConnection,
    mailer: &dyn Mailer,
    request: &EnquiryRequest,
) -> Result<ContactEnquiry, GalleryError> {
    use crate::schema::contact_enquiry;

    request.validate()?;
    let email_error = match mailer.send(&request.notification()) {
        Ok(()) => None,
        Err(err) => {
            let audit = err.audit_text();
            tracing::warn!(email = %request.email, error = %audit, "Contact notification failed");
            Some(audit)
        }
    };

    let id = Uuid::new_v4().to_string();
    diesel::insert_into(contact_enquiry::table)
        .values(&NewContactEnquiry {
            id: &id,
            name: &request.name,
            email: &request.email,
            subject: &request.subject,
            body: &request.body,
            email_error: email_error.as_deref(),
            created_time: Utc::now().naive_utc(),
        })
        .execute(conn)?;
    let record = contact_enquiry::table.find(&id).first(conn)?;
    Ok(record)
}

pub fn list_enquiries(conn: &SqliteConnection) -> Result<Vec<ContactEnquiry>, GalleryError> {
    use crate::schema::contact_enquiry::dsl::*;
    let result = contact_enquiry
        .order((created_time.desc(), id.asc()))
        .load(conn)?;
    Ok(result)
}
