//! Outbound alert mail.

use async_trait::async_trait;
use common::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Alert templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTemplate {
    /// Context: `website_name`
    WebsiteOffline,
    /// Context: `website_name`, `route_path`
    RouteFailure,
}

impl MailTemplate {
    pub fn subject(&self) -> &'static str {
        match self {
            MailTemplate::WebsiteOffline => "Website Offline Alert",
            MailTemplate::RouteFailure => "Route Error Alert",
        }
    }

    /// Render the HTML body, leaving missing keys empty
    pub fn render(&self, context: &BTreeMap<String, String>) -> String {
        let get = |key: &str| context.get(key).map(String::as_str).unwrap_or_default();
        match self {
            MailTemplate::WebsiteOffline => format!(
                "<p>Dear User,</p>\n\
                 <p>We have detected that your website <strong>{}</strong> is currently offline.</p>\n\
                 <p>Please take the necessary actions to bring your website back online.</p>\n\
                 <p>Thank you,</p>\n<p>Your Monitoring Team</p>\n",
                get("website_name")
            ),
            MailTemplate::RouteFailure => format!(
                "<p>Dear User,</p>\n\
                 <p>We have detected an error in the route <strong>{}</strong> on your website <strong>{}</strong>.</p>\n\
                 <p>Please check the route and take the necessary actions to fix the issue.</p>\n\
                 <p>Thank you,</p>\n<p>Your Monitoring Team</p>\n",
                get("route_path"),
                get("website_name")
            ),
        }
    }
}

impl fmt::Display for MailTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailTemplate::WebsiteOffline => write!(f, "website_offline"),
            MailTemplate::RouteFailure => write!(f, "route_failure"),
        }
    }
}

/// A message handed to the mail collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub template: MailTemplate,
    pub context: BTreeMap<String, String>,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, template: MailTemplate) -> Self {
        Self {
            to: to.into(),
            subject: template.subject().to_string(),
            template,
            context: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn html(&self) -> String {
        self.template.render(&self.context)
    }
}

/// Mail collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<()>;
}

/// Mailer that only logs what it would send
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            template = %message.template,
            "Alert email"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    template: MailTemplate,
    context: &'a BTreeMap<String, String>,
    html: String,
}

/// Mailer that POSTs each message as JSON to a mail relay
pub struct WebhookMailer {
    url: String,
    from: String,
    client: reqwest::Client,
}

impl WebhookMailer {
    pub fn new(url: impl Into<String>, from: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::config)?;

        Ok(Self {
            url: url.into(),
            from: from.into(),
            client,
        })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            template: message.template,
            context: &message.context,
            html: message.html(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(Error::delivery)?;

        if !response.status().is_success() {
            return Err(Error::delivery(format!(
                "mail relay answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}
