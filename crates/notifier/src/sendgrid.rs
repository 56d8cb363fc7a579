//! SendGrid email delivery.
//!
//! Recipients come from a marketing contact list. The list is exported on
//! every notification (the export is asynchronous on SendGrid's side, so we
//! poll it until it is ready), then one templated email per recipient is sent
//! in a single `mail/send` call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use livewatch_common::config::AppConfig;
use livewatch_common::error::NotifyError;

use crate::{LivePayload, Notifier};

/// Seconds between two export status polls.
const DEFAULT_EXPORT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Give up on an export after this many polls.
const DEFAULT_EXPORT_MAX_POLLS: u32 = 60;

#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub base_url: String,
    pub from_email: String,
    pub template_id: String,
    pub list_id: String,
    pub export_poll_interval: Duration,
    pub export_max_polls: u32,
}

impl SendGridConfig {
    /// Build from app config. Returns `None` when no API key is configured.
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        let api_key = config.sendgrid_api_key.clone()?;
        Some(Self {
            api_key,
            base_url: config.sendgrid_base_url.trim_end_matches('/').to_string(),
            from_email: config.notify_from_email.clone().unwrap_or_default(),
            template_id: config.notify_template_id.clone().unwrap_or_default(),
            list_id: config.notify_list_id.clone().unwrap_or_default(),
            export_poll_interval: DEFAULT_EXPORT_POLL_INTERVAL,
            export_max_polls: DEFAULT_EXPORT_MAX_POLLS,
        })
    }
}

#[derive(Debug, Serialize)]
struct ExportRequest<'a> {
    list_ids: [&'a str; 1],
    file_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExportCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ExportStatus {
    status: String,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportedContact {
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [EmailAddress<'a>; 1],
    dynamic_template_data: &'a LivePayload,
}

#[derive(Debug, Serialize)]
struct MailSend<'a> {
    from: EmailAddress<'a>,
    personalizations: Vec<Personalization<'a>>,
    template_id: &'a str,
}

/// Notifier that emails a SendGrid contact list through a dynamic template.
pub struct SendGridNotifier {
    client: reqwest::Client,
    config: SendGridConfig,
}

impl SendGridNotifier {
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Export the configured contact list and return its email addresses.
    pub async fn export_contacts(&self) -> Result<Vec<String>, NotifyError> {
        let created: ExportCreated = self
            .send_json(self.client.post(self.url("/v3/marketing/contacts/exports")).json(
                &ExportRequest {
                    list_ids: [self.config.list_id.as_str()],
                    file_type: "json",
                },
            ))
            .await?;

        tracing::debug!(export_id = %created.id, "Contact export started");

        let status = self.wait_for_export(&created.id).await?;
        let download = status
            .urls
            .first()
            .ok_or_else(|| NotifyError::ExportFailed("ready export has no download url".into()))?;

        let body = self.client.get(download).send().await?;
        let body = check_status(body).await?.text().await?;

        Ok(parse_exported_emails(&body))
    }

    async fn wait_for_export(&self, export_id: &str) -> Result<ExportStatus, NotifyError> {
        let status_url = self.url(&format!("/v3/marketing/contacts/exports/{export_id}"));

        for poll in 0..self.config.export_max_polls {
            let status: ExportStatus = self.send_json(self.client.get(&status_url)).await?;

            match status.status.as_str() {
                "ready" => return Ok(status),
                "failure" => {
                    let reason = status.message.unwrap_or_else(|| "unknown reason".into());
                    tracing::error!(export_id, %reason, "Contact export failed");
                    return Err(NotifyError::ExportFailed(reason));
                }
                other => {
                    tracing::debug!(export_id, poll, status = other, "Contact export pending");
                    tokio::time::sleep(self.config.export_poll_interval).await;
                }
            }
        }

        Err(NotifyError::ExportTimedOut)
    }

    /// Send the live template to every address in `emails`.
    pub async fn send_template(
        &self,
        emails: &[String],
        payload: &LivePayload,
    ) -> Result<(), NotifyError> {
        let body = MailSend {
            from: EmailAddress {
                email: &self.config.from_email,
            },
            personalizations: emails
                .iter()
                .map(|email| Personalization {
                    to: [EmailAddress { email }],
                    dynamic_template_data: payload,
                })
                .collect(),
            template_id: &self.config.template_id,
        };

        let response = self
            .client
            .post(self.url("/v3/mail/send"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        tracing::info!(
            recipients = emails.len(),
            status = response.status().as_u16(),
            "Live notification email sent"
        );
        Ok(())
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, NotifyError> {
        let response = request.bearer_auth(&self.config.api_key).send().await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| NotifyError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn notify(&self, payload: &LivePayload) -> Result<(), NotifyError> {
        let emails = self.export_contacts().await?;

        if emails.is_empty() {
            tracing::warn!(list_id = %self.config.list_id, "Contact list is empty, nothing to send");
            return Ok(());
        }

        self.send_template(&emails, payload).await
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Pull the `email` field out of a newline-delimited JSON export.
fn parse_exported_emails(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<ExportedContact>(line) {
            Ok(contact) => contact.email,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed exported contact");
                None
            }
        })
        .filter(|email| !email.is_empty())
        .collect()
}
