use super::notifier::{Alert, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

const DISCORD_CONTENT_LIMIT: usize = 2000;

pub(crate) struct DiscordAlertSink {
    webhook_url: Url,
    client: Client,
}

impl DiscordAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            webhook_url,
            client,
        }
    }
}

pub(crate) fn format_alert(alert: &Alert) -> String {
    let mut lines = vec![
        format!(
            "**{}** `{}` `{}` `{}`",
            alert.service_name,
            alert.environment,
            alert.component,
            alert.level.as_str()
        ),
        format!(
            "`{}` `{}`{}",
            alert.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            alert.target,
            alert
                .location
                .as_ref()
                .map(|loc| format!(" `{loc}`"))
                .unwrap_or_default()
        ),
    ];

    if let Some(message) = alert.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        lines.push(format!("> {message}"));
    }

    if !alert.span_path.is_empty() {
        lines.push(format!("spans: `{}`", alert.span_path.join(" > ")));
    }

    for (key, value) in &alert.fields {
        lines.push(format!("- `{key}` = `{value}`"));
    }

    truncate(lines.join("\n"), DISCORD_CONTENT_LIMIT)
}

fn truncate(content: String, limit: usize) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= limit {
        return content;
    }

    let keep = limit.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(keep).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": format_alert(alert) }))
            .send()
            .await
            // reqwest errors include the URL, which carries the webhook token.
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("discord webhook request timed out")
                } else {
                    anyhow!("discord webhook request failed")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "discord webhook returned non-success status: {}",
                response.status()
            ));
        }

        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "discord"
    }
}
