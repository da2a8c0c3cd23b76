//! Email delivery connector — async SMTP via lettre.
//!
//! Works with Gmail app passwords, Outlook, or any STARTTLS relay.

use async_trait::async_trait;
use briefcast_core::config::SmtpConfig;
use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::Connector;
use serde_json::{Map, Value, json};

use crate::{required_str, unknown_operation};

pub struct GmailConnector {
    config: SmtpConfig,
}

impl GmailConnector {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    async fn send(&self, params: &Map<String, Value>) -> Result<Value> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        if self.config.username.is_empty() || self.config.password.is_empty() {
            return Err(BriefcastError::Connector(
                "SMTP credentials not configured ([smtp] in config.toml)".into(),
            ));
        }

        let to = required_str(params, "to", "gmail.send")?;
        let subject = required_str(params, "subject", "gmail.send")?;
        let body = required_str(params, "body", "gmail.send")?;

        let from_name = self.config.display_name.as_deref().unwrap_or("Briefcast");
        let from: Mailbox = format!("{from_name} <{}>", self.config.username)
            .parse()
            .map_err(|e| BriefcastError::Connector(format!("Bad sender address: {e}")))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| BriefcastError::Connector(format!("Bad recipient '{to}': {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| BriefcastError::Connector(format!("Build message: {e}")))?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| BriefcastError::Connector(format!("SMTP relay: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| BriefcastError::Connector(format!("SMTP send: {e}")))?;

        tracing::info!("📧 Email sent to {} ('{}')", to, subject);
        Ok(json!({ "sent": true, "to": to, "subject": subject }))
    }
}

#[async_trait]
impl Connector for GmailConnector {
    fn service(&self) -> &str {
        "gmail"
    }

    async fn call(&self, operation: &str, params: &Map<String, Value>) -> Result<Value> {
        match operation {
            "send" => self.send(params).await,
            other => Err(unknown_operation("gmail", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials() {
        let connector = GmailConnector::new(&SmtpConfig::default());
        let err = connector.call("send", &Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("credentials not configured"));
    }

    #[tokio::test]
    async fn test_missing_params() {
        let mut config = SmtpConfig::default();
        config.username = "me@example.com".into();
        config.password = "app-password".into();
        let connector = GmailConnector::new(&config);

        let mut params = Map::new();
        params.insert("to".into(), json!("you@example.com"));
        let err = connector.call("send", &params).await.unwrap_err();
        assert!(err.to_string().contains("'subject'"));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let connector = GmailConnector::new(&SmtpConfig::default());
        let err = connector.call("read_inbox", &Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("no operation"));
    }
}
