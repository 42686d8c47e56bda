//! SMTP notifier via `lettre`.
//!
//! Port 465 uses implicit TLS; any other port uses STARTTLS unless TLS is
//! switched off in config (local relays, test servers).

use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use taskbell_core::{config::SmtpConfig, reminder::ReminderMessage};
use tracing::info;

use crate::{
    error::{NotifyError, Result},
    notifier::Notifier,
};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Build the transport from config.
    ///
    /// Credentials come from the config section, falling back to the
    /// `SMTP_USERNAME` / `SMTP_PASSWORD` environment variables. With neither
    /// the connection is unauthenticated.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let from = parse_mailbox(&config.from)?;

        let mut builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotifyError::ConfigError(e.to_string()))?
                .port(config.port)
        } else if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotifyError::ConfigError(e.to_string()))?
                .port(config.port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        let username = config
            .username
            .clone()
            .or_else(|| std::env::var("SMTP_USERNAME").ok());
        let password = config
            .password
            .clone()
            .or_else(|| std::env::var("SMTP_PASSWORD").ok());
        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn channel_name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: &ReminderMessage) -> Result<()> {
        let to = parse_mailbox(&message.to)?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .body(message.body.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        info!(channel = "smtp", to = %message.to, subject = %message.subject, "reminder delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16, tls: bool, from: &str) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port,
            tls,
            from: from.to_string(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn builds_starttls_transport() {
        let notifier = SmtpNotifier::from_config(&config(587, true, "bell@example.com"));
        assert!(notifier.is_ok());
        assert_eq!(notifier.unwrap().channel_name(), "smtp");
    }

    #[test]
    fn builds_implicit_tls_and_plain_transports() {
        assert!(SmtpNotifier::from_config(&config(465, true, "bell@example.com")).is_ok());
        assert!(SmtpNotifier::from_config(&config(25, false, "Bell <bell@example.com>")).is_ok());
    }

    #[test]
    fn rejects_bad_sender() {
        let err = SmtpNotifier::from_config(&config(587, true, "not-an-address"))
            .err()
            .expect("bad sender must fail");
        assert!(matches!(err, NotifyError::InvalidAddress { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn rejects_bad_recipient_before_connecting() {
        let notifier = SmtpNotifier::from_config(&config(25, false, "bell@example.com")).unwrap();
        let msg = ReminderMessage {
            to: "nobody".to_string(),
            subject: "Task Reminder: x".to_string(),
            body: String::new(),
        };
        let err = notifier.send(&msg).await.unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress { .. }));
    }
}
