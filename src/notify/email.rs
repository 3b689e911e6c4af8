use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::ChannelError;
use crate::notify::Mailer;

const SMTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from: String,
    pub password: String,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("from", &self.from)
            .field("password", &"***")
            .finish()
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &EmailSettings) -> Result<Self, ChannelError> {
        let from = parse_mailbox(&settings.from)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
            .map_err(|err| ChannelError::Transport(err.to_string()))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.from.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(SMTP_TIMEOUT_SECS)))
            .build();
        Ok(Self { transport, from })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, ChannelError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|err| ChannelError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })
}

fn build_message(
    from: Mailbox,
    recipient: &str,
    subject: &str,
    html_body: &str,
) -> Result<Message, ChannelError> {
    Message::builder()
        .from(from)
        .to(parse_mailbox(recipient)?)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body.to_string())
        .map_err(|err| ChannelError::Transport(err.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), ChannelError> {
        let message = build_message(self.from.clone(), recipient, subject, html_body)?;
        self.transport
            .send(message)
            .await
            .map_err(|err| ChannelError::Transport(err.to_string()))?;
        Ok(())
    }
}
