pub mod email;
pub mod message;
pub mod signal;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ChannelError;
use crate::marks::NewMark;

pub use email::{EmailSettings, SmtpMailer};
pub use signal::{SignalMessenger, SignalSettings};

#[async_trait]
pub trait InstantMessenger: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), ChannelError>;
}

/// Channel settings resolved once at startup. A `None` channel is disabled.
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    pub signal: Option<SignalSettings>,
    pub email: Option<EmailSettings>,
    pub recipients: Vec<String>,
    pub email_subject: String,
    pub portal_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Disabled,
    Sent,
    Failed(String),
}

impl ChannelOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    pub outcome: ChannelOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyOutcome {
    pub mark: NewMark,
    pub instant: ChannelOutcome,
    pub email: Vec<RecipientOutcome>,
}

impl NotifyOutcome {
    pub fn failures(&self) -> usize {
        usize::from(self.instant.is_failure())
            + self
                .email
                .iter()
                .filter(|r| r.outcome.is_failure())
                .count()
    }
}

pub struct Notifier {
    messenger: Option<Box<dyn InstantMessenger>>,
    mailer: Option<Box<dyn Mailer>>,
    recipients: Vec<String>,
    email_subject: String,
    portal_link: String,
}

impl Notifier {
    pub fn new(
        messenger: Option<Box<dyn InstantMessenger>>,
        mailer: Option<Box<dyn Mailer>>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            messenger,
            mailer,
            recipients,
            email_subject: message::DEFAULT_EMAIL_SUBJECT.to_string(),
            portal_link: String::new(),
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self, ChannelError> {
        let messenger = config
            .signal
            .clone()
            .map(SignalMessenger::new)
            .transpose()?
            .map(|m| Box::new(m) as Box<dyn InstantMessenger>);
        let mailer = config
            .email
            .as_ref()
            .map(SmtpMailer::new)
            .transpose()?
            .map(|m| Box::new(m) as Box<dyn Mailer>);
        Ok(Self::new(messenger, mailer, config.recipients.clone())
            .with_email_subject(config.email_subject.clone())
            .with_portal_link(config.portal_link.clone()))
    }

    pub fn with_email_subject(mut self, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        if !subject.trim().is_empty() {
            self.email_subject = subject;
        }
        self
    }

    pub fn with_portal_link(mut self, link: impl Into<String>) -> Self {
        self.portal_link = link.into();
        self
    }

    /// Attempts every channel for `mark`. Failures are logged and recorded,
    /// never propagated.
    pub async fn notify(&self, mark: &NewMark) -> NotifyOutcome {
        let instant = match &self.messenger {
            None => ChannelOutcome::Disabled,
            Some(messenger) => {
                let text = message::render_instant(mark);
                match messenger.send_message(&text).await {
                    Ok(()) => {
                        info!("instant message sent for {} / {}", mark.subject, mark.test);
                        ChannelOutcome::Sent
                    }
                    Err(err) => {
                        error!("failed sending instant message: {err}");
                        ChannelOutcome::Failed(err.to_string())
                    }
                }
            }
        };

        let mut email = Vec::with_capacity(self.recipients.len());
        if let Some(mailer) = &self.mailer {
            let body = message::render_email(mark, &self.portal_link);
            for recipient in &self.recipients {
                let outcome = match mailer.send_mail(recipient, &self.email_subject, &body).await {
                    Ok(()) => {
                        info!("email sent to {recipient}");
                        ChannelOutcome::Sent
                    }
                    Err(err) => {
                        error!("failed sending email to {recipient}: {err}");
                        ChannelOutcome::Failed(err.to_string())
                    }
                };
                email.push(RecipientOutcome {
                    recipient: recipient.clone(),
                    outcome,
                });
            }
        }

        NotifyOutcome {
            mark: mark.clone(),
            instant,
            email,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingMailer, RecordingMessenger};
    use super::{ChannelOutcome, Notifier};
    use crate::marks::NewMark;

    fn recipients() -> Vec<String> {
        vec!["a@example.org".to_string(), "b@example.org".to_string()]
    }

    #[test]
    fn disabled_instant_channel_is_not_a_failure() {
        let mailer = RecordingMailer::default();
        let notifier = Notifier::new(None, Some(Box::new(mailer.clone())), recipients());
        let outcome = tokio_test::block_on(notifier.notify(&NewMark::new("Math", "Final", 18.0)));
        assert_eq!(outcome.instant, ChannelOutcome::Disabled);
        assert_eq!(outcome.failures(), 0);
        assert_eq!(mailer.sent.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn instant_failure_still_sends_email() {
        let messenger = RecordingMessenger {
            fail: true,
            ..Default::default()
        };
        let mailer = RecordingMailer::default();
        let notifier = Notifier::new(
            Some(Box::new(messenger.clone())),
            Some(Box::new(mailer.clone())),
            recipients(),
        );
        let outcome = notifier.notify(&NewMark::new("Math", "Final", 18.0)).await;
        assert!(outcome.instant.is_failure());
        assert_eq!(messenger.sent.lock().expect("lock").len(), 1);
        assert_eq!(outcome.email.len(), 2);
        assert!(outcome.email.iter().all(|r| r.outcome == ChannelOutcome::Sent));
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_stop_the_rest() {
        let mailer = RecordingMailer {
            failing: vec!["a@example.org".to_string()],
            ..Default::default()
        };
        let notifier = Notifier::new(None, Some(Box::new(mailer.clone())), recipients())
            .with_email_subject("New grade");
        let outcome = notifier.notify(&NewMark::new("Physics", "Lab2", "absent")).await;
        assert_eq!(outcome.failures(), 1);
        assert!(outcome.email[0].outcome.is_failure());
        assert_eq!(outcome.email[1].outcome, ChannelOutcome::Sent);
        let sent = mailer.sent.lock().expect("lock");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1, "New grade");
    }
}
