use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::controller::{CycleOptions, PersistMode};
use crate::error::ConfigError;
use crate::marks::DiffMode;
use crate::notify::{EmailSettings, NotifierConfig, SignalSettings};
use crate::provider::{PageTemplate, PortalCredentials};
use crate::schedule::OperatingWindow;

const REDACTED: &str = "***";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub diff: DiffConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_url")]
    pub url: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_semester")]
    pub semester: String,
    #[serde(default = "default_marks_table_id")]
    pub marks_table_id: String,
    /// Academic year in the counter id is the current year minus this.
    #[serde(default = "default_year_offset")]
    pub year_offset: i32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default)]
    pub api_server: String,
    #[serde(default)]
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_email_subject")]
    pub subject: String,
    #[serde(default)]
    pub portal_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_opening_hour")]
    pub opening_hour: u32,
    #[serde(default = "default_closing_hour")]
    pub closing_hour: u32,
    #[serde(default = "default_closing_grace_minutes")]
    pub closing_grace_minutes: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffConfig {
    #[serde(default)]
    pub mode: DiffMode,
    #[serde(default)]
    pub persist: PersistMode,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub portal_url: Option<String>,
    pub account_id: Option<String>,
    pub password: Option<String>,
    pub semester: Option<String>,
    pub state_path: Option<String>,
    pub signal_api_server: Option<String>,
    pub phone_number: Option<String>,
    pub email_from: Option<String>,
    pub email_password: Option<String>,
    pub recipients: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/mark-watch/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.portal_url {
            self.portal.url = url;
        }
        if let Some(account_id) = overrides.account_id {
            self.portal.account_id = account_id;
        }
        if let Some(password) = overrides.password {
            self.portal.password = password;
        }
        if let Some(semester) = overrides.semester {
            self.portal.semester = semester;
        }
        if let Some(state_path) = overrides.state_path {
            self.storage.state_path = state_path;
        }
        if let Some(api_server) = overrides.signal_api_server {
            self.signal.api_server = api_server;
        }
        if let Some(number) = overrides.phone_number {
            self.signal.number = number;
        }
        if let Some(from) = overrides.email_from {
            self.email.from = from;
        }
        if let Some(password) = overrides.email_password {
            self.email.password = password;
        }
        if let Some(raw) = overrides.recipients {
            self.email.recipients = parse_recipients(&raw);
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_state_path(&self) -> PathBuf {
        expand_tilde(&self.storage.state_path)
    }

    /// Portal credentials are required; without them no cycle can run.
    pub fn portal_credentials(&self) -> Result<PortalCredentials, ConfigError> {
        if self.portal.account_id.trim().is_empty() {
            return Err(ConfigError::Missing("portal.account_id"));
        }
        if self.portal.password.is_empty() {
            return Err(ConfigError::Missing("portal.password"));
        }
        if self.portal.url.trim().is_empty() {
            return Err(ConfigError::Missing("portal.url"));
        }
        Ok(PortalCredentials {
            account_id: self.portal.account_id.trim().to_string(),
            password: self.portal.password.clone(),
        })
    }

    pub fn page_template(&self) -> PageTemplate {
        PageTemplate {
            account_id: self.portal.account_id.trim().to_string(),
            semester: self.portal.semester.trim().to_string(),
            marks_table_id: self.portal.marks_table_id.trim().to_string(),
            year_offset: self.portal.year_offset,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.portal.fetch_timeout_secs.max(1))
    }

    /// The instant-message relay is optional; email is not.
    pub fn resolve_notifier(&self) -> Result<NotifierConfig, ConfigError> {
        let signal = if self.signal.api_server.trim().is_empty() {
            warn!("signal.api_server is not set, instant messages are disabled");
            None
        } else if self.signal.number.trim().is_empty() {
            warn!("signal.number is not set, instant messages are disabled");
            None
        } else {
            Some(SignalSettings {
                api_server: self.signal.api_server.trim().to_string(),
                number: self.signal.number.trim().to_string(),
            })
        };

        if self.email.from.trim().is_empty() {
            return Err(ConfigError::Missing("email.from"));
        }
        if self.email.password.is_empty() {
            return Err(ConfigError::Missing("email.password"));
        }
        if self.email.recipients.is_empty() {
            warn!("email.recipients is empty, no email will be sent");
        }
        let email = EmailSettings {
            smtp_host: self.email.smtp_host.clone(),
            smtp_port: self.email.smtp_port,
            from: self.email.from.trim().to_string(),
            password: self.email.password.clone(),
        };

        Ok(NotifierConfig {
            signal,
            email: Some(email),
            recipients: self.email.recipients.clone(),
            email_subject: self.email.subject.clone(),
            portal_link: self.email.portal_link.clone(),
        })
    }

    pub fn operating_window(&self) -> Result<OperatingWindow, ConfigError> {
        let s = &self.schedule;
        if s.opening_hour > 23 || s.closing_hour > 23 || s.opening_hour > s.closing_hour {
            return Err(ConfigError::Invalid {
                field: "schedule",
                reason: format!(
                    "hours must satisfy 0 <= opening ({}) <= closing ({}) <= 23",
                    s.opening_hour, s.closing_hour
                ),
            });
        }
        Ok(OperatingWindow {
            opening_hour: s.opening_hour,
            closing_hour: s.closing_hour,
            closing_grace_minutes: s.closing_grace_minutes.min(59),
        })
    }

    pub fn cycle_options(&self) -> CycleOptions {
        CycleOptions {
            diff_mode: self.diff.mode,
            persist_mode: self.diff.persist,
        }
    }

    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [&mut copy.portal.password, &mut copy.email.password] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        copy
    }

    pub fn default_template() -> String {
        let template = r#"[portal]
url = "https://oasis.polytech.universite-paris-saclay.fr/#codepage=MYMARKS"
account_id = ""
password = ""
semester = "1"
marks_table_id = "Tests12023"
year_offset = 1
fetch_timeout_secs = 25

[storage]
state_path = "~/.local/share/mark-watch/marks.json"

[signal]
api_server = ""
number = ""

[email]
smtp_host = "smtp.gmail.com"
smtp_port = 587
from = ""
password = ""
recipients = []
subject = "🤖 New mark published"
portal_link = "https://oasis.polytech.universite-paris-saclay.fr"

[schedule]
opening_hour = 6
closing_hour = 23
closing_grace_minutes = 10
interval_secs = 600

[diff]
mode = "legacy"
persist = "fresh"
"#;
        template.to_string()
    }
}

pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: default_portal_url(),
            account_id: String::new(),
            password: String::new(),
            semester: default_semester(),
            marks_table_id: default_marks_table_id(),
            year_offset: default_year_offset(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            from: String::new(),
            password: String::new(),
            recipients: Vec::new(),
            subject: default_email_subject(),
            portal_link: String::new(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            opening_hour: default_opening_hour(),
            closing_hour: default_closing_hour(),
            closing_grace_minutes: default_closing_grace_minutes(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_portal_url() -> String {
    "https://oasis.polytech.universite-paris-saclay.fr/#codepage=MYMARKS".to_string()
}

fn default_semester() -> String {
    "1".to_string()
}

fn default_marks_table_id() -> String {
    "Tests12023".to_string()
}

fn default_year_offset() -> i32 {
    1
}

fn default_fetch_timeout_secs() -> u64 {
    25
}

fn default_state_path() -> String {
    "~/.local/share/mark-watch/marks.json".to_string()
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_email_subject() -> String {
    crate::notify::message::DEFAULT_EMAIL_SUBJECT.to_string()
}

fn default_opening_hour() -> u32 {
    6
}

fn default_closing_hour() -> u32 {
    23
}

fn default_closing_grace_minutes() -> u32 {
    10
}

fn default_interval_secs() -> u64 {
    600
}
