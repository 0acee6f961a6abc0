use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: String,
    /// Defaults to `~/.cartcure/data/cartcure.db` when absent.
    #[serde(default)]
    pub database_path: Option<String>,
    pub business: BusinessProfile,
    /// Without SMTP settings, outbound mail is only logged.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Identity used in outbound mail and admin alerts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessProfile {
    pub name: String,
    pub admin_email: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub payment_instructions: Option<String>,
}

impl BusinessProfile {
    /// Address client replies should go to.
    pub fn reply_address(&self) -> &str {
        self.reply_to.as_deref().unwrap_or(&self.admin_email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hour of day (UTC) from which the daily pass may run.
    #[serde(default = "default_run_hour")]
    pub run_hour: u32,
    /// How often the daemon wakes to check whether the daily pass is due.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_run_hour() -> u32 {
    8
}

fn default_check_interval_secs() -> u64 {
    900
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_hour: default_run_hour(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}
