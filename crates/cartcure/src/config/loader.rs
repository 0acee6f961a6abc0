use std::path::{Path, PathBuf};

use crate::config::schema::AppConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// `~/.cartcure/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".cartcure").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<AppConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: AppConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let email = regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_err(|e| {
        ConfigError::Validation {
            message: format!("Invalid email pattern: {}", e),
        }
    })?;

    if !email.is_match(&config.business.admin_email) {
        return Err(ConfigError::Validation {
            message: format!("Invalid admin email: {}", config.business.admin_email),
        });
    }
    if let Some(reply_to) = &config.business.reply_to {
        if !email.is_match(reply_to) {
            return Err(ConfigError::Validation {
                message: format!("Invalid reply-to email: {}", reply_to),
            });
        }
    }

    if let Some(smtp) = &config.smtp {
        let from_address = smtp
            .from
            .rsplit_once('<')
            .map(|(_, rest)| rest.trim_end_matches('>'))
            .unwrap_or(&smtp.from);
        if !email.is_match(from_address.trim()) {
            return Err(ConfigError::Validation {
                message: format!("Invalid SMTP from address: {}", smtp.from),
            });
        }
        if smtp.password.is_none()
            && smtp.password_file.is_none()
            && smtp.password_env_var.is_none()
        {
            return Err(ConfigError::Validation {
                message: "SMTP needs one of password, password_file or password_env_var"
                    .to_string(),
            });
        }
    }

    if config.scheduler.run_hour > 23 {
        return Err(ConfigError::Validation {
            message: format!("run_hour must be 0-23, got {}", config.scheduler.run_hour),
        });
    }

    Ok(())
}
