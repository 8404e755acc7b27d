//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::RetryPolicy;

/// Sampling settings for one model-calling agent.
#[derive(Debug, Clone, Copy)]
pub struct ModelSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Workflow engine configuration.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Maximum revision passes before the router forces finalize.
    pub max_iterations: u32,
    /// Per-attempt timeout for model calls.
    pub model_timeout: Duration,
    /// Retries for transient model failures.
    pub model_retries: u32,
    /// Base backoff between retries.
    pub retry_backoff: Duration,
    pub classifier: ModelSettings,
    pub writer: ModelSettings,
    pub reviewer: ModelSettings,
    /// How many of the sender's recent emails to show the writer as style reference.
    pub style_examples: usize,
    /// Cap on reviewer feedback items kept per pass.
    pub max_feedback_items: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            model_timeout: Duration::from_secs(30),
            model_retries: 1,
            retry_backoff: Duration::from_millis(500),
            classifier: ModelSettings {
                temperature: 0.0,
                max_tokens: 16,
            },
            writer: ModelSettings {
                temperature: 0.2,
                max_tokens: 800,
            },
            reviewer: ModelSettings {
                temperature: 0.0,
                max_tokens: 400,
            },
            style_examples: 2,
            max_feedback_items: 5,
        }
    }
}

impl WorkflowConfig {
    /// Load overrides from the environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_iterations: env_parse("MAILWRIGHT_MAX_ITERATIONS", defaults.max_iterations)?,
            model_timeout: Duration::from_secs(env_parse(
                "MAILWRIGHT_MODEL_TIMEOUT_SECS",
                defaults.model_timeout.as_secs(),
            )?),
            model_retries: env_parse("MAILWRIGHT_MODEL_RETRIES", defaults.model_retries)?,
            writer: ModelSettings {
                temperature: env_parse(
                    "MAILWRIGHT_WRITER_TEMPERATURE",
                    defaults.writer.temperature,
                )?,
                ..defaults.writer
            },
            style_examples: env_parse("MAILWRIGHT_STYLE_EXAMPLES", defaults.style_examples)?,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the workflow cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations > 10 {
            return Err(ConfigError::InvalidValue {
                key: "max_iterations".to_string(),
                message: format!("{} exceeds the limit of 10", self.max_iterations),
            });
        }
        if self.model_retries > 5 {
            return Err(ConfigError::InvalidValue {
                key: "model_retries".to_string(),
                message: format!("{} exceeds the limit of 5", self.model_retries),
            });
        }
        if self.model_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "model_timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        for (key, settings) in [
            ("classifier", self.classifier),
            ("writer", self.writer),
            ("reviewer", self.reviewer),
        ] {
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(ConfigError::InvalidValue {
                    key: format!("{key}.temperature"),
                    message: format!("{} is outside 0.0..=2.0", settings.temperature),
                });
            }
            if settings.max_tokens == 0 {
                return Err(ConfigError::InvalidValue {
                    key: format!("{key}.max_tokens"),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Timeout/retry policy shared by every model-calling agent.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.model_timeout,
            retries: self.model_retries,
            backoff: self.retry_backoff,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
