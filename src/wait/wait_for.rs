//! Declarative wait conditions, as found in configuration files and CLI
//! arguments.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::WaitError;
use crate::runtime::ContainerRuntime;
use crate::wait::condition::StartCondition;
use crate::wait::http_ping::HttpPing;
use crate::wait::log_match::{FullLogMessage, LogMessage, LogMessageSequence};

/// What to wait for before a container counts as started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitFor {
    /// A line containing `message` shows up in the output.
    LogMessage { message: String },
    /// Lines containing each of `messages` show up in this order.
    LogMessageSequence { messages: Vec<String> },
    /// The full log fetched on every poll contains `message`.
    FullLogMessage { message: String },
    /// An HTTP request answers with an accepted status.
    HttpPing {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        /// `"302"` or `"200..399"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
}

impl WaitFor {
    pub fn log_message(message: impl Into<String>) -> Self {
        WaitFor::LogMessage {
            message: message.into(),
        }
    }

    pub fn log_message_sequence<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WaitFor::LogMessageSequence {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn full_log_message(message: impl Into<String>) -> Self {
        WaitFor::FullLogMessage {
            message: message.into(),
        }
    }

    pub fn http_ping(url: impl Into<String>) -> Self {
        WaitFor::HttpPing {
            url: url.into(),
            method: None,
            status: None,
        }
    }

    /// Instantiate a fresh condition for one container.
    pub fn build(
        &self,
        runtime: &Arc<dyn ContainerRuntime>,
        container_id: &str,
    ) -> Result<StartCondition, WaitError> {
        let condition = match self {
            WaitFor::LogMessage { message } => {
                StartCondition::listener(LogMessage::new(message.clone()))
            }
            WaitFor::LogMessageSequence { messages } => {
                StartCondition::listener(LogMessageSequence::new(messages.clone()))
            }
            WaitFor::FullLogMessage { message } => StartCondition::pollable(FullLogMessage::new(
                Arc::clone(runtime),
                container_id,
                message.clone(),
            )),
            WaitFor::HttpPing {
                url,
                method,
                status,
            } => {
                let mut ping = HttpPing::new(url)?;
                if let Some(method) = method {
                    ping = ping.with_method(method)?;
                }
                if let Some(status) = status {
                    ping = ping.with_status_pattern(status)?;
                }
                StartCondition::pollable(ping)
            }
        };
        Ok(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRuntime;
    use crate::wait::condition::Condition;

    fn runtime() -> Arc<dyn ContainerRuntime> {
        Arc::new(ScriptedRuntime::replay(Vec::new()))
    }

    #[test]
    fn test_build_picks_condition_kind() {
        let runtime = runtime();

        let c = WaitFor::log_message("ready").build(&runtime, "c1").unwrap();
        assert!(c.is_listener());

        let c = WaitFor::log_message_sequence(["a", "b"])
            .build(&runtime, "c1")
            .unwrap();
        assert!(c.is_listener());

        let c = WaitFor::full_log_message("ready")
            .build(&runtime, "c1")
            .unwrap();
        assert!(!c.is_listener());

        let c = WaitFor::http_ping("http://127.0.0.1:8080/health")
            .build(&runtime, "c1")
            .unwrap();
        assert!(!c.is_listener());
        assert_eq!(
            c.describe(),
            "http ping to 'http://127.0.0.1:8080/health' with method 'HEAD'"
        );
    }

    #[test]
    fn test_bad_probe_settings_are_configuration_errors() {
        let runtime = runtime();
        let wait_for = WaitFor::HttpPing {
            url: "http://127.0.0.1:8080/".to_string(),
            method: None,
            status: Some("two hundred".to_string()),
        };
        assert!(matches!(
            wait_for.build(&runtime, "c1"),
            Err(WaitError::Configuration { .. })
        ));
    }

    #[test]
    fn test_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            wait_for: Vec<WaitFor>,
        }

        let doc: Doc = toml::from_str(
            r#"
            [[wait_for]]
            type = "log_message"
            message = "database system is ready"

            [[wait_for]]
            type = "http_ping"
            url = "http://localhost:8080/"
            method = "GET"
            status = "200..204"
            "#,
        )
        .unwrap();

        assert_eq!(
            doc.wait_for,
            vec![
                WaitFor::log_message("database system is ready"),
                WaitFor::HttpPing {
                    url: "http://localhost:8080/".to_string(),
                    method: Some("GET".to_string()),
                    status: Some("200..204".to_string()),
                },
            ]
        );
    }
}
