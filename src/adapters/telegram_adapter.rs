//! Telegram bot notifier and command intake.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::error::AgentError;
use crate::ports::command_port::CommandPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::notifier_port::NotifierPort;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// One bot bound to one chat. Clones share the update offset.
#[derive(Clone)]
pub struct TelegramBot {
    client: reqwest::blocking::Client,
    api_url: String,
    token: String,
    chat_id: i64,
    next_update: Arc<Mutex<i64>>,
}

impl TelegramBot {
    pub fn new(api_url: &str, token: &str, chat_id: i64) -> Result<Self, AgentError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e: reqwest::Error| AgentError::Notification {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id,
            next_update: Arc::new(Mutex::new(0)),
        })
    }

    /// `None` when `[telegram]` has no bot token.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Option<Self>, AgentError> {
        let Some(token) = config.get_string("telegram", "bot_token") else {
            return Ok(None);
        };
        let chat_id = config
            .get_string("telegram", "chat_id")
            .ok_or_else(|| AgentError::ConfigMissing {
                section: "telegram".into(),
                key: "chat_id".into(),
            })?
            .parse::<i64>()
            .map_err(|_| AgentError::config_invalid("telegram", "chat_id", "chat_id must be an integer"))?;
        let api_url = config
            .get_string("telegram", "api_url")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(&api_url, &token, chat_id).map(Some)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.token)
    }

    fn send_message(&self, text: &str) -> Result<(), AgentError> {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .map_err(|e: reqwest::Error| AgentError::Notification {
                reason: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AgentError::Notification {
                reason: format!("HTTP {status} from sendMessage"),
            });
        }
        Ok(())
    }

    /// Texts sent to our chat in `updates`, and the offset that acknowledges them.
    fn texts_for_chat(&self, updates: Vec<Update>, offset: i64) -> (Vec<String>, i64) {
        let mut next = offset;
        let mut texts = Vec::new();
        for update in updates {
            next = next.max(update.update_id + 1);
            match update.message {
                Some(Message {
                    chat,
                    text: Some(text),
                }) if chat.id == self.chat_id => texts.push(text),
                _ => debug!(update_id = update.update_id, "ignoring update"),
            }
        }
        (texts, next)
    }
}

impl NotifierPort for TelegramBot {
    fn send(&self, text: &str) -> Result<(), AgentError> {
        self.send_message(text)
    }
}

impl CommandPort for TelegramBot {
    fn poll(&self) -> Result<Vec<String>, AgentError> {
        let mut offset = self
            .next_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let resp = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", *offset), ("timeout", 0)])
            .send()
            .map_err(|e: reqwest::Error| AgentError::CommandIntake {
                reason: e.to_string(),
            })?;
        let updates: UpdatesResponse =
            resp.json().map_err(|e: reqwest::Error| AgentError::CommandIntake {
                reason: e.to_string(),
            })?;
        if !updates.ok {
            return Err(AgentError::CommandIntake {
                reason: updates
                    .description
                    .unwrap_or_else(|| "getUpdates failed".into()),
            });
        }
        let (texts, next) = self.texts_for_chat(updates.result, *offset);
        *offset = next;
        Ok(texts)
    }

    fn reply(&self, text: &str) -> Result<(), AgentError> {
        self.send_message(text).map_err(|e| AgentError::CommandIntake {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn bot() -> TelegramBot {
        TelegramBot::new("https://example.test/", "123:abc", 42).unwrap()
    }

    #[test]
    fn method_urls() {
        assert_eq!(
            bot().method_url("sendMessage"),
            "https://example.test/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn filters_updates_to_our_chat() {
        let body = r#"{"ok": true, "result": [
            {"update_id": 7, "message": {"chat": {"id": 42}, "text": "/status"}},
            {"update_id": 8, "message": {"chat": {"id": 99}, "text": "/stop"}},
            {"update_id": 9, "message": {"chat": {"id": 42}}},
            {"update_id": 10, "message": {"chat": {"id": 42}, "text": "/stop2"}}
        ]}"#;
        let updates: UpdatesResponse = serde_json::from_str(body).unwrap();
        let (texts, next) = bot().texts_for_chat(updates.result, 0);
        assert_eq!(texts, vec!["/status", "/stop2"]);
        assert_eq!(next, 11);
    }

    #[test]
    fn empty_updates_keep_offset() {
        let updates: UpdatesResponse = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        let (texts, next) = bot().texts_for_chat(updates.result, 5);
        assert!(texts.is_empty());
        assert_eq!(next, 5);
    }

    #[test]
    fn from_config_without_token_is_none() {
        let config = FileConfigAdapter::from_string("[telegram]\nchat_id = 1\n").unwrap();
        assert!(TelegramBot::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn from_config_needs_numeric_chat() {
        let config =
            FileConfigAdapter::from_string("[telegram]\nbot_token = t\nchat_id = me\n").unwrap();
        assert!(matches!(
            TelegramBot::from_config(&config),
            Err(AgentError::ConfigInvalid { .. })
        ));
        let config = FileConfigAdapter::from_string("[telegram]\nbot_token = t\n").unwrap();
        assert!(matches!(
            TelegramBot::from_config(&config),
            Err(AgentError::ConfigMissing { .. })
        ));
    }
}
