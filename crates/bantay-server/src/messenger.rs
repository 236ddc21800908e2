//! Outbound side of the platform: messages and chat actions.

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::ServerError;

/// Something the platform should do on the bot's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Message { user_id: i64, text: String },
    ApproveJoin { user_id: i64, chat_id: i64 },
    DeclineJoin { user_id: i64, chat_id: i64 },
    RemoveFromChat { user_id: i64, chat_id: i64 },
}

pub trait Messenger: Send + Sync {
    fn deliver(&self, outbound: Outbound) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Send a text message to a user.
    fn send(
        &self,
        user_id: i64,
        text: impl Into<String> + Send,
    ) -> impl Future<Output = Result<(), ServerError>> + Send {
        self.deliver(Outbound::Message {
            user_id,
            text: text.into(),
        })
    }
}

/// Writes each outbound item as one JSON line.
pub struct JsonLinesMessenger<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesMessenger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: AsyncWrite + Unpin + Send> Messenger for JsonLinesMessenger<W> {
    async fn deliver(&self, outbound: Outbound) -> Result<(), ServerError> {
        let mut line = serde_json::to_vec(&outbound)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outbound_items_are_tagged_json_lines() {
        let messenger = JsonLinesMessenger::new(Vec::new());
        messenger.send(7, "Kumusta!").await.unwrap();
        messenger
            .deliver(Outbound::RemoveFromChat {
                user_id: 7,
                chat_id: -100,
            })
            .await
            .unwrap();

        let output = String::from_utf8(messenger.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"type":"message","user_id":7,"text":"Kumusta!"}"#,
                r#"{"type":"remove_from_chat","user_id":7,"chat_id":-100}"#,
            ]
        );
    }
}
