use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;

use orderbot_core::flows::ConversationId;

use crate::events::{InboundMessage, OutboundMessage};
use crate::runner::{MessageTransport, TransportError};

const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

/// Line-oriented transport: every input line is one inbound message for a
/// single fixed conversation, and every reply is written back followed by a
/// newline.
pub struct ConsoleTransport<R, W> {
    conversation_id: ConversationId,
    reader: Mutex<Lines<BufReader<R>>>,
    writer: Mutex<W>,
}

impl ConsoleTransport<Stdin, Stdout> {
    pub fn stdio(conversation_id: impl Into<ConversationId>) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), conversation_id)
    }
}

impl<R, W> ConsoleTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, conversation_id: impl Into<ConversationId>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            reader: Mutex::new(BufReader::new(reader).lines()),
            writer: Mutex::new(writer),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<R, W> MessageTransport for ConsoleTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            let line = reader
                .next_line()
                .await
                .map_err(|error| TransportError::Receive(error.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if QUIT_COMMANDS.iter().any(|command| text.eq_ignore_ascii_case(command)) {
                return Ok(None);
            }

            return Ok(Some(InboundMessage {
                message_id: uuid::Uuid::new_v4().to_string(),
                conversation_id: self.conversation_id.clone(),
                text: text.to_owned(),
            }));
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(message.text.as_bytes())
            .await
            .map_err(|error| TransportError::Send(error.to_string()))?;
        writer.write_all(b"\n").await.map_err(|error| TransportError::Send(error.to_string()))?;
        writer.flush().await.map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
