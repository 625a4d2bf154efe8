//! Stdio gateway adapter
//!
//! Speaks the line-delimited JSON protocol on stdout. This is the minimal
//! transport for running the core under an external gateway process that
//! pipes user events in and renders outbound messages itself.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use super::protocol::OutboundMessage;
use super::MessagingGateway;

/// Gateway writing one [`OutboundMessage`] JSON object per stdout line.
pub struct StdioGateway {
    stdout: Mutex<Stdout>,
}

impl StdioGateway {
    pub fn new() -> Self {
        StdioGateway {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdioGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingGateway for StdioGateway {
    async fn send(&self, user_id: &str, text: &str) -> Result<()> {
        let message = OutboundMessage {
            user_id: user_id.to_string(),
            text: text.to_string(),
        };
        let mut line = serde_json::to_string(&message).context("encoding outbound message")?;
        line.push('\n');

        // One locked write per message keeps concurrent sends line-atomic
        let mut out = self.stdout.lock().await;
        out.write_all(line.as_bytes())
            .await
            .context("writing outbound message")?;
        out.flush().await.context("flushing outbound message")?;
        Ok(())
    }
}
