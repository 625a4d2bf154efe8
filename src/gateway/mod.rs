//! # Gateway Module
//!
//! The seam between the bot core and whatever messaging transport fronts
//! it. The core only ever needs two things from a transport: a stream of
//! inbound `{user_id, text}` events and a way to send text back to one
//! user. Rendering (keyboards, `**bold**` emphasis) is the transport's
//! concern.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

pub mod protocol;
pub mod stdio;

pub use protocol::{InboundEvent, OutboundMessage};
pub use stdio::StdioGateway;

use anyhow::Result;
use async_trait::async_trait;

/// Outbound side of a messaging transport.
///
/// `text` may contain simple inline emphasis markup (`**bold**`); the
/// gateway is responsible for rendering or stripping it.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send(&self, user_id: &str, text: &str) -> Result<()>;
}
