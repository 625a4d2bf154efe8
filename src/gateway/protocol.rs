//! Gateway wire types
//!
//! Newline-delimited JSON, one message per line. Inbound lines carry user
//! text or commands; outbound lines carry replies and reminder
//! notifications.

use serde::{Deserialize, Serialize};

/// One inbound message from a user, as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Opaque stable user identifier supplied by the transport.
    pub user_id: String,
    /// The raw command or text the user sent.
    pub text: String,
}

/// One outbound message for the transport to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub user_id: String,
    pub text: String,
}
