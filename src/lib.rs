// Core layer - configuration and time helpers
pub mod core;

// Features layer - conversation flow and reminder delivery
pub mod features;

// Gateway layer - messaging transport seam
pub mod gateway;

// Infrastructure - durable note storage
pub mod store;

// Re-export core config
pub use core::Config;

// Re-export feature items
pub use features::{
    // Conversation
    ConversationEngine, SessionState,
    // Reminders
    DuePolicy, ReminderDispatcher,
};

// Re-export gateway items
pub use gateway::{InboundEvent, MessagingGateway, OutboundMessage, StdioGateway};

// Re-export storage items
pub use store::{Note, NoteBook, NoteStore};
