//! Persistent storage for chat conversations and their messages.

// Interdiction stricte de pratiques dangereuses ou non idiomatiques
#![deny(warnings)] // Tous les warnings sont traités comme des erreurs
#![deny(unsafe_code)] // Le code unsafe est interdit
#![deny(missing_docs)] // Toute fonction, struct, enum ou module public doit être documenté
#![deny(dead_code)] // Le code inutilisé est interdit
#![deny(unused_imports)] // Les imports inutilisés sont interdits
#![deny(unused_must_use)] // Oblige à gérer explicitement les Result et Option
#![deny(nonstandard_style)] // Empêche tout style de code non standard

// Clippy pour stricte discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)] // Interdit unwrap()
#![deny(clippy::expect_used)] // Interdit expect()
#![deny(clippy::panic)] // Interdit panic!()
#![deny(clippy::print_stdout)] // Interdit println!() en production
#![deny(clippy::todo)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::redundant_clone)]

/// Conversation and message persistence over `SQLite`.
pub mod conversations;
/// Tracing subscriber setup.
pub mod logging;

pub use conversations::{
    Conversation, ConversationStore, ConversationSummary, Message, Metadata,
    SqliteConversationStore, StoreConfig, StoreError, StoreResult, new_conversation_id,
};
pub use logging::init_tracing;
