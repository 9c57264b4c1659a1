//! Core building blocks for the live log viewer.
//!
//! This crate provides:
//! - `InboundEvent` / `classify` - Total classification of raw channel payloads
//! - `HistoryStore` - Broadcast + history log of display lines, keyed by widget

pub mod event;
pub mod history;

pub use event::{InboundEvent, classify};
pub use history::{HistoryStore, WidgetId};
