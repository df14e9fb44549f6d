//! Savol Relay - a Telegram bot connecting patients to on-call doctors.
//!
//! Inbound questions are persisted, fanned out to the responder roster
//! and correlated back to their askers when a responder replies. Access
//! is gated by channel membership and self-reported social subscriptions,
//! and the roster is managed through a password-protected admin panel.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Envelope rendering and reply correlation
pub mod relay;
/// SQLite storage layer
pub mod storage;
pub mod utils;
