//! Secret player-to-GM notes for a shared tabletop session.
//!
//! Players submit short notes that are rate-limited locally, broadcast on a
//! shared topic, and accepted by the GM peer, which enforces its own limit,
//! stores a bounded history and alerts its panel.

pub mod common;
pub mod config;
pub mod coordinator;
pub mod network;
pub mod presenter;
pub mod roster;
pub mod storage;
pub mod throttle;
pub mod ui;
