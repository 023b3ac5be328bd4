//! Bridge from NEAR on-chain events to PagerDuty incidents.
//!
//! Each configured [`rule::AlertRule`] gets its own Intear WebSocket
//! subscription, kept alive by a [`supervisor::StreamSupervisor`]. Matching
//! events are rendered into alerts and posted to the PagerDuty Events API.

pub mod config;
pub mod event;
pub mod format;
pub mod health;
pub mod monitor;
pub mod rule;
pub mod shutdown;
pub mod sink;
pub mod supervisor;
pub mod ws;
