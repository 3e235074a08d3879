// MIT License
// Rust translation of lib/radiora2.js

//! # radiora2-bridge
//!
//! Direct telnet communication with Lutron RadioRA2/Maestro main repeaters.
//!
//! This library maintains one long-lived session to a controller: it logs
//! in, serializes outbound commands against the controller's `GNET>` ready
//! banner (at most one command in flight), and translates the asynchronous
//! inbound text stream into typed events — on/off, dimmer levels, button
//! presses, keypad LEDs, occupancy groups. The connection is re-established
//! automatically after a fixed delay whenever it drops; device state is
//! rebuilt from the controller's own reports.
//!
//! ## Quick Start
//!
//! ```no_run
//! use radiora2_bridge::{BridgeEvent, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SessionConfig::builder()
//!         .host("192.168.1.50")
//!         .username("lutron")
//!         .password("integration")
//!         .build();
//!
//!     let session = Session::connect(config);
//!
//!     let mut events = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let BridgeEvent::Level { id, level } = event {
//!                 println!("Output {id} -> {level}");
//!             }
//!         }
//!     });
//!
//!     session.set_dimmer(12, 75, None, None)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod parser;
pub mod protocol;
pub mod session;

// Re-exports for convenience
pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{BridgeError, Result};
pub use event::{BridgeEvent, EventReceiver, EventSender};
pub use parser::ResponseParser;
pub use protocol::{Command, Response};
pub use session::{Phase, Session};
