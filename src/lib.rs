//! megha-link - cloud protocol client for legacy robot vacuum fleets
//!
//! This library is the device-session core that sits between an
//! authenticated cloud transport and application code: it turns named
//! commands into model-specific wire requests, decodes the heterogeneous
//! telemetry the two protocol generations produce, keeps a consistent
//! versioned device-state snapshot, and reassembles chunked binary map
//! transfers into rendered raster images.
//!
//! ## Collaborators
//!
//! Account login, socket handling, MQTT plumbing, and HTTP calls stay
//! outside. They reach the session through two narrow seams:
//!
//! - [`transport::CommandTransport`] carries constructed requests out
//! - [`DeviceSession::handle_message`] delivers decoded payloads in
//!
//! ## Example
//!
//! ```no_run
//! use megha_link::{ClientConfig, DeviceSession, Dictionaries};
//! use std::sync::Arc;
//!
//! # fn connect_transport() -> Box<dyn megha_link::transport::CommandTransport> { unimplemented!() }
//! # fn main() -> megha_link::Result<()> {
//! let config = ClientConfig::from_file("megha.toml")?;
//! let mut session = DeviceSession::new(
//!     &config,
//!     Arc::new(Dictionaries::builtin()),
//!     connect_transport(),
//! );
//! let events = session.subscribe();
//!
//! session.run("Clean", &[]);
//! session.run("SetFanSpeed", &["strong"]);
//! session.run("GetLifeSpan", &[]);
//!
//! for event in events.iter() {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod catalog;
pub mod config;
mod decode;
pub mod dictionary;
pub mod error;
pub mod events;
pub mod map;
pub mod payload;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::ClientConfig;
pub use dictionary::Dictionaries;
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use payload::{AttrBag, Payload};
pub use session::DeviceSession;
