//! # barbot-link
//!
//! TCP link to the drink dispensing device - transport and framing only.
//!
//! ## Scope
//!
//! This crate handles HOW to talk to the device:
//! - connection lifecycle, idle timeout and reconnection
//! - command line framing (`P1,60,P7,30\n`)
//! - response line classification (`OK`, `PREPARANDO`, `TERMINADO`, `ERROR[:msg]`, `PONG`)
//!
//! Which order occupies the device and what to pour stays in barbot-server.
//!
//! ## Example
//!
//! ```ignore
//! use barbot_link::{CommandBatch, DeviceLink, LinkConfig, LinkEvent};
//!
//! let link = DeviceLink::new(LinkConfig::new("192.168.5.100", 8080)?);
//! let mut events = link.subscribe();
//! link.connect().await?;
//!
//! let mut builder = CommandBatch::builder();
//! builder.pour("P1", 60.into()).pour("P7", 30.into());
//! link.send(&builder.build()).await;
//!
//! while let Ok(event) = events.recv().await {
//!     if let LinkEvent::Response(response) = event {
//!         println!("{:?}", response);
//!     }
//! }
//! ```

mod error;
mod link;
mod protocol;

// Re-exports
pub use error::{LinkError, LinkResult};
pub use link::{ConnectionState, DeviceLink, LinkConfig, LinkEvent, LinkStatus};
pub use protocol::{BatchBuilder, CommandBatch, DeviceResponse};
