//! # oiswire
//!
//! Rust implementation of the OIS (Open Input Stream) protocol core.
//!
//! OIS connects a host application (a game, flight simulator, or input
//! router) to a peripheral device (a custom control panel, DIY cockpit)
//! over a byte-oriented full-duplex channel such as a serial port. The
//! protocol negotiates a version, carries a declared catalog of named
//! inputs, outputs and events, and tolerates line noise, resets, and
//! asymmetric reconnects.
//!
//! ## Architecture
//!
//! - **Framing**: one command set, two framings — `\n`-terminated ASCII
//!   lines and a compact binary layout with payload bits packed into the
//!   opcode byte ([`codec`], [`protocol`]).
//! - **Endpoints**: two symmetric polled state machines sharing one
//!   substrate. [`HostEndpoint`] answers handshakes and receives the
//!   catalog; [`DeviceEndpoint`] owns the catalog and declares it.
//! - **Transport**: endpoints drive any [`Transport`] implementation;
//!   everything is single-threaded and non-blocking, `poll()` is the only
//!   suspension point.
//!
//! ## Example
//!
//! ```
//! use oiswire::{DeviceEndpoint, HostEndpoint, LoopbackTransport, NumericType, Value};
//!
//! let (near, far) = LoopbackTransport::pair();
//! let mut host = HostEndpoint::new(Box::new(near), "panel", 1, "OisHub");
//! let mut device = DeviceEndpoint::new(Box::new(far), "Panel Mk2", 1234, 5678);
//! device.register_input("Lamp", 3, NumericType::Boolean).unwrap();
//! device.register_event("Fire", 7).unwrap();
//!
//! // Poll both sides until the handshake and catalog exchange settle.
//! for _ in 0..4 {
//!     device.poll();
//!     host.poll();
//! }
//! assert!(host.connected() && device.connected());
//! assert_eq!(host.inputs()[0].name, "Lamp");
//!
//! // Light the lamp: the change reaches the device on the next polls.
//! host.set_input(3, Value::Boolean(true));
//! host.poll();
//! device.poll();
//! assert_eq!(device.inputs()[0].value, Value::Boolean(true));
//! ```

pub mod catalog;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod log;
pub mod protocol;
pub mod transport;
pub mod value;

pub use catalog::{Catalog, Event, NumericValue};
pub use endpoint::{ConnectionState, DeviceEndpoint, HostEndpoint};
pub use error::{OisError, Result};
pub use log::{LogCategory, LogSink, NullSink, TracingSink};
pub use transport::{LoopbackTransport, Transport};
pub use value::{NumericType, Value};
