//! Hardware-independent core library for baro-bridge
//!
//! A host talks to an I2C peripheral that hangs off a remote microcontroller.
//! The microcontroller is a transparent bridge reachable over a line-oriented
//! serial link. This crate holds everything above the raw serial port:
//!
//! ```text
//! Bmp180 (sensors)  ──►  I2cBridge (bridge)  ──►  FrameCodec (codec)  ──►  Transport
//! ```
//!
//! - [`codec`] translates logical bridge operations to and from wire frames,
//!   in either the ASCII hex text encoding or the legacy binary encoding.
//! - [`bridge`] performs one blocking round trip per operation on top of a
//!   [`transport::Transport`] and implements [`embedded_hal::i2c::I2c`].
//! - [`sensors`] contains the BMP180 compensation driver.
//! - [`monitor`] is the cancellable polling loop used by the host binary.
//!
//! It is `#![no_std]` so it compiles for embedded targets as well as desktop
//! hosts; the serial port itself is provided by the host crate.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bridge;
pub mod codec;
pub mod error;
pub mod monitor;
pub mod sensors;
pub mod transport;

pub use bridge::{I2cBridge, MAX_TRANSPORT_TIMEOUT};
pub use codec::{BinaryCodec, Encoding, FrameCodec, TextCodec, WireCodec};
pub use error::{BridgeError, ProtocolError, TransportError, ValidationError};
pub use monitor::{CancellationToken, Monitor, MonitorSettings, Reading};
pub use sensors::{Bmp180, KnownDevice, SensorError};
pub use transport::Transport;
