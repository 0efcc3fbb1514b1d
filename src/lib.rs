//! Framewire is a framing and integrity layer for point-to-point serial
//! links, such as the USB-CDC or UART connection between a host and a
//! resource-constrained device.
//!
//! It takes an opaque payload of 1 to 254 bytes, wraps it in a
//! self-delimiting, corruption-detecting packet and emits it on an
//! abstract byte sink; on the receive side it locates, extracts and
//! validates such a packet from a noisy byte source. Payloads are
//! COBS-encoded so the frame terminator can never appear inside them, and
//! every frame carries a CRC postamble, so corruption must slip past two
//! independent checks to go unnoticed.
//!
//! ## Quick start
//!
//! The engine talks to the world through the [`Wire`] capability, a
//! full-duplex byte stream with nonblocking reads and a monotonic clock.
//! Values move in and out of frames through plain-old-data reads and
//! writes:
//!
//! ```
//! use framewire::{Config, CrcParameters, TransportLayer, Wire};
//!
//! // A loopback wire: everything written becomes readable again.
//! #[derive(Default)]
//! struct Loopback {
//!     buffered: std::collections::VecDeque<u8>,
//!     clock: u64,
//! }
//!
//! impl Wire for Loopback {
//!     fn bytes_available(&mut self) -> usize {
//!         self.buffered.len()
//!     }
//!     fn read_byte(&mut self) -> Option<u8> {
//!         self.buffered.pop_front()
//!     }
//!     fn write_all(&mut self, bytes: &[u8]) {
//!         self.buffered.extend(bytes);
//!     }
//!     fn now_micros(&mut self) -> u64 {
//!         self.clock += 1;
//!         self.clock
//!     }
//! }
//!
//! let config = Config::builder_with_crc(CrcParameters::crc16_ccitt_false()).build();
//! let mut link = TransportLayer::with_config(Loopback::default(), config);
//!
//! // Stage a payload and send it as one frame.
//! let next = link.write_data(&42u16, 0)?;
//! link.write_data(&[1u8, 2, 3, 4], next)?;
//! link.send_data()?;
//!
//! // Receive it back and unpack the values.
//! link.receive_data()?;
//! let mut value = 0u16;
//! let mut tail = [0u8; 4];
//! let next = link.read_data(&mut value, 0)?;
//! link.read_data(&mut tail, next)?;
//! assert_eq!(value, 42);
//! assert_eq!(tail, [1, 2, 3, 4]);
//! # Ok::<(), framewire::Error>(())
//! ```
//!
//! For `std` stream types ([`TcpStream`], [`UnixStream`], nonblocking
//! serial handles) the [`StreamWire`] binding implements [`Wire`]
//! directly.
//!
//! ## Wire format
//!
//! ```text
//! | start | payload_size | overhead | encoded payload | delimiter |  crc   |
//! |  1B   |      1B      |    1B    |    1 - 254B     |    1B     | 1/2/4B |
//! ```
//!
//! The checksum covers the overhead byte, the encoded payload and the
//! delimiter, stored most significant byte first so a receiver can
//! validate a frame with a single CRC pass over packet plus postamble.
//!
//! ## Configuration
//!
//! Both endpoints must agree on the CRC parameters, start byte and
//! delimiter. See the [`config`] module for every option and its
//! default.
//!
//! ## Errors and the status byte
//!
//! Every operation returns a [`Result`], and the engine additionally
//! mirrors each outcome into a byte-wide status code whose value ranges
//! identify the failing subsystem. The [`error`] module documents the
//! taxonomy; [`TransportLayer::status`] exposes the byte.
//!
//! [`TcpStream`]: std::net::TcpStream
//! [`UnixStream`]: std::os::unix::net::UnixStream
#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;

mod cobs;
mod crc;
mod payload;
mod specification;
mod transport;

pub use config::{Config, ConfigBuilder};
pub use crc::CrcParameters;
pub use error::{CobsError, CrcError, Error, FrameError, Status};
pub use transport::{StreamWire, TransportLayer, Wire};

#[cfg(test)]
mod test {
    use std::collections::VecDeque;

    use crate::Wire;

    /// A scripted byte transport with a synthetic clock.
    ///
    /// Bytes queued with [`feed`](MockWire::feed) become available to the
    /// engine; everything the engine emits lands in `written`. The clock
    /// advances by one microsecond per reading, so timeout paths run
    /// deterministically and without real waiting.
    #[derive(Debug, Default)]
    pub(crate) struct MockWire {
        incoming: VecDeque<u8>,
        pub(crate) written: Vec<u8>,
        clock: u64,
    }

    impl MockWire {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Queues bytes for the engine to receive.
        pub(crate) fn feed(&mut self, bytes: &[u8]) {
            self.incoming.extend(bytes);
        }

        /// The number of queued bytes the engine has not yet consumed.
        pub(crate) fn remaining(&self) -> usize {
            self.incoming.len()
        }
    }

    impl Wire for MockWire {
        fn bytes_available(&mut self) -> usize {
            self.incoming.len()
        }

        fn read_byte(&mut self) -> Option<u8> {
            self.incoming.pop_front()
        }

        fn write_all(&mut self, bytes: &[u8]) {
            self.written.extend_from_slice(bytes);
        }

        fn now_micros(&mut self) -> u64 {
            self.clock += 1;
            self.clock
        }
    }
}
