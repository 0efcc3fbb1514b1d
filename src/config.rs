//! Configuration for setting up a [`TransportLayer`].
//!
//! Building a config starts from the one decision without a universal
//! default, the CRC parameter set, and everything else can be left alone:
//!
//! ```
//! use framewire::{Config, CrcParameters};
//!
//! let config = Config::builder_with_crc(CrcParameters::crc16_ccitt_false()).build();
//! ```
//!
//! Both ends of a link must agree on every option below; a mismatched
//! start byte, delimiter or CRC parameter set makes every frame look like
//! line noise to the peer.
//!
//! A fully spelled-out configuration:
//! ```
//! use framewire::{Config, CrcParameters};
//!
//! let config = Config::builder_with_crc(CrcParameters::crc16_ccitt_false())
//!     .with_start_byte(129)
//!     .with_delimiter_byte(0)
//!     .with_max_tx_payload_size(254)
//!     .with_max_rx_payload_size(200)
//!     .with_min_payload_size(1)
//!     .with_timeout_micros(20_000)
//!     .with_allow_start_byte_errors(false)
//!     .build();
//! ```
//!
//! [`TransportLayer`]: crate::TransportLayer

use crate::crc::CrcParameters;

/// Configuration for a [`TransportLayer`].
///
/// Create one through [`Config::builder_with_crc`].
///
/// [`TransportLayer`]: crate::TransportLayer
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Config {
    pub(crate) crc: CrcParameters,
    pub(crate) start_byte: u8,
    pub(crate) delimiter_byte: u8,
    pub(crate) max_tx_payload_size: u8,
    pub(crate) max_rx_payload_size: u8,
    pub(crate) min_payload_size: u8,
    pub(crate) timeout_micros: u32,
    pub(crate) allow_start_byte_errors: bool,
}

impl Config {
    /// Starts a builder with the given CRC parameters and every other
    /// option at its default: start byte 129, delimiter 0, payload
    /// capacities 254, minimum payload 1, inter-byte timeout 20 000 µs,
    /// start-byte errors off.
    pub fn builder_with_crc(crc: CrcParameters) -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                crc,
                start_byte: 129,
                delimiter_byte: 0,
                max_tx_payload_size: 254,
                max_rx_payload_size: 254,
                min_payload_size: 1,
                timeout_micros: 20_000,
                allow_start_byte_errors: false,
            },
        }
    }
}

/// A builder for [`Config`] values.
///
/// Obtained from [`Config::builder_with_crc`]. Size options are validated
/// as they are set; out-of-range values are a configuration bug and
/// panic.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the frame start marker. Any byte works; prefer one unlikely to
    /// appear as line noise, and different from the delimiter.
    pub fn with_start_byte(mut self, start_byte: u8) -> Self {
        self.config.start_byte = start_byte;
        self
    }

    /// Sets the COBS delimiter and frame terminator.
    ///
    /// Zero is strongly recommended: it is the only value the overhead
    /// byte can never take, so any other choice gives up a little of the
    /// decoder's corruption-detection margin.
    pub fn with_delimiter_byte(mut self, delimiter_byte: u8) -> Self {
        self.config.delimiter_byte = delimiter_byte;
        self
    }

    /// Sets the transmission payload capacity.
    ///
    /// # Panics
    /// Panics unless `size` is between 1 and 254.
    pub fn with_max_tx_payload_size(mut self, size: u8) -> Self {
        assert!((1..=254).contains(&size));
        self.config.max_tx_payload_size = size;
        self
    }

    /// Sets the reception payload capacity, which is also the largest
    /// payload size accepted from the wire.
    ///
    /// # Panics
    /// Panics unless `size` is between 1 and 254.
    pub fn with_max_rx_payload_size(mut self, size: u8) -> Self {
        assert!((1..=254).contains(&size));
        self.config.max_rx_payload_size = size;
        self
    }

    /// Sets the smallest payload size accepted from the wire. Raising it
    /// above 1 lets the receiver skip parsing attempts that cannot
    /// succeed and reject undersized frames early.
    ///
    /// # Panics
    /// Panics unless `size` is between 1 and 254.
    pub fn with_min_payload_size(mut self, size: u8) -> Self {
        assert!((1..=254).contains(&size));
        self.config.min_payload_size = size;
        self
    }

    /// Sets the inter-byte reception timeout in microseconds. The timer
    /// restarts on every received byte; it bounds the gap between bytes,
    /// not the whole frame.
    pub fn with_timeout_micros(mut self, timeout_micros: u32) -> Self {
        self.config.timeout_micros = timeout_micros;
        self
    }

    /// Chooses whether a fruitless start-byte search reports the explicit
    /// [`FrameError::StartByteNotFound`] instead of the quiet
    /// [`FrameError::NoBytesToParse`]. Off by default, since reception
    /// lines commonly carry transient noise.
    ///
    /// [`FrameError::StartByteNotFound`]: crate::FrameError::StartByteNotFound
    /// [`FrameError::NoBytesToParse`]: crate::FrameError::NoBytesToParse
    pub fn with_allow_start_byte_errors(mut self, allow: bool) -> Self {
        self.config.allow_start_byte_errors = allow;
        self
    }

    /// Finishes the builder.
    ///
    /// # Panics
    /// Panics if the minimum payload size exceeds the reception capacity,
    /// which would make every incoming frame invalid.
    pub fn build(self) -> Config {
        assert!(self.config.min_payload_size <= self.config.max_rx_payload_size);
        self.config
    }
}
