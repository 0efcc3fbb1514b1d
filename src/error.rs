//! All possible protocol errors and the byte-wide status taxonomy.
//!
//! Every fallible operation reports its outcome through a single byte-wide
//! status code, mirrored by [`TransportLayer::status`]. The code space is
//! partitioned between the subsystems (COBS uses 11 through 23, CRC 51
//! through 57 and the transport engine 101 through 121), so any observed
//! code uniquely identifies where it came from. Error variants carry their
//! code as the enum discriminant; success and progress codes live in
//! [`Status`].
//!
//! [`TransportLayer::status`]: crate::TransportLayer::status

use core::{
    error,
    fmt::{Display, Formatter},
};

/// Enumeration of all possible protocol errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// The COBS codec rejected an encode or decode request.
    ///
    /// Input-range and state variants (too small, too large, already
    /// encoded/decoded) indicate a usage bug and are fully recoverable.
    /// The delimiter variants are raised during reception when a packet
    /// passed the CRC check but is not a valid COBS chain, which means the
    /// wire corrupted it in a way the checksum failed to catch.
    Cobs(CobsError),

    /// A CRC helper was pointed at a range that exceeds its buffer.
    ///
    /// These are the only runtime failures the CRC engine can produce; a
    /// checksum mismatch is reported as [`FrameError::CrcCheckFailed`]
    /// instead.
    Crc(CrcError),

    /// The transport engine failed to stage, parse or validate a frame.
    ///
    /// Framing and integrity variants are transient and wire-induced: the
    /// engine never retries internally, so the caller decides whether to
    /// poll again. The out-of-range variants indicate a payload access
    /// beyond the staged region and are caller-recoverable.
    Frame(FrameError),
}

impl Error {
    /// Returns the byte-wide status code of this error.
    ///
    /// The value is identical to what [`TransportLayer::status`] reports
    /// after the failed operation.
    ///
    /// [`TransportLayer::status`]: crate::TransportLayer::status
    pub fn code(&self) -> u8 {
        match self {
            Error::Cobs(error) => *error as u8,
            Error::Crc(error) => *error as u8,
            Error::Frame(error) => *error as u8,
        }
    }
}

/// Failures of the in-place COBS encoder and decoder. Codes 11 through 23.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum CobsError {
    /// The staged payload is empty; there is nothing to encode.
    PayloadTooSmall = 12,

    /// The staged payload exceeds the 254-byte COBS limit.
    PayloadTooLarge = 13,

    /// The buffer cannot hold the payload plus the overhead and delimiter
    /// bytes.
    EncodedPacketExceedsBuffer = 14,

    /// The overhead byte is already set; encoding again would corrupt the
    /// packet.
    PayloadAlreadyEncoded = 15,

    /// The declared packet is smaller than overhead + one payload byte +
    /// delimiter.
    PacketTooSmall = 17,

    /// The declared packet exceeds the 256-byte COBS limit.
    PacketTooLarge = 18,

    /// The buffer cannot hold the declared packet.
    DecodedPacketExceedsBuffer = 19,

    /// The jump chain ran off the end of the packet without reaching the
    /// delimiter.
    DelimiterNotFound = 20,

    /// An unencoded delimiter appeared before the end of the packet.
    DelimiterFoundTooEarly = 21,

    /// The overhead byte is zero; decoding again would corrupt the payload.
    PacketAlreadyDecoded = 22,
}

/// Failures of the CRC buffer helpers. Codes 51 through 57.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum CrcError {
    /// The checksummed range extends past the end of the buffer.
    ChecksumSpanExceedsBuffer = 52,

    /// There is not enough room after the packet to append the checksum.
    ChecksumAppendExceedsBuffer = 54,

    /// There are not enough bytes at the read position to hold a checksum.
    ChecksumReadExceedsBuffer = 56,
}

/// Failures of the transport engine. Codes 101 through 121.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum FrameError {
    /// The incoming stream was exhausted without encountering the start
    /// byte. Only reported when start-byte errors are enabled; the default
    /// is the quieter [`FrameError::NoBytesToParse`].
    StartByteNotFound = 105,

    /// The payload size byte did not arrive within the inter-byte timeout.
    PayloadSizeByteNotFound = 107,

    /// The received payload size is outside the configured
    /// minimum/maximum range.
    InvalidPayloadSize = 108,

    /// Packet body reception stalled past the inter-byte timeout.
    PacketTimeout = 109,

    /// There were no packet bytes to parse. Reception lines commonly carry
    /// stray noise, so this is the default "nothing to do" outcome when no
    /// start byte turns up.
    NoBytesToParse = 110,

    /// The checksum over the received packet and its postamble was not
    /// zero; the packet is corrupted.
    CrcCheckFailed = 112,

    /// The write would extend past the payload region capacity.
    WriteOutOfRange = 115,

    /// The read would extend past the received payload length.
    ReadOutOfRange = 117,

    /// The expected number of packet bytes arrived but the last byte was
    /// not the delimiter.
    DelimiterNotFound = 119,

    /// The delimiter arrived before the expected number of packet bytes.
    DelimiterFoundTooEarly = 120,

    /// The CRC postamble did not arrive within the inter-byte timeout.
    PostambleTimeout = 121,
}

/// Success and progress codes recorded by the transport engine.
///
/// The engine updates its status byte at every stage of sending and
/// receiving; after a successful operation the status holds one of these
/// values, and after a failed one it holds the failing error's code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum Status {
    /// No operation has run yet.
    Standby = 101,
    /// The outgoing packet was encoded and checksummed.
    PacketConstructed = 102,
    /// The outgoing frame was handed to the byte transport.
    PacketSent = 103,
    /// The start byte was located in the incoming stream.
    StartByteFound = 104,
    /// A payload size byte within the accepted range was received.
    PayloadSizeByteFound = 106,
    /// The packet body and postamble were fully received.
    PacketParsed = 111,
    /// The received packet passed the CRC check and decoded cleanly.
    PacketValidated = 113,
    /// The decoded payload is available for reading.
    PacketReceived = 114,
    /// An object was written into the transmission payload region.
    ObjectWritten = 116,
    /// An object was read from the reception payload region.
    ObjectRead = 118,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Cobs(error) => write!(f, "cobs: {}", error),
            Error::Crc(error) => write!(f, "crc: {}", error),
            Error::Frame(error) => write!(f, "frame: {}", error),
        }
    }
}

impl Display for CobsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            CobsError::PayloadTooSmall => write!(f, "payload is empty"),
            CobsError::PayloadTooLarge => write!(f, "payload exceeds 254 bytes"),
            CobsError::EncodedPacketExceedsBuffer => {
                write!(f, "buffer too small for the encoded packet")
            }
            CobsError::PayloadAlreadyEncoded => write!(f, "payload is already encoded"),
            CobsError::PacketTooSmall => write!(f, "declared packet is below 3 bytes"),
            CobsError::PacketTooLarge => write!(f, "declared packet exceeds 256 bytes"),
            CobsError::DecodedPacketExceedsBuffer => {
                write!(f, "buffer too small for the declared packet")
            }
            CobsError::DelimiterNotFound => write!(f, "delimiter not reached by the jump chain"),
            CobsError::DelimiterFoundTooEarly => {
                write!(f, "delimiter found before the end of the packet")
            }
            CobsError::PacketAlreadyDecoded => write!(f, "packet is already decoded"),
        }
    }
}

impl Display for CrcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            CrcError::ChecksumSpanExceedsBuffer => {
                write!(f, "checksummed range exceeds the buffer")
            }
            CrcError::ChecksumAppendExceedsBuffer => {
                write!(f, "no room in the buffer to append the checksum")
            }
            CrcError::ChecksumReadExceedsBuffer => {
                write!(f, "no room in the buffer to read the checksum")
            }
        }
    }
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::StartByteNotFound => write!(f, "start byte not found"),
            FrameError::PayloadSizeByteNotFound => {
                write!(f, "payload size byte not received in time")
            }
            FrameError::InvalidPayloadSize => write!(f, "received payload size is out of range"),
            FrameError::PacketTimeout => write!(f, "packet body reception timed out"),
            FrameError::NoBytesToParse => write!(f, "no packet bytes to parse"),
            FrameError::CrcCheckFailed => write!(f, "checksum mismatch"),
            FrameError::WriteOutOfRange => write!(f, "write exceeds the payload region"),
            FrameError::ReadOutOfRange => write!(f, "read exceeds the received payload"),
            FrameError::DelimiterNotFound => write!(f, "delimiter missing at the end of the packet"),
            FrameError::DelimiterFoundTooEarly => {
                write!(f, "delimiter found before the end of the packet")
            }
            FrameError::PostambleTimeout => write!(f, "postamble reception timed out"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Cobs(error) => Some(error),
            Error::Crc(error) => Some(error),
            Error::Frame(error) => Some(error),
        }
    }
}

impl error::Error for CobsError {}

impl error::Error for CrcError {}

impl error::Error for FrameError {}

impl From<CobsError> for Error {
    fn from(error: CobsError) -> Self {
        Error::Cobs(error)
    }
}

impl From<CrcError> for Error {
    fn from(error: CrcError) -> Self {
        Error::Crc(error)
    }
}

impl From<FrameError> for Error {
    fn from(error: FrameError) -> Self {
        Error::Frame(error)
    }
}
