//! The transport engine: packet construction, the reception state machine
//! and the typed payload API.
//!
//! [`TransportLayer`] owns the byte transport, a CRC engine and the two
//! staging buffers, and drives the full life of a frame: values staged
//! with [`write_data`] are COBS-encoded, checksummed and emitted by
//! [`send_data`]; [`receive_data`] locates a frame in the incoming byte
//! stream, validates it and leaves the decoded payload for [`read_data`].
//!
//! The engine is single-threaded and synchronous. It suspends only inside
//! [`send_data`] (one blocking write) and [`receive_data`] (a busy-poll of
//! the transport with an inter-byte timeout); it never sleeps, spawns or
//! calls back.
//!
//! [`write_data`]: TransportLayer::write_data
//! [`send_data`]: TransportLayer::send_data
//! [`receive_data`]: TransportLayer::receive_data
//! [`read_data`]: TransportLayer::read_data

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::Instant;

use bytemuck::Pod;
use tracing::{debug, trace};

use crate::{
    cobs,
    config::Config,
    crc::CrcEngine,
    error::{Error, FrameError, Status},
    payload::StagingBuffer,
    specification::{OVERHEAD_BYTE_INDEX, PAYLOAD_SIZE_INDEX, PAYLOAD_START_INDEX},
};

/// The byte-transport capability the engine requires from its
/// environment.
///
/// Any full-duplex byte stream with nonblocking availability, nonblocking
/// single-byte reads, a blocking bulk write and a monotonic
/// microsecond-resolution clock can carry frames. For `std` stream types
/// the ready-made [`StreamWire`] binding applies; embedded integrations
/// implement the trait over their UART or USB-CDC driver.
pub trait Wire {
    /// Returns the number of received bytes buffered and ready to read.
    /// Must not block.
    fn bytes_available(&mut self) -> usize;

    /// Takes one buffered byte, or `None` when nothing is buffered. Must
    /// not block.
    fn read_byte(&mut self) -> Option<u8>;

    /// Writes the whole range, blocking as needed. The range is one wire
    /// frame and must not be interleaved with other writes, though the
    /// implementation is free to buffer it.
    fn write_all(&mut self, bytes: &[u8]);

    /// A monotonic microsecond reading, used only to detect stalled
    /// receptions. Readings need a stable origin but the origin itself is
    /// arbitrary.
    fn now_micros(&mut self) -> u64;
}

/// Binds any `Read + Write` stream as a [`Wire`].
///
/// Reads are drained eagerly into an internal queue so availability can
/// be answered without blocking; a `WouldBlock` from the inner stream is
/// treated as "nothing buffered", which matches nonblocking sockets,
/// serial handles and pipes. Writes retry on `WouldBlock` and
/// `Interrupted` until the frame is out. The clock is served from a
/// [`std::time::Instant`] taken at construction.
#[derive(Debug)]
pub struct StreamWire<S> {
    stream: S,
    pending: VecDeque<u8>,
    origin: Instant,
}

impl<S: Read + Write> StreamWire<S> {
    /// Wraps `stream`. The stream should be in nonblocking mode;
    /// otherwise reads may stall the reception poll loop.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: VecDeque::new(),
            origin: Instant::now(),
        }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn fill_pending(&mut self) {
        let mut chunk = [0u8; 64];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(count) => self.pending.extend(&chunk[..count]),
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    }
}

impl<S: Read + Write> Wire for StreamWire<S> {
    fn bytes_available(&mut self) -> usize {
        self.fill_pending();
        self.pending.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.fill_pending();
        }
        self.pending.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) {
        let mut written = 0;
        while written < bytes.len() {
            match self.stream.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(count) => written += count,
                Err(error)
                    if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) =>
                {
                    continue
                }
                Err(_) => break,
            }
        }
    }

    fn now_micros(&mut self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Where the reception state machine currently stands.
///
/// ```text
///
///        |
///        V
///    SeekStart --> ReadSize --> ReadBody --> ReadPostamble
///
/// ```
/// Validation (CRC check and COBS decode) runs after the last state
/// completes; every state can instead exit the machine with a framing
/// error.
#[derive(Debug, Eq, PartialEq)]
enum ParseState {
    SeekStart,
    ReadSize,
    ReadBody { received: usize, expected: usize },
    ReadPostamble { received: usize, body: usize },
}

/// A bidirectional, CRC-checked, COBS-framed packet link over a byte
/// transport.
///
/// One engine instance serves one point-to-point link. It is not
/// reentrant and not shareable between execution contexts; both staging
/// buffers, the status byte and the transport handle are owned
/// exclusively by the instance. All memory is allocated at construction.
///
/// Every operation records a byte-wide status retrievable through
/// [`status`](TransportLayer::status); see the [`error`](crate::error)
/// module for the code taxonomy.
#[derive(Debug)]
pub struct TransportLayer<W: Wire> {
    port: W,
    crc: CrcEngine,
    tx: StagingBuffer,
    rx: StagingBuffer,
    delimiter_byte: u8,
    start_byte: u8,
    min_payload_size: u8,
    timeout_micros: u32,
    allow_start_byte_errors: bool,
    status: u8,
}

impl<W: Wire> TransportLayer<W> {
    /// Creates an engine over `port` with the given configuration.
    ///
    /// Both staging buffers are allocated and zeroed here, the CRC lookup
    /// table is generated, and the start byte is stamped into the
    /// transmission buffer once for the engine's lifetime.
    pub fn with_config(port: W, config: Config) -> Self {
        let crc = CrcEngine::new(&config.crc);
        let postamble_size = crc.postamble_size();
        Self {
            tx: StagingBuffer::new(config.start_byte, config.max_tx_payload_size, postamble_size),
            rx: StagingBuffer::new(config.start_byte, config.max_rx_payload_size, postamble_size),
            port,
            crc,
            delimiter_byte: config.delimiter_byte,
            start_byte: config.start_byte,
            min_payload_size: config.min_payload_size,
            timeout_micros: config.timeout_micros,
            allow_start_byte_errors: config.allow_start_byte_errors,
            status: Status::Standby as u8,
        }
    }

    /// The smallest number of buffered bytes that can still hold a
    /// complete frame of the configured minimum payload size.
    fn min_packet_size(&self) -> usize {
        self.min_payload_size as usize + 3 + self.crc.postamble_size()
    }

    /// Returns true when enough bytes are buffered to plausibly hold a
    /// complete frame, making a [`receive_data`] call worthwhile.
    ///
    /// Does not modify the engine status.
    ///
    /// [`receive_data`]: TransportLayer::receive_data
    pub fn available(&mut self) -> bool {
        self.port.bytes_available() >= self.min_packet_size()
    }

    /// Packages the staged payload into a frame and writes it to the
    /// transport.
    ///
    /// The payload is COBS-encoded in place, the checksum is computed over
    /// the encoded span and appended, and the whole frame goes out in a
    /// single write. On success the transmission payload tracker is reset
    /// so the next payload can be staged; on failure the buffer is left
    /// untouched and the status identifies the failing step.
    pub fn send_data(&mut self) -> Result<(), Error> {
        let frame_size = match self.construct_packet() {
            Ok(size) => size,
            Err(error) => {
                self.status = error.code();
                return Err(error);
            }
        };

        self.port.write_all(&self.tx.as_slice()[..frame_size]);
        self.status = Status::PacketSent as u8;
        self.tx.reset();
        trace!(frame_size, "frame transmitted");
        Ok(())
    }

    /// Locates, parses and validates one frame from the incoming byte
    /// stream, leaving the decoded payload in the reception buffer.
    ///
    /// Returns early with [`FrameError::NoBytesToParse`] when fewer than a
    /// minimum frame's worth of bytes are buffered. Otherwise the
    /// reception payload tracker is reset and the state machine runs:
    /// start-byte search, size byte, body, postamble, CRC check, COBS
    /// decode. Any failure leaves the reception buffer safe to reuse; the
    /// next call starts from a fresh tracker.
    pub fn receive_data(&mut self) -> Result<(), Error> {
        if !self.available() {
            let error = Error::from(FrameError::NoBytesToParse);
            self.status = error.code();
            return Err(error);
        }

        self.rx.reset();

        let packet_size = match self.parse_packet() {
            Ok(size) => size,
            Err(error) => {
                self.status = error.code();
                debug!(code = error.code(), "frame reception failed");
                return Err(error);
            }
        };

        match self.validate_packet(packet_size) {
            Ok(payload_size) => {
                self.status = Status::PacketReceived as u8;
                trace!(payload_size, "frame received");
                Ok(())
            }
            Err(error) => {
                self.status = error.code();
                debug!(code = error.code(), "frame validation failed");
                Err(error)
            }
        }
    }

    /// Writes `object` into the transmission payload at payload-relative
    /// `start`, returning the next free offset for chained writes.
    pub fn write_data<T: Pod>(&mut self, object: &T, start: usize) -> Result<usize, Error> {
        match self.tx.write_object(object, start) {
            Ok(next) => {
                self.status = Status::ObjectWritten as u8;
                Ok(next)
            }
            Err(error) => {
                self.status = error as u8;
                Err(error.into())
            }
        }
    }

    /// Reads `object` out of the received payload at payload-relative
    /// `start`, returning the offset past the read bytes for chained
    /// reads. The reception buffer is not modified.
    pub fn read_data<T: Pod>(&mut self, object: &mut T, start: usize) -> Result<usize, Error> {
        match self.rx.read_object(object, start) {
            Ok(next) => {
                self.status = Status::ObjectRead as u8;
                Ok(next)
            }
            Err(error) => {
                self.status = error as u8;
                Err(error.into())
            }
        }
    }

    /// Resets the transmission payload tracker and overhead byte,
    /// discarding any staged payload. Does not modify the engine status.
    pub fn reset_transmission_buffer(&mut self) {
        self.tx.reset();
    }

    /// Resets the reception payload tracker and overhead byte, discarding
    /// any received payload. Does not modify the engine status.
    pub fn reset_reception_buffer(&mut self) {
        self.rx.reset();
    }

    /// The status byte recorded by the most recent operation.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// The number of payload bytes currently staged for transmission.
    pub fn tx_payload_size(&self) -> u8 {
        self.tx.payload_size()
    }

    /// The number of payload bytes received by the last successful
    /// reception.
    pub fn rx_payload_size(&self) -> u8 {
        self.rx.payload_size()
    }

    /// The configured transmission payload capacity.
    pub fn max_tx_payload_size(&self) -> u8 {
        self.tx.max_payload_size()
    }

    /// The configured reception payload capacity.
    pub fn max_rx_payload_size(&self) -> u8 {
        self.rx.max_payload_size()
    }

    /// The total size of the transmission staging buffer, metadata and
    /// postamble included.
    pub fn tx_buffer_size(&self) -> usize {
        self.tx.len()
    }

    /// The total size of the reception staging buffer, metadata and
    /// postamble included.
    pub fn rx_buffer_size(&self) -> usize {
        self.rx.len()
    }

    /// Promotes "start byte not found" from the quiet
    /// [`FrameError::NoBytesToParse`] to the explicit
    /// [`FrameError::StartByteNotFound`], or back. Useful when debugging a
    /// line that should be quiet.
    pub fn set_allow_start_byte_errors(&mut self, allow: bool) {
        self.allow_start_byte_errors = allow;
    }

    /// Borrows the underlying byte transport.
    pub fn port(&self) -> &W {
        &self.port
    }

    /// Mutably borrows the underlying byte transport.
    pub fn port_mut(&mut self) -> &mut W {
        &mut self.port
    }

    /// Snapshots the transmission staging buffer. Intended for test
    /// harnesses that need to inspect a constructed frame without
    /// touching buffer state.
    pub fn copy_tx_buffer(&self) -> Vec<u8> {
        self.tx.as_slice().to_vec()
    }

    /// Snapshots the reception staging buffer. Intended for test
    /// harnesses.
    pub fn copy_rx_buffer(&self) -> Vec<u8> {
        self.rx.as_slice().to_vec()
    }

    /// Copies the staged transmission payload into the reception buffer,
    /// simulating a loopback reception of the staged data. Returns false
    /// when the staged payload does not fit the reception capacity.
    ///
    /// Intended for test harnesses; does not modify the engine status.
    pub fn copy_tx_payload_to_rx(&mut self) -> bool {
        let payload_size = self.tx.payload_size();
        if payload_size > self.rx.max_payload_size() {
            return false;
        }

        let span = PAYLOAD_START_INDEX..PAYLOAD_START_INDEX + payload_size as usize;
        let (source, destination) = (self.tx.as_slice(), self.rx.as_mut_slice());
        destination[span.clone()].copy_from_slice(&source[span]);
        destination[PAYLOAD_SIZE_INDEX] = payload_size;
        true
    }

    /// Encodes and checksums the staged payload, returning the full frame
    /// size to emit.
    fn construct_packet(&mut self) -> Result<usize, Error> {
        let packet_size = cobs::encode_payload(self.tx.as_mut_slice(), self.delimiter_byte)?;
        let checksum = self
            .crc
            .checksum(self.tx.as_slice(), OVERHEAD_BYTE_INDEX, packet_size)?;
        let frame_size = self.crc.append_checksum(
            self.tx.as_mut_slice(),
            OVERHEAD_BYTE_INDEX + packet_size,
            checksum,
        )?;
        self.status = Status::PacketConstructed as u8;
        Ok(frame_size)
    }

    /// Waits for one byte, polling the transport until it arrives or the
    /// inter-byte timeout elapses.
    fn read_byte_with_timeout(&mut self) -> Option<u8> {
        let started = self.port.now_micros();
        loop {
            if self.port.bytes_available() > 0 {
                if let Some(byte) = self.port.read_byte() {
                    return Some(byte);
                }
            }
            if self
                .port
                .now_micros()
                .saturating_sub(started)
                >= self.timeout_micros as u64
            {
                return None;
            }
        }
    }

    /// Runs the reception state machine up to and including the CRC
    /// postamble, returning the parsed packet size (overhead byte through
    /// checksum).
    fn parse_packet(&mut self) -> Result<usize, Error> {
        let mut state = ParseState::SeekStart;
        loop {
            match state {
                ParseState::SeekStart => {
                    // Drains buffered noise one byte at a time; discarded
                    // bytes are never surfaced. No timeout applies, the
                    // search simply ends with the buffered bytes.
                    let mut found = false;
                    while self.port.bytes_available() > 0 {
                        if self.port.read_byte() == Some(self.start_byte) {
                            found = true;
                            break;
                        }
                    }
                    if !found {
                        return Err(if self.allow_start_byte_errors {
                            FrameError::StartByteNotFound.into()
                        } else {
                            FrameError::NoBytesToParse.into()
                        });
                    }
                    self.status = Status::StartByteFound as u8;
                    state = ParseState::ReadSize;
                }
                ParseState::ReadSize => {
                    let Some(size) = self.read_byte_with_timeout() else {
                        return Err(FrameError::PayloadSizeByteNotFound.into());
                    };
                    if size < self.min_payload_size || size > self.rx.max_payload_size() {
                        return Err(FrameError::InvalidPayloadSize.into());
                    }
                    self.rx.as_mut_slice()[PAYLOAD_SIZE_INDEX] = size;
                    self.status = Status::PayloadSizeByteFound as u8;
                    state = ParseState::ReadBody {
                        received: 0,
                        // Overhead byte + encoded payload + delimiter.
                        expected: size as usize + 2,
                    };
                }
                ParseState::ReadBody { received, expected } => {
                    let Some(byte) = self.read_byte_with_timeout() else {
                        return Err(FrameError::PacketTimeout.into());
                    };
                    self.rx.as_mut_slice()[OVERHEAD_BYTE_INDEX + received] = byte;
                    let received = received + 1;

                    if byte == self.delimiter_byte {
                        if received < expected {
                            return Err(FrameError::DelimiterFoundTooEarly.into());
                        }
                        state = ParseState::ReadPostamble {
                            received: 0,
                            body: expected,
                        };
                    } else if received == expected {
                        return Err(FrameError::DelimiterNotFound.into());
                    } else {
                        state = ParseState::ReadBody { received, expected };
                    }
                }
                ParseState::ReadPostamble { received, body } => {
                    let Some(byte) = self.read_byte_with_timeout() else {
                        return Err(FrameError::PostambleTimeout.into());
                    };
                    self.rx.as_mut_slice()[OVERHEAD_BYTE_INDEX + body + received] = byte;
                    let received = received + 1;

                    if received == self.crc.postamble_size() {
                        self.status = Status::PacketParsed as u8;
                        return Ok(body + received);
                    }
                    state = ParseState::ReadPostamble { received, body };
                }
            }
        }
    }

    /// Checks the parsed packet's checksum and decodes its payload.
    ///
    /// Relies on the zero-residue property: the checksum over the encoded
    /// packet plus its big-endian postamble must come out zero. Only then
    /// is the payload COBS-decoded, which doubles as a second corruption
    /// check.
    fn validate_packet(&mut self, packet_size: usize) -> Result<usize, Error> {
        let checksum = self
            .crc
            .checksum(self.rx.as_slice(), OVERHEAD_BYTE_INDEX, packet_size)?;
        if checksum != 0 {
            let postamble_index = OVERHEAD_BYTE_INDEX + packet_size - self.crc.postamble_size();
            let received = self.crc.read_checksum(self.rx.as_slice(), postamble_index)?;
            debug!(residue = checksum, received, "checksum mismatch, dropping frame");
            return Err(FrameError::CrcCheckFailed.into());
        }

        let payload_size = cobs::decode_payload(self.rx.as_mut_slice(), self.delimiter_byte)?;
        self.status = Status::PacketValidated as u8;
        Ok(payload_size)
    }
}
