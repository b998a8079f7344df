//! Serial link to the peer core.
//!
//! [`SerialTransport`] is the contract the relay consumes: whole frames
//! out, whole frames in, never blocking on reads. [`FramedSerial`]
//! implements it on top of any `embedded-io` byte stream using the
//! framing in [`crate::framing`].

use embedded_io::{Error as _, Read, ReadReady, Write};

use crate::config::SERIAL_READ_CHUNKS_PER_PASS;
use crate::framing::{write_frame, FrameDecoder, WriteError};

/// Frame-oriented, non-blocking link to the peer core.
pub trait SerialTransport {
    /// Send one complete envelope.
    fn write(&mut self, frame: &[u8]);

    /// Consume whatever bytes are available right now, invoking
    /// `on_frame` once per complete frame. Returns `true` if more data
    /// is still pending.
    fn read_available(&mut self, on_frame: &mut dyn FnMut(&[u8])) -> bool;
}

/// COBS + CRC framing over a byte stream (a buffered UART on target).
pub struct FramedSerial<T> {
    io: T,
    decoder: FrameDecoder,
    write_errors: u32,
}

impl<T> FramedSerial<T> {
    pub fn new(io: T) -> Self {
        Self {
            io,
            decoder: FrameDecoder::new(),
            write_errors: 0,
        }
    }

    /// Frames dropped by the decoder.
    pub fn frames_dropped(&self) -> u32 {
        self.decoder.dropped()
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    pub fn inner(&self) -> &T {
        &self.io
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.io
    }
}

impl<T: Read + ReadReady + Write> SerialTransport for FramedSerial<T> {
    fn write(&mut self, frame: &[u8]) {
        match write_frame(&mut self.io, frame) {
            Ok(()) => {}
            Err(WriteError::Encode(e)) => {
                self.write_errors += 1;
                warn!("serial: cannot frame envelope: {}", e);
            }
            Err(WriteError::Io(e)) => {
                self.write_errors += 1;
                warn!("serial: write failed: {}", e.kind());
            }
        }
    }

    fn read_available(&mut self, on_frame: &mut dyn FnMut(&[u8])) -> bool {
        let mut chunk = [0u8; 64];
        for _ in 0..SERIAL_READ_CHUNKS_PER_PASS {
            match self.io.read_ready() {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    warn!("serial: read_ready failed: {}", e.kind());
                    return false;
                }
            }
            let n = match self.io.read(&mut chunk) {
                Ok(n) => n,
                Err(e) => {
                    warn!("serial: read failed: {}", e.kind());
                    return false;
                }
            };
            for &byte in &chunk[..n] {
                if let Some(frame) = self.decoder.push(byte) {
                    on_frame(frame);
                }
            }
        }
        self.io.read_ready().unwrap_or(false)
    }
}
