//! Scripted in-memory transport for bridge tests.

use core::time::Duration;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use super::{LINE_ENDING, Transport, push_keep_latest};
use crate::codec::FrameBuf;
use crate::error::TransportError;

/// Transport backed by a receive queue filled up front by the test.
///
/// Reads that run past the queued bytes report [`TransportError::Timeout`],
/// the same way a real port with a finite timeout would.
#[derive(Default)]
pub(crate) struct MockTransport {
    rx: VecDeque<u8>,
    /// Every byte written, in order, including line terminators
    pub tx: Vec<u8>,
    /// Lines written through `write_line`, without terminators
    pub lines: Vec<String>,
    pub timeout: Option<Duration>,
    /// Bytes queued once the three-byte buffer clear pattern has been written
    clear_reply: Option<Vec<u8>>,
    zero_run: usize,
    fail_writes: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw incoming bytes.
    pub fn push_rx(&mut self, bytes: &[u8]) -> &mut Self {
        self.rx.extend(bytes.iter().copied());
        self
    }

    /// Queue an incoming line terminated with CR/LF.
    pub fn push_line(&mut self, line: &str) -> &mut Self {
        self.push_rx(line.as_bytes());
        self.push_rx(LINE_ENDING)
    }

    /// Reply with `reply` after three consecutive `0x00` bytes were written.
    pub fn on_clear(&mut self, reply: &[u8]) -> &mut Self {
        self.clear_reply = Some(reply.to_vec());
        self
    }

    pub fn fail_writes(&mut self) -> &mut Self {
        self.fail_writes = true;
        self
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn record(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Closed);
        }
        self.tx.extend_from_slice(bytes);

        for &byte in bytes {
            self.zero_run = if byte == 0x00 { self.zero_run + 1 } else { 0 };
            if self.zero_run == 3 {
                self.zero_run = 0;
                if let Some(reply) = self.clear_reply.clone() {
                    self.rx.extend(reply);
                }
            }
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.timeout = Some(timeout);
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        self.record(line)?;
        self.record(LINE_ENDING)?;
        self.lines.push(String::from_utf8_lossy(line).into_owned());
        Ok(())
    }

    fn read_line(&mut self, line: &mut FrameBuf) -> Result<(), TransportError> {
        line.clear();
        loop {
            let byte = self.rx.pop_front().ok_or(TransportError::Timeout)?;
            match byte {
                b'\n' => break,
                b'\r' => {}
                _ => line.push(byte).map_err(|_| TransportError::Overflow {
                    capacity: line.capacity(),
                })?,
            }
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.record(bytes)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if self.rx.len() < buf.len() {
            self.rx.clear();
            return Err(TransportError::Timeout);
        }
        for slot in buf.iter_mut() {
            *slot = self.rx.pop_front().ok_or(TransportError::Timeout)?;
        }
        Ok(())
    }

    fn read_existing(&mut self, buf: &mut FrameBuf) -> Result<(), TransportError> {
        buf.clear();
        let pending: Vec<u8> = self.rx.drain(..).collect();
        push_keep_latest(buf, &pending);
        Ok(())
    }
}
