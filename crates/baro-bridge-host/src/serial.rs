//! [`Transport`] over a host serial port

use std::io::{self, Read, Write};
use std::time::Duration;

use baro_bridge_core::codec::FrameBuf;
use baro_bridge_core::transport::{LINE_ENDING, Transport, push_keep_latest};
use baro_bridge_core::TransportError;
use log::warn;

/// Chunk size used when draining pending input
const DRAIN_CHUNK: usize = 64;

/// The parts of a serial port the transport needs.
pub trait SerialLink: Read + Write {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Bytes received and not yet read
    fn bytes_to_read(&self) -> io::Result<usize>;
}

impl SerialLink for Box<dyn serialport::SerialPort> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        serialport::SerialPort::set_timeout(self.as_mut(), timeout).map_err(io::Error::from)
    }

    fn bytes_to_read(&self) -> io::Result<usize> {
        let pending = serialport::SerialPort::bytes_to_read(self.as_ref()).map_err(io::Error::from)?;
        Ok(pending as usize)
    }
}

pub struct SerialTransport<P = Box<dyn serialport::SerialPort>> {
    port: P,
}

impl SerialTransport {
    /// Open `path` at `baud_rate`, 8N1, no flow control.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> serialport::Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        Ok(Self::new(port))
    }
}

impl<P: SerialLink> SerialTransport<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> P {
        self.port
    }
}

impl<P: SerialLink> Transport for SerialTransport<P> {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.port.set_timeout(timeout).map_err(map_io)
    }

    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(line).map_err(map_io)?;
        self.port.write_all(LINE_ENDING).map_err(map_io)?;
        self.port.flush().map_err(map_io)
    }

    fn read_line(&mut self, line: &mut FrameBuf) -> Result<(), TransportError> {
        line.clear();
        loop {
            let byte = self.read_byte()?;
            if byte == b'\n' {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(());
            }
            line.push(byte).map_err(|_| TransportError::Overflow {
                capacity: line.capacity(),
            })?;
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes).map_err(map_io)?;
        self.port.flush().map_err(map_io)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.port.read_exact(buf).map_err(map_io)
    }

    fn read_existing(&mut self, buf: &mut FrameBuf) -> Result<(), TransportError> {
        buf.clear();
        let mut remaining = self.port.bytes_to_read().map_err(map_io)?;
        let mut chunk = [0u8; DRAIN_CHUNK];

        while remaining > 0 {
            let want = remaining.min(DRAIN_CHUNK);
            let read = self.port.read(&mut chunk[..want]).map_err(map_io)?;
            if read == 0 {
                break;
            }
            push_keep_latest(buf, &chunk[..read]);
            remaining -= read;
        }
        Ok(())
    }
}

fn map_io(error: io::Error) -> TransportError {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionAborted => TransportError::Closed,
        _ => {
            warn!("Serial I/O error: {error}");
            TransportError::Io
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory port: reads drain `rx`, then time out like a real port.
    #[derive(Default)]
    struct FakePort {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        timeout: Option<Duration>,
    }

    impl FakePort {
        fn with_rx(bytes: &[u8]) -> Self {
            Self {
                rx: bytes.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.rx.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
            }
            let n = buf.len().min(self.rx.len());
            for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialLink for FakePort {
        fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
            self.timeout = Some(timeout);
            Ok(())
        }

        fn bytes_to_read(&self) -> io::Result<usize> {
            Ok(self.rx.len())
        }
    }

    #[test]
    fn test_write_line_appends_crlf() {
        let mut transport = SerialTransport::new(FakePort::default());
        transport.write_line(b"WV,0011,0101.").unwrap();
        assert_eq!(transport.into_inner().tx, b"WV,0011,0101.\r\n");
    }

    #[test]
    fn test_read_line_strips_terminator() {
        let mut transport = SerialTransport::new(FakePort::with_rx(b"SHW,000E,0177\r\nSHW,0013"));
        let mut line = FrameBuf::new();

        transport.read_line(&mut line).unwrap();
        assert_eq!(line.as_slice(), b"SHW,000E,0177");

        // Remaining bytes never get a terminator
        assert_eq!(transport.read_line(&mut line), Err(TransportError::Timeout));
    }

    #[test]
    fn test_read_line_accepts_bare_lf() {
        let mut transport = SerialTransport::new(FakePort::with_rx(b"OK\n"));
        let mut line = FrameBuf::new();
        transport.read_line(&mut line).unwrap();
        assert_eq!(line.as_slice(), b"OK");
    }

    #[test]
    fn test_read_line_overflow() {
        let long = vec![b'A'; FrameBuf::new().capacity() + 1];
        let mut transport = SerialTransport::new(FakePort::with_rx(&long));
        let mut line = FrameBuf::new();

        assert!(matches!(
            transport.read_line(&mut line),
            Err(TransportError::Overflow { .. })
        ));
    }

    #[test]
    fn test_read_exact_times_out_on_short_input() {
        let mut transport = SerialTransport::new(FakePort::with_rx(&[0x52, 0x02]));
        let mut buf = [0u8; 2];
        transport.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x52, 0x02]);
        assert_eq!(transport.read_byte(), Err(TransportError::Timeout));
    }

    #[test]
    fn test_read_existing_drains_without_waiting() {
        let mut transport = SerialTransport::new(FakePort::with_rx(b"\x00garbageOK\r\n"));
        let mut buf = FrameBuf::new();

        transport.read_existing(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), b"\x00garbageOK\r\n");

        // Nothing pending: returns empty rather than timing out
        transport.read_existing(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_set_timeout_reaches_port() {
        let mut transport = SerialTransport::new(FakePort::default());
        transport.set_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(transport.into_inner().timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_io_error_mapping() {
        let kind = |kind| map_io(io::Error::new(kind, "test"));
        assert_eq!(kind(io::ErrorKind::TimedOut), TransportError::Timeout);
        assert_eq!(kind(io::ErrorKind::BrokenPipe), TransportError::Closed);
        assert_eq!(kind(io::ErrorKind::PermissionDenied), TransportError::Io);
    }
}
