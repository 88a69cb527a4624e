use crate::packet::{self, InterfaceCommand};
use crate::{
    OpenOptions, PortInfo, Received, Result, StatusEvent, Transceiver, Transmission,
    TransportError,
};
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const BAUD_RATE: u32 = 38_400;
const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// RFXtrx USB interface on a serial port.
pub struct SerialTransceiver {
    path: String,
    port: Box<dyn SerialPort>,
    debug: bool,
    seqnbr: u8,
    acc: Vec<u8>,
    // Packets read while waiting for a status reply
    pending: VecDeque<Received>,
}

impl SerialTransceiver {
    fn next_seqnbr(&mut self) -> u8 {
        self.seqnbr = self.seqnbr.wrapping_add(1);
        self.seqnbr
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if self.debug {
            trace!(port = %self.path, frame = %packet::hex(frame), "tx");
        }
        self.port
            .write_all(frame)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.port.set_timeout(timeout).ok();
        loop {
            if let Some(frame) = take_frame(&mut self.acc) {
                if self.debug {
                    trace!(port = %self.path, frame = %packet::hex(&frame), "rx");
                }
                return Ok(frame);
            }
            fill(&mut self.acc, self.port.as_mut())?;
        }
    }

    fn control(&mut self, cmd: InterfaceCommand) -> Result<()> {
        let seq = self.next_seqnbr();
        self.write_frame(&packet::encode_control(cmd, seq))
    }
}

/// Split the next length-prefixed frame off the front of `acc`.
fn take_frame(acc: &mut Vec<u8>) -> Option<Vec<u8>> {
    // A zero length byte is line noise
    let noise = acc.iter().take_while(|b| **b == 0).count();
    acc.drain(..noise);
    let len = *acc.first()? as usize + 1;
    if acc.len() < len {
        return None;
    }
    Some(acc.drain(..len).collect())
}

/// Append one read's worth of bytes to `acc`. End of input means the port went away.
fn fill<R: Read + ?Sized>(acc: &mut Vec<u8>, src: &mut R) -> Result<()> {
    let mut buf = [0u8; 64];
    match src.read(&mut buf) {
        Ok(0) => Err(TransportError::Io("port closed".into())),
        Ok(n) => {
            acc.extend_from_slice(&buf[..n]);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::TimedOut => Err(TransportError::Timeout),
        Err(e) if e.kind() == ErrorKind::Interrupted => Ok(()),
        Err(e) => Err(TransportError::Io(e.to_string())),
    }
}

impl Transceiver for SerialTransceiver {
    fn open(path: &str, options: &OpenOptions) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(Duration::from_millis(200))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::InterfaceNotFound(path.to_string()),
                _ => TransportError::Io(e.to_string()),
            })?;
        Ok(SerialTransceiver {
            path: path.to_string(),
            port,
            debug: options.debug,
            seqnbr: 0,
            acc: Vec::with_capacity(64),
            pending: VecDeque::new(),
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "rfxtrx-usb",
                _ => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    fn initialise(&mut self) -> Result<StatusEvent> {
        self.control(InterfaceCommand::Reset)?;
        // The interface ignores input for a while after a reset and may emit garbage
        thread::sleep(Duration::from_millis(500));
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.acc.clear();
        let status = self.request_status()?;
        self.control(InterfaceCommand::StartReceiver)?;
        debug!(port = %self.path, receiver = ?status.receiver_type(), "transceiver initialised");
        Ok(status)
    }

    fn request_status(&mut self) -> Result<StatusEvent> {
        self.control(InterfaceCommand::GetStatus)?;
        let deadline = Instant::now() + STATUS_TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(TransportError::Timeout);
            }
            let frame = self.read_frame(left)?;
            match packet::decode(&frame) {
                Ok(Received::Status(status)) => return Ok(status),
                Ok(other) => self.pending.push_back(other),
                Err(e) => debug!(port = %self.path, "skipping frame: {e}"),
            }
        }
    }

    fn transmit(&mut self, tx: &Transmission) -> Result<()> {
        let seq = self.next_seqnbr();
        self.write_frame(&packet::encode_transmission(tx, seq))
    }

    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<Option<Received>> {
        if let Some(next) = self.pending.pop_front() {
            return Ok(Some(next));
        }
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(200));
        let frame = self.read_frame(timeout)?;
        match packet::decode(&frame) {
            Ok(received) => Ok(Some(received)),
            Err(e) => {
                debug!(port = %self.path, "skipping frame: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_frames_split_on_length_prefix() {
        let mut acc = vec![0x02, 0xAA, 0xBB, 0x01, 0xCC, 0x03];
        assert_eq!(take_frame(&mut acc), Some(vec![0x02, 0xAA, 0xBB]));
        assert_eq!(take_frame(&mut acc), Some(vec![0x01, 0xCC]));
        // Length byte seen, body not yet
        assert_eq!(take_frame(&mut acc), None);
        assert_eq!(acc, vec![0x03]);
    }

    #[test]
    fn test_leading_zero_bytes_skipped() {
        let mut acc = vec![0x00, 0x00, 0x01, 0x7F];
        assert_eq!(take_frame(&mut acc), Some(vec![0x01, 0x7F]));
        assert!(acc.is_empty());

        let mut noise = vec![0x00, 0x00];
        assert_eq!(take_frame(&mut noise), None);
        assert!(noise.is_empty());
    }

    #[test]
    fn test_end_of_input_is_an_io_error() {
        let mut acc = Vec::new();
        let mut unplugged: &[u8] = &[];
        let err = fill(&mut acc, &mut unplugged).unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_fill_appends_and_maps_timeouts() {
        let mut acc = vec![0x04];
        let mut src: &[u8] = &[0x10, 0x20];
        fill(&mut acc, &mut src).unwrap();
        assert_eq!(acc, vec![0x04, 0x10, 0x20]);

        struct Silent;
        impl Read for Silent {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::TimedOut, "quiet line"))
            }
        }
        let err = fill(&mut acc, &mut Silent).unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }
}
