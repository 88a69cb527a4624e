use crate::packet::{self, InterfaceCommand};
use crate::{
    OpenOptions, PortInfo, Received, Result, StatusEvent, Transceiver, Transmission,
    TransportError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    sent: Vec<Transmission>,
    inbox: VecDeque<Received>,
    fail_status: bool,
}

/// Shared view into a [`MockTransceiver`], usable after the transceiver has been moved.
#[derive(Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Everything transmitted so far, in order.
    pub fn sent(&self) -> Vec<Transmission> {
        self.lock().sent.clone()
    }

    /// Queue a packet to be returned by the next `recv`.
    pub fn push(&self, received: Received) {
        self.lock().inbox.push_back(received);
    }

    /// Make status queries fail, as an unplugged interface would.
    pub fn fail_status(&self, fail: bool) {
        self.lock().fail_status = fail;
    }
}

/// A simple in-process mock transceiver. Each instance is independent.
pub struct MockTransceiver {
    name: String,
    seqnbr: u8,
    handle: MockHandle,
}

impl MockTransceiver {
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    fn status(&mut self) -> Result<StatusEvent> {
        if self.handle.lock().fail_status {
            return Err(TransportError::Io(format!("{}: no status reply", self.name)));
        }
        self.seqnbr = self.seqnbr.wrapping_add(1);
        Ok(packet::status_event(
            self.seqnbr,
            InterfaceCommand::GetStatus.code(),
            0x53,
            0x5B,
            [0x00, 0x08, 0x27],
        ))
    }
}

impl Transceiver for MockTransceiver {
    fn open(path: &str, _options: &OpenOptions) -> Result<Self> {
        Ok(Self {
            name: path.to_string(),
            seqnbr: 0,
            handle: MockHandle::default(),
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn initialise(&mut self) -> Result<StatusEvent> {
        self.status()
    }

    fn request_status(&mut self) -> Result<StatusEvent> {
        self.status()
    }

    fn transmit(&mut self, tx: &Transmission) -> Result<()> {
        self.handle.lock().sent.push(tx.clone());
        Ok(())
    }

    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<Option<Received>> {
        if let Some(next) = self.handle.lock().inbox.pop_front() {
            return Ok(Some(next));
        }
        // Idle like a quiet radio would, but never for long
        if let Some(ms) = timeout_ms.filter(|ms| *ms > 0) {
            thread::sleep(Duration::from_millis(ms.min(50)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_transmissions() {
        let mut mock = MockTransceiver::open("mock0", &OpenOptions::default()).unwrap();
        let handle = mock.handle();
        let tx = Transmission::Chime1 {
            sub_type: 0,
            id: 0x10,
            sound: 1,
        };
        mock.transmit(&tx).unwrap();
        assert_eq!(handle.sent(), vec![tx]);
    }

    #[test]
    fn test_status_failure_is_an_error() {
        let mut mock = MockTransceiver::open("mock0", &OpenOptions::default()).unwrap();
        assert!(mock.initialise().is_ok());
        mock.handle().fail_status(true);
        assert!(mock.request_status().is_err());
    }
}
