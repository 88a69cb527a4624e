use crate::{CommandPlan, LinkError, RepeatQueue};
use rfx_transport::{DeviceEvent, Received, StatusEvent, Transceiver, TransportError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Something the transceiver reported on its own.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    Device(DeviceEvent),
    Status(StatusEvent),
    /// The interface stopped answering. No further events follow.
    Disconnected(String),
}

#[derive(Clone, Debug)]
pub struct LinkSettings {
    /// Gap between consecutive transmissions.
    pub repeat_interval: Duration,
    /// Longest single blocking read while idle.
    pub poll_interval: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            repeat_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(250),
        }
    }
}

enum Request {
    Execute(CommandPlan),
    Status(oneshot::Sender<Result<StatusEvent, TransportError>>),
    Shutdown,
}

/// Owns the transceiver on a dedicated thread and serializes every access to it.
pub struct TransceiverLink {
    requests: UnboundedSender<Request>,
    worker: Option<JoinHandle<()>>,
}

impl TransceiverLink {
    pub fn spawn(
        transceiver: Box<dyn Transceiver>,
        settings: LinkSettings,
    ) -> Result<(Self, UnboundedReceiver<LinkEvent>), LinkError> {
        let (requests, inbox) = mpsc::unbounded_channel();
        let (events, outbox) = mpsc::unbounded_channel();
        let worker = thread::Builder::new()
            .name("rfx-link".into())
            .spawn(move || run_worker(transceiver, settings, inbox, events))
            .map_err(|e| LinkError::Spawn(e.to_string()))?;
        Ok((
            Self {
                requests,
                worker: Some(worker),
            },
            outbox,
        ))
    }

    /// Queue a plan. Returns once queued, not once sent.
    pub fn execute(&self, plan: CommandPlan) -> Result<(), LinkError> {
        self.requests
            .send(Request::Execute(plan))
            .map_err(|_| LinkError::Closed)
    }

    pub async fn status(&self) -> Result<StatusEvent, LinkError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Request::Status(reply))
            .map_err(|_| LinkError::Closed)?;
        answer
            .await
            .map_err(|_| LinkError::Closed)?
            .map_err(LinkError::from)
    }

    /// Finish queued transmissions, then stop the worker. Blocks until it exits.
    pub fn shutdown(mut self) -> Result<(), LinkError> {
        let _ = self.requests.send(Request::Shutdown);
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| LinkError::Closed),
            None => Ok(()),
        }
    }
}

impl Drop for TransceiverLink {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.requests.send(Request::Shutdown);
        }
    }
}

fn run_worker(
    mut transceiver: Box<dyn Transceiver>,
    settings: LinkSettings,
    mut inbox: UnboundedReceiver<Request>,
    events: UnboundedSender<LinkEvent>,
) {
    let mut queue = RepeatQueue::new(settings.repeat_interval);
    let mut stopping = false;
    debug!("link worker started");

    loop {
        while !stopping {
            match inbox.try_recv() {
                Ok(Request::Execute(plan)) => {
                    debug!(plan = %plan, "queued");
                    queue.push(plan);
                }
                Ok(Request::Status(reply)) => {
                    let _ = reply.send(transceiver.request_status());
                }
                Ok(Request::Shutdown) | Err(TryRecvError::Disconnected) => stopping = true,
                Err(TryRecvError::Empty) => break,
            }
        }

        while let Some(due) = queue.pop_due(Instant::now()) {
            match transceiver.transmit(&due.transmission) {
                Ok(()) => debug!(
                    command = %due.label,
                    attempt = due.attempt,
                    of = due.of,
                    "transmitted"
                ),
                Err(e) => warn!(command = %due.label, attempt = due.attempt, "transmit failed: {e}"),
            }
        }

        if stopping && queue.is_empty() {
            break;
        }

        let wait = queue
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(settings.poll_interval)
            .min(settings.poll_interval);
        let wait_ms = (wait.as_micros() as u64).div_ceil(1000);

        match transceiver.recv(Some(wait_ms)) {
            Ok(Some(Received::Device(event))) => {
                trace!(protocol = %event.protocol, "device event");
                let _ = events.send(LinkEvent::Device(event));
            }
            Ok(Some(Received::Status(status))) => {
                let _ = events.send(LinkEvent::Status(status));
            }
            Ok(Some(Received::Ack { seqnbr, ok })) => {
                if ok {
                    trace!(seqnbr, "transmitter ack");
                } else {
                    warn!(seqnbr, "transmitter rejected packet");
                }
            }
            Ok(None) | Err(TransportError::Timeout) => {}
            Err(e) => {
                error!("transceiver read failed: {e}");
                let _ = events.send(LinkEvent::Disconnected(e.to_string()));
                break;
            }
        }
    }

    drop(inbox);
    if !queue.is_empty() {
        warn!(pending = queue.pending(), "link closed with transmissions pending");
    }
    info!("link worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfx_transport::{
        MockTransceiver, OpenOptions, PortInfo, Transmission, Result as TransportResult,
    };
    use serde_json::json;

    fn fast() -> LinkSettings {
        LinkSettings {
            repeat_interval: Duration::from_millis(1),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn chime(repeat_count: u32) -> CommandPlan {
        CommandPlan {
            label: "Chime1[0x0001].chime".into(),
            transmission: Transmission::Chime1 {
                sub_type: 0,
                id: 1,
                sound: 1,
            },
            repeat_count,
        }
    }

    #[test]
    fn test_shutdown_finishes_repetitions() {
        let mock = MockTransceiver::open("mock0", &OpenOptions::default()).unwrap();
        let handle = mock.handle();
        let (link, _events) = TransceiverLink::spawn(Box::new(mock), fast()).unwrap();
        link.execute(chime(3)).unwrap();
        link.execute(chime(2)).unwrap();
        link.shutdown().unwrap();
        assert_eq!(handle.sent().len(), 5);
    }

    #[tokio::test]
    async fn test_status_and_events_flow() {
        let mock = MockTransceiver::open("mock0", &OpenOptions::default()).unwrap();
        let handle = mock.handle();
        let event = DeviceEvent {
            protocol: "lighting2".into(),
            fields: json!({ "id": "0x00F00D01" }).as_object().cloned().unwrap(),
            timestamp: None,
        };
        handle.push(Received::Device(event.clone()));
        let (link, mut events) = TransceiverLink::spawn(Box::new(mock), fast()).unwrap();

        assert_eq!(events.recv().await, Some(LinkEvent::Device(event)));
        let status = link.status().await.unwrap();
        assert!(status.receiver_type().is_some());

        handle.fail_status(true);
        assert!(matches!(
            link.status().await,
            Err(LinkError::Transport(TransportError::Io(_)))
        ));
        link.shutdown().unwrap();
    }

    struct Unplugged;

    impl Transceiver for Unplugged {
        fn open(_path: &str, _options: &OpenOptions) -> TransportResult<Self> {
            Ok(Self)
        }

        fn list() -> TransportResult<Vec<PortInfo>> {
            Ok(vec![])
        }

        fn initialise(&mut self) -> TransportResult<StatusEvent> {
            Err(TransportError::Io("unplugged".into()))
        }

        fn request_status(&mut self) -> TransportResult<StatusEvent> {
            Err(TransportError::Io("unplugged".into()))
        }

        fn transmit(&mut self, _tx: &Transmission) -> TransportResult<()> {
            Err(TransportError::Io("unplugged".into()))
        }

        fn recv(&mut self, _timeout_ms: Option<u64>) -> TransportResult<Option<Received>> {
            Err(TransportError::Io("unplugged".into()))
        }
    }

    #[tokio::test]
    async fn test_read_failure_reports_disconnect() {
        let (link, mut events) = TransceiverLink::spawn(Box::new(Unplugged), fast()).unwrap();
        assert!(matches!(
            events.recv().await,
            Some(LinkEvent::Disconnected(_))
        ));
        assert_eq!(events.recv().await, None);
        assert!(matches!(link.execute(chime(1)), Err(LinkError::Closed)));
        link.shutdown().unwrap();
    }
}
