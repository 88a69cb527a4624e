use anyhow::{anyhow, Result};
use command_bridge::{topics, Bridge, BridgeConfig, LinkEvent, Outbound};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

const HEALTH_INTERVAL: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn options(config: &BridgeConfig) -> MqttOptions {
    let mqtt = &config.mqtt;
    let client_id = mqtt
        .client_id
        .clone()
        .unwrap_or_else(|| format!("rfxcom2mqtt-{}", uuid::Uuid::new_v4()));
    let mut opts = MqttOptions::new(client_id, mqtt.host(), mqtt.port);
    opts.set_keep_alive(Duration::from_secs(60));
    opts.set_last_will(LastWill::new(
        topics::STATUS,
        topics::OFFLINE,
        qos(mqtt.qos),
        true,
    ));
    if let Some(username) = &mqtt.username {
        opts.set_credentials(username, mqtt.password.as_deref().unwrap_or_default());
    }
    opts
}

/// Publishes without waiting on the event loop. Failures are logged, never retried.
struct Publisher {
    client: AsyncClient,
    qos: QoS,
}

impl Publisher {
    fn send(&self, out: &Outbound) {
        debug!(topic = %out.topic, payload = %compact(&out.payload), "MQTT out");
        if let Err(e) = self
            .client
            .try_publish(&out.topic, self.qos, out.retain, out.payload.clone())
        {
            error!(topic = %out.topic, "publish failed: {e}");
        }
    }
}

fn compact(payload: &str) -> String {
    payload.lines().map(str::trim_start).collect()
}

fn status_message(payload: &str) -> Outbound {
    Outbound {
        topic: topics::STATUS.to_string(),
        payload: payload.to_string(),
        retain: true,
    }
}

/// What goes out after every (re)connect: `online`, then the latest info.
fn on_connect(last_info: Option<&Outbound>) -> Vec<Outbound> {
    let mut out = vec![status_message(topics::ONLINE)];
    out.extend(last_info.cloned());
    out
}

fn on_command(bridge: &Bridge, topic: &str, payload: &[u8]) -> Result<()> {
    bridge.handle_command(topic, payload).map_err(|e| {
        error!(topic = %topic, "{e}");
        anyhow!(e)
    })
}

/// Ask the transceiver for its status. No reply within `timeout` is an error.
async fn health_check(bridge: &Bridge, timeout: Duration) -> Result<Option<Outbound>> {
    debug!("Healthcheck");
    debug!("metrics:\n{}", bridge.metrics().encode_text());
    match time::timeout(timeout, bridge.link().status()).await {
        Ok(Ok(status)) => Ok(bridge.status_outbound(&status)),
        Ok(Err(e)) => {
            error!("Healthcheck: RFX Status ERROR: {e}");
            Err(anyhow!("health check failed: {e}"))
        }
        Err(_) => {
            error!("Healthcheck: RFX Status ERROR: no reply");
            Err(anyhow!("health check timed out"))
        }
    }
}

/// Pause in broker polling after a connection error.
struct Reconnect {
    delay: Duration,
    at: Option<Instant>,
}

impl Reconnect {
    fn new(delay: Duration) -> Self {
        Self { delay, at: None }
    }

    fn failed(&mut self) {
        self.at = Some(Instant::now() + self.delay);
    }

    fn waiting(&self) -> bool {
        self.at.is_some()
    }

    fn deadline(&self) -> Instant {
        self.at.unwrap_or_else(Instant::now)
    }

    fn resume(&mut self) {
        self.at = None;
    }
}

/// Drive the broker connection until Ctrl-C or a fatal error.
pub async fn run(
    config: &BridgeConfig,
    bridge: &Bridge,
    mut events: UnboundedReceiver<LinkEvent>,
    initial_info: Option<Outbound>,
) -> Result<()> {
    let (client, mut eventloop) = AsyncClient::new(options(config), 64);
    let out = Publisher {
        client,
        qos: qos(config.mqtt.qos),
    };
    let mut last_info = initial_info;
    let mut link_open = true;
    let mut health = time::interval_at(Instant::now() + HEALTH_INTERVAL, HEALTH_INTERVAL);
    let mut reconnect = Reconnect::new(RECONNECT_DELAY);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome: Result<()> = loop {
        tokio::select! {
            notification = eventloop.poll(), if !reconnect.waiting() => match notification {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(server = %config.mqtt.host(), "Connected to MQTT");
                    if let Err(e) = out.client.try_subscribe(topics::COMMAND_SUBSCRIPTION, out.qos) {
                        error!("subscribe failed: {e}");
                    } else {
                        info!("Subscribing to topic '{}'", topics::COMMAND_SUBSCRIPTION);
                    }
                    for msg in on_connect(last_info.as_ref()) {
                        out.send(&msg);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    if let Err(e) = on_command(bridge, &p.topic, &p.payload) {
                        break Err(e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {e}");
                    reconnect.failed();
                }
            },
            _ = time::sleep_until(reconnect.deadline()), if reconnect.waiting() => reconnect.resume(),
            event = events.recv(), if link_open => match event {
                Some(event) => {
                    if let Some(msg) = bridge.handle_link_event(event) {
                        if msg.topic == topics::INFO {
                            last_info = Some(msg.clone());
                        }
                        out.send(&msg);
                    }
                }
                None => {
                    warn!("transceiver link closed; no further device events");
                    link_open = false;
                }
            },
            _ = health.tick(), if config.healthcheck.enabled => {
                match health_check(bridge, HEALTH_TIMEOUT).await {
                    Ok(Some(msg)) => {
                        last_info = Some(msg.clone());
                        out.send(&msg);
                    }
                    Ok(None) => {}
                    Err(e) => break Err(e),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown requested");
                break Ok(());
            }
        }
    };

    out.send(&status_message(topics::OFFLINE));
    if let Err(e) = out.client.try_disconnect() {
        warn!("disconnect failed: {e}");
    }
    drain(&mut eventloop).await;
    outcome
}

/// Flush queued publishes until the disconnect goes out or time runs out.
async fn drain(eventloop: &mut EventLoop) {
    let flushed = time::timeout(DRAIN_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        warn!("broker did not take the final messages in time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_bridge::{BridgeMetrics, CapabilityCatalog, LinkSettings, TransceiverLink};
    use rfx_transport::{
        MockHandle, MockTransceiver, OpenOptions, PortInfo, Received, Result as TransportResult,
        StatusEvent, Transceiver, TransportError, Transmission,
    };
    use std::sync::Arc;

    #[test]
    fn test_compact_strips_indentation() {
        assert_eq!(compact("{\n  \"a\": 1,\n  \"b\": 2\n}"), "{\"a\": 1,\"b\": 2}");
    }

    #[test]
    fn test_qos_levels() {
        assert_eq!(qos(0), QoS::AtMostOnce);
        assert_eq!(qos(1), QoS::AtLeastOnce);
        assert_eq!(qos(2), QoS::ExactlyOnce);
    }

    #[test]
    fn test_options_from_config() {
        let config = BridgeConfig::from_yaml_str(
            "mqtt:\n  server: tcp://broker\n  port: 1884\n  client_id: bridge\nrfxcom:\n  usbport: p\n",
        )
        .unwrap();
        let opts = options(&config);
        assert_eq!(opts.broker_address(), ("broker".to_string(), 1884));
        assert_eq!(opts.client_id(), "bridge");
        assert_eq!(opts.last_will().map(|w| w.retain), Some(true));
    }

    const CONFIG: &str = r#"
mqtt:
  server: localhost
  retain: true
rfxcom:
  usbport: mock0
  transmit: { repeat: 1, interval_ms: 1 }
devices:
  - id: "0x0101ABCD/1"
    friendlyName: Kitchen Light
    type: Lighting2
"#;

    fn bridge_with(transceiver: Box<dyn Transceiver>) -> Bridge {
        let config = BridgeConfig::from_yaml_str(CONFIG).unwrap();
        let (link, _events) = TransceiverLink::spawn(
            transceiver,
            LinkSettings {
                repeat_interval: Duration::from_millis(1),
                poll_interval: Duration::from_millis(5),
            },
        )
        .unwrap();
        Bridge::new(
            &config,
            Arc::new(CapabilityCatalog::rfxcom()),
            Arc::new(config.registry().unwrap()),
            link,
            BridgeMetrics::new().unwrap(),
        )
    }

    fn mock_bridge() -> (Bridge, MockHandle) {
        let mock = MockTransceiver::open("mock0", &OpenOptions::default()).unwrap();
        let handle = mock.handle();
        (bridge_with(Box::new(mock)), handle)
    }

    /// Answers status requests long after anyone stopped waiting.
    struct Stalled;

    impl Transceiver for Stalled {
        fn open(_path: &str, _options: &OpenOptions) -> TransportResult<Self> {
            Ok(Self)
        }

        fn list() -> TransportResult<Vec<PortInfo>> {
            Ok(vec![])
        }

        fn initialise(&mut self) -> TransportResult<StatusEvent> {
            self.request_status()
        }

        fn request_status(&mut self) -> TransportResult<StatusEvent> {
            std::thread::sleep(Duration::from_millis(300));
            Err(TransportError::Timeout)
        }

        fn transmit(&mut self, _tx: &Transmission) -> TransportResult<()> {
            Ok(())
        }

        fn recv(&mut self, timeout_ms: Option<u64>) -> TransportResult<Option<Received>> {
            std::thread::sleep(Duration::from_millis(timeout_ms.unwrap_or(5)));
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_health_check_publishes_info() {
        let (bridge, _handle) = mock_bridge();
        let msg = health_check(&bridge, Duration::from_secs(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.topic, topics::INFO);
        assert!(msg.retain);
        assert!(!msg.payload.contains("seqnbr"));
        assert!(!msg.payload.contains("subtype"));
    }

    #[tokio::test]
    async fn test_health_check_status_error_is_fatal() {
        let (bridge, handle) = mock_bridge();
        handle.fail_status(true);
        let err = health_check(&bridge, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("health check failed"));
    }

    #[tokio::test]
    async fn test_health_check_without_reply_is_fatal() {
        let bridge = bridge_with(Box::new(Stalled));
        let err = health_check(&bridge, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_missing_subtype_ends_the_loop() {
        let (bridge, handle) = mock_bridge();
        let err = on_command(
            &bridge,
            "rfxcom2mqtt/command/Lighting2/0x0101ABCD/1",
            br#"{"deviceFunction":"switchOn"}"#,
        )
        .unwrap_err();
        assert!(!err.to_string().is_empty());
        assert!(handle.sent().is_empty());
    }

    #[test]
    fn test_rejected_command_keeps_the_loop_running() {
        let (bridge, _handle) = mock_bridge();
        on_command(&bridge, "rfxcom2mqtt/command/Nope/x", b"{}").unwrap();
        assert_eq!(bridge.metrics().commands_rejected.get(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_wait_leaves_other_work_running() {
        let mut reconnect = Reconnect::new(Duration::from_millis(50));
        assert!(!reconnect.waiting());
        reconnect.failed();
        assert!(reconnect.waiting());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send("event").unwrap();
        let first = tokio::select! {
            _ = time::sleep_until(reconnect.deadline()), if reconnect.waiting() => None,
            msg = rx.recv() => msg,
        };
        assert_eq!(first, Some("event"));

        let started = Instant::now();
        let resumed = tokio::select! {
            _ = time::sleep_until(reconnect.deadline()), if reconnect.waiting() => {
                reconnect.resume();
                true
            }
            _ = rx.recv() => false,
        };
        assert!(resumed);
        assert!(!reconnect.waiting());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_connect_announces_online_then_info() {
        assert_eq!(on_connect(None), vec![status_message(topics::ONLINE)]);

        let info = Outbound {
            topic: topics::INFO.to_string(),
            payload: "{}".to_string(),
            retain: false,
        };
        let sent = on_connect(Some(&info));
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].topic, topics::STATUS);
        assert_eq!(sent[0].payload, topics::ONLINE);
        assert!(sent[0].retain);
        assert_eq!(sent[1], info);
    }
}
