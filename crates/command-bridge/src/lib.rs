//! command-bridge: MQTT <-> RFXtrx translation
//!
//! Inbound messages on `rfxcom2mqtt/command/<deviceType>/<entity>[/<unit>]` are
//! validated against the capability catalog, merged with the configured device
//! registry and turned into a [`ResolvedCommand`]. The executor turns that into a
//! transmission plan which the [`TransceiverLink`] worker sends the configured
//! number of times. Radio events travel the other way through the
//! [`EventPublisher`] onto `rfxcom2mqtt/devices/<name>`.

pub mod topics;

mod types;
pub use types::{CommandPayload, CommandTopic, ResolvedCommand, ResolvedPublish, Translation};

mod error;
pub use error::{FatalError, LinkError, Rejection};

mod catalog;
pub use catalog::CapabilityCatalog;

mod translate;
pub use translate::CommandTranslator;

mod publish;
pub use publish::{device_identifier, status_info, EventPublisher};

mod executor;
pub use executor::{CommandExecutor, CommandPlan};

mod schedule;
pub use schedule::{Due, RepeatQueue};

mod link;
pub use link::{LinkEvent, LinkSettings, TransceiverLink};

pub mod config;
pub use config::{BridgeConfig, RfxcomSettings};

mod metrics;
pub use metrics::BridgeMetrics;

mod bridge;
pub use bridge::{Bridge, Outbound};
