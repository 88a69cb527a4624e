use crate::{
    CapabilityCatalog, CommandPayload, CommandTopic, FatalError, Rejection, ResolvedCommand,
    Translation,
};
use device_registry::DeviceRegistry;
use std::sync::Arc;
use tracing::warn;

/// Turns one inbound bus message into at most one [`ResolvedCommand`].
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    catalog: Arc<CapabilityCatalog>,
    registry: Arc<DeviceRegistry>,
    default_repeat: u32,
}

impl CommandTranslator {
    pub fn new(
        catalog: Arc<CapabilityCatalog>,
        registry: Arc<DeviceRegistry>,
        default_repeat: u32,
    ) -> Self {
        Self {
            catalog,
            registry,
            default_repeat: default_repeat.max(1),
        }
    }

    /// Malformed input comes back as `Translation::Rejected` and has already been
    /// logged. An `Err` means the command can never be built as configured.
    pub fn translate(&self, topic: &str, payload: &[u8]) -> Result<Translation, FatalError> {
        match self.resolve(topic, payload)? {
            Ok(cmd) => Ok(Translation::Command(cmd)),
            Err(reason) => {
                warn!(topic = %topic, "rejected command: {reason}");
                Ok(Translation::Rejected(reason))
            }
        }
    }

    fn resolve(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<Result<ResolvedCommand, Rejection>, FatalError> {
        let parsed = match CommandTopic::parse(topic) {
            Ok(t) => t,
            Err(r) => return Ok(Err(r)),
        };
        if !self.catalog.is_known_device_type(&parsed.device_type) {
            return Ok(Err(Rejection::UnknownDeviceType(parsed.device_type)));
        }

        let body = match CommandPayload::parse(payload) {
            Ok(b) => b,
            Err(r) => return Ok(Err(r)),
        };
        let Some(function) = body.device_function else {
            return Ok(Err(Rejection::MissingFunction));
        };
        if !self.catalog.has_function(&parsed.device_type, &function) {
            return Ok(Err(Rejection::UnknownFunction {
                device_type: parsed.device_type,
                function,
            }));
        }

        let mut entity_name = parsed.entity_name;
        let mut device_type = parsed.device_type;
        let mut sub_type = body.sub_type;
        let mut device_options = body.device_options;
        let mut repeat_count = self.default_repeat;

        if let Some(entry) = self.registry.find_by_friendly_name(&entity_name) {
            if let Some(configured) = &entry.device_type {
                if !self.catalog.is_known_device_type(configured) {
                    return Err(FatalError::UnknownConfiguredType {
                        entity: entity_name,
                        device_type: configured.clone(),
                    });
                }
                device_type = configured.clone();
            }
            if entry.options.is_some() {
                device_options = entry.options.clone();
            }
            if entry.sub_type.is_some() {
                sub_type = entry.sub_type.clone();
            }
            if let Some(repetitions) = entry.repetitions {
                repeat_count = repetitions.max(1);
            }
            entity_name = entry.id.clone();
        }

        // The configured type may not offer what the topic's type did
        if !self.catalog.has_function(&device_type, &function) {
            return Ok(Err(Rejection::UnknownFunction {
                device_type,
                function,
            }));
        }

        let Some(sub_type) = sub_type.filter(|s| !s.is_null()) else {
            return Err(FatalError::MissingSubType {
                entity: entity_name,
            });
        };

        Ok(Ok(ResolvedCommand {
            device_type,
            entity_name,
            sub_type,
            device_function: function,
            value: body.value,
            device_options,
            repeat_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_registry::DeviceConfigEntry;
    use serde_json::json;

    fn kitchen() -> DeviceConfigEntry {
        let mut e = DeviceConfigEntry::new("A1");
        e.friendly_name = Some("Kitchen Light".into());
        e.device_type = Some("Lighting2".into());
        e
    }

    fn translator(entries: Vec<DeviceConfigEntry>) -> CommandTranslator {
        CommandTranslator::new(
            Arc::new(CapabilityCatalog::rfxcom()),
            Arc::new(DeviceRegistry::new(entries).unwrap()),
            1,
        )
    }

    fn command(t: Translation) -> ResolvedCommand {
        match t {
            Translation::Command(c) => c,
            Translation::Rejected(r) => panic!("unexpected rejection: {r}"),
        }
    }

    #[test]
    fn test_friendly_name_resolves_to_id() {
        let tr = translator(vec![kitchen()]);
        let cmd = command(
            tr.translate(
                "rfxcom2mqtt/command/Lighting2/Kitchen Light",
                br#"{"subType":0,"deviceFunction":"switchOn"}"#,
            )
            .unwrap(),
        );
        assert_eq!(cmd.entity_name, "A1");
        assert_eq!(cmd.device_type, "Lighting2");
        assert_eq!(cmd.repeat_count, 1);
        assert_eq!(cmd.sub_type, json!(0));
        assert_eq!(cmd.value, None);
    }

    #[test]
    fn test_registry_repetitions_override_default() {
        let mut entry = kitchen();
        entry.repetitions = Some(3);
        let tr = CommandTranslator::new(
            Arc::new(CapabilityCatalog::rfxcom()),
            Arc::new(DeviceRegistry::new(vec![entry]).unwrap()),
            2,
        );
        let cmd = command(
            tr.translate(
                "rfxcom2mqtt/command/Lighting2/Kitchen Light",
                br#"{"subType":0,"deviceFunction":"switchOn"}"#,
            )
            .unwrap(),
        );
        assert_eq!(cmd.repeat_count, 3);
    }

    #[test]
    fn test_default_repeat_without_registry_entry() {
        let tr = CommandTranslator::new(
            Arc::new(CapabilityCatalog::rfxcom()),
            Arc::new(DeviceRegistry::default()),
            2,
        );
        let cmd = command(
            tr.translate(
                "rfxcom2mqtt/command/Lighting2/0x0101ABCD/1",
                br#"{"subType":"AC","deviceFunction":"setLevel","value":7}"#,
            )
            .unwrap(),
        );
        assert_eq!(cmd.entity_name, "0x0101ABCD/1");
        assert_eq!(cmd.repeat_count, 2);
        assert_eq!(cmd.value, Some(json!(7)));
    }

    #[test]
    fn test_unknown_device_type_rejected_for_any_payload() {
        let tr = translator(vec![]);
        for payload in [
            &br#"{"subType":0,"deviceFunction":"switchOn"}"#[..],
            b"garbage",
            b"",
        ] {
            assert_eq!(
                tr.translate("rfxcom2mqtt/command/Toaster/x", payload).unwrap(),
                Translation::Rejected(Rejection::UnknownDeviceType("Toaster".into()))
            );
        }
    }

    #[test]
    fn test_unknown_function_rejected() {
        let tr = translator(vec![]);
        assert!(matches!(
            tr.translate(
                "rfxcom2mqtt/command/Lighting4/0x123456",
                br#"{"subType":0,"deviceFunction":"switchOn"}"#,
            )
            .unwrap(),
            Translation::Rejected(Rejection::UnknownFunction { .. })
        ));
        assert_eq!(
            tr.translate("rfxcom2mqtt/command/Lighting4/0x123456", br#"{"subType":0}"#)
                .unwrap(),
            Translation::Rejected(Rejection::MissingFunction)
        );
    }

    #[test]
    fn test_configured_type_must_offer_function() {
        let mut entry = DeviceConfigEntry::new("0x1234");
        entry.friendly_name = Some("Doorbell".into());
        entry.device_type = Some("Chime1".into());
        let tr = translator(vec![entry]);
        assert!(matches!(
            tr.translate(
                "rfxcom2mqtt/command/Lighting2/Doorbell",
                br#"{"subType":0,"deviceFunction":"switchOn"}"#,
            )
            .unwrap(),
            Translation::Rejected(Rejection::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_missing_subtype_is_fatal() {
        let tr = translator(vec![kitchen()]);
        assert_eq!(
            tr.translate(
                "rfxcom2mqtt/command/Lighting2/Kitchen Light",
                br#"{"deviceFunction":"switchOn"}"#,
            ),
            Err(FatalError::MissingSubType {
                entity: "A1".into()
            })
        );
    }

    #[test]
    fn test_registry_supplies_subtype_and_options() {
        let mut entry = kitchen();
        entry.sub_type = Some(json!("HOMEEASY_EU"));
        entry.options = Some(json!({ "note": "porch" }));
        let tr = translator(vec![entry]);
        let cmd = command(
            tr.translate(
                "rfxcom2mqtt/command/Lighting2/Kitchen Light",
                br#"{"subType":0,"deviceFunction":"switchOff","deviceOptions":{"x":1}}"#,
            )
            .unwrap(),
        );
        assert_eq!(cmd.sub_type, json!("HOMEEASY_EU"));
        assert_eq!(cmd.device_options, Some(json!({ "note": "porch" })));
    }

    #[test]
    fn test_unknown_configured_type_is_fatal() {
        let mut entry = kitchen();
        entry.device_type = Some("Lighting9".into());
        let tr = translator(vec![entry]);
        assert!(matches!(
            tr.translate(
                "rfxcom2mqtt/command/Lighting2/Kitchen Light",
                br#"{"subType":0,"deviceFunction":"switchOn"}"#,
            ),
            Err(FatalError::UnknownConfiguredType { .. })
        ));
    }

    #[test]
    fn test_translation_is_repeatable() {
        let tr = translator(vec![kitchen()]);
        let topic = "rfxcom2mqtt/command/Lighting2/Kitchen Light";
        let payload = br#"{"subType":0,"deviceFunction":"setLevel","value":3}"#;
        let first = tr.translate(topic, payload).unwrap();
        let second = tr.translate(topic, payload).unwrap();
        assert_eq!(first, second);
    }
}
