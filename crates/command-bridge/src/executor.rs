use crate::{CapabilityCatalog, ResolvedCommand};
use rfx_transport::{Transmission, TransportError};
use std::fmt;
use std::sync::Arc;

/// A transmission and how many times to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub label: String,
    pub transmission: Transmission,
    pub repeat_count: u32,
}

impl fmt::Display for CommandPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.label, self.repeat_count)
    }
}

/// Instantiates the device a command names and invokes its function.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    catalog: Arc<CapabilityCatalog>,
}

impl CommandExecutor {
    pub fn new(catalog: Arc<CapabilityCatalog>) -> Self {
        Self { catalog }
    }

    pub fn plan(&self, cmd: &ResolvedCommand) -> Result<CommandPlan, TransportError> {
        let class = self
            .catalog
            .class(&cmd.device_type)
            .ok_or_else(|| TransportError::UnknownDeviceType(cmd.device_type.clone()))?;
        let device = class.construct(&cmd.sub_type, cmd.device_options.clone())?;
        let transmission =
            device.invoke(&cmd.device_function, &cmd.entity_name, cmd.value.as_ref())?;
        Ok(CommandPlan {
            label: format!(
                "{}[{}].{}",
                cmd.device_type, cmd.entity_name, cmd.device_function
            ),
            transmission,
            repeat_count: cmd.repeat_count.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfx_transport::Lighting2Command;
    use serde_json::json;

    fn resolved(function: &str, value: Option<serde_json::Value>) -> ResolvedCommand {
        ResolvedCommand {
            device_type: "Lighting2".into(),
            entity_name: "0x0101ABCD/2".into(),
            sub_type: json!(0),
            device_function: function.into(),
            value,
            device_options: None,
            repeat_count: 3,
        }
    }

    #[test]
    fn test_plan_builds_transmission() {
        let exec = CommandExecutor::new(Arc::new(CapabilityCatalog::rfxcom()));
        let plan = exec.plan(&resolved("setLevel", Some(json!(12)))).unwrap();
        assert_eq!(plan.repeat_count, 3);
        assert_eq!(
            plan.transmission,
            Transmission::Lighting2 {
                sub_type: 0,
                id: 0x0101_ABCD,
                unit_code: 2,
                command: Lighting2Command::SetLevel,
                level: 12,
            }
        );
        assert_eq!(plan.label, "Lighting2[0x0101ABCD/2].setLevel");
    }

    #[test]
    fn test_plan_reports_unbuildable_commands() {
        let exec = CommandExecutor::new(Arc::new(CapabilityCatalog::rfxcom()));
        let mut cmd = resolved("switchOn", None);
        cmd.entity_name = "Kitchen".into();
        assert!(matches!(
            exec.plan(&cmd),
            Err(TransportError::InvalidDeviceId { .. })
        ));
        cmd.sub_type = json!(42);
        assert!(matches!(
            exec.plan(&cmd),
            Err(TransportError::InvalidSubType { .. })
        ));
    }
}
