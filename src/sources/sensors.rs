//! Chip temperature from lm-sensors `sensors` output.

use async_trait::async_trait;
use tracing::trace;

use crate::monitor::signal::{Signal, SignalError, SignalSource};
use crate::system::executor::{Executor, ToolCommand};
use crate::system::parser::{first_temperature, parse_sensor_chips, SensorChip};

pub struct SensorTemperatureSource {
    chip: String,
    sensors: ToolCommand,
    exec: Executor,
}

impl SensorTemperatureSource {
    pub fn new(chip: impl Into<String>, sensors: ToolCommand, exec: Executor) -> Self {
        Self {
            chip: chip.into(),
            sensors,
            exec,
        }
    }
}

#[async_trait]
impl SignalSource for SensorTemperatureSource {
    fn subject(&self) -> &str {
        &self.chip
    }

    async fn read(&self) -> Result<Signal, SignalError> {
        let chips = list_chips(&self.exec, &self.sensors).await?;
        let chip = chips.iter().find(|c| c.name == self.chip).ok_or_else(|| {
            SignalError::Unparseable(format!("sensor '{}' not present in output", self.chip))
        })?;

        let temperature = first_temperature(chip).ok_or_else(|| {
            SignalError::Unparseable(format!("no temperature reading for '{}'", self.chip))
        })?;
        trace!("Current temperature of {}: {}°C", self.chip, temperature);
        Ok(Signal::Numeric(temperature))
    }
}

/// All chips currently reported by `sensors`.
pub async fn list_chips(
    exec: &Executor,
    sensors: &ToolCommand,
) -> Result<Vec<SensorChip>, SignalError> {
    let stdout = exec.run_tool_checked(sensors, &[]).await?;
    Ok(parse_sensor_chips(&stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FAKE_SENSORS: &str = "cat <<'OUT'
coretemp-isa-0000
Adapter: ISA adapter
Package id 0:  +81.5°C  (high = +80.0°C)

nvme-pci-0100
Composite:    +38.9°C
OUT";

    fn exec() -> Executor {
        Executor::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn reads_the_configured_chip() {
        let sensors = ToolCommand::shell(FAKE_SENSORS);
        let source = SensorTemperatureSource::new("coretemp-isa-0000", sensors, exec());
        assert_eq!(source.read().await.unwrap(), Signal::Numeric(81.5));
    }

    #[tokio::test]
    async fn missing_chip_is_a_read_failure() {
        let sensors = ToolCommand::shell(FAKE_SENSORS);
        let source = SensorTemperatureSource::new("k10temp-pci-00c3", sensors, exec());
        assert!(matches!(source.read().await, Err(SignalError::Unparseable(_))));
    }

    #[tokio::test]
    async fn lists_every_chip() {
        let chips = list_chips(&exec(), &ToolCommand::shell(FAKE_SENSORS)).await.unwrap();
        assert_eq!(chips.len(), 2);
        assert_eq!(chips[1].name, "nvme-pci-0100");
    }
}
