//! Text parsers for smartctl, sensors, lsblk and fstab output.

use crate::monitor::signal::HealthStatus;

/// Classify `smartctl -H` output.
pub fn parse_smart_health(output: &str) -> HealthStatus {
    if output.contains("FAILED") {
        HealthStatus::Failed
    } else if output.contains("PASSED") {
        HealthStatus::Passed
    } else {
        HealthStatus::Unknown
    }
}

/// Whole-disk device paths from `lsblk -dn -o NAME`.
pub fn parse_lsblk_drives(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| format!("/dev/{}", name))
        .collect()
}

/// Mount points from fstab text, skipping comments, blanks and swap.
pub fn parse_fstab_mount_points(fstab: &str) -> Vec<String> {
    fstab
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#') && !line.contains("swap")
        })
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

/// One chip block from `sensors` output.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorChip {
    pub name: String,
    pub lines: Vec<String>,
}

/// Split `sensors` output into blank-line separated chip blocks.
/// The first line of a block names the chip.
pub fn parse_sensor_chips(output: &str) -> Vec<SensorChip> {
    let mut chips = Vec::new();
    let mut current: Option<SensorChip> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if let Some(chip) = current.take() {
                chips.push(chip);
            }
            continue;
        }
        match current.as_mut() {
            Some(chip) => chip.lines.push(trimmed.to_string()),
            None => {
                current = Some(SensorChip {
                    name: trimmed.to_string(),
                    lines: Vec::new(),
                })
            }
        }
    }

    if let Some(chip) = current {
        chips.push(chip);
    }
    chips
}

/// First `+NN.N°C` reading in a chip block.
pub fn first_temperature(chip: &SensorChip) -> Option<f64> {
    chip.lines.iter().find_map(|line| parse_positive_celsius(line))
}

fn parse_positive_celsius(line: &str) -> Option<f64> {
    let mut rest = line;
    while let Some(pos) = rest.find('+') {
        let after = &rest[pos + 1..];
        let digits: String = after
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let tail = &after[digits.len()..];
        if !digits.is_empty() && tail.starts_with("°C") {
            if let Ok(value) = digits.parse::<f64>() {
                return Some(value);
            }
        }
        rest = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSORS_OUTPUT: &str = "\
coretemp-isa-0000
Adapter: ISA adapter
Package id 0:  +45.0°C  (high = +80.0°C, crit = +100.0°C)
Core 0:        +43.0°C  (high = +80.0°C, crit = +100.0°C)

nvme-pci-0100
Adapter: PCI adapter
Composite:    +38.9°C  (low  = -273.1°C, high = +84.8°C)

acpitz-acpi-0
Adapter: ACPI interface
temp1:        +27.8°C
";

    #[test]
    fn splits_sensor_output_into_chips() {
        let chips = parse_sensor_chips(SENSORS_OUTPUT);
        let names: Vec<&str> = chips.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["coretemp-isa-0000", "nvme-pci-0100", "acpitz-acpi-0"]);
        assert_eq!(chips[0].lines.len(), 3);
    }

    #[test]
    fn reads_first_temperature_of_a_chip() {
        let chips = parse_sensor_chips(SENSORS_OUTPUT);
        assert_eq!(first_temperature(&chips[0]), Some(45.0));
        assert_eq!(first_temperature(&chips[1]), Some(38.9));
        assert_eq!(first_temperature(&chips[2]), Some(27.8));
    }

    #[test]
    fn chip_without_temperature_has_no_reading() {
        let chip = SensorChip {
            name: "fan-chip".to_string(),
            lines: vec!["fan1: 1200 RPM".to_string(), "in0: +1.20 V".to_string()],
        };
        assert_eq!(first_temperature(&chip), None);
    }

    #[test]
    fn smart_health_categories() {
        let passed = "SMART overall-health self-assessment test result: PASSED\n";
        let failed = "SMART overall-health self-assessment test result: FAILED!\n";
        let odd = "SMART support is: Unavailable - device lacks SMART capability.\n";
        assert_eq!(parse_smart_health(passed), HealthStatus::Passed);
        assert_eq!(parse_smart_health(failed), HealthStatus::Failed);
        assert_eq!(parse_smart_health(odd), HealthStatus::Unknown);
    }

    #[test]
    fn lsblk_names_become_device_paths() {
        assert_eq!(parse_lsblk_drives("sda\nnvme0n1\n\n"), ["/dev/sda", "/dev/nvme0n1"]);
        assert!(parse_lsblk_drives("").is_empty());
    }

    #[test]
    fn fstab_skips_comments_blanks_and_swap() {
        let fstab = "\
# /etc/fstab
UUID=abcd / ext4 defaults 0 1
/swapfile none swap sw 0 0

//nas/media /mnt/media cifs credentials=/root/.smb 0 0
";
        assert_eq!(parse_fstab_mount_points(fstab), ["/", "/mnt/media"]);
    }
}
