//! Interactive setup wizard for the temperature sensor monitor.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::persistence::{config_path, load_config, save_config};
use crate::config::types::{ConfigKind, SensorConfig};
use crate::sources::sensors::list_chips;
use crate::system::executor::{Executor, ToolCommand};
use crate::system::parser::{first_temperature, SensorChip};

#[derive(Debug, Clone, PartialEq)]
pub struct SensorChoice {
    pub sensor: String,
    pub threshold_temp: f64,
    pub optional_command: Option<String>,
}

pub async fn run_sensor_setup(config_dir: &Path, exec: &Executor) -> Result<()> {
    println!("\n╔══════════════════════════════════════════╗");
    println!("║   Tipi Tricks Temperature Sensor Setup   ║");
    println!("╚══════════════════════════════════════════╝");
    println!(
        "Build: \x1b[32mtipi-tricks v{} ({})\x1b[0m\n",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    );

    let file = config_path(config_dir, ConfigKind::TempSensor);
    // Keep the shared settings of an existing file; a malformed one starts over.
    let existing: SensorConfig = load_config(config_dir).await.unwrap_or_default();
    if file.exists() {
        println!("⚠️  Config file already exists: {:?}", file);
        if !confirm(&mut io::stdin().lock(), &mut io::stdout(), "Overwrite? (y/N): ")? {
            println!("Config unchanged.");
            return Ok(());
        }
    }

    let chips = list_chips(exec, &ToolCommand::new("sensors"))
        .await
        .context("Failed to read sensors")?;
    if chips.is_empty() {
        bail!("`sensors` reported no chips; is lm-sensors configured (sensors-detect)?");
    }

    let choice = choose_sensor(&chips, &mut io::stdin().lock(), &mut io::stdout())?;

    let config = SensorConfig {
        sensor: Some(choice.sensor.clone()),
        threshold_temp: Some(choice.threshold_temp),
        optional_command: choice.optional_command.clone(),
        ..existing
    };
    let path = save_config(&config, config_dir).await?;

    println!("\n✅ Monitoring {} above {}°C", choice.sensor, choice.threshold_temp);
    if let Some(cmd) = &choice.optional_command {
        println!("   Alert command: {}", cmd);
    }
    println!("   Saved to {:?}", path);
    println!("\nStart monitoring with: tipi-tricks monitor temp-sensor");
    Ok(())
}

/// Lists the chips with their current reading and prompts for a chip,
/// a threshold and an optional command.
pub fn choose_sensor<R: BufRead, W: Write>(
    chips: &[SensorChip],
    input: &mut R,
    output: &mut W,
) -> Result<SensorChoice> {
    writeln!(output, "Available sensors:\n")?;
    for (i, chip) in chips.iter().enumerate() {
        match first_temperature(chip) {
            Some(t) => writeln!(output, "  {}. {} ({:.1}°C)", i + 1, chip.name, t)?,
            None => writeln!(output, "  {}. {} (no temperature reading)", i + 1, chip.name)?,
        }
    }
    writeln!(output)?;

    let index = loop {
        let answer = prompt(input, output, "Enter the number of the sensor you want to monitor: ")?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=chips.len()).contains(&n) => break n - 1,
            _ => writeln!(output, "   ⚠ Enter a number between 1 and {}", chips.len())?,
        }
    };

    let threshold_temp = loop {
        let answer = prompt(input, output, "Enter the threshold temperature (°C): ")?;
        match answer.parse::<f64>() {
            Ok(t) if t.is_finite() => break t,
            _ => writeln!(output, "   ⚠ Enter a temperature such as 80 or 72.5")?,
        }
    };

    let command = prompt(
        input,
        output,
        "Enter an optional command to run if the threshold is reached (leave blank for none): ",
    )?;

    Ok(SensorChoice {
        sensor: chips[index].name.clone(),
        threshold_temp,
        optional_command: (!command.is_empty()).then_some(command),
    })
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("Setup aborted: no more input");
    }
    Ok(line.trim().to_string())
}

fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    Ok(prompt(input, output, question)?.eq_ignore_ascii_case("y"))
}
