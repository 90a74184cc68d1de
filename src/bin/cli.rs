//! VoltWay CLI
//!
//! Command-line client for the VoltWay API:
//! - Send a telemetry update as the device would
//! - Inspect the current station state and server health
//! - Simulate a full charging session
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use voltway::api::dto::{ApiResponse, ErrorResponse};
use voltway::config::generate_default_config;
use voltway::station::{DeviceState, StationStatus, StationUpdate};

#[derive(Parser)]
#[command(name = "voltway-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the VoltWay charging station hub")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:3000", global = true)]
    pub api_url: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Post a telemetry update
    Send {
        /// Station identifier
        #[arg(long, default_value = "ESP32_001")]
        id: String,
        /// Station status (available, charging, maintenance, offline)
        #[arg(long)]
        status: StationStatus,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Battery level (0-100)
        #[arg(long)]
        battery: Option<f64>,
        /// Charging power (kW)
        #[arg(long)]
        power: Option<f64>,
        /// Charging current (A)
        #[arg(long)]
        current: Option<f64>,
        /// Voltage (V)
        #[arg(long)]
        voltage: Option<f64>,
        /// Temperature (°C)
        #[arg(long, allow_hyphen_values = true)]
        temperature: Option<f64>,
        /// Charging time (minutes)
        #[arg(long)]
        time: Option<u32>,
    },

    /// Show the current station state
    State,

    /// Show server health
    Status,

    /// Simulate a charging session, one update per step
    Simulate {
        /// Station identifier
        #[arg(long, default_value = "ESP32_001")]
        id: String,
        /// Delay between updates in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
        /// Maximum number of updates to send
        #[arg(long, default_value = "60")]
        steps: u32,
        /// Battery level to start from
        #[arg(long, default_value = "20")]
        start_battery: f64,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Send {
            id,
            status,
            name,
            battery,
            power,
            current,
            voltage,
            temperature,
            time,
        } => {
            let update = StationUpdate {
                id: Some(id),
                status: Some(status),
                name,
                battery_level: battery,
                charging_power: power,
                charging_current: current,
                voltage,
                temperature,
                charging_time: time,
            };

            let state = post_update(&client, &cli.api_url, &update).await?;
            print_state(&state);
        }

        Commands::State => {
            let response = client
                .get(format!("{}/api/station", cli.api_url))
                .send()
                .await
                .with_context(|| format!("Cannot connect to VoltWay API at {}", cli.api_url))?;

            if !response.status().is_success() {
                bail!("Failed to fetch station state: {}", response.status());
            }

            let body: ApiResponse<DeviceState> = response.json().await?;
            print_state(&body.data);
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await
                .with_context(|| format!("Cannot connect to VoltWay API at {}", cli.api_url))?;

            if !response.status().is_success() {
                bail!("API returned error: {}", response.status());
            }

            let health: serde_json::Value = response.json().await?;
            println!("VoltWay v{}", health["version"].as_str().unwrap_or("unknown"));
            println!();
            println!("API Status:  {}", health["status"].as_str().unwrap_or("unknown"));
            println!("Server time: {}", health["timestamp"].as_str().unwrap_or("unknown"));
            if let Some(connections) = health["connections"].as_u64() {
                println!("Dashboards:  {}", connections);
            }
            if let Some(uptime) = health["uptimeSeconds"].as_u64() {
                println!("Uptime:      {}", format_duration(uptime));
            }
        }

        Commands::Simulate {
            id,
            interval_ms,
            steps,
            start_battery,
        } => {
            let mut session = ChargingSession::new(start_battery);
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

            for _ in 0..steps {
                ticker.tick().await;

                let update = session.next_update(&id);
                let state = post_update(&client, &cli.api_url, &update).await?;
                println!(
                    "[{}] {} battery={:.1}% power={:.1}kW temp={:.1}°C",
                    state.last_update.format("%H:%M:%S"),
                    state.status,
                    state.battery_level,
                    state.charging_power,
                    state.temperature
                );

                if session.is_complete() {
                    break;
                }
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, config)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

/// POST an update and return the resulting station state
async fn post_update(
    client: &reqwest::Client,
    api_url: &str,
    update: &StationUpdate,
) -> anyhow::Result<DeviceState> {
    let response = client
        .post(format!("{}/api/station/data", api_url))
        .json(update)
        .send()
        .await
        .with_context(|| format!("Cannot connect to VoltWay API at {}", api_url))?;

    let status = response.status();
    if status.is_success() {
        let body: ApiResponse<DeviceState> = response.json().await?;
        Ok(body.data)
    } else {
        let reason = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| "no details".to_string());
        bail!("Update rejected ({}): {}", status, reason)
    }
}

/// A charging session that fills the battery with tapering power
struct ChargingSession {
    battery: f64,
    minutes: u32,
}

impl ChargingSession {
    const VOLTAGE: f64 = 220.0;
    const MAX_POWER_KW: f64 = 7.4;
    const AMBIENT_C: f64 = 24.0;

    fn new(start_battery: f64) -> Self {
        Self {
            battery: start_battery.clamp(0.0, 100.0),
            minutes: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.battery >= 100.0
    }

    /// Advance one simulated minute and describe it as an update
    fn next_update(&mut self, id: &str) -> StationUpdate {
        if self.is_complete() {
            return StationUpdate::new(id, StationStatus::Available)
                .battery_level(100.0)
                .charging_power(0.0)
                .charging_current(0.0)
                .voltage(Self::VOLTAGE)
                .temperature(Self::AMBIENT_C)
                .charging_time(self.minutes);
        }

        // Constant power up to 80%, then taper
        let power = if self.battery < 80.0 {
            Self::MAX_POWER_KW
        } else {
            Self::MAX_POWER_KW * (100.0 - self.battery) / 20.0 + 0.5
        };
        let voltage = Self::VOLTAGE + (self.minutes as f64 * 0.7).sin() * 2.0;

        self.minutes += 1;
        self.battery = (self.battery + power * 0.25).min(100.0);

        let status = if self.is_complete() {
            StationStatus::Available
        } else {
            StationStatus::Charging
        };

        StationUpdate::new(id, status)
            .battery_level((self.battery * 10.0).round() / 10.0)
            .charging_power((power * 10.0).round() / 10.0)
            .charging_current((power * 1000.0 / voltage * 10.0).round() / 10.0)
            .voltage((voltage * 10.0).round() / 10.0)
            .temperature(Self::AMBIENT_C + power * 1.5)
            .charging_time(self.minutes)
    }
}

fn print_state(state: &DeviceState) {
    println!("{:<22} {}", "Station", state.id);
    println!("{:<22} {}", "Name", state.name);
    println!("{:<22} {}", "Status", state.status);
    println!("{:<22} {:.0}%", "Battery", state.battery_level);
    println!("{:<22} {:.1} kW", "Charging power", state.charging_power);
    println!("{:<22} {:.1} A", "Charging current", state.charging_current);
    println!("{:<22} {:.1} V", "Voltage", state.voltage);
    println!("{:<22} {:.0} °C", "Temperature", state.temperature);
    println!("{:<22} {} min", "Charging time", state.charging_time);
    println!("{:<22} {}", "Last update", state.last_update.to_rfc3339());
}

fn format_duration(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_session_reaches_full_and_validates() {
        let mut session = ChargingSession::new(20.0);
        let mut last_battery = 20.0;

        for _ in 0..200 {
            let update = session.next_update("ESP32_001");
            assert!(update.validate().is_ok());

            let battery = update.battery_level.unwrap();
            assert!(battery >= last_battery);
            last_battery = battery;

            if session.is_complete() {
                assert_eq!(update.status, Some(StationStatus::Available));
                break;
            }
            assert_eq!(update.status, Some(StationStatus::Charging));
        }

        assert!(session.is_complete());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59), "0m 59s");
        assert_eq!(format_duration(3_660), "1h 1m");
        assert_eq!(format_duration(90_000), "1d 1h 0m");
    }
}
