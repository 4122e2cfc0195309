use std::net::IpAddr;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use eyre::{Result, eyre};

use crate::{
    config::{Config, TemperatureControllerConfig},
    hardware::temperature_controller::{
        Error,
        defs::{ChannelRef, PidMode},
        protocol::HistoryRequest,
    },
};

mod config;
mod device;

#[derive(Parser)]
#[command(version, about)]
pub struct CliOpts {
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Device IP, overrides the configuration file
    #[arg(long)]
    ip: Option<IpAddr>,

    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the parsed configuration
    Config,

    /// List heaters and thermometers
    Info,

    /// Print the latest reading of a thermometer
    Measure {
        #[arg(value_parser = parse_channel)]
        channel: ChannelRef,
    },

    /// Print every reading of a thermometer in a time range
    History {
        #[arg(value_parser = parse_channel)]
        channel: ChannelRef,

        /// Local time, "YYYY-MM-DD HH:MM:SS" (default: five minutes ago)
        #[arg(long, value_parser = parse_time)]
        start: Option<NaiveDateTime>,

        /// Local time, "YYYY-MM-DD HH:MM:SS" (default: now)
        #[arg(long, value_parser = parse_time)]
        stop: Option<NaiveDateTime>,
    },

    /// Update heater settings, unset options are left untouched
    Heater(HeaterOpts),
}

#[derive(Args)]
pub struct HeaterOpts {
    #[arg(value_parser = parse_channel)]
    channel: ChannelRef,

    #[arg(long)]
    active: Option<bool>,

    #[arg(long)]
    pid_mode: Option<PidMode>,

    /// Manual power in W
    #[arg(long)]
    power: Option<f64>,

    /// Power ceiling in W while regulating
    #[arg(long)]
    max_power: Option<f64>,

    /// Target temperature in K
    #[arg(long)]
    setpoint: Option<f64>,

    #[arg(long, requires_all = ["integral", "derivative"])]
    proportional: Option<f64>,

    #[arg(long, requires_all = ["proportional", "derivative"])]
    integral: Option<f64>,

    #[arg(long, requires_all = ["proportional", "integral"])]
    derivative: Option<f64>,
}

#[tokio::main]
pub async fn execute_command(opts: CliOpts) -> Result<()> {
    let CliOpts {
        config,
        ip,
        port,
        command,
    } = opts;

    match command {
        Command::Config => self::config::read_and_print(&config).await,

        Command::Info => device::info(&device_config(&config, ip, port).await?).await,

        Command::Measure { channel } => {
            device::measure(&device_config(&config, ip, port).await?, channel).await
        }

        Command::History {
            channel,
            start,
            stop,
        } => {
            let device = device_config(&config, ip, port).await?;
            device::history(&device, channel, start, stop).await
        }

        Command::Heater(heater) => {
            device::heater(&device_config(&config, ip, port).await?, heater).await
        }
    }
}

/// `--ip` takes precedence, otherwise the configuration file must name a device.
async fn device_config(
    path: &str,
    ip: Option<IpAddr>,
    port: Option<u16>,
) -> Result<TemperatureControllerConfig> {
    let mut config = match ip {
        Some(ip) => TemperatureControllerConfig::new(ip),
        None => Config::load(path)
            .await?
            .temperature_controller
            .ok_or_else(|| eyre!("No temperature_controller section in {path}"))?,
    };

    if let Some(port) = port {
        config.port = port;
    }

    Ok(config)
}

/// Digits address a channel by number, anything else by name.
fn parse_channel(s: &str) -> Result<ChannelRef, Error> {
    s.parse()
}

fn parse_time(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, HistoryRequest::TIME_FORMAT)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        CliOpts::command().debug_assert();
    }

    #[test]
    fn test_parse_heater() {
        let opts = CliOpts::try_parse_from([
            "cryostat", "--ip", "10.0.0.3", "heater", "mxc", "--active", "true", "--setpoint",
            "0.05",
        ])
        .unwrap();

        let Command::Heater(heater) = opts.command else {
            panic!("Expected heater command");
        };

        assert_eq!(heater.channel, ChannelRef::from("mxc"));
        assert_eq!(heater.active, Some(true));
        assert_eq!(heater.setpoint, Some(0.05));
        assert_eq!(heater.power, None);
    }

    #[test]
    fn test_numeric_channels() {
        let opts = CliOpts::try_parse_from(["cryostat", "heater", "2", "--power", "0.5"]).unwrap();

        let Command::Heater(heater) = opts.command else {
            panic!("Expected heater command");
        };

        assert_eq!(heater.channel, ChannelRef::ByNumber(2));

        let opts = CliOpts::try_parse_from(["cryostat", "measure", "7"]).unwrap();
        assert!(matches!(
            opts.command,
            Command::Measure {
                channel: ChannelRef::ByNumber(7)
            }
        ));
    }

    #[test]
    fn test_empty_channel_rejected() {
        assert!(CliOpts::try_parse_from(["cryostat", "measure", " "]).is_err());
    }

    #[test]
    fn test_partial_gains_rejected() {
        let result = CliOpts::try_parse_from([
            "cryostat",
            "heater",
            "2",
            "--proportional",
            "0.04",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_parse_history_times() {
        let opts = CliOpts::try_parse_from([
            "cryostat",
            "history",
            "5",
            "--start",
            "2024-03-09 09:00:00",
        ])
        .unwrap();

        let Command::History { channel, start, stop } = opts.command else {
            panic!("Expected history command");
        };

        assert_eq!(channel, ChannelRef::ByNumber(5));
        assert_eq!(start.unwrap().to_string(), "2024-03-09 09:00:00");
        assert!(stop.is_none());
    }
}
