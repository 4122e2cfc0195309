use chrono::{Local, NaiveDateTime, TimeDelta};
use eyre::{Context, Result};
use serde::Serialize;

use crate::{
    config::TemperatureControllerConfig,
    hardware::{
        TemperatureController,
        temperature_controller::defs::{ChannelRef, ControlAlgorithmSettings, HeaterSettings},
    },
    misc::ColourDot,
};

use super::HeaterOpts;

pub async fn info(config: &TemperatureControllerConfig) -> Result<()> {
    let controller = connect(config).await?;

    let mut heaters: Vec<_> = controller.heaters().iter().collect();
    heaters.sort_by_key(|(_, info)| info.heater_nr);

    println!("Heaters");
    for (name, info) in heaters {
        let active = info.metadata.get("active").and_then(|v| v.as_bool());
        println!("  {} {:>2}  {name}", ColourDot::from(active), info.heater_nr);
    }

    let mut thermometers: Vec<_> = controller.thermometers().iter().collect();
    thermometers.sort_by_key(|(_, info)| info.channel_nr);

    println!("Thermometers");
    for (name, info) in thermometers {
        let active = info.metadata.get("active").and_then(|v| v.as_bool());
        println!("  {} {:>2}  {name}", ColourDot::from(active), info.channel_nr);
    }

    Ok(())
}

pub async fn measure(config: &TemperatureControllerConfig, channel: ChannelRef) -> Result<()> {
    let controller = connect(config).await?;

    let measurement = controller
        .get_measurement(channel.clone())
        .await
        .wrap_err_with(|| format!("Failed to read thermometer {channel}"))?;

    print_json(&measurement)
}

pub async fn history(
    config: &TemperatureControllerConfig,
    channel: ChannelRef,
    start: Option<NaiveDateTime>,
    stop: Option<NaiveDateTime>,
) -> Result<()> {
    let controller = connect(config).await?;

    let stop = stop.unwrap_or_else(|| Local::now().naive_local());
    let start = start.unwrap_or_else(|| {
        stop - TimeDelta::minutes(TemperatureController::HISTORY_WINDOW_MIN)
    });

    let history = controller
        .get_history(channel.clone(), start, stop)
        .await
        .wrap_err_with(|| format!("Failed to read history of thermometer {channel}"))?;

    tracing::info!("Received {} samples", history.len());

    print_json(&history)
}

pub async fn heater(config: &TemperatureControllerConfig, opts: HeaterOpts) -> Result<()> {
    let channel = opts.channel.clone();
    let settings = HeaterSettings::from(opts);

    if settings.is_empty() {
        tracing::warn!("No settings given, only the heater number will be sent");
    }

    let controller = connect(config).await?;

    controller
        .set_heater(channel.clone(), &settings)
        .await
        .wrap_err_with(|| format!("Failed to update heater {channel}"))?;

    tracing::info!("Heater {channel} updated");
    Ok(())
}

async fn connect(config: &TemperatureControllerConfig) -> Result<TemperatureController> {
    TemperatureController::connect_from_config(config)
        .await
        .wrap_err_with(|| format!("Failed to connect to {}", TemperatureController::NAME))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl From<HeaterOpts> for HeaterSettings {
    fn from(opts: HeaterOpts) -> Self {
        let control_algorithm_settings = match (opts.proportional, opts.integral, opts.derivative) {
            (Some(proportional), Some(integral), Some(derivative)) => {
                Some(ControlAlgorithmSettings {
                    proportional,
                    integral,
                    derivative,
                })
            }
            _ => None,
        };

        HeaterSettings {
            active: opts.active,
            pid_mode: opts.pid_mode,
            power: opts.power,
            max_power: opts.max_power,
            setpoint: opts.setpoint,
            control_algorithm_settings,
        }
    }
}
