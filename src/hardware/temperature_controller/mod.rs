use std::{collections::BTreeMap, net::IpAddr};

use chrono::{Local, NaiveDateTime, TimeDelta};
use serde::de::DeserializeOwned;

use crate::config::TemperatureControllerConfig;

use self::{defs::*, protocol::*};

pub use self::error::{Error, Result};

pub mod defs;
pub mod error;
pub mod protocol;

#[cfg(test)]
mod mock;

/// Client for a Bluefors temperature controller.
///
/// Heater and thermometer metadata is fetched once on connection and kept for
/// the lifetime of the client. Every operation afterwards opens its own
/// connection to the relevant endpoint and closes it before returning.
pub struct TemperatureController {
    address: Address,
    heaters: BTreeMap<String, HeaterInfo>,
    thermometers: BTreeMap<String, ThermometerInfo>,
}

impl TemperatureController {
    pub const NAME: &str = "temperature controller";

    pub const HEATER_COUNT: u32 = 4;
    pub const THERMOMETER_COUNT: u32 = 8;

    pub const HISTORY_WINDOW_MIN: i64 = 5;

    pub async fn connect_from_config(config: &TemperatureControllerConfig) -> Result<Self> {
        Self::connect_to(Address::try_from(config)?).await
    }

    pub async fn connect(ip: IpAddr) -> Result<Self> {
        Self::connect_to(Address::new(ip)).await
    }

    pub async fn connect_to(address: Address) -> Result<Self> {
        tracing::debug!("Querying heaters...");
        let heaters = fetch_table(&address, Endpoint::HeaterInfo, Self::HEATER_COUNT).await?;

        tracing::debug!("Querying thermometers...");
        let thermometers =
            fetch_table(&address, Endpoint::ChannelInfo, Self::THERMOMETER_COUNT).await?;

        tracing::info!(
            "Connected to {} at {}:{}",
            Self::NAME,
            address.ip,
            address.port
        );

        Ok(Self {
            address,
            heaters,
            thermometers,
        })
    }

    /* == Public API == */

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn heaters(&self) -> &BTreeMap<String, HeaterInfo> {
        &self.heaters
    }

    pub fn thermometers(&self) -> &BTreeMap<String, ThermometerInfo> {
        &self.thermometers
    }

    pub fn heater(&self, name: &str) -> Option<&HeaterInfo> {
        self.heaters.get(name)
    }

    pub fn thermometer(&self, name: &str) -> Option<&ThermometerInfo> {
        self.thermometers.get(name)
    }

    /// Latest sample recorded within the last five minutes.
    pub async fn get_measurement(&self, channel: impl Into<ChannelRef>) -> Result<Measurement> {
        let (start, stop) = recent_window(Local::now().naive_local());
        let history = self.get_history(channel, start, stop).await?;

        Ok(history.latest()?)
    }

    /// All samples between two local times.
    pub async fn get_history(
        &self,
        channel: impl Into<ChannelRef>,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<History> {
        if start > stop {
            return Err(Error::InvalidArgument(format!(
                "start time {start} is after stop time {stop}"
            )));
        }

        let channel_nr = self.resolve_thermometer(&channel.into())?;
        let request = HistoryRequest::new(channel_nr, start, stop);

        tracing::debug!(
            "Fetching channel {channel_nr} history from {} to {}",
            request.start_time,
            request.stop_time
        );

        let mut link = Link::open(&self.address, Endpoint::HistoricalData).await?;
        let reply = link.exchange::<_, HistoryReply>(&request).await;
        link.close().await;

        let history = History::from(reply?);

        if history.is_ragged() {
            tracing::warn!("Channel {channel_nr} returned series of unequal length");
        }

        Ok(history)
    }

    /// Push a partial settings update. The device does not acknowledge it.
    pub async fn set_heater(
        &self,
        channel: impl Into<ChannelRef>,
        settings: &HeaterSettings,
    ) -> Result<()> {
        let heater_nr = self.resolve_heater(&channel.into())?;

        tracing::debug!("Updating heater {heater_nr}: {settings:?}");

        let mut link = Link::open(&self.address, Endpoint::HeaterUpdate).await?;
        let result = link.send(&HeaterUpdate::new(heater_nr, settings)).await;
        link.close().await;

        result
    }

    pub fn resolve_heater(&self, channel: &ChannelRef) -> Result<u32> {
        resolve(&self.heaters, channel)
    }

    pub fn resolve_thermometer(&self, channel: &ChannelRef) -> Result<u32> {
        resolve(&self.thermometers, channel)
    }
}

fn resolve<T: ChannelInfo>(table: &BTreeMap<String, T>, channel: &ChannelRef) -> Result<u32> {
    match channel {
        ChannelRef::ByNumber(number) => Ok(*number),
        ChannelRef::ByName(name) => table
            .get(name)
            .map(T::number)
            .ok_or_else(|| Error::lookup(T::KIND, name)),
    }
}

fn recent_window(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let window = TimeDelta::minutes(TemperatureController::HISTORY_WINDOW_MIN);
    (now - window, now)
}

async fn fetch_table<T>(
    address: &Address,
    endpoint: Endpoint,
    count: u32,
) -> Result<BTreeMap<String, T>>
where
    T: ChannelInfo + DeserializeOwned,
{
    let mut link = Link::open(address, endpoint).await?;
    let mut table = BTreeMap::new();

    let result = async {
        for number in 1..=count {
            let info: T = link.exchange(&T::request(number)).await?;
            insert_unique(&mut table, info);
        }

        Ok::<_, Error>(())
    }
    .await;

    link.close().await;

    result.map(|()| table)
}

/// Later channels reporting an already-known name are stored as `name_N`.
fn insert_unique<T: ChannelInfo>(table: &mut BTreeMap<String, T>, info: T) {
    let name = info.name();

    let key = if table.contains_key(name) {
        let mut n = table.keys().filter(|key| key.contains(name)).count() + 1;

        while table.contains_key(&format!("{name}_{n}")) {
            n += 1;
        }

        let key = format!("{name}_{n}");

        tracing::warn!(
            "Duplicate {} name \"{name}\" (#{}), stored as \"{key}\"",
            T::KIND,
            info.number()
        );

        key
    } else {
        name.to_owned()
    };

    table.insert(key, info);
}
