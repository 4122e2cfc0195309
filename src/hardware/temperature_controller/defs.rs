use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use super::{
    error::{Error, ProtocolError},
    protocol::{ChannelInfoRequest, HeaterInfoRequest},
};

/* == Channel references == */

/// A heater or thermometer, addressed by device number or by reported name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelRef {
    ByNumber(u32),
    ByName(String),
}

impl From<u32> for ChannelRef {
    fn from(number: u32) -> Self {
        ChannelRef::ByNumber(number)
    }
}

impl From<&str> for ChannelRef {
    fn from(name: &str) -> Self {
        ChannelRef::ByName(name.to_owned())
    }
}

impl From<String> for ChannelRef {
    fn from(name: String) -> Self {
        ChannelRef::ByName(name)
    }
}

impl FromStr for ChannelRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Err(Error::InvalidArgument("empty channel identifier".into()));
        }

        Ok(match s.parse() {
            Ok(number) => ChannelRef::ByNumber(number),
            Err(_) => ChannelRef::ByName(s.to_owned()),
        })
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::ByNumber(number) => write!(f, "#{number}"),
            ChannelRef::ByName(name) => write!(f, "\"{name}\""),
        }
    }
}

/* == Channel metadata == */

/// Metadata reported by the device for one numbered channel.
pub trait ChannelInfo {
    const KIND: &'static str;

    type Request: Serialize;

    fn request(number: u32) -> Self::Request;
    fn name(&self) -> &str;
    fn number(&self) -> u32;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HeaterInfo {
    pub name: String,
    pub heater_nr: u32,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ThermometerInfo {
    pub name: String,
    pub channel_nr: u32,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ChannelInfo for HeaterInfo {
    const KIND: &'static str = "heater";

    type Request = HeaterInfoRequest;

    fn request(heater_nr: u32) -> HeaterInfoRequest {
        HeaterInfoRequest { heater_nr }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn number(&self) -> u32 {
        self.heater_nr
    }
}

impl ChannelInfo for ThermometerInfo {
    const KIND: &'static str = "thermometer";

    type Request = ChannelInfoRequest;

    fn request(channel_nr: u32) -> ChannelInfoRequest {
        ChannelInfoRequest { channel_nr }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn number(&self) -> u32 {
        self.channel_nr
    }
}

/* == Readings == */

/// Sample series returned by a historical-data query. Samples are kept as the
/// device sent them.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct History {
    pub timestamp: Vec<Value>,
    pub resistance: Vec<Value>,
    pub temperature: Vec<Value>,
    /// Any other entries of the reply's `measurements` object.
    #[serde(rename = "measurements", skip_serializing_if = "Map::is_empty")]
    pub series: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The most recent sample of a [`History`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Measurement {
    pub timestamp: Value,
    pub resistance: Value,
    pub temperature: Value,
    #[serde(rename = "measurements", skip_serializing_if = "Map::is_empty")]
    pub series: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl History {
    /// Number of complete samples, i.e. the length of the shortest series.
    pub fn len(&self) -> usize {
        [&self.timestamp, &self.resistance, &self.temperature]
            .into_iter()
            .map(Vec::len)
            .min()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Series lengths disagree, the device returned a ragged reply.
    pub fn is_ragged(&self) -> bool {
        let len = self.timestamp.len();
        self.resistance.len() != len || self.temperature.len() != len
    }

    /// Reduce each series to its last element. Fails if any series is empty.
    pub fn latest(mut self) -> Result<Measurement, ProtocolError> {
        fn last(series: &mut Vec<Value>, field: &'static str) -> Result<Value, ProtocolError> {
            series.pop().ok_or(ProtocolError::EmptySequence(field))
        }

        Ok(Measurement {
            timestamp: last(&mut self.timestamp, "timestamp")?,
            resistance: last(&mut self.resistance, "resistance")?,
            temperature: last(&mut self.temperature, "temperature")?,
            series: self.series,
            extra: self.extra,
        })
    }
}

/* == Heater settings == */

#[derive(Copy, Clone, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum PidMode {
    /// The device applies `power` directly.
    Manual,
    /// The device regulates towards `setpoint`, bounded by `max_power`.
    Pid,
}

impl Serialize for PidMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            PidMode::Manual => 0,
            PidMode::Pid => 1,
        })
    }
}

/// PID gains. Ranges are left to the device.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ControlAlgorithmSettings {
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
}

/// Partial heater update. Unset fields are left untouched on the device.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HeaterSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_mode: Option<PidMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_algorithm_settings: Option<ControlAlgorithmSettings>,
}

impl HeaterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_pid_mode(mut self, pid_mode: PidMode) -> Self {
        self.pid_mode = Some(pid_mode);
        self
    }

    /// Manual power in W.
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = Some(power);
        self
    }

    /// Power ceiling in W while regulating.
    pub fn with_max_power(mut self, max_power: f64) -> Self {
        self.max_power = Some(max_power);
        self
    }

    /// Target temperature in K.
    pub fn with_setpoint(mut self, setpoint: f64) -> Self {
        self.setpoint = Some(setpoint);
        self
    }

    pub fn with_control_algorithm(mut self, settings: ControlAlgorithmSettings) -> Self {
        self.control_algorithm_settings = Some(settings);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
