use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use chrono::NaiveDateTime;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use strum::IntoStaticStr;
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::config::TemperatureControllerConfig;

use super::{
    defs::{HeaterSettings, History},
    error::{Error, ProtocolError, Result, TransportError},
};

/* === Definitions === */

/// Where the device lives and how long a single exchange may take.
#[derive(Clone, Debug, PartialEq)]
pub struct Address {
    pub ip: IpAddr,
    pub port: u16,
    pub timeout: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoStaticStr)]
pub enum Endpoint {
    #[strum(serialize = "/heater")]
    HeaterInfo,
    #[strum(serialize = "/channel")]
    ChannelInfo,
    #[strum(serialize = "/channel/historical-data")]
    HistoricalData,
    #[strum(serialize = "/heater/update")]
    HeaterUpdate,
}

/// A single WebSocket connection to one endpoint.
pub struct Link {
    url: String,
    timeout: Duration,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[derive(Debug, Serialize)]
pub struct HeaterInfoRequest {
    pub heater_nr: u32,
}

#[derive(Debug, Serialize)]
pub struct ChannelInfoRequest {
    pub channel_nr: u32,
}

#[derive(Debug, Serialize)]
pub struct HistoryRequest {
    pub channel_nr: u32,
    pub start_time: String,
    pub stop_time: String,
    pub fields: [&'static str; 3],
}

#[derive(Debug, Deserialize)]
pub struct HistoryReply {
    pub measurements: Series,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Series {
    pub timestamp: Vec<Value>,
    pub resistance: Vec<Value>,
    pub temperature: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct HeaterUpdate<'a> {
    pub heater_nr: u32,
    #[serde(flatten)]
    pub settings: &'a HeaterSettings,
}

/* === Implementations === */

impl Address {
    pub const DEFAULT_PORT: u16 = 5002;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            port: Self::DEFAULT_PORT,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        let path: &'static str = endpoint.into();
        format!("ws://{}{path}", SocketAddr::new(self.ip, self.port))
    }
}

impl TryFrom<&TemperatureControllerConfig> for Address {
    type Error = Error;

    /// Fails unless `timeout_s` is a positive, finite number of seconds.
    fn try_from(config: &TemperatureControllerConfig) -> Result<Self> {
        let timeout = Duration::try_from_secs_f32(config.timeout_s)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("invalid timeout_s: {}", config.timeout_s))
            })?;

        Ok(Self {
            ip: config.ip,
            port: config.port,
            timeout,
        })
    }
}

impl Link {
    pub async fn open(address: &Address, endpoint: Endpoint) -> Result<Self> {
        let url = address.url(endpoint);

        tracing::debug!("Connecting to {url}");

        let (stream, _) = timeout(address.timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::connection(&url, TransportError::Timeout(address.timeout)))?
            .map_err(|e| Error::connection(&url, e))?;

        Ok(Self {
            url,
            timeout: address.timeout,
            stream,
        })
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let text = serde_json::to_string(message).map_err(ProtocolError::from)?;

        tracing::trace!("{} <- {text}", self.url);

        timeout(self.timeout, self.stream.send(Message::text(text)))
            .await
            .map_err(|_| Error::connection(&self.url, TransportError::Timeout(self.timeout)))?
            .map_err(|e| Error::connection(&self.url, e))
    }

    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        loop {
            let frame = timeout(self.timeout, self.stream.next())
                .await
                .map_err(|_| Error::connection(&self.url, TransportError::Timeout(self.timeout)))?;

            let message = match frame {
                Some(message) => message.map_err(|e| Error::connection(&self.url, e))?,
                None => return Err(ProtocolError::Closed.into()),
            };

            let reply = match message {
                Message::Text(text) => serde_json::from_str(text.as_str()),
                Message::Binary(bytes) => serde_json::from_slice(&bytes),
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => return Err(ProtocolError::Closed.into()),
                Message::Frame(_) => return Err(ProtocolError::UnexpectedFrame("raw").into()),
            };

            return reply.map_err(|e| ProtocolError::from(e).into());
        }
    }

    /// Send one message and wait for the matching reply.
    pub async fn exchange<T: Serialize, R: DeserializeOwned>(&mut self, message: &T) -> Result<R> {
        self.send(message).await?;
        self.receive().await
    }

    /// Best-effort close, failures are only logged.
    pub async fn close(mut self) {
        let result = timeout(self.timeout, self.stream.close(None)).await;

        if !matches!(result, Ok(Ok(()))) {
            tracing::debug!("Unclean close of {}", self.url);
        }
    }
}

impl HistoryRequest {
    pub const FIELDS: [&'static str; 3] = ["timestamp", "resistance", "temperature"];
    pub const TIME_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn new(channel_nr: u32, start: NaiveDateTime, stop: NaiveDateTime) -> Self {
        Self {
            channel_nr,
            start_time: start.format(Self::TIME_FORMAT).to_string(),
            stop_time: stop.format(Self::TIME_FORMAT).to_string(),
            fields: Self::FIELDS,
        }
    }
}

impl From<HistoryReply> for History {
    fn from(reply: HistoryReply) -> Self {
        let Series {
            timestamp,
            resistance,
            temperature,
            extra: series,
        } = reply.measurements;

        History {
            timestamp,
            resistance,
            temperature,
            series,
            extra: reply.extra,
        }
    }
}

impl<'a> HeaterUpdate<'a> {
    pub fn new(heater_nr: u32, settings: &'a HeaterSettings) -> Self {
        Self {
            heater_nr,
            settings,
        }
    }
}
