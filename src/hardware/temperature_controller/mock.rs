use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Mutex,
    task::JoinHandle,
    time::sleep,
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
    },
};

use super::protocol::Address;

/// In-process stand-in for the device, answering on every endpoint and
/// recording each message and close frame it receives.
pub struct MockDevice {
    addr: SocketAddr,
    inner: Arc<Inner>,
    task: JoinHandle<()>,
}

struct Inner {
    heaters: Vec<String>,
    thermometers: Vec<String>,
    nameless_heater: Mutex<Option<u64>>,
    history: Mutex<Value>,
    received: Mutex<Vec<(String, Value)>>,
    closed: Mutex<Vec<String>>,
}

impl MockDevice {
    const POLL_INTERVAL: Duration = Duration::from_millis(10);
    const POLL_ATTEMPTS: usize = 200;

    pub async fn spawn(heaters: &[&str], thermometers: &[&str]) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let inner = Arc::new(Inner {
            heaters: heaters.iter().map(|s| s.to_string()).collect(),
            thermometers: thermometers.iter().map(|s| s.to_string()).collect(),
            nameless_heater: Default::default(),
            history: Mutex::new(json!({})),
            received: Default::default(),
            closed: Default::default(),
        });

        let task = tokio::spawn(Self::accept_task(listener, inner.clone()));

        Self { addr, inner, task }
    }

    pub fn address(&self) -> Address {
        Address {
            ip: self.addr.ip(),
            port: self.addr.port(),
            timeout: Duration::from_secs(2),
        }
    }

    pub async fn set_history(&self, reply: Value) {
        *self.inner.history.lock().await = reply;
    }

    /// Answer `/heater` requests for heater `n` without a `name`.
    pub async fn set_nameless_heater(&self, n: u64) {
        *self.inner.nameless_heater.lock().await = Some(n);
    }

    pub async fn received_now(&self, path: &str) -> Vec<Value> {
        self.inner
            .received
            .lock()
            .await
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Waits until at least `count` messages have arrived on `path`.
    pub async fn received(&self, path: &str, count: usize) -> Vec<Value> {
        for _ in 0..Self::POLL_ATTEMPTS {
            let messages = self.received_now(path).await;

            if messages.len() >= count {
                return messages;
            }

            sleep(Self::POLL_INTERVAL).await;
        }

        panic!("Expected {count} messages on {path}");
    }

    /// Waits until at least `count` close frames have arrived on `path`.
    pub async fn closed(&self, path: &str, count: usize) -> usize {
        for _ in 0..Self::POLL_ATTEMPTS {
            let closed = self.inner.closed.lock().await;
            let n = closed.iter().filter(|p| *p == path).count();
            drop(closed);

            if n >= count {
                return n;
            }

            sleep(Self::POLL_INTERVAL).await;
        }

        panic!("Expected {count} close frames on {path}");
    }

    async fn accept_task(listener: TcpListener, inner: Arc<Inner>) {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(Self::connection_task(stream, inner.clone()));
        }
    }

    async fn connection_task(stream: TcpStream, inner: Arc<Inner>) {
        let mut path = String::new();

        let callback =
            |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                path = request.uri().path().to_owned();
                Ok(response)
            };

        let Ok(mut socket) = accept_hdr_async(stream, callback).await else {
            return;
        };

        while let Some(Ok(message)) = socket.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => {
                    inner.closed.lock().await.push(path.clone());
                    continue;
                }
                _ => continue,
            };

            let request: Value = serde_json::from_str(text.as_str()).unwrap();

            inner
                .received
                .lock()
                .await
                .push((path.clone(), request.clone()));

            let reply = match path.as_str() {
                "/heater" => {
                    let n = request["heater_nr"].as_u64().unwrap();
                    let name = &inner.heaters[n as usize - 1];

                    if *inner.nameless_heater.lock().await == Some(n) {
                        json!({ "heater_nr": n, "power": 0.0, "active": false })
                    } else {
                        json!({ "name": name, "heater_nr": n, "power": 0.0, "active": false })
                    }
                }

                "/channel" => {
                    let n = request["channel_nr"].as_u64().unwrap();
                    let name = &inner.thermometers[n as usize - 1];
                    json!({ "name": name, "channel_nr": n, "active": true })
                }

                "/channel/historical-data" => inner.history.lock().await.clone(),

                _ => continue,
            };

            if socket.send(Message::text(reply.to_string())).await.is_err() {
                break;
            }
        }
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}
