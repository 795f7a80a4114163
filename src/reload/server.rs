// src/reload/server.rs

//! WebSocket broadcast endpoint for reload clients.
//!
//! A plain thread accepts connections and completes the handshake with
//! `tungstenite`. Broadcasting writes to every socket and drops the ones
//! that fail. Accepted sockets carry a write timeout, so a client that stops
//! reading is dropped instead of blocking the engine.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tungstenite::{Message, WebSocket};

use super::{ReloadMessage, ReloadSink};

const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Connected reload clients.
#[derive(Clone)]
pub struct ReloadHub {
    clients: Clients,
    addr: SocketAddr,
}

impl std::fmt::Debug for ReloadHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHub")
            .field("addr", &self.addr)
            .field("clients", &lock(&self.clients).len())
            .finish()
    }
}

fn lock(clients: &Clients) -> MutexGuard<'_, Vec<WebSocket<TcpStream>>> {
    clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ReloadHub {
    /// Bind the WebSocket listener and start accepting clients.
    pub fn bind(interface: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((interface, port))
            .with_context(|| format!("binding live-reload socket on {interface}:{port}"))?;
        let addr = listener.local_addr()?;
        let clients: Clients = Arc::new(Mutex::new(Vec::new()));

        let accept_clients = Arc::clone(&clients);
        std::thread::Builder::new()
            .name("reload-accept".to_string())
            .spawn(move || accept_loop(listener, accept_clients))
            .context("spawning live-reload accept thread")?;

        info!(%addr, "live reload listening");
        Ok(Self { clients, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    fn broadcast(&self, payload: &str) {
        let mut clients = lock(&self.clients);
        let before = clients.len();
        clients.retain_mut(|ws| ws.send(Message::text(payload)).is_ok());
        let dropped = before - clients.len();
        if dropped > 0 {
            debug!(dropped, "removed disconnected reload clients");
        }
    }
}

fn accept_loop(listener: TcpListener, clients: Clients) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "live-reload accept failed");
                continue;
            }
        };
        if let Err(err) = stream.set_write_timeout(Some(WRITE_TIMEOUT)) {
            warn!(error = %err, "live-reload socket setup failed");
            continue;
        }
        match tungstenite::accept(stream) {
            Ok(ws) => {
                lock(&clients).push(ws);
                debug!("reload client connected");
            }
            Err(err) => warn!(error = %err, "live-reload handshake failed"),
        }
    }
}

impl ReloadSink for ReloadHub {
    fn notify(&self, message: &ReloadMessage) {
        let payload = message.to_json();
        info!(clients = self.client_count(), message = %payload, "live reload");
        self.broadcast(&payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_for_clients(hub: &ReloadHub, n: usize) {
        for _ in 0..100 {
            if hub.client_count() == n {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(hub.client_count(), n);
    }

    #[test]
    fn broadcast_reaches_connected_client() {
        let hub = ReloadHub::bind("127.0.0.1", 0).unwrap();
        let url = format!("ws://{}/", hub.local_addr());
        let (mut client, _) = tungstenite::connect(url).unwrap();
        wait_for_clients(&hub, 1);

        hub.notify(&ReloadMessage::Reload);
        let msg = client.read().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"command":"reload"}"#);
    }

    #[test]
    fn client_that_stops_reading_is_dropped() {
        let hub = ReloadHub::bind("127.0.0.1", 0).unwrap();
        let url = format!("ws://{}/", hub.local_addr());
        let (_stalled, _) = tungstenite::connect(url).unwrap();
        wait_for_clients(&hub, 1);

        let payload = "x".repeat(1 << 20);
        for _ in 0..256 {
            hub.broadcast(&payload);
            if hub.client_count() == 0 {
                break;
            }
        }
        assert_eq!(hub.client_count(), 0);
    }
}
