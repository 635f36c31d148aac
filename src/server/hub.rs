//! Live-reload broadcast hub
//!
//! Browsers connect over WebSocket and only ever receive messages. A client
//! whose send fails is dropped; nothing is queued for clients that connect
//! later.

use crate::ui::Reporter;
use parking_lot::Mutex;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tungstenite::protocol::Message;
use tungstenite::WebSocket;

/// Connected live-reload clients
#[derive(Clone, Default)]
pub struct Hub {
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently connected clients
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Register a connected client
    pub fn add(&self, client: WebSocket<TcpStream>) {
        self.clients.lock().push(client);
    }

    /// Send a text message to every client, returning how many received it
    pub fn broadcast(&self, text: &str, reporter: Reporter) -> usize {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            reporter.debug("No live-reload clients connected");
            return 0;
        }

        let message = Message::Text(text.into());
        clients.retain_mut(|client| match client.send(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                reporter.debug(&format!("Live-reload client disconnected: {}", e));
                false
            }
        });
        clients.len()
    }

    /// Accept WebSocket handshakes on a background thread
    pub fn spawn_acceptor(&self, listener: TcpListener, reporter: Reporter) {
        let hub = self.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        reporter.debug(&format!("Live-reload accept failed: {}", e));
                        continue;
                    }
                };
                match tungstenite::accept(stream) {
                    Ok(client) => {
                        hub.add(client);
                        reporter.debug(&format!(
                            "Live-reload client connected (total: {})",
                            hub.client_count()
                        ));
                    }
                    Err(e) => reporter.debug(&format!("Live-reload handshake failed: {}", e)),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::Verbosity;
    use std::time::{Duration, Instant};

    fn wait_for_clients(hub: &Hub, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while hub.client_count() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_broadcast_without_clients() {
        let hub = Hub::new();
        assert_eq!(hub.broadcast("reload", Reporter::new(Verbosity::Silent)), 0);
    }

    #[test]
    fn test_broadcast_reaches_connected_clients() {
        let reporter = Reporter::new(Verbosity::Silent);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let hub = Hub::new();
        hub.spawn_acceptor(listener, reporter);

        let (mut first, _) = tungstenite::connect(format!("ws://127.0.0.1:{}/", port)).unwrap();
        let (mut second, _) = tungstenite::connect(format!("ws://127.0.0.1:{}/", port)).unwrap();
        wait_for_clients(&hub, 2);

        assert_eq!(hub.broadcast("reload", reporter), 2);
        for client in [&mut first, &mut second] {
            match client.read().unwrap() {
                Message::Text(text) => assert_eq!(text.as_str(), "reload"),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }
}
