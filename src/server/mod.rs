//! Development server: a live-reloading proxy
//!
//! `start` binds two listeners and returns immediately. The HTTP proxy runs on
//! a small pool of threads in front of the configured external server; the
//! WebSocket listener feeds the [`Hub`] that `reload` broadcasts through.

pub mod hub;
pub mod proxy;

pub use hub::Hub;
pub use proxy::{Proxy, CLIENT_SCRIPT_PATH};

use crate::runner::Context;
use crate::ui::Reporter;
use anyhow::{anyhow, Context as _, Result};
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use tiny_http::Server;
use url::Url;

/// Preferred port of the HTTP proxy
pub const PROXY_PORT: u16 = 3000;

/// Preferred port of the live-reload WebSocket listener
pub const LIVERELOAD_PORT: u16 = 35729;

/// Maximum number of port binding attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Proxy worker threads
const WORKERS: usize = 4;

/// Message that makes connected browsers reload
pub const RELOAD_MESSAGE: &str = "reload";

/// Handle to a running development server
pub struct LiveReload {
    hub: Hub,
    proxy_port: u16,
    livereload_port: u16,
    start_url: String,
}

impl LiveReload {
    /// Tell every connected browser to reload; returns the number reached
    pub fn publish(&self, reporter: Reporter) -> usize {
        self.hub.broadcast(RELOAD_MESSAGE, reporter)
    }

    pub fn client_count(&self) -> usize {
        self.hub.client_count()
    }

    pub fn proxy_port(&self) -> u16 {
        self.proxy_port
    }

    pub fn livereload_port(&self) -> u16 {
        self.livereload_port
    }

    /// Address to open in the browser
    pub fn start_url(&self) -> &str {
        &self.start_url
    }
}

/// Bind the proxy and the live-reload listener and serve them in the background
pub fn start(context: &Context) -> Result<LiveReload> {
    let reporter = context.reporter;
    let target = Url::parse(&context.config.serve.proxy)
        .with_context(|| format!("Invalid proxy target {}", context.config.serve.proxy))?;
    let interface = IpAddr::V4(Ipv4Addr::LOCALHOST);

    let (listener, livereload_port) =
        bind_with_retry(interface, LIVERELOAD_PORT, reporter, TcpListener::bind)?;
    let hub = Hub::new();
    hub.spawn_acceptor(listener, reporter);

    let (server, proxy_port) = bind_with_retry(interface, PROXY_PORT, reporter, Server::http)?;
    let public_origin = format!("http://localhost:{}", proxy_port);
    let start_url = format!("{}{}", public_origin, target.path());

    let proxy = Arc::new(Proxy::new(
        target,
        public_origin,
        livereload_port,
        reporter,
    )?);
    let server = Arc::new(server);
    for _ in 0..WORKERS {
        let proxy = Arc::clone(&proxy);
        let server = Arc::clone(&server);
        thread::spawn(move || proxy.serve(&server));
    }

    reporter.info(&format!("Proxying {} at {}", context.config.serve.proxy, start_url));
    reporter.debug(&format!("Live reload listening on port {}", livereload_port));

    Ok(LiveReload {
        hub,
        proxy_port,
        livereload_port,
        start_url,
    })
}

/// Bind to the specified interface and port, with automatic port retry
pub fn bind_with_retry<T, E: Display>(
    interface: IpAddr,
    base_port: u16,
    reporter: Reporter,
    mut bind: impl FnMut(SocketAddr) -> std::result::Result<T, E>,
) -> Result<(T, u16)> {
    let mut last_error = String::new();
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match bind(SocketAddr::new(interface, port)) {
            Ok(bound) => {
                if offset > 0 {
                    reporter.info(&format!(
                        "Port {} in use, using {} instead",
                        base_port, port
                    ));
                }
                return Ok((bound, port));
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error
    ))
}
