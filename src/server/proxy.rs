//! Reverse proxy in front of the external development server
//!
//! Requests are forwarded unchanged apart from hop-by-hop headers. HTML
//! responses get the live-reload client injected and every reference to the
//! target origin rewritten to the proxy origin, as do `Location` headers.

use crate::ui::Reporter;
use anyhow::{Context as _, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use std::io::Read;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use url::Url;

/// Path the live-reload client script is served under
pub const CLIENT_SCRIPT_PATH: &str = "/__sluice/livereload.js";

const CLIENT_SCRIPT: &str = include_str!("livereload.js");

/// Request headers that are not forwarded upstream
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "accept-encoding",
    "content-length",
    "transfer-encoding",
    "upgrade",
];

/// Response headers that tiny_http sets itself
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "content-length",
    "transfer-encoding",
    "date",
    "server",
];

/// Forwards requests to the target and rewrites what comes back
pub struct Proxy {
    client: Client,
    target: Url,
    target_origin: String,
    public_origin: String,
    client_script: String,
    reporter: Reporter,
}

impl Proxy {
    /// Create a proxy for `target`, reachable at `public_origin`
    pub fn new(
        target: Url,
        public_origin: String,
        livereload_port: u16,
        reporter: Reporter,
    ) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Proxy {
            client,
            target_origin: target.origin().ascii_serialization(),
            target,
            public_origin,
            client_script: CLIENT_SCRIPT
                .replace("__SLUICE_LIVERELOAD_PORT__", &livereload_port.to_string()),
            reporter,
        })
    }

    /// Handle requests until the server shuts down
    pub fn serve(&self, server: &Server) {
        for request in server.incoming_requests() {
            let url = request.url().to_string();
            if let Err(e) = self.handle(request) {
                self.reporter.warn(&format!("Proxy request {} failed: {:#}", url, e));
            }
        }
    }

    fn handle(&self, mut request: Request) -> Result<()> {
        if request.url() == CLIENT_SCRIPT_PATH {
            let response = Response::from_string(self.client_script.clone())
                .with_header(make_header("Content-Type", "application/javascript"));
            request.respond(response)?;
            return Ok(());
        }

        let url = self
            .target
            .join(request.url())
            .with_context(|| format!("Invalid request path {}", request.url()))?;

        let mut body = Vec::new();
        request.as_reader().read_to_end(&mut body)?;

        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .context("Unsupported request method")?;

        let mut headers = HeaderMap::new();
        for header in request.headers() {
            let name = header.field.as_str().as_str();
            if SKIPPED_REQUEST_HEADERS
                .iter()
                .any(|skipped| name.eq_ignore_ascii_case(skipped))
            {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(header.value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }

        let upstream = self
            .client
            .request(method, url.clone())
            .headers(headers)
            .body(body)
            .send();

        match upstream {
            Ok(response) => self.relay(request, response),
            Err(e) => {
                self.reporter.warn(&format!("Proxy could not reach {}: {}", url, e));
                let response = Response::from_string(format!("Bad gateway: {}", e))
                    .with_status_code(StatusCode(502));
                request.respond(response)?;
                Ok(())
            }
        }
    }

    fn relay(&self, request: Request, upstream: reqwest::blocking::Response) -> Result<()> {
        let status = upstream.status().as_u16();
        let mut html = false;
        let mut encoded = false;
        let mut headers = Vec::new();

        for (name, value) in upstream.headers() {
            let name = name.as_str();
            if SKIPPED_RESPONSE_HEADERS.contains(&name) {
                continue;
            }

            let mut value = value.as_bytes().to_vec();
            match name {
                "content-type" => html = is_html(&String::from_utf8_lossy(&value)),
                "content-encoding" => encoded = true,
                "location" => {
                    let location = String::from_utf8_lossy(&value);
                    value = rewrite_origin(&location, &self.target_origin, &self.public_origin)
                        .into_bytes();
                }
                _ => {}
            }

            if let Ok(header) = Header::from_bytes(name.as_bytes(), value) {
                headers.push(header);
            }
        }

        let mut body = upstream.bytes()?.to_vec();
        if html && !encoded {
            body = self.rewrite_html(body);
        }

        let mut response = Response::from_data(body).with_status_code(StatusCode(status));
        for header in headers {
            response.add_header(header);
        }
        request.respond(response)?;
        Ok(())
    }

    fn rewrite_html(&self, body: Vec<u8>) -> Vec<u8> {
        let body = match String::from_utf8(body) {
            Ok(text) => {
                rewrite_origin(&text, &self.target_origin, &self.public_origin).into_bytes()
            }
            Err(e) => e.into_bytes(),
        };
        inject_script(&body, &script_tag())
    }
}

/// The tag that loads the live-reload client
pub fn script_tag() -> String {
    format!("<script src=\"{}\"></script>", CLIENT_SCRIPT_PATH)
}

/// Whether a content type denotes an HTML document
pub fn is_html(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("text/html")
}

/// Replace occurrences of one origin with another
///
/// An occurrence only counts when it ends the origin: it must be followed by
/// `/`, a quote or the end of the text, so `http://localhost` leaves
/// `http://localhost:8080` and `http://localhost.example` untouched.
pub fn rewrite_origin(text: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(index) = rest.find(from) {
        let after = &rest[index + from.len()..];
        out.push_str(&rest[..index]);
        if after.is_empty() || after.starts_with(['/', '"', '\'']) {
            out.push_str(to);
        } else {
            out.push_str(from);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Insert `tag` before the last `</body>`, or append it when there is none
pub fn inject_script(content: &[u8], tag: &str) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let mut result = Vec::with_capacity(content.len() + tag.len());
    match content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        Some(pos) => {
            result.extend_from_slice(&content[..pos]);
            result.extend_from_slice(tag.as_bytes());
            result.extend_from_slice(&content[pos..]);
        }
        None => {
            result.extend_from_slice(content);
            result.extend_from_slice(tag.as_bytes());
        }
    }
    result
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid")
}
