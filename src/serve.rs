// src/serve.rs

//! Development server.
//!
//! A small `tiny_http` static server over the output directory:
//!
//! - Automatic `index.html` resolution for directories
//! - The live-reload client injected into every HTML response
//! - Port retry when the configured port is taken
//!
//! Requests are handled on a plain thread; the build engine never waits on
//! it. Dropping the [`ServerHandle`] unblocks the server and ends the thread.

use std::io::Cursor;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{info, warn};

use crate::config::model::ServeSection;

/// Live-reload client, embedded at compile time.
const RELOAD_SCRIPT: &str = include_str!("embed/reload.js");

const RELOAD_PORT_PLACEHOLDER: &str = "__ASSETDAG_RELOAD_PORT__";

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Running server; stops when dropped.
pub struct ServerHandle {
    server: Arc<Server>,
    addr: SocketAddr,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle").field("addr", &self.addr).finish()
    }
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        info!("stopping dev server");
        self.server.unblock();
    }
}

/// Bind the server and start handling requests on a background thread.
pub fn start(serve: &ServeSection, root: PathBuf, reload_port: u16) -> Result<ServerHandle> {
    let interface: IpAddr = serve
        .interface
        .parse()
        .with_context(|| format!("invalid serve interface '{}'", serve.interface))?;
    let (server, addr) = try_bind_port(interface, serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let snippet = reload_snippet(reload_port);
    let index = serve.index.clone();
    let worker = Arc::clone(&server);
    std::thread::Builder::new()
        .name("dev-server".to_string())
        .spawn(move || {
            for request in worker.incoming_requests() {
                if let Err(e) = handle_request(request, &root, &index, &snippet) {
                    warn!(error = %e, "request error");
                }
            }
        })
        .context("spawning dev server thread")?;

    info!("serving http://{addr}");
    Ok(ServerHandle { server, addr })
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                // Port 0 asks the OS for any free port.
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                if offset > 0 {
                    info!(base_port, port, "port in use, using the next free one");
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn reload_snippet(port: u16) -> String {
    format!(
        "<script>{}</script>",
        RELOAD_SCRIPT.replace(RELOAD_PORT_PLACEHOLDER, &port.to_string())
    )
}

/// Resolve a request URL to a file under `root`.
///
/// The query string is dropped and the path percent-decoded. `..` segments
/// are refused after decoding.
fn resolve(root: &Path, url: &str, index: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let decoded = urlencoding::decode(path).ok()?;
    let request_path = decoded.trim_matches('/');
    if request_path.split(['/', '\\']).any(|seg| seg == "..") {
        return None;
    }

    let local = root.join(request_path);
    if local.is_file() {
        return Some(local);
    }
    let index = local.join(index);
    index.is_file().then_some(index)
}

fn handle_request(request: Request, root: &Path, index: &str, snippet: &str) -> Result<()> {
    let Some(path) = resolve(root, request.url(), index) else {
        return serve_not_found(request);
    };

    let mut content =
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let content_type = guess_content_type(&path);
    if content_type.starts_with("text/html") {
        content = inject_reload(&content, snippet);
    }

    let response = Response::from_data(content).with_header(header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

/// Insert the reload client before `</body>`, or append it.
fn inject_reload(html: &[u8], snippet: &str) -> Vec<u8> {
    let text = String::from_utf8_lossy(html);
    let out = match text.rfind("</body>") {
        Some(idx) => format!("{}{}{}", &text[..idx], snippet, &text[idx..]),
        None => format!("{text}{snippet}"),
    };
    out.into_bytes()
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow::anyhow!("invalid header {name}: {value}"))
}

fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![header("Content-Type", "text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("map") => "application/json; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",

        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
