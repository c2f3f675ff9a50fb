// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local HTTP server.
//!
//! Serves the files of a site over plain HTTP so it can be previewed in a
//! browser. Requests are answered one at a time on the calling thread until
//! the process is interrupted. There is no authentication, caching, or TLS.
//!
//! Site templates link items as `t.html?t=<slug>`, so the query string is
//! always dropped before a request path gets resolved.

use std::{
    fs,
    net::{Ipv4Addr, SocketAddr},
    path::{Component, Path, PathBuf},
};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{debug, info, instrument, warn};

/// Serve site at `root` on `port` until interrupted.
///
/// # Errors
///
/// - Return [`ServeError::Bind`] if the port cannot be bound.
#[instrument(skip(root), level = "debug")]
pub fn serve(root: impl AsRef<Path>, port: u16) -> Result<()> {
    let root = root.as_ref();
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let server = Server::http(addr).map_err(|err| ServeError::Bind {
        addr,
        message: err.to_string(),
    })?;
    info!("serving {:?} at http://localhost:{port}", root.display());

    for request in server.incoming_requests() {
        if let Err(error) = handle_request(root, request) {
            warn!("{error}");
        }
    }

    Ok(())
}

fn handle_request(root: &Path, request: Request) -> Result<()> {
    debug!("{} {}", request.method(), request.url());
    let Some(path) = resolve_request_path(root, request.url()) else {
        let response = Response::from_string("404 Not Found").with_status_code(StatusCode(404));
        return request.respond(response).map_err(ServeError::Respond);
    };

    let content = fs::read(&path).map_err(|source| ServeError::Read {
        source,
        path: path.clone(),
    })?;
    let mut response = Response::from_data(content);
    if let Ok(header) = Header::from_bytes("Content-Type", guess_content_type(&path)) {
        response.add_header(header);
    }

    request.respond(response).map_err(ServeError::Respond)
}

/// Resolve request URL to a file under `root`.
///
/// Drops the query string, decodes percent escapes, and resolves directories
/// to their `index.html`. Return `None` if nothing servable matches, or the
/// path tries to leave `root`.
pub fn resolve_request_path(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = urlencoding::decode(path).ok()?;

    let mut local = root.to_path_buf();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => local.push(part),
            Component::CurDir => continue,
            _ => return None,
        }
    }

    if local.is_dir() {
        local.push("index.html");
    }

    local.is_file().then_some(local)
}

/// Guess MIME type from file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Local server error types.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Server cannot bind to address.
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    /// Requested file cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Response cannot be sent.
    #[error(transparent)]
    Respond(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ServeError> = std::result::Result<T, E>;
