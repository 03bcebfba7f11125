//! OAuth2 callback server
//!
//! A temporary local HTTP server that captures the authorization redirect
//! when the registered redirect URI points at this machine.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;
use super::exchange::CallbackParams;
use crate::Result;
use crate::error::Error;

/// Page shown after the redirect was captured
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>listing-builder | Authorization received</title>
    <style>
        body { font-family: -apple-system, system-ui, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; text-align: center; }
        h1 { color: #ea580c; }
    </style>
</head>
<body>
    <div>
        <h1>Authorization received</h1>
        <p>You can close this window and return to your terminal.</p>
    </div>
</body>
</html>"#;

/// Page shown when the authorization server reported an error
const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>listing-builder | Authorization failed</title>
    <style>
        body { font-family: -apple-system, system-ui, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; text-align: center; }
        h1 { color: #dc2626; }
    </style>
</head>
<body>
    <div>
        <h1>Authorization failed</h1>
        <p>Check your terminal for details.</p>
    </div>
</body>
</html>"#;

/// Host, port and path to listen on, if the redirect URI is a loopback HTTP URL
pub fn loopback_target(redirect_uri: &str) -> Option<(String, u16, String)> {
    let url = Url::parse(redirect_uri).ok()?;
    if url.scheme() != "http" {
        return None;
    }
    let host = url.host_str()?;
    let bind_host = match host {
        "localhost" | "127.0.0.1" => "127.0.0.1",
        "[::1]" | "::1" => "[::1]",
        _ => return None,
    };
    let port = url.port_or_known_default()?;
    Some((bind_host.to_string(), port, url.path().to_string()))
}

/// Start a temporary callback server and wait for the redirect
///
/// Requests to other paths (such as `/favicon.ico`) are answered with 404
/// and the server keeps waiting.
pub async fn wait_for_callback(redirect_uri: &str) -> Result<CallbackParams> {
    let (host, port, expected_path) = loopback_target(redirect_uri).ok_or_else(|| {
        Error::OAuth(format!("Redirect URI {} is not a loopback address", redirect_uri))
    })?;

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await
        .map_err(|e| Error::OAuth(format!("Failed to start callback server on {}: {}", addr, e)))?;

    tracing::info!("Callback server listening on http://{}{}", addr, expected_path);

    loop {
        let (mut socket, _) = listener.accept().await
            .map_err(|e| Error::OAuth(format!("Failed to accept connection: {}", e)))?;

        let mut buffer = vec![0u8; 8192];
        let n = socket.read(&mut buffer).await
            .map_err(|e| Error::OAuth(format!("Failed to read request: {}", e)))?;

        let request = String::from_utf8_lossy(&buffer[..n]);

        let params = match parse_callback_request(&request, &expected_path) {
            Ok(Some(params)) => params,
            Ok(None) => {
                let _ = socket
                    .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                continue;
            }
            Err(e) => {
                tracing::debug!("Ignoring malformed request: {}", e);
                continue;
            }
        };

        let (status, body) = if params.error.is_some() {
            ("400 Bad Request", ERROR_HTML)
        } else {
            ("200 OK", SUCCESS_HTML)
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;

        return Ok(params);
    }
}

/// Parse an HTTP request; `Ok(None)` when it is not the redirect
fn parse_callback_request(request: &str, expected_path: &str) -> Result<Option<CallbackParams>> {
    let first_line = request.lines().next()
        .ok_or_else(|| Error::OAuth("Empty request".to_string()))?;

    // GET /callback?code=xxx&state=yyy HTTP/1.1
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(Error::OAuth("Invalid request format".to_string()));
    }

    let url = Url::parse(&format!("http://localhost{}", parts[1]))
        .map_err(|e| Error::OAuth(format!("Failed to parse callback URL: {}", e)))?;

    if url.path() != expected_path {
        return Ok(None);
    }

    let params = CallbackParams::from_url(&url);
    Ok(params.is_callback().then_some(params))
}
