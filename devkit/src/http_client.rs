/*!
Client HTTP/1.1 brut pour tester la façade

Une requête = une connexion (Connection: close). Suffisant pour vérifier
codes de statut et corps JSON sans tirer un client HTTP complet dans les
dev-dependencies.
*/

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Envoie `method path` et retourne (code, corps)
pub async fn http_request(addr: SocketAddr, method: &str, path: &str) -> Result<(u16, String)> {
    let mut socket = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connect to http facade at {addr}"))?;

    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
    socket.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    socket.read_to_end(&mut raw).await?;
    let text = String::from_utf8_lossy(&raw);

    let status_line = text.lines().next().context("empty http response")?;
    let code: u16 = status_line
        .split_whitespace()
        .nth(1)
        .context("malformed status line")?
        .parse()
        .context("malformed status code")?;

    let body = match text.split_once("\r\n\r\n") {
        Some((_, body)) => body.to_string(),
        None => String::new(),
    };
    Ok((code, body))
}
