//! Minimal Minecraft Java Edition "Server List Ping" client.
//!
//! Only the status half of the protocol is spoken: a handshake announcing
//! the status state, an empty status request, and the JSON status response.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 25565;

/// Protocol version announced in the handshake. Servers answer status
/// requests regardless of the version they actually run.
const HANDSHAKE_PROTOCOL_VERSION: i32 = 47;
const NEXT_STATE_STATUS: i32 = 1;
const STATUS_PACKET_ID: i32 = 0x00;
const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

/// A `host[:port]` pair pointing at a Java Edition server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for ServerAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            bail!("server address is empty");
        }

        // Bracketed IPv6, with or without a port.
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .context("unterminated '[' in server address")?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => parse_port(tail.strip_prefix(':').context("expected ':' after ']'")?)?,
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match s.rsplit_once(':') {
            // A bare IPv6 address has several colons and no port.
            Some((host, _)) if host.contains(':') => Ok(Self {
                host: s.to_string(),
                port: DEFAULT_PORT,
            }),
            Some((host, port)) => {
                if host.is_empty() {
                    bail!("server address has no host");
                }
                Ok(Self {
                    host: host.to_string(),
                    port: parse_port(port)?,
                })
            }
            None => Ok(Self {
                host: s.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse::<u16>()
        .with_context(|| format!("invalid port: {raw}"))
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == DEFAULT_PORT {
            write!(f, "{host}")
        } else {
            write!(f, "{host}:{}", self.port)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerSample {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Players {
    #[serde(default)]
    pub online: i64,
    #[serde(default)]
    pub max: i64,
    #[serde(default)]
    pub sample: Option<Vec<PlayerSample>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Version {
    pub name: String,
}

/// The subset of the status JSON this bot cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupResponse {
    #[serde(skip)]
    pub online: bool,
    #[serde(default)]
    pub players: Players,
    #[serde(default)]
    pub version: Option<Version>,
}

/// Anything that can answer "is this server up, and who is on it".
#[async_trait]
pub trait StatusLookup: Send + Sync {
    async fn lookup(&self, address: &ServerAddress) -> Result<LookupResponse>;
}

/// Queries servers over TCP using the Server List Ping protocol.
pub struct JavaStatusClient {
    timeout: Duration,
}

impl JavaStatusClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange(&self, address: &ServerAddress) -> Result<LookupResponse> {
        let mut stream = TcpStream::connect((address.host.as_str(), address.port))
            .await
            .with_context(|| format!("Failed to connect to {address}"))?;

        stream
            .write_all(&handshake_packet(address))
            .await
            .context("Failed to send handshake")?;
        stream
            .write_all(&frame(STATUS_PACKET_ID, &[]))
            .await
            .context("Failed to send status request")?;

        let body = read_frame(&mut stream).await?;
        let json = decode_status_body(&body)?;
        debug!("Status response from {}: {} bytes", address, json.len());

        let mut response: LookupResponse =
            serde_json::from_str(json).context("Failed to parse status JSON")?;
        response.online = true;
        Ok(response)
    }
}

#[async_trait]
impl StatusLookup for JavaStatusClient {
    async fn lookup(&self, address: &ServerAddress) -> Result<LookupResponse> {
        tokio::time::timeout(self.timeout, self.exchange(address))
            .await
            .with_context(|| format!("Timed out after {:?} querying {address}", self.timeout))?
    }
}

fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Decode a VarInt from the front of `buf`, advancing it.
fn decode_varint(buf: &mut &[u8]) -> Result<i32> {
    let mut result: u32 = 0;
    for i in 0..5 {
        let Some((&byte, rest)) = buf.split_first() else {
            bail!("truncated VarInt");
        };
        *buf = rest;
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    bail!("VarInt is longer than 5 bytes")
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut result: u32 = 0;
    for i in 0..5 {
        let byte = reader
            .read_u8()
            .await
            .context("Connection closed while reading VarInt")?;
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    bail!("VarInt is longer than 5 bytes")
}

/// Prefix a packet id and payload with its VarInt length.
fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 5);
    write_varint(&mut body, packet_id);
    body.extend_from_slice(payload);

    let mut out = Vec::with_capacity(body.len() + 5);
    write_varint(&mut out, body.len() as i32);
    out.extend_from_slice(&body);
    out
}

fn handshake_packet(address: &ServerAddress) -> Vec<u8> {
    let mut payload = Vec::new();
    write_varint(&mut payload, HANDSHAKE_PROTOCOL_VERSION);
    write_string(&mut payload, &address.host);
    payload.extend_from_slice(&address.port.to_be_bytes());
    write_varint(&mut payload, NEXT_STATE_STATUS);
    frame(STATUS_PACKET_ID, &payload)
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let length = read_varint(reader).await?;
    if length <= 0 || length as usize > MAX_FRAME_LEN {
        bail!("invalid frame length: {length}");
    }
    let mut body = vec![0u8; length as usize];
    reader
        .read_exact(&mut body)
        .await
        .context("Connection closed while reading frame")?;
    Ok(body)
}

/// Extract the JSON string from a status response packet body.
fn decode_status_body(body: &[u8]) -> Result<&str> {
    let mut cursor = body;
    let packet_id = decode_varint(&mut cursor)?;
    if packet_id != STATUS_PACKET_ID {
        bail!("unexpected packet id {packet_id:#04x} in status response");
    }
    let len = decode_varint(&mut cursor)?;
    if len < 0 || len as usize > cursor.len() {
        bail!("status string length {len} exceeds packet");
    }
    std::str::from_utf8(&cursor[..len as usize]).context("status JSON is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn varint_bytes(value: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, value);
        buf
    }

    #[test]
    fn test_varint_known_encodings() {
        assert_eq!(varint_bytes(0), vec![0x00]);
        assert_eq!(varint_bytes(127), vec![0x7F]);
        assert_eq!(varint_bytes(300), vec![0xAC, 0x02]);
        assert_eq!(varint_bytes(25565), vec![0xDD, 0xC7, 0x01]);
        assert_eq!(varint_bytes(-1), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_decode_varint_rejects_overlong() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut cursor = &bytes[..];
        assert!(decode_varint(&mut cursor).is_err());
    }

    #[test]
    fn test_decode_varint_rejects_truncated() {
        let bytes = [0x80];
        let mut cursor = &bytes[..];
        assert!(decode_varint(&mut cursor).is_err());
    }

    #[test]
    fn test_parse_addresses() {
        let a: ServerAddress = "185.55.240.150".parse().unwrap();
        assert_eq!((a.host.as_str(), a.port), ("185.55.240.150", 25565));

        let b: ServerAddress = "play.example.net:25570".parse().unwrap();
        assert_eq!((b.host.as_str(), b.port), ("play.example.net", 25570));

        let c: ServerAddress = "[::1]:25566".parse().unwrap();
        assert_eq!((c.host.as_str(), c.port), ("::1", 25566));

        let d: ServerAddress = "2001:db8::1".parse().unwrap();
        assert_eq!((d.host.as_str(), d.port), ("2001:db8::1", 25565));

        assert!("".parse::<ServerAddress>().is_err());
        assert!(":25565".parse::<ServerAddress>().is_err());
        assert!("host:notaport".parse::<ServerAddress>().is_err());
    }

    #[test]
    fn test_display_omits_default_port() {
        let a: ServerAddress = "mc.example.org".parse().unwrap();
        assert_eq!(a.to_string(), "mc.example.org");
        let b: ServerAddress = "mc.example.org:1234".parse().unwrap();
        assert_eq!(b.to_string(), "mc.example.org:1234");
        let c: ServerAddress = "[::1]:1234".parse().unwrap();
        assert_eq!(c.to_string(), "[::1]:1234");
    }

    #[test]
    fn test_handshake_layout() {
        let address = ServerAddress {
            host: "ab".to_string(),
            port: 25565,
        };
        let packet = handshake_packet(&address);
        // len, id, protocol 47, "ab", port 0x63DD, next state 1
        assert_eq!(
            packet,
            vec![0x08, 0x00, 0x2F, 0x02, b'a', b'b', 0x63, 0xDD, 0x01]
        );
    }

    /// Accepts one connection, checks the handshake, answers with `json`.
    async fn fake_server(json: &'static str) -> ServerAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let handshake = read_frame(&mut socket).await.unwrap();
            let mut cursor = &handshake[..];
            assert_eq!(decode_varint(&mut cursor).unwrap(), STATUS_PACKET_ID);
            assert_eq!(decode_varint(&mut cursor).unwrap(), HANDSHAKE_PROTOCOL_VERSION);
            assert_eq!(*cursor.last().unwrap(), NEXT_STATE_STATUS as u8);

            let request = read_frame(&mut socket).await.unwrap();
            assert_eq!(request, vec![0x00]);

            let mut payload = Vec::new();
            write_string(&mut payload, json);
            socket
                .write_all(&frame(STATUS_PACKET_ID, &payload))
                .await
                .unwrap();
        });
        ServerAddress {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_lookup_parses_players() {
        let address = fake_server(
            r#"{"version":{"name":"1.21.1","protocol":767},
                "players":{"max":20,"online":2,
                  "sample":[{"name":"Alice","id":"a"},{"name":"Bob","id":"b"}]},
                "description":{"text":"hello"}}"#,
        )
        .await;

        let client = JavaStatusClient::new(Duration::from_secs(2));
        let response = client.lookup(&address).await.unwrap();
        assert!(response.online);
        assert_eq!(response.players.online, 2);
        assert_eq!(response.players.max, 20);
        let names: Vec<_> = response
            .players
            .sample
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(response.version.unwrap().name, "1.21.1");
    }

    #[tokio::test]
    async fn test_lookup_without_sample() {
        let address = fake_server(r#"{"players":{"max":10,"online":0}}"#).await;
        let client = JavaStatusClient::new(Duration::from_secs(2));
        let response = client.lookup(&address).await.unwrap();
        assert!(response.players.sample.is_none());
        assert_eq!(response.players.max, 10);
    }

    #[tokio::test]
    async fn test_lookup_rejects_garbage_json() {
        let address = fake_server("not json").await;
        let client = JavaStatusClient::new(Duration::from_secs(2));
        assert!(client.lookup(&address).await.is_err());
    }

    #[tokio::test]
    async fn test_lookup_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = JavaStatusClient::new(Duration::from_millis(200));
        let address = ServerAddress {
            host: "127.0.0.1".to_string(),
            port,
        };
        let err = client.lookup(&address).await.unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }

    #[tokio::test]
    async fn test_lookup_connection_refused() {
        // Bind then drop to get a port that is very likely closed.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = JavaStatusClient::new(Duration::from_secs(2));
        let address = ServerAddress {
            host: "127.0.0.1".to_string(),
            port,
        };
        assert!(client.lookup(&address).await.is_err());
    }
}
