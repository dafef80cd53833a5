//! Publish-only MQTT 3.1.1 client over plain TCP.
//!
//! One connection per step: CONNECT, CONNACK, PUBLISH (QoS 0 or 1, waiting for
//! PUBACK on 1), DISCONNECT.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::driver::{ChannelDriver, Delivery};
use crate::config::{HTTP_TIMEOUT_SECS, MQTT_DEFAULT_PORT, MQTT_KEEP_ALIVE_SECS};
use crate::error::{NotifyError, Result};

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const DISCONNECT: u8 = 0xE0;

/// Largest value the remaining-length varint can carry.
const MAX_REMAINING_LENGTH: usize = 268_435_455;

fn err(message: impl Into<String>) -> NotifyError {
    NotifyError::driver("mqtt", message)
}

/// Parse `host`, `host:port`, `tcp://host:port` or `mqtt://host:port`.
pub fn parse_broker(broker: &str) -> Result<(String, u16)> {
    let rest = broker
        .trim()
        .strip_prefix("tcp://")
        .or_else(|| broker.trim().strip_prefix("mqtt://"))
        .unwrap_or(broker.trim())
        .trim_end_matches('/');
    if rest.is_empty() {
        return Err(err("empty broker address"));
    }

    if let Some(bracketed) = rest.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| err(format!("invalid broker address '{broker}'")))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p
                .parse()
                .map_err(|_| err(format!("invalid broker port in '{broker}'")))?,
            None => MQTT_DEFAULT_PORT,
        };
        return Ok((host.to_string(), port));
    }

    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| err(format!("invalid broker port in '{broker}'")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((rest.to_string(), MQTT_DEFAULT_PORT)),
    }
}

// ============================================================================
// Packet encoding
// ============================================================================

fn push_remaining_length(out: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn packet(header: u8, body: Vec<u8>) -> Result<Vec<u8>> {
    if body.len() > MAX_REMAINING_LENGTH {
        return Err(err("packet too large"));
    }
    let mut out = Vec::with_capacity(body.len() + 5);
    out.push(header);
    push_remaining_length(&mut out, body.len());
    out.extend(body);
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions<'a> {
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub keep_alive: u16,
}

pub fn encode_connect(opts: &ConnectOptions<'_>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    push_str(&mut body, "MQTT");
    body.push(4); // protocol level 3.1.1

    let mut flags = 0x02; // clean session
    if opts.username.is_some() {
        flags |= 0x80;
    }
    if opts.password.is_some() {
        flags |= 0x40;
    }
    body.push(flags);
    body.extend_from_slice(&opts.keep_alive.to_be_bytes());

    push_str(&mut body, opts.client_id);
    if let Some(user) = opts.username {
        push_str(&mut body, user);
    }
    if let Some(pass) = opts.password {
        push_str(&mut body, pass);
    }
    packet(CONNECT, body)
}

pub fn encode_publish(topic: &str, payload: &[u8], qos: u8, retain: bool, packet_id: u16) -> Result<Vec<u8>> {
    let mut header = PUBLISH | (qos.min(1) << 1);
    if retain {
        header |= 0x01;
    }
    let mut body = Vec::with_capacity(topic.len() + payload.len() + 4);
    push_str(&mut body, topic);
    if qos > 0 {
        body.extend_from_slice(&packet_id.to_be_bytes());
    }
    body.extend_from_slice(payload);
    packet(header, body)
}

/// Read one packet: `(first header byte, body)`.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(u8, Vec<u8>)> {
    let header = reader.read_u8().await?;
    let mut len = 0usize;
    let mut multiplier = 1usize;
    for _ in 0..4 {
        let byte = reader.read_u8().await?;
        len += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).await?;
            return Ok((header, body));
        }
        multiplier *= 128;
    }
    Err(err("malformed remaining length"))
}

fn connack_reason(code: u8) -> &'static str {
    match code {
        1 => "unacceptable protocol version",
        2 => "identifier rejected",
        3 => "server unavailable",
        4 => "bad user name or password",
        5 => "not authorized",
        _ => "connection refused",
    }
}

// ============================================================================
// Session
// ============================================================================

/// A single publish request.
#[derive(Debug, Clone)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: u8,
    pub retain: bool,
}

/// Run CONNECT..DISCONNECT on an established stream.
pub async fn publish_on<S>(stream: &mut S, connect: &ConnectOptions<'_>, msg: &Publish<'_>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&encode_connect(connect)?).await?;
    let (header, body) = read_packet(stream).await?;
    if header & 0xF0 != CONNACK || body.len() < 2 {
        return Err(err(format!("expected CONNACK, got packet 0x{header:02x}")));
    }
    if body[1] != 0 {
        return Err(err(format!(
            "broker refused connection: {} ({})",
            connack_reason(body[1]),
            body[1]
        )));
    }

    let packet_id: u16 = 1;
    stream
        .write_all(&encode_publish(msg.topic, msg.payload, msg.qos, msg.retain, packet_id)?)
        .await?;

    if msg.qos > 0 {
        let (header, body) = read_packet(stream).await?;
        if header & 0xF0 != PUBACK || body.len() < 2 {
            return Err(err(format!("expected PUBACK, got packet 0x{header:02x}")));
        }
        let acked = u16::from_be_bytes([body[0], body[1]]);
        if acked != packet_id {
            return Err(err(format!("PUBACK for unexpected packet id {acked}")));
        }
    }

    stream.write_all(&[DISCONNECT, 0]).await?;
    stream.flush().await?;
    Ok(())
}

pub struct MqttDriver {
    timeout: Duration,
}

impl MqttDriver {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }
}

impl Default for MqttDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelDriver for MqttDriver {
    async fn send(&self, delivery: &Delivery<'_>) -> Result<()> {
        let step = delivery.step;
        let broker = step
            .broker
            .as_deref()
            .ok_or_else(|| err("step has no 'broker'"))?;
        let topic = step
            .topic
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| err("step has no 'topic'"))?;
        let message = step.message.as_deref().unwrap_or("");
        let (host, port) = parse_broker(broker)?;

        let default_client_id = format!("notify-{}", std::process::id());
        let connect = ConnectOptions {
            client_id: step.client_id.as_deref().unwrap_or(&default_client_id),
            username: step.username.as_deref().filter(|u| !u.is_empty()),
            password: step.password.as_deref().filter(|p| !p.is_empty()),
            keep_alive: MQTT_KEEP_ALIVE_SECS,
        };
        let msg = Publish {
            topic,
            payload: message.as_bytes(),
            qos: step.qos.unwrap_or(0).min(1),
            retain: step.retain.unwrap_or(false),
        };

        let session = async {
            let mut stream = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| err(format!("connect {host}:{port}: {e}")))?;
            publish_on(&mut stream, &connect, &msg).await
        };
        tokio::time::timeout(self.timeout, session)
            .await
            .map_err(|_| err(format!("timed out talking to {host}:{port}")))?
    }
}
