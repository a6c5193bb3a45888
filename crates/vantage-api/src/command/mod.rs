//! Client for the Vantage Host Command service.
//!
//! The Host Command service is a CRLF-delimited ASCII protocol on port
//! 3010 (TLS) or 3001 (plaintext). One socket carries both
//! request/response traffic and server-push events:
//!
//! - `R:` lines answer the oldest unanswered request (the service does
//!   not tag responses, so correlation is strictly FIFO with at most
//!   one request outstanding),
//! - `S:` lines are status events,
//! - `EL:` lines are enhanced-log events.
//!
//! The client runs a supervisor task that owns the socket. On any I/O
//! error it fails the in-flight request with `Disconnected`, redials
//! with exponential backoff, re-authenticates, and runs the registered
//! resync hook before admitting new requests -- that hook is how the
//! event stream re-installs its subscriptions.

pub mod interfaces;
mod params;
mod response;

pub use params::{encode_params, is_absent, parse_bool, parse_fixed, parse_int, tokenize, Param};
pub use response::CommandResponse;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::io::{AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf};
use tokio::io::AsyncBufReadExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::transport::{self, Stream, TransportConfig};
use crate::{Credentials, Vid};

/// TLS service port for the Host Command service.
pub const HC_PORT_TLS: u16 = 3010;
/// Plaintext fallback port for the Host Command service.
pub const HC_PORT_PLAIN: u16 = 3001;

const REQUEST_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for a [`CommandClient`].
#[derive(Debug, Clone)]
pub struct CommandOptions {
    pub transport: TransportConfig,
    /// Override the service port chosen from the TLS setting.
    pub port: Option<u16>,
    pub credentials: Option<Credentials>,
    /// How long to wait for a response line before failing the request.
    /// The connection is kept open; a late response is dropped.
    pub response_timeout: Duration,
    /// Reconnect backoff bounds.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Interval between `ECHO` keepalives.
    pub keepalive_interval: Duration,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            port: None,
            credentials: None,
            response_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(60),
        }
    }
}

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Authentication failed during a reconnect; the client gave up.
    Failed,
}

/// Events pushed by the Host Command service, plus connection lifecycle
/// markers emitted by the client itself.
#[derive(Debug, Clone)]
pub enum CommandEvent {
    Connected,
    Disconnected,
    /// The connection was re-established, re-authenticated, and the
    /// resync hook has run.
    Reconnected,
    /// An `S:` status line.
    Status {
        category: String,
        vid: Vid,
        args: Vec<String>,
    },
    /// An `EL:` enhanced-log line.
    EnhancedLog { log: String },
}

/// Result of a generic `INVOKE` call.
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub vid: Vid,
    /// The raw result token.
    pub result: String,
    /// Trailing arguments after the echoed method name.
    pub args: Vec<String>,
}

type ResyncHook = Box<dyn Fn() -> Vec<String> + Send + Sync>;

struct RequestEnvelope {
    line: String,
    response_tx: oneshot::Sender<Result<CommandResponse, Error>>,
}

// ── CommandClient ────────────────────────────────────────────────────

/// Client for the Host Command service. Cheaply cloneable.
#[derive(Clone)]
pub struct CommandClient {
    inner: Arc<CommandInner>,
}

struct CommandInner {
    host: String,
    port: u16,
    options: CommandOptions,
    request_tx: mpsc::Sender<RequestEnvelope>,
    request_rx: Mutex<Option<mpsc::Receiver<RequestEnvelope>>>,
    event_tx: broadcast::Sender<CommandEvent>,
    state_tx: watch::Sender<ConnectionState>,
    resync: std::sync::Mutex<Option<ResyncHook>>,
    cancel: CancellationToken,
}

impl CommandClient {
    /// Create a client. Does not connect -- call
    /// [`connect()`](Self::connect) to dial, authenticate, and start the
    /// supervisor task.
    pub fn new(host: impl Into<String>, options: CommandOptions) -> Self {
        let port = options
            .port
            .unwrap_or_else(|| options.transport.service_port(HC_PORT_TLS, HC_PORT_PLAIN));
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(CommandInner {
                host: host.into(),
                port,
                options,
                request_tx,
                request_rx: Mutex::new(Some(request_rx)),
                event_tx,
                state_tx,
                resync: std::sync::Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Dial and authenticate, then start the supervisor.
    ///
    /// The first connection attempt is not retried: rejected credentials
    /// surface immediately as a fatal [`Error::Auth`].
    pub async fn connect(&self) -> Result<(), Error> {
        let mut rx_guard = self.inner.request_rx.lock().await;
        let Some(request_rx) = rx_guard.take() else {
            return Ok(()); // already running
        };

        let _ = self.inner.state_tx.send(ConnectionState::Connecting);

        let conn = match dial(&self.inner).await {
            Ok(conn) => conn,
            Err(err) => {
                *rx_guard = Some(request_rx);
                let _ = self.inner.state_tx.send(ConnectionState::Disconnected);
                return Err(err);
            }
        };
        drop(rx_guard);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(supervisor(inner, request_rx, conn));

        let keepalive_client = self.clone();
        tokio::spawn(keepalive(keepalive_client));

        Ok(())
    }

    /// Cancel all tasks and drop the connection. Outstanding requests
    /// fail with `Cancelled`.
    pub fn close(&self) {
        self.inner.cancel.cancel();
        let _ = self.inner.state_tx.send(ConnectionState::Disconnected);
    }

    /// Register the hook invoked after every reconnect+login, before any
    /// new user request is admitted. It returns the raw command lines to
    /// replay (subscription re-enrolment).
    pub fn set_resync_hook(&self, hook: impl Fn() -> Vec<String> + Send + Sync + 'static) {
        if let Ok(mut slot) = self.inner.resync.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    /// Subscribe to status/log events and connection lifecycle markers.
    pub fn events(&self) -> broadcast::Receiver<CommandEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Observe connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send a command and await its response.
    pub async fn command(&self, command: &str, params: &[Param]) -> Result<CommandResponse, Error> {
        let line = if params.is_empty() {
            command.to_string()
        } else {
            format!("{command} {}", encode_params(params))
        };
        self.raw_request(line).await
    }

    /// Send a pre-encoded request line and await its response.
    pub async fn raw_request(&self, line: String) -> Result<CommandResponse, Error> {
        // Fail fast when nothing is draining the queue: the client was
        // never connected, or it was closed.
        if *self.inner.state_tx.borrow() == ConnectionState::Disconnected {
            return Err(self.teardown_error());
        }

        let verb = line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(RequestEnvelope { line, response_tx })
            .await
            .map_err(|_| self.teardown_error())?;

        let response = response_rx
            .await
            .map_err(|_| self.teardown_error())??;

        if response.command != verb {
            return Err(Error::protocol(format!(
                "response verb R:{} does not match request {verb}",
                response.command
            )));
        }

        Ok(response)
    }

    /// Invoke a method on an object interface.
    ///
    /// `INVOKE <vid> <Interface.Method> <args...>` answered by
    /// `R:INVOKE <vid> <result> <Interface.Method> <args...>`.
    pub async fn invoke(
        &self,
        vid: Vid,
        method: &str,
        params: &[Param],
    ) -> Result<InvokeResponse, Error> {
        let mut all = Vec::with_capacity(params.len() + 2);
        all.push(Param::from(vid));
        all.push(Param::Str(method.to_string()));
        all.extend_from_slice(params);

        let response = self.command("INVOKE", &all).await?;
        let echoed_vid: Vid = parse_int(response.arg(0)?)? as Vid;
        let result = response.arg(1)?.to_string();
        let echoed_method = response.arg(2)?;

        if echoed_vid != vid || echoed_method != method {
            return Err(Error::protocol(format!(
                "INVOKE response for {echoed_vid} {echoed_method}, expected {vid} {method}"
            )));
        }

        Ok(InvokeResponse {
            vid,
            result,
            args: response.args[3..].to_vec(),
        })
    }

    /// `VERSION` -- firmware version string of the Host Command service.
    pub async fn version(&self) -> Result<String, Error> {
        let response = self.command("VERSION", &[]).await?;
        Ok(response.arg(0)?.to_string())
    }

    fn teardown_error(&self) -> Error {
        if self.inner.cancel.is_cancelled() {
            Error::Cancelled
        } else {
            Error::Disconnected
        }
    }
}

// ── Connection plumbing ──────────────────────────────────────────────

struct Conn {
    lines: Lines<BufReader<ReadHalf<Stream>>>,
    writer: WriteHalf<Stream>,
}

enum SessionEnd {
    Cancelled,
    ConnectionLost,
}

enum Line {
    Response(String),
    Event(CommandEvent),
    Data(String),
    Ignored,
}

async fn dial(inner: &CommandInner) -> Result<Conn, Error> {
    let stream = transport::connect(&inner.host, inner.port, &inner.options.transport).await?;
    let (read_half, writer) = tokio::io::split(stream);
    let mut conn = Conn {
        lines: BufReader::new(read_half).lines(),
        writer,
    };

    if let Some(credentials) = &inner.options.credentials {
        let line = format!(
            "LOGIN {}",
            encode_params(&[
                Param::Str(credentials.username.clone()),
                Param::Str(credentials.password.expose_secret().to_string()),
            ])
        );
        match send_and_await(inner, &mut conn, &line).await {
            Ok(_) => debug!("command service login successful"),
            Err(err) if err.is_auth() => {
                return Err(Error::Auth {
                    message: "command service rejected credentials".into(),
                })
            }
            Err(err) => return Err(err),
        }
    }

    info!(host = %inner.host, port = inner.port, "connected to command service");
    Ok(conn)
}

/// Write one request and read lines until its `R:` response, diverting
/// interleaved events to the broadcast channel. Used for login and for
/// resync commands, which run before the request gate opens.
async fn send_and_await(
    inner: &CommandInner,
    conn: &mut Conn,
    line: &str,
) -> Result<CommandResponse, Error> {
    write_line(&mut conn.writer, line).await?;

    let deadline = Instant::now() + inner.options.response_timeout;
    let mut data = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                return Err(Error::Timeout(inner.options.response_timeout));
            }
            read = conn.lines.next_line() => {
                match read {
                    Ok(Some(raw)) => {
                        match classify(raw.trim_end_matches('\r')) {
                            Line::Response(response_line) => {
                                return CommandResponse::parse(&response_line, data);
                            }
                            Line::Event(event) => {
                                let _ = inner.event_tx.send(event);
                            }
                            Line::Data(data_line) => data.push(data_line),
                            Line::Ignored => {}
                        }
                    }
                    Ok(None) | Err(_) => return Err(Error::Disconnected),
                }
            }
        }
    }
}

async fn write_line(writer: &mut WriteHalf<Stream>, line: &str) -> Result<(), Error> {
    writer
        .write_all(format!("{line}\r\n").as_bytes())
        .await
        .map_err(|_| Error::Disconnected)?;
    writer.flush().await.map_err(|_| Error::Disconnected)
}

fn classify(line: &str) -> Line {
    if line.starts_with("R:") {
        Line::Response(line.to_string())
    } else if line.starts_with("S:") {
        let tokens = tokenize(line);
        let category = tokens
            .first()
            .map(|t| t[2..].to_string())
            .unwrap_or_default();
        let vid = tokens.get(1).and_then(|t| t.parse().ok());
        match vid {
            Some(vid) if !category.is_empty() => Line::Event(CommandEvent::Status {
                category,
                vid,
                args: tokens[2..].to_vec(),
            }),
            _ => {
                warn!(line, "malformed status line");
                Line::Ignored
            }
        }
    } else if let Some(log) = line.strip_prefix("EL:") {
        Line::Event(CommandEvent::EnhancedLog {
            log: log.trim_start().to_string(),
        })
    } else {
        // Multi-line responses carry their data in non-prefixed lines
        // ahead of the final R: line.
        Line::Data(line.to_string())
    }
}

// ── Supervisor ───────────────────────────────────────────────────────

async fn supervisor(
    inner: Arc<CommandInner>,
    mut request_rx: mpsc::Receiver<RequestEnvelope>,
    first_conn: Conn,
) {
    let mut conn = Some(first_conn);
    let mut attempt: u32 = 0;
    let mut reconnected = false;

    loop {
        let active = match conn.take() {
            Some(active) => active,
            None => {
                let delay = backoff_delay(
                    attempt,
                    inner.options.initial_backoff,
                    inner.options.max_backoff,
                );
                info!(delay_ms = delay.as_millis() as u64, attempt, "waiting before reconnect");
                let _ = inner
                    .state_tx
                    .send(ConnectionState::Reconnecting { attempt });

                let deadline = Instant::now() + delay;
                loop {
                    tokio::select! {
                        biased;
                        _ = inner.cancel.cancelled() => return,
                        _ = tokio::time::sleep_until(deadline) => break,
                        // Requests arriving while disconnected fail fast;
                        // callers may retry.
                        envelope = request_rx.recv() => {
                            match envelope {
                                Some(envelope) => {
                                    let _ = envelope.response_tx.send(Err(Error::Disconnected));
                                }
                                None => return,
                            }
                        }
                    }
                }

                attempt += 1;
                match dial(&inner).await {
                    Ok(active) => active,
                    Err(err) if err.is_auth() => {
                        error!(error = %err, "authentication rejected during reconnect, giving up");
                        let _ = inner.state_tx.send(ConnectionState::Failed);
                        return;
                    }
                    Err(err) => {
                        warn!(error = %err, attempt, "reconnect failed");
                        continue;
                    }
                }
            }
        };
        attempt = 0;

        match run_session(&inner, active, &mut request_rx, reconnected).await {
            SessionEnd::Cancelled => return,
            SessionEnd::ConnectionLost => {
                warn!("command channel connection lost");
                let _ = inner.event_tx.send(CommandEvent::Disconnected);
                reconnected = true;
            }
        }
    }
}

async fn run_session(
    inner: &CommandInner,
    mut conn: Conn,
    request_rx: &mut mpsc::Receiver<RequestEnvelope>,
    reconnected: bool,
) -> SessionEnd {
    // Replay subscriptions before admitting any new user request.
    if reconnected {
        let commands = inner
            .resync
            .lock()
            .ok()
            .and_then(|hook| hook.as_ref().map(|f| f()))
            .unwrap_or_default();

        for line in commands {
            match send_and_await(inner, &mut conn, &line).await {
                Ok(_) => debug!(command = %line, "resync command replayed"),
                Err(Error::Cancelled) => return SessionEnd::Cancelled,
                Err(Error::Disconnected) => return SessionEnd::ConnectionLost,
                Err(err) => warn!(command = %line, error = %err, "resync command failed"),
            }
        }
    }

    let _ = inner.state_tx.send(ConnectionState::Connected);
    let _ = inner.event_tx.send(if reconnected {
        CommandEvent::Reconnected
    } else {
        CommandEvent::Connected
    });
    info!("command channel ready");

    struct InFlight {
        waiter: oneshot::Sender<Result<CommandResponse, Error>>,
        deadline: Instant,
    }

    let mut in_flight: Option<InFlight> = None;
    // Requests that timed out but whose response may still arrive; the
    // next R: lines are theirs and must not match newer requests.
    let mut pending_late: u32 = 0;
    let mut data_lines: Vec<String> = Vec::new();

    loop {
        let deadline = in_flight
            .as_ref()
            .map(|f| f.deadline)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => {
                if let Some(flight) = in_flight.take() {
                    let _ = flight.waiter.send(Err(Error::Cancelled));
                }
                return SessionEnd::Cancelled;
            }
            envelope = request_rx.recv(), if in_flight.is_none() => {
                let Some(envelope) = envelope else {
                    return SessionEnd::Cancelled;
                };
                debug!(command = %envelope.line, "sending command");
                if write_line(&mut conn.writer, &envelope.line).await.is_err() {
                    let _ = envelope.response_tx.send(Err(Error::Disconnected));
                    return SessionEnd::ConnectionLost;
                }
                in_flight = Some(InFlight {
                    waiter: envelope.response_tx,
                    deadline: Instant::now() + inner.options.response_timeout,
                });
            }
            _ = tokio::time::sleep_until(deadline), if in_flight.is_some() => {
                if let Some(flight) = in_flight.take() {
                    let _ = flight
                        .waiter
                        .send(Err(Error::Timeout(inner.options.response_timeout)));
                }
                pending_late += 1;
                warn!("command response timed out, connection kept open");
            }
            read = conn.lines.next_line() => {
                match read {
                    Ok(Some(raw)) => {
                        match classify(raw.trim_end_matches('\r')) {
                            Line::Response(response_line) => {
                                let data = std::mem::take(&mut data_lines);
                                if pending_late > 0 {
                                    pending_late -= 1;
                                    warn!(line = %response_line, "dropping late response");
                                } else if let Some(flight) = in_flight.take() {
                                    let _ = flight
                                        .waiter
                                        .send(CommandResponse::parse(&response_line, data));
                                } else {
                                    warn!(line = %response_line, "discarding response, no command waiting");
                                }
                            }
                            Line::Event(event) => {
                                let _ = inner.event_tx.send(event);
                            }
                            Line::Data(data_line) => data_lines.push(data_line),
                            Line::Ignored => {}
                        }
                    }
                    Ok(None) | Err(_) => {
                        if let Some(flight) = in_flight.take() {
                            let _ = flight.waiter.send(Err(Error::Disconnected));
                        }
                        return SessionEnd::ConnectionLost;
                    }
                }
            }
        }
    }
}

async fn keepalive(client: CommandClient) {
    let cancel = client.inner.cancel.clone();
    let mut interval = tokio::time::interval(client.inner.options.keepalive_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if *client.inner.state_tx.borrow() != ConnectionState::Connected {
                    continue;
                }
                if let Err(err) = client.command("ECHO", &[]).await {
                    debug!(error = %err, "keepalive failed");
                }
            }
        }
    }
}

/// Exponential backoff with deterministic ±20% jitter.
fn backoff_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let base = initial.as_secs_f64() * 2.0_f64.powi(attempt.min(16) as i32);
    let capped = base.min(max.as_secs_f64());
    let jitter = 1.0 + 0.2 * ((attempt as f64 * 7.3).sin());
    Duration::from_secs_f64((capped * jitter).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        let d0 = backoff_delay(0, initial, max);
        let d3 = backoff_delay(3, initial, max);
        assert!(d3 > d0, "expected {d3:?} > {d0:?}");

        // With ±20% jitter the cap can be exceeded by at most 20%.
        let d20 = backoff_delay(20, initial, max);
        assert!(d20 <= Duration::from_secs(72), "got {d20:?}");
        assert!(d20 >= Duration::from_secs(48), "got {d20:?}");
    }

    #[test]
    fn classify_splits_line_kinds() {
        assert!(matches!(classify("R:ECHO"), Line::Response(_)));
        assert!(matches!(classify("EL: 118 Load.GetLevel 50000"), Line::Event(CommandEvent::EnhancedLog { .. })));
        assert!(matches!(classify("1 Kitchen"), Line::Data(_)));

        match classify("S:LOAD 118 75.000") {
            Line::Event(CommandEvent::Status { category, vid, args }) => {
                assert_eq!(category, "LOAD");
                assert_eq!(vid, 118);
                assert_eq!(args, vec!["75.000"]);
            }
            _ => panic!("expected status event"),
        }
    }

    #[test]
    fn malformed_status_is_ignored() {
        assert!(matches!(classify("S:LOAD notanumber"), Line::Ignored));
    }
}
