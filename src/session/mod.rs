// MIT License
// Rust translation of lib/radiora2.js

//! The controller session: one long-lived telnet connection, the login
//! exchange, the serialized command queue, and the inbound event pipeline.
//!
//! All protocol state (machine, parser, pending queries) lives in a single
//! spawned task that owns the socket; the [`Session`] handle talks to it
//! over an mpsc channel, so no protocol logic ever runs concurrently.

mod machine;

pub use machine::{Effects, Phase, SessionMachine};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::WriteHalf;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Duration, Instant, interval, sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{BridgeError, Result};
use crate::event::{BridgeEvent, EventReceiver, EventSender, event_channel};
use crate::parser::ResponseParser;
use crate::protocol::Command;

/// How often expired pending queries are swept out of the table.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Requests from the handle to the session task.
enum Request {
    /// Submit a command line (terminator added if absent).
    Send(String),
    /// Query an output level and correlate the `~OUTPUT` reply.
    QueryOutput { id: u32, reply: oneshot::Sender<u8> },
}

/// A registered one-shot correlation, keyed by integration ID and the
/// expected reply kind (only output-level replies are correlated). The
/// first matching reply fires it; the deadline sweep fails it.
struct PendingQuery {
    id: u32,
    deadline: Instant,
    reply: oneshot::Sender<u8>,
}

/// Handle to a running controller session.
///
/// # Example
///
/// ```no_run
/// use radiora2_bridge::{Session, SessionConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = SessionConfig::builder()
///         .host("192.168.1.50")
///         .username("lutron")
///         .password("integration")
///         .build();
///
///     let session = Session::connect(config);
///
///     let mut events = session.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     session.set_dimmer(12, 75, None, None)?;
///     let level = session.query_output(12).await?;
///     println!("Output 12 is at {level}");
///
///     tokio::signal::ctrl_c().await?;
///     session.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct Session {
    request_tx: mpsc::UnboundedSender<Request>,
    event_tx: EventSender,
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
    query_timeout: Duration,
}

impl Session {
    /// Start a session. The connection (and every reconnection) is driven
    /// by a background task; progress is reported through the event
    /// channel, with `LoggedIn` marking the session usable. Credentials are
    /// stored and reused verbatim on every automatic reconnect.
    pub fn connect(config: SessionConfig) -> Self {
        let (event_tx, _event_rx) = event_channel(config.event_capacity);
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let query_timeout = Duration::from_millis(config.query_timeout_ms);

        let task_events = event_tx.clone();
        let task = tokio::spawn(async move {
            run_session(config, request_rx, task_events, shutdown_rx).await;
        });

        Self {
            request_tx,
            event_tx,
            shutdown_tx,
            task: Some(task),
            query_timeout,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Submit a raw command line. FIFO-queued until the controller's ready
    /// banner acknowledges the previous command.
    pub fn send_command(&self, command: impl Into<String>) -> Result<()> {
        self.request(Request::Send(command.into()))
    }

    /// Submit a typed command.
    pub fn send(&self, command: &Command) -> Result<()> {
        self.send_command(command.to_wire_string())
    }

    /// Set an output's level, optionally with fade and delay seconds.
    pub fn set_dimmer(
        &self,
        id: u32,
        level: u8,
        fade: Option<u32>,
        delay: Option<u32>,
    ) -> Result<()> {
        self.send(&Command::SetOutputLevel {
            id,
            level,
            fade,
            delay,
        })
    }

    /// Set a dimmer only if the controller reports it at level 0; a dimmer
    /// already at a non-zero level is left alone. Queries the current level
    /// first and decides on the correlated reply, so it fails with
    /// [`BridgeError::QueryTimeout`] if the controller does not answer.
    pub async fn set_dimmer_on(
        &self,
        id: u32,
        level: u8,
        fade: Option<u32>,
        delay: Option<u32>,
    ) -> Result<()> {
        if self.query_output(id).await? == 0 {
            self.set_dimmer(id, level, fade, delay)?;
        }
        Ok(())
    }

    /// Switch an output fully on or off.
    pub fn set_switch(&self, id: u32, on: bool) -> Result<()> {
        self.set_dimmer(id, if on { 100 } else { 0 }, None, None)
    }

    /// Tap a keypad/remote button: press (action 3) then release (action 4).
    pub fn press_button(&self, id: u32, button: u32) -> Result<()> {
        self.send(&Command::PressButton { id, button })?;
        self.send(&Command::ReleaseButton { id, button })
    }

    /// Ask the controller to report a keypad button's LED state. The answer
    /// arrives as a `KeypadLedOn`/`KeypadLedOff` event.
    pub fn query_button_state(&self, id: u32, button: u32) -> Result<()> {
        self.send(&Command::QueryButtonLed { id, button })
    }

    /// Ask the controller to report an occupancy group's state. The answer
    /// arrives as a `Group*` event.
    pub fn query_group_state(&self, id: u32) -> Result<()> {
        self.send(&Command::QueryGroupState { id })
    }

    /// Ask the controller to report an output's level without waiting for
    /// the reply; the answer arrives as events.
    pub fn query_output_state(&self, id: u32) -> Result<()> {
        self.send(&Command::QueryOutputLevel { id })
    }

    /// Query an output's level and wait for the correlated `~OUTPUT` reply.
    ///
    /// Fails with [`BridgeError::QueryTimeout`] if the controller does not
    /// answer within the configured query timeout.
    pub async fn query_output(&self, id: u32) -> Result<u8> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(Request::QueryOutput {
            id,
            reply: reply_tx,
        })?;

        let command = Command::QueryOutputLevel { id }.to_wire_string();
        match timeout(self.query_timeout, reply_rx).await {
            Ok(Ok(level)) => Ok(level),
            Ok(Err(_)) => Err(BridgeError::ChannelClosed),
            Err(_) => Err(BridgeError::QueryTimeout { command }),
        }
    }

    /// Stop the session: cancels any scheduled reconnect, closes the
    /// connection, and waits for the background task to exit.
    pub async fn disconnect(mut self) {
        info!("Disconnecting session");
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            warn!("Session task ended abnormally: {e}");
        }
    }

    fn request(&self, request: Request) -> Result<()> {
        self.request_tx
            .send(request)
            .map_err(|_| BridgeError::SessionClosed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The session task: connect, drive one connection to completion, then
/// reconnect after a fixed delay, forever, until shutdown is signalled.
async fn run_session(
    config: SessionConfig,
    mut request_rx: mpsc::UnboundedReceiver<Request>,
    event_tx: EventSender,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut machine = SessionMachine::new(&config.username, &config.password);
    let mut parser = ResponseParser::new();
    let mut pending: Vec<PendingQuery> = Vec::new();
    let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);
    let query_timeout = Duration::from_millis(config.query_timeout_ms);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        info!("Connecting to controller at {}:{}", config.host, config.port);
        match TcpStream::connect((config.host.as_str(), config.port)).await {
            Ok(stream) => {
                machine.on_connect();
                let reason = drive_connection(
                    stream,
                    &mut machine,
                    &mut parser,
                    &mut pending,
                    query_timeout,
                    &event_tx,
                    &mut request_rx,
                    &mut shutdown_rx,
                )
                .await;
                machine.on_close();
                parser.drop_partial();
                info!("Connection closed: {reason}");
                let _ = event_tx.send(BridgeEvent::Closed("Connection closed!".to_string()));
            }
            Err(e) => {
                warn!("Connect to {}:{} failed: {e}", config.host, config.port);
                let _ = event_tx.send(BridgeEvent::Error(format!("Connect failed: {e}")));
            }
        }

        if *shutdown_rx.borrow() {
            break;
        }

        // Fixed-delay reconnect: no backoff, no retry cap. Repeated
        // authentication failures will retry at this same interval.
        tokio::select! {
            _ = sleep(reconnect_delay) => {
                let _ = event_tx.send(BridgeEvent::Info("Attempting reconnection...".to_string()));
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Session task exiting");
}

/// Drive one established connection until it closes. Returns a short
/// human-readable close reason.
#[allow(clippy::too_many_arguments)]
async fn drive_connection(
    mut stream: TcpStream,
    machine: &mut SessionMachine,
    parser: &mut ResponseParser,
    pending: &mut Vec<PendingQuery>,
    query_timeout: Duration,
    event_tx: &EventSender,
    request_rx: &mut mpsc::UnboundedReceiver<Request>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> String {
    let (mut reader, mut writer) = stream.split();
    let mut buf = vec![0u8; 4096];
    let mut sweep = interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => return "remote end closed".to_string(),
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                        let _ = event_tx.send(BridgeEvent::MessageReceived(text.clone()));

                        let effects = machine.handle_chunk(&text);
                        let close = effects.close;
                        if let Err(e) = apply_effects(effects, &mut writer, parser, pending, event_tx).await {
                            return format!("write failed: {e}");
                        }
                        if close {
                            return "authentication failed".to_string();
                        }
                    }
                    Err(e) => return format!("read failed: {e}"),
                }
            }

            request = request_rx.recv() => {
                let Some(request) = request else {
                    // Every handle is gone; nothing can ever reach us again.
                    return "session handle dropped".to_string();
                };
                let effects = match request {
                    Request::Send(command) => machine.send_command(&command),
                    Request::QueryOutput { id, reply } => {
                        pending.push(PendingQuery {
                            id,
                            deadline: Instant::now() + query_timeout,
                            reply,
                        });
                        let cmd = Command::QueryOutputLevel { id };
                        machine.send_command(&cmd.to_wire_string())
                    }
                };
                if let Err(e) = apply_effects(effects, &mut writer, parser, pending, event_tx).await {
                    return format!("write failed: {e}");
                }
            }

            _ = sweep.tick() => {
                let now = Instant::now();
                let before = pending.len();
                pending.retain(|p| p.deadline > now);
                if pending.len() < before {
                    debug!("Dropped {} timed-out pending queries", before - pending.len());
                }
            }

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return "disconnect requested".to_string();
                }
            }
        }
    }
}

/// Perform the writes and event broadcasts a machine transition asked for,
/// routing post-login payloads through the response parser.
async fn apply_effects(
    effects: machine::Effects,
    writer: &mut WriteHalf<'_>,
    parser: &mut ResponseParser,
    pending: &mut Vec<PendingQuery>,
    event_tx: &EventSender,
) -> std::io::Result<()> {
    for line in &effects.writes {
        writer.write_all(line.as_bytes()).await?;
    }
    for event in effects.events {
        let _ = event_tx.send(event);
    }
    if let Some(text) = effects.parse {
        let _ = event_tx.send(BridgeEvent::Debug(format!("Raw Data: {text}")));
        for event in parser.handle_chunk(&text) {
            if let BridgeEvent::OutputStatus { id, level } = event {
                resolve_pending(pending, id, level);
            }
            let _ = event_tx.send(event);
        }
    }
    Ok(())
}

/// Fire and remove every pending query matching this output report. The
/// receiver may have timed out and gone away; either way the entry is
/// consumed.
fn resolve_pending(pending: &mut Vec<PendingQuery>, id: u32, level: u8) {
    let mut kept = Vec::with_capacity(pending.len());
    for entry in pending.drain(..) {
        if entry.id == id {
            let _ = entry.reply.send(level);
        } else {
            kept.push(entry);
        }
    }
    *pending = kept;
}
