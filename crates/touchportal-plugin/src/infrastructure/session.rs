//! Socket session with the Touch Portal host.
//!
//! A [`Session`] owns the TCP connection for its whole life.  One task does
//! everything:
//!
//! 1. Connect (bounded by `connect_timeout`) and write the pair message.
//! 2. Emit [`PluginEvent::Connected`] and start the update check, if any.
//! 3. Loop over three sources with `tokio::select!`:
//!    - socket reads, fed through the framer and classifier into the
//!      dispatcher;
//!    - commands queued by [`CommandSender`]s, one `write_all` each;
//!    - the update-check result, dispatched like any other event.
//!
//! Because dispatch only ever happens on this task, callbacks see events in
//! exactly the order the bytes arrived.
//!
//! # Ending a session
//!
//! | Cause                                   | Result                        |
//! |-----------------------------------------|-------------------------------|
//! | `closePlugin` for this plugin           | `Ok(SessionExit::ClosedByHost)` |
//! | [`CommandSender::shutdown`]             | `Ok(SessionExit::Shutdown)`   |
//! | EOF and every `CommandSender` dropped   | `Ok(SessionExit::Detached)`   |
//! | read or write error                     | `Err(SessionError::Transport)` |
//!
//! An EOF on its own does not end the session.  It is logged at WARN, reading
//! stops, and the session stays `Connected` so queued commands still have
//! somewhere to go until the plugin shuts down.  A `CommandSender` captured
//! by a callback counts as a live handle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use touchportal_core::{
    classify, encode_line, CommandError, EventKind, OutboundMessage, PluginEvent, RecordFramer,
};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::application::commands::Outbound;
use crate::application::{CommandSender, Dispatcher, SubscriptionId};
use crate::domain::{ConfigError, LifecycleEvent, PluginConfig, SessionState};
use crate::infrastructure::update_check::{check_for_update, HttpVersionSource, VersionSource};

/// Size of the socket read buffer.
const READ_BUF_SIZE: usize = 4096;

/// Fatal session failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The TCP connect was refused or failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The TCP connect did not finish in time.
    #[error("timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    /// Reading from or writing to the socket failed.
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// The pair message could not be encoded.
    #[error("failed to encode pair message: {0}")]
    Pair(#[source] CommandError),
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The host sent `closePlugin` for this plugin.
    ClosedByHost,
    /// A [`CommandSender`] asked the session to stop.
    Shutdown,
    /// The host closed the stream and nothing can send commands any more.
    Detached,
}

/// Read side of the pipeline: bytes in, dispatched events out.
struct Inbound {
    plugin_id: Arc<str>,
    framer: RecordFramer,
    dispatcher: Dispatcher,
}

impl Inbound {
    /// Frames, classifies and dispatches everything complete in `chunk`.
    ///
    /// Returns `true` once a `closePlugin` for this plugin has been
    /// dispatched; lines after it are left unread.
    fn process_chunk(&mut self, chunk: &[u8]) -> bool {
        for decoded in self.framer.feed(chunk) {
            let record = match decoded {
                Ok(record) => record,
                Err(e) => {
                    warn!("dropping malformed line: {e}");
                    continue;
                }
            };
            trace!(message_type = record.message_type(), "received message");

            let classified = classify(record, &self.plugin_id);
            for event in &classified.events {
                self.dispatcher.emit(event);
            }
            if classified.close_requested {
                return true;
            }
        }
        false
    }
}

/// A plugin's connection to the host.
///
/// Register callbacks and take [`CommandSender`]s first, then call
/// [`Session::run`].
///
/// # Example
///
/// ```rust,no_run
/// use touchportal_core::EventKind;
/// use touchportal_plugin::domain::PluginConfig;
/// use touchportal_plugin::infrastructure::session::Session;
///
/// # async fn demo() -> anyhow::Result<()> {
/// let mut session = Session::new(PluginConfig::new("demo.plugin"))?;
/// let commands = session.commands();
/// session.on(EventKind::Connected, move |_| {
///     let _ = commands.state_update("demo.plugin.status", "ready");
/// });
/// let exit = session.run().await?;
/// println!("session ended: {exit:?}");
/// # Ok(())
/// # }
/// ```
pub struct Session {
    config: PluginConfig,
    inbound: Inbound,
    state: watch::Sender<SessionState>,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    commands: CommandSender,
    version_source: Option<Arc<dyn VersionSource>>,
}

impl Session {
    /// Creates a session for `config`.  Nothing is connected until
    /// [`Session::run`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(config: PluginConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let plugin_id: Arc<str> = Arc::from(config.plugin_id.as_str());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(SessionState::Disconnected);
        let commands = CommandSender::new(Arc::clone(&plugin_id), outbound_tx, state_rx);

        let version_source = config.update_url.as_deref().and_then(|url| {
            match HttpVersionSource::new(url, config.update_timeout) {
                Ok(source) => Some(Arc::new(source) as Arc<dyn VersionSource>),
                Err(e) => {
                    warn!(plugin_id = %plugin_id, "update check disabled: {e}");
                    None
                }
            }
        });

        Ok(Self {
            config,
            inbound: Inbound {
                plugin_id,
                framer: RecordFramer::new(),
                dispatcher: Dispatcher::new(),
            },
            state,
            outbound_rx,
            commands,
            version_source,
        })
    }

    /// Replaces where the update check gets the latest version from.
    pub fn with_version_source(mut self, source: Arc<dyn VersionSource>) -> Self {
        self.version_source = Some(source);
        self
    }

    /// Calls `handler` for every event of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&PluginEvent) + Send + 'static,
    {
        self.inbound.dispatcher.on(kind, handler)
    }

    /// Calls `handler` for every event.
    pub fn on_any<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&PluginEvent) + Send + 'static,
    {
        self.inbound.dispatcher.on_any(handler)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.inbound.dispatcher.off(id)
    }

    /// Returns a channel that receives a clone of every event.
    pub fn events(&mut self) -> mpsc::UnboundedReceiver<PluginEvent> {
        self.inbound.dispatcher.channel()
    }

    /// Returns a handle for sending commands.  Take as many as needed before
    /// calling [`Session::run`].
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Connects to the configured host and drives the session until it ends.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Connect`] / [`SessionError::ConnectTimeout`] if the
    ///   host cannot be reached.
    /// - [`SessionError::Transport`] if the socket fails later.
    pub async fn run(self) -> Result<SessionExit, SessionError> {
        let span = info_span!("plugin", id = %self.config.plugin_id);
        async move {
            advance(&self.state, LifecycleEvent::ConnectRequested);
            let addr = self.config.host_addr;
            info!("connecting to {addr}");

            let stream = match connect(addr, self.config.connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("{e}");
                    advance(&self.state, LifecycleEvent::ConnectFailed);
                    return Err(e);
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!("failed to set TCP_NODELAY: {e}");
            }
            self.drive(stream).await
        }
        .instrument(span)
        .await
    }

    /// Drives the session over an already-connected stream.
    pub async fn run_on<S>(self, stream: S) -> Result<SessionExit, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let span = info_span!("plugin", id = %self.config.plugin_id);
        async move {
            advance(&self.state, LifecycleEvent::ConnectRequested);
            self.drive(stream).await
        }
        .instrument(span)
        .await
    }

    async fn drive<S>(self, stream: S) -> Result<SessionExit, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Session {
            config,
            inbound,
            state,
            outbound_rx,
            commands,
            version_source,
        } = self;
        // Only handles given out to plugin code keep the outbound queue open.
        drop(commands);

        advance(&state, LifecycleEvent::TransportConnected);
        info!("connected to {}", config.host_addr);

        let (update_tx, update_rx) = mpsc::channel(1);
        let mut connection = Connection {
            stream,
            inbound,
            state,
            outbound_rx,
            update_rx,
        };

        if let Err(e) = connection.pair().await {
            error!("{e}");
            advance(&connection.state, LifecycleEvent::TransportError);
            return Err(e);
        }
        connection.inbound.dispatcher.emit(&PluginEvent::Connected);

        let update_task = version_source.map(|source| {
            let current = config.plugin_version.clone();
            tokio::spawn(
                async move {
                    if let Some(event) = check_for_update(source.as_ref(), &current).await {
                        // The session may already be gone.
                        let _ = update_tx.send(event).await;
                    }
                }
                .in_current_span(),
            )
        });

        let result = connection.pump().await;
        abort(update_task);
        result
    }
}

/// A connected session's working state.
struct Connection<S> {
    stream: S,
    inbound: Inbound,
    state: watch::Sender<SessionState>,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    update_rx: mpsc::Receiver<PluginEvent>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn pair(&mut self) -> Result<(), SessionError> {
        let line = encode_line(&OutboundMessage::pair(self.inbound.plugin_id.as_ref()))
            .map_err(SessionError::Pair)?;
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(SessionError::Transport)?;
        debug!("sent pair message");
        Ok(())
    }

    async fn pump(&mut self) -> Result<SessionExit, SessionError> {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut reading = true;
        let mut outbound_open = true;
        let mut update_open = true;

        loop {
            if !reading && !outbound_open {
                info!("host closed the connection and no command handles remain");
                advance(&self.state, LifecycleEvent::ShutdownRequested);
                return Ok(SessionExit::Detached);
            }

            tokio::select! {
                read = self.stream.read(&mut buf), if reading => match read {
                    Ok(0) => {
                        warn!("connection closed by host");
                        let pending = self.inbound.framer.pending_len();
                        if pending > 0 {
                            warn!("discarding {pending} bytes of incomplete line");
                        }
                        advance(&self.state, LifecycleEvent::TransportClosed);
                        reading = false;
                    }
                    Ok(n) => {
                        if self.inbound.process_chunk(&buf[..n]) {
                            warn!("host requested plugin close");
                            self.close_write_half().await;
                            advance(&self.state, LifecycleEvent::CloseRequested);
                            return Ok(SessionExit::ClosedByHost);
                        }
                    }
                    Err(e) => return Err(self.transport_failed(e)),
                },

                item = self.outbound_rx.recv(), if outbound_open => match item {
                    Some(Outbound::Write(payload)) => {
                        if let Err(e) = self.stream.write_all(payload.as_bytes()).await {
                            return Err(self.transport_failed(e));
                        }
                    }
                    Some(Outbound::Shutdown) => {
                        info!("shutdown requested");
                        self.close_write_half().await;
                        advance(&self.state, LifecycleEvent::ShutdownRequested);
                        return Ok(SessionExit::Shutdown);
                    }
                    None => {
                        debug!("all command handles dropped");
                        outbound_open = false;
                    }
                },

                update = self.update_rx.recv(), if update_open => match update {
                    Some(event) => {
                        self.inbound.dispatcher.emit(&event);
                    }
                    None => update_open = false,
                },
            }
        }
    }

    fn transport_failed(&self, e: std::io::Error) -> SessionError {
        error!("transport error: {e}");
        advance(&self.state, LifecycleEvent::TransportError);
        SessionError::Transport(e)
    }

    async fn close_write_half(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("failed to shut down write half: {e}");
        }
    }
}

async fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<TcpStream, SessionError> {
    let attempt = TcpStream::connect(addr);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| SessionError::ConnectTimeout {
                addr,
                timeout: limit,
            })?,
        None => attempt.await,
    };
    result.map_err(|source| SessionError::Connect { addr, source })
}

/// Applies `event` to the published state.  An impossible transition is a
/// bug; it is logged and the state is left as it was.
fn advance(state: &watch::Sender<SessionState>, event: LifecycleEvent) {
    state.send_modify(|current| match current.on(event) {
        Ok(next) => {
            if next != *current {
                debug!("session state {current} -> {next}");
            }
            *current = next;
        }
        Err(e) => warn!("{e}"),
    });
}

fn abort(task: Option<JoinHandle<()>>) {
    if let Some(task) = task {
        task.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
