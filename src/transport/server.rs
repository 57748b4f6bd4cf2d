//! # TCP Listener
//!
//! Accepts connections and runs one [`Session`] task per connection.
//!
//! Sessions are tracked in a `JoinSet` so the listener can enforce the
//! connection limit and shut down in order: stop accepting, wait up to the
//! configured timeout for open sessions, then abort the rest. A failing
//! session never affects the listener or its siblings.
//!
//! Transient `accept` errors (aborted handshakes, descriptor exhaustion) are
//! retried after a backoff pause that never blocks shutdown; anything else
//! means the listening socket is broken and is returned to the caller.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::config::ServerSettings;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::HandlerRegistry;
use crate::transport::session::{Session, SessionLimits};
use crate::utils::metrics::global_metrics;

/// First delay after a transient accept failure.
const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(10);

/// Upper bound for the accept backoff.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Source of incoming connections.
pub trait Acceptor {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = TcpListener::accept(&*self).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }
        Ok((stream, peer))
    }
}

/// Bound TCP listener plus everything a session needs.
pub struct Server {
    listener: TcpListener,
    settings: Arc<ServerSettings>,
    registry: Arc<HandlerRegistry>,
}

impl Server {
    /// Bind the configured host and port.
    #[instrument(skip_all, fields(address = %settings.server.bind_address()))]
    pub async fn bind(settings: ServerSettings, registry: HandlerRegistry) -> Result<Self> {
        let listener = TcpListener::bind(settings.server.bind_address()).await?;
        info!(address = %listener.local_addr()?, "Listening");

        Ok(Self {
            listener,
            settings: Arc::new(settings),
            registry: Arc::new(registry),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until CTRL+C.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
            }
        })
        .await
    }

    /// Serve until a message arrives on `shutdown_rx` or every sender is dropped.
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        self.run_until(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
    }

    /// Serve until `shutdown` completes, then drain open sessions.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        serve(&mut self.listener, &self.settings, &self.registry, shutdown).await
    }
}

/// Accept loop shared by every [`Acceptor`].
///
/// Transient accept errors pause accepting for an exponentially growing
/// delay; shutdown and session reaping keep running during the pause.
pub async fn serve<A, F>(
    acceptor: &mut A,
    settings: &ServerSettings,
    registry: &Arc<HandlerRegistry>,
    shutdown: F,
) -> Result<()>
where
    A: Acceptor,
    F: Future<Output = ()>,
{
    let limits = SessionLimits::from(settings);
    let max_connections = settings.server.max_connections;
    let shutdown_timeout = settings.server.shutdown_timeout;

    let mut sessions = JoinSet::new();
    let mut next_id: u64 = 0;
    let mut backoff = ACCEPT_BACKOFF_INITIAL;
    let retry = tokio::time::sleep(Duration::ZERO);
    let mut paused = false;
    tokio::pin!(shutdown, retry);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down server. Waiting for sessions to close...");
                break Ok(());
            }

            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                log_join(joined);
            }

            () = &mut retry, if paused => {
                paused = false;
            }

            accepted = acceptor.accept(), if !paused => {
                match accepted {
                    Ok((stream, peer)) => {
                        backoff = ACCEPT_BACKOFF_INITIAL;

                        while let Some(joined) = sessions.try_join_next() {
                            log_join(joined);
                        }
                        if sessions.len() >= max_connections {
                            warn!(
                                peer = %peer,
                                active = sessions.len(),
                                max = max_connections,
                                "Connection rejected: limit reached"
                            );
                            global_metrics().connection_rejected();
                            continue;
                        }

                        let id = next_id;
                        next_id += 1;
                        let session = Session::new(stream, Arc::clone(registry), limits);
                        let guard = ActiveSession::open();

                        sessions.spawn(
                            async move {
                                let _guard = guard;
                                debug!("Session opened");
                                report(session.run().await);
                            }
                            .instrument(info_span!("session", sid = id, peer = %peer)),
                        );
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        warn!(error = %e, retry_in = ?backoff, "Transient accept failure");
                        retry.as_mut().reset(Instant::now() + backoff);
                        paused = true;
                        backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                    }
                    Err(e) => {
                        error!(error = %e, "Listening socket failed");
                        break Err(ProtocolError::Io(e));
                    }
                }
            }
        }
    };

    drain(&mut sessions, shutdown_timeout).await;
    outcome
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Session task failed");
    }
}

/// Keeps the active-connection gauge accurate even if a session is aborted.
struct ActiveSession;

impl ActiveSession {
    fn open() -> Self {
        global_metrics().connection_established();
        Self
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        global_metrics().connection_closed();
    }
}

fn report(outcome: Result<()>) {
    match outcome {
        Ok(()) => debug!("Client disconnected"),
        Err(e) if e.is_clean_disconnect() => {
            debug!(error = %e, "Client disconnected mid-frame");
        }
        Err(e) => {
            global_metrics().session_error(&e);
            warn!(error = %e, kind = %e.category(), "Session terminated");
        }
    }
}

async fn drain(sessions: &mut JoinSet<()>, timeout: Duration) {
    if sessions.is_empty() {
        return;
    }
    info!(sessions = sessions.len(), "Waiting for sessions to close");

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                warn!(sessions = sessions.len(), "Shutdown timeout reached, aborting sessions");
                sessions.abort_all();
                break;
            }
            joined = sessions.join_next() => {
                if joined.is_none() {
                    break;
                }
            }
        }
    }

    while sessions.join_next().await.is_some() {}
    info!("All sessions closed");
}

/// Accept errors that do not indicate a broken listening socket.
pub fn is_transient_accept_error(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut => true,
        // ENOMEM, ENFILE, EMFILE
        _ => matches!(e.raw_os_error(), Some(12 | 23 | 24)),
    }
}
