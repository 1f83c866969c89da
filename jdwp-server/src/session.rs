// Protocol session
//
// One debugger connection from handshake to close:
// AwaitingHandshake -> Active -> Closing -> Closed. The session owns its
// snapshot handle and releases it on the way out, whatever ended the
// connection.

use crate::adapter::select_adapter;
use crate::config::ServerConfig;
use crate::connection::JdwpConnection;
use crate::dispatcher::{Dispatcher, Disposition};
use crate::model::DebugModel;
use crate::protocol::{JdwpError, JdwpResult};
use crate::provider::SnapshotHandle;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Active,
    Closing,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// VirtualMachine.Dispose
    Disposed,
    /// VirtualMachine.Exit with the requested exit code
    Exited(i32),
    /// Orderly EOF between packets
    Disconnected,
    HandshakeFailed,
    ProtocolError(String),
    Io(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Disposed => write!(f, "disposed by debugger"),
            CloseReason::Exited(code) => write!(f, "exit requested with code {}", code),
            CloseReason::Disconnected => write!(f, "debugger disconnected"),
            CloseReason::HandshakeFailed => write!(f, "handshake failed"),
            CloseReason::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
            CloseReason::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

/// A running session
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    task: JoinHandle<CloseReason>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session is closed
    pub async fn join(self) -> CloseReason {
        match self.task.await {
            Ok(reason) => reason,
            Err(e) => {
                error!("Session task failed: {}", e);
                CloseReason::Io(format!("session task failed: {}", e))
            }
        }
    }
}

/// A session whose adapter and model are ready, waiting for a transport
pub struct Session {
    snapshot: Arc<dyn SnapshotHandle>,
    dispatcher: Dispatcher,
    max_packet_size: usize,
}

impl Session {
    /// Select the adapter and build the model; no bytes are exchanged yet
    pub fn prepare(snapshot: Arc<dyn SnapshotHandle>, config: &ServerConfig) -> JdwpResult<Self> {
        let adapter = select_adapter(snapshot.clone(), config.jvm_version.as_deref())?;
        let model = DebugModel::new(adapter)?;
        Ok(Self {
            snapshot,
            dispatcher: Dispatcher::new(Arc::new(model)),
            max_packet_size: config.max_packet_size,
        })
    }

    pub fn start<S>(
        stream: S,
        snapshot: Arc<dyn SnapshotHandle>,
        config: &ServerConfig,
    ) -> JdwpResult<SessionHandle>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Ok(Self::prepare(snapshot, config)?.spawn(stream))
    }

    /// Run the session on `stream` in its own task
    pub fn spawn<S>(self, stream: S) -> SessionHandle
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(SessionState::AwaitingHandshake);
        let task = tokio::spawn(self.run(stream, state_tx));
        SessionHandle {
            state: state_rx,
            task,
        }
    }

    async fn run<S>(self, stream: S, state: watch::Sender<SessionState>) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut conn = JdwpConnection::new(stream, self.max_packet_size);
        let reason = serve(&mut conn, &self.dispatcher, &state).await;

        state.send_replace(SessionState::Closing);
        info!("Closing session: {}", reason);
        if let Err(e) = conn.shutdown().await {
            debug!("Transport shutdown failed: {}", e);
        }

        let Session {
            snapshot, dispatcher, ..
        } = self;
        drop(dispatcher);
        snapshot.detach();

        state.send_replace(SessionState::Closed);
        reason
    }
}

async fn serve<S>(
    conn: &mut JdwpConnection<S>,
    dispatcher: &Dispatcher,
    state: &watch::Sender<SessionState>,
) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = conn.accept_handshake().await {
        warn!("Rejecting debugger: {}", e);
        return CloseReason::HandshakeFailed;
    }
    state.send_replace(SessionState::Active);

    // Nothing may precede the start event
    if let Err(e) = conn.send_event(&dispatcher.vm_start_event()).await {
        error!("Failed to send VM start event: {}", e);
        return CloseReason::Io(e.to_string());
    }

    loop {
        let packet = match conn.read_command().await {
            Ok(Some(packet)) => packet,
            Ok(None) => return CloseReason::Disconnected,
            Err(JdwpError::Io(e)) if e.kind() != std::io::ErrorKind::UnexpectedEof => {
                error!("Transport error: {}", e);
                return CloseReason::Io(e.to_string());
            }
            Err(e) => {
                error!("Unrecoverable framing error: {}", e);
                return CloseReason::ProtocolError(e.to_string());
            }
        };

        let (reply, disposition) = dispatcher.dispatch(&packet);
        if let Err(e) = conn.send_reply(&reply).await {
            error!("Failed to send reply id={}: {}", reply.id, e);
            return CloseReason::Io(e.to_string());
        }
        if let Disposition::Close(reason) = disposition {
            return reason;
        }
    }
}
