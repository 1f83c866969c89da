// TCP listener
//
// Accepts exactly one debugger and stops listening once it is connected.

use crate::config::ServerConfig;
use crate::protocol::JdwpResult;
use crate::provider::SnapshotHandle;
use crate::session::{CloseReason, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    pub async fn bind(addr: &str) -> JdwpResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> JdwpResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve one debugger over `snapshot` until its session closes.
    ///
    /// The adapter is selected before accepting, so an unsupported snapshot
    /// fails without a connection ever being made.
    pub async fn serve_one(
        self,
        snapshot: Arc<dyn SnapshotHandle>,
        config: &ServerConfig,
    ) -> JdwpResult<CloseReason> {
        let session = Session::prepare(snapshot, config)?;

        info!("Waiting for debugger on: {}", self.local_addr()?);
        let (stream, peer) = self.listener.accept().await?;
        drop(self.listener);
        info!("Debugger connected from {}", peer);
        stream.set_nodelay(true)?;

        let reason = session.spawn(stream).join().await;
        info!("Session closed: {}", reason);
        Ok(reason)
    }
}
