// JDWP connection management
//
// Server side of one debugger connection: handshake, packet framing and
// outgoing reply/event writes over any async byte stream.

use crate::events::EventSet;
use crate::protocol::*;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct JdwpConnection<S> {
    stream: S,
    max_packet_size: usize,
    next_id: u32,
}

impl<S> JdwpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, max_packet_size: usize) -> Self {
        Self {
            stream,
            max_packet_size,
            next_id: 1,
        }
    }

    /// Wait for the debugger's handshake and echo it back.
    ///
    /// Nothing is written unless the exact handshake string arrived.
    pub async fn accept_handshake(&mut self) -> JdwpResult<()> {
        debug!("Waiting for JDWP handshake");

        // Compare as bytes arrive so a wrong prefix is refused at once
        let mut buf = [0u8; 32];
        let mut received = 0;
        while received < JDWP_HANDSHAKE.len() {
            let want = JDWP_HANDSHAKE.len() - received;
            let n = self.stream.read(&mut buf[..want]).await?;
            if n == 0 {
                warn!("Connection closed during handshake");
                return Err(JdwpError::ConnectionClosed);
            }
            if buf[..n] != JDWP_HANDSHAKE[received..received + n] {
                warn!(
                    "Invalid handshake: {:?}",
                    String::from_utf8_lossy(&buf[..n])
                );
                return Err(JdwpError::InvalidHandshake);
            }
            received += n;
        }

        self.stream.write_all(JDWP_HANDSHAKE).await?;
        self.stream.flush().await?;

        info!("JDWP handshake successful");
        Ok(())
    }

    /// Read the next command packet, or `None` on a clean EOF between packets
    pub async fn read_command(&mut self) -> JdwpResult<Option<CommandPacket>> {
        loop {
            let mut header = [0u8; HEADER_SIZE];

            // EOF before the first byte is an orderly disconnect
            if self.stream.read(&mut header[..1]).await? == 0 {
                return Ok(None);
            }
            self.stream.read_exact(&mut header[1..]).await?;

            let parsed = PacketHeader::parse(&header);
            parsed.validate(self.max_packet_size)?;

            let mut full_packet = BytesMut::with_capacity(parsed.length);
            full_packet.extend_from_slice(&header);
            full_packet.resize(parsed.length, 0);
            self.stream.read_exact(&mut full_packet[HEADER_SIZE..]).await?;

            if parsed.is_reply() {
                // Debuggers never owe us a reply; drop it and keep reading
                warn!("Ignoring unsolicited reply packet id={}", parsed.id);
                continue;
            }

            return CommandPacket::decode(&full_packet).map(Some);
        }
    }

    pub async fn send_reply(&mut self, reply: &ReplyPacket) -> JdwpResult<()> {
        debug!(
            "Sending reply id={} error={} ({} bytes)",
            reply.id,
            reply.error_code,
            reply.data.len()
        );
        self.stream.write_all(&reply.encode()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send an event set as a server-originated command packet
    pub async fn send_event(&mut self, events: &EventSet) -> JdwpResult<()> {
        let id = self.next_id();
        debug!("Sending event set id={} ({} events)", id, events.events.len());
        self.stream.write_all(&events.to_packet(id).encode()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> JdwpResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Generate next packet ID for server-originated packets
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}
