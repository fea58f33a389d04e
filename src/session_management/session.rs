use std::fmt::Display;
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::sync::watch;
use warp::ws::Message;

use super::SessionState;
use crate::error_handling::types::{ProtocolError, SessionError};
use crate::network::protocol::{Acknowledgment, Instruction};
use crate::network::types::ServerContext;
use crate::storage::types::RequestStatus;

/// What a finished session did, mostly for logging and tests.
#[derive(Debug)]
pub struct SessionOutcome {
    pub address: String,
    /// Acknowledgments accepted and recorded in the ledger.
    pub acknowledged: usize,
    /// Pending requests written to the activity log during the sweep.
    pub swept: usize,
    /// Set when the session ended because of a failure rather than a
    /// disconnect.
    pub error: Option<SessionError>,
}

/// Protocol engine for one client connection.
///
/// The session keeps only transient context: who the client is, the port it
/// connected to, and the id of the single instruction it is waiting on.
/// Everything else is read from and written to the ledger.
pub struct Session {
    ctx: Arc<ServerContext>,
    address: String,
    port: u16,
    outstanding: Option<i64>,
    state: SessionState,
    acknowledged: usize,
    closing: watch::Receiver<bool>,
}

impl Session {
    pub fn new(ctx: Arc<ServerContext>, address: impl Into<String>, port: u16) -> Self {
        let closing = ctx.sessions.subscribe();
        Self {
            ctx,
            address: address.into(),
            port,
            outstanding: None,
            state: SessionState::Opening,
            acknowledged: 0,
            closing,
        }
    }

    /// Runs the session until the connection goes away, then sweeps the
    /// client's unacknowledged requests into the activity log and closes the
    /// outgoing half.
    ///
    /// `incoming` and `outgoing` are the two halves of one WebSocket. A stream
    /// error or the end of the stream is treated as a disconnect, and so is the
    /// server's closing signal while no acknowledgment is being processed.
    pub async fn run<R, W, E>(mut self, mut incoming: R, mut outgoing: W) -> SessionOutcome
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        info!("[{}] session opened (port {})", self.address, self.port);

        let error = match self.drive(&mut incoming, &mut outgoing).await {
            Ok(()) => None,
            Err(SessionError::TransportError(e)) => {
                info!("[{}] connection lost: {}", self.address, e);
                None
            }
            Err(e) => {
                error!("[{}] session failed: {}", self.address, e);
                Some(e)
            }
        };

        self.transition(SessionState::Closing);
        let swept = self.sweep().await;
        if let Err(e) = outgoing.close().await {
            debug!("[{}] error while closing connection: {}", self.address, e);
        }
        self.transition(SessionState::Closed);

        info!(
            "[{}] session closed: {} acknowledged, {} abandoned",
            self.address, self.acknowledged, swept
        );
        SessionOutcome {
            address: self.address,
            acknowledged: self.acknowledged,
            swept,
            error,
        }
    }

    async fn drive<R, W, E>(&mut self, incoming: &mut R, outgoing: &mut W) -> Result<(), SessionError>
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        self.ctx.ledger.register_client(&self.address).await?;
        let first = self.prepare_instruction().await?;
        self.send(outgoing, &first).await?;
        self.transition(SessionState::AwaitingAck);

        loop {
            if *self.closing.borrow_and_update() {
                info!("[{}] server closing, ending session", self.address);
                return Ok(());
            }
            let frame = tokio::select! {
                frame = incoming.next() => frame,
                _ = self.closing.changed() => continue,
            };
            let Some(frame) = frame else {
                return Ok(());
            };
            let message = match frame {
                Ok(message) => message,
                Err(e) => {
                    info!("[{}] connection error: {}", self.address, e);
                    return Ok(());
                }
            };
            if message.is_close() {
                debug!("[{}] close frame received", self.address);
                return Ok(());
            }
            if message.is_ping() || message.is_pong() {
                trace!("[{}] control frame ignored", self.address);
                continue;
            }

            match self.read_acknowledgment(&message) {
                Ok((request_id, status)) => self.acknowledge(request_id, status, outgoing).await?,
                Err(e) => warn!("[{}] discarding frame: {}", self.address, e),
            }
        }
    }

    fn read_acknowledgment(&self, message: &Message) -> Result<(i64, RequestStatus), ProtocolError> {
        let text = message.to_str().map_err(|_| ProtocolError::NonText)?;
        let (request_id, status) = Acknowledgment::parse(text)?;
        if self.outstanding != Some(request_id) {
            return Err(ProtocolError::UnexpectedRequest {
                expected: self.outstanding,
                received: request_id,
            });
        }
        Ok((request_id, status))
    }

    async fn acknowledge<W>(
        &mut self,
        request_id: i64,
        status: RequestStatus,
        outgoing: &mut W,
    ) -> Result<(), SessionError>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        if !self.ctx.ledger.set_request_status(request_id, status).await? {
            warn!(
                "[{}] request {} was already finalized, status {} not stored",
                self.address, request_id, status
            );
        }
        self.outstanding = None;
        self.acknowledged += 1;
        debug!("[{}] request {} acknowledged: {}", self.address, request_id, status);

        if let Some(summary) = self.ctx.ledger.describe_request(request_id).await? {
            self.ctx.activity_log.append(summary);
        }

        let next = self.prepare_instruction().await?;
        tokio::time::sleep(self.ctx.ack_delay).await;
        self.send(outgoing, &next).await
    }

    /// Draws a gesture and records it as a pending request.
    async fn prepare_instruction(&mut self) -> Result<Instruction, SessionError> {
        let gesture = self.ctx.generator.generate();
        let request_id = self
            .ctx
            .ledger
            .create_request(&self.address, self.port, gesture.direction, gesture.distance)
            .await?;
        self.outstanding = Some(request_id);
        Ok(Instruction::new(request_id, gesture))
    }

    async fn send<W>(&self, outgoing: &mut W, instruction: &Instruction) -> Result<(), SessionError>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        trace!("[{}] sending instruction {:?}", self.address, instruction);
        outgoing
            .send(Message::text(instruction.to_json()))
            .await
            .map_err(|e| SessionError::TransportError(e.to_string()))
    }

    // Abandoned requests are only reported; their stored status stays empty.
    async fn sweep(&self) -> usize {
        match self.ctx.ledger.pending_requests_for(&self.address).await {
            Ok(pending) => {
                let count = pending.len();
                for summary in pending {
                    self.ctx.activity_log.append(summary);
                }
                count
            }
            Err(e) => {
                error!("[{}] unable to sweep pending requests: {}", self.address, e);
                0
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        trace!("[{}] {:?} -> {:?}", self.address, self.state, next);
        self.state = next;
    }
}
