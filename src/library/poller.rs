use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use crate::config::ConfigError;
use crate::config::LibraryConfig;
use crate::error::Fatal;
use crate::error::ReplyError;
use crate::transport::Action;
use crate::transport::FragmentHandler;
use crate::transport::FragmentMeta;
use crate::transport::Publication;
use crate::transport::Subscription;
use crate::types::CorrelationId;
use crate::types::LibraryId;
use crate::types::Position;

use super::message::gateway_error;
use super::message::LibraryMessage;
use super::message::LogonStatus;
use super::message::SessionReplyStatus;
use super::message::GATEWAY_LIBRARY_ID;
use super::reply::Pending;
use super::reply::PendingRequest;
use super::reply::ReplyHandle;

/// Connects a library to one engine channel at a time.
pub trait LibraryTransport {
    fn connect(&mut self, channel: &str) -> Result<LibraryStreams, Fatal>;
}

/// The stream pair a library holds towards its current engine.
pub struct LibraryStreams {
    pub inbound: Box<dyn Subscription>,
    pub outbound: Box<dyn Publication>,
}

/// Library-side notifications that are not replies.
///
/// All methods default to no-ops.
pub trait LibraryHandler {
    fn on_session_exists(&mut self, session_id: i64, sender_comp_id: &str, target_comp_id: &str) {
        let _ = (session_id, sender_comp_id, target_comp_id);
    }

    fn on_sent_position(&mut self, position: Position) {
        let _ = position;
    }

    fn on_catchup(&mut self, connection_id: i64, message_count: i32) {
        let _ = (connection_id, message_count);
    }

    fn on_disconnect(&mut self, connection_id: i64, reason: i32) {
        let _ = (connection_id, reason);
    }
}

/// The no-op handler.
impl LibraryHandler for () {}

/// A session the engine handed to this library.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub struct InitiatedSession {
    pub connection_id: i64,
    pub session_id: i64,
}

/// Parameters of an outbound FIX connection to initiate.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub struct InitiateConfiguration {
    pub host: String,
    pub port: i32,
    pub sender_comp_id: String,
    pub target_comp_id: String,
}

/// Construction failure of a [`LibraryPoller`].
#[derive(Debug, thiserror::Error)]
pub enum LibraryStartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fatal(#[from] Fatal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectState {
    /// Waiting for the first heartbeat from the current engine.
    Connecting {
        deadline_ms: u64,
        next_resend_ms: u64,
    },
    /// Heartbeats observed recently.
    Connected { liveness_deadline_ms: u64 },
    /// Every channel rotation was exhausted.
    Failed,
}

/// The non-blocking library side of the gateway.
///
/// Detects the current leader among the configured engine channels, fails
/// over on `NotLeader` redirects and on reply-timeout silence, and correlates
/// request/reply pairs. Drive it with [`poll`](Self::poll); nothing blocks.
pub struct LibraryPoller {
    config: LibraryConfig,
    transport: Box<dyn LibraryTransport>,
    handler: Box<dyn LibraryHandler>,
    inbound: Box<dyn Subscription>,
    outbound: Box<dyn Publication>,
    current_channel: String,
    state: ConnectState,
    attempts_left: u32,
    connect_error: Option<ReplyError>,
    correlation_id_to_reply: HashMap<CorrelationId, Pending>,
    /// Seeded from a random non-zero value to reduce the chance of collision
    /// across library restarts.
    current_correlation_id: CorrelationId,
    unique_value: i32,
    next_heartbeat_ms: u64,
    inbox: Vec<LibraryMessage>,
    encode_scratch: Vec<u8>,
}

impl LibraryPoller {
    pub fn new(
        config: LibraryConfig,
        transport: Box<dyn LibraryTransport>,
        handler: Box<dyn LibraryHandler>,
        now_ms: u64,
    ) -> Result<Self, LibraryStartError> {
        let config = config.validate()?;

        let mut rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let current_correlation_id = rng.random_range(1..CorrelationId::MAX);
        let unique_value = rng.random();

        let current_channel = config.engine_channels[0].clone();
        let attempts_left = config.reconnect_attempts;

        let mut transport = transport;
        let streams = transport.connect(&current_channel)?;

        let mut poller = Self {
            config,
            transport,
            handler,
            inbound: streams.inbound,
            outbound: streams.outbound,
            current_channel,
            state: ConnectState::Failed,
            attempts_left,
            connect_error: None,
            correlation_id_to_reply: HashMap::new(),
            current_correlation_id,
            unique_value,
            next_heartbeat_ms: 0,
            inbox: Vec::new(),
            encode_scratch: Vec::new(),
        };
        poller.begin_connect(now_ms);
        Ok(poller)
    }

    pub fn library_id(&self) -> LibraryId {
        self.config.library_id
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectState::Connected { .. })
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.state, ConnectState::Failed)
    }

    /// Why the last connect gave up, once [`has_failed`](Self::has_failed).
    pub fn connect_error(&self) -> Option<&ReplyError> {
        self.connect_error.as_ref()
    }

    pub fn current_channel(&self) -> &str {
        &self.current_channel
    }

    /// Drive the library once: drain inbound frames, run the connect and
    /// liveness machinery, expire and resend pending replies.
    pub fn poll(&mut self, fragment_limit: usize, now_ms: u64) -> Result<usize, Fatal> {
        let mut work = 0;

        let mut collector = InboundCollector {
            inbox: &mut self.inbox,
        };
        work += self.inbound.poll(&mut collector, fragment_limit);

        let mut inbox = std::mem::take(&mut self.inbox);
        for message in inbox.drain(..) {
            self.on_message(message, now_ms);
        }
        self.inbox = inbox;

        self.drive_connection(now_ms)?;
        work += self.check_replies(now_ms);

        Ok(work)
    }

    /// Ask the engine to open an outbound FIX connection.
    pub fn initiate(
        &mut self,
        session: InitiateConfiguration,
        now_ms: u64,
    ) -> ReplyHandle<InitiatedSession> {
        let correlation_id = self.next_correlation_id();
        let message = LibraryMessage::InitiateConnection {
            library_id: self.config.library_id,
            correlation_id,
            port: session.port,
            host: session.host,
            sender_comp_id: session.sender_comp_id,
            target_comp_id: session.target_comp_id,
        };
        self.register(correlation_id, message, now_ms, Pending::Initiate)
    }

    /// Hand a session this library owns back to the engine.
    pub fn release_to_gateway(
        &mut self,
        connection_id: i64,
        now_ms: u64,
    ) -> ReplyHandle<SessionReplyStatus> {
        let correlation_id = self.next_correlation_id();
        let message = LibraryMessage::ReleaseSession {
            library_id: self.config.library_id,
            correlation_id,
            connection_id,
        };
        self.register(correlation_id, message, now_ms, Pending::Release)
    }

    /// Ask the engine for ownership of an existing session.
    pub fn request_session(
        &mut self,
        session_id: i64,
        last_received_sequence_number: i32,
        now_ms: u64,
    ) -> ReplyHandle<SessionReplyStatus> {
        let correlation_id = self.next_correlation_id();
        let message = LibraryMessage::RequestSession {
            library_id: self.config.library_id,
            correlation_id,
            session_id,
            last_received_sequence_number,
        };
        self.register(correlation_id, message, now_ms, Pending::RequestSession)
    }

    fn register<T>(
        &mut self,
        correlation_id: CorrelationId,
        message: LibraryMessage,
        now_ms: u64,
        wrap: impl FnOnce(PendingRequest<T>) -> Pending,
    ) -> ReplyHandle<T> {
        let deadline_ms = now_ms + self.config.reply_timeout_ms;

        if let Err(error) = message.encode(&mut self.encode_scratch) {
            tracing::warn!(%error, correlation_id, "request frame does not encode");
            let (pending, handle) = PendingRequest::new(message, deadline_ms, false);
            pending.fail(ReplyError::Unencodable(error));
            return handle;
        }
        let requires_resend = self.outbound.offer(&self.encode_scratch).is_back_pressured();

        let (pending, handle) = PendingRequest::new(message, deadline_ms, requires_resend);
        self.correlation_id_to_reply.insert(correlation_id, wrap(pending));
        handle
    }

    fn next_correlation_id(&mut self) -> CorrelationId {
        self.current_correlation_id += 1;
        self.current_correlation_id
    }

    fn begin_connect(&mut self, now_ms: u64) {
        let quarter = self.config.reply_timeout_ms / 4;
        self.state = ConnectState::Connecting {
            deadline_ms: now_ms + self.config.reply_timeout_ms,
            next_resend_ms: now_ms + quarter,
        };
        self.send_library_connect();
        tracing::info!(
            library_id = self.config.library_id,
            channel = %self.current_channel,
            "connecting to engine"
        );
    }

    fn send_library_connect(&mut self) {
        let correlation_id = self.next_correlation_id();
        let message = LibraryMessage::LibraryConnect {
            library_id: self.config.library_id,
            correlation_id,
            unique_value: self.unique_value,
        };
        // Best effort: the connect resend cadence covers a lost offer.
        match message.encode(&mut self.encode_scratch) {
            Ok(()) => {
                self.outbound.offer(&self.encode_scratch);
            }
            Err(error) => tracing::warn!(%error, "dropping unencodable connect frame"),
        }
    }

    fn send_application_heartbeat(&mut self) {
        let message = LibraryMessage::ApplicationHeartbeat {
            library_id: self.config.library_id,
        };
        match message.encode(&mut self.encode_scratch) {
            Ok(()) => {
                self.outbound.offer(&self.encode_scratch);
            }
            Err(error) => tracing::warn!(%error, "dropping unencodable heartbeat frame"),
        }
    }

    /// Round-robin to the next configured engine.
    fn attempt_next_engine(&mut self) {
        let channels = &self.config.engine_channels;
        let at = channels.iter().position(|c| *c == self.current_channel).unwrap_or(0);
        let next = (at + 1) % channels.len();
        self.current_channel = channels[next].clone();
        tracing::info!(channel = %self.current_channel, "rotating to next engine");
    }

    fn reconnect(&mut self, now_ms: u64) -> Result<(), Fatal> {
        let streams = self.transport.connect(&self.current_channel)?;
        self.inbound = streams.inbound;
        self.outbound = streams.outbound;
        self.begin_connect(now_ms);
        Ok(())
    }

    fn drive_connection(&mut self, now_ms: u64) -> Result<(), Fatal> {
        match self.state {
            ConnectState::Connecting {
                deadline_ms,
                next_resend_ms,
            } => {
                if now_ms > deadline_ms {
                    if self.attempts_left == 0 {
                        tracing::error!(
                            library_id = self.config.library_id,
                            "unable to connect to any engine"
                        );
                        self.connect_error = Some(ReplyError::UnableToConnect);
                        self.state = ConnectState::Failed;
                        return Ok(());
                    }
                    self.attempts_left -= 1;
                    self.attempt_next_engine();
                    self.reconnect(now_ms)?;
                } else if now_ms > next_resend_ms {
                    self.send_library_connect();
                    self.state = ConnectState::Connecting {
                        deadline_ms,
                        next_resend_ms: now_ms + self.config.reply_timeout_ms / 4,
                    };
                }
            }
            ConnectState::Connected {
                liveness_deadline_ms,
            } => {
                if now_ms > liveness_deadline_ms {
                    tracing::warn!(
                        library_id = self.config.library_id,
                        channel = %self.current_channel,
                        "engine went quiet, reconnecting"
                    );
                    self.attempts_left = self.config.reconnect_attempts;
                    self.reconnect(now_ms)?;
                } else if now_ms >= self.next_heartbeat_ms {
                    self.send_application_heartbeat();
                    self.next_heartbeat_ms = now_ms + self.config.reply_timeout_ms / 4;
                }
            }
            ConnectState::Failed => {}
        }
        Ok(())
    }

    fn check_replies(&mut self, now_ms: u64) -> usize {
        if self.correlation_id_to_reply.is_empty() {
            return 0;
        }

        let timeout_ms = self.config.reply_timeout_ms;
        let outbound = self.outbound.as_mut();
        let scratch = &mut self.encode_scratch;
        let before = self.correlation_id_to_reply.len();
        self.correlation_id_to_reply.retain(|correlation_id, pending| {
            pending.poll(*correlation_id, now_ms, timeout_ms, outbound, scratch)
        });
        before - self.correlation_id_to_reply.len()
    }

    fn on_message(&mut self, message: LibraryMessage, now_ms: u64) {
        let library_id = self.config.library_id;
        match message {
            LibraryMessage::ApplicationHeartbeat { library_id: id } => {
                if id == library_id || id == GATEWAY_LIBRARY_ID {
                    self.on_engine_heartbeat(now_ms);
                }
            }
            LibraryMessage::NotLeader { library_id: id, channel } => {
                if id != library_id && id != GATEWAY_LIBRARY_ID {
                    return;
                }
                if channel.is_empty() {
                    self.attempt_next_engine();
                } else {
                    tracing::info!(channel = %channel, "redirected to leader");
                    self.current_channel = channel;
                }
                // Redirects do not consume a reconnect attempt.
                if let Err(fatal) = self.reconnect(now_ms) {
                    tracing::error!(error = %fatal, "reconnect failed after redirect");
                    self.state = ConnectState::Failed;
                    self.connect_error = Some(ReplyError::UnableToConnect);
                }
            }
            LibraryMessage::Error {
                library_id: id,
                correlation_id,
                code,
                message,
            } => {
                if id != library_id {
                    return;
                }
                match self.correlation_id_to_reply.remove(&correlation_id) {
                    Some(pending) => {
                        let error = if code == gateway_error::UNABLE_TO_CONNECT {
                            ReplyError::UnableToConnect
                        } else {
                            ReplyError::Gateway { code, message }
                        };
                        pending.fail(error);
                    }
                    None => {
                        tracing::warn!(code, %message, "engine error outside any pending reply");
                        if matches!(self.state, ConnectState::Connecting { .. }) {
                            self.connect_error = Some(ReplyError::Gateway { code, message });
                            self.state = ConnectState::Failed;
                        }
                    }
                }
            }
            LibraryMessage::ManageConnection {
                library_id: id,
                correlation_id,
                connection_id,
                session_id,
            } => {
                if id != library_id {
                    return;
                }
                if let Some(Pending::Initiate(pending)) =
                    self.correlation_id_to_reply.remove(&correlation_id)
                {
                    pending.complete(InitiatedSession {
                        connection_id,
                        session_id,
                    });
                }
            }
            LibraryMessage::ReleaseSessionReply {
                correlation_id,
                status,
            } => {
                if let Some(Pending::Release(pending)) =
                    self.correlation_id_to_reply.remove(&correlation_id)
                {
                    pending.complete(status);
                }
            }
            LibraryMessage::RequestSessionReply {
                correlation_id,
                status,
            } => {
                if let Some(Pending::RequestSession(pending)) =
                    self.correlation_id_to_reply.remove(&correlation_id)
                {
                    pending.complete(status);
                }
            }
            LibraryMessage::Logon {
                library_id: id,
                session_id,
                status,
                sender_comp_id,
                target_comp_id,
                ..
            } => {
                let notification = id == GATEWAY_LIBRARY_ID
                    || (id == library_id && status == LogonStatus::LibraryNotification);
                if notification {
                    self.handler.on_session_exists(session_id, &sender_comp_id, &target_comp_id);
                }
            }
            LibraryMessage::Disconnect {
                library_id: id,
                connection_id,
                reason,
            } => {
                if id == library_id {
                    self.handler.on_disconnect(connection_id, reason);
                }
            }
            LibraryMessage::Catchup {
                library_id: id,
                connection_id,
                message_count,
            } => {
                if id == library_id {
                    self.handler.on_catchup(connection_id, message_count);
                }
            }
            LibraryMessage::NewSentPosition {
                library_id: id,
                position,
            } => {
                if id == library_id {
                    self.handler.on_sent_position(position);
                }
            }
            // Library-originated request types; an engine never sends these.
            LibraryMessage::LibraryConnect { .. }
            | LibraryMessage::InitiateConnection { .. }
            | LibraryMessage::ReleaseSession { .. }
            | LibraryMessage::RequestSession { .. } => {}
        }
    }

    fn on_engine_heartbeat(&mut self, now_ms: u64) {
        let liveness_deadline_ms = now_ms + self.config.reply_timeout_ms;
        if !self.is_connected() {
            tracing::info!(
                library_id = self.config.library_id,
                channel = %self.current_channel,
                "connected to engine"
            );
            self.attempts_left = self.config.reconnect_attempts;
        }
        self.state = ConnectState::Connected {
            liveness_deadline_ms,
        };
    }
}

struct InboundCollector<'a> {
    inbox: &'a mut Vec<LibraryMessage>,
}

impl FragmentHandler for InboundCollector<'_> {
    fn on_fragment(&mut self, data: &[u8], _meta: &FragmentMeta) -> Action {
        match LibraryMessage::decode(data) {
            Ok(message) => self.inbox.push(message),
            Err(error) => {
                tracing::warn!(%error, length = data.len(), "dropping malformed library frame")
            }
        }
        Action::Continue
    }
}
