use std::cell::Cell;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Fatal;
use crate::library::LibraryMessage;
use crate::library::LibraryStreams;
use crate::library::LibraryTransport;
use crate::transport::Action;
use crate::transport::FragmentHandler;
use crate::transport::FragmentMeta;
use crate::transport::Offer;
use crate::transport::Publication;
use crate::transport::RaftTransport;
use crate::transport::Subscription;
use crate::types::NodeId;
use crate::types::Position;
use crate::types::SessionId;

/// Reserved for test observers; never subject to frame loss.
const OBSERVER: NodeId = 0;

struct Frame {
    session_id: SessionId,
    origin: NodeId,
    position: Position,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Stream {
    frames: Vec<Frame>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Control,
    Data,
}

#[derive(Default)]
struct NetworkState {
    control: Stream,
    data: Stream,
    next_session_id: SessionId,
    dropped_inbound: BTreeSet<NodeId>,
    dropped_outbound: BTreeSet<NodeId>,
    back_pressured: bool,
}

impl NetworkState {
    fn stream(&self, kind: StreamKind) -> &Stream {
        match kind {
            StreamKind::Control => &self.control,
            StreamKind::Data => &self.data,
        }
    }

    fn stream_mut(&mut self, kind: StreamKind) -> &mut Stream {
        match kind {
            StreamKind::Control => &mut self.control,
            StreamKind::Data => &mut self.data,
        }
    }

    fn allocate_session_id(&mut self) -> SessionId {
        self.next_session_id += 1;
        self.next_session_id
    }
}

/// A shared in-memory cluster bus: one control stream, one data stream,
/// per-node frame-loss switches and a global back-pressure switch.
///
/// Frames lost to a partition are gone for good, like dropped UDP datagrams;
/// recovery is the protocol's job.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transport handle for one cluster node.
    pub fn transport(&self, node_id: NodeId) -> Box<dyn RaftTransport> {
        let data_session_id = self.state.borrow_mut().allocate_session_id();
        let control_session_id = self.state.borrow_mut().allocate_session_id();
        Box::new(LoopbackTransport {
            state: Rc::clone(&self.state),
            node_id,
            data_session_id,
            control_session_id,
            control_cursor: Rc::new(Cell::new(0)),
            data_cursor: Rc::new(Cell::new(0)),
        })
    }

    /// Drop all frames to and from `node_id` while `dropped` is set.
    pub fn drop_frames(&self, node_id: NodeId, dropped: bool) {
        self.drop_frames_directed(node_id, dropped, dropped);
    }

    pub fn drop_frames_directed(&self, node_id: NodeId, inbound: bool, outbound: bool) {
        let mut state = self.state.borrow_mut();
        if inbound {
            state.dropped_inbound.insert(node_id);
        } else {
            state.dropped_inbound.remove(&node_id);
        }
        if outbound {
            state.dropped_outbound.insert(node_id);
        } else {
            state.dropped_outbound.remove(&node_id);
        }
    }

    /// Make every publication report back pressure while set.
    pub fn set_back_pressure(&self, on: bool) {
        self.state.borrow_mut().back_pressured = on;
    }

    /// A test-side subscription to the replicated data stream.
    pub fn data_observer(&self) -> Box<dyn Subscription> {
        Box::new(LoopbackSubscription {
            state: Rc::clone(&self.state),
            stream: StreamKind::Data,
            node_id: OBSERVER,
            cursor: Rc::new(Cell::new(0)),
        })
    }
}

struct LoopbackTransport {
    state: Rc<RefCell<NetworkState>>,
    node_id: NodeId,
    data_session_id: SessionId,
    control_session_id: SessionId,
    /// Stream positions survive re-subscription, the way a transport image
    /// resumes where the previous subscription stopped. Fragments left
    /// unconsumed by a departing role reach the next one.
    control_cursor: Rc<Cell<usize>>,
    data_cursor: Rc<Cell<usize>>,
}

impl RaftTransport for LoopbackTransport {
    fn leader_publication(&mut self) -> Box<dyn Publication> {
        Box::new(LoopbackPublication {
            state: Rc::clone(&self.state),
            stream: StreamKind::Data,
            session_id: self.data_session_id,
            origin: self.node_id,
            position: 0,
        })
    }

    fn control_publication(&mut self) -> Box<dyn Publication> {
        Box::new(LoopbackPublication {
            state: Rc::clone(&self.state),
            stream: StreamKind::Control,
            session_id: self.control_session_id,
            origin: self.node_id,
            position: 0,
        })
    }

    fn control_subscription(&mut self) -> Box<dyn Subscription> {
        Box::new(LoopbackSubscription {
            state: Rc::clone(&self.state),
            stream: StreamKind::Control,
            node_id: self.node_id,
            cursor: Rc::clone(&self.control_cursor),
        })
    }

    fn data_subscription(&mut self) -> Box<dyn Subscription> {
        Box::new(LoopbackSubscription {
            state: Rc::clone(&self.state),
            stream: StreamKind::Data,
            node_id: self.node_id,
            cursor: Rc::clone(&self.data_cursor),
        })
    }
}

struct LoopbackPublication {
    state: Rc<RefCell<NetworkState>>,
    stream: StreamKind,
    session_id: SessionId,
    origin: NodeId,
    position: Position,
}

impl Publication for LoopbackPublication {
    fn offer(&mut self, frame: &[u8]) -> Offer {
        let mut state = self.state.borrow_mut();
        if state.back_pressured {
            return Offer::BackPressured;
        }

        self.position += frame.len() as Position;
        if state.dropped_outbound.contains(&self.origin) {
            // Swallowed by the partition; the sender cannot tell.
            return Offer::At(self.position);
        }

        let record = Frame {
            session_id: self.session_id,
            origin: self.origin,
            position: self.position,
            bytes: frame.to_vec(),
        };
        state.stream_mut(self.stream).frames.push(record);
        Offer::At(self.position)
    }

    fn session_id(&self) -> SessionId {
        self.session_id
    }
}

struct LoopbackSubscription {
    state: Rc<RefCell<NetworkState>>,
    stream: StreamKind,
    node_id: NodeId,
    cursor: Rc<Cell<usize>>,
}

impl Subscription for LoopbackSubscription {
    fn poll(&mut self, handler: &mut dyn FragmentHandler, fragment_limit: usize) -> usize {
        let mut delivered = 0;
        while delivered < fragment_limit {
            // Copy the frame out so the handler may publish while we hold no
            // borrow of the shared state.
            let next = {
                let state = self.state.borrow();
                let stream = state.stream(self.stream);
                if self.cursor.get() >= stream.frames.len() {
                    break;
                }
                let frame = &stream.frames[self.cursor.get()];
                let lost =
                    self.node_id != OBSERVER && state.dropped_inbound.contains(&self.node_id);
                (frame.session_id, frame.position, frame.bytes.clone(), lost)
            };

            let (session_id, position, bytes, lost) = next;
            if lost {
                self.cursor.set(self.cursor.get() + 1);
                continue;
            }

            let meta = FragmentMeta {
                session_id,
                end_position: position,
            };
            match handler.on_fragment(&bytes, &meta) {
                Action::Continue => {
                    self.cursor.set(self.cursor.get() + 1);
                    delivered += 1;
                }
                Action::Abort => break,
            }
        }
        delivered
    }
}

#[derive(Default)]
struct LibraryNetState {
    channels: HashMap<String, ChannelState>,
    next_session_id: SessionId,
    back_pressured: bool,
}

#[derive(Default)]
struct ChannelState {
    to_engine: Stream,
    to_library: Stream,
}

/// In-memory channels between one library and a set of engine stubs.
#[derive(Clone, Default)]
pub struct LibraryLoopback {
    state: Rc<RefCell<LibraryNetState>>,
}

impl LibraryLoopback {
    pub fn new(channels: &[&str]) -> Self {
        let loopback = Self::default();
        {
            let mut state = loopback.state.borrow_mut();
            for channel in channels {
                state.channels.insert((*channel).to_string(), ChannelState::default());
            }
        }
        loopback
    }

    pub fn transport(&self) -> Box<dyn LibraryTransport> {
        Box::new(LoopbackLibraryTransport {
            state: Rc::clone(&self.state),
        })
    }

    /// Make every library publication report back pressure while set.
    pub fn set_back_pressure(&self, on: bool) {
        self.state.borrow_mut().back_pressured = on;
    }

    /// The test-driven engine end of `channel`.
    pub fn engine(&self, channel: &str) -> EngineStub {
        let session_id = {
            let mut state = self.state.borrow_mut();
            assert!(state.channels.contains_key(channel), "unknown channel {channel}");
            state.next_session_id += 1;
            state.next_session_id
        };
        EngineStub {
            state: Rc::clone(&self.state),
            channel: channel.to_string(),
            session_id,
            cursor: 0,
            position: 0,
            scratch: Vec::new(),
        }
    }
}

struct LoopbackLibraryTransport {
    state: Rc<RefCell<LibraryNetState>>,
}

impl LibraryTransport for LoopbackLibraryTransport {
    fn connect(&mut self, channel: &str) -> Result<LibraryStreams, Fatal> {
        let (session_id, cursor) = {
            let mut state = self.state.borrow_mut();
            if !state.channels.contains_key(channel) {
                return Err(Fatal::TransportUnavailable(crate::AnyError::error(format!(
                    "no such channel: {channel}"
                ))));
            }
            state.next_session_id += 1;
            let cursor = state.channels[channel].to_library.frames.len();
            (state.next_session_id, cursor)
        };

        Ok(LibraryStreams {
            inbound: Box::new(LibraryChannelSubscription {
                state: Rc::clone(&self.state),
                channel: channel.to_string(),
                cursor,
            }),
            outbound: Box::new(LibraryChannelPublication {
                state: Rc::clone(&self.state),
                channel: channel.to_string(),
                session_id,
                position: 0,
            }),
        })
    }
}

struct LibraryChannelPublication {
    state: Rc<RefCell<LibraryNetState>>,
    channel: String,
    session_id: SessionId,
    position: Position,
}

impl Publication for LibraryChannelPublication {
    fn offer(&mut self, frame: &[u8]) -> Offer {
        let mut state = self.state.borrow_mut();
        if state.back_pressured {
            return Offer::BackPressured;
        }

        self.position += frame.len() as Position;
        let record = Frame {
            session_id: self.session_id,
            origin: OBSERVER,
            position: self.position,
            bytes: frame.to_vec(),
        };
        let Some(channel) = state.channels.get_mut(&self.channel) else {
            return Offer::Closed;
        };
        channel.to_engine.frames.push(record);
        Offer::At(self.position)
    }

    fn session_id(&self) -> SessionId {
        self.session_id
    }
}

struct LibraryChannelSubscription {
    state: Rc<RefCell<LibraryNetState>>,
    channel: String,
    cursor: usize,
}

impl Subscription for LibraryChannelSubscription {
    fn poll(&mut self, handler: &mut dyn FragmentHandler, fragment_limit: usize) -> usize {
        let mut delivered = 0;
        while delivered < fragment_limit {
            let next = {
                let state = self.state.borrow();
                let Some(channel) = state.channels.get(&self.channel) else {
                    break;
                };
                if self.cursor >= channel.to_library.frames.len() {
                    break;
                }
                let frame = &channel.to_library.frames[self.cursor];
                (frame.session_id, frame.position, frame.bytes.clone())
            };

            let (session_id, position, bytes) = next;
            let meta = FragmentMeta {
                session_id,
                end_position: position,
            };
            match handler.on_fragment(&bytes, &meta) {
                Action::Continue => {
                    self.cursor += 1;
                    delivered += 1;
                }
                Action::Abort => break,
            }
        }
        delivered
    }
}

/// Test-scripted engine end of a library channel: drain what the library
/// sent, reply with whatever the scenario calls for.
pub struct EngineStub {
    state: Rc<RefCell<LibraryNetState>>,
    channel: String,
    session_id: SessionId,
    cursor: usize,
    position: Position,
    scratch: Vec<u8>,
}

impl EngineStub {
    /// Decode every new frame the library has sent on this channel.
    pub fn drain(&mut self) -> Vec<LibraryMessage> {
        let state = self.state.borrow();
        let Some(channel) = state.channels.get(&self.channel) else {
            return Vec::new();
        };

        let mut messages = Vec::new();
        while self.cursor < channel.to_engine.frames.len() {
            let frame = &channel.to_engine.frames[self.cursor];
            self.cursor += 1;
            match LibraryMessage::decode(&frame.bytes) {
                Ok(message) => messages.push(message),
                Err(error) => panic!("undecodable library frame: {error}"),
            }
        }
        messages
    }

    /// Send an engine frame to the library.
    pub fn send(&mut self, message: &LibraryMessage) {
        message.encode(&mut self.scratch).expect("encodable frame");
        self.position += self.scratch.len() as Position;
        let record = Frame {
            session_id: self.session_id,
            origin: OBSERVER,
            position: self.position,
            bytes: self.scratch.clone(),
        };
        let mut state = self.state.borrow_mut();
        let Some(channel) = state.channels.get_mut(&self.channel) else {
            return;
        };
        channel.to_library.frames.push(record);
    }
}
