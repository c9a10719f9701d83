//! Reply correlation for library requests.
//!
//! Every outbound request registers a pending reply keyed by correlation id.
//! Inbound frames bearing that id resolve it; expiry resolves it with
//! [`ReplyError::Timeout`]. Nothing blocks: callers poll the handle, or wrap
//! the poll in an idle loop via [`ReplyHandle::await_with`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ReplyError;
use crate::idle::IdleStrategy;
use crate::library::message::LibraryMessage;
use crate::library::LibraryPoller;
use crate::transport::Publication;
use crate::types::CorrelationId;

/// Resolution state of a pending reply.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub enum ReplyState<T> {
    Pending,
    Completed(T),
    Errored(ReplyError),
}

/// Caller-side handle to a pending reply.
#[derive(Debug)]
pub struct ReplyHandle<T> {
    cell: Rc<RefCell<ReplyState<T>>>,
}

impl<T> Clone for ReplyHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Clone> ReplyHandle<T> {
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.cell.borrow(), ReplyState::Pending)
    }

    /// The outcome, if resolved.
    pub fn result(&self) -> Option<Result<T, ReplyError>> {
        match &*self.cell.borrow() {
            ReplyState::Pending => None,
            ReplyState::Completed(value) => Some(Ok(value.clone())),
            ReplyState::Errored(error) => Some(Err(error.clone())),
        }
    }

    /// Blocking wrapper over the non-blocking poll: drive `poller` under
    /// `idle` until this reply resolves.
    ///
    /// `now_ms` supplies wall-clock time in the same epoch the caller uses
    /// for [`LibraryPoller::poll`]. A fatal transport failure surfaces as
    /// [`ReplyError::UnableToConnect`].
    pub fn await_with(
        &self,
        poller: &mut LibraryPoller,
        fragment_limit: usize,
        idle: &mut dyn IdleStrategy,
        mut now_ms: impl FnMut() -> u64,
    ) -> Result<T, ReplyError> {
        loop {
            let work = match poller.poll(fragment_limit, now_ms()) {
                Ok(work) => work,
                Err(fatal) => {
                    tracing::error!(error = %fatal, "transport failed while awaiting reply");
                    return Err(ReplyError::UnableToConnect);
                }
            };

            if let Some(result) = self.result() {
                return result;
            }
            idle.idle(work);
        }
    }
}

/// Poller-side state for one outstanding request.
pub(crate) struct PendingRequest<T> {
    cell: Rc<RefCell<ReplyState<T>>>,
    deadline_ms: u64,
    requires_resend: bool,
    message: LibraryMessage,
}

impl<T> PendingRequest<T> {
    pub(crate) fn new(
        message: LibraryMessage,
        deadline_ms: u64,
        requires_resend: bool,
    ) -> (Self, ReplyHandle<T>) {
        let cell = Rc::new(RefCell::new(ReplyState::Pending));
        let handle = ReplyHandle {
            cell: Rc::clone(&cell),
        };
        (
            Self {
                cell,
                deadline_ms,
                requires_resend,
                message,
            },
            handle,
        )
    }

    pub(crate) fn complete(&self, value: T) {
        *self.cell.borrow_mut() = ReplyState::Completed(value);
    }

    pub(crate) fn fail(&self, error: ReplyError) {
        *self.cell.borrow_mut() = ReplyState::Errored(error);
    }

    /// Per-tick upkeep: resend under back pressure, expire past the deadline.
    ///
    /// Returns false once the request resolved and must leave the map.
    pub(crate) fn poll(
        &mut self,
        correlation_id: CorrelationId,
        now_ms: u64,
        timeout_ms: u64,
        outbound: &mut dyn Publication,
        scratch: &mut Vec<u8>,
    ) -> bool {
        if self.requires_resend {
            match self.message.encode(scratch) {
                Ok(()) => {
                    if !outbound.offer(scratch).is_back_pressured() {
                        self.requires_resend = false;
                    }
                }
                Err(error) => {
                    self.fail(ReplyError::Unencodable(error));
                    return false;
                }
            }
        }

        if now_ms > self.deadline_ms {
            tracing::debug!(correlation_id, "reply timed out");
            self.fail(ReplyError::Timeout {
                correlation_id,
                timeout_ms,
            });
            return false;
        }

        true
    }
}

/// The typed pending variants the poller keeps in its correlation map.
pub(crate) enum Pending {
    Initiate(PendingRequest<crate::library::InitiatedSession>),
    Release(PendingRequest<crate::library::message::SessionReplyStatus>),
    RequestSession(PendingRequest<crate::library::message::SessionReplyStatus>),
}

impl Pending {
    pub(crate) fn fail(&self, error: ReplyError) {
        match self {
            Pending::Initiate(pending) => pending.fail(error),
            Pending::Release(pending) => pending.fail(error),
            Pending::RequestSession(pending) => pending.fail(error),
        }
    }

    pub(crate) fn poll(
        &mut self,
        correlation_id: CorrelationId,
        now_ms: u64,
        timeout_ms: u64,
        outbound: &mut dyn Publication,
        scratch: &mut Vec<u8>,
    ) -> bool {
        match self {
            Pending::Initiate(pending) => {
                pending.poll(correlation_id, now_ms, timeout_ms, outbound, scratch)
            }
            Pending::Release(pending) => {
                pending.poll(correlation_id, now_ms, timeout_ms, outbound, scratch)
            }
            Pending::RequestSession(pending) => {
                pending.poll(correlation_id, now_ms, timeout_ms, outbound, scratch)
            }
        }
    }
}
