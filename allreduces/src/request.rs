//! Non-blocking request tracking.
//!
//! Every non-blocking operation runs as a task on the communicator's runtime
//! and is tracked by a slot in a [`RequestTable`]. The caller holds a
//! [`Request<T>`] token naming that slot. The task owns the operation's
//! buffer while it runs; `wait` hands the buffer back.
//!
//! A slot moves `Issued -> Complete -> (freed)`. `test` only reports
//! completion once the task has actually finished, and harvests its result
//! into the slot so a later `wait` does not block. Dropping a token that was
//! never waited aborts the task and frees the slot.

use crate::error::{AlError, Result};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

type Payload = Box<dyn Any + Send>;
type Outcome = Result<Payload>;

/// Observable state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// The operation may still be running.
    Issued,
    /// The operation has finished; `wait` will not block.
    Complete,
}

/// Arena index plus generation; a freed slot bumps its generation so old
/// ids can never alias a newer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    index: u32,
    generation: u32,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

enum SlotState {
    Vacant,
    Issued(JoinHandle<Outcome>),
    Complete(Outcome),
}

struct Slot {
    generation: u32,
    state: SlotState,
}

/// Arena of in-flight non-blocking operations for one communicator.
pub struct RequestTable {
    runtime: tokio::runtime::Handle,
    slots: Mutex<Vec<Slot>>,
}

impl RequestTable {
    /// Create a table whose requests run on `runtime`.
    pub fn new(runtime: tokio::runtime::Handle) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            slots: Mutex::new(Vec::new()),
        })
    }

    /// Start `op` and return a token for its result.
    pub fn issue<T, F>(self: &Arc<Self>, op: F) -> Result<Request<T>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let handle = self
            .runtime
            .spawn(async move { op.await.map(|v| Box::new(v) as Payload) });

        let mut slots = self.lock()?;
        let index = match slots
            .iter()
            .position(|s| matches!(s.state, SlotState::Vacant))
        {
            Some(i) => i,
            None => {
                slots.push(Slot {
                    generation: 0,
                    state: SlotState::Vacant,
                });
                slots.len() - 1
            }
        };
        let slot = &mut slots[index];
        slot.state = SlotState::Issued(handle);
        let id = RequestId {
            index: index as u32,
            generation: slot.generation,
        };

        Ok(Request {
            id,
            table: Arc::clone(self),
            live: true,
            _marker: PhantomData,
        })
    }

    /// Number of requests issued but not yet waited or dropped.
    pub fn outstanding(&self) -> usize {
        self.lock().map_or(0, |slots| {
            slots
                .iter()
                .filter(|s| !matches!(s.state, SlotState::Vacant))
                .count()
        })
    }

    /// Abort every outstanding request and free its slot. Returns how many
    /// were aborted.
    pub fn abort_all(&self) -> usize {
        let Ok(mut slots) = self.lock() else {
            return 0;
        };
        let mut aborted = 0;
        for slot in slots.iter_mut() {
            match std::mem::replace(&mut slot.state, SlotState::Vacant) {
                SlotState::Vacant => continue,
                SlotState::Issued(handle) => handle.abort(),
                SlotState::Complete(_) => {}
            }
            slot.generation = slot.generation.wrapping_add(1);
            aborted += 1;
        }
        aborted
    }

    fn state(&self, id: RequestId) -> Result<RequestState> {
        let slots = self.lock()?;
        match &live_slot(&slots, id)?.state {
            SlotState::Issued(handle) if !handle.is_finished() => Ok(RequestState::Issued),
            _ => Ok(RequestState::Complete),
        }
    }

    fn test(&self, id: RequestId) -> Result<bool> {
        let mut slots = self.lock()?;
        let slot = live_slot_mut(&mut slots, id)?;
        let handle = match &mut slot.state {
            SlotState::Complete(_) => return Ok(true),
            SlotState::Issued(handle) if handle.is_finished() => handle,
            _ => return Ok(false),
        };
        // A finished task can still report pending if the coop budget of the
        // calling task is spent; just try again on the next test.
        match handle.now_or_never() {
            Some(joined) => {
                slot.state = SlotState::Complete(flatten(joined));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn wait(&self, id: RequestId) -> Outcome {
        let state = {
            let mut slots = self.lock()?;
            let slot = live_slot_mut(&mut slots, id)?;
            slot.generation = slot.generation.wrapping_add(1);
            std::mem::replace(&mut slot.state, SlotState::Vacant)
        };
        match state {
            SlotState::Issued(handle) => flatten(handle.await),
            SlotState::Complete(outcome) => outcome,
            SlotState::Vacant => Err(AlError::InvalidRequest(format!("request {id} is vacant"))),
        }
    }

    fn cancel(&self, id: RequestId) {
        let Ok(mut slots) = self.lock() else {
            return;
        };
        if let Ok(slot) = live_slot_mut(&mut slots, id) {
            if let SlotState::Issued(handle) = &slot.state {
                handle.abort();
            }
            slot.state = SlotState::Vacant;
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Slot>>> {
        self.slots
            .lock()
            .map_err(|_| AlError::LockPoisoned("request table"))
    }
}

fn live_slot(slots: &[Slot], id: RequestId) -> Result<&Slot> {
    slots
        .get(id.index as usize)
        .filter(|s| s.generation == id.generation && !matches!(s.state, SlotState::Vacant))
        .ok_or_else(|| AlError::InvalidRequest(format!("request {id} is not live")))
}

fn live_slot_mut(slots: &mut [Slot], id: RequestId) -> Result<&mut Slot> {
    slots
        .get_mut(id.index as usize)
        .filter(|s| s.generation == id.generation && !matches!(s.state, SlotState::Vacant))
        .ok_or_else(|| AlError::InvalidRequest(format!("request {id} is not live")))
}

fn flatten(joined: std::result::Result<Outcome, tokio::task::JoinError>) -> Outcome {
    joined.map_err(|e| AlError::transport_with_source("request task failed", e))?
}

/// Token for a non-blocking operation whose result is a `T`.
///
/// Consumed by [`Request::wait`]. Dropping it without waiting aborts the
/// operation.
#[must_use = "dropping a request aborts the operation"]
pub struct Request<T> {
    id: RequestId,
    table: Arc<RequestTable>,
    live: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Request<T> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Whether this request belongs to `table`.
    pub fn belongs_to(&self, table: &Arc<RequestTable>) -> bool {
        Arc::ptr_eq(&self.table, table)
    }

    /// Poll for completion without blocking.
    pub fn test(&self) -> Result<bool> {
        self.table.test(self.id)
    }

    pub fn state(&self) -> Result<RequestState> {
        self.table.state(self.id)
    }

    /// Wait for the operation and take back its buffer.
    pub async fn wait(mut self) -> Result<T> {
        self.live = false;
        let payload = self.table.wait(self.id).await?;
        payload
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| AlError::InvalidRequest(format!("request {} payload type", self.id)))
    }

    /// Wait for every request in order. All requests are waited even if an
    /// earlier one fails; the first error is returned.
    pub async fn wait_all(requests: Vec<Request<T>>) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(requests.len());
        let mut first_err = None;
        for req in requests {
            match req.wait().await {
                Ok(v) => out.push(v),
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(_) => {}
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }
}

impl<T> std::fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request").field("id", &self.id).finish()
    }
}

impl<T> Drop for Request<T> {
    fn drop(&mut self) {
        if self.live {
            self.table.cancel(self.id);
        }
    }
}
