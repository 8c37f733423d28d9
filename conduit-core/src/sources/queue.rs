use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::source::FillUnit;
use crate::status::ReadStatus;
use crate::unit::UnitBuffer;

#[derive(Debug, Default)]
struct QueueState {
    units: VecDeque<UnitBuffer>,
    closed: bool,
}

/// Fill-style capability fed by another thread
///
/// Reads answer `AGAIN` while the queue is empty and `EOF` once the
/// producer closed it and every queued unit was read.
#[derive(Debug)]
pub struct QueueSource {
    state: Arc<Mutex<QueueState>>,
}

/// Producer side of a [`QueueSource`]
#[derive(Debug, Clone)]
pub struct QueueHandle {
    state: Arc<Mutex<QueueState>>,
}

impl QueueSource {
    /// Create a queue and the handle that feeds it
    pub fn new() -> (Self, QueueHandle) {
        let state = Arc::new(Mutex::new(QueueState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            QueueHandle { state },
        )
    }
}

impl FillUnit for QueueSource {
    fn fill(&mut self, unit: &mut UnitBuffer) -> ReadStatus {
        let mut state = self.state.lock();
        match state.units.pop_front() {
            Some(next) => {
                unit.copy_from(&next);
                ReadStatus::Ok
            }
            None if state.closed => ReadStatus::Eof,
            None => ReadStatus::Again,
        }
    }
}

impl QueueHandle {
    /// Queue a unit; ignored after [`QueueHandle::close`]
    pub fn push(&self, unit: UnitBuffer) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            debug!("Dropping unit pushed to a closed queue");
            return false;
        }
        state.units.push_back(unit);
        true
    }

    /// Queue a copy of `payload` with default metadata
    pub fn push_slice(&self, payload: &[u8]) -> bool {
        self.push(UnitBuffer::from_slice(payload))
    }

    /// Mark the end of the stream; queued units stay readable
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Units waiting to be read
    pub fn len(&self) -> usize {
        self.state.lock().units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
