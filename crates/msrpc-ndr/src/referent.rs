//! Referent bookkeeping for embedded pointers
//!
//! Every non-null unique or full pointer is written inline as a referent id;
//! the pointee itself is written later, in the deferred pass. The encoder
//! assigns ids and remembers which targets it has already queued so that
//! aliased full pointers share one id and one payload. The decoder maps ids
//! back to the shared targets it has already materialized.

use std::any::Any;
use std::collections::HashMap;

use crate::pointers::Pointee;
use crate::{NdrError, Result};

/// First referent id handed out by the encoder
pub const FIRST_REFERENT_ID: u64 = 0x0002_0000;

/// Distance between consecutive referent ids
pub const REFERENT_ID_STEP: u64 = 4;

/// Lifecycle of a referent within one encode operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentState {
    /// Id written inline, payload waiting in the deferred queue
    Queued,
    /// Payload written
    Flushed,
}

/// Encode-side referent tracker
///
/// Full-pointer targets are keyed by address. The tracker keeps a handle to
/// every target it has resolved, so no address is reused by another target
/// while the operation lasts.
#[derive(Debug)]
pub struct ReferentTracker {
    next_id: u64,
    by_identity: HashMap<usize, (u64, Box<dyn Any>)>,
    states: HashMap<u64, ReferentState>,
}

impl ReferentTracker {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_REFERENT_ID,
            by_identity: HashMap::new(),
            states: HashMap::new(),
        }
    }

    /// Assign a fresh id that is never shared with another pointer.
    pub fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += REFERENT_ID_STEP;
        self.states.insert(id, ReferentState::Queued);
        id
    }

    /// Look up the id for a full-pointer target, assigning one on first
    /// sight.
    ///
    /// Returns the id and whether it was newly assigned (and so must be
    /// queued by the caller).
    pub fn resolve<T: 'static>(&mut self, target: &Pointee<T>) -> (u64, bool) {
        let identity = target.identity();
        if let Some(&(id, _)) = self.by_identity.get(&identity) {
            return (id, false);
        }
        let id = self.allocate();
        self.by_identity.insert(identity, (id, Box::new(target.clone())));
        (id, true)
    }

    pub fn mark_flushed(&mut self, id: u64) {
        self.states.insert(id, ReferentState::Flushed);
    }

    /// `None` means the id was never assigned (the target is unvisited).
    pub fn state(&self, id: u64) -> Option<ReferentState> {
        self.states.get(&id).copied()
    }

    /// Number of referents assigned so far
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for ReferentTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode-side referent table for full pointers
#[derive(Default)]
pub struct ReferentTable {
    targets: HashMap<u64, Box<dyn Any>>,
}

impl ReferentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the target already bound to `referent_id`.
    ///
    /// Fails when the id was bound to a pointee of a different type.
    pub fn lookup<T: 'static>(&self, referent_id: u64) -> Result<Option<Pointee<T>>> {
        match self.targets.get(&referent_id) {
            None => Ok(None),
            Some(target) => target
                .downcast_ref::<Pointee<T>>()
                .cloned()
                .map(Some)
                .ok_or(NdrError::InvalidPointer {
                    referent_id,
                    reason: "referent reused with a different type",
                }),
        }
    }

    pub fn insert<T: 'static>(&mut self, referent_id: u64, target: Pointee<T>) {
        self.targets.insert(referent_id, Box::new(target));
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl std::fmt::Debug for ReferentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferentTable")
            .field("targets", &self.targets.len())
            .finish()
    }
}
