// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::digest::Digest32;
use std::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("recovery hash space has never been written")]
    SlotUndefined,

    #[error("recovery hash space is corrupt: {0}")]
    Corrupt(String),

    #[error("store used before initialization")]
    NotInitialized,

    #[error("store lock poisoned by a panicking holder")]
    Poisoned,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tamper-resistant storage holding the recovery hash space
///
/// `init` must be idempotent.  A write is atomic from the caller's point of
/// view: a later read returns either the old or the new 32 bytes, never a mix.
pub trait SecureStore {
    fn init(&mut self) -> Result<(), StoreError>;
    fn write_recovery_slot(&mut self, digest: &Digest32) -> Result<(), StoreError>;
    fn read_recovery_slot(&mut self) -> Result<Digest32, StoreError>;
}

impl<S: SecureStore + ?Sized> SecureStore for &mut S {
    fn init(&mut self) -> Result<(), StoreError> {
        (**self).init()
    }
    fn write_recovery_slot(&mut self, digest: &Digest32) -> Result<(), StoreError> {
        (**self).write_recovery_slot(digest)
    }
    fn read_recovery_slot(&mut self) -> Result<Digest32, StoreError> {
        (**self).read_recovery_slot()
    }
}

// There is exactly one TPM, and it handles one transaction at a time; callers
// that share it go through a mutex.
impl<S: SecureStore> SecureStore for &Mutex<S> {
    fn init(&mut self) -> Result<(), StoreError> {
        self.lock().map_err(|_| StoreError::Poisoned)?.init()
    }
    fn write_recovery_slot(&mut self, digest: &Digest32) -> Result<(), StoreError> {
        self.lock()
            .map_err(|_| StoreError::Poisoned)?
            .write_recovery_slot(digest)
    }
    fn read_recovery_slot(&mut self) -> Result<Digest32, StoreError> {
        self.lock()
            .map_err(|_| StoreError::Poisoned)?
            .read_recovery_slot()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Init,
    Read,
    Write,
}

/// Number of times each store operation has been attempted
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub inits: usize,
    pub reads: usize,
    pub writes: usize,
}

/// A store that lives in RAM, with switchable faults
#[derive(Debug, Default)]
pub struct MemStore {
    slot: Option<Digest32>,
    initialized: bool,
    fail_init: bool,
    fail_read: bool,
    fail_write: bool,
    counts: OpCounts,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose slot already holds `digest`, as if left by an earlier boot
    pub fn with_slot(digest: Digest32) -> Self {
        Self {
            slot: Some(digest),
            ..Self::default()
        }
    }

    pub fn slot(&self) -> Option<Digest32> {
        self.slot
    }

    pub fn counts(&self) -> OpCounts {
        self.counts
    }

    /// Makes every subsequent `op` fail until [`MemStore::heal`] is called
    pub fn fail(&mut self, op: StoreOp) {
        self.set_fault(op, true);
    }

    pub fn heal(&mut self, op: StoreOp) {
        self.set_fault(op, false);
    }

    /// Out-of-band reset: the slot reads as never written
    pub fn reset(&mut self) {
        self.slot = None;
    }

    fn set_fault(&mut self, op: StoreOp, on: bool) {
        match op {
            StoreOp::Init => self.fail_init = on,
            StoreOp::Read => self.fail_read = on,
            StoreOp::Write => self.fail_write = on,
        }
    }
}

impl SecureStore for MemStore {
    fn init(&mut self) -> Result<(), StoreError> {
        self.counts.inits += 1;
        if self.fail_init {
            return Err(StoreError::Transport("no response from TPM".to_string()));
        }
        self.initialized = true;
        Ok(())
    }

    fn write_recovery_slot(&mut self, digest: &Digest32) -> Result<(), StoreError> {
        self.counts.writes += 1;
        if !self.initialized {
            return Err(StoreError::NotInitialized);
        }
        if self.fail_write {
            return Err(StoreError::Transport("NV write rejected".to_string()));
        }
        self.slot = Some(*digest);
        Ok(())
    }

    fn read_recovery_slot(&mut self) -> Result<Digest32, StoreError> {
        self.counts.reads += 1;
        if !self.initialized {
            return Err(StoreError::NotInitialized);
        }
        if self.fail_read {
            return Err(StoreError::Transport("NV read rejected".to_string()));
        }
        self.slot.ok_or(StoreError::SlotUndefined)
    }
}
