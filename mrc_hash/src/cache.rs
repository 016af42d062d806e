// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binding the recovery MRC cache to the recovery hash space
//!
//! Only recovery-mode MRC data is ever hashed into the TPM.  In normal mode
//! [`update_hash`] does nothing at all and [`verify_hash`] reports success:
//! there is no record to check against, and the normal-mode cache is trusted
//! by way of the signed firmware image instead.  A `true` from
//! [`verify_hash`] outside recovery mode therefore means "not applicable",
//! not "authentic"; [`try_verify_hash`] keeps the two apart.

use crate::{
    digest::{Digest, Digest32},
    mode::ModeOracle,
    store::SecureStore,
    Error,
};
use log::{error, info, trace};
use recovery_hash_space::POISON_DIGEST;

/// What [`try_update_hash`] did to the recovery hash space
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Not in recovery mode; the store was not touched
    Skipped,
    /// The digest of the data was written
    Written(Digest32),
    /// The data could not be hashed, so the poison digest was written
    Poisoned,
}

/// Result of checking data against the recovery hash space
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Not in recovery mode; nothing to check against
    NotApplicable,
    Match,
    Mismatch,
}

impl Verdict {
    /// Whether the caller may go ahead and use the data
    pub fn is_usable(&self) -> bool {
        matches!(self, Verdict::NotApplicable | Verdict::Match)
    }
}

/// Stores the digest of `data` in the recovery hash space
///
/// If `data` cannot be hashed, the poison digest is stored in its place: the
/// cache is being replaced either way, so the old digest is no longer valid,
/// and the poison guarantees the next [`verify_hash`] fails.
pub fn try_update_hash<M, D, S>(
    data: &[u8],
    mode: &M,
    digest: &D,
    store: &mut S,
) -> Result<UpdateOutcome, Error>
where
    M: ModeOracle + ?Sized,
    D: Digest + ?Sized,
    S: SecureStore + ?Sized,
{
    if !mode.is_recovery_mode() {
        trace!("MRC: not in recovery mode; not storing hash");
        return Ok(UpdateOutcome::Skipped);
    }

    store.init().map_err(Error::DriverInit)?;

    let (hash, outcome) = match digest.compute(data) {
        Ok(hash) => (hash, UpdateOutcome::Written(hash)),
        Err(e) => {
            error!(
                "MRC: SHA-256 calculation failed for data ({e}). \
                 Resetting TPM hash space to poison value."
            );
            (POISON_DIGEST, UpdateOutcome::Poisoned)
        }
    };
    trace!("MRC: writing {} ({} bytes of data)", hex::encode(hash), data.len());

    store.write_recovery_slot(&hash).map_err(Error::StoreWrite)?;
    Ok(outcome)
}

/// [`try_update_hash`], with every failure logged and dropped
pub fn update_hash<M, D, S>(data: &[u8], mode: &M, digest: &D, store: &mut S)
where
    M: ModeOracle + ?Sized,
    D: Digest + ?Sized,
    S: SecureStore + ?Sized,
{
    match try_update_hash(data, mode, digest, store) {
        Ok(UpdateOutcome::Skipped) => (),
        Ok(_) => info!("MRC: TPM MRC hash updated successfully."),
        Err(e) => error!("MRC: {e}"),
    }
}

/// Checks `data` against the recovery hash space
///
/// Every failure along the way is an `Err`; only a completed comparison
/// produces [`Verdict::Match`] or [`Verdict::Mismatch`].
pub fn try_verify_hash<M, D, S>(
    data: &[u8],
    mode: &M,
    digest: &D,
    store: &mut S,
) -> Result<Verdict, Error>
where
    M: ModeOracle + ?Sized,
    D: Digest + ?Sized,
    S: SecureStore + ?Sized,
{
    if !mode.is_recovery_mode() {
        trace!("MRC: not in recovery mode; nothing to verify");
        return Ok(Verdict::NotApplicable);
    }

    let data_hash = digest.compute(data)?;
    store.init().map_err(Error::DriverInit)?;
    let tpm_hash = store.read_recovery_slot().map_err(Error::StoreRead)?;

    trace!("MRC: data hash {}", hex::encode(data_hash));
    trace!("MRC: TPM hash  {}", hex::encode(tpm_hash));
    if tpm_hash == POISON_DIGEST {
        trace!("MRC: TPM hash space holds the poison value");
    }

    Ok(if data_hash == tpm_hash {
        Verdict::Match
    } else {
        Verdict::Mismatch
    })
}

/// [`try_verify_hash`], collapsed to "may the data be used?"
pub fn verify_hash<M, D, S>(data: &[u8], mode: &M, digest: &D, store: &mut S) -> bool
where
    M: ModeOracle + ?Sized,
    D: Digest + ?Sized,
    S: SecureStore + ?Sized,
{
    match try_verify_hash(data, mode, digest, store) {
        Ok(Verdict::NotApplicable) => true,
        Ok(Verdict::Match) => {
            info!("MRC: Hash comparison successful. Using data from RECOVERY_MRC_CACHE");
            true
        }
        Ok(Verdict::Mismatch) => {
            error!("MRC: Hash comparison failed.");
            false
        }
        Err(e) => {
            error!("MRC: {e}");
            false
        }
    }
}

/// The capabilities the MRC cache hash needs, bundled for a boot stage
///
/// The boot sequence owns one of these and hands it to whichever stage
/// produces or consumes the recovery MRC cache.
pub struct IntegrityCache<M, D, S> {
    mode: M,
    digest: D,
    store: S,
}

impl<M, D, S> IntegrityCache<M, D, S>
where
    M: ModeOracle,
    D: Digest,
    S: SecureStore,
{
    pub fn new(mode: M, digest: D, store: S) -> Self {
        Self {
            mode,
            digest,
            store,
        }
    }

    pub fn update_hash(&mut self, data: &[u8]) {
        update_hash(data, &self.mode, &self.digest, &mut self.store)
    }

    pub fn try_update_hash(&mut self, data: &[u8]) -> Result<UpdateOutcome, Error> {
        try_update_hash(data, &self.mode, &self.digest, &mut self.store)
    }

    pub fn verify_hash(&mut self, data: &[u8]) -> bool {
        verify_hash(data, &self.mode, &self.digest, &mut self.store)
    }

    pub fn try_verify_hash(&mut self, data: &[u8]) -> Result<Verdict, Error> {
        try_verify_hash(data, &self.mode, &self.digest, &mut self.store)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
