// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod cache;
pub mod config;
pub mod digest;
pub mod file_store;
pub mod logging;
pub mod mode;
pub mod store;

pub use cache::{IntegrityCache, UpdateOutcome, Verdict};
pub use digest::{Digest, Digest32, DigestError, Sha256Engine};
pub use mode::{BootMode, ModeOracle};
pub use store::{SecureStore, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("TPM driver initialization failed: {0}")]
    DriverInit(#[source] StoreError),

    #[error("SHA-256 calculation failed: {0}")]
    Digest(#[from] DigestError),

    #[error("could not save hash to TPM: {0}")]
    StoreWrite(#[source] StoreError),

    #[error("could not read hash from TPM: {0}")]
    StoreRead(#[source] StoreError),
}
