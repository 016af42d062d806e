// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sha2::{Digest as _, Sha256};

/// A SHA-256 digest, the width of the recovery hash space
pub type Digest32 = [u8; recovery_hash_space::SIZE];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DigestError(pub String);

/// Something that can hash a buffer
///
/// Implementations must be deterministic, and may only fail because of an
/// internal error (e.g. a hash engine that won't come out of reset), never
/// because of the contents of `data`.
pub trait Digest {
    fn compute(&self, data: &[u8]) -> Result<Digest32, DigestError>;
}

/// Software SHA-256
#[derive(Copy, Clone, Debug, Default)]
pub struct Sha256Engine;

impl Digest for Sha256Engine {
    fn compute(&self, data: &[u8]) -> Result<Digest32, DigestError> {
        let mut sha = Sha256::new();
        sha.update(data);
        Ok(sha.finalize().into())
    }
}

impl<D: Digest + ?Sized> Digest for &D {
    fn compute(&self, data: &[u8]) -> Result<Digest32, DigestError> {
        (**self).compute(data)
    }
}
