// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//! Layout of the recovery hash space
//!
//! Memory training in recovery mode produces a blob of MRC data that is cached
//! so that the next recovery boot can skip retraining.  Before that cached blob
//! is trusted, its SHA-256 is checked against a digest held in a reserved TPM
//! NV space, which software cannot roll back.
//!
//! This crate defines the constants describing that space.  They are shared
//! between the firmware stage that writes and checks the digest and the host
//! tooling that inspects it.
#![no_std]

/// TPM NV index of the recovery hash space
pub const NV_INDEX: u32 = 0x100b;

/// Size of the recovery hash space, in bytes
///
/// This is exactly one SHA-256 digest.
pub const SIZE: usize = 32;

/// Digest written when the MRC data could not be hashed
///
/// Writing this value (rather than leaving the previous digest in place)
/// guarantees that the next verification fails and the MRC data is
/// regenerated.  The pattern is chosen to be recognisable in a dump; a real
/// digest equal to it would need a SHA-256 preimage of a fixed value.
pub const POISON_DIGEST: [u8; SIZE] = [
    0xba, 0xad, 0xda, 0x1a, // BAADDA1A
    0xde, 0xad, 0xde, 0xad, // DEADDEAD
    0xde, 0xad, 0xda, 0x1a, // DEADDA1A
    0xba, 0xad, 0xba, 0xad, // BAADBAAD
    0xba, 0xad, 0xda, 0x1a, // BAADDA1A
    0xde, 0xad, 0xde, 0xad, // DEADDEAD
    0xde, 0xad, 0xda, 0x1a, // DEADDA1A
    0xba, 0xad, 0xba, 0xad, // BAADBAAD
];
