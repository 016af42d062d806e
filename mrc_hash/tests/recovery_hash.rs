// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use mrc_hash::{
    cache::{update_hash, verify_hash},
    file_store::FileStore,
    store::{MemStore, StoreOp},
    BootMode, Digest, Digest32, DigestError, IntegrityCache, SecureStore, Sha256Engine,
    UpdateOutcome, Verdict,
};
use recovery_hash_space::POISON_DIGEST;
use std::cell::Cell;
use std::sync::Mutex;

/// Returns `D` for the 16-byte all-0xAA blob and a byte-sum pattern otherwise
struct Known;

const D: Digest32 = [
    0x6e, 0x34, 0x0b, 0x9c, 0xff, 0xb3, 0x7a, 0x98, 0x9c, 0xa5, 0x44, 0xe6, 0xbb, 0x78, 0x0a,
    0x2c, 0x78, 0x90, 0x1d, 0x3f, 0xb3, 0x37, 0x38, 0x76, 0x85, 0x11, 0xa3, 0x06, 0x17, 0xaf,
    0xa0, 0x1d,
];

impl Digest for Known {
    fn compute(&self, data: &[u8]) -> Result<Digest32, DigestError> {
        if data == [0xaa; 16] {
            Ok(D)
        } else {
            let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            Ok([sum; 32])
        }
    }
}

/// Fails on demand and counts its invocations
#[derive(Default)]
struct Flaky {
    broken: Cell<bool>,
    calls: Cell<usize>,
}

impl Digest for Flaky {
    fn compute(&self, data: &[u8]) -> Result<Digest32, DigestError> {
        self.calls.set(self.calls.get() + 1);
        if self.broken.get() {
            Err(DigestError("hash engine fault".to_string()))
        } else {
            Sha256Engine.compute(data)
        }
    }
}

#[test]
fn update_outside_recovery_never_touches_store() {
    for blob in [&b""[..], &[0xaa; 16][..], &[0u8; 4096][..]] {
        let flaky = Flaky::default();
        let mut store = MemStore::with_slot([1; 32]);
        update_hash(blob, &BootMode::Normal, &flaky, &mut store);

        flaky.broken.set(true);
        update_hash(blob, &BootMode::Normal, &flaky, &mut store);

        assert_eq!(store.counts(), Default::default());
        assert_eq!(store.slot(), Some([1; 32]));
        assert_eq!(flaky.calls.get(), 0);
    }
}

#[test]
fn recovery_update_then_verify() {
    let blob = b"freshly trained MRC data";
    let mut store = MemStore::new();
    update_hash(blob, &BootMode::Recovery, &Sha256Engine, &mut store);
    assert_eq!(store.slot(), Some(Sha256Engine.compute(blob).unwrap()));
    assert_eq!(store.counts().writes, 1);
    assert!(verify_hash(blob, &BootMode::Recovery, &Sha256Engine, &mut store));
}

#[test]
fn digest_failure_poisons_the_slot() {
    let flaky = Flaky::default();
    let blob = [0x5au8; 64];
    let mut store = MemStore::new();

    update_hash(&blob, &BootMode::Recovery, &flaky, &mut store);
    assert!(verify_hash(&blob, &BootMode::Recovery, &flaky, &mut store));

    flaky.broken.set(true);
    update_hash(&blob, &BootMode::Recovery, &flaky, &mut store);
    assert_eq!(store.slot(), Some(POISON_DIGEST));

    flaky.broken.set(false);
    assert!(!verify_hash(&blob, &BootMode::Recovery, &flaky, &mut store));
    assert!(!verify_hash(&[], &BootMode::Recovery, &flaky, &mut store));
}

#[test]
fn verify_outside_recovery_always_passes() {
    let mut never_written = MemStore::new();
    assert!(verify_hash(b"x", &BootMode::Normal, &Sha256Engine, &mut never_written));

    let mut unrelated = MemStore::with_slot([0x77; 32]);
    assert!(verify_hash(b"x", &BootMode::Normal, &Sha256Engine, &mut unrelated));

    let mut broken = MemStore::new();
    broken.fail(StoreOp::Init);
    broken.fail(StoreOp::Read);
    assert!(verify_hash(b"x", &BootMode::Normal, &Sha256Engine, &mut broken));
    assert_eq!(broken.counts(), Default::default());
}

#[test]
fn verify_in_recovery_fails_closed() {
    let blob = [0x10u8; 32];
    let hash = Sha256Engine.compute(&blob).unwrap();

    let mut store = MemStore::with_slot(hash);
    store.fail(StoreOp::Read);
    assert!(!verify_hash(&blob, &BootMode::Recovery, &Sha256Engine, &mut store));

    let flaky = Flaky::default();
    flaky.broken.set(true);
    let mut store = MemStore::with_slot(hash);
    assert!(!verify_hash(&blob, &BootMode::Recovery, &flaky, &mut store));
    assert_eq!(store.counts(), Default::default());

    for i in 0..32 {
        let mut stored = hash;
        stored[i] ^= 0x80;
        let mut store = MemStore::with_slot(stored);
        assert!(
            !verify_hash(&blob, &BootMode::Recovery, &Sha256Engine, &mut store),
            "byte {i} differs but verification passed"
        );
    }

    let mut store = MemStore::with_slot(hash);
    assert!(verify_hash(&blob, &BootMode::Recovery, &Sha256Engine, &mut store));
}

#[test]
fn repeated_update_is_idempotent() {
    let blob = b"same data twice";
    let mut once = MemStore::new();
    update_hash(blob, &BootMode::Recovery, &Sha256Engine, &mut once);

    let mut twice = MemStore::new();
    update_hash(blob, &BootMode::Recovery, &Sha256Engine, &mut twice);
    update_hash(blob, &BootMode::Recovery, &Sha256Engine, &mut twice);

    assert_eq!(once.slot(), twice.slot());
}

#[test]
fn sixteen_bytes_of_aa() {
    let blob = [0xaau8; 16];
    let mut cache = IntegrityCache::new(BootMode::Recovery, Known, MemStore::new());

    assert_eq!(cache.try_update_hash(&blob).unwrap(), UpdateOutcome::Written(D));
    assert_eq!(cache.store().slot(), Some(D));
    assert!(cache.verify_hash(&blob));

    let mut flipped = blob;
    flipped[7] = 0xab;
    assert!(!cache.verify_hash(&flipped));
    assert_eq!(cache.try_verify_hash(&flipped).unwrap(), Verdict::Mismatch);
}

#[test]
fn shared_store_across_stages() {
    let tpm = Mutex::new(MemStore::new());
    let blob = [0xc3u8; 128];

    std::thread::scope(|s| {
        s.spawn(|| {
            let mut romstage = IntegrityCache::new(BootMode::Recovery, Sha256Engine, &tpm);
            romstage.update_hash(&blob);
        })
        .join()
        .unwrap();
    });

    let mut ramstage = IntegrityCache::new(BootMode::Recovery, Sha256Engine, &tpm);
    assert!(ramstage.verify_hash(&blob));
    assert!(!ramstage.verify_hash(&blob[1..]));
}

#[test]
fn file_store_survives_reboot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec_hash.bin");
    let blob = b"MRC data persisted across a reboot";

    {
        let mut cache = IntegrityCache::new(BootMode::Recovery, Sha256Engine, FileStore::new(&path));
        assert!(matches!(
            cache.try_update_hash(blob).unwrap(),
            UpdateOutcome::Written(_)
        ));
    }

    let mut cache = IntegrityCache::new(BootMode::Recovery, Sha256Engine, FileStore::new(&path));
    assert!(cache.verify_hash(blob));
    assert!(!cache.verify_hash(b"something else"));

    assert!(cache.store_mut().reset().unwrap());
    assert!(!cache.verify_hash(blob));
}

#[test]
fn file_store_with_unreachable_directory_is_a_driver_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("missing").join("rec_hash.bin"));
    update_hash(b"data", &BootMode::Recovery, &Sha256Engine, &mut store);
    assert!(!store.path().exists());
    assert!(store.init().is_err());
}
