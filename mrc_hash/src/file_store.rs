// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A file standing in for the TPM NV space
//!
//! Host tooling has no TPM to talk to, so the recovery hash space is kept in
//! a small file instead.  The file holds a single record:
//!
//! | Offset | Size | Contents                                  |
//! |--------|------|-------------------------------------------|
//! | 0x00   | 4    | `RHSP`                                    |
//! | 0x04   | 4    | NV index, little-endian                   |
//! | 0x08   | 32   | digest                                    |
//! | 0x28   | 4    | CRC32/MPEG-2 of bytes 0x00..0x28, little-endian |
//!
//! so that a truncated or hand-edited file is reported as corrupt rather
//! than being read back as a digest.

use crate::{digest::Digest32, store::SecureStore, store::StoreError};
use byteorder::LittleEndian;
use crc_any::CRCu32;
use log::trace;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use zerocopy::{AsBytes, FromBytes, U32};

const MAGIC: [u8; 4] = *b"RHSP";
const CRC_OFFSET: usize = 0x28;

#[derive(Debug, AsBytes, FromBytes)]
#[repr(C)]
struct SpaceRecord {
    magic: [u8; 4],
    nv_index: U32<LittleEndian>,
    digest: Digest32,
    crc: U32<LittleEndian>,
}

fn record_crc(bytes: &[u8]) -> u32 {
    let mut crc = CRCu32::crc32mpeg2();
    crc.digest(&bytes[..CRC_OFFSET]);
    crc.get_crc()
}

impl SpaceRecord {
    fn new(nv_index: u32, digest: &Digest32) -> Self {
        let mut record = SpaceRecord {
            magic: MAGIC,
            nv_index: U32::new(nv_index),
            digest: *digest,
            crc: U32::new(0),
        };
        record.crc = U32::new(record_crc(record.as_bytes()));
        record
    }

    fn decode(bytes: &[u8], nv_index: u32) -> Result<Digest32, StoreError> {
        if bytes.len() != std::mem::size_of::<SpaceRecord>() {
            return Err(StoreError::Corrupt(format!(
                "expected {} bytes, found {}",
                std::mem::size_of::<SpaceRecord>(),
                bytes.len()
            )));
        }
        let record = SpaceRecord::read_from(bytes)
            .ok_or_else(|| StoreError::Corrupt("could not read record".to_string()))?;
        if record.magic != MAGIC {
            return Err(StoreError::Corrupt(format!(
                "bad magic {}",
                hex::encode(record.magic)
            )));
        }
        if record.nv_index.get() != nv_index {
            return Err(StoreError::Corrupt(format!(
                "record is for NV index {:#x}, expected {nv_index:#x}",
                record.nv_index.get()
            )));
        }
        let expected = record_crc(bytes);
        if record.crc.get() != expected {
            return Err(StoreError::Corrupt(format!(
                "CRC mismatch: stored {:08x}, computed {expected:08x}",
                record.crc.get()
            )));
        }
        Ok(record.digest)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    nv_index: u32,
    initialized: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            nv_index: recovery_hash_space::NV_INDEX,
            initialized: false,
        }
    }

    pub fn with_nv_index(mut self, nv_index: u32) -> Self {
        self.nv_index = nv_index;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn nv_index(&self) -> u32 {
        self.nv_index
    }

    /// Removes the record, so the space reads as never written
    ///
    /// Returns `false` if there was nothing to remove.
    pub fn reset(&mut self) -> Result<bool, StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SecureStore for FileStore {
    fn init(&mut self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                return Err(StoreError::Transport(format!(
                    "{} is not a directory",
                    dir.display()
                )));
            }
            _ => (),
        }
        if self.path.is_dir() {
            return Err(StoreError::Transport(format!(
                "{} is a directory",
                self.path.display()
            )));
        }
        self.initialized = true;
        Ok(())
    }

    fn write_recovery_slot(&mut self, digest: &Digest32) -> Result<(), StoreError> {
        if !self.initialized {
            return Err(StoreError::NotInitialized);
        }
        let record = SpaceRecord::new(self.nv_index, digest);
        let tmp = self.temp_path();
        trace!("writing NV index {:#x} via {}", self.nv_index, tmp.display());
        let result = write_synced(&tmp, record.as_bytes())
            .and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_recovery_slot(&mut self) -> Result<Digest32, StoreError> {
        if !self.initialized {
            return Err(StoreError::NotInitialized);
        }
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::SlotUndefined)
            }
            Err(e) => return Err(e.into()),
        };
        trace!("read {} bytes from {}", bytes.len(), self.path.display());
        SpaceRecord::decode(&bytes, self.nv_index)
    }
}
