//! Snapshot storage on sled
//!
//! The registry is persisted as one bincode-encoded [`RegistrySnapshot`]
//! stored next to its SHA-256 digest. Loading recomputes the digest before
//! decoding, so a torn or tampered write surfaces as [`StoreError::Corrupted`]
//! instead of a half-valid registry.

use crate::error::StoreError;
use crate::registry::RegistrySnapshot;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

const SNAPSHOT_KEY: &[u8] = b"registry_snapshot";
const DIGEST_KEY: &[u8] = b"registry_snapshot_sha256";

pub type Result<T> = std::result::Result<T, StoreError>;

/// sled-backed registry snapshot store
pub struct SnapshotStore {
    db: sled::Db,
}

impl SnapshotStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening snapshot store at {}", path.display());
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Store that lives only as long as the handle
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn save(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        let bytes = bincode::serialize(snapshot)?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();

        // both keys land together or not at all
        self.db.transaction::<_, _, ()>(|tx| {
            tx.insert(SNAPSHOT_KEY, bytes.as_slice())?;
            tx.insert(DIGEST_KEY, &digest[..])?;
            Ok(())
        })
        .map_err(|e| match e {
            sled::transaction::TransactionError::Storage(e) => StoreError::Storage(e),
            sled::transaction::TransactionError::Abort(()) => {
                StoreError::Inconsistent("snapshot write aborted".into())
            }
        })?;
        self.db.flush()?;

        debug!(
            bytes = bytes.len(),
            digest = %hex::encode(digest),
            validators = snapshot.ledgers.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Last saved snapshot, or `None` for a fresh store
    pub fn load(&self) -> Result<Option<RegistrySnapshot>> {
        let Some(bytes) = self.db.get(SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        let stored = self.db.get(DIGEST_KEY)?.ok_or(StoreError::Corrupted)?;

        let digest = Sha256::digest(&bytes);
        if &stored[..] != digest.as_slice() {
            return Err(StoreError::Corrupted);
        }

        let snapshot: RegistrySnapshot = bincode::deserialize(&bytes)?;
        debug!(validators = snapshot.ledgers.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    #[cfg(test)]
    fn overwrite_raw(&self, bytes: &[u8]) -> Result<()> {
        self.db.insert(SNAPSHOT_KEY, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ValidatorRegistry;
    use crate::types::Address;

    fn snapshot() -> RegistrySnapshot {
        let mut registry = ValidatorRegistry::new();
        registry
            .initialize(21, 200, 10, Address::from_index(999), 80)
            .unwrap();
        registry
            .register_validator(Address::from_index(1), Address::from_index(101), 50, 10)
            .unwrap();
        registry.snapshot()
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let store = SnapshotStore::temporary().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let store = SnapshotStore::temporary().unwrap();
        let snapshot = snapshot();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_tampered_snapshot_detected() {
        let store = SnapshotStore::temporary().unwrap();
        store.save(&snapshot()).unwrap();
        store.overwrite_raw(b"garbage").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupted)));
    }
}
