//! Encrypted credential-blob store.
//!
//! One JSON file maps account ids to sealed session tokens and phone
//! numbers. Blobs are opaque to this layer; the authenticator decides
//! whether a restored token is still accepted by the platform.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    crypto::{self, KEY_LEN},
    domain::AccountId,
    Result,
};

/// Decrypted credential blob for one account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSession {
    pub session: String,
    pub phone: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SealedRecord {
    session: String,
    phone: String,
}

/// File-backed store of encrypted per-account sessions.
///
/// All operations are keyed by account id and safe to call concurrently
/// from independent account flows; the interior lock is held only for the
/// duration of one read or one write+persist, so one account's write never
/// corrupts another's read.
pub struct SessionStore {
    path: PathBuf,
    key: [u8; KEY_LEN],
    records: RwLock<HashMap<String, SealedRecord>>,
}

impl SessionStore {
    /// Open the store at `path`, loading the key from `key_file` (a fresh
    /// key is generated on first use).
    pub fn open(path: impl Into<PathBuf>, key_file: &Path) -> Result<Self> {
        let path = path.into();
        let key = crypto::load_or_generate_key(key_file)?;
        let records = load_records(&path);
        Ok(Self {
            path,
            key,
            records: RwLock::new(records),
        })
    }

    /// Seal and persist a session token for `account`. Overwrites any
    /// previous blob for the same account.
    pub fn save(&self, account: &AccountId, session: &str, phone: &str) -> Result<()> {
        let record = SealedRecord {
            session: BASE64.encode(crypto::seal(&self.key, session.as_bytes())?),
            phone: BASE64.encode(crypto::seal(&self.key, phone.as_bytes())?),
        };

        let mut records = self.records.write().expect("session store lock poisoned");
        records.insert(account.0.clone(), record);
        self.persist(&records)
    }

    /// Load and unseal the blob for `account`.
    ///
    /// Returns `None` when no blob exists or the stored one cannot be
    /// decrypted (key rotation, corruption); an unreadable blob is treated
    /// the same as an absent one so the caller falls back to a fresh login.
    pub fn load(&self, account: &AccountId) -> Option<StoredSession> {
        let records = self.records.read().expect("session store lock poisoned");
        let record = records.get(&account.0)?;

        match self.unseal(record) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(account = %account, error = %e, "failed to decrypt stored session");
                None
            }
        }
    }

    /// Remove the blob for `account`, if any. Used when the platform
    /// rejects a restored token: it will never succeed again.
    pub fn delete(&self, account: &AccountId) -> Result<()> {
        let mut records = self.records.write().expect("session store lock poisoned");
        if records.remove(&account.0).is_some() {
            self.persist(&records)?;
        }
        Ok(())
    }

    /// Account ids with a stored blob.
    pub fn accounts(&self) -> Vec<AccountId> {
        let records = self.records.read().expect("session store lock poisoned");
        records.keys().map(|k| AccountId::new(k.clone())).collect()
    }

    fn unseal(&self, record: &SealedRecord) -> Result<StoredSession> {
        let session = crypto::open(
            &self.key,
            &BASE64
                .decode(&record.session)
                .map_err(|e| crate::Error::Crypto(e.to_string()))?,
        )?;
        let phone = crypto::open(
            &self.key,
            &BASE64
                .decode(&record.phone)
                .map_err(|e| crate::Error::Crypto(e.to_string()))?,
        )?;
        Ok(StoredSession {
            session: String::from_utf8_lossy(&session).into_owned(),
            phone: String::from_utf8_lossy(&phone).into_owned(),
        })
    }

    fn persist(&self, records: &HashMap<String, SealedRecord>) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

fn load_records(path: &Path) -> HashMap<String, SealedRecord> {
    let Ok(contents) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    match serde_json::from_str(&contents) {
        Ok(records) => records,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "session file unreadable, starting empty");
            HashMap::new()
        }
    }
}
