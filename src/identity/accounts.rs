//! Account credential store.
//!
//! All accounts live in a single `accounts` collection keyed by email, with the
//! password digest produced by the injected hash function. Verification
//! compares digests in constant time and reports the same failure for unknown
//! accounts and wrong passwords.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::query::QueryEngine;
use crate::storage::{Collection, SharedStore};

use super::password::PasswordHashFn;
use super::principal::Role;

const COLLECTION: &str = "accounts";

/// A stored account document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// One row of the admin work-time listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkSummary {
    pub email: String,
    pub role: Role,
    pub seconds_worked: i64,
}

/// Credential store over the shared document storage.
#[derive(Clone)]
pub struct AccountStore {
    accounts: Collection,
    hash: PasswordHashFn,
}

impl AccountStore {
    pub fn new(store: &SharedStore, hash: PasswordHashFn) -> AppResult<Self> {
        Ok(Self { accounts: store.collection(COLLECTION)?, hash })
    }

    /// Create an account. The email is the document id, so a second create for
    /// the same email fails with `Duplicate` and never overwrites.
    pub fn create(&self, email: &str, password: &str, role: Role) -> AppResult<Account> {
        let account = Account {
            email: email.to_string(),
            password_hash: (self.hash)(password),
            role,
        };
        let doc = serde_json::to_value(&account).map_err(internal)?;
        if !self.accounts.insert_new(email, doc)? {
            return Err(AppError::duplicate("duplicate_account", "account already exists"));
        }
        debug!(target: "timecard::identity", "account created email={} role={}", email, role.as_str());
        Ok(account)
    }

    /// Fetch an account by email.
    pub fn get(&self, email: &str) -> AppResult<Option<Account>> {
        match self.accounts.get(email) {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    /// Check a password against the stored digest.
    ///
    /// Unknown account and digest mismatch produce the identical error, so a
    /// caller cannot probe which emails exist through the login path.
    pub fn verify(&self, email: &str, password: &str) -> AppResult<Account> {
        let denied = || AppError::auth_failed("auth_failed", "invalid credentials");
        let account = self.get(email)?.ok_or_else(denied)?;
        let candidate = (self.hash)(password);
        if !bool::from(candidate.as_bytes().ct_eq(account.password_hash.as_bytes())) {
            return Err(denied());
        }
        Ok(account)
    }

    /// Every account with its accumulated work time, ordered by email.
    ///
    /// Password digests never leave this function.
    pub fn list_with_work_time(&self, query: &QueryEngine) -> AppResult<Vec<WorkSummary>> {
        let mut out = Vec::with_capacity(self.accounts.len());
        for doc in self.accounts.all() {
            let account: Account = decode(doc)?;
            let seconds_worked = query.seconds_worked(&account.email)?;
            out.push(WorkSummary { email: account.email, role: account.role, seconds_worked });
        }
        out.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(out)
    }
}

fn decode(doc: serde_json::Value) -> AppResult<Account> {
    serde_json::from_value(doc).map_err(|e| AppError::Storage {
        code: "storage_error".into(),
        message: format!("corrupt account document: {}", e),
    })
}

fn internal(e: serde_json::Error) -> AppError {
    AppError::Internal { code: "internal_error".into(), message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::password::sha256_hex;
    use crate::records::RecordStore;

    fn store() -> (tempfile::TempDir, SharedStore) {
        let tmp = tempfile::tempdir().unwrap();
        let shared = SharedStore::open(tmp.path()).unwrap();
        (tmp, shared)
    }

    #[test]
    fn create_get_and_duplicate() {
        let (_tmp, shared) = store();
        let accounts = AccountStore::new(&shared, sha256_hex).unwrap();
        accounts.create("a@b.c", "secret1", Role::Employee).unwrap();
        let got = accounts.get("a@b.c").unwrap().unwrap();
        assert_eq!(got.email, "a@b.c");
        assert_eq!(got.password_hash, sha256_hex("secret1"));
        let dup = accounts.create("a@b.c", "other", Role::Admin).unwrap_err();
        assert_eq!(dup.code_str(), "duplicate_account");
        // Original credentials untouched
        assert!(accounts.verify("a@b.c", "secret1").is_ok());
    }

    #[test]
    fn verify_rejects_unknown_and_wrong_password_identically() {
        let (_tmp, shared) = store();
        let accounts = AccountStore::new(&shared, sha256_hex).unwrap();
        accounts.create("a@b.c", "secret1", Role::Employee).unwrap();
        let unknown = accounts.verify("nobody@b.c", "secret1").unwrap_err();
        let wrong = accounts.verify("a@b.c", "wrong").unwrap_err();
        assert_eq!(unknown.code_str(), wrong.code_str());
        assert_eq!(unknown.message(), wrong.message());
    }

    #[test]
    fn work_time_listing_is_sorted_and_hash_free() {
        let (_tmp, shared) = store();
        let accounts = AccountStore::new(&shared, sha256_hex).unwrap();
        let records = RecordStore::new(&shared).unwrap();
        accounts.create("zoe@b.c", "secret1", Role::Employee).unwrap();
        accounts.create("amy@b.c", "secret2", Role::Admin).unwrap();
        records
            .create("amy@b.c", None, Some(3600), "morning shift")
            .unwrap();
        records
            .create("amy@b.c", None, Some(1800), "afternoon")
            .unwrap();
        let query = QueryEngine::new(records);
        let listing = accounts.list_with_work_time(&query).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].email, "amy@b.c");
        assert_eq!(listing[0].seconds_worked, 5400);
        assert_eq!(listing[1].email, "zoe@b.c");
        assert_eq!(listing[1].seconds_worked, 0);
    }
}
