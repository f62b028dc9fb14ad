use sha2::{Digest, Sha256};

/// Password digest function injected into the account store.
///
/// The store never sees plaintext handling rules beyond this signature, so
/// deployments can swap the digest without touching credential logic.
pub type PasswordHashFn = fn(&str) -> String;

/// Default digest: lowercase hex SHA-256 of the raw password bytes.
pub fn sha256_hex(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
