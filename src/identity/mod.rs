//! Central identity management for timecard: accounts, signed session tokens
//! and the bearer-credential guard used by the HTTP boundary.
//! Keep the public surface thin and split implementation across sub-modules.

mod accounts;
mod guard;
mod password;
mod principal;
mod token;

pub use accounts::{Account, AccountStore, WorkSummary};
pub use guard::{admin, authenticated, require, RoleRequirement};
pub use password::{sha256_hex, PasswordHashFn};
pub use principal::{Principal, Role};
pub use token::{Claims, TokenIssuer, TOKEN_TTL_SECS};
