//! Bearer-credential guard for the HTTP boundary.
//!
//! Handlers call one of the thin wrappers with the request headers; the guard
//! extracts the bearer token, verifies it against the issuer and applies the
//! role requirement. Distinct failures keep distinct error kinds so the
//! boundary can map them to their status codes.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::{AppError, AppResult};

use super::principal::{Principal, Role};
use super::token::TokenIssuer;

/// Role gate applied after token verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any verified principal passes.
    Any,
    /// Only `Role::Admin` principals pass.
    Admin,
}

/// Verify the bearer credential in `headers` and apply `requirement`.
pub fn require(
    issuer: &TokenIssuer,
    headers: &HeaderMap,
    requirement: RoleRequirement,
) -> AppResult<Principal> {
    let token = bearer_token(headers)?;
    let claims = issuer.verify(token)?;
    let principal = claims.principal();
    if requirement == RoleRequirement::Admin && principal.role != Role::Admin {
        return Err(AppError::unauthorized("not_admin", "admin role required"));
    }
    Ok(principal)
}

/// Guard for endpoints open to any logged-in account.
pub fn authenticated(issuer: &TokenIssuer, headers: &HeaderMap) -> AppResult<Principal> {
    require(issuer, headers, RoleRequirement::Any)
}

/// Guard for admin-only endpoints.
pub fn admin(issuer: &TokenIssuer, headers: &HeaderMap) -> AppResult<Principal> {
    require(issuer, headers, RoleRequirement::Admin)
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let missing = || AppError::unauthenticated("no_token", "missing bearer credential");
    let value = headers.get(AUTHORIZATION).ok_or_else(missing)?;
    let text = value.to_str().map_err(|_| missing())?;
    // Scheme is matched case-sensitively, same as the clients this serves.
    let token = text.strip_prefix("Bearer ").ok_or_else(missing)?;
    if token.is_empty() {
        return Err(missing());
    }
    Ok(token)
}
