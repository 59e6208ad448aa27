//! Authentication for VoltDesk.
//!
//! Three concerns live here:
//! - [`tokens`] — JWT access/refresh issuance and rotation-aware verification
//! - [`password`] — argon2id password hashing
//! - [`reset`] — single-use password-reset tokens

pub mod claims;
pub mod password;
pub mod reset;
pub mod tokens;

pub use claims::Claims;
pub use tokens::TokenService;
