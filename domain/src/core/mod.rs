//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors (catalog construction, keys)
//! - [`canonical`]: canonical JSON and SHA-256 content hashing
//! - [`string`]: UTF-8 safe string helpers used for previews and generated code

pub mod canonical;
pub mod error;
pub mod string;
