//! Purpose: Define the public Rust API boundary for the monetized client.
//! Exports: `LicensedClient`, `StatusPolicy`, `Tier`, and the error types.
//! Role: Public, additive-only surface; wire helpers stay private.
//! Invariants: Request/response envelope types are not exposed.

mod client;
mod envelope;

pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::license::{Tier, license_matches};
pub use client::{DEFAULT_API_ENDPOINT, LicensedClient, StatusPolicy};
