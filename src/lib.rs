//! Purpose: Client library for the monetized `/process` API.
//! Exports: `api` (public client surface), `core` (errors, license rules).
//! Role: Library crate; applications build a `LicensedClient` and call it.
//! Invariants: Library code never panics on bad input; failures are `Error` values.
//! Invariants: The crate installs no logging subscriber; it only emits `tracing` events.
pub mod api;
pub mod core;
