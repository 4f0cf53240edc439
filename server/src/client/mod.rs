// polypong/server/src/client/mod.rs
//! Client-side game host and the reconciliation of server snapshots.
pub mod interpolation;
pub mod session;
