// polypong/server/src/network/mod.rs
pub mod connection;
pub mod protocol;
pub mod routes;
