// polypong/server/src/systems/mod.rs
pub mod physics;
pub mod simulation;
