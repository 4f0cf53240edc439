// polypong/server/src/systems/physics/mod.rs
pub mod collision;
pub mod geometry;
