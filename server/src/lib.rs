// polypong/server/src/lib.rs

pub mod client;
pub mod core;
pub mod entities;
pub mod network;
pub mod server;
pub mod systems;

pub use crate::server::instance::PolyPongServer;
pub use crate::systems::simulation::{Simulation, SimulationHooks};
