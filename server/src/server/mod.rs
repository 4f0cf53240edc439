// polypong/server/src/server/mod.rs
pub mod game_loop;
pub mod instance;
pub mod room;
