// polypong/server/src/entities/mod.rs
pub mod ball;
pub mod paddle;
pub mod polygon;

pub use ball::Ball;
pub use paddle::Paddle;
pub use polygon::Polygon;
