//! Data models shared between the engine and its host

pub mod events;
pub mod outcome;
pub mod scenario;
pub mod window;

pub use events::*;
pub use outcome::*;
pub use scenario::*;
pub use window::*;
