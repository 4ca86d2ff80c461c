pub mod amount;
pub mod entities;
pub mod events;
pub mod keys;
pub mod outcome;

pub use entities::*;
pub use events::*;
pub use outcome::*;
