pub mod health;
pub mod time_tracking;

pub use health::*;
pub use time_tracking::*;
