pub mod format;
pub mod jwt;
pub mod time;

pub use format::*;
pub use jwt::*;
pub use time::*;
