#![forbid(unsafe_code)]

pub mod completion;
pub mod model;
pub mod payload;
pub mod progress;
pub mod time;
pub mod validation;

pub use time::Clock;
