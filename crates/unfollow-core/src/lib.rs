pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod import;
pub mod inspect;
pub mod io;
pub mod limiter;
pub mod machine;
pub mod paths;
pub mod reconcile;
pub mod store;
pub mod types;

pub use error::{Result, UnfollowError};
