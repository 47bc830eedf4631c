// crates/core/src/lib.rs
pub mod config;
pub mod error;
pub mod jobs;
pub mod pipelines;

pub use config::*;
pub use error::*;
pub use jobs::*;
pub use pipelines::*;
