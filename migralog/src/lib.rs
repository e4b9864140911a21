#![forbid(unsafe_code)]

mod aggregate;
pub mod config;
mod engine;
mod error;
mod event;
pub mod legacy;
mod store;

pub use aggregate::*;
pub use config::{StoreBuilder, StoreOptions};
pub use engine::*;
pub use error::*;
pub use event::*;
pub use store::*;
