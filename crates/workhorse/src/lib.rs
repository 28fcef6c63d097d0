#![doc = include_str!("../README.md")]

mod error;
mod logger;
mod pool;
mod resource;
mod runtime;
mod state;

pub use crate::error::*;
pub use crate::logger::*;
pub use crate::pool::*;
pub use crate::resource::*;
#[cfg(feature = "async-tokio")]
pub use crate::runtime::*;
pub use crate::state::*;
