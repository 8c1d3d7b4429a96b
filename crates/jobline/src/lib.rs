#![doc = include_str!("../README.md")]

mod chunk;
mod config;
mod dispatch;
mod error;
mod job;
mod queue;

pub use crate::chunk::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::job::*;
pub use crate::queue::*;
