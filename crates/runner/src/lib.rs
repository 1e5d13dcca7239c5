pub mod replay;
pub mod version;

pub use replay::{ReplayRecord, ReplayStats, replay, whitelists};
