//! Persistence coordinator: turns a sealed match into one atomic write.

mod errors;
mod service;

pub use errors::FinalizeError;
pub use service::{MatchFinalizer, MatchFinalizerBuilder};
