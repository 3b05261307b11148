mod async_result;
mod failure;
mod notifier;
mod outcome;
mod snapshot;
mod stream_ext;
pub mod mock;

#[cfg(test)]
mod unit_tests;

pub use async_result::*;
pub use failure::*;
pub use notifier::*;
pub use outcome::*;
pub use snapshot::*;
pub use stream_ext::*;
