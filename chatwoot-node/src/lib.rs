pub mod config;
pub mod error;
pub mod locator;
pub mod node;
pub mod operations;
pub mod params;
pub mod search;
pub mod server;
pub mod transport;
pub mod trigger;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use error::NodeError;
pub use node::{ChatwootNode, NodeOutput, OutputItem};
pub use operations::Operation;
pub use transport::{ChatwootClient, Transport};
