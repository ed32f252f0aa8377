pub mod annotate;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod label;
pub mod utils;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Opts;
pub use error::FaceError;
pub use extract::{Detection, Embedding, FaceBox, FeatureExtractor};
pub use label::{NONE_LABEL, ReferenceItem};
