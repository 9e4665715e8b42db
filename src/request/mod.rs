//! Synthetic request documents and the factory that builds them.

mod document;
mod factory;

pub use document::*;
pub use factory::*;
