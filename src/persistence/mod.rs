//! Persistence layer: directory layout and identifier codecs.

pub mod codec;
pub mod layout;

pub use codec::{IdentifierCodec, JsonCodec, ParseCodec, StringCodec};
pub use layout::Manifest;
