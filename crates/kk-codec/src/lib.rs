//! Object codecs for the KubeKey object store.
//!
//! The store is encoding-agnostic: it only needs an encode/decode pair per
//! object type. This crate defines that contract ([`Codec`]) and the two
//! encodings used in practice:
//!
//! - [`YamlCodec`] -- the on-disk format of resource files (`.yaml`)
//! - [`JsonCodec`] -- compact encoding for wire payloads and tests

pub mod codec;
pub mod error;

pub use codec::{Codec, JsonCodec, YamlCodec};
pub use error::{CodecError, CodecResult};
