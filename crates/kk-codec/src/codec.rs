use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};

/// Encode/decode pair for one object type.
///
/// Implementations must be stateless with respect to individual objects so
/// a single codec can be shared between a store and all of its watchers.
pub trait Codec<T>: Send + Sync {
    /// Media type of the encoded bytes, e.g. `application/yaml`.
    fn media_type(&self) -> &'static str;

    fn encode(&self, obj: &T) -> CodecResult<Vec<u8>>;

    fn decode(&self, data: &[u8]) -> CodecResult<T>;
}

/// YAML codec backed by `serde_yaml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlCodec;

impl YamlCodec {
    pub const MEDIA_TYPE: &'static str = "application/yaml";
}

impl<T> Codec<T> for YamlCodec
where
    T: Serialize + DeserializeOwned,
{
    fn media_type(&self) -> &'static str {
        Self::MEDIA_TYPE
    }

    fn encode(&self, obj: &T) -> CodecResult<Vec<u8>> {
        serde_yaml::to_string(obj)
            .map(String::into_bytes)
            .map_err(|e| CodecError::Serialization {
                media_type: Self::MEDIA_TYPE,
                reason: e.to_string(),
            })
    }

    fn decode(&self, data: &[u8]) -> CodecResult<T> {
        serde_yaml::from_slice(data).map_err(|e| CodecError::Deserialization {
            media_type: Self::MEDIA_TYPE,
            reason: e.to_string(),
        })
    }
}

/// JSON codec backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec {
    /// Emit indented output.
    pub pretty: bool,
}

impl JsonCodec {
    pub const MEDIA_TYPE: &'static str = "application/json";

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn media_type(&self) -> &'static str {
        Self::MEDIA_TYPE
    }

    fn encode(&self, obj: &T) -> CodecResult<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(obj)
        } else {
            serde_json::to_vec(obj)
        };
        encoded.map_err(|e| CodecError::Serialization {
            media_type: Self::MEDIA_TYPE,
            reason: e.to_string(),
        })
    }

    fn decode(&self, data: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(data).map_err(|e| CodecError::Deserialization {
            media_type: Self::MEDIA_TYPE,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kk_types::{DynamicObject, Object, ObjectMeta, TypeMeta};
    use std::sync::Arc;

    fn sample() -> DynamicObject {
        DynamicObject::new(
            TypeMeta::new("v1", "ConfigMap"),
            ObjectMeta::namespaced("default", "test-config"),
        )
        .with_field("data", serde_json::json!({"a": "1"}))
    }

    #[test]
    fn yaml_output_is_human_readable() {
        let bytes = Codec::<DynamicObject>::encode(&YamlCodec, &sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("kind: ConfigMap"));
        assert!(text.contains("name: test-config"));
    }

    #[test]
    fn yaml_decode_reads_encoded_object() {
        let codec = YamlCodec;
        let bytes = codec.encode(&sample()).unwrap();
        let back: DynamicObject = codec.decode(&bytes).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn json_decode_reads_encoded_object() {
        let codec = JsonCodec::pretty();
        let bytes = codec.encode(&sample()).unwrap();
        assert!(bytes.contains(&b'\n'));
        let back: DynamicObject = codec.decode(&bytes).unwrap();
        assert_eq!(back.name(), "test-config");
    }

    #[test]
    fn decode_garbage_reports_media_type() {
        let err = Codec::<DynamicObject>::decode(&YamlCodec, b"metadata: [unclosed").unwrap_err();
        assert!(matches!(
            err,
            CodecError::Deserialization { media_type: "application/yaml", .. }
        ));

        let err = Codec::<DynamicObject>::decode(&JsonCodec::default(), b"{").unwrap_err();
        assert!(err.to_string().starts_with("application/json decode error"));
    }

    #[test]
    fn usable_as_trait_object() {
        let codec: Arc<dyn Codec<DynamicObject>> = Arc::new(YamlCodec);
        assert_eq!(codec.media_type(), "application/yaml");
        let bytes = codec.encode(&sample()).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), sample());
    }
}
