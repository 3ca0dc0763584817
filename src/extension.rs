//! User-extended answer types.
//!
//! Clients can carry their own value types inside answers by implementing
//! [`ExtensionValue`]. A value participates in `eq`/`ne` comparisons through
//! `eq_dyn`; a type with a total order additionally implements `cmp_dyn` and
//! can then be used with the ordering operators.
//!
//! Decoding is driven by a [`TypeRegistry`]: an explicit value (never a
//! process-global) mapping stable type names to decoder closures, so tests
//! can register and deregister types without ordering hazards.

use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::CodecError;

/// A user-extended answer value.
///
/// Implementations must have total equality over values of the same
/// `type_name`. Types that also have a total order override `cmp_dyn`;
/// the default (`None`) marks the type as equatable-only.
pub trait ExtensionValue: std::fmt::Debug + Send + Sync {
    /// Stable name used as the registry key and the serialized discriminator.
    fn type_name(&self) -> &str;

    /// Equality against another extension value of the same type.
    ///
    /// Called only after the engine has checked that both sides share a
    /// `type_name`; implementations downcast via `as_any`.
    fn eq_dyn(&self, other: &dyn ExtensionValue) -> bool;

    /// Total order against another extension value of the same type, or
    /// `None` if the type is equatable-only.
    fn cmp_dyn(&self, other: &dyn ExtensionValue) -> Option<Ordering> {
        let _ = other;
        None
    }

    /// Canonical encoding of this value's payload.
    fn encode(&self) -> serde_json::Value;

    fn clone_dyn(&self) -> Box<dyn ExtensionValue>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn ExtensionValue> {
    fn clone(&self) -> Self {
        self.clone_dyn()
    }
}

/// Decoder closure: canonical payload → extension value.
pub type ExtensionDecoder =
    dyn Fn(&serde_json::Value) -> Result<Box<dyn ExtensionValue>, CodecError> + Send + Sync;

/// Registry of extension answer types, keyed by stable type name.
///
/// Encoding never consults the registry (the value itself carries its
/// encoder); decoding canonical rule files does.
#[derive(Default)]
pub struct TypeRegistry {
    decoders: DashMap<String, Arc<ExtensionDecoder>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for a type name, replacing any previous one.
    pub fn register<F>(&self, type_name: impl Into<String>, decoder: F)
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn ExtensionValue>, CodecError>
            + Send
            + Sync
            + 'static,
    {
        self.decoders.insert(type_name.into(), Arc::new(decoder));
    }

    /// Remove a registered type. Returns whether it was present.
    pub fn deregister(&self, type_name: &str) -> bool {
        self.decoders.remove(type_name).is_some()
    }

    /// Decode a payload for a registered type.
    pub fn decode(
        &self,
        type_name: &str,
        payload: &serde_json::Value,
    ) -> Result<Box<dyn ExtensionValue>, CodecError> {
        let decoder = self
            .decoders
            .get(type_name)
            .ok_or_else(|| CodecError::UnknownExtensionType {
                type_name: type_name.to_string(),
            })?;
        (decoder.value().as_ref())(payload)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.decoders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Grade(u8);

    impl ExtensionValue for Grade {
        fn type_name(&self) -> &str {
            "Grade"
        }

        fn eq_dyn(&self, other: &dyn ExtensionValue) -> bool {
            other
                .as_any()
                .downcast_ref::<Grade>()
                .is_some_and(|g| g == self)
        }

        fn cmp_dyn(&self, other: &dyn ExtensionValue) -> Option<Ordering> {
            other
                .as_any()
                .downcast_ref::<Grade>()
                .map(|g| self.0.cmp(&g.0))
        }

        fn encode(&self) -> serde_json::Value {
            serde_json::json!(self.0)
        }

        fn clone_dyn(&self) -> Box<dyn ExtensionValue> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn grade_decoder(
        payload: &serde_json::Value,
    ) -> Result<Box<dyn ExtensionValue>, CodecError> {
        let raw = payload
            .as_u64()
            .ok_or_else(|| CodecError::ExtensionDecodeFailed {
                type_name: "Grade".to_string(),
                message: "expected an unsigned integer".to_string(),
            })?;
        Ok(Box::new(Grade(raw as u8)))
    }

    #[test]
    fn register_decode_deregister() {
        let registry = TypeRegistry::new();
        registry.register("Grade", grade_decoder);
        assert!(registry.contains("Grade"));

        let decoded = registry.decode("Grade", &serde_json::json!(4)).unwrap();
        assert_eq!(decoded.type_name(), "Grade");
        assert!(decoded.eq_dyn(&Grade(4)));

        assert!(registry.deregister("Grade"));
        assert!(!registry.deregister("Grade"));
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = TypeRegistry::new();
        let result = registry.decode("Grade", &serde_json::json!(4));
        assert!(matches!(
            result,
            Err(CodecError::UnknownExtensionType { .. })
        ));
    }

    #[test]
    fn decoder_errors_propagate() {
        let registry = TypeRegistry::new();
        registry.register("Grade", grade_decoder);
        let result = registry.decode("Grade", &serde_json::json!("not a number"));
        assert!(matches!(
            result,
            Err(CodecError::ExtensionDecodeFailed { .. })
        ));
    }
}
