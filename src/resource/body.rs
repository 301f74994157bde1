//! How a request body becomes a typed value.

use std::fmt;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::resource::args::{Args, ArgsBinder};

/// Declared request body shape.
pub enum BodyShape<B> {
    /// No body is decoded; the handler sees `None`.
    None,
    /// Raw request bytes, bypassing every codec.
    Raw(fn(Bytes) -> B),
    /// Decoded through the codec registry, then deserialized with serde.
    /// `form` is used when a urlencoded post has no registered decoder.
    Structured {
        from_value: fn(Value) -> Result<B, serde_json::Error>,
        form: Option<ArgsBinder<B>>,
    },
}

impl<B> Clone for BodyShape<B> {
    fn clone(&self) -> Self {
        match self {
            BodyShape::None => BodyShape::None,
            BodyShape::Raw(from_bytes) => BodyShape::Raw(*from_bytes),
            BodyShape::Structured { from_value, form } => BodyShape::Structured {
                from_value: *from_value,
                form: form.clone(),
            },
        }
    }
}

impl<B> fmt::Debug for BodyShape<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyShape::None => f.write_str("None"),
            BodyShape::Raw(_) => f.write_str("Raw"),
            BodyShape::Structured { form, .. } => f
                .debug_struct("Structured")
                .field("form", form)
                .finish_non_exhaustive(),
        }
    }
}

impl<B: DeserializeOwned> BodyShape<B> {
    pub fn structured() -> Self {
        BodyShape::Structured {
            from_value: serde_json::from_value::<B>,
            form: None,
        }
    }
}

impl<B: DeserializeOwned + Args> BodyShape<B> {
    /// Structured body that also accepts urlencoded form posts.
    pub fn form() -> Self {
        BodyShape::Structured {
            from_value: serde_json::from_value::<B>,
            form: Some(ArgsBinder::compile()),
        }
    }
}

impl BodyShape<Bytes> {
    pub fn raw() -> Self {
        BodyShape::Raw(|bytes| bytes)
    }
}

impl BodyShape<Vec<u8>> {
    pub fn raw_vec() -> Self {
        BodyShape::Raw(|bytes| bytes.to_vec())
    }
}

impl<B> BodyShape<B> {
    pub fn is_declared(&self) -> bool {
        !matches!(self, BodyShape::None)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, BodyShape::Raw(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert!(!BodyShape::<()>::None.is_declared());
        assert!(BodyShape::<Bytes>::raw().is_raw());
        assert!(BodyShape::<serde_json::Value>::structured().is_declared());

        let BodyShape::Raw(from_bytes) = BodyShape::<Vec<u8>>::raw_vec() else {
            panic!("expected raw shape");
        };
        assert_eq!(from_bytes(Bytes::from_static(b"ab")), b"ab".to_vec());
    }
}
