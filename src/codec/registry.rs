//! Codec lookup by content type.
//!
//! # Responsibilities
//! - Map content types to decode/encode function pairs
//! - Decode request bytes into a declared body shape
//! - Encode reply bodies for the negotiated content type
//!
//! # Design Decisions
//! - Last registration for a content type wins
//! - Registration takes `&mut self`; once the registry is shared through an
//!   `Arc` it can no longer change
//! - Decoders produce a `serde_json::Value` tree so any format can feed serde shapes

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::codec::{essence, is_form, json, APPLICATION_JSON};
use crate::http::request::BodyError;
use crate::http::response::ReplyBody;
use crate::resource::args::ArgumentBindError;
use crate::resource::body::BodyShape;

/// Decodes raw body bytes into a format-neutral value tree.
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<Value, CodecError> + Send + Sync>;

/// Encodes a value tree into body bytes.
pub type EncodeFn = Arc<dyn Fn(&Value) -> Result<Vec<u8>, CodecError> + Send + Sync>;

/// Errors raised while decoding or encoding bodies.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec is registered for the content type and no fallback applies.
    #[error("no codec registered for content type {0:?}")]
    UnknownContentType(String),

    /// Body bytes are not valid for the content type.
    #[error("malformed body: {0}")]
    Parse(#[source] serde_json::Error),

    /// Body parsed but does not fit the declared shape.
    #[error("body does not match the declared shape: {0}")]
    Shape(#[source] serde_json::Error),

    /// Form fields could not be bound onto the declared shape.
    #[error("form fields do not match the declared shape: {0}")]
    Form(#[from] ArgumentBindError),

    /// Reply value could not be serialized.
    #[error("failed to serialize body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Body bytes could not be read.
    #[error(transparent)]
    Body(#[from] BodyError),

    /// Error raised by a custom codec.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl CodecError {
    /// Wrap an error from a custom codec.
    pub fn custom(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(err.into())
    }
}

/// A decode/encode pair registered under one content type.
#[derive(Clone)]
pub struct Codec {
    content_type: String,
    decode: DecodeFn,
    encode: EncodeFn,
}

impl Codec {
    /// Content type (essence) this codec is registered under.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        (self.decode)(bytes)
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        (self.encode)(value)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Keyed collection of codecs.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Codec>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Registry with the default JSON codec installed.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(APPLICATION_JSON, json::decode, json::encode);
        registry
    }

    /// Registry with no codecs at all.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register a codec, replacing any existing entry for the content type.
    pub fn register<D, E>(&mut self, content_type: &str, decode: D, encode: E) -> &mut Self
    where
        D: Fn(&[u8]) -> Result<Value, CodecError> + Send + Sync + 'static,
        E: Fn(&Value) -> Result<Vec<u8>, CodecError> + Send + Sync + 'static,
    {
        let key = essence(content_type);
        if self.codecs.contains_key(&key) {
            tracing::debug!(content_type = %key, "Replacing registered codec");
        }
        self.codecs.insert(
            key.clone(),
            Codec {
                content_type: key,
                decode: Arc::new(decode),
                encode: Arc::new(encode),
            },
        );
        self
    }

    /// First registered decoder matching any candidate, in candidate order.
    pub fn lookup_decoder<S: AsRef<str>>(&self, candidates: &[S]) -> Option<&Codec> {
        candidates
            .iter()
            .find_map(|candidate| self.codecs.get(&essence(candidate.as_ref())))
    }

    /// Encoder registered for the content type.
    pub fn lookup_encoder(&self, content_type: &str) -> Option<&Codec> {
        self.codecs.get(&essence(content_type))
    }

    /// Registered content types, in no particular order.
    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    /// Decode request bytes into the declared body shape.
    ///
    /// `content_types` are the request's `Content-Type` values; an empty list
    /// means the wire default (`application/json`). `form` holds the parsed
    /// urlencoded fields used when no decoder matches a form submission.
    pub fn decode_body<B>(
        &self,
        shape: &BodyShape<B>,
        bytes: Bytes,
        content_types: &[String],
        form: &HashMap<String, String>,
    ) -> Result<Option<B>, CodecError> {
        let (from_value, form_binder) = match shape {
            BodyShape::None => return Ok(None),
            BodyShape::Raw(from_bytes) => return Ok(Some(from_bytes(bytes))),
            BodyShape::Structured { from_value, form } => (from_value, form),
        };

        let decoder = if content_types.is_empty() {
            self.lookup_decoder(&[APPLICATION_JSON])
        } else {
            self.lookup_decoder(content_types)
        };

        if let Some(codec) = decoder {
            let value = codec.decode(&bytes)?;
            return from_value(value).map(Some).map_err(CodecError::Shape);
        }

        let form_request = content_types.iter().any(|content_type| is_form(content_type));
        match form_binder {
            Some(binder) if form_request => Ok(Some(binder.bind(form)?)),
            _ => Err(CodecError::UnknownContentType(
                content_types.first().cloned().unwrap_or_default(),
            )),
        }
    }

    /// Serialize a value with the encoder registered for `content_type`.
    pub fn encode_value<R: Serialize>(
        &self,
        value: &R,
        content_type: &str,
    ) -> Result<Vec<u8>, CodecError> {
        let codec = self
            .lookup_encoder(content_type)
            .ok_or_else(|| CodecError::UnknownContentType(content_type.to_string()))?;
        let tree = serde_json::to_value(value).map_err(CodecError::Serialize)?;
        codec.encode(&tree)
    }

    /// Encode a reply body. Raw bytes and streams pass through untouched.
    pub async fn encode_reply<R: Serialize>(
        &self,
        body: ReplyBody<R>,
        content_type: &str,
    ) -> Result<Bytes, CodecError> {
        match body {
            ReplyBody::Empty => Ok(Bytes::new()),
            ReplyBody::Bytes(bytes) => Ok(bytes),
            ReplyBody::Stream(stream) => axum::body::to_bytes(stream, usize::MAX)
                .await
                .map_err(|err| CodecError::Body(BodyError::Read(err))),
            ReplyBody::Value(value) => self.encode_value(&value, content_type).map(Bytes::from),
        }
    }
}
