//! Per-request failures and the replies they map to.

use axum::http::StatusCode;
use thiserror::Error;

use crate::codec::CodecError;
use crate::pipeline::reply::HandlerFault;
use crate::resource::ArgumentBindError;

pub const ARGS_DECODE_FAILED: &str = "Bad Request: failed parse expected URL parameters";
pub const BODY_DECODE_FAILED: &str =
    "Bad Request: Failed to decode request body for the provided Content-Type";
pub const BODY_ENCODE_FAILED: &str = "Internal Server Error - Failed to encode response body";
pub const HANDLER_FAULT: &str = "Internal Server Error";
pub const NOT_COMPLETED: &str = "Internal Server Error: Failed to complete";

/// Failures recovered inside the pipeline. None of these escape a request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("argument binding failed: {0}")]
    ArgumentBind(#[from] ArgumentBindError),

    #[error("body decoding failed: {0}")]
    BodyDecode(#[source] CodecError),

    #[error("handler fault: {0}")]
    HandlerFault(#[from] HandlerFault),

    #[error("body encoding failed: {0}")]
    BodyEncode(#[source] CodecError),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::ArgumentBind(_) | PipelineError::BodyDecode(_) => StatusCode::BAD_REQUEST,
            PipelineError::HandlerFault(_) | PipelineError::BodyEncode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Status message sent to the client.
    pub fn reply_message(&self) -> &'static str {
        match self {
            PipelineError::ArgumentBind(_) => ARGS_DECODE_FAILED,
            PipelineError::BodyDecode(_) => BODY_DECODE_FAILED,
            PipelineError::HandlerFault(_) => HANDLER_FAULT,
            PipelineError::BodyEncode(_) => BODY_ENCODE_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::FieldKind;

    #[test]
    fn test_status_mapping() {
        let err = PipelineError::from(ArgumentBindError {
            field: "id".into(),
            kind: FieldKind::Int,
            value: "x".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.reply_message(), ARGS_DECODE_FAILED);

        let err = PipelineError::BodyEncode(CodecError::UnknownContentType("text/csv".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.reply_message(), BODY_ENCODE_FAILED);
        assert!(err.to_string().contains("text/csv"));
    }
}
