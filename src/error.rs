//! Error types for codec, view, structural, and lifecycle failures.

use crate::tag::TypeTag;
use thiserror::Error;

/// Errors that can occur when reading, writing, or decoding a Jaguar stream.
#[derive(Debug, Error)]
pub enum Error {
    // Byte-level decoding and encoding failures.
    #[error("invalid type tag: {0:#04x}")]
    InvalidTypeTag(u8),
    #[error("invalid element type: {0:?}")]
    InvalidElementType(TypeTag),
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("empty name")]
    EmptyName,
    #[error("name too long: {0} bytes")]
    NameTooLong(usize),
    #[error("empty type id")]
    EmptyTypeId,
    #[error("type id too long: {0} bytes")]
    TypeIdTooLong(usize),
    #[error("string too long: {0} bytes")]
    StringTooLong(usize),
    #[error("buffer too long: {0} bytes")]
    BufferTooLong(usize),
    #[error("invalid boolean byte: {0:#04x}")]
    InvalidBool(u8),
    #[error("dimension out of range: {0}")]
    InvalidDimension(u8),
    #[error("invalid {0}: {1}")]
    Invalid(&'static str, &'static str),

    // Underlying source and sink failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of stream")]
    EndOfStream,
    #[error("source exhausted during copy")]
    SourceExhausted,

    // Scoped-view lifetime violations.
    #[error("a scoped view is active")]
    ViewActive,
    #[error("scoped view invalidated")]
    ViewInvalidated,

    // Structural failures raised by the decoder.
    #[error("scope boundary at root")]
    BoundaryAtRoot,
    #[error("scope boundary after {actual} of {expected} fields")]
    EarlyScopeBoundary { expected: u16, actual: u16 },
    #[error("missing scope boundary")]
    LateScopeBoundary,
    #[error("field exceeds declared count of {expected}")]
    ExcessFields { expected: u16 },
    #[error("unknown structured type: {0:?}")]
    UnknownTypeId(String),
    #[error("duplicate type declaration: {0:?}")]
    DuplicateTypeDecl(String),
    #[error("invalid layout for type {type_id:?}: {reason}")]
    InvalidLayout {
        type_id: String,
        reason: &'static str,
    },

    // Lifecycle violations.
    #[error("stream already parsed")]
    AlreadyParsed,
    #[error("parse failed")]
    ParseFailed,
    #[error("parse has not run")]
    ParsePending,
    #[error("reader released")]
    ReaderReleased,
}

impl Error {
    /// Convert an I/O error, folding a short read into [`Error::EndOfStream`].
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::EndOfStream
        } else {
            Self::Io(err)
        }
    }
}
