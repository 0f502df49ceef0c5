//! Read and write the Jaguar binary stream format.
//!
//! # Overview
//!
//! Jaguar is a typed, self-describing, tagged-value container with
//! first-person support for vectors, matrices, nested independent
//! sub-streams, byte buffers with stream-backed large-object access, and two
//! flavours of object: an unstructured (dictionary-like) object whose fields
//! carry full headers, and a structured object whose layout is declared once
//! and whose instances encode without per-field identifiers.
//!
//! The crate is organised in three layers:
//!
//! - [`Reader`] and [`Writer`]: the stateless byte codec. Typed
//!   little-endian primitives, UTF-8 enforcement, and the value-header
//!   encoding in both directions.
//! - [`view`]: scoped views. [`Reader::read_buffer`] lends a bounded
//!   subrange of the source to a [`view::Handle`] so byte buffers and
//!   sub-streams can be consumed incrementally without copying, with a
//!   shared-invalidation protocol against misuse. [`view::Adapter`] exposes
//!   a handle as a chunked [`std::io::Read`].
//! - [`Decoder`]: the structural layer. A one-shot recursive-descent parse
//!   of the whole stream into an [`Index`]: the tree of scopes and values
//!   with the byte offsets needed to seek back and read any value directly.
//!
//! # Format
//!
//! Every value is preceded by a header:
//!
//! ```text
//! +------+---------+----------+----------------------+
//! | tag  | nameLen |   name   | type-specific fields |
//! | (1)  |   (1)   | (1..255) |                      |
//! +------+---------+----------+----------------------+
//! ```
//!
//! The tag byte's upper nibble selects a family (scalar, signed integer,
//! unsigned integer, container, math) and its lower nibble is always `0xA`
//! or above. All multibyte integers are little-endian; floats are IEEE 754
//! bit patterns of the matching width. Objects close with a scope-boundary
//! byte (`0x3E`); the stream root closes at end of input.
//!
//! # Example
//!
//! ```
//! use jaguar::{Decoder, Header, Reader, Shape, TypeTag, Writer};
//! use std::io::Cursor;
//!
//! // Write a record holding a single boolean field.
//! let mut writer = Writer::new(Vec::new());
//! writer.write_header(
//!     &Header::new("r", Shape::UnstructuredObj { field_count: 1 }),
//!     false,
//! )?;
//! writer.write_header(&Header::new("b", Shape::Scalar(TypeTag::Boolean)), false)?;
//! writer.write_bool(true)?;
//! writer.write_scope_boundary()?;
//! let bytes = writer.into_sink();
//!
//! // Decode the structure back into an index.
//! let mut decoder = Decoder::new(Reader::new(Cursor::new(bytes)));
//! decoder.parse()?;
//! let index = decoder.index()?;
//! let record = index.root.subscope("r").unwrap();
//! let offset = record.subvalue("b").unwrap().offset;
//!
//! // Seek back and read the recorded value.
//! let mut reader = decoder.release_reader()?;
//! reader.seek(offset)?;
//! assert!(reader.read_bool()?);
//! # Ok::<(), jaguar::Error>(())
//! ```

pub mod decoder;
pub mod error;
pub mod header;
pub mod index;
pub mod layout;
pub mod reader;
pub mod tag;
pub mod utf8;
pub mod view;
pub mod writer;

// Re-export main types.
pub use decoder::Decoder;
pub use error::Error;
pub use header::{Frame, Header, Shape, MAX_NAME_LEN, MAX_STRING_LEN};
pub use index::{path_id, Index, ScopeEntry, ValueEntry};
pub use layout::{Field, FieldKind, StructuredTypeLayout};
pub use reader::Reader;
pub use tag::TypeTag;
pub use writer::Writer;
