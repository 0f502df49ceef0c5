//! Byte-level stream writing.
//!
//! [`Writer`] owns a byte sink and serialises typed primitives, headers, and
//! payloads in exactly the layout [`Reader`](crate::reader::Reader) expects.
//! It enforces only local well-formedness (identifier lengths, string and
//! buffer bounds, element-type families); structural integrity, such as a
//! declared field count matching the children subsequently written, is the
//! caller's responsibility.

use crate::{
    error::Error,
    header::{Header, Shape, MAX_NAME_LEN, MAX_STRING_LEN},
    tag::TypeTag,
    view::CHUNK_SIZE,
};
use bytes::Buf;
use std::{
    cmp,
    io::{Read, Write},
};

/// Stateless writer over an owned byte sink.
pub struct Writer<W> {
    sink: W,
}

impl<W: Write> Writer<W> {
    /// Create a writer taking exclusive ownership of `sink`.
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Give back the byte sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.sink.write_all(bytes)?;
        Ok(())
    }

    /// Write an 8-bit unsigned integer.
    pub fn write_u8(&mut self, value: u8) -> Result<(), Error> {
        self.put(&[value])
    }

    /// Write a 16-bit unsigned integer, little-endian.
    pub fn write_u16(&mut self, value: u16) -> Result<(), Error> {
        self.put(&value.to_le_bytes())
    }

    /// Write a 32-bit unsigned integer, little-endian.
    pub fn write_u32(&mut self, value: u32) -> Result<(), Error> {
        self.put(&value.to_le_bytes())
    }

    /// Write a 64-bit unsigned integer, little-endian.
    pub fn write_u64(&mut self, value: u64) -> Result<(), Error> {
        self.put(&value.to_le_bytes())
    }

    /// Write an 8-bit signed integer.
    pub fn write_i8(&mut self, value: i8) -> Result<(), Error> {
        self.write_u8(value as u8)
    }

    /// Write a 16-bit signed integer, little-endian.
    pub fn write_i16(&mut self, value: i16) -> Result<(), Error> {
        self.write_u16(value as u16)
    }

    /// Write a 32-bit signed integer, little-endian.
    pub fn write_i32(&mut self, value: i32) -> Result<(), Error> {
        self.write_u32(value as u32)
    }

    /// Write a 64-bit signed integer, little-endian.
    pub fn write_i64(&mut self, value: i64) -> Result<(), Error> {
        self.write_u64(value as u64)
    }

    /// Write a 32-bit IEEE 754 float as its unsigned bit pattern.
    pub fn write_f32(&mut self, value: f32) -> Result<(), Error> {
        self.write_u32(value.to_bits())
    }

    /// Write a 64-bit IEEE 754 float as its unsigned bit pattern.
    pub fn write_f64(&mut self, value: f64) -> Result<(), Error> {
        self.write_u64(value.to_bits())
    }

    /// Write a boolean as a single `0x00` or `0x01` byte.
    pub fn write_bool(&mut self, value: bool) -> Result<(), Error> {
        self.write_u8(u8::from(value))
    }

    /// Write a string payload. The byte length must fit in 24 bits.
    pub fn write_string(&mut self, value: &str) -> Result<(), Error> {
        if value.len() > MAX_STRING_LEN as usize {
            return Err(Error::StringTooLong(value.len()));
        }
        self.put(value.as_bytes())
    }

    /// Write a byte-buffer payload. The length must fit in 32 bits.
    pub fn write_buffer(&mut self, mut data: impl Buf) -> Result<(), Error> {
        if data.remaining() > u32::MAX as usize {
            return Err(Error::BufferTooLong(data.remaining()));
        }
        while data.has_remaining() {
            let chunk = data.chunk();
            self.put(chunk)?;
            let n = chunk.len();
            data.advance(n);
        }
        Ok(())
    }

    /// Copy `length` bytes from another sequential source into the stream,
    /// through a fixed 64 KiB intermediate. Fails with
    /// [`Error::SourceExhausted`] if a chunk read returns zero bytes before
    /// `length` is reached.
    pub fn copy_from(&mut self, source: &mut impl Read, length: u64) -> Result<(), Error> {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut remaining = length;
        while remaining > 0 {
            let take = cmp::min(CHUNK_SIZE as u64, remaining) as usize;
            let read = source.read(&mut chunk[..take])?;
            if read == 0 {
                return Err(Error::SourceExhausted);
            }
            self.put(&chunk[..read])?;
            remaining -= read as u64;
        }
        Ok(())
    }

    /// Write the single-byte marker that closes the innermost scope.
    pub fn write_scope_boundary(&mut self) -> Result<(), Error> {
        self.write_u8(TypeTag::ScopeBoundary as u8)
    }

    /// Serialise a value header.
    ///
    /// With `no_identifier` the header shrinks to the per-instance
    /// quantities alone (string/buffer/sub-stream size, list count, nested
    /// field count), for contexts where everything else is implied: list
    /// elements and the fields of a structured object, whose shapes come
    /// from the enclosing list header or declared layout.
    pub fn write_header(&mut self, header: &Header, no_identifier: bool) -> Result<(), Error> {
        Self::check_shape(&header.shape)?;
        if no_identifier {
            return match &header.shape {
                Shape::String { size }
                | Shape::ByteBuffer { size }
                | Shape::Substream { size } => self.write_u32(*size),
                Shape::List { count, .. } => self.write_u32(*count),
                Shape::UnstructuredObj { field_count }
                | Shape::StructuredObjTypeDecl { field_count, .. } => {
                    self.write_u16(*field_count)
                }
                Shape::Scalar(_)
                | Shape::Vector { .. }
                | Shape::Matrix { .. }
                | Shape::StructuredObj { .. } => Ok(()),
            };
        }
        Self::check_identifier(&header.name, Error::EmptyName, Error::NameTooLong)?;
        self.write_u8(header.shape.tag() as u8)?;
        self.write_u8(header.name.len() as u8)?;
        self.put(header.name.as_bytes())?;
        match &header.shape {
            Shape::Scalar(_) => {}
            Shape::String { size }
            | Shape::ByteBuffer { size }
            | Shape::Substream { size } => self.write_u32(*size)?,
            Shape::List {
                element,
                count,
                type_id,
            } => {
                self.write_u8(*element as u8)?;
                self.write_u32(*count)?;
                if let Some(id) = type_id {
                    self.write_type_id(id)?;
                }
            }
            Shape::Vector { element, width } => {
                self.write_u8(*element as u8)?;
                self.write_u8(*width)?;
            }
            Shape::Matrix {
                element,
                width,
                height,
            } => {
                self.write_u8(*element as u8)?;
                self.write_u8(*width)?;
                self.write_u8(*height)?;
            }
            Shape::UnstructuredObj { field_count } => self.write_u16(*field_count)?,
            Shape::StructuredObj { type_id } => self.write_type_id(type_id)?,
            Shape::StructuredObjTypeDecl {
                type_id,
                field_count,
            } => {
                self.write_type_id(type_id)?;
                self.write_u16(*field_count)?;
            }
        }
        Ok(())
    }

    fn write_type_id(&mut self, id: &str) -> Result<(), Error> {
        Self::check_identifier(id, Error::EmptyTypeId, Error::TypeIdTooLong)?;
        self.write_u8(id.len() as u8)?;
        self.put(id.as_bytes())
    }

    fn check_identifier(
        value: &str,
        empty: Error,
        too_long: fn(usize) -> Error,
    ) -> Result<(), Error> {
        if value.is_empty() {
            return Err(empty);
        }
        if value.len() > MAX_NAME_LEN {
            return Err(too_long(value.len()));
        }
        Ok(())
    }

    /// Reject shapes that cannot appear on the wire before any byte lands
    /// in the sink.
    fn check_shape(shape: &Shape) -> Result<(), Error> {
        match shape {
            Shape::Scalar(tag) => {
                if tag.fixed_size().is_none() {
                    return Err(Error::InvalidTypeTag(*tag as u8));
                }
            }
            Shape::String { size } => {
                if *size > MAX_STRING_LEN {
                    return Err(Error::StringTooLong(*size as usize));
                }
            }
            Shape::ByteBuffer { .. } | Shape::Substream { .. } => {}
            Shape::List {
                element, type_id, ..
            } => {
                if !element.is_list_element() {
                    return Err(Error::InvalidElementType(*element));
                }
                match (element, type_id) {
                    (TypeTag::StructuredObj, None) => {
                        return Err(Error::Invalid(
                            "header",
                            "list of structured objects requires a type id",
                        ))
                    }
                    (TypeTag::StructuredObj, Some(_)) => {}
                    (_, Some(_)) => {
                        return Err(Error::Invalid(
                            "header",
                            "only structured object lists carry a type id",
                        ))
                    }
                    (_, None) => {}
                }
            }
            Shape::Vector { element, width } => {
                Self::check_numeric(*element)?;
                Self::check_dimension(*width)?;
            }
            Shape::Matrix {
                element,
                width,
                height,
            } => {
                Self::check_numeric(*element)?;
                Self::check_dimension(*width)?;
                Self::check_dimension(*height)?;
            }
            Shape::UnstructuredObj { .. }
            | Shape::StructuredObj { .. }
            | Shape::StructuredObjTypeDecl { .. } => {}
        }
        Ok(())
    }

    fn check_numeric(element: TypeTag) -> Result<(), Error> {
        if !element.is_numeric() {
            return Err(Error::InvalidElementType(element));
        }
        Ok(())
    }

    fn check_dimension(value: u8) -> Result<(), Error> {
        if !(2..=4).contains(&value) {
            return Err(Error::InvalidDimension(value));
        }
        Ok(())
    }
}
