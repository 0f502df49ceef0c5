//! Byte-level stream reading.
//!
//! [`Reader`] owns a seekable byte source and decodes typed primitives and
//! value headers from it. It keeps no structural context: callers (or the
//! [`Decoder`](crate::decoder::Decoder)) decide what to read next. All
//! multibyte integers are little-endian; floats are bit-cast from their
//! unsigned representation.
//!
//! Large payloads are consumed through a scoped view (see [`crate::view`]):
//! [`Reader::read_buffer`] lends the source to a [`view::Handle`] and the
//! reader refuses every other operation until the view is exhausted or
//! discarded.

use crate::{
    error::Error,
    header::{Frame, Header, Shape, MAX_STRING_LEN},
    tag::TypeTag,
    utf8, view,
};
use std::{
    cell::RefCell,
    io::{Read, Seek, SeekFrom},
    rc::Rc,
};

/// Stateless reader over an owned seekable byte source.
pub struct Reader<S> {
    source: Rc<RefCell<S>>,
    view: Option<Rc<view::State>>,
}

impl<S: Read + Seek> Reader<S> {
    /// Create a reader taking exclusive ownership of `source`.
    pub fn new(source: S) -> Self {
        Self {
            source: Rc::new(RefCell::new(source)),
            view: None,
        }
    }

    /// Give back the byte source, invalidating any outstanding view.
    pub fn into_source(mut self) -> S {
        if let Some(state) = self.view.take() {
            state.invalidate();
        }
        match Rc::try_unwrap(self.source) {
            Ok(cell) => cell.into_inner(),
            // View handles hold only weak references, so this reader held
            // the sole strong count.
            Err(_) => unreachable!(),
        }
    }

    /// Fail with [`Error::ViewActive`] while a live, non-exhausted view is
    /// outstanding; collect a spent view lazily.
    fn ensure_free(&mut self) -> Result<(), Error> {
        if let Some(state) = &self.view {
            if state.is_engaged() {
                return Err(Error::ViewActive);
            }
            state.invalidate();
            self.view = None;
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.source
            .borrow_mut()
            .read_exact(buf)
            .map_err(Error::from_io)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read an 8-bit unsigned integer.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.ensure_free()?;
        Ok(self.fixed::<1>()?[0])
    }

    /// Read a 16-bit unsigned integer.
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        self.ensure_free()?;
        Ok(u16::from_le_bytes(self.fixed()?))
    }

    /// Read a 32-bit unsigned integer.
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        self.ensure_free()?;
        Ok(u32::from_le_bytes(self.fixed()?))
    }

    /// Read a 64-bit unsigned integer.
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        self.ensure_free()?;
        Ok(u64::from_le_bytes(self.fixed()?))
    }

    /// Read an 8-bit signed integer.
    pub fn read_i8(&mut self) -> Result<i8, Error> {
        self.read_u8().map(|v| v as i8)
    }

    /// Read a 16-bit signed integer.
    pub fn read_i16(&mut self) -> Result<i16, Error> {
        self.read_u16().map(|v| v as i16)
    }

    /// Read a 32-bit signed integer.
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        self.read_u32().map(|v| v as i32)
    }

    /// Read a 64-bit signed integer.
    pub fn read_i64(&mut self) -> Result<i64, Error> {
        self.read_u64().map(|v| v as i64)
    }

    /// Read a 32-bit IEEE 754 float, bit-cast from its unsigned form.
    pub fn read_f32(&mut self) -> Result<f32, Error> {
        self.read_u32().map(f32::from_bits)
    }

    /// Read a 64-bit IEEE 754 float, bit-cast from its unsigned form.
    pub fn read_f64(&mut self) -> Result<f64, Error> {
        self.read_u64().map(f64::from_bits)
    }

    /// Read a boolean. Only `0x00` and `0x01` are legal.
    pub fn read_bool(&mut self) -> Result<bool, Error> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(Error::InvalidBool(byte)),
        }
    }

    /// Read a UTF-8 string payload of exactly `len` bytes.
    pub fn read_string(&mut self, len: u32) -> Result<String, Error> {
        self.ensure_free()?;
        if len > MAX_STRING_LEN {
            return Err(Error::StringTooLong(len as usize));
        }
        let mut bytes = vec![0u8; len as usize];
        self.fill(&mut bytes)?;
        utf8::into_string(bytes)
    }

    /// Read a length-prefixed identifier of 1..=255 UTF-8 bytes.
    fn short_bytes(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let len = self.fixed::<1>()?[0];
        if len == 0 {
            return Ok(None);
        }
        let mut bytes = vec![0u8; len as usize];
        self.fill(&mut bytes)?;
        Ok(Some(bytes))
    }

    fn name(&mut self) -> Result<String, Error> {
        let bytes = self.short_bytes()?.ok_or(Error::EmptyName)?;
        utf8::into_string(bytes)
    }

    fn type_id(&mut self) -> Result<String, Error> {
        let bytes = self.short_bytes()?.ok_or(Error::EmptyTypeId)?;
        utf8::into_string(bytes)
    }

    fn element_type(&mut self, numeric_only: bool) -> Result<TypeTag, Error> {
        let tag = TypeTag::from_byte(self.fixed::<1>()?[0])?;
        let legal = if numeric_only {
            tag.is_numeric()
        } else {
            tag.is_list_element()
        };
        if !legal {
            return Err(Error::InvalidElementType(tag));
        }
        Ok(tag)
    }

    fn dimension(&mut self) -> Result<u8, Error> {
        let value = self.fixed::<1>()?[0];
        if !(2..=4).contains(&value) {
            return Err(Error::InvalidDimension(value));
        }
        Ok(value)
    }

    /// Read the next value header, or `None` when the stream ends cleanly
    /// before the tag byte.
    pub fn try_read_header(&mut self) -> Result<Option<Frame>, Error> {
        self.ensure_free()?;
        let mut first = [0u8; 1];
        let n = self
            .source
            .borrow_mut()
            .read(&mut first)
            .map_err(Error::from_io)?;
        if n == 0 {
            return Ok(None);
        }
        let tag = TypeTag::from_byte(first[0])?;
        if tag == TypeTag::ScopeBoundary {
            return Ok(Some(Frame::Boundary));
        }
        let name = self.name()?;
        let shape = self.shape(tag)?;
        Ok(Some(Frame::Header(Header { name, shape })))
    }

    /// Read the next value header, failing at end of stream.
    pub fn read_header(&mut self) -> Result<Frame, Error> {
        self.try_read_header()?.ok_or(Error::EndOfStream)
    }

    /// Decode the type-specific trailer for `tag`.
    fn shape(&mut self, tag: TypeTag) -> Result<Shape, Error> {
        let shape = match tag {
            TypeTag::Boolean
            | TypeTag::Float32
            | TypeTag::Float64
            | TypeTag::SInt8
            | TypeTag::SInt16
            | TypeTag::SInt32
            | TypeTag::SInt64
            | TypeTag::UInt8
            | TypeTag::UInt16
            | TypeTag::UInt32
            | TypeTag::UInt64 => Shape::Scalar(tag),
            TypeTag::String => {
                let size = u32::from_le_bytes(self.fixed()?);
                if size > MAX_STRING_LEN {
                    return Err(Error::StringTooLong(size as usize));
                }
                Shape::String { size }
            }
            TypeTag::ByteBuffer => Shape::ByteBuffer {
                size: u32::from_le_bytes(self.fixed()?),
            },
            TypeTag::Substream => Shape::Substream {
                size: u32::from_le_bytes(self.fixed()?),
            },
            TypeTag::List => {
                let element = self.element_type(false)?;
                let count = u32::from_le_bytes(self.fixed()?);
                let type_id = if element == TypeTag::StructuredObj {
                    Some(self.type_id()?)
                } else {
                    None
                };
                Shape::List {
                    element,
                    count,
                    type_id,
                }
            }
            TypeTag::Vector => {
                let element = self.element_type(true)?;
                let width = self.dimension()?;
                Shape::Vector { element, width }
            }
            TypeTag::Matrix => {
                let element = self.element_type(true)?;
                let width = self.dimension()?;
                let height = self.dimension()?;
                Shape::Matrix {
                    element,
                    width,
                    height,
                }
            }
            TypeTag::StructuredObj => Shape::StructuredObj {
                type_id: self.type_id()?,
            },
            TypeTag::StructuredObjTypeDecl => {
                let type_id = self.type_id()?;
                let field_count = u16::from_le_bytes(self.fixed()?);
                Shape::StructuredObjTypeDecl {
                    type_id,
                    field_count,
                }
            }
            TypeTag::UnstructuredObj => Shape::UnstructuredObj {
                field_count: u16::from_le_bytes(self.fixed()?),
            },
            TypeTag::ScopeBoundary => unreachable!("boundary frames carry no shape"),
        };
        Ok(shape)
    }

    /// Lend the next `len` bytes of the source to a scoped view.
    ///
    /// Until the returned handle is exhausted or discarded, every other
    /// reader operation fails with [`Error::ViewActive`].
    pub fn read_buffer(&mut self, len: u32) -> Result<view::Handle<S>, Error> {
        self.ensure_free()?;
        let begin = self
            .source
            .borrow_mut()
            .stream_position()
            .map_err(Error::from_io)?;
        let state = Rc::new(view::State::new(len, begin + u64::from(len)));
        self.view = Some(state.clone());
        Ok(view::Handle::new(Rc::downgrade(&self.source), state))
    }

    /// Current byte offset in the source.
    pub fn position(&mut self) -> Result<u64, Error> {
        self.ensure_free()?;
        self.source
            .borrow_mut()
            .stream_position()
            .map_err(Error::from_io)
    }

    /// Seek to an absolute byte offset.
    pub fn seek(&mut self, pos: u64) -> Result<(), Error> {
        self.ensure_free()?;
        self.source
            .borrow_mut()
            .seek(SeekFrom::Start(pos))
            .map_err(Error::from_io)?;
        Ok(())
    }

    /// Advance past `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> Result<(), Error> {
        self.ensure_free()?;
        let delta =
            i64::try_from(n).map_err(|_| Error::Invalid("reader", "skip distance exceeds i64"))?;
        self.source
            .borrow_mut()
            .seek(SeekFrom::Current(delta))
            .map_err(Error::from_io)?;
        Ok(())
    }

    /// Total length of the source in bytes, probed with a seek round-trip.
    pub fn source_len(&mut self) -> Result<u64, Error> {
        self.ensure_free()?;
        let mut source = self.source.borrow_mut();
        let pos = source.stream_position().map_err(Error::from_io)?;
        let len = source.seek(SeekFrom::End(0)).map_err(Error::from_io)?;
        source.seek(SeekFrom::Start(pos)).map_err(Error::from_io)?;
        Ok(len)
    }
}
