//! Type tags identifying every value kind in a Jaguar stream.
//!
//! A tag is a single byte whose nibbles both carry meaning: the upper nibble
//! selects a family (scalar, signed integer, unsigned integer, container,
//! math) and the lower nibble is always `0xA` or above. Everything outside
//! the enumerated values is rejected at the byte level.

use crate::error::Error;

/// All valid type specifiers in a Jaguar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// UTF-8 string.
    String = 0x0A,
    /// Raw byte blob.
    ByteBuffer = 0x0B,
    /// Embedded independent Jaguar stream.
    Substream = 0x0C,
    /// True/false.
    Boolean = 0x0D,
    /// 32-bit IEEE 754 little-endian floating-point number.
    Float32 = 0x0E,
    /// 64-bit IEEE 754 little-endian floating-point number.
    Float64 = 0x0F,
    /// 8-bit signed integer.
    SInt8 = 0x1A,
    /// 16-bit signed integer.
    SInt16 = 0x1B,
    /// 32-bit signed integer.
    SInt32 = 0x1C,
    /// 64-bit signed integer.
    SInt64 = 0x1D,
    /// 8-bit unsigned integer.
    UInt8 = 0x2A,
    /// 16-bit unsigned integer.
    UInt16 = 0x2B,
    /// 32-bit unsigned integer.
    UInt32 = 0x2C,
    /// 64-bit unsigned integer.
    UInt64 = 0x2D,
    /// List of values sharing one element type.
    List = 0x3A,
    /// Object with no predefined layout (a dictionary on the wire).
    UnstructuredObj = 0x3B,
    /// Object instance of a declared layout.
    StructuredObj = 0x3C,
    /// Declaration of a structured object layout.
    StructuredObjTypeDecl = 0x3D,
    /// End-of-scope marker.
    ScopeBoundary = 0x3E,
    /// 2 to 4-component vector of numbers.
    Vector = 0x4A,
    /// Matrix of numbers, 2x2 up to 4x4, column-major.
    Matrix = 0x4B,
}

impl TypeTag {
    /// Validate `byte` as a type tag.
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        let tag = match byte {
            0x0A => Self::String,
            0x0B => Self::ByteBuffer,
            0x0C => Self::Substream,
            0x0D => Self::Boolean,
            0x0E => Self::Float32,
            0x0F => Self::Float64,
            0x1A => Self::SInt8,
            0x1B => Self::SInt16,
            0x1C => Self::SInt32,
            0x1D => Self::SInt64,
            0x2A => Self::UInt8,
            0x2B => Self::UInt16,
            0x2C => Self::UInt32,
            0x2D => Self::UInt64,
            0x3A => Self::List,
            0x3B => Self::UnstructuredObj,
            0x3C => Self::StructuredObj,
            0x3D => Self::StructuredObjTypeDecl,
            0x3E => Self::ScopeBoundary,
            0x4A => Self::Vector,
            0x4B => Self::Matrix,
            _ => return Err(Error::InvalidTypeTag(byte)),
        };
        Ok(tag)
    }

    /// Payload width in bytes for values that encode with a fixed width
    /// (integers, floats, and booleans). `None` for everything else.
    pub fn fixed_size(&self) -> Option<u32> {
        match self {
            Self::Boolean | Self::SInt8 | Self::UInt8 => Some(1),
            Self::SInt16 | Self::UInt16 => Some(2),
            Self::Float32 | Self::SInt32 | Self::UInt32 => Some(4),
            Self::Float64 | Self::SInt64 | Self::UInt64 => Some(8),
            _ => None,
        }
    }

    /// True for integer and floating-point tags, the only element types a
    /// vector or matrix may carry.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Float32
                | Self::Float64
                | Self::SInt8
                | Self::SInt16
                | Self::SInt32
                | Self::SInt64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// True for element types a list may carry: anything with a fixed width,
    /// the length-prefixed buffer kinds, and structured objects. Nested
    /// lists, vectors, matrices, and unstructured objects have shape data
    /// that a list header cannot express.
    pub fn is_list_element(&self) -> bool {
        self.fixed_size().is_some()
            || matches!(
                self,
                Self::String | Self::ByteBuffer | Self::Substream | Self::StructuredObj
            )
    }
}
