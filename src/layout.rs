//! Declared record schemas for structured objects.
//!
//! A [`StructuredTypeLayout`] names a record type and fixes the order,
//! names, and shapes of its fields. Instances of the type encode without
//! per-field identifiers, so the layout is the only source of their
//! structure.

use crate::{
    error::Error,
    header::{Header, Shape, MAX_NAME_LEN},
    tag::TypeTag,
};

/// Shape of a single declared field.
///
/// Unlike [`Shape`], a field carries no per-instance quantities: string and
/// buffer sizes, list counts, and nested dictionary field counts are encoded
/// inline by each instance.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// Fixed-width value: integer, float, or boolean.
    Scalar(TypeTag),
    /// UTF-8 string, size prefixed per instance.
    String,
    /// Raw byte blob, size prefixed per instance.
    ByteBuffer,
    /// Embedded independent stream, size prefixed per instance.
    Substream,
    /// List of `element` payloads, count prefixed per instance.
    /// `element_type` names the element layout for structured elements.
    List {
        element: TypeTag,
        element_type: Option<String>,
    },
    /// `width` numeric payloads.
    Vector { element: TypeTag, width: u8 },
    /// `width` columns of `height` numeric payloads.
    Matrix {
        element: TypeTag,
        width: u8,
        height: u8,
    },
    /// Nested record of the named layout.
    Structured { type_id: String },
    /// Nested dictionary, field count prefixed per instance.
    Unstructured,
}

/// One field of a declared layout.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// UTF-8 field name, 1..=255 bytes.
    pub name: String,
    /// The field's shape.
    pub kind: FieldKind,
}

impl Field {
    /// Render the field as the value header its declaration encodes as.
    /// Per-instance quantities are zero in this context.
    pub fn header(&self) -> Header {
        let shape = match &self.kind {
            FieldKind::Scalar(tag) => Shape::Scalar(*tag),
            FieldKind::String => Shape::String { size: 0 },
            FieldKind::ByteBuffer => Shape::ByteBuffer { size: 0 },
            FieldKind::Substream => Shape::Substream { size: 0 },
            FieldKind::List {
                element,
                element_type,
            } => Shape::List {
                element: *element,
                count: 0,
                type_id: element_type.clone(),
            },
            FieldKind::Vector { element, width } => Shape::Vector {
                element: *element,
                width: *width,
            },
            FieldKind::Matrix {
                element,
                width,
                height,
            } => Shape::Matrix {
                element: *element,
                width: *width,
                height: *height,
            },
            FieldKind::Structured { type_id } => Shape::StructuredObj {
                type_id: type_id.clone(),
            },
            FieldKind::Unstructured => Shape::UnstructuredObj { field_count: 0 },
        };
        Header::new(self.name.clone(), shape)
    }
}

impl TryFrom<Header> for Field {
    type Error = Error;

    /// Convert a declaration field header, discarding the per-instance
    /// quantities it carries on the wire.
    fn try_from(header: Header) -> Result<Self, Error> {
        let kind = match header.shape {
            Shape::Scalar(tag) => FieldKind::Scalar(tag),
            Shape::String { .. } => FieldKind::String,
            Shape::ByteBuffer { .. } => FieldKind::ByteBuffer,
            Shape::Substream { .. } => FieldKind::Substream,
            Shape::List {
                element, type_id, ..
            } => FieldKind::List {
                element,
                element_type: type_id,
            },
            Shape::Vector { element, width } => FieldKind::Vector { element, width },
            Shape::Matrix {
                element,
                width,
                height,
            } => FieldKind::Matrix {
                element,
                width,
                height,
            },
            Shape::StructuredObj { type_id } => FieldKind::Structured { type_id },
            Shape::UnstructuredObj { .. } => FieldKind::Unstructured,
            Shape::StructuredObjTypeDecl { .. } => {
                return Err(Error::Invalid(
                    "layout",
                    "field may not be a type declaration",
                ))
            }
        };
        Ok(Self {
            name: header.name,
            kind,
        })
    }
}

/// Layout description of a structured object type.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredTypeLayout {
    /// UTF-8 type name, 1..=255 bytes.
    pub type_id: String,
    /// Ordered field list.
    pub fields: Vec<Field>,
}

impl StructuredTypeLayout {
    /// Check the layout invariants: identifier lengths, element-type
    /// families, dimensions in 2..=4, and non-empty type references.
    pub fn validate(&self) -> Result<(), Error> {
        if self.type_id.is_empty() || self.type_id.len() > MAX_NAME_LEN {
            return Err(self.invalid("type id must be 1..=255 bytes"));
        }
        for field in &self.fields {
            if field.name.is_empty() || field.name.len() > MAX_NAME_LEN {
                return Err(self.invalid("field name must be 1..=255 bytes"));
            }
            match &field.kind {
                FieldKind::Scalar(tag) => {
                    if tag.fixed_size().is_none() {
                        return Err(self.invalid("scalar field must be a fixed-width type"));
                    }
                }
                FieldKind::String | FieldKind::ByteBuffer | FieldKind::Substream => {}
                FieldKind::List {
                    element,
                    element_type,
                } => {
                    if !element.is_list_element() {
                        return Err(self.invalid("list field carries an illegal element type"));
                    }
                    match (element, element_type) {
                        (TypeTag::StructuredObj, Some(id)) if !id.is_empty() => {}
                        (TypeTag::StructuredObj, _) => {
                            return Err(
                                self.invalid("structured list field requires an element type id")
                            )
                        }
                        (_, Some(_)) => {
                            return Err(
                                self.invalid("only structured list fields name an element type")
                            )
                        }
                        (_, None) => {}
                    }
                }
                FieldKind::Vector { element, width } => {
                    if !element.is_numeric() {
                        return Err(self.invalid("vector field element must be numeric"));
                    }
                    if !(2..=4).contains(width) {
                        return Err(self.invalid("vector width must be 2..=4"));
                    }
                }
                FieldKind::Matrix {
                    element,
                    width,
                    height,
                } => {
                    if !element.is_numeric() {
                        return Err(self.invalid("matrix field element must be numeric"));
                    }
                    if !(2..=4).contains(width) || !(2..=4).contains(height) {
                        return Err(self.invalid("matrix dimensions must be 2..=4"));
                    }
                }
                FieldKind::Structured { type_id } => {
                    if type_id.is_empty() {
                        return Err(self.invalid("structured field requires a type id"));
                    }
                }
                FieldKind::Unstructured => {}
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &'static str) -> Error {
        Error::InvalidLayout {
            type_id: self.type_id.clone(),
            reason,
        }
    }
}
