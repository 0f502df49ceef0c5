//! Structural decoding of a full stream into an [`Index`].
//!
//! [`Decoder`] owns a [`Reader`] and drives it through the stream once,
//! recording for every value the offset a consumer can later seek back to,
//! and for every object a scope entry with its children. Payload bytes are
//! skipped, not materialized; declarations are validated and registered
//! under unique type ids.
//!
//! Parsing is one-shot: it either publishes an [`Index`] or sets a sticky
//! failure flag, and a second `parse` call is rejected either way.

use crate::{
    error::Error,
    header::{Frame, Header, Shape, MAX_STRING_LEN},
    index::{path_id, Index, ScopeEntry, ValueEntry},
    layout::{Field, FieldKind, StructuredTypeLayout},
    reader::Reader,
    tag::TypeTag,
};
use std::{
    collections::BTreeMap,
    io::{Read, Seek},
};
use tracing::{debug, trace};

/// Field-count sentinel for the root scope, above the 16-bit domain carried
/// by object headers. The root closes at end-of-stream, never at a scope
/// boundary.
const ROOT_FIELDS: u32 = 1 << 16;

enum State {
    /// `parse` has not run.
    Pending,
    /// `parse` completed and published an index.
    Complete(Index),
    /// `parse` failed; the reader position is unspecified.
    Failed,
}

/// Stateful one-shot structural parser.
pub struct Decoder<S> {
    reader: Option<Reader<S>>,
    state: State,
}

impl<S: Read + Seek> Decoder<S> {
    /// Create a decoder owning `reader`. Parsing starts from the reader's
    /// current position.
    pub fn new(reader: Reader<S>) -> Self {
        Self {
            reader: Some(reader),
            state: State::Pending,
        }
    }

    /// Parse the stream and publish the resulting index.
    ///
    /// Any codec or structural error makes the failure sticky: the index
    /// stays unavailable and later `parse` calls fail with
    /// [`Error::AlreadyParsed`].
    pub fn parse(&mut self) -> Result<(), Error> {
        match self.state {
            State::Pending => {}
            State::Complete(_) | State::Failed => return Err(Error::AlreadyParsed),
        }
        match self.run() {
            Ok(index) => {
                self.state = State::Complete(index);
                Ok(())
            }
            Err(err) => {
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    /// True once a parse attempt has failed.
    pub fn failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// Borrow the index produced by a successful [`Self::parse`].
    pub fn index(&self) -> Result<&Index, Error> {
        match &self.state {
            State::Complete(index) => Ok(index),
            State::Failed => Err(Error::ParseFailed),
            State::Pending => Err(Error::ParsePending),
        }
    }

    /// Take back the reader, leaving the decoder inert: every further
    /// operation that needs the reader fails with [`Error::ReaderReleased`].
    pub fn release_reader(&mut self) -> Result<Reader<S>, Error> {
        self.reader.take().ok_or(Error::ReaderReleased)
    }

    fn run(&mut self) -> Result<Index, Error> {
        let reader = self.reader.as_mut().ok_or(Error::ReaderReleased)?;
        let begin = reader.position()?;
        // Probe the stream extent once so payload skips can detect
        // truncation instead of silently seeking past the end.
        let end = reader.source_len()?;
        let mut walk = Walk {
            reader,
            types: BTreeMap::new(),
            end,
        };
        let mut root = ScopeEntry {
            name: String::new(),
            id: path_id(""),
            offset: begin,
            type_id: None,
            subscopes: Vec::new(),
            subvalues: Vec::new(),
        };
        walk.scope(&mut root, ROOT_FIELDS, "")?;
        debug!(
            types = walk.types.len(),
            subscopes = root.subscopes.len(),
            subvalues = root.subvalues.len(),
            "parse complete"
        );
        Ok(Index {
            types: walk.types,
            root,
        })
    }
}

/// Transient parsing state: the borrowed reader, the declarations seen so
/// far, and the stream extent.
struct Walk<'a, S> {
    reader: &'a mut Reader<S>,
    types: BTreeMap<String, StructuredTypeLayout>,
    end: u64,
}

impl<S: Read + Seek> Walk<'_, S> {
    /// Parse the contents of one scope with fully-headered children.
    ///
    /// A non-root scope must close with a scope boundary once exactly
    /// `expected` children have been read; the root (`expected ==
    /// ROOT_FIELDS`) closes at end-of-stream.
    fn scope(&mut self, scope: &mut ScopeEntry, expected: u32, path: &str) -> Result<(), Error> {
        loop {
            let children = (scope.subscopes.len() + scope.subvalues.len()) as u32;
            let frame = if expected == ROOT_FIELDS {
                match self.reader.try_read_header()? {
                    Some(frame) => frame,
                    None => return Ok(()),
                }
            } else {
                self.reader.read_header()?
            };
            let header = match frame {
                Frame::Boundary => {
                    if expected == ROOT_FIELDS {
                        return Err(Error::BoundaryAtRoot);
                    }
                    if children < expected {
                        return Err(Error::EarlyScopeBoundary {
                            expected: expected as u16,
                            actual: children as u16,
                        });
                    }
                    return Ok(());
                }
                Frame::Header(header) => header,
            };
            if children == expected {
                return Err(Error::ExcessFields {
                    expected: expected as u16,
                });
            }
            self.child(scope, header, path)?;
        }
    }

    /// Consume one headered child of `scope`, recording its entry.
    fn child(&mut self, scope: &mut ScopeEntry, header: Header, path: &str) -> Result<(), Error> {
        let child_path = join(path, &header.name);
        let offset = self.reader.position()?;
        trace!(name = %header.name, tag = ?header.shape.tag(), offset, "entry");
        match header.shape {
            Shape::UnstructuredObj { field_count } => {
                let mut entry = ScopeEntry {
                    name: header.name,
                    id: path_id(&child_path),
                    offset,
                    type_id: None,
                    subscopes: Vec::new(),
                    subvalues: Vec::new(),
                };
                self.scope(&mut entry, u32::from(field_count), &child_path)?;
                scope.subscopes.push(entry);
            }
            Shape::StructuredObj { type_id } => {
                let layout = self.layout(&type_id)?;
                let mut entry = ScopeEntry {
                    name: header.name,
                    id: path_id(&child_path),
                    offset,
                    type_id: Some(type_id),
                    subscopes: Vec::new(),
                    subvalues: Vec::new(),
                };
                self.structured_fields(&mut entry, &layout, &child_path)?;
                self.expect_boundary()?;
                scope.subscopes.push(entry);
            }
            Shape::StructuredObjTypeDecl {
                type_id,
                field_count,
            } => {
                // Declarations are stream-level constructs: inside an object
                // they would occupy a header slot without contributing a
                // child, so they are only legal at the root.
                if !path.is_empty() {
                    return Err(Error::Invalid(
                        "decoder",
                        "type declaration inside an object",
                    ));
                }
                self.declaration(type_id, field_count)?;
            }
            shape => {
                self.skip_value(&shape)?;
                scope.subvalues.push(ValueEntry {
                    name: header.name,
                    id: path_id(&child_path),
                    offset,
                    shape,
                });
            }
        }
        Ok(())
    }

    /// Consume a declaration body: `field_count` field headers closed by a
    /// scope boundary, validated and registered under a unique type id.
    fn declaration(&mut self, type_id: String, field_count: u16) -> Result<(), Error> {
        if self.types.contains_key(&type_id) {
            return Err(Error::DuplicateTypeDecl(type_id));
        }
        let mut fields = Vec::with_capacity(usize::from(field_count));
        loop {
            let frame = self.reader.read_header()?;
            let header = match frame {
                Frame::Boundary => {
                    if fields.len() < usize::from(field_count) {
                        return Err(Error::EarlyScopeBoundary {
                            expected: field_count,
                            actual: fields.len() as u16,
                        });
                    }
                    break;
                }
                Frame::Header(header) => header,
            };
            if fields.len() == usize::from(field_count) {
                return Err(Error::ExcessFields {
                    expected: field_count,
                });
            }
            fields.push(Field::try_from(header)?);
        }
        let layout = StructuredTypeLayout {
            type_id: type_id.clone(),
            fields,
        };
        layout.validate()?;
        trace!(type_id = %layout.type_id, fields = layout.fields.len(), "declared type");
        self.types.insert(type_id, layout);
        Ok(())
    }

    /// Parse the identifier-less fields of a structured object instance,
    /// recording entries that mirror the declared layout.
    fn structured_fields(
        &mut self,
        scope: &mut ScopeEntry,
        layout: &StructuredTypeLayout,
        path: &str,
    ) -> Result<(), Error> {
        for field in &layout.fields {
            let child_path = join(path, &field.name);
            let id = path_id(&child_path);
            match &field.kind {
                FieldKind::Scalar(tag) => {
                    let offset = self.reader.position()?;
                    self.skip(scalar_size(*tag)?)?;
                    scope.subvalues.push(ValueEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        shape: Shape::Scalar(*tag),
                    });
                }
                FieldKind::String => {
                    let size = self.string_size()?;
                    let offset = self.reader.position()?;
                    self.skip(u64::from(size))?;
                    scope.subvalues.push(ValueEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        shape: Shape::String { size },
                    });
                }
                FieldKind::ByteBuffer => {
                    let size = self.reader.read_u32()?;
                    let offset = self.reader.position()?;
                    self.skip(u64::from(size))?;
                    scope.subvalues.push(ValueEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        shape: Shape::ByteBuffer { size },
                    });
                }
                FieldKind::Substream => {
                    let size = self.reader.read_u32()?;
                    let offset = self.reader.position()?;
                    self.skip(u64::from(size))?;
                    scope.subvalues.push(ValueEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        shape: Shape::Substream { size },
                    });
                }
                FieldKind::Vector { element, width } => {
                    let offset = self.reader.position()?;
                    self.skip(scalar_size(*element)? * u64::from(*width))?;
                    scope.subvalues.push(ValueEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        shape: Shape::Vector {
                            element: *element,
                            width: *width,
                        },
                    });
                }
                FieldKind::Matrix {
                    element,
                    width,
                    height,
                } => {
                    let offset = self.reader.position()?;
                    self.skip(
                        scalar_size(*element)? * u64::from(*width) * u64::from(*height),
                    )?;
                    scope.subvalues.push(ValueEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        shape: Shape::Matrix {
                            element: *element,
                            width: *width,
                            height: *height,
                        },
                    });
                }
                FieldKind::List {
                    element,
                    element_type,
                } => {
                    let count = self.reader.read_u32()?;
                    let offset = self.reader.position()?;
                    self.skip_list(*element, count, element_type.as_deref())?;
                    scope.subvalues.push(ValueEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        shape: Shape::List {
                            element: *element,
                            count,
                            type_id: element_type.clone(),
                        },
                    });
                }
                FieldKind::Structured { type_id } => {
                    let sub_layout = self.layout(type_id)?;
                    let offset = self.reader.position()?;
                    let mut entry = ScopeEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        type_id: Some(type_id.clone()),
                        subscopes: Vec::new(),
                        subvalues: Vec::new(),
                    };
                    self.structured_fields(&mut entry, &sub_layout, &child_path)?;
                    scope.subscopes.push(entry);
                }
                FieldKind::Unstructured => {
                    let field_count = self.reader.read_u16()?;
                    let offset = self.reader.position()?;
                    let mut entry = ScopeEntry {
                        name: field.name.clone(),
                        id,
                        offset,
                        type_id: None,
                        subscopes: Vec::new(),
                        subvalues: Vec::new(),
                    };
                    self.scope(&mut entry, u32::from(field_count), &child_path)?;
                    scope.subscopes.push(entry);
                }
            }
        }
        Ok(())
    }

    /// Skip the payload of one headered value.
    fn skip_value(&mut self, shape: &Shape) -> Result<(), Error> {
        match shape {
            Shape::Scalar(tag) => self.skip(scalar_size(*tag)?),
            Shape::String { size } | Shape::ByteBuffer { size } | Shape::Substream { size } => {
                self.skip(u64::from(*size))
            }
            Shape::Vector { element, width } => {
                self.skip(scalar_size(*element)? * u64::from(*width))
            }
            Shape::Matrix {
                element,
                width,
                height,
            } => self.skip(scalar_size(*element)? * u64::from(*width) * u64::from(*height)),
            Shape::List {
                element,
                count,
                type_id,
            } => self.skip_list(*element, *count, type_id.as_deref()),
            Shape::UnstructuredObj { .. }
            | Shape::StructuredObj { .. }
            | Shape::StructuredObjTypeDecl { .. } => {
                unreachable!("objects and declarations are dispatched as scopes")
            }
        }
    }

    /// Skip `count` identifier-less list elements of `element` type.
    fn skip_list(
        &mut self,
        element: TypeTag,
        count: u32,
        type_id: Option<&str>,
    ) -> Result<(), Error> {
        if let Some(size) = element.fixed_size() {
            return self.skip(u64::from(size) * u64::from(count));
        }
        match element {
            TypeTag::String => {
                for _ in 0..count {
                    let size = self.string_size()?;
                    self.skip(u64::from(size))?;
                }
                Ok(())
            }
            TypeTag::ByteBuffer | TypeTag::Substream => {
                for _ in 0..count {
                    let size = self.reader.read_u32()?;
                    self.skip(u64::from(size))?;
                }
                Ok(())
            }
            TypeTag::StructuredObj => {
                let type_id = type_id
                    .ok_or(Error::Invalid("decoder", "structured list missing type id"))?;
                let layout = self.layout(type_id)?;
                for _ in 0..count {
                    self.skip_record(&layout)?;
                }
                Ok(())
            }
            _ => Err(Error::InvalidElementType(element)),
        }
    }

    /// Skip one identifier-less structured record (a list element), which
    /// carries no closing boundary of its own.
    fn skip_record(&mut self, layout: &StructuredTypeLayout) -> Result<(), Error> {
        for field in &layout.fields {
            match &field.kind {
                FieldKind::Scalar(tag) => self.skip(scalar_size(*tag)?)?,
                FieldKind::String => {
                    let size = self.string_size()?;
                    self.skip(u64::from(size))?;
                }
                FieldKind::ByteBuffer | FieldKind::Substream => {
                    let size = self.reader.read_u32()?;
                    self.skip(u64::from(size))?;
                }
                FieldKind::Vector { element, width } => {
                    self.skip(scalar_size(*element)? * u64::from(*width))?;
                }
                FieldKind::Matrix {
                    element,
                    width,
                    height,
                } => {
                    self.skip(scalar_size(*element)? * u64::from(*width) * u64::from(*height))?;
                }
                FieldKind::List {
                    element,
                    element_type,
                } => {
                    let count = self.reader.read_u32()?;
                    self.skip_list(*element, count, element_type.as_deref())?;
                }
                FieldKind::Structured { type_id } => {
                    let layout = self.layout(type_id)?;
                    self.skip_record(&layout)?;
                }
                FieldKind::Unstructured => {
                    let field_count = self.reader.read_u16()?;
                    let mut scratch = ScopeEntry::default();
                    self.scope(&mut scratch, u32::from(field_count), "")?;
                }
            }
        }
        Ok(())
    }

    /// Require the byte closing a structured object instance.
    fn expect_boundary(&mut self) -> Result<(), Error> {
        match self.reader.read_header()? {
            Frame::Boundary => Ok(()),
            Frame::Header(_) => Err(Error::LateScopeBoundary),
        }
    }

    fn layout(&self, type_id: &str) -> Result<StructuredTypeLayout, Error> {
        self.types
            .get(type_id)
            .cloned()
            .ok_or_else(|| Error::UnknownTypeId(type_id.to_string()))
    }

    fn string_size(&mut self) -> Result<u32, Error> {
        let size = self.reader.read_u32()?;
        if size > MAX_STRING_LEN {
            return Err(Error::StringTooLong(size as usize));
        }
        Ok(size)
    }

    /// Advance past `n` payload bytes, refusing to leave the stream.
    fn skip(&mut self, n: u64) -> Result<(), Error> {
        let pos = self.reader.position()?;
        let target = pos.checked_add(n).ok_or(Error::EndOfStream)?;
        if target > self.end {
            return Err(Error::EndOfStream);
        }
        self.reader.seek(target)
    }
}

fn scalar_size(tag: TypeTag) -> Result<u64, Error> {
    tag.fixed_size()
        .map(u64::from)
        .ok_or(Error::InvalidTypeTag(tag as u8))
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}
