//! Recursive-descent reader over an in-memory serialization stream.
//!
//! Handles are tracked exactly as the writer assigns them so back-references
//! resolve; a reset clears the table. Objects referenced while still being
//! read resolve to [`Value::Null`].

use std::{collections::BTreeMap, rc::Rc};

use super::{ParseError, Value};

const STREAM_MAGIC: u16 = 0xACED;
const STREAM_VERSION: u16 = 5;
const BASE_HANDLE: u32 = 0x7E_0000;
const MAX_DEPTH: usize = 64;
/// Decoded weight allowed per input byte, on top of [`BASE_BUDGET`].
const BUDGET_PER_BYTE: usize = 4;
const BASE_BUDGET: usize = 1024;

const TC_NULL: u8 = 0x70;
const TC_REFERENCE: u8 = 0x71;
const TC_CLASSDESC: u8 = 0x72;
const TC_OBJECT: u8 = 0x73;
const TC_STRING: u8 = 0x74;
const TC_ARRAY: u8 = 0x75;
const TC_CLASS: u8 = 0x76;
const TC_BLOCKDATA: u8 = 0x77;
const TC_ENDBLOCKDATA: u8 = 0x78;
const TC_RESET: u8 = 0x79;
const TC_BLOCKDATALONG: u8 = 0x7A;
const TC_EXCEPTION: u8 = 0x7B;
const TC_LONGSTRING: u8 = 0x7C;
const TC_PROXYCLASSDESC: u8 = 0x7D;
const TC_ENUM: u8 = 0x7E;

const SC_WRITE_METHOD: u8 = 0x01;
const SC_EXTERNALIZABLE: u8 = 0x04;
const SC_BLOCK_DATA: u8 = 0x08;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldKind {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Bool,
    Object,
}

impl FieldKind {
    fn from_code(code: u8) -> Result<Self, ParseError> {
        Ok(match code {
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'D' => Self::Double,
            b'F' => Self::Float,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'S' => Self::Short,
            b'Z' => Self::Bool,
            b'L' | b'[' => Self::Object,
            other => return Err(ParseError::UnknownFieldType(other)),
        })
    }
}

#[derive(Debug)]
struct FieldDesc {
    name: String,
    kind: FieldKind,
}

#[derive(Debug)]
struct ClassDesc {
    name: String,
    flags: u8,
    fields: Vec<FieldDesc>,
    super_class: Option<Rc<ClassDesc>>,
}

/// Classes from the root superclass down to `class`.
fn hierarchy(class: &Rc<ClassDesc>) -> Vec<Rc<ClassDesc>> {
    let mut chain = vec![Rc::clone(class)];
    let mut current = class.super_class.clone();
    while let Some(class) = current {
        current = class.super_class.clone();
        chain.push(class);
    }
    chain.reverse();
    chain
}

#[derive(Clone, Debug)]
enum Handle {
    Pending,
    Class(Rc<ClassDesc>),
    /// A finished value and the weight charged while decoding it.
    Value(Rc<Value>, usize),
}

/// Parse every top-level element of `buf`.
pub(super) fn parse_stream(buf: &[u8]) -> Result<Vec<Value>, ParseError> {
    let mut reader = Reader::new(buf);
    reader.read_header()?;
    let mut values = Vec::new();
    let mut saw_reset = false;
    while let Some(code) = reader.peek() {
        match code {
            TC_RESET => {
                reader.pos += 1;
                reader.handles.clear();
                saw_reset = true;
            }
            TC_BLOCKDATA | TC_BLOCKDATALONG => reader.skip_block_data()?,
            _ => values.push(reader.read_object()?),
        }
    }
    if values.is_empty() {
        return Err(if saw_reset {
            ParseError::Reset
        } else {
            ParseError::UnexpectedEof
        });
    }
    Ok(values)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
    handles: Vec<Handle>,
    spent: usize,
    budget: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            depth: 0,
            handles: Vec::new(),
            spent: 0,
            budget: buf
                .len()
                .saturating_mul(BUDGET_PER_BYTE)
                .saturating_add(BASE_BUDGET),
        }
    }

    fn peek(&self) -> Option<u8> { self.buf.get(self.pos).copied() }

    fn remaining(&self) -> usize { self.buf.len().saturating_sub(self.pos) }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(len).ok_or(ParseError::UnexpectedEof)?;
        let slice = self.buf.get(self.pos..end).ok_or(ParseError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let slice = self.take(N)?;
        <[u8; N]>::try_from(slice).map_err(|_| ParseError::UnexpectedEof)
    }

    fn read_u8(&mut self) -> Result<u8, ParseError> { Ok(self.take_array::<1>()?[0]) }

    fn read_u16(&mut self) -> Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    fn read_i16(&mut self) -> Result<i16, ParseError> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, ParseError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, ParseError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, ParseError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, ParseError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    fn read_header(&mut self) -> Result<(), ParseError> {
        let magic = self.read_u16()?;
        if magic != STREAM_MAGIC {
            return Err(ParseError::InvalidMagic(magic));
        }
        let version = self.read_u16()?;
        if version != STREAM_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }
        Ok(())
    }

    fn read_utf(&mut self) -> Result<String, ParseError> {
        let len = usize::from(self.read_u16()?);
        Ok(decode_modified_utf8(self.take(len)?))
    }

    fn read_long_utf(&mut self) -> Result<String, ParseError> {
        let len = self.read_u64()?;
        let len = usize::try_from(len)
            .map_err(|_| ParseError::InvalidLength(i64::try_from(len).unwrap_or(i64::MAX)))?;
        Ok(decode_modified_utf8(self.take(len)?))
    }

    fn reserve_handle(&mut self) -> usize {
        self.handles.push(Handle::Pending);
        self.handles.len() - 1
    }

    fn fill_handle(&mut self, slot: usize, handle: Handle) {
        // A reset inside the object may already have discarded the slot.
        if let Some(entry) = self.handles.get_mut(slot) {
            *entry = handle;
        }
    }

    fn lookup(&mut self) -> Result<(u32, &Handle), ParseError> {
        let raw = self.read_u32()?;
        let index = raw
            .checked_sub(BASE_HANDLE)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(ParseError::InvalidHandle(raw))?;
        let handle = self.handles.get(index).ok_or(ParseError::InvalidHandle(raw))?;
        Ok((raw, handle))
    }

    /// Account for `weight` more decoded data.
    ///
    /// Back-references copy their target, so the total is bounded against
    /// the input length rather than the bytes read.
    fn charge(&mut self, weight: usize) -> Result<(), ParseError> {
        self.spent = self.spent.saturating_add(weight);
        if self.spent > self.budget {
            return Err(ParseError::TooLarge(self.budget));
        }
        Ok(())
    }

    /// Store `value` in `slot`, weighted by everything charged since `start`.
    fn fill_value(&mut self, slot: usize, value: &Value, start: usize) {
        let weight = self.spent - start;
        self.fill_handle(slot, Handle::Value(Rc::new(value.clone()), weight));
    }

    fn push_value(&mut self, value: &Value, weight: usize) {
        self.handles.push(Handle::Value(Rc::new(value.clone()), weight));
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        Ok(())
    }

    fn read_object(&mut self) -> Result<Value, ParseError> {
        self.enter()?;
        let result = self.read_object_inner();
        self.depth -= 1;
        result
    }

    fn read_object_inner(&mut self) -> Result<Value, ParseError> {
        while self.peek() == Some(TC_RESET) {
            self.pos += 1;
            self.handles.clear();
        }
        let offset = self.pos;
        match self.read_u8()? {
            TC_NULL => {
                self.charge(1)?;
                Ok(Value::Null)
            }
            TC_REFERENCE => {
                let handle = self.lookup()?.1.clone();
                self.read_reference(handle)
            }
            TC_OBJECT => self.read_new_object(),
            TC_STRING => {
                let s = self.read_utf()?;
                self.new_string(s)
            }
            TC_LONGSTRING => {
                let s = self.read_long_utf()?;
                self.new_string(s)
            }
            TC_ARRAY => self.read_new_array(),
            TC_ENUM => self.read_new_enum(),
            TC_CLASS => {
                let name = self.read_class_desc()?.map(|class| class.name.clone());
                let value = name.map_or(Value::Null, Value::String);
                self.charge(1)?;
                self.push_value(&value, 1);
                Ok(value)
            }
            TC_CLASSDESC | TC_PROXYCLASSDESC => {
                self.pos = offset;
                let class = self.read_class_desc()?;
                Ok(class.map_or(Value::Null, |class| Value::String(class.name.clone())))
            }
            TC_EXCEPTION => Err(ParseError::Exception),
            code => Err(ParseError::UnexpectedTypeCode { code, offset }),
        }
    }

    fn read_reference(&mut self, handle: Handle) -> Result<Value, ParseError> {
        match handle {
            Handle::Value(value, weight) => {
                self.charge(weight)?;
                Ok(Value::clone(&value))
            }
            Handle::Class(class) => {
                self.charge(1)?;
                Ok(Value::String(class.name.clone()))
            }
            Handle::Pending => {
                self.charge(1)?;
                Ok(Value::Null)
            }
        }
    }

    fn new_string(&mut self, s: String) -> Result<Value, ParseError> {
        let weight = 1 + s.len() / 8;
        self.charge(weight)?;
        let value = Value::String(s);
        self.push_value(&value, weight);
        Ok(value)
    }

    fn read_class_desc(&mut self) -> Result<Option<Rc<ClassDesc>>, ParseError> {
        let offset = self.pos;
        match self.read_u8()? {
            TC_NULL => Ok(None),
            TC_REFERENCE => match self.lookup()? {
                (_, Handle::Class(class)) => Ok(Some(Rc::clone(class))),
                (raw, _) => Err(ParseError::NotAClassDesc(raw)),
            },
            TC_CLASSDESC => {
                let name = self.read_utf()?;
                let _serial_version_uid = self.read_i64()?;
                let slot = self.reserve_handle();
                let flags = self.read_u8()?;
                let count = self.read_u16()?;
                let mut fields = Vec::with_capacity(usize::from(count).min(self.remaining()));
                for _ in 0..count {
                    fields.push(self.read_field_desc()?);
                }
                self.skip_annotation()?;
                let super_class = self.read_nested_class_desc()?;
                let class = Rc::new(ClassDesc {
                    name,
                    flags,
                    fields,
                    super_class,
                });
                self.fill_handle(slot, Handle::Class(Rc::clone(&class)));
                Ok(Some(class))
            }
            TC_PROXYCLASSDESC => {
                let slot = self.reserve_handle();
                let count = self.read_i32()?;
                let mut interfaces = Vec::new();
                for _ in 0..count.max(0) {
                    interfaces.push(self.read_utf()?);
                }
                self.skip_annotation()?;
                let super_class = self.read_nested_class_desc()?;
                let class = Rc::new(ClassDesc {
                    name: format!("$Proxy[{}]", interfaces.join(",")),
                    flags: 0x02,
                    fields: Vec::new(),
                    super_class,
                });
                self.fill_handle(slot, Handle::Class(Rc::clone(&class)));
                Ok(Some(class))
            }
            code => Err(ParseError::UnexpectedTypeCode { code, offset }),
        }
    }

    fn read_nested_class_desc(&mut self) -> Result<Option<Rc<ClassDesc>>, ParseError> {
        self.enter()?;
        let result = self.read_class_desc();
        self.depth -= 1;
        result
    }

    fn read_field_desc(&mut self) -> Result<FieldDesc, ParseError> {
        let kind = FieldKind::from_code(self.read_u8()?)?;
        let name = self.read_utf()?;
        if kind == FieldKind::Object {
            // The field's declared type, written as a string object.
            self.read_object()?;
        }
        Ok(FieldDesc { name, kind })
    }

    fn read_new_object(&mut self) -> Result<Value, ParseError> {
        let class = self
            .read_class_desc()?
            .ok_or(ParseError::Unsupported("object without class descriptor"))?;
        let slot = self.reserve_handle();
        let start = self.spent;
        self.charge(1)?;
        let mut fields = BTreeMap::new();
        for class in hierarchy(&class) {
            if class.flags & SC_EXTERNALIZABLE != 0 {
                if class.flags & SC_BLOCK_DATA == 0 {
                    return Err(ParseError::Unsupported("externalizable data in stream version 1"));
                }
                self.skip_annotation()?;
                continue;
            }
            for field in &class.fields {
                let value = self.read_field_value(field.kind)?;
                fields.insert(field.name.clone(), value);
            }
            if class.flags & SC_WRITE_METHOD != 0 {
                self.skip_annotation()?;
            }
        }
        let value = Value::Object(fields);
        self.fill_value(slot, &value, start);
        Ok(value)
    }

    fn read_new_array(&mut self) -> Result<Value, ParseError> {
        let class = self
            .read_class_desc()?
            .ok_or(ParseError::Unsupported("array without class descriptor"))?;
        let slot = self.reserve_handle();
        let start = self.spent;
        self.charge(1)?;
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| ParseError::InvalidLength(i64::from(len)))?;
        let element = class.name.as_bytes().get(1).copied().unwrap_or(b'L');
        let value = match FieldKind::from_code(element)? {
            FieldKind::Byte => {
                let bytes = self.take(len)?.to_vec();
                self.charge(bytes.len() / 8)?;
                Value::Bytes(bytes)
            }
            kind => {
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.read_field_value(kind)?);
                }
                Value::List(items)
            }
        };
        self.fill_value(slot, &value, start);
        Ok(value)
    }

    fn read_new_enum(&mut self) -> Result<Value, ParseError> {
        self.read_class_desc()?;
        let slot = self.reserve_handle();
        let start = self.spent;
        let value = match self.read_object()? {
            Value::String(name) => Value::String(name),
            _ => return Err(ParseError::Unsupported("enum constant without a name")),
        };
        self.fill_value(slot, &value, start);
        Ok(value)
    }

    fn read_field_value(&mut self, kind: FieldKind) -> Result<Value, ParseError> {
        if kind != FieldKind::Object {
            self.charge(1)?;
        }
        Ok(match kind {
            FieldKind::Byte => Value::Int(i64::from(i8::from_be_bytes(self.take_array()?))),
            FieldKind::Char => Value::Char(
                char::from_u32(u32::from(self.read_u16()?)).unwrap_or(char::REPLACEMENT_CHARACTER),
            ),
            FieldKind::Double => Value::Float(f64::from_bits(self.read_u64()?)),
            FieldKind::Float => Value::Float(f64::from(f32::from_bits(self.read_u32()?))),
            FieldKind::Int => Value::Int(i64::from(self.read_i32()?)),
            FieldKind::Long => Value::Int(self.read_i64()?),
            FieldKind::Short => Value::Int(i64::from(self.read_i16()?)),
            FieldKind::Bool => Value::Bool(self.read_u8()? != 0),
            FieldKind::Object => self.read_object()?,
        })
    }

    /// Skip annotation contents up to and including `TC_ENDBLOCKDATA`.
    fn skip_annotation(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek().ok_or(ParseError::UnexpectedEof)? {
                TC_ENDBLOCKDATA => {
                    self.pos += 1;
                    return Ok(());
                }
                TC_BLOCKDATA | TC_BLOCKDATALONG => self.skip_block_data()?,
                _ => {
                    self.read_object()?;
                }
            }
        }
    }

    fn skip_block_data(&mut self) -> Result<(), ParseError> {
        let len = match self.read_u8()? {
            TC_BLOCKDATA => usize::from(self.read_u8()?),
            _ => usize::try_from(self.read_u32()?).map_err(|_| ParseError::UnexpectedEof)?,
        };
        self.take(len)?;
        Ok(())
    }
}

/// Decode Java's modified UTF-8.
///
/// Well-formed standard UTF-8 takes the fast path; otherwise bytes are
/// decoded to UTF-16 units (covering the `c0 80` null and surrogate pairs)
/// with invalid sequences replaced.
fn decode_modified_utf8(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_owned();
    }
    let mut units = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(lead) = iter.next() {
        let unit = match lead {
            0x00..=0x7F => u16::from(lead),
            0xC0..=0xDF => {
                let b2 = iter.next().unwrap_or(0);
                (u16::from(lead & 0x1F) << 6) | u16::from(b2 & 0x3F)
            }
            0xE0..=0xEF => {
                let b2 = iter.next().unwrap_or(0);
                let b3 = iter.next().unwrap_or(0);
                (u16::from(lead & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F)
            }
            _ => 0xFFFD,
        };
        units.push(unit);
    }
    String::from_utf16_lossy(&units)
}
