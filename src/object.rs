//! Values and references in a target program.
//!
//! An object pairs a qualified type with either a self-contained value or an
//! address in the target's memory. Access is bit-granular: objects may be
//! bit fields, and both representations carry a sub-byte bit offset and a
//! byte order. Objects start out as empty void references; the setters form
//! the write surface.

pub(crate) mod ops;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::program::Program;
use crate::ty::{Kind, QualifiedType, Type};
use crate::ByteOrder;

/// The value category of an object, derived from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectKind {
    /// Aggregates and complex types: the value is a byte buffer.
    Buffer,
    Signed,
    Unsigned,
    Float,
    /// Reference to a void or function type: no value.
    None,
    /// Reference to an incomplete struct, union, or array type.
    IncompleteBuffer,
    /// Reference to an incomplete enum type.
    IncompleteInteger,
}

impl ObjectKind {
    pub fn is_complete(self) -> bool {
        matches!(
            self,
            ObjectKind::Buffer | ObjectKind::Signed | ObjectKind::Unsigned | ObjectKind::Float
        )
    }
}

pub(crate) fn value_size(bit_size: u64, bit_offset: u64) -> u64 {
    (bit_size + bit_offset).div_ceil(8)
}

fn mask(bits: u64) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Extracts `bit_size` bits starting `bit_offset` bits into `buf`. For
/// little-endian buffers the offset counts from the least significant bit of
/// the first byte; for big-endian, from the most significant bit.
pub(crate) fn deserialize_bits(
    buf: &[u8],
    bit_offset: u64,
    bit_size: u64,
    little_endian: bool,
) -> u64 {
    debug_assert!(bit_offset < 8 && bit_size >= 1 && bit_size <= 64);
    let size = value_size(bit_size, bit_offset) as usize;
    let wide_mask = u128::from(mask(bit_size));
    let mut acc: u128 = 0;
    if little_endian {
        for (i, &byte) in buf[..size].iter().enumerate() {
            acc |= u128::from(byte) << (8 * i);
        }
        ((acc >> bit_offset) & wide_mask) as u64
    } else {
        for &byte in &buf[..size] {
            acc = (acc << 8) | u128::from(byte);
        }
        let shift = 8 * size as u64 - bit_offset - bit_size;
        ((acc >> shift) & wide_mask) as u64
    }
}

pub(crate) fn sign_extend(value: u64, bits: u64) -> i64 {
    if bits >= 64 {
        value as i64
    } else if value & (1 << (bits - 1)) != 0 {
        (value | !mask(bits)) as i64
    } else {
        value as i64
    }
}

pub(crate) fn truncate_signed(value: i64, bits: u64) -> i64 {
    sign_extend(value as u64 & mask(bits), bits)
}

pub(crate) fn truncate_unsigned(value: u64, bits: u64) -> u64 {
    value & mask(bits)
}

fn narrow_float(value: f64, size: u64) -> f64 {
    if size == 4 {
        value as f32 as f64
    } else {
        value
    }
}

#[derive(Clone, Debug)]
enum Storage {
    /// Buffers of at most eight bytes live inline.
    Inline([u8; 8]),
    Heap(Vec<u8>),
}

/// A buffer value: raw object bytes plus their interpretation parameters.
#[derive(Clone, Debug)]
pub struct BufferValue {
    storage: Storage,
    /// Always less than 8.
    bit_offset: u8,
    little_endian: bool,
}

impl BufferValue {
    fn new(bytes: &[u8], bit_offset: u8, little_endian: bool) -> BufferValue {
        let storage = if bytes.len() <= 8 {
            let mut inline = [0u8; 8];
            inline[..bytes.len()].copy_from_slice(bytes);
            Storage::Inline(inline)
        } else {
            Storage::Heap(bytes.to_vec())
        };
        BufferValue {
            storage,
            bit_offset,
            little_endian,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Inline(bytes) => bytes,
            Storage::Heap(bytes) => bytes,
        }
    }

    pub fn bit_offset(&self) -> u8 {
        self.bit_offset
    }

    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }
}

/// The value of an object, independent of where it came from.
#[derive(Clone, Debug)]
pub enum Value {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Buffer(BufferValue),
}

#[derive(Clone, Debug)]
enum Repr {
    Value(Value),
    Reference {
        address: u64,
        /// Always less than 8 after normalization.
        bit_offset: u8,
        little_endian: bool,
    },
}

/// Derives the object kind and bit size for a type and bit-field width.
fn object_kind_and_size(
    qualified_type: &QualifiedType,
    bit_field_size: u64,
) -> Result<(ObjectKind, u64)> {
    let underlying = qualified_type.ty.underlying();
    let kind = match underlying.kind() {
        Kind::Int => {
            if underlying.is_signed() {
                ObjectKind::Signed
            } else {
                ObjectKind::Unsigned
            }
        }
        Kind::Bool | Kind::Pointer => ObjectKind::Unsigned,
        Kind::Enum => {
            if !underlying.is_complete() {
                ObjectKind::IncompleteInteger
            } else if underlying.is_signed() {
                ObjectKind::Signed
            } else {
                ObjectKind::Unsigned
            }
        }
        Kind::Float => ObjectKind::Float,
        Kind::Complex => ObjectKind::Buffer,
        Kind::Struct | Kind::Union | Kind::Array => {
            if underlying.is_complete() {
                ObjectKind::Buffer
            } else {
                ObjectKind::IncompleteBuffer
            }
        }
        Kind::Void | Kind::Function => ObjectKind::None,
        Kind::Typedef => unreachable!("typedefs are unwrapped"),
    };

    let bit_size = if bit_field_size != 0 {
        if !matches!(kind, ObjectKind::Signed | ObjectKind::Unsigned) {
            return Err(Error::InvalidArgument(
                "bit field must have integer type".into(),
            ));
        }
        if bit_field_size > 64 {
            return Err(Error::InvalidArgument("bit field is too large".into()));
        }
        bit_field_size
    } else {
        match kind {
            ObjectKind::None | ObjectKind::IncompleteBuffer | ObjectKind::IncompleteInteger => 0,
            ObjectKind::Signed | ObjectKind::Unsigned => {
                let bits = underlying.bit_size()?;
                if bits > 64 {
                    return Err(Error::InvalidArgument(
                        "integer type is too large".into(),
                    ));
                }
                bits
            }
            ObjectKind::Float => {
                let bits = underlying.bit_size()?;
                if bits != 32 && bits != 64 {
                    return Err(Error::InvalidArgument(
                        "unsupported floating-point size".into(),
                    ));
                }
                bits
            }
            ObjectKind::Buffer => underlying.bit_size()?,
        }
    };
    Ok((kind, bit_size))
}

/// Builds a value from buffer bytes according to the object kind.
fn value_from_buffer(
    kind: ObjectKind,
    bit_size: u64,
    bytes: &[u8],
    bit_offset: u64,
    little_endian: bool,
) -> Result<Value> {
    let needed = value_size(bit_size, bit_offset) as usize;
    if bytes.len() < needed {
        return Err(Error::InvalidArgument(
            "buffer is too small for type".into(),
        ));
    }
    Ok(match kind {
        ObjectKind::Signed => Value::Signed(sign_extend(
            deserialize_bits(bytes, bit_offset, bit_size, little_endian),
            bit_size,
        )),
        ObjectKind::Unsigned => Value::Unsigned(deserialize_bits(
            bytes,
            bit_offset,
            bit_size,
            little_endian,
        )),
        ObjectKind::Float => {
            let raw = deserialize_bits(bytes, bit_offset, bit_size, little_endian);
            Value::Float(if bit_size == 32 {
                f64::from(f32::from_bits(raw as u32))
            } else {
                f64::from_bits(raw)
            })
        }
        ObjectKind::Buffer => Value::Buffer(BufferValue::new(
            &bytes[..needed],
            bit_offset as u8,
            little_endian,
        )),
        _ => {
            return Err(Error::Type(
                "cannot read object with incomplete type".into(),
            ))
        }
    })
}

/// An object in a program: a typed value or a typed reference into the
/// target's memory.
#[derive(Clone)]
pub struct Object<'p> {
    prog: &'p Program,
    qualified_type: QualifiedType,
    /// Usually the type's size, narrower for bit fields.
    bit_size: u64,
    is_bit_field: bool,
    kind: ObjectKind,
    repr: Repr,
}

impl<'p> Object<'p> {
    /// An empty object: a null reference with void type. Give it contents
    /// with one of the setters.
    pub fn new(prog: &'p Program) -> Object<'p> {
        Object {
            prog,
            qualified_type: QualifiedType::unqualified(Type::void()),
            bit_size: 0,
            is_bit_field: false,
            kind: ObjectKind::None,
            repr: Repr::Reference {
                address: 0,
                bit_offset: 0,
                little_endian: prog.is_little_endian(),
            },
        }
    }

    pub fn program(&self) -> &'p Program {
        self.prog
    }

    pub fn qualified_type(&self) -> &QualifiedType {
        &self.qualified_type
    }

    pub fn ty(&self) -> &Type {
        &self.qualified_type.ty
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn bit_size(&self) -> u64 {
        self.bit_size
    }

    pub fn is_bit_field(&self) -> bool {
        self.is_bit_field
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.repr, Repr::Reference { .. })
    }

    /// Address of a reference object.
    pub fn address(&self) -> Option<u64> {
        match &self.repr {
            Repr::Reference { address, .. } => Some(*address),
            Repr::Value(_) => None,
        }
    }

    /// Size of the object in bytes. Bit fields have no byte size.
    pub fn sizeof(&self) -> Result<u64> {
        if self.is_bit_field {
            return Err(Error::Type("cannot get size of bit field".into()));
        }
        self.qualified_type.ty.sizeof()
    }

    pub fn set_signed(
        &mut self,
        qualified_type: QualifiedType,
        value: i64,
        bit_field_size: u64,
    ) -> Result<()> {
        let (kind, bit_size) = object_kind_and_size(&qualified_type, bit_field_size)?;
        if kind != ObjectKind::Signed {
            return Err(Error::Type(format!(
                "not a signed integer type: {:?}",
                qualified_type.ty.kind()
            )));
        }
        self.qualified_type = qualified_type;
        self.bit_size = bit_size;
        self.is_bit_field = bit_field_size != 0;
        self.kind = kind;
        self.repr = Repr::Value(Value::Signed(truncate_signed(value, bit_size)));
        Ok(())
    }

    pub fn set_unsigned(
        &mut self,
        qualified_type: QualifiedType,
        value: u64,
        bit_field_size: u64,
    ) -> Result<()> {
        let (kind, bit_size) = object_kind_and_size(&qualified_type, bit_field_size)?;
        if kind != ObjectKind::Unsigned {
            return Err(Error::Type(format!(
                "not an unsigned integer type: {:?}",
                qualified_type.ty.kind()
            )));
        }
        self.qualified_type = qualified_type;
        self.bit_size = bit_size;
        self.is_bit_field = bit_field_size != 0;
        self.kind = kind;
        self.repr = Repr::Value(Value::Unsigned(truncate_unsigned(value, bit_size)));
        Ok(())
    }

    pub fn set_float(&mut self, qualified_type: QualifiedType, value: f64) -> Result<()> {
        let (kind, bit_size) = object_kind_and_size(&qualified_type, 0)?;
        if kind != ObjectKind::Float {
            return Err(Error::Type(format!(
                "not a floating-point type: {:?}",
                qualified_type.ty.kind()
            )));
        }
        let size = bit_size / 8;
        self.qualified_type = qualified_type;
        self.bit_size = bit_size;
        self.is_bit_field = false;
        self.kind = kind;
        self.repr = Repr::Value(Value::Float(narrow_float(value, size)));
        Ok(())
    }

    /// Sets the object to a buffer value, copying from `buf`.
    pub fn set_buffer(
        &mut self,
        qualified_type: QualifiedType,
        buf: &[u8],
        bit_offset: u8,
        bit_field_size: u64,
        byte_order: ByteOrder,
    ) -> Result<()> {
        if bit_offset >= 8 {
            return Err(Error::InvalidArgument(
                "bit offset must be less than 8".into(),
            ));
        }
        let (kind, bit_size) = object_kind_and_size(&qualified_type, bit_field_size)?;
        if kind != ObjectKind::Buffer {
            return Err(Error::Type(format!(
                "not a buffer type: {:?}",
                qualified_type.ty.kind()
            )));
        }
        let little_endian = byte_order.is_little(self.prog.is_little_endian());
        let value =
            value_from_buffer(kind, bit_size, buf, u64::from(bit_offset), little_endian)?;
        self.qualified_type = qualified_type;
        self.bit_size = bit_size;
        self.is_bit_field = bit_field_size != 0;
        self.kind = kind;
        self.repr = Repr::Value(value);
        Ok(())
    }

    /// Sets the object to a value deserialized from raw bytes, whatever its
    /// kind. Used for objects recovered from register contents, where the
    /// byte layout is known even for scalars.
    pub(crate) fn set_from_buffer_any(
        &mut self,
        qualified_type: QualifiedType,
        buf: &[u8],
        byte_order: ByteOrder,
    ) -> Result<()> {
        let (kind, bit_size) = object_kind_and_size(&qualified_type, 0)?;
        if !kind.is_complete() {
            return Err(Error::Type(
                "cannot create value with incomplete type".into(),
            ));
        }
        let little_endian = byte_order.is_little(self.prog.is_little_endian());
        let value = value_from_buffer(kind, bit_size, buf, 0, little_endian)?;
        self.qualified_type = qualified_type;
        self.bit_size = bit_size;
        self.is_bit_field = false;
        self.kind = kind;
        self.repr = Repr::Value(value);
        Ok(())
    }

    /// Sets the object to a reference. No memory is read.
    pub fn set_reference(
        &mut self,
        qualified_type: QualifiedType,
        address: u64,
        bit_offset: u64,
        bit_field_size: u64,
        byte_order: ByteOrder,
    ) -> Result<()> {
        let (kind, bit_size) = object_kind_and_size(&qualified_type, bit_field_size)?;
        let address = address.wrapping_add(bit_offset / 8);
        let bit_offset = (bit_offset % 8) as u8;
        self.qualified_type = qualified_type;
        self.bit_size = bit_size;
        self.is_bit_field = bit_field_size != 0;
        self.kind = kind;
        self.repr = Repr::Reference {
            address,
            bit_offset,
            little_endian: byte_order.is_little(self.prog.is_little_endian()),
        };
        Ok(())
    }

    /// Reads the object's value. References are fetched from target memory
    /// with a single read; values are returned as-is. The object itself is
    /// never modified.
    pub fn read_value(&self) -> Result<Value> {
        match &self.repr {
            Repr::Value(value) => Ok(value.clone()),
            Repr::Reference {
                address,
                bit_offset,
                little_endian,
            } => {
                if !self.kind.is_complete() {
                    return Err(Error::Type(match self.kind {
                        ObjectKind::None => {
                            "cannot read object with void or function type".into()
                        }
                        _ => "cannot read object with incomplete type".into(),
                    }));
                }
                let size = value_size(self.bit_size, u64::from(*bit_offset));
                let mut buf = vec![0u8; size as usize];
                self.prog.read_memory(&mut buf, *address, false)?;
                value_from_buffer(
                    self.kind,
                    self.bit_size,
                    &buf,
                    u64::from(*bit_offset),
                    *little_endian,
                )
            }
        }
    }

    /// Reads the object into a self-contained value object of the same
    /// type.
    pub fn read(&self) -> Result<Object<'p>> {
        let value = self.read_value()?;
        Ok(Object {
            prog: self.prog,
            qualified_type: self.qualified_type.clone(),
            bit_size: self.bit_size,
            is_bit_field: self.is_bit_field,
            kind: self.kind,
            repr: Repr::Value(value),
        })
    }

    pub fn read_signed(&self) -> Result<i64> {
        if self.kind != ObjectKind::Signed {
            return Err(Error::Type("not a signed integer".into()));
        }
        match self.read_value()? {
            Value::Signed(value) => Ok(value),
            _ => Err(Error::Type("not a signed integer".into())),
        }
    }

    pub fn read_unsigned(&self) -> Result<u64> {
        if self.kind != ObjectKind::Unsigned {
            return Err(Error::Type("not an unsigned integer".into()));
        }
        match self.read_value()? {
            Value::Unsigned(value) => Ok(value),
            _ => Err(Error::Type("not an unsigned integer".into())),
        }
    }

    pub fn read_float(&self) -> Result<f64> {
        if self.kind != ObjectKind::Float {
            return Err(Error::Type("not a floating-point value".into()));
        }
        match self.read_value()? {
            Value::Float(value) => Ok(value),
            _ => Err(Error::Type("not a floating-point value".into())),
        }
    }

    /// The truthiness of an object: nonzero for scalars, any nonzero byte
    /// for buffers.
    pub fn truthiness(&self) -> Result<bool> {
        Ok(match self.read_value()? {
            Value::Signed(value) => value != 0,
            Value::Unsigned(value) => value != 0,
            Value::Float(value) => value != 0.0,
            Value::Buffer(buffer) => {
                let size = value_size(self.bit_size, u64::from(buffer.bit_offset()));
                buffer.bytes()[..size as usize].iter().any(|&b| b != 0)
            }
        })
    }

    /// Derives an object within the same container: a new type applied at a
    /// bit offset from the start of this object. The source must have a
    /// byte layout (a buffer value or any reference).
    pub fn slice(
        &self,
        qualified_type: QualifiedType,
        bit_offset: u64,
        bit_field_size: u64,
    ) -> Result<Object<'p>> {
        let (kind, bit_size) = object_kind_and_size(&qualified_type, bit_field_size)?;
        match &self.repr {
            Repr::Reference {
                address,
                bit_offset: reference_offset,
                little_endian,
            } => {
                let total = u64::from(*reference_offset) + bit_offset;
                Ok(Object {
                    prog: self.prog,
                    qualified_type,
                    bit_size,
                    is_bit_field: bit_field_size != 0,
                    kind,
                    repr: Repr::Reference {
                        address: address.wrapping_add(total / 8),
                        bit_offset: (total % 8) as u8,
                        little_endian: *little_endian,
                    },
                })
            }
            Repr::Value(Value::Buffer(buffer)) => {
                let start = u64::from(buffer.bit_offset) + bit_offset;
                let byte_start = (start / 8) as usize;
                let sub_offset = start % 8;
                let needed = value_size(bit_size, sub_offset) as usize;
                let bytes = buffer
                    .bytes()
                    .get(byte_start..)
                    .filter(|rest| rest.len() >= needed)
                    .ok_or_else(|| {
                        Error::InvalidArgument("out of bounds of value".into())
                    })?;
                let value = value_from_buffer(
                    kind,
                    bit_size,
                    bytes,
                    sub_offset,
                    buffer.little_endian,
                )?;
                Ok(Object {
                    prog: self.prog,
                    qualified_type,
                    bit_size,
                    is_bit_field: bit_field_size != 0,
                    kind,
                    repr: Repr::Value(value),
                })
            }
            Repr::Value(_) => Err(Error::Type(
                "cannot slice a scalar value".into(),
            )),
        }
    }

    /// Turns a pointer into a reference to the pointed-to region at a bit
    /// offset.
    pub fn dereference_offset(
        &self,
        qualified_type: QualifiedType,
        bit_offset: u64,
        bit_field_size: u64,
    ) -> Result<Object<'p>> {
        let address = self.read_unsigned()?;
        let mut result = Object::new(self.prog);
        result.set_reference(
            qualified_type,
            address,
            bit_offset,
            bit_field_size,
            ByteOrder::Program,
        )?;
        Ok(result)
    }

    /// The address of a reference object, as a pointer value.
    pub fn address_of(&self) -> Result<Object<'p>> {
        let Repr::Reference {
            address,
            bit_offset,
            ..
        } = &self.repr
        else {
            return Err(Error::Type("cannot take address of value".into()));
        };
        if self.is_bit_field || *bit_offset != 0 {
            return Err(Error::InvalidArgument(
                "cannot take address of bit field".into(),
            ));
        }
        let address = *address;
        let pointer = self
            .prog
            .types_mut()
            .pointer_to(self.qualified_type.clone());
        let mut result = Object::new(self.prog);
        result.set_unsigned(QualifiedType::unqualified(pointer), address, 0)?;
        Ok(result)
    }

    /// Subscripts a pointer or array.
    pub fn subscript(&self, index: u64) -> Result<Object<'p>> {
        let underlying = self.qualified_type.ty.underlying();
        let element = underlying.element_info()?;
        let offset = index
            .checked_mul(element.bit_size)
            .ok_or_else(|| Error::Overflow("element offset is too large".into()))?;
        match underlying.kind() {
            Kind::Array => self.slice(element.qualified_type, offset, 0),
            _ => self.dereference_offset(element.qualified_type, offset, 0),
        }
    }

    /// Dereferences a pointer; equivalent to subscript 0.
    pub fn dereference(&self) -> Result<Object<'p>> {
        self.subscript(0)
    }

    /// Looks up a member of a struct or union object.
    pub fn member(&self, name: &str) -> Result<Object<'p>> {
        let info = self.qualified_type.ty.member_info(name)?;
        self.slice(info.qualified_type, info.bit_offset, info.bit_field_size)
    }

    /// Looks up a member through a pointer to a struct or union.
    pub fn member_dereference(&self, name: &str) -> Result<Object<'p>> {
        let underlying = self.qualified_type.ty.underlying();
        if underlying.kind() != Kind::Pointer {
            return Err(Error::Type(
                "not a pointer to a structure or union".into(),
            ));
        }
        let info = underlying.wrapped_type().ty.member_info(name)?;
        self.dereference_offset(info.qualified_type, info.bit_offset, info.bit_field_size)
    }

    /// Reinterprets the object's memory as another type. Scalar values have
    /// no defined byte layout and cannot be reinterpreted; references stay
    /// references.
    pub fn reinterpret(
        &self,
        qualified_type: QualifiedType,
        byte_order: ByteOrder,
    ) -> Result<Object<'p>> {
        let little_endian = byte_order.is_little(self.prog.is_little_endian());
        match &self.repr {
            Repr::Reference {
                address,
                bit_offset,
                ..
            } => {
                let (kind, bit_size) = object_kind_and_size(&qualified_type, 0)?;
                Ok(Object {
                    prog: self.prog,
                    qualified_type,
                    bit_size,
                    is_bit_field: false,
                    kind,
                    repr: Repr::Reference {
                        address: *address,
                        bit_offset: *bit_offset,
                        little_endian,
                    },
                })
            }
            Repr::Value(Value::Buffer(buffer)) => {
                let (kind, bit_size) = object_kind_and_size(&qualified_type, 0)?;
                let value = value_from_buffer(
                    kind,
                    bit_size,
                    buffer.bytes(),
                    u64::from(buffer.bit_offset),
                    little_endian,
                )?;
                Ok(Object {
                    prog: self.prog,
                    qualified_type,
                    bit_size,
                    is_bit_field: false,
                    kind,
                    repr: Repr::Value(value),
                })
            }
            Repr::Value(_) => Err(Error::Type(
                "cannot reinterpret a scalar value".into(),
            )),
        }
    }

    /// Reads the string pointed to by a pointer object or held by an array
    /// object, stopping at the first NUL byte or after `max` bytes.
    pub fn read_c_string(&self, max: usize) -> Result<Vec<u8>> {
        let underlying = self.qualified_type.ty.underlying();
        let (address, limit) = match underlying.kind() {
            Kind::Pointer => (self.read_unsigned()?, max as u64),
            Kind::Array => {
                let limit = match underlying.length() {
                    Some(length) => {
                        let element_size = underlying.wrapped_type().ty.sizeof()?;
                        (length * element_size).min(max as u64)
                    }
                    None => max as u64,
                };
                match &self.repr {
                    Repr::Reference { address, .. } => (*address, limit),
                    Repr::Value(Value::Buffer(buffer)) => {
                        let bytes = buffer.bytes();
                        let end = (limit as usize).min(bytes.len());
                        let bytes = &bytes[..end];
                        let nul = bytes.iter().position(|&b| b == 0).unwrap_or(end);
                        return Ok(bytes[..nul].to_vec());
                    }
                    Repr::Value(_) => {
                        return Err(Error::Type("array value has no buffer".into()))
                    }
                }
            }
            kind => {
                return Err(Error::Type(format!(
                    "{kind:?} object is not a string"
                )))
            }
        };

        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..limit {
            self.prog
                .read_memory(&mut byte, address.wrapping_add(i), false)?;
            if byte[0] == 0 {
                break;
            }
            out.push(byte[0]);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Object");
        debug
            .field("type", &self.qualified_type.ty)
            .field("kind", &self.kind)
            .field("bit_size", &self.bit_size);
        match &self.repr {
            Repr::Value(value) => debug.field("value", value),
            Repr::Reference { address, .. } => debug.field("address", &format_args!("{address:#x}")),
        };
        debug.finish()
    }
}
