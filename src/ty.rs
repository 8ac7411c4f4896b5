//! The language-agnostic type model.
//!
//! A [`Type`] is an immutable, shared descriptor for one program type. The
//! kind family is a closed sum; accessors that only make sense for one kind
//! panic when applied to another, which is an assertion-class programmer
//! error, not a runtime failure. Struct/union members and function
//! parameters hold their types lazily so that recursive types can be
//! constructed and so that realizing a type does not force its whole
//! reachable graph.

pub mod lazy;
pub mod primitive;
pub mod table;

use std::collections::HashSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};

pub use lazy::{LazyType, TypeThunk};
pub use primitive::PrimitiveType;
pub use table::{NamedKind, TypeFinder, TypeTable};

/// Type qualifier bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Qualifiers(u8);

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers(0);
    pub const CONST: Qualifiers = Qualifiers(1 << 0);
    pub const VOLATILE: Qualifiers = Qualifiers(1 << 1);
    pub const RESTRICT: Qualifiers = Qualifiers(1 << 2);
    pub const ATOMIC: Qualifiers = Qualifiers(1 << 3);

    pub fn contains(self, other: Qualifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Qualifiers {
    type Output = Qualifiers;

    fn bitor(self, rhs: Qualifiers) -> Qualifiers {
        Qualifiers(self.0 | rhs.0)
    }
}

impl BitOrAssign for Qualifiers {
    fn bitor_assign(&mut self, rhs: Qualifiers) {
        self.0 |= rhs.0;
    }
}

/// A type together with the qualifiers applied to it.
#[derive(Debug, Clone)]
pub struct QualifiedType {
    pub ty: Type,
    pub qualifiers: Qualifiers,
}

impl QualifiedType {
    pub fn new(ty: Type, qualifiers: Qualifiers) -> QualifiedType {
        QualifiedType { ty, qualifiers }
    }

    pub fn unqualified(ty: Type) -> QualifiedType {
        QualifiedType {
            ty,
            qualifiers: Qualifiers::NONE,
        }
    }

    /// Component-wise equality: same qualifiers, structurally equal types.
    pub fn equal(&self, other: &QualifiedType) -> Result<bool> {
        Ok(self.qualifiers == other.qualifiers && Type::equal(&self.ty, &other.ty)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Kind {
    Void,
    Int,
    Bool,
    Float,
    Complex,
    Struct,
    Union,
    Enum,
    Typedef,
    Pointer,
    Array,
    Function,
}

/// Member of a structure or union type.
pub struct Member {
    /// `None` for unnamed members, whose own members are found by
    /// path-splicing lookup.
    pub name: Option<Box<str>>,
    pub ty: LazyType,
    /// Offset in bits from the start of the containing type.
    pub bit_offset: u64,
    /// Width in bits for bit fields, `0` otherwise.
    pub bit_field_size: u64,
}

impl Member {
    pub fn new(
        name: Option<&str>,
        ty: LazyType,
        bit_offset: u64,
        bit_field_size: u64,
    ) -> Member {
        Member {
            name: name.map(Into::into),
            ty,
            bit_offset,
            bit_field_size,
        }
    }
}

pub struct Parameter {
    pub name: Option<Box<str>>,
    pub ty: LazyType,
}

impl Parameter {
    pub fn new(name: Option<&str>, ty: LazyType) -> Parameter {
        Parameter {
            name: name.map(Into::into),
            ty,
        }
    }
}

/// Value of an enumerated type. The 64-bit payload is interpreted per the
/// enumeration's signedness.
#[derive(Debug, Clone)]
pub struct Enumerator {
    pub name: Box<str>,
    pub value: u64,
}

impl Enumerator {
    pub fn new_unsigned(name: &str, value: u64) -> Enumerator {
        Enumerator {
            name: name.into(),
            value,
        }
    }

    pub fn new_signed(name: &str, value: i64) -> Enumerator {
        Enumerator {
            name: name.into(),
            value: value as u64,
        }
    }

    pub fn signed_value(&self) -> i64 {
        self.value as i64
    }
}

struct Compound {
    tag: Option<Box<str>>,
    size: u64,
    members: Vec<Member>,
    complete: bool,
}

enum Variant {
    Void,
    Int {
        name: Box<str>,
        size: u64,
        is_signed: bool,
    },
    Bool {
        name: Box<str>,
        size: u64,
    },
    Float {
        name: Box<str>,
        size: u64,
    },
    Complex {
        name: Box<str>,
        size: u64,
        real: QualifiedType,
    },
    Struct(Compound),
    Union(Compound),
    Enum {
        tag: Option<Box<str>>,
        /// The compatible integer type; present iff the enum is complete.
        compatible: Option<Type>,
        enumerators: Vec<Enumerator>,
    },
    Typedef {
        name: Box<str>,
        aliased: QualifiedType,
    },
    Pointer {
        size: u64,
        referenced: QualifiedType,
    },
    Array {
        /// `None` for incomplete arrays.
        length: Option<u64>,
        element: QualifiedType,
    },
    Function {
        return_type: QualifiedType,
        parameters: Vec<Parameter>,
        is_variadic: bool,
    },
}

struct TypeData {
    variant: Variant,
    primitive: Option<PrimitiveType>,
}

/// An immutable, shared type descriptor.
#[derive(Clone)]
pub struct Type {
    data: Arc<TypeData>,
}

impl Type {
    fn from_variant(variant: Variant, primitive: Option<PrimitiveType>) -> Type {
        Type {
            data: Arc::new(TypeData { variant, primitive }),
        }
    }

    pub fn void() -> Type {
        Type::from_variant(Variant::Void, Some(PrimitiveType::Void))
    }

    pub fn int(
        name: &str,
        size: u64,
        is_signed: bool,
        primitive: Option<PrimitiveType>,
    ) -> Type {
        Type::from_variant(
            Variant::Int {
                name: name.into(),
                size,
                is_signed,
            },
            primitive,
        )
    }

    pub fn bool_type(name: &str, size: u64, primitive: Option<PrimitiveType>) -> Type {
        Type::from_variant(
            Variant::Bool {
                name: name.into(),
                size,
            },
            primitive,
        )
    }

    pub fn float(name: &str, size: u64, primitive: Option<PrimitiveType>) -> Type {
        Type::from_variant(
            Variant::Float {
                name: name.into(),
                size,
            },
            primitive,
        )
    }

    pub fn complex(name: &str, size: u64, real: QualifiedType) -> Type {
        Type::from_variant(Variant::Complex { name: name.into(), size, real }, None)
    }

    pub fn structure(tag: Option<&str>, size: u64, members: Vec<Member>) -> Type {
        Type::from_variant(
            Variant::Struct(Compound {
                tag: tag.map(Into::into),
                size,
                members,
                complete: true,
            }),
            None,
        )
    }

    pub fn incomplete_structure(tag: Option<&str>) -> Type {
        Type::from_variant(
            Variant::Struct(Compound {
                tag: tag.map(Into::into),
                size: 0,
                members: Vec::new(),
                complete: false,
            }),
            None,
        )
    }

    pub fn union_type(tag: Option<&str>, size: u64, members: Vec<Member>) -> Type {
        Type::from_variant(
            Variant::Union(Compound {
                tag: tag.map(Into::into),
                size,
                members,
                complete: true,
            }),
            None,
        )
    }

    pub fn incomplete_union(tag: Option<&str>) -> Type {
        Type::from_variant(
            Variant::Union(Compound {
                tag: tag.map(Into::into),
                size: 0,
                members: Vec::new(),
                complete: false,
            }),
            None,
        )
    }

    pub fn enumeration(
        tag: Option<&str>,
        compatible: Type,
        enumerators: Vec<Enumerator>,
    ) -> Type {
        Type::from_variant(
            Variant::Enum {
                tag: tag.map(Into::into),
                compatible: Some(compatible),
                enumerators,
            },
            None,
        )
    }

    pub fn incomplete_enumeration(tag: Option<&str>) -> Type {
        Type::from_variant(
            Variant::Enum {
                tag: tag.map(Into::into),
                compatible: None,
                enumerators: Vec::new(),
            },
            None,
        )
    }

    pub fn typedef(
        name: &str,
        aliased: QualifiedType,
        primitive: Option<PrimitiveType>,
    ) -> Type {
        Type::from_variant(
            Variant::Typedef {
                name: name.into(),
                aliased,
            },
            primitive,
        )
    }

    pub fn pointer(size: u64, referenced: QualifiedType) -> Type {
        Type::from_variant(Variant::Pointer { size, referenced }, None)
    }

    pub fn array(length: u64, element: QualifiedType) -> Type {
        Type::from_variant(
            Variant::Array {
                length: Some(length),
                element,
            },
            None,
        )
    }

    pub fn incomplete_array(element: QualifiedType) -> Type {
        Type::from_variant(
            Variant::Array {
                length: None,
                element,
            },
            None,
        )
    }

    pub fn function(
        return_type: QualifiedType,
        parameters: Vec<Parameter>,
        is_variadic: bool,
    ) -> Type {
        Type::from_variant(
            Variant::Function {
                return_type,
                parameters,
                is_variadic,
            },
            None,
        )
    }

    /// Identity comparison: the same descriptor, not structural equality.
    pub fn ptr_eq(a: &Type, b: &Type) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }

    pub fn kind(&self) -> Kind {
        match &self.data.variant {
            Variant::Void => Kind::Void,
            Variant::Int { .. } => Kind::Int,
            Variant::Bool { .. } => Kind::Bool,
            Variant::Float { .. } => Kind::Float,
            Variant::Complex { .. } => Kind::Complex,
            Variant::Struct(_) => Kind::Struct,
            Variant::Union(_) => Kind::Union,
            Variant::Enum { .. } => Kind::Enum,
            Variant::Typedef { .. } => Kind::Typedef,
            Variant::Pointer { .. } => Kind::Pointer,
            Variant::Array { .. } => Kind::Array,
            Variant::Function { .. } => Kind::Function,
        }
    }

    pub fn primitive(&self) -> Option<PrimitiveType> {
        self.data.primitive
    }

    /// Whether the definition of the type is known. Always false for void,
    /// possibly false for struct/union/enum/array, true otherwise.
    pub fn is_complete(&self) -> bool {
        match &self.data.variant {
            Variant::Void => false,
            Variant::Struct(compound) | Variant::Union(compound) => compound.complete,
            Variant::Enum { compatible, .. } => compatible.is_some(),
            Variant::Array { length, .. } => length.is_some(),
            _ => true,
        }
    }

    pub fn name(&self) -> &str {
        match &self.data.variant {
            Variant::Int { name, .. }
            | Variant::Bool { name, .. }
            | Variant::Float { name, .. }
            | Variant::Complex { name, .. }
            | Variant::Typedef { name, .. } => name,
            _ => panic!("{:?} type has no name", self.kind()),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.data.variant {
            Variant::Struct(compound) | Variant::Union(compound) => compound.tag.as_deref(),
            Variant::Enum { tag, .. } => tag.as_deref(),
            _ => panic!("{:?} type has no tag", self.kind()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.tag().is_none()
    }

    /// Size in bytes, for the kinds that store one directly. See
    /// [`Type::sizeof`] for the general operation.
    pub fn size(&self) -> u64 {
        match &self.data.variant {
            Variant::Int { size, .. }
            | Variant::Bool { size, .. }
            | Variant::Float { size, .. }
            | Variant::Complex { size, .. }
            | Variant::Pointer { size, .. } => *size,
            Variant::Struct(compound) | Variant::Union(compound) => compound.size,
            _ => panic!("{:?} type has no size", self.kind()),
        }
    }

    pub fn is_signed(&self) -> bool {
        match &self.data.variant {
            Variant::Int { is_signed, .. } => *is_signed,
            Variant::Enum {
                compatible: Some(compatible),
                ..
            } => compatible.is_signed(),
            Variant::Enum { compatible: None, .. } => {
                panic!("incomplete enum type has no signedness")
            }
            _ => panic!("{:?} type has no signedness", self.kind()),
        }
    }

    pub fn length(&self) -> Option<u64> {
        match &self.data.variant {
            Variant::Array { length, .. } => *length,
            _ => panic!("{:?} type has no length", self.kind()),
        }
    }

    pub fn members(&self) -> &[Member] {
        match &self.data.variant {
            Variant::Struct(compound) | Variant::Union(compound) => &compound.members,
            _ => panic!("{:?} type has no members", self.kind()),
        }
    }

    pub fn enumerators(&self) -> &[Enumerator] {
        match &self.data.variant {
            Variant::Enum { enumerators, .. } => enumerators,
            _ => panic!("{:?} type has no enumerators", self.kind()),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        match &self.data.variant {
            Variant::Function { parameters, .. } => parameters,
            _ => panic!("{:?} type has no parameters", self.kind()),
        }
    }

    pub fn is_variadic(&self) -> bool {
        match &self.data.variant {
            Variant::Function { is_variadic, .. } => *is_variadic,
            _ => panic!("{:?} type cannot be variadic", self.kind()),
        }
    }

    /// The type wrapped by this one: the real type of a complex, the aliased
    /// type of a typedef, the referenced type of a pointer, the element type
    /// of an array, the return type of a function, or the compatible integer
    /// type of a complete enum.
    pub fn wrapped_type(&self) -> QualifiedType {
        match &self.data.variant {
            Variant::Complex { real, .. } => real.clone(),
            Variant::Typedef { aliased, .. } => aliased.clone(),
            Variant::Pointer { referenced, .. } => referenced.clone(),
            Variant::Array { element, .. } => element.clone(),
            Variant::Function { return_type, .. } => return_type.clone(),
            Variant::Enum {
                compatible: Some(compatible),
                ..
            } => QualifiedType::unqualified(compatible.clone()),
            _ => panic!("{:?} type wraps no type", self.kind()),
        }
    }

    /// The compatible integer type of an enum, or `None` if incomplete.
    pub fn compatible_type(&self) -> Option<Type> {
        match &self.data.variant {
            Variant::Enum { compatible, .. } => compatible.clone(),
            _ => panic!("{:?} type has no compatible type", self.kind()),
        }
    }

    /// Unwraps typedef layers. Functions that reason about numeric semantics
    /// operate on the result.
    pub fn underlying(&self) -> Type {
        let mut ty = self.clone();
        loop {
            let next = match &ty.data.variant {
                Variant::Typedef { aliased, .. } => aliased.ty.clone(),
                _ => return ty,
            };
            ty = next;
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind(), Kind::Int | Kind::Bool | Kind::Enum)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.kind() == Kind::Float
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.kind() == Kind::Pointer
    }

    /// Size in bytes across typedefs and arrays. Void, function, and
    /// incomplete types have no size.
    pub fn sizeof(&self) -> Result<u64> {
        match &self.data.variant {
            Variant::Void => Err(Error::Type("cannot get size of void type".into())),
            Variant::Function { .. } => {
                Err(Error::Type("cannot get size of function type".into()))
            }
            Variant::Typedef { aliased, .. } => aliased.ty.sizeof(),
            Variant::Enum {
                compatible: Some(compatible),
                ..
            } => compatible.sizeof(),
            Variant::Array {
                length: Some(length),
                element,
            } => length
                .checked_mul(element.ty.sizeof()?)
                .ok_or_else(|| Error::Overflow("array size is too large".into())),
            _ if !self.is_complete() => {
                Err(Error::Type("cannot get size of incomplete type".into()))
            }
            _ => Ok(self.size()),
        }
    }

    pub fn bit_size(&self) -> Result<u64> {
        self.sizeof()?
            .checked_mul(8)
            .ok_or_else(|| Error::Overflow("type size in bits is too large".into()))
    }

    /// Structural equality. Two types are equal if their kinds and all of
    /// their fields are equal, recursively, with lazy member and parameter
    /// slots forced. A typedef is never equal to its aliased type.
    pub fn equal(a: &Type, b: &Type) -> Result<bool> {
        let mut seen = HashSet::new();
        equal_impl(a, b, &mut seen)
    }

    /// Member lookup by name, recursing into unnamed members and
    /// accumulating their bit offsets.
    pub fn member_info(&self, name: &str) -> Result<MemberInfo> {
        let underlying = self.underlying();
        if !matches!(underlying.kind(), Kind::Struct | Kind::Union) {
            return Err(Error::Type(format!(
                "{:?} type is not a structure or union",
                underlying.kind()
            )));
        }
        if !underlying.is_complete() {
            return Err(Error::Type(
                "cannot find member in incomplete type".into(),
            ));
        }
        match find_member(&underlying, name, 0)? {
            Some(info) => Ok(info),
            None => {
                let tag = underlying.tag().unwrap_or("<anonymous>").to_owned();
                Err(Error::Lookup(format!("'{tag}' has no member '{name}'")))
            }
        }
    }

    /// Element type and stride of a pointer or array.
    pub fn element_info(&self) -> Result<ElementInfo> {
        let underlying = self.underlying();
        let qualified_type = match underlying.kind() {
            Kind::Pointer | Kind::Array => underlying.wrapped_type(),
            kind => {
                return Err(Error::Type(format!(
                    "{kind:?} type has no elements"
                )))
            }
        };
        let bit_size = qualified_type.ty.bit_size()?;
        Ok(ElementInfo {
            qualified_type,
            bit_size,
        })
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Deliberately shallow: recursive types must not recurse here.
        match &self.data.variant {
            Variant::Int { name, .. }
            | Variant::Bool { name, .. }
            | Variant::Float { name, .. }
            | Variant::Complex { name, .. }
            | Variant::Typedef { name, .. } => {
                write!(f, "Type({:?} {name:?})", self.kind())
            }
            Variant::Struct(compound) | Variant::Union(compound) => {
                write!(f, "Type({:?} {:?})", self.kind(), compound.tag)
            }
            Variant::Enum { tag, .. } => write!(f, "Type(Enum {tag:?})"),
            _ => write!(f, "Type({:?})", self.kind()),
        }
    }
}

/// Result of [`Type::member_info`].
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub qualified_type: QualifiedType,
    /// Offset in bits from the type the lookup started at.
    pub bit_offset: u64,
    pub bit_field_size: u64,
}

/// Result of [`Type::element_info`].
#[derive(Debug, Clone)]
pub struct ElementInfo {
    pub qualified_type: QualifiedType,
    /// Element `i` lives at bit offset `i * bit_size`.
    pub bit_size: u64,
}

fn find_member(ty: &Type, name: &str, bit_offset: u64) -> Result<Option<MemberInfo>> {
    for member in ty.members() {
        let offset = bit_offset
            .checked_add(member.bit_offset)
            .ok_or_else(|| Error::Overflow("member offset is too large".into()))?;
        match &member.name {
            Some(member_name) if &**member_name == name => {
                return Ok(Some(MemberInfo {
                    qualified_type: member.ty.get()?,
                    bit_offset: offset,
                    bit_field_size: member.bit_field_size,
                }));
            }
            Some(_) => {}
            None => {
                let member_type = member.ty.get()?.ty.underlying();
                if matches!(member_type.kind(), Kind::Struct | Kind::Union) {
                    if let Some(info) = find_member(&member_type, name, offset)? {
                        return Ok(Some(info));
                    }
                }
            }
        }
    }
    Ok(None)
}

fn lazy_equal(
    a: &LazyType,
    b: &LazyType,
    seen: &mut HashSet<(usize, usize)>,
) -> Result<bool> {
    let a = a.get()?;
    let b = b.get()?;
    Ok(a.qualifiers == b.qualifiers && equal_impl(&a.ty, &b.ty, seen)?)
}

fn qualified_equal(
    a: &QualifiedType,
    b: &QualifiedType,
    seen: &mut HashSet<(usize, usize)>,
) -> Result<bool> {
    Ok(a.qualifiers == b.qualifiers && equal_impl(&a.ty, &b.ty, seen)?)
}

fn equal_impl(a: &Type, b: &Type, seen: &mut HashSet<(usize, usize)>) -> Result<bool> {
    if Type::ptr_eq(a, b) {
        return Ok(true);
    }
    // Recursive types: if this pair is already being compared further up
    // the stack, assume equality to break the cycle.
    let pair = (
        Arc::as_ptr(&a.data) as usize,
        Arc::as_ptr(&b.data) as usize,
    );
    if !seen.insert(pair) {
        return Ok(true);
    }
    let result = equal_fields(a, b, seen);
    seen.remove(&pair);
    result
}

fn equal_fields(a: &Type, b: &Type, seen: &mut HashSet<(usize, usize)>) -> Result<bool> {
    use Variant::*;

    match (&a.data.variant, &b.data.variant) {
        (Void, Void) => Ok(true),
        (
            Int {
                name: name_a,
                size: size_a,
                is_signed: signed_a,
            },
            Int {
                name: name_b,
                size: size_b,
                is_signed: signed_b,
            },
        ) => Ok(name_a == name_b && size_a == size_b && signed_a == signed_b),
        (
            Bool {
                name: name_a,
                size: size_a,
            },
            Bool {
                name: name_b,
                size: size_b,
            },
        )
        | (
            Float {
                name: name_a,
                size: size_a,
            },
            Float {
                name: name_b,
                size: size_b,
            },
        ) => Ok(name_a == name_b && size_a == size_b),
        (
            Complex {
                name: name_a,
                size: size_a,
                real: real_a,
            },
            Complex {
                name: name_b,
                size: size_b,
                real: real_b,
            },
        ) => Ok(name_a == name_b
            && size_a == size_b
            && qualified_equal(real_a, real_b, seen)?),
        (Struct(compound_a), Struct(compound_b))
        | (Union(compound_a), Union(compound_b)) => {
            if compound_a.tag != compound_b.tag
                || compound_a.complete != compound_b.complete
                || compound_a.size != compound_b.size
                || compound_a.members.len() != compound_b.members.len()
            {
                return Ok(false);
            }
            for (member_a, member_b) in
                compound_a.members.iter().zip(&compound_b.members)
            {
                if member_a.name != member_b.name
                    || member_a.bit_offset != member_b.bit_offset
                    || member_a.bit_field_size != member_b.bit_field_size
                    || !lazy_equal(&member_a.ty, &member_b.ty, seen)?
                {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (
            Enum {
                tag: tag_a,
                compatible: compatible_a,
                enumerators: enumerators_a,
            },
            Enum {
                tag: tag_b,
                compatible: compatible_b,
                enumerators: enumerators_b,
            },
        ) => {
            if tag_a != tag_b || enumerators_a.len() != enumerators_b.len() {
                return Ok(false);
            }
            match (compatible_a, compatible_b) {
                (None, None) => {}
                (Some(compatible_a), Some(compatible_b)) => {
                    if !equal_impl(compatible_a, compatible_b, seen)? {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
            Ok(enumerators_a.iter().zip(enumerators_b).all(|(ea, eb)| {
                ea.name == eb.name && ea.value == eb.value
            }))
        }
        (
            Typedef {
                name: name_a,
                aliased: aliased_a,
            },
            Typedef {
                name: name_b,
                aliased: aliased_b,
            },
        ) => Ok(name_a == name_b && qualified_equal(aliased_a, aliased_b, seen)?),
        (
            Pointer {
                size: size_a,
                referenced: referenced_a,
            },
            Pointer {
                size: size_b,
                referenced: referenced_b,
            },
        ) => Ok(size_a == size_b && qualified_equal(referenced_a, referenced_b, seen)?),
        (
            Array {
                length: length_a,
                element: element_a,
            },
            Array {
                length: length_b,
                element: element_b,
            },
        ) => Ok(length_a == length_b && qualified_equal(element_a, element_b, seen)?),
        (
            Function {
                return_type: return_a,
                parameters: parameters_a,
                is_variadic: variadic_a,
            },
            Function {
                return_type: return_b,
                parameters: parameters_b,
                is_variadic: variadic_b,
            },
        ) => {
            if variadic_a != variadic_b
                || parameters_a.len() != parameters_b.len()
                || !qualified_equal(return_a, return_b, seen)?
            {
                return Ok(false);
            }
            for (parameter_a, parameter_b) in parameters_a.iter().zip(parameters_b) {
                if parameter_a.name != parameter_b.name
                    || !lazy_equal(&parameter_a.ty, &parameter_b.ty, seen)?
                {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}
