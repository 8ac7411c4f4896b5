//! The C expression front-end.
//!
//! Parses C type names and member designators, applies C's conversion
//! rules, and drives the generic object operators. This is the only
//! language the crate speaks natively; the layers below it are language
//! agnostic.

pub(crate) mod convert;
pub(crate) mod lexer;
pub(crate) mod parse;
pub mod print;

use crate::error::{Error, Result};
use crate::object::ops::{self, OpType};
use crate::object::Object;
use crate::program::Program;
use crate::ty::{Kind, PrimitiveType, QualifiedType, Qualifiers};

pub use parse::parse_specifier_list;
pub use print::{format_object, format_type, type_name};

/// Parses a C type name (e.g. `"const struct point *"`) and resolves it
/// against the program's types.
pub fn find_type(prog: &Program, name: &str, filename: Option<&str>) -> Result<QualifiedType> {
    parse::parse_type_name(prog, name, filename)
}

/// Evaluates a member designator (e.g. `"pairs[2].second"`) to a bit offset
/// in `ty`.
pub fn bit_offset(ty: &crate::ty::Type, member_designator: &str) -> Result<u64> {
    parse::bit_offset_of(member_designator, ty)
}

/// An integer literal gets the first of `int`, `long`, `long long`, and
/// `unsigned long long` that can represent it.
pub(crate) fn integer_literal(prog: &Program, value: u64) -> Result<Object<'_>> {
    let bits = 64 - value.leading_zeros() as u64;
    let types = prog.types();
    let mut obj = Object::new(prog);
    for primitive in [
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::LongLong,
    ] {
        let ty = types.primitive(primitive);
        if bits < 8 * ty.size() {
            obj.set_signed(QualifiedType::unqualified(ty), value as i64, 0)?;
            return Ok(obj);
        }
    }
    let ty = types.primitive(PrimitiveType::UnsignedLongLong);
    if bits <= 8 * ty.size() {
        obj.set_unsigned(QualifiedType::unqualified(ty), value, 0)?;
        return Ok(obj);
    }
    Err(Error::InvalidArgument("integer literal is too large".into()))
}

/// Boolean literals have type `int`, not `_Bool`.
pub(crate) fn bool_literal(prog: &Program, value: bool) -> Result<Object<'_>> {
    let int = prog.types().primitive(PrimitiveType::Int);
    let mut obj = Object::new(prog);
    obj.set_signed(QualifiedType::unqualified(int), i64::from(value), 0)?;
    Ok(obj)
}

/// Floating-point literals have type `double`.
pub(crate) fn float_literal(prog: &Program, value: f64) -> Result<Object<'_>> {
    let double = prog.types().primitive(PrimitiveType::Double);
    let mut obj = Object::new(prog);
    obj.set_float(QualifiedType::unqualified(double), value)?;
    Ok(obj)
}

/// Computes an object's operand type: arrays decay to pointers to their
/// element type, functions decay to function pointers, and qualifiers are
/// stripped. Also reports whether the operand is a pointer and, if so, the
/// byte size of the referenced type (1 for `void *`).
fn operand_type(obj: &Object<'_>) -> Result<(OpType, bool, u64)> {
    let mut op_type = OpType::of_object(obj);
    match op_type.underlying.kind() {
        Kind::Array => {
            let element = op_type.underlying.wrapped_type();
            let pointer = obj.program().types_mut().pointer_to(element);
            op_type.qualified_type = QualifiedType::unqualified(pointer.clone());
            op_type.underlying = pointer;
        }
        Kind::Function => {
            let function = QualifiedType::new(
                op_type.underlying.clone(),
                op_type.qualified_type.qualifiers,
            );
            let pointer = obj.program().types_mut().pointer_to(function);
            op_type.qualified_type = QualifiedType::unqualified(pointer.clone());
            op_type.underlying = pointer;
        }
        _ => {}
    }
    op_type.qualified_type.qualifiers = Qualifiers::NONE;

    let is_pointer = op_type.underlying.kind() == Kind::Pointer;
    let referenced_size = if is_pointer {
        let referenced = op_type.underlying.wrapped_type().ty.underlying();
        if referenced.kind() == Kind::Void {
            1
        } else {
            referenced.sizeof()?
        }
    } else {
        0
    };
    Ok((op_type, is_pointer, referenced_size))
}

fn binary_type_error(op: &str, lhs: &OpType, rhs: &OpType) -> Error {
    let lhs_name = type_name(&lhs.qualified_type).unwrap_or_else(|_| "<type>".into());
    let rhs_name = type_name(&rhs.qualified_type).unwrap_or_else(|_| "<type>".into());
    Error::Type(format!(
        "invalid operands to {op} ('{lhs_name}' and '{rhs_name}')"
    ))
}

fn unary_type_error(op: &str, op_type: &OpType) -> Error {
    let name = type_name(&op_type.qualified_type).unwrap_or_else(|_| "<type>".into());
    Error::Type(format!("invalid operand to {op} ('{name}')"))
}

/// Casts an object to another type.
pub fn cast<'p>(
    qualified_type: QualifiedType,
    obj: &Object<'p>,
) -> Result<Object<'p>> {
    ops::cast(qualified_type, obj)
}

/// The truthiness of an object: arrays are trivially true, scalars convert
/// to bool, everything else is an error.
pub fn op_bool(obj: &Object<'_>) -> Result<bool> {
    let underlying = obj.qualified_type().ty.underlying();
    if underlying.kind() == Kind::Array {
        return Ok(true);
    }
    if !underlying.is_scalar() {
        let name = type_name(obj.qualified_type()).unwrap_or_else(|_| "<type>".into());
        return Err(Error::Type(format!("cannot convert '{name}' to bool")));
    }
    obj.truthiness()
}

/// Three-way comparison after the usual conversions: -1, 0, or 1.
pub fn cmp(lhs: &Object<'_>, rhs: &Object<'_>) -> Result<i32> {
    let (mut lhs_type, lhs_pointer, _) = operand_type(lhs)?;
    let (mut rhs_type, rhs_pointer, _) = operand_type(rhs)?;

    if lhs_pointer && rhs_pointer {
        ops::cmp_pointers(lhs, rhs)
    } else if lhs_pointer || rhs_pointer {
        Err(binary_type_error("comparison", &lhs_type, &rhs_type))
    } else {
        if !lhs_type.underlying.is_arithmetic() || !rhs_type.underlying.is_arithmetic() {
            return Err(binary_type_error("comparison", &lhs_type, &rhs_type));
        }
        let common = convert::common_real_type(lhs.program(), &mut lhs_type, &mut rhs_type)?;
        ops::cmp(&common, lhs, rhs)
    }
}

pub fn add<'p>(lhs: &Object<'p>, rhs: &Object<'p>) -> Result<Object<'p>> {
    let (mut lhs_type, lhs_pointer, lhs_size) = operand_type(lhs)?;
    let (mut rhs_type, rhs_pointer, rhs_size) = operand_type(rhs)?;

    if lhs_pointer {
        if !rhs_type.underlying.is_integer() {
            return Err(binary_type_error("binary +", &lhs_type, &rhs_type));
        }
        ops::add_to_pointer(&lhs_type, lhs_size, false, lhs, rhs)
    } else if rhs_pointer {
        if !lhs_type.underlying.is_integer() {
            return Err(binary_type_error("binary +", &lhs_type, &rhs_type));
        }
        ops::add_to_pointer(&rhs_type, rhs_size, false, rhs, lhs)
    } else {
        if !lhs_type.underlying.is_arithmetic() || !rhs_type.underlying.is_arithmetic() {
            return Err(binary_type_error("binary +", &lhs_type, &rhs_type));
        }
        let common = convert::common_real_type(lhs.program(), &mut lhs_type, &mut rhs_type)?;
        ops::add(&common, lhs, rhs)
    }
}

pub fn sub<'p>(lhs: &Object<'p>, rhs: &Object<'p>) -> Result<Object<'p>> {
    let (mut lhs_type, lhs_pointer, lhs_size) = operand_type(lhs)?;
    let (mut rhs_type, rhs_pointer, rhs_size) = operand_type(rhs)?;

    if lhs_pointer && rhs_pointer {
        // Cheap compatibility check: same referenced kind and size.
        let lhs_referenced = lhs_type.underlying.wrapped_type().ty;
        let rhs_referenced = rhs_type.underlying.wrapped_type().ty;
        if lhs_referenced.kind() != rhs_referenced.kind() || lhs_size != rhs_size {
            return Err(binary_type_error("binary -", &lhs_type, &rhs_type));
        }
        let ptrdiff = lhs.program().types().primitive(PrimitiveType::PtrdiffT);
        let result_type = OpType::new(QualifiedType::unqualified(ptrdiff), 0);
        ops::sub_pointers(&result_type, lhs_size, lhs, rhs)
    } else if lhs_pointer {
        if !rhs_type.underlying.is_integer() {
            return Err(binary_type_error("binary -", &lhs_type, &rhs_type));
        }
        ops::add_to_pointer(&lhs_type, lhs_size, true, lhs, rhs)
    } else {
        if !lhs_type.underlying.is_arithmetic() || !rhs_type.underlying.is_arithmetic() {
            return Err(binary_type_error("binary -", &lhs_type, &rhs_type));
        }
        let common = convert::common_real_type(lhs.program(), &mut lhs_type, &mut rhs_type)?;
        ops::sub(&common, lhs, rhs)
    }
}

macro_rules! arithmetic_operator {
    ($name:ident, $op:literal, $check:ident, $impl:path) => {
        pub fn $name<'p>(lhs: &Object<'p>, rhs: &Object<'p>) -> Result<Object<'p>> {
            let (mut lhs_type, _, _) = operand_type(lhs)?;
            let (mut rhs_type, _, _) = operand_type(rhs)?;
            if !lhs_type.underlying.$check() || !rhs_type.underlying.$check() {
                return Err(binary_type_error(
                    concat!("binary ", $op),
                    &lhs_type,
                    &rhs_type,
                ));
            }
            let common =
                convert::common_real_type(lhs.program(), &mut lhs_type, &mut rhs_type)?;
            $impl(&common, lhs, rhs)
        }
    };
}

arithmetic_operator!(mul, "*", is_arithmetic, ops::mul);
arithmetic_operator!(div, "/", is_arithmetic, ops::div);
arithmetic_operator!(modulo, "%", is_integer, ops::modulo);
arithmetic_operator!(and, "&", is_integer, ops::and);
arithmetic_operator!(or, "|", is_integer, ops::or);
arithmetic_operator!(xor, "^", is_integer, ops::xor);

macro_rules! shift_operator {
    ($name:ident, $op:literal, $impl:path) => {
        pub fn $name<'p>(lhs: &Object<'p>, rhs: &Object<'p>) -> Result<Object<'p>> {
            let (mut lhs_type, _, _) = operand_type(lhs)?;
            let (mut rhs_type, _, _) = operand_type(rhs)?;
            if !lhs_type.underlying.is_integer() || !rhs_type.underlying.is_integer() {
                return Err(binary_type_error(
                    concat!("binary ", $op),
                    &lhs_type,
                    &rhs_type,
                ));
            }
            // Shift operands promote independently; there is no common
            // type.
            convert::integer_promotions(lhs.program(), &mut lhs_type)?;
            convert::integer_promotions(lhs.program(), &mut rhs_type)?;
            $impl(lhs, &lhs_type, rhs, &rhs_type)
        }
    };
}

shift_operator!(lshift, "<<", ops::lshift);
shift_operator!(rshift, ">>", ops::rshift);

macro_rules! unary_operator {
    ($name:ident, $op:literal, $check:ident, $impl:path) => {
        pub fn $name<'p>(obj: &Object<'p>) -> Result<Object<'p>> {
            let (mut op_type, _, _) = operand_type(obj)?;
            if !op_type.underlying.$check() {
                return Err(unary_type_error(concat!("unary ", $op), &op_type));
            }
            convert::integer_promotions(obj.program(), &mut op_type)?;
            $impl(&op_type, obj)
        }
    };
}

unary_operator!(pos, "+", is_arithmetic, ops::pos);
unary_operator!(neg, "-", is_arithmetic, ops::neg);
unary_operator!(not, "~", is_integer, ops::not);

/// `container_of(ptr, type, member_designator)`: the object containing the
/// member `ptr` points to.
pub fn container_of<'p>(
    obj: &Object<'p>,
    qualified_type: QualifiedType,
    member_designator: &str,
) -> Result<Object<'p>> {
    let underlying = obj.qualified_type().ty.underlying();
    if underlying.kind() != Kind::Pointer {
        let name = type_name(obj.qualified_type()).unwrap_or_else(|_| "<type>".into());
        return Err(Error::Type(format!(
            "container_of() argument must be a pointer, not '{name}'"
        )));
    }
    let offset = parse::bit_offset_of(member_designator, &qualified_type.ty)?;
    if offset % 8 != 0 {
        return Err(Error::InvalidArgument(
            "container_of() member is not byte aligned".into(),
        ));
    }
    let address = obj.read_unsigned()?.wrapping_sub(offset / 8);
    let pointer = obj.program().types_mut().pointer_to(qualified_type);
    let mut result = Object::new(obj.program());
    result.set_unsigned(QualifiedType::unqualified(pointer), address, 0)?;
    Ok(result)
}
