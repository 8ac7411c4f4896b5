//! Kind-dispatched primitives behind the language operators.
//!
//! The language front-end decides operand validity and the result type;
//! these functions read the operand values, perform 64-bit modular (or
//! IEEE double) arithmetic, and truncate into the result type's width.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::object::{
    narrow_float, object_kind_and_size, truncate_signed, truncate_unsigned, Object,
    ObjectKind, Repr, Value,
};
use crate::ty::{Kind, QualifiedType, Type};

/// An operand or result type as the language front-end sees it: the
/// declared type, its underlying (typedef-free) type, and the bit-field
/// width if any.
#[derive(Clone)]
pub(crate) struct OpType {
    pub qualified_type: QualifiedType,
    pub underlying: Type,
    pub bit_field_size: u64,
}

impl OpType {
    pub fn new(qualified_type: QualifiedType, bit_field_size: u64) -> OpType {
        let underlying = qualified_type.ty.underlying();
        OpType {
            qualified_type,
            underlying,
            bit_field_size,
        }
    }

    pub fn of_object(obj: &Object<'_>) -> OpType {
        let bit_field_size = if obj.is_bit_field() { obj.bit_size() } else { 0 };
        OpType::new(obj.qualified_type().clone(), bit_field_size)
    }

    fn kind_and_size(&self) -> Result<(ObjectKind, u64)> {
        object_kind_and_size(&self.qualified_type, self.bit_field_size)
    }
}

fn make_value<'p>(
    prog: &'p crate::program::Program,
    op_type: &OpType,
    kind: ObjectKind,
    bit_size: u64,
    value: Value,
) -> Object<'p> {
    Object {
        prog,
        qualified_type: op_type.qualified_type.clone(),
        bit_size,
        is_bit_field: op_type.bit_field_size != 0,
        kind,
        repr: Repr::Value(value),
    }
}

fn read_scalar(obj: &Object<'_>) -> Result<Value> {
    let value = obj.read_value()?;
    if matches!(value, Value::Buffer(_)) {
        return Err(Error::Type("non-scalar operand".into()));
    }
    Ok(value)
}

fn to_signed(value: &Value) -> i64 {
    match value {
        Value::Signed(v) => *v,
        Value::Unsigned(v) => *v as i64,
        Value::Float(v) => *v as i64,
        Value::Buffer(_) => unreachable!("scalar operands only"),
    }
}

fn to_unsigned(value: &Value) -> u64 {
    match value {
        Value::Signed(v) => *v as u64,
        Value::Unsigned(v) => *v,
        Value::Float(v) => *v as u64,
        Value::Buffer(_) => unreachable!("scalar operands only"),
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Signed(v) => *v as f64,
        Value::Unsigned(v) => *v as f64,
        Value::Float(v) => *v,
        Value::Buffer(_) => unreachable!("scalar operands only"),
    }
}

type SignedOp = fn(i64, i64) -> Result<i64>;
type UnsignedOp = fn(u64, u64) -> Result<u64>;
type FloatOp = fn(f64, f64) -> Result<f64>;

fn binary<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
    signed_op: SignedOp,
    unsigned_op: UnsignedOp,
    float_op: Option<FloatOp>,
) -> Result<Object<'p>> {
    let (kind, bit_size) = op_type.kind_and_size()?;
    let lhs_value = read_scalar(lhs)?;
    let rhs_value = read_scalar(rhs)?;
    let value = match kind {
        ObjectKind::Signed => {
            let result = signed_op(to_signed(&lhs_value), to_signed(&rhs_value))?;
            Value::Signed(truncate_signed(result, bit_size))
        }
        ObjectKind::Unsigned => {
            let result = unsigned_op(to_unsigned(&lhs_value), to_unsigned(&rhs_value))?;
            Value::Unsigned(truncate_unsigned(result, bit_size))
        }
        ObjectKind::Float => {
            let float_op = float_op
                .ok_or_else(|| Error::Type("invalid operands to integer operator".into()))?;
            let result = float_op(to_float(&lhs_value), to_float(&rhs_value))?;
            Value::Float(narrow_float(result, bit_size / 8))
        }
        _ => return Err(Error::Type("invalid operand kind".into())),
    };
    Ok(make_value(lhs.program(), op_type, kind, bit_size, value))
}

pub(crate) fn add<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(
        op_type,
        lhs,
        rhs,
        |a, b| Ok(a.wrapping_add(b)),
        |a, b| Ok(a.wrapping_add(b)),
        Some(|a, b| Ok(a + b)),
    )
}

pub(crate) fn sub<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(
        op_type,
        lhs,
        rhs,
        |a, b| Ok(a.wrapping_sub(b)),
        |a, b| Ok(a.wrapping_sub(b)),
        Some(|a, b| Ok(a - b)),
    )
}

pub(crate) fn mul<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(
        op_type,
        lhs,
        rhs,
        |a, b| Ok(a.wrapping_mul(b)),
        |a, b| Ok(a.wrapping_mul(b)),
        Some(|a, b| Ok(a * b)),
    )
}

pub(crate) fn div<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(
        op_type,
        lhs,
        rhs,
        |a, b| {
            if b == 0 {
                Err(Error::ZeroDivision)
            } else {
                Ok(a.wrapping_div(b))
            }
        },
        |a, b| {
            if b == 0 {
                Err(Error::ZeroDivision)
            } else {
                Ok(a / b)
            }
        },
        Some(|a, b| {
            if b == 0.0 {
                Err(Error::ZeroDivision)
            } else {
                Ok(a / b)
            }
        }),
    )
}

pub(crate) fn modulo<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(
        op_type,
        lhs,
        rhs,
        |a, b| {
            if b == 0 {
                Err(Error::ZeroDivision)
            } else {
                Ok(a.wrapping_rem(b))
            }
        },
        |a, b| {
            if b == 0 {
                Err(Error::ZeroDivision)
            } else {
                Ok(a % b)
            }
        },
        None,
    )
}

pub(crate) fn and<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(op_type, lhs, rhs, |a, b| Ok(a & b), |a, b| Ok(a & b), None)
}

pub(crate) fn or<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(op_type, lhs, rhs, |a, b| Ok(a | b), |a, b| Ok(a | b), None)
}

pub(crate) fn xor<'p>(
    op_type: &OpType,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    binary(op_type, lhs, rhs, |a, b| Ok(a ^ b), |a, b| Ok(a ^ b), None)
}

/// The shift count of a shift operator. Negative counts fail.
fn shift_count(obj: &Object<'_>) -> Result<u64> {
    match read_scalar(obj)? {
        Value::Signed(v) => {
            if v < 0 {
                Err(Error::InvalidArgument("negative shift count".into()))
            } else {
                Ok(v as u64)
            }
        }
        Value::Unsigned(v) => Ok(v),
        _ => Err(Error::Type("invalid operands to shift operator".into())),
    }
}

pub(crate) fn lshift<'p>(
    lhs: &Object<'p>,
    lhs_type: &OpType,
    rhs: &Object<'p>,
    _rhs_type: &OpType,
) -> Result<Object<'p>> {
    let (kind, bit_size) = lhs_type.kind_and_size()?;
    let count = shift_count(rhs)?;
    let value = match (kind, read_scalar(lhs)?) {
        // Shifting by the width or more gives zero.
        (ObjectKind::Signed, value) => Value::Signed(if count >= bit_size {
            0
        } else {
            truncate_signed(((to_signed(&value) as u64) << count) as i64, bit_size)
        }),
        (ObjectKind::Unsigned, value) => Value::Unsigned(if count >= bit_size {
            0
        } else {
            truncate_unsigned(to_unsigned(&value) << count, bit_size)
        }),
        _ => return Err(Error::Type("invalid operands to shift operator".into())),
    };
    Ok(make_value(lhs.program(), lhs_type, kind, bit_size, value))
}

pub(crate) fn rshift<'p>(
    lhs: &Object<'p>,
    lhs_type: &OpType,
    rhs: &Object<'p>,
    _rhs_type: &OpType,
) -> Result<Object<'p>> {
    let (kind, bit_size) = lhs_type.kind_and_size()?;
    let count = shift_count(rhs)?;
    let value = match (kind, read_scalar(lhs)?) {
        (ObjectKind::Signed, value) => Value::Signed(if count >= bit_size {
            0
        } else {
            truncate_signed(to_signed(&value) >> count, bit_size)
        }),
        (ObjectKind::Unsigned, value) => Value::Unsigned(if count >= bit_size {
            0
        } else {
            to_unsigned(&value) >> count
        }),
        _ => return Err(Error::Type("invalid operands to shift operator".into())),
    };
    Ok(make_value(lhs.program(), lhs_type, kind, bit_size, value))
}

pub(crate) fn pos<'p>(op_type: &OpType, obj: &Object<'p>) -> Result<Object<'p>> {
    let (kind, bit_size) = op_type.kind_and_size()?;
    let value = read_scalar(obj)?;
    let value = match kind {
        ObjectKind::Signed => Value::Signed(truncate_signed(to_signed(&value), bit_size)),
        ObjectKind::Unsigned => {
            Value::Unsigned(truncate_unsigned(to_unsigned(&value), bit_size))
        }
        ObjectKind::Float => Value::Float(narrow_float(to_float(&value), bit_size / 8)),
        _ => return Err(Error::Type("invalid operand kind".into())),
    };
    Ok(make_value(obj.program(), op_type, kind, bit_size, value))
}

pub(crate) fn neg<'p>(op_type: &OpType, obj: &Object<'p>) -> Result<Object<'p>> {
    let (kind, bit_size) = op_type.kind_and_size()?;
    let value = read_scalar(obj)?;
    let value = match kind {
        ObjectKind::Signed => {
            Value::Signed(truncate_signed(to_signed(&value).wrapping_neg(), bit_size))
        }
        ObjectKind::Unsigned => {
            Value::Unsigned(truncate_unsigned(to_unsigned(&value).wrapping_neg(), bit_size))
        }
        ObjectKind::Float => Value::Float(narrow_float(-to_float(&value), bit_size / 8)),
        _ => return Err(Error::Type("invalid operand kind".into())),
    };
    Ok(make_value(obj.program(), op_type, kind, bit_size, value))
}

pub(crate) fn not<'p>(op_type: &OpType, obj: &Object<'p>) -> Result<Object<'p>> {
    let (kind, bit_size) = op_type.kind_and_size()?;
    let value = read_scalar(obj)?;
    let value = match kind {
        ObjectKind::Signed => Value::Signed(truncate_signed(!to_signed(&value), bit_size)),
        ObjectKind::Unsigned => {
            Value::Unsigned(truncate_unsigned(!to_unsigned(&value), bit_size))
        }
        _ => return Err(Error::Type("invalid operands to integer operator".into())),
    };
    Ok(make_value(obj.program(), op_type, kind, bit_size, value))
}

fn ordering_to_int(ordering: Ordering) -> i32 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Compares two operands after conversion to the common type.
pub(crate) fn cmp(op_type: &OpType, lhs: &Object<'_>, rhs: &Object<'_>) -> Result<i32> {
    let (kind, _) = op_type.kind_and_size()?;
    let lhs_value = read_scalar(lhs)?;
    let rhs_value = read_scalar(rhs)?;
    Ok(match kind {
        ObjectKind::Signed => {
            ordering_to_int(to_signed(&lhs_value).cmp(&to_signed(&rhs_value)))
        }
        ObjectKind::Unsigned => {
            ordering_to_int(to_unsigned(&lhs_value).cmp(&to_unsigned(&rhs_value)))
        }
        ObjectKind::Float => to_float(&lhs_value)
            .partial_cmp(&to_float(&rhs_value))
            .map(ordering_to_int)
            .unwrap_or(0),
        _ => return Err(Error::Type("invalid operand kind".into())),
    })
}

/// The address a pointer-like operand carries: a pointer's value, or the
/// address of an array that decayed to a pointer.
pub(crate) fn pointer_value(obj: &Object<'_>) -> Result<u64> {
    let underlying = obj.qualified_type().ty.underlying();
    match underlying.kind() {
        Kind::Pointer => obj.read_unsigned(),
        Kind::Array | Kind::Function => obj
            .address()
            .ok_or_else(|| Error::Type("cannot take address of value".into())),
        _ => Err(Error::Type("not a pointer".into())),
    }
}

pub(crate) fn cmp_pointers(lhs: &Object<'_>, rhs: &Object<'_>) -> Result<i32> {
    Ok(ordering_to_int(
        pointer_value(lhs)?.cmp(&pointer_value(rhs)?),
    ))
}

/// `pointer +/- integer`, scaled by the referenced type's byte size.
pub(crate) fn add_to_pointer<'p>(
    op_type: &OpType,
    referenced_size: u64,
    negate: bool,
    ptr: &Object<'p>,
    int: &Object<'p>,
) -> Result<Object<'p>> {
    let (kind, bit_size) = op_type.kind_and_size()?;
    if kind != ObjectKind::Unsigned {
        return Err(Error::Type("pointer result must be a pointer".into()));
    }
    let base = pointer_value(ptr)?;
    let index = match read_scalar(int)? {
        Value::Signed(v) => v,
        Value::Unsigned(v) => v as i64,
        _ => return Err(Error::Type("pointer offset must be an integer".into())),
    };
    let offset = index.wrapping_mul(referenced_size as i64);
    let address = if negate {
        base.wrapping_sub(offset as u64)
    } else {
        base.wrapping_add(offset as u64)
    };
    Ok(make_value(
        ptr.program(),
        op_type,
        kind,
        bit_size,
        Value::Unsigned(truncate_unsigned(address, bit_size)),
    ))
}

/// `pointer - pointer`, yielding the element distance in the result type.
pub(crate) fn sub_pointers<'p>(
    op_type: &OpType,
    referenced_size: u64,
    lhs: &Object<'p>,
    rhs: &Object<'p>,
) -> Result<Object<'p>> {
    if referenced_size == 0 {
        return Err(Error::ZeroDivision);
    }
    let (kind, bit_size) = op_type.kind_and_size()?;
    let diff = pointer_value(lhs)?.wrapping_sub(pointer_value(rhs)?) as i64;
    let quotient = diff.wrapping_div(referenced_size as i64);
    Ok(make_value(
        lhs.program(),
        op_type,
        kind,
        bit_size,
        Value::Signed(truncate_signed(quotient, bit_size)),
    ))
}

/// Converts an object's value to another scalar type, following C
/// conversion semantics. Non-scalar destinations admit only the identical
/// type, in which case this is a read.
pub(crate) fn cast<'p>(
    qualified_type: QualifiedType,
    obj: &Object<'p>,
) -> Result<Object<'p>> {
    let op_type = OpType::new(qualified_type, 0);
    let (kind, bit_size) = op_type.kind_and_size()?;

    if !kind.is_complete() {
        return Err(Error::Type("cannot cast to incomplete type".into()));
    }
    if kind == ObjectKind::Buffer {
        if !Type::equal(&op_type.qualified_type.ty, &obj.qualified_type().ty)? {
            return Err(Error::Type(
                "cannot convert to non-scalar type".into(),
            ));
        }
        let value = obj.read_value()?;
        return Ok(make_value(obj.program(), &op_type, kind, bit_size, value));
    }

    // Arrays and functions decay to their address when casted to a scalar.
    let src_underlying = obj.qualified_type().ty.underlying();
    let value = if matches!(src_underlying.kind(), Kind::Array | Kind::Function) {
        Value::Unsigned(pointer_value(obj)?)
    } else {
        read_scalar(obj)?
    };

    let value = match kind {
        ObjectKind::Unsigned if op_type.underlying.kind() == Kind::Bool => {
            let truthy = match &value {
                Value::Signed(v) => *v != 0,
                Value::Unsigned(v) => *v != 0,
                Value::Float(v) => *v != 0.0,
                Value::Buffer(_) => unreachable!("scalar operands only"),
            };
            Value::Unsigned(u64::from(truthy))
        }
        ObjectKind::Signed => Value::Signed(truncate_signed(to_signed(&value), bit_size)),
        ObjectKind::Unsigned => {
            Value::Unsigned(truncate_unsigned(to_unsigned(&value), bit_size))
        }
        ObjectKind::Float => Value::Float(narrow_float(to_float(&value), bit_size / 8)),
        _ => return Err(Error::Type("invalid cast".into())),
    };
    Ok(make_value(obj.program(), &op_type, kind, bit_size, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;
    use crate::ty::PrimitiveType;

    fn prog() -> Program {
        Program::for_testing(true)
    }

    fn int_obj<'p>(prog: &'p Program, value: i64) -> Object<'p> {
        let qt = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Int));
        let mut obj = Object::new(prog);
        obj.set_signed(qt, value, 0).unwrap();
        obj
    }

    fn int_op_type(prog: &Program) -> OpType {
        OpType::new(
            QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Int)),
            0,
        )
    }

    #[test]
    fn modular_arithmetic_truncates_to_width() {
        let prog = prog();
        let op_type = int_op_type(&prog);
        let a = int_obj(&prog, i32::MAX as i64);
        let b = int_obj(&prog, 1);
        let sum = add(&op_type, &a, &b).unwrap();
        assert_eq!(sum.read_signed().unwrap(), i32::MIN as i64);
    }

    #[test]
    fn division_by_zero_fails() {
        let prog = prog();
        let op_type = int_op_type(&prog);
        let a = int_obj(&prog, 10);
        let zero = int_obj(&prog, 0);
        assert_eq!(
            div(&op_type, &a, &zero).unwrap_err().kind(),
            crate::ErrorKind::ZeroDivision
        );
        assert_eq!(
            modulo(&op_type, &a, &zero).unwrap_err().kind(),
            crate::ErrorKind::ZeroDivision
        );
    }

    #[test]
    fn modulo_has_dividend_sign() {
        let prog = prog();
        let op_type = int_op_type(&prog);
        let a = int_obj(&prog, -7);
        let b = int_obj(&prog, 3);
        assert_eq!(modulo(&op_type, &a, &b).unwrap().read_signed().unwrap(), -1);
    }

    #[test]
    fn shift_boundaries() {
        let prog = prog();
        let op_type = int_op_type(&prog);
        let one = int_obj(&prog, 1);
        // Shift by zero is the identity.
        let zero = int_obj(&prog, 0);
        assert_eq!(
            lshift(&one, &op_type, &zero, &op_type)
                .unwrap()
                .read_signed()
                .unwrap(),
            1
        );
        // Shift by the width or more is zero.
        let thirty_two = int_obj(&prog, 32);
        assert_eq!(
            lshift(&one, &op_type, &thirty_two, &op_type)
                .unwrap()
                .read_signed()
                .unwrap(),
            0
        );
        assert_eq!(
            rshift(&one, &op_type, &thirty_two, &op_type)
                .unwrap()
                .read_signed()
                .unwrap(),
            0
        );
        // Negative shift counts fail.
        let negative = int_obj(&prog, -1);
        assert!(lshift(&one, &op_type, &negative, &op_type).is_err());
    }

    #[test]
    fn cmp_returns_sign() {
        let prog = prog();
        let op_type = int_op_type(&prog);
        let a = int_obj(&prog, 1);
        let b = int_obj(&prog, 2);
        assert_eq!(cmp(&op_type, &a, &b).unwrap(), -1);
        assert_eq!(cmp(&op_type, &b, &a).unwrap(), 1);
        assert_eq!(cmp(&op_type, &a, &a).unwrap(), 0);
    }

    #[test]
    fn pointer_arithmetic_scales_by_element_size() {
        let prog = prog();
        let u32_type = prog.types().primitive(PrimitiveType::UnsignedInt);
        let pointer = prog
            .types_mut()
            .pointer_to(QualifiedType::unqualified(u32_type));
        let pointer_qt = QualifiedType::unqualified(pointer);
        let mut ptr = Object::new(&prog);
        ptr.set_unsigned(pointer_qt.clone(), 0xdeadbeef, 0).unwrap();
        let op_type = OpType::new(pointer_qt, 0);
        let two = int_obj(&prog, 2);
        let advanced = add_to_pointer(&op_type, 4, false, &ptr, &two).unwrap();
        assert_eq!(advanced.read_unsigned().unwrap(), 0xdeadbef7);

        let back = add_to_pointer(&op_type, 4, true, &advanced, &two).unwrap();
        assert_eq!(back.read_unsigned().unwrap(), 0xdeadbeef);
    }

    #[test]
    fn pointer_difference_divides_by_element_size() {
        let prog = prog();
        let ptrdiff = prog.types().primitive(PrimitiveType::PtrdiffT);
        let op_type = OpType::new(QualifiedType::unqualified(ptrdiff), 0);
        let int = prog.types().primitive(PrimitiveType::Int);
        let pointer = prog
            .types_mut()
            .pointer_to(QualifiedType::unqualified(int));
        let pointer_qt = QualifiedType::unqualified(pointer);
        let mut a = Object::new(&prog);
        a.set_unsigned(pointer_qt.clone(), 0x1010, 0).unwrap();
        let mut b = Object::new(&prog);
        b.set_unsigned(pointer_qt, 0x1000, 0).unwrap();
        let diff = sub_pointers(&op_type, 4, &a, &b).unwrap();
        assert_eq!(diff.read_signed().unwrap(), 4);
        let diff = sub_pointers(&op_type, 4, &b, &a).unwrap();
        assert_eq!(diff.read_signed().unwrap(), -4);
    }

    #[test]
    fn casts_follow_c_semantics() {
        let prog = prog();
        let char_qt = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Char));
        let double_qt =
            QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Double));
        let bool_qt = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Bool));

        let narrowed = cast(char_qt, &int_obj(&prog, 0x1ff)).unwrap();
        assert_eq!(narrowed.read_signed().unwrap(), -1);

        let mut float_obj = Object::new(&prog);
        float_obj.set_float(double_qt.clone(), -2.75).unwrap();
        let int_qt = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Int));
        let truncated = cast(int_qt, &float_obj).unwrap();
        assert_eq!(truncated.read_signed().unwrap(), -2);

        let widened = cast(double_qt, &int_obj(&prog, 3)).unwrap();
        assert_eq!(widened.read_float().unwrap(), 3.0);

        let boolean = cast(bool_qt, &int_obj(&prog, 42)).unwrap();
        assert_eq!(boolean.read_unsigned().unwrap(), 1);
    }

    #[test]
    fn lossless_round_trip_casts_compose() {
        let prog = prog();
        let char_qt = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Char));
        let long_qt = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Long));
        let x = int_obj(&prog, 42);
        // char fits in long: casting through long equals casting directly.
        let through = cast(char_qt.clone(), &cast(long_qt, &x).unwrap()).unwrap();
        let direct = cast(char_qt, &x).unwrap();
        assert_eq!(
            through.read_signed().unwrap(),
            direct.read_signed().unwrap()
        );
    }

    #[test]
    fn pointer_and_integer_preserve_bit_pattern() {
        let prog = prog();
        let int = prog.types().primitive(PrimitiveType::Int);
        let pointer = prog
            .types_mut()
            .pointer_to(QualifiedType::unqualified(int));
        let pointer_qt = QualifiedType::unqualified(pointer);
        let ulong_qt =
            QualifiedType::unqualified(prog.types().primitive(PrimitiveType::UnsignedLong));
        let mut ptr = Object::new(&prog);
        ptr.set_unsigned(pointer_qt.clone(), 0xffff_8000_1234_5678, 0)
            .unwrap();
        let as_int = cast(ulong_qt, &ptr).unwrap();
        assert_eq!(as_int.read_unsigned().unwrap(), 0xffff_8000_1234_5678);
        let back = cast(pointer_qt, &as_int).unwrap();
        assert_eq!(back.read_unsigned().unwrap(), 0xffff_8000_1234_5678);
    }
}
