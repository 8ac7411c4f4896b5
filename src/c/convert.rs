//! C integer promotions and the usual arithmetic conversions.

use crate::error::{Error, Result};
use crate::object::ops::OpType;
use crate::program::Program;
use crate::ty::{Kind, PrimitiveType, QualifiedType, Type};

/// Integer conversion ranks of the standard integer types.
fn conversion_rank(primitive: PrimitiveType) -> Option<i32> {
    use PrimitiveType as P;
    Some(match primitive {
        P::Bool => 0,
        P::Char | P::SignedChar | P::UnsignedChar => 1,
        P::Short | P::UnsignedShort => 2,
        P::Int | P::UnsignedInt => 3,
        P::Long | P::UnsignedLong => 4,
        P::LongLong | P::UnsignedLongLong => 5,
        _ => return None,
    })
}

fn integer_width(ty: &Type, bit_field_size: u64) -> (u64, bool) {
    if ty.kind() == Kind::Bool {
        (1, false)
    } else {
        let width = if bit_field_size != 0 {
            bit_field_size
        } else {
            8 * ty.size()
        };
        (width, ty.is_signed())
    }
}

/// Whether `type1` can represent every value of `type2`.
fn can_represent_all_values(
    type1: &Type,
    bit_field_size1: u64,
    type2: &Type,
    bit_field_size2: u64,
) -> bool {
    let (width1, is_signed1) = integer_width(type1, bit_field_size1);
    let (width2, is_signed2) = integer_width(type2, bit_field_size2);
    if is_signed1 == is_signed2 {
        width1 >= width2
    } else if is_signed1 && !is_signed2 {
        width1 > width2
    } else {
        false
    }
}

/// Applies the integer promotions to an operand type in place. Enums
/// convert to their compatible type first. A type whose rank is unknown (a
/// non-standard integer) is promoted iff `int` or `unsigned int` can
/// represent all of its values, and bit fields keep their width when
/// neither can (the GCC rule; Clang promotes to the declared type's width).
pub(crate) fn integer_promotions(prog: &Program, op_type: &mut OpType) -> Result<()> {
    match op_type.underlying.kind() {
        Kind::Enum => {
            let compatible = op_type.underlying.compatible_type().ok_or_else(|| {
                Error::InvalidArgument(
                    "operand cannot have incomplete enum type".into(),
                )
            })?;
            op_type.qualified_type = QualifiedType::unqualified(compatible.clone());
            op_type.underlying = compatible;
        }
        Kind::Int | Kind::Bool => {}
        _ => return Ok(()),
    }

    let int = prog.types().primitive(PrimitiveType::Int);
    let unsigned_int = prog.types().primitive(PrimitiveType::UnsignedInt);
    let primitive = op_type.underlying.primitive();

    if primitive.is_none() || op_type.bit_field_size != 0 {
        if can_represent_all_values(&int, 0, &op_type.underlying, op_type.bit_field_size) {
            op_type.qualified_type = QualifiedType::unqualified(int.clone());
            op_type.underlying = int;
            op_type.bit_field_size = 0;
        } else if can_represent_all_values(
            &unsigned_int,
            0,
            &op_type.underlying,
            op_type.bit_field_size,
        ) {
            op_type.qualified_type = QualifiedType::unqualified(unsigned_int.clone());
            op_type.underlying = unsigned_int;
            op_type.bit_field_size = 0;
        }
        return Ok(());
    }

    let primitive = primitive.expect("checked above");
    if primitive == PrimitiveType::Int || primitive == PrimitiveType::UnsignedInt {
        return Ok(());
    }
    // Promotion applies to ranks at or below int's.
    const INT_RANK: i32 = 3;
    match conversion_rank(primitive) {
        Some(rank) if rank <= INT_RANK => {}
        _ => return Ok(()),
    }

    // int if it can represent all values of the original type, otherwise
    // unsigned int.
    let promoted = if can_represent_all_values(&int, 0, &op_type.underlying, 0) {
        int
    } else {
        unsigned_int
    };
    op_type.qualified_type = QualifiedType::unqualified(promoted.clone());
    op_type.underlying = promoted;
    Ok(())
}

/// Ranks used when float operands tie in size: unknown floating types rank
/// above `long double`, which ranks above `double`, which ranks above
/// `float`.
fn float_order(ty: &Type) -> i32 {
    match ty.primitive() {
        Some(PrimitiveType::Float) => 0,
        Some(PrimitiveType::Double) => 1,
        Some(PrimitiveType::LongDouble) => 2,
        _ => 3,
    }
}

/// Computes the common real type of two operands, applying the integer
/// promotions to both along the way.
pub(crate) fn common_real_type(
    prog: &Program,
    type1: &mut OpType,
    type2: &mut OpType,
) -> Result<OpType> {
    // If either operand is floating, the result is the larger type, ties
    // broken toward the canonically higher-ranked one, preferring the
    // right-hand operand when they are fully equivalent.
    let is_float1 = type1.underlying.kind() == Kind::Float;
    let is_float2 = type2.underlying.kind() == Kind::Float;
    if is_float1 && is_float2 {
        let size1 = type1.underlying.size();
        let size2 = type2.underlying.size();
        let first = size1 > size2
            || (size1 == size2
                && float_order(&type1.underlying) > float_order(&type2.underlying));
        return Ok(if first { type1.clone() } else { type2.clone() });
    } else if is_float1 {
        return Ok(type1.clone());
    } else if is_float2 {
        return Ok(type2.clone());
    }

    integer_promotions(prog, type1)?;
    integer_promotions(prog, type2)?;

    let is_signed1 = type1.underlying.is_signed();
    let is_signed2 = type2.underlying.is_signed();

    // Bit fields that survived promotion have no standard rank; use the
    // wider operand, or the unsigned one at equal width.
    if type1.bit_field_size != 0 || type2.bit_field_size != 0 {
        let (width1, _) = integer_width(&type1.underlying, type1.bit_field_size);
        let (width2, _) = integer_width(&type2.underlying, type2.bit_field_size);
        return Ok(
            if width1 < width2 || (width1 == width2 && (!is_signed2 || is_signed1)) {
                type2.clone()
            } else {
                type1.clone()
            },
        );
    }

    let primitive1 = type1.underlying.primitive().and_then(conversion_rank);
    let primitive2 = type2.underlying.primitive().and_then(conversion_rank);
    let rank_cmp = match (primitive1, primitive2) {
        (Some(rank1), Some(rank2)) => {
            if type1.underlying.primitive() == type2.underlying.primitive() {
                return Ok(type2.clone());
            }
            rank1 - rank2
        }
        _ => {
            // At least one non-standard integer: compare by width; two
            // non-standard types of the same width tie.
            let size1 = type1.underlying.size();
            let size2 = type2.underlying.size();
            if size1 == size2 && primitive1.is_none() && primitive2.is_none() {
                0
            } else if (size1 == size2 && primitive2.is_some()) || size1 < size2 {
                -1
            } else {
                1
            }
        }
    };

    // Same signedness: the greater rank wins.
    if is_signed1 == is_signed2 {
        return Ok(if rank_cmp > 0 {
            type1.clone()
        } else {
            type2.clone()
        });
    }

    // The unsigned operand wins if its rank is at least the signed one's.
    if !is_signed1 && rank_cmp >= 0 {
        return Ok(type1.clone());
    }
    if !is_signed2 && rank_cmp <= 0 {
        return Ok(type2.clone());
    }

    // The signed operand wins if it can represent all values of the
    // unsigned one.
    if is_signed1 && can_represent_all_values(&type1.underlying, 0, &type2.underlying, 0) {
        return Ok(type1.clone());
    }
    if is_signed2 && can_represent_all_values(&type2.underlying, 0, &type1.underlying, 0) {
        return Ok(type2.clone());
    }

    // Otherwise: the unsigned type corresponding to the signed operand.
    let signed_primitive = if is_signed1 {
        type1.underlying.primitive()
    } else {
        type2.underlying.primitive()
    };
    let unsigned = signed_primitive
        .and_then(PrimitiveType::unsigned_counterpart)
        .map(|primitive| prog.types().primitive(primitive))
        .ok_or_else(|| {
            Error::Type("cannot find unsigned counterpart of operand type".into())
        })?;
    Ok(OpType::new(QualifiedType::unqualified(unsigned), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn prog() -> Program {
        crate::program::Program::for_testing(true)
    }

    fn op(prog: &Program, primitive: PrimitiveType) -> OpType {
        OpType::new(
            QualifiedType::unqualified(prog.types().primitive(primitive)),
            0,
        )
    }

    fn primitive_of(op_type: &OpType) -> Option<PrimitiveType> {
        op_type.underlying.primitive()
    }

    #[rstest]
    #[case(PrimitiveType::Char, PrimitiveType::Int)]
    #[case(PrimitiveType::UnsignedChar, PrimitiveType::Int)]
    #[case(PrimitiveType::Short, PrimitiveType::Int)]
    #[case(PrimitiveType::UnsignedShort, PrimitiveType::Int)]
    #[case(PrimitiveType::Bool, PrimitiveType::Int)]
    #[case(PrimitiveType::Int, PrimitiveType::Int)]
    #[case(PrimitiveType::UnsignedInt, PrimitiveType::UnsignedInt)]
    #[case(PrimitiveType::Long, PrimitiveType::Long)]
    #[case(PrimitiveType::UnsignedLongLong, PrimitiveType::UnsignedLongLong)]
    fn promotions(#[case] from: PrimitiveType, #[case] to: PrimitiveType) {
        let prog = prog();
        let mut op_type = op(&prog, from);
        integer_promotions(&prog, &mut op_type).unwrap();
        assert_eq!(primitive_of(&op_type), Some(to));
    }

    #[test]
    fn wide_bit_fields_keep_their_width() {
        let prog = prog();
        // A 40-bit bit field of long: neither int nor unsigned int can
        // represent it, so the width is preserved.
        let mut op_type = OpType::new(
            QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Long)),
            40,
        );
        integer_promotions(&prog, &mut op_type).unwrap();
        assert_eq!(op_type.bit_field_size, 40);
        // A 5-bit bit field promotes to int.
        let mut op_type = OpType::new(
            QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Long)),
            5,
        );
        integer_promotions(&prog, &mut op_type).unwrap();
        assert_eq!(op_type.bit_field_size, 0);
        assert_eq!(primitive_of(&op_type), Some(PrimitiveType::Int));
    }

    #[test]
    fn enums_convert_to_their_compatible_type() {
        let prog = prog();
        let compatible = prog.types().primitive(PrimitiveType::UnsignedInt);
        let color = Type::enumeration(Some("color"), compatible, vec![]);
        let mut op_type = OpType::new(QualifiedType::unqualified(color), 0);
        integer_promotions(&prog, &mut op_type).unwrap();
        assert_eq!(primitive_of(&op_type), Some(PrimitiveType::UnsignedInt));

        let incomplete = Type::incomplete_enumeration(Some("nope"));
        let mut op_type = OpType::new(QualifiedType::unqualified(incomplete), 0);
        assert!(integer_promotions(&prog, &mut op_type).is_err());
    }

    #[rstest]
    #[case(PrimitiveType::Int, PrimitiveType::Int, PrimitiveType::Int)]
    #[case(PrimitiveType::Char, PrimitiveType::Short, PrimitiveType::Int)]
    #[case(PrimitiveType::Int, PrimitiveType::UnsignedInt, PrimitiveType::UnsignedInt)]
    #[case(PrimitiveType::UnsignedInt, PrimitiveType::Long, PrimitiveType::Long)]
    #[case(PrimitiveType::UnsignedLong, PrimitiveType::Long, PrimitiveType::UnsignedLong)]
    #[case(PrimitiveType::Int, PrimitiveType::Float, PrimitiveType::Float)]
    #[case(PrimitiveType::Float, PrimitiveType::Double, PrimitiveType::Double)]
    #[case(PrimitiveType::Double, PrimitiveType::LongDouble, PrimitiveType::LongDouble)]
    #[case(PrimitiveType::LongLong, PrimitiveType::UnsignedInt, PrimitiveType::LongLong)]
    fn usual_arithmetic_conversions(
        #[case] left: PrimitiveType,
        #[case] right: PrimitiveType,
        #[case] expected: PrimitiveType,
    ) {
        let prog = prog();
        let mut type1 = op(&prog, left);
        let mut type2 = op(&prog, right);
        let common = common_real_type(&prog, &mut type1, &mut type2).unwrap();
        assert_eq!(primitive_of(&common), Some(expected));
    }

    #[test]
    fn non_standard_integer_ranks_derive_from_width() {
        let prog = prog();
        let wide = Type::int("u40", 5, false, None);
        let mut type1 = OpType::new(QualifiedType::unqualified(wide), 0);
        let mut type2 = op(&prog, PrimitiveType::Int);
        let common = common_real_type(&prog, &mut type1, &mut type2).unwrap();
        // The 5-byte unsigned type is wider than int and keeps winning.
        assert_eq!(common.underlying.name(), "u40");
    }

    #[test]
    fn equal_rank_signed_loses_to_unsigned() {
        let prog = prog();
        // unsigned long and long long have different ranks; long long is
        // signed with higher rank but same width, so the result is the
        // unsigned counterpart of long long.
        let mut type1 = op(&prog, PrimitiveType::UnsignedLong);
        let mut type2 = op(&prog, PrimitiveType::LongLong);
        let common = common_real_type(&prog, &mut type1, &mut type2).unwrap();
        assert_eq!(
            primitive_of(&common),
            Some(PrimitiveType::UnsignedLongLong)
        );
    }
}
