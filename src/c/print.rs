//! Pretty-printing of types and objects in C syntax.
//!
//! Declarations are built inside-out: each type layer contributes a name
//! callback that wraps whatever the inner layers produce, which is how C
//! declarator syntax composes (`int (*)[3]` and friends).

use crate::error::{Error, Result};
use crate::object::{Object, Value};
use crate::program::Program;
use crate::ty::{Kind, PrimitiveType, QualifiedType, Qualifiers, Type};

type NameFn<'x> = &'x dyn Fn(&mut String) -> Result<()>;

fn append_tabs(n: usize, out: &mut String) {
    for _ in 0..n {
        out.push('\t');
    }
}

fn append_qualifiers(qualifiers: Qualifiers, out: &mut String) {
    let names = [
        (Qualifiers::CONST, "const"),
        (Qualifiers::VOLATILE, "volatile"),
        (Qualifiers::RESTRICT, "restrict"),
        (Qualifiers::ATOMIC, "_Atomic"),
    ];
    let mut first = true;
    for (qualifier, name) in names {
        if !qualifiers.contains(qualifier) {
            continue;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(name);
        first = false;
    }
}

fn declare_basic(
    qualified_type: &QualifiedType,
    name: Option<NameFn<'_>>,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    append_tabs(indent, out);
    if !qualified_type.qualifiers.is_empty() {
        append_qualifiers(qualified_type.qualifiers, out);
        out.push(' ');
    }
    out.push_str(if qualified_type.ty.kind() == Kind::Void {
        "void"
    } else {
        qualified_type.ty.name()
    });
    if let Some(name) = name {
        out.push(' ');
        name(out)?;
    }
    Ok(())
}

fn append_tagged_name(
    qualified_type: &QualifiedType,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    let keyword = match qualified_type.ty.kind() {
        Kind::Struct => "struct",
        Kind::Union => "union",
        Kind::Enum => "enum",
        kind => panic!("{kind:?} type has no tag keyword"),
    };
    append_tabs(indent, out);
    if !qualified_type.qualifiers.is_empty() {
        append_qualifiers(qualified_type.qualifiers, out);
        out.push(' ');
    }
    out.push_str(keyword);
    if let Some(tag) = qualified_type.ty.tag() {
        out.push(' ');
        out.push_str(tag);
    }
    Ok(())
}

fn declare_tagged(
    qualified_type: &QualifiedType,
    name: Option<NameFn<'_>>,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    if qualified_type.ty.is_anonymous() {
        define_type(qualified_type, indent, out)?;
    } else {
        append_tagged_name(qualified_type, indent, out)?;
    }
    if let Some(name) = name {
        out.push(' ');
        name(out)?;
    }
    Ok(())
}

fn declare_pointer(
    qualified_type: &QualifiedType,
    name: Option<NameFn<'_>>,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    let referenced = qualified_type.ty.wrapped_type();
    let qualifiers = qualified_type.qualifiers;
    let pointer_name = |out: &mut String| -> Result<()> {
        let parenthesize = matches!(referenced.ty.kind(), Kind::Array | Kind::Function);
        if parenthesize {
            out.push('(');
        }
        out.push('*');
        if !qualifiers.is_empty() {
            out.push(' ');
            append_qualifiers(qualifiers, out);
            if name.is_some() {
                out.push(' ');
            }
        }
        if let Some(name) = name {
            name(out)?;
        }
        if parenthesize {
            out.push(')');
        }
        Ok(())
    };
    declare_variable(&referenced, Some(&pointer_name), indent, out)
}

fn declare_array(
    qualified_type: &QualifiedType,
    name: Option<NameFn<'_>>,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    let element = qualified_type.ty.wrapped_type();
    let length = qualified_type.ty.length();
    let array_name = |out: &mut String| -> Result<()> {
        if let Some(name) = name {
            name(out)?;
        }
        match length {
            Some(length) => out.push_str(&format!("[{length}]")),
            None => out.push_str("[]"),
        }
        Ok(())
    };
    declare_variable(&element, Some(&array_name), indent, out)
}

fn declare_function(
    qualified_type: &QualifiedType,
    name: Option<NameFn<'_>>,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    let Some(name) = name else {
        return Err(Error::InvalidArgument("function must have name".into()));
    };
    let return_type = qualified_type.ty.wrapped_type();
    declare_variable(&return_type, Some(name), indent, out)?;

    out.push('(');
    let parameters = qualified_type.ty.parameters();
    for (i, parameter) in parameters.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let parameter_type = parameter.ty.get()?;
        match parameter.name.as_deref().filter(|name| !name.is_empty()) {
            Some(parameter_name) => {
                let name_fn = |out: &mut String| -> Result<()> {
                    out.push_str(parameter_name);
                    Ok(())
                };
                declare_variable(&parameter_type, Some(&name_fn), 0, out)?;
            }
            None => declare_variable(&parameter_type, None, 0, out)?,
        }
    }
    if !parameters.is_empty() && qualified_type.ty.is_variadic() {
        out.push_str(", ...");
    } else if parameters.is_empty() && !qualified_type.ty.is_variadic() {
        out.push_str("void");
    }
    out.push(')');
    Ok(())
}

fn declare_variable(
    qualified_type: &QualifiedType,
    name: Option<NameFn<'_>>,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    match qualified_type.ty.kind() {
        Kind::Void | Kind::Int | Kind::Bool | Kind::Float | Kind::Complex | Kind::Typedef => {
            declare_basic(qualified_type, name, indent, out)
        }
        Kind::Struct | Kind::Union | Kind::Enum => {
            declare_tagged(qualified_type, name, indent, out)
        }
        Kind::Pointer => declare_pointer(qualified_type, name, indent, out),
        Kind::Array => declare_array(qualified_type, name, indent, out),
        Kind::Function => declare_function(qualified_type, name, indent, out),
    }
}

fn define_compound(
    qualified_type: &QualifiedType,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    if !qualified_type.ty.is_complete() {
        return Err(Error::InvalidArgument(
            "cannot get definition of incomplete compound type".into(),
        ));
    }
    append_tagged_name(qualified_type, indent, out)?;
    out.push_str(" {\n");
    for member in qualified_type.ty.members() {
        let member_type = member.ty.get()?;
        match member.name.as_deref().filter(|name| !name.is_empty()) {
            Some(member_name) => {
                let name_fn = |out: &mut String| -> Result<()> {
                    out.push_str(member_name);
                    Ok(())
                };
                declare_variable(&member_type, Some(&name_fn), indent + 1, out)?;
            }
            None => declare_variable(&member_type, None, indent + 1, out)?,
        }
        if member.bit_field_size != 0 {
            out.push_str(&format!(" : {}", member.bit_field_size));
        }
        out.push_str(";\n");
    }
    append_tabs(indent, out);
    out.push('}');
    Ok(())
}

fn define_enum(
    qualified_type: &QualifiedType,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    if !qualified_type.ty.is_complete() {
        return Err(Error::InvalidArgument(
            "cannot get definition of incomplete enum type".into(),
        ));
    }
    append_tagged_name(qualified_type, indent, out)?;
    out.push_str(" {\n");
    let is_signed = qualified_type.ty.is_signed();
    for enumerator in qualified_type.ty.enumerators() {
        append_tabs(indent + 1, out);
        out.push_str(&enumerator.name);
        out.push_str(" = ");
        if is_signed {
            out.push_str(&enumerator.signed_value().to_string());
        } else {
            out.push_str(&enumerator.value.to_string());
        }
        out.push_str(",\n");
    }
    append_tabs(indent, out);
    out.push('}');
    Ok(())
}

fn define_typedef(
    qualified_type: &QualifiedType,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    append_tabs(indent, out);
    if !qualified_type.qualifiers.is_empty() {
        append_qualifiers(qualified_type.qualifiers, out);
        out.push(' ');
    }
    out.push_str("typedef ");
    let aliased = qualified_type.ty.wrapped_type();
    let typedef_name = qualified_type.ty.name().to_owned();
    let name_fn = |out: &mut String| -> Result<()> {
        out.push_str(&typedef_name);
        Ok(())
    };
    declare_variable(&aliased, Some(&name_fn), 0, out)
}

fn define_type(
    qualified_type: &QualifiedType,
    indent: usize,
    out: &mut String,
) -> Result<()> {
    match qualified_type.ty.kind() {
        Kind::Void | Kind::Int | Kind::Bool | Kind::Float | Kind::Complex => {
            declare_basic(qualified_type, None, indent, out)
        }
        Kind::Struct | Kind::Union => define_compound(qualified_type, indent, out),
        Kind::Enum => define_enum(qualified_type, indent, out),
        Kind::Typedef => define_typedef(qualified_type, indent, out),
        Kind::Pointer => declare_pointer(qualified_type, None, indent, out),
        Kind::Array => declare_array(qualified_type, None, indent, out),
        Kind::Function => Err(Error::InvalidArgument(
            "function type cannot be pretty-printed".into(),
        )),
    }
}

fn type_name_impl(qualified_type: &QualifiedType, out: &mut String) -> Result<()> {
    let tagged = matches!(
        qualified_type.ty.kind(),
        Kind::Struct | Kind::Union | Kind::Enum
    );
    if tagged && qualified_type.ty.is_anonymous() {
        append_tagged_name(qualified_type, 0, out)?;
        out.push_str(" <anonymous>");
        Ok(())
    } else if qualified_type.ty.kind() == Kind::Function {
        let empty = |_: &mut String| -> Result<()> { Ok(()) };
        declare_function(qualified_type, Some(&empty), 0, out)
    } else {
        declare_variable(qualified_type, None, 0, out)
    }
}

/// Formats a type as it would be referred to, e.g. `const char *`.
pub fn type_name(qualified_type: &QualifiedType) -> Result<String> {
    let mut out = String::new();
    type_name_impl(qualified_type, &mut out)?;
    Ok(out)
}

/// Formats a type as it would be defined, e.g. a struct with its members.
/// Incomplete types fall back to their name form.
pub fn format_type(qualified_type: &QualifiedType) -> Result<String> {
    let mut out = String::new();
    if qualified_type.ty.is_complete() {
        define_type(qualified_type, 0, &mut out)?;
    } else {
        type_name_impl(qualified_type, &mut out)?;
    }
    Ok(out)
}

fn is_character_type(ty: &Type) -> bool {
    matches!(
        ty.primitive(),
        Some(PrimitiveType::Char | PrimitiveType::SignedChar | PrimitiveType::UnsignedChar)
    )
}

fn append_escaped_character(c: u8, out: &mut String) {
    match c {
        0x07 => out.push_str("\\a"),
        0x08 => out.push_str("\\b"),
        b'\t' => out.push_str("\\t"),
        b'\n' => out.push_str("\\n"),
        0x0b => out.push_str("\\v"),
        0x0c => out.push_str("\\f"),
        b'\r' => out.push_str("\\r"),
        b'"' => out.push_str("\\\""),
        b'\\' => out.push_str("\\\\"),
        c if c <= 0x1f || c >= 0x7f => out.push_str(&format!("\\x{c:02x}")),
        c => out.push(c as char),
    }
}

/// Reads and formats a NUL-terminated string from target memory.
fn append_string(prog: &Program, address: u64, max: u64, out: &mut String) -> Result<()> {
    out.push('"');
    let mut byte = [0u8; 1];
    let mut remaining = max;
    let mut offset = 0u64;
    while remaining > 0 {
        prog.read_memory(&mut byte, address.wrapping_add(offset), false)?;
        if byte[0] == 0 {
            break;
        }
        append_escaped_character(byte[0], out);
        offset += 1;
        remaining -= 1;
    }
    out.push('"');
    Ok(())
}

fn append_int_object(obj: &Object<'_>, out: &mut String) -> Result<()> {
    match obj.read_value()? {
        Value::Signed(value) => out.push_str(&value.to_string()),
        Value::Unsigned(value) => out.push_str(&value.to_string()),
        _ => return Err(Error::Type("not an integer object".into())),
    }
    Ok(())
}

fn append_float_object(obj: &Object<'_>, out: &mut String) -> Result<()> {
    let value = obj.read_float()?;
    if value.is_finite() && value == value.trunc() {
        out.push_str(&format!("{value:.1}"));
    } else {
        out.push_str(&format!("{value}"));
    }
    Ok(())
}

fn append_members(
    obj: &Object<'_>,
    ty: &Type,
    bit_offset: u64,
    indent: usize,
    multi_line_columns: usize,
    out: &mut String,
) -> Result<()> {
    if !matches!(ty.kind(), Kind::Struct | Kind::Union) {
        return Ok(());
    }
    for member in ty.members() {
        let member_type = member.ty.get()?;
        match member.name.as_deref().filter(|name| !name.is_empty()) {
            Some(member_name) => {
                if multi_line_columns == 0 {
                    return Err(Error::Stop);
                }
                out.push('\n');
                append_tabs(indent + 1, out);

                let member_start = out.len();
                out.push('.');
                out.push_str(member_name);
                out.push_str(" = ");

                let remaining_columns = multi_line_columns
                    .saturating_sub(8 * (indent + 1) + (out.len() - member_start) + 1);

                let member_object = obj.slice(
                    member_type,
                    bit_offset + member.bit_offset,
                    member.bit_field_size,
                )?;
                object_impl(
                    &member_object,
                    true,
                    false,
                    indent + 1,
                    remaining_columns,
                    multi_line_columns,
                    out,
                )?;
                out.push(',');
            }
            None => {
                append_members(
                    obj,
                    &member_type.ty.underlying(),
                    bit_offset + member.bit_offset,
                    indent,
                    multi_line_columns,
                    out,
                )?;
            }
        }
    }
    Ok(())
}

fn append_compound_object(
    obj: &Object<'_>,
    underlying: &Type,
    indent: usize,
    multi_line_columns: usize,
    out: &mut String,
) -> Result<()> {
    if !underlying.is_complete() {
        return Err(Error::Type(format!(
            "cannot format incomplete {} object",
            if underlying.kind() == Kind::Struct {
                "struct"
            } else {
                "union"
            }
        )));
    }
    out.push('{');
    let old_len = out.len();
    append_members(obj, underlying, 0, indent, multi_line_columns, out)?;
    if out.len() != old_len {
        out.push('\n');
        append_tabs(indent, out);
    }
    out.push('}');
    Ok(())
}

fn append_enum_object(
    obj: &Object<'_>,
    underlying: &Type,
    out: &mut String,
) -> Result<()> {
    if !underlying.is_complete() {
        return Err(Error::Type("cannot format incomplete enum object".into()));
    }
    match obj.read_value()? {
        Value::Signed(value) => {
            for enumerator in underlying.enumerators() {
                if enumerator.signed_value() == value {
                    out.push_str(&enumerator.name);
                    return Ok(());
                }
            }
            out.push_str(&value.to_string());
        }
        Value::Unsigned(value) => {
            for enumerator in underlying.enumerators() {
                if enumerator.value == value {
                    out.push_str(&enumerator.name);
                    return Ok(());
                }
            }
            out.push_str(&value.to_string());
        }
        _ => return Err(Error::Type("not an enum object".into())),
    }
    Ok(())
}

fn append_pointer_object(
    obj: &Object<'_>,
    underlying: &Type,
    cast: bool,
    mut dereference: bool,
    indent: usize,
    mut one_line_columns: usize,
    multi_line_columns: usize,
    out: &mut String,
) -> Result<()> {
    let is_c_string = is_character_type(&underlying.wrapped_type().ty);
    // Strings are always dereferenced.
    if is_c_string {
        dereference = true;
    }

    let old_len = out.len();
    if dereference && !is_c_string {
        out.push('*');
    }
    if cast {
        out.push('(');
        type_name_impl(obj.qualified_type(), out)?;
        out.push(')');
    }

    let value = obj.read_unsigned()?;
    out.push_str(&format!("{value:#x}"));
    if !dereference {
        return Ok(());
    }
    let address_end = out.len();

    out.push_str(" = ");
    one_line_columns = one_line_columns.saturating_sub(out.len() - old_len);

    let result = if is_c_string {
        append_string(obj.program(), value, u64::MAX, out)
    } else {
        match obj.dereference() {
            Ok(dereferenced) => object_impl(
                &dereferenced,
                false,
                false,
                indent,
                one_line_columns,
                multi_line_columns,
                out,
            ),
            // The type cannot be dereferenced at all (e.g. void *); treat
            // it like an unreadable referent.
            Err(err) if err.kind() == crate::ErrorKind::Type => {
                Err(Error::Fault { address: value })
            }
            Err(err) => Err(err),
        }
    };
    match result {
        Err(err) if err.is_fault() => {
            // The referent cannot be read; keep just the address.
            out.truncate(address_end);
            if !is_c_string {
                out.remove(old_len);
            }
            Ok(())
        }
        other => other,
    }
}

fn append_array_object(
    obj: &Object<'_>,
    underlying: &Type,
    indent: usize,
    one_line_columns: usize,
    multi_line_columns: usize,
    out: &mut String,
) -> Result<()> {
    let mut length = underlying.length().unwrap_or(0);
    let element_type = underlying.wrapped_type();

    if length != 0 && is_character_type(&element_type.ty) {
        if let Some(address) = obj.address() {
            return append_string(obj.program(), address, length, out);
        }
        match obj.read_value()? {
            Value::Buffer(buffer) => {
                out.push('"');
                for &byte in buffer.bytes().iter().take(length as usize) {
                    if byte == 0 {
                        break;
                    }
                    append_escaped_character(byte, out);
                }
                out.push('"');
                return Ok(());
            }
            _ => return Err(Error::Type("array value has no buffer".into())),
        }
    }

    let element_bit_size = element_type.ty.bit_size()?;

    // Trim trailing zero elements.
    while length > 0 {
        let element = obj.slice(
            element_type.clone(),
            (length - 1) * element_bit_size,
            0,
        )?;
        if element.truthiness()? {
            break;
        }
        length -= 1;
    }
    if length == 0 {
        out.push_str("{}");
        return Ok(());
    }

    // First, try to fit everything on one line.
    out.push_str("{ ");
    let old_len = out.len() - 1;
    let mut remaining_columns = one_line_columns.saturating_sub(2);
    let mut fitted = 0;
    // Stop when the comma, space, and closing brace cannot fit.
    while fitted < length && remaining_columns >= 3 {
        let element = obj.slice(element_type.clone(), fitted * element_bit_size, 0)?;
        let element_start = out.len();
        match object_impl(
            &element,
            false,
            false,
            indent + 1,
            remaining_columns - 3,
            0,
            out,
        ) {
            Err(Error::Stop) => break,
            Err(err) => return Err(err),
            Ok(()) => {}
        }
        out.push_str(", ");
        let used = out.len() - element_start;
        if used > remaining_columns {
            remaining_columns = 0;
            break;
        }
        remaining_columns -= used;
        fitted += 1;
    }
    if fitted >= length && remaining_columns >= 1 {
        // Replace the trailing separator with the closing brace.
        out.truncate(out.len() - 2);
        out.push_str(" }");
        return Ok(());
    }

    if multi_line_columns == 0 {
        // Asked to fit on one line and it did not.
        return Err(Error::Stop);
    }

    // Start over with one element per line, pulling short elements back up
    // onto the previous line when they fit.
    out.truncate(old_len);
    let start_columns = multi_line_columns.saturating_sub(8 * (indent + 1));
    let mut remaining_columns = 0usize;
    for i in 0..length {
        let element = obj.slice(element_type.clone(), i * element_bit_size, 0)?;
        let newline = out.len();
        out.push('\n');
        append_tabs(indent + 1, out);

        if start_columns > 1 {
            let element_start = out.len();
            match object_impl(&element, false, false, 0, start_columns - 1, 0, out) {
                Ok(()) => {
                    let element_len = out.len() - element_start;
                    let separator = if remaining_columns == start_columns { 1 } else { 2 };
                    if element_len + separator <= remaining_columns {
                        // It would have fit on the previous line; move it
                        // up.
                        let element_text = out[element_start..].to_string();
                        out.truncate(newline);
                        if remaining_columns != start_columns {
                            out.push(' ');
                            remaining_columns -= 1;
                        }
                        out.push_str(&element_text);
                        out.push(',');
                        remaining_columns -= element_len + 1;
                        continue;
                    }
                    if element_len < start_columns {
                        // It fits on the new line.
                        out.push(',');
                        remaining_columns = start_columns - element_len - 1;
                        continue;
                    }
                }
                Err(Error::Stop) => {}
                Err(err) => return Err(err),
            }
            // It did not fit on one line at all.
            out.truncate(element_start);
        }

        object_impl(&element, false, false, indent + 1, 0, multi_line_columns, out)?;
        out.push(',');
        remaining_columns = 0;
    }

    out.push('\n');
    append_tabs(indent, out);
    out.push('}');
    Ok(())
}

fn append_function_object(obj: &Object<'_>, out: &mut String) -> Result<()> {
    match obj.address() {
        Some(address) => {
            out.push_str(&format!("{address:#x}"));
            Ok(())
        }
        None => Err(Error::Type("cannot format function value".into())),
    }
}

fn object_impl(
    obj: &Object<'_>,
    cast: bool,
    dereference: bool,
    indent: usize,
    mut one_line_columns: usize,
    multi_line_columns: usize,
    out: &mut String,
) -> Result<()> {
    let underlying = obj.qualified_type().ty.underlying();

    // Pointers own their cast prefix because dereferencing prepends an
    // asterisk to it.
    if underlying.kind() == Kind::Pointer {
        return append_pointer_object(
            obj,
            &underlying,
            cast,
            dereference,
            indent,
            one_line_columns,
            multi_line_columns,
            out,
        );
    }

    if cast {
        let old_len = out.len();
        out.push('(');
        type_name_impl(obj.qualified_type(), out)?;
        out.push(')');
        one_line_columns = one_line_columns.saturating_sub(out.len() - old_len);
    }

    match underlying.kind() {
        Kind::Void => Err(Error::Type("cannot format void object".into())),
        Kind::Int | Kind::Bool => append_int_object(obj, out),
        Kind::Float => append_float_object(obj, out),
        Kind::Complex => Err(Error::Type(
            "complex object formatting is not implemented".into(),
        )),
        Kind::Struct | Kind::Union => {
            append_compound_object(obj, &underlying, indent, multi_line_columns, out)
        }
        Kind::Enum => append_enum_object(obj, &underlying, out),
        Kind::Array => append_array_object(
            obj,
            &underlying,
            indent,
            one_line_columns,
            multi_line_columns,
            out,
        ),
        Kind::Function => append_function_object(obj, out),
        Kind::Pointer | Kind::Typedef => unreachable!("handled above"),
    }
}

/// Formats an object like an expression result, wrapping aggregates to the
/// given column budget.
pub fn format_object(obj: &Object<'_>, columns: usize) -> Result<String> {
    let mut out = String::new();
    object_impl(obj, true, true, 0, columns, columns.max(1), &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;
    use crate::ty::{Enumerator, LazyType, Member};
    use crate::ByteOrder;

    fn prog() -> Program {
        Program::for_testing(true)
    }

    fn parse(prog: &Program, name: &str) -> QualifiedType {
        prog.find_type(name, None).unwrap()
    }

    #[test]
    fn type_names_round_trip_through_the_parser() {
        let prog = prog();
        for name in [
            "int",
            "unsigned long long",
            "const char * volatile *",
            "int [3]",
            "int [3][4]",
            "int *[2]",
            "int (*)[2]",
            "const int * restrict",
        ] {
            let qualified_type = parse(&prog, name);
            assert_eq!(type_name(&qualified_type).unwrap(), name, "{name}");
        }
    }

    #[test]
    fn anonymous_tagged_types_are_marked() {
        let anonymous = QualifiedType::unqualified(Type::incomplete_structure(None));
        insta::assert_snapshot!(type_name(&anonymous).unwrap(), @"struct <anonymous>");
    }

    #[test]
    fn typedef_definitions_spell_the_alias() {
        let prog = prog();
        let size_t = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::SizeT));
        insta::assert_snapshot!(
            format_type(&size_t).unwrap(),
            @"typedef unsigned long size_t"
        );
    }

    #[test]
    fn struct_definitions_have_c_layout() {
        let prog = prog();
        let int = prog.types().primitive(PrimitiveType::Int);
        let char_type = prog.types().primitive(PrimitiveType::Char);
        let s = Type::structure(
            Some("S"),
            8,
            vec![
                Member::new(
                    Some("a"),
                    LazyType::resolved(QualifiedType::unqualified(int)),
                    0,
                    0,
                ),
                Member::new(
                    Some("b"),
                    LazyType::resolved(QualifiedType::unqualified(char_type.clone())),
                    32,
                    3,
                ),
                Member::new(
                    Some("c"),
                    LazyType::resolved(QualifiedType::unqualified(char_type)),
                    40,
                    5,
                ),
            ],
        );
        assert_eq!(
            format_type(&QualifiedType::unqualified(s)).unwrap(),
            "struct S {\n\tint a;\n\tchar b : 3;\n\tchar c : 5;\n}"
        );
    }

    #[test]
    fn enum_definitions_list_enumerators() {
        let prog = prog();
        let int = prog.types().primitive(PrimitiveType::Int);
        let color = Type::enumeration(
            Some("color"),
            int,
            vec![
                Enumerator::new_signed("RED", 0),
                Enumerator::new_signed("GREEN", 1),
            ],
        );
        assert_eq!(
            format_type(&QualifiedType::unqualified(color)).unwrap(),
            "enum color {\n\tRED = 0,\n\tGREEN = 1,\n}"
        );
    }

    fn int_array_object<'a>(prog: &'a Program, values: &[i32]) -> Object<'a> {
        let int = prog.types().primitive(PrimitiveType::Int);
        let array = QualifiedType::unqualified(
            prog.types_mut()
                .array_of(values.len() as u64, QualifiedType::unqualified(int)),
        );
        let mut bytes = Vec::new();
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let mut obj = Object::new(prog);
        obj.set_buffer(array, &bytes, 0, 0, ByteOrder::Little).unwrap();
        obj
    }

    #[test]
    fn arrays_fit_on_one_line_when_the_budget_allows() {
        let prog = prog();
        let obj = int_array_object(&prog, &[1, 2, 3]);
        assert_eq!(
            format_object(&obj, 80).unwrap(),
            "(int [3]){ 1, 2, 3 }"
        );
    }

    #[test]
    fn arrays_wrap_when_the_budget_is_small() {
        let prog = prog();
        let obj = int_array_object(&prog, &[1, 2, 3]);
        assert_eq!(
            format_object(&obj, 4).unwrap(),
            "(int [3]){\n\t1,\n\t2,\n\t3,\n}"
        );
    }

    #[test]
    fn trailing_zero_elements_are_trimmed() {
        let prog = prog();
        let obj = int_array_object(&prog, &[1, 0, 0]);
        assert_eq!(format_object(&obj, 80).unwrap(), "(int [3]){ 1 }");
        let zeros = int_array_object(&prog, &[0, 0, 0]);
        assert_eq!(format_object(&zeros, 80).unwrap(), "(int [3]){}");
    }

    #[test]
    fn struct_objects_format_member_per_line() {
        let prog = prog();
        let int = prog.types().primitive(PrimitiveType::Int);
        let point = Type::structure(
            Some("point"),
            8,
            vec![
                Member::new(
                    Some("x"),
                    LazyType::resolved(QualifiedType::unqualified(int.clone())),
                    0,
                    0,
                ),
                Member::new(
                    Some("y"),
                    LazyType::resolved(QualifiedType::unqualified(int)),
                    32,
                    0,
                ),
            ],
        );
        let mut obj = Object::new(&prog);
        obj.set_buffer(
            QualifiedType::unqualified(point),
            &[1, 0, 0, 0, 2, 0, 0, 0],
            0,
            0,
            ByteOrder::Little,
        )
        .unwrap();
        assert_eq!(
            format_object(&obj, 80).unwrap(),
            "(struct point){\n\t.x = (int)1,\n\t.y = (int)2,\n}"
        );
    }

    #[test]
    fn enum_objects_print_enumerator_names() {
        let prog = prog();
        let int = prog.types().primitive(PrimitiveType::Int);
        let color = Type::enumeration(
            Some("color"),
            int,
            vec![Enumerator::new_signed("RED", 0), Enumerator::new_signed("BLUE", 5)],
        );
        let qualified_type = QualifiedType::unqualified(color);
        let mut obj = Object::new(&prog);
        obj.set_signed(qualified_type.clone(), 5, 0).unwrap();
        assert_eq!(format_object(&obj, 80).unwrap(), "(enum color)BLUE");
        obj.set_signed(qualified_type, 3, 0).unwrap();
        assert_eq!(format_object(&obj, 80).unwrap(), "(enum color)3");
    }

    #[test]
    fn char_pointers_print_as_strings() {
        let prog = Program::for_testing_with_memory(
            true,
            0x2000,
            b"hi\tthere\0".to_vec(),
        );
        let char_type = prog.types().primitive(PrimitiveType::Char);
        let pointer = prog
            .types_mut()
            .pointer_to(QualifiedType::unqualified(char_type));
        let mut obj = Object::new(&prog);
        obj.set_unsigned(QualifiedType::unqualified(pointer), 0x2000, 0)
            .unwrap();
        assert_eq!(
            format_object(&obj, 80).unwrap(),
            "(char *)0x2000 = \"hi\\tthere\""
        );
    }

    #[test]
    fn faulting_pointers_print_the_bare_address() {
        let prog = prog();
        let int = prog.types().primitive(PrimitiveType::Int);
        let pointer = prog
            .types_mut()
            .pointer_to(QualifiedType::unqualified(int));
        let mut obj = Object::new(&prog);
        obj.set_unsigned(QualifiedType::unqualified(pointer), 0xdead0000, 0)
            .unwrap();
        // The fault from the dereference is consumed and the asterisk
        // removed.
        assert_eq!(format_object(&obj, 80).unwrap(), "(int *)0xdead0000");
    }

    #[test]
    fn pointers_dereference_when_memory_is_readable() {
        let prog = Program::for_testing_with_memory(true, 0x1000, vec![0x2a, 0, 0, 0]);
        let int = prog.types().primitive(PrimitiveType::Int);
        let pointer = prog
            .types_mut()
            .pointer_to(QualifiedType::unqualified(int));
        let mut obj = Object::new(&prog);
        obj.set_unsigned(QualifiedType::unqualified(pointer), 0x1000, 0)
            .unwrap();
        assert_eq!(format_object(&obj, 80).unwrap(), "*(int *)0x1000 = 42");
    }

    #[test]
    fn float_objects_print_roundly() {
        let prog = prog();
        let double = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Double));
        let mut obj = Object::new(&prog);
        obj.set_float(double.clone(), 2.0).unwrap();
        assert_eq!(format_object(&obj, 80).unwrap(), "(double)2.0");
        obj.set_float(double, 2.5).unwrap();
        assert_eq!(format_object(&obj, 80).unwrap(), "(double)2.5");
    }
}
