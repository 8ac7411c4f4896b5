//! Parsing of C type names and member designators.

use crate::c::lexer::{token_to_u64, Lexer, TokenKind};
use crate::error::{Error, Result};
use crate::program::Program;
use crate::ty::{Kind, NamedKind, PrimitiveType, QualifiedType, Qualifiers, Type};

/// States of the type-specifier finite state machine. Every valid C
/// specifier sequence lands in a state naming a primitive type; everything
/// else falls into the error sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Specifier {
    Error,
    None,
    Void,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    ShortInt,
    SignedShortInt,
    UnsignedShortInt,
    SignedShort,
    UnsignedShort,
    Int,
    SignedInt,
    UnsignedInt,
    Long,
    LongInt,
    SignedLong,
    UnsignedLong,
    SignedLongInt,
    UnsignedLongInt,
    LongLong,
    LongLongInt,
    SignedLongLongInt,
    UnsignedLongLongInt,
    SignedLongLong,
    UnsignedLongLong,
    Signed,
    Unsigned,
    Bool,
    Float,
    Double,
    LongDouble,
}

impl Specifier {
    fn spelling(self) -> &'static str {
        match self {
            Specifier::Error => "<invalid specifier>",
            Specifier::None => "<no specifier>",
            Specifier::Void => "void",
            Specifier::Char => "char",
            Specifier::SignedChar => "signed char",
            Specifier::UnsignedChar => "unsigned char",
            Specifier::Short => "short",
            Specifier::ShortInt => "short int",
            Specifier::SignedShortInt => "signed short int",
            Specifier::UnsignedShortInt => "unsigned short int",
            Specifier::SignedShort => "signed short",
            Specifier::UnsignedShort => "unsigned short",
            Specifier::Int => "int",
            Specifier::SignedInt => "signed int",
            Specifier::UnsignedInt => "unsigned int",
            Specifier::Long => "long",
            Specifier::LongInt => "long int",
            Specifier::SignedLong => "signed long",
            Specifier::UnsignedLong => "unsigned long",
            Specifier::SignedLongInt => "signed long int",
            Specifier::UnsignedLongInt => "unsigned long int",
            Specifier::LongLong => "long long",
            Specifier::LongLongInt => "long long int",
            Specifier::SignedLongLongInt => "signed long long int",
            Specifier::UnsignedLongLongInt => "unsigned long long int",
            Specifier::SignedLongLong => "signed long long",
            Specifier::UnsignedLongLong => "unsigned long long",
            Specifier::Signed => "signed",
            Specifier::Unsigned => "unsigned",
            Specifier::Bool => "_Bool",
            Specifier::Float => "float",
            Specifier::Double => "double",
            Specifier::LongDouble => "long double",
        }
    }

    fn primitive(self) -> Option<PrimitiveType> {
        use PrimitiveType as P;
        Some(match self {
            Specifier::Void => P::Void,
            Specifier::Char => P::Char,
            Specifier::SignedChar => P::SignedChar,
            Specifier::UnsignedChar => P::UnsignedChar,
            Specifier::Short
            | Specifier::ShortInt
            | Specifier::SignedShortInt
            | Specifier::SignedShort => P::Short,
            Specifier::UnsignedShortInt | Specifier::UnsignedShort => P::UnsignedShort,
            Specifier::Int | Specifier::SignedInt | Specifier::Signed => P::Int,
            Specifier::UnsignedInt | Specifier::Unsigned => P::UnsignedInt,
            Specifier::Long
            | Specifier::LongInt
            | Specifier::SignedLong
            | Specifier::SignedLongInt => P::Long,
            Specifier::UnsignedLong | Specifier::UnsignedLongInt => P::UnsignedLong,
            Specifier::LongLong
            | Specifier::LongLongInt
            | Specifier::SignedLongLongInt
            | Specifier::SignedLongLong => P::LongLong,
            Specifier::UnsignedLongLongInt | Specifier::UnsignedLongLong => {
                P::UnsignedLongLong
            }
            Specifier::Bool => P::Bool,
            Specifier::Float => P::Float,
            Specifier::Double => P::Double,
            Specifier::LongDouble => P::LongDouble,
            Specifier::Error | Specifier::None => return None,
        })
    }
}

fn transition(state: Specifier, token: TokenKind) -> Specifier {
    use Specifier as S;
    use TokenKind as T;
    match (state, token) {
        (S::None, T::Void) => S::Void,
        (S::None, T::Char) => S::Char,
        (S::None, T::Short) => S::Short,
        (S::None, T::Int) => S::Int,
        (S::None, T::Long) => S::Long,
        (S::None, T::Signed) => S::Signed,
        (S::None, T::Unsigned) => S::Unsigned,
        (S::None, T::Bool) => S::Bool,
        (S::None, T::Float) => S::Float,
        (S::None, T::Double) => S::Double,
        (S::Char, T::Signed) => S::SignedChar,
        (S::Char, T::Unsigned) => S::UnsignedChar,
        (S::Short, T::Int) => S::ShortInt,
        (S::Short, T::Signed) => S::SignedShort,
        (S::Short, T::Unsigned) => S::UnsignedShort,
        (S::ShortInt, T::Signed) => S::SignedShortInt,
        (S::ShortInt, T::Unsigned) => S::UnsignedShortInt,
        (S::SignedShort, T::Int) => S::SignedShortInt,
        (S::UnsignedShort, T::Int) => S::UnsignedShortInt,
        (S::Int, T::Short) => S::ShortInt,
        (S::Int, T::Long) => S::LongInt,
        (S::Int, T::Signed) => S::SignedInt,
        (S::Int, T::Unsigned) => S::UnsignedInt,
        (S::SignedInt, T::Short) => S::SignedShortInt,
        (S::SignedInt, T::Long) => S::SignedLongInt,
        (S::UnsignedInt, T::Short) => S::UnsignedShortInt,
        (S::UnsignedInt, T::Long) => S::UnsignedLongInt,
        (S::Long, T::Int) => S::LongInt,
        (S::Long, T::Long) => S::LongLong,
        (S::Long, T::Signed) => S::SignedLong,
        (S::Long, T::Unsigned) => S::UnsignedLong,
        (S::Long, T::Double) => S::LongDouble,
        (S::LongInt, T::Long) => S::LongLongInt,
        (S::LongInt, T::Signed) => S::SignedLongInt,
        (S::LongInt, T::Unsigned) => S::UnsignedLongInt,
        (S::SignedLong, T::Long) => S::SignedLongLong,
        (S::SignedLong, T::Int) => S::SignedLongInt,
        (S::UnsignedLong, T::Long) => S::UnsignedLongLong,
        (S::UnsignedLong, T::Int) => S::UnsignedLongInt,
        (S::SignedLongInt, T::Long) => S::SignedLongLongInt,
        (S::UnsignedLongInt, T::Long) => S::UnsignedLongLongInt,
        (S::LongLong, T::Int) => S::LongLongInt,
        (S::LongLong, T::Signed) => S::SignedLongLong,
        (S::LongLong, T::Unsigned) => S::UnsignedLongLong,
        (S::LongLongInt, T::Signed) => S::SignedLongLongInt,
        (S::LongLongInt, T::Unsigned) => S::UnsignedLongLongInt,
        (S::SignedLongLong, T::Int) => S::SignedLongLongInt,
        (S::UnsignedLongLong, T::Int) => S::UnsignedLongLongInt,
        (S::Signed, T::Char) => S::SignedChar,
        (S::Signed, T::Short) => S::SignedShort,
        (S::Signed, T::Int) => S::SignedInt,
        (S::Signed, T::Long) => S::SignedLong,
        (S::Unsigned, T::Char) => S::UnsignedChar,
        (S::Unsigned, T::Short) => S::UnsignedShort,
        (S::Unsigned, T::Int) => S::UnsignedInt,
        (S::Unsigned, T::Long) => S::UnsignedLong,
        (S::Double, T::Long) => S::LongDouble,
        _ => S::Error,
    }
}

/// Classifies a pure specifier list without consulting the program, e.g.
/// `"unsigned long long int"` to its primitive type.
pub fn parse_specifier_list(s: &str) -> Option<PrimitiveType> {
    let mut lexer = Lexer::new(s);
    let mut specifier = Specifier::None;
    loop {
        let token = lexer.pop().ok()?;
        if token.kind == TokenKind::Eof {
            break;
        }
        specifier = if token.kind.is_specifier() {
            transition(specifier, token.kind)
        } else {
            Specifier::Error
        };
        if specifier == Specifier::Error {
            return None;
        }
    }
    specifier.primitive()
}

fn qualifier_from_token(token: TokenKind) -> Qualifiers {
    match token {
        TokenKind::Const => Qualifiers::CONST,
        TokenKind::Restrict => Qualifiers::RESTRICT,
        TokenKind::Volatile => Qualifiers::VOLATILE,
        TokenKind::Atomic => Qualifiers::ATOMIC,
        _ => Qualifiers::NONE,
    }
}

/// Parses a specifier-qualifier list, resolving identifiers and tagged
/// names against the program's types.
pub(crate) fn parse_specifier_qualifier_list(
    prog: &Program,
    lexer: &mut Lexer<'_>,
    filename: Option<&str>,
) -> Result<QualifiedType> {
    let mut specifier = Specifier::None;
    let mut qualifiers = Qualifiers::NONE;
    let mut identifier: Option<String> = None;
    let mut tag_token: Option<TokenKind> = None;

    loop {
        let token = lexer.pop()?;
        if token.kind.is_qualifier() {
            qualifiers |= qualifier_from_token(token.kind);
        } else if token.kind.is_specifier() {
            if let Some(tag) = tag_token {
                return Err(Error::Syntax(format!(
                    "cannot combine '{}' with '{}'",
                    token.kind.spelling(),
                    tag.spelling()
                )));
            }
            if identifier.is_some() {
                return Err(Error::Syntax(format!(
                    "cannot combine '{}' with identifier",
                    token.kind.spelling()
                )));
            }
            let previous = specifier;
            specifier = transition(specifier, token.kind);
            if specifier == Specifier::Error {
                return Err(Error::Syntax(format!(
                    "cannot combine '{}' with '{}'",
                    token.kind.spelling(),
                    previous.spelling()
                )));
            }
        } else if token.kind == TokenKind::Identifier
            && specifier == Specifier::None
            && identifier.is_none()
        {
            identifier = Some(token.text.to_owned());
        } else if matches!(
            token.kind,
            TokenKind::Struct | TokenKind::Union | TokenKind::Enum
        ) {
            if identifier.is_some() {
                return Err(Error::Syntax(format!(
                    "cannot combine '{}' with identifier",
                    token.kind.spelling()
                )));
            }
            if specifier != Specifier::None {
                return Err(Error::Syntax(format!(
                    "cannot combine '{}' with '{}'",
                    token.kind.spelling(),
                    specifier.spelling()
                )));
            }
            tag_token = Some(token.kind);
            let name = lexer.pop()?;
            if name.kind != TokenKind::Identifier {
                return Err(Error::Syntax(format!(
                    "expected identifier after '{}'",
                    token.kind.spelling()
                )));
            }
            identifier = Some(name.text.to_owned());
        } else {
            lexer.push(token);
            break;
        }
    }

    let mut qualified_type = if specifier == Specifier::None {
        let kind = match tag_token {
            Some(TokenKind::Struct) => NamedKind::Struct,
            Some(TokenKind::Union) => NamedKind::Union,
            Some(TokenKind::Enum) => NamedKind::Enum,
            _ => match identifier.as_deref() {
                Some("size_t") => {
                    let ty = prog.types().primitive(PrimitiveType::SizeT);
                    return Ok(QualifiedType::new(ty, qualifiers));
                }
                Some("ptrdiff_t") => {
                    let ty = prog.types().primitive(PrimitiveType::PtrdiffT);
                    return Ok(QualifiedType::new(ty, qualifiers));
                }
                Some(_) => NamedKind::Typedef,
                None => {
                    return Err(Error::Syntax("expected type specifier".into()))
                }
            },
        };
        let name = identifier.expect("tagged lookup always has an identifier");
        prog.types().find_named(kind, &name, filename)?
    } else {
        let primitive = specifier
            .primitive()
            .expect("accepting specifier states map to primitives");
        QualifiedType::unqualified(prog.types().primitive(primitive))
    };
    qualified_type.qualifiers |= qualifiers;
    Ok(qualified_type)
}

/// An abstract declarator: pointer layers around an optional parenthesized
/// declarator and array suffixes.
struct Declarator {
    /// Qualifier sets of the `*`s, innermost first.
    pointers: Vec<Qualifiers>,
    direct: Direct,
}

struct Direct {
    group: Option<Box<Declarator>>,
    /// Array lengths in source order; `None` for `[]`.
    arrays: Vec<Option<u64>>,
}

fn parse_qualifier_list(lexer: &mut Lexer<'_>) -> Result<Qualifiers> {
    let mut qualifiers = Qualifiers::NONE;
    loop {
        let token = lexer.pop()?;
        if !token.kind.is_qualifier() {
            lexer.push(token);
            return Ok(qualifiers);
        }
        qualifiers |= qualifier_from_token(token.kind);
    }
}

fn parse_abstract_declarator(lexer: &mut Lexer<'_>) -> Result<Declarator> {
    let mut pointers = Vec::new();
    while lexer.peek()?.kind == TokenKind::Asterisk {
        lexer.pop()?;
        pointers.push(parse_qualifier_list(lexer)?);
    }

    let next = lexer.peek()?.kind;
    let direct = if next == TokenKind::LParen || next == TokenKind::LBracket {
        parse_direct_abstract_declarator(lexer)?
    } else {
        if pointers.is_empty() {
            return Err(Error::Syntax("expected abstract declarator".into()));
        }
        Direct {
            group: None,
            arrays: Vec::new(),
        }
    };
    Ok(Declarator { pointers, direct })
}

fn parse_direct_abstract_declarator(lexer: &mut Lexer<'_>) -> Result<Direct> {
    let mut group = None;
    if lexer.peek()?.kind == TokenKind::LParen {
        let lparen = lexer.pop()?;
        let next = lexer.peek()?.kind;
        if matches!(
            next,
            TokenKind::Asterisk | TokenKind::LParen | TokenKind::LBracket
        ) {
            group = Some(Box::new(parse_abstract_declarator(lexer)?));
            if lexer.pop()?.kind != TokenKind::RParen {
                return Err(Error::Syntax("expected ')'".into()));
            }
        } else {
            // A parameter list, i.e. a function declarator.
            lexer.push(lparen);
        }
    }

    let mut arrays = Vec::new();
    loop {
        let token = lexer.pop()?;
        match token.kind {
            TokenKind::LBracket => {
                let next = lexer.pop()?;
                let length = if next.kind == TokenKind::Number {
                    let length = token_to_u64(&next)?;
                    if lexer.pop()?.kind != TokenKind::RBracket {
                        return Err(Error::Syntax("expected ']'".into()));
                    }
                    Some(length)
                } else if next.kind == TokenKind::RBracket {
                    None
                } else {
                    return Err(Error::Syntax("expected ']'".into()));
                };
                arrays.push(length);
            }
            TokenKind::LParen => {
                return Err(Error::Syntax(
                    "function pointer types are not implemented".into(),
                ))
            }
            _ => {
                lexer.push(token);
                if group.is_none() && arrays.is_empty() {
                    return Err(Error::Syntax("expected abstract declarator".into()));
                }
                return Ok(Direct { group, arrays });
            }
        }
    }
}

/// Applies a declarator to the base type it modifies.
fn declarator_type(
    prog: &Program,
    declarator: &Declarator,
    base: QualifiedType,
) -> Result<QualifiedType> {
    let mut qualified_type = base;
    for qualifiers in &declarator.pointers {
        let pointer = prog.types_mut().pointer_to(qualified_type);
        qualified_type = QualifiedType::new(pointer, *qualifiers);
    }
    // The rightmost array suffix binds closest to the element type.
    for length in declarator.direct.arrays.iter().rev() {
        let array = match length {
            Some(length) => prog.types_mut().array_of(*length, qualified_type),
            None => prog.types_mut().incomplete_array_of(qualified_type),
        };
        qualified_type = QualifiedType::unqualified(array);
    }
    match &declarator.direct.group {
        Some(inner) => declarator_type(prog, inner, qualified_type),
        None => Ok(qualified_type),
    }
}

/// Parses a full C type name: a specifier-qualifier list with an optional
/// abstract declarator.
pub(crate) fn parse_type_name(
    prog: &Program,
    name: &str,
    filename: Option<&str>,
) -> Result<QualifiedType> {
    let mut lexer = Lexer::new(name);
    let mut qualified_type = parse_specifier_qualifier_list(prog, &mut lexer, filename)?;

    let token = lexer.pop()?;
    if token.kind != TokenKind::Eof {
        lexer.push(token);
        let declarator = parse_abstract_declarator(&mut lexer)?;
        qualified_type = declarator_type(prog, &declarator, qualified_type)?;
        if lexer.pop()?.kind != TokenKind::Eof {
            return Err(Error::Syntax("extra tokens after type name".into()));
        }
    }
    Ok(qualified_type)
}

/// Evaluates a member designator `(.IDENT | [NUMBER])+` to a bit offset in
/// `ty`.
pub(crate) fn bit_offset_of(designator: &str, ty: &Type) -> Result<u64> {
    #[derive(PartialEq, Clone, Copy)]
    enum State {
        Start,
        AfterDot,
        AfterIdentifier,
        AfterLBracket,
        AfterNumber,
        AfterRBracket,
    }

    let mut lexer = Lexer::new(designator);
    let mut state = State::Start;
    let mut ty = ty.clone();
    let mut bit_offset: u64 = 0;
    let overflow = || Error::Overflow("offset is too large".into());

    loop {
        let token = lexer.pop()?;
        state = match state {
            State::Start | State::AfterDot => {
                if token.kind != TokenKind::Identifier {
                    return Err(Error::Syntax(if state == State::AfterDot {
                        "expected identifier after '.'".into()
                    } else {
                        "expected identifier".into()
                    }));
                }
                let info = ty.member_info(token.text)?;
                bit_offset = bit_offset
                    .checked_add(info.bit_offset)
                    .ok_or_else(overflow)?;
                ty = info.qualified_type.ty;
                State::AfterIdentifier
            }
            State::AfterIdentifier | State::AfterRBracket => match token.kind {
                TokenKind::Eof => return Ok(bit_offset),
                TokenKind::Dot => State::AfterDot,
                TokenKind::LBracket => State::AfterLBracket,
                _ => {
                    return Err(Error::Syntax(if state == State::AfterIdentifier {
                        "expected '.' or '[' after identifier".into()
                    } else {
                        "expected '.' or '[' after ']'".into()
                    }))
                }
            },
            State::AfterLBracket => {
                if token.kind != TokenKind::Number {
                    return Err(Error::Syntax("expected number after '['".into()));
                }
                let index = token_to_u64(&token)?;
                let underlying = ty.underlying();
                if underlying.kind() != Kind::Array {
                    return Err(Error::Type("subscripted type is not an array".into()));
                }
                let element = underlying.wrapped_type().ty;
                let element_bits = element.bit_size()?;
                bit_offset = index
                    .checked_mul(element_bits)
                    .and_then(|offset| bit_offset.checked_add(offset))
                    .ok_or_else(overflow)?;
                ty = element;
                State::AfterNumber
            }
            State::AfterNumber => {
                if token.kind != TokenKind::RBracket {
                    return Err(Error::Syntax("expected ']' after number".into()));
                }
                State::AfterRBracket
            }
        };
    }
}
