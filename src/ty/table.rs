//! The per-program type table.
//!
//! Owns the canonical primitive descriptors, interns derived pointer and
//! array types so repeated composition yields identical descriptors, and
//! dispatches named lookups to registered finders (typically backed by the
//! name index plus a DWARF runtime).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ty::{PrimitiveType, QualifiedType, Qualifiers, Type};

/// The name spaces a finder can be asked to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKind {
    Struct,
    Union,
    Enum,
    Typedef,
}

impl NamedKind {
    pub fn keyword(self) -> &'static str {
        match self {
            NamedKind::Struct => "struct",
            NamedKind::Union => "union",
            NamedKind::Enum => "enum",
            NamedKind::Typedef => "",
        }
    }
}

/// Resolves a name to a type, consulting whatever source it fronts.
///
/// A `filename` narrows the search to definitions from that source file,
/// matched from right to left against the file's path components.
pub trait TypeFinder: Send {
    fn find(
        &self,
        kind: NamedKind,
        name: &str,
        filename: Option<&str>,
    ) -> Result<QualifiedType>;
}

const NUM_PRIMITIVES: usize = 18;

fn primitive_index(primitive: PrimitiveType) -> usize {
    primitive as usize
}

pub struct TypeTable {
    word_size: u64,
    primitives: Vec<Type>,
    pointer_cache: HashMap<(usize, Qualifiers), Type>,
    array_cache: HashMap<(usize, Qualifiers, Option<u64>), Type>,
    finders: Vec<Box<dyn TypeFinder>>,
}

impl TypeTable {
    pub fn new(word_size: u64) -> TypeTable {
        let int = |name, size, is_signed, primitive| {
            Type::int(name, size, is_signed, Some(primitive))
        };
        use PrimitiveType::*;
        let long_size = word_size;
        let mut primitives = Vec::with_capacity(NUM_PRIMITIVES);
        primitives.push(Type::void());
        primitives.push(int("char", 1, true, Char));
        primitives.push(int("signed char", 1, true, SignedChar));
        primitives.push(int("unsigned char", 1, false, UnsignedChar));
        primitives.push(int("short", 2, true, Short));
        primitives.push(int("unsigned short", 2, false, UnsignedShort));
        primitives.push(int("int", 4, true, Int));
        primitives.push(int("unsigned int", 4, false, UnsignedInt));
        primitives.push(int("long", long_size, true, Long));
        primitives.push(int("unsigned long", long_size, false, UnsignedLong));
        primitives.push(int("long long", 8, true, LongLong));
        primitives.push(int("unsigned long long", 8, false, UnsignedLongLong));
        primitives.push(Type::bool_type("_Bool", 1, Some(Bool)));
        primitives.push(Type::float("float", 4, Some(Float)));
        primitives.push(Type::float("double", 8, Some(Double)));
        primitives.push(Type::float("long double", 16, Some(LongDouble)));
        // size_t and ptrdiff_t alias the word-sized integer types.
        let unsigned_long = primitives[primitive_index(UnsignedLong)].clone();
        let long = primitives[primitive_index(Long)].clone();
        primitives.push(Type::typedef(
            "size_t",
            QualifiedType::unqualified(unsigned_long),
            Some(SizeT),
        ));
        primitives.push(Type::typedef(
            "ptrdiff_t",
            QualifiedType::unqualified(long),
            Some(PtrdiffT),
        ));
        debug_assert_eq!(primitives.len(), NUM_PRIMITIVES);

        TypeTable {
            word_size,
            primitives,
            pointer_cache: HashMap::new(),
            array_cache: HashMap::new(),
            finders: Vec::new(),
        }
    }

    pub fn word_size(&self) -> u64 {
        self.word_size
    }

    pub fn primitive(&self, primitive: PrimitiveType) -> Type {
        self.primitives[primitive_index(primitive)].clone()
    }

    /// Pointer to `referenced` at the program's pointer width. Repeated
    /// requests for the same referent return the identical descriptor.
    pub fn pointer_to(&mut self, referenced: QualifiedType) -> Type {
        let key = (
            Arc::as_ptr(&referenced.ty.data) as usize,
            referenced.qualifiers,
        );
        if let Some(ty) = self.pointer_cache.get(&key) {
            return ty.clone();
        }
        let ty = Type::pointer(self.word_size, referenced);
        self.pointer_cache.insert(key, ty.clone());
        ty
    }

    pub fn array_of(&mut self, length: u64, element: QualifiedType) -> Type {
        self.array_impl(Some(length), element)
    }

    pub fn incomplete_array_of(&mut self, element: QualifiedType) -> Type {
        self.array_impl(None, element)
    }

    fn array_impl(&mut self, length: Option<u64>, element: QualifiedType) -> Type {
        let key = (
            Arc::as_ptr(&element.ty.data) as usize,
            element.qualifiers,
            length,
        );
        if let Some(ty) = self.array_cache.get(&key) {
            return ty.clone();
        }
        let ty = match length {
            Some(length) => Type::array(length, element),
            None => Type::incomplete_array(element),
        };
        self.array_cache.insert(key, ty.clone());
        ty
    }

    pub fn register_finder(&mut self, finder: Box<dyn TypeFinder>) {
        self.finders.push(finder);
    }

    /// Finds a named type. Finders are consulted in registration order;
    /// lookup misses fall through to the next finder, any other failure is
    /// reported immediately.
    pub fn find_named(
        &self,
        kind: NamedKind,
        name: &str,
        filename: Option<&str>,
    ) -> Result<QualifiedType> {
        for finder in &self.finders {
            match finder.find(kind, name, filename) {
                Ok(qualified_type) => return Ok(qualified_type),
                Err(err) if err.kind() == crate::ErrorKind::Lookup => continue,
                Err(err) => return Err(err),
            }
        }
        let keyword = kind.keyword();
        if keyword.is_empty() {
            Err(Error::Lookup(format!("could not find '{name}'")))
        } else {
            Err(Error::Lookup(format!("could not find '{keyword} {name}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Kind;

    #[test]
    fn primitives_have_c_shapes() {
        let table = TypeTable::new(8);
        assert_eq!(table.primitive(PrimitiveType::Int).size(), 4);
        assert_eq!(table.primitive(PrimitiveType::Long).size(), 8);
        assert!(!table.primitive(PrimitiveType::UnsignedLong).is_signed());
        assert_eq!(table.primitive(PrimitiveType::Bool).kind(), Kind::Bool);
        let size_t = table.primitive(PrimitiveType::SizeT);
        assert_eq!(size_t.kind(), Kind::Typedef);
        assert_eq!(size_t.name(), "size_t");
        assert!(!size_t.underlying().is_signed());
        assert!(table.primitive(PrimitiveType::PtrdiffT).underlying().is_signed());
    }

    #[test]
    fn word_size_drives_long() {
        let table = TypeTable::new(4);
        assert_eq!(table.primitive(PrimitiveType::Long).size(), 4);
        assert_eq!(table.primitive(PrimitiveType::LongLong).size(), 8);
    }

    #[test]
    fn pointer_types_are_interned() {
        let mut table = TypeTable::new(8);
        let int = QualifiedType::unqualified(table.primitive(PrimitiveType::Int));
        let a = table.pointer_to(int.clone());
        let b = table.pointer_to(int.clone());
        assert!(Type::ptr_eq(&a, &b));
        assert_eq!(a.size(), 8);

        let const_int = QualifiedType::new(
            table.primitive(PrimitiveType::Int),
            Qualifiers::CONST,
        );
        let c = table.pointer_to(const_int);
        assert!(!Type::ptr_eq(&a, &c));
    }

    #[test]
    fn array_types_are_interned_by_length() {
        let mut table = TypeTable::new(8);
        let int = QualifiedType::unqualified(table.primitive(PrimitiveType::Int));
        let a = table.array_of(3, int.clone());
        let b = table.array_of(3, int.clone());
        let c = table.array_of(4, int.clone());
        let d = table.incomplete_array_of(int);
        assert!(Type::ptr_eq(&a, &b));
        assert!(!Type::ptr_eq(&a, &c));
        assert!(!d.is_complete());
    }

    struct FixedFinder(Type);

    impl TypeFinder for FixedFinder {
        fn find(
            &self,
            kind: NamedKind,
            name: &str,
            _filename: Option<&str>,
        ) -> Result<QualifiedType> {
            if kind == NamedKind::Typedef && name == "myint" {
                Ok(QualifiedType::unqualified(self.0.clone()))
            } else {
                Err(Error::Lookup(format!("could not find '{name}'")))
            }
        }
    }

    #[test]
    fn finders_chain_on_lookup_misses() {
        let mut table = TypeTable::new(8);
        let int = table.primitive(PrimitiveType::Int);
        table.register_finder(Box::new(FixedFinder(int)));
        assert!(table
            .find_named(NamedKind::Typedef, "myint", None)
            .is_ok());
        let err = table
            .find_named(NamedKind::Struct, "nope", None)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Lookup);
        assert!(err.to_string().contains("struct nope"));
    }
}
