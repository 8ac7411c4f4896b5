//! The program being debugged.
//!
//! A [`Program`] owns the type table and the memory reader and fronts name
//! lookups. Type and object lookups are delegated to registered finders;
//! the usual finder is backed by the DWARF name index plus a DWARF runtime,
//! but tests and synthetic targets can register anything.

use std::cell::{Ref, RefCell, RefMut};

use crate::error::{Error, Result};
use crate::memory::MemoryReader;
use crate::object::Object;
use crate::ty::{QualifiedType, TypeTable};

/// What kinds of objects a [`Program::find_object`] call accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindObjectFlags(u8);

impl FindObjectFlags {
    pub const CONSTANT: FindObjectFlags = FindObjectFlags(1 << 0);
    pub const FUNCTION: FindObjectFlags = FindObjectFlags(1 << 1);
    pub const VARIABLE: FindObjectFlags = FindObjectFlags(1 << 2);
    pub const ANY: FindObjectFlags = FindObjectFlags((1 << 3) - 1);

    pub fn contains(self, other: FindObjectFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Resolves an object by name, typically from debug information.
pub trait ObjectFinder: Send {
    fn find<'p>(
        &self,
        prog: &'p Program,
        name: &str,
        filename: Option<&str>,
        flags: FindObjectFlags,
    ) -> Result<Object<'p>>;
}

pub struct Program {
    little_endian: bool,
    types: RefCell<TypeTable>,
    memory: Box<dyn MemoryReader>,
    object_finders: Vec<Box<dyn ObjectFinder>>,
}

impl Program {
    pub fn new(
        word_size: u64,
        little_endian: bool,
        memory: Box<dyn MemoryReader>,
    ) -> Program {
        Program {
            little_endian,
            types: RefCell::new(TypeTable::new(word_size)),
            memory,
            object_finders: Vec::new(),
        }
    }

    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    pub fn word_size(&self) -> u64 {
        self.types.borrow().word_size()
    }

    pub fn types(&self) -> Ref<'_, TypeTable> {
        self.types.borrow()
    }

    pub fn types_mut(&self) -> RefMut<'_, TypeTable> {
        self.types.borrow_mut()
    }

    pub fn register_object_finder(&mut self, finder: Box<dyn ObjectFinder>) {
        self.object_finders.push(finder);
    }

    /// Reads target memory. A short or failed read is a fault at the
    /// starting address.
    pub fn read_memory(&self, buf: &mut [u8], address: u64, physical: bool) -> Result<()> {
        self.memory.read(buf, address, physical)
    }

    /// Reads a NUL-terminated string from target memory, stopping after
    /// `max` bytes.
    pub fn read_c_string(
        &self,
        address: u64,
        physical: bool,
        max: usize,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..max as u64 {
            self.memory
                .read(&mut byte, address.wrapping_add(i), physical)?;
            if byte[0] == 0 {
                break;
            }
            out.push(byte[0]);
        }
        Ok(out)
    }

    /// Parses a C type name and resolves it against this program's types.
    pub fn find_type(&self, name: &str, filename: Option<&str>) -> Result<QualifiedType> {
        crate::c::find_type(self, name, filename)
    }

    /// Finds a named object (variable, constant, or function).
    pub fn find_object(
        &self,
        name: &str,
        filename: Option<&str>,
        flags: FindObjectFlags,
    ) -> Result<Object<'_>> {
        for finder in &self.object_finders {
            match finder.find(self, name, filename, flags) {
                Ok(obj) => return Ok(obj),
                Err(err) if err.kind() == crate::ErrorKind::Lookup => continue,
                Err(err) => return Err(err),
            }
        }
        tracing::debug!(name, "object lookup failed");
        Err(Error::Lookup(format!("could not find '{name}'")))
    }

    /// An integer literal object, typed by C's rules.
    pub fn integer_literal(&self, value: u64) -> Result<Object<'_>> {
        crate::c::integer_literal(self, value)
    }

    /// A boolean literal object (type `int`, as in C).
    pub fn bool_literal(&self, value: bool) -> Result<Object<'_>> {
        crate::c::bool_literal(self, value)
    }

    /// A floating-point literal object (type `double`).
    pub fn float_literal(&self, value: f64) -> Result<Object<'_>> {
        crate::c::float_literal(self, value)
    }

    #[cfg(test)]
    pub(crate) fn for_testing(little_endian: bool) -> Program {
        Program::new(8, little_endian, Box::new(crate::memory::EmptyReader))
    }

    #[cfg(test)]
    pub(crate) fn for_testing_with_memory(
        little_endian: bool,
        address: u64,
        data: Vec<u8>,
    ) -> Program {
        let mut reader = crate::memory::SegmentReader::new();
        reader.add_segment(address, data, false);
        Program::new(8, little_endian, Box::new(reader))
    }
}
