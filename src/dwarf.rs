//! Realizing indexed entries into type descriptors.
//!
//! The index answers "where is `struct page` defined"; this module turns
//! such an entry into a [`Type`] by cracking the DIE and, lazily, the DIEs
//! it references. Registering a [`DwarfTypeFinder`] with a program's type
//! table is how `find_type("struct page *")` reaches debug information.
//!
//! Only the type-description subset of DWARF is interpreted here. Location
//! expressions and frame information stay with the external unwinder, and
//! filename narrowing is left to richer runtimes: the index keeps file
//! names hashed, so this finder returns any matching definition.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::c;
use crate::elf::{DebugFile, SectionId};
use crate::error::{Error, Result};
use crate::index::consts::*;
use crate::index::cu::{read_cus, CompileUnit};
use crate::index::{DieRef, DwarfIndex, FileId};
use crate::reader::{cstr_at, Cursor};
use crate::ty::{
    Enumerator, LazyType, Member, NamedKind, Parameter, PrimitiveType, QualifiedType,
    Qualifiers, Type, TypeFinder,
};

/// Bound on DIE reference chains, against malformed cyclic references that
/// lazy member slots cannot absorb (e.g. a typedef of itself).
const MAX_DEPTH: usize = 128;

/// A [`TypeFinder`] over a fully-updated [`DwarfIndex`].
pub struct DwarfTypeFinder {
    inner: Arc<Realizer>,
}

impl DwarfTypeFinder {
    /// Files indexed after this point are not visible to the finder.
    pub fn new(index: Arc<DwarfIndex>) -> DwarfTypeFinder {
        DwarfTypeFinder {
            inner: Arc::new(Realizer {
                index,
                types: Mutex::new(HashMap::new()),
                units: Mutex::new(HashMap::new()),
                abbrevs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Materializes the type definition behind an index entry.
    pub fn realize(&self, entry: &DieRef) -> Result<Type> {
        self.inner.type_at(entry.file, entry.offset as usize, 0)
    }
}

impl TypeFinder for DwarfTypeFinder {
    fn find(
        &self,
        kind: NamedKind,
        name: &str,
        _filename: Option<&str>,
    ) -> Result<QualifiedType> {
        let tags: &[u64] = match kind {
            NamedKind::Struct => &[DW_TAG_STRUCTURE_TYPE, DW_TAG_CLASS_TYPE],
            NamedKind::Union => &[DW_TAG_UNION_TYPE],
            NamedKind::Enum => &[DW_TAG_ENUMERATION_TYPE],
            NamedKind::Typedef => &[DW_TAG_TYPEDEF, DW_TAG_BASE_TYPE],
        };
        for entry in self.inner.index.lookup(name, tags) {
            let ty = self.inner.type_at(entry.file, entry.offset as usize, 0)?;
            return Ok(QualifiedType::unqualified(ty));
        }
        let keyword = kind.keyword();
        if keyword.is_empty() {
            Err(Error::Lookup(format!("could not find '{name}'")))
        } else {
            Err(Error::Lookup(format!("could not find '{keyword} {name}'")))
        }
    }
}

struct AbbrevDecl {
    tag: u64,
    has_children: bool,
    attributes: Vec<(u64, u64)>,
}

type AbbrevTable = HashMap<u64, AbbrevDecl>;

struct Realizer {
    index: Arc<DwarfIndex>,
    /// Descriptors by DIE, so recursive references land on the same handle.
    types: Mutex<HashMap<(FileId, usize), Type>>,
    units: Mutex<HashMap<FileId, Arc<Vec<CompileUnit>>>>,
    abbrevs: Mutex<HashMap<(FileId, u64), Arc<AbbrevTable>>>,
}

impl Realizer {
    fn file(&self, file: FileId) -> Result<&DebugFile> {
        self.index
            .debug_file(file)
            .ok_or_else(|| Error::Lookup("file is not indexed".into()))
    }

    fn units(&self, file: FileId) -> Result<Arc<Vec<CompileUnit>>> {
        if let Some(units) = self.units.lock().get(&file) {
            return Ok(units.clone());
        }
        let units = Arc::new(read_cus(self.file(file)?, file.as_usize())?);
        self.units.lock().insert(file, units.clone());
        Ok(units)
    }

    fn unit_containing(&self, file: FileId, offset: usize) -> Result<CompileUnit> {
        for cu in self.units(file)?.iter() {
            if offset >= cu.offset && offset < cu.end() {
                return Ok(cu.clone());
            }
        }
        Err(Error::DwarfFormat(format!(
            "no compile unit contains offset {offset:#x}"
        )))
    }

    fn abbrev(&self, file: FileId, cu: &CompileUnit) -> Result<Arc<AbbrevTable>> {
        let key = (file, cu.debug_abbrev_offset);
        if let Some(table) = self.abbrevs.lock().get(&key) {
            return Ok(table.clone());
        }
        let table = Arc::new(parse_abbrev_table(
            self.file(file)?.section(SectionId::DebugAbbrev),
            cu.debug_abbrev_offset,
        )?);
        self.abbrevs.lock().insert(key, table.clone());
        Ok(table)
    }

    /// Resolves a `DW_AT_type` reference, folding qualifier DIEs into the
    /// qualifier bitmask along the way. A missing referent is void.
    fn resolve_qualified(
        self: &Arc<Self>,
        file: FileId,
        mut offset: usize,
        mut depth: usize,
    ) -> Result<QualifiedType> {
        let mut qualifiers = Qualifiers::NONE;
        loop {
            if depth > MAX_DEPTH {
                return Err(Error::Recursion);
            }
            let debug_file = self.file(file)?;
            let cu = self.unit_containing(file, offset)?;
            let abbrev = self.abbrev(file, &cu)?;
            let die = parse_die(debug_file, &cu, &abbrev, offset)?
                .ok_or_else(|| Error::DwarfFormat("type reference is a null DIE".into()))?;
            let qualifier = match die.tag {
                DW_TAG_CONST_TYPE => Qualifiers::CONST,
                DW_TAG_VOLATILE_TYPE => Qualifiers::VOLATILE,
                DW_TAG_RESTRICT_TYPE => Qualifiers::RESTRICT,
                DW_TAG_ATOMIC_TYPE => Qualifiers::ATOMIC,
                _ => {
                    let ty = self.type_at(file, offset, depth)?;
                    return Ok(QualifiedType::new(ty, qualifiers));
                }
            };
            qualifiers |= qualifier;
            match die.type_ref {
                Some(next) => offset = next,
                None => return Ok(QualifiedType::new(Type::void(), qualifiers)),
            }
            depth += 1;
        }
    }

    fn type_at(self: &Arc<Self>, file: FileId, offset: usize, depth: usize) -> Result<Type> {
        if depth > MAX_DEPTH {
            return Err(Error::Recursion);
        }
        if let Some(ty) = self.types.lock().get(&(file, offset)) {
            return Ok(ty.clone());
        }
        let debug_file = self.file(file)?;
        let cu = self.unit_containing(file, offset)?;
        let abbrev = self.abbrev(file, &cu)?;
        let die = parse_die(debug_file, &cu, &abbrev, offset)?
            .ok_or_else(|| Error::DwarfFormat("type reference is a null DIE".into()))?;
        let ty = self.build(file, debug_file, &cu, &abbrev, &die, depth)?;
        // The first descriptor wins so recursive references stay on one
        // handle.
        let mut types = self.types.lock();
        Ok(types.entry((file, offset)).or_insert(ty).clone())
    }

    fn build(
        self: &Arc<Self>,
        file: FileId,
        debug_file: &DebugFile,
        cu: &CompileUnit,
        abbrev: &AbbrevTable,
        die: &Die<'_>,
        depth: usize,
    ) -> Result<Type> {
        match die.tag {
            DW_TAG_BASE_TYPE => self.build_base(die),
            DW_TAG_STRUCTURE_TYPE | DW_TAG_CLASS_TYPE | DW_TAG_UNION_TYPE => {
                self.build_compound(file, debug_file, cu, abbrev, die)
            }
            DW_TAG_ENUMERATION_TYPE => {
                self.build_enumeration(file, debug_file, cu, abbrev, die, depth)
            }
            DW_TAG_TYPEDEF => {
                let name = die_name(die)
                    .ok_or_else(|| Error::DwarfFormat("DW_TAG_typedef has no name".into()))?;
                let aliased = match die.type_ref {
                    Some(aliased) => self.resolve_qualified(file, aliased, depth + 1)?,
                    None => QualifiedType::unqualified(Type::void()),
                };
                let primitive = match name.as_str() {
                    "size_t" => Some(PrimitiveType::SizeT),
                    "ptrdiff_t" => Some(PrimitiveType::PtrdiffT),
                    _ => None,
                };
                Ok(Type::typedef(&name, aliased, primitive))
            }
            DW_TAG_POINTER_TYPE => {
                let size = die
                    .byte_size
                    .unwrap_or(u64::from(self.index.word_size()));
                let referenced = match die.type_ref {
                    Some(referenced) => self.resolve_qualified(file, referenced, depth + 1)?,
                    None => QualifiedType::unqualified(Type::void()),
                };
                Ok(Type::pointer(size, referenced))
            }
            DW_TAG_ARRAY_TYPE => self.build_array(file, debug_file, cu, abbrev, die, depth),
            DW_TAG_SUBROUTINE_TYPE => {
                self.build_function(file, debug_file, cu, abbrev, die, depth)
            }
            tag => Err(Error::DwarfFormat(format!(
                "cannot create type from DWARF tag {tag:#x}"
            ))),
        }
    }

    fn build_base(&self, die: &Die<'_>) -> Result<Type> {
        let name = die_name(die)
            .ok_or_else(|| Error::DwarfFormat("DW_TAG_base_type has no name".into()))?;
        let size = die.byte_size.ok_or_else(|| {
            Error::DwarfFormat("DW_TAG_base_type has no DW_AT_byte_size".into())
        })?;
        let encoding = die.encoding.ok_or_else(|| {
            Error::DwarfFormat("DW_TAG_base_type has no DW_AT_encoding".into())
        })?;
        let primitive = c::parse_specifier_list(&name);
        Ok(match encoding {
            DW_ATE_BOOLEAN => Type::bool_type(
                &name,
                size,
                primitive.filter(|&p| p == PrimitiveType::Bool),
            ),
            DW_ATE_FLOAT => Type::float(
                &name,
                size,
                primitive.filter(|&p| {
                    matches!(
                        p,
                        PrimitiveType::Float | PrimitiveType::Double | PrimitiveType::LongDouble
                    )
                }),
            ),
            DW_ATE_SIGNED | DW_ATE_SIGNED_CHAR => Type::int(&name, size, true, primitive),
            DW_ATE_UNSIGNED | DW_ATE_UNSIGNED_CHAR => {
                Type::int(&name, size, false, primitive)
            }
            encoding => {
                return Err(Error::DwarfFormat(format!(
                    "unknown DWARF encoding {encoding:#x}"
                )))
            }
        })
    }

    fn build_compound(
        self: &Arc<Self>,
        file: FileId,
        debug_file: &DebugFile,
        cu: &CompileUnit,
        abbrev: &AbbrevTable,
        die: &Die<'_>,
    ) -> Result<Type> {
        let tag_name = die_name(die);
        let is_union = die.tag == DW_TAG_UNION_TYPE;
        if die.declaration {
            return Ok(if is_union {
                Type::incomplete_union(tag_name.as_deref())
            } else {
                Type::incomplete_structure(tag_name.as_deref())
            });
        }

        let size = die.byte_size.unwrap_or(0);
        let little_endian = debug_file.little_endian;
        let mut members = Vec::new();
        if die.has_children {
            for_each_child(debug_file, cu, abbrev, die.next, |child| {
                if child.tag != DW_TAG_MEMBER {
                    return Ok(());
                }
                let member_name = die_name(child);
                let type_ref = child.type_ref.ok_or_else(|| {
                    Error::DwarfFormat("member has no DW_AT_type".into())
                })?;
                let bit_offset = member_bit_offset(child, little_endian);
                let bit_field_size = child.bit_size.unwrap_or(0);
                let realizer = Arc::clone(self);
                members.push(Member::new(
                    member_name.as_deref(),
                    LazyType::new(Box::new(move || {
                        realizer.resolve_qualified(file, type_ref, 0)
                    })),
                    bit_offset,
                    bit_field_size,
                ));
                Ok(())
            })?;
        }
        Ok(if is_union {
            Type::union_type(tag_name.as_deref(), size, members)
        } else {
            Type::structure(tag_name.as_deref(), size, members)
        })
    }

    fn build_enumeration(
        self: &Arc<Self>,
        file: FileId,
        debug_file: &DebugFile,
        cu: &CompileUnit,
        abbrev: &AbbrevTable,
        die: &Die<'_>,
        depth: usize,
    ) -> Result<Type> {
        let tag_name = die_name(die);
        if die.declaration {
            return Ok(Type::incomplete_enumeration(tag_name.as_deref()));
        }
        // Older compilers omit the compatible type; assume a signed int of
        // the enumeration's size.
        let compatible = match die.type_ref {
            Some(compatible) => self
                .resolve_qualified(file, compatible, depth + 1)?
                .ty
                .underlying(),
            None => Type::int(
                "int",
                die.byte_size.unwrap_or(4),
                true,
                Some(PrimitiveType::Int),
            ),
        };
        let mut enumerators = Vec::new();
        if die.has_children {
            for_each_child(debug_file, cu, abbrev, die.next, |child| {
                if child.tag != DW_TAG_ENUMERATOR {
                    return Ok(());
                }
                let name = die_name(child).ok_or_else(|| {
                    Error::DwarfFormat("enumerator has no name".into())
                })?;
                enumerators
                    .push(Enumerator::new_unsigned(&name, child.const_value.unwrap_or(0)));
                Ok(())
            })?;
        }
        Ok(Type::enumeration(tag_name.as_deref(), compatible, enumerators))
    }

    fn build_array(
        self: &Arc<Self>,
        file: FileId,
        debug_file: &DebugFile,
        cu: &CompileUnit,
        abbrev: &AbbrevTable,
        die: &Die<'_>,
        depth: usize,
    ) -> Result<Type> {
        let element_ref = die.type_ref.ok_or_else(|| {
            Error::DwarfFormat("DW_TAG_array_type has no element type".into())
        })?;
        let element = self.resolve_qualified(file, element_ref, depth + 1)?;

        // One subrange child per dimension; the last is innermost.
        let mut dimensions: Vec<Option<u64>> = Vec::new();
        if die.has_children {
            for_each_child(debug_file, cu, abbrev, die.next, |child| {
                if child.tag == DW_TAG_SUBRANGE_TYPE {
                    dimensions
                        .push(child.count.or(child.upper_bound.map(|bound| bound + 1)));
                }
                Ok(())
            })?;
        }
        if dimensions.is_empty() {
            dimensions.push(None);
        }
        let mut qualified_type = element;
        for length in dimensions.into_iter().rev() {
            let array = match length {
                Some(length) => Type::array(length, qualified_type),
                None => Type::incomplete_array(qualified_type),
            };
            qualified_type = QualifiedType::unqualified(array);
        }
        Ok(qualified_type.ty)
    }

    fn build_function(
        self: &Arc<Self>,
        file: FileId,
        debug_file: &DebugFile,
        cu: &CompileUnit,
        abbrev: &AbbrevTable,
        die: &Die<'_>,
        depth: usize,
    ) -> Result<Type> {
        let return_type = match die.type_ref {
            Some(return_type) => self.resolve_qualified(file, return_type, depth + 1)?,
            None => QualifiedType::unqualified(Type::void()),
        };
        let mut parameters = Vec::new();
        let mut is_variadic = false;
        if die.has_children {
            for_each_child(debug_file, cu, abbrev, die.next, |child| {
                match child.tag {
                    DW_TAG_FORMAL_PARAMETER => {
                        let name = die_name(child);
                        let type_ref = child.type_ref.ok_or_else(|| {
                            Error::DwarfFormat("parameter has no DW_AT_type".into())
                        })?;
                        let realizer = Arc::clone(self);
                        parameters.push(Parameter::new(
                            name.as_deref(),
                            LazyType::new(Box::new(move || {
                                realizer.resolve_qualified(file, type_ref, 0)
                            })),
                        ));
                    }
                    DW_TAG_UNSPECIFIED_PARAMETERS => is_variadic = true,
                    _ => {}
                }
                Ok(())
            })?;
        }
        Ok(Type::function(return_type, parameters, is_variadic))
    }
}

fn die_name(die: &Die<'_>) -> Option<String> {
    die.name.map(|name| String::from_utf8_lossy(name).into_owned())
}

/// Bit offset of a member from the start of its containing type, covering
/// the modern `DW_AT_data_bit_offset` form and the legacy
/// `DW_AT_bit_offset` form (which counts from the storage unit's most
/// significant bit).
fn member_bit_offset(die: &Die<'_>, little_endian: bool) -> u64 {
    if let Some(data_bit_offset) = die.data_bit_offset {
        return data_bit_offset;
    }
    let byte_bits = die.data_member_location.unwrap_or(0) * 8;
    if let (Some(legacy), Some(bit_size)) = (die.legacy_bit_offset, die.bit_size) {
        let storage_bits = die.byte_size.unwrap_or(0) * 8;
        if little_endian {
            return byte_bits + storage_bits.saturating_sub(legacy + bit_size);
        }
        return byte_bits + legacy;
    }
    byte_bits
}

fn parse_abbrev_table(debug_abbrev: &[u8], offset: u64) -> Result<AbbrevTable> {
    let offset = usize::try_from(offset)
        .ok()
        .filter(|&offset| offset <= debug_abbrev.len())
        .ok_or(Error::DwarfEof)?;
    let mut cursor = Cursor::at(debug_abbrev, offset, false);
    let mut table = AbbrevTable::new();
    loop {
        let code = cursor.read_uleb128()?;
        if code == 0 {
            return Ok(table);
        }
        let tag = cursor.read_uleb128()?;
        let has_children = cursor.read_u8()? != 0;
        let mut attributes = Vec::new();
        loop {
            let attribute = cursor.read_uleb128()?;
            let form = cursor.read_uleb128()?;
            if attribute == 0 && form == 0 {
                break;
            }
            attributes.push((attribute, form));
        }
        table.insert(
            code,
            AbbrevDecl {
                tag,
                has_children,
                attributes,
            },
        );
    }
}

/// The attributes of one DIE that type construction consumes.
#[derive(Default)]
struct Die<'a> {
    tag: u64,
    has_children: bool,
    /// Offset just past the attributes: the first child, or the next
    /// sibling.
    next: usize,
    sibling: Option<usize>,
    name: Option<&'a [u8]>,
    byte_size: Option<u64>,
    encoding: Option<u64>,
    /// Absolute `.debug_info` offset of the referenced type.
    type_ref: Option<usize>,
    data_member_location: Option<u64>,
    data_bit_offset: Option<u64>,
    legacy_bit_offset: Option<u64>,
    bit_size: Option<u64>,
    upper_bound: Option<u64>,
    count: Option<u64>,
    const_value: Option<u64>,
    declaration: bool,
}

enum AttrValue<'a> {
    Unsigned(u64),
    Signed(i64),
    Bytes(&'a [u8]),
    Str(&'a [u8]),
    Reference(usize),
    Flag(bool),
    Skipped,
}

impl<'a> AttrValue<'a> {
    fn unsigned(&self) -> Option<u64> {
        match self {
            AttrValue::Unsigned(value) => Some(*value),
            AttrValue::Signed(value) => Some(*value as u64),
            _ => None,
        }
    }

    fn string(&self) -> Option<&'a [u8]> {
        match self {
            AttrValue::Str(value) => Some(value),
            _ => None,
        }
    }

    fn reference(&self) -> Option<usize> {
        match self {
            AttrValue::Reference(value) => Some(*value),
            _ => None,
        }
    }

    fn bytes(&self) -> Option<&'a [u8]> {
        match self {
            AttrValue::Bytes(value) => Some(value),
            _ => None,
        }
    }

    fn flag(&self) -> bool {
        matches!(self, AttrValue::Flag(true))
    }
}

fn read_form<'a>(
    cursor: &mut Cursor<'a>,
    form: u64,
    cu: &CompileUnit,
    unit: &[u8],
    debug_str: &'a [u8],
) -> Result<AttrValue<'a>> {
    let cu_relative = |value: u64| -> Result<usize> {
        usize::try_from(value)
            .ok()
            .and_then(|value| cu.offset.checked_add(value))
            .filter(|&target| target < cu.end() && target < unit.len())
            .ok_or(Error::DwarfEof)
    };
    Ok(match form {
        DW_FORM_ADDR => {
            cursor.skip(cu.address_size as usize)?;
            AttrValue::Skipped
        }
        DW_FORM_DATA1 => AttrValue::Unsigned(u64::from(cursor.read_u8()?)),
        DW_FORM_DATA2 => AttrValue::Unsigned(u64::from(cursor.read_u16()?)),
        DW_FORM_DATA4 => AttrValue::Unsigned(u64::from(cursor.read_u32()?)),
        DW_FORM_DATA8 => AttrValue::Unsigned(cursor.read_u64()?),
        DW_FORM_SDATA => AttrValue::Signed(cursor.read_sleb128()?),
        DW_FORM_UDATA => AttrValue::Unsigned(cursor.read_uleb128()?),
        DW_FORM_STRING => AttrValue::Str(cursor.read_cstr()?),
        DW_FORM_STRP => {
            let offset = cursor.read_word(cu.is_64_bit)?;
            let offset = usize::try_from(offset).map_err(|_| Error::DwarfEof)?;
            AttrValue::Str(cstr_at(debug_str, offset)?)
        }
        DW_FORM_REF1 => AttrValue::Reference(cu_relative(u64::from(cursor.read_u8()?))?),
        DW_FORM_REF2 => AttrValue::Reference(cu_relative(u64::from(cursor.read_u16()?))?),
        DW_FORM_REF4 => AttrValue::Reference(cu_relative(u64::from(cursor.read_u32()?))?),
        DW_FORM_REF8 => AttrValue::Reference(cu_relative(cursor.read_u64()?)?),
        DW_FORM_REF_UDATA => AttrValue::Reference(cu_relative(cursor.read_uleb128()?)?),
        DW_FORM_REF_ADDR => {
            let offset = cursor.read_word(cu.is_64_bit)?;
            AttrValue::Reference(usize::try_from(offset).map_err(|_| Error::DwarfEof)?)
        }
        DW_FORM_SEC_OFFSET => AttrValue::Unsigned(cursor.read_word(cu.is_64_bit)?),
        DW_FORM_EXPRLOC | DW_FORM_BLOCK => {
            let len = cursor.read_uleb128_into_usize()?;
            AttrValue::Bytes(cursor.read_bytes(len)?)
        }
        DW_FORM_BLOCK1 => {
            let len = cursor.read_u8()?;
            AttrValue::Bytes(cursor.read_bytes(len as usize)?)
        }
        DW_FORM_BLOCK2 => {
            let len = cursor.read_u16()?;
            AttrValue::Bytes(cursor.read_bytes(len as usize)?)
        }
        DW_FORM_BLOCK4 => {
            let len = cursor.read_u32()?;
            AttrValue::Bytes(cursor.read_bytes(len as usize)?)
        }
        DW_FORM_FLAG => AttrValue::Flag(cursor.read_u8()? != 0),
        DW_FORM_FLAG_PRESENT => AttrValue::Flag(true),
        DW_FORM_REF_SIG8 => {
            cursor.skip(8)?;
            AttrValue::Skipped
        }
        DW_FORM_INDIRECT => {
            return Err(Error::DwarfFormat(
                "DW_FORM_indirect is not implemented".into(),
            ))
        }
        form => {
            return Err(Error::DwarfFormat(format!(
                "unknown attribute form {form}"
            )))
        }
    })
}

/// `DW_AT_data_member_location` as a location expression is almost always
/// `DW_OP_plus_uconst <offset>`.
fn member_location_from_block(block: &[u8]) -> Option<u64> {
    let mut cursor = Cursor::new(block, false);
    if cursor.read_u8().ok()? != DW_OP_PLUS_UCONST {
        return None;
    }
    cursor.read_uleb128().ok()
}

/// Parses the DIE at `offset` with its attribute values. `None` is a null
/// entry.
fn parse_die<'a>(
    file: &'a DebugFile,
    cu: &CompileUnit,
    abbrev: &AbbrevTable,
    offset: usize,
) -> Result<Option<Die<'a>>> {
    let debug_info = file.section(SectionId::DebugInfo);
    let end = cu.end().min(debug_info.len());
    let unit = &debug_info[..end];
    let debug_str = file.section(SectionId::DebugStr);

    let mut cursor = Cursor::at(unit, offset, file.bswap);
    let code = cursor.read_uleb128()?;
    if code == 0 {
        return Ok(None);
    }
    let decl = abbrev
        .get(&code)
        .ok_or_else(|| Error::DwarfFormat(format!("unknown abbreviation code {code}")))?;

    let mut die = Die {
        tag: decl.tag,
        has_children: decl.has_children,
        ..Die::default()
    };
    for &(attribute, form) in &decl.attributes {
        let value = read_form(&mut cursor, form, cu, unit, debug_str)?;
        match attribute {
            DW_AT_SIBLING => die.sibling = value.reference(),
            DW_AT_NAME => die.name = value.string(),
            DW_AT_BYTE_SIZE => die.byte_size = value.unsigned(),
            DW_AT_ENCODING => die.encoding = value.unsigned(),
            DW_AT_TYPE => die.type_ref = value.reference(),
            DW_AT_DATA_MEMBER_LOCATION => {
                die.data_member_location = value
                    .unsigned()
                    .or_else(|| value.bytes().and_then(member_location_from_block));
            }
            DW_AT_DATA_BIT_OFFSET => die.data_bit_offset = value.unsigned(),
            DW_AT_BIT_OFFSET => die.legacy_bit_offset = value.unsigned(),
            DW_AT_BIT_SIZE => die.bit_size = value.unsigned(),
            DW_AT_UPPER_BOUND => die.upper_bound = value.unsigned(),
            DW_AT_COUNT => die.count = value.unsigned(),
            DW_AT_CONST_VALUE => die.const_value = value.unsigned(),
            DW_AT_DECLARATION => die.declaration = value.flag(),
            _ => {}
        }
    }
    die.next = cursor.pos();
    Ok(Some(die))
}

/// Calls `f` for each direct child of the DIE whose children start at
/// `start`, skipping grandchildren.
fn for_each_child<'a>(
    file: &'a DebugFile,
    cu: &CompileUnit,
    abbrev: &AbbrevTable,
    start: usize,
    mut f: impl FnMut(&Die<'a>) -> Result<()>,
) -> Result<()> {
    let mut pos = start;
    loop {
        let Some(die) = parse_die(file, cu, abbrev, pos)? else {
            return Ok(());
        };
        f(&die)?;
        pos = if !die.has_children {
            die.next
        } else if let Some(sibling) = die.sibling {
            sibling
        } else {
            skip_subtree(file, cu, abbrev, die.next)?
        };
    }
}

/// Advances past a DIE's children, returning the offset of its sibling.
fn skip_subtree(
    file: &DebugFile,
    cu: &CompileUnit,
    abbrev: &AbbrevTable,
    mut pos: usize,
) -> Result<usize> {
    let mut depth = 1usize;
    while depth > 0 {
        match parse_die(file, cu, abbrev, pos)? {
            None => {
                depth -= 1;
                pos += 1;
            }
            Some(die) => {
                pos = if !die.has_children {
                    die.next
                } else if let Some(sibling) = die.sibling {
                    sibling
                } else {
                    depth += 1;
                    die.next
                };
            }
        }
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DwarfIndex, IndexFlags};
    use crate::memory::EmptyReader;
    use crate::program::Program;
    use crate::test::image;
    use crate::ty::Kind;

    /// One compile unit with base types, structs (one recursive, one with
    /// bit fields), a typedef, and an enum.
    fn sample_index() -> Arc<DwarfIndex> {
        let abbrev = image::AbbrevBuilder::new()
            .decl(DW_TAG_COMPILE_UNIT, true)
            .finish_decl()
            .decl(DW_TAG_BASE_TYPE, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_BYTE_SIZE, DW_FORM_DATA1)
            .attr(DW_AT_ENCODING, DW_FORM_DATA1)
            .finish_decl()
            .decl(DW_TAG_STRUCTURE_TYPE, true)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_BYTE_SIZE, DW_FORM_DATA1)
            .finish_decl()
            .decl(DW_TAG_MEMBER, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_DATA_MEMBER_LOCATION, DW_FORM_DATA1)
            .attr(DW_AT_TYPE, DW_FORM_REF4)
            .finish_decl()
            .decl(DW_TAG_TYPEDEF, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_TYPE, DW_FORM_REF4)
            .finish_decl()
            .decl(DW_TAG_ENUMERATION_TYPE, true)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_BYTE_SIZE, DW_FORM_DATA1)
            .finish_decl()
            .decl(DW_TAG_ENUMERATOR, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_CONST_VALUE, DW_FORM_SDATA)
            .finish_decl()
            .decl(DW_TAG_POINTER_TYPE, false)
            .attr(DW_AT_BYTE_SIZE, DW_FORM_DATA1)
            .attr(DW_AT_TYPE, DW_FORM_REF4)
            .finish_decl()
            .decl(DW_TAG_MEMBER, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_TYPE, DW_FORM_REF4)
            .attr(DW_AT_BIT_SIZE, DW_FORM_DATA1)
            .attr(DW_AT_DATA_BIT_OFFSET, DW_FORM_DATA1)
            .finish_decl()
            .build();

        let mut cu = image::CuBuilder::new();
        cu.die(1);
        let int_off = cu.offset() as u32;
        cu.die(2).cstr(b"int").u8(4).u8(DW_ATE_SIGNED as u8);
        let char_off = cu.offset() as u32;
        cu.die(2).cstr(b"char").u8(1).u8(DW_ATE_SIGNED_CHAR as u8);
        cu.die(3).cstr(b"point").u8(8);
        cu.die(4).cstr(b"x").u8(0).u32(int_off);
        cu.die(4).cstr(b"y").u8(4).u32(int_off);
        cu.null();
        let node_off = cu.offset() as u32;
        cu.die(3).cstr(b"node").u8(8);
        cu.die(4).cstr(b"next").u8(0);
        let next_ref = cu.u32_placeholder();
        cu.null();
        let ptr_off = cu.offset() as u32;
        cu.die(8).u8(8).u32(node_off);
        cu.patch_u32(next_ref, ptr_off);
        cu.die(5).cstr(b"myint").u32(int_off);
        cu.die(6).cstr(b"color").u8(4);
        cu.die(7).cstr(b"RED").u8(0);
        cu.die(7).cstr(b"GREEN").u8(1);
        cu.null();
        cu.die(3).cstr(b"S").u8(8);
        cu.die(4).cstr(b"a").u8(0).u32(int_off);
        cu.die(9).cstr(b"b").u32(char_off).u8(3).u8(32);
        cu.die(9).cstr(b"c").u32(char_off).u8(5).u8(40);
        cu.null();
        cu.null();

        let elf = image::ElfImage::new()
            .section(".debug_abbrev", abbrev)
            .section(".debug_info", cu.build())
            .section(".debug_str", vec![0])
            .build();
        let mut index = DwarfIndex::new(IndexFlags::TYPES).unwrap();
        index.open_image(&elf).unwrap();
        index.update().unwrap();
        Arc::new(index)
    }

    fn sample_program() -> Program {
        let mut prog = Program::new(8, true, Box::new(EmptyReader));
        prog.types_mut()
            .register_finder(Box::new(DwarfTypeFinder::new(sample_index())));
        prog
    }

    #[test]
    fn index_entries_realize_directly() {
        let index = sample_index();
        let finder = DwarfTypeFinder::new(index.clone());
        let entry = index
            .lookup("point", &[DW_TAG_STRUCTURE_TYPE])
            .next()
            .unwrap();
        let ty = finder.realize(&entry).unwrap();
        assert_eq!(ty.kind(), Kind::Struct);
        assert_eq!(ty.tag(), Some("point"));
    }

    #[test]
    fn realizes_struct_definitions() {
        let prog = sample_program();
        let point = prog.find_type("struct point", None).unwrap();
        assert_eq!(point.ty.kind(), Kind::Struct);
        assert!(point.ty.is_complete());
        assert_eq!(point.ty.sizeof().unwrap(), 8);
        assert_eq!(
            c::format_type(&point).unwrap(),
            "struct point {\n\tint x;\n\tint y;\n}"
        );
    }

    #[test]
    fn member_offsets_and_bit_fields_come_from_dwarf() {
        let prog = sample_program();
        let s = prog.find_type("struct S", None).unwrap();
        let info = s.ty.member_info("c").unwrap();
        assert_eq!(info.qualified_type.ty.name(), "char");
        assert_eq!(info.bit_offset, 40);
        assert_eq!(info.bit_field_size, 5);
        assert_eq!(c::bit_offset(&s.ty, "c").unwrap(), 40);
        assert_eq!(c::bit_offset(&s.ty, "a").unwrap(), 0);
    }

    #[test]
    fn recursive_structs_resolve_to_the_same_handle() {
        let prog = sample_program();
        let node = prog.find_type("struct node", None).unwrap();
        let next = node.ty.member_info("next").unwrap();
        assert_eq!(next.qualified_type.ty.kind(), Kind::Pointer);
        let referenced = next.qualified_type.ty.wrapped_type();
        assert!(Type::ptr_eq(&referenced.ty, &node.ty));
    }

    #[test]
    fn typedefs_and_enums_realize() {
        let prog = sample_program();
        let myint = prog.find_type("myint", None).unwrap();
        assert_eq!(myint.ty.kind(), Kind::Typedef);
        assert_eq!(myint.ty.underlying().primitive(), Some(PrimitiveType::Int));

        let color = prog.find_type("enum color", None).unwrap();
        assert!(color.ty.is_signed());
        assert_eq!(color.ty.enumerators().len(), 2);
        assert_eq!(&*color.ty.enumerators()[1].name, "GREEN");
        assert_eq!(color.ty.enumerators()[1].signed_value(), 1);
    }

    #[test]
    fn declarators_compose_with_realized_types() {
        let prog = sample_program();
        let qualified_type = prog.find_type("const struct point *[2]", None).unwrap();
        assert_eq!(
            c::type_name(&qualified_type).unwrap(),
            "const struct point *[2]"
        );
    }

    #[test]
    fn unknown_names_are_lookup_errors() {
        let prog = sample_program();
        let err = prog.find_type("struct missing", None).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Lookup);
    }
}
