//! Compile-unit parsing and the depth-tracked DIE walk.

use crate::elf::{DebugFile, SectionId};
use crate::error::{Error, Result};
use crate::index::abbrev::{self, AbbrevTable, TAG_FLAG_CHILDREN, TAG_FLAG_DECLARATION, TAG_MASK};
use crate::index::consts::*;
use crate::index::path;
use crate::index::IndexFlags;
use crate::reader::{cstr_at, Cursor};

#[derive(Debug, Clone)]
pub(crate) struct CompileUnit {
    /// Index of the owning file in the index's file table.
    pub file: usize,
    /// Offset of the unit header in `.debug_info`.
    pub offset: usize,
    pub unit_length: u64,
    pub version: u16,
    pub debug_abbrev_offset: u64,
    pub address_size: u8,
    pub is_64_bit: bool,
}

impl CompileUnit {
    /// One past the end of the unit in `.debug_info`. The unit length counts
    /// the bytes after the initial length field.
    pub(crate) fn end(&self) -> usize {
        self.offset + self.header_prefix() + self.unit_length as usize
    }

    /// Bytes occupied by the initial length field.
    fn header_prefix(&self) -> usize {
        if self.is_64_bit {
            12
        } else {
            4
        }
    }

    /// Bytes from the start of the unit to the first DIE.
    fn header_size(&self) -> usize {
        if self.is_64_bit {
            23
        } else {
            11
        }
    }
}

fn read_cu_header(cursor: &mut Cursor<'_>, cu: &mut CompileUnit) -> Result<()> {
    let initial = cursor.read_u32()?;
    cu.is_64_bit = initial == 0xffff_ffff;
    cu.unit_length = if cu.is_64_bit {
        cursor.read_u64()?
    } else {
        u64::from(initial)
    };

    cu.version = cursor.read_u16()?;
    if !(2..=4).contains(&cu.version) {
        return Err(Error::DwarfFormat(format!(
            "unknown DWARF CU version {}",
            cu.version
        )));
    }

    cu.debug_abbrev_offset = cursor.read_word(cu.is_64_bit)?;
    cu.address_size = cursor.read_u8()?;
    Ok(())
}

/// Collects the compile units of one file. Single-threaded; the expensive
/// per-unit walk is parallelized by the caller.
pub(crate) fn read_cus(file: &DebugFile, file_index: usize) -> Result<Vec<CompileUnit>> {
    let debug_info = file.section(SectionId::DebugInfo);
    let mut cursor = Cursor::new(debug_info, file.bswap);
    let mut cus = Vec::new();
    while !cursor.is_empty() {
        let mut cu = CompileUnit {
            file: file_index,
            offset: cursor.pos(),
            unit_length: 0,
            version: 0,
            debug_abbrev_offset: 0,
            address_size: 0,
            is_64_bit: false,
        };
        read_cu_header(&mut cursor, &mut cu)?;
        let next = cu
            .offset
            .checked_add(cu.header_prefix())
            .and_then(|p| p.checked_add(usize::try_from(cu.unit_length).ok()?))
            .ok_or(Error::DwarfEof)?;
        if next > debug_info.len() {
            return Err(Error::DwarfEof);
        }
        cursor.set_pos(next);
        cus.push(cu);
    }
    Ok(cus)
}

/// Per-unit table of source-file-name hashes from the line-number program
/// header. Index zero of `DW_AT_decl_file` means "no declared file".
#[derive(Default, Debug)]
struct FileNameTable {
    hashes: Vec<u64>,
}

fn skip_lnp_header(cursor: &mut Cursor<'_>) -> Result<()> {
    let initial = cursor.read_u32()?;
    let is_64_bit = initial == 0xffff_ffff;
    if is_64_bit {
        cursor.skip(8)?;
    }

    let version = cursor.read_u16()?;
    if !(2..=4).contains(&version) {
        return Err(Error::DwarfFormat(format!(
            "unknown DWARF LNP version {version}"
        )));
    }

    // header_length, minimum_instruction_length,
    // maximum_operations_per_instruction (DWARF 4 only), default_is_stmt,
    // line_base, line_range.
    cursor.skip(if is_64_bit { 8 } else { 4 })?;
    cursor.skip(4 + usize::from(version >= 4))?;

    let opcode_base = cursor.read_u8()?;
    cursor.skip(usize::from(opcode_base).saturating_sub(1))?;
    Ok(())
}

fn read_file_name_table(file: &DebugFile, stmt_list: u64) -> Result<FileNameTable> {
    let debug_line = file.section(SectionId::DebugLine);
    let offset = usize::try_from(stmt_list)
        .ok()
        .filter(|&o| o <= debug_line.len())
        .ok_or(Error::DwarfEof)?;
    let mut cursor = Cursor::at(debug_line, offset, file.bswap);
    skip_lnp_header(&mut cursor)?;

    let mut directories = Vec::new();
    loop {
        let dir = cursor.read_cstr()?;
        if dir.is_empty() {
            break;
        }
        directories.push(path::hash_directory(dir));
    }

    let mut table = FileNameTable::default();
    loop {
        let name = cursor.read_cstr()?;
        if name.is_empty() {
            break;
        }
        let directory_index = cursor.read_uleb128()?;
        // mtime, size
        cursor.skip_leb128()?;
        cursor.skip_leb128()?;

        if directory_index > directories.len() as u64 {
            return Err(Error::DwarfFormat(format!(
                "directory index {directory_index} is invalid"
            )));
        }
        let directory = if directory_index > 0 {
            Some(&directories[directory_index as usize - 1])
        } else {
            None
        };
        table.hashes.push(path::hash_file(directory, name));
    }
    Ok(table)
}

/// The attributes of one DIE the walk cares about.
#[derive(Default)]
struct Die<'a> {
    sibling: Option<usize>,
    name: Option<&'a [u8]>,
    stmt_list: Option<u64>,
    decl_file: u64,
    specification: Option<usize>,
    flags: u8,
}

/// Parses one DIE by running its compiled instruction stream. Returns `None`
/// at a null entry.
fn read_die<'a>(
    cu: &CompileUnit,
    abbrev: &AbbrevTable,
    cursor: &mut Cursor<'a>,
    debug_info: &'a [u8],
    debug_str: &'a [u8],
) -> Result<Option<Die<'a>>> {
    let code = cursor.read_uleb128()?;
    if code == 0 {
        return Ok(None);
    }
    let mut insns = abbrev.insns_for(code)?.iter();

    let mut die = Die::default();
    loop {
        let insn = *insns.next().ok_or(Error::DwarfEof)?;
        if insn == 0 {
            break;
        }
        match insn {
            abbrev::ATTRIB_BLOCK1 => {
                let len = cursor.read_u8()?;
                cursor.skip(len as usize)?;
            }
            abbrev::ATTRIB_BLOCK2 => {
                let len = cursor.read_u16()?;
                cursor.skip(len as usize)?;
            }
            abbrev::ATTRIB_BLOCK4 => {
                let len = cursor.read_u32()?;
                cursor.skip(len as usize)?;
            }
            abbrev::ATTRIB_EXPRLOC => {
                let len = cursor.read_uleb128_into_usize()?;
                cursor.skip(len)?;
            }
            abbrev::ATTRIB_LEB128 => cursor.skip_leb128()?,
            abbrev::ATTRIB_NAME_STRING => die.name = Some(cursor.read_cstr()?),
            abbrev::ATTRIB_STRING => cursor.skip_cstr()?,
            abbrev::ATTRIB_SIBLING_REF1
            | abbrev::ATTRIB_SIBLING_REF2
            | abbrev::ATTRIB_SIBLING_REF4
            | abbrev::ATTRIB_SIBLING_REF8
            | abbrev::ATTRIB_SIBLING_REF_UDATA => {
                let value = match insn {
                    abbrev::ATTRIB_SIBLING_REF1 => u64::from(cursor.read_u8()?),
                    abbrev::ATTRIB_SIBLING_REF2 => u64::from(cursor.read_u16()?),
                    abbrev::ATTRIB_SIBLING_REF4 => u64::from(cursor.read_u32()?),
                    abbrev::ATTRIB_SIBLING_REF8 => cursor.read_u64()?,
                    _ => cursor.read_uleb128()?,
                };
                die.sibling = Some(cu_relative(cu, value, debug_info)?);
            }
            abbrev::ATTRIB_NAME_STRP4 | abbrev::ATTRIB_NAME_STRP8 => {
                let offset = if insn == abbrev::ATTRIB_NAME_STRP4 {
                    u64::from(cursor.read_u32()?)
                } else {
                    cursor.read_u64()?
                };
                let offset = usize::try_from(offset).map_err(|_| Error::DwarfEof)?;
                die.name = Some(cstr_at(debug_str, offset)?);
            }
            abbrev::ATTRIB_STMT_LIST_LINEPTR4 => {
                die.stmt_list = Some(u64::from(cursor.read_u32()?));
            }
            abbrev::ATTRIB_STMT_LIST_LINEPTR8 => {
                die.stmt_list = Some(cursor.read_u64()?);
            }
            abbrev::ATTRIB_DECL_FILE_DATA1 => die.decl_file = u64::from(cursor.read_u8()?),
            abbrev::ATTRIB_DECL_FILE_DATA2 => die.decl_file = u64::from(cursor.read_u16()?),
            abbrev::ATTRIB_DECL_FILE_DATA4 => die.decl_file = u64::from(cursor.read_u32()?),
            abbrev::ATTRIB_DECL_FILE_DATA8 => die.decl_file = cursor.read_u64()?,
            abbrev::ATTRIB_DECL_FILE_UDATA => die.decl_file = cursor.read_uleb128()?,
            abbrev::ATTRIB_SPECIFICATION_REF1
            | abbrev::ATTRIB_SPECIFICATION_REF2
            | abbrev::ATTRIB_SPECIFICATION_REF4
            | abbrev::ATTRIB_SPECIFICATION_REF8
            | abbrev::ATTRIB_SPECIFICATION_REF_UDATA => {
                let value = match insn {
                    abbrev::ATTRIB_SPECIFICATION_REF1 => u64::from(cursor.read_u8()?),
                    abbrev::ATTRIB_SPECIFICATION_REF2 => u64::from(cursor.read_u16()?),
                    abbrev::ATTRIB_SPECIFICATION_REF4 => u64::from(cursor.read_u32()?),
                    abbrev::ATTRIB_SPECIFICATION_REF8 => cursor.read_u64()?,
                    _ => cursor.read_uleb128()?,
                };
                die.specification = Some(cu_relative(cu, value, debug_info)?);
            }
            skip => cursor.skip(skip as usize)?,
        }
    }

    die.flags = *insns.next().ok_or(Error::DwarfEof)?;
    Ok(Some(die))
}

fn cu_relative(cu: &CompileUnit, value: u64, debug_info: &[u8]) -> Result<usize> {
    let offset = usize::try_from(value)
        .ok()
        .and_then(|v| cu.offset.checked_add(v))
        .filter(|&o| o <= cu.end() && o <= debug_info.len())
        .ok_or(Error::DwarfEof)?;
    Ok(offset)
}

/// Walks one compile unit and feeds every indexable top-level definition to
/// `insert` as `(name, tag, file_name_hash, die_offset)`.
///
/// Enumerators are special-cased: they are indexed under the enclosing
/// enumeration type's offset so that resolution lands on the enumeration.
pub(crate) fn index_cu(
    flags: IndexFlags,
    file: &DebugFile,
    cu: &CompileUnit,
    insert: &mut dyn FnMut(&[u8], u64, u64, u64) -> Result<()>,
) -> Result<()> {
    let debug_info = file.section(SectionId::DebugInfo);
    let debug_str = file.section(SectionId::DebugStr);
    let has_debug_line = !file.section(SectionId::DebugLine).is_empty();
    let abbrev = abbrev::compile(
        flags,
        file.section(SectionId::DebugAbbrev),
        has_debug_line,
        cu,
    )?;

    let end = cu.end().min(debug_info.len());
    let unit = &debug_info[..end];
    let mut cursor = Cursor::at(unit, cu.offset + cu.header_size(), file.bswap);

    let mut file_name_table = FileNameTable::default();
    let mut depth = 0usize;
    let mut enum_die_offset = 0u64;

    loop {
        let die_offset = cursor.pos() as u64;
        let Some(die) = read_die(cu, &abbrev, &mut cursor, unit, debug_str)? else {
            depth = depth
                .checked_sub(1)
                .ok_or_else(|| Error::DwarfFormat("unbalanced DIE tree".into()))?;
            if depth == 1 {
                enum_die_offset = 0;
            } else if depth == 0 {
                break;
            }
            continue;
        };

        let tag = u64::from(die.flags & TAG_MASK);
        if tag == DW_TAG_COMPILE_UNIT {
            if depth == 0 {
                if let Some(stmt_list) = die.stmt_list {
                    file_name_table = read_file_name_table(file, stmt_list)?;
                }
            }
        } else if tag != 0 && die.flags & TAG_FLAG_DECLARATION == 0 {
            let mut die_offset = die_offset;
            let mut indexable = true;
            if depth == 1 && tag == DW_TAG_ENUMERATION_TYPE {
                enum_die_offset = die_offset;
            } else if depth == 2 && tag == DW_TAG_ENUMERATOR && enum_die_offset != 0 {
                // The enumerator is filed under the enumeration's DIE.
                die_offset = enum_die_offset;
            } else if depth != 1 {
                indexable = false;
            }

            if indexable {
                let mut name = die.name;
                let mut decl_file = die.decl_file;
                if let Some(specification) = die.specification {
                    if name.is_none() || decl_file == 0 {
                        // Exactly one level of indirection.
                        let mut decl_cursor = Cursor::at(unit, specification, file.bswap);
                        let decl =
                            read_die(cu, &abbrev, &mut decl_cursor, unit, debug_str)?
                                .ok_or_else(|| {
                                    Error::DwarfFormat(
                                        "specification references a null DIE".into(),
                                    )
                                })?;
                        if name.is_none() {
                            name = decl.name;
                        }
                        if decl_file == 0 {
                            decl_file = decl.decl_file;
                        }
                    }
                }

                if let Some(name) = name {
                    if decl_file > file_name_table.hashes.len() as u64 {
                        return Err(Error::DwarfFormat(format!(
                            "invalid DW_AT_decl_file {decl_file}"
                        )));
                    }
                    let file_name_hash = if decl_file > 0 {
                        file_name_table.hashes[decl_file as usize - 1]
                    } else {
                        0
                    };
                    insert(name, tag, file_name_hash, die_offset)?;
                }
            }
        }

        if die.flags & TAG_FLAG_CHILDREN != 0 {
            if let Some(sibling) = die.sibling {
                cursor.set_pos(sibling);
            } else {
                depth += 1;
            }
        } else if depth == 0 {
            break;
        }
    }
    Ok(())
}
