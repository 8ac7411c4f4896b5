//! The abbreviation compiler.
//!
//! Interpreting the DWARF abbreviation table once per DIE is far too slow
//! for whole-file scans, so each abbreviation code is compiled once into a
//! compact instruction stream. An instruction byte `1..=229` skips that many
//! bytes of attribute payload (consecutive skips are coalesced up to the
//! cap); the remaining byte values name a specific attribute parse. Each
//! stream is terminated by a zero byte followed by a flags byte that packs
//! the DWARF tag into its low six bits.

use crate::error::{Error, Result};
use crate::index::consts::*;
use crate::index::cu::CompileUnit;
use crate::index::IndexFlags;
use crate::reader::Cursor;

pub(crate) const INSN_MAX_SKIP: u8 = 229;

pub(crate) const ATTRIB_BLOCK1: u8 = 230;
pub(crate) const ATTRIB_BLOCK2: u8 = 231;
pub(crate) const ATTRIB_BLOCK4: u8 = 232;
pub(crate) const ATTRIB_EXPRLOC: u8 = 233;
pub(crate) const ATTRIB_LEB128: u8 = 234;
pub(crate) const ATTRIB_STRING: u8 = 235;
pub(crate) const ATTRIB_SIBLING_REF1: u8 = 236;
pub(crate) const ATTRIB_SIBLING_REF2: u8 = 237;
pub(crate) const ATTRIB_SIBLING_REF4: u8 = 238;
pub(crate) const ATTRIB_SIBLING_REF8: u8 = 239;
pub(crate) const ATTRIB_SIBLING_REF_UDATA: u8 = 240;
pub(crate) const ATTRIB_NAME_STRP4: u8 = 241;
pub(crate) const ATTRIB_NAME_STRP8: u8 = 242;
pub(crate) const ATTRIB_NAME_STRING: u8 = 243;
pub(crate) const ATTRIB_STMT_LIST_LINEPTR4: u8 = 244;
pub(crate) const ATTRIB_STMT_LIST_LINEPTR8: u8 = 245;
pub(crate) const ATTRIB_DECL_FILE_DATA1: u8 = 246;
pub(crate) const ATTRIB_DECL_FILE_DATA2: u8 = 247;
pub(crate) const ATTRIB_DECL_FILE_DATA4: u8 = 248;
pub(crate) const ATTRIB_DECL_FILE_DATA8: u8 = 249;
pub(crate) const ATTRIB_DECL_FILE_UDATA: u8 = 250;
pub(crate) const ATTRIB_SPECIFICATION_REF1: u8 = 251;
pub(crate) const ATTRIB_SPECIFICATION_REF2: u8 = 252;
pub(crate) const ATTRIB_SPECIFICATION_REF4: u8 = 253;
pub(crate) const ATTRIB_SPECIFICATION_REF8: u8 = 254;
pub(crate) const ATTRIB_SPECIFICATION_REF_UDATA: u8 = 255;

/// The tags we record fit in six bits; the top two carry DIE flags.
pub(crate) const TAG_MASK: u8 = 0x3f;
pub(crate) const TAG_FLAG_DECLARATION: u8 = 0x40;
pub(crate) const TAG_FLAG_CHILDREN: u8 = 0x80;

fn is_type_tag(tag: u64) -> bool {
    matches!(
        tag,
        DW_TAG_BASE_TYPE
            | DW_TAG_CLASS_TYPE
            | DW_TAG_ENUMERATION_TYPE
            | DW_TAG_STRUCTURE_TYPE
            | DW_TAG_TYPEDEF
            | DW_TAG_UNION_TYPE
    )
}

#[derive(Debug)]
pub(crate) struct AbbrevTable {
    /// Indexed by abbreviation code minus one: the start of that code's
    /// instruction stream in `insns`. Codes are required to be sequential
    /// from one, which is what GCC emits in practice.
    decls: Vec<u32>,
    insns: Vec<u8>,
}

impl AbbrevTable {
    pub fn insns_for(&self, code: u64) -> Result<&[u8]> {
        let index = code
            .checked_sub(1)
            .and_then(|c| usize::try_from(c).ok())
            .filter(|&c| c < self.decls.len())
            .ok_or_else(|| {
                Error::DwarfFormat(format!("unknown abbreviation code {code}"))
            })?;
        Ok(&self.insns[self.decls[index] as usize..])
    }
}

struct Compiler<'a> {
    flags: IndexFlags,
    cu: &'a CompileUnit,
    has_debug_line: bool,
    table: AbbrevTable,
    /// Whether the last appended instruction may still be extended by
    /// coalescing another skip into it.
    first: bool,
}

impl Compiler<'_> {
    fn append(&mut self, insn: u8) {
        self.first = false;
        self.table.insns.push(insn);
    }

    fn append_skip(&mut self, insn: u8) {
        if !self.first {
            if let Some(last) = self.table.insns.last_mut() {
                if *last < INSN_MAX_SKIP {
                    let total = u16::from(*last) + u16::from(insn);
                    if total <= u16::from(INSN_MAX_SKIP) {
                        *last = total as u8;
                        return;
                    }
                    let carry = (total - u16::from(INSN_MAX_SKIP)) as u8;
                    *last = INSN_MAX_SKIP;
                    self.append(carry);
                    return;
                }
            }
        }
        self.append(insn);
    }

    /// Compiles one abbreviation declaration; returns `false` on the table
    /// terminator.
    fn read_decl(&mut self, cursor: &mut Cursor<'_>) -> Result<bool> {
        let code = cursor.read_uleb128()?;
        if code == 0 {
            return Ok(false);
        }
        if code != self.table.decls.len() as u64 + 1 {
            return Err(Error::DwarfFormat(
                "DWARF abbreviation table is not sequential".into(),
            ));
        }
        self.table.decls.push(self.table.insns.len() as u32);

        let tag = cursor.read_uleb128()?;
        let flags = self.flags;
        let should_index = (flags.contains(IndexFlags::TYPES) && is_type_tag(tag))
            || (flags.contains(IndexFlags::VARIABLES) && tag == DW_TAG_VARIABLE)
            || (flags.contains(IndexFlags::ENUMERATORS) && tag == DW_TAG_ENUMERATOR)
            || (flags.contains(IndexFlags::FUNCTIONS) && tag == DW_TAG_SUBPROGRAM);
        let mut die_flags = if should_index
            || tag == DW_TAG_COMPILE_UNIT
            || (flags.contains(IndexFlags::ENUMERATORS) && tag == DW_TAG_ENUMERATION_TYPE)
        {
            tag as u8 & TAG_MASK
        } else {
            0
        };

        if cursor.read_u8()? != 0 {
            die_flags |= TAG_FLAG_CHILDREN;
        }

        self.first = true;
        loop {
            let name = cursor.read_uleb128()?;
            let form = cursor.read_uleb128()?;
            if name == 0 && form == 0 {
                break;
            }

            // When enumerators are indexed we must descend into enumeration
            // types to reach their children, so the sibling shortcut is
            // dropped for those DIEs.
            if name == DW_AT_SIBLING
                && !(self.flags.contains(IndexFlags::ENUMERATORS)
                    && tag == DW_TAG_ENUMERATION_TYPE)
            {
                match form {
                    DW_FORM_REF1 => {
                        self.append(ATTRIB_SIBLING_REF1);
                        continue;
                    }
                    DW_FORM_REF2 => {
                        self.append(ATTRIB_SIBLING_REF2);
                        continue;
                    }
                    DW_FORM_REF4 => {
                        self.append(ATTRIB_SIBLING_REF4);
                        continue;
                    }
                    DW_FORM_REF8 => {
                        self.append(ATTRIB_SIBLING_REF8);
                        continue;
                    }
                    DW_FORM_REF_UDATA => {
                        self.append(ATTRIB_SIBLING_REF_UDATA);
                        continue;
                    }
                    _ => {}
                }
            } else if name == DW_AT_NAME && should_index {
                match form {
                    DW_FORM_STRP => {
                        self.append(if self.cu.is_64_bit {
                            ATTRIB_NAME_STRP8
                        } else {
                            ATTRIB_NAME_STRP4
                        });
                        continue;
                    }
                    DW_FORM_STRING => {
                        self.append(ATTRIB_NAME_STRING);
                        continue;
                    }
                    _ => {}
                }
            } else if name == DW_AT_STMT_LIST
                && tag == DW_TAG_COMPILE_UNIT
                && self.has_debug_line
            {
                match form {
                    DW_FORM_DATA4 => {
                        self.append(ATTRIB_STMT_LIST_LINEPTR4);
                        continue;
                    }
                    DW_FORM_DATA8 => {
                        self.append(ATTRIB_STMT_LIST_LINEPTR8);
                        continue;
                    }
                    DW_FORM_SEC_OFFSET => {
                        self.append(if self.cu.is_64_bit {
                            ATTRIB_STMT_LIST_LINEPTR8
                        } else {
                            ATTRIB_STMT_LIST_LINEPTR4
                        });
                        continue;
                    }
                    _ => {}
                }
            } else if name == DW_AT_DECL_FILE && should_index {
                match form {
                    DW_FORM_DATA1 => {
                        self.append(ATTRIB_DECL_FILE_DATA1);
                        continue;
                    }
                    DW_FORM_DATA2 => {
                        self.append(ATTRIB_DECL_FILE_DATA2);
                        continue;
                    }
                    DW_FORM_DATA4 => {
                        self.append(ATTRIB_DECL_FILE_DATA4);
                        continue;
                    }
                    DW_FORM_DATA8 => {
                        self.append(ATTRIB_DECL_FILE_DATA8);
                        continue;
                    }
                    // decl_file is positive, so a compiler that chose sdata
                    // can be read as udata.
                    DW_FORM_SDATA | DW_FORM_UDATA => {
                        self.append(ATTRIB_DECL_FILE_UDATA);
                        continue;
                    }
                    _ => {}
                }
            } else if name == DW_AT_DECLARATION {
                // In practice this is DW_FORM_flag_present; a literal
                // DW_FORM_flag with value zero would be misread as set.
                die_flags |= TAG_FLAG_DECLARATION;
            } else if name == DW_AT_SPECIFICATION && should_index {
                match form {
                    DW_FORM_REF1 => {
                        self.append(ATTRIB_SPECIFICATION_REF1);
                        continue;
                    }
                    DW_FORM_REF2 => {
                        self.append(ATTRIB_SPECIFICATION_REF2);
                        continue;
                    }
                    DW_FORM_REF4 => {
                        self.append(ATTRIB_SPECIFICATION_REF4);
                        continue;
                    }
                    DW_FORM_REF8 => {
                        self.append(ATTRIB_SPECIFICATION_REF8);
                        continue;
                    }
                    DW_FORM_REF_UDATA => {
                        self.append(ATTRIB_SPECIFICATION_REF_UDATA);
                        continue;
                    }
                    _ => {}
                }
            }

            let skip = match form {
                DW_FORM_ADDR => self.cu.address_size,
                DW_FORM_DATA1 | DW_FORM_REF1 | DW_FORM_FLAG => 1,
                DW_FORM_DATA2 | DW_FORM_REF2 => 2,
                DW_FORM_DATA4 | DW_FORM_REF4 => 4,
                DW_FORM_DATA8 | DW_FORM_REF8 | DW_FORM_REF_SIG8 => 8,
                DW_FORM_BLOCK1 => {
                    self.append(ATTRIB_BLOCK1);
                    continue;
                }
                DW_FORM_BLOCK2 => {
                    self.append(ATTRIB_BLOCK2);
                    continue;
                }
                DW_FORM_BLOCK4 => {
                    self.append(ATTRIB_BLOCK4);
                    continue;
                }
                DW_FORM_EXPRLOC => {
                    self.append(ATTRIB_EXPRLOC);
                    continue;
                }
                DW_FORM_SDATA | DW_FORM_UDATA | DW_FORM_REF_UDATA => {
                    self.append(ATTRIB_LEB128);
                    continue;
                }
                DW_FORM_REF_ADDR | DW_FORM_SEC_OFFSET | DW_FORM_STRP => {
                    if self.cu.is_64_bit {
                        8
                    } else {
                        4
                    }
                }
                DW_FORM_STRING => {
                    self.append(ATTRIB_STRING);
                    continue;
                }
                DW_FORM_FLAG_PRESENT => continue,
                DW_FORM_INDIRECT => {
                    return Err(Error::DwarfFormat(
                        "DW_FORM_indirect is not implemented".into(),
                    ))
                }
                _ => {
                    return Err(Error::DwarfFormat(format!(
                        "unknown attribute form {form}"
                    )))
                }
            };
            if skip > INSN_MAX_SKIP {
                return Err(Error::DwarfFormat(
                    "attribute payload is too wide to encode".into(),
                ));
            }
            self.append_skip(skip);
        }

        self.append(0);
        self.append(die_flags);
        Ok(true)
    }
}

/// Compiles the abbreviation table a compile unit refers to.
pub(crate) fn compile(
    flags: IndexFlags,
    debug_abbrev: &[u8],
    has_debug_line: bool,
    cu: &CompileUnit,
) -> Result<AbbrevTable> {
    let offset = usize::try_from(cu.debug_abbrev_offset).map_err(|_| Error::DwarfEof)?;
    if offset > debug_abbrev.len() {
        return Err(Error::DwarfEof);
    }
    let mut cursor = Cursor::at(debug_abbrev, offset, false);
    let mut compiler = Compiler {
        flags,
        cu,
        has_debug_line,
        table: AbbrevTable {
            decls: Vec::new(),
            insns: Vec::new(),
        },
        first: true,
    };
    while compiler.read_decl(&mut cursor)? {}
    Ok(compiler.table)
}
