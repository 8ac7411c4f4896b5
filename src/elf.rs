//! ELF container parsing for debug files.
//!
//! Only the pieces the index needs are extracted: the symbol table, the four
//! DWARF sections, and any RELA sections targeting the DWARF sections.
//! Relocations are applied up front so the rest of the crate can treat the
//! section bytes as final.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use num_enum::TryFromPrimitive;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::reader::Cursor;

pub(crate) const EI_NIDENT: usize = 16;
const ELFMAG: &[u8; 4] = b"\x7fELF";
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const SHT_NOBITS: u32 = 8;
const SHT_RELA: u32 = 4;
const SHF_GROUP: u64 = 0x200;

pub(crate) const EM_X86_64: u16 = 62;
pub(crate) const EM_AARCH64: u16 = 183;

const RELA_ENTRY_SIZE: usize = 24;
const SYM_ENTRY_SIZE: usize = 24;

/// The sections a debug file contributes to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionId {
    Symtab = 0,
    DebugAbbrev = 1,
    DebugInfo = 2,
    DebugLine = 3,
    DebugStr = 4,
}

pub(crate) const NUM_SECTIONS: usize = 5;

impl SectionId {
    pub const ALL: [SectionId; NUM_SECTIONS] = [
        SectionId::Symtab,
        SectionId::DebugAbbrev,
        SectionId::DebugInfo,
        SectionId::DebugLine,
        SectionId::DebugStr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SectionId::Symtab => ".symtab",
            SectionId::DebugAbbrev => ".debug_abbrev",
            SectionId::DebugInfo => ".debug_info",
            SectionId::DebugLine => ".debug_line",
            SectionId::DebugStr => ".debug_str",
        }
    }

    pub fn optional(self) -> bool {
        matches!(self, SectionId::Symtab | SectionId::DebugLine)
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
enum X86_64Reloc {
    None = 0,
    Abs64 = 1,
    Abs32 = 10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
enum Aarch64Reloc {
    None = 0,
    Abs64 = 257,
    Abs32 = 258,
}

enum RelocWidth {
    None,
    Word32,
    Word64,
}

fn reloc_width(machine: u16, r_type: u32) -> Result<RelocWidth> {
    match machine {
        EM_X86_64 => match X86_64Reloc::try_from(r_type) {
            Ok(X86_64Reloc::None) => Ok(RelocWidth::None),
            Ok(X86_64Reloc::Abs32) => Ok(RelocWidth::Word32),
            Ok(X86_64Reloc::Abs64) => Ok(RelocWidth::Word64),
            Err(_) => Err(Error::ElfFormat(format!(
                "unimplemented relocation type {r_type}"
            ))),
        },
        EM_AARCH64 => match Aarch64Reloc::try_from(r_type) {
            Ok(Aarch64Reloc::None) => Ok(RelocWidth::None),
            Ok(Aarch64Reloc::Abs32) => Ok(RelocWidth::Word32),
            Ok(Aarch64Reloc::Abs64) => Ok(RelocWidth::Word64),
            Err(_) => Err(Error::ElfFormat(format!(
                "unimplemented relocation type {r_type}"
            ))),
        },
        _ => Err(Error::ElfFormat(format!(
            "relocations for machine {machine} are not implemented"
        ))),
    }
}

/// An opened debug file with its extracted sections.
#[derive(Debug)]
pub(crate) struct DebugFile {
    /// Canonical path, or `None` if the file was supplied as bytes.
    pub path: Option<PathBuf>,
    pub sections: [Option<Vec<u8>>; NUM_SECTIONS],
    pub rela_sections: [Option<Vec<u8>>; NUM_SECTIONS],
    /// File byte order differs from the host's.
    pub bswap: bool,
    pub little_endian: bool,
    pub machine: u16,
    /// Set when indexing this file failed; entry rollback keys off it.
    pub failed: bool,
}

struct SectionHeader {
    name: u32,
    sh_type: u32,
    flags: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
}

fn read_section_header(cursor: &mut Cursor<'_>) -> Result<SectionHeader> {
    let name = cursor.read_u32()?;
    let sh_type = cursor.read_u32()?;
    let flags = cursor.read_u64()?;
    let _addr = cursor.read_u64()?;
    let offset = cursor.read_u64()?;
    let size = cursor.read_u64()?;
    let link = cursor.read_u32()?;
    let info = cursor.read_u32()?;
    let _addralign = cursor.read_u64()?;
    let _entsize = cursor.read_u64()?;
    Ok(SectionHeader {
        name,
        sh_type,
        flags,
        offset,
        size,
        link,
        info,
    })
}

fn section_bytes(image: &[u8], shdr: &SectionHeader) -> Result<Vec<u8>> {
    let start = usize::try_from(shdr.offset)
        .map_err(|_| Error::ElfFormat("section offset out of range".into()))?;
    let size = usize::try_from(shdr.size)
        .map_err(|_| Error::ElfFormat("section size out of range".into()))?;
    let end = start
        .checked_add(size)
        .filter(|&end| end <= image.len())
        .ok_or_else(|| Error::ElfFormat("section extends past end of file".into()))?;
    Ok(image[start..end].to_vec())
}

impl DebugFile {
    pub fn open(path: &Path) -> Result<DebugFile> {
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::os("realpath", e, Some(path.to_path_buf())))?;
        let image = std::fs::read(&canonical)
            .map_err(|e| Error::os("open", e, Some(path.to_path_buf())))?;
        let mut file = DebugFile::from_image(&image)?;
        file.path = Some(canonical);
        Ok(file)
    }

    /// Parses a debug file from an in-memory ELF image.
    pub fn from_image(image: &[u8]) -> Result<DebugFile> {
        if image.len() < EI_NIDENT || &image[..4] != ELFMAG {
            return Err(Error::ElfFormat("not an ELF file".into()));
        }
        if image[4] != ELFCLASS64 {
            return Err(Error::ElfFormat(
                "32-bit ELF files are not implemented".into(),
            ));
        }
        let little_endian = match image[5] {
            ELFDATA2LSB => true,
            ELFDATA2MSB => false,
            _ => return Err(Error::ElfFormat("invalid ELF data encoding".into())),
        };
        let bswap = little_endian != cfg!(target_endian = "little");

        let mut header = Cursor::at(image, EI_NIDENT, bswap);
        let _e_type = header.read_u16()?;
        let machine = header.read_u16()?;
        let _version = header.read_u32()?;
        let _entry = header.read_u64()?;
        let _phoff = header.read_u64()?;
        let shoff = header.read_u64()?;
        let _flags = header.read_u32()?;
        let _ehsize = header.read_u16()?;
        let _phentsize = header.read_u16()?;
        let _phnum = header.read_u16()?;
        let shentsize = header.read_u16()?;
        let shnum = header.read_u16()?;
        let shstrndx = header.read_u16()?;

        if shentsize as usize != 64 {
            return Err(Error::ElfFormat("invalid section header entry size".into()));
        }
        let shoff = usize::try_from(shoff)
            .map_err(|_| Error::ElfFormat("section header table out of range".into()))?;

        let shdr_at = |index: usize| -> Result<SectionHeader> {
            let pos = shoff
                .checked_add(index * 64)
                .filter(|&p| p + 64 <= image.len())
                .ok_or_else(|| {
                    Error::ElfFormat("section header table extends past end of file".into())
                })?;
            read_section_header(&mut Cursor::at(image, pos, bswap))
        };

        let shstrtab = shdr_at(shstrndx as usize).and_then(|h| section_bytes(image, &h))?;

        fn section_name(shstrtab: &[u8], name_offset: u32) -> Option<&[u8]> {
            let rest = shstrtab.get(name_offset as usize..)?;
            let nul = rest.iter().position(|&b| b == 0)?;
            Some(&rest[..nul])
        }

        let mut sections: [Option<Vec<u8>>; NUM_SECTIONS] = Default::default();
        let mut section_index = [0usize; NUM_SECTIONS];

        // First pass: the symbol table and the debug sections.
        for index in 1..shnum as usize {
            let shdr = shdr_at(index)?;
            if shdr.sh_type == SHT_NOBITS || shdr.flags & SHF_GROUP != 0 {
                continue;
            }
            let Some(name) = section_name(&shstrtab, shdr.name) else {
                continue;
            };
            for id in SectionId::ALL {
                if sections[id as usize].is_some() || name != id.name().as_bytes() {
                    continue;
                }
                sections[id as usize] = Some(section_bytes(image, &shdr)?);
                section_index[id as usize] = index;
            }
        }

        for id in SectionId::ALL {
            if sections[id as usize].is_none() && !id.optional() {
                return Err(Error::MissingDebug(format!(
                    "ELF file has no {} section",
                    id.name()
                )));
            }
        }

        // Second pass: RELA sections targeting the debug sections.
        let mut rela_sections: [Option<Vec<u8>>; NUM_SECTIONS] = Default::default();
        for index in 1..shnum as usize {
            let shdr = shdr_at(index)?;
            if shdr.sh_type != SHT_RELA {
                continue;
            }
            for id in SectionId::ALL {
                if rela_sections[id as usize].is_some()
                    || shdr.info as usize != section_index[id as usize]
                    || section_index[id as usize] == 0
                {
                    continue;
                }
                if sections[SectionId::Symtab as usize].is_none() {
                    return Err(Error::ElfFormat(
                        "ELF file has no .symtab section".into(),
                    ));
                }
                if shdr.link as usize != section_index[SectionId::Symtab as usize] {
                    return Err(Error::ElfFormat(
                        "relocation symbol table section is not .symtab".into(),
                    ));
                }
                rela_sections[id as usize] = Some(section_bytes(image, &shdr)?);
            }
        }

        Ok(DebugFile {
            path: None,
            sections,
            rela_sections,
            bswap,
            little_endian,
            machine,
            failed: false,
        })
    }

    pub fn section(&self, id: SectionId) -> &[u8] {
        self.sections[id as usize].as_deref().unwrap_or(&[])
    }

    pub fn num_relocations(&self) -> usize {
        self.rela_sections
            .iter()
            .flatten()
            .map(|rela| rela.len() / RELA_ENTRY_SIZE)
            .sum()
    }
}

/// Applies one RELA section's relocations to its target section.
fn apply_section_relocations(
    target: &mut [u8],
    rela: &[u8],
    symtab: &[u8],
    bswap: bool,
    little_endian: bool,
    machine: u16,
) -> Result<()> {
    let num_syms = symtab.len() / SYM_ENTRY_SIZE;
    let mut cursor = Cursor::new(rela, bswap);
    for _ in 0..rela.len() / RELA_ENTRY_SIZE {
        let r_offset = cursor.read_u64()?;
        let r_info = cursor.read_u64()?;
        let r_addend = cursor.read_i64()?;
        let r_sym = (r_info >> 32) as usize;
        let r_type = r_info as u32;

        let width = match reloc_width(machine, r_type)? {
            RelocWidth::None => continue,
            width => width,
        };
        if r_sym >= num_syms {
            return Err(Error::ElfFormat("invalid relocation symbol".into()));
        }
        // Elf64_Sym::st_value is 8 bytes into the entry.
        let mut sym = Cursor::at(symtab, r_sym * SYM_ENTRY_SIZE + 8, bswap);
        let st_value = sym.read_u64()?;
        let value = st_value.wrapping_add(r_addend as u64);

        let offset = usize::try_from(r_offset)
            .map_err(|_| Error::ElfFormat("invalid relocation offset".into()))?;
        match width {
            RelocWidth::Word32 => {
                let end = offset
                    .checked_add(4)
                    .filter(|&end| end <= target.len())
                    .ok_or_else(|| Error::ElfFormat("invalid relocation offset".into()))?;
                let word = value as u32;
                target[offset..end].copy_from_slice(&if little_endian {
                    word.to_le_bytes()
                } else {
                    word.to_be_bytes()
                });
            }
            RelocWidth::Word64 => {
                let end = offset
                    .checked_add(8)
                    .filter(|&end| end <= target.len())
                    .ok_or_else(|| Error::ElfFormat("invalid relocation offset".into()))?;
                target[offset..end].copy_from_slice(&if little_endian {
                    value.to_le_bytes()
                } else {
                    value.to_be_bytes()
                });
            }
            RelocWidth::None => {}
        }
    }
    Ok(())
}

/// Applies every relocation across `files` in one parallel pass.
///
/// Each task owns a disjoint target section, so workers never contend on the
/// section bytes. Symbol values come from a pre-relocation snapshot of the
/// symbol table, which also covers RELA sections whose target is `.symtab`
/// itself. The first error reported by any worker wins.
pub(crate) fn apply_relocations(files: &mut [DebugFile]) -> Result<()> {
    struct Task {
        file_idx: usize,
        section_idx: usize,
        target: Vec<u8>,
        rela: Vec<u8>,
        symtab: Arc<Vec<u8>>,
        bswap: bool,
        little_endian: bool,
        machine: u16,
    }

    let mut tasks = Vec::new();
    for (file_idx, file) in files.iter_mut().enumerate() {
        if file.rela_sections.iter().all(|rela| rela.is_none()) {
            continue;
        }
        let symtab = Arc::new(file.section(SectionId::Symtab).to_vec());
        for section_idx in 0..NUM_SECTIONS {
            let Some(rela) = file.rela_sections[section_idx].take() else {
                continue;
            };
            let Some(target) = file.sections[section_idx].take() else {
                file.rela_sections[section_idx] = Some(rela);
                continue;
            };
            tasks.push(Task {
                file_idx,
                section_idx,
                target,
                rela,
                symtab: symtab.clone(),
                bswap: file.bswap,
                little_endian: file.little_endian,
                machine: file.machine,
            });
        }
    }

    let total: usize = tasks.iter().map(|t| t.rela.len() / RELA_ENTRY_SIZE).sum();
    tracing::debug!(relocations = total, sections = tasks.len(), "applying relocations");

    let result = tasks.par_iter_mut().try_for_each(|task| {
        apply_section_relocations(
            &mut task.target,
            &task.rela,
            &task.symtab,
            task.bswap,
            task.little_endian,
            task.machine,
        )
    });

    for task in tasks {
        files[task.file_idx].sections[task.section_idx] = Some(task.target);
        files[task.file_idx].rela_sections[task.section_idx] = Some(task.rela);
    }
    result
}
