//! A concurrent name index over the DWARF definitions of a set of files.
//!
//! Opened files are scanned once; every top-level definition of interest is
//! recorded as `name -> (file, DIE offset, tag, source-file hash)`. Lookups
//! then answer "which DIEs define `foo`" without touching the DWARF data
//! again; resolving an entry into a full DIE is the caller's business (it
//! knows the file and the offset).
//!
//! The map is split into 256 shards, each guarded by its own mutex, so the
//! per-compile-unit indexing workers only contend on the final insertion.

pub(crate) mod abbrev;
pub(crate) mod consts;
pub(crate) mod cu;
pub(crate) mod path;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;

use crate::elf::{self, DebugFile, SectionId};
use crate::error::{Error, Result};

/// Which kinds of definitions to index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFlags(u8);

impl IndexFlags {
    pub const TYPES: IndexFlags = IndexFlags(1 << 0);
    pub const VARIABLES: IndexFlags = IndexFlags(1 << 1);
    pub const ENUMERATORS: IndexFlags = IndexFlags(1 << 2);
    pub const FUNCTIONS: IndexFlags = IndexFlags(1 << 3);
    pub const ALL: IndexFlags = IndexFlags((1 << 4) - 1);

    pub fn contains(self, other: IndexFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: IndexFlags) -> IndexFlags {
        IndexFlags(self.0 | other.0)
    }

    fn is_valid(self) -> bool {
        self.0 & !Self::ALL.0 == 0
    }
}

/// Identifies an indexed file for the lifetime of its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileId(u32);

impl FileId {
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// One indexed definition.
///
/// Two entries denote the same definition iff their tag and source-file hash
/// match; entries sharing a name but differing in either are distinct
/// definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DieRef {
    pub file: FileId,
    /// Byte offset of the DIE in the file's `.debug_info`.
    pub offset: u64,
    pub tag: u64,
    pub file_name_hash: u64,
}

const SHARD_BITS: u32 = 8;
const NUM_SHARDS: usize = 1 << SHARD_BITS;
const NO_NEXT: u32 = u32::MAX;

struct DieEntry {
    tag: u64,
    file_name_hash: u64,
    /// Next entry in this name's chain, as an index into the shard's entry
    /// vector, or `NO_NEXT`.
    next: u32,
    file: u32,
    offset: u64,
}

#[derive(Default)]
struct Shard {
    /// Key is the definition name; value is the head of the entry chain.
    map: HashMap<Box<[u8]>, u32>,
    /// All entries of the shard in one vector; chains link by index so a
    /// failed update rolls back by truncation.
    entries: Vec<DieEntry>,
}

fn name_hash(name: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(name);
    hasher.finish()
}

fn shard_of(name: &[u8]) -> usize {
    // The top byte of the hash is conventionally reserved as a map tag, so
    // shard selection uses the bits below it.
    ((name_hash(name) >> (64 - 8 - SHARD_BITS)) & (NUM_SHARDS as u64 - 1)) as usize
}

/// The index itself. Files are opened incrementally; [`DwarfIndex::update`]
/// consumes everything opened since the last update, either indexing all of
/// it or none of it.
pub struct DwarfIndex {
    flags: IndexFlags,
    files: Vec<DebugFile>,
    by_path: HashMap<PathBuf, u32>,
    /// Files below this index are fully indexed; the rest are pending.
    num_indexed: usize,
    shards: Vec<Mutex<Shard>>,
}

impl DwarfIndex {
    pub fn new(flags: IndexFlags) -> Result<DwarfIndex> {
        if !flags.is_valid() {
            return Err(Error::InvalidArgument("invalid index flags".into()));
        }
        Ok(DwarfIndex {
            flags,
            files: Vec::new(),
            by_path: HashMap::new(),
            num_indexed: 0,
            shards: (0..NUM_SHARDS).map(|_| Mutex::new(Shard::default())).collect(),
        })
    }

    /// Opens a debug file for the next update. Opening a path that is
    /// already open (after canonicalization) is a no-op.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::os("realpath", e, Some(path.to_path_buf())))?;
        if self.by_path.contains_key(&canonical) {
            return Ok(());
        }
        let file = DebugFile::open(&canonical)?;
        self.by_path.insert(canonical, self.files.len() as u32);
        self.files.push(file);
        Ok(())
    }

    /// Opens a debug file from an in-memory ELF image. Images are never
    /// deduplicated.
    pub fn open_image(&mut self, image: &[u8]) -> Result<()> {
        let file = DebugFile::from_image(image)?;
        self.files.push(file);
        Ok(())
    }

    /// Indexes every file opened since the last update. On failure none of
    /// the newly opened files contribute entries and all of them are
    /// discarded; previously indexed files are untouched.
    pub fn update(&mut self) -> Result<()> {
        let first = self.num_indexed;
        if first == self.files.len() {
            return Ok(());
        }
        let _span =
            tracing::info_span!("index_update", files = self.files.len() - first).entered();
        match self.update_pending(first) {
            Ok(()) => {
                self.num_indexed = self.files.len();
                Ok(())
            }
            Err(err) => {
                self.rollback(first);
                Err(err)
            }
        }
    }

    fn update_pending(&mut self, first: usize) -> Result<()> {
        elf::apply_relocations(&mut self.files[first..])?;

        for file in &self.files[first..] {
            let debug_str = file.section(SectionId::DebugStr);
            if debug_str.last() != Some(&0) {
                return Err(Error::DwarfFormat(
                    ".debug_str is not null terminated".into(),
                ));
            }
        }

        let mut cus = Vec::new();
        for (file_index, file) in self.files.iter().enumerate().skip(first) {
            cus.extend(cu::read_cus(file, file_index)?);
        }
        tracing::debug!(cus = cus.len(), "indexing compile units");

        let files = &self.files;
        let shards = &self.shards;
        let flags = self.flags;
        // Compile units vary in size by orders of magnitude; rayon's work
        // stealing keeps the workers busy. The first error wins.
        cus.par_iter().try_for_each(|cu| {
            let file = &files[cu.file];
            cu::index_cu(flags, file, cu, &mut |name, tag, file_name_hash, offset| {
                insert_entry(shards, name, tag, file_name_hash, cu.file as u32, offset)
            })
        })
    }

    /// Discards the files of a failed update along with every entry that
    /// was inserted for them.
    fn rollback(&mut self, first: usize) {
        for shard in &self.shards {
            let mut shard = shard.lock();
            while shard
                .entries
                .last()
                .is_some_and(|entry| entry.file as usize >= first)
            {
                shard.entries.pop();
            }
            let len = shard.entries.len() as u32;
            shard.map.retain(|_, head| *head < len);
            // A surviving entry may have chained to one that was truncated.
            for entry in &mut shard.entries {
                if entry.next != NO_NEXT && entry.next >= len {
                    entry.next = NO_NEXT;
                }
            }
        }
        self.by_path.retain(|_, index| (*index as usize) < first);
        self.files.truncate(first);
    }

    /// Looks up entries by name, or iterates all entries when `name` is
    /// `None`. The tag filter is applied after lookup; an empty `tags`
    /// matches everything.
    pub fn find(&self, name: Option<&[u8]>, tags: &[u64]) -> LookupIter {
        let matches = |entry: &DieEntry| tags.is_empty() || tags.contains(&entry.tag);
        let mut refs = Vec::new();
        match name {
            Some(name) => {
                let shard = self.shards[shard_of(name)].lock();
                let mut index = shard.map.get(name).copied();
                while let Some(i) = index {
                    let entry = &shard.entries[i as usize];
                    if matches(entry) {
                        refs.push(DieRef {
                            file: FileId(entry.file),
                            offset: entry.offset,
                            tag: entry.tag,
                            file_name_hash: entry.file_name_hash,
                        });
                    }
                    index = (entry.next != NO_NEXT).then_some(entry.next);
                }
            }
            None => {
                for shard in &self.shards {
                    let shard = shard.lock();
                    for entry in &shard.entries {
                        if matches(entry) {
                            refs.push(DieRef {
                                file: FileId(entry.file),
                                offset: entry.offset,
                                tag: entry.tag,
                                file_name_hash: entry.file_name_hash,
                            });
                        }
                    }
                }
            }
        }
        LookupIter {
            refs: refs.into_iter(),
        }
    }

    pub fn lookup(&self, name: &str, tags: &[u64]) -> LookupIter {
        self.find(Some(name.as_bytes()), tags)
    }

    /// Canonical path of an indexed file, if it was opened by path.
    pub fn file_path(&self, id: FileId) -> Option<&Path> {
        self.files.get(id.0 as usize)?.path.as_deref()
    }

    /// The parsed file behind an indexed entry.
    pub(crate) fn debug_file(&self, id: FileId) -> Option<&DebugFile> {
        self.files.get(id.0 as usize)
    }

    /// The `.debug_info` bytes of an indexed file, for resolving a
    /// [`DieRef`] into a full DIE.
    pub fn debug_info(&self, id: FileId) -> &[u8] {
        self.files
            .get(id.0 as usize)
            .map(|f| f.section(SectionId::DebugInfo))
            .unwrap_or(&[])
    }

    /// Word size of the indexed files. Only 64-bit ELF is accepted.
    pub fn word_size(&self) -> u8 {
        8
    }

    pub fn is_little_endian(&self) -> bool {
        self.files
            .first()
            .map(|f| f.little_endian)
            .unwrap_or(cfg!(target_endian = "little"))
    }

    pub fn num_files(&self) -> usize {
        self.num_indexed
    }
}

fn insert_entry(
    shards: &[Mutex<Shard>],
    name: &[u8],
    tag: u64,
    file_name_hash: u64,
    file: u32,
    offset: u64,
) -> Result<()> {
    let mut shard = shards[shard_of(name)].lock();
    let new_index = u32::try_from(shard.entries.len())
        .map_err(|_| Error::Overflow("too many index entries in one shard".into()))?;

    match shard.map.get(name).copied() {
        None => {
            shard.entries.push(DieEntry {
                tag,
                file_name_hash,
                next: NO_NEXT,
                file,
                offset,
            });
            shard.map.insert(name.into(), new_index);
        }
        Some(head) => {
            let mut tail = head;
            loop {
                let entry = &shard.entries[tail as usize];
                if entry.tag == tag && entry.file_name_hash == file_name_hash {
                    // Same definition indexed again; the first entry wins.
                    return Ok(());
                }
                if entry.next == NO_NEXT {
                    break;
                }
                tail = entry.next;
            }
            shard.entries.push(DieEntry {
                tag,
                file_name_hash,
                next: NO_NEXT,
                file,
                offset,
            });
            shard.entries[tail as usize].next = new_index;
        }
    }
    Ok(())
}

/// Iterator over lookup results. Entries within one name preserve insertion
/// order: the head of a chain is the first definition seen for that name.
pub struct LookupIter {
    refs: std::vec::IntoIter<DieRef>,
}

impl Iterator for LookupIter {
    type Item = DieRef;

    fn next(&mut self) -> Option<DieRef> {
        self.refs.next()
    }
}

impl ExactSizeIterator for LookupIter {
    fn len(&self) -> usize {
        self.refs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::consts::*;
    use super::*;
    use crate::test::image;

    /// Builds an ELF image with one compile unit defining `int foo;` plus a
    /// struct, an enum with one enumerator, and a function.
    fn sample_image() -> Vec<u8> {
        let abbrev = image::AbbrevBuilder::new()
            .decl(DW_TAG_COMPILE_UNIT, true)
            .attr(DW_AT_STMT_LIST, DW_FORM_DATA4)
            .finish_decl()
            .decl(DW_TAG_VARIABLE, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_DECL_FILE, DW_FORM_DATA1)
            .finish_decl()
            .decl(DW_TAG_ENUMERATION_TYPE, true)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .finish_decl()
            .decl(DW_TAG_ENUMERATOR, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .finish_decl()
            .decl(DW_TAG_STRUCTURE_TYPE, false)
            .attr(DW_AT_NAME, DW_FORM_STRING)
            .attr(DW_AT_DECLARATION, DW_FORM_FLAG_PRESENT)
            .finish_decl()
            .build();
        let debug_line = image::LineProgram::new().file(b"main.c", 0).build();
        let mut cu = image::CuBuilder::new();
        cu.die(1).u32(0); // compile unit, stmt_list 0
        cu.die(2).cstr(b"foo").u8(1); // int foo; declared in main.c
        cu.die(3).cstr(b"color"); // enum color with children
        cu.die(4).cstr(b"RED"); // enumerator at depth 2
        cu.null(); // end of enum children
        cu.die(5).cstr(b"opaque"); // struct declaration, skipped
        cu.null(); // end of CU children
        image::ElfImage::new()
            .section(".debug_abbrev", abbrev)
            .section(".debug_info", cu.build())
            .section(".debug_line", debug_line)
            .section(".debug_str", vec![0])
            .build()
    }

    #[test]
    fn indexes_top_level_definitions() {
        let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.update().unwrap();

        let foo: Vec<_> = index.lookup("foo", &[]).collect();
        assert_eq!(foo.len(), 1);
        assert_eq!(foo[0].tag, DW_TAG_VARIABLE);
        assert_ne!(foo[0].file_name_hash, 0);

        // Declarations are not indexed.
        assert_eq!(index.lookup("opaque", &[]).len(), 0);
    }

    #[test]
    fn enumerators_resolve_to_their_enumeration() {
        let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.update().unwrap();

        let color: Vec<_> = index.lookup("color", &[]).collect();
        let red: Vec<_> = index.lookup("RED", &[]).collect();
        assert_eq!(color.len(), 1);
        assert_eq!(red.len(), 1);
        assert_eq!(red[0].tag, DW_TAG_ENUMERATOR);
        assert_eq!(red[0].offset, color[0].offset);
    }

    #[test]
    fn tag_filter_applies_after_lookup() {
        let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.update().unwrap();

        assert_eq!(index.lookup("foo", &[DW_TAG_VARIABLE]).len(), 1);
        assert_eq!(index.lookup("foo", &[DW_TAG_TYPEDEF]).len(), 0);
    }

    #[test]
    fn index_dump_snapshot() {
        let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.update().unwrap();

        #[derive(serde::Serialize)]
        struct EntryDump {
            tag: u64,
            offset: u64,
        }
        // Entry order across shards is unspecified; sort for a stable dump.
        let mut entries: Vec<EntryDump> = index
            .find(None, &[])
            .map(|entry| EntryDump {
                tag: entry.tag,
                offset: entry.offset,
            })
            .collect();
        entries.sort_by_key(|entry| (entry.offset, entry.tag));
        insta::assert_yaml_snapshot!(entries, @r###"
        ---
        - tag: 52
          offset: 16
        - tag: 4
          offset: 22
        - tag: 40
          offset: 22
        "###);
    }

    #[test]
    fn null_name_iterates_everything() {
        let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.update().unwrap();

        let names: Vec<_> = index.find(None, &[]).collect();
        // foo, color, RED (under color's offset).
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn failed_update_rolls_back_all_new_files() {
        let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.update().unwrap();
        assert_eq!(index.lookup("foo", &[]).len(), 1);

        // A second update with one good and one corrupt file indexes
        // neither.
        let good = {
            let abbrev = image::AbbrevBuilder::new()
                .decl(DW_TAG_COMPILE_UNIT, true)
                .finish_decl()
                .decl(DW_TAG_VARIABLE, false)
                .attr(DW_AT_NAME, DW_FORM_STRING)
                .finish_decl()
                .build();
            let mut cu = image::CuBuilder::new();
            cu.die(1);
            cu.die(2).cstr(b"bar");
            cu.null();
            image::ElfImage::new()
                .section(".debug_abbrev", abbrev)
                .section(".debug_info", cu.build())
                .section(".debug_str", vec![0])
                .build()
        };
        let corrupt = {
            let abbrev = image::AbbrevBuilder::new()
                .decl(DW_TAG_COMPILE_UNIT, true)
                .finish_decl()
                .build();
            let mut cu = image::CuBuilder::new();
            cu.die(9); // unknown abbreviation code
            image::ElfImage::new()
                .section(".debug_abbrev", abbrev)
                .section(".debug_info", cu.build())
                .section(".debug_str", vec![0])
                .build()
        };
        index.open_image(&good).unwrap();
        index.open_image(&corrupt).unwrap();
        assert!(index.update().is_err());

        assert_eq!(index.lookup("bar", &[]).len(), 0);
        assert_eq!(index.lookup("foo", &[]).len(), 1);
        assert_eq!(index.num_files(), 1);

        // The good file can be opened and indexed again afterwards.
        index.open_image(&good).unwrap();
        index.update().unwrap();
        assert_eq!(index.lookup("bar", &[]).len(), 1);
    }

    #[test]
    fn same_definition_in_two_files_is_deduplicated() {
        let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.open_image(&sample_image()).unwrap();
        index.update().unwrap();
        // Same tag and same source-file hash: one definition.
        assert_eq!(index.lookup("foo", &[]).len(), 1);
    }
}
