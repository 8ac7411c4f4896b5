use std::path::Path;
use std::sync::Arc;

use corelens::dwarf::DwarfTypeFinder;
use corelens::index::{DwarfIndex, IndexFlags};
use corelens::memory::EmptyReader;
use corelens::program::Program;
use corelens::Result;

/// Indexes one ELF file and builds a program whose type lookups resolve
/// against its debugging information.
pub fn program_for(input: &Path) -> Result<Program> {
    let mut index = DwarfIndex::new(IndexFlags::TYPES)?;
    index.open(input)?;
    index.update()?;

    let little_endian = index.is_little_endian();
    let word_size = u64::from(index.word_size());
    let mut prog = Program::new(word_size, little_endian, Box::new(EmptyReader));
    prog.types_mut()
        .register_finder(Box::new(DwarfTypeFinder::new(Arc::new(index))));
    Ok(prog)
}
