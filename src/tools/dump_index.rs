use std::path::PathBuf;

use corelens::index::{DwarfIndex, IndexFlags};
use corelens::Result;

pub fn dump_index(input: &[PathBuf], name: Option<&str>, tags: &[u64]) -> Result<()> {
    let mut index = DwarfIndex::new(IndexFlags::ALL)?;
    for path in input {
        index.open(path)?;
    }
    index.update()?;

    let entries = match name {
        Some(name) => index.lookup(name, tags),
        None => index.find(None, tags),
    };
    for entry in entries {
        let path = index
            .file_path(entry.file)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<image>".to_string());
        println!(
            "{path}\toffset={:#x}\ttag={:#x}\tfile_hash={:#018x}",
            entry.offset, entry.tag, entry.file_name_hash
        );
    }
    Ok(())
}
