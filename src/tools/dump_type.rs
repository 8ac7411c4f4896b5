use std::path::Path;

use corelens::c;
use corelens::Result;

use crate::load::program_for;

pub fn dump_type(input: &Path, name: &str) -> Result<()> {
    let prog = program_for(input)?;
    let qualified_type = prog.find_type(name, None)?;
    println!("{}", c::type_name(&qualified_type)?);
    println!("{}", c::format_type(&qualified_type)?);
    Ok(())
}
