use std::path::Path;

use corelens::c;
use corelens::Result;

use crate::load::program_for;

pub fn eval_offset(input: &Path, type_name: &str, designator: &str) -> Result<()> {
    let prog = program_for(input)?;
    let qualified_type = prog.find_type(type_name, None)?;
    let bits = c::bit_offset(&qualified_type.ty, designator)?;
    if bits % 8 == 0 {
        println!("{bits} bits ({} bytes)", bits / 8);
    } else {
        println!("{bits} bits");
    }
    Ok(())
}
