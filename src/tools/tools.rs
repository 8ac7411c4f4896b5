mod dump_index;
use dump_index::dump_index;
mod dump_type;
use dump_type::dump_type;
mod eval_offset;
use eval_offset::eval_offset;
mod load;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect the debugging information of ELF files
#[derive(Clone, Debug, Parser)]
struct Args {
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Index the named files and dump the resulting entries
    DumpIndex {
        /// ELF files with DWARF debugging information
        input: Vec<PathBuf>,
        /// only dump entries with this name
        #[arg(short, long)]
        name: Option<String>,
        /// only dump entries with these DWARF tags
        #[arg(short, long)]
        tag: Vec<u64>,
    },
    /// Resolve a C type name against a file's types and dump its definition
    DumpType {
        /// ELF file with DWARF debugging information
        input: PathBuf,
        /// the type name, e.g. 'struct task_struct *' or 'unsigned long'
        name: String,
    },
    /// Evaluate a member designator to its bit offset in a type
    EvalOffset {
        /// ELF file with DWARF debugging information
        input: PathBuf,
        /// the containing type, e.g. 'struct task_struct'
        type_name: String,
        /// the member designator, e.g. 'thread.fpu' or 'pages[2].flags'
        designator: String,
    },
}

fn main() -> corelens::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.operation {
        Operation::DumpIndex { input, name, tag } => {
            dump_index(&input, name.as_deref(), &tag)
        }
        Operation::DumpType { input, name } => dump_type(&input, &name),
        Operation::EvalOffset {
            input,
            type_name,
            designator,
        } => eval_offset(&input, &type_name, &designator),
    }
}
