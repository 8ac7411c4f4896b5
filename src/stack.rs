//! A thin facade over an external stack unwinder.
//!
//! The engine that walks frames (CFI evaluation, register recovery) lives
//! outside this crate; it hands back a sequence of frames with program
//! counters, recovered registers, and optionally symbolized names. The
//! facade's job is what the debugging core is responsible for: turning
//! evaluated variable locations into objects and giving frames a usable
//! surface.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::program::Program;
use crate::ty::QualifiedType;
use crate::ByteOrder;

/// Register naming for one machine, in DWARF register numbering order.
#[derive(Debug)]
pub struct Architecture {
    pub name: &'static str,
    pub register_names: &'static [&'static str],
}

pub const X86_64: Architecture = Architecture {
    name: "x86-64",
    register_names: &[
        "rax", "rdx", "rcx", "rbx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10",
        "r11", "r12", "r13", "r14", "r15", "rip",
    ],
};

impl Architecture {
    pub fn register_number(&self, name: &str) -> Option<u16> {
        self.register_names
            .iter()
            .position(|&register| register == name)
            .map(|number| number as u16)
    }
}

/// One unwound frame as produced by the unwinder.
#[derive(Debug)]
pub struct FrameState {
    pub pc: u64,
    /// Recovered registers by DWARF number; `None` where the unwinder could
    /// not recover a value.
    pub registers: Vec<Option<u64>>,
    /// Symbol containing `pc` and the offset into it, if known.
    pub symbol: Option<(String, u64)>,
}

/// The external unwinder contract. `initial_registers` is the prstatus-style
/// register blob for the CPU or thread being unwound.
pub trait Unwinder: Send {
    /// Whether the unwinder can walk a live process rather than a core
    /// dump or crashed kernel.
    fn supports_live(&self) -> bool {
        false
    }

    fn unwind(&self, prog: &Program, initial_registers: &[u8]) -> Result<Vec<FrameState>>;
}

/// An evaluated DWARF location for a variable in a frame.
#[derive(Debug, Clone, Copy)]
pub enum Location {
    /// The variable lives in memory at this address.
    Address(u64),
    /// The variable lives in a register.
    Register(u16),
}

pub struct StackTrace<'p> {
    prog: &'p Program,
    arch: &'static Architecture,
    frames: Vec<FrameState>,
}

impl std::fmt::Debug for StackTrace<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackTrace")
            .field("arch", self.arch)
            .field("frames", &self.frames)
            .finish()
    }
}

impl<'p> StackTrace<'p> {
    /// Unwinds a stack with the given unwinder. Live targets require the
    /// unwinder to advertise support.
    pub fn unwind(
        prog: &'p Program,
        arch: &'static Architecture,
        unwinder: &dyn Unwinder,
        initial_registers: &[u8],
        live: bool,
    ) -> Result<StackTrace<'p>> {
        if live && !unwinder.supports_live() {
            return Err(Error::InvalidArgument(
                "unwinding a live process is not supported".into(),
            ));
        }
        let frames = unwinder.unwind(prog, initial_registers)?;
        Ok(StackTrace { prog, arch, frames })
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Result<StackFrame<'_, 'p>> {
        if index >= self.frames.len() {
            return Err(Error::InvalidArgument("frame index out of range".into()));
        }
        Ok(StackFrame { trace: self, index })
    }

    /// One line per frame: `#i  symbol+0xoff` or the raw program counter.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for (i, frame) in self.frames.iter().enumerate() {
            match &frame.symbol {
                Some((name, 0)) => out.push_str(&format!("#{i}  {name}\n")),
                Some((name, offset)) => {
                    out.push_str(&format!("#{i}  {name}+{offset:#x}\n"))
                }
                None => out.push_str(&format!("#{i}  {pc:#x}\n", pc = frame.pc)),
            }
        }
        out
    }
}

pub struct StackFrame<'t, 'p> {
    trace: &'t StackTrace<'p>,
    index: usize,
}

impl<'p> StackFrame<'_, 'p> {
    fn state(&self) -> &FrameState {
        &self.trace.frames[self.index]
    }

    pub fn pc(&self) -> u64 {
        self.state().pc
    }

    pub fn symbol(&self) -> Option<&(String, u64)> {
        self.state().symbol.as_ref()
    }

    pub fn register(&self, number: u16) -> Result<u64> {
        self.state()
            .registers
            .get(usize::from(number))
            .copied()
            .flatten()
            .ok_or_else(|| Error::Lookup("register value is not known".into()))
    }

    pub fn register_by_name(&self, name: &str) -> Result<u64> {
        let number = self
            .trace
            .arch
            .register_number(name)
            .ok_or_else(|| Error::Lookup(format!("unknown register '{name}'")))?;
        self.register(number)
    }

    /// Materializes a frame variable from its evaluated location: an
    /// address becomes a reference object, a register becomes a value
    /// object over the register's bytes.
    pub fn object(
        &self,
        qualified_type: QualifiedType,
        location: Location,
    ) -> Result<Object<'p>> {
        let prog = self.trace.prog;
        let mut obj = Object::new(prog);
        match location {
            Location::Address(address) => {
                obj.set_reference(qualified_type, address, 0, 0, ByteOrder::Program)?;
            }
            Location::Register(number) => {
                let value = self.register(number)?;
                let bytes = if prog.is_little_endian() {
                    value.to_le_bytes()
                } else {
                    value.to_be_bytes()
                };
                obj.set_from_buffer_any(qualified_type, &bytes, ByteOrder::Program)?;
            }
        }
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::PrimitiveType;

    struct FixedUnwinder(Vec<(u64, Option<u64>)>);

    impl Unwinder for FixedUnwinder {
        fn unwind(
            &self,
            _prog: &Program,
            _initial_registers: &[u8],
        ) -> Result<Vec<FrameState>> {
            Ok(self
                .0
                .iter()
                .map(|&(pc, rdi)| FrameState {
                    pc,
                    registers: vec![None, None, None, None, None, rdi],
                    symbol: None,
                })
                .collect())
        }
    }

    fn prog() -> Program {
        Program::for_testing(true)
    }

    #[test]
    fn live_targets_require_the_capability() {
        let prog = prog();
        let unwinder = FixedUnwinder(vec![]);
        let err =
            StackTrace::unwind(&prog, &X86_64, &unwinder, &[], true).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        assert!(StackTrace::unwind(&prog, &X86_64, &unwinder, &[], false).is_ok());
    }

    #[test]
    fn registers_resolve_by_name() {
        let prog = prog();
        let unwinder = FixedUnwinder(vec![(0x401000, Some(42))]);
        let trace = StackTrace::unwind(&prog, &X86_64, &unwinder, &[], false).unwrap();
        let frame = trace.frame(0).unwrap();
        assert_eq!(frame.pc(), 0x401000);
        assert_eq!(frame.register_by_name("rdi").unwrap(), 42);
        assert_eq!(
            frame.register_by_name("rax").unwrap_err().kind(),
            crate::ErrorKind::Lookup
        );
        assert!(frame.register_by_name("xyz").is_err());
    }

    #[test]
    fn register_locations_become_value_objects() {
        let prog = prog();
        let unwinder = FixedUnwinder(vec![(0x401000, Some(0xffff_ffff_ffff_fffe))]);
        let trace = StackTrace::unwind(&prog, &X86_64, &unwinder, &[], false).unwrap();
        let frame = trace.frame(0).unwrap();
        let long =
            QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Long));
        let obj = frame.object(long, Location::Register(5)).unwrap();
        assert!(!obj.is_reference());
        assert_eq!(obj.read_signed().unwrap(), -2);
    }

    #[test]
    fn address_locations_become_references() {
        let prog = Program::for_testing_with_memory(true, 0x7000, vec![9, 0, 0, 0]);
        let unwinder = FixedUnwinder(vec![(0x401000, None)]);
        let trace = StackTrace::unwind(&prog, &X86_64, &unwinder, &[], false).unwrap();
        let frame = trace.frame(0).unwrap();
        let int = QualifiedType::unqualified(prog.types().primitive(PrimitiveType::Int));
        let obj = frame.object(int, Location::Address(0x7000)).unwrap();
        assert!(obj.is_reference());
        assert_eq!(obj.read_signed().unwrap(), 9);
    }

    #[test]
    fn traces_format_one_line_per_frame() {
        let prog = prog();
        struct Symbolized;
        impl Unwinder for Symbolized {
            fn unwind(
                &self,
                _prog: &Program,
                _initial_registers: &[u8],
            ) -> Result<Vec<FrameState>> {
                Ok(vec![
                    FrameState {
                        pc: 0x401000,
                        registers: vec![],
                        symbol: Some(("main".into(), 0x10)),
                    },
                    FrameState {
                        pc: 0x400800,
                        registers: vec![],
                        symbol: None,
                    },
                ])
            }
        }
        let trace = StackTrace::unwind(&prog, &X86_64, &Symbolized, &[], false).unwrap();
        assert_eq!(trace.format(), "#0  main+0x10\n#1  0x400800\n");
    }
}
