//! Crate-level integration tests and the synthetic-image builders they use.

use crate::index::consts::*;
use crate::index::{DwarfIndex, IndexFlags};
use crate::object::Object;
use crate::program::{FindObjectFlags, ObjectFinder, Program};
use crate::ty::{
    LazyType, Member, NamedKind, PrimitiveType, QualifiedType, Type, TypeFinder,
};
use crate::{ByteOrder, Error, ErrorKind, Result};

/// Two compile units defining `int foo;` from different source files are
/// distinct definitions under one name.
#[test]
fn definitions_are_distinguished_by_source_file() {
    let abbrev = image::AbbrevBuilder::new()
        .decl(DW_TAG_COMPILE_UNIT, true)
        .attr(DW_AT_STMT_LIST, DW_FORM_DATA4)
        .finish_decl()
        .decl(DW_TAG_VARIABLE, false)
        .attr(DW_AT_NAME, DW_FORM_STRING)
        .attr(DW_AT_DECL_FILE, DW_FORM_DATA1)
        .finish_decl()
        .build();

    let line_a = image::LineProgram::new().file(b"a.c", 0).build();
    let line_b = image::LineProgram::new().file(b"b.c", 0).build();
    let line_b_offset = line_a.len() as u32;
    let mut debug_line = line_a;
    debug_line.extend_from_slice(&line_b);

    let mut cu_a = image::CuBuilder::new();
    cu_a.die(1).u32(0);
    cu_a.die(2).cstr(b"foo").u8(1);
    cu_a.null();
    let mut cu_b = image::CuBuilder::new();
    cu_b.die(1).u32(line_b_offset);
    cu_b.die(2).cstr(b"foo").u8(1);
    cu_b.null();
    let mut debug_info = cu_a.build();
    debug_info.extend_from_slice(&cu_b.build());

    let elf = image::ElfImage::new()
        .section(".debug_abbrev", abbrev)
        .section(".debug_info", debug_info)
        .section(".debug_line", debug_line)
        .section(".debug_str", vec![0])
        .build();

    let mut index = DwarfIndex::new(IndexFlags::ALL).unwrap();
    index.open_image(&elf).unwrap();
    index.update().unwrap();

    let foo: Vec<_> = index.lookup("foo", &[DW_TAG_VARIABLE]).collect();
    assert_eq!(foo.len(), 2);
    assert_ne!(foo[0].file_name_hash, foo[1].file_name_hash);
    assert_ne!(foo[0].offset, foo[1].offset);
}

/// The struct from the member-lookup contract, resolved through the C
/// front-end: `struct S { int a; char b:3; char c:5; }`.
struct SFinder(Type);

impl TypeFinder for SFinder {
    fn find(
        &self,
        kind: NamedKind,
        name: &str,
        _filename: Option<&str>,
    ) -> Result<QualifiedType> {
        if kind == NamedKind::Struct && name == "S" {
            Ok(QualifiedType::unqualified(self.0.clone()))
        } else {
            Err(Error::Lookup(format!("could not find '{name}'")))
        }
    }
}

fn bit_field_struct(prog: &Program) -> Type {
    let int = prog.types().primitive(PrimitiveType::Int);
    let char_type = prog.types().primitive(PrimitiveType::Char);
    Type::structure(
        Some("S"),
        8,
        vec![
            Member::new(
                Some("a"),
                LazyType::resolved(QualifiedType::unqualified(int)),
                0,
                0,
            ),
            Member::new(
                Some("b"),
                LazyType::resolved(QualifiedType::unqualified(char_type.clone())),
                32,
                3,
            ),
            Member::new(
                Some("c"),
                LazyType::resolved(QualifiedType::unqualified(char_type)),
                40,
                5,
            ),
        ],
    )
}

#[test]
fn member_lookup_through_the_front_end() {
    let prog = Program::for_testing(true);
    let s = bit_field_struct(&prog);
    prog.types_mut().register_finder(Box::new(SFinder(s)));

    let qualified_type = prog.find_type("struct S", None).unwrap();
    let info = qualified_type.ty.member_info("c").unwrap();
    assert_eq!(info.qualified_type.ty.primitive(), Some(PrimitiveType::Char));
    assert_eq!(info.bit_offset, 40);
    assert_eq!(info.bit_field_size, 5);

    // The same offsets drive the designator grammar.
    assert_eq!(crate::c::bit_offset(&qualified_type.ty, "c").unwrap(), 40);
}

#[test]
fn bit_fields_read_back_through_objects() {
    // struct S { int a = -1; char b:3 = 2; char c:5 = -5; } in memory.
    // Byte 4 holds b in bits 0..3 and c in bits 3..8... c is at bit 40,
    // so byte 5 holds c in its low 5 bits.
    let mut bytes = vec![0u8; 8];
    bytes[..4].copy_from_slice(&(-1i32).to_le_bytes());
    bytes[4] = 0b0000_0010;
    bytes[5] = 0b0001_1011; // -5 in 5 bits
    let prog = Program::for_testing_with_memory(true, 0x1000, bytes);
    let s = bit_field_struct(&prog);

    let mut obj = Object::new(&prog);
    obj.set_reference(
        QualifiedType::unqualified(s),
        0x1000,
        0,
        0,
        ByteOrder::Program,
    )
    .unwrap();
    assert_eq!(obj.member("a").unwrap().read_signed().unwrap(), -1);
    assert_eq!(obj.member("b").unwrap().read_signed().unwrap(), 2);
    assert_eq!(obj.member("c").unwrap().read_signed().unwrap(), -5);
    assert_eq!(obj.member("b").unwrap().bit_size(), 3);
}

/// An object finder standing in for the usual debug-information-backed one.
struct OneVariable {
    name: &'static str,
    address: u64,
    ty: Type,
}

impl ObjectFinder for OneVariable {
    fn find<'p>(
        &self,
        prog: &'p Program,
        name: &str,
        _filename: Option<&str>,
        flags: FindObjectFlags,
    ) -> Result<Object<'p>> {
        if name != self.name || !flags.contains(FindObjectFlags::VARIABLE) {
            return Err(Error::Lookup(format!("could not find '{name}'")));
        }
        let mut obj = Object::new(prog);
        obj.set_reference(
            QualifiedType::unqualified(self.ty.clone()),
            self.address,
            0,
            0,
            ByteOrder::Program,
        )?;
        Ok(obj)
    }
}

#[test]
fn objects_resolve_by_name_and_compute() {
    let mut prog = Program::for_testing_with_memory(
        true,
        0x2000,
        vec![10, 0, 0, 0, 20, 0, 0, 0, 30, 0, 0, 0],
    );
    let int = prog.types().primitive(PrimitiveType::Int);
    let values = prog
        .types_mut()
        .array_of(3, QualifiedType::unqualified(int));
    prog.register_object_finder(Box::new(OneVariable {
        name: "values",
        address: 0x2000,
        ty: values,
    }));

    let values = prog
        .find_object("values", None, FindObjectFlags::ANY)
        .unwrap();
    assert_eq!(values.subscript(1).unwrap().read_signed().unwrap(), 20);

    // &values[1] + 1 points at values[2].
    let second = values.subscript(1).unwrap().address_of().unwrap();
    let third = crate::c::add(&second, &prog.integer_literal(1).unwrap()).unwrap();
    assert_eq!(third.dereference().unwrap().read_signed().unwrap(), 30);

    // values - nothing else - is found.
    assert_eq!(
        prog.find_object("nope", None, FindObjectFlags::ANY)
            .unwrap_err()
            .kind(),
        ErrorKind::Lookup
    );
}

#[test]
fn formatted_output_composes_across_layers() {
    let prog = Program::for_testing_with_memory(
        true,
        0x3000,
        vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0],
    );
    let int = prog.types().primitive(PrimitiveType::Int);
    let array = prog
        .types_mut()
        .array_of(3, QualifiedType::unqualified(int));
    let mut obj = Object::new(&prog);
    obj.set_reference(
        QualifiedType::unqualified(array),
        0x3000,
        0,
        0,
        ByteOrder::Program,
    )
    .unwrap();

    assert_eq!(
        crate::c::format_object(&obj, 80).unwrap(),
        "(int [3]){ 1, 2, 3 }"
    );
    assert_eq!(
        crate::c::format_object(&obj, 4).unwrap(),
        "(int [3]){\n\t1,\n\t2,\n\t3,\n}"
    );
}

#[test]
fn non_printable_string_bytes_are_escaped() {
    let prog = Program::for_testing_with_memory(
        true,
        0x4000,
        b"a\x01\"b\\\x7f\0".to_vec(),
    );
    let char_type = prog.types().primitive(PrimitiveType::Char);
    let pointer = prog
        .types_mut()
        .pointer_to(QualifiedType::unqualified(char_type));
    let mut obj = Object::new(&prog);
    obj.set_unsigned(QualifiedType::unqualified(pointer), 0x4000, 0)
        .unwrap();
    assert_eq!(
        crate::c::format_object(&obj, 80).unwrap(),
        "(char *)0x4000 = \"a\\x01\\\"b\\\\\\x7f\""
    );
}

/// Setter reconstruction of a reference reads the same value.
#[test]
fn reference_reconstruction_round_trips() {
    let prog = Program::for_testing_with_memory(true, 0x5000, vec![0xaa, 0xbb, 0xcc, 0xdd]);
    let qualified_type =
        QualifiedType::unqualified(prog.types().primitive(PrimitiveType::UnsignedInt));
    let mut original = Object::new(&prog);
    original
        .set_reference(qualified_type.clone(), 0x5000, 0, 0, ByteOrder::Program)
        .unwrap();
    let mut rebuilt = Object::new(&prog);
    rebuilt
        .set_reference(
            qualified_type,
            original.address().unwrap(),
            0,
            0,
            ByteOrder::Program,
        )
        .unwrap();
    assert_eq!(
        original.read_unsigned().unwrap(),
        rebuilt.read_unsigned().unwrap()
    );
}

pub(crate) mod image {
    //! Builders for small ELF and DWARF byte images used across the test
    //! modules. Only the little-endian 64-bit shapes the tests need.

    const EHDR_SIZE: usize = 64;
    const SHDR_SIZE: usize = 64;

    const SHT_PROGBITS: u32 = 1;
    const SHT_SYMTAB: u32 = 2;
    const SHT_RELA: u32 = 4;

    struct Section {
        name: String,
        data: Vec<u8>,
        sh_type: u32,
        /// Name of the section this RELA section targets.
        rela_target: Option<String>,
    }

    pub struct ElfImage {
        sections: Vec<Section>,
        machine: u16,
    }

    impl ElfImage {
        pub fn new() -> Self {
            ElfImage {
                sections: Vec::new(),
                machine: crate::elf::EM_X86_64,
            }
        }

        pub fn section(mut self, name: &str, data: Vec<u8>) -> Self {
            let sh_type = if name == ".symtab" {
                SHT_SYMTAB
            } else {
                SHT_PROGBITS
            };
            self.sections.push(Section {
                name: name.to_string(),
                data,
                sh_type,
                rela_target: None,
            });
            self
        }

        pub fn rela(mut self, target: &str, data: Vec<u8>) -> Self {
            self.sections.push(Section {
                name: format!(".rela{target}"),
                data,
                sh_type: SHT_RELA,
                rela_target: Some(target.to_string()),
            });
            self
        }

        pub fn build(self) -> Vec<u8> {
            // Section 0 is the null section; user sections follow in
            // insertion order; .shstrtab comes last.
            let num_sections = self.sections.len() + 2;
            let shstrndx = num_sections - 1;

            let mut shstrtab = vec![0u8];
            let mut name_offsets = Vec::new();
            for section in &self.sections {
                name_offsets.push(shstrtab.len() as u32);
                shstrtab.extend_from_slice(section.name.as_bytes());
                shstrtab.push(0);
            }
            let shstrtab_name_offset = shstrtab.len() as u32;
            shstrtab.extend_from_slice(b".shstrtab\0");

            let index_of = |name: &str| -> u32 {
                self.sections
                    .iter()
                    .position(|s| s.name == name)
                    .map(|i| i as u32 + 1)
                    .unwrap_or(0)
            };

            let mut data_offsets = Vec::new();
            let mut offset = EHDR_SIZE;
            for section in &self.sections {
                data_offsets.push(offset as u64);
                offset += section.data.len();
            }
            let shstrtab_offset = offset as u64;
            offset += shstrtab.len();
            let shoff = offset as u64;

            let mut image = Vec::with_capacity(offset + num_sections * SHDR_SIZE);
            image.extend_from_slice(b"\x7fELF");
            image.push(2); // ELFCLASS64
            image.push(1); // ELFDATA2LSB
            image.push(1); // EV_CURRENT
            image.extend_from_slice(&[0; 9]);
            image.extend_from_slice(&1u16.to_le_bytes()); // ET_REL
            image.extend_from_slice(&self.machine.to_le_bytes());
            image.extend_from_slice(&1u32.to_le_bytes());
            image.extend_from_slice(&0u64.to_le_bytes()); // e_entry
            image.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
            image.extend_from_slice(&shoff.to_le_bytes());
            image.extend_from_slice(&0u32.to_le_bytes()); // e_flags
            image.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
            image.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
            image.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
            image.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
            image.extend_from_slice(&(num_sections as u16).to_le_bytes());
            image.extend_from_slice(&(shstrndx as u16).to_le_bytes());
            debug_assert_eq!(image.len(), EHDR_SIZE);

            for section in &self.sections {
                image.extend_from_slice(&section.data);
            }
            image.extend_from_slice(&shstrtab);

            let mut push_shdr = |name: u32,
                                 sh_type: u32,
                                 offset: u64,
                                 size: u64,
                                 link: u32,
                                 info: u32| {
                image.extend_from_slice(&name.to_le_bytes());
                image.extend_from_slice(&sh_type.to_le_bytes());
                image.extend_from_slice(&0u64.to_le_bytes()); // sh_flags
                image.extend_from_slice(&0u64.to_le_bytes()); // sh_addr
                image.extend_from_slice(&offset.to_le_bytes());
                image.extend_from_slice(&size.to_le_bytes());
                image.extend_from_slice(&link.to_le_bytes());
                image.extend_from_slice(&info.to_le_bytes());
                image.extend_from_slice(&0u64.to_le_bytes()); // sh_addralign
                image.extend_from_slice(&0u64.to_le_bytes()); // sh_entsize
            };

            push_shdr(0, 0, 0, 0, 0, 0);
            for (i, section) in self.sections.iter().enumerate() {
                let (link, info) = match &section.rela_target {
                    Some(target) => (index_of(".symtab"), index_of(target)),
                    None => (0, 0),
                };
                push_shdr(
                    name_offsets[i],
                    section.sh_type,
                    data_offsets[i],
                    section.data.len() as u64,
                    link,
                    info,
                );
            }
            push_shdr(
                shstrtab_name_offset,
                SHT_PROGBITS,
                shstrtab_offset,
                shstrtab.len() as u64,
                0,
                0,
            );
            image
        }
    }

    pub fn uleb(out: &mut Vec<u8>, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    /// Builds a `.debug_abbrev` table with sequential codes from one.
    pub struct AbbrevBuilder {
        data: Vec<u8>,
        next_code: u64,
    }

    impl AbbrevBuilder {
        pub fn new() -> Self {
            AbbrevBuilder {
                data: Vec::new(),
                next_code: 1,
            }
        }

        pub fn decl(mut self, tag: u64, children: bool) -> Self {
            uleb(&mut self.data, self.next_code);
            self.next_code += 1;
            uleb(&mut self.data, tag);
            self.data.push(children as u8);
            self
        }

        pub fn attr(mut self, name: u64, form: u64) -> Self {
            uleb(&mut self.data, name);
            uleb(&mut self.data, form);
            self
        }

        pub fn finish_decl(mut self) -> Self {
            self.data.push(0);
            self.data.push(0);
            self
        }

        pub fn build(mut self) -> Vec<u8> {
            self.data.push(0);
            self.data
        }
    }

    /// Builds a minimal DWARF 2 line-number program header with its
    /// directory and file tables.
    pub struct LineProgram {
        directories: Vec<Vec<u8>>,
        files: Vec<(Vec<u8>, u64)>,
    }

    impl LineProgram {
        pub fn new() -> Self {
            LineProgram {
                directories: Vec::new(),
                files: Vec::new(),
            }
        }

        pub fn directory(mut self, path: &[u8]) -> Self {
            self.directories.push(path.to_vec());
            self
        }

        pub fn file(mut self, name: &[u8], directory_index: u64) -> Self {
            self.files.push((name.to_vec(), directory_index));
            self
        }

        pub fn build(self) -> Vec<u8> {
            let mut body = Vec::new();
            body.extend_from_slice(&2u16.to_le_bytes()); // version
            let mut tables = Vec::new();
            for dir in &self.directories {
                tables.extend_from_slice(dir);
                tables.push(0);
            }
            tables.push(0);
            for (name, directory_index) in &self.files {
                tables.extend_from_slice(name);
                tables.push(0);
                uleb(&mut tables, *directory_index);
                uleb(&mut tables, 0); // mtime
                uleb(&mut tables, 0); // size
            }
            tables.push(0);

            // header_length covers everything after itself.
            let header_length = 5 + tables.len() as u32;
            body.extend_from_slice(&header_length.to_le_bytes());
            body.push(1); // minimum_instruction_length
            body.push(1); // default_is_stmt
            body.push(1); // line_base
            body.push(1); // line_range
            body.push(1); // opcode_base, no standard opcode lengths
            body.extend_from_slice(&tables);

            let mut out = Vec::new();
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(&body);
            out
        }
    }

    /// Builds one 32-bit DWARF 4 compile unit as a `.debug_info` image.
    pub struct CuBuilder {
        body: Vec<u8>,
    }

    impl CuBuilder {
        pub fn new() -> Self {
            CuBuilder { body: Vec::new() }
        }

        pub fn die(&mut self, code: u64) -> &mut Self {
            uleb(&mut self.body, code);
            self
        }

        pub fn null(&mut self) -> &mut Self {
            self.body.push(0);
            self
        }

        pub fn u8(&mut self, value: u8) -> &mut Self {
            self.body.push(value);
            self
        }

        pub fn u32(&mut self, value: u32) -> &mut Self {
            self.body.extend_from_slice(&value.to_le_bytes());
            self
        }

        /// The section offset at which the next DIE will start.
        pub fn offset(&self) -> usize {
            11 + self.body.len()
        }

        /// Reserves a u32 attribute to be filled in by [`Self::patch_u32`],
        /// for forward references.
        pub fn u32_placeholder(&mut self) -> usize {
            let at = self.body.len();
            self.u32(0);
            at
        }

        pub fn patch_u32(&mut self, at: usize, value: u32) {
            self.body[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }

        pub fn cstr(&mut self, value: &[u8]) -> &mut Self {
            self.body.extend_from_slice(value);
            self.body.push(0);
            self
        }

        pub fn build(&self) -> Vec<u8> {
            // unit_length, version, debug_abbrev_offset, address_size.
            let mut out = Vec::new();
            let unit_length = 2 + 4 + 1 + self.body.len() as u32;
            out.extend_from_slice(&unit_length.to_le_bytes());
            out.extend_from_slice(&4u16.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.push(8);
            out.extend_from_slice(&self.body);
            out
        }
    }
}
