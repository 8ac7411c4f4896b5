//! The DWARF constants the indexer cares about.

pub(crate) const DW_TAG_ARRAY_TYPE: u64 = 0x01;
pub(crate) const DW_TAG_CLASS_TYPE: u64 = 0x02;
pub(crate) const DW_TAG_ENUMERATION_TYPE: u64 = 0x04;
pub(crate) const DW_TAG_FORMAL_PARAMETER: u64 = 0x05;
pub(crate) const DW_TAG_MEMBER: u64 = 0x0d;
pub(crate) const DW_TAG_POINTER_TYPE: u64 = 0x0f;
pub(crate) const DW_TAG_COMPILE_UNIT: u64 = 0x11;
pub(crate) const DW_TAG_STRUCTURE_TYPE: u64 = 0x13;
pub(crate) const DW_TAG_SUBROUTINE_TYPE: u64 = 0x15;
pub(crate) const DW_TAG_TYPEDEF: u64 = 0x16;
pub(crate) const DW_TAG_UNION_TYPE: u64 = 0x17;
pub(crate) const DW_TAG_UNSPECIFIED_PARAMETERS: u64 = 0x18;
pub(crate) const DW_TAG_SUBRANGE_TYPE: u64 = 0x21;
pub(crate) const DW_TAG_BASE_TYPE: u64 = 0x24;
pub(crate) const DW_TAG_CONST_TYPE: u64 = 0x26;
pub(crate) const DW_TAG_ENUMERATOR: u64 = 0x28;
pub(crate) const DW_TAG_SUBPROGRAM: u64 = 0x2e;
pub(crate) const DW_TAG_VARIABLE: u64 = 0x34;
pub(crate) const DW_TAG_VOLATILE_TYPE: u64 = 0x35;
pub(crate) const DW_TAG_RESTRICT_TYPE: u64 = 0x37;
pub(crate) const DW_TAG_ATOMIC_TYPE: u64 = 0x47;

pub(crate) const DW_AT_SIBLING: u64 = 0x01;
pub(crate) const DW_AT_NAME: u64 = 0x03;
pub(crate) const DW_AT_BYTE_SIZE: u64 = 0x0b;
pub(crate) const DW_AT_BIT_OFFSET: u64 = 0x0c;
pub(crate) const DW_AT_BIT_SIZE: u64 = 0x0d;
pub(crate) const DW_AT_STMT_LIST: u64 = 0x10;
pub(crate) const DW_AT_CONST_VALUE: u64 = 0x1c;
pub(crate) const DW_AT_UPPER_BOUND: u64 = 0x2f;
pub(crate) const DW_AT_COUNT: u64 = 0x37;
pub(crate) const DW_AT_DATA_MEMBER_LOCATION: u64 = 0x38;
pub(crate) const DW_AT_DECL_FILE: u64 = 0x3a;
pub(crate) const DW_AT_DECLARATION: u64 = 0x3c;
pub(crate) const DW_AT_ENCODING: u64 = 0x3e;
pub(crate) const DW_AT_SPECIFICATION: u64 = 0x47;
pub(crate) const DW_AT_TYPE: u64 = 0x49;
pub(crate) const DW_AT_DATA_BIT_OFFSET: u64 = 0x6b;

pub(crate) const DW_ATE_BOOLEAN: u64 = 0x02;
pub(crate) const DW_ATE_FLOAT: u64 = 0x04;
pub(crate) const DW_ATE_SIGNED: u64 = 0x05;
pub(crate) const DW_ATE_SIGNED_CHAR: u64 = 0x06;
pub(crate) const DW_ATE_UNSIGNED: u64 = 0x07;
pub(crate) const DW_ATE_UNSIGNED_CHAR: u64 = 0x08;

pub(crate) const DW_OP_PLUS_UCONST: u8 = 0x23;

pub(crate) const DW_FORM_ADDR: u64 = 0x01;
pub(crate) const DW_FORM_BLOCK2: u64 = 0x03;
pub(crate) const DW_FORM_BLOCK4: u64 = 0x04;
pub(crate) const DW_FORM_DATA2: u64 = 0x05;
pub(crate) const DW_FORM_DATA4: u64 = 0x06;
pub(crate) const DW_FORM_DATA8: u64 = 0x07;
pub(crate) const DW_FORM_STRING: u64 = 0x08;
pub(crate) const DW_FORM_BLOCK: u64 = 0x09;
pub(crate) const DW_FORM_BLOCK1: u64 = 0x0a;
pub(crate) const DW_FORM_DATA1: u64 = 0x0b;
pub(crate) const DW_FORM_FLAG: u64 = 0x0c;
pub(crate) const DW_FORM_SDATA: u64 = 0x0d;
pub(crate) const DW_FORM_STRP: u64 = 0x0e;
pub(crate) const DW_FORM_UDATA: u64 = 0x0f;
pub(crate) const DW_FORM_REF_ADDR: u64 = 0x10;
pub(crate) const DW_FORM_REF1: u64 = 0x11;
pub(crate) const DW_FORM_REF2: u64 = 0x12;
pub(crate) const DW_FORM_REF4: u64 = 0x13;
pub(crate) const DW_FORM_REF8: u64 = 0x14;
pub(crate) const DW_FORM_REF_UDATA: u64 = 0x15;
pub(crate) const DW_FORM_INDIRECT: u64 = 0x16;
pub(crate) const DW_FORM_SEC_OFFSET: u64 = 0x17;
pub(crate) const DW_FORM_EXPRLOC: u64 = 0x18;
pub(crate) const DW_FORM_FLAG_PRESENT: u64 = 0x19;
pub(crate) const DW_FORM_REF_SIG8: u64 = 0x20;
