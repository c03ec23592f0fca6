//! Minimal PE images for metadata tests: a native DLL, and managed
//! assemblies with a chosen machine, CLI flags, version and assembly-level
//! custom attributes.
//!
//! Layout: headers in the first 0x200 bytes, then one `.text` section at RVA
//! 0x2000 holding the CLI header followed by the metadata root.

#![allow(dead_code)]

pub const MACHINE_X86: u16 = 0x014C;
pub const MACHINE_AMD64: u16 = 0x8664;

pub const IL_ONLY: u32 = 0x01;
pub const REQUIRED_32BIT: u32 = 0x02;

/// File offset of the metadata root in a managed image.
pub const METADATA_ROOT_OFFSET: usize = HEADERS_SIZE + CLI_HEADER_SIZE;

const PE_OFFSET: usize = 0x80;
const HEADERS_SIZE: usize = 0x200;
const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: usize = 0x1000;
const SECTION_RVA: usize = 0x2000;
const CLI_HEADER_SIZE: usize = 72;
const CLI_HEADER_DIRECTORY: usize = 14;
const DIRECTORY_COUNT: usize = 16;

/// Table ids written by the builder.
const MODULE: u32 = 0x00;
const TYPE_REF: u32 = 0x01;
const MEMBER_REF: u32 = 0x0A;
const CUSTOM_ATTRIBUTE: u32 = 0x0C;
const ASSEMBLY: u32 = 0x20;

/// A managed assembly to build.
#[derive(Debug, Clone)]
pub struct Assembly<'a> {
    pub machine: u16,
    pub cli_flags: u32,
    pub version: [u16; 4],
    /// `(attribute type name, first string argument)` pairs on the assembly.
    pub attributes: Vec<(&'a str, &'a str)>,
}

impl Default for Assembly<'_> {
    fn default() -> Self {
        Self {
            machine: MACHINE_X86,
            cli_flags: IL_ONLY,
            version: [1, 0, 0, 0],
            attributes: Vec::new(),
        }
    }
}

impl<'a> Assembly<'a> {
    pub fn targeting(framework: &'a str) -> Self {
        Self {
            attributes: vec![("TargetFrameworkAttribute", framework)],
            ..Self::default()
        }
    }
}

// =============================================================================
// BYTE WRITING
// =============================================================================

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn pad_to(out: &mut Vec<u8>, alignment: usize) {
    out.resize(out.len().next_multiple_of(alignment), 0);
}

/// Append a NUL-terminated string; returns its heap index.
fn add_string(heap: &mut Vec<u8>, value: &str) -> u16 {
    let index = heap.len() as u16;
    heap.extend_from_slice(value.as_bytes());
    heap.push(0);
    index
}

/// Append a blob shorter than 128 bytes; returns its heap index.
fn add_blob(heap: &mut Vec<u8>, value: &[u8]) -> u16 {
    assert!(value.len() < 0x80);
    let index = heap.len() as u16;
    heap.push(value.len() as u8);
    heap.extend_from_slice(value);
    index
}

// =============================================================================
// IMAGES
// =============================================================================

/// A PE image with no CLI header.
pub fn native_dll() -> Vec<u8> {
    image(MACHINE_X86, &[0xC3; 16], false)
}

/// A managed assembly image.
pub fn managed_dll(assembly: &Assembly<'_>) -> Vec<u8> {
    let root = metadata_root(assembly);

    let mut section = Vec::new();
    put_u32(&mut section, CLI_HEADER_SIZE as u32);
    put_u16(&mut section, 2);
    put_u16(&mut section, 5);
    put_u32(&mut section, (SECTION_RVA + CLI_HEADER_SIZE) as u32);
    put_u32(&mut section, root.len() as u32);
    put_u32(&mut section, assembly.cli_flags);
    // Entry point token, then six empty directories.
    section.resize(CLI_HEADER_SIZE, 0);
    section.extend_from_slice(&root);

    image(assembly.machine, &section, true)
}

fn image(machine: u16, section: &[u8], managed: bool) -> Vec<u8> {
    let pe32_plus = machine == MACHINE_AMD64;
    let raw_size = section.len().next_multiple_of(FILE_ALIGNMENT);
    let mut out = Vec::new();

    // DOS header: magic and the PE header offset.
    out.extend_from_slice(b"MZ");
    out.resize(0x3C, 0);
    put_u32(&mut out, PE_OFFSET as u32);
    out.resize(PE_OFFSET, 0);
    out.extend_from_slice(b"PE\0\0");

    // COFF header.
    put_u16(&mut out, machine);
    put_u16(&mut out, 1);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u16(&mut out, if pe32_plus { 240 } else { 224 });
    put_u16(&mut out, if pe32_plus { 0x2022 } else { 0x2102 });

    // Optional header: standard fields.
    put_u16(&mut out, if pe32_plus { 0x20B } else { 0x10B });
    out.extend_from_slice(&[14, 0]);
    put_u32(&mut out, raw_size as u32);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, SECTION_RVA as u32);
    if pe32_plus {
        put_u64(&mut out, 0x1_8000_0000);
    } else {
        put_u32(&mut out, SECTION_RVA as u32);
        put_u32(&mut out, 0x1000_0000);
    }

    // Optional header: Windows fields.
    put_u32(&mut out, SECTION_ALIGNMENT as u32);
    put_u32(&mut out, FILE_ALIGNMENT as u32);
    for version in [6, 0, 0, 0, 6, 0] {
        put_u16(&mut out, version);
    }
    put_u32(&mut out, 0);
    put_u32(
        &mut out,
        (SECTION_RVA + section.len().next_multiple_of(SECTION_ALIGNMENT)) as u32,
    );
    put_u32(&mut out, HEADERS_SIZE as u32);
    put_u32(&mut out, 0);
    put_u16(&mut out, 3);
    put_u16(&mut out, 0x8160);
    for _ in 0..4 {
        if pe32_plus {
            put_u64(&mut out, 0x10_0000);
        } else {
            put_u32(&mut out, 0x10_0000);
        }
    }
    put_u32(&mut out, 0);
    put_u32(&mut out, DIRECTORY_COUNT as u32);

    for directory in 0..DIRECTORY_COUNT {
        if managed && directory == CLI_HEADER_DIRECTORY {
            put_u32(&mut out, SECTION_RVA as u32);
            put_u32(&mut out, CLI_HEADER_SIZE as u32);
        } else {
            put_u64(&mut out, 0);
        }
    }

    // Section table.
    out.extend_from_slice(b".text\0\0\0");
    put_u32(&mut out, section.len() as u32);
    put_u32(&mut out, SECTION_RVA as u32);
    put_u32(&mut out, raw_size as u32);
    put_u32(&mut out, HEADERS_SIZE as u32);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u16(&mut out, 0);
    put_u16(&mut out, 0);
    put_u32(&mut out, 0x6000_0020);

    out.resize(HEADERS_SIZE, 0);
    out.extend_from_slice(section);
    out.resize(HEADERS_SIZE + raw_size, 0);
    out
}

// =============================================================================
// METADATA
// =============================================================================

fn metadata_root(assembly: &Assembly<'_>) -> Vec<u8> {
    let mut strings = vec![0u8];
    let mut blobs = vec![0u8];

    let module_name = add_string(&mut strings, "Server.dll");
    let assembly_name = add_string(&mut strings, "Server");
    let namespace = add_string(&mut strings, "System.Runtime.Versioning");
    let constructor = add_string(&mut strings, ".ctor");
    // instance void (string)
    let signature = add_blob(&mut blobs, &[0x20, 0x01, 0x01, 0x0E]);

    let attributes: Vec<(u16, u16)> = assembly
        .attributes
        .iter()
        .map(|(type_name, argument)| {
            let mut value = vec![0x01, 0x00, argument.len() as u8];
            value.extend_from_slice(argument.as_bytes());
            value.extend_from_slice(&[0x00, 0x00]);
            (
                add_string(&mut strings, type_name),
                add_blob(&mut blobs, &value),
            )
        })
        .collect();
    let count = attributes.len() as u32;

    let mut tables = Vec::new();
    put_u32(&mut tables, 0);
    tables.extend_from_slice(&[2, 0, 0, 1]);
    let mut present = (1u64 << MODULE) | (1u64 << ASSEMBLY);
    if count > 0 {
        present |= (1u64 << TYPE_REF) | (1u64 << MEMBER_REF) | (1u64 << CUSTOM_ATTRIBUTE);
    }
    put_u64(&mut tables, present);
    put_u64(&mut tables, 0);

    put_u32(&mut tables, 1);
    if count > 0 {
        put_u32(&mut tables, count);
        put_u32(&mut tables, count);
        put_u32(&mut tables, count);
    }
    put_u32(&mut tables, 1);

    // Module
    put_u16(&mut tables, 0);
    put_u16(&mut tables, module_name);
    put_u16(&mut tables, 0);
    put_u16(&mut tables, 0);
    put_u16(&mut tables, 0);
    // TypeRef: scoped to AssemblyRef row 1
    for (type_name, _) in &attributes {
        put_u16(&mut tables, (1 << 2) | 2);
        put_u16(&mut tables, *type_name);
        put_u16(&mut tables, namespace);
    }
    // MemberRef: the constructor of TypeRef row n
    for row in 1..=count as u16 {
        put_u16(&mut tables, (row << 3) | 1);
        put_u16(&mut tables, constructor);
        put_u16(&mut tables, signature);
    }
    // CustomAttribute: on the assembly, constructed by MemberRef row n
    for (row, (_, value)) in (1u16..).zip(&attributes) {
        put_u16(&mut tables, (1 << 5) | 14);
        put_u16(&mut tables, (row << 3) | 3);
        put_u16(&mut tables, *value);
    }
    // Assembly
    put_u32(&mut tables, 0x8004);
    for part in assembly.version {
        put_u16(&mut tables, part);
    }
    put_u32(&mut tables, 0);
    put_u16(&mut tables, 0);
    put_u16(&mut tables, assembly_name);
    put_u16(&mut tables, 0);

    pad_to(&mut tables, 4);
    pad_to(&mut strings, 4);
    pad_to(&mut blobs, 4);

    let version = b"v4.0.30319\0\0";
    let mut root = Vec::new();
    put_u32(&mut root, 0x424A_5342);
    put_u16(&mut root, 1);
    put_u16(&mut root, 1);
    put_u32(&mut root, 0);
    put_u32(&mut root, version.len() as u32);
    root.extend_from_slice(version);
    put_u16(&mut root, 0);
    put_u16(&mut root, 3);

    let headers_size = 80;
    let streams: [(&str, &[u8]); 3] = [
        ("#~", &tables),
        ("#Strings", &strings),
        ("#Blob", &blobs),
    ];
    let mut offset = headers_size;
    for (name, data) in streams {
        put_u32(&mut root, offset as u32);
        put_u32(&mut root, data.len() as u32);
        root.extend_from_slice(name.as_bytes());
        root.push(0);
        pad_to(&mut root, 4);
        offset += data.len();
    }
    assert_eq!(root.len(), headers_size);
    for (_, data) in streams {
        root.extend_from_slice(data);
    }
    root
}
