//! # CLI Metadata
//!
//! Reads the metadata root of a managed image and the few tables the file
//! classifier needs: the `Assembly` row for the version, and the
//! `CustomAttribute` → `MemberRef` → `TypeRef` chain for the
//! `TargetFrameworkAttribute` string.
//!
//! Row sizes depend on heap sizes and row counts, so every table up to the
//! last one read is sized even though only four are decoded.

use crate::ComAdminError;
use crate::metadata::AssemblyVersion;
use scroll::ctx::StrCtx;
use scroll::{LE, Pread};

// =============================================================================
// CONSTANTS
// =============================================================================

/// `BSJB`, the first four bytes of the metadata root.
const METADATA_SIGNATURE: u32 = 0x424A_5342;

const STREAM_TABLES: &str = "#~";
const STREAM_TABLES_UNCOMPRESSED: &str = "#-";
const STREAM_STRINGS: &str = "#Strings";
const STREAM_BLOB: &str = "#Blob";

const HEAP_STRING_WIDE: u8 = 0x01;
const HEAP_GUID_WIDE: u8 = 0x02;
const HEAP_BLOB_WIDE: u8 = 0x04;
const HEAP_EXTRA_DATA: u8 = 0x40;

/// Tables with a known row layout: `Module` (0x00) to
/// `GenericParamConstraint` (0x2C).
const KNOWN_TABLES: usize = 0x2D;

const MODULE: usize = 0x00;
const TYPE_REF: usize = 0x01;
const TYPE_DEF: usize = 0x02;
const FIELD: usize = 0x04;
const METHOD_DEF: usize = 0x06;
const PARAM: usize = 0x08;
const INTERFACE_IMPL: usize = 0x09;
const MEMBER_REF: usize = 0x0A;
const CUSTOM_ATTRIBUTE: usize = 0x0C;
const DECL_SECURITY: usize = 0x0E;
const STAND_ALONE_SIG: usize = 0x11;
const EVENT: usize = 0x14;
const PROPERTY: usize = 0x17;
const MODULE_REF: usize = 0x1A;
const TYPE_SPEC: usize = 0x1B;
const ASSEMBLY: usize = 0x20;
const ASSEMBLY_REF: usize = 0x23;
const FILE: usize = 0x26;
const EXPORTED_TYPE: usize = 0x27;
const MANIFEST_RESOURCE: usize = 0x28;
const GENERIC_PARAM: usize = 0x2A;
const METHOD_SPEC: usize = 0x2B;
const GENERIC_PARAM_CONSTRAINT: usize = 0x2C;

/// `HasCustomAttribute` tag of the `Assembly` table.
const HAS_CUSTOM_ATTRIBUTE_ASSEMBLY: u32 = 14;
/// `CustomAttributeType` tag of the `MemberRef` table.
const ATTRIBUTE_TYPE_MEMBER_REF: u32 = 3;
/// `MemberRefParent` tag of the `TypeRef` table.
const MEMBER_PARENT_TYPE_REF: u32 = 1;

/// Prolog of every custom attribute value blob.
const ATTRIBUTE_PROLOG: u16 = 0x0001;
/// A serialized string of this length byte is null.
const NULL_STRING: u8 = 0xFF;

const TARGET_FRAMEWORK_ATTRIBUTE: &str = "TargetFrameworkAttribute";

fn malformed(what: impl std::fmt::Display) -> ComAdminError {
    ComAdminError::Metadata(format!("Malformed CLI metadata: {}", what))
}

// =============================================================================
// TABLE SCHEMA
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Coded {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl Coded {
    const fn tag_bits(self) -> u32 {
        match self {
            Self::HasCustomAttribute => 5,
            Self::MemberRefParent | Self::CustomAttributeType => 3,
            Self::TypeDefOrRef
            | Self::HasConstant
            | Self::HasDeclSecurity
            | Self::Implementation
            | Self::ResolutionScope => 2,
            Self::HasFieldMarshal
            | Self::HasSemantics
            | Self::MethodDefOrRef
            | Self::MemberForwarded
            | Self::TypeOrMethodDef => 1,
        }
    }

    /// Tables the index can point into.
    const fn tables(self) -> &'static [usize] {
        match self {
            Self::TypeDefOrRef => &[TYPE_DEF, TYPE_REF, TYPE_SPEC],
            Self::HasConstant => &[FIELD, PARAM, PROPERTY],
            Self::HasCustomAttribute => &[
                METHOD_DEF,
                FIELD,
                TYPE_REF,
                TYPE_DEF,
                PARAM,
                INTERFACE_IMPL,
                MEMBER_REF,
                MODULE,
                DECL_SECURITY,
                PROPERTY,
                EVENT,
                STAND_ALONE_SIG,
                MODULE_REF,
                TYPE_SPEC,
                ASSEMBLY,
                ASSEMBLY_REF,
                FILE,
                EXPORTED_TYPE,
                MANIFEST_RESOURCE,
                GENERIC_PARAM,
                GENERIC_PARAM_CONSTRAINT,
                METHOD_SPEC,
            ],
            Self::HasFieldMarshal => &[FIELD, PARAM],
            Self::HasDeclSecurity => &[TYPE_DEF, METHOD_DEF, ASSEMBLY],
            Self::MemberRefParent => &[TYPE_DEF, TYPE_REF, MODULE_REF, METHOD_DEF, TYPE_SPEC],
            Self::HasSemantics => &[EVENT, PROPERTY],
            Self::MethodDefOrRef => &[METHOD_DEF, MEMBER_REF],
            Self::MemberForwarded => &[FIELD, METHOD_DEF],
            Self::Implementation => &[FILE, ASSEMBLY_REF, EXPORTED_TYPE],
            Self::CustomAttributeType => &[METHOD_DEF, MEMBER_REF],
            Self::ResolutionScope => &[MODULE, MODULE_REF, ASSEMBLY_REF, TYPE_REF],
            Self::TypeOrMethodDef => &[TYPE_DEF, METHOD_DEF],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    U16,
    U32,
    Str,
    Guid,
    Blob,
    Table(usize),
    CodedIndex(Coded),
}

/// Row layout of each known table, in table-id order.
fn schema(table: usize) -> &'static [Column] {
    use Column::{Blob, CodedIndex, Guid, Str, Table, U16, U32};
    match table {
        0x00 => &[U16, Str, Guid, Guid, Guid],
        0x01 => &[CodedIndex(Coded::ResolutionScope), Str, Str],
        0x02 => &[
            U32,
            Str,
            Str,
            CodedIndex(Coded::TypeDefOrRef),
            Table(FIELD),
            Table(METHOD_DEF),
        ],
        0x03 => &[Table(FIELD)],
        0x04 => &[U16, Str, Blob],
        0x05 => &[Table(METHOD_DEF)],
        0x06 => &[U32, U16, U16, Str, Blob, Table(PARAM)],
        0x07 => &[Table(PARAM)],
        0x08 => &[U16, U16, Str],
        0x09 => &[Table(TYPE_DEF), CodedIndex(Coded::TypeDefOrRef)],
        0x0A => &[CodedIndex(Coded::MemberRefParent), Str, Blob],
        0x0B => &[U16, CodedIndex(Coded::HasConstant), Blob],
        0x0C => &[
            CodedIndex(Coded::HasCustomAttribute),
            CodedIndex(Coded::CustomAttributeType),
            Blob,
        ],
        0x0D => &[CodedIndex(Coded::HasFieldMarshal), Blob],
        0x0E => &[U16, CodedIndex(Coded::HasDeclSecurity), Blob],
        0x0F => &[U16, U32, Table(TYPE_DEF)],
        0x10 => &[U32, Table(FIELD)],
        0x11 => &[Blob],
        0x12 => &[Table(TYPE_DEF), Table(EVENT)],
        0x13 => &[Table(EVENT)],
        0x14 => &[U16, Str, CodedIndex(Coded::TypeDefOrRef)],
        0x15 => &[Table(TYPE_DEF), Table(PROPERTY)],
        0x16 => &[Table(PROPERTY)],
        0x17 => &[U16, Str, Blob],
        0x18 => &[U16, Table(METHOD_DEF), CodedIndex(Coded::HasSemantics)],
        0x19 => &[
            Table(TYPE_DEF),
            CodedIndex(Coded::MethodDefOrRef),
            CodedIndex(Coded::MethodDefOrRef),
        ],
        0x1A => &[Str],
        0x1B => &[Blob],
        0x1C => &[U16, CodedIndex(Coded::MemberForwarded), Str, Table(MODULE_REF)],
        0x1D => &[U32, Table(FIELD)],
        0x1E => &[U32, U32],
        0x1F => &[U32],
        0x20 => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
        0x21 => &[U32],
        0x22 => &[U32, U32, U32],
        0x23 => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
        0x24 => &[U32, Table(ASSEMBLY_REF)],
        0x25 => &[U32, U32, U32, Table(ASSEMBLY_REF)],
        0x26 => &[U32, Str, Blob],
        0x27 => &[U32, U32, Str, Str, CodedIndex(Coded::Implementation)],
        0x28 => &[U32, U32, Str, CodedIndex(Coded::Implementation)],
        0x29 => &[Table(TYPE_DEF), Table(TYPE_DEF)],
        0x2A => &[U16, U16, CodedIndex(Coded::TypeOrMethodDef), Str],
        0x2B => &[CodedIndex(Coded::MethodDefOrRef), Blob],
        0x2C => &[Table(GENERIC_PARAM), CodedIndex(Coded::TypeDefOrRef)],
        _ => &[],
    }
}

// =============================================================================
// METADATA ROOT
// =============================================================================

/// The streams of a metadata root that the table reader uses.
#[derive(Debug, Clone, Copy)]
struct Streams<'a> {
    tables: &'a [u8],
    strings: &'a [u8],
    blobs: &'a [u8],
}

fn read_streams(root: &[u8]) -> Result<Streams<'_>, ComAdminError> {
    let offset = &mut 0;
    let signature: u32 = root.gread_with(offset, LE).map_err(malformed)?;
    if signature != METADATA_SIGNATURE {
        return Err(malformed(format!(
            "bad metadata signature {:#010x}",
            signature
        )));
    }

    // Major and minor version, then a reserved word.
    *offset += 8;
    let version_length: u32 = root.gread_with(offset, LE).map_err(malformed)?;
    *offset += version_length as usize;
    let _flags: u16 = root.gread_with(offset, LE).map_err(malformed)?;
    let stream_count: u16 = root.gread_with(offset, LE).map_err(malformed)?;

    let mut tables = None;
    let mut strings: &[u8] = &[];
    let mut blobs: &[u8] = &[];
    for _ in 0..stream_count {
        let start: u32 = root.gread_with(offset, LE).map_err(malformed)?;
        let size: u32 = root.gread_with(offset, LE).map_err(malformed)?;
        let name: &str = root
            .gread_with(offset, StrCtx::Delimiter(0))
            .map_err(malformed)?;
        // Names are padded to four bytes past their terminator.
        *offset = offset.next_multiple_of(4);

        let data = root
            .get(start as usize..start as usize + size as usize)
            .ok_or_else(|| malformed(format!("stream '{}' is out of bounds", name)))?;
        match name {
            STREAM_TABLES | STREAM_TABLES_UNCOMPRESSED => tables = Some(data),
            STREAM_STRINGS => strings = data,
            STREAM_BLOB => blobs = data,
            _ => {}
        }
    }

    Ok(Streams {
        tables: tables.ok_or_else(|| malformed("no tables stream"))?,
        strings,
        blobs,
    })
}

// =============================================================================
// TABLES
// =============================================================================

/// Decoded table stream header with the offset and row size of every known
/// table.
#[derive(Debug)]
pub struct CliMetadata<'a> {
    streams: Streams<'a>,
    heap_sizes: u8,
    rows: [u32; KNOWN_TABLES],
    offsets: [usize; KNOWN_TABLES],
    row_sizes: [usize; KNOWN_TABLES],
}

impl<'a> CliMetadata<'a> {
    /// Parse a metadata root (the bytes the CLI header's metadata directory
    /// points at).
    pub fn parse(root: &'a [u8]) -> Result<Self, ComAdminError> {
        let streams = read_streams(root)?;
        let data = streams.tables;

        let heap_sizes: u8 = data.pread_with(6, LE).map_err(malformed)?;
        let valid: u64 = data.pread_with(8, LE).map_err(malformed)?;

        let offset = &mut 24;
        let mut rows = [0u32; KNOWN_TABLES];
        for table in (0..64).filter(|table| valid & (1u64 << table) != 0) {
            let count: u32 = data.gread_with(offset, LE).map_err(malformed)?;
            match rows.get_mut(table) {
                Some(slot) => *slot = count,
                // Tables past the known set come after every table read here.
                None => tracing::debug!(table, "skipping row count of unknown metadata table"),
            }
        }
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            *offset += 4;
        }

        let mut metadata = Self {
            streams,
            heap_sizes,
            rows,
            offsets: [0; KNOWN_TABLES],
            row_sizes: [0; KNOWN_TABLES],
        };
        let mut next = *offset;
        for table in 0..KNOWN_TABLES {
            let row_size: usize = schema(table)
                .iter()
                .map(|column| metadata.column_size(*column))
                .sum();
            metadata.offsets[table] = next;
            metadata.row_sizes[table] = row_size;
            next = next.saturating_add(row_size.saturating_mul(metadata.rows[table] as usize));
        }
        if next > data.len() {
            return Err(malformed("tables extend past the end of the stream"));
        }

        Ok(metadata)
    }

    fn column_size(&self, column: Column) -> usize {
        let wide = |flag: u8| if self.heap_sizes & flag != 0 { 4 } else { 2 };
        match column {
            Column::U16 => 2,
            Column::U32 => 4,
            Column::Str => wide(HEAP_STRING_WIDE),
            Column::Guid => wide(HEAP_GUID_WIDE),
            Column::Blob => wide(HEAP_BLOB_WIDE),
            Column::Table(table) => {
                if self.rows[table] > u32::from(u16::MAX) {
                    4
                } else {
                    2
                }
            }
            Column::CodedIndex(coded) => {
                let most = coded
                    .tables()
                    .iter()
                    .map(|table| self.rows[*table])
                    .max()
                    .unwrap_or(0);
                if most < 1 << (16 - coded.tag_bits()) {
                    2
                } else {
                    4
                }
            }
        }
    }

    /// Every column of a row (1-based), widened to `u32`.
    fn row(&self, table: usize, row: u32) -> Result<Vec<u32>, ComAdminError> {
        if row == 0 || row > self.rows[table] {
            return Err(malformed(format!(
                "row {} of table {:#04x} does not exist",
                row, table
            )));
        }

        let data = self.streams.tables;
        let offset = &mut (self.offsets[table] + (row as usize - 1) * self.row_sizes[table]);
        schema(table)
            .iter()
            .map(|column| match self.column_size(*column) {
                2 => data
                    .gread_with::<u16>(offset, LE)
                    .map(u32::from)
                    .map_err(malformed),
                _ => data.gread_with::<u32>(offset, LE).map_err(malformed),
            })
            .collect()
    }

    fn string(&self, index: u32) -> Result<&'a str, ComAdminError> {
        self.streams
            .strings
            .pread_with(index as usize, StrCtx::Delimiter(0))
            .map_err(malformed)
    }

    fn blob(&self, index: u32) -> Result<&'a [u8], ComAdminError> {
        let blobs = self.streams.blobs;
        let offset = &mut (index as usize);
        let length = read_compressed(blobs, offset)?;
        blobs
            .get(*offset..*offset + length as usize)
            .ok_or_else(|| malformed(format!("blob {} is out of bounds", index)))
    }

    /// The version in the `Assembly` row, or `None` for a module that is not
    /// an assembly.
    pub fn assembly_version(&self) -> Result<Option<AssemblyVersion>, ComAdminError> {
        if self.rows[ASSEMBLY] == 0 {
            return Ok(None);
        }
        let row = self.row(ASSEMBLY, 1)?;
        let part = |column: usize| row.get(column).copied().unwrap_or(0) as u16;
        Ok(Some(AssemblyVersion::new(part(1), part(2), part(3), part(4))))
    }

    /// The first string argument of the assembly's `TargetFrameworkAttribute`.
    ///
    /// Only attributes whose constructor is a `MemberRef` on a `TypeRef` are
    /// considered.
    pub fn target_framework(&self) -> Result<Option<String>, ComAdminError> {
        let assembly_parent =
            (1 << Coded::HasCustomAttribute.tag_bits()) | HAS_CUSTOM_ATTRIBUTE_ASSEMBLY;

        for index in 1..=self.rows[CUSTOM_ATTRIBUTE] {
            let attribute = self.row(CUSTOM_ATTRIBUTE, index)?;
            let [parent, constructor, value] = attribute[..] else {
                continue;
            };
            if parent != assembly_parent {
                continue;
            }
            let tag_mask = (1 << Coded::CustomAttributeType.tag_bits()) - 1;
            if constructor & tag_mask != ATTRIBUTE_TYPE_MEMBER_REF {
                continue;
            }

            let member = self.row(
                MEMBER_REF,
                constructor >> Coded::CustomAttributeType.tag_bits(),
            )?;
            let Some(&class) = member.first() else {
                continue;
            };
            let tag_mask = (1 << Coded::MemberRefParent.tag_bits()) - 1;
            if class & tag_mask != MEMBER_PARENT_TYPE_REF {
                continue;
            }

            let type_ref = self.row(TYPE_REF, class >> Coded::MemberRefParent.tag_bits())?;
            let Some(&name) = type_ref.get(1) else {
                continue;
            };
            if self.string(name)? != TARGET_FRAMEWORK_ATTRIBUTE {
                continue;
            }

            return first_string_argument(self.blob(value)?);
        }
        Ok(None)
    }
}

// =============================================================================
// BLOB DECODING
// =============================================================================

/// An ECMA-335 compressed unsigned integer (one, two or four bytes).
fn read_compressed(bytes: &[u8], offset: &mut usize) -> Result<u32, ComAdminError> {
    let first: u8 = bytes.gread_with(offset, LE).map_err(malformed)?;
    if first & 0x80 == 0 {
        return Ok(u32::from(first));
    }
    if first & 0xC0 == 0x80 {
        let second: u8 = bytes.gread_with(offset, LE).map_err(malformed)?;
        return Ok((u32::from(first & 0x3F) << 8) | u32::from(second));
    }
    if first & 0xE0 == 0xC0 {
        let rest: [u8; 3] = [
            bytes.gread_with(offset, LE).map_err(malformed)?,
            bytes.gread_with(offset, LE).map_err(malformed)?,
            bytes.gread_with(offset, LE).map_err(malformed)?,
        ];
        return Ok((u32::from(first & 0x1F) << 24)
            | (u32::from(rest[0]) << 16)
            | (u32::from(rest[1]) << 8)
            | u32::from(rest[2]));
    }
    Err(malformed(format!("bad compressed integer lead byte {:#04x}", first)))
}

/// Decode the first fixed argument of a custom attribute value as a string.
fn first_string_argument(value: &[u8]) -> Result<Option<String>, ComAdminError> {
    let offset = &mut 0;
    let prolog: u16 = value.gread_with(offset, LE).map_err(malformed)?;
    if prolog != ATTRIBUTE_PROLOG {
        return Err(malformed(format!("bad custom attribute prolog {:#06x}", prolog)));
    }
    if value.get(*offset) == Some(&NULL_STRING) {
        return Ok(None);
    }

    let length = read_compressed(value, offset)? as usize;
    let text = value
        .get(*offset..*offset + length)
        .ok_or_else(|| malformed("attribute string is out of bounds"))?;
    std::str::from_utf8(text)
        .map(|text| Some(text.to_string()))
        .map_err(malformed)
}

// =============================================================================
// TESTS
// =============================================================================
