//! # UUID Extraction
//!
//! Reads the set of slice UUIDs embedded in a dSYM bundle.
//!
//! Two sources are available:
//!
//! - [`DwarfdumpSource`] shells out to `dwarfdump --uuid`, which is what
//!   Xcode itself uses and works for any bundle the toolchain understands.
//! - [`MachOSource`] reads `LC_UUID` load commands directly with the `object`
//!   crate. It needs no Apple tooling, which makes it usable on CI hosts that
//!   only post-process artifacts.
//!
//! `dwarfdump --uuid` prints one line per slice:
//!
//! ```text
//! UUID: A5CD23BB-91EF-39A0-8235-9C72BD77B2D7 (arm64) MySDK.framework.dSYM/Contents/Resources/DWARF/MySDK
//! ```
//!
//! The UUID is the whitespace-separated token after the `UUID:` field.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use object::read::macho::{FatArch, MachOFatFile32, MachOFatFile64};
use object::{FileKind, Object};
use serde::Deserialize;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{SymfuseError, SymfuseResult};
use crate::tool::{ToolCommand, ToolRunner};
use crate::types::{DebugInfoBundle, SliceUuid};

/// Something that can list the UUIDs inside a dSYM
pub trait IdentifierSource
{
    /// UUIDs embedded in `bundle`, deduplicated, in discovery order
    ///
    /// An empty result is returned as-is; deciding that it is fatal is the
    /// caller's job.
    ///
    /// ## Errors
    ///
    /// Tool failures and I/O errors propagate unchanged.
    fn identifiers(&self, bundle: &Path) -> SymfuseResult<Vec<SliceUuid>>;
}

impl<T: IdentifierSource + ?Sized> IdentifierSource for &T
{
    fn identifiers(&self, bundle: &Path) -> SymfuseResult<Vec<SliceUuid>>
    {
        (**self).identifiers(bundle)
    }
}

impl<T: IdentifierSource + ?Sized> IdentifierSource for Box<T>
{
    fn identifiers(&self, bundle: &Path) -> SymfuseResult<Vec<SliceUuid>>
    {
        (**self).identifiers(bundle)
    }
}

/// Which [`IdentifierSource`] to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierSourceKind
{
    /// `dwarfdump --uuid`
    #[default]
    Dwarfdump,
    /// Native Mach-O parsing
    Macho,
}

impl FromStr for IdentifierSourceKind
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "dwarfdump" => Ok(IdentifierSourceKind::Dwarfdump),
            "macho" | "mach-o" | "native" => Ok(IdentifierSourceKind::Macho),
            _ => Err(format!("Unknown identifier source: {s}. Use 'dwarfdump' or 'macho'")),
        }
    }
}

fn push_unique(found: &mut Vec<SliceUuid>, uuid: SliceUuid)
{
    if !found.contains(&uuid) {
        found.push(uuid);
    }
}

/// Parse `dwarfdump --uuid` output
///
/// Lines without a UUID in the second field (warnings, blank lines) are
/// skipped.
pub fn parse_uuid_listing(text: &str) -> Vec<SliceUuid>
{
    let mut found = Vec::new();
    for line in text.lines() {
        let Some(token) = line.split_whitespace().nth(1) else {
            continue;
        };
        match token.parse::<SliceUuid>() {
            Ok(uuid) => push_unique(&mut found, uuid),
            Err(_) => trace!(line, "skipping line without UUID"),
        }
    }
    found
}

/// [`IdentifierSource`] that runs `dwarfdump --uuid`
#[derive(Debug, Clone)]
pub struct DwarfdumpSource<R>
{
    runner: R,
    program: String,
}

impl<R: ToolRunner> DwarfdumpSource<R>
{
    pub fn new(runner: R) -> Self
    {
        Self::with_program(runner, "dwarfdump")
    }

    pub fn with_program(runner: R, program: impl Into<String>) -> Self
    {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn command(&self, bundle: &Path) -> ToolCommand
    {
        ToolCommand::new(&self.program).arg("--uuid").arg(bundle)
    }
}

impl<R: ToolRunner> IdentifierSource for DwarfdumpSource<R>
{
    fn identifiers(&self, bundle: &Path) -> SymfuseResult<Vec<SliceUuid>>
    {
        let output = self.runner.run_checked(&self.command(bundle))?;
        let uuids = parse_uuid_listing(&output.stdout);
        debug!(bundle = %bundle.display(), count = uuids.len(), "dwarfdump listed UUIDs");
        Ok(uuids)
    }
}

/// [`IdentifierSource`] that reads `LC_UUID` from Mach-O files
///
/// Accepts either a `.dSYM` bundle (every file under
/// `Contents/Resources/DWARF` is inspected) or a single Mach-O file. Thin and
/// universal binaries are both handled. Files that are not Mach-O are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachOSource;

impl MachOSource
{
    fn invalid(path: &Path, err: &object::Error) -> SymfuseError
    {
        SymfuseError::InvalidObject {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    fn thin_uuid(path: &Path, data: &[u8]) -> SymfuseResult<Option<SliceUuid>>
    {
        let file = object::File::parse(data).map_err(|err| Self::invalid(path, &err))?;
        let uuid = file.mach_uuid().map_err(|err| Self::invalid(path, &err))?;
        Ok(uuid.map(SliceUuid::from_bytes))
    }

    fn fat_uuids<A: FatArch>(path: &Path, data: &[u8], arches: &[A], found: &mut Vec<SliceUuid>) -> SymfuseResult<()>
    {
        for arch in arches {
            let slice = arch.data(data).map_err(|err| Self::invalid(path, &err))?;
            if let Some(uuid) = Self::thin_uuid(path, slice)? {
                push_unique(found, uuid);
            }
        }
        Ok(())
    }

    /// UUIDs of one file's slices
    ///
    /// ## Errors
    ///
    /// Returns `InvalidObject` when the file claims to be Mach-O but is
    /// malformed.
    pub fn file_uuids(path: &Path, data: &[u8]) -> SymfuseResult<Vec<SliceUuid>>
    {
        let mut found = Vec::new();
        let Ok(kind) = FileKind::parse(data) else {
            trace!(path = %path.display(), "not an object file");
            return Ok(found);
        };

        match kind {
            FileKind::MachO32 | FileKind::MachO64 => {
                if let Some(uuid) = Self::thin_uuid(path, data)? {
                    found.push(uuid);
                }
            }
            FileKind::MachOFat32 => {
                let fat = MachOFatFile32::parse(data).map_err(|err| Self::invalid(path, &err))?;
                Self::fat_uuids(path, data, fat.arches(), &mut found)?;
            }
            FileKind::MachOFat64 => {
                let fat = MachOFatFile64::parse(data).map_err(|err| Self::invalid(path, &err))?;
                Self::fat_uuids(path, data, fat.arches(), &mut found)?;
            }
            other => trace!(path = %path.display(), ?other, "skipping non-Mach-O file"),
        }
        Ok(found)
    }
}

impl IdentifierSource for MachOSource
{
    fn identifiers(&self, bundle: &Path) -> SymfuseResult<Vec<SliceUuid>>
    {
        if bundle.is_file() {
            return Self::file_uuids(bundle, &fs::read(bundle)?);
        }

        let dwarf_dir = DebugInfoBundle::new(bundle).dwarf_dir();
        let root = if dwarf_dir.is_dir() { dwarf_dir } else { bundle.to_path_buf() };

        let mut found = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let data = fs::read(entry.path())?;
            for uuid in Self::file_uuids(entry.path(), &data)? {
                push_unique(&mut found, uuid);
            }
        }
        debug!(bundle = %bundle.display(), count = found.len(), "read UUIDs from Mach-O");
        Ok(found)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_dwarfdump_listing()
    {
        let text = "\
UUID: A5CD23BB-91EF-39A0-8235-9C72BD77B2D7 (arm64) /build/MySDK.framework.dSYM/Contents/Resources/DWARF/MySDK
UUID: 11111111-2222-3333-4444-555555555555 (armv7) /build/MySDK.framework.dSYM/Contents/Resources/DWARF/MySDK
";
        let uuids = parse_uuid_listing(text);
        assert_eq!(uuids.len(), 2);
        assert_eq!(uuids[0].to_string(), "A5CD23BB-91EF-39A0-8235-9C72BD77B2D7");
        assert_eq!(uuids[1].to_string(), "11111111-2222-3333-4444-555555555555");
    }

    #[test]
    fn test_parse_skips_noise_and_duplicates()
    {
        let text = "\
warning: (arm64) could not find object file
\n
UUID: a5cd23bb-91ef-39a0-8235-9c72bd77b2d7 (arm64) first
UUID: A5CD23BB-91EF-39A0-8235-9C72BD77B2D7 (arm64) second
";
        let uuids = parse_uuid_listing(text);
        assert_eq!(uuids.len(), 1);
    }

    #[test]
    fn test_parse_empty_output()
    {
        assert!(parse_uuid_listing("").is_empty());
    }

    #[test]
    fn test_source_kind_from_str()
    {
        assert_eq!("dwarfdump".parse::<IdentifierSourceKind>().unwrap(), IdentifierSourceKind::Dwarfdump);
        assert_eq!("MachO".parse::<IdentifierSourceKind>().unwrap(), IdentifierSourceKind::Macho);
        assert!("otool".parse::<IdentifierSourceKind>().is_err());
    }

    #[test]
    fn test_macho_source_skips_non_object_files()
    {
        let uuids = MachOSource::file_uuids(Path::new("notes.txt"), b"just some text").unwrap();
        assert!(uuids.is_empty());
    }

    /// Minimal 64-bit arm64 Mach-O header carrying only an `LC_UUID` command
    fn thin_macho(uuid: [u8; 16]) -> Vec<u8>
    {
        let mut data = Vec::new();
        data.extend_from_slice(&0xfeed_facf_u32.to_le_bytes()); // MH_MAGIC_64
        data.extend_from_slice(&0x0100_000c_u32.to_le_bytes()); // CPU_TYPE_ARM64
        data.extend_from_slice(&0u32.to_le_bytes()); // cpusubtype
        data.extend_from_slice(&0xa_u32.to_le_bytes()); // MH_DSYM
        data.extend_from_slice(&1u32.to_le_bytes()); // ncmds
        data.extend_from_slice(&24u32.to_le_bytes()); // sizeofcmds
        data.extend_from_slice(&0u32.to_le_bytes()); // flags
        data.extend_from_slice(&0u32.to_le_bytes()); // reserved
        data.extend_from_slice(&0x1b_u32.to_le_bytes()); // LC_UUID
        data.extend_from_slice(&24u32.to_le_bytes()); // cmdsize
        data.extend_from_slice(&uuid);
        data
    }

    #[test]
    fn test_macho_source_reads_thin_uuid()
    {
        let bytes = [0xA5, 0xCD, 0x23, 0xBB, 0x91, 0xEF, 0x39, 0xA0, 0x82, 0x35, 0x9C, 0x72, 0xBD, 0x77, 0xB2, 0xD7];
        let uuids = MachOSource::file_uuids(Path::new("MySDK"), &thin_macho(bytes)).unwrap();
        assert_eq!(uuids, vec![SliceUuid::from_bytes(bytes)]);
        assert_eq!(uuids[0].to_string(), "A5CD23BB-91EF-39A0-8235-9C72BD77B2D7");
    }

    const ARM64_UUID: [u8; 16] = [0xA5, 0xCD, 0x23, 0xBB, 0x91, 0xEF, 0x39, 0xA0, 0x82, 0x35, 0x9C, 0x72, 0xBD, 0x77, 0xB2, 0xD7];
    const X86_UUID: [u8; 16] = [0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x33, 0x33, 0x44, 0x44, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55];

    /// Universal binary wrapping `slices`, each page-aligned
    fn fat_macho(wide: bool, slices: &[Vec<u8>]) -> Vec<u8>
    {
        const PAGE: usize = 0x1000;
        let mut data = Vec::new();
        let magic: u32 = if wide { 0xcafe_babf } else { 0xcafe_babe };
        data.extend_from_slice(&magic.to_be_bytes());
        data.extend_from_slice(&u32::try_from(slices.len()).unwrap().to_be_bytes());

        for (index, slice) in slices.iter().enumerate() {
            let offset = PAGE * (index + 1);
            data.extend_from_slice(&0x0100_000c_u32.to_be_bytes()); // cputype
            data.extend_from_slice(&u32::try_from(index).unwrap().to_be_bytes()); // cpusubtype
            if wide {
                data.extend_from_slice(&(offset as u64).to_be_bytes());
                data.extend_from_slice(&(slice.len() as u64).to_be_bytes());
                data.extend_from_slice(&12u32.to_be_bytes()); // align
                data.extend_from_slice(&0u32.to_be_bytes()); // reserved
            } else {
                data.extend_from_slice(&u32::try_from(offset).unwrap().to_be_bytes());
                data.extend_from_slice(&u32::try_from(slice.len()).unwrap().to_be_bytes());
                data.extend_from_slice(&12u32.to_be_bytes()); // align
            }
        }
        for (index, slice) in slices.iter().enumerate() {
            data.resize(PAGE * (index + 1), 0);
            data.extend_from_slice(slice);
        }
        data
    }

    #[test]
    fn test_macho_source_reads_every_fat_slice()
    {
        let data = fat_macho(false, &[thin_macho(ARM64_UUID), thin_macho(X86_UUID)]);
        let uuids = MachOSource::file_uuids(Path::new("MySDK"), &data).unwrap();
        assert_eq!(uuids, vec![SliceUuid::from_bytes(ARM64_UUID), SliceUuid::from_bytes(X86_UUID)]);
    }

    #[test]
    fn test_macho_source_reads_fat64_slices()
    {
        let data = fat_macho(true, &[thin_macho(X86_UUID), thin_macho(ARM64_UUID)]);
        let uuids = MachOSource::file_uuids(Path::new("MySDK"), &data).unwrap();
        assert_eq!(uuids, vec![SliceUuid::from_bytes(X86_UUID), SliceUuid::from_bytes(ARM64_UUID)]);
    }

    #[test]
    fn test_macho_source_rejects_truncated_header()
    {
        let truncated = &thin_macho(ARM64_UUID)[..20];
        let err = MachOSource::file_uuids(Path::new("MySDK"), truncated).unwrap_err();
        match err {
            SymfuseError::InvalidObject { path, .. } => assert_eq!(path, Path::new("MySDK")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_macho_source_walks_dwarf_directory()
    {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("MySDK.framework.dSYM");
        let dwarf = bundle.join("Contents/Resources/DWARF");
        fs::create_dir_all(&dwarf).unwrap();
        fs::write(bundle.join("Contents/Info.plist"), "<plist/>").unwrap();
        fs::write(dwarf.join("MySDK"), fat_macho(false, &[thin_macho(ARM64_UUID), thin_macho(X86_UUID)])).unwrap();
        // Same arm64 slice again under another name
        fs::write(dwarf.join("MySDK-arm64"), thin_macho(ARM64_UUID)).unwrap();

        let uuids = MachOSource.identifiers(&bundle).unwrap();
        assert_eq!(uuids, vec![SliceUuid::from_bytes(ARM64_UUID), SliceUuid::from_bytes(X86_UUID)]);
    }
}
