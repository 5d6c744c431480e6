//! Shared fixtures: a scripted tool runner and on-disk archive builders.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use symfuse_core::error::SymfuseResult;
use symfuse_core::tool::{ToolCommand, ToolOutput, ToolRunner};

pub const DEVICE_UUID: &str = "A5CD23BB-91EF-39A0-8235-9C72BD77B2D7";
pub const OTHER_UUID: &str = "11111111-2222-3333-4444-555555555555";
pub const ARMV7_UUID: &str = "0F3C1E2D-4B5A-6978-8A9B-ACBDCEDFE0F1";

/// File the fake `dsymutil` writes into a repaired bundle
pub const REPAIR_MARKER: &str = "Contents/Resources/repaired-with";

/// Records every command; answers `dwarfdump` from a script, fails on demand,
/// and makes `dsymutil` leave a marker in the bundle it was given.
#[derive(Default)]
pub struct ScriptedRunner
{
    calls: RefCell<Vec<ToolCommand>>,
    dwarfdump_stdout: RefCell<String>,
    failure: RefCell<Option<(String, ToolOutput)>>,
}

impl ScriptedRunner
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// `dwarfdump --uuid` output listing `uuids` as arm64 slices
    pub fn with_uuids(uuids: &[&str]) -> Self
    {
        let runner = Self::new();
        let listing: String = uuids
            .iter()
            .map(|uuid| format!("UUID: {uuid} (arm64) /archive/dSYMs/MySDK.framework.dSYM/Contents/Resources/DWARF/MySDK\n"))
            .collect();
        *runner.dwarfdump_stdout.borrow_mut() = listing;
        runner
    }

    /// Fail any command whose display form contains `needle`
    pub fn fail_when(&self, needle: &str, output: ToolOutput)
    {
        *self.failure.borrow_mut() = Some((needle.to_string(), output));
    }

    pub fn calls(&self) -> Vec<ToolCommand>
    {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ToolCommand>
    {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program() == program)
            .cloned()
            .collect()
    }

    pub fn clear(&self)
    {
        self.calls.borrow_mut().clear();
    }
}

impl ToolRunner for ScriptedRunner
{
    fn run(&self, command: &ToolCommand) -> SymfuseResult<ToolOutput>
    {
        self.calls.borrow_mut().push(command.clone());

        if let Some((needle, output)) = self.failure.borrow().as_ref() {
            if command.to_string().contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }

        match command.program() {
            "dwarfdump" => Ok(ToolOutput::success_with(self.dwarfdump_stdout.borrow().clone())),
            "dsymutil" => {
                // dsymutil --symbol-map <map> <bundle>
                let args = command.get_args();
                let map = PathBuf::from(&args[1]);
                let bundle = PathBuf::from(&args[2]);
                let marker = bundle.join(REPAIR_MARKER);
                fs::create_dir_all(marker.parent().unwrap())?;
                let name = map.file_name().unwrap().to_string_lossy().into_owned();
                fs::write(marker, name)?;
                Ok(ToolOutput::success_with(""))
            }
            _ => Ok(ToolOutput::success_with("")),
        }
    }
}

/// Create a minimal dSYM bundle directory
pub fn make_bundle(path: &Path)
{
    fs::create_dir_all(path.join("Contents/Resources/DWARF")).unwrap();
    fs::write(path.join("Contents/Info.plist"), "<plist/>").unwrap();
    fs::write(path.join("Contents/Resources/DWARF/MySDK"), "dwarf").unwrap();
}

/// Write `<dir>/<uuid>.bcsymbolmap` with distinctive contents
pub fn make_map(dir: &Path, uuid: &str) -> PathBuf
{
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{uuid}.bcsymbolmap"));
    fs::write(&path, format!("BCSymbolMap Version: 2.0\n__hidden#0_ for {uuid}\n")).unwrap();
    path
}
