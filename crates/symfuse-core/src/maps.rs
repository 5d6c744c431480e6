//! Discovery of BCSymbolMap files.

use std::path::Path;

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::SymfuseResult;
use crate::types::SymbolMapFile;

fn has_extension(path: &Path, extension: &str) -> bool
{
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Recursively list every file under `dir` whose extension is `extension`.
///
/// The extension comparison ignores case and a leading dot in `extension`.
/// Results are sorted by path. A directory that does not exist holds no
/// maps, which is not an error here.
///
/// ## Errors
///
/// Returns `Walk` if the directory exists but cannot be read.
pub fn discover_symbol_maps(dir: &Path, extension: &str) -> SymfuseResult<Vec<SymbolMapFile>>
{
    if !dir.exists() {
        debug!(dir = %dir.display(), "symbol map directory does not exist");
        return Ok(Vec::new());
    }

    let extension = extension.trim_start_matches('.');
    let mut maps = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }
        match SymbolMapFile::from_path(entry.path()) {
            Some(map) => maps.push(map),
            None => trace!(path = %entry.path().display(), "skipping map without UTF-8 name"),
        }
    }

    maps.sort_by(|a, b| a.path().cmp(b.path()));
    debug!(dir = %dir.display(), count = maps.len(), "discovered symbol maps");
    Ok(maps)
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use super::*;

    #[test]
    fn test_discovers_nested_maps_only()
    {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("A5CD23BB-91EF-39A0-8235-9C72BD77B2D7.bcsymbolmap"), "map").unwrap();
        fs::write(nested.join("11111111-2222-3333-4444-555555555555.BCSymbolMap"), "map").unwrap();
        fs::write(dir.path().join("README.txt"), "not a map").unwrap();

        let maps = discover_symbol_maps(dir.path(), "bcsymbolmap").unwrap();
        let ids: Vec<_> = maps.iter().map(SymbolMapFile::identifier).collect();
        assert_eq!(
            ids,
            vec!["A5CD23BB-91EF-39A0-8235-9C72BD77B2D7", "11111111-2222-3333-4444-555555555555"]
        );
    }

    #[test]
    fn test_missing_directory_is_empty()
    {
        let dir = tempfile::tempdir().unwrap();
        let maps = discover_symbol_maps(&dir.path().join("BCSymbolMaps"), ".bcsymbolmap").unwrap();
        assert!(maps.is_empty());
    }
}
