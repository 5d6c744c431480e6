//! # Matching
//!
//! Pairs slice UUIDs with symbol maps. Pure: no filesystem access.
//!
//! Both inputs are tiny (a handful of slices, a few dozen maps at most), so
//! matching is a linear scan per UUID.

use crate::types::{SliceUuid, SymbolMapFile};

/// A UUID and the map that belongs to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatch
{
    pub identifier: SliceUuid,
    pub map: SymbolMapFile,
}

/// Result of [`partition_matches`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPartition
{
    /// One entry per UUID that found a map, in UUID order
    pub matched: Vec<SymbolMatch>,
    /// UUIDs without a map. Tolerated: not every slice is built with bitcode.
    pub unmatched_identifiers: Vec<SliceUuid>,
    /// Maps without a UUID. Tolerated: a build may emit maps for slices that
    /// are not part of this archive.
    pub unmatched_maps: Vec<SymbolMapFile>,
}

impl MatchPartition
{
    pub fn is_fully_matched(&self) -> bool
    {
        self.unmatched_identifiers.is_empty() && self.unmatched_maps.is_empty()
    }
}

/// Split `identifiers` and `candidates` into matched and unmatched sets.
///
/// Comparison ignores case. When two candidates carry the same identifier
/// the first one wins and the other is reported unmatched.
pub fn partition_matches(identifiers: &[SliceUuid], candidates: &[SymbolMapFile]) -> MatchPartition
{
    let mut consumed = vec![false; candidates.len()];
    let mut partition = MatchPartition::default();

    for identifier in identifiers {
        let hit = candidates
            .iter()
            .enumerate()
            .find(|(index, map)| !consumed[*index] && map.belongs_to(identifier));

        match hit {
            Some((index, map)) => {
                consumed[index] = true;
                partition.matched.push(SymbolMatch {
                    identifier: *identifier,
                    map: map.clone(),
                });
            }
            None => partition.unmatched_identifiers.push(*identifier),
        }
    }

    partition.unmatched_maps = candidates
        .iter()
        .zip(consumed)
        .filter(|(_, used)| !used)
        .map(|(map, _)| map.clone())
        .collect();
    partition
}

#[cfg(test)]
mod tests
{
    use super::*;

    const DEVICE: &str = "A5CD23BB-91EF-39A0-8235-9C72BD77B2D7";
    const OTHER: &str = "11111111-2222-3333-4444-555555555555";

    fn uuid(text: &str) -> SliceUuid
    {
        text.parse().unwrap()
    }

    fn map(name: &str) -> SymbolMapFile
    {
        SymbolMapFile::from_path(format!("/maps/{name}.bcsymbolmap")).unwrap()
    }

    #[test]
    fn test_single_match_ignores_extra_map()
    {
        let partition = partition_matches(&[uuid(DEVICE)], &[map(DEVICE), map(OTHER)]);
        assert_eq!(partition.matched.len(), 1);
        assert_eq!(partition.matched[0].map, map(DEVICE));
        assert!(partition.unmatched_identifiers.is_empty());
        assert_eq!(partition.unmatched_maps, vec![map(OTHER)]);
    }

    #[test]
    fn test_case_insensitive_match()
    {
        let partition = partition_matches(&[uuid(DEVICE)], &[map(&DEVICE.to_lowercase())]);
        assert!(partition.is_fully_matched());
        assert_eq!(partition.matched[0].identifier, uuid(DEVICE));
    }

    #[test]
    fn test_unmatched_identifier_is_reported()
    {
        let partition = partition_matches(&[uuid(DEVICE), uuid(OTHER)], &[map(OTHER)]);
        assert_eq!(partition.matched.len(), 1);
        assert_eq!(partition.matched[0].identifier, uuid(OTHER));
        assert_eq!(partition.unmatched_identifiers, vec![uuid(DEVICE)]);
        assert!(partition.unmatched_maps.is_empty());
    }

    #[test]
    fn test_duplicate_maps_first_wins()
    {
        let first = SymbolMapFile::from_path(format!("/maps/a/{DEVICE}.bcsymbolmap")).unwrap();
        let second = SymbolMapFile::from_path(format!("/maps/b/{DEVICE}.bcsymbolmap")).unwrap();
        let partition = partition_matches(&[uuid(DEVICE)], &[first.clone(), second.clone()]);
        assert_eq!(partition.matched[0].map, first);
        assert_eq!(partition.unmatched_maps, vec![second]);
    }

    #[test]
    fn test_non_uuid_map_names_never_match()
    {
        let partition = partition_matches(&[uuid(DEVICE)], &[map("Release")]);
        assert!(partition.matched.is_empty());
        assert_eq!(partition.unmatched_maps.len(), 1);
    }

    #[test]
    fn test_bare_hex_map_name_does_not_match()
    {
        let partition = partition_matches(&[uuid(DEVICE)], &[map(&DEVICE.replace('-', ""))]);
        assert!(partition.matched.is_empty());
        assert_eq!(partition.unmatched_identifiers, vec![uuid(DEVICE)]);
        assert_eq!(partition.unmatched_maps.len(), 1);
    }

    #[test]
    fn test_empty_inputs()
    {
        let partition = partition_matches(&[], &[]);
        assert!(partition.is_fully_matched());
        assert!(partition.matched.is_empty());
    }
}
