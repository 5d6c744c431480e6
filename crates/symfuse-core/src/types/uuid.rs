//! # Slice UUIDs
//!
//! Every Mach-O slice carries an `LC_UUID` load command. The same identifier
//! names the slice's BCSymbolMap file, which is how a map finds its dSYM.
//!
//! Tools print these identifiers in different cases (`dwarfdump` uses upper
//! case, map file names are sometimes lower case), so a [`SliceUuid`] parses
//! case-insensitively and always displays in canonical upper-case
//! hyphenated form.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::SymfuseError;

/// 16-byte slice identifier
///
/// ## Example
///
/// ```rust
/// use symfuse_core::types::SliceUuid;
///
/// let uuid: SliceUuid = "a5cd23bb-91ef-39a0-8235-9c72bd77b2d7".parse().unwrap();
/// assert_eq!(uuid.to_string(), "A5CD23BB-91EF-39A0-8235-9C72BD77B2D7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceUuid(Uuid);

impl SliceUuid
{
    /// Create a UUID from raw bytes, as stored in `LC_UUID`
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self
    {
        SliceUuid(Uuid::from_bytes(bytes))
    }

    /// Raw bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16]
    {
        self.0.as_bytes()
    }

    /// Whether `text` is this UUID in hyphenated form, ignoring case
    ///
    /// Symbol-map file stems are compared with this, so a stem must spell
    /// the identifier exactly; bare hex or braced forms do not match.
    #[must_use]
    pub fn matches_str(&self, text: &str) -> bool
    {
        text.eq_ignore_ascii_case(&self.to_string())
    }
}

impl FromStr for SliceUuid
{
    type Err = SymfuseError;

    /// Accepts `8-4-4-4-12` hyphenated text or 32 bare hex digits, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let invalid = || SymfuseError::InvalidIdentifier(s.to_string());
        // try_parse also takes braced and urn forms, which no Apple tool prints
        if !matches!(s.len(), 32 | 36) {
            return Err(invalid());
        }
        Uuid::try_parse(s).map(SliceUuid).map_err(|_| invalid())
    }
}

impl fmt::Display for SliceUuid
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.0.hyphenated().encode_upper(&mut Uuid::encode_buffer()))
    }
}

impl From<[u8; 16]> for SliceUuid
{
    fn from(bytes: [u8; 16]) -> Self
    {
        SliceUuid::from_bytes(bytes)
    }
}
