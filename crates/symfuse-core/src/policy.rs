//! What to do when a variant has no symbol maps at all.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Decides whether an empty symbol-map directory is fatal
///
/// `Flagged` fails only for variants built with bitcode. `Always` fails for
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingMapPolicy
{
    /// Fail only when the variant expects symbol maps
    #[default]
    Flagged,
    /// Fail for every variant
    Always,
    /// Never fail; reconciliation is skipped instead
    Never,
}

impl MissingMapPolicy
{
    /// Whether zero maps is an error for a variant with the given flag
    #[must_use]
    pub fn requires_maps(self, expects_symbol_maps: bool) -> bool
    {
        match self {
            MissingMapPolicy::Flagged => expects_symbol_maps,
            MissingMapPolicy::Always => true,
            MissingMapPolicy::Never => false,
        }
    }
}

impl FromStr for MissingMapPolicy
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "flagged" => Ok(MissingMapPolicy::Flagged),
            "always" => Ok(MissingMapPolicy::Always),
            "never" => Ok(MissingMapPolicy::Never),
            _ => Err(format!("Unknown map policy: {s}. Use 'flagged', 'always', or 'never'")),
        }
    }
}

impl fmt::Display for MissingMapPolicy
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(match self {
            MissingMapPolicy::Flagged => "flagged",
            MissingMapPolicy::Always => "always",
            MissingMapPolicy::Never => "never",
        })
    }
}
