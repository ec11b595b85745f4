//! Gender of a specimen, including the keeper's best guess for juveniles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sex of a reptile as recorded by its keeper.
///
/// The wire spelling `FAMALE` is kept for compatibility with stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "MALE")]
    Male,
    #[serde(rename = "FAMALE")]
    Female,
    #[serde(rename = "POSSIBLE_MALE")]
    PossibleMale,
    #[serde(rename = "POSSIBLE_FAMALE")]
    PossibleFemale,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Gender {
    /// Every accepted wire value, in declaration order.
    pub const VARIANTS: &'static [&'static str] = &[
        "MALE",
        "FAMALE",
        "POSSIBLE_MALE",
        "POSSIBLE_FAMALE",
        "UNKNOWN",
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FAMALE",
            Self::PossibleMale => "POSSIBLE_MALE",
            Self::PossibleFemale => "POSSIBLE_FAMALE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the sex has been confirmed rather than guessed.
    #[must_use]
    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Male | Self::Female)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Self::Male),
            "FAMALE" => Ok(Self::Female),
            "POSSIBLE_MALE" => Ok(Self::PossibleMale),
            "POSSIBLE_FAMALE" => Ok(Self::PossibleFemale),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(()),
        }
    }
}
