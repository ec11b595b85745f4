//! Physical enclosure kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What sort of enclosure a feeding box is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerKind {
    Box,
    Cabinet,
}

impl ContainerKind {
    pub const VARIANTS: &'static [&'static str] = &["BOX", "CABINET"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Box => "BOX",
            Self::Cabinet => "CABINET",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOX" => Ok(Self::Box),
            "CABINET" => Ok(Self::Cabinet),
            _ => Err(()),
        }
    }
}
