//! Network identifier.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Amount, TypesError};

/// Identifies which network a node participates in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    #[default]
    Live,
    /// The public beta network.
    Beta,
    /// Local development network.
    Dev,
}

impl Network {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Beta => "beta",
            Self::Dev => "dev",
        }
    }

    /// Floor applied to the trended online weight when computing quorum.
    pub fn online_weight_minimum(&self) -> Amount {
        match self {
            Self::Live | Self::Beta => Amount::nano(60_000_000),
            Self::Dev => Amount::nano(1_000),
        }
    }

    /// Representatives at or below this weight are not tracked as online.
    pub fn representative_vote_weight_minimum(&self) -> Amount {
        match self {
            Self::Live | Self::Beta => Amount::nano(10),
            Self::Dev => Amount::ZERO,
        }
    }
}

impl FromStr for Network {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Self::Live),
            "beta" => Ok(Self::Beta),
            "dev" => Ok(Self::Dev),
            other => Err(TypesError::UnknownNetwork(other.to_string())),
        }
    }
}
