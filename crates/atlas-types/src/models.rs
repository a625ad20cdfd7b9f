use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How safe a mushroom is to eat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edibility {
    Edible,
    #[default]
    Inedible,
    Poisonous,
}

impl Edibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edible => "edible",
            Self::Inedible => "inedible",
            Self::Poisonous => "poisonous",
        }
    }
}

impl fmt::Display for Edibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown edibility: {0}")]
pub struct UnknownEdibility(pub String);

impl FromStr for Edibility {
    type Err = UnknownEdibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edible" => Ok(Self::Edible),
            "inedible" => Ok(Self::Inedible),
            "poisonous" => Ok(Self::Poisonous),
            other => Err(UnknownEdibility(other.to_string())),
        }
    }
}

/// Which side of a message a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Sender,
    Receiver,
}

impl Party {
    pub fn other(self) -> Self {
        match self {
            Self::Sender => Self::Receiver,
            Self::Receiver => Self::Sender,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edibility_parses_its_own_strings() {
        for e in [Edibility::Edible, Edibility::Inedible, Edibility::Poisonous] {
            assert_eq!(e.as_str().parse::<Edibility>().unwrap(), e);
        }
        assert!("tasty".parse::<Edibility>().is_err());
    }

    #[test]
    fn edibility_defaults_to_inedible() {
        assert_eq!(Edibility::default(), Edibility::Inedible);
        assert_eq!(serde_json::to_string(&Edibility::Poisonous).unwrap(), "\"poisonous\"");
    }
}
