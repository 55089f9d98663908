use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment profile selecting which schema defaults apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Dev,
    Prod,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Dev => "dev",
            Profile::Prod => "prod",
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Profile::Prod)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Profile::Dev),
            "prod" | "production" => Ok(Profile::Prod),
            other => Err(format!("unknown profile '{}' (expected dev or prod)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_names() {
        assert_eq!("dev".parse::<Profile>().unwrap(), Profile::Dev);
        assert_eq!("Production".parse::<Profile>().unwrap(), Profile::Prod);
        assert!("staging".parse::<Profile>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_yaml::to_string(&Profile::Prod).unwrap().trim(), "prod");
    }
}
