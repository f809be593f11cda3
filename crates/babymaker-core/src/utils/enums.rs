use std::{fmt::Display, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::BabyError;

/// Data-taking year, which decides the trigger menu and the beamspot tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Year {
    /// Run 2, 2017 data-taking (and matching simulation).
    Y2017,
    /// Run 2, 2018 data-taking (and matching simulation).
    #[default]
    Y2018,
}

impl Year {
    /// The calendar year as an integer, as stored in the `year` branch.
    pub fn as_i32(&self) -> i32 {
        match self {
            Year::Y2017 => 2017,
            Year::Y2018 => 2018,
        }
    }

    /// Detect the year from dataset naming conventions (`.../Run2017F/...`).
    pub fn from_file_name<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().to_string_lossy();
        if name.contains("Run2017") {
            Some(Year::Y2017)
        } else if name.contains("Run2018") {
            Some(Year::Y2018)
        } else {
            None
        }
    }
}

impl Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

impl FromStr for Year {
    type Err = BabyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "2017" | "17" | "run2017" => Ok(Self::Y2017),
            "2018" | "18" | "run2018" => Ok(Self::Y2018),
            _ => Err(BabyError::ParseError {
                name: s.to_string(),
                object: "Year".to_string(),
            }),
        }
    }
}

/// On-disk format of the reduced tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// A ROOT file with a flat TTree.
    #[default]
    Root,
    /// An Apache Parquet file.
    Parquet,
}

impl OutputFormat {
    /// Pick the format from the extension of `path`, defaulting to ROOT.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or_default()
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Root => write!(f, "ROOT"),
            OutputFormat::Parquet => write!(f, "Parquet"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = BabyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "root" => Ok(Self::Root),
            "parquet" | "pq" => Ok(Self::Parquet),
            _ => Err(BabyError::ParseError {
                name: s.to_string(),
                object: "OutputFormat".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_parsing() {
        assert_eq!("2017".parse::<Year>().unwrap(), Year::Y2017);
        assert_eq!("18".parse::<Year>().unwrap(), Year::Y2018);
        assert!("2016".parse::<Year>().is_err());
        assert_eq!(Year::Y2017.to_string(), "2017");
    }

    #[test]
    fn test_year_from_file_name() {
        assert_eq!(
            Year::from_file_name("/store/data/Run2017F/ScoutingCaloMuon/RAW/v1/output_1.root"),
            Some(Year::Y2017)
        );
        assert_eq!(
            Year::from_file_name("/store/data/Run2018C/ScoutingCaloMuon/RAW/v1/output_1.root"),
            Some(Year::Y2018)
        );
        assert_eq!(Year::from_file_name("signal_mc.root"), None);
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path("baby.parquet"), OutputFormat::Parquet);
        assert_eq!(OutputFormat::from_path("baby.root"), OutputFormat::Root);
        assert_eq!(OutputFormat::from_path("baby"), OutputFormat::Root);
    }
}
