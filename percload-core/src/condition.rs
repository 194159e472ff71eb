use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Perceptual load of the search display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Load {
    Low,
    High,
}

impl Load {
    pub const ALL: [Load; 2] = [Load::Low, Load::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Load::Low => "low",
            Load::High => "high",
        }
    }
}

impl fmt::Display for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Load {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Load::Low),
            "high" => Ok(Load::High),
            other => Err(format!("unknown load '{other}'")),
        }
    }
}

/// Visual theme of the background image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundCategory {
    Ai,
    Internet,
    Paper,
    Solid,
}

impl BackgroundCategory {
    pub const ALL: [BackgroundCategory; 4] = [
        BackgroundCategory::Ai,
        BackgroundCategory::Internet,
        BackgroundCategory::Paper,
        BackgroundCategory::Solid,
    ];

    /// Name used both in the result log and as the asset sub-directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundCategory::Ai => "ai",
            BackgroundCategory::Internet => "internet",
            BackgroundCategory::Paper => "paper",
            BackgroundCategory::Solid => "solid",
        }
    }
}

impl fmt::Display for BackgroundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(BackgroundCategory::Ai),
            "internet" => Ok(BackgroundCategory::Internet),
            "paper" => Ok(BackgroundCategory::Paper),
            "solid" => Ok(BackgroundCategory::Solid),
            other => Err(format!("unknown background category '{other}'")),
        }
    }
}

/// One cell of the Load x Background design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Condition {
    pub load: Load,
    pub category: BackgroundCategory,
}

impl Condition {
    pub fn new(load: Load, category: BackgroundCategory) -> Self {
        Self { load, category }
    }

    /// Cartesian product in `loads`-major order.
    pub fn cartesian(loads: &[Load], categories: &[BackgroundCategory]) -> Vec<Condition> {
        loads
            .iter()
            .flat_map(|&load| categories.iter().map(move |&category| Condition { load, category }))
            .collect()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.load, self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_covers_full_design() {
        let cells = Condition::cartesian(&Load::ALL, &BackgroundCategory::ALL);
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0], Condition::new(Load::Low, BackgroundCategory::Ai));
        assert_eq!(cells[7], Condition::new(Load::High, BackgroundCategory::Solid));
    }

    #[test]
    fn names_parse_back() {
        for load in Load::ALL {
            assert_eq!(load.as_str().parse::<Load>().unwrap(), load);
        }
        for cat in BackgroundCategory::ALL {
            assert_eq!(cat.to_string().parse::<BackgroundCategory>().unwrap(), cat);
        }
        assert_eq!(" Internet ".parse::<BackgroundCategory>().unwrap(), BackgroundCategory::Internet);
        assert!("medium".parse::<Load>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Condition::new(Load::High, BackgroundCategory::Paper)).unwrap();
        assert_eq!(json, r#"{"load":"high","category":"paper"}"#);
    }
}
