use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::catalog::Category;

/// Kind of cleaning job being reported.
///
/// The work type decides which photo categories are active and whether a work time
/// must be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    #[default]
    Normal,
    Regular,
    Filter,
    Full,
}

impl WorkType {
    pub const ALL: [WorkType; 4] = [
        WorkType::Normal,
        WorkType::Regular,
        WorkType::Filter,
        WorkType::Full,
    ];

    /// Display label sent to the sink as `workTypeLabel`.
    pub fn label(self) -> &'static str {
        match self {
            WorkType::Normal => "通常清掃のみ",
            WorkType::Regular => "定期清掃のみ",
            WorkType::Filter => "フィルター清掃のみ",
            WorkType::Full => "定期清掃＋フィルター清掃",
        }
    }

    /// Resolve a display label back to its work type. Older form builds only send the label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        WorkType::ALL.into_iter().find(|wt| wt.label() == label)
    }

    /// Whether photo fields of `category` are enabled under this work type.
    /// Normal-category fields are enabled for every work type.
    pub fn includes(self, category: Category) -> bool {
        match category {
            Category::Normal => true,
            Category::Regular => matches!(self, WorkType::Regular | WorkType::Full),
            Category::Filter => matches!(self, WorkType::Filter | WorkType::Full),
        }
    }

    /// Work time is only asked for when filters are cleaned.
    pub fn requires_work_time(self) -> bool {
        matches!(self, WorkType::Filter | WorkType::Full)
    }
}

impl FromStr for WorkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(WorkType::Normal),
            "regular" => Ok(WorkType::Regular),
            "filter" => Ok(WorkType::Filter),
            "full" => Ok(WorkType::Full),
            _ => WorkType::from_label(s).ok_or_else(|| anyhow::anyhow!("Invalid work type: {}", s)),
        }
    }
}

impl Display for WorkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            WorkType::Normal => write!(f, "normal"),
            WorkType::Regular => write!(f, "regular"),
            WorkType::Filter => write!(f, "filter"),
            WorkType::Full => write!(f, "full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip() {
        for wt in WorkType::ALL {
            assert_eq!(WorkType::from_label(wt.label()), Some(wt));
        }
        assert_eq!(WorkType::from_label("その他"), None);
    }

    #[test]
    fn test_parse_accepts_code_and_label() {
        assert_eq!("FULL".parse::<WorkType>().unwrap(), WorkType::Full);
        assert_eq!("定期清掃のみ".parse::<WorkType>().unwrap(), WorkType::Regular);
        assert!("weekly".parse::<WorkType>().is_err());
    }

    #[test]
    fn test_category_activation() {
        for wt in WorkType::ALL {
            assert!(wt.includes(Category::Normal));
        }
        assert!(!WorkType::Normal.includes(Category::Regular));
        assert!(!WorkType::Normal.includes(Category::Filter));
        assert!(WorkType::Regular.includes(Category::Regular));
        assert!(!WorkType::Regular.includes(Category::Filter));
        assert!(!WorkType::Filter.includes(Category::Regular));
        assert!(WorkType::Filter.includes(Category::Filter));
        assert!(WorkType::Full.includes(Category::Regular));
        assert!(WorkType::Full.includes(Category::Filter));
    }

    #[test]
    fn test_work_time_requirement() {
        assert!(!WorkType::Normal.requires_work_time());
        assert!(!WorkType::Regular.requires_work_time());
        assert!(WorkType::Filter.requires_work_time());
        assert!(WorkType::Full.requires_work_time());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&WorkType::Full).unwrap(), "\"full\"");
        let wt: WorkType = serde_json::from_str("\"regular\"").unwrap();
        assert_eq!(wt, WorkType::Regular);
    }
}
