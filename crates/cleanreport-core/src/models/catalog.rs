//! Static photo-slot catalog.
//!
//! The catalog is ordered: image ordering in a transfer payload follows catalog order,
//! then file-selection order within each field.

use serde::{Deserialize, Serialize};

use super::work_type::WorkType;

/// Work-type category a photo field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Normal,
    Regular,
    Filter,
}

/// One photo-upload slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryField {
    pub id: &'static str,
    pub label: &'static str,
    pub category: Category,
    pub max_count: usize,
    pub required: bool,
}

impl CategoryField {
    pub fn is_active(&self, work_type: WorkType) -> bool {
        work_type.includes(self.category)
    }

    /// Images outside the normal category travel with `isExtra = true`.
    pub fn is_extra(&self) -> bool {
        self.category != Category::Normal
    }
}

const CATALOG: &[CategoryField] = &[
    CategoryField {
        id: "normal_photos",
        label: "通常清掃",
        category: Category::Normal,
        max_count: 10,
        required: true,
    },
    CategoryField {
        id: "normal_extra",
        label: "通常清掃_その他",
        category: Category::Normal,
        max_count: 10,
        required: false,
    },
    CategoryField {
        id: "regular_before",
        label: "定期清掃_作業前",
        category: Category::Regular,
        max_count: 10,
        required: true,
    },
    CategoryField {
        id: "regular_after",
        label: "定期清掃_作業後",
        category: Category::Regular,
        max_count: 10,
        required: true,
    },
    CategoryField {
        id: "filter",
        label: "フィルター清掃",
        category: Category::Filter,
        max_count: 10,
        required: true,
    },
];

/// The ordered field catalog.
pub fn catalog() -> &'static [CategoryField] {
    CATALOG
}

/// Look up a field by id.
pub fn find_field(id: &str) -> Option<&'static CategoryField> {
    CATALOG.iter().find(|f| f.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_ids_are_unique() {
        let ids: HashSet<_> = catalog().iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), catalog().len());
    }

    #[test]
    fn test_every_category_has_a_required_field() {
        for category in [Category::Normal, Category::Regular, Category::Filter] {
            assert!(catalog()
                .iter()
                .any(|f| f.category == category && f.required));
        }
    }

    #[test]
    fn test_normal_fields_come_first() {
        let first_other = catalog()
            .iter()
            .position(|f| f.category != Category::Normal)
            .unwrap();
        assert!(catalog()[..first_other]
            .iter()
            .all(|f| f.category == Category::Normal));
    }

    #[test]
    fn test_find_field() {
        let field = find_field("filter").unwrap();
        assert_eq!(field.category, Category::Filter);
        assert!(field.is_extra());
        assert!(field.is_active(WorkType::Full));
        assert!(!field.is_active(WorkType::Regular));
        assert!(find_field("photos").is_none());
    }
}
