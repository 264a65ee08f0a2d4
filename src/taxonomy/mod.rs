//! Master category taxonomy.
//!
//! Maps the dataset's fine-grained category labels (e.g. `indian_restaurant`,
//! `hair_salon`) onto a small closed set of master categories. Rules are a
//! static ordered list; the first matching rule wins.

mod rules;

use serde::{Deserialize, Serialize};

use rules::{Matcher, RULES};

/// Coarse classification bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterCategory {
    Residential,
    Commercial,
    Restaurant,
    Retail,
    Healthcare,
    Education,
    Entertainment,
    Hotel,
    Transportation,
    Religious,
    BeautyPersonalCare,
    Services,
    Landmark,
    Other,
}

impl MasterCategory {
    /// All categories in rule priority order, catch-all last
    pub fn all() -> &'static [MasterCategory] {
        &[
            MasterCategory::Residential,
            MasterCategory::Commercial,
            MasterCategory::Restaurant,
            MasterCategory::Retail,
            MasterCategory::Healthcare,
            MasterCategory::Education,
            MasterCategory::Entertainment,
            MasterCategory::Hotel,
            MasterCategory::Transportation,
            MasterCategory::Religious,
            MasterCategory::BeautyPersonalCare,
            MasterCategory::Services,
            MasterCategory::Landmark,
            MasterCategory::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MasterCategory::Residential => "residential",
            MasterCategory::Commercial => "commercial",
            MasterCategory::Restaurant => "restaurant",
            MasterCategory::Retail => "retail",
            MasterCategory::Healthcare => "healthcare",
            MasterCategory::Education => "education",
            MasterCategory::Entertainment => "entertainment",
            MasterCategory::Hotel => "hotel",
            MasterCategory::Transportation => "transportation",
            MasterCategory::Religious => "religious",
            MasterCategory::BeautyPersonalCare => "beauty_personal_care",
            MasterCategory::Services => "services",
            MasterCategory::Landmark => "landmark",
            MasterCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for MasterCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a single label. Returns `None` when no rule matches.
pub fn classify_label(label: &str) -> Option<MasterCategory> {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return None;
    }

    RULES
        .iter()
        .find(|rule| match rule.matcher {
            Matcher::Exact(labels) => labels.contains(&label.as_str()),
            Matcher::Keyword(keywords) => keywords.iter().any(|k| label.contains(k)),
        })
        .map(|rule| rule.category)
}

/// Classify a place by its primary category.
///
/// When the primary category is absent or blank, the alternates are scanned
/// in order and the first one that maps to a real category wins. Anything
/// unmapped resolves to [`MasterCategory::Other`].
pub fn classify(primary_category: Option<&str>, alternate_categories: &[String]) -> MasterCategory {
    match primary_category.filter(|c| !c.trim().is_empty()) {
        Some(primary) => classify_label(primary).unwrap_or(MasterCategory::Other),
        None => alternate_categories
            .iter()
            .find_map(|alt| classify_label(alt))
            .unwrap_or(MasterCategory::Other),
    }
}
