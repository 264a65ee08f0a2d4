//! Ordered classification rules.
//!
//! Exact-label rules come first: they pin labels whose keywords would
//! otherwise be claimed by an earlier, broader rule (`barber` contains `bar`,
//! `parking` contains `park`).

use super::MasterCategory;

pub(super) enum Matcher {
    /// Label equals one of these
    Exact(&'static [&'static str]),
    /// Label contains one of these
    Keyword(&'static [&'static str]),
}

pub(super) struct Rule {
    pub matcher: Matcher,
    pub category: MasterCategory,
}

const fn exact(labels: &'static [&'static str], category: MasterCategory) -> Rule {
    Rule {
        matcher: Matcher::Exact(labels),
        category,
    }
}

const fn keyword(keywords: &'static [&'static str], category: MasterCategory) -> Rule {
    Rule {
        matcher: Matcher::Keyword(keywords),
        category,
    }
}

pub(super) static RULES: &[Rule] = &[
    exact(
        &["barber", "barbershop", "barber_shop"],
        MasterCategory::BeautyPersonalCare,
    ),
    exact(
        &["home_improvement_store", "home_goods_store", "home_and_garden"],
        MasterCategory::Retail,
    ),
    exact(&["home_service", "home_cleaning"], MasterCategory::Services),
    exact(
        &["parking", "parking_lot", "parking_garage", "public_transportation"],
        MasterCategory::Transportation,
    ),
    exact(
        &[
            "bank",
            "bank_credit_union",
            "public_service_and_government",
            "public_and_government_association",
        ],
        MasterCategory::Services,
    ),
    keyword(
        &[
            "residential",
            "apartment",
            "housing",
            "home",
            "condominium",
            "holiday_rental",
        ],
        MasterCategory::Residential,
    ),
    keyword(
        &[
            "office",
            "business",
            "commercial",
            "company",
            "corporate",
            "professional_services",
            "real_estate",
        ],
        MasterCategory::Commercial,
    ),
    keyword(
        &[
            "restaurant",
            "cafe",
            "coffee",
            "food",
            "dining",
            "bakery",
            "bar",
            "pub",
            "fast_food",
            "eatery",
            "pizza",
            "burger",
            "seafood",
            "indian",
            "chinese",
            "sushi",
            "steakhouse",
            "buffet",
            "diner",
            "bistro",
            "gastropub",
            "ice_cream",
            "dessert",
            "smoothie",
            "juice",
            "tea",
        ],
        MasterCategory::Restaurant,
    ),
    keyword(
        &[
            "shop",
            "store",
            "retail",
            "mall",
            "market",
            "boutique",
            "supermarket",
            "clothing",
            "jewelry",
            "furniture",
            "electronics",
            "mobile_phone",
            "cosmetic",
            "beauty_supplies",
            "shoe",
            "wholesale",
            "department_store",
            "convenience",
        ],
        MasterCategory::Retail,
    ),
    keyword(
        &[
            "hospital",
            "clinic",
            "medical",
            "pharmacy",
            "health",
            "doctor",
            "dentist",
            "dental",
            "surgeon",
            "diagnostic",
            "therapy",
            "wellness",
        ],
        MasterCategory::Healthcare,
    ),
    keyword(
        &[
            "school",
            "university",
            "college",
            "education",
            "library",
            "training",
            "preschool",
            "tutoring",
            "language_school",
        ],
        MasterCategory::Education,
    ),
    keyword(
        &[
            "entertainment",
            "cinema",
            "theater",
            "museum",
            "park",
            "recreation",
            "sport",
            "gym",
            "beach",
            "amusement",
            "club",
            "dance",
            "yoga",
            "fitness",
            "pool",
            "arcade",
        ],
        MasterCategory::Entertainment,
    ),
    keyword(
        &[
            "hotel",
            "accommodation",
            "lodge",
            "hostel",
            "motel",
            "resort",
            "guest_house",
            "bed_and_breakfast",
        ],
        MasterCategory::Hotel,
    ),
    keyword(
        &[
            "transport",
            "station",
            "airport",
            "parking",
            "fuel",
            "gas_station",
            "car_rental",
            "automotive",
            "car_dealer",
            "bus",
            "metro",
            "taxi",
        ],
        MasterCategory::Transportation,
    ),
    keyword(
        &[
            "mosque",
            "church",
            "temple",
            "religious",
            "worship",
            "cathedral",
        ],
        MasterCategory::Religious,
    ),
    keyword(
        &[
            "salon", "spa", "beauty", "barber", "massage", "nail", "hair", "cosmetic",
        ],
        MasterCategory::BeautyPersonalCare,
    ),
    keyword(
        &[
            "service",
            "agency",
            "travel",
            "tour",
            "event",
            "marketing",
            "advertising",
            "cleaning",
            "printing",
            "lawyer",
            "financial",
            "insurance",
            "banking",
        ],
        MasterCategory::Services,
    ),
    keyword(
        &[
            "landmark",
            "monument",
            "historical",
            "tourism",
            "attraction",
        ],
        MasterCategory::Landmark,
    ),
];
