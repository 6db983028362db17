//! Relation-family classification (spec.md §4.5): twelve fixed families,
//! matched case-insensitively against an edge's verb/relation phrase in
//! declared priority order — first match wins, `Other` is the catch-all.

/// One of the twelve fixed relation families, in the declared priority
/// order used for classification and for the one-hot vector's axis order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationFamily {
    CauseEffect,
    Partnership,
    AcquisitionInvestment,
    Competition,
    RegulationLegal,
    SecurityIncident,
    PricingCost,
    PerformanceBenchmark,
    HiringLayoffs,
    ProductLaunch,
    Association,
    Other,
}

pub const RELATION_FAMILY_COUNT: usize = 12;

/// All twelve families in their fixed classification/axis order.
pub const ALL_FAMILIES: [RelationFamily; RELATION_FAMILY_COUNT] = [
    RelationFamily::CauseEffect,
    RelationFamily::Partnership,
    RelationFamily::AcquisitionInvestment,
    RelationFamily::Competition,
    RelationFamily::RegulationLegal,
    RelationFamily::SecurityIncident,
    RelationFamily::PricingCost,
    RelationFamily::PerformanceBenchmark,
    RelationFamily::HiringLayoffs,
    RelationFamily::ProductLaunch,
    RelationFamily::Association,
    RelationFamily::Other,
];

impl RelationFamily {
    pub fn index(self) -> usize {
        ALL_FAMILIES.iter().position(|f| *f == self).expect("exhaustive table")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CauseEffect => "cause_effect",
            Self::Partnership => "partnership",
            Self::AcquisitionInvestment => "acquisition_investment",
            Self::Competition => "competition",
            Self::RegulationLegal => "regulation_legal",
            Self::SecurityIncident => "security_incident",
            Self::PricingCost => "pricing_cost",
            Self::PerformanceBenchmark => "performance_benchmark",
            Self::HiringLayoffs => "hiring_layoffs",
            Self::ProductLaunch => "product_launch",
            Self::Association => "association",
            Self::Other => "other",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::CauseEffect => &["caused", "leads to", "resulted in", "triggered", "due to", "because of"],
            Self::Partnership => &["partnered", "partnership", "collaborat", "joint venture", "teamed up", "alliance"],
            Self::AcquisitionInvestment => {
                &["acquir", "acquisition", "invest", "funding", "merger", "bought", "stake in"]
            }
            Self::Competition => &["compet", "rival", "versus", " vs ", "outperform", "overtake"],
            Self::RegulationLegal => &["sued", "lawsuit", "regulat", "fined", "banned", "legal", "court", "ruling"],
            Self::SecurityIncident => {
                &["breach", "hacked", "vulnerab", "exploit", "leak", "attack", "ransomware", "malware"]
            }
            Self::PricingCost => &["priced", "pricing", "cost", "discount", "subscription fee", "raised prices"],
            Self::PerformanceBenchmark => {
                &["benchmark", "outperform", "faster than", "scored", "ranked", "throughput", "latency"]
            }
            Self::HiringLayoffs => &["hired", "layoff", "laid off", "fired", "resigned", "appointed", "stepped down"],
            Self::ProductLaunch => &["launched", "released", "unveiled", "announced", "rolled out", "debuted"],
            Self::Association => &["associated with", "linked to", "related to", "connected to", "affiliated"],
            Self::Other => &[],
        }
    }

    /// Classifies `relation_phrase` into a family by case-insensitive
    /// keyword match, trying families in their declared priority order.
    /// `Other` always matches (catch-all), so this never returns `None`.
    pub fn classify(relation_phrase: &str) -> RelationFamily {
        let lower = relation_phrase.to_lowercase();
        let normalized = lower.replace(['_', '-'], " ");
        for family in ALL_FAMILIES {
            if family == RelationFamily::Other {
                continue;
            }
            if family.keywords().iter().any(|kw| normalized.contains(kw)) {
                return family;
            }
        }
        RelationFamily::Other
    }

    /// A length-[`RELATION_FAMILY_COUNT`] one-hot vector with a single
    /// `1.0` at this family's axis.
    pub fn one_hot(self) -> [f32; RELATION_FAMILY_COUNT] {
        let mut v = [0.0f32; RELATION_FAMILY_COUNT];
        v[self.index()] = 1.0;
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_acquisition() {
        assert_eq!(RelationFamily::classify("acquired"), RelationFamily::AcquisitionInvestment);
    }

    #[test]
    fn classifies_partnership_is_case_insensitive() {
        assert_eq!(RelationFamily::classify("Partnered With"), RelationFamily::Partnership);
        assert_eq!(RelationFamily::classify("partnered_with"), RelationFamily::Partnership);
    }

    #[test]
    fn unknown_phrase_falls_back_to_other() {
        assert_eq!(RelationFamily::classify("xyz unknown"), RelationFamily::Other);
    }

    #[test]
    fn one_hot_has_exactly_one_set_bit() {
        for family in ALL_FAMILIES {
            let oh = family.one_hot();
            let ones = oh.iter().filter(|&&x| x == 1.0).count();
            let zeros = oh.iter().filter(|&&x| x == 0.0).count();
            assert_eq!(ones, 1);
            assert_eq!(zeros, RELATION_FAMILY_COUNT - 1);
        }
    }

    #[test]
    fn all_families_table_has_twelve_entries() {
        assert_eq!(ALL_FAMILIES.len(), RELATION_FAMILY_COUNT);
    }

    proptest::proptest! {
        #[test]
        fn classify_always_produces_a_one_hot_with_a_single_set_bit(phrase in "[a-zA-Z _-]{0,40}") {
            let family = RelationFamily::classify(&phrase);
            let oh = family.one_hot();
            let ones = oh.iter().filter(|&&x| x == 1.0).count();
            let zeros = oh.iter().filter(|&&x| x == 0.0).count();
            proptest::prop_assert_eq!(ones, 1);
            proptest::prop_assert_eq!(zeros, RELATION_FAMILY_COUNT - 1);
        }
    }
}
