//! Business recommendations derived from segment characteristics

use crate::analysis::Analysis;
use crate::describe::{
    HIGHER_INCOME, HIGH_PURCHASE_FREQUENCY, LOW_PURCHASE_FREQUENCY, MEDIUM_INCOME,
    YOUNGER_DEMOGRAPHIC,
};
use serde::{Deserialize, Serialize};

/// Characteristic-driven recommendation; `{name}` in the template is the segment name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationRule {
    /// Every fragment must occur in at least one characteristic
    pub requires: &'static [&'static str],
    pub template: &'static str,
}

impl RecommendationRule {
    pub fn matches(&self, characteristics: &[String]) -> bool {
        self.requires
            .iter()
            .all(|fragment| characteristics.iter().any(|c| c.contains(fragment)))
    }

    pub fn render(&self, segment_name: &str) -> String {
        self.template.replace("{name}", segment_name)
    }
}

/// Rules evaluated in order for every segment
pub const RECOMMENDATION_RULES: [RecommendationRule; 4] = [
    RecommendationRule {
        requires: &[HIGH_PURCHASE_FREQUENCY],
        template: "Target \"{name}\" with loyalty programs to maintain their high engagement.",
    },
    RecommendationRule {
        requires: &[HIGHER_INCOME],
        template: "Offer premium products to \"{name}\" segment to increase their average order value.",
    },
    RecommendationRule {
        requires: &[LOW_PURCHASE_FREQUENCY, MEDIUM_INCOME],
        template: "Create targeted promotions for \"{name}\" to increase their purchase frequency.",
    },
    RecommendationRule {
        requires: &[YOUNGER_DEMOGRAPHIC],
        template: "Use digital channels to engage with \"{name}\" segment more effectively.",
    },
];

/// Appended after the segment-specific recommendations
pub const GENERAL_RECOMMENDATIONS: [&str; 3] = [
    "Consider personalizing marketing campaigns based on the identified customer segments.",
    "Review product offerings to ensure they meet the needs of each customer segment.",
    "Develop retention strategies for your high-value customer segments.",
];

/// Ordered recommendation strings for one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub recommendations: Vec<String>,
}

impl RecommendationSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.recommendations.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
}

/// The parts of a segment the rules read
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SegmentSummary {
    #[serde(default, alias = "clusterName")]
    pub name: String,
    #[serde(default)]
    pub characteristics: Vec<String>,
}

/// Analysis-shaped input of the Recommend contract; unknown fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default, alias = "clusters")]
    pub segments: Vec<SegmentSummary>,
}

impl RecommendationRequest {
    /// Accept either a bare analysis or the historical `{"analysis": {...}}` wrapper.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let body = value.get("analysis").cloned().unwrap_or(value);
        Ok(serde_json::from_value(body)?)
    }
}

impl From<&Analysis> for RecommendationRequest {
    fn from(analysis: &Analysis) -> Self {
        Self {
            segments: analysis
                .segments
                .iter()
                .map(|segment| SegmentSummary {
                    name: segment.name.clone(),
                    characteristics: segment.characteristics.clone(),
                })
                .collect(),
        }
    }
}

/// Recommendations for a previously computed analysis
pub fn recommend(analysis: &Analysis) -> RecommendationSet {
    recommend_segments(&RecommendationRequest::from(analysis).segments)
}

/// Apply every rule to every segment, then append the general recommendations.
pub fn recommend_segments(segments: &[SegmentSummary]) -> RecommendationSet {
    let mut recommendations: Vec<String> = segments
        .iter()
        .flat_map(|segment| {
            RECOMMENDATION_RULES
                .iter()
                .filter(|rule| rule.matches(&segment.characteristics))
                .map(|rule| rule.render(&segment.name))
        })
        .collect();

    recommendations.extend(GENERAL_RECOMMENDATIONS.map(String::from));
    RecommendationSet { recommendations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::LOWER_INCOME;

    fn summary(name: &str, characteristics: &[&str]) -> SegmentSummary {
        SegmentSummary {
            name: name.to_string(),
            characteristics: characteristics.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_rules_fire_in_order() {
        let segments = vec![summary(
            "Frequent Buyers",
            &[YOUNGER_DEMOGRAPHIC, LOWER_INCOME, HIGH_PURCHASE_FREQUENCY],
        )];
        let set = recommend_segments(&segments);

        assert_eq!(set.len(), 5);
        assert_eq!(
            set.recommendations[0],
            "Target \"Frequent Buyers\" with loyalty programs to maintain their high engagement."
        );
        assert_eq!(
            set.recommendations[1],
            "Use digital channels to engage with \"Frequent Buyers\" segment more effectively."
        );
        assert_eq!(&set.recommendations[2..], &GENERAL_RECOMMENDATIONS[..]);
    }

    #[test]
    fn test_compound_rule_needs_both_characteristics() {
        let only_low = vec![summary("Loyal Base", &[LOW_PURCHASE_FREQUENCY])];
        assert_eq!(recommend_segments(&only_low).len(), 3);

        let both = vec![summary("Loyal Base", &[MEDIUM_INCOME, LOW_PURCHASE_FREQUENCY])];
        let set = recommend_segments(&both);
        assert_eq!(
            set.recommendations[0],
            "Create targeted promotions for \"Loyal Base\" to increase their purchase frequency."
        );
    }

    #[test]
    fn test_empty_analysis_gets_general_recommendations() {
        let set = recommend_segments(&[]);
        let all: Vec<&str> = set.iter().collect();
        assert_eq!(all, GENERAL_RECOMMENDATIONS);
    }

    #[test]
    fn test_request_accepts_historical_shape() {
        let json = r#"{
            "analysis": {
                "clusters": [
                    {"clusterId": 0, "clusterName": "Premium Customers",
                     "characteristics": ["Higher income bracket"], "customers": []}
                ],
                "featureImportance": {"income": 1.0},
                "accuracy": 0.7
            }
        }"#;
        let request = RecommendationRequest::from_json(json).unwrap();
        assert_eq!(
            request.segments,
            vec![summary("Premium Customers", &[HIGHER_INCOME])]
        );

        let set = recommend_segments(&request.segments);
        assert_eq!(
            set.recommendations[0],
            "Offer premium products to \"Premium Customers\" segment to increase their average order value."
        );
    }

    #[test]
    fn test_request_tolerates_missing_fields() {
        let json = r#"{"segments": [{"name": "X"}]}"#;
        let request = RecommendationRequest::from_json(json).unwrap();
        assert_eq!(request.segments[0].characteristics.len(), 0);
        assert_eq!(recommend_segments(&request.segments).len(), 3);
    }
}
