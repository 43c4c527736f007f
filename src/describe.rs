//! Qualitative characteristics and names for segments

use crate::data::Record;
use std::collections::BTreeMap;

/// Qualitative label for values below `upper_bound`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub upper_bound: f64,
    pub label: &'static str,
}

/// Bracket table for one recognized field; the first alias present in the data is used
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBrackets {
    pub aliases: &'static [&'static str],
    pub brackets: &'static [Bracket],
}

impl FieldBrackets {
    /// Label of the first bracket whose bound exceeds `value`.
    pub fn label_for(&self, value: f64) -> Option<&'static str> {
        self.brackets
            .iter()
            .find(|bracket| value < bracket.upper_bound)
            .map(|bracket| bracket.label)
    }
}

pub const YOUNGER_DEMOGRAPHIC: &str = "Younger demographic";
pub const MIDDLE_AGED_DEMOGRAPHIC: &str = "Middle-aged demographic";
pub const OLDER_DEMOGRAPHIC: &str = "Older demographic";
pub const LOWER_INCOME: &str = "Lower income bracket";
pub const MEDIUM_INCOME: &str = "Medium income bracket";
pub const HIGHER_INCOME: &str = "Higher income bracket";
pub const LOW_PURCHASE_FREQUENCY: &str = "Low purchase frequency";
pub const MEDIUM_PURCHASE_FREQUENCY: &str = "Medium purchase frequency";
pub const HIGH_PURCHASE_FREQUENCY: &str = "High purchase frequency";

/// Recognized numeric fields, in the order their characteristics are emitted
pub const FIELD_BRACKETS: [FieldBrackets; 3] = [
    FieldBrackets {
        aliases: &["age"],
        brackets: &[
            Bracket {
                upper_bound: 30.0,
                label: YOUNGER_DEMOGRAPHIC,
            },
            Bracket {
                upper_bound: 45.0,
                label: MIDDLE_AGED_DEMOGRAPHIC,
            },
            Bracket {
                upper_bound: f64::INFINITY,
                label: OLDER_DEMOGRAPHIC,
            },
        ],
    },
    FieldBrackets {
        aliases: &["income"],
        brackets: &[
            Bracket {
                upper_bound: 60_000.0,
                label: LOWER_INCOME,
            },
            Bracket {
                upper_bound: 90_000.0,
                label: MEDIUM_INCOME,
            },
            Bracket {
                upper_bound: f64::INFINITY,
                label: HIGHER_INCOME,
            },
        ],
    },
    FieldBrackets {
        aliases: &["purchases", "purchase_frequency"],
        brackets: &[
            Bracket {
                upper_bound: 10.0,
                label: LOW_PURCHASE_FREQUENCY,
            },
            Bracket {
                upper_bound: 15.0,
                label: MEDIUM_PURCHASE_FREQUENCY,
            },
            Bracket {
                upper_bound: f64::INFINITY,
                label: HIGH_PURCHASE_FREQUENCY,
            },
        ],
    },
];

/// Categorical field summarised by its most frequent value
pub const REGION_FIELD: &str = "region";

/// Naming rules, first match wins
pub const NAMING_RULES: [(&str, &str); 3] = [
    (HIGHER_INCOME, "Premium Customers"),
    (HIGH_PURCHASE_FREQUENCY, "Frequent Buyers"),
    (YOUNGER_DEMOGRAPHIC, "Emerging Customers"),
];

/// Names used when no rule matches, picked by segment id
pub const FALLBACK_NAMES: [&str; 5] = [
    "High-Value Customers",
    "Frequent Buyers",
    "New Potentials",
    "Loyal Base",
    "Premium Segment",
];

/// Characteristics for one segment.
///
/// # Arguments
/// * `centroid` - Mean of each numeric field over the segment, original units
/// * `members` - Records of the segment, used for the region summary
/// * `region_is_categorical` - Whether the batch has a categorical `region` field
pub fn describe_segment(
    centroid: &BTreeMap<String, f64>,
    members: &[Record],
    region_is_categorical: bool,
) -> Vec<String> {
    let mut characteristics: Vec<String> = FIELD_BRACKETS
        .iter()
        .filter_map(|table| {
            let value = table
                .aliases
                .iter()
                .find_map(|alias| centroid.get(*alias))?;
            table.label_for(*value)
        })
        .map(str::to_string)
        .collect();

    if region_is_categorical {
        if let Some(region) = dominant_region(members) {
            characteristics.push(format!("Primarily from {region} region"));
        }
    }

    characteristics
}

/// Most frequent non-null region among `members`; ties go to the value seen first.
pub fn dominant_region(members: &[Record]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for member in members {
        let region = match member.get(REGION_FIELD) {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(serde_json::Value::Null) | None => continue,
            Some(other) => other.to_string(),
        };
        match counts.iter_mut().find(|(value, _)| *value == region) {
            Some((_, count)) => *count += 1,
            None => counts.push((region, 1)),
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (value, count) in counts {
        if best.as_ref().map_or(true, |(_, best_count)| count > *best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// Segment name from its characteristics; falls back to a pool entry chosen by `segment_id`.
pub fn name_segment(segment_id: usize, characteristics: &[String]) -> String {
    NAMING_RULES
        .iter()
        .find(|(characteristic, _)| characteristics.iter().any(|c| c.contains(characteristic)))
        .map(|(_, name)| *name)
        .unwrap_or(FALLBACK_NAMES[segment_id % FALLBACK_NAMES.len()])
        .to_string()
}
