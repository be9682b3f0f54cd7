//! Coverage-based confidence scoring.

use std::collections::BTreeMap;

use crate::models::result::ExtractedField;

/// Share of fields with a non-null value, clamped to `[0, 1]`.
///
/// This is a coverage ratio, not a quality score: a matched field
/// counts the same however certain its rule was, and an empty mapping
/// scores 0.0.
pub fn overall_confidence(fields: &BTreeMap<String, ExtractedField>) -> f32 {
    if fields.is_empty() {
        return 0.0;
    }
    let filled = fields.values().filter(|f| f.is_filled()).count();
    (filled as f32 / fields.len() as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::{Evidence, FieldValue};
    use pretty_assertions::assert_eq;

    fn filled() -> ExtractedField {
        ExtractedField {
            value: Some(FieldValue::Text("x".to_string())),
            confidence: 0.9,
            evidence: Evidence::default(),
        }
    }

    #[test]
    fn test_empty_mapping_scores_zero() {
        assert_eq!(overall_confidence(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_full_coverage_scores_one() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), filled());
        fields.insert("b".to_string(), filled());
        assert_eq!(overall_confidence(&fields), 1.0);
    }

    #[test]
    fn test_partial_coverage() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), filled());
        fields.insert("b".to_string(), ExtractedField::absent());
        fields.insert("c".to_string(), ExtractedField::absent());
        fields.insert("d".to_string(), filled());
        assert_eq!(overall_confidence(&fields), 0.5);
    }

    #[test]
    fn test_rule_certainty_does_not_change_coverage() {
        let mut low = filled();
        low.confidence = 0.1;
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), low);
        assert_eq!(overall_confidence(&fields), 1.0);
    }
}
