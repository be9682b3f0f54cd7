//! Template-driven field extraction over assembled document content.

pub mod confidence;
pub mod normalize;

pub use confidence::overall_confidence;

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::document::Block;
use crate::models::result::{Evidence, ExtractedField, FieldValue};
use crate::template::{CompiledRule, CompiledTemplate, Normalizer, RuleScope};

/// Applies a template's field rules to text and layout blocks.
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract every field the template declares.
    ///
    /// The mapping always contains one entry per template field;
    /// unmatched fields carry `value: None` so consumers see a stable
    /// field set.
    pub fn extract(
        &self,
        template: &CompiledTemplate,
        text: &str,
        blocks: &[Block],
    ) -> BTreeMap<String, ExtractedField> {
        let mut fields = BTreeMap::new();
        for (name, rule) in &template.fields {
            let field = match rule.rule.scope {
                RuleScope::FullText => extract_full_text(rule, text),
                RuleScope::Block => extract_from_blocks(rule, blocks),
            };
            debug!(
                "field '{}': {}",
                name,
                if field.is_filled() { "matched" } else { "no match" }
            );
            fields.insert(name.clone(), field);
        }
        fields
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_full_text(rule: &CompiledRule, text: &str) -> ExtractedField {
    if rule.rule.normalizer == Some(Normalizer::Repeated) {
        return repeated_field(rule, text, None);
    }

    let Some(caps) = rule.regex.captures(text) else {
        return ExtractedField::absent();
    };
    let matched = caps.get(0).unwrap();
    let raw_value = caps.get(1).map(|m| m.as_str()).unwrap_or(matched.as_str());
    scalar_field(rule, raw_value, matched.as_str(), None)
}

fn extract_from_blocks(rule: &CompiledRule, blocks: &[Block]) -> ExtractedField {
    // A declared region is a preference, not a filter: blocks inside it
    // are tried first, then the rest in reading order.
    if let Some(region) = rule.rule.region {
        for block in blocks.iter().filter(|b| b.intersects(region)) {
            let field = match_in_block(rule, block);
            if field.is_filled() {
                return field;
            }
        }
    }
    for block in blocks {
        let field = match_in_block(rule, block);
        if field.is_filled() {
            return field;
        }
    }
    ExtractedField::absent()
}

fn match_in_block(rule: &CompiledRule, block: &Block) -> ExtractedField {
    if rule.rule.normalizer == Some(Normalizer::Repeated) {
        return repeated_field(rule, &block.text, Some(block.coords));
    }

    let Some(caps) = rule.regex.captures(&block.text) else {
        return ExtractedField::absent();
    };
    let matched = caps.get(0).unwrap();
    let raw_value = caps.get(1).map(|m| m.as_str()).unwrap_or(matched.as_str());
    scalar_field(rule, raw_value, matched.as_str(), Some(block.coords))
}

/// A single-valued field, with the rule's normalizer applied. A value
/// the normalizer rejects degrades to an absent field, never to the
/// raw text.
fn scalar_field(
    rule: &CompiledRule,
    raw_value: &str,
    matched_text: &str,
    coords: Option<(f32, f32, f32, f32)>,
) -> ExtractedField {
    let normalized = match rule.rule.normalizer {
        None => Some(raw_value.to_string()),
        Some(Normalizer::Date) => normalize::normalize_date(raw_value),
        Some(Normalizer::Amount) => normalize::normalize_amount(raw_value),
        Some(Normalizer::Repeated) => None,
    };

    match normalized {
        Some(value) => ExtractedField {
            value: Some(FieldValue::Text(value)),
            confidence: rule.rule.confidence_weight,
            evidence: Evidence {
                text: matched_text.to_string(),
                coords,
            },
        },
        None => ExtractedField::absent(),
    }
}

fn repeated_field(
    rule: &CompiledRule,
    text: &str,
    coords: Option<(f32, f32, f32, f32)>,
) -> ExtractedField {
    let lines = normalize::collect_repeated(&rule.regex, text);
    if lines.is_empty() {
        return ExtractedField::absent();
    }
    let evidence_text = rule
        .regex
        .find_iter(text)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    ExtractedField {
        value: Some(FieldValue::Taxes(lines)),
        confidence: rule.rule.confidence_weight,
        evidence: Evidence {
            text: evidence_text,
            coords,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::TaxLine;
    use crate::template::{FieldRule, Template};
    use pretty_assertions::assert_eq;

    fn template(fields: Vec<(&str, FieldRule)>) -> CompiledTemplate {
        Template {
            id: "test".to_string(),
            vendor: None,
            fields: fields
                .into_iter()
                .map(|(name, rule)| (name.to_string(), rule))
                .collect(),
        }
        .compile()
        .unwrap()
    }

    fn rule(pattern: &str) -> FieldRule {
        FieldRule {
            pattern: pattern.to_string(),
            scope: RuleScope::FullText,
            confidence_weight: 0.9,
            normalizer: None,
            region: None,
        }
    }

    #[test]
    fn test_leftmost_match_wins() {
        let template = template(vec![(
            "invoice_number",
            rule(r"(?i)(?:invoice|factura)[:\s#-]*([A-Za-z0-9/.-]+)"),
        )]);
        let text = "Factura: F-2024-001\nFactura: F-2024-999";

        let fields = FieldExtractor::new().extract(&template, text, &[]);
        let field = &fields["invoice_number"];
        assert_eq!(
            field.value,
            Some(FieldValue::Text("F-2024-001".to_string()))
        );
        assert_eq!(field.confidence, 0.9);
        assert!(field.evidence.text.starts_with("Factura"));
    }

    #[test]
    fn test_whole_match_when_no_capture_group() {
        let template = template(vec![("currency", rule(r"EUR|USD"))]);
        let fields = FieldExtractor::new().extract(&template, "Importe en EUR", &[]);
        assert_eq!(
            fields["currency"].value,
            Some(FieldValue::Text("EUR".to_string()))
        );
    }

    #[test]
    fn test_unmatched_fields_stay_in_mapping() {
        let template = template(vec![
            ("present", rule(r"hola")),
            ("missing", rule(r"adios")),
        ]);
        let fields = FieldExtractor::new().extract(&template, "hola mundo", &[]);

        assert_eq!(fields.len(), 2);
        assert!(fields["present"].is_filled());
        assert_eq!(fields["missing"], ExtractedField::absent());
    }

    #[test]
    fn test_date_normalizer_applies() {
        let mut date_rule = rule(r"(\d{1,2}/\d{1,2}/\d{2,4})");
        date_rule.normalizer = Some(Normalizer::Date);
        let template = template(vec![("issue_date", date_rule)]);

        let fields = FieldExtractor::new().extract(&template, "Fecha: 03/05/2024", &[]);
        assert_eq!(
            fields["issue_date"].value,
            Some(FieldValue::Text("2024-05-03".to_string()))
        );
        assert_eq!(fields["issue_date"].evidence.text, "03/05/2024");
    }

    #[test]
    fn test_unparsable_date_yields_absent() {
        let mut date_rule = rule(r"(\d{1,2}/\d{1,2}/\d{2,4})");
        date_rule.normalizer = Some(Normalizer::Date);
        let template = template(vec![("issue_date", date_rule)]);

        // Matches the pattern but no calendar accepts it.
        let fields = FieldExtractor::new().extract(&template, "Fecha: 31/02/2024", &[]);
        assert_eq!(fields["issue_date"], ExtractedField::absent());
    }

    #[test]
    fn test_amount_normalizer_applies() {
        let mut amount_rule = rule(r"(?i)total[:\s]*([0-9.]+,[0-9]{2})");
        amount_rule.normalizer = Some(Normalizer::Amount);
        let template = template(vec![("total", amount_rule)]);

        let fields = FieldExtractor::new().extract(&template, "TOTAL: 1.234,56", &[]);
        assert_eq!(
            fields["total"].value,
            Some(FieldValue::Text("1234.56".to_string()))
        );
    }

    #[test]
    fn test_repeated_collects_all_pairs() {
        let mut taxes_rule = rule(r"(\d{1,2}%)\s*(\d+[,.]\d{2})");
        taxes_rule.normalizer = Some(Normalizer::Repeated);
        let template = template(vec![("taxes", taxes_rule)]);

        let text = "Base 21% 100,00\nBase 10% 50,00";
        let fields = FieldExtractor::new().extract(&template, text, &[]);
        assert_eq!(
            fields["taxes"].value,
            Some(FieldValue::Taxes(vec![
                TaxLine {
                    kind: "21%".to_string(),
                    amount: "100.00".to_string()
                },
                TaxLine {
                    kind: "10%".to_string(),
                    amount: "50.00".to_string()
                },
            ]))
        );
        assert!(fields["taxes"].evidence.text.contains("21% 100,00"));
    }

    #[test]
    fn test_block_scope_prefers_region() {
        let mut block_rule = rule(r"([0-9]+,[0-9]{2})");
        block_rule.scope = RuleScope::Block;
        block_rule.region = Some((0.0, 0.0, 300.0, 400.0));
        let template = template(vec![("total", block_rule)]);

        let blocks = vec![
            Block {
                text: "Subtotal 80,00".to_string(),
                coords: (50.0, 700.0, 200.0, 715.0),
                confidence: None,
            },
            Block {
                text: "Total 96,80".to_string(),
                coords: (50.0, 100.0, 200.0, 115.0),
                confidence: None,
            },
        ];

        let fields = FieldExtractor::new().extract(&template, "", &blocks);
        let field = &fields["total"];
        assert_eq!(field.value, Some(FieldValue::Text("96,80".to_string())));
        assert_eq!(field.evidence.coords, Some((50.0, 100.0, 200.0, 115.0)));
    }

    #[test]
    fn test_block_scope_falls_back_to_reading_order() {
        let mut block_rule = rule(r"total");
        block_rule.scope = RuleScope::Block;
        block_rule.region = Some((1000.0, 1000.0, 1100.0, 1100.0));
        let template = template(vec![("label", block_rule)]);

        let blocks = vec![Block {
            text: "total general".to_string(),
            coords: (10.0, 10.0, 90.0, 25.0),
            confidence: None,
        }];

        let fields = FieldExtractor::new().extract(&template, "", &blocks);
        assert!(fields["label"].is_filled());
    }
}
