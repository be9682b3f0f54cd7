//! Extraction templates: declarative field rules scoped per vendor.
//!
//! Field heuristics live in template files, not code, so a new vendor or
//! field is a YAML change. Templates are loaded once at startup and are
//! read-only afterwards.

pub mod store;

pub use store::{TemplateSelection, TemplateStore};

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Where a rule's pattern is searched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Search the aggregated document text; leftmost match wins.
    #[default]
    FullText,
    /// Search block texts in reading order, preferring blocks inside the
    /// rule's region when one is declared.
    Block,
}

/// Template-declared value normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalizer {
    /// Ordered date-format attempts, output `%Y-%m-%d`.
    Date,
    /// Comma decimal separator converted to a dot.
    Amount,
    /// All non-overlapping `{rate, amount}` pairs, in document order.
    Repeated,
}

/// One field rule inside a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    /// Regular expression; capture group 1 is the value when present,
    /// the whole match otherwise.
    pub pattern: String,

    #[serde(default)]
    pub scope: RuleScope,

    /// Static certainty in `(0, 1]` assigned on match.
    pub confidence_weight: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<Normalizer>,

    /// Optional `(x0, y0, x1, y1)` constraint for block-scoped rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<(f32, f32, f32, f32)>,
}

/// A template as declared in a vendor's YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Base identifier matched against filenames. Defaults to the
    /// template file's stem when the file does not declare one.
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// Field name to rule, stably ordered by name.
    pub fields: BTreeMap<String, FieldRule>,
}

/// A rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: FieldRule,
    pub regex: Regex,
}

/// A template ready for matching, produced once at load time.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub id: String,
    pub vendor: Option<String>,
    pub fields: BTreeMap<String, CompiledRule>,
}

impl Template {
    /// Compile every rule, validating patterns and weights.
    pub fn compile(self) -> Result<CompiledTemplate, TemplateError> {
        let mut fields = BTreeMap::new();
        for (name, rule) in self.fields {
            if !(rule.confidence_weight > 0.0 && rule.confidence_weight <= 1.0) {
                return Err(TemplateError::InvalidRule {
                    template: self.id.clone(),
                    field: name,
                    reason: format!(
                        "confidence_weight {} outside (0, 1]",
                        rule.confidence_weight
                    ),
                });
            }
            let regex = Regex::new(&rule.pattern).map_err(|e| TemplateError::InvalidRule {
                template: self.id.clone(),
                field: name.clone(),
                reason: e.to_string(),
            })?;
            fields.insert(name, CompiledRule { rule, regex });
        }
        Ok(CompiledTemplate {
            id: self.id,
            vendor: self.vendor,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(pattern: &str, weight: f32) -> FieldRule {
        FieldRule {
            pattern: pattern.to_string(),
            scope: RuleScope::FullText,
            confidence_weight: weight,
            normalizer: None,
            region: None,
        }
    }

    #[test]
    fn test_compile_validates_weight() {
        let mut fields = BTreeMap::new();
        fields.insert("total".to_string(), rule(r"total", 1.5));
        let template = Template {
            id: "t".to_string(),
            vendor: None,
            fields,
        };
        let err = template.compile().unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { .. }));
    }

    #[test]
    fn test_compile_validates_pattern() {
        let mut fields = BTreeMap::new();
        fields.insert("broken".to_string(), rule(r"([unclosed", 0.5));
        let template = Template {
            id: "t".to_string(),
            vendor: None,
            fields,
        };
        assert!(template.compile().is_err());
    }

    #[test]
    fn test_yaml_rule_shape() {
        let yaml = r#"
id: invoice
fields:
  total:
    pattern: 'total[:\s]*([0-9]+[,.][0-9]{2})'
    scope: full_text
    confidence_weight: 0.95
    normalizer: amount
  issue_date:
    pattern: '(\d{1,2}/\d{1,2}/\d{2,4})'
    confidence_weight: 0.9
    normalizer: date
"#;
        let template: Template = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.id, "invoice");
        assert_eq!(template.fields.len(), 2);
        let total = &template.fields["total"];
        assert_eq!(total.scope, RuleScope::FullText);
        assert_eq!(total.normalizer, Some(Normalizer::Amount));
        // scope defaults to full_text when omitted
        assert_eq!(template.fields["issue_date"].scope, RuleScope::FullText);
        assert!(template.compile().is_ok());
    }
}
