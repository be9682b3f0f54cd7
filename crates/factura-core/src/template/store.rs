//! Load-once template store with deterministic vendor selection.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use super::{CompiledTemplate, Template};
use crate::error::TemplateError;

/// Directory under the template root holding the global fallback.
const DEFAULT_DIR: &str = "default";
/// File name of the global fallback template.
const DEFAULT_FILE: &str = "default.yml";

/// Outcome of template selection.
#[derive(Debug)]
pub struct TemplateSelection<'a> {
    pub template: &'a CompiledTemplate,
    /// Non-fatal notes, e.g. vendor lookup falling back to default.
    pub warnings: Vec<String>,
}

/// All templates for the process, loaded once and immutable afterwards.
///
/// Layout on disk: one subdirectory per vendor with `*.yml`/`*.yaml`
/// files, plus `default/default.yml` as the required global fallback.
#[derive(Debug)]
pub struct TemplateStore {
    /// Vendor name to templates sorted by id ascending.
    vendors: HashMap<String, Vec<CompiledTemplate>>,
    default: CompiledTemplate,
}

impl TemplateStore {
    /// Load and validate every template under `dir`.
    ///
    /// Fails when the default template is missing, a file does not
    /// parse, a rule is invalid, or a vendor holds two templates with
    /// the same identifier. Meant to run at startup so a broken store
    /// never serves requests.
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        let default_path = dir.join(DEFAULT_DIR).join(DEFAULT_FILE);
        if !default_path.is_file() {
            return Err(TemplateError::MissingDefault(dir.display().to_string()));
        }
        let default = load_template(&default_path)?;

        let mut vendors: HashMap<String, Vec<CompiledTemplate>> = HashMap::new();
        let entries = std::fs::read_dir(dir).map_err(|e| TemplateError::Parse {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| TemplateError::Parse {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            let Some(vendor) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_dir() || vendor.starts_with('.') || vendor == DEFAULT_DIR {
                continue;
            }

            let mut templates = load_vendor_dir(&path)?;
            if templates.is_empty() {
                continue;
            }

            // Deterministic iteration: ascending case-folded id, first
            // match wins. Matching is case-insensitive, so ids that
            // differ only in case are the same identifier.
            templates.sort_by_key(|t| t.id.to_lowercase());
            for pair in templates.windows(2) {
                if pair[0].id.to_lowercase() == pair[1].id.to_lowercase() {
                    return Err(TemplateError::DuplicateId {
                        vendor: vendor.to_string(),
                        id: pair[1].id.clone(),
                    });
                }
            }

            debug!("vendor '{}': {} templates", vendor, templates.len());
            vendors.insert(vendor.to_string(), templates);
        }

        info!(
            "template store ready: {} vendors, default '{}'",
            vendors.len(),
            default.id
        );
        Ok(Self { vendors, default })
    }

    /// Resolve the template for a vendor and filename.
    ///
    /// A template matches when the filename, case-insensitively, starts
    /// with the template id. Vendors are consulted in ascending-id order
    /// so repeated calls always return the same template.
    pub fn select(&self, vendor: &str, filename: &str) -> TemplateSelection<'_> {
        let mut warnings = Vec::new();

        if let Some(templates) = self.vendors.get(vendor) {
            let lower = filename.to_lowercase();
            for template in templates {
                if lower.starts_with(&template.id.to_lowercase()) {
                    debug!(
                        "selected template '{}' for vendor '{}', file '{}'",
                        template.id, vendor, filename
                    );
                    return TemplateSelection {
                        template,
                        warnings,
                    };
                }
            }
            warnings.push(format!(
                "no template of vendor '{}' matches '{}', using default",
                vendor, filename
            ));
        } else {
            warnings.push(format!("unknown vendor '{}', using default", vendor));
        }

        TemplateSelection {
            template: &self.default,
            warnings,
        }
    }

    /// The global fallback template.
    pub fn default_template(&self) -> &CompiledTemplate {
        &self.default
    }

    /// Vendor names, sorted.
    pub fn vendor_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vendors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Templates of one vendor, in selection order.
    pub fn vendor_templates(&self, vendor: &str) -> Option<&[CompiledTemplate]> {
        self.vendors.get(vendor).map(Vec::as_slice)
    }
}

fn load_vendor_dir(dir: &Path) -> Result<Vec<CompiledTemplate>, TemplateError> {
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| TemplateError::Parse {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| TemplateError::Parse {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
            .unwrap_or(false);
        if path.is_file() && is_yaml {
            templates.push(load_template(&path)?);
        }
    }
    Ok(templates)
}

fn load_template(path: &Path) -> Result<CompiledTemplate, TemplateError> {
    let content = std::fs::read_to_string(path).map_err(|e| TemplateError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut template: Template =
        serde_yaml::from_str(&content).map_err(|e| TemplateError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    if template.id.is_empty() {
        template.id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
    }

    template.compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const MINIMAL_FIELDS: &str = r#"
fields:
  total:
    pattern: 'total[:\s]*([0-9]+[,.][0-9]{2})'
    confidence_weight: 0.95
    normalizer: amount
"#;

    fn write_template(root: &Path, vendor: &str, file: &str, body: &str) {
        let dir = root.join(vendor);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), body).unwrap();
    }

    fn store_with_default(root: &Path) {
        write_template(root, "default", "default.yml", MINIMAL_FIELDS);
    }

    #[test]
    fn test_missing_default_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "acme", "invoice.yml", MINIMAL_FIELDS);

        let err = TemplateStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingDefault(_)));
    }

    #[test]
    fn test_id_defaults_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        store_with_default(dir.path());
        write_template(dir.path(), "acme", "invoice.yml", MINIMAL_FIELDS);

        let store = TemplateStore::load(dir.path()).unwrap();
        let selection = store.select("acme", "INVOICE_2024_01.pdf");
        assert_eq!(selection.template.id, "invoice");
        assert!(selection.warnings.is_empty());
    }

    #[test]
    fn test_selection_is_deterministic_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        store_with_default(dir.path());
        // Both ids prefix-match "invoice_2024.pdf"; ascending order makes
        // "inv" win every time.
        write_template(dir.path(), "acme", "invoice.yml", MINIMAL_FIELDS);
        write_template(dir.path(), "acme", "inv.yml", MINIMAL_FIELDS);

        let store = TemplateStore::load(dir.path()).unwrap();
        for _ in 0..3 {
            let selection = store.select("acme", "invoice_2024.pdf");
            assert_eq!(selection.template.id, "inv");
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        store_with_default(dir.path());
        write_template(dir.path(), "acme", "invoice.yml", MINIMAL_FIELDS);
        write_template(
            dir.path(),
            "acme",
            "other.yml",
            &format!("id: INVOICE\n{}", MINIMAL_FIELDS),
        );

        let err = TemplateStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateId { .. }));
    }

    #[test]
    fn test_unknown_vendor_falls_back_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        store_with_default(dir.path());

        let store = TemplateStore::load(dir.path()).unwrap();
        let selection = store.select("nobody", "scan.pdf");
        assert_eq!(selection.template.id, "default");
        assert_eq!(selection.warnings.len(), 1);
        assert!(selection.warnings[0].contains("unknown vendor"));
    }

    #[test]
    fn test_no_match_falls_back_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        store_with_default(dir.path());
        write_template(dir.path(), "acme", "invoice.yml", MINIMAL_FIELDS);

        let store = TemplateStore::load(dir.path()).unwrap();
        let selection = store.select("acme", "receipt_99.pdf");
        assert_eq!(selection.template.id, "default");
        assert_eq!(selection.warnings.len(), 1);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        store_with_default(dir.path());
        write_template(dir.path(), "acme", "Invoice.yml", MINIMAL_FIELDS);

        let store = TemplateStore::load(dir.path()).unwrap();
        let selection = store.select("acme", "iNvOiCe-7.pdf");
        assert_eq!(selection.template.id.to_lowercase(), "invoice");
        assert!(selection.warnings.is_empty());
    }
}
