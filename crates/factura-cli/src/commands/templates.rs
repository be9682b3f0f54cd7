//! Templates command - inspect the extraction template library.

use std::path::PathBuf;

use clap::Args;
use console::style;

use factura_core::models::config::FacturaConfig;
use factura_core::TemplateStore;

/// Arguments for the templates command.
#[derive(Args)]
pub struct TemplatesArgs {
    /// Template directory (default: from config)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Show one vendor's templates with their field rules
    #[arg(long)]
    vendor: Option<String>,
}

pub async fn run(args: TemplatesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    // Load configuration
    let config = if let Some(path) = config_path {
        FacturaConfig::from_file(std::path::Path::new(path))?
    } else {
        FacturaConfig::default()
    };

    let dir = args.dir.unwrap_or(config.templates.dir);

    // Loading validates the whole library, including the default
    // template every vendor falls back to
    let store = TemplateStore::load(&dir)?;

    if let Some(vendor) = &args.vendor {
        return show_vendor(&store, vendor);
    }

    println!(
        "{} Template library at {}",
        style("ℹ").blue(),
        dir.display()
    );
    println!();

    for vendor in store.vendor_names() {
        let templates = store.vendor_templates(vendor).unwrap_or(&[]);
        println!("{}", style(vendor).bold());
        for template in templates {
            println!("  {:<24} {} fields", template.id, template.fields.len());
        }
        println!();
    }

    println!(
        "{} Default template: {}",
        style("✓").green(),
        store.default_template().id
    );

    Ok(())
}

fn show_vendor(store: &TemplateStore, vendor: &str) -> anyhow::Result<()> {
    let templates = match store.vendor_templates(vendor) {
        Some(templates) => templates,
        None => anyhow::bail!("No templates for vendor '{}'", vendor),
    };

    for template in templates {
        println!("{}", style(&template.id).bold());
        for (name, compiled) in &template.fields {
            let mut notes = vec![format!("weight {:.2}", compiled.rule.confidence_weight)];
            if compiled.rule.scope == factura_core::template::RuleScope::Block {
                notes.push("block scope".to_string());
            }
            if let Some(normalizer) = &compiled.rule.normalizer {
                notes.push(format!("{:?} normalizer", normalizer).to_lowercase());
            }
            println!("  {:<20} {}", name, notes.join(", "));
        }
        println!();
    }

    Ok(())
}
