use tera::{Context, Tera};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::models::Asset;

const POPUP_TEMPLATE: &str = "popup.html";
const TOOLTIP_TEMPLATE: &str = "tooltip.html";

const DEFAULT_POPUP: &str = "<strong>{{ name }}</strong><br/>{{ location }}\
{% if ip %}<br/><code>{{ ip }}</code>{% endif %}\
{% if notes %}<br/><em>{{ notes }}</em>{% endif %}";

const DEFAULT_TOOLTIP: &str = "{{ count }} assets\
{% if locations %}<br/>{{ locations | join(sep=\", \") }}{% endif %}";

/// Marker popup and hover-hint content. Templates in the configured
/// directory override the built-in ones by file name.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(base_path: &Path) -> Result<Self> {
        let mut tera = if base_path.exists() {
            let pattern = format!("{}/**/*.html", base_path.to_string_lossy());
            match Tera::new(&pattern) {
                Ok(t) => t,
                Err(e) => {
                    if e.to_string().contains("no templates found") || e.to_string().contains("match any files") {
                        Tera::default()
                    } else {
                        return Err(e.into());
                    }
                }
            }
        } else {
            Tera::default()
        };

        let loaded: Vec<String> = tera.get_template_names().map(str::to_string).collect();
        for (name, body) in [(POPUP_TEMPLATE, DEFAULT_POPUP), (TOOLTIP_TEMPLATE, DEFAULT_TOOLTIP)] {
            if loaded.iter().any(|n| n == name) {
                debug!("using custom template {}", name);
            } else {
                tera.add_raw_template(name, body)?;
            }
        }
        tera.autoescape_on(vec![".html"]);

        Ok(Self { tera })
    }

    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(POPUP_TEMPLATE, DEFAULT_POPUP)?;
        tera.add_raw_template(TOOLTIP_TEMPLATE, DEFAULT_TOOLTIP)?;
        tera.autoescape_on(vec![".html"]);
        Ok(Self { tera })
    }

    pub fn popup(&self, asset: &Asset) -> Result<String> {
        let mut context = Context::new();
        context.insert("name", &asset.name);
        context.insert("location", &asset.location_label());
        context.insert("ip", &asset.ip.as_deref().filter(|s| !s.trim().is_empty()));
        context.insert("notes", &asset.notes.as_deref().filter(|s| !s.trim().is_empty()));
        self.render(POPUP_TEMPLATE, &context)
    }

    /// `locations` is deduplicated by the caller.
    pub fn tooltip(&self, count: usize, locations: &[String]) -> Result<String> {
        let mut context = Context::new();
        context.insert("count", &count);
        context.insert("locations", locations);
        self.render(TOOLTIP_TEMPLATE, &context)
    }

    fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        self.tera.render(template_name, context).map_err(|e| {
            let loaded = self.tera.get_template_names().collect::<Vec<_>>();
            anyhow::anyhow!("Tera Render Error: {}. Requested: '{}'. Loaded: {:?}", e, template_name, loaded)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_escapes_and_skips_missing_fields() {
        let engine = TemplateEngine::builtin().unwrap();
        let mut asset = Asset::new("Edge <1>", "Austin", "TX");
        let html = engine.popup(&asset).unwrap();
        assert_eq!(html, "<strong>Edge &lt;1&gt;</strong><br/>Austin, TX");

        asset.notes = Some("Disaster recovery".to_string());
        asset.ip = Some("10.0.0.1".to_string());
        let html = engine.popup(&asset).unwrap();
        assert!(html.ends_with("<br/><code>10.0.0.1</code><br/><em>Disaster recovery</em>"));
    }

    #[test]
    fn tooltip_lists_locations() {
        let engine = TemplateEngine::builtin().unwrap();
        let text = engine.tooltip(3, &["Austin, TX".to_string(), "Round Rock, TX".to_string()]).unwrap();
        assert_eq!(text, "3 assets<br/>Austin, TX, Round Rock, TX");
    }

    #[test]
    fn directory_templates_override_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("popup.html"), "[{{ name }}]").unwrap();
        let engine = TemplateEngine::new(dir.path()).unwrap();
        assert_eq!(engine.popup(&Asset::new("S1", "Austin", "TX")).unwrap(), "[S1]");
        assert!(engine.tooltip(2, &[]).unwrap().starts_with("2 assets"));
    }

    #[test]
    fn missing_directory_falls_back_to_builtins() {
        let engine = TemplateEngine::new(Path::new("/nonexistent/assetmap/templates")).unwrap();
        assert!(engine.popup(&Asset::new("S1", "Austin", "TX")).unwrap().contains("S1"));
    }
}
