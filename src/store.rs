use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::models::AssetDocument;

const REQUIRED_FIELDS: [&str; 3] = ["name", "city", "state"];

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Payload must be an object")]
    NotAnObject,

    #[error("Title is required")]
    MissingTitle,

    #[error("Assets must be a non-empty array")]
    NoAssets,

    #[error("Asset at index {0} must be an object")]
    AssetNotAnObject(usize),

    #[error("Asset at index {index} is missing required field: {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("Asset at index {0} has an invalid {1} field")]
    InvalidField(usize, &'static str),
}

/// Checks a raw payload and converts it into a document.
pub fn validate(body: &str) -> Result<AssetDocument, ValidationError> {
    let payload: Value = serde_json::from_str(body).map_err(|e| ValidationError::Json(e.to_string()))?;
    let obj = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    match obj.get("title").and_then(Value::as_str) {
        Some(title) if !title.trim().is_empty() => {}
        _ => return Err(ValidationError::MissingTitle),
    }

    let assets = match obj.get("assets").and_then(Value::as_array) {
        Some(assets) if !assets.is_empty() => assets,
        _ => return Err(ValidationError::NoAssets),
    };

    for (index, asset) in assets.iter().enumerate() {
        let asset = asset.as_object().ok_or(ValidationError::AssetNotAnObject(index))?;
        for field in REQUIRED_FIELDS {
            match asset.get(field).and_then(Value::as_str) {
                Some(v) if !v.trim().is_empty() => {}
                _ => return Err(ValidationError::MissingField { index, field }),
            }
        }
        for field in ["notes", "ip"] {
            match asset.get(field) {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(_) => return Err(ValidationError::InvalidField(index, field)),
            }
        }
    }

    serde_json::from_value(payload).map_err(|e| ValidationError::Json(e.to_string()))
}

/// The saved asset document on disk.
pub struct AssetStore {
    path: PathBuf,
}

impl AssetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Option<AssetDocument>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, doc: &AssetDocument) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(doc)?)?;
        info!("saved {} assets to {}", doc.assets.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_valid_document() {
        let doc = validate(
            r#"{"title":"Test Assets Map","assets":[
                {"name":"Primary DC","city":"Seattle","state":"WA","notes":"Cloud Edge"},
                {"name":"Backup DC","city":"Austin","state":"TX","ip":"10.1.1.1"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.assets.len(), 2);
        assert_eq!(doc.assets[1].ip.as_deref(), Some("10.1.1.1"));
    }

    #[test]
    fn reports_the_first_problem() {
        assert_eq!(validate("[]"), Err(ValidationError::NotAnObject));
        assert_eq!(validate(r#"{"title":" ","assets":[]}"#), Err(ValidationError::MissingTitle));
        assert_eq!(validate(r#"{"title":"t","assets":[]}"#), Err(ValidationError::NoAssets));
        assert_eq!(
            validate(r#"{"title":"t","assets":[{"name":"a","city":"b","state":"c"},{"name":"a","city":" "}]}"#),
            Err(ValidationError::MissingField { index: 1, field: "city" })
        );
        assert_eq!(
            validate(r#"{"title":"t","assets":[{"name":"a","city":"b","state":"c","notes":5}]}"#),
            Err(ValidationError::InvalidField(0, "notes"))
        );
        assert!(matches!(validate("{"), Err(ValidationError::Json(_))));
    }

    #[test]
    fn messages_match_the_api_contract() {
        let err = ValidationError::MissingField { index: 2, field: "state" };
        assert_eq!(err.to_string(), "Asset at index 2 is missing required field: state");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::new(dir.path().join("data").join("assets.json"));
        assert!(store.load().unwrap().is_none());
        let doc = validate(r#"{"title":"t","assets":[{"name":"a","city":"b","state":"c"}]}"#).unwrap();
        store.save(&doc).unwrap();
        let back = store.load().unwrap().unwrap();
        assert_eq!(back.title, "t");
        assert_eq!(back.assets, doc.assets);
    }
}
