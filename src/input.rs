use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Input document:
/// ```json
/// { "index": ["books/*.txt"], "query": ["today", "tomorrow"] }
/// ```
/// Either field may be missing or `null`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct InputDoc {
    #[serde(default)]
    index: Option<Vec<String>>,
    #[serde(default)]
    query: Option<Vec<String>>,
}

impl InputDoc {
    pub fn new(index: Vec<String>, query: Vec<String>) -> Self {
        Self { index: Some(index), query: Some(query) }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open input {}", path.display()))?;
        serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parse input {}", path.display()))
    }

    pub fn index(&self) -> &[String] {
        self.index.as_deref().unwrap_or(&[])
    }

    pub fn query(&self) -> &[String] {
        self.query.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_null_fields_are_empty() {
        let d: InputDoc = serde_json::from_str(r#"{"index": null}"#).unwrap();
        assert!(d.index().is_empty());
        assert!(d.query().is_empty());
    }

    #[test]
    fn fields_keep_their_order() {
        let d: InputDoc = serde_json::from_str(r#"{"index": ["b/*", "a.txt"], "query": ["x", "y"]}"#).unwrap();
        assert_eq!(d.index(), ["b/*".to_string(), "a.txt".to_string()]);
        assert_eq!(d.query(), ["x".to_string(), "y".to_string()]);
    }
}
