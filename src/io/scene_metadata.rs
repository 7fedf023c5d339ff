use crate::types::{AlignError, AlignResult};
use serde::Deserialize;
use std::path::Path;

/// Quality attributes published by the download client for one scene
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneProperties {
    pub cloud_cover: f64,
    pub quality_category: String,
    #[serde(default)]
    pub clear_confidence_percent: Option<f64>,
    #[serde(default)]
    pub heavy_haze_percent: Option<f64>,
    #[serde(default)]
    pub visible_confidence_percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SceneDocument {
    properties: SceneProperties,
}

/// Reader for the per-scene JSON sidecar (`<prefix>metadata.json`)
pub struct SceneMetadataReader;

impl SceneMetadataReader {
    pub fn read<P: AsRef<Path>>(path: P) -> AlignResult<SceneProperties> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AlignError::InvalidFormat(format!(
                "Cannot read scene metadata {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> AlignResult<SceneProperties> {
        let document: SceneDocument = serde_json::from_str(content)?;
        Ok(document.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_percentages_default_to_none() {
        let json = r#"{
            "id": "20230601_101010_3B",
            "properties": {
                "cloud_cover": 0.02,
                "quality_category": "standard",
                "clear_confidence_percent": 97
            }
        }"#;

        let props = SceneMetadataReader::parse(json).unwrap();
        assert_eq!(props.cloud_cover, 0.02);
        assert_eq!(props.clear_confidence_percent, Some(97.0));
        assert_eq!(props.heavy_haze_percent, None);
    }

    #[test]
    fn test_missing_cloud_cover_is_an_error() {
        let json = r#"{"properties": {"quality_category": "standard"}}"#;
        assert!(SceneMetadataReader::parse(json).is_err());
    }
}
