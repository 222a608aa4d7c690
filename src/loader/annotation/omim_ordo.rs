//! OMIM ↔ ORDO annotations (spec §4.2), from Orphadata's
//! `en_product1_OMIM.json` alignment export. The export wraps every level
//! in a single-element array (`JDBOR[0].DisorderList[0].Disorder[]`), an
//! Orphadata JSON convention kept as-is rather than normalized away, since
//! `serde_json::Value` navigation handles it directly.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::{BtsError, BtsResult};
use crate::model::{Annotation, Prefix};

const URL: &str = "https://www.orphadata.com/data/json/en_product1_OMIM.json";
const FILE: &str = "omim_ordo/en_product1_OMIM.json";

pub struct OmimOrdoLoader;

#[async_trait]
impl AnnotationLoader for OmimOrdoLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::Omim, Prefix::Ordo),
            name: "omim_ordo",
            file_paths: vec![FILE.to_string()],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        if download::all_files_exist(&config.data_dir, &[FILE]) {
            return Ok(());
        }
        download::download_file(client, URL, &config.data_dir, FILE, None).await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<Vec<Annotation>> {
        let raw = std::fs::read_to_string(data_dir.join(FILE))?;
        let root: Value = serde_json::from_str(&raw)?;

        let disorders = root
            .get("JDBOR")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(|v| v.get("DisorderList"))
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(|v| v.get("Disorder"))
            .and_then(Value::as_array)
            .ok_or_else(|| BtsError::ParseError {
                file: FILE.to_string(),
                line: 0,
                message: "unexpected JDBOR/DisorderList/Disorder shape".to_string(),
            })?;

        let mut annotations = Vec::new();
        for disorder in disorders {
            let Some(orpha) = disorder.get("OrphaNumber").and_then(Value::as_str) else {
                continue;
            };

            let references = disorder
                .get("ExternalReferenceList")
                .and_then(Value::as_array)
                .and_then(|a| a.first())
                .and_then(|v| v.get("ExternalReference"))
                .and_then(Value::as_array);

            let Some(references) = references else {
                continue;
            };

            for reference in references {
                let source = reference.get("Source").and_then(Value::as_str);
                if source != Some("OMIM") {
                    continue;
                }
                let Some(omim_id) = reference.get("Reference").and_then(Value::as_str) else {
                    continue;
                };

                let mut annotation =
                    Annotation::new(Prefix::Omim, omim_id, Prefix::Ordo, orpha);
                if let Some(relation) = reference
                    .get("DisorderMappingRelation")
                    .and_then(Value::as_str)
                {
                    annotation = annotation.with_property("mapping_relation", relation);
                }
                annotations.push(annotation);
            }
        }
        Ok(annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_wrapped_arrays_to_extract_omim_references() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("omim_ordo")).unwrap();
        std::fs::write(
            dir.path().join(FILE),
            r#"{
              "JDBOR": [{
                "DisorderList": [{
                  "Disorder": [{
                    "OrphaNumber": "166024",
                    "ExternalReferenceList": [{
                      "ExternalReference": [
                        {"Source": "OMIM", "Reference": "249000", "DisorderMappingRelation": "E"},
                        {"Source": "ICD-10", "Reference": "Q61.9"}
                      ]
                    }]
                  }]
                }]
              }]
            }"#,
        )
        .unwrap();

        let annotations = OmimOrdoLoader.parse(dir.path()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].concept_id_from, "249000");
        assert_eq!(annotations[0].concept_id_to, "166024");
        assert_eq!(
            annotations[0].properties.get("mapping_relation"),
            Some(&"E".to_string())
        );
    }
}
