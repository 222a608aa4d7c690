//! ORDO ↔ SNOMED CT annotations (spec §4.2), from the UK SNOMED CT
//! simple reference set mapping ORDO numbers to SNOMED concepts. RF2
//! formatted (needs the same max-`effectiveTime` dedup as the SNOMED
//! vocabulary loader) and, unlike [`super::ctv3_snomed`], inactive rows
//! are dropped after dedup.

use std::path::Path;

use async_trait::async_trait;

use super::super::rf2;
use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::{BtsError, BtsResult};
use crate::model::{Annotation, Prefix};

const FILE: &str = "ordo_snomed/der2_sRefset_SimpleMapOrdoToSnomed.txt";

pub struct OrdoSnomedLoader;

#[async_trait]
impl AnnotationLoader for OrdoSnomedLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::Ordo, Prefix::Snomed),
            name: "ordo_snomed",
            file_paths: vec![FILE.to_string()],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        if download::all_files_exist(&config.data_dir, &[FILE]) {
            return Ok(());
        }
        let api_key = config
            .nih_umls_api_key
            .as_ref()
            .ok_or_else(|| BtsError::MissingCredential("nih_umls_api_key".to_string()))?;

        let url = format!(
            "https://uts-ws.nlm.nih.gov/download?url=https://isd.digital.nhs.uk/download/ordo_snomed_map&apiKey={api_key}"
        );
        download::download_file(client, &url, &config.data_dir, FILE, None).await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<Vec<Annotation>> {
        let (headers, rows) = rf2::read_deduplicated(&data_dir.join(FILE))?;
        let active_idx = col(&headers, "active")?;
        let referenced_idx = col(&headers, "referencedComponentId")?;
        let map_target_idx = col(&headers, "mapTarget")?;

        let mut annotations = Vec::new();
        for row in &rows {
            if row.get(active_idx).unwrap_or("0") != "1" {
                continue;
            }
            let snomed_id = row.get(referenced_idx).unwrap_or("");
            let ordo_id = row.get(map_target_idx).unwrap_or("");
            if snomed_id.is_empty() || ordo_id.is_empty() {
                continue;
            }
            annotations.push(Annotation::new(
                Prefix::Ordo,
                ordo_id,
                Prefix::Snomed,
                snomed_id,
            ));
        }
        Ok(annotations)
    }
}

fn col(headers: &csv::StringRecord, name: &str) -> BtsResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| BtsError::ParseError {
            file: FILE.to_string(),
            line: 0,
            message: format!("missing column {name}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_inactive_rows_after_dedup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ordo_snomed")).unwrap();
        std::fs::write(
            dir.path().join(FILE),
            "id\teffectiveTime\tactive\tmoduleId\trefSetId\treferencedComponentId\tmapTarget\n\
             1\t20200101\t1\tX\tY\t404684003\t166024\n\
             2\t20230101\t0\tX\tY\t404684004\t166025\n",
        )
        .unwrap();

        let annotations = OrdoSnomedLoader.parse(dir.path()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].concept_id_to, "404684003");
        assert_eq!(annotations[0].concept_id_from, "166024");
    }
}
