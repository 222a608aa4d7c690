//! CTV3 ↔ SNOMED CT annotations (spec §4.2), from the NHS TRUD Read
//! Code CTV3-to-SNOMED cross map. RF2 formatted and deduplicated by max
//! `effectiveTime` like [`super::ordo_snomed`], but inactive rows are
//! kept: a retired CTV3 code can still carry a historically valid map.

use std::path::Path;

use async_trait::async_trait;

use super::super::rf2;
use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::{BtsError, BtsResult};
use crate::model::{Annotation, Prefix};

const FILE: &str = "ctv3_snomed/der2_sRefset_ComplexMapCtv3ToSnomed.txt";
const TRUD_RELEASE_API: &str = "https://isd.digital.nhs.uk/trud/api/v1/keys";
const TRUD_ITEM_ID: &str = "9";

pub struct Ctv3SnomedLoader;

#[async_trait]
impl AnnotationLoader for Ctv3SnomedLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::Ctv3, Prefix::Snomed),
            name: "ctv3_snomed",
            file_paths: vec![FILE.to_string()],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        if download::all_files_exist(&config.data_dir, &[FILE]) {
            return Ok(());
        }
        let api_key = config
            .nhs_trud_api_key
            .as_ref()
            .ok_or_else(|| BtsError::MissingCredential("nhs_trud_api_key".to_string()))?;

        let resource_url = format!("{TRUD_RELEASE_API}/{api_key}/items/{TRUD_ITEM_ID}/releases?latest");
        let archive_url = download::trud_release_url(client, &resource_url).await?;
        download::download_and_extract_zip(
            client,
            &archive_url,
            &config.data_dir,
            &[("der2_sRefset_ComplexMapSnapshot_*.txt", FILE)],
        )
        .await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<Vec<Annotation>> {
        let (headers, rows) = rf2::read_deduplicated(&data_dir.join(FILE))?;
        let referenced_idx = col(&headers, "referencedComponentId")?;
        let map_target_idx = col(&headers, "mapTarget")?;

        let mut annotations = Vec::new();
        for row in &rows {
            let ctv3_id = row.get(referenced_idx).unwrap_or("");
            let snomed_id = row.get(map_target_idx).unwrap_or("");
            if ctv3_id.is_empty() || snomed_id.is_empty() {
                continue;
            }
            annotations.push(Annotation::new(
                Prefix::Ctv3,
                ctv3_id,
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
