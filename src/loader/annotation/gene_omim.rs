//! HGNC_SYMBOL ↔ OMIM annotations (spec §4.2), from BioPortal's OMIM gene
//! map export. (Documented correction: the URL this loader should use is
//! easy to confuse with the unrelated NCIt-HGNC mapping URL used by
//! [`super::gene_ncit`] — they share a BioPortal host and a similar path
//! shape. This loader always points at the OMIM gene map endpoint; see
//! DESIGN.md.)

use std::path::Path;

use async_trait::async_trait;

use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::{BtsError, BtsResult};
use crate::model::{Annotation, Prefix};

const URL: &str = "https://data.bioontology.org/ontologies/OMIM/gene_map/download";
const FILE: &str = "gene_omim/omim_gene_map.csv";

pub struct GeneOmimLoader;

#[async_trait]
impl AnnotationLoader for GeneOmimLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::HgncSymbol, Prefix::Omim),
            name: "gene_omim",
            file_paths: vec![FILE.to_string()],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        if download::all_files_exist(&config.data_dir, &[FILE]) {
            return Ok(());
        }
        let api_key = config
            .bioportal_api_key
            .as_ref()
            .ok_or_else(|| BtsError::MissingCredential("bioportal_api_key".to_string()))?;
        download::download_file(
            client,
            URL,
            &config.data_dir,
            FILE,
            Some(vec![("Authorization", format!("apikey token={api_key}"))]),
        )
        .await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<Vec<Annotation>> {
        let mut reader = csv::Reader::from_path(data_dir.join(FILE))?;
        let headers = reader.headers()?.clone();
        let omim_idx = col(&headers, "Class ID")?;
        let symbol_idx = col(&headers, "Gene Symbol")?;

        let mut annotations = Vec::new();
        for result in reader.records() {
            let record = result?;
            let omim_id = record
                .get(omim_idx)
                .and_then(|v| v.rsplit('/').next())
                .unwrap_or("");
            let symbol = record.get(symbol_idx).unwrap_or("");
            if omim_id.is_empty() || symbol.is_empty() {
                continue;
            }
            annotations.push(Annotation::new(
                Prefix::HgncSymbol,
                symbol,
                Prefix::Omim,
                omim_id,
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
    fn parses_omim_class_id_last_segment_with_gene_symbol() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("gene_omim")).unwrap();
        std::fs::write(
            dir.path().join(FILE),
            "Class ID,Gene Symbol\nhttp://purl.bioontology.org/ontology/OMIM/604370,BRCA1\n",
        )
        .unwrap();

        let annotations = GeneOmimLoader.parse(dir.path()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].concept_id_from, "BRCA1");
        assert_eq!(annotations[0].concept_id_to, "604370");
    }
}
