//! HGNC_SYMBOL ↔ HPO annotations (spec §4.2), from the HPO annotation
//! project's `phenotype_to_genes.txt`. Frequency is a letter code (E, VR,
//! OC, F, VF, O, UN) stored verbatim as a property rather than resolved
//! to a numeric term id, unlike [`super::hpo_ordo`]'s raw HPO frequency
//! term.

use std::path::Path;

use async_trait::async_trait;

use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{Annotation, Prefix};

const URL: &str = "https://purl.obolibrary.org/obo/hp/hpoa/phenotype_to_genes.txt";
const FILE: &str = "gene_hpo/phenotype_to_genes.txt";

pub struct GeneHpoLoader;

#[async_trait]
impl AnnotationLoader for GeneHpoLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::HgncSymbol, Prefix::Hpo),
            name: "gene_hpo",
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
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(data_dir.join(FILE))?;
        let headers = reader.headers()?.clone();
        let hpo_idx = col(&headers, "hpo_id")?;
        let gene_idx = col(&headers, "gene_symbol")?;
        let frequency_idx = headers.iter().position(|h| h == "frequency");

        let mut annotations = Vec::new();
        for result in reader.records() {
            let record = result?;
            let hpo_id = record.get(hpo_idx).unwrap_or("").trim_start_matches("HP:");
            let gene_symbol = record.get(gene_idx).unwrap_or("");
            if hpo_id.is_empty() || gene_symbol.is_empty() {
                continue;
            }
            let mut annotation =
                Annotation::new(Prefix::HgncSymbol, gene_symbol, Prefix::Hpo, hpo_id);
            if let Some(idx) = frequency_idx {
                let freq = record.get(idx).unwrap_or("");
                if !freq.is_empty() {
                    annotation = annotation.with_property("frequency", freq);
                }
            }
            annotations.push(annotation);
        }
        Ok(annotations)
    }
}

fn col(headers: &csv::StringRecord, name: &str) -> BtsResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| crate::error::BtsError::ParseError {
            file: FILE.to_string(),
            line: 0,
            message: format!("missing column {name}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gene_to_hpo_with_frequency_property() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("gene_hpo")).unwrap();
        std::fs::write(
            dir.path().join(FILE),
            "hpo_id\thpo_name\tgene_symbol\tfrequency\nHP:0001250\tSeizure\tBRCA1\tHP:0040283\n",
        )
        .unwrap();

        let annotations = GeneHpoLoader.parse(dir.path()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].concept_id_from, "BRCA1");
        assert_eq!(annotations[0].concept_id_to, "0001250");
        assert_eq!(
            annotations[0].properties.get("frequency"),
            Some(&"HP:0040283".to_string())
        );
    }
}
