//! HGNC_SYMBOL ↔ NCIT annotations (spec §4.2). Plain TSV, no credential
//! required.

use std::path::Path;

use async_trait::async_trait;

use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{Annotation, Prefix};

const URL: &str = "https://evs.nci.nih.gov/ftp1/NCI_Thesaurus/Mappings/NCIt-HGNC_Mapping.txt";
const FILE: &str = "gene_ncit/NCIt-HGNC_Mapping.txt";

pub struct GeneNcitLoader;

#[async_trait]
impl AnnotationLoader for GeneNcitLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::HgncSymbol, Prefix::Ncit),
            name: "gene_ncit",
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
        let ncit_idx = col(&headers, "NCIt Code")?;
        let symbol_idx = col(&headers, "HGNC Symbol")?;

        let mut annotations = Vec::new();
        for result in reader.records() {
            let record = result?;
            let ncit_code = record.get(ncit_idx).unwrap_or("");
            let symbol = record.get(symbol_idx).unwrap_or("");
            if ncit_code.is_empty() || symbol.is_empty() {
                continue;
            }
            annotations.push(Annotation::new(
                Prefix::HgncSymbol,
                symbol,
                Prefix::Ncit,
                ncit_code,
            ));
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
