//! HGNC_SYMBOL ↔ ORDO annotations (spec §4.2), from Orphadata's
//! `en_product6.xml` gene association export. This is a plain nested-element
//! XML shape (`DisorderList > Disorder > DisorderGeneAssociationList >
//! DisorderGeneAssociation > Gene > Symbol`), unlike the OWL/RDF-XML the
//! ontology loaders read, so it gets its own small walker rather than
//! reusing [`super::super::owl`]. No credential required.

use std::path::Path;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::{BtsError, BtsResult};
use crate::model::{Annotation, Prefix};

const URL: &str = "https://www.orphadata.com/data/xml/en_product6.xml";
const FILE: &str = "gene_ordo/en_product6.xml";

pub struct GeneOrdoLoader;

#[async_trait]
impl AnnotationLoader for GeneOrdoLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::HgncSymbol, Prefix::Ordo),
            name: "gene_ordo",
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
        let file = std::fs::File::open(data_dir.join(FILE))?;
        let mut xml = Reader::from_reader(std::io::BufReader::new(file));

        let mut buf = Vec::new();
        let mut annotations = Vec::new();

        let mut current_orpha: Option<String> = None;
        let mut in_gene = false;
        let mut text_buf = String::new();

        loop {
            match xml.read_event_into(&mut buf).map_err(|e| parse_err(&e))? {
                Event::Start(e) => {
                    let name = local_name(e.name().as_ref());
                    text_buf.clear();
                    if name == "Gene" {
                        in_gene = true;
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| parse_err(&e))?;
                    text_buf.push_str(text.trim());
                }
                Event::End(e) => {
                    let name = local_name(e.name().as_ref());
                    match name.as_str() {
                        "OrphaNumber" if current_orpha.is_none() && !text_buf.is_empty() => {
                            current_orpha = Some(text_buf.clone());
                        }
                        "Symbol" if in_gene && !text_buf.is_empty() => {
                            if let Some(orpha) = &current_orpha {
                                annotations.push(Annotation::new(
                                    Prefix::HgncSymbol,
                                    text_buf.clone(),
                                    Prefix::Ordo,
                                    orpha.clone(),
                                ));
                            }
                        }
                        "Gene" => in_gene = false,
                        "Disorder" => current_orpha = None,
                        _ => {}
                    }
                    text_buf.clear();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(annotations)
    }
}

fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    match s.split_once(':') {
        Some((_, local)) => local.to_string(),
        None => s.to_string(),
    }
}

fn parse_err(e: &dyn std::fmt::Display) -> BtsError {
    BtsError::ParseError {
        file: FILE.to_string(),
        line: 0,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_disorder_orpha_number_to_gene_symbols() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("gene_ordo")).unwrap();
        std::fs::write(
            dir.path().join(FILE),
            r#"<JDBOR>
              <DisorderList>
                <Disorder id="17601">
                  <OrphaNumber>166024</OrphaNumber>
                  <Name>Meckel syndrome</Name>
                  <DisorderGeneAssociationList>
                    <DisorderGeneAssociation>
                      <Gene id="20160">
                        <Symbol>MKS1</Symbol>
                      </Gene>
                    </DisorderGeneAssociation>
                    <DisorderGeneAssociation>
                      <Gene id="20161">
                        <Symbol>CEP290</Symbol>
                      </Gene>
                    </DisorderGeneAssociation>
                  </DisorderGeneAssociationList>
                </Disorder>
              </DisorderList>
            </JDBOR>"#,
        )
        .unwrap();

        let annotations = GeneOrdoLoader.parse(dir.path()).unwrap();
        assert_eq!(annotations.len(), 2);
        assert!(annotations.iter().any(|a| a.concept_id_from == "MKS1" && a.concept_id_to == "166024"));
        assert!(annotations.iter().any(|a| a.concept_id_from == "CEP290" && a.concept_id_to == "166024"));
    }
}
