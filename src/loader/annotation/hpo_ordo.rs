//! HPO ↔ ORDO annotations (spec §4.2), from the HPO-ORDO Ontological
//! Module (HOOM). Reuses [`super::super::owl::parse_owl_classes`] purely
//! to enumerate class IRIs — HOOM's classes need no label/definition/
//! subClassOf, just their encoded id triple: disorder Orpha number,
//! phenotype HPO id, and frequency HPO id (a raw HPO term, unlike
//! [`super::gene_hpo`]'s letter-coded frequency).

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;

use super::super::owl::parse_owl_classes;
use super::{AnnotationLoader, AnnotationLoaderMetadata};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{Annotation, Prefix};

const URL: &str = "https://www.orphadata.com/data/ontologies/hoom/last_version/HOOM.owl";
const FILE: &str = "hpo_ordo/HOOM.owl";

pub struct HpoOrdoLoader;

#[async_trait]
impl AnnotationLoader for HpoOrdoLoader {
    fn metadata(&self) -> AnnotationLoaderMetadata {
        AnnotationLoaderMetadata {
            pair: (Prefix::Hpo, Prefix::Ordo),
            name: "hpo_ordo",
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
        let classes = parse_owl_classes(std::io::BufReader::new(file))?;

        let id_re = Regex::new(r"Orpha_(\d+)_HP_(\d+)_HP_(\d+)").unwrap();

        let mut annotations = Vec::new();
        for class in &classes {
            let Some(caps) = id_re.captures(&class.iri) else {
                continue;
            };
            let orpha = caps[1].to_string();
            let phenotype = caps[2].to_string();
            let frequency = caps[3].to_string();

            annotations.push(
                Annotation::new(Prefix::Hpo, phenotype, Prefix::Ordo, orpha)
                    .with_property("frequency", frequency),
            );
        }
        Ok(annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extracts_disorder_phenotype_and_frequency_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("hpo_ordo")).unwrap();
        let mut f = std::fs::File::create(dir.path().join(FILE)).unwrap();
        write!(
            f,
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:owl="http://www.w3.org/2002/07/owl#">
              <owl:Class rdf:about="http://www.orphadata.org/HOOM/Orpha_166024_HP_0000118_HP_0040281"/>
            </rdf:RDF>"#
        )
        .unwrap();

        let annotations = HpoOrdoLoader.parse(dir.path()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].concept_id_from, "0000118");
        assert_eq!(annotations[0].concept_id_to, "166024");
        assert_eq!(
            annotations[0].properties.get("frequency"),
            Some(&"0040281".to_string())
        );
    }
}
