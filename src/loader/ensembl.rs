//! Ensembl GTF loader (spec §4.1).
//!
//! Four feature kinds become concepts (gene, transcript, exon, and CDS →
//! `protein`), each PART_OF its containing feature (exon/CDS → transcript,
//! transcript → gene). `gene_name` becomes a HAS_SYMBOL annotation to
//! HGNC_SYMBOL. Requires HGNC_SYMBOL to already be loaded — the
//! orchestrator enforces this prerequisite before invoking this loader,
//! since checking it requires a graph-store read this trait's `parse`
//! (file → data, no store access) cannot perform.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use regex::Regex;

use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{
    Annotation, Concept, ConceptStatus, EnsemblFeature, InternalGraph, Prefix, RelationshipLabel,
    SimilarityMethod, VocabularyExtra, ANNOTATION_TYPE_HAS_SYMBOL,
};

const GTF_URL: &str = "https://ftp.ensembl.org/pub/current_gtf/homo_sapiens/Homo_sapiens.GRCh38.113.gtf.gz";

pub struct EnsemblLoader;

#[async_trait]
impl VocabularyLoader for EnsemblLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Ensembl,
            name: "ensembl",
            file_paths: vec!["ensembl/Homo_sapiens.gtf".to_string()],
            annotations: vec![Prefix::HgncSymbol],
            similarity_methods: vec![],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        let meta = self.metadata();
        if download::all_files_exist(
            &config.data_dir,
            &meta.file_paths.iter().map(String::as_str).collect::<Vec<_>>(),
        ) {
            return Ok(());
        }
        let gz_path = config.data_dir.join("ensembl/Homo_sapiens.gtf.gz");
        download::download_file(
            client,
            GTF_URL,
            &config.data_dir,
            "ensembl/Homo_sapiens.gtf.gz",
            None,
        )
        .await?;
        download::extract_from_gzip(&gz_path, &config.data_dir.join("ensembl/Homo_sapiens.gtf"))?;
        std::fs::remove_file(&gz_path)?;
        Ok(())
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let attr_re = Regex::new(r#"(\S+)\s"([^"]+)""#).unwrap();

        let content = std::fs::read_to_string(data_dir.join("ensembl/Homo_sapiens.gtf"))?;

        let mut concepts = Vec::new();
        let mut graph = InternalGraph::new();
        let mut cross_annotations = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for line in content.lines() {
            if line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 9 {
                continue;
            }

            let chromosome = cols[0].to_string();
            let feature_kind = cols[2];
            let start: Option<u64> = cols[3].parse().ok();
            let end: Option<u64> = cols[4].parse().ok();
            let strand: Option<i8> = match cols[6] {
                "+" => Some(1),
                "-" => Some(-1),
                _ => None,
            };
            let attributes = cols[8];

            let mut attrs = std::collections::HashMap::new();
            for cap in attr_re.captures_iter(attributes) {
                attrs.insert(cap[1].to_string(), cap[2].to_string());
            }

            let (feature, id_key, parent_key) = match feature_kind {
                "gene" => (EnsemblFeature::Gene, "gene_id", None),
                "transcript" => (EnsemblFeature::Transcript, "transcript_id", Some("gene_id")),
                "exon" => (EnsemblFeature::Exon, "exon_id", Some("transcript_id")),
                "CDS" => (EnsemblFeature::Protein, "protein_id", Some("transcript_id")),
                _ => continue,
            };

            let Some(id) = attrs.get(id_key).cloned() else {
                continue;
            };
            if !seen.insert(id.clone()) {
                if let Some(parent_key) = parent_key {
                    if let Some(parent) = attrs.get(parent_key) {
                        graph.add_edge(id.clone(), parent.clone(), RelationshipLabel::PartOf);
                    }
                }
                continue;
            }

            let mut concept = Concept::new(Prefix::Ensembl, id.clone());
            concept.concept_types = vec![feature_kind.to_lowercase()];
            concept.label = attrs.get("gene_name").or_else(|| attrs.get(id_key)).cloned();
            concept.status = ConceptStatus::Active;
            concept.extra = VocabularyExtra::Ensembl {
                feature,
                chromosome: Some(chromosome),
                start,
                end,
                strand,
            };
            concepts.push(concept);

            if let Some(parent_key) = parent_key {
                if let Some(parent) = attrs.get(parent_key) {
                    graph.add_edge(id.clone(), parent.clone(), RelationshipLabel::PartOf);
                }
            }

            if feature_kind == "gene" {
                if let Some(gene_name) = attrs.get("gene_name") {
                    cross_annotations.push(
                        Annotation::new(Prefix::Ensembl, id, Prefix::HgncSymbol, gene_name)
                            .with_type(ANNOTATION_TYPE_HAS_SYMBOL),
                    );
                }
            }
        }

        Ok(ParsedVocabulary {
            concepts,
            graph,
            cross_annotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_gtf(dir: &Path) {
        std::fs::create_dir_all(dir.join("ensembl")).unwrap();
        std::fs::write(
            dir.join("ensembl/Homo_sapiens.gtf"),
            concat!(
                "#!genome-build GRCh38\n",
                "1\tensembl_havana\tgene\t1000\t2000\t.\t+\t.\tgene_id \"ENSG001\"; gene_name \"BRCA1\";\n",
                "1\tensembl_havana\ttranscript\t1000\t2000\t.\t+\t.\tgene_id \"ENSG001\"; transcript_id \"ENST001\";\n",
                "1\tensembl_havana\texon\t1000\t1200\t.\t+\t.\tgene_id \"ENSG001\"; transcript_id \"ENST001\"; exon_id \"ENSE001\";\n",
                "1\tensembl_havana\tCDS\t1000\t1200\t.\t-\t0\tgene_id \"ENSG001\"; transcript_id \"ENST001\"; protein_id \"ENSP001\";\n",
            ),
        )
        .unwrap();
    }

    #[test]
    fn parses_four_feature_kinds_with_part_of_edges() {
        let dir = tempfile::tempdir().unwrap();
        write_gtf(dir.path());

        let parsed = EnsemblLoader.parse(dir.path()).unwrap();
        assert_eq!(parsed.concepts.len(), 4);

        let exon = parsed.concepts.iter().find(|c| c.concept_id == "ENSE001").unwrap();
        assert!(matches!(exon.extra, VocabularyExtra::Ensembl { feature: EnsemblFeature::Exon, strand: Some(1), .. }));

        assert!(parsed.graph.edges.iter().any(|e| e.from_concept_id == "ENST001"
            && e.to_concept_id == "ENSG001"
            && e.label == RelationshipLabel::PartOf));
        assert!(parsed.graph.edges.iter().any(|e| e.from_concept_id == "ENSE001"
            && e.to_concept_id == "ENST001"));
    }

    #[test]
    fn gene_name_becomes_has_symbol_annotation() {
        let dir = tempfile::tempdir().unwrap();
        write_gtf(dir.path());

        let parsed = EnsemblLoader.parse(dir.path()).unwrap();
        assert!(parsed.cross_annotations.iter().any(|a| a.concept_id_from == "ENSG001"
            && a.concept_id_to == "BRCA1"
            && a.annotation_type.as_deref() == Some(ANNOTATION_TYPE_HAS_SYMBOL)));
    }
}
