//! Black-box end-to-end scenarios from spec §8, driven entirely through
//! the public API: [`IngestOrchestrator`] for ingest/annotation/similarity,
//! [`QuerySurface`] for reads. Every store is an in-process backend so the
//! suite has no external dependencies.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use bioterms::config::{CacheDriver, Config, DocStoreDriver, GraphStoreDriver, VectorStoreDriver};
use bioterms::error::BtsError;
use bioterms::model::{Annotation, Prefix, RelationshipLabel, SimilarityMethod};
use bioterms::orchestrator::IngestOrchestrator;
use bioterms::query::QuerySurface;
use bioterms::store::cache::MemoryCache;
use bioterms::store::document::SqliteDocumentStore;
use bioterms::store::graph::MemoryGraphStore;
use bioterms::store::vector::MemoryVectorStore;

fn test_config(data_dir: &Path) -> Config {
    Config {
        process_limit: 2,
        auto_complete_min_length: 3,
        data_dir: data_dir.to_path_buf(),
        doc_store_driver: DocStoreDriver::Sqlite,
        mongo_uri: None,
        mongo_db_name: "bioterms".into(),
        sqlite_db_path: ":memory:".into(),
        graph_store_driver: GraphStoreDriver::Memory,
        neo4j_uri: None,
        neo4j_username: None,
        neo4j_password: None,
        neo4j_db_name: "neo4j".into(),
        vector_store_driver: VectorStoreDriver::Memory,
        qdrant_uri: None,
        embedding_model_name: "fake".into(),
        embedding_batch_size: 8,
        embedding_dimensions: 8,
        torch_device: "cpu".into(),
        cache_driver: CacheDriver::Memory,
        redis_host: "localhost".into(),
        redis_port: 6379,
        redis_db: 0,
        nhs_trud_api_key: None,
        bioportal_api_key: None,
        nih_umls_api_key: None,
        verbose_print: false,
        disable_progress_bar: true,
    }
}

fn test_orchestrator(data_dir: &Path) -> IngestOrchestrator {
    IngestOrchestrator::new(
        test_config(data_dir),
        Arc::new(SqliteDocumentStore::open_in_memory().unwrap()),
        Arc::new(MemoryGraphStore::new()),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(MemoryCache::new()),
    )
}

fn write_hpo_fixture(data_dir: &Path) {
    std::fs::create_dir_all(data_dir.join("hpo")).unwrap();
    std::fs::write(
        data_dir.join("hpo/hp.owl"),
        r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                 xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
                 xmlns:owl="http://www.w3.org/2002/07/owl#"
                 xmlns:oboInOwl="http://www.geneontology.org/formats/oboInOwl#">
          <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0000118">
            <rdfs:label>Phenotypic abnormality</rdfs:label>
          </owl:Class>
          <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0000707">
            <rdfs:label>Abnormality of the nervous system</rdfs:label>
            <rdfs:subClassOf rdf:resource="http://purl.obolibrary.org/obo/HP_0000118"/>
          </owl:Class>
          <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0001250">
            <rdfs:label>Seizure</rdfs:label>
            <rdfs:subClassOf rdf:resource="http://purl.obolibrary.org/obo/HP_0000707"/>
          </owl:Class>
          <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0002373">
            <rdfs:label>Febrile seizure</rdfs:label>
            <rdfs:subClassOf rdf:resource="http://purl.obolibrary.org/obo/HP_0001250"/>
          </owl:Class>
        </rdf:RDF>"#,
    )
    .unwrap();
}

// Scenario 1 (spec §8): HPO ingest then auto-complete "seizure" must
// contain 0001250 at position 0 (exact substring match, shortest label).
#[tokio::test]
async fn hpo_ingest_then_autocomplete_finds_seizure_first() {
    let data_dir = tempfile::tempdir().unwrap();
    write_hpo_fixture(data_dir.path());
    let orch = test_orchestrator(data_dir.path());

    let loaded = orch.load(Prefix::Hpo, false).await.unwrap();
    assert_eq!(loaded, 4);

    let surface = QuerySurface::new(orch.documents.clone(), orch.graph.clone(), orch.config.auto_complete_min_length);
    let response = surface.auto_complete_v1(Prefix::Hpo, "seizure", 5).await.unwrap();
    match response {
        bioterms::query::AutoCompleteV1Response::Results(ids) => {
            assert_eq!(ids.first().map(String::as_str), Some("0001250"));
        }
        bioterms::query::AutoCompleteV1Response::Advisory(msg) => panic!("expected results, got advisory: {msg}"),
    }
}

// Scenario 3 (spec §8): expand(HPO, ["0000118"], maxDepth=1) returns at
// least one direct subclass and never the root itself.
#[tokio::test]
async fn hpo_descendants_expand_returns_direct_subclass_only() {
    let data_dir = tempfile::tempdir().unwrap();
    write_hpo_fixture(data_dir.path());
    let orch = test_orchestrator(data_dir.path());
    orch.load(Prefix::Hpo, false).await.unwrap();

    let surface = QuerySurface::new(orch.documents.clone(), orch.graph.clone(), orch.config.auto_complete_min_length);
    let items = surface
        .expand_v2(Prefix::Hpo, &["0000118".to_string()], Some(1), None)
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert!(items[0].descendants.contains(&"0000707".to_string()));
    assert!(!items[0].descendants.contains(&"0000118".to_string()));

    // maxDepth=None is the full transitive descendant set.
    let full = surface
        .expand_v2(Prefix::Hpo, &["0000118".to_string()], None, None)
        .await
        .unwrap();
    assert_eq!(full[0].descendants.len(), 3);
}

fn write_snomed_fixture(data_dir: &Path) {
    let dir = data_dir.join("snomed").join("international");
    std::fs::create_dir_all(&dir).unwrap();
    // Two rows for the same id: an earlier inactive row and a later
    // active one. Only the max-effectiveTime row should survive (spec §8
    // scenario 2, grounded in `loader::rf2`'s `effectiveTime` dedup).
    std::fs::write(
        dir.join("concept.txt"),
        "id\teffectiveTime\tactive\tdefinitionStatusId\n\
         404684003\t20020131\t0\t900000000000074008\n\
         404684003\t20230131\t1\t900000000000073002\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("description.txt"),
        "id\teffectiveTime\tactive\tconceptId\ttypeId\tterm\n\
         1\t20230131\t1\t404684003\t900000000000003001\tClinical finding\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("relationship.txt"),
        "id\teffectiveTime\tactive\tsourceId\tdestinationId\ttypeId\n",
    )
    .unwrap();
}

// Scenario 2 (spec §8): an RF2 concept with a superseded inactive row and
// a later active row must be loaded as ACTIVE, never as the inactive one.
#[tokio::test]
async fn snomed_rf2_dedup_keeps_max_effective_time_row() {
    let data_dir = tempfile::tempdir().unwrap();
    write_snomed_fixture(data_dir.path());
    let orch = test_orchestrator(data_dir.path());

    orch.load(Prefix::Snomed, false).await.unwrap();

    let terms = orch
        .documents
        .get_terms_by_ids(Prefix::Snomed, &["404684003".to_string()])
        .await
        .unwrap();
    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].status, bioterms::model::ConceptStatus::Active);
}

// Scenario 4 (spec §8): loading an annotation pair before either
// vocabulary has been loaded fails with VocabularyNotLoaded.
#[tokio::test]
async fn annotation_dependency_fails_before_vocabularies_loaded() {
    let data_dir = tempfile::tempdir().unwrap();
    let orch = test_orchestrator(data_dir.path());

    let result = orch.load_annotation((Prefix::Hpo, Prefix::HgncSymbol), false).await;
    assert!(matches!(result, Err(BtsError::VocabularyNotLoaded(_))));
}

// Scenario 5 (spec §8): Relevance similarity over a loaded HPO graph plus
// HPO<->gene annotations must produce scores in [0, 1] with no self-edges.
#[tokio::test]
async fn similarity_smoke_scores_in_unit_range_with_no_self_edges() {
    let data_dir = tempfile::tempdir().unwrap();
    write_hpo_fixture(data_dir.path());
    let orch = test_orchestrator(data_dir.path());
    orch.load(Prefix::Hpo, false).await.unwrap();

    let annotations = vec![
        Annotation::new(Prefix::HgncSymbol, "SCN1A", Prefix::Hpo, "0001250"),
        Annotation::new(Prefix::HgncSymbol, "SCN1A", Prefix::Hpo, "0000707"),
        Annotation::new(Prefix::HgncSymbol, "KCNQ2", Prefix::Hpo, "0002373"),
    ];
    orch.graph.save_annotations(&annotations).await.unwrap();

    let written = orch
        .calculate_similarity(SimilarityMethod::Relevance, Prefix::Hpo, None, Some(0.0))
        .await
        .unwrap();
    assert!(written > 0);

    let surface = QuerySurface::new(orch.documents.clone(), orch.graph.clone(), orch.config.auto_complete_min_length);
    let all_ids = vec![
        "0000118".to_string(),
        "0000707".to_string(),
        "0001250".to_string(),
        "0002373".to_string(),
    ];
    let results = surface
        .similarity_v2(Prefix::Hpo, &all_ids, 0.0, true, Some(SimilarityMethod::Relevance), None, None)
        .await
        .unwrap();

    for result in &results {
        for group in &result.groups {
            for similar in &group.similar_concepts {
                assert_ne!(similar.concept_id, result.concept_id, "similarity(x, x) must never be written");
                assert!((0.0..=1.0).contains(&similar.score), "score {} out of range", similar.score);
            }
        }
    }
}

// Scenario 6 (spec §8): translation from ORDO A into an HPO-constrained
// candidate set only returns targets in the constraint set above threshold.
#[tokio::test]
async fn translation_is_constrained_to_allowed_targets_above_threshold() {
    let graph = Arc::new(MemoryGraphStore::new());

    graph
        .save_similarity_scores(
            Prefix::Ordo,
            Prefix::Hpo,
            vec![
                ("A".to_string(), "h1".to_string(), 0.9),
                ("A".to_string(), "h2".to_string(), 0.2),
                ("A".to_string(), "h4".to_string(), 0.95),
            ],
            SimilarityMethod::Relevance,
            None,
        )
        .await
        .unwrap();

    let mut constraints = HashMap::new();
    constraints.insert(Prefix::Hpo, vec!["h1".to_string(), "h2".to_string(), "h3".to_string()]);

    let documents = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let surface = QuerySurface::new(documents, graph, 3);
    let results = surface
        .translate(&["A".to_string()], Prefix::Ordo, &constraints, 0.5, None)
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|t| t.concept_id.as_str()).collect();
    assert_eq!(ids, vec!["h1"]);
    assert!(results.iter().all(|t| t.prefix == Prefix::Hpo));
    assert!(results.iter().all(|t| t.score >= 0.5));
}

// Round-trip/idempotence (spec §8): ingest . delete . ingest yields the
// same concept set and auto-complete results as a single ingest.
#[tokio::test]
async fn ingest_delete_ingest_is_idempotent() {
    let data_dir = tempfile::tempdir().unwrap();
    write_hpo_fixture(data_dir.path());
    let orch = test_orchestrator(data_dir.path());

    orch.load(Prefix::Hpo, false).await.unwrap();
    orch.delete_vocabulary(Prefix::Hpo).await.unwrap();
    let second_count = orch.load(Prefix::Hpo, false).await.unwrap();
    assert_eq!(second_count, 4);

    assert_eq!(orch.graph.count_terms(Prefix::Hpo).await.unwrap(), 4);
    assert_eq!(orch.documents.count_terms(Prefix::Hpo).await.unwrap(), 4);
}

// Invariant (spec §8): after deleteVocabulary(P), no document, node, or
// internal edge for P remains.
#[tokio::test]
async fn delete_vocabulary_leaves_no_trace() {
    let data_dir = tempfile::tempdir().unwrap();
    write_hpo_fixture(data_dir.path());
    let orch = test_orchestrator(data_dir.path());
    orch.load(Prefix::Hpo, false).await.unwrap();

    orch.delete_vocabulary(Prefix::Hpo).await.unwrap();

    assert_eq!(orch.documents.count_terms(Prefix::Hpo).await.unwrap(), 0);
    assert_eq!(orch.graph.count_terms(Prefix::Hpo).await.unwrap(), 0);
    assert_eq!(orch.graph.count_internal_relationships(Prefix::Hpo).await.unwrap(), 0);
}

// Invariant (spec §8): documentCount(P) = graphNodeCount(P) after ingest.
#[tokio::test]
async fn document_and_graph_counts_match_after_ingest() {
    let data_dir = tempfile::tempdir().unwrap();
    write_hpo_fixture(data_dir.path());
    let orch = test_orchestrator(data_dir.path());
    orch.load(Prefix::Hpo, false).await.unwrap();

    let doc_count = orch.documents.count_terms(Prefix::Hpo).await.unwrap();
    let graph_count = orch.graph.count_terms(Prefix::Hpo).await.unwrap();
    assert_eq!(doc_count, graph_count);
}

// Round-trip/idempotence (spec §8): expandTerms(maxDepth=None) equals the
// full transitive IS_A descendant set, confirmed against a 3-level chain.
#[tokio::test]
async fn expand_terms_with_no_max_depth_is_fully_transitive() {
    let store = MemoryGraphStore::new();
    let mut internal = bioterms::model::InternalGraph::new();
    internal.add_edge("0000707", "0000118", RelationshipLabel::IsA);
    internal.add_edge("0001250", "0000707", RelationshipLabel::IsA);
    internal.add_edge("0002373", "0001250", RelationshipLabel::IsA);

    let concepts: Vec<_> = ["0000118", "0000707", "0001250", "0002373"]
        .iter()
        .map(|id| bioterms::model::Concept::new(Prefix::Hpo, *id))
        .collect();
    store.save_vocabulary_graph(&concepts, &internal).await.unwrap();

    let result = store
        .expand_terms(Prefix::Hpo, &["0000118".to_string()], None, None)
        .await
        .unwrap();
    let mut descendants = result[0].descendants.clone();
    descendants.sort();
    assert_eq!(descendants, vec!["0000707".to_string(), "0001250".to_string(), "0002373".to_string()]);
}
