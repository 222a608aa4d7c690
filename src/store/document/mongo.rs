//! Primary document store backend: one collection per prefix, with an
//! aggregation pipeline implementing the auto-complete query (spec §4.3,
//! §4.4). Grounded in
//! `original_source/src/bioterms/database/doc_db/mongo_doc_db.py` — the
//! `$match` on `nGrams`, `$addFields` position/label-length scoring, and
//! `$sort` stage translate directly to a `bson::Document` pipeline here.

use async_trait::async_trait;
use bson::{doc, Document};
use futures_util::TryStreamExt;
use mongodb::options::{IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use super::{DocumentStore, SaveTermFailure, SaveTermsOutcome};
use crate::autocomplete::{self, normalize_query};
use crate::error::{BtsError, BtsResult};
use crate::model::{ApiKey, Concept, Prefix, User};

pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    pub async fn connect(uri: &str, db_name: &str) -> BtsResult<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(Self {
            db: client.database(db_name),
        })
    }

    fn collection(&self, prefix: Prefix) -> Collection<Document> {
        self.db.collection(prefix.as_str())
    }

    fn users_collection(&self) -> Collection<Document> {
        self.db.collection("users")
    }

    fn api_keys_collection(&self) -> Collection<Document> {
        self.db.collection("api_keys")
    }

    fn concept_to_document(concept: &Concept, n_grams: &[String], search_text: &str) -> BtsResult<Document> {
        let mut doc = bson::to_document(concept).map_err(|e| BtsError::Storage(e.to_string()))?;
        doc.insert("nGrams", n_grams);
        doc.insert("searchText", search_text);
        Ok(doc)
    }

    fn document_to_concept(mut doc: Document) -> BtsResult<Concept> {
        doc.remove("nGrams");
        doc.remove("searchText");
        doc.remove("_id");
        bson::from_document(doc).map_err(|e| BtsError::Storage(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn create_index(
        &self,
        prefix: Prefix,
        field: &str,
        unique: bool,
        overwrite: bool,
    ) -> BtsResult<()> {
        let collection = self.collection(prefix);

        let n_gram_index = IndexModel::builder()
            .keys(doc! { "nGrams": 1 })
            .options(IndexOptions::builder().name("nGrams_index".to_string()).build())
            .build();
        collection
            .create_index(n_gram_index)
            .await
            .map_err(|e| BtsError::IndexCreationError(e.to_string()))?;

        let index_name = format!("{field}_index");
        let model = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(
                IndexOptions::builder()
                    .name(index_name.clone())
                    .unique(unique)
                    .build(),
            )
            .build();

        match collection.create_index(model.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if overwrite => {
                collection
                    .drop_index(index_name)
                    .await
                    .map_err(|e| BtsError::IndexCreationError(e.to_string()))?;
                collection
                    .create_index(model)
                    .await
                    .map_err(|e| BtsError::IndexCreationError(e.to_string()))?;
                Ok(())
            }
            Err(e) => Err(BtsError::IndexCreationError(format!(
                "failed to create index on {}.{field}: {e}",
                prefix.as_str()
            ))),
        }
    }

    async fn save_terms(&self, prefix: Prefix, terms: Vec<Concept>) -> BtsResult<SaveTermsOutcome> {
        let indexed = autocomplete::index_terms(terms);
        let collection = self.collection(prefix);
        let mut outcome = SaveTermsOutcome::default();

        for term in indexed {
            let n_grams: Vec<String> = term.n_grams.into_iter().collect();
            let doc = Self::concept_to_document(&term.concept, &n_grams, &term.search_text)?;
            match collection.insert_one(doc).await {
                Ok(_) => outcome.saved += 1,
                Err(e) => outcome.failures.push(SaveTermFailure {
                    concept_id: term.concept.concept_id,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    async fn count_terms(&self, prefix: Prefix) -> BtsResult<u64> {
        self.collection(prefix)
            .count_documents(doc! {})
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))
    }

    async fn delete_all_for_prefix(&self, prefix: Prefix) -> BtsResult<()> {
        self.collection(prefix)
            .drop()
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        self.db
            .create_collection(prefix.as_str())
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_terms(&self, prefix: Prefix, limit: Option<usize>) -> BtsResult<Vec<Concept>> {
        let mut cursor = self
            .collection(prefix)
            .find(doc! {})
            .limit(limit.map(|n| n as i64).unwrap_or(0))
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| BtsError::Storage(e.to_string()))? {
            out.push(Self::document_to_concept(doc)?);
        }
        Ok(out)
    }

    async fn get_terms_by_ids(&self, prefix: Prefix, ids: &[String]) -> BtsResult<Vec<Concept>> {
        let mut cursor = self
            .collection(prefix)
            .find(doc! { "conceptId": { "$in": ids } })
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| BtsError::Storage(e.to_string()))? {
            out.push(Self::document_to_concept(doc)?);
        }
        Ok(out)
    }

    async fn auto_complete(
        &self,
        prefix: Prefix,
        query: &str,
        limit: usize,
    ) -> BtsResult<Vec<Concept>> {
        let normalized = normalize_query(query);
        let pipeline = vec![
            doc! { "$match": { "nGrams": { "$all": &normalized.tokens } } },
            doc! { "$addFields": {
                "__score": { "$indexOfBytes": ["$searchText", &normalized.score_query] },
                "__labelLength": {
                    "$cond": {
                        "if": { "$gt": [{ "$type": "$label" }, "null"] },
                        "then": { "$strLenCP": "$label" },
                        "else": 999,
                    }
                },
            } },
            doc! { "$sort": { "__score": 1, "__labelLength": 1, "conceptId": 1 } },
            doc! { "$limit": limit as i64 },
            doc! { "$project": { "__score": 0, "__labelLength": 0 } },
        ];

        let mut cursor = self
            .collection(prefix)
            .aggregate(pipeline)
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| BtsError::Storage(e.to_string()))? {
            out.push(Self::document_to_concept(doc)?);
        }
        Ok(out)
    }

    async fn update_vector_mapping(
        &self,
        prefix: Prefix,
        mapping: Vec<(String, String)>,
    ) -> BtsResult<()> {
        let collection = self.collection(prefix);
        for (concept_id, vector_id) in mapping {
            collection
                .update_one(
                    doc! { "conceptId": concept_id },
                    doc! { "$set": { "vectorId": vector_id } },
                )
                .await
                .map_err(|e| BtsError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn save_user(&self, user: User) -> BtsResult<()> {
        let doc = bson::to_document(&user).map_err(|e| BtsError::Storage(e.to_string()))?;
        self.users_collection()
            .update_one(doc! { "username": &user.username }, doc! { "$set": doc })
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_user(&self, username: &str) -> BtsResult<Option<User>> {
        let doc = self
            .users_collection()
            .find_one(doc! { "username": username })
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        match doc {
            Some(d) => Ok(Some(bson::from_document(d).map_err(|e| BtsError::Storage(e.to_string()))?)),
            None => Ok(None),
        }
    }

    async fn save_api_key(&self, key: ApiKey) -> BtsResult<()> {
        let doc = bson::to_document(&key).map_err(|e| BtsError::Storage(e.to_string()))?;
        self.api_keys_collection()
            .update_one(doc! { "keyHash": &key.key_hash }, doc! { "$set": doc })
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn find_by_api_key_hash(&self, key_hash: &str) -> BtsResult<Option<ApiKey>> {
        let doc = self
            .api_keys_collection()
            .find_one(doc! { "keyHash": key_hash })
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        match doc {
            Some(d) => Ok(Some(bson::from_document(d).map_err(|e| BtsError::Storage(e.to_string()))?)),
            None => Ok(None),
        }
    }
}
