//! N-gram generation, search-text generation, and query normalization for
//! the auto-complete engine (spec §4.3).
//!
//! N-gram computation is CPU-bound and offloaded to a [`rayon`] thread pool
//! by the document store's `save_terms` before the batch is handed to the
//! store backend (spec §4.4).

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::model::Concept;

const MIN_TOKEN_LEN: usize = 3;
const MAX_NGRAM_LEN: usize = 20;

fn strip_punctuation(s: &str) -> String {
    s.chars().filter(|c| !matches!(*c, '(' | ')' | '\'' | '"')).collect()
}

/// Strip `[()'"]` and whitespace from a single field, matching the
/// `[()'"]\s` regex class applied per-field before the fields are joined
/// (spec §4.3).
fn strip_punctuation_and_whitespace(s: &str) -> String {
    s.chars().filter(|c| !matches!(*c, '(' | ')' | '\'' | '"') && !c.is_whitespace()).collect()
}

/// Lowercase, strip `[()'"]`, collapse to whitespace-delimited tokens.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = strip_punctuation(&lowered);
    stripped
        .split_whitespace()
        .map(str::to_string)
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .collect()
}

/// All substrings of `token` with length n in `[3, min(len, 20)]`.
fn substrings(token: &str) -> impl Iterator<Item = String> + '_ {
    let chars: Vec<char> = token.chars().collect();
    let len = chars.len();
    let max_n = len.min(MAX_NGRAM_LEN);
    (MIN_TOKEN_LEN..=max_n).flat_map(move |n| {
        let chars = &chars;
        (0..=len - n).map(move |start| chars[start..start + n].iter().collect())
    })
}

/// The n-gram set stored alongside a concept document for the superset
/// membership test in [`auto_complete`].
pub fn n_grams(concept: &Concept) -> BTreeSet<String> {
    let mut grams = BTreeSet::new();
    for field in concept.text_fields() {
        for token in tokenize(field) {
            grams.extend(substrings(&token));
        }
    }
    grams
}

/// `conceptId` + space-joined label and synonyms, each field stripped of
/// `[()'"]` *and* internal whitespace before being joined (spec §4.3), so a
/// multi-word field like `"Febrile seizure"` contributes `"Febrileseizure"`
/// rather than surviving with its internal space intact — `score_query` in
/// [`normalize_query`] has all whitespace removed the same way, and the two
/// must agree for `indexOf` substring scoring to find multi-word matches.
pub fn search_text(concept: &Concept) -> String {
    let mut fields = concept.text_fields().into_iter();
    let mut text = fields.next().map(strip_punctuation_and_whitespace).unwrap_or_default();
    for field in fields {
        text.push(' ');
        text.push_str(&strip_punctuation_and_whitespace(field));
    }
    text
}

/// Precomputed index fields a document store persists alongside a concept.
#[derive(Debug, Clone)]
pub struct IndexedTerm {
    pub concept: Concept,
    pub n_grams: BTreeSet<String>,
    pub search_text: String,
}

/// Compute n-grams and search-text for a batch of concepts in parallel,
/// as required of `saveTerms` (spec §4.4).
pub fn index_terms(concepts: Vec<Concept>) -> Vec<IndexedTerm> {
    concepts
        .into_par_iter()
        .map(|concept| {
            let grams = n_grams(&concept);
            let text = search_text(&concept);
            IndexedTerm {
                concept,
                n_grams: grams,
                search_text: text,
            }
        })
        .collect()
}

/// A normalized query, ready to be matched against an [`IndexedTerm`] set.
pub struct NormalizedQuery {
    pub tokens: Vec<String>,
    pub score_query: String,
}

/// Lowercase and strip punctuation the same way as indexing; tokens shorter
/// than 3 characters are dropped, `score_query` has all whitespace removed.
pub fn normalize_query(query: &str) -> NormalizedQuery {
    let lowered = query.to_lowercase();
    let stripped = strip_punctuation(&lowered);
    let tokens = stripped
        .split_whitespace()
        .map(str::to_string)
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .collect();
    let score_query: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    NormalizedQuery { tokens, score_query }
}

/// `indexOf(search_text, score_query)`, −1 if absent. Matching is
/// case-sensitive on the already-lowercased `search_text`/`score_query`
/// pair produced by the indexing/normalization steps above.
fn position_score(search_text: &str, score_query: &str) -> i64 {
    if score_query.is_empty() {
        return 0;
    }
    match search_text.to_lowercase().find(&score_query.to_lowercase()) {
        Some(byte_idx) => search_text[..byte_idx].chars().count() as i64,
        None => -1,
    }
}

/// Run the query semantics of spec §4.3 against an already-loaded term set
/// for one prefix shard. A real document store backend pushes step 1 down
/// into its own index (multi-key n-gram index or per-prefix table scan);
/// this function is the reference semantics shared by both backends' tests
/// and by the in-process fallback stores.
pub fn auto_complete<'a>(
    terms: &'a [IndexedTerm],
    query: &str,
    limit: usize,
) -> Vec<&'a Concept> {
    let normalized = normalize_query(query);
    let token_set: BTreeSet<&str> = normalized.tokens.iter().map(String::as_str).collect();

    let mut matches: Vec<(&IndexedTerm, i64, usize)> = terms
        .iter()
        .filter(|term| token_set.iter().all(|t| term.n_grams.contains(*t)))
        .map(|term| {
            let pos = position_score(&term.search_text, &normalized.score_query);
            let label_len = term.concept.label.as_ref().map(|l| l.chars().count()).unwrap_or(999);
            (term, pos, label_len)
        })
        .collect();

    matches.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then(a.2.cmp(&b.2))
            .then(a.0.concept.concept_id.cmp(&b.0.concept.concept_id))
    });

    matches
        .into_iter()
        .take(limit)
        .map(|(term, _, _)| &term.concept)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Prefix;

    fn seizure_concept() -> Concept {
        let mut c = Concept::new(Prefix::Hpo, "0001250");
        c.label = Some("Seizure".to_string());
        c.synonyms = Some(vec!["Seizures".to_string(), "Epileptic seizure".to_string()]);
        c
    }

    #[test]
    fn n_grams_cover_all_substrings_of_min_length() {
        let c = seizure_concept();
        let grams = n_grams(&c);
        assert!(grams.contains("sei"));
        assert!(grams.contains("seizure"));
        assert!(!grams.contains("se"));
    }

    #[test]
    fn search_text_strips_punctuation_and_internal_whitespace_per_field() {
        let mut c = Concept::new(Prefix::Hpo, "0000118");
        c.label = Some("Phenotypic abnormality (core)".to_string());
        let text = search_text(&c);
        assert!(!text.contains('('));
        assert!(text.contains("Phenotypicabnormalitycore"));
        assert!(!text.contains("Phenotypic abnormality"));
    }

    #[test]
    fn search_text_matches_score_query_for_multi_word_labels() {
        let mut c = Concept::new(Prefix::Hpo, "0002373");
        c.label = Some("Febrile seizure".to_string());
        let text = search_text(&c);
        let normalized = normalize_query("febrile seizure");
        assert!(text.to_lowercase().contains(&normalized.score_query));
    }

    #[test]
    fn short_tokens_are_discarded_from_n_grams() {
        let mut c = Concept::new(Prefix::Hpo, "0000001");
        c.label = Some("a of the".to_string());
        let grams = n_grams(&c);
        assert!(grams.is_empty() || grams.iter().all(|g| g.len() >= MIN_TOKEN_LEN));
    }

    #[test]
    fn auto_complete_ranks_exact_prefix_match_first() {
        let terms = index_terms(vec![
            seizure_concept(),
            {
                let mut c = Concept::new(Prefix::Hpo, "0002373");
                c.label = Some("Febrile seizure".to_string());
                c
            },
        ]);
        let results = auto_complete(&terms, "seizure", 5);
        assert_eq!(results[0].concept_id, "0001250");
    }

    #[test]
    fn auto_complete_respects_limit() {
        let terms = index_terms(vec![
            seizure_concept(),
            {
                let mut c = Concept::new(Prefix::Hpo, "0002373");
                c.label = Some("Febrile seizure".to_string());
                c
            },
        ]);
        let results = auto_complete(&terms, "seizure", 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn auto_complete_excludes_non_superset_matches() {
        let terms = index_terms(vec![seizure_concept()]);
        let results = auto_complete(&terms, "xyz", 5);
        assert!(results.is_empty());
    }
}
