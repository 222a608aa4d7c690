//! Minimal OWL/RDF-XML class reader shared by the ontology-backed loaders
//! (HPO, ORDO) and the HOOM annotation loader.
//!
//! Only the handful of constructs those ontologies actually use are
//! understood: named `owl:Class` elements keyed by `rdf:about`, direct
//! `rdfs:subClassOf rdf:resource=...` parent edges, restriction-style
//! `rdfs:subClassOf > owl:Restriction > owl:onProperty + owl:someValuesFrom`
//! edges (used for ORDO's `part_of`/`moved_to`), and a fixed set of
//! annotation properties (label, comment, definition, synonyms,
//! alternative ids, obsolescence). Anything else is ignored.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{BtsError, BtsResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwlRestriction {
    pub property: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwlClass {
    pub iri: String,
    pub label: Option<String>,
    pub definition: Option<String>,
    pub comment: Option<String>,
    pub deprecated: bool,
    /// Direct `rdfs:subClassOf rdf:resource=...` parents.
    pub sub_class_of: Vec<String>,
    /// Restriction-style `subClassOf`, one entry per `(onProperty,
    /// someValuesFrom)` pair. Interpretation of `property` is left to the
    /// caller (ORDO's `BFO_0000050` is part_of, `Orphanet_C056` is
    /// moved_to).
    pub restrictions: Vec<OwlRestriction>,
    pub alternative_ids: Vec<String>,
    pub consider: Vec<String>,
    pub synonyms: Vec<String>,
}

impl OwlClass {
    fn new(iri: String) -> Self {
        Self {
            iri,
            ..Default::default()
        }
    }
}

fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    match s.split_once(':') {
        Some((_, local)) => local.to_string(),
        None => s.to_string(),
    }
}

fn attr_value(e: &BytesStart<'_>, local: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == local)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

pub fn parse_owl_classes<R: BufRead>(reader: R) -> BtsResult<Vec<OwlClass>> {
    let mut xml = Reader::from_reader(reader);

    let mut buf = Vec::new();
    let mut classes = Vec::new();

    let mut current: Option<OwlClass> = None;
    let mut class_depth: usize = 0;

    let mut restriction: Option<OwlRestriction> = None;
    let mut restriction_depth: usize = 0;

    let mut depth: usize = 0;
    let mut text_buf = String::new();

    loop {
        match xml.read_event_into(&mut buf).map_err(|e| parse_err(&e))? {
            Event::Start(e) => {
                depth += 1;
                let name = local_name(e.name().as_ref());
                text_buf.clear();

                match name.as_str() {
                    "Class" | "NamedIndividual" if current.is_none() => {
                        if let Some(about) = attr_value(&e, "about") {
                            current = Some(OwlClass::new(about));
                            class_depth = depth;
                        }
                    }
                    "Restriction" if current.is_some() && restriction.is_none() => {
                        restriction = Some(OwlRestriction::default());
                        restriction_depth = depth;
                    }
                    "subClassOf" => {
                        if let (Some(class), Some(resource)) =
                            (current.as_mut(), attr_value(&e, "resource"))
                        {
                            class.sub_class_of.push(resource);
                        }
                    }
                    "onProperty" => {
                        if let (Some(r), Some(resource)) =
                            (restriction.as_mut(), attr_value(&e, "resource"))
                        {
                            r.property = resource;
                        }
                    }
                    "someValuesFrom" => {
                        if let (Some(r), Some(resource)) =
                            (restriction.as_mut(), attr_value(&e, "resource"))
                        {
                            r.target = resource;
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "Class" | "NamedIndividual" if current.is_none() => {
                        if let Some(about) = attr_value(&e, "about") {
                            classes.push(OwlClass::new(about));
                        }
                    }
                    "subClassOf" => {
                        if let (Some(class), Some(resource)) =
                            (current.as_mut(), attr_value(&e, "resource"))
                        {
                            class.sub_class_of.push(resource);
                        }
                    }
                    "onProperty" => {
                        if let (Some(r), Some(resource)) =
                            (restriction.as_mut(), attr_value(&e, "resource"))
                        {
                            r.property = resource;
                        }
                    }
                    "someValuesFrom" => {
                        if let (Some(r), Some(resource)) =
                            (restriction.as_mut(), attr_value(&e, "resource"))
                        {
                            r.target = resource;
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| parse_err(&e))?;
                text_buf.push_str(text.trim());
            }
            Event::CData(t) => {
                text_buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Event::End(e) => {
                let name = local_name(e.name().as_ref());

                if let Some(class) = current.as_mut() {
                    match name.as_str() {
                        "label" if !text_buf.is_empty() => class.label = Some(text_buf.clone()),
                        "comment" if !text_buf.is_empty() => {
                            class.comment = Some(text_buf.clone())
                        }
                        "IAO_0000115" | "definition" if !text_buf.is_empty() => {
                            class.definition = Some(text_buf.clone())
                        }
                        "deprecated" => class.deprecated = text_buf.trim() == "true",
                        "hasAlternativeId" if !text_buf.is_empty() => {
                            class.alternative_ids.push(text_buf.clone())
                        }
                        "consider" if !text_buf.is_empty() => {
                            class.consider.push(text_buf.clone())
                        }
                        "hasExactSynonym" | "hasRelatedSynonym" | "hasBroadSynonym"
                        | "hasNarrowSynonym"
                            if !text_buf.is_empty() =>
                        {
                            class.synonyms.push(text_buf.clone())
                        }
                        _ => {}
                    }
                }

                if name == "Restriction" && depth == restriction_depth {
                    if let Some(r) = restriction.take() {
                        if !r.property.is_empty() && !r.target.is_empty() {
                            if let Some(class) = current.as_mut() {
                                class.restrictions.push(r);
                            }
                        }
                    }
                }

                if (name == "Class" || name == "NamedIndividual") && depth == class_depth {
                    if let Some(class) = current.take() {
                        classes.push(class);
                    }
                }

                text_buf.clear();
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(classes)
}

fn parse_err(e: &dyn std::fmt::Display) -> BtsError {
    BtsError::ParseError {
        file: "owl".to_string(),
        line: 0,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn classes_of(xml: &str) -> Vec<OwlClass> {
        parse_owl_classes(Cursor::new(xml.as_bytes())).unwrap()
    }

    #[test]
    fn parses_label_and_direct_parent() {
        let xml = r#"
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
                     xmlns:owl="http://www.w3.org/2002/07/owl#">
              <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0000118">
                <rdfs:label>Phenotypic abnormality</rdfs:label>
                <rdfs:subClassOf rdf:resource="http://purl.obolibrary.org/obo/HP_0000001"/>
              </owl:Class>
            </rdf:RDF>
        "#;
        let classes = classes_of(xml);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].iri, "http://purl.obolibrary.org/obo/HP_0000118");
        assert_eq!(classes[0].label.as_deref(), Some("Phenotypic abnormality"));
        assert_eq!(
            classes[0].sub_class_of,
            vec!["http://purl.obolibrary.org/obo/HP_0000001".to_string()]
        );
    }

    #[test]
    fn parses_restriction_based_subclass_of() {
        let xml = r#"
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
                     xmlns:owl="http://www.w3.org/2002/07/owl#">
              <owl:Class rdf:about="http://www.orphadata.org/ORDO/Orphanet_100">
                <rdfs:subClassOf>
                  <owl:Restriction>
                    <owl:onProperty rdf:resource="http://www.orphadata.org/ORDO/Orphanet_C016"/>
                    <owl:someValuesFrom rdf:resource="http://www.orphadata.org/ORDO/Orphanet_200"/>
                  </owl:Restriction>
                </rdfs:subClassOf>
              </owl:Class>
            </rdf:RDF>
        "#;
        let classes = classes_of(xml);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].sub_class_of.len(), 0);
        assert_eq!(classes[0].restrictions.len(), 1);
        assert_eq!(
            classes[0].restrictions[0].property,
            "http://www.orphadata.org/ORDO/Orphanet_C016"
        );
        assert_eq!(
            classes[0].restrictions[0].target,
            "http://www.orphadata.org/ORDO/Orphanet_200"
        );
    }

    #[test]
    fn deprecated_and_alternative_ids_are_collected() {
        let xml = r#"
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:owl="http://www.w3.org/2002/07/owl#"
                     xmlns:oboInOwl="http://www.geneontology.org/formats/oboInOwl#">
              <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_9999999">
                <owl:deprecated rdf:datatype="http://www.w3.org/2001/XMLSchema#boolean">true</owl:deprecated>
                <oboInOwl:hasAlternativeId>HP:0009999</oboInOwl:hasAlternativeId>
                <oboInOwl:consider>HP:0000118</oboInOwl:consider>
              </owl:Class>
            </rdf:RDF>
        "#;
        let classes = classes_of(xml);
        assert!(classes[0].deprecated);
        assert_eq!(classes[0].alternative_ids, vec!["HP:0009999".to_string()]);
        assert_eq!(classes[0].consider, vec!["HP:0000118".to_string()]);
    }

    #[test]
    fn multiple_classes_do_not_bleed_into_each_other() {
        let xml = r#"
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
                     xmlns:owl="http://www.w3.org/2002/07/owl#">
              <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_1">
                <rdfs:label>First</rdfs:label>
              </owl:Class>
              <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_2">
                <rdfs:label>Second</rdfs:label>
              </owl:Class>
            </rdf:RDF>
        "#;
        let classes = classes_of(xml);
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].label.as_deref(), Some("First"));
        assert_eq!(classes[1].label.as_deref(), Some("Second"));
    }
}
