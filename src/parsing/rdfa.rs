//! RDFa Lite to RDF, with `about`, `content`, `datatype`, `href`, `src` and
//! `lang` support.

use oxigraph::model::vocab::rdf;
use oxigraph::model::{NamedNode, Term};
use std::collections::HashMap;
use std::rc::Rc;

use super::html::{Document, ElementId};
use super::{is_absolute_iri, Extraction, Resource};
use crate::error::Result;

/// Prefixes available without a `prefix` declaration.
const DEFAULT_PREFIXES: &[(&str, &str)] = &[
    ("cc", "http://creativecommons.org/ns#"),
    ("dc", "http://purl.org/dc/terms/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("og", "http://ogp.me/ns#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("schema", "http://schema.org/"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

#[derive(Debug, Clone)]
struct Scope {
    subject: Option<Resource>,
    vocab: Option<String>,
    prefixes: HashMap<String, String>,
    lang: Option<String>,
}

pub(super) fn extract(document: &Document, extraction: &mut Extraction) -> Result<()> {
    let root = Scope {
        subject: extraction
            .base()
            .and_then(|base| NamedNode::new(base.as_str()).ok())
            .map(Resource::Named),
        vocab: None,
        prefixes: DEFAULT_PREFIXES.iter().map(|(p, iri)| (p.to_string(), iri.to_string())).collect(),
        lang: None,
    };

    // Explicit stack in document order; nesting depth is unbounded in HTML.
    let mut pending = vec![(Document::ROOT, Rc::new(root))];
    while let Some((id, parent)) = pending.pop() {
        let scope = Rc::new(visit(document, id, &parent, extraction)?);
        let children: Vec<ElementId> = document.element(id).child_elements().collect();
        pending.extend(children.into_iter().rev().map(|child| (child, Rc::clone(&scope))));
    }
    Ok(())
}

/// Emits the statements of one element and returns the scope of its children.
fn visit(document: &Document, id: ElementId, parent: &Scope, extraction: &mut Extraction) -> Result<Scope> {
    let element = document.element(id);
    let mut scope = parent.clone();

    if let Some(vocab) = element.attr("vocab") {
        scope.vocab = Some(vocab.trim()).filter(|v| !v.is_empty()).map(str::to_string);
    }
    if let Some(declarations) = element.attr("prefix") {
        declare_prefixes(declarations, &mut scope, extraction)?;
    }
    if let Some(lang) = element.attr("lang").or_else(|| element.attr("xml:lang")) {
        scope.lang = Some(lang.to_string());
    }

    let about = reference(element.attr("about"), &scope, extraction)?;
    let resource = match element.attr("resource") {
        Some(value) => reference(Some(value), &scope, extraction)?,
        None => reference(element.attr("href").or_else(|| element.attr("src")), &scope, extraction)?,
    };
    let types = element.attr("typeof");
    let property = element.attr("property");

    // A typeof without about types the object resource when a property is
    // present and the new subject otherwise.
    let typed = match (types, &about) {
        (None, _) => None,
        (Some(_), Some(about)) => Some(about.clone()),
        (Some(_), None) if property.is_some() || resource.is_some() => {
            Some(resource.clone().unwrap_or_else(|| extraction.blank()))
        }
        (Some(_), None) => Some(extraction.blank()),
    };

    if let (Some(types), Some(target)) = (types, &typed) {
        for name in types.split_whitespace() {
            if let Some(class) = expand(name, &scope, extraction)? {
                extraction.emit(target, rdf::TYPE.into_owned(), class);
            }
        }
    }

    if let Some(property) = property {
        let subject = about.clone().or_else(|| scope.subject.clone());
        match subject {
            Some(subject) => {
                let object = match (&typed, about.is_some()) {
                    (Some(typed), false) => Some(Term::from(typed.clone())),
                    _ => value(document, id, resource.clone(), &scope, extraction)?,
                };
                if let Some(object) = object {
                    for name in property.split_whitespace() {
                        if let Some(predicate) = expand(name, &scope, extraction)? {
                            extraction.emit(&subject, predicate, object.clone());
                        }
                    }
                }
            }
            None => extraction.malformed(format!("Property {:?} has no subject", property))?,
        }
    }

    scope.subject = match (property, &typed, &about, &resource) {
        (_, _, Some(about), _) => Some(about.clone()),
        (_, Some(typed), None, _) => Some(typed.clone()),
        (None, None, None, Some(resource)) => Some(resource.clone()),
        _ => scope.subject,
    };
    Ok(scope)
}

fn declare_prefixes(declarations: &str, scope: &mut Scope, extraction: &Extraction) -> Result<()> {
    let mut tokens = declarations.split_whitespace();
    while let Some(prefix) = tokens.next() {
        let Some(name) = prefix.strip_suffix(':') else {
            extraction.malformed(format!("Malformed prefix declaration {:?}", prefix))?;
            continue;
        };
        match tokens.next() {
            Some(iri) if is_absolute_iri(iri) => {
                scope.prefixes.insert(name.to_ascii_lowercase(), iri.to_string());
            }
            other => extraction.malformed(format!(
                "Prefix {:?} is not bound to an absolute IRI ({:?})",
                name, other
            ))?,
        }
    }
    Ok(())
}

/// Resolves an `about`/`resource`/`href`/`src` value; `[curie]` is allowed.
fn reference(value: Option<&str>, scope: &Scope, extraction: &mut Extraction) -> Result<Option<Resource>> {
    let Some(value) = value.map(str::trim) else {
        return Ok(None);
    };
    if let Some(curie) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        if let Some(label) = curie.strip_prefix("_:") {
            return Ok(Some(extraction.labelled_blank(label)));
        }
        return Ok(expand_curie(curie, scope).map(Resource::Named));
    }
    if let Some(label) = value.strip_prefix("_:") {
        return Ok(Some(extraction.labelled_blank(label)));
    }
    Ok(extraction.resolve(value)?.map(Resource::Named))
}

/// Expands a term, CURIE or absolute IRI used in `typeof`, `property` or `datatype`.
fn expand(name: &str, scope: &Scope, extraction: &Extraction) -> Result<Option<NamedNode>> {
    if let Some(node) = expand_curie(name, scope) {
        return Ok(Some(node));
    }
    if let Some((prefix, local)) = name.split_once(':') {
        if (local.starts_with("//") || prefix == "urn") && is_absolute_iri(name) {
            return Ok(Some(NamedNode::new_unchecked(name)));
        }
        extraction.malformed(format!("Unknown prefix in {:?}", name))?;
        return Ok(None);
    }
    match &scope.vocab {
        Some(vocab) => match NamedNode::new(format!("{}{}", vocab, name)) {
            Ok(node) => Ok(Some(node)),
            Err(e) => {
                extraction.malformed(format!("Invalid term {:?}: {}", name, e))?;
                Ok(None)
            }
        },
        None => {
            extraction.malformed(format!("Term {:?} used without a vocab", name))?;
            Ok(None)
        }
    }
}

fn expand_curie(curie: &str, scope: &Scope) -> Option<NamedNode> {
    let (prefix, local) = curie.split_once(':')?;
    if local.starts_with("//") {
        return None;
    }
    let namespace = scope.prefixes.get(&prefix.to_ascii_lowercase())?;
    NamedNode::new(format!("{}{}", namespace, local)).ok()
}

fn value(
    document: &Document,
    id: ElementId,
    resource: Option<Resource>,
    scope: &Scope,
    extraction: &mut Extraction,
) -> Result<Option<Term>> {
    let element = document.element(id);
    let datatype = match element.attr("datatype").map(str::trim) {
        Some("") | None => None,
        Some(datatype) => match expand(datatype, scope, extraction)? {
            Some(node) => Some(node),
            None => return Ok(None),
        },
    };

    if let Some(content) = element.attr("content") {
        return Ok(Some(extraction.literal(content, datatype, scope.lang.as_deref())?.into()));
    }
    if datatype.is_none() {
        if let Some(resource) = resource {
            return Ok(Some(resource.into()));
        }
    }
    let text = match element.name.as_str() {
        "time" => element.attr("datetime").map(str::to_string).unwrap_or_else(|| document.text_content(id)),
        _ => document.text_content(id),
    };
    Ok(Some(extraction.literal(&text, datatype, scope.lang.as_deref())?.into()))
}

#[cfg(test)]
mod tests {
    use crate::error::ValidatorError;
    use crate::parsing::EmbeddedDataParser;

    fn parse(html: &str) -> String {
        EmbeddedDataParser::new(true)
            .with_base("http://shop.example/")
            .unwrap()
            .parse(html)
            .unwrap()
            .to_ntriples()
    }

    #[test]
    fn test_nested_typed_resources() {
        let nt = parse(
            r#"<div vocab="http://schema.org/" typeof="Product" resource="/p/1">
                 <span property="name">Kettle</span>
                 <div property="offers" typeof="Offer">
                   <span property="price" content="19.90">19,90 EUR</span>
                 </div>
                 <a property="url" href="/p/1.html">link</a>
               </div>"#,
        );
        assert!(nt.contains("<http://shop.example/p/1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Product> ."));
        assert!(nt.contains("<http://shop.example/p/1> <http://schema.org/name> \"Kettle\" ."));
        assert!(nt.contains("<http://shop.example/p/1> <http://schema.org/offers> _:b0 ."));
        assert!(nt.contains("_:b0 <http://schema.org/price> \"19.90\" ."));
        assert!(nt.contains("<http://shop.example/p/1> <http://schema.org/url> <http://shop.example/p/1.html> ."));
    }

    #[test]
    fn test_prefixes_and_datatypes() {
        let nt = parse(
            r#"<div prefix="ex: http://example.org/ns#" about="http://example.org/thing">
                 <span property="ex:count" datatype="xsd:integer">3</span>
                 <span property="dc:title" lang="en">Title</span>
                 <span property="http://example.org/ns#flag">yes</span>
               </div>"#,
        );
        assert!(nt.contains("<http://example.org/thing> <http://example.org/ns#count> \"3\"^^<http://www.w3.org/2001/XMLSchema#integer> ."));
        assert!(nt.contains("<http://example.org/thing> <http://purl.org/dc/terms/title> \"Title\"@en ."));
        assert!(nt.contains("<http://example.org/thing> <http://example.org/ns#flag> \"yes\" ."));
    }

    #[test]
    fn test_document_is_default_subject() {
        let nt = parse(r#"<html><head><title property="dc:title">Shop</title></head></html>"#);
        assert_eq!(nt, "<http://shop.example/> <http://purl.org/dc/terms/title> \"Shop\" .\n");
    }

    #[test]
    fn test_unknown_prefix() {
        let html = r#"<div about="http://example.org/a"><span property="nope:x">v</span></div>"#;
        let strict = EmbeddedDataParser::new(true).parse(html);
        assert!(matches!(strict, Err(ValidatorError::Parse(_))));
        assert!(EmbeddedDataParser::new(false).parse(html).unwrap().is_empty());
    }

    #[test]
    fn test_term_without_vocab() {
        let html = r#"<div about="http://example.org/a"><span property="name">v</span></div>"#;
        assert!(EmbeddedDataParser::new(true).parse(html).is_err());
        assert!(EmbeddedDataParser::new(false).parse(html).unwrap().is_empty());
    }

    #[test]
    fn test_blank_node_labels() {
        let nt = parse(
            r#"<div vocab="http://schema.org/">
                 <div about="_:shop" typeof="Store"></div>
                 <div about="[_:shop]"><span property="name">Corner</span></div>
               </div>"#,
        );
        assert!(nt.contains("_:b0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Store> ."));
        assert!(nt.contains("_:b0 <http://schema.org/name> \"Corner\" ."));
    }
}
