use sd_validator::parsing::html::Document;
use sd_validator::parsing::{Dialect, EmbeddedDataParser};
use std::path::PathBuf;

fn html(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/html").join(name);
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn test_microdata_fixture() {
    let source = html("product_microdata.html");
    assert_eq!(Dialect::detect(&Document::parse(&source)), Dialect::Microdata);

    let triples = EmbeddedDataParser::new(true).parse(&source).unwrap();
    let lines = triples.sorted_lines();
    assert_eq!(lines.len(), 7, "{:#?}", lines);

    let nt = triples.to_ntriples();
    let kettle = "<http://shop.example/products/kettle>";
    assert!(nt.contains(&format!("{} <http://schema.org/name> \"Electric kettle\"@en .", kettle)));
    assert!(nt.contains(&format!(
        "{} <http://schema.org/image> <http://shop.example/products/kettle.jpg> .",
        kettle
    )));
    assert!(nt.contains(&format!("{} <http://schema.org/offers> _:b0 .", kettle)));
    assert!(nt.contains("_:b0 <http://schema.org/price> \"19.90\"@en ."));
}

#[test]
fn test_rdfa_fixture() {
    let source = html("product_rdfa.html");
    assert_eq!(Dialect::detect(&Document::parse(&source)), Dialect::Rdfa);

    let triples = EmbeddedDataParser::new(true).parse(&source).unwrap();
    assert_eq!(triples.len(), 5, "{}", triples.to_ntriples());

    let nt = triples.to_ntriples();
    assert!(nt.contains(
        "<http://shop.example/products/kettle> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://schema.org/Product> ."
    ));
    assert!(nt.contains("_:b0 <http://schema.org/priceCurrency> \"EUR\" ."));
}

#[test]
fn test_malformed_fragments_are_dropped_when_lenient() {
    let source = html("malformed_rdfa.html");

    let err = EmbeddedDataParser::new(true).parse(&source).unwrap_err();
    assert!(err.to_string().contains("unknown:rating"), "{}", err);

    let triples = EmbeddedDataParser::new(false).parse(&source).unwrap();
    assert_eq!(triples.len(), 2);
    assert!(!triples.to_ntriples().contains("rating"));
}

#[test]
fn test_markup_without_data_is_empty() {
    let triples = EmbeddedDataParser::new(true)
        .parse("<!DOCTYPE html><html><body><h1>Hello</h1><script>var x = 1 < 2;</script></body></html>")
        .unwrap();
    assert!(triples.is_empty());
}

#[test]
fn test_unclosed_paragraphs_keep_their_own_text() {
    let triples = EmbeddedDataParser::new(true)
        .parse(
            r#"<div itemscope itemtype="http://schema.org/Product"><p itemprop="name">Kettle<p itemprop="description">Steel body</div>"#,
        )
        .unwrap();

    let nt = triples.to_ntriples();
    assert!(nt.contains("_:b0 <http://schema.org/name> \"Kettle\" ."), "{}", nt);
    assert!(nt.contains("_:b0 <http://schema.org/description> \"Steel body\" ."), "{}", nt);
}

#[test]
fn test_deeply_nested_rdfa_is_extracted() {
    let depth = 10_000;
    let source = format!(
        r#"<div vocab="http://schema.org/" about="http://shop.example/kettle">{}<span property="name">Kettle</span>{}</div>"#,
        "<div>".repeat(depth),
        "</div>".repeat(depth)
    );

    // Small stack so per-level recursion would overflow.
    let triples = std::thread::Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(move || EmbeddedDataParser::new(false).parse(&source))
        .unwrap()
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(
        triples.to_ntriples(),
        "<http://shop.example/kettle> <http://schema.org/name> \"Kettle\" .\n"
    );
}
