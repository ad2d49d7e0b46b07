use rstest::rstest;
use quick_edn::{parse_str, ErrorKind, ValueType};

#[rstest]
#[case("()", ValueType::List, 0)]
#[case("[]", ValueType::Vector, 0)]
#[case("#{}", ValueType::Set, 0)]
#[case("{}", ValueType::Map, 0)]
#[case("(1 2 3)", ValueType::List, 3)]
#[case("[1, 2, 3,]", ValueType::Vector, 3)]
#[case("#{:a :b}", ValueType::Set, 2)]
#[case("{:a 1, :b 2}", ValueType::Map, 2)]
#[case("[\n  1 ; one\n  2 ; two\n]", ValueType::Vector, 2)]
fn test_collection_lengths(#[case] input: &str, #[case] kind: ValueType, #[case] len: usize) {
    let doc = parse_str(input).unwrap();
    assert_eq!(doc.root().value_type(), kind);
    assert_eq!(doc.root().len(), len);
    assert_eq!(doc.root().is_empty(), len == 0);
}

#[rstest]
fn test_vector_preserves_order() {
    let doc = parse_str("[3 1 2]").unwrap();
    let items: Vec<i64> = doc.root().iter().filter_map(|v| v.as_i64()).collect();
    assert_eq!(items, vec![3, 1, 2]);
    assert_eq!(doc.root().iter().len(), 3);
    assert!(doc.root().get(3).is_none());
}

#[rstest]
fn test_map_entries_and_lookup() {
    let doc = parse_str(r#"{:name "Ada" :langs ["en" "fr"] "plain" 1 [1 2] :pair}"#).unwrap();
    let root = doc.root();

    let keys: Vec<String> = root.entries().map(|(k, _)| k.to_string()).collect();
    assert_eq!(keys, vec![":name", ":langs", "\"plain\"", "[1 2]"]);

    assert_eq!(root.get_keyword("name").and_then(|v| v.as_str()), Some("Ada"));
    assert_eq!(root.get_keyword("langs").map(|v| v.len()), Some(2));
    assert!(root.get_keyword("missing").is_none());

    let probe = parse_str("(1 2)").unwrap();
    // lists and vectors are equal, so a list finds a vector key
    assert_eq!(
        root.lookup(probe.root()).and_then(|v| v.as_keyword()).map(|k| k.name),
        Some("pair")
    );
    let plain = parse_str(r#""plain""#).unwrap();
    assert!(root.contains_key(plain.root()));
}

#[rstest]
fn test_namespaced_keyword_lookup() {
    let doc = parse_str("{:user/id 7 :id 8}").unwrap();
    assert_eq!(doc.root().get_keyword("user/id").and_then(|v| v.as_i64()), Some(7));
    assert_eq!(doc.root().get_keyword("id").and_then(|v| v.as_i64()), Some(8));
}

#[rstest]
fn test_set_membership() {
    let doc = parse_str("#{1 \"two\" :three [4]}").unwrap();
    let probe = parse_str("[1 (4) :three]").unwrap();
    for item in probe.root().iter() {
        assert!(doc.root().contains(item), "{item}");
    }
    let absent = parse_str("2").unwrap();
    assert!(!doc.root().contains(absent.root()));
}

#[rstest]
fn test_nested_collections() {
    let doc = parse_str("{:a {:b [{:c #{(1)}}]}}").unwrap();
    let inner = doc
        .root()
        .get_keyword("a")
        .and_then(|v| v.get_keyword("b"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get_keyword("c"))
        .unwrap();
    assert_eq!(inner.value_type(), ValueType::Set);
    assert_eq!(inner.to_string(), "#{(1)}");
}

#[rstest]
#[case("#{1 2 1}")]
#[case("#{[1 2] (1 2)}")]
#[case("#{#{1 2} #{2 1}}")]
#[case("#{{:a 1 :b 2} {:b 2 :a 1}}")]
#[case("#{\"a\" \"\\u0061\"}")]
#[case("#{1.5M 1.50M}")]
#[case("#{##NaN ##NaN}")]
fn test_duplicate_set_elements(#[case] input: &str) {
    let err = parse_str(input).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateElement, "{input}");
}

#[rstest]
#[case("{:a 1 :a 2}")]
#[case("{:a 1 :b 2 :a 3}")]
#[case("{{:a 1 :b 2} 1 {:b 2 :a 1} 2}")]
#[case("{[1] 1 (1) 2}")]
fn test_duplicate_map_keys(#[case] input: &str) {
    let err = parse_str(input).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateKey, "{input}");
}

#[rstest]
#[case("#{1 1N 1.0 1M}")]
#[case("{1 :int 1N :big 1.0 :float 1M :dec}")]
#[case("#{a :a \"a\" \\a}")]
fn test_distinct_kinds_are_not_duplicates(#[case] input: &str) {
    assert!(parse_str(input).is_ok(), "{input}");
}

#[rstest]
fn test_negative_zero_is_zero() {
    assert_eq!(
        parse_str("#{0.0 -0.0}").unwrap_err().kind,
        ErrorKind::DuplicateElement
    );
}

#[rstest]
fn test_large_set_dedup() {
    let items: Vec<String> = (0..100).map(|n| n.to_string()).collect();
    let ok = format!("#{{{}}}", items.join(" "));
    let doc = parse_str(&ok).unwrap();
    assert_eq!(doc.root().len(), 100);

    let dup = format!("#{{{} 57}}", items.join(" "));
    let err = parse_str(&dup).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateElement);
    assert_eq!(err.start.offset, dup.len() - 3);
}

#[rstest]
fn test_large_map_dedup() {
    let entries: Vec<String> = (0..40).map(|n| format!(":k{n} {n}")).collect();
    let dup = format!("{{{} :k3 0}}", entries.join(" "));
    assert_eq!(parse_str(&dup).unwrap_err().kind, ErrorKind::DuplicateKey);
}

#[rstest]
#[case("{:a}")]
#[case("{:a 1 :b}")]
fn test_odd_map_forms(#[case] input: &str) {
    assert_eq!(parse_str(input).unwrap_err().kind, ErrorKind::InvalidSyntax);
}

#[rstest]
#[case("[1 #_2 3]", "[1 3]")]
#[case("[#_#_1 2 3]", "[3]")]
#[case("#_1 2", "2")]
#[case("[1 #_ 2]", "[1]")]
#[case("(#_(1 2 #_3))", "()")]
#[case("{:a #_:b 1}", "{:a 1}")]
#[case("[#_ #_ [x] {y z} w]", "[w]")]
#[case("#_[nested #_discard] :kept ; trailing", ":kept")]
fn test_discard(#[case] input: &str, #[case] expected: &str) {
    let doc = parse_str(input).unwrap();
    assert_eq!(doc.root().to_string(), expected);
}

#[rstest]
fn test_discarded_values_leave_no_trace() {
    let kept = parse_str("[1 2]").unwrap();
    let with_discard = parse_str("[1 #_[\"big\" {:discarded #{1 2 3}}] 2]").unwrap();
    assert_eq!(kept.arena().len(), with_discard.arena().len());
}

#[rstest]
#[case("[1 #_]", ErrorKind::InvalidSyntax)]
#[case("#_", ErrorKind::UnexpectedEof)]
#[case("#_ ; only a comment", ErrorKind::UnexpectedEof)]
#[case("[1 #_", ErrorKind::UnterminatedCollection)]
#[case("#_1", ErrorKind::UnexpectedEof)]
fn test_discard_errors(#[case] input: &str, #[case] kind: ErrorKind) {
    assert_eq!(parse_str(input).unwrap_err().kind, kind, "{input}");
}
