use std::sync::Arc;

use rstest::rstest;
use quick_edn::{
    parse_str, parse_str_with_options, Arena, DefaultReaderMode, ErrorKind, ParseOptions,
    ReaderRegistry, ValueId, ValueType,
};

fn doubling_registry() -> Arc<ReaderRegistry> {
    let mut registry = ReaderRegistry::new();
    registry.register_fn("double", |value: ValueId, arena: &mut Arena<'_>| {
        let n = arena
            .get(value)
            .as_i64()
            .ok_or_else(|| "expected an integer".to_string())?;
        arena.alloc_int(n * 2).map_err(|err| err.to_string())
    });
    registry.register_fn("myapp/point", |value: ValueId, arena: &mut Arena<'_>| {
        let point = arena.get(value);
        let x = point.get(0).and_then(|v| v.as_i64()).ok_or("missing x")?;
        let y = point.get(1).and_then(|v| v.as_i64()).ok_or("missing y")?;
        let kx = arena.alloc_keyword(None, "x").map_err(|err| err.to_string())?;
        let ky = arena.alloc_keyword(None, "y").map_err(|err| err.to_string())?;
        let vx = arena.alloc_int(x).map_err(|err| err.to_string())?;
        let vy = arena.alloc_int(y).map_err(|err| err.to_string())?;
        arena
            .alloc_map(&[(kx, vx), (ky, vy)])
            .map_err(|err| err.to_string())
    });
    Arc::new(registry)
}

#[rstest]
fn test_passthrough_keeps_tag() {
    let doc = parse_str(r#"#inst "1985-04-12T23:20:50.52Z""#).unwrap();
    let root = doc.root();
    assert_eq!(root.value_type(), ValueType::Tagged);
    let tag = root.tag().unwrap();
    assert_eq!(tag.namespace, None);
    assert_eq!(tag.name, "inst");
    assert_eq!(
        root.tagged_value().and_then(|v| v.as_str()),
        Some("1985-04-12T23:20:50.52Z")
    );
}

#[rstest]
fn test_namespaced_tag() {
    let doc = parse_str(r#"#myapp/Person {:first "Fred"}"#).unwrap();
    let tag = doc.root().tag().unwrap();
    assert_eq!(tag.namespace, Some("myapp"));
    assert_eq!(tag.name, "Person");
    assert!(tag.matches("myapp/Person"));
    assert_eq!(doc.to_string(), r#"#myapp/Person {:first "Fred"}"#);
}

#[rstest]
#[case("#uuid \"f81d4fae-7dec-11d0-a765-00a0c91e6bf6\"", "uuid")]
#[case("#a #b 1", "a")]
#[case("#tag\n  ; comment\n  [1]", "tag")]
#[case("#t #_ignored 1", "t")]
fn test_tag_forms(#[case] input: &str, #[case] tag: &str) {
    let doc = parse_str(input).unwrap();
    assert_eq!(doc.root().tag().map(|t| t.name), Some(tag));
}

#[rstest]
fn test_unwrap_mode() {
    let options = ParseOptions::new().with_default_reader_mode(DefaultReaderMode::Unwrap);
    let doc = parse_str_with_options(r#"[#inst "2020" #outer #inner 5]"#, &options).unwrap();
    assert_eq!(doc.to_string(), r#"["2020" 5]"#);
}

#[rstest]
fn test_reject_mode() {
    let options = ParseOptions::new().with_default_reader_mode(DefaultReaderMode::Reject);
    let err = parse_str_with_options("[1 #unknown 2]", &options).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownTag);
    assert_eq!(err.start.offset, 3);
    assert_eq!(err.end.offset, 11);
}

#[rstest]
fn test_registered_reader() {
    let options = ParseOptions::new().with_registry(doubling_registry());
    let doc = parse_str_with_options("[#double 21 #double -4]", &options).unwrap();
    let values: Vec<i64> = doc.root().iter().filter_map(|v| v.as_i64()).collect();
    assert_eq!(values, vec![42, -8]);
}

#[rstest]
fn test_registered_reader_builds_collections() {
    let options = ParseOptions::new().with_registry(doubling_registry());
    let doc = parse_str_with_options("#myapp/point [3 4]", &options).unwrap();
    assert_eq!(doc.root().get_keyword("y").and_then(|v| v.as_i64()), Some(4));
    assert_eq!(doc.to_string(), "{:x 3, :y 4}");
}

#[rstest]
fn test_registry_wins_over_reject_mode() {
    let options = ParseOptions::new()
        .with_registry(doubling_registry())
        .with_default_reader_mode(DefaultReaderMode::Reject);
    let doc = parse_str_with_options("#double 5", &options).unwrap();
    assert_eq!(doc.root().as_i64(), Some(10));
    let err = parse_str_with_options("#triple 5", &options).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownTag);
}

#[rstest]
fn test_reader_failure() {
    let options = ParseOptions::new().with_registry(doubling_registry());
    let err = parse_str_with_options(r#"{:n #double "x"}"#, &options).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagTransform);
    assert_eq!(err.message, "expected an integer");
    assert_eq!(err.start.offset, 4);
    assert_eq!(err.end.offset, 15);
}

#[rstest]
fn test_registry_shared_across_threads() {
    let registry = doubling_registry();
    let handles: Vec<_> = (0..4i64)
        .map(|n| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let options = ParseOptions::new().with_registry(registry);
                let input = format!("#double {n}");
                parse_str_with_options(&input, &options)
                    .ok()
                    .and_then(|doc| doc.root().as_i64())
            })
        })
        .collect();
    let results: Vec<Option<i64>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(results, vec![Some(0), Some(2), Some(4), Some(6)]);
}

#[rstest]
fn test_register_and_unregister() {
    let mut registry = ReaderRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.register_fn("#inst", |value: ValueId, _: &mut Arena<'_>| Ok(value)));
    assert!(registry.contains("inst"));
    assert!(!registry.register_fn("", |value: ValueId, _: &mut Arena<'_>| Ok(value)));
    assert_eq!(registry.len(), 1);
    assert!(registry.unregister("inst"));
    assert!(!registry.unregister("inst"));
}

#[rstest]
#[case("#", ErrorKind::UnexpectedEof)]
#[case("#inst", ErrorKind::UnexpectedEof)]
#[case("[#inst]", ErrorKind::InvalidSyntax)]
#[case("(#inst", ErrorKind::UnterminatedCollection)]
#[case("#1abc 2", ErrorKind::InvalidSyntax)]
#[case("#:ns{:a 1}", ErrorKind::InvalidSyntax)]
#[case("##Foo", ErrorKind::InvalidSyntax)]
#[case("#!shebang", ErrorKind::InvalidSyntax)]
fn test_dispatch_errors(#[case] input: &str, #[case] kind: ErrorKind) {
    assert_eq!(parse_str(input).unwrap_err().kind, kind, "{input}");
}

#[cfg(feature = "metadata")]
mod metadata {
    use super::*;

    #[rstest]
    fn test_keyword_metadata() {
        let doc = parse_str("^:private [1]").unwrap();
        let meta = doc.root().meta().unwrap();
        assert_eq!(meta.get_keyword("private").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(doc.to_string(), "[1]");
    }

    #[rstest]
    fn test_stacked_metadata() {
        let doc = parse_str("^:a ^{:doc \"x\"} ^String sym").unwrap();
        let meta = doc.root().meta().unwrap();
        assert_eq!(meta.get_keyword("a").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(meta.get_keyword("doc").and_then(|v| v.as_str()), Some("x"));
        assert_eq!(
            meta.get_keyword("tag").and_then(|v| v.as_symbol()).map(|s| s.name),
            Some("String")
        );
    }

    #[rstest]
    fn test_metadata_does_not_affect_equality() {
        let with_meta = parse_str("^:a [1 2]").unwrap();
        let plain = parse_str("[1 2]").unwrap();
        assert_eq!(with_meta.root(), plain.root());
    }

    #[rstest]
    fn test_metadata_on_singletons_is_rejected() {
        assert_eq!(parse_str("^:a nil").unwrap_err().kind, ErrorKind::InvalidSyntax);
        assert_eq!(parse_str("^1 [1]").unwrap_err().kind, ErrorKind::InvalidSyntax);
    }
}

#[cfg(not(feature = "metadata"))]
#[rstest]
fn test_metadata_unsupported() {
    assert_eq!(parse_str("^:a [1]").unwrap_err().kind, ErrorKind::InvalidSyntax);
}
