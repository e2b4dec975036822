//! Path parsing and normalization tests

use std::str::FromStr;

use formstate::{
    Error,
    path::{PathBuf, PathError, Segment},
};

#[test]
fn test_bracket_and_dot_forms_are_equal() {
    let dotted = PathBuf::from("orders.3.lines.0.sku");
    let bracketed = PathBuf::from("orders[3].lines[0].sku");
    let quoted = PathBuf::from(r#"orders[3]["lines"][0]['sku']"#);

    assert_eq!(dotted, bracketed);
    assert_eq!(dotted, quoted);
    assert_eq!(dotted.len(), 5);
}

#[test]
fn test_path_from_segments_round_trip() {
    let segments = vec![Segment::from("items"), Segment::from(2), Segment::from("name")];
    let path = PathBuf::from(segments.as_slice());

    assert_eq!(path.as_str(), "items.2.name");
    assert_eq!(path.segments().collect::<Vec<_>>(), segments);
}

#[test]
fn test_ancestry() {
    let field = PathBuf::from("user.address.city");

    assert!(field.is_descendant_of(&PathBuf::from("user")));
    assert!(field.is_descendant_of(&PathBuf::from("user.address")));
    assert!(!field.is_descendant_of(&PathBuf::from("user.addr")));
    assert!(field.starts_with(&field));
    assert!(!field.is_descendant_of(&field));
}

#[test]
fn test_parent_chain() {
    let mut current = Some(PathBuf::from("a.b.c"));
    let mut seen = Vec::new();
    while let Some(path) = current {
        seen.push(path.as_str().to_string());
        current = path.parent();
    }
    assert_eq!(seen, vec!["a.b.c", "a.b", "a"]);
}

#[test]
fn test_path_from_str_never_fails() {
    for input in ["", "...", "a..b", "[0]", "x[]"] {
        assert!(PathBuf::from_str(input).is_ok(), "{input} should parse");
    }
}

#[test]
fn test_invalid_segment_converts_to_crate_error() {
    let err = Segment::key("bad.key").unwrap_err();
    assert!(matches!(err, PathError::InvalidSegment { .. }));

    let err: Error = err.into();
    assert_eq!(err.module(), "path");
    assert!(err.is_programmer_error());
}
