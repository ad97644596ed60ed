use super::*;

#[test]
fn clean_string_trims_and_rejects_blank() {
    assert_eq!(clean_string(Some("  lombalgia  ")), Some("lombalgia".to_string()));
    assert_eq!(clean_string(Some("")), None);
    assert_eq!(clean_string(Some("   \t\n")), None);
    assert_eq!(clean_string(None), None);
}

#[test]
fn coerce_number_accepts_numeric_strings() {
    assert_eq!(coerce_number(Some("7")), Some(7.0));
    assert_eq!(coerce_number(Some(" 7.5 ")), Some(7.5));
    assert_eq!(coerce_number(Some("-2")), Some(-2.0));
}

#[test]
fn coerce_number_rejects_garbage() {
    assert_eq!(coerce_number(Some("alta")), None);
    assert_eq!(coerce_number(Some("")), None);
    assert_eq!(coerce_number(Some("inf")), None);
    assert_eq!(coerce_number(Some("NaN")), None);
    assert_eq!(coerce_number(None), None);
}

#[test]
fn truncate_text_reserves_marker_space() {
    assert_eq!(truncate_text("short", 10), "short");
    let cut = truncate_text("abcdefghij", 8);
    assert_eq!(cut, "abcde...");
    assert_eq!(cut.chars().count(), 8);
}

#[test]
fn truncate_text_is_char_safe() {
    // Multibyte characters must not be split mid-codepoint.
    let text = "dor cervical após sessão de fisioterapia";
    let cut = truncate_text(text, 20);
    assert_eq!(cut.chars().count(), 20);
    assert!(cut.ends_with("..."));
}

#[test]
fn truncate_text_exact_boundary_is_untouched() {
    let text = "x".repeat(1200);
    assert_eq!(truncate_text(&text, 1200), text);
}
