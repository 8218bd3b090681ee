use noteport_core::{is_valid_xml_char, parse_lenient, repair_document};

const SAMPLE_CODEPOINTS: &[u32] = &[
    0x0, 0x1, 0x8, 0x9, 0xA, 0xB, 0xC, 0xD, 0xE, 0x1F, 0x20, 0x41, 0x7F, 0xE9, 0xD7FF, 0xD800,
    0xDBFF, 0xDFFF, 0xE000, 0xFFFD, 0xFFFE, 0xFFFF, 0x10000, 0x1F600, 0x10FFFF, 0x110000,
    0xFFFFFFFF,
];

#[test]
fn illegal_decimal_refs_are_removed_and_legal_ones_preserved() {
    for &codepoint in SAMPLE_CODEPOINTS {
        let reference = format!("&#{codepoint};");
        let input = format!("<n v=\"a{reference}b\"/>");
        let (repaired, stats) = repair_document(&input);
        if is_valid_xml_char(codepoint) {
            assert_eq!(repaired, input, "legal {codepoint:#x} must survive");
            assert_eq!(stats.removed_char_refs, 0);
        } else {
            assert_eq!(repaired, "<n v=\"ab\"/>", "illegal {codepoint:#x} must go");
            assert_eq!(stats.removed_char_refs, 1);
        }
    }
}

#[test]
fn repair_is_idempotent() {
    let inputs = [
        r#"<notes><noteRecord _id="1" title="A &#1; B" content="He said "hi" &#10;&#65535;"/></notes>"#,
        r#"<?xml version="1.0"?><r a="1" b="x "y" z" c="2"><t>k="v" text</t></r>"#,
        r#"<r><n title="unterminated></r>"#,
        "plain text without markup",
    ];
    for input in inputs {
        let (once, _) = repair_document(input);
        let (twice, stats) = repair_document(&once);
        assert_eq!(once, twice, "second pass changed {input:?}");
        assert!(stats.is_clean());
    }
}

#[test]
fn clean_document_passes_through_untouched() {
    let input = r#"<?xml version="1.0" encoding="UTF-8"?>
<notes>
  <noteRecord _id="1" title="Tom &amp; Jerry" content="a&#10;b&#x9;c"/>
</notes>"#;
    let (repaired, stats) = repair_document(input);
    assert_eq!(repaired, input);
    assert!(stats.is_clean());
}

#[test]
fn repaired_document_parses_with_embedded_quotes_restored() {
    let (repaired, _) = repair_document(
        r#"<notes><noteRecord _id="5" title="Q" content="say "yes" &#2;now"/></notes>"#,
    );
    let doc = parse_lenient(repaired.as_bytes()).unwrap();
    let record = doc.root.descendants_named("noteRecord").next().unwrap();
    assert_eq!(record.attribute("content"), Some("say \"yes\" now"));
    assert_eq!(record.attribute("title"), Some("Q"));
}
