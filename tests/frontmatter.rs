// tests/frontmatter.rs

use std::error::Error;

use familiar::frontmatter::{self, Document, MalformedMetadata, Metadata};
use familiar::types::TaskStatus;
use proptest::prelude::*;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn text_without_block_is_all_body() -> TestResult {
    let doc = frontmatter::try_parse("# Write a haiku\n\nabout rust\n")?;
    assert!(doc.metadata.is_empty());
    assert_eq!(doc.body, "# Write a haiku\n\nabout rust\n");
    Ok(())
}

#[test]
fn typed_keys_are_read() -> TestResult {
    let text = "---\niteration: 2\nstatus: done\nlast_run: 2025-03-01T14:05:09\n---\nbody\n";
    let doc = frontmatter::try_parse(text)?;

    assert_eq!(doc.metadata.iteration(), Some(2));
    assert_eq!(doc.metadata.status(), Some(TaskStatus::Done));
    assert_eq!(doc.metadata.last_run(), Some("2025-03-01T14:05:09"));
    assert_eq!(doc.body, "body\n");
    Ok(())
}

#[test]
fn unknown_keys_survive_a_rewrite() -> TestResult {
    let text = "---\nproject: blog\ntags: rust, notes\n---\nDo it.\n";
    let mut doc = frontmatter::try_parse(text)?;
    doc.metadata.set_iteration(1);

    let again = frontmatter::try_parse(&doc.render())?;
    assert_eq!(again.metadata.get("project"), Some("blog"));
    assert_eq!(again.metadata.get("tags"), Some("rust, notes"));
    assert_eq!(again.metadata.iteration(), Some(1));
    assert_eq!(again.body, "Do it.\n");
    Ok(())
}

#[test]
fn unterminated_block_degrades_to_body() {
    let text = "---\niteration: 3\nno closing line here\n";
    assert_eq!(
        frontmatter::try_parse(text),
        Err(MalformedMetadata::Unterminated)
    );

    let doc = frontmatter::parse(text);
    assert!(doc.metadata.is_empty());
    assert_eq!(doc.body, text);
}

#[test]
fn line_without_colon_is_reported() {
    let text = "---\niteration: 1\njust words\n---\nbody\n";
    match frontmatter::try_parse(text) {
        Err(MalformedMetadata::BadLine { line, text }) => {
            assert_eq!(line, 2);
            assert_eq!(text, "just words");
        }
        other => panic!("expected BadLine, got {other:?}"),
    }
}

#[test]
fn non_numeric_iteration_reads_as_none() -> TestResult {
    let doc = frontmatter::try_parse("---\niteration: lots\n---\nbody\n")?;
    assert_eq!(doc.metadata.iteration(), None);
    Ok(())
}

#[test]
fn horizontal_rule_in_body_is_left_alone() -> TestResult {
    let text = "---\nstatus: failed\n---\nintro\n\n---\n\nmore\n";
    let doc = frontmatter::try_parse(text)?;
    assert_eq!(doc.body, "intro\n\n---\n\nmore\n");
    assert_eq!(doc.render(), text);
    Ok(())
}

#[test]
fn empty_metadata_renders_body_only() {
    assert_eq!(frontmatter::render(&Metadata::new(), "plain\n"), "plain\n");
}

#[test]
fn render_orders_keys_stably() {
    let mut metadata = Metadata::new();
    metadata.set_status(TaskStatus::Done);
    metadata.set_iteration(4);
    metadata.insert("author", "me");

    assert_eq!(
        frontmatter::render(&metadata, "x"),
        "---\nauthor: me\niteration: 4\nstatus: done\n---\nx"
    );
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,10}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 :.,-]{0,20}".prop_map(|v| v.trim().to_string())
}

proptest! {
    #[test]
    fn parse_inverts_render(
        entries in proptest::collection::btree_map(key_strategy(), value_strategy(), 1..6),
        body in "(?s).{0,200}",
    ) {
        let metadata: Metadata = entries.into_iter().collect();
        let rendered = frontmatter::render(&metadata, &body);

        let parsed = frontmatter::try_parse(&rendered);
        prop_assert_eq!(parsed, Ok(Document { metadata, body }));
    }
}
