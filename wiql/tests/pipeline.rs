//! End-to-end tests of the tokenize → parse → check → format pipeline.

use proptest::prelude::*;
use wiql::{
    BooleanExpression, DiagnosticKind, ErrorChecker, FieldMetadata, FieldSet, FieldType,
    FormatOptions, ParseResult, Source, Span, Token, TokenKind, check_document, format_document,
    parse, span, split_lines, tokenize,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn schema() -> FieldSet {
    FieldSet::new([
        FieldMetadata::new("System.Id", "ID", FieldType::Integer),
        FieldMetadata::new("System.Title", "Title", FieldType::String),
        FieldMetadata::new("System.State", "State", FieldType::String),
    ])
}

#[test]
fn select_single_field() {
    init_logger();
    let tokens = tokenize(&["SELECT [ID] FROM workitems"]);
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Select,
            TokenKind::LSqBracket,
            TokenKind::Identifier,
            TokenKind::RSqBracket,
            TokenKind::From,
            TokenKind::WorkItems,
            TokenKind::Eof,
        ]
    );
    assert_eq!(tokens[2].text(), "ID");
    assert!(check_document(&["SELECT [ID] FROM workitems"], &schema()).is_empty());
}

#[test]
fn exponent_number_is_one_token() {
    let tokens = tokenize(&["1.5e-3"]);
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].kind, TokenKind::Number);
    assert_eq!(tokens[0].text(), "1.5e-3");
}

#[test]
fn unterminated_string_spans_the_line() {
    let tokens = tokenize(&["'abc"]);
    assert_eq!(tokens[0].kind, TokenKind::NonterminatingString);
    assert_eq!(tokens[0].span, span!(0, 0, 0, 4));
    assert_eq!(tokens[1].kind, TokenKind::Eof);
}

#[test]
fn unknown_field_in_condition() {
    init_logger();
    let ds = check_document(&["SELECT [ID] FROM workitems WHERE [Bogus] = 1"], &schema());
    assert_eq!(ds.len(), 1);
    assert_eq!(ds[0].kind, DiagnosticKind::UnknownField);
    assert!(ds[0].message.starts_with("unknown field"));
    assert_eq!(ds[0].range, span!(0, 33, 0, 40));
}

#[test]
fn numeric_literal_for_string_field() {
    init_logger();
    let ds = check_document(&["SELECT [ID] FROM workitems WHERE [Title] CONTAINS 5"], &schema());
    assert_eq!(ds.len(), 1);
    assert!(ds[0].message.starts_with("literal does not match field type"));
}

#[test]
fn empty_field_list_recovers() {
    init_logger();
    let parsed = parse(&tokenize(&["SELECT FROM workitems"]));
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnexpectedToken);
    assert_eq!(parsed.diagnostics[0].range, span!(0, 7, 0, 11));
    let statement = parsed.statement.unwrap();
    assert!(statement.fields.fields.is_empty());
    assert!(matches!(statement.source, Source::WorkItems(_)));
}

#[test]
fn multi_line_document() {
    init_logger();
    let text = "SELECT [ID],\n       [Title]\nFROM workitems\nWHERE [State] = 'Active'\n  AND [ID] > 10\n";
    let lines = split_lines(text);
    assert!(check_document(&lines, &schema()).is_empty());
    let edit = format_document(&lines, Some(&schema()), &FormatOptions::default()).unwrap();
    assert_eq!(edit.range, span!(0, 0, 5, 0));
    assert_eq!(
        edit.text,
        "SELECT [ID], [Title]\nFROM WORKITEMS\nWHERE [State] = 'Active'\n    AND [ID] > 10"
    );
}

#[test]
fn diagnostics_across_lines_are_ordered() {
    let lines = ["select [Nope]", "from workitems", "where [ID] contains 'x' and", "order by [Title]"];
    let ds = check_document(&lines, &schema());
    let positions: Vec<_> = ds.iter().map(|d| (d.kind, d.range.start.line)).collect();
    assert_eq!(
        positions,
        vec![
            (DiagnosticKind::UnknownField, 0),
            (DiagnosticKind::InvalidOperator, 2),
            (DiagnosticKind::LiteralMismatch, 2),
            (DiagnosticKind::UnexpectedToken, 3),
        ]
    );
}

fn field() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z][a-z]{0,6}( [A-Z][a-z]{0,5})?".prop_map(|name| format!("[{name}]")),
        "[a-z]{1,4}\\.[A-Z][a-z]{0,5}",
    ]
}

fn value() -> impl Strategy<Value = String> {
    prop_oneof![
        "-?[0-9]{1,4}(\\.[0-9]{1,2})?",
        "[a-zA-Z0-9 %]{0,8}".prop_map(|s| format!("'{s}'")),
        "[a-zA-Z0-9']{0,6}".prop_map(|s| format!("\"{s}\"")),
        "@[a-z]{1,6}",
    ]
}

fn predicate() -> impl Strategy<Value = String> {
    let op = prop::sample::select(vec!["=", "<>", ">", "<", ">=", "<=", "like", "not like"]);
    let set_op = prop::sample::select(vec!["contains", "not contains", "contains words", "under", "not under"]);
    prop_oneof![
        (field(), op, value()).prop_map(|(f, o, v)| format!("{f} {o} {v}")),
        (field(), set_op, value()).prop_map(|(f, o, v)| format!("{f} {o} {v}")),
        (field(), any::<bool>(), prop::collection::vec(value(), 1..4))
            .prop_map(|(f, neg, vs)| format!("{f} {}in ({})", if neg { "not " } else { "" }, vs.join(", "))),
        (field(), prop::sample::select(vec!["=", "<>"]), value())
            .prop_map(|(f, o, v)| format!("ever {f} {o} {v}")),
    ]
}

fn condition() -> impl Strategy<Value = String> {
    predicate().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} and {b}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} or {b}")),
            inner.clone().prop_map(|a| format!("not {a}")),
            inner.prop_map(|a| format!("({a})")),
        ]
    })
}

fn query() -> impl Strategy<Value = String> {
    let sort = (field(), prop::sample::select(vec!["", " asc", " desc"])).prop_map(|(f, d)| format!("{f}{d}"));
    (
        prop::collection::vec(field(), 1..4),
        prop::sample::select(vec!["workitems", "WorkItemLinks"]),
        prop::option::of(condition()),
        prop::option::of(prop::collection::vec(sort, 1..3)),
        prop::option::of(prop::sample::select(vec!["'2020-01-01'", "@today"])),
    )
        .prop_map(|(fields, source, cond, order, asof)| {
            let mut q = format!("select {} from {source}", fields.join(", "));
            if let Some(cond) = cond {
                q.push_str(&format!(" where {cond}"));
            }
            if let Some(order) = order {
                q.push_str(&format!(" order by {}", order.join(", ")));
            }
            if let Some(asof) = asof {
                q.push_str(&format!(" asof {asof}"));
            }
            q
        })
}

fn is_blank(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r')
}

fn sexpr_of(text: &str) -> Option<String> {
    parse(&tokenize(&split_lines(text))).statement.map(|s| s.to_sexpr())
}

fn fmt(text: &str) -> String {
    format_document(&split_lines(text), None, &FormatOptions::default())
        .unwrap()
        .text
}

/// Inserts `stray` between two words of `q`, or at either end.
fn with_stray(q: &str, at: prop::sample::Index, stray: &str) -> String {
    let mut gaps: Vec<usize> = q.match_indices(' ').map(|(i, _)| i).collect();
    gaps.push(0);
    gaps.push(q.len());
    let gap = gaps[at.index(gaps.len())];
    format!("{} {stray} {}", &q[..gap], &q[gap..])
}

/// Whether the token is part of the tree or was reported as skipped.
fn accounted(parsed: &ParseResult, token: &Token) -> bool {
    if parsed.skipped.iter().any(|s| s.contains(&token.span)) {
        return true;
    }
    let Some(stmt) = &parsed.statement else {
        return false;
    };
    if matches!(token.kind, TokenKind::Select | TokenKind::From | TokenKind::Where) {
        return true;
    }
    let ranges: Vec<Span> = [Some(stmt.fields.span), Some(stmt.source.span())]
        .into_iter()
        .chain([
            stmt.where_clause.as_ref().map(BooleanExpression::span),
            stmt.order_by.as_ref().map(|o| o.span),
            stmt.as_of.as_ref().map(|c| c.span),
        ])
        .flatten()
        .collect();
    ranges.iter().any(|r| r.contains(&token.span))
}

fn stray() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![")", "(", ",", "=", "and", "not", "order", "by", "asc", "in", "7", "'x'"])
}

proptest! {
    #[test]
    fn tokens_cover_every_visible_character_once(lines in prop::collection::vec("[ -~\t]{0,40}", 0..4)) {
        let tokens = tokenize(&lines);
        prop_assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(), 1);
        for (line_no, line) in lines.iter().enumerate() {
            let chars: Vec<char> = line.chars().collect();
            let mut covered = vec![0usize; chars.len()];
            let mut last_end = 0;
            for token in tokens.iter().filter(|t| t.kind != TokenKind::Eof && t.span.start.line == line_no) {
                prop_assert_eq!(token.span.end.line, line_no);
                prop_assert!(token.span.start.column >= last_end);
                last_end = token.span.end.column;
                for count in &mut covered[token.span.start.column..token.span.end.column] {
                    *count += 1;
                }
            }
            for (ch, count) in chars.iter().zip(&covered) {
                prop_assert!(*count <= 1);
                if !is_blank(*ch) {
                    prop_assert_eq!(*count, 1, "{:?} uncovered in {:?}", ch, line);
                }
            }
        }
    }

    #[test]
    fn parsing_is_deterministic(lines in prop::collection::vec("[ -~]{0,40}", 0..3)) {
        let a = parse(&tokenize(&lines));
        let b = parse(&tokenize(&lines));
        prop_assert_eq!(&a.statement, &b.statement);
        prop_assert_eq!(&a.diagnostics, &b.diagnostics);
        prop_assert_eq!(&a.skipped, &b.skipped);
    }

    #[test]
    fn generated_queries_parse_cleanly(q in query()) {
        let parsed = parse(&tokenize(&[q.as_str()]));
        prop_assert!(parsed.diagnostics.is_empty(), "{}: {:?}", q, parsed.diagnostics);
        prop_assert!(parsed.statement.is_some());
    }

    #[test]
    fn formatting_is_idempotent(q in query()) {
        let once = fmt(&q);
        prop_assert_eq!(fmt(&once), once);
    }

    #[test]
    fn formatting_preserves_the_tree(q in query()) {
        prop_assert_eq!(sexpr_of(&fmt(&q)), sexpr_of(&q));
    }

    #[test]
    fn unknown_fields_are_never_silent(q in query()) {
        let ds = check_document(&[q.as_str()], &FieldSet::default());
        prop_assert!(ds.iter().any(|d| d.kind == DiagnosticKind::UnknownField));
    }

    #[test]
    fn incompatible_operators_are_never_silent(
        op in prop::sample::select(vec!["contains 'x'", "contains words 'x'", "under 'x'", "like 'x'", "not like 'x'"]),
        cond in prop::option::of(condition()),
    ) {
        let tail = cond.map(|c| format!(" and ({c})")).unwrap_or_default();
        let q = format!("select [ID] from workitems where [ID] {op}{tail}");
        let ds = check_document(&[q.as_str()], &schema());
        prop_assert!(ds.iter().any(|d| d.kind == DiagnosticKind::InvalidOperator), "{}", q);
    }

    #[test]
    fn every_token_is_in_the_tree_or_skipped(q in query(), at in any::<prop::sample::Index>(), stray in stray()) {
        let text = with_stray(&q, at, stray);
        let tokens = tokenize(&[text.as_str()]);
        let parsed = parse(&tokens);
        for token in tokens.iter().filter(|t| t.kind != TokenKind::Eof) {
            prop_assert!(accounted(&parsed, token), "{:?} lost in {}", token, text);
        }
        let mut sorted = parsed.skipped.clone();
        sorted.sort_by_key(|s| s.start);
        prop_assert_eq!(sorted, parsed.skipped);
    }

    #[test]
    fn stray_tokens_never_hide_unknown_fields(q in query(), at in any::<prop::sample::Index>(), stray in stray()) {
        let text = with_stray(&q, at, stray);
        let tokens = tokenize(&[text.as_str()]);
        let parsed = parse(&tokens);
        let fields = FieldSet::default();
        let ds = ErrorChecker::new(&fields).check(&parsed);
        for token in tokens.iter().filter(|t| t.kind == TokenKind::Identifier) {
            let reported = ds
                .iter()
                .any(|d| d.kind == DiagnosticKind::UnknownField && d.range.contains(&token.span));
            let skipped = parsed.skipped.iter().any(|s| s.contains(&token.span));
            prop_assert!(reported || skipped, "{:?} silent in {}", token, text);
        }
    }
}
