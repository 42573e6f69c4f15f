//! Integration tests for the line parser
//!
//! These tests run the extraction functions against captured device output:
//! - single and repeated field extraction
//! - records from tabular output
//! - indentation-delimited sections
//! - header-scoped extraction
//! - non-matching input never fails

mod common;

use cliconf::error::Error;
use cliconf::parser::{
    contains, parse_field, parse_fields, parse_fields_where, parse_record, parse_records,
    section, sections, FieldPattern, MatchMode,
};
use common::*;
use pretty_assertions::assert_eq;

// ============================================================================
// Field Extraction
// ============================================================================

#[test]
fn test_first_match_wins() {
    let pattern = FieldPattern::line(r"^\s*rpd-index (?P<value>\d+)$").unwrap();
    assert_eq!(parse_field(CER_RUNNING, &pattern).as_deref(), Some("12"));
}

#[test]
fn test_every_match_in_order() {
    let pattern = FieldPattern::line(r"^cable rpd (?P<value>\S+)$").unwrap();
    assert_eq!(parse_fields(CER_RUNNING, &pattern), vec!["node1", "node2"]);
}

#[test]
fn test_without_value_group_first_group_is_used() {
    let pattern = FieldPattern::line(r"^\s*ucam (\d+) dcam (\d+)$").unwrap();
    assert_eq!(parse_fields(CER_RUNNING, &pattern), vec!["2", "3"]);
}

#[test]
fn test_crlf_output() {
    let pattern = FieldPattern::line(r"^ description (?P<value>.+)$").unwrap();
    assert_eq!(
        parse_field(IOS_RUNNING, &pattern).as_deref(),
        Some("uplink to core")
    );
}

#[test]
fn test_contains() {
    let shutdown = FieldPattern::line(r"^\s*shutdown$").unwrap();
    assert!(contains(CER_RUNNING, &shutdown));

    let missing = FieldPattern::line(r"^\s*ssd enable$").unwrap();
    assert!(!contains(CER_RUNNING, &missing));
}

#[test]
fn test_block_mode_spans_lines() {
    let pattern =
        FieldPattern::block(r"^cable rpd node2\n.*?^ ucam (?P<value>\d+) dcam").unwrap();
    assert_eq!(pattern.mode(), MatchMode::Block);
    assert_eq!(parse_field(CER_RUNNING, &pattern).as_deref(), Some("3"));
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn test_records_from_table() {
    let pattern = FieldPattern::line(
        r"^(?P<interface>\S+)\s+(?P<address>\d+\.\d+\.\d+\.\d+)\s+YES\s+\S+\s+(?P<status>up|down)",
    )
    .unwrap();
    let records = parse_records(IOS_BRIEF, &pattern);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["interface"], "GigabitEthernet0/1");
    assert_eq!(records[1]["address"], "192.0.2.1");
    assert_eq!(records[1]["status"], "up");

    let first = parse_record(IOS_BRIEF, &pattern).unwrap();
    assert_eq!(
        first.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["interface", "address", "status"]
    );
}

// ============================================================================
// Sections
// ============================================================================

#[test]
fn test_sections_split_on_header() {
    let header = FieldPattern::line(r"^cable rpd (?P<value>\S+)$").unwrap();
    let blocks = sections(CER_RUNNING, &header);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].value, "node1");
    assert_eq!(blocks[0].header, "cable rpd node1");
    assert_eq!(
        blocks[0].body,
        " rpd-index 12\n ucam 2 dcam 11\n mac-address a870.5d28.b3c8\n adp enable\n no shutdown\n"
    );
    assert_eq!(blocks[1].body, " rpd-index 13\n ucam 3 dcam 12\n shutdown\n");
}

#[test]
fn test_nested_sections_keep_their_children() {
    let body = section(CER_RUNNING, "ptp domain 0").unwrap();
    let header = FieldPattern::line(r"^\s*port (?P<value>\d+)$").unwrap();
    let ports = sections(&body, &header);
    assert_eq!(
        ports.iter().map(|s| s.value.as_str()).collect::<Vec<_>>(),
        vec!["1", "2"]
    );
    assert_eq!(ports[1].body, "  priority 5\n  role slave\n");
}

#[test]
fn test_section_by_header_line() {
    let body = section(IOS_RUNNING, "interface GigabitEthernet0/2").unwrap();
    assert_eq!(body, " shutdown\n");
    assert!(section(IOS_RUNNING, "interface GigabitEthernet0/9").is_none());
}

#[test]
fn test_fields_scoped_by_header() {
    let pattern = FieldPattern::line(r"^\s*role (?P<value>\S+)$").unwrap();
    let roles = parse_fields_where(CER_RUNNING, &pattern, |ctx| ctx.header == Some("port 2"));
    assert_eq!(roles, vec!["slave"]);

    let all = parse_fields_where(CER_RUNNING, &pattern, |_| true);
    assert_eq!(all, vec!["master", "slave"]);
}

// ============================================================================
// Failure Modes
// ============================================================================

#[test]
fn test_invalid_pattern_reported_at_build() {
    let err = FieldPattern::line(r"^rpd-index (?P<value>\d+").unwrap_err();
    assert!(matches!(err, Error::Pattern { .. }));
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn test_no_match_is_not_an_error() {
    let pattern = FieldPattern::line(r"^hostname (?P<value>\S+)$").unwrap();
    assert_eq!(parse_field("", &pattern), None);
    assert!(parse_fields(CER_RUNNING, &pattern).is_empty());
    assert!(parse_records(IOS_BRIEF, &pattern).is_empty());
    assert!(sections(CER_RUNNING, &pattern).is_empty());
}
