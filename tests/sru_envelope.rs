//! Tests for records extracted from SRU searchRetrieve responses.

mod common;

use common::{record_xml, sru_response};
use pica::{
    InputFormat, Parser, ParserOptions, PicaError, Record, SruReader, SruResponseParser,
};
use std::cell::RefCell;
use std::io::Write;

const TITLE: &str =
    r#"<datafield tag="021A"><subfield code="a">Der Prozess</subfield><subfield code="h">Franz Kafka</subfield></datafield>"#;

#[test]
fn test_declared_count_is_reported_not_checked() {
    let xml = sru_response("3", &[record_xml("101", TITLE), record_xml("102", TITLE)]);
    let response = SruResponseParser::parse_str(&xml).unwrap();

    assert_eq!(response.records.len(), 2);
    assert_eq!(response.metadata.number_of_records.as_deref(), Some("3"));
    assert_eq!(response.metadata.result_set_id.as_deref(), Some("SID0001"));
    assert_eq!(response.metadata.current_number, 2);
    assert_eq!(response.records[0].record.ppn(), Some("101"));
    assert_eq!(response.records[1].record.ppn(), Some("102"));
}

#[test]
fn test_empty_tag_field_is_isolated() {
    let quirky = format!(
        r#"{TITLE}<datafield tag=""><subfield code="a">lost</subfield><subfield code="b">also lost</subfield></datafield><datafield tag="044K" occurrence="01"><subfield code="a">Roman</subfield></datafield>"#
    );
    let xml = sru_response("2", &[record_xml("201", &quirky), record_xml("202", TITLE)]);

    let collected = RefCell::new(Vec::<Record>::new());
    let errors = RefCell::new(0);
    let mut parser = Parser::default()
        .on_error(|_| *errors.borrow_mut() += 1)
        .on_record(|record| {
            collected.borrow_mut().push(record);
            Ok(())
        });
    let (summary, metadata) = parser.parse_sru(xml.as_bytes()).unwrap();
    drop(parser);

    assert_eq!(summary.emitted, 2);
    assert_eq!(summary.malformed_fields, 0);
    assert_eq!(*errors.borrow(), 0);
    assert_eq!(metadata.skipped_fields, 1);

    let records = collected.into_inner();
    let tokens: Vec<String> = records[0].fields().map(pica::Field::token).collect();
    assert_eq!(tokens, ["003@", "021A", "044K/01"]);
    assert_eq!(records[0].first_subfield_value("044K", 'a'), Some("Roman"));
    assert_eq!(records[1].len(), 2);
}

#[test]
fn test_limit_applies_to_sru() {
    let records: Vec<String> = (0..12).map(|i| record_xml(&format!("3{i:02}"), TITLE)).collect();
    let xml = sru_response("12", &records);

    let mut parser = Parser::new(ParserOptions::new().limit(5));
    let (summary, metadata) = parser.parse_sru(xml.as_bytes()).unwrap();
    assert_eq!(summary.emitted, 5);
    assert!(summary.limit_reached);
    // Metadata before the records is already known
    assert_eq!(metadata.number_of_records.as_deref(), Some("12"));

    let mut parser = Parser::new(ParserOptions::new().limit(0));
    let (summary, _) = parser.parse_sru(xml.as_bytes()).unwrap();
    assert_eq!(summary.emitted, 10);
}

#[test]
fn test_empty_response() {
    let xml = sru_response("0", &[]);
    let response = SruResponseParser::parse_str(&xml).unwrap();
    assert!(response.records.is_empty());
    assert_eq!(response.metadata.number_of_records.as_deref(), Some("0"));
    assert_eq!(response.metadata.current_number, 0);
}

#[test]
fn test_malformed_field_inside_sru_record() {
    let bad = r#"<datafield tag="21A"><subfield code="a">x</subfield></datafield>"#;
    let xml = sru_response("1", &[record_xml("401", &format!("{bad}{TITLE}"))]);

    let mut reader = SruReader::new(xml.as_bytes());
    let decoded = reader.read_record().unwrap().unwrap();
    assert_eq!(decoded.errors.len(), 1);
    assert!(matches!(decoded.errors[0], PicaError::MalformedField { .. }));
    assert_eq!(decoded.record.len(), 2);
    assert!(reader.read_record().unwrap().is_none());
    assert_eq!(reader.metadata().current_number, 1);
}

#[test]
fn test_unparsable_envelope_then_next_source() {
    let broken = "<srw:searchRetrieveResponse xmlns:srw=\"http://www.loc.gov/zing/srw/\"><srw:records></srw:searchRetrieveResponse>";
    let good = sru_response("1", &[record_xml("501", TITLE)]);

    let mut parser = Parser::default();
    assert!(matches!(
        parser.parse_sru(broken.as_bytes()),
        Err(PicaError::XmlError(_))
    ));
    let (summary, _) = parser.parse_sru(good.as_bytes()).unwrap();
    assert_eq!(summary.emitted, 1);
}

#[test]
fn test_sru_file_needs_explicit_format() {
    let xml = sru_response("1", &[record_xml("601", TITLE)]);
    let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
    file.write_all(xml.as_bytes()).unwrap();
    file.flush().unwrap();

    let mut parser = Parser::default();
    let summary = parser.parse_file_as(file.path(), InputFormat::Sru).unwrap();
    assert_eq!(summary.emitted, 1);
}

#[test]
fn test_diagnostic_slot_counts_as_malformed_record() {
    let diagnostic = r#"<diag:diagnostic xmlns:diag="http://www.loc.gov/zing/srw/diagnostic/"><diag:uri>info:srw/diagnostic/1/64</diag:uri><diag:message>Record temporarily unavailable</diag:message></diag:diagnostic>"#;
    let xml = sru_response("2", &[record_xml("701", TITLE), diagnostic.to_string()]);

    let errors = RefCell::new(Vec::new());
    let mut parser = Parser::default().on_error(|err| errors.borrow_mut().push(err.to_string()));
    let (summary, metadata) = parser.parse_sru(xml.as_bytes()).unwrap();
    drop(parser);

    assert_eq!(metadata.current_number, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.emitted, 1);
    assert_eq!(summary.malformed_records, 1);
    let errors = errors.into_inner();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("recordData 2"));

    let response = SruResponseParser::parse_str(&xml).unwrap();
    assert_eq!(response.records.len(), 1);
    assert_eq!(response.errors.len(), 1);
}
