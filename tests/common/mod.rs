//! Common test helpers and utilities shared across test suite.

use pica::{text, Field, Record};

/// Creates a field from a token such as `044K/01` and its subfields.
pub fn field(token: &str, subfields: &[(char, &str)]) -> Field {
    let (tag, occurrence) = Field::parse_token(token).expect("valid token");
    let mut field = Field::new(tag, occurrence);
    for (code, value) in subfields {
        field.add_subfield(*code, *value);
    }
    field
}

/// Creates a realistic title record with the given ppn.
///
/// Includes a control field, a title, two occurrences of a subject field
/// and a copy-level field.
pub fn create_test_record(ppn: &str) -> Record {
    let mut record = Record::new();
    record.append(field("001A", &[('0', "1100:01-01-20")]));
    record.append(field("003@", &[('0', ppn)]));
    record.append(field("021A", &[('a', "Programming Rust"), ('h', "Jim Blandy")]));
    record.append(field("044K/01", &[('a', "Rust"), ('9', "1234")]));
    record.append(field("044K/02", &[('a', "Systems programming")]));
    record.append(field("209A/01", &[('a', "QA 76"), ('x', "00")]));
    record
}

/// Encodes records as normalized PICA+.
#[allow(dead_code)]
pub fn normalized(records: &[Record]) -> Vec<u8> {
    records
        .iter()
        .flat_map(|record| text::encode_record(record).expect("encodable record"))
        .collect()
}

/// Renders a record as an unqualified PICA XML `<record>` element.
#[allow(dead_code)]
pub fn record_xml(ppn: &str, extra_fields: &str) -> String {
    format!(
        r#"<record xmlns="info:srw/schema/5/picaXML-v1.0"><datafield tag="003@"><subfield code="0">{ppn}</subfield></datafield>{extra_fields}</record>"#
    )
}

/// Wraps record elements in an SRU searchRetrieve response.
#[allow(dead_code)]
pub fn sru_response(declared: &str, records: &[String]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<srw:searchRetrieveResponse xmlns:srw="http://www.loc.gov/zing/srw/">
  <srw:version>1.1</srw:version>
  <srw:numberOfRecords>{declared}</srw:numberOfRecords>
  <srw:resultSetId>SID0001</srw:resultSetId>
  <srw:records>
"#
    );
    for (position, record) in records.iter().enumerate() {
        xml.push_str(&format!(
            "    <srw:record>\n      <srw:recordSchema>picaxml</srw:recordSchema>\n      <srw:recordPacking>xml</srw:recordPacking>\n      <srw:recordData>{record}</srw:recordData>\n      <srw:recordPosition>{}</srw:recordPosition>\n    </srw:record>\n",
            position + 1
        ));
    }
    xml.push_str("  </srw:records>\n</srw:searchRetrieveResponse>\n");
    xml
}
