//! Property tests: records survive every codec unchanged.

use pica::{text, xml, Field, Occurrence, Record, Subfield, Tag, TextReader};
use proptest::prelude::*;

fn tag_strategy() -> impl Strategy<Value = Tag> {
    "[0-2][0-9]{2}[A-Z@]".prop_map(|s| Tag::new(&s).expect("generated tag is valid"))
}

fn occurrence_strategy() -> impl Strategy<Value = Option<Occurrence>> {
    proptest::option::of((0u8..=99).prop_map(|n| Occurrence::new(n).expect("in range")))
}

fn subfield_strategy() -> impl Strategy<Value = Subfield> {
    ("[0-9a-zA-Z]", "[a-zA-Z0-9 äöüß$&<>\"'.,:/-]{0,20}").prop_map(|(code, value)| {
        let code = code.chars().next().expect("one character");
        Subfield::new(code, value)
    })
}

fn field_strategy() -> impl Strategy<Value = Field> {
    (
        tag_strategy(),
        occurrence_strategy(),
        prop::collection::vec(subfield_strategy(), 0..5),
    )
        .prop_map(|(tag, occurrence, subfields)| {
            let mut field = Field::new(tag, occurrence);
            for subfield in subfields {
                field.add_subfield(subfield.code, subfield.value);
            }
            field
        })
}

fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::vec(field_strategy(), 1..8).prop_map(|fields| fields.into_iter().collect())
}

proptest! {
    #[test]
    fn normalized_text_preserves_records(record in record_strategy()) {
        let bytes = text::encode_record(&record).unwrap();
        let decoded = text::decode_record(&bytes).unwrap();
        prop_assert!(decoded.is_clean());
        prop_assert_eq!(decoded.record, record);
    }

    #[test]
    fn plain_text_preserves_records(record in record_strategy()) {
        let bytes = text::encode_plain_record(&record).unwrap();
        let decoded = text::decode_plain_record(&bytes).unwrap();
        prop_assert!(decoded.is_clean());
        prop_assert_eq!(decoded.record, record);
    }

    #[test]
    fn xml_preserves_records(record in record_strategy()) {
        let document = xml::record_to_xml(&record).unwrap();
        let records = xml::xml_to_records(&document).unwrap();
        prop_assert_eq!(records, vec![record]);
    }

    #[test]
    fn encoding_is_stable(record in record_strategy()) {
        let first = text::encode_record(&record).unwrap();
        let second = text::encode_record(&text::decode_record(&first).unwrap().record).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn streams_split_at_record_boundaries(records in prop::collection::vec(record_strategy(), 0..6)) {
        let mut bytes = Vec::new();
        for record in &records {
            bytes.extend(text::encode_record(record).unwrap());
        }

        let mut reader = TextReader::new(bytes.as_slice());
        let mut decoded = Vec::new();
        while let Some(next) = reader.read_record().unwrap() {
            decoded.push(next.record);
        }
        prop_assert_eq!(reader.records_read(), records.len());
        prop_assert_eq!(decoded, records);
    }

    #[test]
    fn plain_streams_split_at_blank_lines(records in prop::collection::vec(record_strategy(), 0..6)) {
        let mut bytes = Vec::new();
        for record in &records {
            bytes.extend(text::encode_plain_record(record).unwrap());
        }

        let mut reader = TextReader::plain(bytes.as_slice());
        let mut decoded = Vec::new();
        while let Some(next) = reader.read_record().unwrap() {
            decoded.push(next.record);
        }
        prop_assert_eq!(decoded, records);
    }
}
