//! Owned XML event stream.
//!
//! The PICA XML decoder and the SRU envelope extractor do not tokenize XML
//! themselves. They consume three kinds of owned events: element start (with
//! attributes), element end and character data. [`XmlEventReader`] produces
//! them from any [`BufRead`] using quick-xml's namespace-aware reader; tests
//! and callers with their own tokenizer can build [`XmlEvent`]s directly.

use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use std::fmt;
use std::io::BufRead;

/// An element name with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlName {
    /// Namespace URI the prefix resolved to, `None` if unbound
    pub namespace: Option<String>,
    /// Local part of the name (without prefix)
    pub local: String,
}

impl XmlName {
    /// A name without namespace.
    pub fn local(local: impl Into<String>) -> Self {
        XmlName {
            namespace: None,
            local: local.into(),
        }
    }

    /// A name in the given namespace.
    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        XmlName {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    /// Whether this is `local` in `namespace`.
    #[must_use]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }
}

/// One XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Element start with its attributes (local names, unescaped values)
    Start {
        /// Element name
        name: XmlName,
        /// Attributes in document order; namespace declarations are omitted
        attributes: Vec<(String, String)>,
    },
    /// Element end
    End {
        /// Element name
        name: XmlName,
    },
    /// Unescaped character data (text or CDATA)
    Text(String),
}

impl XmlEvent {
    /// Shorthand for a start event without namespace.
    pub fn start(local: &str, attributes: &[(&str, &str)]) -> Self {
        XmlEvent::Start {
            name: XmlName::local(local),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Shorthand for an end event without namespace.
    pub fn end(local: &str) -> Self {
        XmlEvent::End {
            name: XmlName::local(local),
        }
    }

    /// Shorthand for a text event.
    pub fn text(text: &str) -> Self {
        XmlEvent::Text(text.to_string())
    }

    /// Value of an attribute of a start event.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            XmlEvent::Start { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Pulls owned [`XmlEvent`]s out of an XML document.
///
/// Empty elements are expanded into a start and an end event; comments,
/// processing instructions and declarations are skipped.
pub struct XmlEventReader<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> XmlEventReader<R> {
    /// Create an event reader over a buffered source.
    pub fn new(source: R) -> Self {
        let mut reader = NsReader::from_reader(source);
        reader.expand_empty_elements(true).trim_text(false);
        XmlEventReader {
            reader,
            buf: Vec::new(),
        }
    }

    /// Read the next event, `None` at end of document.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::XmlError`](crate::PicaError::XmlError) if the
    /// document is not well-formed.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        loop {
            self.buf.clear();
            let (resolved, event) = self.reader.read_resolved_event_into(&mut self.buf)?;
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.into_inner()).into_owned()),
                _ => None,
            };

            let event = match event {
                Event::Start(e) => XmlEvent::Start {
                    name: XmlName {
                        namespace,
                        local: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    },
                    attributes: collect_attributes(&e)?,
                },
                Event::End(e) => XmlEvent::End {
                    name: XmlName {
                        namespace,
                        local: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    },
                },
                Event::Text(e) => XmlEvent::Text(e.unescape()?.into_owned()),
                Event::CData(e) => {
                    let bytes = e.into_inner();
                    XmlEvent::Text(self.reader.decoder().decode(&bytes)?.into_owned())
                },
                Event::Eof => return Ok(None),
                _ => continue,
            };
            return Ok(Some(event));
        }
    }
}

fn collect_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

impl<R: BufRead> Iterator for XmlEventReader<R> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

impl<R: BufRead> fmt::Debug for XmlEventReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlEventReader")
            .field("position", &self.reader.buffer_position())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(xml: &str) -> Vec<XmlEvent> {
        XmlEventReader::new(xml.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_namespaces_are_resolved() {
        let xml = r#"<srw:searchRetrieveResponse xmlns:srw="http://www.loc.gov/zing/srw/"><srw:numberOfRecords>3</srw:numberOfRecords></srw:searchRetrieveResponse>"#;
        let events = events(xml);
        match &events[1] {
            XmlEvent::Start { name, attributes } => {
                assert!(name.is("http://www.loc.gov/zing/srw/", "numberOfRecords"));
                assert!(attributes.is_empty());
            },
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[2], XmlEvent::text("3"));
    }

    #[test]
    fn test_empty_elements_are_expanded() {
        let events = events(r#"<datafield tag="" />"#);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].attribute("tag"), Some(""));
        assert_eq!(events[1], XmlEvent::end("datafield"));
    }

    #[test]
    fn test_text_is_unescaped_and_cdata_kept() {
        let events = events("<s>a &amp; b<![CDATA[<c>]]></s>");
        assert_eq!(events[1], XmlEvent::text("a & b"));
        assert_eq!(events[2], XmlEvent::text("<c>"));
    }

    #[test]
    fn test_namespace_declarations_are_not_attributes() {
        let events = events(r#"<record xmlns="info:srw/schema/5/picaXML-v1.0" type="x"></record>"#);
        match &events[0] {
            XmlEvent::Start { name, attributes } => {
                assert_eq!(name.namespace.as_deref(), Some("info:srw/schema/5/picaXML-v1.0"));
                assert_eq!(attributes, &vec![("type".to_string(), "x".to_string())]);
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let result: Result<Vec<_>> = XmlEventReader::new("<a><b></a>".as_bytes()).collect();
        assert!(matches!(result, Err(crate::PicaError::XmlError(_))));
    }
}
