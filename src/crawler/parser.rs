//! Markup parsing into [`Document`] packages
//!
//! HTML goes through scraper (html5ever), XML through quick-xml. Either way
//! the parse is written into an `sxd_document` package so both kinds answer the
//! same XPath lookups. Both report a
//! [`DOCUMENT_EMPTY`](crate::document::DOCUMENT_EMPTY) diagnostic first when
//! the payload holds nothing but whitespace, which the scheduler treats as a
//! failed attempt.

use crate::document::{ContentKind, Diagnostic, Document, DOCUMENT_EMPTY, MARKUP_ERROR};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{ElementRef, Html};
use sxd_document::dom;
use sxd_document::Package;

/// Turns raw bytes into a document
pub trait DocumentParser {
    fn parse_xml(&self, bytes: &[u8]) -> Document;

    fn parse_html(&self, bytes: &[u8]) -> Document;

    /// Parses with the parser `kind` names
    fn parse_as(&self, kind: ContentKind, bytes: &[u8]) -> Document {
        match kind {
            ContentKind::Xml => self.parse_xml(bytes),
            ContentKind::Html => self.parse_html(bytes),
        }
    }

    /// Parses as XML when the payload starts with `<?`, as HTML otherwise
    fn parse_auto(&self, bytes: &[u8]) -> Document {
        self.parse_as(ContentKind::sniff(bytes), bytes)
    }
}

/// Default parser: scraper for HTML, quick-xml for XML
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupParser;

impl DocumentParser for MarkupParser {
    fn parse_xml(&self, bytes: &[u8]) -> Document {
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            return Document::new(
                ContentKind::Xml,
                Package::new(),
                vec![Diagnostic::empty_document()],
            );
        }

        let package = Package::new();
        let errors = read_xml(&package.as_document(), &text);
        Document::new(ContentKind::Xml, package, errors)
    }

    fn parse_html(&self, bytes: &[u8]) -> Document {
        let text = String::from_utf8_lossy(bytes);
        let mut errors = Vec::new();
        if text.trim().is_empty() {
            errors.push(Diagnostic::empty_document());
        }

        let html = Html::parse_document(&text);
        errors.extend(
            html.errors
                .iter()
                .map(|message| Diagnostic::new(MARKUP_ERROR, message.to_string())),
        );

        let package = Package::new();
        copy_html(&package.as_document(), &html);
        Document::new(ContentKind::Html, package, errors)
    }
}

/// Copies scraper's element tree into `document`
///
/// Walks with an explicit work list, so nesting depth is bounded by memory
/// rather than the call stack.
fn copy_html<'d>(document: &dom::Document<'d>, html: &Html) {
    let source_root = html.root_element();
    let root = html_element(document, source_root);
    document.root().append_child(root);

    let mut pending = vec![(source_root, root)];
    while let Some((source, target)) = pending.pop() {
        for child in source.children() {
            match child.value() {
                scraper::Node::Text(text) => {
                    let text: &str = text;
                    target.append_child(document.create_text(text));
                }
                scraper::Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        let copy = html_element(document, child);
                        target.append_child(copy);
                        pending.push((child, copy));
                    }
                }
                _ => {}
            }
        }
    }
}

fn html_element<'d>(document: &dom::Document<'d>, source: ElementRef<'_>) -> dom::Element<'d> {
    let value = source.value();
    let element = document.create_element(value.name());
    for (name, attr) in value.attrs() {
        element.set_attribute_value(name, attr);
    }
    element
}

/// Writes an XML payload into `document`, collecting diagnostics instead of failing
fn read_xml<'d>(document: &dom::Document<'d>, text: &str) -> Vec<Diagnostic> {
    let mut reader = Reader::from_str(text);
    let mut errors = Vec::new();
    let mut saw_root = false;
    // Open elements, innermost last
    let mut stack: Vec<dom::Element<'d>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let parent = stack.last().copied();
                saw_root |= parent.is_none();
                let element = open_element(document, parent, &start, &mut errors);
                stack.push(element);
            }
            Ok(Event::Empty(start)) => {
                let parent = stack.last().copied();
                saw_root |= parent.is_none();
                open_element(document, parent, &start, &mut errors);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(text)) => match text.unescape() {
                // Whitespace between top-level nodes carries nothing
                Ok(value) => {
                    if let Some(parent) = stack.last() {
                        parent.append_child(document.create_text(&value));
                    }
                }
                Err(e) => errors.push(Diagnostic::new(MARKUP_ERROR, e.to_string())),
            },
            Ok(Event::CData(data)) => {
                if let Some(parent) = stack.last() {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.append_child(document.create_text(&value));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                errors.push(Diagnostic::new(
                    MARKUP_ERROR,
                    format!("{} at position {}", e, reader.buffer_position()),
                ));
                break;
            }
        }
    }

    // Open elements are already attached, so what was parsed is kept
    if !stack.is_empty() {
        errors.push(Diagnostic::new(
            MARKUP_ERROR,
            format!("Premature end of data: {} unclosed element(s)", stack.len()),
        ));
    }

    if !saw_root && errors.is_empty() {
        errors.push(Diagnostic::new(
            DOCUMENT_EMPTY,
            "Start tag expected, '<' not found",
        ));
    }

    errors
}

/// Creates an element and attaches it to `parent`, or to the document root
fn open_element<'d>(
    document: &dom::Document<'d>,
    parent: Option<dom::Element<'d>>,
    start: &BytesStart<'_>,
    errors: &mut Vec<Diagnostic>,
) -> dom::Element<'d> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let element = document.create_element(name.as_str());
    read_xml_attributes(start, element, errors);
    match parent {
        Some(parent) => {
            parent.append_child(element);
        }
        None => {
            document.root().append_child(element);
        }
    }
    element
}

fn read_xml_attributes(start: &BytesStart<'_>, element: dom::Element<'_>, errors: &mut Vec<Diagnostic>) {
    for attribute in start.attributes() {
        match attribute {
            Ok(attribute) => {
                let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                match attribute.unescape_value() {
                    Ok(value) => {
                        element.set_attribute_value(name.as_str(), &value);
                    }
                    Err(e) => errors.push(Diagnostic::new(MARKUP_ERROR, e.to_string())),
                }
            }
            Err(e) => errors.push(Diagnostic::new(MARKUP_ERROR, e.to_string())),
        }
    }
}
