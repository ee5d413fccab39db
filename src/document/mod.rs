//! Parsed documents and structural lookup
//!
//! A [`Document`] wraps the `sxd_document` package the parsers build, and
//! lookups are XPath 1.0 expressions evaluated by `sxd_xpath`. Callers pass
//! either a shorthand CSS selector (translated by [`translate_selector`]) or an
//! absolute path beginning with `/`, which is used as-is.

mod selector;

pub use selector::translate_selector;
pub use sxd_document::dom::Element;
pub use sxd_xpath::nodeset::Node;

use crate::SelectorError;
use reqwest::Method;
use std::fmt;
use sxd_document::Package;
use sxd_xpath::{Context, Factory, Value};
use url::Url;

/// Diagnostic code reported when the payload contained no markup at all
pub const DOCUMENT_EMPTY: u32 = 4;

/// Diagnostic code for any other markup error
pub const MARKUP_ERROR: u32 = 1;

/// Which parser a payload is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Xml,
}

impl ContentKind {
    /// Picks the parser from a declared media type
    ///
    /// Any media type containing `xml` counts as XML (`application/xml`,
    /// `application/rss+xml`, even `text/xml-ish`). Everything else, including
    /// a missing header, is HTML.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(value) if value.contains("xml") => Self::Xml,
            _ => Self::Html,
        }
    }

    /// Picks the parser from the payload itself: a leading `<?` means XML
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"<?") {
            Self::Xml
        } else {
            Self::Html
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::Xml => write!(f, "xml"),
        }
    }
}

/// One parser diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The "document is empty" diagnostic
    pub fn empty_document() -> Self {
        Self::new(DOCUMENT_EMPTY, "Document is empty")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A parsed HTML or XML document
pub struct Document {
    package: Package,
    kind: ContentKind,
    errors: Vec<Diagnostic>,
    method: Option<Method>,
    url: Option<Url>,
}

impl Document {
    pub fn new(kind: ContentKind, package: Package, errors: Vec<Diagnostic>) -> Self {
        Self {
            package,
            kind,
            errors,
            method: None,
            url: None,
        }
    }

    /// The underlying document package
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// The root element, if the payload had one
    pub fn root(&self) -> Option<Element<'_>> {
        self.package
            .as_document()
            .root()
            .children()
            .into_iter()
            .find_map(|child| child.element())
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Parser diagnostics in the order they were reported
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// True when the first diagnostic is [`DOCUMENT_EMPTY`]
    pub fn is_empty_document(&self) -> bool {
        self.errors
            .first()
            .is_some_and(|diagnostic| diagnostic.code == DOCUMENT_EMPTY)
    }

    /// Method of the request that produced this document
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// URL of the request that produced this document
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub(crate) fn stamp(&mut self, method: Method, url: Url) {
        self.method = Some(method);
        self.url = Some(url);
    }

    /// Finds nodes from the document root
    ///
    /// # Example
    ///
    /// ```
    /// use ripple_crawl::crawler::{DocumentParser, MarkupParser};
    /// use ripple_crawl::document::content;
    ///
    /// let doc = MarkupParser.parse_html(b"<p class='lead'> Hello </p>");
    /// let found = doc.find("p.lead").unwrap();
    /// assert_eq!(content(&found[0]), "Hello");
    /// ```
    pub fn find(&self, selector: &str) -> Result<Vec<Node<'_>>, SelectorError> {
        let root = self.package.as_document().root();
        self.find_from(Node::Root(root), selector)
    }

    /// Finds nodes below `context`
    ///
    /// Shorthand selectors match descendants of `context`; absolute paths
    /// (leading `/`) are always evaluated from the document root.
    pub fn find_in<'a>(
        &'a self,
        context: Element<'a>,
        selector: &str,
    ) -> Result<Vec<Node<'a>>, SelectorError> {
        self.find_from(Node::Element(context), selector)
    }

    /// Content of the first match, if any
    pub fn first_content(&self, selector: &str) -> Option<String> {
        self.find(selector).ok()?.first().map(content)
    }

    fn find_from<'a>(
        &'a self,
        context: Node<'a>,
        selector: &str,
    ) -> Result<Vec<Node<'a>>, SelectorError> {
        let selector = selector.trim();
        if selector.starts_with('/') {
            let root = self.package.as_document().root();
            return evaluate(Node::Root(root), selector);
        }

        // Translated selectors start with `//`; anchor them at the context node
        let expr = format!(".{}", translate_selector(selector)?);
        evaluate(context, &expr)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("kind", &self.kind)
            .field("root", &self.root().map(|root| root.name().local_part().to_string()))
            .field("errors", &self.errors)
            .field("method", &self.method)
            .field("url", &self.url)
            .finish()
    }
}

/// Evaluates an XPath expression and returns the selected nodes in document order
fn evaluate<'d>(context: Node<'d>, expr: &str) -> Result<Vec<Node<'d>>, SelectorError> {
    let xpath = Factory::new()
        .build(expr)
        .map_err(|e| SelectorError::MalformedPath(format!("{}: {}", expr, e)))?
        .ok_or_else(|| SelectorError::MalformedPath(expr.to_string()))?;

    let value = xpath
        .evaluate(&Context::new(), context)
        .map_err(|e| SelectorError::Evaluation(format!("{}: {}", expr, e)))?;

    match value {
        Value::Nodeset(nodes) => Ok(nodes.document_order()),
        other => Err(SelectorError::Evaluation(format!(
            "{} yields {:?}, not nodes",
            expr, other
        ))),
    }
}

/// Text accessor: elements and text nodes carry text
pub fn text(node: &Node<'_>) -> Option<String> {
    match node {
        Node::Element(_) => Some(node.string_value()),
        Node::Text(text) => Some(text.text().to_string()),
        _ => None,
    }
}

/// Value accessor: only attributes carry a value
pub fn value<'d>(node: &Node<'d>) -> Option<&'d str> {
    match node {
        Node::Attribute(attribute) => Some(attribute.value()),
        _ => None,
    }
}

/// Text, else value, else the node's string value, trimmed
pub fn content(node: &Node<'_>) -> String {
    let raw = text(node)
        .or_else(|| value(node).map(str::to_string))
        .unwrap_or_else(|| node.string_value());
    raw.trim().to_string()
}
