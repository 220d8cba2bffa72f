//! DOM tree for the exported content.
//!
//! The tree is deliberately small: a controlled subset of HTML elements is
//! recognised, everything else is kept as [`Tag::Unknown`]. Beyond parsing,
//! the module offers the handful of mutations the pagination engine needs
//! (class lookup, insertion before a child, removal by class) and a
//! serialiser used by the markup renderer and the CLI.

use std::collections::BTreeMap;
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// HTML void elements besides `img`, which has its own [`Tag`] variant.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    Section,
    P,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Table,
    Tr,
    Td,
    Th,
    Span,
    Img,
    Button,
    Iframe,
    Body,
    Html,
    Head,
    /// Anything else. Kept so it survives a parse/serialise cycle.
    Unknown(String),
}

impl Tag {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "div" => Tag::Div,
            "section" => Tag::Section,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "img" => Tag::Img,
            "button" => Tag::Button,
            "iframe" => Tag::Iframe,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            other => Tag::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::Div => "div",
            Tag::Section => "section",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::Img => "img",
            Tag::Button => "button",
            Tag::Iframe => "iframe",
            Tag::Body => "body",
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Unknown(name) => name,
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        match self {
            Tag::Img => true,
            Tag::Unknown(name) => VOID_ELEMENTS.contains(&name.as_str()),
            _ => false,
        }
    }
}

/// A node in the DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

impl DomNode {
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementNode> {
        match self {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        }
    }
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Builder-style class append.
    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_child(DomNode::Text(text.to_string()))
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attributes
            .get("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        match self.attributes.get_mut("class") {
            Some(existing) if !existing.trim().is_empty() => {
                existing.push(' ');
                existing.push_str(class);
            }
            _ => {
                self.attributes.insert("class".to_string(), class.to_string());
            }
        }
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    /// Direct element children, skipping text nodes.
    pub fn element_children(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(DomNode::as_element)
    }

    /// Insert `node` before the child at `index` (appends when past the end).
    pub fn insert_before(&mut self, index: usize, node: DomNode) {
        let index = index.min(self.children.len());
        self.children.insert(index, node);
    }

    /// Count every descendant element carrying `class`.
    pub fn count_class(&self, class: &str) -> usize {
        self.element_children()
            .map(|e| usize::from(e.has_class(class)) + e.count_class(class))
            .sum()
    }

    /// Remove every descendant element carrying `class`, at any depth.
    ///
    /// Returns the number of elements removed. Removing a matching element
    /// also drops its subtree.
    pub fn remove_class_elements(&mut self, class: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, DomNode::Element(e) if e.has_class(class)));
        let mut removed = before - self.children.len();
        for child in self.children.iter_mut().filter_map(DomNode::as_element_mut) {
            removed += child.remove_class_elements(class);
        }
        removed
    }

    /// Collect all text content below this element.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Serialise this element (and its subtree) back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialiser
// ---------------------------------------------------------------------------

/// Serialise a node list to HTML.
pub fn to_html(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(t) => out.push_str(&escape(t, false)),
        DomNode::Element(e) => write_element(e, out),
    }
}

fn write_element(e: &ElementNode, out: &mut String) {
    let name = e.tag.name();
    out.push('<');
    out.push_str(name);
    for (key, value) in &e.attributes {
        let _ = write!(out, " {}=\"{}\"", key, escape(value, true));
    }
    if e.tag.is_void() {
        out.push_str(" />");
        return;
    }
    out.push('>');
    for child in &e.children {
        write_node(child, out);
    }
    let _ = write!(out, "</{name}>");
}

fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
///
/// End tags close the nearest open element with the same name, implicitly
/// closing anything opened inside it. End tags matching no open element are
/// dropped.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes(&mut Vec::new())
}

/// Parse an HTML fragment and wrap it in a `<div>` root.
pub fn parse_fragment(html: &str) -> ElementNode {
    let mut root = ElementNode::new(Tag::Div);
    root.children = body_children(&parse_html(html));
    root
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse siblings until EOF or an end tag for one of the `open` elements.
    fn parse_nodes(&mut self, open: &mut Vec<String>) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_inter_element_whitespace();
            if self.eof() {
                break;
            }
            if self.at_end_tag() {
                let name = self.end_tag_name();
                if open.contains(&name) {
                    break;
                }
                log::debug!("dropping unmatched </{name}>");
                self.skip_end_tag();
                continue;
            }
            if let Some(node) = self.parse_node(open) {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self, open: &mut Vec<String>) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_until("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_until(">");
            return None;
        }
        if self.at_start_tag() {
            Some(self.parse_element(open))
        } else {
            Some(self.parse_text())
        }
    }

    /// Text up to the next tag. A `<` that does not open a tag is literal.
    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        self.advance();
        while !self.eof() && !self.at_markup() {
            self.advance();
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self, open: &mut Vec<String>) -> DomNode {
        self.advance(); // '<'
        let tag = Tag::parse(&self.parse_name());
        let mut elem = ElementNode::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Stray character that is not part of a name; skip it.
                self.advance();
                continue;
            }
            elem.attributes.insert(key, value);
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance();
        }
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        let name = elem.tag.name().to_string();
        open.push(name.clone());
        elem.children = self.parse_nodes(open);
        open.pop();

        // An end tag for an outer element is left for that element.
        if self.at_end_tag() && self.end_tag_name() == name {
            self.skip_end_tag();
        }

        DomNode::Element(elem)
    }

    /// `<` followed by a letter.
    fn at_start_tag(&self) -> bool {
        let mut chars = self.input[self.pos..].chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    }

    /// `</` followed by a letter.
    fn at_end_tag(&self) -> bool {
        self.starts_with("</")
            && self.input[self.pos + 2..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn at_markup(&self) -> bool {
        self.at_start_tag()
            || self.at_end_tag()
            || self.starts_with("<!")
            || self.starts_with("<?")
    }

    /// Lower-cased name of the end tag at the cursor, without consuming it.
    fn end_tag_name(&self) -> String {
        self.input[self.pos + 2..]
            .chars()
            .take_while(|&c| is_name_char(c))
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn skip_end_tag(&mut self) {
        self.skip_until(">");
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance();
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance();
                let start = self.pos;
                while !self.eof() && !self.starts_with(quote) {
                    self.advance();
                }
                let value = decode_entities(&self.input[start..self.pos]);
                if !self.eof() {
                    self.advance();
                }
                return value;
            }
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '>' || c == '/' {
                break;
            }
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Skip whitespace only when it separates two tags; text keeps it.
    fn skip_inter_element_whitespace(&mut self) {
        let saved = self.pos;
        self.skip_whitespace();
        if !self.eof() && !self.at_markup() {
            self.pos = saved;
        }
    }

    fn skip_until(&mut self, terminator: &str) {
        match self.input[self.pos..].find(terminator) {
            Some(offset) => self.pos += offset + terminator.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == ':'
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&times;", "\u{00D7}")
        .replace("&amp;", "&")
}

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_div() {
        let nodes = parse_html(r#"<div class="flex p-4"><p>Hello</p></div>"#);
        assert_eq!(nodes.len(), 1);
        let e = nodes[0].as_element().expect("element");
        assert_eq!(e.tag, Tag::Div);
        assert_eq!(e.classes(), vec!["flex", "p-4"]);
        assert_eq!(e.children.len(), 1);
    }

    #[test]
    fn parse_self_closing_img() {
        let nodes = parse_html(r#"<img src="logo.png" />"#);
        let e = nodes[0].as_element().expect("img");
        assert_eq!(e.tag, Tag::Img);
        assert_eq!(e.src(), Some("logo.png"));
    }

    #[test]
    fn parse_nested_spans() {
        let nodes = parse_html(r#"<p>Hello <span class="font-bold">world</span>!</p>"#);
        let e = nodes[0].as_element().expect("p");
        assert_eq!(e.children.len(), 3);
        assert_eq!(e.text_content(), "Hello world!");
    }

    #[test]
    fn has_class_matches_whole_tokens() {
        let e = ElementNode::new(Tag::Div).with_attr("class", "page-break-ish html2pdf__page-break");
        assert!(e.has_class("html2pdf__page-break"));
        assert!(!e.has_class("page"));
    }

    #[test]
    fn add_class_is_idempotent() {
        let mut e = ElementNode::new(Tag::Div);
        e.add_class("a");
        e.add_class("b");
        e.add_class("a");
        assert_eq!(e.classes(), vec!["a", "b"]);
    }

    #[test]
    fn insert_before_clamps_to_the_end() {
        let mut root = parse_fragment("<p>a</p><p>b</p>");
        root.insert_before(1, DomNode::Element(ElementNode::new(Tag::Div)));
        root.insert_before(99, DomNode::Text("tail".into()));
        assert_eq!(root.to_html(), "<div><p>a</p><div></div><p>b</p>tail</div>");
    }

    #[test]
    fn remove_class_elements_reaches_nested_nodes() {
        let mut root = parse_fragment(
            r#"<div class="x"></div><p>a</p><div><div class="x"></div><span>b</span></div>"#,
        );
        assert_eq!(root.count_class("x"), 2);
        assert_eq!(root.remove_class_elements("x"), 2);
        assert_eq!(root.count_class("x"), 0);
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn serialise_escapes_and_sorts_attributes() {
        let e = ElementNode::new(Tag::Section)
            .with_attr("style", "width: 800px;")
            .with_attr("class", "content-wrapper")
            .with_text("a < b & \"c\"");
        assert_eq!(
            e.to_html(),
            r#"<section class="content-wrapper" style="width: 800px;">a &lt; b &amp; "c"</section>"#
        );
    }

    #[test]
    fn void_elements_do_not_swallow_siblings() {
        let root = parse_fragment("<div>a<br>b</div><div>c<hr></div><div>d<input type=text></div>");
        assert_eq!(root.element_children().count(), 3);
        assert_eq!(
            root.to_html(),
            r#"<div><div>a<br />b</div><div>c<hr /></div><div>d<input type="text" /></div></div>"#
        );
    }

    #[test]
    fn unmatched_end_tags_are_dropped() {
        let root = parse_fragment("<div>a</div></span><div>b</div>");
        assert_eq!(root.to_html(), "<div><div>a</div><div>b</div></div>");

        let root = parse_fragment("<div><p>a</span>b</p></div><p>c</p>");
        assert_eq!(root.to_html(), "<div><div><p>ab</p></div><p>c</p></div>");
    }

    #[test]
    fn end_tag_closes_unclosed_children() {
        let root = parse_fragment("<section><p>a<span>b</section><p>c</p>");
        assert_eq!(
            root.to_html(),
            "<div><section><p>a<span>b</span></p></section><p>c</p></div>"
        );
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let root = parse_fragment("<p>a < b</p><p>1 <2 </ 3<</p>");
        assert_eq!(root.element_children().count(), 2);
        assert_eq!(root.to_html(), "<div><p>a &lt; b</p><p>1 &lt;2 &lt;/ 3&lt;</p></div>");
    }

    #[test]
    fn unknown_tags_survive_round_trip() {
        let root = parse_fragment("<article><p>x</p></article>");
        assert_eq!(root.to_html(), "<div><article><p>x</p></article></div>");
    }
}
