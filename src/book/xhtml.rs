//! Rendered HTML as a tree, written back out as XHTML.
//!
//! pulldown-cmark emits HTML, and raw HTML in a post passes through exactly
//! as the author typed it: `<br>`, unquoted attributes, an unclosed `<p>`.
//! Chapter files are parsed as XML by readers, so a rendered body is parsed
//! with html5ever into a small reference-counted tree, edited in place
//! (highlighted code, embedded image sources, chapter splits) and serialized
//! as well-formed XHTML.
//!
//! Serialization rules:
//!
//! - void HTML elements are self-closed (`<br/>`), other empty HTML elements
//!   get an explicit end tag
//! - text is decoded by the parser and re-escaped with only `&`, `<` and `>`,
//!   so quote entities come out as literal characters
//! - attribute values are fully escaped
//! - SVG and MathML subtrees declare their namespace on their root
//! - comments, doctypes and names that are not valid XML names are dropped

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{
    Attribute, LocalName, Namespace, ParseOpts, QualName, local_name, ns, parse_document,
};
use quick_xml::escape::{escape, partial_escape};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub type Handle = Rc<Node>;

#[derive(Debug)]
pub enum NodeData {
    Document,
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,
    },
    Text(RefCell<String>),
    /// Comments, processing instructions. Never serialized.
    Ignored,
}

#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    parent: RefCell<Option<Weak<Node>>>,
    children: RefCell<Vec<Handle>>,
}

impl Node {
    fn new(data: NodeData) -> Handle {
        Rc::new(Node {
            data,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        })
    }

    fn text_node(text: &str) -> Handle {
        Node::new(NodeData::Text(RefCell::new(text.to_string())))
    }

    /// Whether this is the HTML element `<local>`.
    pub fn is(&self, local: &str) -> bool {
        matches!(
            &self.data,
            NodeData::Element { name, .. } if name.ns == ns!(html) && &*name.local == local
        )
    }

    /// Whether this is a text node holding only whitespace.
    pub fn is_blank(&self) -> bool {
        matches!(&self.data, NodeData::Text(text) if text.borrow().trim().is_empty())
    }

    /// Value of an unprefixed attribute.
    pub fn attr(&self, local: &str) -> Option<String> {
        let NodeData::Element { attrs, .. } = &self.data else {
            return None;
        };
        attrs
            .borrow()
            .iter()
            .find(|a| a.name.prefix.is_none() && &*a.name.local == local)
            .map(|a| a.value.to_string())
    }

    /// Set an unprefixed attribute, adding it when absent.
    pub fn set_attr(&self, local: &str, value: &str) {
        let NodeData::Element { attrs, .. } = &self.data else {
            return;
        };
        let mut attrs = attrs.borrow_mut();
        match attrs
            .iter_mut()
            .find(|a| a.name.prefix.is_none() && &*a.name.local == local)
        {
            Some(attr) => attr.value = StrTendril::from_slice(value),
            None => attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(local)),
                value: StrTendril::from_slice(value),
            }),
        }
    }

    pub fn children(&self) -> Vec<Handle> {
        self.children.borrow().clone()
    }

    /// Concatenated text of every descendant.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Descendant HTML elements named `local`, in document order.
    pub fn descendants(&self, local: &str) -> Vec<Handle> {
        let mut out = Vec::new();
        collect_elements(self, local, &mut out);
        out
    }
}

fn collect_text(node: &Node, out: &mut String) {
    if let NodeData::Text(text) = &node.data {
        out.push_str(&text.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

fn collect_elements(node: &Node, local: &str, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if child.is(local) {
            out.push(child.clone());
        }
        collect_elements(child, local, out);
    }
}

// =========================================================================
// Tree edits
// =========================================================================

fn parent_of(node: &Handle) -> Option<Handle> {
    node.parent.borrow().as_ref().and_then(Weak::upgrade)
}

fn previous_sibling(node: &Handle) -> Option<Handle> {
    let parent = parent_of(node)?;
    let children = parent.children.borrow();
    let index = children.iter().position(|c| Rc::ptr_eq(c, node))?;
    index.checked_sub(1).map(|i| children[i].clone())
}

/// Unlink `node` from its parent. The subtree stays intact.
pub fn detach(node: &Handle) {
    let parent = node.parent.take().and_then(|weak| weak.upgrade());
    if let Some(parent) = parent {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

fn append(parent: &Handle, child: Handle) {
    detach(&child);
    *child.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(child);
}

fn append_text(parent: &Handle, text: &str) {
    let last = parent.children.borrow().last().cloned();
    if let Some(last) = last
        && let NodeData::Text(existing) = &last.data
    {
        existing.borrow_mut().push_str(text);
        return;
    }
    append(parent, Node::text_node(text));
}

fn insert_before(sibling: &Handle, node: Handle) {
    let Some(parent) = parent_of(sibling) else {
        return;
    };
    detach(&node);
    *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
    let mut children = parent.children.borrow_mut();
    let index = children
        .iter()
        .position(|c| Rc::ptr_eq(c, sibling))
        .unwrap_or(children.len());
    children.insert(index, node);
}

fn insert_text_before(sibling: &Handle, text: &str) {
    if let Some(previous) = previous_sibling(sibling)
        && let NodeData::Text(existing) = &previous.data
    {
        existing.borrow_mut().push_str(text);
        return;
    }
    insert_before(sibling, Node::text_node(text));
}

/// Put `replacement` where `old` was, in order, and unlink `old`.
pub fn replace(old: &Handle, replacement: Vec<Handle>) {
    for node in replacement {
        insert_before(old, node);
    }
    detach(old);
}

// =========================================================================
// Parsing
// =========================================================================

struct Sink {
    document: Handle,
}

impl Default for Sink {
    fn default() -> Self {
        Self {
            document: Node::new(NodeData::Document),
        }
    }
}

impl TreeSink for Sink {
    type Handle = Handle;
    type Output = Handle;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self.document
    }

    // Rendered Markdown is routinely not valid HTML; recover like a browser.
    fn parse_error(&self, _msg: Cow<'static, str>) {}

    fn get_document(&self) -> Self::Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static UNNAMED: QualName = QualName {
            prefix: None,
            ns: ns!(),
            local: local_name!(""),
        };
        match &target.data {
            NodeData::Element { name, .. } => name,
            _ => &UNNAMED,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        Node::new(NodeData::Element {
            name,
            attrs: RefCell::new(attrs),
        })
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        Node::new(NodeData::Ignored)
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        Node::new(NodeData::Ignored)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => append(parent, node),
            NodeOrText::AppendText(text) => append_text(parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if parent_of(element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        match new_node {
            NodeOrText::AppendNode(node) => insert_before(sibling, node),
            NodeOrText::AppendText(text) => insert_text_before(sibling, &text),
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let NodeData::Element {
            attrs: existing, ..
        } = &target.data
        {
            let mut existing = existing.borrow_mut();
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = std::mem::take(&mut *node.children.borrow_mut());
        for child in children {
            *child.parent.borrow_mut() = None;
            append(new_parent, child);
        }
    }
}

/// The content of a parsed `<body>`.
pub struct Fragment {
    body: Handle,
}

impl Fragment {
    /// Parse an HTML fragment as the body of a document.
    pub fn parse(html: &str) -> Self {
        let wrapped = format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>");
        let document = parse_document(Sink::default(), ParseOpts::default())
            .from_utf8()
            .one(wrapped.as_bytes());
        let body = document.descendants("body").into_iter().next();
        Self {
            body: body.unwrap_or(document),
        }
    }

    /// Top-level nodes, in order.
    pub fn nodes(&self) -> Vec<Handle> {
        self.body.children()
    }

    /// Every HTML element named `local`, in document order.
    pub fn elements(&self, local: &str) -> Vec<Handle> {
        self.body.descendants(local)
    }

    pub fn to_xhtml(&self) -> String {
        write_xhtml(&self.nodes())
    }
}

/// Reparse HTML and write it back out as XHTML.
pub fn to_xhtml(html: &str) -> String {
    Fragment::parse(html).to_xhtml()
}

// =========================================================================
// Serialization
// =========================================================================

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Serialize nodes as XHTML inside an XHTML-namespaced parent.
pub fn write_xhtml(nodes: &[Handle]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &ns!(html), &mut out);
    }
    out
}

fn write_node(node: &Node, parent_ns: &Namespace, out: &mut String) {
    match &node.data {
        NodeData::Text(text) => {
            let text = text.borrow();
            let text = xml_chars(&text);
            out.push_str(&partial_escape(&*text));
        }
        NodeData::Element { name, attrs } => {
            write_element(node, name, &attrs.borrow(), parent_ns, out)
        }
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                write_node(child, parent_ns, out);
            }
        }
        NodeData::Ignored => {}
    }
}

fn write_element(
    node: &Node,
    name: &QualName,
    attrs: &[Attribute],
    parent_ns: &Namespace,
    out: &mut String,
) {
    let children = node.children.borrow();
    if !is_xml_name(&name.local) {
        for child in children.iter() {
            write_node(child, parent_ns, out);
        }
        return;
    }

    out.push('<');
    out.push_str(&name.local);
    if name.ns != *parent_ns {
        out.push_str(&format!(" xmlns=\"{}\"", escape(&*name.ns)));
    }
    if attrs.iter().any(|a| a.name.ns == ns!(xlink)) {
        out.push_str(" xmlns:xlink=\"http://www.w3.org/1999/xlink\"");
    }
    for attr in attrs {
        let Some(attr_name) = attribute_name(&attr.name) else {
            continue;
        };
        let value = xml_chars(&attr.value);
        out.push_str(&format!(" {attr_name}=\"{}\"", escape(&*value)));
    }

    let is_html = name.ns == ns!(html);
    if children.is_empty() && (!is_html || VOID_ELEMENTS.contains(&&*name.local)) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in children.iter() {
        write_node(child, &name.ns, out);
    }
    out.push_str("</");
    out.push_str(&name.local);
    out.push('>');
}

/// Qualified attribute name, or `None` when it cannot be written.
///
/// Namespace declarations are written from element namespaces instead.
fn attribute_name(name: &QualName) -> Option<Cow<'_, str>> {
    if name.ns == ns!(xmlns) || (name.prefix.is_none() && &*name.local == "xmlns") {
        return None;
    }
    if !is_xml_name(&name.local) {
        return None;
    }
    Some(match &name.prefix {
        Some(prefix) => Cow::Owned(format!("{prefix}:{}", name.local)),
        None => Cow::Borrowed(&*name.local),
    })
}

/// An XML name without a namespace prefix.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Drop characters XML 1.0 cannot carry.
fn xml_chars(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}
