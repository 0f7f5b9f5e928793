//! Minimal owned element tree over `quick-xml` events.
//!
//! Comments, processing instructions and the XML declaration are dropped.
//! Text keeps its original whitespace; callers decide whether to trim.

use quick_xml::{
  Reader, Writer,
  events::{BytesEnd, BytesStart, BytesText, Event},
};

use plcvault_core::Vendor;

use crate::error::{Error, Result};

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
  Element(Element),
  Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
  /// Qualified name exactly as written, prefix included.
  pub name:       String,
  /// Attributes in document order, values unescaped.
  pub attributes: Vec<(String, String)>,
  pub children:   Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
  pub root: Element,
}

// ─── Element queries ─────────────────────────────────────────────────────────

impl Element {
  fn new(name: String, attributes: Vec<(String, String)>) -> Self {
    Self { name, attributes, children: Vec::new() }
  }

  /// Name with any `prefix:` stripped.
  pub fn local_name(&self) -> &str {
    match self.name.rsplit_once(':') {
      Some((_, local)) => local,
      None => &self.name,
    }
  }

  pub fn attr(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }

  /// Direct child elements in document order.
  pub fn elements(&self) -> impl Iterator<Item = &Element> {
    self.children.iter().filter_map(|n| match n {
      Node::Element(e) => Some(e),
      Node::Text(_) => None,
    })
  }

  /// Direct child elements with the given local name.
  pub fn children_named<'a>(
    &'a self,
    local: &'a str,
  ) -> impl Iterator<Item = &'a Element> + 'a {
    self.elements().filter(move |e| e.local_name() == local)
  }

  pub fn child(&self, local: &str) -> Option<&Element> {
    self.elements().find(|e| e.local_name() == local)
  }

  /// All descendant elements (excluding `self`) in document order.
  pub fn descendants(&self) -> Vec<&Element> {
    let mut out = Vec::new();
    let mut stack: Vec<&Element> = self.elements().collect();
    stack.reverse();
    while let Some(el) = stack.pop() {
      out.push(el);
      let mark = stack.len();
      stack.extend(el.elements());
      stack[mark..].reverse();
    }
    out
  }

  /// First descendant with the given local name, in document order.
  pub fn find_descendant(&self, local: &str) -> Option<&Element> {
    for el in self.elements() {
      if el.local_name() == local {
        return Some(el);
      }
      if let Some(found) = el.find_descendant(local) {
        return Some(found);
      }
    }
    None
  }

  /// Concatenation of this element's direct text children.
  pub fn text(&self) -> String {
    self
      .children
      .iter()
      .filter_map(|n| match n {
        Node::Text(t) => Some(t.as_str()),
        Node::Element(_) => None,
      })
      .collect()
  }

  /// Serialize this subtree back to XML text.
  pub fn to_xml(&self) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, self)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
  }
}

impl Document {
  /// Vendor implied by the root element, if any.
  pub fn vendor(&self) -> Option<Vendor> { Vendor::detect(&self.root.name) }

  /// The document's canonical text; see [`crate::canonicalize`].
  pub fn canonical(&self) -> String { crate::canonical::canonical_element(&self.root) }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a whole document. Exactly one root element is required.
pub fn parse(text: &str) -> Result<Document> {
  let mut reader = Reader::from_str(text);
  let mut stack: Vec<Element> = Vec::new();
  let mut root: Option<Element> = None;

  loop {
    match reader.read_event()? {
      Event::Start(ref e) => stack.push(open_element(e)?),
      Event::Empty(ref e) => {
        let el = open_element(e)?;
        attach(&mut stack, &mut root, el)?;
      }
      Event::End(_) => {
        // quick-xml has already matched the end name against the open tag.
        let el = stack.pop().ok_or(Error::NoRootElement)?;
        attach(&mut stack, &mut root, el)?;
      }
      Event::Text(ref t) => {
        let text = t.unescape()?.into_owned();
        push_text(&mut stack, text)?;
      }
      Event::CData(c) => {
        let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
        push_text(&mut stack, text)?;
      }
      Event::Eof => break,
      _ => {}
    }
  }

  if let Some(open) = stack.pop() {
    return Err(Error::Unclosed(open.name));
  }
  root.map(|root| Document { root }).ok_or(Error::NoRootElement)
}

fn open_element(e: &BytesStart<'_>) -> Result<Element> {
  let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
  let mut attributes = Vec::new();
  for attr in e.attributes() {
    let attr = attr.map_err(quick_xml::Error::from)?;
    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
    let value = attr.unescape_value()?.into_owned();
    attributes.push((key, value));
  }
  Ok(Element::new(name, attributes))
}

fn attach(
  stack: &mut [Element],
  root: &mut Option<Element>,
  el: Element,
) -> Result<()> {
  if let Some(parent) = stack.last_mut() {
    parent.children.push(Node::Element(el));
    return Ok(());
  }
  if root.is_some() {
    return Err(Error::MultipleRoots);
  }
  *root = Some(el);
  Ok(())
}

fn push_text(stack: &mut [Element], text: String) -> Result<()> {
  match stack.last_mut() {
    Some(parent) => {
      if !text.is_empty() {
        parent.children.push(Node::Text(text));
      }
      Ok(())
    }
    None if text.trim().is_empty() => Ok(()),
    None => Err(Error::TextOutsideRoot),
  }
}

// ─── Serialization ───────────────────────────────────────────────────────────

fn write_element(w: &mut Writer<Vec<u8>>, el: &Element) -> Result<()> {
  let fail = |reason: String| Error::Serialize { element: el.name.clone(), reason };

  let mut start = BytesStart::new(el.name.as_str());
  for (k, v) in &el.attributes {
    start.push_attribute((k.as_str(), v.as_str()));
  }

  if el.children.is_empty() {
    return w.write_event(Event::Empty(start)).map_err(|e| fail(e.to_string()));
  }

  w.write_event(Event::Start(start)).map_err(|e| fail(e.to_string()))?;
  for child in &el.children {
    match child {
      Node::Element(c) => write_element(w, c)?,
      Node::Text(t) => w
        .write_event(Event::Text(BytesText::new(t)))
        .map_err(|e| fail(e.to_string()))?,
    }
  }
  w.write_event(Event::End(BytesEnd::new(el.name.as_str())))
    .map_err(|e| fail(e.to_string()))
}
