// tree.rs -- Minimal ElementTree-style document built from quick-xml events

use std::borrow::Cow;
use std::collections::HashMap;

use lazy_static::lazy_static;
use log::trace;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    // Internal general entities only; parameter and external entities are not expanded
    static ref ENTITY_DECL_RE: Regex =
        Regex::new(r#"<!ENTITY\s+([^\s%]+)\s+(?:"([^"]*)"|'([^']*)')\s*>"#).unwrap();
}

/// Bounds applied while loading a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Largest accepted input, in bytes
    pub max_bytes: u64,
    /// Deepest accepted element nesting (the root element is depth 1)
    pub max_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        ParseLimits {
            max_bytes: 4 * 1024 * 1024,
            max_depth: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("{0}")]
    Malformed(String),
    #[error("{0}")]
    LimitExceeded(String),
}

/// One element of a parsed document.
///
/// `text` holds the character data between the start tag and the first
/// child; `tail` holds the character data following the end tag, up to the
/// next sibling or the parent's end tag. Both are `None` rather than empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    /// Parse a complete document and return its root element
    pub fn parse(input: &str, limits: &ParseLimits) -> Result<Element, TreeError> {
        if input.len() as u64 > limits.max_bytes {
            return Err(TreeError::LimitExceeded(format!(
                "document is {} bytes, limit is {}",
                input.len(),
                limits.max_bytes
            )));
        }

        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);

        let mut builder = TreeBuilder::new(limits.max_depth);
        let mut entities: HashMap<String, String> = HashMap::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                TreeError::Malformed(format!("{} (at byte {})", e, reader.buffer_position()))
            })?;

            match event {
                Event::Start(e) => builder.open(element_from_start(&e, &entities)?)?,
                Event::Empty(e) => {
                    builder.open(element_from_start(&e, &entities)?)?;
                    builder.close()?;
                }
                Event::End(_) => builder.close()?,
                Event::Text(e) => {
                    let text = e.decode().map_err(|e| TreeError::Malformed(e.to_string()))?;
                    builder.text(&text)?;
                }
                Event::CData(e) => {
                    let text = e.decode().map_err(|e| TreeError::Malformed(e.to_string()))?;
                    builder.text(&text)?;
                }
                Event::GeneralRef(e) => {
                    let resolved: Cow<str> = match e
                        .resolve_char_ref()
                        .map_err(|e| TreeError::Malformed(e.to_string()))?
                    {
                        Some(ch) => Cow::Owned(ch.to_string()),
                        None => {
                            let name = e.decode().map_err(|e| TreeError::Malformed(e.to_string()))?;
                            match resolve_entity(&entities, &name) {
                                Some(value) => Cow::Owned(value.to_string()),
                                None => {
                                    return Err(TreeError::Malformed(format!(
                                        "undefined entity &{};",
                                        name
                                    )));
                                }
                            }
                        }
                    };
                    builder.text(&resolved)?;
                }
                Event::DocType(e) => {
                    let doctype = e.decode().map_err(|e| TreeError::Malformed(e.to_string()))?;
                    entities = entity_declarations(&doctype);
                }
                Event::Eof => break,
                // Declarations, comments and processing instructions carry no data
                _ => {}
            }
        }

        builder.finish()
    }

    /// Value of the named attribute, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children with the given tag, in document order
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Depth-first pre-order walk starting with this element
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// Depth-first pre-order walk of everything below this element
    pub fn descendants(&self) -> impl Iterator<Item = &Element> {
        self.iter().skip(1)
    }

    /// Every element (this one included) with the given tag, in document order
    pub fn iter_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.iter().filter(move |el| el.tag == tag)
    }
}

pub struct Iter<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

fn element_from_start(start: &BytesStart, entities: &HashMap<String, String>) -> Result<Element, TreeError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(&tag);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| TreeError::Malformed(format!("bad attribute on <{}>: {}", tag, e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(|name| resolve_entity(entities, name))
            .map_err(|e| TreeError::Malformed(format!("bad value for {} on <{}>: {}", key, tag, e)))?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

fn resolve_entity<'a>(entities: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    resolve_predefined_entity(name).or_else(|| entities.get(name).map(String::as_str))
}

/// `<!ENTITY name "value">` declarations from a DOCTYPE internal subset.
/// The first declaration of a name wins.
fn entity_declarations(doctype: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    for caps in ENTITY_DECL_RE.captures_iter(doctype) {
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        entities
            .entry(caps[1].to_string())
            .or_insert_with(|| value.to_string());
    }
    entities
}

fn append(slot: &mut Option<String>, chunk: &str) {
    match slot {
        Some(existing) => existing.push_str(chunk),
        None => *slot = Some(chunk.to_string()),
    }
}

struct TreeBuilder {
    stack: Vec<Element>,
    root: Option<Element>,
    max_depth: usize,
}

impl TreeBuilder {
    fn new(max_depth: usize) -> Self {
        TreeBuilder {
            stack: Vec::new(),
            root: None,
            max_depth,
        }
    }

    fn open(&mut self, element: Element) -> Result<(), TreeError> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(TreeError::Malformed(format!(
                "junk after document element: <{}>",
                element.tag
            )));
        }
        if self.stack.len() >= self.max_depth {
            return Err(TreeError::LimitExceeded(format!(
                "element nesting deeper than {}",
                self.max_depth
            )));
        }
        trace!("open <{}> at depth {}", element.tag, self.stack.len() + 1);
        self.stack.push(element);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TreeError> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| TreeError::Malformed("end tag without matching start tag".to_string()))?;

        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
        Ok(())
    }

    fn text(&mut self, chunk: &str) -> Result<(), TreeError> {
        if chunk.is_empty() {
            return Ok(());
        }

        match self.stack.last_mut() {
            Some(current) => match current.children.last_mut() {
                Some(last_child) => append(&mut last_child.tail, chunk),
                None => append(&mut current.text, chunk),
            },
            None => {
                if !chunk.trim().is_empty() {
                    return Err(TreeError::Malformed(format!(
                        "text outside the document element: {:?}",
                        chunk.trim()
                    )));
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Element, TreeError> {
        if let Some(open) = self.stack.pop() {
            return Err(TreeError::Malformed(format!("unclosed element <{}>", open.tag)));
        }
        self.root
            .ok_or_else(|| TreeError::Malformed("no element found".to_string()))
    }
}
