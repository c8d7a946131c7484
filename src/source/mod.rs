//! Streaming access to OSM XML exports.
//!
//! [`ElementReader`] pulls one top-level element (a child of the `<osm>`
//! root) at a time, together with its full subtree, so memory stays bounded
//! by the largest single element rather than the whole document.

use anyhow::{Context, Result, bail};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One markup element with its attributes (in document order) and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<SourceElement>,
}

impl SourceElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Pre-order walk: this element first, then every descendant in document order.
    pub fn iter(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// `k`/`v` pairs of every descendant `<tag>` element.
    pub fn tags(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.iter()
            .filter(|el| el.tag == "tag")
            .filter_map(|el| el.attr("k").map(|k| (k, el.attr("v"))))
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a SourceElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a SourceElement;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack.extend(current.children.iter().rev());
        Some(current)
    }
}

#[cfg(test)]
impl SourceElement {
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: SourceElement) -> Self {
        self.children.push(child);
        self
    }

    /// Shorthand for a `<tag k=".." v=".."/>` child.
    pub fn with_tag(self, key: &str, value: &str) -> Self {
        self.with_child(SourceElement::new("tag").with_attr("k", key).with_attr("v", value))
    }
}

/// Pull-based reader yielding top-level elements. Finite and not restartable.
pub struct ElementReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    // Open elements below the document root, innermost last.
    open: Vec<SourceElement>,
    in_root: bool,
    done: bool,
}

impl ElementReader<BufReader<File>> {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Source: Failed to open {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[cfg(test)]
impl<'a> ElementReader<&'a [u8]> {
    pub fn from_xml(xml: &'a str) -> Self {
        Self::new(xml.as_bytes())
    }
}

impl<R: BufRead> ElementReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::new(),
            open: Vec::new(),
            in_root: false,
            done: false,
        }
    }

    fn read_element(&mut self) -> Result<Option<SourceElement>> {
        loop {
            self.buf.clear();
            let position = self.reader.buffer_position();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| format!("Source: Malformed XML near byte {}", position))?;

            match event {
                Event::Start(start) => {
                    let element = open_element(&start)?;
                    if self.in_root {
                        self.open.push(element);
                    } else {
                        self.in_root = true;
                    }
                }
                Event::Empty(start) => {
                    let element = open_element(&start)?;
                    if !self.in_root {
                        // Self-closing root: an empty document.
                        continue;
                    }
                    match self.open.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(Some(element)),
                    }
                }
                Event::End(_) => match self.open.pop() {
                    Some(element) => match self.open.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(Some(element)),
                    },
                    None => self.in_root = false,
                },
                Event::Eof => {
                    if !self.open.is_empty() || self.in_root {
                        bail!("Source: Unexpected end of document inside an open element");
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for ElementReader<R> {
    type Item = Result<SourceElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.read_element().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}

fn open_element(start: &BytesStart<'_>) -> Result<SourceElement> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .context("Source: Element name is not UTF-8")?
        .to_string();
    let mut element = SourceElement::new(tag);
    for attr in start.attributes() {
        let attr = attr.context("Source: Malformed attribute")?;
        let name = std::str::from_utf8(attr.key.as_ref())
            .context("Source: Attribute name is not UTF-8")?
            .to_string();
        let value = attr
            .unescape_value()
            .with_context(|| format!("Source: Bad value for attribute '{}'", name))?
            .into_owned();
        element.attributes.push((name, value));
    }
    Ok(element)
}
