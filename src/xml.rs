use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::domain::EntityKind;
use crate::error::KiraError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = current
                .into_iter()
                .flat_map(|element| element.children_named(segment))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    pub fn first_text(&self, path: &str) -> Option<String> {
        self.find(path)
            .and_then(Element::text)
            .map(|text| text.to_string())
    }

    pub fn first_attr(&self, path: &str, key: &str) -> Option<String> {
        self.find_all(path)
            .into_iter()
            .find_map(|element| element.attr(key))
            .map(|value| value.trim().to_string())
    }

    pub fn required_text(&self, entity: &'static str, path: &str) -> Result<String, KiraError> {
        self.first_text(path).ok_or_else(|| KiraError::MissingElement {
            entity,
            path: path.to_string(),
        })
    }

    pub fn required_attr(&self, entity: &'static str, key: &str) -> Result<String, KiraError> {
        self.attr(key)
            .map(|value| value.trim().to_string())
            .ok_or_else(|| KiraError::MissingElement {
                entity,
                path: format!("@{key}"),
            })
    }
}

pub fn strip_namespaces(element: &mut Element) -> &mut Element {
    if let Some((_, local)) = element.name.split_once(':') {
        element.name = local.to_string();
    }
    element
        .attributes
        .retain(|(key, _)| key != "xmlns" && !key.starts_with("xmlns:"));
    for child in &mut element.children {
        strip_namespaces(child);
    }
    element
}

pub fn parse_tree(bytes: &[u8]) -> Result<Element, KiraError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|err| KiraError::Xml(err.to_string()))?
        {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| KiraError::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let value = text
                        .unescape()
                        .map_err(|err| KiraError::Xml(err.to_string()))?;
                    current.text.push_str(&value);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(KiraError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| KiraError::Xml("document has no root element".to_string()))
}

fn open_element(start: &BytesStart) -> Result<Element, KiraError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|err| KiraError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| KiraError::Xml(err.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimlDocument {
    root: Element,
}

impl MinimlDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, KiraError> {
        Ok(Self::from_root(parse_tree(bytes)?))
    }

    pub fn from_root(mut root: Element) -> Self {
        strip_namespaces(&mut root);
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn entities(&self, kind: EntityKind) -> Vec<&Element> {
        if self.root.name == kind.element_name() {
            return vec![&self.root];
        }
        self.root.children_named(kind.element_name()).collect()
    }

    pub fn first(&self, kind: EntityKind) -> Result<&Element, KiraError> {
        self.entities(kind)
            .into_iter()
            .next()
            .ok_or(KiraError::DocumentNotFound(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMESPACED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MINiML xmlns="http://www.ncbi.nlm.nih.gov/geo/info/MINiML" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" version="0.5.0">
  <geo:Platform xmlns:geo="urn:geo" iid="GPL570">
    <geo:Accession database="GEO">GPL570</geo:Accession>
    <Title>  HG &amp; U133  </Title>
    <Empty/>
  </geo:Platform>
</MINiML>"#;

    #[test]
    fn strips_prefixes_and_declarations() {
        let doc = MinimlDocument::parse(NAMESPACED.as_bytes()).unwrap();
        let root = doc.root();
        assert_eq!(root.name, "MINiML");
        assert!(root.attr("xmlns").is_none());
        assert!(root.attr("xmlns:xsi").is_none());
        assert_eq!(root.attr("version"), Some("0.5.0"));
        let platform = doc.first(EntityKind::Platform).unwrap();
        assert_eq!(platform.first_text("Accession").as_deref(), Some("GPL570"));
        assert_eq!(platform.first_text("./Title").as_deref(), Some("HG & U133"));
        assert!(platform.find("Empty").is_some());
        assert_eq!(platform.first_text("Empty"), None);
    }

    #[test]
    fn stripping_twice_is_a_no_op() {
        let mut tree = parse_tree(NAMESPACED.as_bytes()).unwrap();
        strip_namespaces(&mut tree);
        let once = tree.clone();
        strip_namespaces(&mut tree);
        assert_eq!(tree, once);
    }

    #[test]
    fn first_match_wins_for_repeated_elements() {
        let element = Element::new("Series")
            .with_child(Element::new("Pubmed-ID").with_text("1"))
            .with_child(Element::new("Pubmed-ID").with_text("2"));
        assert_eq!(element.first_text("Pubmed-ID").as_deref(), Some("1"));
        assert_eq!(element.find_all("Pubmed-ID").len(), 2);
    }

    #[test]
    fn rejects_unbalanced_documents() {
        assert!(parse_tree(b"<MINiML><Sample></MINiML>").is_err());
    }
}
