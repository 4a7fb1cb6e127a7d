//! Owned element tree built from quick-xml events.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::encoding::decode;
use crate::XmlError;

const INDENT_WIDTH: usize = 2;

/// A node inside an element's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(Element),
    /// Unescaped character data.
    Text(String),
    CData(String),
    Comment(String),
}

/// XML element with attributes kept in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified tag name exactly as written.
    pub name: String,
    /// `(key, unescaped value)` pairs.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    /// Create an element without attributes or content.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder style helper appending an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder style helper appending a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Value of the attribute whose key matches `key` exactly.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first attribute whose key matches `key` ignoring case.
    pub fn attribute_ignore_case(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the tag name equals `tag` ignoring case.
    pub fn tag_is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    /// Direct child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Consume the element and yield its direct child elements.
    pub fn into_elements(self) -> impl Iterator<Item = Element> {
        self.children.into_iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }
}

/// A parsed document: the root element plus comments around it.
///
/// The XML declaration, processing instructions and DOCTYPE are not kept;
/// [`Document::to_xml_string`] always writes a fresh UTF-8 declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub leading: Vec<XmlNode>,
    pub root: Element,
    pub trailing: Vec<XmlNode>,
}

impl Document {
    /// Wrap a root element into a document without surrounding comments.
    pub fn new(root: Element) -> Self {
        Self {
            leading: Vec::new(),
            root,
            trailing: Vec::new(),
        }
    }

    /// Parse raw file contents, decoding them according to the byte order
    /// mark or the `encoding` of the XML declaration (UTF-8 otherwise).
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, XmlError> {
        Self::parse(&decode(bytes)?)
    }

    /// Parse a complete document.
    ///
    /// Whitespace-only text is dropped since the writer re-indents the
    /// output; any other text is kept verbatim. Anything that is not a
    /// single well-formed root element is rejected.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut builder = TreeBuilder::default();

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(err) => {
                    return Err(XmlError::Xml(format!(
                        "{err} (near byte {})",
                        reader.buffer_position()
                    )))
                }
            };
            match event {
                Event::Start(e) => builder.open(element_from_start(&e)?),
                Event::Empty(e) => builder.attach(element_from_start(&e)?)?,
                Event::End(_) => builder.close()?,
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| XmlError::Xml(err.to_string()))?;
                    if !is_whitespace(&text) {
                        builder.content(XmlNode::Text(text.into_owned()))?;
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|err| XmlError::Xml(format!("invalid UTF-8 in CDATA: {err}")))?;
                    builder.content(XmlNode::CData(text))?;
                }
                Event::Comment(e) => {
                    builder.content(XmlNode::Comment(String::from_utf8_lossy(&e).into_owned()))?
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
            buf.clear();
        }

        builder.finish()
    }

    /// Serialize with an XML declaration and two-space indentation.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        )?;
        for node in &self.leading {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.trailing {
            write_node(&mut writer, node)?;
        }
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|err| XmlError::Xml(format!("invalid UTF-8: {err}")))
    }
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    leading: Vec<XmlNode>,
    root: Option<Element>,
    trailing: Vec<XmlNode>,
}

impl TreeBuilder {
    fn open(&mut self, element: Element) {
        self.stack.push(element);
    }

    fn close(&mut self) -> Result<(), XmlError> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| XmlError::Invalid("closing tag without matching start".into()))?;
        self.attach(element)
    }

    fn attach(&mut self, element: Element) -> Result<(), XmlError> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(XmlNode::Element(element));
            return Ok(());
        }
        if self.root.is_some() {
            return Err(XmlError::Invalid(format!(
                "second root element <{}>",
                element.name
            )));
        }
        self.root = Some(element);
        Ok(())
    }

    fn content(&mut self, node: XmlNode) -> Result<(), XmlError> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }
        match node {
            XmlNode::Comment(_) if self.root.is_none() => self.leading.push(node),
            XmlNode::Comment(_) => self.trailing.push(node),
            _ => return Err(XmlError::Invalid("content outside the root element".into())),
        }
        Ok(())
    }

    fn finish(self) -> Result<Document, XmlError> {
        if let Some(open) = self.stack.last() {
            return Err(XmlError::Invalid(format!("unclosed element <{}>", open.name)));
        }
        let root = self
            .root
            .ok_or_else(|| XmlError::Invalid("document has no root element".into()))?;
        Ok(Document {
            leading: self.leading,
            root,
            trailing: self.trailing,
        })
    }
}

fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn element_from_start(event: &BytesStart<'_>) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(event.name().as_ref()).into_owned());
    for attr in event.attributes() {
        let attr = attr.map_err(|err| XmlError::Xml(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Xml(err.to_string()))?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(element)
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|err| XmlError::Xml(err.to_string()))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), XmlError> {
    match node {
        XmlNode::Element(element) => write_element(writer, element),
        XmlNode::Text(text) => write_event(writer, Event::Text(BytesText::new(text))),
        XmlNode::CData(text) => write_event(writer, Event::CData(BytesCData::new(text.as_str()))),
        XmlNode::Comment(text) => {
            write_event(writer, Event::Comment(BytesText::from_escaped(text.as_str())))
        }
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }
    write_event(writer, Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_structure_and_attributes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <!-- vendor list -->
            <DataBase>
                <Device>
                    <ChipInfo Vendor="ST" Name="STM32F103C8" Core="JLINK_CORE_CORTEX_M3" />
                    <FlashBankInfo Name="Internal Flash" BaseAddr="0x08000000" />
                </Device>
                <Note>a &amp; b</Note>
            </DataBase>
        "#;
        let doc = Document::parse(xml).expect("parse");
        assert_eq!(doc.leading, vec![XmlNode::Comment(" vendor list ".into())]);
        assert_eq!(doc.root.name, "DataBase");
        let children: Vec<_> = doc.root.elements().collect();
        assert_eq!(children.len(), 2);
        let info = children[0].elements().next().expect("chip info");
        assert_eq!(info.attribute("Vendor"), Some("ST"));
        assert_eq!(info.attribute_ignore_case("NAME"), Some("STM32F103C8"));
        assert_eq!(children[1].children, vec![XmlNode::Text("a & b".into())]);
    }

    #[test]
    fn parse_strips_byte_order_mark() {
        let doc = Document::parse("\u{feff}<DataBase/>").expect("parse");
        assert_eq!(doc.root, Element::new("DataBase"));
    }

    #[test]
    fn rejects_malformed_documents() {
        for xml in [
            "",
            "<DataBase>",
            "<DataBase></Other>",
            "<a/><b/>",
            "stray <a/>",
            r#"<a x="1" x="2"/>"#,
            "<a><b></a>",
        ] {
            assert!(Document::parse(xml).is_err(), "accepted {xml:?}");
        }
    }

    #[test]
    fn writes_declaration_and_escapes() {
        let root = Element::new("DataBase").with_child(
            Element::new("Device")
                .with_attribute("Name", "A&B \"quoted\"")
                .with_child(Element::new("ChipInfo").with_attribute("Core", "M4")),
        );
        let text = Document::new(root.clone()).to_xml_string().expect("write");
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(text.contains("A&amp;B &quot;quoted&quot;"));
        assert!(text.contains("\n  <Device"));
        let reparsed = Document::parse(&text).expect("reparse");
        assert_eq!(reparsed.root, root);
    }

    #[test]
    fn text_content_is_not_trimmed() {
        let doc = Document::parse("<r>\n  <Note> a  b </Note>\n</r>").expect("parse");
        let note = doc.root.elements().next().expect("note");
        assert_eq!(note.children, vec![XmlNode::Text(" a  b ".into())]);
        let text = doc.to_xml_string().expect("write");
        assert!(text.contains("<Note> a  b </Note>"), "{text}");
    }

    #[test]
    fn parse_bytes_honours_declared_encoding() {
        let mut latin1 = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<DataBase><Device Name=\"".to_vec();
        latin1.extend_from_slice(&[b'A', 0xB5, b'C']);
        latin1.extend_from_slice(b"\"/></DataBase>");
        let doc = Document::parse_bytes(&latin1).expect("latin-1");
        let device = doc.root.elements().next().expect("device");
        assert_eq!(device.attribute("Name"), Some("A\u{b5}C"));

        // Output is always UTF-8 whatever the input was.
        let text = doc.to_xml_string().expect("write");
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(text.contains("A\u{b5}C"));
    }

    #[test]
    fn comments_cdata_and_text_survive_a_rewrite() {
        let xml = "<!--head--><r><!--inner--><s><![CDATA[x < y]]></s><t>1 &lt; 2</t></r><!--tail-->";
        let doc = Document::parse(xml).expect("parse");
        let reparsed = Document::parse(&doc.to_xml_string().expect("write")).expect("reparse");
        assert_eq!(reparsed, doc);
    }
}
