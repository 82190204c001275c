//! Minimal XML element tree and renderer for snapshot documents.
//!
//! The snapshot is assembled as a tagged tree and rendered by this one
//! formatter, so child ordering, attribute ordering and indentation are a
//! single code path that tests can pin down.

pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

pub struct XmlElement {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn maybe_child(self, child: Option<XmlElement>) -> Self {
        match child {
            Some(c) => self.child(c),
            None => self,
        }
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(value.into()));
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, 0);
        out
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape(v));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }

        let text_only = self
            .children
            .iter()
            .all(|c| matches!(c, XmlNode::Text(_)));
        if text_only {
            out.push('>');
            for c in &self.children {
                if let XmlNode::Text(t) = c {
                    out.push_str(&escape(t));
                }
            }
            out.push_str("</");
            out.push_str(&self.name);
            out.push('>');
            return;
        }

        out.push('>');
        for c in &self.children {
            out.push('\n');
            match c {
                XmlNode::Element(e) => e.write(out, depth + 1),
                XmlNode::Text(t) => {
                    out.push_str(&"  ".repeat(depth + 1));
                    out.push_str(&escape(t));
                }
            }
        }
        out.push('\n');
        out.push_str(&indent);
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_only_element_self_closes() {
        let el = XmlElement::new("bid").attr("price", "450.1000").attr("size", "5000");
        assert_eq!(el.render(), r#"<bid price="450.1000" size="5000" />"#);
    }

    #[test]
    fn text_element_renders_inline() {
        let el = XmlElement::new("bid_lifts").text("10");
        assert_eq!(el.render(), "<bid_lifts>10</bid_lifts>");
    }

    #[test]
    fn nested_elements_indent_two_spaces() {
        let el = XmlElement::new("momentum")
            .child(XmlElement::new("last_10s").child(XmlElement::new("bid_price_change").text("0.1000")));
        assert_eq!(
            el.render(),
            "<momentum>\n  <last_10s>\n    <bid_price_change>0.1000</bid_price_change>\n  </last_10s>\n</momentum>"
        );
    }

    #[test]
    fn text_and_attrs_are_escaped() {
        let el = XmlElement::new("description")
            .attr("note", "a<b")
            .text("size \"large\" & growing");
        assert_eq!(
            el.render(),
            r#"<description note="a&lt;b">size &quot;large&quot; &amp; growing</description>"#
        );
    }
}
