//! Minimal XML writer for the documents this layer produces itself.

use std::borrow::Cow;

/// Escape text or attribute content.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Appends elements to a byte buffer, optionally indented.
pub struct XmlWriter<'a> {
    out: &'a mut Vec<u8>,
    pretty: bool,
    depth: usize,
}

impl<'a> XmlWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>, pretty: bool) -> Self {
        Self { out, pretty, depth: 0 }
    }

    fn indent(&mut self) {
        if self.pretty {
            if !self.out.is_empty() {
                self.out.push(b'\n');
            }
            self.out.extend(std::iter::repeat(b' ').take(self.depth * 2));
        }
    }

    /// `<name xmlns="namespace">`
    pub fn start(&mut self, name: &str, namespace: Option<&str>) {
        self.indent();
        self.out.push(b'<');
        self.out.extend_from_slice(name.as_bytes());
        if let Some(namespace) = namespace {
            self.out.extend_from_slice(b" xmlns=\"");
            self.out.extend_from_slice(escape(namespace).as_bytes());
            self.out.push(b'"');
        }
        self.out.push(b'>');
        self.depth += 1;
    }

    pub fn end(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.close_tag(name);
    }

    fn close_tag(&mut self, name: &str) {
        self.out.extend_from_slice(b"</");
        self.out.extend_from_slice(name.as_bytes());
        self.out.push(b'>');
    }

    /// `<name>text</name>` on one line.
    pub fn leaf(&mut self, name: &str, namespace: Option<&str>, text: &str) {
        self.start(name, namespace);
        self.depth -= 1;
        self.out.extend_from_slice(escape(text).as_bytes());
        self.close_tag(name);
    }

    /// `<name/>`
    pub fn empty(&mut self, name: &str, namespace: Option<&str>) {
        self.indent();
        self.out.push(b'<');
        self.out.extend_from_slice(name.as_bytes());
        if let Some(namespace) = namespace {
            self.out.extend_from_slice(b" xmlns=\"");
            self.out.extend_from_slice(escape(namespace).as_bytes());
            self.out.push(b'"');
        }
        self.out.extend_from_slice(b"/>");
    }
}
