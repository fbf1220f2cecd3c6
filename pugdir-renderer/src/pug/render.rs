//! Walks parsed nodes and produces compact HTML.

use serde_json::{Map, Value};

use pugdir_core::Options;

use crate::error::CompileError;

use super::expr::{to_text, truthy, Lookup};
use super::parser::{Attr, Each, Element, Node, Segment, VOID_ELEMENTS};

/// Option key that selects the doctype (and terse mode) when the template
/// has no `doctype` line of its own.
pub(crate) const DOCTYPE_OPTION: &str = "doctype";

fn doctype_html(name: &str) -> String {
    match name {
        "html" => "<!DOCTYPE html>".to_string(),
        "xml" => r#"<?xml version="1.0" encoding="utf-8" ?>"#.to_string(),
        "transitional" => r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#.to_string(),
        "strict" => r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#.to_string(),
        "frameset" => r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Frameset//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd">"#.to_string(),
        "1.1" => r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#.to_string(),
        "basic" => r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML Basic 1.1//EN" "http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd">"#.to_string(),
        "mobile" => r#"<!DOCTYPE html PUBLIC "-//WAPFORUM//DTD XHTML Mobile 1.2//EN" "http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd">"#.to_string(),
        "plist" => r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#.to_string(),
        other => format!("<!DOCTYPE {other}>"),
    }
}

/// Escape `& < > "` for text and attribute output.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

/// Render `nodes` with `config` as the root variable scope.
pub(crate) fn render(nodes: &[Node], config: &Options) -> Result<String, CompileError> {
    let doctype = nodes.iter().find_map(|n| match n {
        Node::Doctype(name) => Some(name.clone()),
        _ => None,
    });
    let doctype = doctype.or_else(|| config.get(DOCTYPE_OPTION).map(to_text));

    let mut renderer = Renderer {
        out: String::new(),
        terse: doctype.as_deref() == Some("html"),
        scope: Scope {
            root: config,
            frames: Vec::new(),
        },
    };
    renderer.block(nodes)?;
    Ok(renderer.out)
}

struct Scope<'a> {
    root: &'a Options,
    frames: Vec<Map<String, Value>>,
}

impl Lookup for Scope<'_> {
    fn lookup(&self, name: &str) -> Value {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.root.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

struct Renderer<'a> {
    out: String,
    terse: bool,
    scope: Scope<'a>,
}

impl Renderer<'_> {
    fn block(&mut self, nodes: &[Node]) -> Result<(), CompileError> {
        let mut prev_text = false;
        for node in nodes {
            let is_text = matches!(node, Node::Text(_));
            if is_text && prev_text {
                self.out.push('\n');
            }
            self.node(node)?;
            prev_text = is_text;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Doctype(name) => self.out.push_str(&doctype_html(name)),
            Node::Element(el) => self.element(el)?,
            Node::Text(segments) => self.segments(segments)?,
            Node::Comment(body) => {
                self.out.push_str("<!--");
                self.out.push_str(body);
                self.out.push_str("-->");
            }
            Node::Code { expr, escape } => {
                let text = to_text(&expr.eval(&self.scope));
                self.push_value(&text, *escape);
            }
            Node::If { branches } => {
                let taken = branches.iter().find(|b| match &b.cond {
                    Some(cond) => truthy(&cond.eval(&self.scope)),
                    None => true,
                });
                if let Some(branch) = taken {
                    self.block(&branch.body)?;
                }
            }
            Node::Each(each) => self.each(each)?,
            Node::Fragment(nodes) => self.block(nodes)?,
        }
        Ok(())
    }

    fn push_value(&mut self, text: &str, escape: bool) {
        if escape {
            self.out.push_str(&escape_html(text));
        } else {
            self.out.push_str(text);
        }
    }

    fn segments(&mut self, segments: &[Segment]) -> Result<(), CompileError> {
        for segment in segments {
            match segment {
                Segment::Literal(text) => self.out.push_str(text),
                Segment::Interp { expr, escape } => {
                    let text = to_text(&expr.eval(&self.scope));
                    self.push_value(&text, *escape);
                }
                Segment::Tag(el) => self.element(el)?,
            }
        }
        Ok(())
    }

    fn each(&mut self, each: &Each) -> Result<(), CompileError> {
        let items: Vec<(Value, Value)> = match each.iterable.eval(&self.scope) {
            Value::Null => Vec::new(),
            Value::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (v, Value::from(i)))
                .collect(),
            Value::Object(map) => map.into_iter().map(|(k, v)| (v, Value::String(k))).collect(),
            Value::String(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (Value::String(c.to_string()), Value::from(i)))
                .collect(),
            other => {
                return Err(CompileError::Render {
                    line: each.line,
                    message: format!("cannot iterate over {}", type_name(&other)),
                })
            }
        };

        if items.is_empty() {
            return self.block(&each.otherwise);
        }
        for (value, key) in items {
            let mut frame = Map::new();
            frame.insert(each.item.clone(), value);
            if let Some(key_name) = &each.key {
                frame.insert(key_name.clone(), key);
            }
            self.scope.frames.push(frame);
            let result = self.block(&each.body);
            self.scope.frames.pop();
            result?;
        }
        Ok(())
    }

    fn element(&mut self, el: &Element) -> Result<(), CompileError> {
        self.out.push('<');
        self.out.push_str(&el.name);
        self.attributes(&el.attrs);

        let void = VOID_ELEMENTS.contains(&el.name.as_str());
        if el.self_closing {
            self.out.push_str("/>");
            return Ok(());
        }
        if void {
            self.out.push_str(if self.terse { ">" } else { "/>" });
            return Ok(());
        }

        self.out.push('>');
        self.block(&el.children)?;
        self.out.push_str("</");
        self.out.push_str(&el.name);
        self.out.push('>');
        Ok(())
    }

    fn attributes(&mut self, attrs: &[Attr]) {
        let mut classes: Vec<String> = Vec::new();
        let mut escape_classes = false;
        let mut class_at: Option<usize> = None;
        let mut rendered: Vec<String> = Vec::new();

        for attr in attrs {
            let value = attr.value.eval(&self.scope);
            if attr.name == "class" {
                class_at.get_or_insert(rendered.len());
                escape_classes |= attr.escape;
                collect_classes(&value, &mut classes);
                continue;
            }
            match value {
                Value::Null | Value::Bool(false) => {}
                Value::Bool(true) if self.terse => rendered.push(format!(" {}", attr.name)),
                Value::Bool(true) => rendered.push(format!(" {0}=\"{0}\"", attr.name)),
                other => {
                    let text = to_text(&other);
                    let text = if attr.escape { escape_html(&text) } else { text };
                    rendered.push(format!(" {}=\"{}\"", attr.name, text));
                }
            }
        }

        if let Some(pos) = class_at.filter(|_| !classes.is_empty()) {
            let joined = classes.join(" ");
            let joined = if escape_classes { escape_html(&joined) } else { joined };
            rendered.insert(pos, format!(" class=\"{joined}\""));
        }
        for attr in rendered {
            self.out.push_str(&attr);
        }
    }
}

fn collect_classes(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_classes(item, out);
            }
        }
        Value::Object(map) => {
            out.extend(map.iter().filter(|(_, v)| truthy(v)).map(|(k, _)| k.clone()));
        }
        v if truthy(v) => out.push(to_text(v)),
        _ => {}
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
