//! Turns the indentation tree into template nodes.

use crate::error::CompileError;

use super::expr::{parse_expr, Expr};
use super::lines::Line;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Doctype(String),
    Element(Element),
    Text(Vec<Segment>),
    Comment(String),
    Code { expr: Expr, escape: bool },
    If { branches: Vec<Branch> },
    Each(Each),
    /// Siblings produced by one source line (literal HTML plus its children).
    Fragment(Vec<Node>),
}

/// One `if` / `else if` / `else` arm; `cond` is `None` for a bare `else`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Branch {
    pub cond: Option<Expr>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Each {
    pub line: usize,
    pub item: String,
    pub key: Option<String>,
    pub iterable: Expr,
    pub body: Vec<Node>,
    pub otherwise: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<Attr>,
    pub self_closing: bool,
    pub children: Vec<Node>,
}

/// An attribute in source order. Shorthand `#id` / `.class` become
/// literal-valued attributes at the position they were written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Attr {
    pub name: String,
    pub value: Expr,
    pub escape: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Interp { expr: Expr, escape: bool },
    /// `#[tag text]` inline element.
    Tag(Element),
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Elements that never have content or a closing tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "include", "extends", "block", "append", "prepend", "mixin", "yield", "case", "when",
    "default", "while",
];

fn syntax(line: usize, message: impl Into<String>) -> CompileError {
    CompileError::Syntax {
        line,
        message: message.into(),
    }
}

/// Parse a list of sibling lines into nodes, folding `else` arms into the
/// preceding `if` / `unless` / `each`.
pub(crate) fn parse_block(lines: &[Line]) -> Result<Vec<Node>, CompileError> {
    let mut nodes: Vec<Node> = Vec::new();
    for line in lines {
        if let Some(rest) = keyword_rest(&line.text, "else") {
            attach_else(&mut nodes, line, rest)?;
            continue;
        }
        if let Some(node) = parse_line(line)? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

fn attach_else(nodes: &mut [Node], line: &Line, rest: &str) -> Result<(), CompileError> {
    let body = parse_block(&line.children)?;
    let cond = match keyword_rest(rest, "if") {
        Some(expr) => Some(expression(expr, line.number)?),
        None if rest.is_empty() => None,
        None => return Err(syntax(line.number, format!("unexpected text after `else`: `{rest}`"))),
    };

    match nodes.last_mut() {
        Some(Node::If { branches }) => {
            if branches.last().is_some_and(|b| b.cond.is_none()) {
                return Err(syntax(line.number, "`else` after a final `else`"));
            }
            branches.push(Branch { cond, body });
            Ok(())
        }
        Some(Node::Each(each)) if cond.is_none() && each.otherwise.is_empty() => {
            each.otherwise = body;
            Ok(())
        }
        _ => Err(syntax(line.number, "`else` without a matching `if` or `each`")),
    }
}

/// `Some(rest)` when `text` is `keyword` alone or `keyword` followed by a space.
fn keyword_rest<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with([' ', '\t']) {
        Some(rest.trim())
    } else {
        None
    }
}

fn expression(src: &str, line: usize) -> Result<Expr, CompileError> {
    parse_expr(src.trim()).map_err(|message| syntax(line, message))
}

fn parse_line(line: &Line) -> Result<Option<Node>, CompileError> {
    let text = line.text.as_str();
    let number = line.number;

    if text.starts_with("//-") {
        return Ok(None);
    }
    if let Some(rest) = text.strip_prefix("//") {
        let mut body = rest.to_string();
        for child in line.children_as_text() {
            body.push('\n');
            body.push_str(&child);
        }
        return Ok(Some(Node::Comment(body)));
    }
    if let Some(rest) = keyword_rest(text, "doctype") {
        ensure_no_children(line, "doctype")?;
        let name = if rest.is_empty() { "html" } else { rest };
        return Ok(Some(Node::Doctype(name.to_string())));
    }
    if let Some(rest) = text.strip_prefix('|') {
        ensure_no_children(line, "piped text")?;
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        return Ok(Some(Node::Text(parse_interpolated(rest, number)?)));
    }
    if text.starts_with('<') {
        let mut nodes = vec![Node::Text(parse_interpolated(text, number)?)];
        nodes.extend(parse_block(&line.children)?);
        return Ok(Some(flatten(nodes)));
    }
    if let Some(rest) = text.strip_prefix("!=") {
        ensure_no_children(line, "buffered code")?;
        return Ok(Some(Node::Code {
            expr: expression(rest, number)?,
            escape: false,
        }));
    }
    if let Some(rest) = text.strip_prefix('=') {
        ensure_no_children(line, "buffered code")?;
        return Ok(Some(Node::Code {
            expr: expression(rest, number)?,
            escape: true,
        }));
    }
    if text.starts_with('-') {
        return Err(syntax(number, "unbuffered code (`- ...`) is not supported"));
    }
    if text.starts_with('+') {
        return Err(syntax(number, "mixin calls are not supported"));
    }
    if text.starts_with(':') {
        return Err(syntax(number, "filters are not supported"));
    }
    if let Some(rest) = keyword_rest(text, "if") {
        return Ok(Some(Node::If {
            branches: vec![Branch {
                cond: Some(expression(rest, number)?),
                body: parse_block(&line.children)?,
            }],
        }));
    }
    if let Some(rest) = keyword_rest(text, "unless") {
        return Ok(Some(Node::If {
            branches: vec![Branch {
                cond: Some(Expr::Not(Box::new(expression(rest, number)?))),
                body: parse_block(&line.children)?,
            }],
        }));
    }
    if let Some(rest) = keyword_rest(text, "each").or_else(|| keyword_rest(text, "for")) {
        return parse_each(line, rest).map(|each| Some(Node::Each(each)));
    }
    if let Some(keyword) = UNSUPPORTED_KEYWORDS
        .iter()
        .find(|kw| keyword_rest(text, kw).is_some())
    {
        return Err(syntax(number, format!("`{keyword}` is not supported")));
    }

    parse_tag(text, line).map(|el| Some(Node::Element(el)))
}

/// A literal-HTML line with children renders as consecutive siblings.
fn flatten(mut nodes: Vec<Node>) -> Node {
    if nodes.len() == 1 {
        if let Some(node) = nodes.pop() {
            return node;
        }
    }
    Node::Fragment(nodes)
}

fn ensure_no_children(line: &Line, what: &str) -> Result<(), CompileError> {
    match line.children.first() {
        Some(child) => Err(syntax(child.number, format!("{what} cannot have nested content"))),
        None => Ok(()),
    }
}

fn parse_each(line: &Line, rest: &str) -> Result<Each, CompileError> {
    let number = line.number;
    let Some((vars, iterable)) = rest.split_once(" in ") else {
        return Err(syntax(number, "expected `each <item>[, <key>] in <expression>`"));
    };
    let mut names = vars.split(',').map(str::trim);
    let item = names.next().unwrap_or_default().to_string();
    let key = names.next().map(str::to_string);
    if names.next().is_some() || !is_identifier(&item) || key.as_deref().is_some_and(|k| !is_identifier(k)) {
        return Err(syntax(number, format!("invalid loop variables `{}`", vars.trim())));
    }
    Ok(Each {
        line: number,
        item,
        key,
        iterable: expression(iterable, number)?,
        body: parse_block(&line.children)?,
        otherwise: Vec::new(),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

// ---------------------------------------------------------------------------
// Interpolated text
// ---------------------------------------------------------------------------

/// Split `text` into literal runs, `#{}` / `!{}` interpolations and `#[]`
/// inline tags.
pub(crate) fn parse_interpolated(text: &str, line: usize) -> Result<Vec<Segment>, CompileError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(pos) = rest.find(['#', '!', '\\']) {
        let (before, tail) = rest.split_at(pos);
        literal.push_str(before);

        if let Some(after) = tail.strip_prefix('\\') {
            if after.starts_with("#{") || after.starts_with("!{") || after.starts_with("#[") {
                literal.push_str(&after[..2]);
                rest = &after[2..];
            } else {
                literal.push('\\');
                rest = after;
            }
            continue;
        }

        if tail[1..].starts_with('{') {
            let escape = tail.starts_with('#');
            let body = &tail[2..];
            let end = matching_close(body, '{', '}')
                .ok_or_else(|| syntax(line, "unterminated interpolation, missing `}`"))?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Interp {
                expr: expression(&body[..end], line)?,
                escape,
            });
            rest = &body[end + 1..];
        } else if tail.starts_with("#[") {
            let body = &tail[2..];
            let end = matching_close(body, '[', ']')
                .ok_or_else(|| syntax(line, "unterminated tag interpolation, missing `]`"))?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Tag(inline_tag(&body[..end], line)?));
            rest = &body[end + 1..];
        } else {
            literal.push_str(&tail[..1]);
            rest = &tail[1..];
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Parse the inside of `#[...]` as a one-line tag.
fn inline_tag(src: &str, line: usize) -> Result<Element, CompileError> {
    let src = src.trim();
    if src.is_empty() {
        return Err(syntax(line, "empty tag interpolation `#[]`"));
    }
    let inner = Line {
        number: line,
        indent: 0,
        text: src.to_string(),
        children: Vec::new(),
    };
    parse_tag(src, &inner)
}

/// Byte offset of the `close` ending an interpolation body, honouring nested
/// pairs and quoted strings.
fn matching_close(body: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            c if c == open => depth += 1,
            c if c == close && depth == 0 => return Some(i),
            c if c == close => depth -= 1,
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn literal_attr(name: &str, value: &str) -> Attr {
    Attr {
        name: name.to_string(),
        value: Expr::Literal(serde_json::Value::String(value.to_string())),
        escape: false,
    }
}

fn parse_tag(text: &str, line: &Line) -> Result<Element, CompileError> {
    let number = line.number;
    let mut cur = Cursor { src: text, pos: 0 };

    let starts_shorthand =
        matches!(cur.peek(), Some('.' | '#')) && cur.peek_second().is_some_and(is_name_char);
    let name = if starts_shorthand {
        "div".to_string()
    } else {
        let raw = cur.take_while(|c| is_name_char(c) || c == ':');
        let trimmed = raw.trim_end_matches([':', '-']);
        cur.pos -= raw.len() - trimmed.len();
        if trimmed.is_empty() || !trimmed.starts_with(|c: char| c.is_alphabetic()) {
            return Err(syntax(number, format!("unexpected text `{text}`")));
        }
        trimmed.to_string()
    };

    let mut el = Element {
        name,
        attrs: Vec::new(),
        self_closing: false,
        children: Vec::new(),
    };

    // Shorthand and attribute lists, in any order.
    loop {
        match (cur.peek(), cur.peek_second()) {
            (Some('.'), Some(c)) if is_name_char(c) => {
                cur.bump();
                let class = cur.take_while(is_name_char);
                el.attrs.push(literal_attr("class", class));
            }
            (Some('#'), Some(c)) if is_name_char(c) => {
                cur.bump();
                let id = cur.take_while(is_name_char);
                el.attrs.push(literal_attr("id", id));
            }
            (Some('('), _) => {
                cur.bump();
                parse_attrs(&mut cur, &mut el.attrs, number)?;
            }
            _ => break,
        }
    }

    if cur.peek() == Some('/') {
        cur.bump();
        el.self_closing = true;
    }

    let tail = cur.rest();
    let mut inline: Vec<Node> = Vec::new();
    let mut children_are_text = false;

    if tail == "." {
        children_are_text = true;
    } else if let Some(rest) = tail.strip_prefix(": ") {
        let nested = Line {
            number,
            indent: line.indent,
            text: rest.trim_start().to_string(),
            children: line.children.clone(),
        };
        if let Some(node) = parse_line(&nested)? {
            el.children.push(node);
        }
        return finish(el, number);
    } else if let Some(rest) = tail.strip_prefix("!=") {
        inline.push(Node::Code {
            expr: expression(rest, number)?,
            escape: false,
        });
    } else if let Some(rest) = tail.strip_prefix('=') {
        inline.push(Node::Code {
            expr: expression(rest, number)?,
            escape: true,
        });
    } else if let Some(rest) = tail.strip_prefix(' ') {
        inline.push(Node::Text(parse_interpolated(rest, number)?));
    } else if !tail.is_empty() {
        return Err(syntax(number, format!("unexpected `{tail}` after tag `{}`", el.name)));
    }

    el.children = inline;
    if children_are_text {
        let body = line.children_as_text().join("\n");
        if !body.is_empty() {
            el.children.push(Node::Text(parse_interpolated(&body, number + 1)?));
        }
    } else {
        el.children.extend(parse_block(&line.children)?);
    }
    finish(el, number)
}

fn finish(el: Element, number: usize) -> Result<Element, CompileError> {
    if VOID_ELEMENTS.contains(&el.name.as_str()) && !el.children.is_empty() {
        return Err(syntax(
            number,
            format!("`{}` is a void element and cannot have content", el.name),
        ));
    }
    if el.self_closing && !el.children.is_empty() {
        return Err(syntax(
            number,
            format!("self-closing tag `{}` cannot have content", el.name),
        ));
    }
    Ok(el)
}

/// Parse `name=value, name2 name3!=value)` after the opening `(`.
fn parse_attrs(cur: &mut Cursor<'_>, attrs: &mut Vec<Attr>, number: usize) -> Result<(), CompileError> {
    loop {
        while cur.peek().is_some_and(|c| c == ' ' || c == '\t' || c == ',') {
            cur.bump();
        }
        match cur.peek() {
            None => return Err(syntax(number, "unterminated attribute list, missing `)`")),
            Some(')') => {
                cur.bump();
                return Ok(());
            }
            Some(_) => {}
        }

        let name = cur.take_while(|c| !matches!(c, '=' | '!' | ',' | ')' | ' ' | '\t'));
        if name.is_empty() {
            return Err(syntax(number, "expected an attribute name"));
        }
        let name = name.trim_matches(['"', '\'']).to_string();
        cur.skip_ws();

        let escape = if cur.rest().starts_with("!=") {
            cur.pos += 2;
            false
        } else if cur.peek() == Some('=') {
            cur.pos += 1;
            true
        } else {
            attrs.push(Attr {
                name,
                value: Expr::Literal(serde_json::Value::Bool(true)),
                escape: true,
            });
            continue;
        };

        cur.skip_ws();
        let raw = scan_attr_value(cur);
        if raw.trim().is_empty() {
            return Err(syntax(number, format!("missing value for attribute `{name}`")));
        }
        attrs.push(Attr {
            name,
            value: expression(raw, number)?,
            escape,
        });
    }
}

const OPERATOR_CHARS: &str = "+-*/%=!<>&|?:.";

/// Consume one attribute value. The value ends at a top-level `,` or `)`,
/// or at whitespace that is not adjacent to an operator.
fn scan_attr_value<'a>(cur: &mut Cursor<'a>) -> &'a str {
    let start = cur.pos;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = cur.peek() {
        if let Some(q) = quote {
            cur.bump();
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            ')' | ',' if depth == 0 => break,
            ' ' | '\t' if depth == 0 => {
                let before = cur.src[start..cur.pos].trim_end();
                let after = cur.rest().trim_start();
                let prev_op = before.chars().last().is_some_and(|p| OPERATOR_CHARS.contains(p));
                let next_op = after.chars().next().is_some_and(|n| OPERATOR_CHARS.contains(n))
                    && !after.starts_with("!=");
                if !(prev_op || next_op) {
                    break;
                }
            }
            _ => {}
        }
        cur.bump();
    }
    &cur.src[start..cur.pos]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
