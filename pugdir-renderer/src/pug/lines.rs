//! Indentation tree: groups source lines under their parent line.

use crate::error::CompileError;

/// One non-blank source line plus the lines indented beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    /// 1-based line number in the source.
    pub number: usize,
    /// Leading whitespace width (spaces and tabs count one each).
    pub indent: usize,
    /// Line content with indentation and trailing whitespace removed.
    pub text: String,
    pub children: Vec<Line>,
}

impl Line {
    /// Flatten the children back into text lines, re-indented relative to
    /// the first child. Used by text blocks and multi-line comments.
    pub fn children_as_text(&self) -> Vec<String> {
        let Some(first) = self.children.first() else {
            return Vec::new();
        };
        let base = first.indent;
        let mut out = Vec::new();
        for child in &self.children {
            push_text(child, base, &mut out);
        }
        out
    }
}

fn push_text(line: &Line, base: usize, out: &mut Vec<String>) {
    let pad = line.indent.saturating_sub(base);
    out.push(format!("{}{}", " ".repeat(pad), line.text));
    for child in &line.children {
        push_text(child, base, out);
    }
}

struct Frame {
    line: Line,
    child_indent: Option<usize>,
}

/// Build the indentation tree for `source`. Blank lines are dropped.
///
/// Siblings must share one indentation width; dedenting to a width that no
/// open ancestor uses is a syntax error.
pub(crate) fn build_tree(source: &str) -> Result<Vec<Line>, CompileError> {
    let mut roots: Vec<Line> = Vec::new();
    let mut root_indent: Option<usize> = None;
    let mut stack: Vec<Frame> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let content = raw.trim_start_matches([' ', '\t']);
        if content.trim().is_empty() {
            continue;
        }
        let indent = raw.len() - content.len();

        while stack.last().is_some_and(|f| f.indent() >= indent) {
            if let Some(frame) = stack.pop() {
                attach(&mut stack, &mut roots, frame.line);
            }
        }

        let slot = match stack.last_mut() {
            Some(frame) => &mut frame.child_indent,
            None => &mut root_indent,
        };
        match *slot {
            Some(expected) if expected != indent => {
                return Err(CompileError::Syntax {
                    line: number,
                    message: format!(
                        "inconsistent indentation: expected {expected} columns, found {indent}"
                    ),
                });
            }
            Some(_) => {}
            None => *slot = Some(indent),
        }

        stack.push(Frame {
            line: Line {
                number,
                indent,
                text: content.trim_end().to_string(),
                children: Vec::new(),
            },
            child_indent: None,
        });
    }

    while let Some(frame) = stack.pop() {
        attach(&mut stack, &mut roots, frame.line);
    }
    Ok(roots)
}

impl Frame {
    fn indent(&self) -> usize {
        self.line.indent
    }
}

fn attach(stack: &mut [Frame], roots: &mut Vec<Line>, line: Line) {
    match stack.last_mut() {
        Some(parent) => parent.line.children.push(line),
        None => roots.push(line),
    }
}
