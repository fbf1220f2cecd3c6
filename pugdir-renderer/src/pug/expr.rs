//! Expression language used by `#{}`, `=`, attribute values, `if` and `each`.
//!
//! A small JavaScript-flavoured subset evaluated over `serde_json::Value`.
//! Evaluation never fails: unknown names and missing members yield `null`.

use serde_json::{Number, Value};

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "!", "<", ">", "+", "-", "*", "/", "%",
    "?", ":", ".", "[", "]", "(", ")", ",", "{", "}",
];

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                // `1.foo` is a member access, not a fraction.
                if chars[i] == '.' && !chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                    break;
                }
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| format!("invalid number `{text}`"))?;
            tokens.push(Token::Num(n));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            let mut out = String::new();
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err("unterminated string literal".to_string());
                };
                i += 1;
                match ch {
                    '\\' => {
                        let Some(&esc) = chars.get(i) else {
                            return Err("unterminated string literal".to_string());
                        };
                        i += 1;
                        out.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                    ch if ch == quote => break,
                    ch => out.push(ch),
                }
            }
            tokens.push(Token::Str(out));
            continue;
        }
        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }
        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        match PUNCTUATION.iter().find(|p| rest.starts_with(*p)) {
            Some(p) => {
                tokens.push(Token::Punct(*p));
                i += p.len();
            }
            None => return Err(format!("unexpected character `{c}`")),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser (precedence climbing)
// ---------------------------------------------------------------------------

/// Parse a complete expression; trailing tokens are an error.
pub(crate) fn parse_expr(src: &str) -> Result<Expr, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("expected an expression".to_string());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.ternary()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(format!("unexpected {} in expression", describe(tok))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Num(n) => format!("number `{n}`"),
        Token::Str(s) => format!("string \"{s}\""),
        Token::Ident(s) => format!("`{s}`"),
        Token::Punct(p) => format!("`{p}`"),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), String> {
        if self.eat(punct) {
            return Ok(());
        }
        match self.peek() {
            Some(tok) => Err(format!("expected `{punct}`, found {}", describe(tok))),
            None => Err(format!("expected `{punct}` before end of expression")),
        }
    }

    fn ternary(&mut self) -> Result<Expr, String> {
        let cond = self.binary(0)?;
        if self.eat("?") {
            let then = self.ternary()?;
            self.expect(":")?;
            let otherwise = self.ternary()?;
            return Ok(Expr::Conditional(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn binary_op(&self) -> Option<(BinOp, u8)> {
        let Some(Token::Punct(p)) = self.peek() else {
            return None;
        };
        let op = match *p {
            "||" => (BinOp::Or, 1),
            "&&" => (BinOp::And, 2),
            "==" => (BinOp::Eq, 3),
            "!=" => (BinOp::Ne, 3),
            "===" => (BinOp::StrictEq, 3),
            "!==" => (BinOp::StrictNe, 3),
            "<" => (BinOp::Lt, 4),
            ">" => (BinOp::Gt, 4),
            "<=" => (BinOp::Le, 4),
            ">=" => (BinOp::Ge, 4),
            "+" => (BinOp::Add, 5),
            "-" => (BinOp::Sub, 5),
            "*" => (BinOp::Mul, 6),
            "/" => (BinOp::Div, 6),
            "%" => (BinOp::Rem, 6),
            _ => return None,
        };
        Some(op)
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = self.binary_op() {
            if prec <= min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(prec)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat("+") {
            return self.unary();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                match self.tokens.get(self.pos).cloned() {
                    Some(Token::Ident(name)) => {
                        self.pos += 1;
                        expr = Expr::Member(Box::new(expr), name);
                    }
                    _ => return Err("expected a property name after `.`".to_string()),
                }
            } else if self.eat("[") {
                let index = self.ternary()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if matches!(self.peek(), Some(Token::Punct("("))) {
                return Err("function calls are not supported".to_string());
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let Some(tok) = self.tokens.get(self.pos).cloned() else {
            return Err("unexpected end of expression".to_string());
        };
        self.pos += 1;
        match tok {
            Token::Num(n) => Ok(Expr::Literal(number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Ident(name),
            }),
            Token::Punct("(") => {
                let inner = self.ternary()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => {
                let mut items = Vec::new();
                if !self.eat("]") {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat("]") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::Punct("{") => Err("object literals are not supported".to_string()),
            other => Err(format!("unexpected {}", describe(&other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Name lookup used while evaluating.
pub(crate) trait Lookup {
    fn lookup(&self, name: &str) -> Value;
}

impl Expr {
    pub(crate) fn eval(&self, scope: &dyn Lookup) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Ident(name) => scope.lookup(name),
            Expr::Member(target, name) => member(&target.eval(scope), name),
            Expr::Index(target, index) => {
                let target = target.eval(scope);
                match index.eval(scope) {
                    Value::Number(n) => match (&target, n.as_f64()) {
                        (Value::Array(items), Some(f)) if f >= 0.0 && f.fract() == 0.0 => {
                            items.get(f as usize).cloned().unwrap_or(Value::Null)
                        }
                        (Value::String(s), Some(f)) if f >= 0.0 && f.fract() == 0.0 => s
                            .chars()
                            .nth(f as usize)
                            .map(|c| Value::String(c.to_string()))
                            .unwrap_or(Value::Null),
                        _ => member(&target, &n.to_string()),
                    },
                    key => member(&target, &to_text(&key)),
                }
            }
            Expr::Array(items) => Value::Array(items.iter().map(|e| e.eval(scope)).collect()),
            Expr::Not(inner) => Value::Bool(!truthy(&inner.eval(scope))),
            Expr::Neg(inner) => number(-to_number(&inner.eval(scope))),
            Expr::Conditional(cond, then, otherwise) => {
                if truthy(&cond.eval(scope)) {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                let l = lhs.eval(scope);
                if truthy(&l) {
                    l
                } else {
                    rhs.eval(scope)
                }
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                let l = lhs.eval(scope);
                if truthy(&l) {
                    rhs.eval(scope)
                } else {
                    l
                }
            }
            Expr::Binary(op, lhs, rhs) => binary(*op, lhs.eval(scope), rhs.eval(scope)),
        }
    }
}

fn member(target: &Value, name: &str) -> Value {
    match (target, name) {
        (Value::Array(items), "length") => Value::from(items.len()),
        (Value::String(s), "length") => Value::from(s.chars().count()),
        (Value::Object(map), key) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Value {
    match op {
        BinOp::Eq => Value::Bool(loose_eq(&l, &r)),
        BinOp::Ne => Value::Bool(!loose_eq(&l, &r)),
        BinOp::StrictEq => Value::Bool(strict_eq(&l, &r)),
        BinOp::StrictNe => Value::Bool(!strict_eq(&l, &r)),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => to_number(&l).partial_cmp(&to_number(&r)),
            };
            let result = match ordering {
                Some(ord) => match op {
                    BinOp::Lt => ord.is_lt(),
                    BinOp::Gt => ord.is_gt(),
                    BinOp::Le => ord.is_le(),
                    _ => ord.is_ge(),
                },
                None => false,
            };
            Value::Bool(result)
        }
        BinOp::Add => match (&l, &r) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", to_text(&l), to_text(&r)))
            }
            _ => number(to_number(&l) + to_number(&r)),
        },
        BinOp::Sub => number(to_number(&l) - to_number(&r)),
        BinOp::Mul => number(to_number(&l) * to_number(&r)),
        BinOp::Div => number(to_number(&l) / to_number(&r)),
        BinOp::Rem => number(to_number(&l) % to_number(&r)),
        BinOp::Or | BinOp::And => unreachable!("short-circuit operators are evaluated lazily"),
    }
}

/// `===`: same type and same value.
fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}

/// `==`: JavaScript abstract equality. Missing values are `null`, so
/// `null == undefined` holds trivially.
fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(_), _) => loose_eq(&number(to_number(l)), r),
        (_, Value::Bool(_)) => loose_eq(l, &number(to_number(r))),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            to_number(l) == to_number(r)
        }
        (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::String(_)) => {
            loose_eq(&to_primitive(l), r)
        }
        (Value::Number(_) | Value::String(_), Value::Array(_) | Value::Object(_)) => {
            loose_eq(l, &to_primitive(r))
        }
        _ => strict_eq(l, r),
    }
}

fn to_primitive(v: &Value) -> Value {
    match v {
        Value::Object(_) => Value::String("[object Object]".to_string()),
        other => Value::String(to_text(other)),
    }
}

/// Integral values stay integers so they print without a fraction.
pub(crate) fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn to_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// JavaScript truthiness.
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form used for output; `null` renders as nothing.
pub(crate) fn to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => v.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
