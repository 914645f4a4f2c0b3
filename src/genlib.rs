//! GENLIB technology file reader
//!
//! ```text
//! GATE nand2 2.0 O=!(a*b);
//! PIN * INV 1 999 1.0 0.2 1.0 0.2
//! ```
//!
//! Expressions use `+` or `|` for OR, `^` for XOR, `*`, `&` or juxtaposition
//! for AND, prefix `!` or postfix `'` for NOT, and `CONST0`/`CONST1`.

use crate::error::{Error, Result};
use crate::library::{Gate, Pin, PinPhase};
use crate::truth_table::{TruthTable, MAX_VARS};
use std::io::Read;

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Var(usize),
    Const(bool),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn evaluate(&self, num_vars: u32) -> TruthTable {
        match self {
            Expr::Var(i) => TruthTable::nth_var(num_vars, *i as u32),
            Expr::Const(false) => TruthTable::new(num_vars),
            Expr::Const(true) => TruthTable::const1(num_vars),
            Expr::Not(e) => !e.evaluate(num_vars),
            Expr::And(a, b) => a.evaluate(num_vars) & b.evaluate(num_vars),
            Expr::Or(a, b) => a.evaluate(num_vars) | b.evaluate(num_vars),
            Expr::Xor(a, b) => a.evaluate(num_vars) ^ b.evaluate(num_vars),
        }
    }
}

struct ExprParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    variables: Vec<String>,
}

impl<'a> ExprParser<'a> {
    fn new(text: &'a str) -> ExprParser<'a> {
        ExprParser {
            chars: text.chars().peekable(),
            variables: vec![],
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().map_or(false, |c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().copied()
    }

    fn parse(mut self) -> std::result::Result<(Expr, Vec<String>), String> {
        let expr = self.parse_or()?;
        match self.peek() {
            None => Ok((expr, self.variables)),
            Some(c) => Err(format!("unexpected '{}' in expression", c)),
        }
    }

    fn parse_or(&mut self) -> std::result::Result<Expr, String> {
        let mut expr = self.parse_xor()?;
        while matches!(self.peek(), Some('+') | Some('|')) {
            self.chars.next();
            expr = Expr::Or(Box::new(expr), Box::new(self.parse_xor()?));
        }
        Ok(expr)
    }

    fn parse_xor(&mut self) -> std::result::Result<Expr, String> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some('^') {
            self.chars.next();
            expr = Expr::Xor(Box::new(expr), Box::new(self.parse_and()?));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> std::result::Result<Expr, String> {
        let mut expr = self.parse_unary()?;
        loop {
            match self.peek() {
                Some('*') | Some('&') => {
                    self.chars.next();
                }
                Some(c) if c == '!' || c == '(' || is_identifier_char(c) => {}
                _ => break,
            }
            expr = Expr::And(Box::new(expr), Box::new(self.parse_unary()?));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> std::result::Result<Expr, String> {
        let mut expr = match self.peek() {
            Some('!') => {
                self.chars.next();
                Expr::Not(Box::new(self.parse_unary()?))
            }
            Some('(') => {
                self.chars.next();
                let expr = self.parse_or()?;
                if self.peek() != Some(')') {
                    return Err("missing ')'".to_string());
                }
                self.chars.next();
                expr
            }
            Some(c) if is_identifier_char(c) => {
                let mut name = String::new();
                while let Some(c) = self.chars.peek().copied().filter(|c| is_identifier_char(*c)) {
                    name.push(c);
                    self.chars.next();
                }
                match name.as_str() {
                    "CONST0" => Expr::Const(false),
                    "CONST1" => Expr::Const(true),
                    _ => {
                        let index = match self.variables.iter().position(|v| *v == name) {
                            Some(index) => index,
                            None => {
                                self.variables.push(name);
                                self.variables.len() - 1
                            }
                        };
                        Expr::Var(index)
                    }
                }
            }
            Some(c) => return Err(format!("unexpected '{}' in expression", c)),
            None => return Err("unexpected end of expression".to_string()),
        };

        while self.peek() == Some('\'') {
            self.chars.next();
            expr = Expr::Not(Box::new(expr));
        }
        Ok(expr)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '[' || c == ']' || c == '.'
}

fn error(line: usize, message: impl Into<String>) -> Error {
    Error::Genlib {
        line,
        message: message.into(),
    }
}

struct Tokens<'a> {
    tokens: Vec<(usize, &'a str)>,
    position: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Tokens<'a> {
        let mut tokens = vec![];
        for (i, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("");
            tokens.extend(line.split_whitespace().map(|t| (i + 1, t)));
        }
        Tokens { tokens, position: 0 }
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map_or(0, |(line, _)| *line)
    }

    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.position).map(|(_, t)| *t);
        self.position += 1;
        token
    }

    fn expect(&mut self, what: &str) -> Result<&'a str> {
        let line = self.line();
        self.next()
            .ok_or_else(|| error(line, format!("expected {}", what)))
    }

    fn number(&mut self, what: &str) -> Result<f32> {
        let line = self.line();
        let token = self.expect(what)?;
        token
            .parse()
            .map_err(|_| error(line, format!("invalid {} '{}'", what, token)))
    }
}

struct PendingGate {
    line: usize,
    name: String,
    area: f32,
    output_name: String,
    expression: String,
    pins: Vec<Pin>,
}

impl PendingGate {
    fn finish(self, id: u32) -> Result<Gate> {
        let (expr, variables) = ExprParser::new(&self.expression)
            .parse()
            .map_err(|message| error(self.line, message))?;

        let wildcard = self.pins.len() == 1 && self.pins[0].name == "*";
        let pins = if wildcard {
            variables
                .iter()
                .map(|name| Pin {
                    name: name.clone(),
                    ..self.pins[0].clone()
                })
                .collect::<Vec<_>>()
        } else {
            self.pins
        };

        if pins.len() as u32 > MAX_VARS {
            return Err(error(self.line, format!("gate {} has too many pins", self.name)));
        }

        // Renumber expression variables to pin order
        let mut mapping = vec![0; variables.len()];
        for (i, name) in variables.iter().enumerate() {
            match pins.iter().position(|p| p.name == *name) {
                Some(pin) => mapping[i] = pin,
                None => {
                    return Err(error(
                        self.line,
                        format!("gate {} uses '{}' which is not a pin", self.name, name),
                    ))
                }
            }
        }
        let function = renumber(&expr, &mapping).evaluate(pins.len() as u32);

        Ok(Gate {
            id,
            name: self.name,
            output_name: self.output_name,
            expression: self.expression,
            function,
            area: self.area,
            pins,
        })
    }
}

fn renumber(expr: &Expr, mapping: &[usize]) -> Expr {
    let r = |e: &Expr| Box::new(renumber(e, mapping));
    match expr {
        Expr::Var(i) => Expr::Var(mapping[*i]),
        Expr::Const(c) => Expr::Const(*c),
        Expr::Not(e) => Expr::Not(r(e)),
        Expr::And(a, b) => Expr::And(r(a), r(b)),
        Expr::Or(a, b) => Expr::Or(r(a), r(b)),
        Expr::Xor(a, b) => Expr::Xor(r(a), r(b)),
    }
}

fn parse_phase(line: usize, token: &str) -> Result<PinPhase> {
    match token {
        "INV" => Ok(PinPhase::Inverting),
        "NONINV" => Ok(PinPhase::NonInverting),
        "UNKNOWN" => Ok(PinPhase::Unknown),
        _ => Err(error(line, format!("invalid pin phase '{}'", token))),
    }
}

/// Parses GENLIB text into gates, numbered in file order.
pub fn parse_genlib(text: &str) -> Result<Vec<Gate>> {
    let mut tokens = Tokens::new(text);
    let mut gates = vec![];
    let mut pending: Option<PendingGate> = None;

    while let Some(keyword) = tokens.next() {
        let line = tokens.tokens[tokens.position - 1].0;
        match keyword {
            "GATE" => {
                if let Some(gate) = pending.take() {
                    gates.push(gate.finish(gates.len() as u32)?);
                }

                let name = tokens.expect("gate name")?.to_string();
                let area = tokens.number("area")?;
                let mut statement = String::new();
                loop {
                    let token = tokens.expect("';' after the gate function")?;
                    statement.push_str(token);
                    statement.push(' ');
                    if token.ends_with(';') {
                        break;
                    }
                }

                let statement = statement.trim().trim_end_matches(';');
                let (output_name, expression) = statement
                    .split_once('=')
                    .ok_or_else(|| error(line, "expected '<output>=<function>'"))?;
                pending = Some(PendingGate {
                    line,
                    name,
                    area,
                    output_name: output_name.trim().to_string(),
                    expression: expression.trim().to_string(),
                    pins: vec![],
                });
            }
            "PIN" => {
                let gate = pending
                    .as_mut()
                    .ok_or_else(|| error(line, "PIN outside of a gate"))?;
                let name = tokens.expect("pin name")?.to_string();
                let phase = parse_phase(line, tokens.expect("pin phase")?)?;
                let pin = Pin {
                    name,
                    phase,
                    input_load: tokens.number("input load")?,
                    max_load: tokens.number("max load")?,
                    rise_block_delay: tokens.number("rise block delay")?,
                    rise_fanout_delay: tokens.number("rise fanout delay")?,
                    fall_block_delay: tokens.number("fall block delay")?,
                    fall_fanout_delay: tokens.number("fall fanout delay")?,
                };
                gate.pins.push(pin);
            }
            other => return Err(error(line, format!("unexpected '{}'", other))),
        }
    }

    if let Some(gate) = pending.take() {
        gates.push(gate.finish(gates.len() as u32)?);
    }
    Ok(gates)
}

pub fn read_genlib<R: Read>(mut reader: R) -> Result<Vec<Gate>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_genlib(&text)
}
