// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Parser for vc2 assembly source.
//!
//! The parser walks the raw bytes of the source directly; no separate token
//! stream is materialized. Each call to [`Parser::next_line`] skips blank
//! lines and comments, then yields one parsed line carrying an optional label
//! and an optional instruction. Operand expressions are parsed with one
//! precedence-climbing routine per tier.

use std::fmt;

/// Error raised at the cursor position while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: usize,
}

/// One source line: a label, an instruction, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub instruction: Option<ParsedInstruction>,
    pub line_number: u32,
}

/// Operator mnemonic or directive name plus its operand expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    pub operator: String,
    pub operands: Vec<ParsedExpr>,
}

/// Operand expression tree. Each node owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedExpr {
    Ident(String),
    Int(i32),
    /// Memory dereference: `[expr]`.
    Address(Box<ParsedExpr>),
    Unary {
        op: UnaryOp,
        expr: Box<ParsedExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ParsedExpr>,
        right: Box<ParsedExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    Xor,
    And,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::And => "and",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
        })
    }
}

/// Parse a full source text into its line sequence.
pub fn parse_lines(text: &str) -> Result<Vec<ParsedLine>, ParseError> {
    Parser::new(text).collect()
}

pub struct Parser<'a> {
    text: &'a [u8],
    cursor: usize,
    line: u32,
    line_start: usize,
    failed: bool,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            text: text.as_bytes(),
            cursor: 0,
            line: 1,
            line_start: 0,
            failed: false,
        }
    }

    /// Yield the next parsed line, or `None` at end of input.
    pub fn next_line(&mut self) -> Result<Option<ParsedLine>, ParseError> {
        self.skip_blank();
        if self.done() {
            return Ok(None);
        }
        self.parse_line().map(Some)
    }

    fn parse_line(&mut self) -> Result<ParsedLine, ParseError> {
        let line_number = self.line;
        if !matches!(self.current(), Some(c) if is_name_start(c)) {
            return Err(self.error("expected label or instruction"));
        }
        let word = self.read_name();
        if self.current() == Some(b':') {
            self.step();
            self.skip_space();
            if self.at_line_end() {
                return Ok(ParsedLine {
                    label: Some(word),
                    instruction: None,
                    line_number,
                });
            }
            let instruction = self.parse_instruction(None)?;
            return Ok(ParsedLine {
                label: Some(word),
                instruction: Some(instruction),
                line_number,
            });
        }
        let instruction = self.parse_instruction(Some(word))?;
        Ok(ParsedLine {
            label: None,
            instruction: Some(instruction),
            line_number,
        })
    }

    fn parse_instruction(
        &mut self,
        operator: Option<String>,
    ) -> Result<ParsedInstruction, ParseError> {
        let operator = match operator {
            Some(operator) => operator,
            None => {
                if !matches!(self.current(), Some(c) if c == b'_' || c.is_ascii_alphabetic()) {
                    return Err(self.error("expected instruction operator"));
                }
                self.read_word()
            }
        };
        let mut operands = Vec::new();
        self.skip_space();
        if !self.at_line_end() {
            operands.push(self.parse_expr()?);
            loop {
                self.skip_space();
                if self.current() != Some(b',') {
                    break;
                }
                self.step();
                self.skip_space();
                operands.push(self.parse_expr()?);
            }
        }
        Ok(ParsedInstruction { operator, operands })
    }

    fn parse_expr(&mut self) -> Result<ParsedExpr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<ParsedExpr, ParseError> {
        self.parse_binary_tier(&[("|", BinaryOp::Or)], Self::parse_xor)
    }

    fn parse_xor(&mut self) -> Result<ParsedExpr, ParseError> {
        self.parse_binary_tier(&[("^", BinaryOp::Xor)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<ParsedExpr, ParseError> {
        self.parse_binary_tier(&[("&", BinaryOp::And)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<ParsedExpr, ParseError> {
        self.parse_binary_tier(
            &[("<<", BinaryOp::Shl), (">>", BinaryOp::Shr)],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<ParsedExpr, ParseError> {
        self.parse_binary_tier(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<ParsedExpr, ParseError> {
        self.parse_binary_tier(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    /// One left-associative tier: loop while the cursor matches one of this
    /// tier's lexemes, folding into `((a op b) op c)`.
    fn parse_binary_tier(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<ParsedExpr, ParseError>,
    ) -> Result<ParsedExpr, ParseError> {
        let mut left = next(self)?;
        'tier: loop {
            self.skip_space();
            if self.at_line_end() {
                break;
            }
            for (lexeme, op) in ops {
                if self.matches_lexeme(lexeme) {
                    self.advance(lexeme.len());
                    self.skip_space();
                    let right = next(self)?;
                    left = ParsedExpr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'tier;
                }
            }
            break;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ParsedExpr, ParseError> {
        let op = match self.current() {
            Some(b'-') => UnaryOp::Neg,
            Some(b'~') => UnaryOp::Not,
            _ => return self.parse_value(),
        };
        self.step();
        self.skip_space();
        let expr = self.parse_unary()?;
        Ok(ParsedExpr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_value(&mut self) -> Result<ParsedExpr, ParseError> {
        match self.current() {
            Some(c) if is_name_start(c) => Ok(ParsedExpr::Ident(self.read_name())),
            Some(c) if (b'1'..=b'9').contains(&c) => self.parse_decimal(),
            Some(b'0') => {
                self.step();
                match self.current() {
                    Some(b'b') => {
                        self.step();
                        self.parse_radix_digits(2)
                    }
                    Some(b'x') => {
                        self.step();
                        self.parse_radix_digits(16)
                    }
                    _ => Ok(ParsedExpr::Int(0)),
                }
            }
            Some(b'(') => {
                self.step();
                self.skip_space();
                let value = self.parse_expr()?;
                if self.current() != Some(b')') {
                    return Err(self.error("expected ')'"));
                }
                self.step();
                Ok(value)
            }
            Some(b'[') => {
                self.step();
                self.skip_space();
                let value = self.parse_expr()?;
                if self.current() != Some(b']') {
                    return Err(self.error("expected ']'"));
                }
                self.step();
                Ok(ParsedExpr::Address(Box::new(value)))
            }
            Some(c) => Err(self.error(&format!("expected value, got '{}'", c as char))),
            None => Err(self.error("expected value")),
        }
    }

    fn parse_decimal(&mut self) -> Result<ParsedExpr, ParseError> {
        let mut digits = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_digit() || c == b'_' {
                if c != b'_' {
                    digits.push(c as char);
                }
                self.step();
            } else {
                break;
            }
        }
        let value = digits
            .parse::<i64>()
            .map_err(|_| self.error("malformed literal"))?;
        Ok(ParsedExpr::Int(value as i32))
    }

    /// Digit run after a `0b`/`0x` prefix. The whole alphanumeric run is
    /// consumed so a stray letter inside the literal is caught here instead
    /// of leaking into the surrounding expression.
    fn parse_radix_digits(&mut self, radix: u32) -> Result<ParsedExpr, ParseError> {
        let mut digits = String::new();
        let mut malformed = false;
        while let Some(c) = self.current() {
            let in_radix = match radix {
                2 => c == b'0' || c == b'1',
                _ => c.is_ascii_hexdigit(),
            };
            if in_radix || c == b'_' {
                if c != b'_' {
                    digits.push(c as char);
                }
                self.step();
            } else if radix == 16 && (c.is_ascii_alphanumeric() || c == b'_') {
                malformed = true;
                self.step();
            } else {
                break;
            }
        }
        if malformed || digits.is_empty() {
            return Err(self.error("malformed literal"));
        }
        let value =
            i64::from_str_radix(&digits, radix).map_err(|_| self.error("malformed literal"))?;
        Ok(ParsedExpr::Int(value as i32))
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.current() {
            if is_name_char(c) {
                name.push(c as char);
                self.step();
            } else {
                break;
            }
        }
        name
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.current() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                word.push(c as char);
                self.step();
            } else {
                break;
            }
        }
        word
    }

    fn skip_blank(&mut self) {
        loop {
            match self.current() {
                Some(b';') => {
                    while !self.done() && self.current() != Some(b'\n') {
                        self.step();
                    }
                }
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.step(),
                _ => break,
            }
        }
    }

    fn skip_space(&mut self) {
        while matches!(self.current(), Some(b' ' | b'\t')) {
            self.step();
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current(), None | Some(b'\r' | b'\n' | b';'))
    }

    fn matches_lexeme(&self, lexeme: &str) -> bool {
        self.text[self.cursor..].starts_with(lexeme.as_bytes())
    }

    fn advance(&mut self, count: usize) {
        for _ in 0..count {
            self.step();
        }
    }

    fn step(&mut self) {
        if self.current() == Some(b'\n') {
            self.line += 1;
            self.line_start = self.cursor + 1;
        }
        self.cursor += 1;
    }

    fn current(&self) -> Option<u8> {
        self.text.get(self.cursor).copied()
    }

    fn done(&self) -> bool {
        self.cursor >= self.text.len()
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            line: self.line,
            column: self.cursor - self.line_start + 1,
        }
    }
}

impl Iterator for Parser<'_> {
    type Item = Result<ParsedLine, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn is_name_start(c: u8) -> bool {
    c == b'.' || c == b'_' || c.is_ascii_alphabetic()
}

fn is_name_char(c: u8) -> bool {
    c == b'.' || c == b'_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(text: &str) -> ParsedLine {
        let lines = parse_lines(text).expect("parse");
        assert_eq!(lines.len(), 1, "expected one line from {text:?}");
        lines.into_iter().next().unwrap()
    }

    fn operand(text: &str) -> ParsedExpr {
        let line = parse_one(&format!("dw {text}"));
        let mut instruction = line.instruction.expect("instruction");
        assert_eq!(instruction.operands.len(), 1);
        instruction.operands.pop().unwrap()
    }

    fn int(value: i32) -> ParsedExpr {
        ParsedExpr::Int(value)
    }

    fn binary(op: BinaryOp, left: ParsedExpr, right: ParsedExpr) -> ParsedExpr {
        ParsedExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn parses_label_only_line() {
        let line = parse_one("main:");
        assert_eq!(line.label.as_deref(), Some("main"));
        assert!(line.instruction.is_none());
        assert_eq!(line.line_number, 1);
    }

    #[test]
    fn parses_label_with_instruction_on_same_line() {
        let line = parse_one("main: nop");
        assert_eq!(line.label.as_deref(), Some("main"));
        assert_eq!(line.instruction.unwrap().operator, "nop");
    }

    #[test]
    fn parses_sub_label() {
        let line = parse_one(".loop:");
        assert_eq!(line.label.as_deref(), Some(".loop"));
    }

    #[test]
    fn parses_label_before_comment() {
        let line = parse_one("main: ; entry point");
        assert_eq!(line.label.as_deref(), Some("main"));
        assert!(line.instruction.is_none());
    }

    #[test]
    fn parses_instruction_operands() {
        let line = parse_one("mov r0, 16");
        let instruction = line.instruction.unwrap();
        assert_eq!(instruction.operator, "mov");
        assert_eq!(
            instruction.operands,
            vec![ParsedExpr::Ident("r0".to_string()), int(16)]
        );
    }

    #[test]
    fn tracks_line_numbers_across_comments_and_blanks() {
        let lines = parse_lines("nop\n\n; comment\n  hlt\n").expect("parse");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_number, 1);
        assert_eq!(lines[1].line_number, 4);
    }

    #[test]
    fn parses_integer_literals() {
        assert_eq!(operand("0"), int(0));
        assert_eq!(operand("42"), int(42));
        assert_eq!(operand("1_000"), int(1000));
        assert_eq!(operand("0x10"), int(16));
        assert_eq!(operand("0xff_ff"), int(0xffff));
        assert_eq!(operand("0b1010_1010"), int(0xaa));
        assert_eq!(operand("0xffffffff"), int(-1));
    }

    #[test]
    fn rejects_malformed_literals() {
        for text in ["dw 0x", "dw 0b", "dw 0b_", "dw 0xfg", "dw 0x_"] {
            let err = parse_lines(text).unwrap_err();
            assert_eq!(err.message, "malformed literal", "for {text:?}");
        }
    }

    #[test]
    fn precedence_orders_tiers() {
        // 1|2^3&4<<1+2*3 == or(1, xor(2, and(3, shl(4, add(1, mul(2, 3))))))
        let expected = binary(
            BinaryOp::Or,
            int(1),
            binary(
                BinaryOp::Xor,
                int(2),
                binary(
                    BinaryOp::And,
                    int(3),
                    binary(
                        BinaryOp::Shl,
                        int(4),
                        binary(BinaryOp::Add, int(1), binary(BinaryOp::Mul, int(2), int(3))),
                    ),
                ),
            ),
        );
        assert_eq!(operand("1|2^3&4<<1+2*3"), expected);
    }

    #[test]
    fn binary_tiers_are_left_associative() {
        let expected = binary(
            BinaryOp::Sub,
            binary(BinaryOp::Sub, int(10), int(2)),
            int(3),
        );
        assert_eq!(operand("10 - 2 - 3"), expected);
    }

    #[test]
    fn parentheses_override_precedence() {
        let expected = binary(BinaryOp::Mul, binary(BinaryOp::Add, int(1), int(2)), int(3));
        assert_eq!(operand("(1 + 2) * 3"), expected);
    }

    #[test]
    fn unary_operators_chain_right_recursively() {
        let expected = ParsedExpr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(ParsedExpr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(ParsedExpr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(ParsedExpr::Ident("x".to_string())),
                }),
            }),
        };
        assert_eq!(operand("~-~x"), expected);
    }

    #[test]
    fn brackets_parse_as_address() {
        assert_eq!(
            operand("[r0]"),
            ParsedExpr::Address(Box::new(ParsedExpr::Ident("r0".to_string())))
        );
        assert_eq!(
            operand("[ 1 + 2 ]"),
            ParsedExpr::Address(Box::new(binary(BinaryOp::Add, int(1), int(2))))
        );
    }

    #[test]
    fn missing_closing_bracket_is_fatal() {
        let err = parse_lines("jmp [r0").unwrap_err();
        assert_eq!(err.message, "expected ']'");
        let err = parse_lines("dw (1").unwrap_err();
        assert_eq!(err.message, "expected ')'");
    }

    #[test]
    fn garbage_line_start_is_fatal() {
        let err = parse_lines("nop\n@").unwrap_err();
        assert_eq!(err.message, "expected label or instruction");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn missing_operand_after_comma_is_fatal() {
        let err = parse_lines("mov r0,\n").unwrap_err();
        assert_eq!(err.message, "expected value, got '\n'");
    }

    #[test]
    fn iterator_stops_after_error() {
        let mut parser = Parser::new("@\nnop");
        assert!(parser.next().unwrap().is_err());
        assert!(parser.next().is_none());
    }
}
