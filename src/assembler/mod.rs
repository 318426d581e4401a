// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Two-pass assembler for vc2.
//!
//! Pass 1 walks the parsed lines in order, binds labels to the current output
//! address, evaluates operands against the symbol table built so far, and
//! emits opcode/selector/immediate bytes. References to symbols that are not
//! bound yet emit a placeholder word and a deferred record. Pass 2 runs after
//! the symbol table is frozen: every deferred record is re-evaluated under the
//! super-label context captured at reference time and the real value is
//! patched over its placeholder.

pub mod cli;
pub mod encoding;
pub mod error;
pub mod listing;

use std::collections::HashMap;
use std::fs;
use std::io;

use clap::Parser;

use crate::parser::{parse_lines, BinaryOp, ParsedExpr, ParsedInstruction, ParsedLine, UnaryOp};

use encoding::{data_selector, DataSelector, Operand, Register, SelectorPayload};
use error::{AsmError, AsmErrorKind, Diagnostic, RunError};

use cli::Cli;

pub use cli::VERSION;

/// Run the assembler with command-line arguments.
pub fn run() -> Result<(), RunError> {
    let cli = Cli::parse();
    run_with(&cli)
}

fn run_with(cli: &Cli) -> Result<(), RunError> {
    let source = fs::read_to_string(&cli.input).map_err(|err| {
        RunError::bare(AsmError::new(
            AsmErrorKind::Io,
            format!("cannot read \"{}\": {err}", cli.input.display()),
        ))
    })?;
    let source_lines: Vec<String> = source.lines().map(str::to_string).collect();
    let file = cli.input.display().to_string();

    let lines = parse_lines(&source).map_err(|err| {
        RunError::new(
            Diagnostic::from_parse_error(&err).with_file(Some(file.clone())),
            source_lines.clone(),
        )
    })?;
    if cli.print_ast {
        println!("{lines:#?}");
    }

    let mut assembler = Assembler::new();
    let result = assembler
        .assemble(&lines)
        .and_then(|()| assembler.finish())
        .map_err(|diag| RunError::new(diag.with_file(Some(file)), source_lines))?;

    if cli.print_result {
        listing::write_byte_dump(io::stdout().lock(), &result).map_err(|err| {
            RunError::bare(AsmError::new(
                AsmErrorKind::Io,
                format!("cannot write result dump: {err}"),
            ))
        })?;
    }
    if let Some(path) = &cli.output {
        fs::write(path, &result).map_err(|err| {
            RunError::bare(AsmError::new(
                AsmErrorKind::Io,
                format!("cannot write \"{}\": {err}", path.display()),
            ))
        })?;
    }
    Ok(())
}

/// Parse and assemble a complete source text.
pub fn assemble_source(source: &str) -> Result<Box<[u8]>, Diagnostic> {
    let lines = parse_lines(source).map_err(|err| Diagnostic::from_parse_error(&err))?;
    let mut assembler = Assembler::new();
    assembler.assemble(&lines)?;
    assembler.finish()
}

/// A reference whose value was unknown when its slot was emitted.
#[derive(Debug, Clone)]
struct UnresolvedRef {
    symbol: String,
    super_label: Option<String>,
    expr: ParsedExpr,
    #[allow(dead_code)]
    instruction_address: u32,
    operand_address: u32,
    line_number: u32,
}

/// Assembler state for one `assemble` + `finish` lifecycle.
#[derive(Debug, Default)]
pub struct Assembler {
    result: Vec<u8>,
    address: u32,
    symbols: HashMap<String, u32>,
    super_label: Option<String>,
    current_line: u32,
    unresolved: Vec<UnresolvedRef>,
}

impl Assembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes emitted so far (pass-1 view; placeholders not yet patched).
    pub fn bytes(&self) -> &[u8] {
        &self.result
    }

    /// Pass 1: bind labels and emit code for every line, in order.
    pub fn assemble(&mut self, lines: &[ParsedLine]) -> Result<(), Diagnostic> {
        for line in lines {
            self.current_line = line.line_number;
            if let Some(label) = &line.label {
                self.bind_label(label)
                    .map_err(|error| Diagnostic::new(line.line_number, error))?;
            }
            if let Some(instruction) = &line.instruction {
                self.encode_instruction(instruction)
                    .map_err(|error| Diagnostic::new(line.line_number, error))?;
            }
        }
        Ok(())
    }

    /// Pass 2 plus finalization: patch every deferred reference, then freeze
    /// the buffer.
    pub fn finish(mut self) -> Result<Box<[u8]>, Diagnostic> {
        self.resolve_deferred()?;
        Ok(self.result.into_boxed_slice())
    }

    fn resolve_deferred(&mut self) -> Result<(), Diagnostic> {
        let deferred = std::mem::take(&mut self.unresolved);
        for reference in &deferred {
            self.super_label.clone_from(&reference.super_label);
            let operand = self
                .evaluate_operand(&reference.expr)
                .map_err(|error| Diagnostic::new(reference.line_number, error))?;
            let value = resolved_value(&operand).ok_or_else(|| {
                Diagnostic::new(
                    reference.line_number,
                    AsmError::new(
                        AsmErrorKind::Symbol,
                        format!("unresolved symbol \"{}\"", reference.symbol),
                    ),
                )
            })?;
            self.patch32(reference.operand_address, value as u32);
        }
        Ok(())
    }

    fn bind_label(&mut self, label: &str) -> Result<(), AsmError> {
        let full = if label.starts_with('.') {
            self.qualify(label)?
        } else {
            self.super_label = Some(label.to_string());
            label.to_string()
        };
        if self.symbols.contains_key(&full) {
            return Err(AsmError::new(
                AsmErrorKind::Symbol,
                format!("redefinition of label \"{label}\""),
            ));
        }
        self.symbols.insert(full, self.address);
        Ok(())
    }

    /// Fully-qualified symbol name: sub-labels are prefixed with the current
    /// super-label, everything else stands alone.
    fn qualify(&self, name: &str) -> Result<String, AsmError> {
        if !name.starts_with('.') {
            return Ok(name.to_string());
        }
        match &self.super_label {
            Some(super_label) => Ok(format!("{super_label}{name}")),
            None => Err(AsmError::new(
                AsmErrorKind::Symbol,
                format!("use of sub-label before super-label, \"{name}\""),
            )),
        }
    }

    fn encode_instruction(&mut self, instruction: &ParsedInstruction) -> Result<(), AsmError> {
        let instruction_address = self.address;
        let operator = instruction.operator.as_str();
        let Some(opcode) = encoding::opcode(operator) else {
            return self.encode_directive(instruction);
        };
        self.emit8(opcode);

        if matches!(operator, "nop" | "hlt") {
            if !instruction.operands.is_empty() {
                return Err(malformed(operator));
            }
            return Ok(());
        }

        if operator == "mov" || encoding::is_arithmetic(operator) {
            if instruction.operands.len() != 2 {
                return Err(malformed(operator));
            }
            let dest = self.evaluate_operand(&instruction.operands[0])?;
            let src = self.evaluate_operand(&instruction.operands[1])?;
            if matches!(dest, Operand::Immediate(_))
                || (matches!(dest, Operand::Address(_)) && matches!(src, Operand::Address(_)))
            {
                return Err(malformed(operator));
            }
            let dest_selector = data_selector(&dest);
            let src_selector = data_selector(&src);
            self.emit8(encoding::pack_pair(&dest_selector, &src_selector));
            self.emit_operand(&dest_selector, &instruction.operands[0], instruction_address);
            self.emit_operand(&src_selector, &instruction.operands[1], instruction_address);
            return Ok(());
        }

        if operator == "not" {
            if instruction.operands.len() != 1 {
                return Err(malformed(operator));
            }
            let operand = self.evaluate_operand(&instruction.operands[0])?;
            if matches!(operand, Operand::Immediate(_)) {
                return Err(malformed(operator));
            }
            let selector = data_selector(&operand);
            self.emit8(encoding::pack_single(&selector));
            self.emit_operand(&selector, &instruction.operands[0], instruction_address);
            return Ok(());
        }

        if operator == "jmp" {
            if instruction.operands.len() != 1 {
                return Err(malformed(operator));
            }
            let target = self.evaluate_operand(&instruction.operands[0])?;
            let selector = data_selector(&target);
            self.emit8(encoding::pack_single(&selector));
            self.emit_operand(&selector, &instruction.operands[0], instruction_address);
            return Ok(());
        }

        if matches!(operator, "jz" | "jnz") {
            if instruction.operands.len() != 2 {
                return Err(malformed(operator));
            }
            let target = self.evaluate_operand(&instruction.operands[0])?;
            let source = self.evaluate_operand(&instruction.operands[1])?;
            if matches!(target, Operand::Address(_)) && matches!(source, Operand::Address(_)) {
                return Err(malformed(operator));
            }
            let target_selector = data_selector(&target);
            let source_selector = data_selector(&source);
            self.emit8(encoding::pack_pair(&target_selector, &source_selector));
            self.emit_operand(&target_selector, &instruction.operands[0], instruction_address);
            self.emit_operand(&source_selector, &instruction.operands[1], instruction_address);
            return Ok(());
        }

        Err(malformed(operator))
    }

    /// `db`/`dw`: each operand is one 4-byte big-endian word, no opcode byte.
    /// Operands must fold to a known immediate in pass 1.
    fn encode_directive(&mut self, instruction: &ParsedInstruction) -> Result<(), AsmError> {
        let operator = instruction.operator.as_str();
        if !matches!(operator, "db" | "dw") {
            return Err(AsmError::new(
                AsmErrorKind::Instruction,
                format!("unsupported instruction/directive \"{operator}\""),
            ));
        }
        for operand in &instruction.operands {
            match self.evaluate_operand(operand)? {
                Operand::Immediate(value) => self.emit32(value as u32),
                _ => return Err(malformed(operator)),
            }
        }
        Ok(())
    }

    /// Emit the immediate word for an operand, if its selector carries one.
    /// An unresolved immediate records a deferred reference before the
    /// placeholder goes out, capturing the current super-label context.
    fn emit_operand(
        &mut self,
        selector: &DataSelector,
        expr: &ParsedExpr,
        instruction_address: u32,
    ) {
        let SelectorPayload::Immediate { value, pending } = &selector.payload else {
            return;
        };
        if let Some(symbol) = pending {
            self.unresolved.push(UnresolvedRef {
                symbol: symbol.clone(),
                super_label: self.super_label.clone(),
                expr: expr.clone(),
                instruction_address,
                operand_address: self.address,
                line_number: self.current_line,
            });
        }
        self.emit32(*value as u32);
    }

    fn evaluate_operand(&self, expr: &ParsedExpr) -> Result<Operand, AsmError> {
        match expr {
            ParsedExpr::Ident(name) => {
                if let Some(register) = Register::from_name(name) {
                    return Ok(Operand::Register(register));
                }
                let symbol = self.qualify(name)?;
                match self.symbols.get(&symbol) {
                    Some(&address) => Ok(Operand::Immediate(address as i32)),
                    None => Ok(Operand::Unresolved(symbol)),
                }
            }
            ParsedExpr::Int(value) => Ok(Operand::Immediate(*value)),
            ParsedExpr::Address(inner) => Ok(Operand::Address(Box::new(
                self.evaluate_operand(inner)?,
            ))),
            ParsedExpr::Unary { op, expr } => {
                let value = self.evaluate_operand(expr)?;
                match value {
                    Operand::Unresolved(_) => Ok(value),
                    Operand::Immediate(value) => Ok(Operand::Immediate(match op {
                        UnaryOp::Neg => value.wrapping_neg(),
                        UnaryOp::Not => !value,
                    })),
                    _ => Err(AsmError::new(
                        AsmErrorKind::Expression,
                        format!("invalid operand in '{op}' operation, expected immediate"),
                    )),
                }
            }
            ParsedExpr::Binary { op, left, right } => {
                let left = self.evaluate_operand(left)?;
                let right = self.evaluate_operand(right)?;
                if matches!(left, Operand::Unresolved(_)) {
                    return Ok(left);
                }
                let Operand::Immediate(lhs) = left else {
                    return Err(AsmError::new(
                        AsmErrorKind::Expression,
                        format!("invalid left operand in '{op}' operation, expected immediate"),
                    ));
                };
                if matches!(right, Operand::Unresolved(_)) {
                    return Ok(right);
                }
                let Operand::Immediate(rhs) = right else {
                    return Err(AsmError::new(
                        AsmErrorKind::Expression,
                        format!("invalid right operand in '{op}' operation, expected immediate"),
                    ));
                };
                Ok(Operand::Immediate(fold_binary(*op, lhs, rhs)?))
            }
        }
    }

    fn patch32(&mut self, offset: u32, value: u32) {
        let offset = offset as usize;
        self.result[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn emit32(&mut self, value: u32) {
        for byte in value.to_be_bytes() {
            self.emit8(byte);
        }
    }

    fn emit8(&mut self, value: u8) {
        self.result.push(value);
        self.address += 1;
    }
}

fn malformed(operator: &str) -> AsmError {
    AsmError::new(
        AsmErrorKind::Instruction,
        format!("malformed '{operator}' instruction"),
    )
}

/// Constant folding with two's-complement 32-bit semantics. Shift counts are
/// masked to 0..31 and `>>` is arithmetic.
fn fold_binary(op: BinaryOp, lhs: i32, rhs: i32) -> Result<i32, AsmError> {
    Ok(match op {
        BinaryOp::Or => lhs | rhs,
        BinaryOp::Xor => lhs ^ rhs,
        BinaryOp::And => lhs & rhs,
        BinaryOp::Shl => lhs.wrapping_shl(rhs as u32),
        BinaryOp::Shr => lhs.wrapping_shr(rhs as u32),
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div => {
            if rhs == 0 {
                return Err(AsmError::new(
                    AsmErrorKind::Expression,
                    "division by zero in 'div' operation",
                ));
            }
            lhs.wrapping_div(rhs)
        }
        BinaryOp::Rem => {
            if rhs == 0 {
                return Err(AsmError::new(
                    AsmErrorKind::Expression,
                    "division by zero in 'rem' operation",
                ));
            }
            lhs.wrapping_rem(rhs)
        }
    })
}

/// Numeric value of a pass-2 re-evaluation. Address-of wrappers change only
/// the selector bits, never the value, so they are unwrapped here.
fn resolved_value(operand: &Operand) -> Option<i32> {
    match operand {
        Operand::Immediate(value) => Some(*value),
        Operand::Address(inner) => resolved_value(inner),
        _ => None,
    }
}
