// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface for the vc2 assembler.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const VERSION: &str = "0.1.0";

#[derive(Parser, Debug)]
#[command(
    name = "vc2asm",
    version = VERSION,
    about = "Assembler for the vc2 virtual machine",
    disable_version_flag = true
)]
pub struct Cli {
    /// Input assembly file.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,
    #[arg(
        short = 'o',
        value_name = "FILE",
        long_help = "Write the assembled byte stream to FILE. Without -o no output file is produced."
    )]
    pub output: Option<PathBuf>,
    #[arg(
        long = "print-ast",
        action = ArgAction::SetTrue,
        long_help = "Print the parsed line sequence instead of staying quiet."
    )]
    pub print_ast: bool,
    #[arg(
        long = "print-result",
        action = ArgAction::SetTrue,
        long_help = "Print each output byte with its index in hex/decimal and its value in hex, decimal, and binary."
    )]
    pub print_result: bool,
    #[arg(
        short = 'v',
        long = "version",
        action = ArgAction::Version,
        help = "Print version"
    )]
    version: Option<bool>,
}
