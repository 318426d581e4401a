// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for vc2asm.

fn main() {
    let use_color = std::env::var("NO_COLOR").is_err();
    if let Err(err) = vc2asm::assembler::run() {
        match err.diagnostic() {
            Some(diag) => eprintln!(
                "{}",
                diag.format_with_context(Some(err.source_lines()), use_color)
            ),
            None => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
}
