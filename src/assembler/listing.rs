// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Human-readable dump of the assembled byte stream.

use std::io::{self, Write};

/// One line per byte: index in hex and decimal, value in hex, decimal, and
/// 8-bit binary, in fixed-width columns.
pub fn write_byte_dump<W: Write>(mut out: W, bytes: &[u8]) -> io::Result<()> {
    for (index, value) in bytes.iter().enumerate() {
        writeln!(
            out,
            "{index:02x} {index:3}      {value:02x} {value:3} {value:08b}"
        )?;
    }
    Ok(())
}
