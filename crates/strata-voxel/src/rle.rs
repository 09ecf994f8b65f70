//! Signed run-length encoding for packed block cells.
//!
//! Cells are non-negative as signed 32-bit values (bit 31 is never set), so
//! the sign bit is free to mark runs: a non-negative value is one literal
//! cell, a negative value `-n` is followed by the cell repeated `n` times.
//! Runs are only emitted for `n > 1` and are capped at `i32::MAX`.

use std::convert::Infallible;
use std::io::{self, Read, Write};

/// Errors that can occur during RLE decoding.
#[derive(Debug, thiserror::Error)]
pub enum RleError {
    /// Decoded length does not match expected length.
    #[error("RLE length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected number of elements.
        expected: usize,
        /// Actual number of decoded elements.
        actual: usize,
    },
    /// A run header was the last value of the stream.
    #[error("RLE run header without a value")]
    MissingRunValue,
}

/// Outcome of decoding a stream into a fixed number of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RleDecoded {
    /// The decoded cells, exactly `expected_len` long.
    pub cells: Vec<u32>,
    /// A run extended past `expected_len` and was cut short.
    pub overflowed: bool,
}

/// Calls `emit` with each `(count, value)` run of `cells`.
fn for_each_run<E>(cells: &[u32], mut emit: impl FnMut(usize, u32) -> Result<(), E>) -> Result<(), E> {
    let mut i = 0;
    while i < cells.len() {
        let value = cells[i];
        let mut count = 1;
        while i + count < cells.len() && cells[i + count] == value && count < i32::MAX as usize {
            count += 1;
        }
        emit(count, value)?;
        i += count;
    }
    Ok(())
}

/// Encodes cells into the signed literal/run stream.
pub fn rle_encode(cells: &[u32]) -> Vec<i32> {
    let mut out = Vec::new();
    let Ok(()) = for_each_run::<Infallible>(cells, |count, value| {
        if count > 1 {
            out.push(-(count as i32));
        }
        out.push(value as i32);
        Ok(())
    });
    out
}

/// Writes the signed stream for `cells` as big-endian `i32`s.
pub fn write_rle<W: Write>(writer: &mut W, cells: &[u32]) -> io::Result<()> {
    for_each_run(cells, |count, value| {
        if count > 1 {
            writer.write_all(&(-(count as i32)).to_be_bytes())?;
        }
        writer.write_all(&(value as i32).to_be_bytes())
    })
}

/// Decodes exactly `expected_len` cells, pulling stream values from `next`.
///
/// `sanitize` sees every decoded value once per literal or run and may
/// substitute it. A run reaching past `expected_len` is truncated and
/// reported through [`RleDecoded::overflowed`].
pub fn rle_decode_with<E>(
    expected_len: usize,
    mut next: impl FnMut() -> Result<i32, E>,
    mut sanitize: impl FnMut(u32) -> u32,
) -> Result<RleDecoded, E> {
    let mut cells = Vec::with_capacity(expected_len);
    let mut overflowed = false;
    while cells.len() < expected_len {
        let head = next()?;
        if head >= 0 {
            cells.push(sanitize(head as u32));
            continue;
        }
        let value = sanitize(next()? as u32);
        let run = head.unsigned_abs() as usize;
        let room = expected_len - cells.len();
        if run > room {
            overflowed = true;
        }
        cells.extend(std::iter::repeat_n(value, run.min(room)));
    }
    Ok(RleDecoded { cells, overflowed })
}

/// Reads exactly `expected_len` cells from a big-endian stream.
pub fn read_rle<R: Read>(
    reader: &mut R,
    expected_len: usize,
    sanitize: impl FnMut(u32) -> u32,
) -> io::Result<RleDecoded> {
    rle_decode_with(
        expected_len,
        || {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(i32::from_be_bytes(buf))
        },
        sanitize,
    )
}

/// Decodes an in-memory stream that must describe exactly `expected_len`
/// cells and nothing more.
pub fn rle_decode(stream: &[i32], expected_len: usize) -> Result<Vec<u32>, RleError> {
    let mut values = stream.iter().copied();
    let mut consumed = 0usize;
    let decoded = rle_decode_with(
        expected_len,
        || {
            let value = values.next();
            consumed += 1;
            value.ok_or(RleError::MissingRunValue)
        },
        |cell| cell,
    );
    let decoded = match decoded {
        Ok(decoded) => decoded,
        Err(_) if consumed == stream.len() + 1 && stream.last().is_some_and(|&v| v < 0) => {
            return Err(RleError::MissingRunValue);
        }
        Err(_) => {
            return Err(RleError::LengthMismatch {
                expected: expected_len,
                actual: decoded_len(stream),
            });
        }
    };
    if decoded.overflowed || consumed != stream.len() {
        return Err(RleError::LengthMismatch {
            expected: expected_len,
            actual: decoded_len(stream),
        });
    }
    Ok(decoded.cells)
}

/// Number of cells a well-formed stream describes.
fn decoded_len(stream: &[i32]) -> usize {
    let mut len = 0;
    let mut i = 0;
    while i < stream.len() {
        if stream[i] >= 0 {
            len += 1;
            i += 1;
        } else {
            len += stream[i].unsigned_abs() as usize;
            i += 2;
        }
    }
    len
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
