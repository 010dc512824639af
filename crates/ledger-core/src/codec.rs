//! Line-delimited event-stream codec: one JSON object per line, canonical
//! field order on write, empty lines ignored on read.
//!
//! A pure function of the event sequence — no hidden state, no caching, no
//! partial writes: `encode` either writes every line or returns before
//! touching the writer for the failed one.

use std::io::{BufRead, Write};

use crate::error::LedgerError;
use crate::transaction::Transaction;

/// Decode every non-empty line of `reader` into a `Transaction`, in file
/// order. Malformed lines are reported with their 1-based line number.
#[tracing::instrument(skip(reader))]
pub fn decode(reader: impl BufRead) -> Result<Vec<Transaction>, LedgerError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(LedgerError::from)?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tx: Transaction = serde_json::from_str(trimmed).map_err(|err| LedgerError::Parse {
            line: index + 1,
            message: err.to_string(),
        })?;
        events.push(tx);
    }
    Ok(events)
}

/// Write `events` to `writer`, one canonical JSON object per line, LF
/// line endings.
#[tracing::instrument(skip(writer, events))]
pub fn encode(writer: &mut impl Write, events: &[Transaction]) -> Result<(), LedgerError> {
    for tx in events {
        let line = serde_json::to_string(tx).map_err(|err| LedgerError::Parse { line: 0, message: err.to_string() })?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}
