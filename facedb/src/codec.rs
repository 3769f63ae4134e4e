//! Line-oriented text format of the backing file.
//!
//! ```text
//! <count>
//! <name>|<source_image_path>|<confidence>|<f_0>|<f_1>|...|<f_{D-1}>
//! ... (count lines)
//! ```
//!
//! Floats are written with Rust's shortest round-trip formatting, so a
//! decoded file yields bit-identical values.

use std::collections::HashMap;
use std::io::{self, BufWriter, Write};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::record::{FIELD_SEPARATOR, IdentityRecord, validate_name};

/// Leading fields before the embedding components.
const HEADER_FIELDS: usize = 3;

/// How malformed content in the backing file is treated on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Skip malformed lines and count them in the [`LoadReport`].
    #[default]
    Lenient,
    /// Fail on the first malformed line, trailing field, duplicate name or
    /// record count mismatch.
    Strict,
}

/// Per-load statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Records accepted.
    pub loaded: usize,
    /// Malformed lines dropped (lenient only).
    pub skipped: usize,
    /// Lines whose name repeated an earlier line and replaced it.
    pub duplicates: usize,
    /// Lines with fields beyond the embedding, read as their first `dim`
    /// components (lenient only).
    pub truncated: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.duplicates == 0 && self.truncated == 0
    }
}

/// Output of [`decode`].
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<IdentityRecord>,
    pub report: LoadReport,
    /// Largest number of fields after the confidence seen on any accepted
    /// line. Exceeds `dim` only when `report.truncated` is non-zero.
    pub widest: usize,
}

/// Write `records` in the line format.
pub fn encode(records: &[IdentityRecord], w: &mut dyn Write) -> io::Result<()> {
    let mut bw = BufWriter::new(w);

    writeln!(bw, "{}", records.len())?;
    for r in records {
        write!(
            bw,
            "{}{sep}{}{sep}{}",
            r.name,
            r.source_image_path,
            r.confidence,
            sep = FIELD_SEPARATOR
        )?;
        for v in &r.embedding {
            write!(bw, "{FIELD_SEPARATOR}{v}")?;
        }
        writeln!(bw)?;
    }

    bw.flush()
}

/// Parse the line format. Line numbers in errors are 1-based.
///
/// An empty input is an empty store. An unreadable count header is an
/// error under either policy, since nothing after it can be trusted.
pub fn decode(text: &str, dim: usize, policy: LoadPolicy) -> Result<Decoded> {
    let mut lines = text.lines().enumerate();

    let count = loop {
        match lines.next() {
            None => return Ok(Decoded::default()),
            Some((_, l)) if l.trim().is_empty() => continue,
            Some((i, l)) => {
                break l.trim().parse::<usize>().map_err(|e| StoreError::Parse {
                    line: i + 1,
                    reason: format!("invalid record count {l:?}: {e}"),
                })?;
            }
        }
    };

    let mut out = Decoded::default();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut seen = 0usize;

    for (i, line) in lines.by_ref().take(count) {
        seen += 1;
        let lineno = i + 1;

        let (record, width) = match parse_line(line, dim, policy) {
            Ok(parsed) => parsed,
            Err(reason) => {
                if policy == LoadPolicy::Strict {
                    return Err(StoreError::Parse {
                        line: lineno,
                        reason,
                    });
                }
                warn!(line = lineno, %reason, "facedb: skipping malformed record");
                out.report.skipped += 1;
                continue;
            }
        };

        if width > dim {
            warn!(line = lineno, width, dim, "facedb: record has more components than the store dimension");
            out.report.truncated += 1;
        }
        out.widest = out.widest.max(width);

        match by_name.get(&record.name) {
            Some(&idx) => {
                if policy == LoadPolicy::Strict {
                    return Err(StoreError::Parse {
                        line: lineno,
                        reason: format!("duplicate name {:?}", record.name),
                    });
                }
                warn!(line = lineno, name = %record.name, "facedb: duplicate name, later line wins");
                out.records[idx] = record;
                out.report.duplicates += 1;
            }
            None => {
                by_name.insert(record.name.clone(), out.records.len());
                out.records.push(record);
            }
        }
    }

    if seen < count {
        if policy == LoadPolicy::Strict {
            return Err(StoreError::Parse {
                line: seen + 2,
                reason: format!("header declares {count} records, found {seen}"),
            });
        }
        warn!(declared = count, found = seen, "facedb: backing file is truncated");
    }

    let trailing = lines.filter(|(_, l)| !l.trim().is_empty()).count();
    if trailing > 0 {
        if policy == LoadPolicy::Strict {
            return Err(StoreError::Parse {
                line: count + 2,
                reason: format!("{trailing} line(s) beyond declared count {count}"),
            });
        }
        warn!(trailing, "facedb: ignoring lines beyond declared record count");
    }

    out.report.loaded = out.records.len();
    Ok(out)
}

/// Parse one record line; also returns the number of fields after the
/// confidence, which is larger than `dim` for lines with excess fields.
fn parse_line(
    line: &str,
    dim: usize,
    policy: LoadPolicy,
) -> std::result::Result<(IdentityRecord, usize), String> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let want = HEADER_FIELDS + dim;
    if fields.len() < want {
        return Err(format!("expected {want} fields, got {}", fields.len()));
    }
    if fields.len() > want && policy == LoadPolicy::Strict {
        return Err(format!("expected {want} fields, got {}", fields.len()));
    }

    let name = fields[0];
    validate_name(name).map_err(|e| e.to_string())?;

    let confidence = parse_f32(fields[2]).map_err(|e| format!("confidence: {e}"))?;

    let mut embedding = Vec::with_capacity(dim);
    for (j, raw) in fields[HEADER_FIELDS..want].iter().enumerate() {
        embedding.push(parse_f32(raw).map_err(|e| format!("component {j}: {e}"))?);
    }

    let record = IdentityRecord {
        name: name.to_string(),
        source_image_path: fields[1].to_string(),
        embedding,
        confidence,
    };
    Ok((record, fields.len() - HEADER_FIELDS))
}

fn parse_f32(raw: &str) -> std::result::Result<f32, String> {
    raw.trim()
        .parse::<f32>()
        .map_err(|e| format!("{raw:?}: {e}"))
}
