//! Bulk scoring driver: read a batch of variants, score it, write JSON lines.

use crate::api::{BatchEntry, DEFAULT_DISTANCE, ScoreConfig, ScoringContext, score_batch};
use crate::error::ScoreError;
use crate::types::VariantRequest;
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

/// A bulk request document: shared settings plus independent variants.
#[derive(Debug, Default)]
pub struct BulkRequest {
    pub distance: Option<u32>,
    pub mask: Option<bool>,
    pub variants: Vec<VariantRequest>,
}

/// On-disk shape; entries stay untyped so each one is read on its own.
#[derive(Deserialize)]
struct BulkDocument {
    #[serde(default)]
    distance: Option<u32>,
    #[serde(default)]
    mask: Option<bool>,
    variants: Vec<serde_json::Value>,
}

impl BulkRequest {
    /// Parse a JSON bulk document. Only the shared settings can fail the whole
    /// document; a bad entry is carried as that entry's error.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let doc: BulkDocument = serde_json::from_reader(reader)?;
        Ok(Self {
            distance: doc.distance,
            mask: doc.mask,
            variants: doc.variants.into_iter().map(VariantRequest::from_json).collect(),
        })
    }

    /// Scoring settings: explicit overrides first, then the document, then defaults.
    pub fn config(
        &self,
        distance: Option<u32>,
        mask: Option<bool>,
    ) -> Result<ScoreConfig, ScoreError> {
        ScoreConfig::new(
            distance.or(self.distance).unwrap_or(DEFAULT_DISTANCE),
            mask.or(self.mask).unwrap_or(false),
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub variants: u64,
    pub scored: u64,
    pub failed: u64,
    pub internal_errors: u64,
    pub records: u64,
}

/// Read a bulk request from `path`.
///
/// `.json` files hold a [`BulkRequest`] document; anything else is read as
/// VCF-like text (see [`parse_variant_lines`]), optionally gzipped.
pub fn read_bulk(path: &Path) -> Result<BulkRequest> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let name = path.to_string_lossy();

    if name.ends_with(".json") {
        return BulkRequest::from_reader(BufReader::new(file))
            .with_context(|| format!("invalid bulk request {}", path.display()));
    }

    let reader: Box<dyn Read> = if name.ends_with(".gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(BulkRequest {
        variants: parse_variant_lines(BufReader::new(reader))?,
        ..BulkRequest::default()
    })
}

/// Parse `CHROM POS [ID] REF ALT[,ALT...] [...]` lines, tab- or space-separated.
///
/// Lines starting with `#` and blank lines are skipped. With five or more
/// columns the third is the ID (VCF layout). A line that cannot be parsed
/// still yields a request, with the unparseable fields left empty, so it is
/// reported as malformed at scoring time instead of aborting the batch.
pub fn parse_variant_lines<R: BufRead>(reader: R) -> Result<Vec<VariantRequest>> {
    let mut requests = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        let (ref_col, alt_col) = if cols.len() >= 5 { (3, 4) } else { (2, 3) };
        requests.push(VariantRequest {
            chrom: cols.first().map(|s| s.to_string()),
            pos: cols.get(1).and_then(|s| s.parse().ok()),
            ref_allele: cols.get(ref_col).map(|s| s.to_string()),
            alt: cols.get(alt_col).map(|s| s.to_string()),
            ..VariantRequest::default()
        });
    }
    Ok(requests)
}

/// Score `requests` and write one JSON object per entry to `out`.
///
/// With `summary` set, each record is written as a tab-separated
/// `variant<TAB>summary-line` row and failed entries as `variant<TAB>error`.
pub fn run<W: Write>(
    ctx: &ScoringContext,
    requests: Vec<VariantRequest>,
    config: &ScoreConfig,
    threads: usize,
    summary: bool,
    out: &mut W,
) -> Result<Stats> {
    let mut stats = Stats {
        variants: requests.len() as u64,
        ..Stats::default()
    };

    let entries = score_batch(ctx, requests, config, threads)?;
    for entry in &entries {
        match &entry.result {
            Ok(records) => {
                stats.scored += 1;
                stats.records += records.len() as u64;
            }
            Err(e) => {
                stats.failed += 1;
                if e.is_internal() {
                    stats.internal_errors += 1;
                }
            }
        }
        if summary {
            write_summary(entry, out)?;
        } else {
            serde_json::to_writer(&mut *out, entry)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(stats)
}

fn write_summary<W: Write>(entry: &BatchEntry, out: &mut W) -> Result<()> {
    match &entry.result {
        Ok(records) => {
            for record in records {
                writeln!(out, "{}\t{}", entry.label, record.summary_line())?;
            }
        }
        Err(e) => writeln!(out, "{}\terror: {}", entry.label, e)?,
    }
    Ok(())
}
