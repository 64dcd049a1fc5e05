use crate::types::Strand;
use anyhow::{Context, Result, anyhow, bail};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Largest coordinate the interval index can hold.
pub const MAX_COORDINATE: u32 = i32::MAX as u32;

/// One annotated transcript.
///
/// Coordinates are 1-based and inclusive. `exon_starts` and `exon_ends` are
/// parallel lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub gene: String,
    pub chrom: String,
    pub strand: Strand,
    pub tx_start: u32,
    pub tx_end: u32,
    pub exon_starts: Vec<u32>,
    pub exon_ends: Vec<u32>,
}

impl Transcript {
    /// Check the structural invariants every transcript must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.tx_start > self.tx_end {
            bail!(
                "transcript {} has start {} after end {}",
                self.gene,
                self.tx_start,
                self.tx_end
            );
        }
        if self.tx_end > MAX_COORDINATE {
            bail!(
                "transcript {} ends at {}, beyond the largest supported coordinate {}",
                self.gene,
                self.tx_end,
                MAX_COORDINATE
            );
        }
        if self.exon_starts.len() != self.exon_ends.len() {
            bail!(
                "transcript {} has {} exon starts but {} exon ends",
                self.gene,
                self.exon_starts.len(),
                self.exon_ends.len()
            );
        }
        if self.exon_starts.is_empty() {
            bail!("transcript {} has no exons", self.gene);
        }
        if let Some(s) = self.exon_starts.iter().find(|&&s| s < self.tx_start) {
            bail!(
                "transcript {} has exon start {} before transcript start {}",
                self.gene,
                s,
                self.tx_start
            );
        }
        if let Some(e) = self.exon_ends.iter().find(|&&e| e > self.tx_end) {
            bail!(
                "transcript {} has exon end {} after transcript end {}",
                self.gene,
                e,
                self.tx_end
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AnnotationRow {
    #[serde(rename = "#NAME", alias = "NAME")]
    name: String,
    #[serde(rename = "CHROM")]
    chrom: String,
    #[serde(rename = "STRAND")]
    strand: String,
    #[serde(rename = "TX_START")]
    tx_start: u32,
    #[serde(rename = "TX_END")]
    tx_end: u32,
    #[serde(rename = "EXON_START")]
    exon_start: String,
    #[serde(rename = "EXON_END")]
    exon_end: String,
}

/// Load the transcript table.
///
/// Coordinate conventions of the table:
/// - `TX_START` and `EXON_START` are 0-based and shifted by one on load.
/// - `TX_END` and `EXON_END` are already 1-based inclusive and kept as-is.
///
/// Files ending in `.gz` are decompressed transparently.
pub fn load_transcripts(path: &Path) -> Result<Vec<Transcript>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open annotation table {}", path.display()))?;
    let is_gz = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let transcripts = if is_gz {
        read_transcripts(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        read_transcripts(BufReader::new(file))
    }
    .with_context(|| format!("gene annotation file {} not formatted properly", path.display()))?;

    tracing::info!(
        transcripts = transcripts.len(),
        path = %path.display(),
        "loaded transcript annotations"
    );
    Ok(transcripts)
}

/// Parse a tab-separated transcript table from any reader.
pub fn read_transcripts<R: Read>(reader: R) -> Result<Vec<Transcript>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let mut transcripts = Vec::new();
    for (row_idx, result) in rdr.deserialize::<AnnotationRow>().enumerate() {
        // +2: 1-based line numbers and the header line
        let line = row_idx + 2;
        let row = result.with_context(|| format!("line {line}"))?;
        let transcript = transcript_from_row(row).with_context(|| format!("line {line}"))?;
        transcripts.push(transcript);
    }
    Ok(transcripts)
}

fn transcript_from_row(row: AnnotationRow) -> Result<Transcript> {
    let strand = Strand::from_symbol(&row.strand)
        .ok_or_else(|| anyhow!("unknown strand '{}'", row.strand))?;
    let transcript = Transcript {
        gene: row.name,
        chrom: row.chrom,
        strand,
        tx_start: row
            .tx_start
            .checked_add(1)
            .ok_or_else(|| anyhow!("bad coordinate {}", row.tx_start))?,
        tx_end: row.tx_end,
        exon_starts: parse_coords(&row.exon_start, 1)?,
        exon_ends: parse_coords(&row.exon_end, 0)?,
    };
    transcript.validate()?;
    Ok(transcript)
}

/// Parse a comma-separated coordinate list, tolerating a trailing comma.
fn parse_coords(field: &str, shift: u32) -> Result<Vec<u32>> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|e| anyhow!("bad coordinate '{s}': {e}"))?
                .checked_add(shift)
                .ok_or_else(|| anyhow!("bad coordinate '{s}'"))
        })
        .collect()
}
