use crate::annotation::{Transcript, load_transcripts};
use crate::types::{HashMap, HashMapExt, Strand, TranscriptId, normalise_chrom};
use anyhow::Result;
use coitrees::{BasicCOITree, Interval, IntervalTree as CoitreeIntervalTree};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
struct RowRef {
    row: TranscriptId,
}

/// A transcript overlapping a queried position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptHit<'a> {
    pub id: TranscriptId,
    pub gene: &'a str,
    pub strand: Strand,
}

/// Signed offsets (`boundary - position`) from a position to transcript landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosData {
    pub dist_tx_start: i64,
    pub dist_tx_end: i64,
    /// Offset to the closest exon start or end; `None` if the transcript has no exons.
    pub dist_exon_boundary: Option<i64>,
}

/// Read-only transcript table with per-chromosome interval trees.
pub struct TranscriptIndex {
    transcripts: Vec<Transcript>,
    trees: HashMap<String, BasicCOITree<RowRef, u32>>,
}

impl TranscriptIndex {
    pub fn new(transcripts: Vec<Transcript>) -> Self {
        let mut by_chrom: HashMap<String, Vec<Interval<RowRef>>> = HashMap::new();
        for (row, tx) in transcripts.iter().enumerate() {
            let (Ok(start), Ok(end)) = (i32::try_from(tx.tx_start), i32::try_from(tx.tx_end)) else {
                tracing::warn!(
                    gene = %tx.gene,
                    chrom = %tx.chrom,
                    tx_end = tx.tx_end,
                    "transcript beyond indexable coordinates; not indexed"
                );
                continue;
            };
            // COITree intervals are end-inclusive, like [tx_start, tx_end].
            by_chrom
                .entry(tx.chrom.clone())
                .or_default()
                .push(Interval::new(start, end, RowRef { row }));
        }

        let trees = by_chrom
            .into_iter()
            .map(|(chrom, intervals)| (chrom, BasicCOITree::new(&intervals)))
            .collect();

        Self { transcripts, trees }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(load_transcripts(path)?))
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    pub fn get(&self, id: TranscriptId) -> Option<&Transcript> {
        self.transcripts.get(id)
    }

    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    /// Chromosome name of the first table row; defines the naming convention.
    pub fn reference_chrom(&self) -> Option<&str> {
        self.transcripts.first().map(|t| t.chrom.as_str())
    }

    /// Distinct chromosome names present in the table.
    pub fn chromosomes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.trees.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All transcripts whose `[tx_start, tx_end]` span contains `pos`, in table order.
    pub fn lookup(&self, chrom: &str, pos: u32) -> Vec<TranscriptHit<'_>> {
        let Some(reference) = self.reference_chrom() else {
            return Vec::new();
        };
        let chrom = normalise_chrom(chrom, reference);
        let Some(tree) = self.trees.get(&chrom) else {
            return Vec::new();
        };

        let Ok(q) = i32::try_from(pos) else {
            return Vec::new();
        };
        let mut rows: Vec<TranscriptId> = Vec::new();
        tree.query(q, q, |node| {
            let row: TranscriptId = node.metadata.row;
            rows.push(row);
        });
        rows.sort_unstable();

        rows.into_iter()
            .map(|id| {
                let tx = &self.transcripts[id];
                TranscriptHit {
                    id,
                    gene: &tx.gene,
                    strand: tx.strand,
                }
            })
            .collect()
    }

    /// Offsets from `pos` to the transcript bounds and to the nearest exon boundary.
    ///
    /// Exon starts and ends are merged into one sorted set of distinct
    /// coordinates; on a tie in absolute distance the lower coordinate wins.
    pub fn pos_data(&self, id: TranscriptId, pos: u32) -> Option<PosData> {
        let tx = self.transcripts.get(id)?;
        let pos = i64::from(pos);

        let boundaries: BTreeSet<u32> = tx
            .exon_starts
            .iter()
            .chain(tx.exon_ends.iter())
            .copied()
            .collect();

        let mut nearest: Option<i64> = None;
        for b in boundaries {
            let d = i64::from(b) - pos;
            match nearest {
                Some(best) if d.abs() >= best.abs() => {}
                _ => nearest = Some(d),
            }
        }

        Some(PosData {
            dist_tx_start: i64::from(tx.tx_start) - pos,
            dist_tx_end: i64::from(tx.tx_end) - pos,
            dist_exon_boundary: nearest,
        })
    }
}
