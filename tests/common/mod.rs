//! Shared fixtures: a synthetic chromosome, a small annotation table and a
//! deterministic predictor.
#![allow(dead_code)]

use splice_delta::annotation::read_transcripts;
use splice_delta::predictor::{FLANK, OneHot, SiteProbs};
use splice_delta::{Ensemble, FastaDb, ScoringContext, SplicePredictor, TranscriptIndex};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const CHROM_LEN: usize = 20_000;

/// Annotation rows: 0-based TX_START / EXON_START, 1-based ends.
/// Both genes span 9000..=11000 with exon boundaries at 9000, 9500, 10020, 11000.
pub const PLUS_ROW: &str = "GENEP\t21\t+\t8999\t11000\t8999,10019,\t9500,11000,";
pub const MINUS_ROW: &str = "GENEM\t21\t-\t8999\t11000\t8999,10019,\t9500,11000,";
pub const FAR_ROW: &str = "GENEF\t22\t+\t100\t5000\t100,\t5000,";

pub fn chromosome() -> Vec<u8> {
    (0..CHROM_LEN).map(|i| b"ACGT"[i % 4]).collect()
}

/// Base at 1-based `pos` of [`chromosome`].
pub fn base_at(pos: u32) -> char {
    b"ACGT"[(pos as usize - 1) % 4] as char
}

/// `len` reference bases starting at 1-based `pos`.
pub fn bases(pos: u32, len: usize) -> String {
    let seq = chromosome();
    let start = pos as usize - 1;
    String::from_utf8(seq[start..start + len].to_vec()).unwrap()
}

pub fn index(rows: &[&str]) -> TranscriptIndex {
    let mut table =
        String::from("#NAME\tCHROM\tSTRAND\tTX_START\tTX_END\tEXON_START\tEXON_END\n");
    for row in rows {
        table.push_str(row);
        table.push('\n');
    }
    TranscriptIndex::new(read_transcripts(table.as_bytes()).unwrap())
}

/// Acceptor probability is half the A channel and donor half the G channel
/// of the base at the same position; every call is counted.
pub struct BaseStub {
    pub calls: Arc<AtomicUsize>,
}

impl SplicePredictor for BaseStub {
    fn predict(&self, window: &[OneHot]) -> anyhow::Result<Vec<SiteProbs>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(window[FLANK..window.len() - FLANK]
            .iter()
            .map(|x| {
                let a = 0.5 * x[0];
                let d = 0.5 * x[2];
                [1.0 - a - d, a, d]
            })
            .collect())
    }
}

pub struct FailingStub;

impl SplicePredictor for FailingStub {
    fn predict(&self, _window: &[OneHot]) -> anyhow::Result<Vec<SiteProbs>> {
        anyhow::bail!("inference backend unavailable")
    }
}

pub struct PanickingStub;

impl SplicePredictor for PanickingStub {
    fn predict(&self, _window: &[OneHot]) -> anyhow::Result<Vec<SiteProbs>> {
        panic!("model crashed")
    }
}

pub fn stub_ensemble() -> (Ensemble, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let members: Vec<Box<dyn SplicePredictor>> = vec![Box::new(BaseStub {
        calls: Arc::clone(&calls),
    })];
    (Ensemble::new(members).unwrap(), calls)
}

/// Context over `chr21` (FASTA naming) with the given annotation rows (bare naming).
pub fn context(rows: &[&str]) -> (ScoringContext, Arc<AtomicUsize>) {
    let (predictor, calls) = stub_ensemble();
    let fasta = FastaDb::from_records([("chr21", chromosome())]);
    (
        ScoringContext::new(index(rows), Box::new(fasta), predictor),
        calls,
    )
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
