//! Public library API for scoring variants.
//!
//! # Example
//!
//! ```no_run
//! use splice_delta::{ScoreConfig, ScoringContext, score_request};
//! use splice_delta::types::VariantRequest;
//!
//! // let ctx = ScoringContext::load(annotation_path, fasta_path, &model_commands)?;
//! // let config = ScoreConfig::new(50, false)?;
//! // let request: VariantRequest = serde_json::from_str(r#"{"chrom":"21","pos":10000,"ref":"T","alt":"A"}"#)?;
//! // let records = score_request(&ctx, request, &config)?;
//! ```

use crate::engine::{DeltaRecord, DeltaScoreEngine};
use crate::error::ScoreError;
use crate::fasta::{FastaDb, SequenceSource};
use crate::index::TranscriptIndex;
use crate::predictor::{
    ACCEPTOR, CommandPredictor, DONOR, Ensemble, FLANK, SplicePredictor, one_hot_encode,
};
use crate::types::{Variant, VariantRequest};
use crate::window::FILLER;
use anyhow::{Context, Result, anyhow};
use crossfire::mpmc;
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::thread;

/// Smallest accepted scoring radius.
pub const MIN_DISTANCE: u32 = 50;
/// Largest accepted scoring radius.
pub const MAX_DISTANCE: u32 = 10_000;
pub const DEFAULT_DISTANCE: u32 = 50;

/// Everything the engine reads: built once, never mutated, shared across threads.
pub struct ScoringContext {
    pub index: TranscriptIndex,
    pub sequence: Box<dyn SequenceSource>,
    pub predictor: Ensemble,
}

impl ScoringContext {
    pub fn new(index: TranscriptIndex, sequence: Box<dyn SequenceSource>, predictor: Ensemble) -> Self {
        Self {
            index,
            sequence,
            predictor,
        }
    }

    /// Load the annotation table and FASTA from disk and wrap each model
    /// command line in a [`CommandPredictor`].
    pub fn load(annotation: &Path, fasta: &Path, models: &[String]) -> Result<Self> {
        let index = TranscriptIndex::from_path(annotation)
            .with_context(|| format!("loading annotation {}", annotation.display()))?;
        let sequence = FastaDb::load(fasta)?;
        let predictor = command_ensemble(models)?;

        tracing::info!(
            transcripts = index.len(),
            models = predictor.len(),
            "scoring context ready"
        );
        Ok(Self::new(index, Box::new(sequence), predictor))
    }

    fn engine(&self, config: &ScoreConfig) -> DeltaScoreEngine<'_> {
        DeltaScoreEngine::new(
            &self.index,
            self.sequence.as_ref(),
            &self.predictor,
            config.distance,
            config.mask,
        )
    }
}

/// Build an ensemble with one [`CommandPredictor`] per command line.
pub fn command_ensemble(models: &[String]) -> Result<Ensemble> {
    let members = models
        .iter()
        .map(|cmd| CommandPredictor::parse(cmd).map(|p| Box::new(p) as Box<dyn SplicePredictor>))
        .collect::<Result<Vec<_>>>()?;
    Ensemble::new(members)
}

/// Caller-chosen scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreConfig {
    distance: u32,
    mask: bool,
}

impl ScoreConfig {
    pub fn new(distance: u32, mask: bool) -> Result<Self, ScoreError> {
        if !(MIN_DISTANCE..=MAX_DISTANCE).contains(&distance) {
            return Err(ScoreError::MalformedInput(format!(
                "distance must be between {MIN_DISTANCE} and {MAX_DISTANCE}, got {distance}"
            )));
        }
        Ok(Self { distance, mask })
    }

    pub fn distance(&self) -> u32 {
        self.distance
    }

    pub fn mask(&self) -> bool {
        self.mask
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            distance: DEFAULT_DISTANCE,
            mask: false,
        }
    }
}

/// Score one validated variant against every overlapping transcript.
pub fn score_variant(
    ctx: &ScoringContext,
    variant: &Variant,
    config: &ScoreConfig,
) -> Result<Vec<DeltaRecord>, ScoreError> {
    ctx.engine(config).score(variant)
}

/// Validate an untrusted request, then score it.
pub fn score_request(
    ctx: &ScoringContext,
    request: VariantRequest,
    config: &ScoreConfig,
) -> Result<Vec<DeltaRecord>, ScoreError> {
    let variant = Variant::try_from(request)?;
    score_variant(ctx, &variant, config)
}

/// Outcome of one entry of a bulk request.
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub label: String,
    pub result: Result<Vec<DeltaRecord>, ScoreError>,
}

#[derive(Serialize)]
struct ErrorReport {
    kind: &'static str,
    message: String,
    internal: bool,
}

impl Serialize for BatchEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("BatchEntry", 3)?;
        s.serialize_field("index", &self.index)?;
        s.serialize_field("variant", &self.label)?;
        match &self.result {
            Ok(records) => s.serialize_field("records", records)?,
            Err(e) => s.serialize_field(
                "error",
                &ErrorReport {
                    kind: e.kind().as_str(),
                    message: e.to_string(),
                    internal: e.is_internal(),
                },
            )?,
        }
        s.end()
    }
}

struct WorkItem {
    idx: usize,
    request: VariantRequest,
}

struct ResultItem {
    idx: usize,
    entry: BatchEntry,
}

fn score_entry(
    ctx: &ScoringContext,
    idx: usize,
    request: VariantRequest,
    config: &ScoreConfig,
) -> BatchEntry {
    let label = request.label();
    let result = score_request(ctx, request, config);
    if let Err(e) = &result
        && e.is_internal()
    {
        tracing::error!(variant = %label, error = %e, "scoring failed");
    }
    BatchEntry {
        index: idx,
        label,
        result,
    }
}

/// Score every request independently; one entry's failure never affects another.
///
/// With `threads > 1` entries are spread over a scoped worker pool and the
/// results are returned in input order.
pub fn score_batch(
    ctx: &ScoringContext,
    requests: Vec<VariantRequest>,
    config: &ScoreConfig,
    threads: usize,
) -> Result<Vec<BatchEntry>> {
    if threads <= 1 || requests.len() <= 1 {
        return Ok(requests
            .into_iter()
            .enumerate()
            .map(|(idx, req)| score_entry(ctx, idx, req, config))
            .collect());
    }

    crossfire::detect_backoff_cfg();
    let worker_count = threads;
    let cap = worker_count.saturating_mul(4).max(8);
    let (tx_work, rx_work) = mpmc::bounded_blocking::<WorkItem>(cap);
    let (tx_res, rx_res) = mpmc::unbounded_blocking::<ResultItem>();
    let total = requests.len();

    thread::scope(|scope| -> Result<Vec<BatchEntry>> {
        for _ in 0..worker_count {
            let rx_work = rx_work.clone();
            let tx_res = tx_res.clone();
            scope.spawn(move || {
                while let Ok(item) = rx_work.recv() {
                    let entry = score_entry(ctx, item.idx, item.request, config);
                    let _ = tx_res.send(ResultItem { idx: item.idx, entry });
                }
            });
        }
        drop(rx_work);
        drop(tx_res);

        for (idx, request) in requests.into_iter().enumerate() {
            tx_work
                .send(WorkItem { idx, request })
                .map_err(|_| anyhow!("worker channel closed"))?;
        }
        drop(tx_work);

        let mut pending: BTreeMap<usize, BatchEntry> = BTreeMap::new();
        let mut next_idx = 0usize;
        let mut ordered = Vec::with_capacity(total);

        while ordered.len() < total {
            let res = rx_res
                .recv()
                .map_err(|_| anyhow!("worker result channel closed"))?;
            pending.insert(res.idx, res.entry);
            while let Some(entry) = pending.remove(&next_idx) {
                ordered.push(entry);
                next_idx += 1;
            }
        }

        Ok(ordered)
    })
}

/// Per-base splice-site probabilities of a custom sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceScores {
    pub sequence: String,
    pub acceptor_prob: Vec<f32>,
    pub donor_prob: Vec<f32>,
}

/// Predict acceptor and donor probabilities for every base of `sequence`.
///
/// Only upper-case `A`, `C`, `G`, `T` are accepted. The sequence is flanked
/// by unknown bases so the model sees its usual context width.
pub fn score_sequence(predictor: &Ensemble, sequence: &str) -> Result<SequenceScores, ScoreError> {
    if sequence.is_empty() || !sequence.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
        return Err(ScoreError::MalformedInput(
            "sequence must consist of A, C, G and T only".into(),
        ));
    }

    let mut padded = Vec::with_capacity(sequence.len() + 2 * FLANK);
    padded.resize(FLANK, FILLER);
    padded.extend_from_slice(sequence.as_bytes());
    padded.resize(sequence.len() + 2 * FLANK, FILLER);

    let y = predictor
        .predict_mean(&one_hot_encode(&padded))
        .map_err(|e| ScoreError::Predictor(format!("{e:#}")))?;

    Ok(SequenceScores {
        sequence: sequence.to_string(),
        acceptor_prob: y.iter().map(|p| p[ACCEPTOR]).collect(),
        donor_prob: y.iter().map(|p| p[DONOR]).collect(),
    })
}
