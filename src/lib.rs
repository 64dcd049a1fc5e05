//! splice-delta: score the effect of sequence variants on RNA splicing.
//!
//! For every transcript overlapping a variant, a splice-site predictor is run
//! on the reference and on the mutated sequence window; the two probability
//! profiles are aligned across indels and reduced to per-offset deltas and
//! the strongest acceptor/donor gain and loss.
//!
//! # Library usage
//!
//! ```no_run
//! use splice_delta::{ScoreConfig, ScoringContext, score_variant};
//! use splice_delta::types::Variant;
//!
//! // let ctx = ScoringContext::load(annotation_path, fasta_path, &["python3 model.py".into()])?;
//! // let variant = Variant::new("21", 10000, "T", vec!["A".into()])?;
//! // let records = score_variant(&ctx, &variant, &ScoreConfig::default())?;
//! // for r in &records {
//! //     println!("{}", r.summary_line());
//! // }
//! ```

pub mod annotation;
pub mod api;
pub mod assembly;
pub mod engine;
pub mod error;
pub mod fasta;
pub mod index;
pub mod pipeline;
pub mod predictor;
pub mod types;
pub mod window;

// Flat re-exports for the most commonly used public types.
pub use api::{
    BatchEntry, ScoreConfig, ScoringContext, SequenceScores, command_ensemble, score_batch,
    score_request, score_sequence, score_variant,
};
pub use engine::{DeltaRecord, DeltaScoreEngine};
pub use error::{ErrorKind, ScoreError};
pub use fasta::{FastaDb, SequenceSource};
pub use index::TranscriptIndex;
pub use predictor::{Ensemble, SplicePredictor};
pub use types::{Strand, Variant, VariantRequest};
