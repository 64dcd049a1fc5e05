//! Delta-score computation.
//!
//! For each overlapping transcript and alternate allele the engine predicts
//! splice-site probabilities on the reference and alternate windows, maps
//! minus-strand predictions back to genomic orientation, realigns the
//! alternate profile across indels and reduces the pair into per-offset
//! statistics and four best-effect summaries.

use crate::error::ScoreError;
use crate::fasta::SequenceSource;
use crate::index::{TranscriptIndex, TranscriptHit};
use crate::predictor::{ACCEPTOR, DONOR, Ensemble, SiteProbs, one_hot_encode, reverse_complement};
use crate::types::{Strand, Variant};
use crate::window::WindowBuilder;
use serde::Serialize;
use std::fmt;

/// Characters marking alleles that are not plain base substitutions.
const SYMBOLIC_ALLELE_CHARS: &[char] = &['.', '-', '*', '<', '>', '[', ']'];

/// Probabilities for one offset from the variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionStat {
    #[serde(rename = "dist_from_variant")]
    pub offset: i64,
    pub donor_ref: f32,
    pub donor_alt: f32,
    #[serde(rename = "donor")]
    pub donor_delta: f32,
    pub acceptor_ref: f32,
    pub acceptor_alt: f32,
    #[serde(rename = "acceptor")]
    pub acceptor_delta: f32,
}

/// Strongest effect of one kind (e.g. acceptor gain).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    /// Delta at `offset`, zeroed when masked.
    pub score: f32,
    pub offset: i64,
    pub ref_prob: f32,
    pub alt_prob: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaSummary {
    pub acceptor_gain: Extremum,
    pub acceptor_loss: Extremum,
    pub donor_gain: Extremum,
    pub donor_loss: Extremum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaScores {
    pub summary: DeltaSummary,
    pub stats: Vec<PositionStat>,
}

/// Result for one (transcript, alternate allele) pair.
///
/// `scores` is `None` for allele classes that are deliberately not scored
/// (multi-base substitutions).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRecord {
    pub gene: String,
    pub strand: Strand,
    #[serde(rename = "chr")]
    pub chrom: String,
    pub pos: u32,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    #[serde(rename = "alt")]
    pub alt_allele: String,
    pub scores: Option<DeltaScores>,
}

impl DeltaRecord {
    pub fn is_placeholder(&self) -> bool {
        self.scores.is_none()
    }

    /// One-line `ALT|GENE|DS_AG|DS_AL|DS_DG|DS_DL|DP_AG|DP_AL|DP_DG|DP_DL|...` summary.
    pub fn summary_line(&self) -> String {
        SummaryLine(self).to_string()
    }
}

struct SummaryLine<'a>(&'a DeltaRecord);

impl fmt::Display for SummaryLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        let Some(scores) = &r.scores else {
            return write!(f, "{}|{}|.|.|.|.|.|.|.|.", r.alt_allele, r.gene);
        };
        let s = &scores.summary;
        let ext = [s.acceptor_gain, s.acceptor_loss, s.donor_gain, s.donor_loss];
        write!(f, "{}|{}", r.alt_allele, r.gene)?;
        for e in &ext {
            write!(f, "|{:.2}", e.score)?;
        }
        for e in &ext {
            write!(f, "|{}", e.offset)?;
        }
        for e in &ext {
            write!(f, "|{:.2}|{:.2}", e.ref_prob, e.alt_prob)?;
        }
        Ok(())
    }
}

/// Reverse the position order of a profile. Channels are left untouched.
pub fn reverse_profile(profile: &mut [SiteProbs]) {
    profile.reverse();
}

/// Realign the alternate profile with the reference profile.
///
/// - Deletion (`ref_len > 1`, `alt_len == 1`): `ref_len - alt_len` zero
///   positions are inserted right after the substituted bases.
/// - Insertion (`ref_len == 1`, `alt_len > 1`): the inserted span collapses
///   to one position holding the per-channel maximum over the span.
/// - Anything else is returned unchanged.
pub fn reconcile_indel(
    y_alt: Vec<SiteProbs>,
    ref_len: usize,
    alt_len: usize,
    coverage: usize,
) -> Vec<SiteProbs> {
    let center = coverage / 2;

    if ref_len > 1 && alt_len == 1 {
        let del_len = ref_len - alt_len;
        let split = (center + alt_len).min(y_alt.len());
        let mut out = Vec::with_capacity(y_alt.len() + del_len);
        out.extend_from_slice(&y_alt[..split]);
        out.extend(std::iter::repeat_n([0.0f32; 3], del_len));
        out.extend_from_slice(&y_alt[split..]);
        return out;
    }

    if ref_len == 1 && alt_len > 1 {
        let span_end = (center + alt_len).min(y_alt.len());
        let mut collapsed = [f32::NEG_INFINITY; 3];
        for probs in &y_alt[center..span_end] {
            for c in 0..3 {
                collapsed[c] = collapsed[c].max(probs[c]);
            }
        }
        let mut out = Vec::with_capacity(y_alt.len() + 1 - alt_len);
        out.extend_from_slice(&y_alt[..center]);
        out.push(collapsed);
        out.extend_from_slice(&y_alt[span_end..]);
        return out;
    }

    y_alt
}

/// Index of the largest `minuend - subtrahend` value on `channel`.
///
/// With `gain` the delta is `alt - ref`, otherwise `ref - alt`. Ties resolve
/// to the lowest index.
pub fn argmax_delta(y_ref: &[SiteProbs], y_alt: &[SiteProbs], channel: usize, gain: bool) -> usize {
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, (r, a)) in y_ref.iter().zip(y_alt).enumerate() {
        let d = if gain { a[channel] - r[channel] } else { r[channel] - a[channel] };
        if d > best {
            best = d;
            best_idx = i;
        }
    }
    best_idx
}

/// Pick the four extrema and apply the annotation mask.
///
/// With `mask` set, a gain landing on the annotated exon boundary and a loss
/// landing anywhere else have their score zeroed. Offsets are never altered.
pub fn summarize(
    y_ref: &[SiteProbs],
    y_alt: &[SiteProbs],
    coverage: usize,
    dist_exon_boundary: Option<i64>,
    mask: bool,
) -> DeltaSummary {
    let center = (coverage / 2) as i64;
    let extremum = |channel: usize, gain: bool| {
        let idx = argmax_delta(y_ref, y_alt, channel, gain);
        let offset = idx as i64 - center;
        let ref_prob = y_ref[idx][channel];
        let alt_prob = y_alt[idx][channel];
        let delta = if gain { alt_prob - ref_prob } else { ref_prob - alt_prob };
        let on_boundary = dist_exon_boundary == Some(offset);
        let masked = mask && if gain { on_boundary } else { !on_boundary };
        Extremum {
            score: if masked { 0.0 } else { delta },
            offset,
            ref_prob,
            alt_prob,
        }
    };

    DeltaSummary {
        acceptor_gain: extremum(ACCEPTOR, true),
        acceptor_loss: extremum(ACCEPTOR, false),
        donor_gain: extremum(DONOR, true),
        donor_loss: extremum(DONOR, false),
    }
}

/// Per-offset reference/alternate probabilities and deltas over `[-distance, distance]`.
pub fn position_stats(y_ref: &[SiteProbs], y_alt: &[SiteProbs], distance: u32) -> Vec<PositionStat> {
    let distance = i64::from(distance);
    y_ref
        .iter()
        .zip(y_alt)
        .enumerate()
        .map(|(i, (r, a))| PositionStat {
            offset: i as i64 - distance,
            donor_ref: r[DONOR],
            donor_alt: a[DONOR],
            donor_delta: a[DONOR] - r[DONOR],
            acceptor_ref: r[ACCEPTOR],
            acceptor_alt: a[ACCEPTOR],
            acceptor_delta: a[ACCEPTOR] - r[ACCEPTOR],
        })
        .collect()
}

pub fn is_symbolic_allele(allele: &str) -> bool {
    allele.contains(SYMBOLIC_ALLELE_CHARS)
}

/// Drives lookup, window construction, prediction and reduction for one variant.
pub struct DeltaScoreEngine<'a> {
    index: &'a TranscriptIndex,
    sequence: &'a dyn SequenceSource,
    predictor: &'a Ensemble,
    windows: WindowBuilder,
    mask: bool,
}

impl<'a> DeltaScoreEngine<'a> {
    pub fn new(
        index: &'a TranscriptIndex,
        sequence: &'a dyn SequenceSource,
        predictor: &'a Ensemble,
        distance: u32,
        mask: bool,
    ) -> Self {
        Self {
            index,
            sequence,
            predictor,
            windows: WindowBuilder::new(distance),
            mask,
        }
    }

    /// Score every (overlapping transcript, alternate allele) pair of `variant`.
    ///
    /// Records are ordered by transcript, then allele. Symbolic alleles are
    /// skipped; multi-base substitutions yield a placeholder record.
    pub fn score(&self, variant: &Variant) -> Result<Vec<DeltaRecord>, ScoreError> {
        let hits = self.index.lookup(variant.chrom(), variant.pos());
        if hits.is_empty() {
            tracing::warn!(variant = %variant, "no gene annotations found for given location");
            return Err(ScoreError::NoAnnotation {
                chrom: variant.chrom().to_string(),
                pos: variant.pos(),
            });
        }

        let context = self.windows.fetch_context(self.sequence, variant)?;

        let mut records = Vec::new();
        for hit in &hits {
            for alt in variant.alt_alleles() {
                if is_symbolic_allele(alt) {
                    tracing::debug!(variant = %variant, alt = %alt, "skipping symbolic allele");
                    continue;
                }
                let record = if variant.ref_allele().len() > 1 && alt.len() > 1 {
                    self.placeholder(variant, hit, alt)
                } else {
                    self.score_pair(variant, hit, alt, &context)?
                };
                records.push(record);
            }
        }
        Ok(records)
    }

    fn placeholder(&self, variant: &Variant, hit: &TranscriptHit<'_>, alt: &str) -> DeltaRecord {
        DeltaRecord {
            gene: hit.gene.to_string(),
            strand: hit.strand,
            chrom: variant.chrom().to_string(),
            pos: variant.pos(),
            ref_allele: variant.ref_allele().to_string(),
            alt_allele: alt.to_string(),
            scores: None,
        }
    }

    fn score_pair(
        &self,
        variant: &Variant,
        hit: &TranscriptHit<'_>,
        alt: &str,
        context: &[u8],
    ) -> Result<DeltaRecord, ScoreError> {
        let pos_data = self.index.pos_data(hit.id, variant.pos()).ok_or_else(|| {
            ScoreError::Predictor(format!("transcript {} missing from index", hit.id))
        })?;
        let ref_len = variant.ref_allele().len();
        let alt_len = alt.len();
        let coverage = self.windows.coverage();

        let windows = self.windows.build(context, &pos_data, ref_len, alt.as_bytes());
        let mut x_ref = one_hot_encode(&windows.reference);
        let mut x_alt = one_hot_encode(&windows.alternate);

        if hit.strand == Strand::Minus {
            reverse_complement(&mut x_ref);
            reverse_complement(&mut x_alt);
        }

        let mut y_ref = self
            .predictor
            .predict_mean(&x_ref)
            .map_err(|e| ScoreError::Predictor(format!("{e:#}")))?;
        let mut y_alt = self
            .predictor
            .predict_mean(&x_alt)
            .map_err(|e| ScoreError::Predictor(format!("{e:#}")))?;

        if hit.strand == Strand::Minus {
            reverse_profile(&mut y_ref);
            reverse_profile(&mut y_alt);
        }

        let y_alt = reconcile_indel(y_alt, ref_len, alt_len, coverage);
        if y_ref.len() != coverage || y_alt.len() != coverage {
            return Err(ScoreError::Predictor(format!(
                "profile lengths {}/{} do not match coverage {}",
                y_ref.len(),
                y_alt.len(),
                coverage
            )));
        }

        let summary = summarize(&y_ref, &y_alt, coverage, pos_data.dist_exon_boundary, self.mask);
        let stats = position_stats(&y_ref, &y_alt, self.windows.distance());

        tracing::debug!(
            variant = %variant,
            gene = hit.gene,
            alt = %alt,
            acceptor_gain = summary.acceptor_gain.score,
            acceptor_loss = summary.acceptor_loss.score,
            donor_gain = summary.donor_gain.score,
            donor_loss = summary.donor_loss.score,
            "scored transcript"
        );

        Ok(DeltaRecord {
            gene: hit.gene.to_string(),
            strand: hit.strand,
            chrom: variant.chrom().to_string(),
            pos: variant.pos(),
            ref_allele: variant.ref_allele().to_string(),
            alt_allele: alt.to_string(),
            scores: Some(DeltaScores { summary, stats }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(len: usize) -> Vec<SiteProbs> {
        vec![[1.0, 0.0, 0.0]; len]
    }

    fn ramp(len: usize) -> Vec<SiteProbs> {
        (0..len)
            .map(|i| {
                let v = i as f32 / 100.0;
                [1.0 - 2.0 * v, v, v]
            })
            .collect()
    }

    #[test]
    fn deletion_inserts_zero_block_after_substitution() {
        let coverage = 11;
        let ref_len = 4;
        let y_alt = ramp(coverage - (ref_len - 1));
        let out = reconcile_indel(y_alt.clone(), ref_len, 1, coverage);

        assert_eq!(out.len(), coverage);
        let split = coverage / 2 + 1;
        assert_eq!(&out[..split], &y_alt[..split]);
        assert!(out[split..split + 3].iter().all(|p| *p == [0.0; 3]));
        assert_eq!(&out[split + 3..], &y_alt[split..]);
    }

    #[test]
    fn insertion_collapses_span_to_channel_max() {
        let coverage = 11;
        let mut y_alt = flat(coverage + 2);
        let center = coverage / 2;
        y_alt[center] = [0.2, 0.7, 0.1];
        y_alt[center + 1] = [0.5, 0.1, 0.4];
        y_alt[center + 2] = [0.9, 0.05, 0.05];

        let out = reconcile_indel(y_alt.clone(), 1, 3, coverage);
        assert_eq!(out.len(), coverage);
        assert_eq!(out[center], [0.9, 0.7, 0.4]);
        assert_eq!(&out[..center], &y_alt[..center]);
        assert_eq!(&out[center + 1..], &y_alt[center + 3..]);
    }

    #[test]
    fn substitution_is_untouched() {
        let y = ramp(11);
        assert_eq!(reconcile_indel(y.clone(), 1, 1, 11), y);
    }

    #[test]
    fn reversing_twice_is_identity() {
        let original = ramp(9);
        let mut y = original.clone();
        reverse_profile(&mut y);
        assert_eq!(y[0], original[8]);
        assert_eq!(y[0][ACCEPTOR], original[8][ACCEPTOR]);
        reverse_profile(&mut y);
        assert_eq!(y, original);
    }

    #[test]
    fn argmax_ties_resolve_to_first_position() {
        let y_ref = flat(7);
        let mut y_alt = flat(7);
        y_alt[2][ACCEPTOR] = 0.4;
        y_alt[5][ACCEPTOR] = 0.4;
        assert_eq!(argmax_delta(&y_ref, &y_alt, ACCEPTOR, true), 2);
        // all-zero losses: the first position wins
        assert_eq!(argmax_delta(&y_ref, &y_alt, DONOR, false), 0);
    }

    #[test]
    fn summary_reports_offsets_relative_to_variant() {
        let coverage = 11;
        let y_ref = flat(coverage);
        let mut y_alt = flat(coverage);
        y_alt[7][DONOR] = 0.6;
        let mut y_ref_loss = y_ref.clone();
        y_ref_loss[1][ACCEPTOR] = 0.3;

        let s = summarize(&y_ref_loss, &y_alt, coverage, None, false);
        assert_eq!(s.donor_gain.offset, 2);
        assert!((s.donor_gain.score - 0.6).abs() < 1e-6);
        assert_eq!(s.donor_gain.ref_prob, 0.0);
        assert_eq!(s.acceptor_loss.offset, -4);
        assert!((s.acceptor_loss.score - 0.3).abs() < 1e-6);
        assert_eq!(s.acceptor_gain.offset, -5);
    }

    #[test]
    fn mask_zeroes_annotated_gain_and_unannotated_loss() {
        let coverage = 11;
        let mut y_ref = flat(coverage);
        let mut y_alt = flat(coverage);
        y_alt[8][ACCEPTOR] = 0.5; // gain at +3, on the boundary
        y_ref[2][ACCEPTOR] = 0.4; // loss at -3, off the boundary
        y_alt[4][DONOR] = 0.2; // gain at -1, off the boundary
        y_ref[8][DONOR] = 0.7; // loss at +3, on the boundary

        let unmasked = summarize(&y_ref, &y_alt, coverage, Some(3), false);
        let masked = summarize(&y_ref, &y_alt, coverage, Some(3), true);

        assert_eq!(masked.acceptor_gain.score, 0.0);
        assert_eq!(masked.acceptor_loss.score, 0.0);
        assert!((masked.donor_gain.score - 0.2).abs() < 1e-6);
        assert!((masked.donor_loss.score - 0.7).abs() < 1e-6);

        for (m, u) in [
            (masked.acceptor_gain, unmasked.acceptor_gain),
            (masked.acceptor_loss, unmasked.acceptor_loss),
            (masked.donor_gain, unmasked.donor_gain),
            (masked.donor_loss, unmasked.donor_loss),
        ] {
            assert_eq!(m.offset, u.offset);
            assert_eq!(m.ref_prob, u.ref_prob);
            assert_eq!(m.alt_prob, u.alt_prob);
        }
    }

    #[test]
    fn position_stats_span_the_radius() {
        let distance = 5;
        let coverage = 2 * distance as usize + 1;
        let y_ref = flat(coverage);
        let mut y_alt = flat(coverage);
        y_alt[0][ACCEPTOR] = 0.25;
        let stats = position_stats(&y_ref, &y_alt, distance);

        assert_eq!(stats.len(), coverage);
        assert_eq!(stats.first().unwrap().offset, -5);
        assert_eq!(stats.last().unwrap().offset, 5);
        assert_eq!(stats[0].acceptor_delta, 0.25);
        assert_eq!(stats[0].acceptor_alt, 0.25);
        assert_eq!(stats[0].donor_delta, 0.0);
    }

    #[test]
    fn symbolic_alleles_are_detected() {
        for a in ["<DEL>", "*", ".", "-", "G]17:198982]", "[13:123457[A"] {
            assert!(is_symbolic_allele(a), "{a}");
        }
        assert!(!is_symbolic_allele("ACGT"));
    }

    #[test]
    fn summary_line_formats_like_vcf_info() {
        let record = DeltaRecord {
            gene: "GENE1".into(),
            strand: Strand::Plus,
            chrom: "21".into(),
            pos: 100,
            ref_allele: "CA".into(),
            alt_allele: "GT".into(),
            scores: None,
        };
        assert!(record.is_placeholder());
        assert_eq!(record.summary_line(), "GT|GENE1|.|.|.|.|.|.|.|.");

        let e = Extremum { score: 0.5, offset: -2, ref_prob: 0.1, alt_prob: 0.6 };
        let z = Extremum { score: 0.0, offset: 0, ref_prob: 0.0, alt_prob: 0.0 };
        let scored = DeltaRecord {
            scores: Some(DeltaScores {
                summary: DeltaSummary { acceptor_gain: e, acceptor_loss: z, donor_gain: z, donor_loss: z },
                stats: Vec::new(),
            }),
            alt_allele: "G".into(),
            ..record
        };
        assert_eq!(
            scored.summary_line(),
            "G|GENE1|0.50|0.00|0.00|0.00|-2|0|0|0|0.10|0.60|0.00|0.00|0.00|0.00|0.00|0.00"
        );
    }
}
