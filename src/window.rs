use crate::error::ScoreError;
use crate::fasta::SequenceSource;
use crate::index::PosData;
use crate::predictor::FLANK;
use crate::types::{Variant, normalise_chrom};

/// Unknown-base filler used for padding.
pub const FILLER: u8 = b'N';

/// Reference/alternate sequence pair for one (variant, transcript, allele).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Windows {
    pub reference: Vec<u8>,
    pub alternate: Vec<u8>,
}

/// Builds the fixed-width sequence windows around a variant.
///
/// `width = 2 * FLANK + coverage` with `coverage = 2 * distance + 1`; the
/// variant sits at index `width / 2`.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    distance: u32,
}

impl WindowBuilder {
    pub fn new(distance: u32) -> Self {
        Self { distance }
    }

    pub fn distance(&self) -> u32 {
        self.distance
    }

    pub fn coverage(&self) -> usize {
        2 * self.distance as usize + 1
    }

    pub fn width(&self) -> usize {
        2 * FLANK + self.coverage()
    }

    /// Fetch the raw reference context centred on the variant.
    ///
    /// Rejects the variant if the context is truncated by a chromosome end,
    /// if the declared reference allele does not match the sequence, or if the
    /// reference allele is longer than `2 * distance`.
    pub fn fetch_context(
        &self,
        source: &dyn SequenceSource,
        variant: &Variant,
    ) -> Result<Vec<u8>, ScoreError> {
        let width = self.width();
        let half = (width / 2) as i64;
        let pos = i64::from(variant.pos());

        let chrom = match source.first_chrom() {
            Some(reference) => normalise_chrom(variant.chrom(), reference),
            None => variant.chrom().to_string(),
        };

        // 0-based half-open [pos - 1 - half, pos + half)
        let start = pos - 1 - half;
        let end = pos + half;
        let seq = source
            .fetch(&chrom, start.max(0) as u64, end as u64)
            .map_err(|e| ScoreError::Sequence(format!("{e:#}")))?;

        if start < 0 || seq.len() != width {
            tracing::warn!(variant = %variant, "skipping record (near chromosome end)");
            return Err(ScoreError::NearChromosomeEnd {
                chrom: variant.chrom().to_string(),
                pos: variant.pos(),
                expected: width,
                found: seq.len(),
            });
        }

        let ref_allele = variant.ref_allele();
        let center = width / 2;
        let found_end = (center + ref_allele.len()).min(width);
        let found = &seq[center..found_end];
        if !found.eq_ignore_ascii_case(ref_allele.as_bytes()) {
            tracing::warn!(variant = %variant, "skipping record (ref issue)");
            return Err(ScoreError::ReferenceMismatch {
                chrom: variant.chrom().to_string(),
                pos: variant.pos(),
                declared: ref_allele.to_string(),
                found: String::from_utf8_lossy(found).to_ascii_uppercase(),
            });
        }

        if ref_allele.len() > 2 * self.distance as usize {
            tracing::warn!(variant = %variant, "skipping record (ref too long)");
            return Err(ScoreError::RefTooLong {
                ref_len: ref_allele.len(),
                distance: self.distance,
            });
        }

        Ok(seq)
    }

    /// Build the padded reference window and the alternate window for one transcript.
    ///
    /// Context outside the transcript is masked with [`FILLER`]. The
    /// alternate window substitutes `alt` for the `ref_len` reference bases at
    /// the centre, so its length is `width - ref_len + alt.len()`.
    pub fn build(&self, context: &[u8], pos_data: &PosData, ref_len: usize, alt: &[u8]) -> Windows {
        let width = context.len();
        let half = (width / 2) as i64;

        let pad_left = (half + pos_data.dist_tx_start).clamp(0, half) as usize;
        let pad_right = (half - pos_data.dist_tx_end).clamp(0, half) as usize;

        let mut reference = Vec::with_capacity(width);
        reference.resize(pad_left, FILLER);
        reference.extend_from_slice(&context[pad_left..width - pad_right]);
        reference.resize(width, FILLER);

        let center = width / 2;
        let mut alternate = Vec::with_capacity(width - ref_len + alt.len());
        alternate.extend_from_slice(&reference[..center]);
        alternate.extend_from_slice(alt);
        alternate.extend_from_slice(&reference[(center + ref_len).min(width)..]);

        Windows {
            reference,
            alternate,
        }
    }
}
