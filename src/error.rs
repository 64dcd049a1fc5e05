use thiserror::Error;

/// Per-variant scoring failure.
///
/// The first five variants are domain errors (the input cannot be scored as
/// given); `Sequence` and `Predictor` are system failures.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("no gene annotations found for {chrom}:{pos}")]
    NoAnnotation { chrom: String, pos: u32 },

    #[error("reference allele {declared} does not match reference sequence {found} at {chrom}:{pos}")]
    ReferenceMismatch {
        chrom: String,
        pos: u32,
        declared: String,
        found: String,
    },

    #[error("variant {chrom}:{pos} is too close to the chromosome end ({found} of {expected} context bases available)")]
    NearChromosomeEnd {
        chrom: String,
        pos: u32,
        expected: usize,
        found: usize,
    },

    #[error("reference allele of length {ref_len} is longer than 2 x distance ({distance})")]
    RefTooLong { ref_len: usize, distance: u32 },

    #[error("sequence source failure: {0}")]
    Sequence(String),

    #[error("predictor failure: {0}")]
    Predictor(String),
}

/// Coarse error classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    NoAnnotation,
    ReferenceMismatch,
    Window,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::NoAnnotation => "no_annotation",
            ErrorKind::ReferenceMismatch => "reference_mismatch",
            ErrorKind::Window => "window",
            ErrorKind::Internal => "internal",
        }
    }
}

impl ScoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoreError::MalformedInput(_) => ErrorKind::MalformedInput,
            ScoreError::NoAnnotation { .. } => ErrorKind::NoAnnotation,
            ScoreError::ReferenceMismatch { .. } => ErrorKind::ReferenceMismatch,
            ScoreError::NearChromosomeEnd { .. } | ScoreError::RefTooLong { .. } => {
                ErrorKind::Window
            }
            ScoreError::Sequence(_) | ScoreError::Predictor(_) => ErrorKind::Internal,
        }
    }

    /// True for failures of the sequence source or predictor rather than of the input.
    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_distinguishable() {
        assert!(ScoreError::Predictor("boom".into()).is_internal());
        assert!(ScoreError::Sequence("no such chromosome".into()).is_internal());
        assert!(!ScoreError::RefTooLong { ref_len: 200, distance: 50 }.is_internal());
        assert_eq!(
            ScoreError::NoAnnotation { chrom: "1".into(), pos: 5 }.kind(),
            ErrorKind::NoAnnotation
        );
        assert_eq!(ErrorKind::Window.as_str(), "window");
    }
}
