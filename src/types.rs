use crate::error::ScoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TranscriptId = usize;

// Fast hash maps using AHash instead of the default SipHash.
// Import `HashMapExt` as well when you need `::new()` or `::with_capacity()`.
pub(crate) type HashMap<K, V> = ahash::HashMap<K, V>;
pub(crate) use ahash::HashMapExt;

/// Transcript orientation on the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl Strand {
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.trim() {
            "+" => Some(Strand::Plus),
            "-" => Some(Strand::Minus),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A validated sequence variant.
///
/// `pos` is 1-based. The reference allele and every alternate allele are
/// non-empty; alternate alleles are kept verbatim (symbolic alleles are
/// filtered later, per transcript, by the engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    chrom: String,
    pos: u32,
    ref_allele: String,
    alt_alleles: Vec<String>,
}

impl Variant {
    pub fn new(
        chrom: impl Into<String>,
        pos: u32,
        ref_allele: impl Into<String>,
        alt_alleles: Vec<String>,
    ) -> Result<Self, ScoreError> {
        let chrom = chrom.into().trim().to_string();
        let ref_allele = ref_allele.into().trim().to_string();

        if chrom.is_empty() {
            return Err(ScoreError::MalformedInput("chromosome is empty".into()));
        }
        if pos == 0 {
            return Err(ScoreError::MalformedInput(
                "position must be 1-based (>= 1)".into(),
            ));
        }
        if ref_allele.is_empty() {
            return Err(ScoreError::MalformedInput("reference allele is empty".into()));
        }
        if alt_alleles.is_empty() {
            return Err(ScoreError::MalformedInput("no alternate alleles given".into()));
        }
        let alt_alleles: Vec<String> = alt_alleles
            .into_iter()
            .map(|a| a.trim().to_string())
            .collect();
        if alt_alleles.iter().any(|a| a.is_empty()) {
            return Err(ScoreError::MalformedInput("alternate allele is empty".into()));
        }

        Ok(Self {
            chrom,
            pos,
            ref_allele,
            alt_alleles,
        })
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt_alleles(&self) -> &[String] {
        &self.alt_alleles
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}>{}",
            self.chrom,
            self.pos,
            self.ref_allele,
            self.alt_alleles.join(",")
        )
    }
}

/// Untrusted variant shape as it arrives from a request body or an input file.
///
/// Every field is optional so that a missing field surfaces as a
/// `MalformedInput` error for that entry instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRequest {
    #[serde(default, alias = "chr")]
    pub chrom: Option<String>,
    #[serde(default)]
    pub pos: Option<u32>,
    #[serde(default, rename = "ref")]
    pub ref_allele: Option<String>,
    #[serde(default, rename = "alt")]
    pub alt: Option<String>,
    #[serde(default, rename = "alts")]
    pub alts: Option<Vec<String>>,
    /// Why the entry could not be read, if it could not.
    #[serde(skip)]
    pub parse_error: Option<String>,
}

impl VariantRequest {
    /// Read one entry of a JSON request body.
    ///
    /// A wrongly typed field does not fail the caller: the error is kept in
    /// `parse_error` and the fields that are readable are kept for the label.
    pub fn from_json(value: serde_json::Value) -> Self {
        match serde_json::from_value::<VariantRequest>(value.clone()) {
            Ok(req) => req,
            Err(e) => {
                let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
                VariantRequest {
                    chrom: text("chrom").or_else(|| text("chr")),
                    pos: value
                        .get("pos")
                        .and_then(|v| v.as_u64())
                        .and_then(|p| u32::try_from(p).ok()),
                    ref_allele: text("ref"),
                    alt: text("alt"),
                    alts: None,
                    parse_error: Some(e.to_string()),
                }
            }
        }
    }

    /// Short human-readable label, usable even when fields are missing.
    pub fn label(&self) -> String {
        let alts = match (&self.alts, &self.alt) {
            (Some(list), _) => list.join(","),
            (None, Some(a)) => a.clone(),
            (None, None) => "?".to_string(),
        };
        format!(
            "{}:{} {}>{}",
            self.chrom.as_deref().unwrap_or("?"),
            self.pos.map_or_else(|| "?".to_string(), |p| p.to_string()),
            self.ref_allele.as_deref().unwrap_or("?"),
            alts
        )
    }
}

impl TryFrom<VariantRequest> for Variant {
    type Error = ScoreError;

    fn try_from(req: VariantRequest) -> Result<Self, Self::Error> {
        if let Some(e) = req.parse_error {
            return Err(ScoreError::MalformedInput(e));
        }
        let chrom = req
            .chrom
            .ok_or_else(|| ScoreError::MalformedInput("missing field: chrom".into()))?;
        let pos = req
            .pos
            .ok_or_else(|| ScoreError::MalformedInput("missing field: pos".into()))?;
        let ref_allele = req
            .ref_allele
            .ok_or_else(|| ScoreError::MalformedInput("missing field: ref".into()))?;
        let alts = match (req.alts, req.alt) {
            (Some(list), _) => list,
            (None, Some(a)) => a.split(',').map(str::to_string).collect(),
            (None, None) => {
                return Err(ScoreError::MalformedInput("missing field: alt".into()));
            }
        };
        Variant::new(chrom, pos, ref_allele, alts)
    }
}

/// Rename `source` so it follows the `chr`-prefix convention of `reference`.
pub fn normalise_chrom(source: &str, reference: &str) -> String {
    match (source.strip_prefix("chr"), reference.starts_with("chr")) {
        (Some(bare), false) => bare.to_string(),
        (None, true) => format!("chr{source}"),
        _ => source.to_string(),
    }
}
