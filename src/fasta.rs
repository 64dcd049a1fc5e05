use crate::types::{HashMap, HashMapExt};
use anyhow::{Result, anyhow};
use needletail::parse_fastx_file;
use std::path::Path;

/// Random-access provider of reference bases.
pub trait SequenceSource: Send + Sync {
    /// Name of the first chromosome; defines the source's naming convention.
    fn first_chrom(&self) -> Option<&str>;

    /// Bases of `chrom` in the 0-based, half-open range `[start, end)`.
    ///
    /// The range is clipped at the chromosome end, so fewer than
    /// `end - start` bases may come back. An unknown chromosome is an error.
    fn fetch(&self, chrom: &str, start: u64, end: u64) -> Result<Vec<u8>>;
}

/// Whole-genome FASTA held in memory.
#[derive(Debug, Default)]
pub struct FastaDb {
    names: Vec<String>,
    seqs: HashMap<String, Vec<u8>>,
}

impl FastaDb {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = parse_fastx_file(path)
            .map_err(|e| anyhow!("failed to open FASTA {}: {}", path.display(), e))?;
        let mut db = FastaDb::default();

        while let Some(result) = reader.next() {
            let record =
                result.map_err(|e| anyhow!("failed to parse FASTA record: {}", e))?;
            let id = String::from_utf8_lossy(record.id());
            let name = id.split_whitespace().next().unwrap_or("").to_string();
            db.insert(name, record.seq().to_vec());
        }

        tracing::info!(
            chromosomes = db.names.len(),
            path = %path.display(),
            "loaded reference FASTA"
        );
        Ok(db)
    }

    /// Build from in-memory `(name, bases)` records, keeping their order.
    pub fn from_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let mut db = FastaDb {
            names: Vec::new(),
            seqs: HashMap::new(),
        };
        for (name, seq) in records {
            db.insert(name.into(), seq);
        }
        db
    }

    fn insert(&mut self, name: String, seq: Vec<u8>) {
        if !self.seqs.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.seqs.insert(name, seq);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn chrom_len(&self, chrom: &str) -> Option<usize> {
        self.seqs.get(chrom).map(Vec::len)
    }
}

impl SequenceSource for FastaDb {
    fn first_chrom(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    fn fetch(&self, chrom: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let seq = self
            .seqs
            .get(chrom)
            .ok_or_else(|| anyhow!("chromosome '{}' not found in reference", chrom))?;
        let len = seq.len();
        let s = usize::try_from(start).unwrap_or(usize::MAX).min(len);
        let e = usize::try_from(end).unwrap_or(usize::MAX).min(len);
        if s >= e {
            return Ok(Vec::new());
        }
        Ok(seq[s..e].to_vec())
    }
}
