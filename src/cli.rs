use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "splice-delta",
    about = "Score the effect of sequence variants on splicing",
    version
)]
pub struct Cli {
    /// Set logging level to WARN
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a single variant
    Score(ScoreArgs),
    /// Score every variant of a JSON bulk request or VCF-like text file
    Batch(BatchArgs),
    /// Predict per-base splice-site probabilities for a DNA sequence
    Sequence(SequenceArgs),
    /// List (and optionally validate) the assemblies of a registry
    Assemblies(AssembliesArgs),
}

/// Where the annotation, reference and models come from.
#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Transcript annotation table (tab-separated, optionally gzipped)
    #[arg(short = 'A', long, value_name = "TSV", requires = "fasta")]
    pub annotation: Option<PathBuf>,

    /// Reference genome FASTA
    #[arg(short = 'S', long, value_name = "FASTA", requires = "annotation")]
    pub fasta: Option<PathBuf>,

    /// Assembly registry (JSON)
    #[arg(long, value_name = "JSON", conflicts_with_all = ["annotation", "fasta"], requires = "assembly")]
    pub registry: Option<PathBuf>,

    /// Assembly name within the registry
    #[arg(short = 'a', long, requires = "registry")]
    pub assembly: Option<String>,

    /// Model command line; repeat once per ensemble member
    #[arg(short = 'm', long = "model", value_name = "CMD", required = true)]
    pub models: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ScoringArgs {
    /// Scoring radius around the variant (50..=10000) [default: 50]
    #[arg(short = 'd', long)]
    pub distance: Option<u32>,

    /// Mask gains at annotated sites and losses at unannotated sites
    #[arg(long, overrides_with = "no_mask")]
    pub mask: bool,

    /// Turn masking off, even if the bulk request asks for it
    #[arg(long, overrides_with = "mask")]
    pub no_mask: bool,

    /// Print one summary line per record instead of JSON
    #[arg(long)]
    pub summary: bool,
}

impl ScoringArgs {
    /// `Some` only when masking was set explicitly on the command line.
    pub fn mask_override(&self) -> Option<bool> {
        match (self.mask, self.no_mask) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Chromosome
    pub chrom: String,

    /// 1-based position
    pub pos: u32,

    /// Reference allele
    #[arg(value_name = "REF")]
    pub ref_allele: String,

    /// Alternate allele(s), comma-separated
    #[arg(value_name = "ALT")]
    pub alt: String,

    #[command(flatten)]
    pub context: ContextArgs,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input variants (.json bulk request, or text with CHROM POS [ID] REF ALT)
    pub input: PathBuf,

    /// Output path (JSON lines); stdout if omitted
    #[arg(short = 'o', long = "out", value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Number of threads (CPUs) to use
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: u8,

    #[command(flatten)]
    pub context: ContextArgs,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

#[derive(Args, Debug)]
pub struct SequenceArgs {
    /// DNA sequence (A, C, G, T)
    pub sequence: String,

    /// Model command line; repeat once per ensemble member
    #[arg(short = 'm', long = "model", value_name = "CMD", required = true)]
    pub models: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AssembliesArgs {
    /// Assembly registry (JSON)
    #[arg(long, value_name = "JSON")]
    pub registry: PathBuf,

    /// Fail unless every assembly's FASTA and annotation exist
    #[arg(long)]
    pub validate: bool,
}
