mod cli;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{AssembliesArgs, BatchArgs, Cli, Command, ContextArgs, ScoreArgs, ScoringArgs, SequenceArgs};
use mimalloc::MiMalloc;
use splice_delta::assembly::AssemblyRegistry;
use splice_delta::error::ScoreError;
use splice_delta::pipeline::{self, BulkRequest};
use splice_delta::types::Variant;
use splice_delta::{ScoreConfig, ScoringContext, command_ensemble, score_sequence, score_variant};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Score(args) => run_score(args),
        Command::Batch(args) => run_batch(args),
        Command::Sequence(args) => run_sequence(args),
        Command::Assemblies(args) => run_assemblies(args),
    }
}

/// Domain errors exit with status 2, system failures with status 1.
fn report(err: &ScoreError) -> ExitCode {
    if err.is_internal() {
        tracing::error!(kind = err.kind().as_str(), "{err}");
        ExitCode::FAILURE
    } else {
        tracing::warn!(kind = err.kind().as_str(), "{err}");
        ExitCode::from(2)
    }
}

fn build_context(args: &ContextArgs) -> Result<ScoringContext> {
    let (annotation, fasta) = match (&args.registry, &args.assembly, &args.annotation, &args.fasta) {
        (Some(registry), Some(name), _, _) => {
            let resolved = AssemblyRegistry::load(registry)?.resolve(name)?;
            tracing::info!(assembly = %resolved.assembly, "using registry assembly");
            (resolved.annotation, resolved.fasta)
        }
        (None, None, Some(annotation), Some(fasta)) => (annotation.clone(), fasta.clone()),
        _ => bail!("pass either --annotation and --fasta, or --registry and --assembly"),
    };
    ScoringContext::load(&annotation, &fasta, &args.models)
}

fn score_config(args: &ScoringArgs) -> Result<ScoreConfig, ScoreError> {
    BulkRequest::default().config(args.distance, args.mask_override())
}

fn run_score(args: ScoreArgs) -> Result<ExitCode> {
    let alts = args.alt.split(',').map(str::to_string).collect();
    let variant = match Variant::new(args.chrom, args.pos, args.ref_allele, alts) {
        Ok(v) => v,
        Err(e) => return Ok(report(&e)),
    };
    let config = match score_config(&args.scoring) {
        Ok(c) => c,
        Err(e) => return Ok(report(&e)),
    };

    let ctx = build_context(&args.context)?;
    let records = match score_variant(&ctx, &variant, &config) {
        Ok(r) => r,
        Err(e) => return Ok(report(&e)),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.scoring.summary {
        for record in &records {
            writeln!(out, "{}", record.summary_line())?;
        }
    } else {
        serde_json::to_writer_pretty(&mut out, &records)?;
        writeln!(out)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_batch(args: BatchArgs) -> Result<ExitCode> {
    let bulk = pipeline::read_bulk(&args.input)?;
    let config = match bulk.config(args.scoring.distance, args.scoring.mask_override()) {
        Ok(c) => c,
        Err(e) => return Ok(report(&e)),
    };
    let ctx = build_context(&args.context)?;

    let mut out: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let stats = pipeline::run(
        &ctx,
        bulk.variants,
        &config,
        args.threads.max(1) as usize,
        args.scoring.summary,
        &mut out,
    )?;

    tracing::info!(
        variants = stats.variants,
        scored = stats.scored,
        failed = stats.failed,
        internal_errors = stats.internal_errors,
        records = stats.records,
        "splice-delta: batch complete"
    );
    Ok(if stats.internal_errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_sequence(args: SequenceArgs) -> Result<ExitCode> {
    let predictor = command_ensemble(&args.models)?;
    let scores = match score_sequence(&predictor, &args.sequence) {
        Ok(s) => s,
        Err(e) => return Ok(report(&e)),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &scores)?;
    writeln!(out)?;
    Ok(ExitCode::SUCCESS)
}

fn run_assemblies(args: AssembliesArgs) -> Result<ExitCode> {
    let registry = AssemblyRegistry::load(&args.registry)?;
    if args.validate {
        registry.validate()?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in registry.names() {
        match registry.resolve(name) {
            Ok(r) => writeln!(
                out,
                "{}\t{}\t{}\t{}",
                r.name,
                r.assembly,
                r.annotation.display(),
                r.fasta.display()
            )?,
            Err(e) => writeln!(out, "{name}\t-\t-\t{e:#}")?,
        }
    }
    Ok(ExitCode::SUCCESS)
}
