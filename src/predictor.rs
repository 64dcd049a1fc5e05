//! Splice-site predictor interface and ensemble averaging.
//!
//! A predictor maps a one-hot window to per-position `[neither, acceptor,
//! donor]` probabilities. Following the SpliceAI convention, the first and
//! last [`FLANK`] bases of the input are context only: a window of `n` bases
//! yields `n - 2 * FLANK` probability triples.

use anyhow::{Context, Result, anyhow, bail};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

/// Context bases on each side of the scored region.
pub const FLANK: usize = 5000;

/// Channel of the acceptor probability in a [`SiteProbs`] triple.
pub const ACCEPTOR: usize = 1;
/// Channel of the donor probability in a [`SiteProbs`] triple.
pub const DONOR: usize = 2;

/// One base as `[A, C, G, T]`; unknown bases are all zeros.
pub type OneHot = [f32; 4];
/// `[neither, acceptor, donor]` probabilities for one position.
pub type SiteProbs = [f32; 3];

pub fn one_hot_encode(seq: &[u8]) -> Vec<OneHot> {
    seq.iter()
        .map(|b| match b.to_ascii_uppercase() {
            b'A' => [1.0, 0.0, 0.0, 0.0],
            b'C' => [0.0, 1.0, 0.0, 0.0],
            b'G' => [0.0, 0.0, 1.0, 0.0],
            b'T' => [0.0, 0.0, 0.0, 1.0],
            _ => [0.0; 4],
        })
        .collect()
}

/// Reverse-complement a one-hot window in place.
///
/// Reversing the channel order maps A<->T and C<->G; unknown bases stay zero.
pub fn reverse_complement(window: &mut [OneHot]) {
    window.reverse();
    for base in window.iter_mut() {
        base.reverse();
    }
}

/// One member of the predictor ensemble.
pub trait SplicePredictor: Send + Sync {
    fn predict(&self, window: &[OneHot]) -> Result<Vec<SiteProbs>>;
}

/// Fixed set of predictors whose outputs are averaged.
pub struct Ensemble {
    members: Vec<Box<dyn SplicePredictor>>,
}

impl Ensemble {
    pub fn new(members: Vec<Box<dyn SplicePredictor>>) -> Result<Self> {
        if members.is_empty() {
            bail!("predictor ensemble needs at least one model");
        }
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Unweighted per-position mean of every member's prediction.
    pub fn predict_mean(&self, window: &[OneHot]) -> Result<Vec<SiteProbs>> {
        let expected = window
            .len()
            .checked_sub(2 * FLANK)
            .ok_or_else(|| {
                anyhow!(
                    "window of {} bases is shorter than the model context",
                    window.len()
                )
            })?;

        let mut sum: Vec<SiteProbs> = vec![[0.0; 3]; expected];
        for (m, model) in self.members.iter().enumerate() {
            let y = model
                .predict(window)
                .with_context(|| format!("model {} of {}", m + 1, self.members.len()))?;
            if y.len() != expected {
                bail!(
                    "model {} returned {} positions, expected {}",
                    m + 1,
                    y.len(),
                    expected
                );
            }
            for (acc, probs) in sum.iter_mut().zip(&y) {
                for c in 0..3 {
                    acc[c] += probs[c];
                }
            }
        }

        let n = self.members.len() as f32;
        for acc in &mut sum {
            for v in acc.iter_mut() {
                *v /= n;
            }
        }
        Ok(sum)
    }
}

/// Ensemble member backed by an external program.
///
/// The program receives the one-hot window as a JSON array of `[A,C,G,T]`
/// rows on stdin and must print a JSON array of `[neither, acceptor, donor]`
/// rows on stdout.
#[derive(Debug, Clone)]
pub struct CommandPredictor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPredictor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as `python run.py --model 1`.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("empty model command"))?;
        Ok(Self::new(program, parts.map(str::to_string).collect()))
    }
}

impl SplicePredictor for CommandPredictor {
    fn predict(&self, window: &[OneHot]) -> Result<Vec<SiteProbs>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to spawn model {}", self.program.display()))?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            bail!("model {} stdin unavailable", self.program.display());
        };

        // The window is fed from its own thread so a model that writes before
        // it has read everything cannot stall on a full pipe.
        let (output, sent) = thread::scope(|scope| {
            let writer = scope.spawn(move || -> Result<()> {
                let mut writer = BufWriter::new(stdin);
                serde_json::to_writer(&mut writer, window)?;
                writer.flush()?;
                Ok(())
            });
            let output = child.wait_with_output();
            let sent = writer
                .join()
                .unwrap_or_else(|_| Err(anyhow!("model input writer panicked")));
            (output, sent)
        });

        let output = output
            .with_context(|| format!("failed to wait for model {}", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "model {} exited with status {}",
                self.program.display(),
                output.status
            );
        }
        sent.with_context(|| format!("failed to send window to model {}", self.program.display()))?;
        let probs: Vec<SiteProbs> = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("model {} wrote malformed output", self.program.display()))?;
        Ok(probs)
    }
}
