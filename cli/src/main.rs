//! oncosynth: synthetic breast-cancer patient records from the command line.
//!
//! Usage:
//!   cargo run -p oncosynth-cli -- generate -n 1000 -p 0.05 --seed 42 > dataset.jsonl
//!   cargo run -p oncosynth-cli -- verify --input dataset.jsonl
//!   cargo run -p oncosynth-cli -- catalog --catalog my_catalog.toml

mod sink;

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use oncosynth_catalog::Catalog;
use oncosynth_contracts::{
    bundle::PatientBundle,
    error::{SynthError, SynthResult},
};
use oncosynth_core::{
    traits::BundleVerifier, Assembler, GenerationContext, SynthesisConfig, Synthesizer,
};
use oncosynth_verify::{patient_bundle_schema, ConsistencyVerifier};

use crate::sink::DatasetWriter;

// ── CLI definition ────────────────────────────────────────────────────────────

/// oncosynth: seeded synthetic breast-cancer patient records with controlled
/// defect injection.
#[derive(Parser)]
#[command(
    name = "oncosynth",
    about = "Synthetic breast-cancer patient record generator",
    long_about = "Generates reproducible synthetic breast-cancer patient records as JSON lines,\n\
                  optionally corrupting fields with a known probability and logging every defect."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a dataset, one JSON bundle per line.
    Generate {
        /// Number of patients.
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,

        /// Per-field corruption probability in [0, 1]. Pass 0 for a clean
        /// dataset.
        #[arg(short = 'p', long)]
        probability: f64,

        /// Random seed. Drawn at random (and reported) when omitted.
        #[arg(long)]
        seed: Option<u64>,

        /// Catalog TOML file. Defaults to the built-in catalog.
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Reference date (YYYY-MM-DD) the dataset is generated as of.
        /// Defaults to today.
        #[arg(long = "as-of")]
        as_of: Option<NaiveDate>,

        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Check every bundle against the built-in consistency schema.
        #[arg(long)]
        verify: bool,
    },
    /// Re-check a JSON-lines dataset against the built-in consistency schema.
    Verify {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Validate a catalog and print its table sizes.
    Catalog {
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Structured logging on stderr. Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Generate {
            count,
            probability,
            seed,
            catalog,
            as_of,
            output,
            verify,
        } => run_generate(GenerateArgs {
            count,
            probability,
            seed,
            catalog,
            as_of,
            output,
            verify,
        }),
        Command::Verify { input } => run_verify(&input),
        Command::Catalog { catalog } => run_catalog(catalog.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("oncosynth error: {}", e);
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

struct GenerateArgs {
    count: u64,
    probability: f64,
    seed: Option<u64>,
    catalog: Option<PathBuf>,
    as_of: Option<NaiveDate>,
    output: Option<PathBuf>,
    verify: bool,
}

fn load_catalog(path: Option<&Path>) -> SynthResult<Catalog> {
    match path {
        Some(path) => Catalog::from_file(path),
        None => Catalog::builtin(),
    }
}

fn run_generate(args: GenerateArgs) -> SynthResult<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let reference_date = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let dataset_id = format!("seed-{seed}");

    let out: Box<dyn Write + Send> = match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| SynthError::SinkWriteFailed {
                reason: format!("failed to create '{}': {}", path.display(), e),
            })?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let writer = DatasetWriter::new(out);
    let synthesizer = Synthesizer::new(catalog, SynthesisConfig { reference_date });
    let mut assembler = Assembler::new(synthesizer, Box::new(writer.clone()));
    if args.verify {
        assembler = assembler.with_verifier(
            Box::new(ConsistencyVerifier::with_builtin_rules()),
            patient_bundle_schema(),
        );
    }

    info!(seed, %reference_date, "generating dataset");
    let mut ctx = GenerationContext::seeded(seed);
    let summary = assembler.run(&mut ctx, args.count, args.probability, &dataset_id)?;

    eprintln!("dataset:            {}", summary.dataset_id);
    eprintln!("run:                {}", summary.run_id.0);
    eprintln!("seed:               {}", seed);
    eprintln!("as of:              {}", reference_date);
    eprintln!("patients:           {}", summary.patients);
    eprintln!("defects:            {}", summary.defects);
    eprintln!("corrupted patients: {}", summary.corrupted_patients);
    if args.verify {
        eprintln!("inconsistent:       {}", summary.inconsistent.len());
    }
    eprintln!("sha256:             {}", writer.digest()?);
    Ok(())
}

fn run_verify(input: &Path) -> SynthResult<()> {
    let file = File::open(input).map_err(|e| SynthError::SchemaValidation {
        reason: format!("failed to open '{}': {}", input.display(), e),
    })?;
    let verifier = ConsistencyVerifier::with_builtin_rules();
    let schema = patient_bundle_schema();

    let (mut checked, mut inconsistent) = (0u64, 0u64);
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| SynthError::SchemaValidation {
            reason: format!("failed to read line {}: {}", index + 1, e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let bundle: PatientBundle =
            serde_json::from_str(&line).map_err(|e| SynthError::SchemaValidation {
                reason: format!("line {} is not a patient bundle: {}", index + 1, e),
            })?;

        let report = verifier.verify(&bundle, &schema)?;
        checked += 1;
        if !report.passed {
            inconsistent += 1;
            for failure in &report.failures {
                println!(
                    "patient {}: [{}] {}",
                    report.patient_id, failure.rule_id, failure.message
                );
            }
        }
    }

    eprintln!("checked:      {}", checked);
    eprintln!("inconsistent: {}", inconsistent);
    Ok(())
}

fn run_catalog(path: Option<&Path>) -> SynthResult<()> {
    let summary = load_catalog(path)?.summary();
    println!("stages:                {}", summary.stages);
    println!("post-neoadjuvant rows: {}", summary.post_neoadjuvant_rows);
    println!("comorbidities:         {}", summary.comorbidities);
    println!("oral drugs:            {}", summary.oral_drugs);
    println!("family cancers:        {}", summary.family_cancers);
    println!("regimens:              {}", summary.regimens);
    Ok(())
}
