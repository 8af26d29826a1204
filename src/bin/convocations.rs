//! Generate convocations from a DOCX template.
//!
//! Usage:
//!   convocations fill --template t.docx --vars vars.txt [--image sig.png] -o out.docx
//!   convocations batch --template t.docx --recipients candidats.csv \
//!     --session session.json [--signature sig.png] [--threads 4] -o convocations.zip

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use convocation_docx::mapper::{parse_date, parse_time};
use convocation_docx::{
    render, render_batch, Candidate, EngineConfig, InsertOutcome, RenderJob, SessionDetails,
    VariableMap,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "convocations")]
#[command(about = "Fill DOCX convocation templates")]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true, env = "CONVOCATIONS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill one template from a variables file
    Fill {
        /// Template DOCX
        #[arg(short, long)]
        template: PathBuf,

        /// Variables file, one "TOKEN=value" per line
        #[arg(long)]
        vars: PathBuf,

        /// Image to place at the signature placeholder
        #[arg(long)]
        image: Option<PathBuf>,

        /// Output DOCX
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render one convocation per recipient into a zip archive
    Batch {
        /// Template DOCX
        #[arg(short, long)]
        template: PathBuf,

        /// Recipients CSV (groupe, civilite, nom, prenom, email, date_passage,
        /// heure_passage, salle, numero_jury)
        #[arg(short, long)]
        recipients: PathBuf,

        /// Session details (JSON)
        #[arg(short, long)]
        session: PathBuf,

        /// Signature image, embedded in every document
        #[arg(long)]
        signature: Option<PathBuf>,

        /// Extension of the generated file names
        #[arg(long, default_value = "docx")]
        extension: String,

        /// Number of worker threads (defaults to the number of CPUs)
        #[arg(long)]
        threads: Option<usize>,

        /// Output zip
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Fill {
            template,
            vars,
            image,
            output,
        } => fill(&template, &vars, image.as_deref(), &output, &config),
        Commands::Batch {
            template,
            recipients,
            session,
            signature,
            extension,
            threads,
            output,
        } => batch(
            &template,
            &recipients,
            &session,
            signature.as_deref(),
            &extension,
            threads,
            &output,
            &config,
        ),
    }
}

// ─── fill ───────────────────────────────────────────────────────────────────

fn fill(
    template: &Path,
    vars: &Path,
    image: Option<&Path>,
    output: &Path,
    config: &EngineConfig,
) -> Result<()> {
    let template_bytes = read_file(template, "template")?;
    let variables = load_variables(vars)?;
    println!("Loaded {} variable(s) from {}", variables.len(), vars.display());

    let image_bytes = image.map(|p| read_file(p, "image")).transpose()?;
    let rendered = render(&template_bytes, &variables, config, image_bytes.as_deref())
        .with_context(|| format!("Failed to render {}", template.display()))?;

    report_image(rendered.report.image, &config.image_placeholder);
    println!(
        "  {} paragraph(s) changed, tokens: {}",
        rendered.report.paragraphs_changed,
        rendered
            .report
            .tokens_applied
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );

    std::fs::write(output, &rendered.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn report_image(outcome: Option<InsertOutcome>, placeholder: &str) {
    match outcome {
        Some(InsertOutcome::Inserted) => println!("  Image placed at {}", placeholder),
        Some(InsertOutcome::PlaceholderNotFound) => {
            println!("  No {} placeholder, image skipped", placeholder)
        }
        Some(InsertOutcome::ImageUnreadable) => println!("  Image unreadable, skipped"),
        Some(InsertOutcome::InsertFailed) => println!("  Image could not be embedded, skipped"),
        None => {}
    }
}

/// Parse a variables file: one `TOKEN=value` per line, `#` comments, blank
/// lines ignored. `NOM` is read as `{{NOM}}`.
fn load_variables(path: &Path) -> Result<VariableMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read variables: {}", path.display()))?;
    Ok(parse_variables(&content))
}

fn parse_variables(content: &str) -> VariableMap {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((as_token(key), value.to_string()))
        })
        .collect()
}

fn as_token(key: &str) -> String {
    if key.starts_with("{{") && key.ends_with("}}") {
        key.to_string()
    } else {
        format!("{{{{{}}}}}", key.trim_start_matches("{{").trim_end_matches("}}"))
    }
}

// ─── batch ──────────────────────────────────────────────────────────────────

/// One CSV row. Column names follow the candidate import files.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecipientRow {
    groupe: String,
    civilite: String,
    nom: String,
    prenom: String,
    email: String,
    date_passage: String,
    heure_passage: String,
    salle: String,
    numero_jury: String,
}

impl RecipientRow {
    fn into_candidate(self) -> Candidate {
        Candidate {
            civility: non_blank(self.civilite),
            last_name: non_blank(self.nom),
            first_name: non_blank(self.prenom),
            email: non_blank(self.email),
            group: non_blank(self.groupe),
            exam_date: parse_date(&self.date_passage),
            exam_time: parse_time(&self.heure_passage),
            room: non_blank(self.salle),
            jury_number: non_blank(self.numero_jury),
        }
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_recipients(path: &Path) -> Result<Vec<Candidate>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Failed to open recipients CSV: {}", path.display()))?;
    let mut candidates = Vec::new();
    for (i, row) in reader.deserialize::<RecipientRow>().enumerate() {
        let row = row.with_context(|| format!("Invalid recipient on row {}", i + 1))?;
        candidates.push(row.into_candidate());
    }
    Ok(candidates)
}

#[allow(clippy::too_many_arguments)]
fn batch(
    template: &Path,
    recipients: &Path,
    session: &Path,
    signature: Option<&Path>,
    extension: &str,
    threads: Option<usize>,
    output: &Path,
    config: &EngineConfig,
) -> Result<()> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok(); // already initialized is fine
    }

    let template_bytes = read_file(template, "template")?;
    let session_json = std::fs::read_to_string(session)
        .with_context(|| format!("Failed to read session: {}", session.display()))?;
    let session: SessionDetails =
        serde_json::from_str(&session_json).context("Invalid session JSON")?;
    let signature = signature.map(|p| read_file(p, "signature")).transpose()?;

    let candidates = load_recipients(recipients)?;
    if candidates.is_empty() {
        bail!("No recipients in {}", recipients.display());
    }
    println!("Rendering {} convocation(s)...", candidates.len());

    let jobs: Vec<RenderJob> = candidates
        .iter()
        .map(|c| RenderJob::for_candidate(c, &session, extension, signature.clone()))
        .collect();
    let documents = render_batch(&template_bytes, &jobs, config)
        .with_context(|| format!("Failed to render {}", template.display()))?;

    write_zip(output, &documents)?;
    println!("Wrote {} document(s) to {}", documents.len(), output.display());
    Ok(())
}

fn write_zip(path: &Path, documents: &BTreeMap<String, Vec<u8>>) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in documents {
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", name))?;
        zip.write_all(bytes)?;
    }
    zip.finish().context("Failed to finish archive")?;
    Ok(())
}

fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}: {}", what, path.display()))
}
