//! Entry points: render one document, or a batch of them in parallel.
//!
//! Every render decodes its own copy of the template bytes. The byte buffer
//! is shared read-only; decoded trees never outlive a single render.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::filename;
use crate::image::{self, InsertOutcome};
use crate::mapper::{self, Candidate, SessionDetails};
use crate::model::Document;
use crate::substitute::VariableMap;
use crate::walker;

/// What a render did, for logging and callers that care.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub paragraphs_changed: usize,
    pub tokens_applied: BTreeSet<String>,
    /// `None` when no image was supplied.
    pub image: Option<InsertOutcome>,
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

/// Render one document from `template`: substitute, then place the image
/// (if any) at the configured placeholder.
pub fn render(
    template: &[u8],
    variables: &VariableMap,
    config: &EngineConfig,
    image: Option<&[u8]>,
) -> Result<Rendered, EngineError> {
    let mut document = Document::decode(template)?;
    let transform = walker::transform(&mut document, variables, &config.forced_bold);

    let image_outcome = match image {
        Some(bytes) => {
            let outcome = image::insert_image(
                &mut document,
                &config.image_placeholder,
                bytes,
                config.image_size(),
            );
            if outcome == InsertOutcome::PlaceholderNotFound {
                log::info!("No {} placeholder in template", config.image_placeholder);
            }
            Some(outcome)
        }
        None => None,
    };

    let bytes = document.encode()?;

    log::info!(
        "Rendered document: {} of {} paragraph(s) changed, {} token(s) applied",
        transform.paragraphs_changed,
        transform.paragraphs_visited,
        transform.tokens_applied.len()
    );
    Ok(Rendered {
        bytes,
        report: RenderReport {
            paragraphs_changed: transform.paragraphs_changed,
            tokens_applied: transform.tokens_applied,
            image: image_outcome,
        },
    })
}

/// One document of a batch.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub file_name: String,
    pub variables: VariableMap,
    pub image: Option<Vec<u8>>,
}

impl RenderJob {
    pub fn for_candidate(
        candidate: &Candidate,
        session: &SessionDetails,
        extension: &str,
        image: Option<Vec<u8>>,
    ) -> Self {
        let file_name = filename::convocation_file_name(
            candidate.last_name.as_deref().unwrap_or_default(),
            candidate.first_name.as_deref().unwrap_or_default(),
            extension,
        );
        Self {
            file_name,
            variables: mapper::build_variables(candidate, session),
            image,
        }
    }
}

/// Render every job against the same template, in parallel.
///
/// The first decode or encode failure aborts the batch. Colliding file names
/// get `_2`, `_3`, ... suffixes in job order.
pub fn render_batch(
    template: &[u8],
    jobs: &[RenderJob],
    config: &EngineConfig,
) -> Result<BTreeMap<String, Vec<u8>>, EngineError> {
    let rendered: Vec<Rendered> = jobs
        .par_iter()
        .map(|job| render(template, &job.variables, config, job.image.as_deref()))
        .collect::<Result<_, _>>()?;

    let mut output = BTreeMap::new();
    for (job, doc) in jobs.iter().zip(rendered) {
        let name = unique_name(&output, &job.file_name);
        if name != job.file_name {
            log::warn!("Duplicate file name {}, stored as {}", job.file_name, name);
        }
        output.insert(name, doc.bytes);
    }
    log::info!("Rendered {} document(s)", output.len());
    Ok(output)
}

fn unique_name(taken: &BTreeMap<String, Vec<u8>>, name: &str) -> String {
    if !taken.contains_key(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| filename::with_suffix(name, n))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| name.to_string())
}
