//! The deferred output-tier render. Runs detached from the session, owning snapshots of everything it
//! reads, and is matched back to the session by selection generation when it finishes.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use pagemask_core::{
    compositor::Policy, tier::promote_mask_to_tier, units::PageSize, MaskBuffer, RasterImage, Tier,
    TierBounds,
};

use super::{Generation, SessionError};
use crate::{assembly::DocumentAssembler, pipeline, sources::PageRef};

#[derive(strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum OutputKind {
    /// Output-tier composite for display only.
    Preview,
    /// Output-tier composite, assembled into a document.
    Export,
}

/// Result of a finished output job.
#[derive(Clone, Debug)]
pub struct OutputArtifact {
    pub kind: OutputKind,
    pub composite: RasterImage,
    /// Serialized document, for [`OutputKind::Export`] only.
    pub document: Option<Vec<u8>>,
}

/// Everything a job reads, cloned out of the session at request time.
pub(super) struct JobInput {
    pub kind: OutputKind,
    pub bottom: PageRef,
    pub top: PageRef,
    pub edit_mask: MaskBuffer,
    pub bounds: TierBounds,
    pub export_page: PageSize,
    pub assembler: Arc<dyn DocumentAssembler>,
    pub cancelled: Arc<AtomicBool>,
}

pub(super) struct InFlight {
    pub kind: OutputKind,
    pub generation: Generation,
    /// Set on abort. Checked between the blocking stages, which `abort` can't interrupt.
    pub cancelled: Arc<AtomicBool>,
    pub handle: tokio::task::JoinHandle<()>,
    /// Filled just before the task ends. Closed without a value if it was aborted or panicked.
    pub result: tokio::sync::oneshot::Receiver<Result<OutputArtifact, SessionError>>,
}
impl InFlight {
    /// Spawn `input` onto `runtime`.
    pub fn spawn(
        runtime: &tokio::runtime::Handle,
        generation: Generation,
        input: JobInput,
    ) -> Self {
        let kind = input.kind;
        let cancelled = input.cancelled.clone();
        let (sender, result) = tokio::sync::oneshot::channel();
        let handle = runtime.spawn(async move {
            // Receiver gone means nobody cares anymore.
            let _ = sender.send(run(input).await);
        });
        Self {
            kind,
            generation,
            cancelled,
            handle,
            result,
        }
    }
    /// Whether the task is over, with or without a result.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
    pub fn abort(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

pub(super) async fn run(input: JobInput) -> Result<OutputArtifact, SessionError> {
    let JobInput {
        kind,
        bottom,
        top,
        edit_mask,
        bounds,
        export_page,
        assembler,
        cancelled,
    } = input;
    let check_cancelled = move || {
        if cancelled.load(Ordering::Relaxed) {
            Err(SessionError::Discarded)
        } else {
            Ok(())
        }
    };

    let pair = pipeline::render_pair(&bottom, &top, Tier::Output, &bounds).await?;
    check_cancelled()?;

    // Compositing and encoding are long, uninterrupted CPU work.
    tokio::task::spawn_blocking(move || -> Result<OutputArtifact, SessionError> {
        let mask = promote_mask_to_tier(&edit_mask, pair.dimensions());
        let composite = pair.compose(&mask, Policy::Final)?;
        let document = match kind {
            OutputKind::Preview => None,
            OutputKind::Export => {
                check_cancelled()?;
                Some(assembler.build_single_image_document(
                    &composite,
                    export_page.width_pts(),
                    export_page.height_pts(),
                )?)
            }
        };
        Ok(OutputArtifact {
            kind,
            composite,
            document,
        })
    })
    .await?
}
