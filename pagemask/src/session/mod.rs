//! # Overlay session
//!
//! The state machine tying everything together. Two layers are picked, each a single page of some
//! source. Once both exist, a mask at edit resolution selects between them, painted by pointer
//! events and shown through the soft preview blend. Output requests show an edit-tier hard cut at
//! once, then re-rasterize everything at output resolution in a background job.
//!
//! Collaborator failures never leave the session half-updated: a failed selection keeps the previous
//! one, and a failed output job leaves editing exactly as it was.

mod brush;
mod job;

pub use brush::{BrushMode, BrushState};
pub use job::{OutputArtifact, OutputKind};

use std::{num::NonZeroU32, sync::Arc};

use pagemask_core::{
    compositor::{CompositeError, Policy},
    mapper::{map_pointer_event, DisplaySize, MapError, PointerEvent},
    mask::REVEAL_TOP,
    tier::promote_mask_to_tier,
    DimensionError, LocalID, MaskBuffer, OpacityPercent, RasterImage, Tier, TierBounds, TierPair,
};

use crate::{
    assembly::{DocumentAssembler, DocumentBuildError},
    pipeline,
    sources::{PageRef, PageRenderError},
};

pub struct SelectionGeneration;
/// Identifies one combination of layer selections. Reallocated on every re-selection, so output
/// jobs can tell whether their result still applies.
pub type Generation = LocalID<SelectionGeneration>;

#[derive(strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum LayerId {
    Bottom,
    Top,
}

#[derive(strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum Phase {
    Empty,
    BottomSelected,
    TopSelected,
    /// Both layers present, mask editable.
    Editing,
    Previewing,
    Exporting,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("operation needs both layers selected and no output job running")]
    NotEditing,
    #[error("an output job is already running")]
    OutputJobInFlight,
    #[error("no output job to wait on")]
    NoOutputJob,
    #[error("output was discarded as layers changed while it rendered")]
    Discarded,
    #[error("output job ended without a result")]
    Lost,
    #[error("no async runtime to run output jobs on")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    #[error(transparent)]
    Render(#[from] PageRenderError),
    #[error(transparent)]
    Build(#[from] DocumentBuildError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    #[error("output job failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub bounds: TierBounds,
    pub brush: BrushState,
    pub preview_opacity: OpacityPercent,
}
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bounds: TierBounds::default(),
            brush: BrushState::default(),
            preview_opacity: OpacityPercent::HALF,
        }
    }
}

/// What the session currently shows.
#[derive(Clone, Debug)]
pub enum Composite {
    /// Soft blend of the edit tier, while painting.
    Preview(RasterImage),
    /// Hard cut, at the tier it was rendered at.
    Final { tier: Tier, image: RasterImage },
}
impl Composite {
    #[must_use]
    pub fn image(&self) -> &RasterImage {
        match self {
            Self::Preview(image) | Self::Final { image, .. } => image,
        }
    }
}

struct LayerSelection {
    page: PageRef,
    edit_raster: RasterImage,
}

/// Exists only while both layers do.
struct EditState {
    pair: TierPair,
    mask: MaskBuffer,
}

pub struct OverlaySession {
    bounds: TierBounds,
    brush: BrushState,
    preview_opacity: OpacityPercent,
    assembler: Arc<dyn DocumentAssembler>,

    bottom: Option<LayerSelection>,
    top: Option<LayerSelection>,
    edit: Option<EditState>,
    generation: Generation,

    display_size: Option<DisplaySize>,
    stroke_active: bool,
    displayed: Option<Composite>,
    job: Option<job::InFlight>,
}
impl OverlaySession {
    #[must_use]
    pub fn new(config: SessionConfig, assembler: Arc<dyn DocumentAssembler>) -> Self {
        Self {
            bounds: config.bounds,
            brush: config.brush,
            preview_opacity: config.preview_opacity,
            assembler,
            bottom: None,
            top: None,
            edit: None,
            generation: Generation::default(),
            display_size: None,
            stroke_active: false,
            displayed: None,
            job: None,
        }
    }
    /// [`Phase::Previewing`] and [`Phase::Exporting`] last until the job finishes, collected or
    /// not.
    #[must_use]
    pub fn phase(&self) -> Phase {
        if let Some(job) = self.current_job() {
            return match job.kind {
                OutputKind::Preview => Phase::Previewing,
                OutputKind::Export => Phase::Exporting,
            };
        }
        match (&self.bottom, &self.top, &self.edit) {
            (Some(_), Some(_), Some(_)) => Phase::Editing,
            (Some(_), _, _) => Phase::BottomSelected,
            (None, Some(_), _) => Phase::TopSelected,
            (None, None, _) => Phase::Empty,
        }
    }
    #[must_use]
    pub fn brush(&self) -> BrushState {
        self.brush
    }
    #[must_use]
    pub fn preview_opacity(&self) -> OpacityPercent {
        self.preview_opacity
    }
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }
    #[must_use]
    pub fn displayed(&self) -> Option<&Composite> {
        self.displayed.as_ref()
    }
    /// The edit-tier mask, if both layers are selected.
    #[must_use]
    pub fn mask(&self) -> Option<&MaskBuffer> {
        self.edit.as_ref().map(|edit| &edit.mask)
    }
    /// The page selected for a layer.
    #[must_use]
    pub fn layer(&self, layer: LayerId) -> Option<&PageRef> {
        self.slot(layer).as_ref().map(|selection| &selection.page)
    }
    /// The layer's own edit-tier raster, before canvas alignment.
    #[must_use]
    pub fn edit_raster(&self, layer: LayerId) -> Option<&RasterImage> {
        self.slot(layer)
            .as_ref()
            .map(|selection| &selection.edit_raster)
    }
    /// Both edit-tier layers on their shared canvas.
    #[must_use]
    pub fn edit_pair(&self) -> Option<&TierPair> {
        self.edit.as_ref().map(|edit| &edit.pair)
    }
    /// Whether a preview or export may be requested now. For enabling UI.
    #[must_use]
    pub fn can_request_output(&self) -> bool {
        self.edit.is_some() && self.current_job().is_none()
    }
    /// Whether a finished output job is waiting to be collected with
    /// [`Self::take_finished_output`] or [`Self::complete_output`].
    #[must_use]
    pub fn output_ready(&self) -> bool {
        self.job
            .as_ref()
            .is_some_and(|job| job.generation == self.generation && job.is_finished())
    }

    /// Pick a page for a layer, rasterizing it at the edit tier. If the other layer is already
    /// present, the mask is (re)initialized to reveal the top layer everywhere.
    ///
    /// Any running output job is aborted, its result would no longer match.
    /// # Errors
    /// Rasterizer failures. The previous selection is kept intact.
    pub async fn select_layer_page(
        &mut self,
        layer: LayerId,
        page: PageRef,
    ) -> Result<(), SessionError> {
        let rasterized =
            pipeline::rasterize_layer_for_tier(&page, Tier::Edit, &self.bounds).await;
        let edit_raster = match rasterized {
            Ok(raster) => raster,
            Err(e) => {
                log::warn!("Failed to select {page} as {} layer: {e}", layer.as_ref());
                return Err(e.into());
            }
        };

        self.invalidate_job();
        log::info!("Selected {page} as {} layer", layer.as_ref());
        *self.slot_mut(layer) = Some(LayerSelection { page, edit_raster });
        self.generation = Generation::default();
        self.stroke_active = false;

        self.edit = match (&self.bottom, &self.top) {
            (Some(bottom), Some(top)) => {
                let pair = TierPair::align(Tier::Edit, &bottom.edit_raster, &top.edit_raster);
                let mask = MaskBuffer::filled(pair.dimensions(), REVEAL_TOP);
                log::debug!("Editing on {} canvas", pair.dimensions());
                Some(EditState { pair, mask })
            }
            _ => None,
        };
        if self.edit.is_some() {
            self.refresh_preview()?;
        } else {
            self.displayed = None;
        }
        Ok(())
    }
    /// Drop both layers and the mask, back to [`Phase::Empty`]. Brush settings are kept.
    pub fn reset(&mut self) {
        self.invalidate_job();
        self.bottom = None;
        self.top = None;
        self.edit = None;
        self.displayed = None;
        self.stroke_active = false;
        self.generation = Generation::default();
        log::info!("Session reset");
    }

    /// # Errors
    /// [`SessionError::NotEditing`] outside [`Phase::Editing`].
    pub fn set_brush_mode(&mut self, mode: BrushMode) -> Result<(), SessionError> {
        self.editing()?;
        self.brush.mode = mode;
        Ok(())
    }
    /// Accepted in any phase.
    pub fn set_brush_radius(&mut self, radius: NonZeroU32) {
        self.brush.radius = radius;
    }
    /// # Errors
    /// [`SessionError::NotEditing`] outside [`Phase::Editing`].
    pub fn set_preview_opacity(&mut self, opacity: OpacityPercent) -> Result<(), SessionError> {
        self.editing()?;
        self.preview_opacity = opacity;
        self.refresh_preview()
    }
    /// Size of the on-screen element showing the composite. Until set, the display is assumed to
    /// show the edit canvas 1:1.
    pub fn set_display_size(&mut self, size: DisplaySize) {
        self.display_size = Some(size);
    }

    /// Stamp the brush at a display-space position.
    /// # Errors
    /// * [`SessionError::NotEditing`] outside [`Phase::Editing`].
    /// * [`SessionError::Map`] if the display size is degenerate.
    pub fn paint_at(&mut self, display_x: f32, display_y: f32) -> Result<(), SessionError> {
        let display_size = self.display_size;
        let brush = self.brush;
        let edit = self.editing_mut()?;
        let buffer = edit.mask.dimensions();
        let stamp = map_pointer_event(
            PointerEvent {
                local_x: display_x,
                local_y: display_y,
            },
            display_size.unwrap_or_else(|| DisplaySize::unscaled(buffer)),
            buffer,
            brush.radius.get() as f32,
        )?;
        edit.mask
            .stamp(stamp.x, stamp.y, stamp.radius, brush.mode.mask_value());
        self.refresh_preview()
    }
    /// Begin a stroke, painting immediately.
    /// # Errors
    /// See [`Self::paint_at`].
    pub fn pointer_down(&mut self, display_x: f32, display_y: f32) -> Result<(), SessionError> {
        self.paint_at(display_x, display_y)?;
        self.stroke_active = true;
        Ok(())
    }
    /// Continue a stroke. Moves with no stroke in progress are hovering and do nothing.
    /// # Errors
    /// See [`Self::paint_at`].
    pub fn pointer_move(&mut self, display_x: f32, display_y: f32) -> Result<(), SessionError> {
        if self.stroke_active {
            self.paint_at(display_x, display_y)
        } else {
            Ok(())
        }
    }
    pub fn pointer_up(&mut self) {
        self.stroke_active = false;
    }

    /// Reveal the bottom layer everywhere.
    /// # Errors
    /// [`SessionError::NotEditing`] outside [`Phase::Editing`].
    pub fn fill_bottom(&mut self) -> Result<(), SessionError> {
        self.fill(pagemask_core::mask::REVEAL_BOTTOM)
    }
    /// Reveal the top layer everywhere.
    /// # Errors
    /// [`SessionError::NotEditing`] outside [`Phase::Editing`].
    pub fn fill_top(&mut self) -> Result<(), SessionError> {
        self.fill(REVEAL_TOP)
    }
    /// Back to the initial all-top mask.
    /// # Errors
    /// [`SessionError::NotEditing`] outside [`Phase::Editing`].
    pub fn reset_mask(&mut self) -> Result<(), SessionError> {
        self.fill(REVEAL_TOP)
    }
    /// Replace the mask with an imported one, resampled onto the edit canvas.
    /// # Errors
    /// [`SessionError::NotEditing`] outside [`Phase::Editing`].
    pub fn import_mask(&mut self, mask: &MaskBuffer) -> Result<(), SessionError> {
        let edit = self.editing_mut()?;
        edit.mask = promote_mask_to_tier(mask, edit.pair.dimensions());
        log::debug!("Imported {} mask onto {} canvas", mask.dimensions(), edit.pair.dimensions());
        self.refresh_preview()
    }

    /// Show an edit-tier hard cut now, and start rendering the output tier in the background.
    /// Await the result with [`Self::complete_output`], or poll it with
    /// [`Self::take_finished_output`]. Editing resumes as soon as the job finishes.
    /// # Errors
    /// * [`SessionError::NotEditing`] or [`SessionError::OutputJobInFlight`] when not ready.
    /// * [`SessionError::NoRuntime`] outside a tokio runtime.
    pub fn request_preview(&mut self) -> Result<&RasterImage, SessionError> {
        self.request_output(OutputKind::Preview)
    }
    /// As [`Self::request_preview`], additionally assembling the output composite into a document
    /// sized to the bottom layer's page.
    /// # Errors
    /// See [`Self::request_preview`].
    pub fn request_export(&mut self) -> Result<&RasterImage, SessionError> {
        self.request_output(OutputKind::Export)
    }
    /// Wait for the outstanding output job. The result is returned, unless layers were re-selected
    /// since it was requested, in which case it is discarded and `None` returned.
    ///
    /// The output-tier composite replaces the edit-tier one in [`Self::displayed`]. If the mask was
    /// edited after the request, the live preview stays displayed instead.
    /// # Errors
    /// * [`SessionError::NoOutputJob`] if nothing was requested.
    /// * Any failure of the job. The session stays in [`Phase::Editing`], ready to retry.
    pub async fn complete_output(&mut self) -> Result<Option<OutputArtifact>, SessionError> {
        let job::InFlight {
            kind,
            generation,
            handle,
            result,
            ..
        } = self.job.take().ok_or(SessionError::NoOutputJob)?;
        let outcome = match result.await {
            Ok(outcome) => outcome,
            // No result means the task never got to send one.
            Err(_) => match handle.await {
                Err(e) => Err(e.into()),
                Ok(()) => Err(SessionError::Lost),
            },
        };
        self.publish(kind, generation, outcome)
    }
    /// Collect the output job if it already finished, without waiting. `None` while it still
    /// runs, if there is none, or if its result was stale.
    /// # Errors
    /// As [`Self::complete_output`].
    pub fn take_finished_output(&mut self) -> Result<Option<OutputArtifact>, SessionError> {
        if !self.job.as_ref().is_some_and(job::InFlight::is_finished) {
            return Ok(None);
        }
        let Some(mut job) = self.job.take() else {
            return Ok(None);
        };
        let outcome = job.result.try_recv().unwrap_or(Err(SessionError::Lost));
        self.publish(job.kind, job.generation, outcome)
    }
    /// Request a preview and wait for the output-tier composite.
    /// # Errors
    /// See [`Self::request_preview`] and [`Self::complete_output`].
    pub async fn preview_final(&mut self) -> Result<RasterImage, SessionError> {
        self.request_preview()?;
        let artifact = self.complete_output().await?.ok_or(SessionError::Discarded)?;
        Ok(artifact.composite)
    }
    /// Request an export and wait for the finished document bytes.
    /// # Errors
    /// See [`Self::request_export`] and [`Self::complete_output`].
    pub async fn export_final(&mut self) -> Result<Vec<u8>, SessionError> {
        self.request_export()?;
        self.complete_output()
            .await?
            .and_then(|artifact| artifact.document)
            .ok_or(SessionError::Discarded)
    }

    fn publish(
        &mut self,
        kind: OutputKind,
        generation: Generation,
        outcome: Result<OutputArtifact, SessionError>,
    ) -> Result<Option<OutputArtifact>, SessionError> {
        if generation != self.generation {
            log::info!(
                "Discarding stale {} output of {generation}, current is {}",
                kind.as_ref(),
                self.generation,
            );
            return Ok(None);
        }
        match outcome {
            Ok(artifact) => {
                log::info!(
                    "{} output ready: {}",
                    artifact.kind.as_ref(),
                    artifact.composite.dimensions()
                );
                // Only replace the immediate result. Anything else means the mask moved on.
                if let Some(Composite::Final {
                    tier: Tier::Edit, ..
                }) = self.displayed
                {
                    self.displayed = Some(Composite::Final {
                        tier: Tier::Output,
                        image: artifact.composite.clone(),
                    });
                } else {
                    log::debug!("Mask edited since the request, keeping the live preview");
                }
                Ok(Some(artifact))
            }
            Err(e) => {
                log::error!("{} output failed: {e}", kind.as_ref());
                Err(e)
            }
        }
    }
    fn request_output(&mut self, kind: OutputKind) -> Result<&RasterImage, SessionError> {
        if self.current_job().is_some() {
            return Err(SessionError::OutputJobInFlight);
        }
        let (Some(bottom), Some(top), Some(edit)) = (&self.bottom, &self.top, &self.edit) else {
            return Err(SessionError::NotEditing);
        };
        let runtime = tokio::runtime::Handle::try_current()?;
        let export_page = bottom.page.page_size()?;
        let immediate = edit.pair.compose(&edit.mask, Policy::Final)?;

        let input = job::JobInput {
            kind,
            bottom: bottom.page.clone(),
            top: top.page.clone(),
            edit_mask: edit.mask.clone(),
            bounds: self.bounds,
            export_page,
            assembler: self.assembler.clone(),
            cancelled: Arc::default(),
        };
        let replaced = self
            .job
            .replace(job::InFlight::spawn(&runtime, self.generation, input));
        if let Some(old) = replaced.filter(|old| old.generation == self.generation) {
            log::warn!("Dropping uncollected {} output", old.kind.as_ref());
        }
        self.stroke_active = false;
        log::info!("Started {} output job for {}", kind.as_ref(), self.generation);

        let displayed = self.displayed.insert(Composite::Final {
            tier: Tier::Edit,
            image: immediate,
        });
        Ok(displayed.image())
    }
    /// A still running job matching the current selections.
    fn current_job(&self) -> Option<&job::InFlight> {
        self.job
            .as_ref()
            .filter(|job| job.generation == self.generation && !job.is_finished())
    }
    /// Abort the job of the current selections. It stays in place, so the discard is observed by
    /// whoever collects it.
    ///
    /// The task stops at its next await. A decode or compose already on the blocking pool still
    /// runs to its end, then the job gives up at the next cancellation check.
    fn invalidate_job(&mut self) {
        let job = self.job.as_ref();
        if let Some(job) = job.filter(|job| job.generation == self.generation) {
            log::debug!("Aborting {} output job of {}", job.kind.as_ref(), job.generation);
            job.abort();
        }
    }
    fn fill(&mut self, value: u8) -> Result<(), SessionError> {
        self.editing_mut()?.mask.fill(value);
        self.refresh_preview()
    }
    fn editing(&self) -> Result<&EditState, SessionError> {
        if self.current_job().is_some() {
            return Err(SessionError::NotEditing);
        }
        self.edit.as_ref().ok_or(SessionError::NotEditing)
    }
    fn editing_mut(&mut self) -> Result<&mut EditState, SessionError> {
        self.editing()?;
        self.edit.as_mut().ok_or(SessionError::NotEditing)
    }
    fn refresh_preview(&mut self) -> Result<(), SessionError> {
        let edit = self.edit.as_ref().ok_or(SessionError::NotEditing)?;
        let preview = edit
            .pair
            .compose(&edit.mask, Policy::Preview(self.preview_opacity))?;
        self.displayed = Some(Composite::Preview(preview));
        Ok(())
    }
    fn slot(&self, layer: LayerId) -> &Option<LayerSelection> {
        match layer {
            LayerId::Bottom => &self.bottom,
            LayerId::Top => &self.top,
        }
    }
    fn slot_mut(&mut self, layer: LayerId) -> &mut Option<LayerSelection> {
        match layer {
            LayerId::Bottom => &mut self.bottom,
            LayerId::Top => &mut self.top,
        }
    }
}
impl std::fmt::Debug for OverlaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlaySession")
            .field("phase", &self.phase())
            .field("generation", &self.generation)
            .field("brush", &self.brush)
            .field("preview_opacity", &self.preview_opacity)
            .field("bottom", &self.layer(LayerId::Bottom).map(ToString::to_string))
            .field("top", &self.layer(LayerId::Top).map(ToString::to_string))
            .finish_non_exhaustive()
    }
}
