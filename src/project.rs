use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::Rgba;
use uuid::Uuid;

use crate::canvas::{PixelBuffer, PixelSurface};
use crate::components::history::HistoryStack;
use crate::components::selection::{self, Selection, Tolerance, WandSettings};
use crate::error::{ExportError, ImageIoError, InpaintError, SelectionRejected};
use crate::io;
use crate::ops::ai::{InpaintJob, InpaintService, JobStatus};
use crate::ops::inpaint::{self, CanonicalTransform, InpaintRequest};
use crate::ops::paint::{self, StrokeStyle, StrokeTracker};
use crate::rig::RigAdapter;
use crate::settings::EditorSettings;

/// Result of a selection gesture. Rejections are a soft notice, never an
/// error: nothing changes when one is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The selection now holds `regions` regions.
    Applied { regions: usize },
    Rejected(SelectionRejected),
}

/// Result of polling an outstanding inpaint request.
#[derive(Debug)]
pub enum InpaintPoll {
    /// No request is outstanding.
    Idle,
    Pending,
    /// The response was merged and recorded in history.
    Merged,
    /// The request failed; buffer, history and selection are untouched.
    Failed(InpaintError),
}

struct PendingInpaint {
    job: InpaintJob,
    transform: CanonicalTransform,
    source_size: (u32, u32),
}

/// Single open texture document: the live buffer plus everything that edits
/// it. All methods run on the owning thread; only the inpaint network call
/// leaves it.
pub struct Project {
    pub id: Uuid,
    /// Display name (derived from path or "Untitled-X")
    pub name: String,
    /// `None` for unsaved/untitled textures.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    settings: EditorSettings,
    wand: WandSettings,
    surface: PixelSurface,
    history: HistoryStack,
    selection: Selection,
    stroke: StrokeTracker,
    pending_inpaint: Option<PendingInpaint>,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32, settings: EditorSettings) -> Self {
        let buffer = PixelBuffer::new_filled(width, height, settings.background_color);
        Self::from_buffer(format!("Untitled-{}", untitled_counter), buffer, settings)
    }

    pub fn from_buffer(name: impl Into<String>, buffer: PixelBuffer, settings: EditorSettings) -> Self {
        let mut project = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path: None,
            is_dirty: false,
            wand: settings.wand(),
            history: HistoryStack::new(settings.max_undo_steps),
            settings,
            surface: PixelSurface::default(),
            selection: Selection::new(),
            stroke: StrokeTracker::default(),
            pending_inpaint: None,
        };
        project.load_image(buffer);
        project.is_dirty = false;
        project
    }

    pub fn open(path: &Path, settings: EditorSettings) -> Result<Self, ImageIoError> {
        let buffer = io::load_image_sync(path)?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let mut project = Self::from_buffer(name, buffer, settings);
        project.path = Some(path.to_path_buf());
        Ok(project)
    }

    /// Replace the texture wholesale. History restarts from the new image,
    /// the selection is cleared and any outstanding inpaint is abandoned
    /// A stroke in progress is dropped along with the old pixels.
    pub fn load_image(&mut self, buffer: PixelBuffer) {
        if self.cancel_inpaint() {
            log::info!("Pending inpaint discarded by image load");
        }
        self.stroke = StrokeTracker::default();
        self.surface.load(buffer);
        self.selection.clear();
        self.history.clear();
        self.history.snapshot(&self.surface, "Open");
        self.is_dirty = true;
    }

    // ---- accessors ---------------------------------------------------------

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn buffer(&self) -> &PixelBuffer {
        self.surface.read()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn tolerance(&self) -> Tolerance {
        self.wand.tolerance
    }

    pub fn set_tolerance(&mut self, value: u32) {
        self.wand.tolerance = Tolerance::new(value);
    }

    // ---- selection ---------------------------------------------------------

    /// Magic wand at `seed`. Not recorded in history.
    pub fn select_magic_wand(&mut self, seed: (u32, u32), additive: bool) -> SelectOutcome {
        match selection::magic_wand(self.surface.read(), seed, &self.wand) {
            Ok(region) => {
                log::debug!(
                    "Magic wand at {:?} (tol {}) selected {:?}",
                    seed,
                    self.wand.tolerance.value(),
                    region.bounds()
                );
                self.selection.apply(region, additive);
                SelectOutcome::Applied { regions: self.selection.len() }
            }
            Err(reason) => {
                log::debug!("Magic wand rejected: {reason}");
                SelectOutcome::Rejected(reason)
            }
        }
    }

    /// Rectangle from a drag. Not recorded in history.
    pub fn select_rectangle(&mut self, start: (i32, i32), end: (i32, i32), additive: bool) -> SelectOutcome {
        let size = self.surface.read().dimensions();
        match selection::rectangle(start, end, size, self.wand.min_rect_size) {
            Ok(region) => {
                self.selection.apply(region, additive);
                SelectOutcome::Applied { regions: self.selection.len() }
            }
            Err(reason) => {
                log::debug!("Rectangle rejected: {reason}");
                SelectOutcome::Rejected(reason)
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ---- edits ---------------------------------------------------------------

    /// Pointer-down. An unfinished stroke is committed first.
    pub fn begin_stroke(&mut self, point: (f32, f32), style: StrokeStyle) {
        self.commit_stroke();
        let background = self.settings.background_color;
        self.stroke.begin(self.surface.buffer_mut(), point, style, background);
    }

    /// Pointer-move. Draws immediately; nothing is recorded until
    /// [`Project::end_stroke`].
    pub fn extend_stroke(&mut self, point: (f32, f32)) {
        self.stroke.extend(self.surface.buffer_mut(), point);
    }

    /// Pointer-up. Records one history entry for the whole stroke. Returns
    /// false when the stroke drew nothing.
    pub fn end_stroke(&mut self) -> bool {
        match self.stroke.finish() {
            Some((description, bounds)) => {
                log::info!("{description} finished, bounds {:?}", bounds);
                self.history.snapshot(&self.surface, &description);
                self.is_dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn cancel_stroke(&mut self) {
        self.stroke.cancel(self.surface.buffer_mut());
    }

    pub fn is_stroke_active(&self) -> bool {
        self.stroke.is_active()
    }

    /// Record an unfinished stroke before another history change, so a
    /// later cancel cannot roll back past it.
    fn commit_stroke(&mut self) {
        if self.stroke.is_active() {
            self.end_stroke();
        }
    }

    /// Recolor the selection, record it and clear the selection. Returns the
    /// number of recolored pixels; an empty selection does nothing.
    pub fn fill_selection(&mut self, color: Rgba<u8>) -> usize {
        if self.selection.is_empty() {
            return 0;
        }
        self.commit_stroke();
        let written = paint::fill_selection(
            self.surface.buffer_mut(),
            &self.selection,
            color,
            self.settings.fill_alpha_threshold,
        );
        log::info!("Fill recolored {written} pixels across {} regions", self.selection.len());
        self.history.snapshot(&self.surface, "Fill");
        self.selection.clear();
        self.is_dirty = true;
        written
    }

    // ---- history ---------------------------------------------------------------

    pub fn undo(&mut self) -> Option<String> {
        self.commit_stroke();
        let undone = self.history.undo(&mut self.surface);
        if undone.is_some() {
            self.is_dirty = true;
        }
        undone
    }

    /// A stroke still in progress is committed first, which drops the redo
    /// tail.
    pub fn redo(&mut self) -> Option<String> {
        self.commit_stroke();
        let redone = self.history.redo(&mut self.surface);
        if redone.is_some() {
            self.is_dirty = true;
        }
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ---- inpainting ------------------------------------------------------------

    pub fn is_inpainting(&self) -> bool {
        self.pending_inpaint.is_some()
    }

    /// Build the request from the current buffer + selection and send it on
    /// a worker thread. A second request while one is outstanding is
    /// rejected.
    pub fn start_inpaint(
        &mut self,
        service: Arc<dyn InpaintService>,
        prompt: &str,
        style: &str,
    ) -> Result<(), InpaintError> {
        if self.pending_inpaint.is_some() {
            log::warn!("Inpaint rejected: a request is already in flight");
            return Err(InpaintError::Concurrent);
        }
        self.commit_stroke();
        let request = InpaintRequest::build(
            self.surface.read(),
            &self.selection,
            prompt,
            style,
            self.settings.canonical_size,
        )?;
        log::info!(
            "Inpaint submitted: {} regions, style '{}', canonical {}²",
            self.selection.len(),
            style,
            request.transform.size
        );
        let job = InpaintJob::spawn(service, &request, self.settings.inpaint_timeout());
        self.pending_inpaint = Some(PendingInpaint {
            job,
            transform: request.transform,
            source_size: request.source_size,
        });
        Ok(())
    }

    /// Check on the outstanding request and merge it when it is done.
    pub fn poll_inpaint(&mut self) -> InpaintPoll {
        let Some(pending) = self.pending_inpaint.as_ref() else {
            return InpaintPoll::Idle;
        };
        match pending.job.poll() {
            JobStatus::Pending => InpaintPoll::Pending,
            JobStatus::Done(result) => {
                let pending = self.pending_inpaint.take();
                match (pending, result) {
                    (Some(p), Ok(image)) => match self.merge_inpaint(&p.transform, p.source_size, &image) {
                        Ok(()) => InpaintPoll::Merged,
                        Err(e) => InpaintPoll::Failed(e),
                    },
                    (_, Err(e)) => {
                        log::warn!("Inpaint failed: {e}");
                        InpaintPoll::Failed(e)
                    }
                    (None, Ok(_)) => InpaintPoll::Idle,
                }
            }
        }
    }

    /// Block until the outstanding request finishes, then merge it.
    /// Reports [`InpaintError::Cancelled`] when nothing was outstanding.
    pub fn wait_inpaint(&mut self) -> Result<(), InpaintError> {
        let Some(pending) = self.pending_inpaint.take() else {
            return Err(InpaintError::Cancelled);
        };
        let PendingInpaint { job, transform, source_size } = pending;
        match job.wait() {
            Ok(image) => self.merge_inpaint(&transform, source_size, &image),
            Err(e) => {
                log::warn!("Inpaint failed: {e}");
                Err(e)
            }
        }
    }

    /// Send and wait in one call.
    pub fn inpaint_blocking(
        &mut self,
        service: Arc<dyn InpaintService>,
        prompt: &str,
        style: &str,
    ) -> Result<(), InpaintError> {
        self.start_inpaint(service, prompt, style)?;
        self.wait_inpaint()
    }

    /// Abandon the outstanding request, if any. Its result will never be
    /// merged.
    pub fn cancel_inpaint(&mut self) -> bool {
        match self.pending_inpaint.take() {
            Some(p) => {
                p.job.cancel();
                true
            }
            None => false,
        }
    }

    fn merge_inpaint(
        &mut self,
        transform: &CanonicalTransform,
        source_size: (u32, u32),
        image: &image::RgbaImage,
    ) -> Result<(), InpaintError> {
        if self.surface.read().dimensions() != source_size {
            return Err(InpaintError::Decode(format!(
                "texture changed size from {:?} to {:?} while inpainting",
                source_size,
                self.surface.read().dimensions()
            )));
        }
        let fragment = inpaint::extract_fragment(image, transform, source_size)
            .inspect_err(|e| log::warn!("Inpaint response rejected: {e}"))?;
        self.commit_stroke();
        self.surface.blit(&fragment, fragment.bounds(), (0, 0));
        self.selection.clear();
        self.history.snapshot(&self.surface, "Inpaint");
        self.is_dirty = true;
        log::info!("Inpaint merged into {}×{} texture", source_size.0, source_size.1);
        Ok(())
    }

    // ---- export ---------------------------------------------------------------

    pub fn export_data_url(&self) -> Result<String, ImageIoError> {
        io::export_data_url(self.surface.read())
    }

    /// Push the current texture to the rig and ask it to reload.
    pub fn export_to_rig(&self, rig: &mut dyn RigAdapter, model: &str) -> Result<(), ExportError> {
        let url = self.export_data_url()?;
        rig.replace_texture(model, &url)?;
        rig.reload()?;
        log::info!("Exported texture to rig model '{model}'");
        Ok(())
    }

    pub fn save_png(&mut self, path: &Path) -> Result<(), ImageIoError> {
        io::save_png(self.surface.read(), path)?;
        self.path = Some(path.to_path_buf());
        self.update_name_from_path();
        self.mark_clean();
        Ok(())
    }

    // ---- document state --------------------------------------------------------

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}
