use std::sync::Arc;

use image::RgbaImage;
use uuid::Uuid;

use crate::error::SessionError;
use crate::gateway::PersistenceGateway;
use crate::geometry::{DEFAULT_MIN_SELECTION, Rect, accept_selection};
use crate::io::{ExportFormat, decode_image};
use crate::ops::mosaic::{DEFAULT_REDUCTION_FACTOR, apply_mosaic, extract_region, write_region};
use crate::ops::resample::{Resampler, SmoothingFilter};
use crate::{log_err, log_info, log_warn};

// ============================================================================
// STATE + POLICY
// ============================================================================

/// Lifecycle of the single open document.
///
/// `Empty → Loading → Ready ⇄ Editing → Saving → Ready`; a failed load drops
/// back to `Empty`, a failed save back to whatever state preceded it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loading,
    Ready,
    Editing,
    Saving,
}

impl SessionState {
    /// An async load or save is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Loading | SessionState::Saving)
    }

    /// A document is open and idle.
    pub fn has_document(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Editing)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Empty => "empty",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Editing => "editing",
            SessionState::Saving => "saving",
        };
        f.write_str(s)
    }
}

/// Mosaic and export policy for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reduction factor `k` of the mosaic.
    pub mosaic_factor: u32,
    /// Selections below this on either axis are negligible.
    pub min_selection: u32,
    pub export: ExportFormat,
    pub smoothing: SmoothingFilter,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mosaic_factor: DEFAULT_REDUCTION_FACTOR,
            min_selection: DEFAULT_MIN_SELECTION,
            export: ExportFormat::default(),
            smoothing: SmoothingFilter::Area,
        }
    }
}

// ============================================================================
// IMAGE ASSET
// ============================================================================

/// The last committed version of a file: its bytes and their decoded pixels.
///
/// Immutable once built; a load or a successful save swaps in a new one.
#[derive(Clone, Debug)]
pub struct ImageAsset {
    identifier: String,
    bytes: Arc<[u8]>,
    pixels: RgbaImage,
}

impl ImageAsset {
    pub fn decode(identifier: impl Into<String>, bytes: Vec<u8>) -> Result<Self, SessionError> {
        let identifier = identifier.into();
        let pixels = decode_image(&bytes)
            .map_err(|e| SessionError::LoadFailed(format!("{}: {}", identifier, e)))?;
        Ok(Self {
            identifier,
            bytes: bytes.into(),
            pixels,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

// ============================================================================
// ASYNC JOBS — the I/O half of load / export, safe to run off-thread
// ============================================================================

/// Fetch + decode work for a pending load.
#[derive(Debug)]
pub struct LoadJob {
    ticket: u64,
    identifier: String,
}

impl LoadJob {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Fetch the bytes and decode them. Any gateway error is a `LoadFailed`.
    pub fn run(&self, gateway: &dyn PersistenceGateway) -> Result<ImageAsset, SessionError> {
        let bytes = gateway
            .fetch_asset(&self.identifier)
            .map_err(SessionError::load_failed)?;
        ImageAsset::decode(self.identifier.clone(), bytes)
    }
}

/// Encode + write work for a pending export, holding a snapshot of the buffer.
#[derive(Debug)]
pub struct ExportJob {
    ticket: u64,
    identifier: String,
    snapshot: RgbaImage,
    format: ExportFormat,
}

impl ExportJob {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Encode, verify the encoding decodes to the same size, then overwrite.
    ///
    /// Nothing is written unless the new origin is known to be valid.
    pub fn run(&self, gateway: &dyn PersistenceGateway) -> Result<ImageAsset, SessionError> {
        let bytes = self
            .format
            .encode(&self.snapshot)
            .map_err(|e| SessionError::SaveFailed(format!("encode error: {}", e)))?;

        let asset = ImageAsset::decode(self.identifier.clone(), bytes)
            .map_err(|e| SessionError::SaveFailed(e.to_string()))?;
        if asset.dimensions() != self.snapshot.dimensions() {
            return Err(SessionError::DimensionMismatch {
                expected: self.snapshot.dimensions(),
                actual: asset.dimensions(),
            });
        }

        gateway
            .write_asset(&self.identifier, asset.bytes())
            .map_err(SessionError::save_failed)?;
        Ok(asset)
    }
}

// ============================================================================
// EDIT SESSION
// ============================================================================

/// The one open document: origin asset, working buffer, dirty flag.
pub struct EditSession {
    id: Uuid,
    config: SessionConfig,
    resampler: Box<dyn Resampler>,
    state: SessionState,
    asset: Option<ImageAsset>,
    buffer: Option<RgbaImage>,
    is_dirty: bool,
    /// Identifier of the outstanding load (the asset is gone during `Loading`).
    pending_identifier: Option<String>,
    pending_ticket: Option<u64>,
    /// State to return to if the outstanding save fails.
    state_before_save: SessionState,
    next_ticket: u64,
    /// Bumped on every buffer mutation.
    revision: u64,
    /// Bumped whenever the buffer is repainted from an origin.
    epoch: u64,
    /// Pixels the last `apply_mosaic` wrote, and where.
    last_patch: Option<(Rect, RgbaImage)>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl EditSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_resampler(config, config.smoothing.resampler())
    }

    pub fn with_resampler(config: SessionConfig, resampler: Box<dyn Resampler>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            resampler,
            state: SessionState::Empty,
            asset: None,
            buffer: None,
            is_dirty: false,
            pending_identifier: None,
            pending_ticket: None,
            state_before_save: SessionState::Ready,
            next_ticket: 1,
            revision: 0,
            epoch: 0,
            last_patch: None,
        }
    }

    // --- Queries ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn buffer(&self) -> Option<&RgbaImage> {
        self.buffer.as_ref()
    }

    pub fn asset(&self) -> Option<&ImageAsset> {
        self.asset.as_ref()
    }

    /// The open (or loading) file's identifier.
    pub fn identifier(&self) -> Option<&str> {
        self.asset
            .as_ref()
            .map(ImageAsset::identifier)
            .or(self.pending_identifier.as_deref())
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Swap the mosaic/export policy. Takes effect on the next operation.
    pub fn set_config(&mut self, config: SessionConfig) {
        if config.smoothing != self.config.smoothing {
            self.resampler = config.smoothing.resampler();
        }
        self.config = config;
    }

    // --- Guards ---

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.state.is_busy() {
            return Err(SessionError::SessionBusy(self.state));
        }
        Ok(())
    }

    fn ensure_document(&self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if !self.state.has_document() {
            return Err(SessionError::InvalidState(self.state));
        }
        Ok(())
    }

    fn take_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending_ticket = Some(ticket);
        ticket
    }

    fn repaint_from_origin(&mut self) {
        self.buffer = self.asset.as_ref().map(|a| a.pixels().clone());
        self.last_patch = None;
        self.revision += 1;
        self.epoch += 1;
    }

    // --- Load ---

    /// Reserve the session for loading `identifier`; the open document is
    /// dropped immediately. Run the returned job, then call [`finish_load`].
    ///
    /// [`finish_load`]: EditSession::finish_load
    pub fn begin_load(&mut self, identifier: &str) -> Result<LoadJob, SessionError> {
        self.ensure_idle()?;
        if self.is_dirty {
            log_warn!(
                "[{}] discarding unsaved edits to {:?}",
                self.id,
                self.identifier()
            );
        }

        self.asset = None;
        self.buffer = None;
        self.last_patch = None;
        self.is_dirty = false;
        self.revision += 1;
        self.epoch += 1;
        self.state = SessionState::Loading;
        self.pending_identifier = Some(identifier.to_string());
        let ticket = self.take_ticket();

        log_info!("[{}] loading {}", self.id, identifier);
        Ok(LoadJob {
            ticket,
            identifier: identifier.to_string(),
        })
    }

    /// Commit the outcome of a [`LoadJob`].
    pub fn finish_load(
        &mut self,
        job: LoadJob,
        result: Result<ImageAsset, SessionError>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Loading || self.pending_ticket != Some(job.ticket) {
            return Err(SessionError::InvalidState(self.state));
        }
        self.pending_ticket = None;
        self.pending_identifier = None;

        match result {
            Ok(asset) => {
                log_info!(
                    "[{}] loaded {} ({}x{})",
                    self.id,
                    asset.identifier(),
                    asset.width(),
                    asset.height()
                );
                self.asset = Some(asset);
                self.repaint_from_origin();
                self.is_dirty = false;
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    SessionError::LoadFailed(_) => e,
                    other => SessionError::LoadFailed(other.to_string()),
                };
                log_err!("[{}] {}", self.id, e);
                self.asset = None;
                self.buffer = None;
                self.state = SessionState::Empty;
                Err(e)
            }
        }
    }

    /// Fetch, decode and open `identifier`, blocking the caller.
    pub fn load(
        &mut self,
        gateway: &dyn PersistenceGateway,
        identifier: &str,
    ) -> Result<(), SessionError> {
        let job = self.begin_load(identifier)?;
        let result = job.run(gateway);
        self.finish_load(job, result)
    }

    // --- Reset ---

    /// Repaint the whole buffer from the last loaded or saved origin.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.ensure_document()?;
        self.repaint_from_origin();
        self.is_dirty = false;
        self.state = SessionState::Ready;
        log_info!("[{}] reset to origin", self.id);
        Ok(())
    }

    // --- Mosaic ---

    /// Pixelate `rect` in the working buffer.
    ///
    /// Returns the rectangle actually rewritten (clipped to the image). A
    /// selection under the minimum size, or one lying entirely outside the
    /// image, is `NegligibleSelection` and leaves everything untouched.
    pub fn apply_mosaic(&mut self, rect: Rect) -> Result<Rect, SessionError> {
        self.ensure_document()?;
        let rect = accept_selection(rect, self.config.min_selection)?;
        let written = self.mosaic_in_place(rect)?;
        self.last_patch = self
            .buffer
            .as_ref()
            .map(|buffer| (written, extract_region(buffer, written)));

        self.is_dirty = true;
        self.state = SessionState::Editing;
        log_info!("[{}] mosaic {}", self.id, written);
        Ok(written)
    }

    /// Re-stamp the result of the last [`apply_mosaic`] over `rect` once its
    /// highlight is gone. The pixels come from the stored result, so the
    /// buffer ends bit-identical whichever smoothing filter is configured.
    /// Never touches the dirty flag.
    ///
    /// Returns `Ok(false)` and does nothing when the buffer was repainted
    /// since `epoch`, when `rect` is not the last redacted rectangle, or
    /// while a load or save is outstanding.
    ///
    /// [`apply_mosaic`]: EditSession::apply_mosaic
    pub fn refresh_mosaic(&mut self, rect: Rect, epoch: u64) -> Result<bool, SessionError> {
        if epoch != self.epoch || !self.state.has_document() {
            return Ok(false);
        }
        let Some((written, patch)) = &self.last_patch else {
            return Ok(false);
        };
        if *written != rect {
            return Ok(false);
        }
        let buffer = self
            .buffer
            .as_mut()
            .ok_or(SessionError::InvalidState(self.state))?;
        if extract_region(buffer, rect) != *patch {
            write_region(buffer, rect, patch);
            self.revision += 1;
        }
        Ok(true)
    }

    fn mosaic_in_place(&mut self, rect: Rect) -> Result<Rect, SessionError> {
        let expected = self
            .asset
            .as_ref()
            .map(ImageAsset::dimensions)
            .ok_or(SessionError::InvalidState(self.state))?;
        let buffer = self
            .buffer
            .as_mut()
            .ok_or(SessionError::InvalidState(self.state))?;
        if buffer.dimensions() != expected {
            return Err(SessionError::DimensionMismatch {
                expected,
                actual: buffer.dimensions(),
            });
        }

        let written = apply_mosaic(buffer, rect, self.config.mosaic_factor, &*self.resampler)
            .ok_or(SessionError::NegligibleSelection {
                width: 0,
                height: 0,
            })?;
        self.revision += 1;
        Ok(written)
    }

    // --- Export ---

    /// Snapshot the buffer and reserve the session for saving. Run the
    /// returned job, then call [`finish_export`].
    ///
    /// [`finish_export`]: EditSession::finish_export
    pub fn begin_export(&mut self) -> Result<ExportJob, SessionError> {
        self.ensure_document()?;
        let (identifier, expected) = match &self.asset {
            Some(a) => (a.identifier().to_string(), a.dimensions()),
            None => return Err(SessionError::InvalidState(self.state)),
        };
        let snapshot = match &self.buffer {
            Some(b) if b.dimensions() == expected => b.clone(),
            Some(b) => {
                return Err(SessionError::DimensionMismatch {
                    expected,
                    actual: b.dimensions(),
                });
            }
            None => return Err(SessionError::InvalidState(self.state)),
        };

        self.state_before_save = self.state;
        self.state = SessionState::Saving;
        let ticket = self.take_ticket();

        log_info!("[{}] saving {}", self.id, identifier);
        Ok(ExportJob {
            ticket,
            identifier,
            snapshot,
            format: self.config.export,
        })
    }

    /// Commit the outcome of an [`ExportJob`]. On success the written bytes
    /// become the new origin and the buffer is repainted from them; on
    /// failure the session is left as it was.
    pub fn finish_export(
        &mut self,
        job: ExportJob,
        result: Result<ImageAsset, SessionError>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Saving || self.pending_ticket != Some(job.ticket) {
            return Err(SessionError::InvalidState(self.state));
        }
        self.pending_ticket = None;

        match result {
            Ok(asset) => {
                log_info!(
                    "[{}] saved {} ({} bytes)",
                    self.id,
                    asset.identifier(),
                    asset.bytes().len()
                );
                self.asset = Some(asset);
                // The buffer shows exactly what is on disk now.
                self.repaint_from_origin();
                self.is_dirty = false;
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    SessionError::SaveFailed(_) => e,
                    other => SessionError::SaveFailed(other.to_string()),
                };
                log_err!("[{}] {}", self.id, e);
                self.state = self.state_before_save;
                Err(e)
            }
        }
    }

    /// Encode and overwrite the file, blocking the caller.
    pub fn export(&mut self, gateway: &dyn PersistenceGateway) -> Result<(), SessionError> {
        let job = self.begin_export()?;
        let result = job.run(gateway);
        self.finish_export(job, result)
    }
}
