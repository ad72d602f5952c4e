use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use egui::{Color32, Pos2, Sense, Stroke};

use redactfe::geometry::{CoordinateMapper, DisplayRect, ImagePoint, Rect, select};
use redactfe::session::{ExportJob, ImageAsset, LoadJob};
use redactfe::{
    AppSettings, EditSession, FsGateway, GatewayError, PersistenceGateway, SessionError,
    SessionState,
};
use redactfe::{log_err, log_info, log_warn};

const ACCENT: Color32 = Color32::from_rgb(212, 175, 55);
const OK_GREEN: Color32 = Color32::from_rgb(74, 222, 128);
const ERR_RED: Color32 = Color32::from_rgb(239, 68, 68);
const MUTED: Color32 = Color32::from_rgb(136, 136, 136);

/// How long the "saved" confirmation stays in the status line.
const SAVED_FLASH: Duration = Duration::from_secs(2);

// ============================================================================
// ASYNC IO PIPELINE — listing / loading / saving run on rayon threads
// ============================================================================

/// Result delivered from a background IO job.
pub enum IoResult {
    Listed {
        root: PathBuf,
        result: Result<Vec<String>, GatewayError>,
    },
    Loaded {
        job: LoadJob,
        result: Result<ImageAsset, SessionError>,
    },
    Saved {
        job: ExportJob,
        result: Result<ImageAsset, SessionError>,
    },
}

/// Outline shown over a freshly redacted rectangle until `due`, after which
/// the mosaic is re-applied over it.
struct PendingHighlight {
    rect: Rect,
    epoch: u64,
    due: Instant,
}

/// Transient status message; falls back to the session summary when expired.
struct Flash {
    text: String,
    color: Color32,
    until: Option<Instant>,
}

pub struct RedactApp {
    settings: AppSettings,
    gateway: Arc<FsGateway>,
    session: EditSession,

    assets: Vec<String>,
    listing_error: Option<String>,

    io_sender: mpsc::Sender<IoResult>,
    io_receiver: mpsc::Receiver<IoResult>,
    pending_io_ops: usize,

    texture: Option<egui::TextureHandle>,
    texture_revision: u64,

    // Drag state: image-space anchor + last screen position for the rubber band
    drag_start: Option<ImagePoint>,
    drag_anchor_screen: Option<Pos2>,
    drag_last_screen: Option<Pos2>,

    highlight: Option<PendingHighlight>,
    /// Asset the user already tried to open over unsaved edits once.
    discard_armed: Option<String>,
    flash: Option<Flash>,
}

impl RedactApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        log_info!("image folder: {}", settings.image_dir.display());

        let gateway = Arc::new(FsGateway::new(settings.image_dir.clone()));
        let session = EditSession::new(settings.to_session_config());
        let (io_sender, io_receiver) = mpsc::channel();

        let mut app = Self {
            settings,
            gateway,
            session,
            assets: Vec::new(),
            listing_error: None,
            io_sender,
            io_receiver,
            pending_io_ops: 0,
            texture: None,
            texture_revision: u64::MAX,
            drag_start: None,
            drag_anchor_screen: None,
            drag_last_screen: None,
            highlight: None,
            discard_armed: None,
            flash: None,
        };
        app.spawn_listing();
        app
    }

    // --- Status line ---

    fn flash(&mut self, text: impl Into<String>, color: Color32, ttl: Option<Duration>) {
        self.flash = Some(Flash {
            text: text.into(),
            color,
            until: ttl.map(|d| Instant::now() + d),
        });
    }

    fn flash_error(&mut self, err: &SessionError) {
        self.flash(err.to_string(), ERR_RED, None);
    }

    fn status_text(&self) -> (String, Color32) {
        if let Some(f) = &self.flash
            && f.until.is_none_or(|t| Instant::now() < t)
        {
            return (f.text.clone(), f.color);
        }
        let name = self.session.identifier().unwrap_or("");
        let text = match self.session.state() {
            SessionState::Empty => "Ready. Pick an image on the left.".to_string(),
            SessionState::Loading => format!("Loading {}…", name),
            SessionState::Saving => format!("Saving {}…", name),
            SessionState::Ready => format!("Editing: {}", name),
            SessionState::Editing => format!("Editing: {} (unsaved)", name),
        };
        (text, MUTED)
    }

    // --- Background jobs ---

    fn spawn_listing(&mut self) {
        let gateway = Arc::clone(&self.gateway);
        let sender = self.io_sender.clone();
        self.pending_io_ops += 1;
        rayon::spawn(move || {
            let result = gateway.list_assets();
            let _ = sender.send(IoResult::Listed {
                root: gateway.root().to_path_buf(),
                result,
            });
        });
    }

    fn open_asset(&mut self, name: &str) {
        if self.session.is_dirty() && self.discard_armed.as_deref() != Some(name) {
            self.discard_armed = Some(name.to_string());
            self.flash(
                "Unsaved edits. Click the image again to discard them.",
                ACCENT,
                None,
            );
            return;
        }
        self.discard_armed = None;
        self.finalize_highlight();

        let job = match self.session.begin_load(name) {
            Ok(job) => job,
            Err(e) => {
                self.flash_error(&e);
                return;
            }
        };
        self.flash = None;
        self.highlight = None;
        self.drag_start = None;

        let gateway = Arc::clone(&self.gateway);
        let sender = self.io_sender.clone();
        self.pending_io_ops += 1;
        rayon::spawn(move || {
            let result = job.run(gateway.as_ref());
            let _ = sender.send(IoResult::Loaded { job, result });
        });
    }

    fn save(&mut self) {
        self.finalize_highlight();
        let job = match self.session.begin_export() {
            Ok(job) => job,
            Err(e) => {
                self.flash_error(&e);
                return;
            }
        };
        self.flash = None;

        let gateway = Arc::clone(&self.gateway);
        let sender = self.io_sender.clone();
        self.pending_io_ops += 1;
        rayon::spawn(move || {
            let result = job.run(gateway.as_ref());
            let _ = sender.send(IoResult::Saved { job, result });
        });
    }

    fn reset(&mut self) {
        self.highlight = None;
        match self.session.reset() {
            Ok(()) => {
                self.discard_armed = None;
                self.flash = None;
            }
            Err(e) => self.flash_error(&e),
        }
    }

    fn pick_folder(&mut self) {
        if self.session.state().is_busy() {
            self.flash_error(&SessionError::SessionBusy(self.session.state()));
            return;
        }
        if self.session.is_dirty() {
            self.flash("Save or reset before switching folders.", ACCENT, None);
            return;
        }
        let Some(dir) = rfd::FileDialog::new()
            .set_directory(&self.settings.image_dir)
            .pick_folder()
        else {
            return;
        };

        log_info!("switching image folder to {}", dir.display());
        self.settings.image_dir = dir.clone();
        self.settings.save();
        self.gateway = Arc::new(FsGateway::new(dir));
        self.session = EditSession::new(self.settings.to_session_config());
        self.texture = None;
        self.texture_revision = u64::MAX;
        self.highlight = None;
        self.assets.clear();
        self.listing_error = None;
        self.flash = None;
        self.spawn_listing();
    }

    fn poll_io(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.io_receiver.try_recv() {
            self.pending_io_ops = self.pending_io_ops.saturating_sub(1);
            match result {
                IoResult::Listed { root, result } => {
                    if root != self.gateway.root() {
                        continue;
                    }
                    match result {
                        Ok(names) => {
                            self.assets = names;
                            self.listing_error = None;
                        }
                        Err(e) => {
                            let err = SessionError::listing(e);
                            log_err!("{}", err);
                            self.assets.clear();
                            self.listing_error = Some(err.to_string());
                        }
                    }
                }
                IoResult::Loaded { job, result } => {
                    if let Err(e) = self.session.finish_load(job, result) {
                        self.flash_error(&e);
                    }
                }
                IoResult::Saved { job, result } => match self.session.finish_export(job, result) {
                    Ok(()) => self.flash("✓ Saved (file overwritten)", OK_GREEN, Some(SAVED_FLASH)),
                    Err(e) => self.flash_error(&e),
                },
            }
        }
        if self.pending_io_ops > 0 {
            ctx.request_repaint();
        }
    }

    // --- Canvas ---

    fn sync_texture(&mut self, ctx: &egui::Context) {
        if self.session.revision() == self.texture_revision {
            return;
        }
        self.texture_revision = self.session.revision();

        let Some(buffer) = self.session.buffer() else {
            self.texture = None;
            return;
        };
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [buffer.width() as usize, buffer.height() as usize],
            buffer.as_raw(),
        );
        match &mut self.texture {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("canvas", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    /// Re-apply the mosaic under the pending highlight now, if any.
    fn finalize_highlight(&mut self) {
        let Some(h) = self.highlight.take() else { return };
        if let Err(e) = self.session.refresh_mosaic(h.rect, h.epoch) {
            log_warn!("highlight refresh skipped: {}", e);
        }
    }

    fn tick_highlight(&mut self, ctx: &egui::Context) {
        let Some(due) = self.highlight.as_ref().map(|h| h.due) else { return };
        let now = Instant::now();
        if now >= due {
            self.finalize_highlight();
        } else {
            ctx.request_repaint_after(due - now);
        }
    }

    fn redact(&mut self, start: ImagePoint, end: ImagePoint) {
        let rect = match select(start, end, self.session.config().min_selection) {
            Ok(rect) => rect,
            Err(_) => return,
        };
        match self.session.apply_mosaic(rect) {
            Ok(written) => {
                self.discard_armed = None;
                self.flash = None;
                self.highlight = Some(PendingHighlight {
                    rect: written,
                    epoch: self.session.epoch(),
                    due: Instant::now() + Duration::from_millis(self.settings.highlight_ms),
                });
            }
            Err(e) if e.is_benign() => {}
            Err(e) => self.flash_error(&e),
        }
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let (tex_id, buffer_size) = match (&self.texture, self.session.buffer()) {
            (Some(tex), Some(buf)) => (tex.id(), buf.dimensions()),
            _ => {
                ui.centered_and_justified(|ui| {
                    let text = match self.session.state() {
                        SessionState::Loading => "Loading…",
                        _ => "Select an image to start editing",
                    };
                    ui.label(egui::RichText::new(text).size(20.0).color(MUTED));
                });
                return;
            }
        };

        // Fit to 95% of the workspace, keeping the aspect ratio.
        let outer = ui.available_rect_before_wrap();
        let (bw, bh) = (buffer_size.0 as f32, buffer_size.1 as f32);
        let ratio = ((outer.width() * 0.95) / bw).min((outer.height() * 0.95) / bh);
        let canvas_rect = egui::Rect::from_center_size(outer.center(), egui::vec2(bw * ratio, bh * ratio));
        let response = ui.allocate_rect(canvas_rect, Sense::drag());

        let painter = ui.painter_at(outer);
        painter.image(
            tex_id,
            canvas_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            Color32::WHITE,
        );

        let bounds = DisplayRect::new(
            canvas_rect.min.x,
            canvas_rect.min.y,
            canvas_rect.width(),
            canvas_rect.height(),
        );
        let mapper = match CoordinateMapper::new(bounds, buffer_size.0, buffer_size.1) {
            Ok(m) => m,
            // Window collapsed to nothing; try again next frame.
            Err(_) => return,
        };

        // Edits are blocked while a save is in flight.
        if !self.session.state().has_document() {
            self.drag_start = None;
            self.drag_anchor_screen = None;
            self.drag_last_screen = None;
            return;
        }
        if response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
        }

        if response.drag_started()
            && let Some(pos) = response.interact_pointer_pos()
        {
            self.finalize_highlight();
            self.drag_start = Some(mapper.to_image(pos.x, pos.y));
            self.drag_anchor_screen = Some(pos);
            self.drag_last_screen = Some(pos);
        }
        if response.dragged()
            && let Some(pos) = response.interact_pointer_pos()
        {
            self.drag_last_screen = Some(pos);
        }

        if let (Some(a), Some(b)) = (self.drag_anchor_screen, self.drag_last_screen) {
            painter.rect_stroke(egui::Rect::from_two_pos(a, b), 0.0, Stroke::new(1.5, ACCENT));
        }

        if response.drag_released() {
            let end_screen = response
                .interact_pointer_pos()
                .or_else(|| ui.input(|i| i.pointer.latest_pos()))
                .or(self.drag_last_screen);
            self.drag_anchor_screen = None;
            self.drag_last_screen = None;
            if let (Some(start), Some(end)) = (self.drag_start.take(), end_screen) {
                self.redact(start, mapper.to_image(end.x, end.y));
            }
        }

        if let Some(h) = &self.highlight {
            let d = mapper.to_display(h.rect);
            let r = egui::Rect::from_min_size(egui::pos2(d.left, d.top), egui::vec2(d.width, d.height));
            painter.rect_stroke(r, 0.0, Stroke::new(3.0, ACCENT.gamma_multiply(0.8)));
        }
    }
}

impl eframe::App for RedactApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_io(ctx);
        self.tick_highlight(ctx);
        self.sync_texture(ctx);

        let busy = self.session.state().is_busy();
        let has_doc = self.session.state().has_document();

        // --- Asset list ---
        let mut clicked: Option<String> = None;
        let mut refresh = false;
        egui::SidePanel::left("asset_list")
            .resizable(false)
            .exact_width(280.0)
            .show(ctx, |ui| {
                ui.add_space(6.0);
                ui.label(
                    egui::RichText::new(format!("IMAGES ({})", self.gateway.root().display()))
                        .small()
                        .strong()
                        .color(MUTED),
                );
                ui.separator();

                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .max_height(ui.available_height() - 90.0)
                    .show(ui, |ui| {
                        if let Some(err) = &self.listing_error {
                            ui.colored_label(ERR_RED, err);
                        } else if self.assets.is_empty() {
                            ui.colored_label(MUTED, "No images found");
                        }
                        let current = self.session.identifier();
                        for name in &self.assets {
                            let selected = current == Some(name.as_str());
                            if ui.selectable_label(selected, name).clicked() {
                                clicked = Some(name.clone());
                            }
                        }
                    });

                ui.separator();
                if ui.add_enabled(!busy, egui::Button::new("↻ Refresh list")).clicked() {
                    refresh = true;
                }
                ui.label(
                    egui::RichText::new(
                        "1. Pick an image\n2. Drag over the area to hide\n3. Overwrite save",
                    )
                    .small()
                    .color(MUTED),
                );
            });

        if let Some(name) = clicked {
            self.open_asset(&name);
        }
        if refresh {
            self.spawn_listing();
        }

        // --- Toolbar ---
        let mut action_save = false;
        let mut action_reset = false;
        let mut action_folder = false;
        let (status, status_color) = self.status_text();
        egui::TopBottomPanel::top("toolbar")
            .exact_height(48.0)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(egui::RichText::new(status).monospace().color(status_color));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let save = egui::Button::new(
                            egui::RichText::new("💾 Overwrite save").color(Color32::BLACK).strong(),
                        )
                        .fill(ACCENT);
                        action_save = ui.add_enabled(has_doc, save).clicked();
                        action_reset = ui.add_enabled(has_doc, egui::Button::new("↩ Reset")).clicked();
                        action_folder = ui.add_enabled(!busy, egui::Button::new("📁 Folder…")).clicked();
                    });
                });
            });

        if action_save {
            self.save();
        }
        if action_reset {
            self.reset();
        }
        if action_folder {
            self.pick_folder();
        }

        // --- Workspace ---
        self.sync_texture(ctx);
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::BLACK))
            .show(ctx, |ui| self.canvas_ui(ui));

        if let Some(Flash { until: Some(t), .. }) = &self.flash {
            let now = Instant::now();
            if now < *t {
                ctx.request_repaint_after(*t - now);
            }
        }
    }
}
