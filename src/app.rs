#![allow(clippy::collapsible_else_if)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::egui::{
    self, Align2, Color32, CornerRadius, FontId, RichText, Sense, Stroke, StrokeKind, Ui,
};

use crate::config::ViewerConfig;
use crate::loader::{LoadEvent, LoadSource, Loader};
use crate::record::Category;
use crate::search::SearchQuery;
use crate::session::Session;
use crate::viewport::{ViewportWindow, auto_fit_columns, center_offset};

const CELL_FONT_SIZE: f32 = 13.0;
const CELL_TEXT_INSET: f32 = 4.0;
const FALLBACK_CONTAINER_WIDTH: f32 = 1000.0;

enum RowAction {
    Select { position: usize, additive: bool },
    Mark(usize),
}

pub struct LogViewer {
    config: ViewerConfig,
    loader: Loader,
    session: Session,

    file_path: Option<PathBuf>,
    loading_progress: f32,
    status: String,

    search: SearchQuery,
    show_search: bool,

    column_widths: Vec<f32>,
    needs_auto_fit: bool,
    visible_range: (usize, usize),
    viewport_height: f32,
    scroll_memory: Option<f32>,
    stabilize_counter: i32,
    dark_mode: bool,

    show_message: Option<(String, f32)>,
    message_timer: Option<f64>,
    copy_message: Option<(String, f64)>,

    render_duration: Duration,
}

impl LogViewer {
    pub fn new(config: ViewerConfig, initial_file: Option<PathBuf>) -> Self {
        let mut viewer = Self {
            session: Session::new(config.clone()),
            config,
            loader: Loader::new(),

            file_path: None,
            loading_progress: 0.0,
            status: "No file loaded".to_string(),

            search: SearchQuery {
                term: String::new(),
                module: true,
                context: true,
            },
            show_search: false,

            column_widths: Vec::new(),
            needs_auto_fit: true,
            visible_range: (0, 0),
            viewport_height: 0.0,
            scroll_memory: None,
            stabilize_counter: 0,
            dark_mode: true,

            show_message: None,
            message_timer: None,
            copy_message: None,

            render_duration: Duration::ZERO,
        };

        if let Some(path) = initial_file {
            viewer.open(LoadSource::Path(path));
        }
        viewer
    }

    fn open(&mut self, source: LoadSource) {
        let active = self.session.active();
        self.session = Session::new(self.config.clone());
        if active != Category::Trace {
            self.session.switch_to(active, Instant::now());
        }

        self.file_path = source.path().map(|p| p.to_path_buf());
        self.loading_progress = 0.0;
        self.visible_range = (0, 0);
        self.scroll_memory = None;
        self.stabilize_counter = 0;
        self.column_widths.clear();
        self.status = format!("Loading {}...", source.label());
        self.message_timer = None;
        self.show_message = Some((self.status.clone(), 3.0));

        self.loader.start(source, &self.config);
    }

    fn process_load_events(&mut self) {
        for event in self.loader.poll() {
            match event {
                LoadEvent::Progress(pct) => self.loading_progress = pct,
                LoadEvent::Finished(outcome) => {
                    self.status = outcome.status();
                    let active = self.session.active();
                    self.session = Session::from_outcome(*outcome, self.config.clone(), active);
                    self.loading_progress = 100.0;
                    self.needs_auto_fit = true;

                    let bookmarks = self.session.bookmarks().len();
                    if bookmarks > 0 {
                        self.show_message =
                            Some((format!("Restored {} bookmarks", bookmarks), 3.0));
                        self.message_timer = None;
                    }
                }
                LoadEvent::Empty => {
                    self.status = "File content is empty".to_string();
                    self.show_message = Some((self.status.clone(), 3.0));
                    self.message_timer = None;
                }
                LoadEvent::Failed(message) => {
                    self.status = message.clone();
                    self.show_message = Some((message, 5.0));
                    self.message_timer = None;
                    self.file_path = None;
                }
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().next() else {
            return;
        };

        if let Some(path) = file.path {
            self.open(LoadSource::Path(path));
        } else if let Some(bytes) = file.bytes {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            self.open(LoadSource::Text(text));
        } else {
            log::warn!("dropped item '{}' has neither path nor content", file.name);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (bookmark, find, escape, copy) = ctx.input(|i| {
            (
                i.modifiers.command && i.key_pressed(egui::Key::B),
                i.modifiers.command && i.key_pressed(egui::Key::F),
                i.key_pressed(egui::Key::Escape),
                i.events.iter().any(|e| matches!(e, egui::Event::Copy)),
            )
        });

        if bookmark {
            self.toggle_bookmarks();
        }
        if find {
            self.show_search = true;
        }
        if escape {
            self.show_search = false;
            self.session.clear_search();
            self.session.clear_highlight();
            self.session.clear_selection();
        }
        if copy && ctx.memory(|m| m.focused()).is_none() && self.session.selection_len() > 0 {
            self.copy_selection(ctx);
        }
    }

    fn toggle_bookmarks(&mut self) {
        let removing = self.session.active() == Category::Bookmarks;
        match self.session.toggle_bookmarks() {
            Ok(true) => {
                let verb = if removing { "Removed from" } else { "Added to" };
                self.show_message = Some((format!("{} bookmarks", verb), 2.0));
                self.message_timer = None;
            }
            Ok(false) => {}
            Err(e) => {
                log::error!("failed to save bookmarks: {}", e);
                self.show_message = Some((format!("Failed to save bookmarks: {}", e), 5.0));
                self.message_timer = None;
            }
        }
    }

    fn copy_selection(&mut self, ctx: &egui::Context) {
        match self.session.copy_selection() {
            Ok(text) => {
                let rows = self.session.selection_len();
                ctx.copy_text(text);
                self.copy_message = Some((format!("{} rows copied", rows), ctx.input(|i| i.time)));
            }
            Err(e) => {
                log::error!("copy failed: {}", e);
                self.show_message = Some((format!("Copy failed: {}", e), 3.0));
                self.message_timer = None;
            }
        }
    }

    fn switch_tab(&mut self, category: Category) {
        if let Some(position) = self.session.switch_to(category, Instant::now()) {
            log::debug!("tab switch synced to row {}", position);
        }
        self.needs_auto_fit = true;
        self.visible_range = (0, 0);
    }

    fn run_search(&mut self) {
        if !self.search.is_active() {
            self.session.clear_search();
            return;
        }
        let hits = self.session.run_search(&self.search);
        self.show_message = Some((format!("Found {} matches", hits), 3.0));
        self.message_timer = None;
    }

    fn row_colors(&self, position: usize, now: Instant) -> (Color32, Stroke) {
        let highlighted = self.session.is_highlighted(position, now);
        let flashing = self.session.is_flashing(position, now);
        let selected = self.session.is_selected(position);
        let hit = self.session.is_search_hit(position);

        let bg = if highlighted {
            if self.dark_mode {
                Color32::from_rgb(80, 55, 0)
            } else {
                Color32::from_rgb(255, 245, 200)
            }
        } else if selected {
            if self.dark_mode {
                Color32::from_rgb(30, 60, 100)
            } else {
                Color32::from_rgb(200, 220, 255)
            }
        } else if flashing {
            if self.dark_mode {
                Color32::from_rgb(30, 75, 60)
            } else {
                Color32::from_rgb(210, 245, 225)
            }
        } else if position % 2 == 0 {
            if self.dark_mode {
                Color32::from_rgb(32, 33, 36)
            } else {
                Color32::from_rgb(245, 245, 245)
            }
        } else {
            if self.dark_mode {
                Color32::from_rgb(40, 41, 45)
            } else {
                Color32::from_rgb(255, 255, 255)
            }
        };

        let stroke = if highlighted {
            Stroke::new(2.0, Color32::from_rgb(255, 165, 0))
        } else if hit {
            Stroke::new(1.0, Color32::from_rgb(200, 150, 0))
        } else {
            Stroke::NONE
        };

        (bg, stroke)
    }

    fn text_color(&self) -> Color32 {
        if self.dark_mode {
            Color32::LIGHT_GRAY
        } else {
            Color32::DARK_GRAY
        }
    }

    fn auto_fit(&mut self, ui: &Ui, category: Category) {
        let font = FontId::monospace(CELL_FONT_SIZE);
        let char_width = ui.fonts(|f| f.glyph_width(&font, '0'));
        let container = if ui.available_width() > 0.0 {
            ui.available_width()
        } else {
            FALLBACK_CONTAINER_WIDTH
        };

        let records = self.session.records(category);
        let window = ViewportWindow::compute(
            records.len(),
            0.0,
            self.config.row_height,
            self.viewport_height,
        );
        let (start, end) = if self.visible_range.1 > self.visible_range.0 {
            self.visible_range
        } else {
            (window.start, window.end)
        };
        let end = end.min(records.len());
        let start = start.min(end);

        self.column_widths = auto_fit_columns(
            self.session.headers(category),
            records[start..end].iter().map(|r| r.fields.as_slice()),
            char_width,
            container,
        );
        self.needs_auto_fit = false;
    }

    fn render_header(&self, ui: &mut Ui, category: Category) {
        let headers = self.session.headers(category);
        let width: f32 = self.column_widths.iter().sum();
        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(width.max(ui.available_width()), self.config.row_height),
            Sense::hover(),
        );
        if !ui.is_rect_visible(rect) {
            return;
        }

        let fill = if self.dark_mode {
            Color32::from_rgb(50, 52, 58)
        } else {
            Color32::from_rgb(225, 225, 230)
        };
        ui.painter()
            .rect(rect, CornerRadius::ZERO, fill, Stroke::NONE, StrokeKind::Inside);

        let font = FontId::proportional(CELL_FONT_SIZE);
        let mut x = rect.left();
        for (label, width) in headers.iter().zip(&self.column_widths) {
            let cell = egui::Rect::from_min_size(egui::pos2(x, rect.top()), egui::vec2(*width, rect.height()));
            ui.painter_at(cell).text(
                cell.left_center() + egui::vec2(CELL_TEXT_INSET, 0.0),
                Align2::LEFT_CENTER,
                label,
                font.clone(),
                ui.visuals().strong_text_color(),
            );
            x += width;
        }
    }

    fn render_row(&self, ui: &mut Ui, category: Category, position: usize, now: Instant) -> Option<RowAction> {
        let record = self.session.records(category).get(position)?;
        let width: f32 = self.column_widths.iter().sum();
        let (rect, response) = ui.allocate_exact_size(
            egui::vec2(width.max(ui.available_width()), self.config.row_height),
            Sense::click(),
        );

        if ui.is_rect_visible(rect) {
            let (bg, stroke) = self.row_colors(position, now);
            ui.painter()
                .rect(rect, CornerRadius::ZERO, bg, stroke, StrokeKind::Inside);

            let font = FontId::monospace(CELL_FONT_SIZE);
            let color = self.text_color();
            let columns = self.column_widths.len();
            let mut x = rect.left();
            for (col, width) in self.column_widths.iter().enumerate() {
                let text = if col == 0 && record.stable_index.is_none() {
                    record.display_index()
                } else {
                    record.cell(col, columns).into_owned()
                };
                let cell = egui::Rect::from_min_size(egui::pos2(x, rect.top()), egui::vec2(*width, rect.height()));
                ui.painter_at(cell).text(
                    cell.left_center() + egui::vec2(CELL_TEXT_INSET, 0.0),
                    Align2::LEFT_CENTER,
                    text,
                    font.clone(),
                    color,
                );
                x += width;
            }
        }

        if response.double_clicked() {
            Some(RowAction::Mark(position))
        } else if response.clicked() {
            let additive = ui.input(|i| i.modifiers.command || i.modifiers.ctrl);
            Some(RowAction::Select { position, additive })
        } else {
            None
        }
    }

    fn render_table(&mut self, ui: &mut Ui) {
        let category = self.session.active();
        let row_height = self.config.row_height;
        let total = self.session.records(category).len();

        if self.needs_auto_fit || self.column_widths.len() != self.session.headers(category).len() {
            self.auto_fit(ui, category);
        }

        ui.spacing_mut().item_spacing.y = 0.0;
        self.render_header(ui, category);
        self.viewport_height = ui.available_height();

        let mut scroll_area = egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .id_salt(("record_table", category.id()));

        if let Some(position) = self.session.take_scroll_request() {
            self.scroll_memory = Some(center_offset(position, row_height, self.viewport_height));
            self.stabilize_counter = 3;
        }

        if self.stabilize_counter > 0 {
            if let Some(scroll_pos) = self.scroll_memory {
                scroll_area = scroll_area.vertical_scroll_offset(scroll_pos);
                self.stabilize_counter -= 1;
                if self.stabilize_counter == 0 {
                    self.scroll_memory = None;
                }
            } else {
                self.stabilize_counter = 0;
            }
        }

        let now = Instant::now();
        let mut actions = Vec::new();
        let mut rendered = None;

        scroll_area.show_viewport(ui, |ui, viewport| {
            ui.spacing_mut().item_spacing.y = 0.0;
            let window = ViewportWindow::compute(total, viewport.min.y, row_height, viewport.height());

            ui.add_space(window.top_spacer);
            for position in window.rows() {
                if let Some(action) = self.render_row(ui, category, position, now) {
                    actions.push(action);
                }
            }
            ui.add_space(window.bottom_spacer);

            rendered = Some(window);
        });

        if let Some(window) = rendered {
            self.visible_range = (window.start, window.end);
            self.session.on_rendered(&window, now);
        }

        for action in actions {
            match action {
                RowAction::Select { position, additive } => self.session.select(position, additive),
                RowAction::Mark(position) => {
                    if self.session.mark(position, now) {
                        if let Some(mark) = self.session.current_mark() {
                            self.show_message = Some((
                                format!("Marked index {} for sync", mark.stable_index),
                                2.0,
                            ));
                            self.message_timer = None;
                        }
                    }
                }
            }
        }
    }

    fn render_search_panel(&mut self, ctx: &egui::Context) {
        let mut jump = None;

        egui::SidePanel::right("search_results")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| {
                ui.heading("Search results");
                ui.label(format!("{} matches", self.session.hits().len()));
                ui.separator();

                egui::ScrollArea::vertical()
                    .id_salt("search_hits")
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        for hit in self.session.hits() {
                            let text = format!("[{}] {}", hit.category.display_name(), hit.fields.join(" | "));
                            let response = ui
                                .add(
                                    egui::Label::new(RichText::new(text).monospace())
                                        .truncate()
                                        .sense(Sense::click()),
                                )
                                .on_hover_text("Double-click to jump");
                            if response.double_clicked() {
                                jump = hit.stable_index.map(|idx| (hit.category, idx));
                            }
                        }
                    });
            });

        if let Some((category, stable_index)) = jump {
            self.jump_to_hit(category, stable_index, Instant::now());
        }
    }

    fn jump_to_hit(&mut self, category: Category, stable_index: i64, now: Instant) {
        if self.session.jump_to_exact(category, stable_index, now).is_some() {
            self.needs_auto_fit = true;
            self.visible_range = (0, 0);
        } else {
            self.show_message = Some((format!("Index {} not found", stable_index), 2.0));
            self.message_timer = None;
        }
    }

    fn render_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                if ui.button("📂 Open").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Log Files", &["txt", "log"])
                        .add_filter("All Files", &["*"])
                        .pick_file()
                    {
                        self.open(LoadSource::Path(path));
                    }
                }

                if let Some(path) = &self.file_path {
                    let filename = path.file_name().unwrap_or_default().to_string_lossy().to_string();
                    ui.label(filename).on_hover_text(path.display().to_string());
                } else {
                    ui.label("No file loaded.");
                }

                if self.loader.is_running() {
                    ui.add(
                        egui::ProgressBar::new(self.loading_progress / 100.0)
                            .show_percentage()
                            .desired_width(200.0),
                    );
                }

                ui.separator();

                if ui
                    .button(if self.show_search { "🔼 Hide Search" } else { "🔍 Search" })
                    .clicked()
                {
                    self.show_search = !self.show_search;
                }
                if self.show_search {
                    let text_edit = ui.add(
                        egui::TextEdit::singleline(&mut self.search.term)
                            .desired_width(150.0)
                            .hint_text("Enter search term..."),
                    );
                    let module = ui.checkbox(&mut self.search.module, "Module").changed();
                    let context = ui.checkbox(&mut self.search.context, "Context").changed();

                    if text_edit.changed() || module || context {
                        self.run_search();
                    }
                }

                ui.separator();

                if ui
                    .button(if self.dark_mode { "☀️" } else { "🌙" })
                    .on_hover_text("Toggle light/dark mode")
                    .clicked()
                {
                    self.dark_mode = !self.dark_mode;
                    ctx.set_visuals(if self.dark_mode {
                        egui::Visuals::dark()
                    } else {
                        egui::Visuals::light()
                    });
                }
            });

            ui.horizontal(|ui| {
                let active = self.session.active();
                for category in Category::ALL {
                    let count = self.session.records(category).len();
                    let label = format!("{} ({})", category.display_name(), count);
                    if ui.selectable_label(active == category, label).clicked() && active != category {
                        self.switch_tab(category);
                    }
                }
            });
        });
    }

    fn render_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);

                let total = self.session.records(self.session.active()).len();
                if total > 0 {
                    ui.separator();
                    ui.label(format!(
                        "Visible: {} - {} of {}",
                        self.visible_range.0 + 1,
                        self.visible_range.1,
                        total
                    ));
                }
                if self.session.selection_len() > 0 {
                    ui.separator();
                    ui.label(format!("Selected: {}", self.session.selection_len()));
                }

                ui.separator();
                ui.label(format!(
                    "Render: {:.1} ms",
                    self.render_duration.as_secs_f32() * 1000.0
                ));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some((msg, timestamp)) = &self.copy_message {
                        let current_time = ctx.input(|i| i.time);
                        if current_time - timestamp < 1.5 {
                            ui.label(RichText::new(msg).color(Color32::GREEN));
                            ctx.request_repaint();
                        } else {
                            self.copy_message = None;
                        }
                    }

                    if let Some((message, duration)) = &self.show_message {
                        let now = ctx.input(|i| i.time);
                        let start_time = self.message_timer.get_or_insert(now);

                        if now - *start_time < *duration as f64 {
                            ui.label(message);
                            ctx.request_repaint();
                        } else {
                            self.show_message = None;
                            self.message_timer = None;
                        }
                    }
                });
            });
        });
    }
}

impl eframe::App for LogViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let render_start = Instant::now();

        self.handle_dropped_files(ctx);
        self.process_load_events();
        self.handle_shortcuts(ctx);

        self.render_toolbar(ctx);
        self.render_status_bar(ctx);
        if self.show_search {
            self.render_search_panel(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let has_rows = !self.session.store().is_empty() || !self.session.bookmarks().is_empty();
            if self.loader.is_running() && !has_rows {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.heading("Loading file...");
                        ui.label(format!("{:.0}%", self.loading_progress));
                    });
                });
            } else if has_rows || self.file_path.is_some() {
                self.render_table(ui);
            } else {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.heading("LogLens");
                        ui.label("Trace / Messages / OTA log viewer");
                        ui.add_space(20.0);
                        ui.label("Click 'Open' or drag & drop a log file.");
                    });
                });
            }
        });

        self.render_duration = render_start.elapsed();

        if self.loader.is_running()
            || self.show_message.is_some()
            || self.copy_message.is_some()
            || self.stabilize_counter > 0
        {
            ctx.request_repaint();
        }
        if let Some(left) = self.session.highlighter().remaining(Instant::now()) {
            ctx.request_repaint_after(left);
        }
        if self.session.current_mark().is_some() {
            ctx.request_repaint_after(self.config.mark_flash);
        }
    }
}
