use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use pageflip_core::{
    route_preview_click, ClickOutcome, Command, Direction, GeneratedPages, LayoutResolver,
    MountedLayout, Page, PageId, PageProvider, PageSide, Rect, RenderImage, TurnScheduler,
    Viewer, ViewerConfig, ViewerEvent, Viewport, ViewportNotifier,
};
use pageflip_render::{load_batch, DirectoryPages, FsImageSource, ImageCache};
use pageflip_tty::{
    slider_line, spinner_frame, write_button, write_status_line, DrawParams, EventMapper,
    InputMode, KittyRenderer, UiEvent, LEFT_PAGE_IMAGE_ID, PREVIEW_IMAGE_ID, RIGHT_PAGE_IMAGE_ID,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const FALLBACK_CELL_WIDTH: f32 = 8.0;
const FALLBACK_CELL_HEIGHT: f32 = 16.0;
/// Rows below the book: readout, buttons, slider and status line.
const CHROME_ROWS: u32 = 5;

#[derive(Debug, Parser)]
#[command(
    name = "pageflip",
    version,
    about = "two-page image book viewer for kitty-compatible terminals"
)]
struct Args {
    /// Directory whose images become the pages, ordered by file name
    #[arg(long, conflicts_with_all = ["pattern", "count"])]
    images: Option<PathBuf>,

    /// Locator pattern for generated pages; `{index}` is replaced by the page index
    #[arg(long)]
    pattern: Option<String>,

    /// Number of generated pages
    #[arg(long)]
    count: Option<usize>,

    /// Directory that image locators are resolved against
    #[arg(long)]
    root: Option<PathBuf>,

    /// Page to open on (1-based, clamped)
    #[arg(short = 'p', long = "page", allow_negative_numbers = true)]
    page: Option<i64>,

    /// Configuration file (defaults to config.toml in the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

struct TerminalGuard;

impl TerminalGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnableMouseCapture, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, DisableMouseCapture, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "pageflip", "pageflip")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config = load_config(&args, &project_dirs)?;
    let _log_guard = init_logging(&project_dirs)?;

    let provider: Box<dyn PageProvider> = match &args.images {
        Some(dir) => Box::new(DirectoryPages::new(dir.clone())),
        None => Box::new(GeneratedPages::from(&config)),
    };
    let pages = provider.pages().await?;
    if pages.is_empty() {
        warn!("no pages to show");
    }
    info!(pages = pages.len(), "page store ready");

    let root = match (&args.root, &args.images) {
        (Some(root), _) => root.clone(),
        (None, Some(images)) => images.clone(),
        (None, None) => std::env::current_dir().context("failed to resolve working directory")?,
    };

    let mut viewer = Viewer::new(pages, config.zoom);
    if let Some(page_number) = args.page {
        viewer.apply(Command::Seek { page_number });
    }

    let (load_tx, mut load_rx) = mpsc::unbounded_channel();
    let mut app = App::new(viewer, &config, root, load_tx);

    let guard = TerminalGuard::new()?;
    let result = run(&mut app, &mut load_rx);
    drop(guard);

    app.shutdown();
    result
}

fn load_config(args: &Args, project_dirs: &ProjectDirs) -> Result<ViewerConfig> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::load_or_default(&project_dirs.config_dir().join("config.toml"))?,
    };
    if let Some(pattern) = &args.pattern {
        config.locator_pattern = pattern.clone();
    }
    if let Some(count) = args.count {
        config.page_count = count;
    }
    config.validate()?;
    Ok(config)
}

struct LoadResult {
    id: PageId,
    result: Result<RenderImage>,
}

/// Screen regions of the last frame, for routing mouse clicks.
#[derive(Default)]
struct Frame {
    /// Page slots with their spread position and whether the image is shown.
    slots: Vec<(Rect, usize, bool)>,
    spinners: Vec<(u16, u16)>,
    prev_button: Option<Rect>,
    next_button: Option<Rect>,
    slider_track: Option<Rect>,
    preview_content: Option<Rect>,
    preview_close: Option<Rect>,
    zoom_in: Option<Rect>,
    zoom_out: Option<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClickTarget {
    ClosePreview,
    ZoomIn,
    ZoomOut,
    Backdrop,
    PrevButton,
    NextButton,
    Slider(f32),
    Slot(usize),
}

impl Frame {
    /// Toolbar buttons sit inside the preview content, so they are checked
    /// before containment. A slot still showing its spinner takes no click.
    fn target_at(&self, preview_open: bool, column: u16, row: u16) -> Option<ClickTarget> {
        let hit = |rect: Option<Rect>| rect.is_some_and(|rect| rect.contains(column, row));

        if preview_open {
            let content = self.preview_content?;
            return if hit(self.preview_close) {
                Some(ClickTarget::ClosePreview)
            } else if hit(self.zoom_in) {
                Some(ClickTarget::ZoomIn)
            } else if hit(self.zoom_out) {
                Some(ClickTarget::ZoomOut)
            } else {
                match route_preview_click(content, column, row) {
                    ClickOutcome::Dismiss => Some(ClickTarget::Backdrop),
                    ClickOutcome::Contained => None,
                }
            };
        }

        if hit(self.prev_button) {
            Some(ClickTarget::PrevButton)
        } else if hit(self.next_button) {
            Some(ClickTarget::NextButton)
        } else if let Some(track) = self.slider_track.filter(|t| t.contains(column, row)) {
            Some(ClickTarget::Slider(track.fraction_x(column)))
        } else {
            self.slots
                .iter()
                .find(|(rect, _, _)| rect.contains(column, row))
                .and_then(|(_, position, loaded)| loaded.then_some(ClickTarget::Slot(*position)))
        }
    }
}

#[derive(Clone, Copy)]
struct TermMetrics {
    columns: u32,
    rows: u32,
    cell_width: f32,
    cell_height: f32,
}

impl TermMetrics {
    fn query() -> Result<Self> {
        let window = terminal::window_size()?;
        let columns = u32::from(window.columns).max(1);
        let rows = u32::from(window.rows).max(1);
        let (cell_width, cell_height) = if window.width > 0 && window.height > 0 {
            (
                f32::from(window.width) / columns as f32,
                f32::from(window.height) / rows as f32,
            )
        } else {
            (FALLBACK_CELL_WIDTH, FALLBACK_CELL_HEIGHT)
        };
        Ok(Self {
            columns,
            rows,
            cell_width,
            cell_height,
        })
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            width: (self.columns as f32 * self.cell_width).round() as u32,
            height: (self.rows as f32 * self.cell_height).round() as u32,
        }
    }
}

struct App {
    viewer: Viewer,
    scheduler: TurnScheduler,
    notifier: ViewportNotifier,
    layout: Option<MountedLayout>,
    cache: Arc<ImageCache>,
    source: Arc<FsImageSource>,
    loads: UnboundedSender<LoadResult>,
    in_flight: HashSet<PageId>,
    prefetch_spreads: usize,
    mapper: EventMapper,
    frame: Frame,
    tick: u64,
    dirty: bool,
}

enum LoopAction {
    Continue,
    Quit,
}

impl App {
    fn new(
        viewer: Viewer,
        config: &ViewerConfig,
        root: PathBuf,
        loads: UnboundedSender<LoadResult>,
    ) -> Self {
        let metrics = TermMetrics::query().ok();
        let notifier = ViewportNotifier::new(metrics.map(|m| m.viewport()).unwrap_or_default());
        let layout = LayoutResolver::new(config.layout).mount(&notifier);
        Self {
            viewer,
            scheduler: TurnScheduler::new(config.transition_delay),
            notifier,
            layout: Some(layout),
            cache: Arc::new(ImageCache::new(config.cache_capacity)),
            source: Arc::new(FsImageSource::new(root, config.max_image_edge)),
            loads,
            in_flight: HashSet::new(),
            prefetch_spreads: config.prefetch_spreads,
            mapper: EventMapper::new(),
            frame: Frame::default(),
            tick: 0,
            dirty: true,
        }
    }

    fn shutdown(&mut self) {
        if let Some(layout) = self.layout.take() {
            layout.unmount(&self.notifier);
        }
    }

    fn apply(&mut self, command: Command) {
        self.viewer.apply(command);
        self.pump_events(Instant::now());
    }

    /// Turns viewer events into scheduled commits, image loads and redraws.
    fn pump_events(&mut self, now: Instant) {
        for event in self.viewer.drain_events() {
            match event {
                ViewerEvent::TurnScheduled(turn) => {
                    self.scheduler.schedule(now, turn);
                }
                ViewerEvent::SpreadChanged { .. } => self.request_visible_loads(),
                ViewerEvent::PreviewOpened(locator) => {
                    self.mapper.set_mode(InputMode::Preview);
                    if let Some(index) = self.index_of_locator(&locator) {
                        self.request_loads(vec![index]);
                    }
                }
                ViewerEvent::PreviewClosed => self.mapper.set_mode(InputMode::Book),
                ViewerEvent::PageLoaded(_) | ViewerEvent::RedrawNeeded => {}
            }
            self.dirty = true;
        }
    }

    fn index_of_locator(&self, locator: &str) -> Option<usize> {
        self.viewer
            .pages()
            .iter()
            .position(|page| page.image_locator == locator)
    }

    fn request_visible_loads(&mut self) {
        let indices = self.viewer.prefetch_indices(self.prefetch_spreads);
        self.request_loads(indices);
    }

    fn request_loads(&mut self, indices: Vec<usize>) {
        let batch: Vec<Page> = indices
            .into_iter()
            .filter_map(|index| self.viewer.pages().get(index).cloned())
            .filter(|page| !self.cache.contains(page.id) && !self.in_flight.contains(&page.id))
            .collect();
        if batch.is_empty() {
            return;
        }
        self.in_flight.extend(batch.iter().map(|page| page.id));
        debug!(count = batch.len(), "requesting page images");

        let source = Arc::clone(&self.source);
        let loads = self.loads.clone();
        tokio::task::spawn_blocking(move || {
            for (id, result) in load_batch(source.as_ref(), &batch) {
                if loads.send(LoadResult { id, result }).is_err() {
                    break;
                }
            }
        });
    }

    fn finish_load(&mut self, done: LoadResult) {
        self.in_flight.remove(&done.id);
        match done.result {
            Ok(image) => {
                let Some(index) = self.viewer.pages().position_of(done.id) else {
                    return;
                };
                self.cache.insert(
                    done.id,
                    index,
                    image,
                    self.viewer.state().current_index,
                );
                self.apply(Command::MarkLoaded { id: done.id });
                // Re-decoded pages are already marked loaded; they still need drawing.
                self.dirty = true;
            }
            Err(err) => {
                warn!(?err, id = done.id, "failed to load page image");
            }
        }
    }

    fn commit_due_turns(&mut self, now: Instant) {
        while let Some(turn) = self.scheduler.take_due(now) {
            self.viewer.apply(Command::CommitTurn { turn });
        }
        self.pump_events(now);
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        self.scheduler
            .time_until_next(now)
            .map_or(POLL_INTERVAL, |due| due.min(POLL_INTERVAL))
    }

    fn handle_event(&mut self, event: UiEvent) -> Result<LoopAction> {
        match event {
            UiEvent::Command(command) => self.apply(command),
            UiEvent::Click { column, row } => self.handle_click(column, row),
            UiEvent::Resize { .. } => {
                let metrics = TermMetrics::query()?;
                self.notifier.notify(metrics.viewport());
                self.dirty = true;
            }
            UiEvent::Quit => return Ok(LoopAction::Quit),
            UiEvent::None => {}
        }
        Ok(LoopAction::Continue)
    }

    fn handle_click(&mut self, column: u16, row: u16) {
        let preview_open = self.viewer.state().preview.is_some();
        let Some(target) = self.frame.target_at(preview_open, column, row) else {
            return;
        };
        let command = match target {
            ClickTarget::ClosePreview | ClickTarget::Backdrop => Command::ClosePreview,
            ClickTarget::ZoomIn => Command::ZoomIn,
            ClickTarget::ZoomOut => Command::ZoomOut,
            ClickTarget::PrevButton => Command::Advance {
                direction: Direction::Prev,
            },
            ClickTarget::NextButton => Command::Advance {
                direction: Direction::Next,
            },
            ClickTarget::Slider(fraction) => Command::Seek {
                page_number: self.viewer.slider().page_at_fraction(fraction),
            },
            ClickTarget::Slot(position) => Command::PreviewSpreadPage { position },
        };
        self.apply(command);
    }

    fn has_spinners(&self) -> bool {
        !self.frame.spinners.is_empty()
    }
}

fn run(app: &mut App, load_rx: &mut UnboundedReceiver<LoadResult>) -> Result<()> {
    let mut renderer = KittyRenderer::new(io::stdout());
    app.request_visible_loads();

    loop {
        while let Ok(done) = load_rx.try_recv() {
            app.finish_load(done);
        }
        let now = Instant::now();
        app.commit_due_turns(now);

        if app.dirty {
            redraw(&mut renderer, app)?;
            app.dirty = false;
        }

        if event::poll(app.poll_timeout(now))? {
            let ui_event = app.mapper.map_event(event::read()?);
            match app.handle_event(ui_event)? {
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
        } else if app.has_spinners() {
            app.tick = app.tick.wrapping_add(1);
            draw_spinners(&mut renderer, app)?;
        }
    }

    renderer.delete_all()?;
    renderer.clear_all()?;
    Ok(())
}

fn redraw(renderer: &mut KittyRenderer<io::Stdout>, app: &mut App) -> Result<()> {
    let metrics = TermMetrics::query()?;
    renderer.begin_sync_update()?;
    renderer.delete_all()?;
    renderer.clear_all()?;
    app.frame = Frame::default();

    if app.viewer.state().preview.is_some() {
        draw_preview(renderer, app, metrics)?;
    } else {
        draw_book(renderer, app, metrics)?;
    }

    renderer.end_sync_update()?;
    Ok(())
}

fn draw_book(
    renderer: &mut KittyRenderer<io::Stdout>,
    app: &mut App,
    metrics: TermMetrics,
) -> Result<()> {
    let dimensions = app
        .layout
        .as_ref()
        .map(MountedLayout::dimensions)
        .unwrap_or_default();
    let max_rows = metrics.rows.saturating_sub(CHROME_ROWS + 1).max(1);
    let book_cols = ((dimensions.width / metrics.cell_width).floor() as u32)
        .clamp(2, metrics.columns.max(2));
    let book_rows = ((dimensions.height / metrics.cell_height).floor() as u32).clamp(1, max_rows);
    let book = Rect::new(
        (metrics.columns.saturating_sub(book_cols) / 2) as u16,
        1,
        book_cols as u16,
        book_rows as u16,
    );
    let half = book.width / 2;
    let left_slot = Rect::new(book.col, book.row, half, book.height);
    let right_slot = Rect::new(book.col + half, book.row, book.width - half, book.height);

    let mut missing = Vec::new();
    let spread: Vec<_> = app
        .viewer
        .spread()
        .into_iter()
        .map(|entry| (entry.page.id, entry.index, entry.side, entry.loaded))
        .collect();

    for (position, (id, index, side, loaded)) in spread.into_iter().enumerate() {
        let (slot, image_id) = match side {
            PageSide::Left => (left_slot, LEFT_PAGE_IMAGE_ID),
            PageSide::Right => (right_slot, RIGHT_PAGE_IMAGE_ID),
        };
        app.frame.slots.push((slot, position, loaded));

        if !loaded {
            app.frame
                .spinners
                .push((slot.col + slot.width / 2, slot.row + slot.height / 2));
            continue;
        }
        match app.cache.get(id) {
            Some(image) => draw_fitted(renderer, image_id, &image, slot, metrics)?,
            None => missing.push(index),
        }
    }
    app.request_loads(missing);
    draw_spinners(renderer, app)?;

    let mut writer = renderer.writer();
    let readout_row = book.row + book.height + 1;
    let readout = app.viewer.readout();
    let readout_col = metrics.columns.saturating_sub(readout.len() as u32) / 2;
    crossterm::queue!(
        writer,
        cursor::MoveTo(readout_col as u16, readout_row),
        Print(&readout)
    )?;

    let controls = app.viewer.controls();
    let buttons_row = readout_row + 1;
    if controls.visible {
        const PREV: &str = "<";
        const NEXT: &str = ">";
        let button_width = (PREV.len() + 4) as u16;
        let next_col = (book.col + book.width).saturating_sub(button_width);
        write_button(&mut writer, book.col, buttons_row, PREV, controls.prev_disabled)?;
        write_button(&mut writer, next_col, buttons_row, NEXT, controls.next_disabled)?;
        app.frame.prev_button = Some(Rect::new(book.col, buttons_row, button_width, 1));
        app.frame.next_button = Some(Rect::new(next_col, buttons_row, button_width, 1));
    }

    let slider_width = (metrics.columns.min(60)) as u16;
    let slider = slider_line(&app.viewer.slider(), slider_width);
    let slider_col = (metrics.columns.saturating_sub(slider_width as u32) / 2) as u16;
    let slider_row = buttons_row + 1;
    crossterm::queue!(
        writer,
        cursor::MoveTo(slider_col, slider_row),
        Print(&slider.text)
    )?;
    app.frame.slider_track = Some(Rect::new(
        slider_col + slider.track_offset,
        slider_row,
        slider.track_width,
        1,
    ));

    let mut status = String::from("h/l turn  <n>g seek  p/P preview  q quit");
    if app.viewer.state().is_transitioning {
        status.push_str("  | turning...");
    }
    if let Some(pending) = app.mapper.pending_input() {
        status.push_str("  | ");
        status.push_str(&pending);
    }
    draw_status_line(writer, metrics, &status)?;
    Ok(())
}

fn draw_preview(
    renderer: &mut KittyRenderer<io::Stdout>,
    app: &mut App,
    metrics: TermMetrics,
) -> Result<()> {
    let Some(preview) = app.viewer.state().preview.clone() else {
        return Ok(());
    };
    let content_cols = ((metrics.columns as f32 * 0.9) as u32).max(10);
    let content_rows = metrics.rows.saturating_sub(2).max(3);
    let content = Rect::new(
        (metrics.columns.saturating_sub(content_cols) / 2) as u16,
        1,
        content_cols as u16,
        content_rows as u16,
    );
    app.frame.preview_content = Some(content);

    let toolbar_row = content.row;
    let close_col = (content.col + content.width).saturating_sub(5);
    let zoom_out_col = close_col.saturating_sub(6);
    let zoom_in_col = zoom_out_col.saturating_sub(6);
    {
        let writer = renderer.writer();
        write_button(writer, zoom_in_col, toolbar_row, "+", false)?;
        write_button(writer, zoom_out_col, toolbar_row, "-", false)?;
        write_button(writer, close_col, toolbar_row, "x", false)?;
    }
    app.frame.zoom_in = Some(Rect::new(zoom_in_col, toolbar_row, 5, 1));
    app.frame.zoom_out = Some(Rect::new(zoom_out_col, toolbar_row, 5, 1));
    app.frame.preview_close = Some(Rect::new(close_col, toolbar_row, 5, 1));

    let image_area = Rect::new(
        content.col,
        content.row + 1,
        content.width,
        content.height.saturating_sub(1).max(1),
    );
    let cached = app
        .index_of_locator(preview.target())
        .and_then(|index| app.viewer.pages().get(index))
        .and_then(|page| app.cache.get(page.id));
    match cached {
        Some(image) => {
            let transform = preview.transform();
            let image = if transform.is_zoomed() {
                crop_for_zoom(&image, transform.scale, transform.offset_x, transform.offset_y)
            } else {
                image
            };
            draw_fitted(renderer, PREVIEW_IMAGE_ID, &image, image_area, metrics)?;
        }
        None => {
            app.frame.spinners.push((
                image_area.col + image_area.width / 2,
                image_area.row + image_area.height / 2,
            ));
            draw_spinners(renderer, app)?;
        }
    }

    let status = format!(
        "{}  {:.0}%  +/- zoom  hjkl pan  0 reset  esc close",
        preview.target(),
        preview.transform().scale * 100.0
    );
    draw_status_line(renderer.writer(), metrics, &status)?;
    Ok(())
}

fn draw_spinners(renderer: &mut KittyRenderer<io::Stdout>, app: &App) -> Result<()> {
    let frame = spinner_frame(app.tick);
    let writer = renderer.writer();
    for (col, row) in &app.frame.spinners {
        crossterm::queue!(writer, cursor::MoveTo(*col, *row), Print(frame))?;
    }
    writer.flush()?;
    Ok(())
}

fn draw_fitted(
    renderer: &mut KittyRenderer<io::Stdout>,
    image_id: u32,
    image: &RenderImage,
    area: Rect,
    metrics: TermMetrics,
) -> Result<()> {
    if image.width == 0 || image.height == 0 || area.is_empty() {
        return Ok(());
    }
    let (cols, rows) = fit_cells(
        image.width,
        image.height,
        u32::from(area.width),
        u32::from(area.height),
        metrics.cell_width,
        metrics.cell_height,
    );
    let col = area.col + ((u32::from(area.width) - cols) / 2) as u16;
    let row = area.row + ((u32::from(area.height) - rows) / 2) as u16;
    {
        let writer = renderer.writer();
        crossterm::execute!(writer, cursor::MoveTo(col, row))?;
    }
    renderer.draw(image_id, image, DrawParams::clamped(cols, rows))
}

fn draw_status_line<W: Write>(writer: &mut W, metrics: TermMetrics, status: &str) -> Result<()> {
    let status_row = metrics.rows.saturating_sub(1);
    crossterm::queue!(
        writer,
        cursor::MoveTo(0, status_row as u16),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(writer, status)?;
    Ok(())
}

/// Largest cell box with the image's aspect ratio that fits `max_cols` x `max_rows`.
fn fit_cells(
    image_width: u32,
    image_height: u32,
    max_cols: u32,
    max_rows: u32,
    cell_width: f32,
    cell_height: f32,
) -> (u32, u32) {
    let max_cols = max_cols.max(1);
    let max_rows = max_rows.max(1);
    if image_width == 0 || image_height == 0 || cell_width <= 0.0 || cell_height <= 0.0 {
        return (max_cols, max_rows);
    }
    let width_ratio = max_cols as f32 * cell_width / image_width as f32;
    let height_ratio = max_rows as f32 * cell_height / image_height as f32;
    let ratio = width_ratio.min(height_ratio);
    let cols = (image_width as f32 * ratio / cell_width).floor().max(1.0) as u32;
    let rows = (image_height as f32 * ratio / cell_height).floor().max(1.0) as u32;
    (cols.min(max_cols), rows.min(max_rows))
}

fn crop_for_zoom(image: &RenderImage, scale: f32, offset_x: f32, offset_y: f32) -> RenderImage {
    let crop_ratio = (1.0 / scale).min(1.0);
    if !crop_ratio.is_finite() || crop_ratio <= 0.0 {
        return image.clone();
    }
    let crop_width = (image.width as f32 * crop_ratio)
        .round()
        .clamp(1.0, image.width.max(1) as f32) as u32;
    let crop_height = (image.height as f32 * crop_ratio)
        .round()
        .clamp(1.0, image.height.max(1) as f32) as u32;
    let origin_x = compute_viewport_origin(image.width, crop_width, offset_x);
    let origin_y = compute_viewport_origin(image.height, crop_height, offset_y);
    crop_render_image(image, origin_x, origin_y, crop_width, crop_height)
}

fn compute_viewport_origin(total: u32, viewport: u32, fraction: f32) -> u32 {
    if viewport >= total || total == 0 {
        return 0;
    }
    let max_offset = total - viewport;
    let raw = (max_offset as f32 * fraction.clamp(0.0, 1.0)).round();
    raw.max(0.0).min(max_offset as f32) as u32
}

fn crop_render_image(
    image: &RenderImage,
    origin_x: u32,
    origin_y: u32,
    width: u32,
    height: u32,
) -> RenderImage {
    if image.width == 0 || image.height == 0 {
        return RenderImage {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
    }

    let width = width.min(image.width).max(1);
    let height = height.min(image.height).max(1);
    let origin_x = origin_x.min(image.width - width);
    let origin_y = origin_y.min(image.height - height);

    let stride = image.width as usize * 4;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for row in 0..height {
        let start = (origin_y + row) as usize * stride + origin_x as usize * 4;
        let end = start + width as usize * 4;
        pixels.extend_from_slice(&image.pixels[start..end]);
    }

    RenderImage {
        width,
        height,
        pixels,
    }
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pageflip.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the renderer while the viewer runs, so logs only go to file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
