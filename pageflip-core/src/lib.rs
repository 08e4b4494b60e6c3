use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{debug, instrument};

pub mod config;
pub mod layout;
pub mod preview;
pub mod schedule;

pub use config::{ConfigError, LayoutConfig, ViewerConfig, ZoomConfig, LOCATOR_PLACEHOLDER};
pub use layout::{
    Dimensions, LayoutResolver, MountedLayout, Rect, SubscriptionId, Viewport, ViewportNotifier,
};
pub use preview::{route_preview_click, ClickOutcome, PreviewOverlay, PreviewTransform};
pub use schedule::TurnScheduler;

pub type PageId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: PageId,
    pub image_locator: String,
}

impl Page {
    pub fn new(id: PageId, image_locator: impl Into<String>) -> Self {
        Self {
            id,
            image_locator: image_locator.into(),
        }
    }
}

/// Ordered, immutable list of pages shared by every part of the viewer.
#[derive(Debug, Clone, Default)]
pub struct PageStore {
    pages: Arc<[Page]>,
}

impl PageStore {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            pages: pages.into(),
        }
    }

    /// Builds `count` pages whose locators substitute the page index for
    /// `{index}` in `pattern`.
    pub fn generate(count: usize, pattern: &str) -> Self {
        let pages = (0..count)
            .map(|index| {
                Page::new(
                    index as PageId,
                    pattern.replace(LOCATOR_PLACEHOLDER, &index.to_string()),
                )
            })
            .collect();
        Self::new(pages)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn position_of(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|page| page.id == id)
    }
}

#[async_trait::async_trait]
pub trait PageProvider: Send + Sync {
    async fn pages(&self) -> Result<PageStore>;
}

pub struct GeneratedPages {
    count: usize,
    pattern: String,
}

impl GeneratedPages {
    pub fn new(count: usize, pattern: impl Into<String>) -> Self {
        Self {
            count,
            pattern: pattern.into(),
        }
    }
}

impl From<&ViewerConfig> for GeneratedPages {
    fn from(config: &ViewerConfig) -> Self {
        Self::new(config.page_count, config.locator_pattern.clone())
    }
}

#[async_trait::async_trait]
impl PageProvider for GeneratedPages {
    #[instrument(skip(self), fields(count = self.count))]
    async fn pages(&self) -> Result<PageStore> {
        Ok(PageStore::generate(self.count, &self.pattern))
    }
}

#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// A page turn waiting for its delayed commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTurn {
    pub target: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSide {
    Left,
    Right,
}

impl PageSide {
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            PageSide::Left
        } else {
            PageSide::Right
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadPage<'a> {
    pub index: usize,
    pub page: &'a Page,
    pub side: PageSide,
    pub loaded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavControls {
    pub visible: bool,
    pub prev_disabled: bool,
    pub next_disabled: bool,
}

impl NavControls {
    pub fn for_position(current_index: usize, page_count: usize) -> Self {
        Self {
            visible: page_count > 1,
            prev_disabled: current_index == 0,
            next_disabled: current_index >= page_count.saturating_sub(1),
        }
    }

    pub fn is_disabled(&self, direction: Direction) -> bool {
        match direction {
            Direction::Next => self.next_disabled,
            Direction::Prev => self.prev_disabled,
        }
    }
}

/// Range control over the 1-based page numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slider {
    pub min: usize,
    pub max: usize,
    pub value: usize,
}

impl Slider {
    pub fn for_position(current_index: usize, page_count: usize) -> Self {
        Self {
            min: 1,
            max: page_count,
            value: current_index + 1,
        }
    }

    pub fn fill_fraction(&self) -> f32 {
        if self.max == 0 {
            return 0.0;
        }
        (self.value as f32 / self.max as f32).min(1.0)
    }

    /// Page number under a horizontal position in `[0, 1]` of the track.
    pub fn page_at_fraction(&self, fraction: f32) -> i64 {
        let span = self.max.saturating_sub(self.min) as f32;
        let offset = (fraction.clamp(0.0, 1.0) * span).round() as i64;
        self.min as i64 + offset
    }
}

pub fn readout(current_index: usize, page_count: usize) -> String {
    format!(
        "Pages {}-{} of {}",
        current_index + 1,
        (current_index + 2).min(page_count),
        page_count
    )
}

/// Viewer state. Every transition consumes the current value and returns
/// the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerState {
    pub current_index: usize,
    pub is_transitioning: bool,
    pub loaded_ids: HashSet<PageId>,
    pub preview: Option<PreviewOverlay>,
}

impl ViewerState {
    /// Takes the transition lock and returns the turn to commit later.
    /// Rejected (state unchanged, no turn) while a turn is pending.
    pub fn advance(self, direction: Direction, page_count: usize) -> (Self, Option<PendingTurn>) {
        if self.is_transitioning {
            return (self, None);
        }
        let target = match direction {
            Direction::Next => (self.current_index + 2).min(page_count.saturating_sub(1)),
            Direction::Prev => self.current_index.saturating_sub(2),
        };
        let next = Self {
            is_transitioning: true,
            ..self
        };
        (next, Some(PendingTurn { target }))
    }

    pub fn commit(self, turn: PendingTurn) -> Self {
        Self {
            current_index: turn.target,
            is_transitioning: false,
            ..self
        }
    }

    /// Jumps straight to a 1-based page number, clamped into range.
    pub fn seek(self, page_number: i64, page_count: usize) -> Self {
        let current_index = if page_count == 0 {
            0
        } else {
            (page_number.clamp(1, page_count as i64) - 1) as usize
        };
        Self {
            current_index,
            ..self
        }
    }

    pub fn mark_loaded(mut self, id: PageId) -> Self {
        self.loaded_ids.insert(id);
        self
    }

    pub fn is_loaded(&self, id: PageId) -> bool {
        self.loaded_ids.contains(&id)
    }

    pub fn open_preview(self, locator: impl Into<String>) -> Self {
        Self {
            preview: Some(PreviewOverlay::open(locator)),
            ..self
        }
    }

    pub fn close_preview(self) -> Self {
        Self {
            preview: None,
            ..self
        }
    }

    pub fn preview_target(&self) -> Option<&str> {
        self.preview.as_ref().map(PreviewOverlay::target)
    }

    fn map_preview(self, f: impl FnOnce(PreviewOverlay) -> PreviewOverlay) -> Self {
        Self {
            preview: self.preview.map(f),
            ..self
        }
    }

    pub fn spread<'a>(&self, pages: &'a PageStore) -> Vec<SpreadPage<'a>> {
        (self.current_index..self.current_index + 2)
            .filter_map(|index| {
                pages.get(index).map(|page| SpreadPage {
                    index,
                    page,
                    side: PageSide::for_index(index),
                    loaded: self.is_loaded(page.id),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Advance { direction: Direction },
    CommitTurn { turn: PendingTurn },
    Seek { page_number: i64 },
    MarkLoaded { id: PageId },
    OpenPreview { locator: String },
    /// Opens the preview for the `position`-th page of the visible spread.
    PreviewSpreadPage { position: usize },
    ClosePreview,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    Pan { delta_x: f32, delta_y: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    TurnScheduled(PendingTurn),
    SpreadChanged { index: usize },
    PageLoaded(PageId),
    PreviewOpened(String),
    PreviewClosed,
    RedrawNeeded,
}

pub struct Viewer {
    pages: PageStore,
    state: ViewerState,
    zoom: ZoomConfig,
    events: Arc<Mutex<Vec<ViewerEvent>>>,
}

impl Viewer {
    pub fn new(pages: PageStore, zoom: ZoomConfig) -> Self {
        Self {
            pages,
            state: ViewerState::default(),
            zoom,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn drain_events(&self) -> Vec<ViewerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn spread(&self) -> Vec<SpreadPage<'_>> {
        self.state.spread(&self.pages)
    }

    pub fn readout(&self) -> String {
        readout(self.state.current_index, self.pages.len())
    }

    pub fn controls(&self) -> NavControls {
        NavControls::for_position(self.state.current_index, self.pages.len())
    }

    pub fn slider(&self) -> Slider {
        Slider::for_position(self.state.current_index, self.pages.len())
    }

    /// Indices of the visible spread and `spreads` spreads on either side.
    pub fn prefetch_indices(&self, spreads: usize) -> Vec<usize> {
        let reach = spreads.saturating_mul(2);
        let start = self.state.current_index.saturating_sub(reach);
        let end = self
            .state
            .current_index
            .saturating_add(2)
            .saturating_add(reach)
            .min(self.pages.len());
        (start..end).collect()
    }

    fn transition(&mut self, f: impl FnOnce(ViewerState) -> ViewerState) {
        let state = std::mem::take(&mut self.state);
        self.state = f(state);
    }

    fn push(&self, event: ViewerEvent) {
        self.events.lock().push(event);
    }

    pub fn apply(&mut self, command: Command) {
        let page_count = self.pages.len();
        match command {
            Command::Advance { direction } => {
                if self.controls().is_disabled(direction) {
                    debug!(?direction, "navigation control disabled");
                    return;
                }
                let state = std::mem::take(&mut self.state);
                let (state, turn) = state.advance(direction, page_count);
                self.state = state;
                match turn {
                    Some(turn) => {
                        debug!(?direction, target = turn.target, "page turn scheduled");
                        self.push(ViewerEvent::TurnScheduled(turn));
                        self.push(ViewerEvent::RedrawNeeded);
                    }
                    None => debug!(?direction, "page turn rejected while transitioning"),
                }
            }
            Command::CommitTurn { turn } => {
                let before = self.state.current_index;
                self.transition(|state| state.commit(turn));
                debug!(from = before, to = turn.target, "page turn committed");
                if before != self.state.current_index {
                    self.push(ViewerEvent::SpreadChanged {
                        index: self.state.current_index,
                    });
                }
                self.push(ViewerEvent::RedrawNeeded);
            }
            Command::Seek { page_number } => {
                let before = self.state.current_index;
                self.transition(|state| state.seek(page_number, page_count));
                if before != self.state.current_index {
                    debug!(page_number, index = self.state.current_index, "seek");
                    self.push(ViewerEvent::SpreadChanged {
                        index: self.state.current_index,
                    });
                    self.push(ViewerEvent::RedrawNeeded);
                }
            }
            Command::MarkLoaded { id } => {
                if !self.state.is_loaded(id) {
                    self.transition(|state| state.mark_loaded(id));
                    self.push(ViewerEvent::PageLoaded(id));
                    self.push(ViewerEvent::RedrawNeeded);
                }
            }
            Command::OpenPreview { locator } => {
                self.transition(|state| state.open_preview(locator.clone()));
                self.push(ViewerEvent::PreviewOpened(locator));
                self.push(ViewerEvent::RedrawNeeded);
            }
            Command::PreviewSpreadPage { position } => {
                let locator = self
                    .spread()
                    .get(position)
                    .map(|entry| entry.page.image_locator.clone());
                if let Some(locator) = locator {
                    self.apply(Command::OpenPreview { locator });
                }
            }
            Command::ClosePreview => {
                if self.state.preview.is_some() {
                    self.transition(ViewerState::close_preview);
                    self.push(ViewerEvent::PreviewClosed);
                    self.push(ViewerEvent::RedrawNeeded);
                }
            }
            Command::ZoomIn => {
                let zoom = self.zoom;
                self.update_preview(|preview| preview.zoom_in(&zoom));
            }
            Command::ZoomOut => {
                let zoom = self.zoom;
                self.update_preview(|preview| preview.zoom_out(&zoom));
            }
            Command::ResetZoom => self.update_preview(PreviewOverlay::reset_zoom),
            Command::Pan { delta_x, delta_y } => {
                self.update_preview(|preview| preview.pan(delta_x, delta_y));
            }
        }
    }

    fn update_preview(&mut self, f: impl FnOnce(PreviewOverlay) -> PreviewOverlay) {
        if self.state.preview.is_none() {
            return;
        }
        let before = self.state.preview.as_ref().map(PreviewOverlay::transform);
        self.transition(|state| state.map_preview(f));
        let after = self.state.preview.as_ref().map(PreviewOverlay::transform);
        if before != after {
            self.push(ViewerEvent::RedrawNeeded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn book(count: usize) -> Viewer {
        Viewer::new(
            PageStore::generate(count, "/images/full-{index}.jpg"),
            ZoomConfig::default(),
        )
    }

    fn scheduled_turns(viewer: &Viewer) -> Vec<PendingTurn> {
        viewer
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                ViewerEvent::TurnScheduled(turn) => Some(turn),
                _ => None,
            })
            .collect()
    }

    fn turn(viewer: &mut Viewer, direction: Direction) {
        viewer.apply(Command::Advance { direction });
        for turn in scheduled_turns(viewer) {
            viewer.apply(Command::CommitTurn { turn });
        }
    }

    #[test]
    fn generate_substitutes_index_into_locator() {
        let store = PageStore::generate(3, "/images/full-{index}.jpg");
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(2), Some(&Page::new(2, "/images/full-2.jpg")));
        assert_eq!(store.position_of(1), Some(1));
        assert_eq!(store.position_of(7), None);
    }

    #[tokio::test]
    async fn generated_provider_uses_config_defaults() {
        let provider = GeneratedPages::from(&ViewerConfig::default());
        let store = provider.pages().await.unwrap();
        assert_eq!(store.len(), 91);
        assert_eq!(store.get(90).unwrap().image_locator, "/images/full-90.jpg");
    }

    #[test]
    fn advance_takes_lock_and_defers_the_index_change() {
        let state = ViewerState::default();
        let (state, turn) = state.advance(Direction::Next, 91);
        assert!(state.is_transitioning);
        assert_eq!(state.current_index, 0);
        assert_eq!(turn, Some(PendingTurn { target: 2 }));

        let state = state.commit(PendingTurn { target: 2 });
        assert!(!state.is_transitioning);
        assert_eq!(state.current_index, 2);
    }

    #[test]
    fn rapid_advances_only_honour_the_first() {
        let mut viewer = book(91);
        for _ in 0..5 {
            viewer.apply(Command::Advance {
                direction: Direction::Next,
            });
        }
        let turns = scheduled_turns(&viewer);
        assert_eq!(turns, vec![PendingTurn { target: 2 }]);
        assert_eq!(viewer.state().current_index, 0);

        viewer.apply(Command::CommitTurn { turn: turns[0] });
        assert_eq!(viewer.state().current_index, 2);
        assert!(!viewer.state().is_transitioning);
    }

    #[test]
    fn rapid_advances_with_scheduler_move_two_pages_per_delay_window() {
        let mut viewer = book(91);
        let mut scheduler = TurnScheduler::new(Duration::from_millis(600));
        let start = Instant::now();

        for step in 0..12u64 {
            let now = start + Duration::from_millis(step * 100);
            while let Some(turn) = scheduler.take_due(now) {
                viewer.apply(Command::CommitTurn { turn });
            }
            viewer.apply(Command::Advance {
                direction: Direction::Next,
            });
            for turn in scheduled_turns(&viewer) {
                scheduler.schedule(now, turn);
            }
        }
        // Accepted at 0 ms and 600 ms; the 600 ms turn is still pending at 1100 ms.
        assert_eq!(viewer.state().current_index, 2);
        assert!(viewer.state().is_transitioning);
        let late = start + Duration::from_secs(5);
        while let Some(turn) = scheduler.take_due(late) {
            viewer.apply(Command::CommitTurn { turn });
        }
        assert_eq!(viewer.state().current_index, 4);
    }

    #[test]
    fn prev_at_start_leaves_index_unchanged() {
        let (state, turn) = ViewerState::default().advance(Direction::Prev, 91);
        let state = state.commit(turn.unwrap());
        assert_eq!(state.current_index, 0);

        let mut viewer = book(91);
        viewer.apply(Command::Advance {
            direction: Direction::Prev,
        });
        assert!(!viewer.state().is_transitioning);
        assert!(viewer.drain_events().is_empty());
    }

    #[test]
    fn next_stops_at_the_last_page() {
        let mut viewer = book(91);
        viewer.apply(Command::Seek { page_number: 89 });
        assert_eq!(viewer.state().current_index, 88);
        turn(&mut viewer, Direction::Next);
        assert_eq!(viewer.state().current_index, 90);
        assert!(viewer.controls().next_disabled);

        turn(&mut viewer, Direction::Next);
        assert_eq!(viewer.state().current_index, 90);
        assert!(!viewer.state().is_transitioning);
    }

    #[test]
    fn literal_arithmetic_at_boundary_still_takes_the_lock() {
        let state = ViewerState::default().seek(91, 91);
        let (state, turn) = state.advance(Direction::Next, 91);
        assert!(state.is_transitioning);
        assert_eq!(turn, Some(PendingTurn { target: 90 }));
    }

    #[test]
    fn seek_clamps_out_of_range_numbers() {
        for (input, expected) in [
            (i64::MIN, 0),
            (-5, 0),
            (0, 0),
            (1, 0),
            (46, 45),
            (91, 90),
            (92, 90),
            (i64::MAX, 90),
        ] {
            let state = ViewerState::default().seek(input, 91);
            assert_eq!(state.current_index, expected, "seek({input})");
        }
        assert_eq!(ViewerState::default().seek(4, 0).current_index, 0);
    }

    #[test]
    fn seek_ignores_the_transition_lock() {
        let (state, _) = ViewerState::default().advance(Direction::Next, 91);
        let state = state.seek(40, 91);
        assert_eq!(state.current_index, 39);
        assert!(state.is_transitioning);
    }

    #[test]
    fn ninety_one_page_scenario() {
        let mut viewer = book(91);
        assert_eq!(viewer.readout(), "Pages 1-2 of 91");
        turn(&mut viewer, Direction::Next);
        assert_eq!(viewer.state().current_index, 2);
        assert_eq!(viewer.readout(), "Pages 3-4 of 91");

        viewer.apply(Command::Seek { page_number: 91 });
        assert_eq!(viewer.state().current_index, 90);
        assert!(viewer.controls().next_disabled);
        assert!(!viewer.controls().prev_disabled);
        assert_eq!(viewer.readout(), "Pages 91-91 of 91");
        let spread = viewer.spread();
        assert_eq!(spread.len(), 1);
        assert_eq!(spread[0].index, 90);
        assert_eq!(spread[0].side, PageSide::Left);
    }

    #[test]
    fn single_page_disables_everything() {
        let mut viewer = book(1);
        let controls = viewer.controls();
        assert!(!controls.visible);
        assert!(controls.prev_disabled);
        assert!(controls.next_disabled);
        let slider = viewer.slider();
        assert_eq!((slider.min, slider.max), (1, 1));
        assert_eq!(viewer.readout(), "Pages 1-1 of 1");

        viewer.apply(Command::Advance {
            direction: Direction::Next,
        });
        assert!(!viewer.state().is_transitioning);
        assert_eq!(viewer.spread().len(), 1);
    }

    #[test]
    fn empty_book_has_no_spread() {
        let mut viewer = book(0);
        assert!(viewer.spread().is_empty());
        assert!(viewer.controls().next_disabled);
        viewer.apply(Command::Seek { page_number: 3 });
        assert_eq!(viewer.state().current_index, 0);
        assert_eq!(viewer.slider().fill_fraction(), 0.0);
    }

    #[test]
    fn odd_seek_keeps_literal_clamping() {
        let mut viewer = book(91);
        viewer.apply(Command::Seek { page_number: 2 });
        assert_eq!(viewer.state().current_index, 1);
        let sides: Vec<_> = viewer.spread().iter().map(|p| (p.index, p.side)).collect();
        assert_eq!(sides, vec![(1, PageSide::Right), (2, PageSide::Left)]);

        turn(&mut viewer, Direction::Next);
        assert_eq!(viewer.state().current_index, 3);
        assert_eq!(viewer.readout(), "Pages 4-5 of 91");
    }

    #[test]
    fn mark_loaded_is_idempotent() {
        let mut viewer = book(4);
        viewer.apply(Command::MarkLoaded { id: 1 });
        viewer.apply(Command::MarkLoaded { id: 1 });
        assert_eq!(viewer.state().loaded_ids.len(), 1);
        let loaded: Vec<_> = viewer
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, ViewerEvent::PageLoaded(_)))
            .collect();
        assert_eq!(loaded, vec![ViewerEvent::PageLoaded(1)]);

        let spread = viewer.spread();
        assert!(!spread[0].loaded);
        assert!(spread[1].loaded);
    }

    #[test]
    fn loaded_ids_survive_navigation() {
        let mut viewer = book(10);
        viewer.apply(Command::MarkLoaded { id: 0 });
        viewer.apply(Command::Seek { page_number: 9 });
        viewer.apply(Command::Seek { page_number: 1 });
        assert!(viewer.spread()[0].loaded);
    }

    #[test]
    fn preview_is_independent_of_pagination() {
        let mut viewer = book(91);
        viewer.apply(Command::Advance {
            direction: Direction::Next,
        });
        viewer.apply(Command::PreviewSpreadPage { position: 1 });
        assert_eq!(viewer.state().preview_target(), Some("/images/full-1.jpg"));
        assert!(viewer.state().is_transitioning);
        assert_eq!(viewer.state().current_index, 0);

        for turn in scheduled_turns(&viewer) {
            viewer.apply(Command::CommitTurn { turn });
        }
        assert_eq!(viewer.state().current_index, 2);
        assert_eq!(viewer.state().preview_target(), Some("/images/full-1.jpg"));

        viewer.apply(Command::ClosePreview);
        assert_eq!(viewer.state().preview_target(), None);
    }

    #[test]
    fn preview_click_routing_contains_content_clicks() {
        let mut viewer = book(4);
        viewer.apply(Command::OpenPreview {
            locator: "/images/full-0.jpg".into(),
        });
        let content = Rect::new(10, 2, 40, 20);

        if route_preview_click(content, 20, 10) == ClickOutcome::Dismiss {
            viewer.apply(Command::ClosePreview);
        }
        assert!(viewer.state().preview.is_some());

        if route_preview_click(content, 2, 1) == ClickOutcome::Dismiss {
            viewer.apply(Command::ClosePreview);
        }
        assert!(viewer.state().preview.is_none());
    }

    #[test]
    fn zoom_commands_only_touch_the_open_preview() {
        let mut viewer = book(4);
        viewer.apply(Command::ZoomIn);
        assert!(viewer.drain_events().is_empty());

        viewer.apply(Command::OpenPreview {
            locator: "/images/full-2.jpg".into(),
        });
        viewer.apply(Command::ZoomIn);
        viewer.apply(Command::Pan {
            delta_x: 0.25,
            delta_y: 0.0,
        });
        let transform = viewer.state().preview.as_ref().unwrap().transform();
        assert_eq!(transform.scale, 1.25);
        assert_eq!(transform.offset_x, 0.75);
        assert_eq!(viewer.state().current_index, 0);
        assert!(viewer.state().loaded_ids.is_empty());

        viewer.apply(Command::ResetZoom);
        let transform = viewer.state().preview.as_ref().unwrap().transform();
        assert_eq!(transform, PreviewTransform::default());
    }

    #[test]
    fn slider_maps_track_fraction_to_page_numbers() {
        let slider = Slider::for_position(0, 91);
        assert_eq!(slider.page_at_fraction(0.0), 1);
        assert_eq!(slider.page_at_fraction(0.5), 46);
        assert_eq!(slider.page_at_fraction(1.0), 91);
        assert_eq!(slider.page_at_fraction(3.0), 91);
        assert!((Slider::for_position(90, 91).fill_fraction() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn prefetch_covers_neighbouring_spreads() {
        let mut viewer = book(10);
        assert_eq!(viewer.prefetch_indices(1), vec![0, 1, 2, 3]);
        viewer.apply(Command::Seek { page_number: 5 });
        assert_eq!(viewer.prefetch_indices(1), vec![2, 3, 4, 5, 6, 7]);
        viewer.apply(Command::Seek { page_number: 10 });
        assert_eq!(viewer.prefetch_indices(0), vec![9]);
    }

    #[test]
    fn huge_prefetch_reach_covers_the_whole_book() {
        let config = ViewerConfig::from_toml_str(
            "prefetch_spreads = 9223372036854775807\n",
            std::path::Path::new("inline.toml"),
        )
        .unwrap();
        config.validate().unwrap();

        let mut viewer = book(91);
        assert_eq!(
            viewer.prefetch_indices(config.prefetch_spreads),
            (0..91).collect::<Vec<_>>()
        );
        viewer.apply(Command::Seek { page_number: 46 });
        assert_eq!(viewer.prefetch_indices(usize::MAX).len(), 91);
    }
}
