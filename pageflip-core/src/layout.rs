use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

/// Derives the 4:3 book box from the viewport width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutResolver {
    max_width: f32,
    margin: f32,
}

impl Default for LayoutResolver {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutResolver {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            max_width: config.max_width,
            margin: config.margin,
        }
    }

    pub fn resolve(&self, viewport_width: f32) -> Dimensions {
        let width = self.max_width.min(viewport_width - self.margin).max(0.0);
        Dimensions {
            width,
            height: width * 3.0 / 4.0,
        }
    }

    /// Resolves once against the notifier's current viewport and keeps the
    /// result up to date until [`MountedLayout::unmount`].
    pub fn mount(self, notifier: &ViewportNotifier) -> MountedLayout {
        let dimensions = Arc::new(Mutex::new(self.resolve(notifier.current().width as f32)));
        let target = Arc::clone(&dimensions);
        let subscription = notifier.subscribe(Arc::new(move |viewport: Viewport| {
            let resolved = self.resolve(viewport.width as f32);
            debug!(?viewport, ?resolved, "layout recomputed");
            *target.lock() = resolved;
        }));
        MountedLayout {
            dimensions,
            subscription,
        }
    }
}

pub struct MountedLayout {
    dimensions: Arc<Mutex<Dimensions>>,
    subscription: SubscriptionId,
}

impl MountedLayout {
    pub fn dimensions(&self) -> Dimensions {
        *self.dimensions.lock()
    }

    pub fn unmount(self, notifier: &ViewportNotifier) {
        notifier.unsubscribe(self.subscription);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type ViewportListener = Arc<dyn Fn(Viewport) + Send + Sync>;

/// Host-provided viewport size, pushed to subscribers on every change.
pub struct ViewportNotifier {
    current: Mutex<Viewport>,
    listeners: Mutex<Vec<(SubscriptionId, ViewportListener)>>,
    next_id: AtomicU64,
}

impl ViewportNotifier {
    pub fn new(initial: Viewport) -> Self {
        Self {
            current: Mutex::new(initial),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn current(&self) -> Viewport {
        *self.current.lock()
    }

    pub fn subscribe(&self, listener: ViewportListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn notify(&self, viewport: Viewport) {
        *self.current.lock() = viewport;
        // Listeners run unlocked so they may subscribe or unsubscribe.
        let listeners: Vec<ViewportListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(viewport);
        }
    }
}

/// Cell-space rectangle used for hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub col: u16,
    pub row: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(col: u16, row: u16, width: u16, height: u16) -> Self {
        Self {
            col,
            row,
            width,
            height,
        }
    }

    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.col
            && row >= self.row
            && (col - self.col) < self.width
            && (row - self.row) < self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Horizontal position of `col` inside the rectangle, in `[0, 1]`.
    pub fn fraction_x(&self, col: u16) -> f32 {
        if self.width <= 1 {
            return 0.0;
        }
        let offset = col.saturating_sub(self.col).min(self.width - 1);
        offset as f32 / (self.width - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_caps_width_and_keeps_four_by_three() {
        let resolver = LayoutResolver::default();
        assert_eq!(
            resolver.resolve(1920.0),
            Dimensions {
                width: 900.0,
                height: 675.0
            }
        );
        assert_eq!(
            resolver.resolve(640.0),
            Dimensions {
                width: 600.0,
                height: 450.0
            }
        );
    }

    #[test]
    fn resolve_never_goes_negative() {
        let resolver = LayoutResolver::default();
        assert_eq!(resolver.resolve(20.0), Dimensions::default());
    }

    #[test]
    fn mounted_layout_follows_notifications_until_unmounted() {
        let notifier = ViewportNotifier::new(Viewport {
            width: 540,
            height: 400,
        });
        let layout = LayoutResolver::default().mount(&notifier);
        assert_eq!(layout.dimensions().width, 500.0);
        assert_eq!(notifier.listener_count(), 1);

        notifier.notify(Viewport {
            width: 1240,
            height: 800,
        });
        assert_eq!(layout.dimensions().width, 900.0);
        assert_eq!(layout.dimensions().height, 675.0);

        layout.unmount(&notifier);
        assert_eq!(notifier.listener_count(), 0);
        notifier.notify(Viewport {
            width: 100,
            height: 100,
        });
        assert_eq!(notifier.current().width, 100);
    }

    #[test]
    fn unsubscribe_unknown_id_is_reported() {
        let notifier = ViewportNotifier::new(Viewport::default());
        let id = notifier.subscribe(Arc::new(|_: Viewport| {}));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
    }

    #[test]
    fn listeners_may_change_subscriptions_while_notified() {
        let notifier = Arc::new(ViewportNotifier::new(Viewport::default()));
        let own_id = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&notifier);
        let slot = Arc::clone(&own_id);
        let id = notifier.subscribe(Arc::new(move |_: Viewport| {
            if let Some(id) = slot.lock().take() {
                inner.unsubscribe(id);
                inner.subscribe(Arc::new(|_: Viewport| {}));
            }
        }));
        *own_id.lock() = Some(id);

        notifier.notify(Viewport {
            width: 800,
            height: 600,
        });
        assert_eq!(notifier.listener_count(), 1);
        assert!(!notifier.unsubscribe(id));
    }

    #[test]
    fn rect_contains_is_half_open() {
        let rect = Rect::new(10, 5, 4, 2);
        assert!(rect.contains(10, 5));
        assert!(rect.contains(13, 6));
        assert!(!rect.contains(14, 6));
        assert!(!rect.contains(13, 7));
        assert!(!rect.contains(9, 5));
    }

    #[test]
    fn fraction_x_spans_the_rect() {
        let rect = Rect::new(10, 0, 11, 1);
        assert_eq!(rect.fraction_x(10), 0.0);
        assert_eq!(rect.fraction_x(15), 0.5);
        assert_eq!(rect.fraction_x(20), 1.0);
        assert_eq!(rect.fraction_x(40), 1.0);
    }
}
