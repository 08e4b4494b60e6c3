use crate::config::ZoomConfig;
use crate::layout::Rect;

/// Scale and pan of the preview image. Offsets are fractions of the
/// scrollable range, 0.5 being centred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for PreviewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.5,
            offset_y: 0.5,
        }
    }
}

impl PreviewTransform {
    pub fn zoom_in(self, zoom: &ZoomConfig) -> Self {
        self.with_scale(self.scale * zoom.step, zoom)
    }

    pub fn zoom_out(self, zoom: &ZoomConfig) -> Self {
        self.with_scale(self.scale / zoom.step, zoom)
    }

    pub fn pan(self, delta_x: f32, delta_y: f32) -> Self {
        Self {
            offset_x: (self.offset_x + delta_x).clamp(0.0, 1.0),
            offset_y: (self.offset_y + delta_y).clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn is_zoomed(&self) -> bool {
        self.scale > 1.0 + f32::EPSILON
    }

    fn with_scale(self, scale: f32, zoom: &ZoomConfig) -> Self {
        let scale = scale.clamp(zoom.min, zoom.max);
        if scale <= 1.0 + f32::EPSILON {
            // Nothing to pan once the whole image fits again.
            return Self {
                scale,
                ..Self::default()
            };
        }
        Self { scale, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOverlay {
    target: String,
    transform: PreviewTransform,
}

impl PreviewOverlay {
    pub fn open(locator: impl Into<String>) -> Self {
        Self {
            target: locator.into(),
            transform: PreviewTransform::default(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn transform(&self) -> PreviewTransform {
        self.transform
    }

    pub fn zoom_in(self, zoom: &ZoomConfig) -> Self {
        Self {
            transform: self.transform.zoom_in(zoom),
            ..self
        }
    }

    pub fn zoom_out(self, zoom: &ZoomConfig) -> Self {
        Self {
            transform: self.transform.zoom_out(zoom),
            ..self
        }
    }

    pub fn reset_zoom(self) -> Self {
        Self {
            transform: PreviewTransform::default(),
            ..self
        }
    }

    pub fn pan(self, delta_x: f32, delta_y: f32) -> Self {
        Self {
            transform: self.transform.pan(delta_x, delta_y),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click landed on the preview content and stops there.
    Contained,
    /// The click landed on the backdrop and dismisses the preview.
    Dismiss,
}

pub fn route_preview_click(content: Rect, col: u16, row: u16) -> ClickOutcome {
    if content.contains(col, row) {
        ClickOutcome::Contained
    } else {
        ClickOutcome::Dismiss
    }
}
