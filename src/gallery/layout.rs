use crate::config::LayoutOptions;
use crate::gallery::backend::{SurfaceId, Transform};
use crate::gallery::intro::IntroPose;
use crate::gallery::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub usize);

/// Hover, greyscale and opacity, each with a target and a relaxed current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualState {
    pub hover_target: f64,
    pub hover_current: f64,
    pub greyscale_target: f64,
    pub greyscale_current: f64,
    pub opacity_target: f64,
    pub opacity_current: f64,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            hover_target: 0.0,
            hover_current: 0.0,
            greyscale_target: 0.0,
            greyscale_current: 0.0,
            opacity_target: 1.0,
            opacity_current: 1.0,
        }
    }
}

/// One card instance: a content entry inside one ring.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    /// Index into the content snapshot.
    pub index: usize,
    /// Ring the instance was created in, relative to the primary ring.
    pub ring: i64,
    base_offset: f64,
    ring_offset: f64,
    pub visual: VisualState,
    pub surface: Option<SurfaceId>,
    /// Set while the entrance animation drives this card.
    pub intro_pose: Option<IntroPose>,
    pub last_transform: Option<Transform>,
}

impl Item {
    pub fn base_offset(&self) -> f64 {
        self.base_offset
    }

    pub fn ring_offset(&self) -> f64 {
        self.ring_offset
    }

    /// Position on the strip at which this card is centred in view.
    pub fn resolved_offset(&self) -> f64 {
        self.base_offset + self.ring_offset
    }
}

/// Card size and spacing in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardMetrics {
    pub width: f64,
    pub height: f64,
    pub spacing: f64,
    pub corner_radius_uv: f64,
}

impl CardMetrics {
    /// Derive world-space card geometry from pixel sizes. Height is capped; a
    /// capped card narrows to keep its aspect.
    pub fn from_viewport(viewport: &Viewport, layout: &LayoutOptions) -> Self {
        let upp = viewport.units_per_pixel();
        let max_height = layout.max_card_height_px * upp;
        let mut width = layout.card_width_px * upp;
        let mut height = width / layout.card_aspect;
        if height > max_height {
            height = max_height;
            width = max_height * layout.card_aspect;
        }
        Self {
            width,
            height,
            spacing: width + layout.card_gap_px * upp,
            corner_radius_uv: layout.corner_radius_px / layout.card_width_px,
        }
    }
}

/// A finite strip of cards presented as an endless one by keeping several
/// duplicate rings alive and moving whole rings across when they drift too far.
#[derive(Debug, Clone)]
pub struct InfiniteLayout {
    items: Vec<Item>,
    content_len: usize,
    rings: usize,
    metrics: CardMetrics,
}

impl InfiniteLayout {
    pub fn build(content_len: usize, rings: usize, metrics: CardMetrics) -> Self {
        let rings = rings.max(1);
        let half = (rings / 2) as i64;
        let total_width = content_len as f64 * metrics.spacing;
        let mut items = Vec::with_capacity(content_len * rings);
        for ring in -half..=(rings as i64 - 1 - half) {
            for index in 0..content_len {
                items.push(Item {
                    id: ItemId(items.len()),
                    index,
                    ring,
                    base_offset: Self::base_offset_for(index, content_len, metrics.spacing),
                    ring_offset: ring as f64 * total_width,
                    visual: VisualState::default(),
                    surface: None,
                    intro_pose: None,
                    last_transform: None,
                });
            }
        }
        Self {
            items,
            content_len,
            rings,
            metrics,
        }
    }

    /// Centre of `index` within one ring; the ring itself is centred on zero.
    pub fn base_offset_for(index: usize, content_len: usize, spacing: f64) -> f64 {
        let n = content_len.max(1);
        let set_index = index % n;
        set_index as f64 * spacing - (n as f64 - 1.0) * spacing / 2.0
    }

    pub fn metrics(&self) -> CardMetrics {
        self.metrics
    }

    pub fn content_len(&self) -> usize {
        self.content_len
    }

    pub fn rings(&self) -> usize {
        self.rings
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id.0)
    }

    pub fn ring_width(&self) -> f64 {
        self.content_len as f64 * self.metrics.spacing
    }

    pub fn total_span(&self) -> f64 {
        self.ring_width() * self.rings as f64
    }

    pub fn half_span(&self) -> f64 {
        self.total_span() / 2.0
    }

    /// Where the first card of the primary ring sits; the gallery opens here.
    pub fn home_position(&self) -> f64 {
        Self::base_offset_for(0, self.content_len, self.metrics.spacing)
    }

    /// Signed ring-relative index, so the first card of the ring left of the
    /// primary one is `-content_len`.
    pub fn original_index(&self, item: &Item) -> i64 {
        item.index as i64 + item.ring * self.content_len as i64
    }

    /// World x of the card relative to the viewer.
    pub fn world_position(&self, item: &Item, rendered_position: f64) -> f64 {
        item.resolved_offset() - rendered_position
    }

    /// Move every card whose ring drifted more than half the span away from
    /// `position` back to the near side. Returns how many cards moved.
    pub fn rewrap(&mut self, position: f64) -> usize {
        let span = self.total_span();
        if span <= 0.0 {
            return 0;
        }
        let half = span / 2.0;
        let mut moved = 0;
        for item in &mut self.items {
            let before = item.ring_offset;
            while item.resolved_offset() - position > half {
                item.ring_offset -= span;
            }
            while item.resolved_offset() - position < -half {
                item.ring_offset += span;
            }
            if item.ring_offset != before {
                moved += 1;
            }
        }
        moved
    }

    /// Closest card to `position` strictly within `range`.
    pub fn nearest_within(&self, position: f64, range: f64) -> Option<ItemId> {
        self.items
            .iter()
            .map(|item| (item.id, (item.resolved_offset() - position).abs()))
            .filter(|(_, distance)| *distance < range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}
