use crate::gallery::layout::ItemId;
use crate::gallery::scheduler::PerformanceMode;

/// Pointer position and the card under it, re-picked at a throttled rate.
#[derive(Debug, Clone)]
pub struct HoverTracker {
    pointer_ndc: Option<[f64; 2]>,
    moved: bool,
    hovered: Option<ItemId>,
    /// Frame interval between picks in performance mode.
    pick_interval: u32,
}

impl HoverTracker {
    pub fn new(pick_interval: u32) -> Self {
        Self {
            pointer_ndc: None,
            moved: false,
            hovered: None,
            pick_interval: pick_interval.max(1),
        }
    }

    pub fn set_pick_interval(&mut self, interval: u32) {
        self.pick_interval = interval.max(1);
    }

    pub fn pointer_moved(&mut self, ndc: [f64; 2]) {
        self.pointer_ndc = Some(ndc);
        self.moved = true;
    }

    pub fn pointer_left(&mut self) {
        self.pointer_ndc = None;
        self.moved = true;
    }

    pub fn pointer_ndc(&self) -> [f64; 2] {
        self.pointer_ndc.unwrap_or([0.0, 0.0])
    }

    pub fn hovered(&self) -> Option<ItemId> {
        self.hovered
    }

    /// Forget the hovered card. Returns whether one was hovered.
    pub fn clear(&mut self) -> bool {
        self.hovered.take().is_some()
    }

    /// Run one throttled pick. `pick` performs the ray test at the pointer.
    ///
    /// Returns the new hovered card when it changed. While dragging nothing is
    /// hovered and no pick runs.
    pub fn update(
        &mut self,
        frame: u64,
        dragging: bool,
        moving: bool,
        mode: PerformanceMode,
        pick: impl FnOnce([f64; 2]) -> Option<ItemId>,
    ) -> Option<Option<ItemId>> {
        if dragging {
            self.moved = false;
            return self.clear().then_some(None);
        }

        let interval = if mode.degraded() {
            u64::from(self.pick_interval)
        } else {
            1
        };
        if !(self.moved || moving) || frame % interval != 0 {
            return None;
        }
        self.moved = false;

        let next = match self.pointer_ndc {
            Some(ndc) => pick(ndc),
            None => None,
        };
        if next != self.hovered {
            self.hovered = next;
            Some(next)
        } else {
            None
        }
    }
}
