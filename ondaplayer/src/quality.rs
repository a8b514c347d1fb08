//! Quality ladder tracking for adaptive streams.
//!
//! The ladder is the list of selectable renditions shown to the user:
//! heights sorted descending, one entry per height, with a synthetic Auto
//! entry on top whenever there is a real choice to make.
//!
//! Level indexes are positions in the sorted ladder (0 is the tallest
//! rendition), `-1` is Auto. Each level remembers which engine
//! representation backs it so that pinning can be forwarded.

use tracing::{debug, warn};

use crate::capabilities::{AdaptiveEngine, Representation};

/// Index of the synthetic Auto entry.
pub const AUTO_LEVEL: i32 = -1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualityLevel {
    pub index: i32,
    pub height: u32,
    pub label: String,
    /// Position in the engine's representation list, `None` for Auto and for
    /// levels that do not come from the representation API.
    pub representation: Option<usize>,
}

impl QualityLevel {
    pub fn auto() -> Self {
        Self {
            index: AUTO_LEVEL,
            height: 0,
            label: "Auto".to_string(),
            representation: None,
        }
    }

    fn rendition(index: usize, height: u32, representation: Option<usize>) -> Self {
        Self {
            index: index as i32,
            height,
            label: format!("{height}p"),
            representation,
        }
    }

    pub fn is_auto(&self) -> bool {
        self.index == AUTO_LEVEL
    }
}

/// Builds the real levels (no Auto entry) from a representation list.
///
/// Zero-height entries are dropped, the rest sorted by height descending and
/// deduplicated by height. Sorting is stable, so among equal heights the
/// first one listed by the engine is kept. When nothing usable remains and
/// `fallback_height` is non-zero, a single level is synthesised from it.
pub fn compute_ladder(
    representations: &[Representation],
    from_representation_api: bool,
    fallback_height: u32,
) -> Vec<QualityLevel> {
    let mut candidates: Vec<(usize, u32)> = representations
        .iter()
        .enumerate()
        .filter(|(_, rep)| rep.height > 0)
        .map(|(position, rep)| (position, rep.height))
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    candidates.dedup_by_key(|(_, height)| *height);

    if candidates.is_empty() {
        if fallback_height > 0 {
            return vec![QualityLevel::rendition(0, fallback_height, None)];
        }
        return Vec::new();
    }

    candidates
        .into_iter()
        .enumerate()
        .map(|(index, (position, height))| {
            QualityLevel::rendition(index, height, from_representation_api.then_some(position))
        })
        .collect()
}

/// Prepends the Auto entry when more than one real level exists.
pub fn with_auto(levels: Vec<QualityLevel>) -> Vec<QualityLevel> {
    if levels.len() > 1 {
        let mut all = Vec::with_capacity(levels.len() + 1);
        all.push(QualityLevel::auto());
        all.extend(levels);
        all
    } else {
        levels
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LadderUpdate {
    pub levels_changed: bool,
    pub selection_changed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityRequest {
    /// Back to Auto; the engine settles asynchronously, so callers should
    /// re-run [`QualityLadderTracker::track_active`] a few times.
    Auto,
    Pinned(i32),
    Rejected,
}

#[derive(Debug)]
pub struct QualityLadderTracker {
    levels: Vec<QualityLevel>,
    current_level: i32,
    auto_mode: bool,
    /// The user explicitly chose a rendition.
    pinned: bool,
}

impl Default for QualityLadderTracker {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            current_level: AUTO_LEVEL,
            auto_mode: true,
            pinned: false,
        }
    }
}

impl QualityLadderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    pub fn current_level(&self) -> i32 {
        self.current_level
    }

    pub fn is_auto_mode(&self) -> bool {
        self.auto_mode
    }

    /// Label for the selector button, e.g. `Auto (720p)` or `480p`.
    pub fn current_label(&self) -> Option<String> {
        let current = self.real_level(self.current_level);
        if self.auto_mode && self.real_levels().count() > 1 {
            return Some(match current {
                Some(level) => format!("Auto ({})", level.label),
                None => "Auto".to_string(),
            });
        }
        current.map(|level| level.label.clone())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn real_levels(&self) -> impl Iterator<Item = &QualityLevel> {
        self.levels.iter().filter(|level| !level.is_auto())
    }

    fn real_level(&self, index: i32) -> Option<&QualityLevel> {
        self.real_levels().find(|level| level.index == index)
    }

    /// Recomputes the ladder from the engine.
    ///
    /// The stored ladder is left untouched when the new one is structurally
    /// identical, so periodic events do not cause re-renders.
    pub fn refresh(&mut self, engine: &dyn AdaptiveEngine, surface_height: u32) -> LadderUpdate {
        let mut representations = engine.representations();
        let from_api = !representations.is_empty();
        if !from_api {
            representations = engine.master_variants();
        }

        let fallback = engine
            .active_height()
            .filter(|height| *height > 0)
            .unwrap_or(surface_height);
        let real = compute_ladder(&representations, from_api, fallback);
        if real.is_empty() {
            return LadderUpdate::default();
        }

        let mut update = LadderUpdate::default();
        let real_count = real.len();
        let full = with_auto(real);
        if full != self.levels {
            debug!(levels = full.len(), "Quality ladder changed");
            self.levels = full;
            update.levels_changed = true;
        }

        let before = (self.current_level, self.auto_mode);
        if real_count > 1 {
            if !self.pinned {
                self.auto_mode = true;
                self.follow_active(engine.active_height());
            }
        } else {
            self.auto_mode = false;
            self.pinned = false;
            self.current_level = self.levels[0].index;
        }
        update.selection_changed = before != (self.current_level, self.auto_mode);
        update
    }

    /// Informational tracking of the rendition the engine picked while in
    /// Auto. Never written back to the engine.
    pub fn track_active(&mut self, engine: &dyn AdaptiveEngine) -> bool {
        if !self.auto_mode {
            return false;
        }
        let before = self.current_level;
        self.follow_active(engine.active_height());
        before != self.current_level
    }

    fn follow_active(&mut self, active_height: Option<u32>) {
        if let Some(height) = active_height {
            let matched = self
                .real_levels()
                .find(|level| level.height == height)
                .map(|level| level.index);
            if let Some(index) = matched {
                self.current_level = index;
            }
        }
    }

    /// Applies a user quality choice to the engine.
    pub fn set_quality_level(
        &mut self,
        index: i32,
        engine: &mut dyn AdaptiveEngine,
    ) -> QualityRequest {
        if index == AUTO_LEVEL {
            engine.enable_only(None);
            self.auto_mode = true;
            self.pinned = false;
            self.follow_active(engine.active_height());
            return QualityRequest::Auto;
        }

        let Some(level) = self.real_level(index).cloned() else {
            warn!(index, "Ignoring unknown quality level");
            return QualityRequest::Rejected;
        };

        match level.representation {
            Some(position) => engine.enable_only(Some(position)),
            None => debug!(index, "Quality level has no engine representation to pin"),
        }
        self.auto_mode = false;
        self.pinned = true;
        self.current_level = index;
        QualityRequest::Pinned(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reps(heights: &[u32]) -> Vec<Representation> {
        heights
            .iter()
            .map(|h| Representation::new(*h, u64::from(*h) * 1000))
            .collect()
    }

    fn heights(levels: &[QualityLevel]) -> Vec<u32> {
        levels.iter().map(|l| l.height).collect()
    }

    #[test]
    fn test_dedup_keeps_descending_unique_heights() {
        let ladder = compute_ladder(&reps(&[1080, 720, 720, 480, 240]), true, 0);
        assert_eq!(heights(&ladder), vec![1080, 720, 480, 240]);
        assert_eq!(
            ladder.iter().map(|l| l.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        // first 720 listed by the engine wins
        assert_eq!(ladder[1].representation, Some(1));
        assert_eq!(ladder[3].label, "240p");
    }

    #[test]
    fn test_zero_heights_dropped_and_unsorted_input() {
        let ladder = compute_ladder(&reps(&[0, 360, 1080, 0, 720]), true, 0);
        assert_eq!(heights(&ladder), vec![1080, 720, 360]);
        assert_eq!(ladder[0].representation, Some(2));
    }

    #[test]
    fn test_surface_height_fallback_is_single_level() {
        let ladder = compute_ladder(&reps(&[0, 0]), true, 576);
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder[0].label, "576p");
        assert_eq!(ladder[0].representation, None);

        assert!(compute_ladder(&[], true, 0).is_empty());
    }

    #[test]
    fn test_master_variants_are_not_pinnable() {
        let ladder = compute_ladder(&reps(&[720, 480]), false, 0);
        assert!(ladder.iter().all(|l| l.representation.is_none()));
    }

    #[test]
    fn test_auto_entry_only_with_a_choice() {
        let single = with_auto(compute_ladder(&reps(&[720]), true, 0));
        assert_eq!(single.len(), 1);
        assert!(!single[0].is_auto());

        let many = with_auto(compute_ladder(&reps(&[720, 480]), true, 0));
        assert_eq!(many.len(), 3);
        assert_eq!(many[0], QualityLevel::auto());
        assert_eq!(many[0].index, -1);
    }
}
