//! Preload slots for the verses either side of the active one.
//!
//! Each side holds at most one loaded-but-idle clip. Loads in flight are
//! tracked by verse index and session generation rather than by side, so a
//! verse that changes sides after a jump is not fetched twice, and a load
//! started before a chapter or reciter change is recognised as stale.

use crate::clip::ClipHandle;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotSide {
    Previous,
    Next,
}

impl SlotSide {
    /// Verse index this side should hold when `active` is playing.
    pub fn target(self, active: usize, len: usize) -> Option<usize> {
        match self {
            SlotSide::Previous => active.checked_sub(1),
            SlotSide::Next => Some(active + 1).filter(|next| *next < len),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    held: Option<(usize, Arc<ClipHandle>)>,
}

#[derive(Debug, Default)]
pub struct PreloadSlots {
    previous: Slot,
    next: Slot,
    /// `(generation, index)` of every preload not yet landed
    in_flight: Vec<(u64, usize)>,
}

impl PreloadSlots {
    fn slot(&self, side: SlotSide) -> &Slot {
        match side {
            SlotSide::Previous => &self.previous,
            SlotSide::Next => &self.next,
        }
    }

    fn slot_mut(&mut self, side: SlotSide) -> &mut Slot {
        match side {
            SlotSide::Previous => &mut self.previous,
            SlotSide::Next => &mut self.next,
        }
    }

    /// Verse index held on `side`, if any.
    pub fn held_index(&self, side: SlotSide) -> Option<usize> {
        self.slot(side).held.as_ref().map(|(index, _)| *index)
    }

    /// Remove and return the handle for `index`, from whichever side has it.
    pub fn take_matching(&mut self, index: usize) -> Option<Arc<ClipHandle>> {
        for side in [SlotSide::Next, SlotSide::Previous] {
            let slot = self.slot_mut(side);
            if matches!(slot.held, Some((held, _)) if held == index) {
                return slot.held.take().map(|(_, handle)| handle);
            }
        }
        None
    }

    /// Re-file held handles around a new active index.
    ///
    /// A handle that is still adjacent moves to the side it now belongs on;
    /// anything else is returned for release.
    pub fn retain_adjacent(&mut self, active: usize, len: usize) -> Vec<Arc<ClipHandle>> {
        let held: Vec<_> = [SlotSide::Previous, SlotSide::Next]
            .into_iter()
            .filter_map(|side| self.slot_mut(side).held.take())
            .collect();

        let mut evicted = Vec::new();
        for (index, handle) in held {
            let side = [SlotSide::Previous, SlotSide::Next]
                .into_iter()
                .find(|side| side.target(active, len) == Some(index));

            match side {
                Some(side) if self.slot(side).held.is_none() => {
                    self.slot_mut(side).held = Some((index, handle));
                }
                _ => evicted.push(handle),
            }
        }
        evicted
    }

    /// Whether verse `index` is neither held nor already loading in `generation`.
    pub fn needs_preload(&self, generation: u64, index: usize) -> bool {
        let held = self.held_indices().contains(&index);
        !held && !self.in_flight.contains(&(generation, index))
    }

    pub fn mark_in_flight(&mut self, generation: u64, index: usize) {
        self.in_flight.push((generation, index));
    }

    /// Clear the in-flight marker for `(generation, index)`.
    ///
    /// # Returns
    /// `true` if the marker was still present.
    pub fn finish_in_flight(&mut self, generation: u64, index: usize) -> bool {
        let before = self.in_flight.len();
        self.in_flight.retain(|marker| *marker != (generation, index));
        self.in_flight.len() != before
    }

    /// Put a preloaded handle on `side`, returning whatever it displaced.
    pub fn store(
        &mut self,
        side: SlotSide,
        index: usize,
        handle: Arc<ClipHandle>,
    ) -> Option<Arc<ClipHandle>> {
        self.slot_mut(side)
            .held
            .replace((index, handle))
            .map(|(_, old)| old)
    }

    /// Empty both sides, forgetting in-flight markers.
    pub fn drain(&mut self) -> Vec<Arc<ClipHandle>> {
        self.in_flight.clear();
        let mut handles = Vec::new();
        for side in [SlotSide::Previous, SlotSide::Next] {
            if let Some((_, handle)) = self.slot_mut(side).held.take() {
                handles.push(handle);
            }
        }
        handles
    }

    /// Indices currently held, previous side first.
    pub fn held_indices(&self) -> Vec<usize> {
        [SlotSide::Previous, SlotSide::Next]
            .into_iter()
            .filter_map(|side| self.held_index(side))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::playback::{ClipId, ClipPlayer, ClipSource, ClipStatusSink};
    use std::time::Duration;

    struct InertPlayer;

    #[async_trait::async_trait]
    impl ClipPlayer for InertPlayer {
        async fn load(&self, _source: ClipSource) -> BridgeResult<ClipId> {
            Ok(ClipId::new())
        }
        async fn play(&self, _clip: ClipId) -> BridgeResult<()> {
            Ok(())
        }
        async fn pause(&self, _clip: ClipId) -> BridgeResult<()> {
            Ok(())
        }
        async fn stop(&self, _clip: ClipId) -> BridgeResult<()> {
            Ok(())
        }
        async fn seek(&self, _clip: ClipId, _position: Duration) -> BridgeResult<()> {
            Ok(())
        }
        async fn unload(&self, _clip: ClipId) -> BridgeResult<()> {
            Ok(())
        }
        async fn attach_status(
            &self,
            _clip: ClipId,
            _sink: Arc<dyn ClipStatusSink>,
        ) -> BridgeResult<()> {
            Ok(())
        }
        async fn detach_status(&self, _clip: ClipId) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn handle(index: usize) -> Arc<ClipHandle> {
        Arc::new(ClipHandle::new(Arc::new(InertPlayer), format!("clip-{}", index)))
    }

    #[test]
    fn test_side_targets() {
        assert_eq!(SlotSide::Previous.target(0, 7), None);
        assert_eq!(SlotSide::Previous.target(3, 7), Some(2));
        assert_eq!(SlotSide::Next.target(5, 7), Some(6));
        assert_eq!(SlotSide::Next.target(6, 7), None);
    }

    #[test]
    fn test_take_matching_clears_slot() {
        let mut slots = PreloadSlots::default();
        slots.store(SlotSide::Previous, 2, handle(2));
        slots.store(SlotSide::Next, 4, handle(4));

        let taken = slots.take_matching(4).unwrap();
        assert_eq!(taken.url(), "clip-4");
        assert!(slots.take_matching(4).is_none());
        assert_eq!(slots.held_indices(), vec![2]);
    }

    #[test]
    fn test_retain_adjacent_refiles_and_evicts() {
        let mut slots = PreloadSlots::default();
        slots.store(SlotSide::Previous, 4, handle(4));
        slots.store(SlotSide::Next, 6, handle(6));

        // Jump from 5 to 7: verse 6 becomes the previous neighbour
        let evicted = slots.retain_adjacent(7, 10);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].url(), "clip-4");
        assert_eq!(slots.held_index(SlotSide::Previous), Some(6));
        assert_eq!(slots.held_index(SlotSide::Next), None);

        // Jump two back: nothing adjacent remains
        let evicted = slots.retain_adjacent(4, 10);
        assert_eq!(evicted.len(), 1);
        assert!(slots.held_indices().is_empty());
    }

    #[test]
    fn test_in_flight_markers() {
        let mut slots = PreloadSlots::default();
        assert!(slots.needs_preload(1, 3));

        slots.mark_in_flight(1, 3);
        assert!(!slots.needs_preload(1, 3));
        // A chapter or reciter change starts a new generation
        assert!(slots.needs_preload(2, 3));

        slots.mark_in_flight(2, 3);
        assert!(slots.finish_in_flight(1, 3));
        assert!(!slots.finish_in_flight(1, 3));
        assert!(slots.finish_in_flight(2, 3));
        assert!(slots.needs_preload(2, 3));
    }

    #[test]
    fn test_held_verse_needs_no_preload_on_either_side() {
        let mut slots = PreloadSlots::default();
        slots.store(SlotSide::Next, 6, handle(6));
        assert!(!slots.needs_preload(0, 6));
        assert!(slots.needs_preload(0, 5));
    }

    #[test]
    fn test_drain() {
        let mut slots = PreloadSlots::default();
        slots.store(SlotSide::Previous, 0, handle(0));
        slots.mark_in_flight(5, 2);

        assert_eq!(slots.drain().len(), 1);
        assert!(slots.needs_preload(5, 2));
        assert!(slots.held_indices().is_empty());
    }
}
