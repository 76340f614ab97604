//! Fixed-size ring of per-image frames.
//!
//! The ring is rebuilt as a unit whenever the swapchain is recreated: the old
//! frames are dropped before the first new one is made, so no frame from the
//! old chain survives into the new one.

/// The frames belonging to the current swapchain, indexed by slot.
#[derive(Debug)]
pub struct FrameRing<F> {
    frames: Vec<F>,
}

impl<F> FrameRing<F> {
    /// Creates an empty ring.
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Drops every frame, then makes `count` new ones with `make(slot)`.
    ///
    /// On error the ring is left empty and the frames made so far are dropped.
    pub fn rebuild<E>(
        &mut self,
        count: usize,
        mut make: impl FnMut(usize) -> Result<F, E>,
    ) -> Result<(), E> {
        self.frames.clear();
        self.frames.reserve(count);

        for slot in 0..count {
            match make(slot) {
                Ok(frame) => self.frames.push(frame),
                Err(e) => {
                    self.frames.clear();
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Drops every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn get(&self, slot: usize) -> Option<&F> {
        self.frames.get(slot)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, F> {
        self.frames.iter()
    }
}

impl<F> Default for FrameRing<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    /// Registry of live mock frames by id.
    #[derive(Clone, Default)]
    struct Live(Rc<RefCell<BTreeSet<u32>>>);

    struct MockFrame {
        id: u32,
        live: Live,
    }

    impl MockFrame {
        fn new(id: u32, live: &Live) -> Self {
            live.0.borrow_mut().insert(id);
            Self {
                id,
                live: live.clone(),
            }
        }
    }

    impl Drop for MockFrame {
        fn drop(&mut self) {
            self.live.0.borrow_mut().remove(&self.id);
        }
    }

    fn ids(ring: &FrameRing<MockFrame>) -> BTreeSet<u32> {
        ring.iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_rebuild_replaces_every_frame() {
        let live = Live::default();
        let mut next_id = 0;
        let mut ring = FrameRing::new();

        ring.rebuild(3, |_| -> Result<_, ()> {
            next_id += 1;
            Ok(MockFrame::new(next_id, &live))
        })
        .unwrap();
        let old = ids(&ring);
        assert_eq!(old.len(), 3);

        ring.rebuild(4, |_| -> Result<_, ()> {
            next_id += 1;
            Ok(MockFrame::new(next_id, &live))
        })
        .unwrap();
        let new = ids(&ring);

        assert_eq!(ring.len(), 4);
        assert!(old.is_disjoint(&new));
        assert_eq!(*live.0.borrow(), new);
    }

    #[test]
    fn test_old_frames_dropped_before_new_ones_are_made() {
        let live = Live::default();
        let mut ring = FrameRing::new();
        ring.rebuild(2, |slot| -> Result<_, ()> {
            Ok(MockFrame::new(slot as u32, &live))
        })
        .unwrap();

        let mut live_at_first_make = None;
        ring.rebuild(2, |slot| -> Result<_, ()> {
            if slot == 0 {
                live_at_first_make = Some(live.0.borrow().len());
            }
            Ok(MockFrame::new(10 + slot as u32, &live))
        })
        .unwrap();

        assert_eq!(live_at_first_make, Some(0));
    }

    #[test]
    fn test_failed_rebuild_leaves_nothing_alive() {
        let live = Live::default();
        let mut ring = FrameRing::new();
        let result = ring.rebuild(3, |slot| {
            if slot == 2 {
                Err("out of memory")
            } else {
                Ok(MockFrame::new(slot as u32, &live))
            }
        });

        assert_eq!(result.unwrap_err(), "out of memory");
        assert!(ring.is_empty());
        assert!(live.0.borrow().is_empty());
    }

    #[test]
    fn test_slots_follow_creation_order() {
        let live = Live::default();
        let mut ring = FrameRing::new();
        ring.rebuild(3, |slot| -> Result<_, ()> {
            Ok(MockFrame::new(slot as u32 * 100, &live))
        })
        .unwrap();

        assert_eq!(ring.get(1).map(|f| f.id), Some(100));
        assert!(ring.get(3).is_none());
    }
}
