//! The per-frame protocol.
//!
//! [`FrameLoop::draw_frame`] drives one displayed frame through a
//! [`FrameBackend`] in a fixed order:
//!
//! 1. Wait on the slot's in-flight fence.
//! 2. Acquire an image. A stale chain is recreated and the frame ends here.
//! 3. Reset the slot's command buffer.
//! 4. Write camera and instance data for the frame.
//! 5. Record the sky and standard passes.
//! 6. Reset the fence and submit.
//! 7. Present. A stale or suboptimal chain is recreated and the frame ends here.
//! 8. Advance to the next slot.
//!
//! The backend owns all GPU state; the loop only owns the slot counter.

use engine_platform::FramebufferSource;
use engine_rhi::RhiResult;
use engine_rhi::swapchain::AcquireOutcome;
use tracing::{debug, trace};

/// GPU-side operations the frame loop sequences.
///
/// `slot` selects the frame whose fence, semaphores, command buffer and
/// per-frame buffers are used. `image_index` selects the swapchain image
/// being drawn to.
pub trait FrameBackend {
    /// Number of frames, equal to the swapchain image count.
    fn frame_count(&self) -> usize;

    /// Returns true once if the window asked for a new swapchain since the
    /// last call.
    fn take_resize_request(&mut self) -> bool;

    /// Blocks until the GPU has finished the slot's previous submission.
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquires the next image, signalling the slot's image-available semaphore.
    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    fn reset_commands(&mut self, slot: usize) -> RhiResult<()>;

    /// Writes the slot's camera and transform buffers and descriptor sets.
    fn update(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Resets the slot's fence and submits its command buffer.
    fn submit(&mut self, slot: usize) -> RhiResult<()>;

    /// Presents `image_index`. Returns true if the chain is stale or suboptimal.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<bool>;

    /// Rebuilds the swapchain and every frame.
    fn recreate(&mut self) -> RhiResult<()>;
}

/// How a call to [`FrameLoop::draw_frame`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented.
    Presented,
    /// The chain was recreated after acquire reported it stale. Nothing was submitted.
    RecreatedBeforeSubmit,
    /// The frame was presented, then the chain was recreated.
    RecreatedAfterPresent,
}

/// Slot counter for the frames in flight.
#[derive(Debug, Default)]
pub struct FrameLoop {
    slot: usize,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Renders one frame.
    ///
    /// # Errors
    ///
    /// Propagates the first backend error. Stale swapchains are not errors.
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> RhiResult<FrameStatus> {
        if backend.take_resize_request() {
            debug!("Resize requested, recreating swapchain before acquire");
            self.recreate(backend)?;
        }

        let slot = self.slot;
        backend.wait_for_slot(slot)?;

        let image_index = match backend.acquire(slot)? {
            AcquireOutcome::Acquired(index) => index,
            AcquireOutcome::Stale => {
                debug!("Swapchain out of date at acquire");
                self.recreate(backend)?;
                return Ok(FrameStatus::RecreatedBeforeSubmit);
            }
        };
        trace!("Slot {} acquired image {}", slot, image_index);

        backend.reset_commands(slot)?;
        backend.update(slot, image_index)?;
        backend.record(slot, image_index)?;
        backend.submit(slot)?;
        let stale = backend.present(slot, image_index)?;

        let frame_count = backend.frame_count().max(1);
        self.slot = (slot + 1) % frame_count;

        if stale {
            debug!("Swapchain stale or suboptimal at present");
            self.recreate(backend)?;
            return Ok(FrameStatus::RecreatedAfterPresent);
        }

        Ok(FrameStatus::Presented)
    }

    /// Recreates the backend's swapchain and restarts the slot counter.
    pub fn recreate<B: FrameBackend>(&mut self, backend: &mut B) -> RhiResult<()> {
        backend.recreate()?;
        self.slot = 0;
        Ok(())
    }
}

/// Blocks until `source` reports a drawable framebuffer and returns its size.
pub fn wait_for_nonzero_extent(source: &impl FramebufferSource) -> (u32, u32) {
    let mut polls = 0u32;
    loop {
        let (width, height) = source.framebuffer_size();
        if width > 0 && height > 0 {
            if polls > 0 {
                debug!("Framebuffer usable again after {} polls: {}x{}", polls, width, height);
            }
            return (width, height);
        }
        polls += 1;
        source.wait_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use engine_rhi::RhiError;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Reset(usize),
        Update(usize, u32),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Recreate,
    }

    /// Backend that records every call and replays scripted results.
    struct MockBackend {
        frames: usize,
        calls: Vec<Call>,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<bool>,
        resize_requested: bool,
        next_image: u32,
        /// Per slot: true while a submission is pending on the fence.
        fence_pending: Vec<bool>,
        /// Per slot: true while the command buffer holds unsubmitted commands.
        recording: Vec<bool>,
        recreated_frames: usize,
    }

    impl MockBackend {
        fn new(frames: usize) -> Self {
            Self {
                frames,
                calls: Vec::new(),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                resize_requested: false,
                next_image: 0,
                fence_pending: vec![false; frames],
                recording: vec![false; frames],
                recreated_frames: frames,
            }
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }
    }

    impl FrameBackend for MockBackend {
        fn frame_count(&self) -> usize {
            self.frames
        }

        fn take_resize_request(&mut self) -> bool {
            std::mem::take(&mut self.resize_requested)
        }

        fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Wait(slot));
            // The GPU finishes instantly.
            self.fence_pending[slot] = false;
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            Ok(self.acquires.pop_front().unwrap_or_else(|| {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % self.frames as u32;
                AcquireOutcome::Acquired(index)
            }))
        }

        fn reset_commands(&mut self, slot: usize) -> RhiResult<()> {
            assert!(!self.fence_pending[slot], "reset while pending");
            self.calls.push(Call::Reset(slot));
            self.recording[slot] = true;
            Ok(())
        }

        fn update(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            self.calls.push(Call::Update(slot, image_index));
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            assert!(self.recording[slot], "record without reset");
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Submit(slot));
            self.recording[slot] = false;
            self.fence_pending[slot] = true;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<bool> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.presents.pop_front().unwrap_or(false))
        }

        fn recreate(&mut self) -> RhiResult<()> {
            self.calls.push(Call::Recreate);
            self.frames = self.recreated_frames;
            self.fence_pending = vec![false; self.frames];
            self.recording = vec![false; self.frames];
            self.next_image = 0;
            Ok(())
        }
    }

    #[test]
    fn test_slot_is_call_index_mod_frame_count() {
        let mut backend = MockBackend::new(3);
        let mut frame_loop = FrameLoop::new();

        for i in 0..10 {
            assert_eq!(frame_loop.slot(), i % 3);
            let status = frame_loop.draw_frame(&mut backend).unwrap();
            assert_eq!(status, FrameStatus::Presented);
        }

        let waits: Vec<usize> = backend
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Wait(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(waits, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_steps_run_in_order() {
        let mut backend = MockBackend::new(2);
        let mut frame_loop = FrameLoop::new();
        frame_loop.draw_frame(&mut backend).unwrap();

        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Update(0, 0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
    }

    #[test]
    fn test_reset_only_after_wait_on_same_slot() {
        let mut backend = MockBackend::new(2);
        let mut frame_loop = FrameLoop::new();
        for _ in 0..6 {
            frame_loop.draw_frame(&mut backend).unwrap();
        }

        for (i, call) in backend.calls.iter().enumerate() {
            if let Call::Reset(slot) = call {
                assert_eq!(backend.calls[i - 2], Call::Wait(*slot));
                assert_eq!(backend.calls[i - 1], Call::Acquire(*slot));
            }
        }
    }

    #[test]
    fn test_acquire_stale_recreates_before_submit() {
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireOutcome::Stale);
        let mut frame_loop = FrameLoop::new();

        let status = frame_loop.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::RecreatedBeforeSubmit);
        assert_eq!(
            backend.calls,
            vec![Call::Wait(0), Call::Acquire(0), Call::Recreate]
        );
        assert_eq!(backend.count(&Call::Submit(0)), 0);
        assert_eq!(frame_loop.slot(), 0);

        // The fence was not reset, so the next frame's wait returns immediately.
        assert!(!backend.fence_pending[0]);
        assert_eq!(
            frame_loop.draw_frame(&mut backend).unwrap(),
            FrameStatus::Presented
        );
    }

    #[test]
    fn test_present_stale_recreates_after_present() {
        let mut backend = MockBackend::new(3);
        backend.presents.push_back(false);
        backend.presents.push_back(true);
        backend.recreated_frames = 2;
        let mut frame_loop = FrameLoop::new();

        frame_loop.draw_frame(&mut backend).unwrap();
        let status = frame_loop.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::RecreatedAfterPresent);
        assert_eq!(backend.calls.last(), Some(&Call::Recreate));
        assert_eq!(backend.frame_count(), 2);
        assert_eq!(frame_loop.slot(), 0);

        for expected in [0, 1, 0] {
            assert_eq!(frame_loop.slot(), expected);
            frame_loop.draw_frame(&mut backend).unwrap();
        }
    }

    #[test]
    fn test_resize_request_recreates_first() {
        let mut backend = MockBackend::new(2);
        let mut frame_loop = FrameLoop::new();
        frame_loop.draw_frame(&mut backend).unwrap();

        backend.resize_requested = true;
        backend.calls.clear();
        frame_loop.draw_frame(&mut backend).unwrap();

        assert_eq!(backend.calls[0], Call::Recreate);
        assert_eq!(backend.calls[1], Call::Wait(0));
        assert!(!backend.take_resize_request());
    }

    #[test]
    fn test_backend_error_propagates() {
        struct Failing;

        impl FrameBackend for Failing {
            fn frame_count(&self) -> usize {
                1
            }
            fn take_resize_request(&mut self) -> bool {
                false
            }
            fn wait_for_slot(&mut self, _: usize) -> RhiResult<()> {
                Ok(())
            }
            fn acquire(&mut self, _: usize) -> RhiResult<AcquireOutcome> {
                Err(RhiError::SwapchainError("surface lost".to_string()))
            }
            fn reset_commands(&mut self, _: usize) -> RhiResult<()> {
                unreachable!()
            }
            fn update(&mut self, _: usize, _: u32) -> RhiResult<()> {
                unreachable!()
            }
            fn record(&mut self, _: usize, _: u32) -> RhiResult<()> {
                unreachable!()
            }
            fn submit(&mut self, _: usize) -> RhiResult<()> {
                unreachable!()
            }
            fn present(&mut self, _: usize, _: u32) -> RhiResult<bool> {
                unreachable!()
            }
            fn recreate(&mut self) -> RhiResult<()> {
                unreachable!()
            }
        }

        let mut frame_loop = FrameLoop::new();
        assert!(matches!(
            frame_loop.draw_frame(&mut Failing),
            Err(RhiError::SwapchainError(_))
        ));
        assert_eq!(frame_loop.slot(), 0);
    }

    /// Framebuffer source replaying scripted sizes.
    struct ScriptedWindow {
        sizes: RefCell<VecDeque<(u32, u32)>>,
        queries: Cell<usize>,
        waits: Cell<usize>,
    }

    impl FramebufferSource for ScriptedWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.queries.set(self.queries.get() + 1);
            self.sizes.borrow_mut().pop_front().unwrap_or((0, 0))
        }

        fn wait_events(&self) {
            self.waits.set(self.waits.get() + 1);
        }
    }

    #[test]
    fn test_zero_extent_blocks_until_nonzero() {
        let window = ScriptedWindow {
            sizes: RefCell::new(VecDeque::from([(0, 0), (0, 0), (800, 600)])),
            queries: Cell::new(0),
            waits: Cell::new(0),
        };

        assert_eq!(wait_for_nonzero_extent(&window), (800, 600));
        assert_eq!(window.queries.get(), 3);
        assert_eq!(window.waits.get(), 2);
    }

    #[test]
    fn test_half_zero_extent_still_waits() {
        let window = ScriptedWindow {
            sizes: RefCell::new(VecDeque::from([(640, 0), (1, 1)])),
            queries: Cell::new(0),
            waits: Cell::new(0),
        };

        assert_eq!(wait_for_nonzero_extent(&window), (1, 1));
        assert_eq!(window.waits.get(), 1);
    }
}
