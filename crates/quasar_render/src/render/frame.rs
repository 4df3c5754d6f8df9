//! Frames-in-flight protocol
//!
//! [`FrameSynchronizer`] drives one frame through wait, acquire, record,
//! submit and present on slot `frame_index mod N`, and decides when the
//! swapchain must be rebuilt. The GPU side sits behind [`FrameBackend`], so
//! the same protocol runs against Vulkan and against an in-memory backend in
//! tests.
//!
//! Ordering within a frame:
//!
//! 1. Wait for the slot's fence.
//! 2. Acquire an image, signaling the slot's image-available semaphore. An
//!    out-of-date result drops the frame without advancing the slot.
//! 3. Re-record the slot's command buffer, then reset its fence.
//! 4. Submit: wait on image-available, signal render-finished and the fence.
//! 5. Present, waiting on render-finished.
//! 6. Advance the slot.
//!
//! The fence is reset only once recording succeeded and submission follows
//! directly. If record, reset or submit fails after an image was acquired,
//! the backend releases the slot through [`FrameBackend::recover_slot`]
//! (consuming the image-available semaphore and signaling the fence) and the
//! swapchain is rebuilt before the next frame, which returns the acquired but
//! never presented image.

use super::vulkan::VulkanResult;

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available
    Acquired {
        /// Index of the swapchain image
        image_index: u32,
        /// The image can be used but the swapchain should be rebuilt
        suboptimal: bool,
    },
    /// The swapchain no longer matches the surface
    OutOfDate,
}

/// Result of queueing a present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented and still matching the surface
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// The swapchain no longer matches the surface
    OutOfDate,
}

/// Result of a swapchain rebuild request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// A new swapchain exists
    Recreated {
        /// Generation of the new swapchain
        generation: u64,
    },
    /// The surface has zero area; nothing was allocated
    Deferred,
}

/// Why a frame was not presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The window is minimized
    Suspended,
    /// Acquire reported the swapchain out of date
    OutOfDate,
    /// A rebuild is pending but the surface has zero area
    ZeroArea,
}

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented
    Presented {
        /// Swapchain image the frame rendered into
        image_index: u32,
    },
    /// Nothing was submitted
    Skipped(SkipReason),
}

/// Frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames submitted and presented
    pub frames_presented: u64,
    /// Successful swapchain rebuilds
    pub recreations: u64,
    /// Frames dropped before submission
    pub skipped: u64,
}

/// GPU operations the frame protocol is written against.
///
/// `slot` is always in `0..frames_in_flight`.
pub trait FrameBackend {
    /// Block until the slot's previous submission completed
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire the next swapchain image, signaling the slot's image-available semaphore
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Reset the slot's fence ahead of submission
    fn reset_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Record the slot's command buffer against `image_index`
    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Submit the slot's command buffer to the graphics queue
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;

    /// Present `image_index`, waiting on the slot's render-finished semaphore
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome>;

    /// Rebuild the swapchain and everything sized by it
    fn recreate_swapchain(&mut self) -> VulkanResult<RecreateOutcome>;

    /// Current drawable size in pixels
    fn surface_extent(&self) -> (u32, u32);

    /// Return and clear any resize notification received since the last call
    fn take_resize_request(&mut self) -> bool;

    /// Put the slot back into a reusable state after a failure between
    /// acquire and submit: the image-available semaphore must be consumed
    /// and the fence must end up signaled.
    fn recover_slot(&mut self, slot: usize) -> VulkanResult<()>;
}

/// Slot ring and swapchain-rebuild bookkeeping
#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    frames_in_flight: usize,
    frame_index: usize,
    recreate_pending: bool,
    suspended: bool,
    stats: FrameStats,
}

impl FrameSynchronizer {
    /// Ring of `frames_in_flight` slots (at least one)
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            frame_index: 0,
            recreate_pending: false,
            suspended: false,
            stats: FrameStats::default(),
        }
    }

    /// Number of slots
    pub const fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Slot the next frame will use
    pub const fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Counters so far
    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Whether a rebuild is waiting for the next frame
    pub const fn recreate_pending(&self) -> bool {
        self.recreate_pending
    }

    /// Ask for a rebuild before the next acquire
    pub fn request_recreate(&mut self) {
        self.recreate_pending = true;
    }

    /// While suspended every frame is skipped
    pub fn set_suspended(&mut self, suspended: bool) {
        if self.suspended && !suspended {
            // Whatever the surface did while minimized, rebuild against it
            self.recreate_pending = true;
        }
        self.suspended = suspended;
    }

    /// Whether frames are being skipped for suspension
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn skip(&mut self, reason: SkipReason) -> FrameOutcome {
        self.stats.skipped += 1;
        log::trace!("Frame skipped: {:?}", reason);
        FrameOutcome::Skipped(reason)
    }

    /// Rebuild now, or leave the request pending while the surface has no area
    fn recreate<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<RecreateOutcome> {
        self.recreate_pending = true;

        let (width, height) = backend.surface_extent();
        if width == 0 || height == 0 {
            log::debug!("Swapchain rebuild deferred: surface is {}x{}", width, height);
            return Ok(RecreateOutcome::Deferred);
        }

        let outcome = backend.recreate_swapchain()?;
        if let RecreateOutcome::Recreated { generation } = outcome {
            self.recreate_pending = false;
            self.stats.recreations += 1;
            log::debug!("Swapchain rebuilt, generation {}", generation);
        }
        Ok(outcome)
    }

    fn record_and_submit<B: FrameBackend>(backend: &mut B, slot: usize, image_index: u32) -> VulkanResult<()> {
        backend.record(slot, image_index)?;
        backend.reset_slot(slot)?;
        backend.submit(slot)
    }

    /// Run one frame through the protocol.
    ///
    /// Out-of-date and suboptimal swapchains are handled here and never
    /// returned as errors; any other backend error is.
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<FrameOutcome> {
        if self.suspended {
            return Ok(self.skip(SkipReason::Suspended));
        }

        if backend.take_resize_request() {
            self.recreate_pending = true;
        }
        if self.recreate_pending && self.recreate(backend)? == RecreateOutcome::Deferred {
            return Ok(self.skip(SkipReason::ZeroArea));
        }

        let slot = self.frame_index;
        backend.wait_for_slot(slot)?;

        let (image_index, suboptimal) = match backend.acquire_image(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                self.recreate(backend)?;
                return Ok(self.skip(SkipReason::OutOfDate));
            }
        };

        if let Err(error) = Self::record_and_submit(backend, slot, image_index) {
            log::error!("Frame on slot {} failed after acquire: {}", slot, error);
            if let Err(recover_error) = backend.recover_slot(slot) {
                log::error!("Failed to release frame slot {}: {}", slot, recover_error);
            }
            // The acquired image is only returned by replacing the swapchain
            self.recreate_pending = true;
            return Err(error);
        }

        let presented = backend.present(slot, image_index);
        // The submission went through, so the slot is in use either way
        self.frame_index = (slot + 1) % self.frames_in_flight;
        let presented = match presented {
            Ok(presented) => presented,
            Err(error) => {
                self.recreate_pending = true;
                return Err(error);
            }
        };
        self.stats.frames_presented += 1;

        let resized = backend.take_resize_request();
        if suboptimal || resized || presented != PresentOutcome::Presented {
            self.recreate(backend)?;
        }

        Ok(FrameOutcome::Presented { image_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::VulkanError;
    use ash::vk;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Wait(usize),
        Acquire(usize),
        Reset(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Recreate,
        Recover(usize),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum FenceState {
        Unsignaled,
        /// `by_submit` is the index of the frame submission that signaled
        /// it; `None` for fences created signaled or released by recovery
        Signaled { by_submit: Option<usize> },
    }

    /// Backend that logs every call and enforces the synchronization rules a
    /// Vulkan driver would: no acquire into a signaled semaphore, no wait on
    /// a fence nothing will signal, no acquire beyond the images available.
    /// The modeled GPU finishes a submission instantly.
    struct MockBackend {
        ops: Vec<Op>,
        image_count: u32,
        next_image: u32,
        fences: Vec<FenceState>,
        /// Set by a wait that observed the fence, cleared by submit
        fence_observed: Vec<bool>,
        image_available: Vec<bool>,
        /// Acquired and not yet presented
        held_images: u32,
        /// Per wait: slot and the submission that signaled its fence
        waits: Vec<(usize, Option<usize>)>,
        submits: usize,
        extent: (u32, u32),
        acquire_results: Vec<AcquireOutcome>,
        present_results: Vec<PresentOutcome>,
        resize_during_record: bool,
        resize_request: bool,
        record_error: Option<vk::Result>,
        submit_error: Option<vk::Result>,
        generation: u64,
        retired_generations: Vec<u64>,
    }

    impl MockBackend {
        fn new(frames_in_flight: usize) -> Self {
            Self {
                ops: Vec::new(),
                image_count: 3,
                next_image: 0,
                fences: vec![FenceState::Signaled { by_submit: None }; frames_in_flight],
                fence_observed: vec![false; frames_in_flight],
                image_available: vec![false; frames_in_flight],
                held_images: 0,
                waits: Vec::new(),
                submits: 0,
                extent: (800, 600),
                acquire_results: Vec::new(),
                present_results: Vec::new(),
                resize_during_record: false,
                resize_request: false,
                record_error: None,
                submit_error: None,
                generation: 1,
                retired_generations: Vec::new(),
            }
        }

        fn count(&self, predicate: impl Fn(&Op) -> bool) -> usize {
            self.ops.iter().filter(|op| predicate(op)).count()
        }

        fn position(&self, wanted: Op) -> Option<usize> {
            self.ops.iter().position(|op| *op == wanted)
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
            self.ops.push(Op::Wait(slot));
            match self.fences[slot] {
                FenceState::Unsignaled => panic!("wait on slot {slot} fence that nothing will signal"),
                FenceState::Signaled { by_submit } => self.waits.push((slot, by_submit)),
            }
            self.fence_observed[slot] = true;
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
            self.ops.push(Op::Acquire(slot));
            let outcome = if self.acquire_results.is_empty() {
                let image_index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal: false,
                }
            } else {
                self.acquire_results.remove(0)
            };

            if let AcquireOutcome::Acquired { .. } = outcome {
                assert!(
                    !self.image_available[slot],
                    "acquire into already-signaled semaphore of slot {slot}"
                );
                assert!(self.held_images < self.image_count, "acquire would block: every image is held");
                self.image_available[slot] = true;
                self.held_images += 1;
            }
            Ok(outcome)
        }

        fn reset_slot(&mut self, slot: usize) -> VulkanResult<()> {
            assert!(self.fence_observed[slot], "fence of slot {slot} reset before it was waited on");
            self.ops.push(Op::Reset(slot));
            self.fences[slot] = FenceState::Unsignaled;
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            assert!(
                self.fence_observed[slot],
                "command buffer of slot {slot} rewritten while possibly in flight"
            );
            if let Some(error) = self.record_error.take() {
                return Err(VulkanError::Api(error));
            }
            self.ops.push(Op::Record(slot, image_index));
            if self.resize_during_record {
                self.resize_during_record = false;
                self.resize_request = true;
            }
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> VulkanResult<()> {
            if let Some(error) = self.submit_error.take() {
                return Err(VulkanError::Api(error));
            }
            assert!(self.image_available[slot], "submit waits on an unsignaled semaphore");
            self.ops.push(Op::Submit(slot));
            self.image_available[slot] = false;
            self.fences[slot] = FenceState::Signaled {
                by_submit: Some(self.submits),
            };
            self.submits += 1;
            self.fence_observed[slot] = false;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
            self.ops.push(Op::Present(slot, image_index));
            self.held_images -= 1;
            if self.present_results.is_empty() {
                Ok(PresentOutcome::Presented)
            } else {
                Ok(self.present_results.remove(0))
            }
        }

        fn recreate_swapchain(&mut self) -> VulkanResult<RecreateOutcome> {
            self.ops.push(Op::Recreate);
            assert!(
                !self.retired_generations.contains(&self.generation),
                "swapchain generation {} destroyed twice",
                self.generation
            );
            self.retired_generations.push(self.generation);
            self.generation += 1;
            self.next_image = 0;
            self.held_images = 0;
            Ok(RecreateOutcome::Recreated {
                generation: self.generation,
            })
        }

        fn surface_extent(&self) -> (u32, u32) {
            self.extent
        }

        fn take_resize_request(&mut self) -> bool {
            std::mem::take(&mut self.resize_request)
        }

        fn recover_slot(&mut self, slot: usize) -> VulkanResult<()> {
            self.ops.push(Op::Recover(slot));
            // Empty submission: waits on the semaphore, signals the fence
            self.image_available[slot] = false;
            self.fences[slot] = FenceState::Signaled { by_submit: None };
            self.fence_observed[slot] = false;
            Ok(())
        }
    }

    #[test]
    fn test_five_frames_two_slots() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);

        for _ in 0..5 {
            let outcome = sync.draw_frame(&mut backend).unwrap();
            assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        }

        assert_eq!(sync.frame_index(), 1);
        assert_eq!(backend.count(|op| matches!(op, Op::Wait(_))), 5);
        assert_eq!(backend.count(|op| matches!(op, Op::Acquire(_))), 5);
        assert_eq!(backend.count(|op| matches!(op, Op::Submit(_))), 5);
        assert_eq!(backend.count(|op| matches!(op, Op::Present(..))), 5);
        assert_eq!(backend.count(|op| *op == Op::Recreate), 0);
        // Every wait is satisfied: the first two by fences created signaled,
        // wait k after that by the submission of frame k - 2
        assert_eq!(
            backend.waits,
            vec![(0, None), (1, None), (0, Some(0)), (1, Some(1)), (0, Some(2))]
        );
        assert_eq!(
            sync.stats(),
            FrameStats {
                frames_presented: 5,
                recreations: 0,
                skipped: 0
            }
        );
    }

    #[test]
    fn test_slots_cycle_in_order() {
        let mut sync = FrameSynchronizer::new(3);
        let mut backend = MockBackend::new(3);

        for _ in 0..7 {
            sync.draw_frame(&mut backend).unwrap();
        }

        let waited: Vec<usize> = backend
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Wait(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(waited, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_each_frame_follows_protocol_order() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);

        sync.draw_frame(&mut backend).unwrap();

        assert_eq!(
            backend.ops,
            vec![
                Op::Wait(0),
                Op::Acquire(0),
                Op::Record(0, 0),
                Op::Reset(0),
                Op::Submit(0),
                Op::Present(0, 0),
            ]
        );
    }

    #[test]
    fn test_mid_frame_resize_recreates_once_before_next_acquire() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.resize_during_record = true;

        let first = sync.draw_frame(&mut backend).unwrap();
        assert_eq!(first, FrameOutcome::Presented { image_index: 0 });
        sync.draw_frame(&mut backend).unwrap();

        let present = backend.position(Op::Present(0, 0)).unwrap();
        let recreate = backend.position(Op::Recreate).unwrap();
        let second_acquire = backend.position(Op::Acquire(1)).unwrap();
        assert!(present < recreate && recreate < second_acquire);
        assert_eq!(backend.count(|op| *op == Op::Recreate), 1);
        assert_eq!(sync.stats().recreations, 1);
    }

    #[test]
    fn test_explicit_request_recreates_before_acquire() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);

        sync.request_recreate();
        assert!(sync.recreate_pending());
        sync.draw_frame(&mut backend).unwrap();

        assert!(!sync.recreate_pending());
        assert_eq!(backend.ops[0], Op::Recreate);
        assert_eq!(backend.ops[1], Op::Wait(0));
        assert_eq!(sync.stats().recreations, 1);
    }

    #[test]
    fn test_out_of_date_acquire_skips_without_advancing() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.acquire_results.push(AcquireOutcome::OutOfDate);

        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::OutOfDate));
        assert_eq!(sync.frame_index(), 0);
        assert_eq!(backend.count(|op| matches!(op, Op::Submit(_))), 0);
        assert_eq!(backend.count(|op| matches!(op, Op::Reset(_))), 0);
        assert_eq!(backend.count(|op| *op == Op::Recreate), 1);

        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        assert_eq!(sync.frame_index(), 1);
    }

    #[test]
    fn test_each_stale_present_recreates_once() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.present_results = vec![PresentOutcome::OutOfDate, PresentOutcome::Suboptimal];

        sync.draw_frame(&mut backend).unwrap();
        assert_eq!(backend.count(|op| *op == Op::Recreate), 1);
        assert!(!sync.recreate_pending());

        sync.draw_frame(&mut backend).unwrap();
        assert_eq!(backend.count(|op| *op == Op::Recreate), 2);
        assert_eq!(sync.stats().recreations, 2);
    }

    #[test]
    fn test_zero_area_defers_recreation() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.extent = (0, 0);
        backend.resize_request = true;

        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::ZeroArea));
        assert!(sync.recreate_pending());
        assert!(backend.ops.is_empty());

        backend.extent = (640, 480);
        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        assert_eq!(backend.ops[0], Op::Recreate);
        assert_eq!(sync.stats().skipped, 1);
    }

    #[test]
    fn test_suspended_skips_and_resume_recreates() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);

        sync.set_suspended(true);
        assert_eq!(
            sync.draw_frame(&mut backend).unwrap(),
            FrameOutcome::Skipped(SkipReason::Suspended)
        );
        assert!(backend.ops.is_empty());

        sync.set_suspended(false);
        sync.draw_frame(&mut backend).unwrap();
        assert_eq!(backend.ops[0], Op::Recreate);
    }

    #[test]
    fn test_suboptimal_acquire_presents_then_recreates() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.acquire_results.push(AcquireOutcome::Acquired {
            image_index: 2,
            suboptimal: true,
        });

        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented { image_index: 2 });
        assert_eq!(backend.ops.last(), Some(&Op::Recreate));
    }

    #[test]
    fn test_record_error_releases_slot_for_next_frame() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.record_error = Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);

        let error = sync.draw_frame(&mut backend).unwrap_err();
        assert!(matches!(error, VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)));
        assert_eq!(backend.ops.last(), Some(&Op::Recover(0)));
        assert!(!backend.image_available[0]);
        assert_eq!(backend.fences[0], FenceState::Signaled { by_submit: None });
        assert_eq!(sync.frame_index(), 0);
        assert_eq!(sync.stats().frames_presented, 0);
        assert!(sync.recreate_pending());

        // The same slot is reused and the held image is returned by the rebuild
        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        assert_eq!(backend.count(|op| *op == Op::Recreate), 1);
        assert_eq!(backend.held_images, 0);
    }

    #[test]
    fn test_submit_error_leaves_fence_signaled() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.submit_error = Some(vk::Result::ERROR_DEVICE_LOST);

        let error = sync.draw_frame(&mut backend).unwrap_err();
        assert!(matches!(error, VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)));
        let reset = backend.position(Op::Reset(0)).unwrap();
        let recover = backend.position(Op::Recover(0)).unwrap();
        assert!(reset < recover);
        assert_eq!(backend.fences[0], FenceState::Signaled { by_submit: None });
        assert!(!backend.image_available[0]);

        // Would hang on the fence or reacquire into a signaled semaphore otherwise
        sync.draw_frame(&mut backend).unwrap();
        sync.draw_frame(&mut backend).unwrap();
        assert_eq!(sync.stats().frames_presented, 2);
    }

    #[test]
    fn test_repeated_record_errors_do_not_exhaust_images() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);

        for _ in 0..backend.image_count + 1 {
            backend.record_error = Some(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
            assert!(sync.draw_frame(&mut backend).is_err());
        }
        sync.draw_frame(&mut backend).unwrap();
        assert_eq!(sync.stats().frames_presented, 1);
    }

    #[test]
    fn test_back_to_back_recreations_retire_each_swapchain_once() {
        let mut sync = FrameSynchronizer::new(2);
        let mut backend = MockBackend::new(2);
        backend.acquire_results.push(AcquireOutcome::OutOfDate);

        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::OutOfDate));
        sync.request_recreate();

        let outcome = sync.draw_frame(&mut backend).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        assert_eq!(backend.count(|op| *op == Op::Recreate), 2);
        assert_eq!(backend.retired_generations, vec![1, 2]);
        assert_eq!(backend.generation, 3);
        assert!(!sync.recreate_pending());
        assert_eq!(sync.stats().recreations, 2);
    }
}
