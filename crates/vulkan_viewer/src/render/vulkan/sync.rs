//! Synchronization primitives for frames in flight
//!
//! Each frame slot owns an image-available semaphore, a render-finished semaphore
//! and a fence. [`ImagesInFlight`] remembers which slot's fence last used each
//! swapchain image so an image is never rendered to while still in flight.

use super::context::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Slot index following `current`
pub fn next_frame(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore =
            unsafe { device.create_semaphore(&create_info, None) }.map_err(VulkanError::creation("semaphore"))?;
        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None) }.map_err(VulkanError::creation("fence"))?;

        Ok(Self { device, fence })
    }

    /// Block until the fence is signaled
    pub fn wait(&self) -> VulkanResult<()> {
        wait_for_fence(&self.device, self.fence)
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.map_err(VulkanError::Api)
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Wait forever on a raw fence handle
pub fn wait_for_fence(device: &Device, fence: vk::Fence) -> VulkanResult<()> {
    unsafe { device.wait_for_fences(&[fence], true, u64::MAX) }.map_err(VulkanError::Api)
}

/// Synchronization objects of one frame slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready
    pub image_available: Semaphore,
    /// Signaled when the submitted commands finish
    pub render_finished: Semaphore,
    /// Guards reuse of this slot; created signaled
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }

    /// One set of objects per frame in flight
    pub fn for_frames_in_flight(device: &Device) -> VulkanResult<Vec<Self>> {
        (0..MAX_FRAMES_IN_FLIGHT).map(|_| Self::new(device)).collect()
    }
}

/// Swapchain image index to the fence of the frame last rendering to it
#[derive(Debug, Clone)]
pub struct ImagesInFlight<F> {
    fences: Vec<Option<F>>,
}

impl<F: Copy + PartialEq> ImagesInFlight<F> {
    /// No image is in flight yet
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![None; image_count],
        }
    }

    /// Associate `image` with `fence`
    ///
    /// Returns the fence of a different frame that still owns the image; the
    /// caller must wait on it before submitting. Indices outside the chain are
    /// rejected.
    pub fn claim(&mut self, image: usize, fence: F) -> VulkanResult<Option<F>> {
        let slot = self.fences.get_mut(image).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("swapchain image {image} is out of range"),
        })?;
        let previous = slot.replace(fence);
        Ok(previous.filter(|owner| *owner != fence))
    }

    /// Fence currently associated with `image`
    pub fn owner(&self, image: usize) -> Option<F> {
        self.fences.get(image).copied().flatten()
    }

    /// Number of tracked swapchain images
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Whether the tracked swapchain is empty
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_wraps_at_limit() {
        assert_eq!(next_frame(0), 1);
        assert_eq!(next_frame(1), 0);
        assert_eq!(next_frame(MAX_FRAMES_IN_FLIGHT - 1), 0);
    }

    #[test]
    fn slots_wait_on_each_other_once_per_cycle() {
        // Three swapchain images acquired round-robin by two frame slots
        let mut tracker = ImagesInFlight::new(3);
        let mut frame = 0;
        let mut waits = Vec::new();

        for tick in 0..9 {
            let image = tick % 3;
            waits.push(tracker.claim(image, frame).unwrap());
            frame = next_frame(frame);
        }

        assert_eq!(&waits[..3], &[None, None, None]);
        // From then on every claim blocks on the other slot's fence
        for (tick, wait) in waits.iter().enumerate().skip(3) {
            let own = tick % MAX_FRAMES_IN_FLIGHT;
            assert_eq!(*wait, Some(1 - own), "tick {tick}");
        }

        let slot0_waits = waits.iter().skip(3).filter(|w| **w == Some(1)).count();
        let slot1_waits = waits.iter().skip(3).filter(|w| **w == Some(0)).count();
        assert_eq!(slot0_waits, 3);
        assert_eq!(slot1_waits, 3);
    }

    #[test]
    fn reclaiming_with_own_fence_does_not_wait() {
        let mut tracker = ImagesInFlight::new(2);
        assert_eq!(tracker.claim(0, 0).unwrap(), None);
        assert_eq!(tracker.claim(1, 1).unwrap(), None);
        assert_eq!(tracker.claim(0, 0).unwrap(), None);
        assert_eq!(tracker.owner(0), Some(0));
        assert_eq!(tracker.owner(1), Some(1));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn out_of_range_image_is_rejected() {
        let mut tracker: ImagesInFlight<u32> = ImagesInFlight::new(2);
        assert!(tracker.claim(2, 0).is_err());
        assert_eq!(tracker.owner(5), None);
    }
}
