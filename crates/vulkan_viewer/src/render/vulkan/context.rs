//! Vulkan context management
//!
//! Instance, optional validation hook, physical-device selection by capability
//! query, and the logical device with its graphics and present queues.

use super::window::RenderWindow;
use crate::core::config::RendererConfig;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No GPU, layer, extension or feature that the renderer depends on
    #[error("Missing capability: {0}")]
    MissingCapability(String),

    /// A create or allocate call returned a non-success code
    #[error("Failed to create {resource}: {result:?}")]
    ResourceCreationFailure {
        /// What was being created
        resource: &'static str,
        /// The code Vulkan returned
        result: vk::Result,
    },

    /// Layout transition or blit the renderer does not implement
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Unknown model or texture id, or a missing asset file
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The swapchain no longer matches the surface and must be rebuilt
    #[error("Swapchain is out of date")]
    SwapchainStale,

    /// Caller passed input the renderer cannot act on, such as an empty model
    /// set, an out-of-range image index or malformed SPIR-V
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

impl VulkanError {
    /// Error-mapping helper for create/allocate calls
    pub fn creation(resource: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::ResourceCreationFailure { resource, result }
    }

    /// Whether the next frame can recover from this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SwapchainStale)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, with the validation layer when requested
    pub fn new(window: &dyn RenderWindow, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::MissingCapability(format!("Vulkan loader: {e}")))?;

        if enable_validation && !Self::validation_layer_available(&entry)? {
            return Err(VulkanError::MissingCapability(
                "validation layers requested, but not available".to_string(),
            ));
        }

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InvalidOperation {
                reason: "application name contains NUL".to_string(),
            })?;
        let engine_name_cstr = CString::new("No Engine").unwrap_or_default();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::MissingCapability(format!("Window surface extensions: {e}")))?;
        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::MissingCapability(format!("Unusable instance extension name: {e}")))?;

        let mut extensions: Vec<*const i8> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names: Vec<*const i8> = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        // Chained so instance creation and destruction are covered by the messenger too
        let mut debug_info = debug_messenger_create_info();
        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);
        if enable_validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(VulkanError::creation("instance"))?;

        let debug = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match unsafe { debug_utils.create_debug_utils_messenger(&debug_messenger_create_info(), None) } {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(result) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(VulkanError::creation("debug messenger")(result));
                }
            }
        } else {
            None
        };

        log::info!(
            "Created Vulkan instance (validation {})",
            if enable_validation { "on" } else { "off" }
        );

        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry.enumerate_instance_layer_properties().map_err(VulkanError::Api)?;
        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER
        }))
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

/// Forwards validation-layer messages into `log` at the matching level
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Graphics and present queue family indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family supporting graphics commands
    pub graphics: u32,
    /// Family able to present to the surface
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Pick the first graphics family and the first family that can present
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> VulkanResult<bool>,
    ) -> VulkanResult<Option<Self>> {
        let mut graphics = None;
        let mut present = None;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }
            if present.is_none() && supports_present(index)? {
                present = Some(index);
            }
            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        Ok(graphics.zip(present).map(|(graphics, present)| Self { graphics, present }))
    }

    /// Whether graphics and present use different families
    pub fn is_split(&self) -> bool {
        self.graphics != self.present
    }
}

/// Highest sample count usable for both color and depth attachments
pub fn max_usable_sample_count(limits: &vk::PhysicalDeviceLimits) -> vk::SampleCountFlags {
    let counts = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|&candidate| counts.contains(candidate))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Graphics and present queue families
    pub queue_families: QueueFamilyIndices,
    /// Highest MSAA sample count for color + depth
    pub msaa_samples: vk::SampleCountFlags,
}

impl PhysicalDeviceInfo {
    /// Select the first device that can render and present to `surface`
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;
        if devices.is_empty() {
            return Err(VulkanError::MissingCapability("failed to find GPUs with Vulkan support".to_string()));
        }

        for device in devices {
            if let Some(info) = Self::evaluate_device(instance, device, surface, surface_loader)? {
                let name = unsafe { CStr::from_ptr(info.properties.device_name.as_ptr()) };
                log::info!(
                    "Selected GPU: {} (MSAA x{})",
                    name.to_string_lossy(),
                    info.msaa_samples.as_raw()
                );
                return Ok(info);
            }
        }

        Err(VulkanError::MissingCapability("failed to find a suitable GPU".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let Some(queue_families) = QueueFamilyIndices::find(&families, |index| unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .map_err(VulkanError::Api)
        })?
        else {
            return Ok(None);
        };

        let extensions =
            unsafe { instance.enumerate_device_extension_properties(device) }.map_err(VulkanError::Api)?;
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        // Only query surface support once the swapchain extension is known to exist
        let formats = unsafe { surface_loader.get_physical_device_surface_formats(device, surface) }
            .map_err(VulkanError::Api)?;
        let present_modes = unsafe { surface_loader.get_physical_device_surface_present_modes(device, surface) }
            .map_err(VulkanError::Api)?;
        if formats.is_empty() || present_modes.is_empty() {
            return Ok(None);
        }

        if features.sampler_anisotropy != vk::TRUE {
            return Ok(None);
        }

        Ok(Some(Self {
            device,
            properties,
            memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
            queue_families,
            msaa_samples: max_usable_sample_count(&properties.limits),
        }))
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a new logical device with required queues
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device_info.queue_families;
        let mut unique_families = vec![families.graphics];
        if families.is_split() {
            unique_families.push(families.present);
        }

        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device_info.device, &create_info, None) }
            .map_err(VulkanError::creation("logical device"))?;

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Owns instance, surface and device; everything else borrows from it
pub struct VulkanContext {
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Logical device for operations
    pub device: LogicalDevice,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Vulkan surface for rendering
    pub surface: vk::SurfaceKHR,
    /// Vulkan instance and debug utilities
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a new Vulkan context for the window
    pub fn new(window: &mut dyn RenderWindow, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, &config.application_name, config.validation_enabled())?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_surface(instance.instance.handle())
            .map_err(|e| VulkanError::MissingCapability(format!("Surface creation: {e}")))?;

        let physical_device = match PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader) {
            Ok(info) => info,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let device = match LogicalDevice::new(&instance.instance, &physical_device) {
            Ok(device) => device,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        Ok(Self {
            physical_device,
            device,
            surface_loader,
            surface,
            instance,
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Get the raw physical device handle
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device.device
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Format properties of `format` on the selected device
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance()
                .get_physical_device_format_properties(self.physical_device(), format)
        }
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device().device_wait_idle() }.map_err(VulkanError::Api)
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in declaration order: device before instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn limits(color: vk::SampleCountFlags, depth: vk::SampleCountFlags) -> vk::PhysicalDeviceLimits {
        vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: color,
            framebuffer_depth_sample_counts: depth,
            ..Default::default()
        }
    }

    #[test]
    fn msaa_uses_highest_count_shared_by_color_and_depth() {
        let all = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8;
        let depth = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_4;
        assert_eq!(max_usable_sample_count(&limits(all, depth)), vk::SampleCountFlags::TYPE_4);
    }

    #[test]
    fn msaa_defaults_to_single_sample() {
        let only_one = vk::SampleCountFlags::TYPE_1;
        assert_eq!(max_usable_sample_count(&limits(only_one, only_one)), vk::SampleCountFlags::TYPE_1);
        assert_eq!(
            max_usable_sample_count(&limits(vk::SampleCountFlags::TYPE_64, vk::SampleCountFlags::TYPE_8)),
            vk::SampleCountFlags::TYPE_1
        );
    }

    #[test]
    fn queue_families_may_differ() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let found = QueueFamilyIndices::find(&families, |index| Ok(index == 2)).unwrap().unwrap();
        assert_eq!(found, QueueFamilyIndices { graphics: 1, present: 2 });
        assert!(found.is_split());
    }

    #[test]
    fn queue_families_prefer_first_match() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::GRAPHICS)];
        let found = QueueFamilyIndices::find(&families, |_| Ok(true)).unwrap().unwrap();
        assert_eq!(found, QueueFamilyIndices { graphics: 0, present: 0 });
        assert!(!found.is_split());
    }

    #[test]
    fn missing_present_support_finds_nothing() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(QueueFamilyIndices::find(&families, |_| Ok(false)).unwrap().is_none());
    }

    #[test]
    fn only_stale_swapchain_is_recoverable() {
        assert!(VulkanError::SwapchainStale.is_recoverable());
        assert!(!VulkanError::MissingCapability("gpu".into()).is_recoverable());
        assert!(!VulkanError::creation("buffer")(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).is_recoverable());
        assert!(!VulkanError::InvalidOperation { reason: "empty".into() }.is_recoverable());
    }
}
