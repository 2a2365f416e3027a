//! Window management using GLFW
//!
//! The renderer only talks to the window through [`RenderWindow`]; the event loop
//! drives a [`WindowEventHandler`] with synchronous resize and render callbacks.

use crate::core::config::WindowConfig;
use ash::vk;
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    /// The OS window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// GLFW reports no Vulkan loader
    #[error("Vulkan is not supported by this GLFW build or system")]
    VulkanUnsupported,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// What the renderer needs from its window
pub trait RenderWindow {
    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Seconds since the window system was initialized
    fn time(&self) -> f64;

    /// Process pending platform events without blocking
    fn do_events(&mut self);

    /// Instance extensions needed to create a surface for this window
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>>;

    /// Create a Vulkan surface for this window
    fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR>;
}

/// Callbacks invoked from [`GlfwWindow::run`], on the calling thread
pub trait WindowEventHandler {
    /// Error that stops the loop
    type Error;

    /// The framebuffer was resized
    fn on_resize(&mut self, width: u32, height: u32);

    /// Called once per loop iteration after events are processed
    fn on_render(&mut self, window: &mut dyn RenderWindow, delta_seconds: f64) -> Result<(), Self::Error>;
}

/// Pump events until the framebuffer has a non-zero size (e.g. while minimized)
pub fn wait_while_minimized(window: &mut dyn RenderWindow) -> (u32, u32) {
    let mut size = window.framebuffer_size();
    if size.0 == 0 || size.1 == 0 {
        log::debug!("Framebuffer is empty, waiting for the window to be restored");
    }
    while size.0 == 0 || size.1 == 0 {
        window.do_events();
        size = window.framebuffer_size();
    }
    size
}

/// GLFW window wrapper with proper resource management
pub struct GlfwWindow {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    glfw: glfw::Glfw,
}

impl GlfwWindow {
    /// Create a resizable window without a client API, ready for Vulkan
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| WindowError::InitializationFailed(format!("{e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created window '{}' ({}x{})", config.title, config.width, config.height);

        Ok(Self { window, events, glfw })
    }

    /// Run the event loop until the window closes or the handler fails
    pub fn run<H: WindowEventHandler>(&mut self, handler: &mut H) -> Result<(), H::Error> {
        let mut last_time = self.glfw.get_time();

        while !self.window.should_close() {
            self.glfw.poll_events();
            self.dispatch_events(handler);

            let now = self.glfw.get_time();
            handler.on_render(self, now - last_time)?;
            last_time = now;
        }

        log::info!("Window closed");
        Ok(())
    }

    fn dispatch_events<H: WindowEventHandler>(&mut self, handler: &mut H) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {width}x{height}");
                    handler.on_resize(width.max(0) as u32, height.max(0) as u32);
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                _ => {}
            }
        }
    }
}

impl RenderWindow for GlfwWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    fn do_events(&mut self) {
        self.glfw.poll_events();
    }

    fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {result:?}")))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Scripted window: reports each queued size once per `do_events`
    pub(crate) struct FakeWindow {
        pub sizes: Vec<(u32, u32)>,
        pub pumps: usize,
    }

    impl RenderWindow for FakeWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.sizes[self.pumps.min(self.sizes.len() - 1)]
        }

        fn time(&self) -> f64 {
            self.pumps as f64 * 0.5
        }

        fn do_events(&mut self) {
            self.pumps += 1;
        }

        fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
            Ok(vec!["VK_KHR_surface".to_string()])
        }

        fn create_surface(&mut self, _instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
            Err(WindowError::VulkanUnsupported)
        }
    }

    #[test]
    fn minimized_window_pumps_until_restored() {
        let mut window = FakeWindow {
            sizes: vec![(0, 0), (800, 0), (0, 600), (640, 480)],
            pumps: 0,
        };
        assert_eq!(wait_while_minimized(&mut window), (640, 480));
        assert_eq!(window.pumps, 3);
    }

    #[test]
    fn visible_window_returns_immediately() {
        let mut window = FakeWindow {
            sizes: vec![(800, 600)],
            pumps: 0,
        };
        assert_eq!(wait_while_minimized(&mut window), (800, 600));
        assert_eq!(window.pumps, 0);
    }
}
