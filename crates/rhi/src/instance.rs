//! Vulkan instance management.
//!
//! The instance owns the loader entry, the surface extension loader and,
//! in debug mode, the validation layer with a debug messenger that routes
//! driver messages into `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use engine_rhi::instance::Instance;
//!
//! // Window-system extensions normally come from the platform layer.
//! let instance = Instance::new("Engine", &[], cfg!(debug_assertions))
//!     .expect("Failed to create Vulkan instance");
//! let vk_instance = instance.handle();
//! ```

use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Instance {
    /// Creates the instance.
    ///
    /// `window_extensions` are the surface extensions the window system
    /// needs. When `debug` is set and the validation layer is installed,
    /// the layer and a debug messenger are enabled too.
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded or instance
    /// creation fails.
    pub fn new(app_name: &str, window_extensions: &[*const c_char], debug: bool) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation = debug && {
            let layers = unsafe { entry.enumerate_instance_layer_properties()? };
            let available = has_layer(&layers, VALIDATION_LAYER_NAME);
            if !available {
                warn!("Validation layer requested but not available, proceeding without it");
            }
            available
        };

        let app_name = CString::new(app_name)
            .map_err(|e| RhiError::InvalidHandle(format!("Invalid application name: {}", e)))?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = window_extensions.to_vec();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        if debug {
            log_instance_extensions(&entry);
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .inspect_err(|e| error!("vkCreateInstance failed: {}", e))?
        };

        info!(
            "Vulkan instance created with {} extension(s)",
            extensions.len()
        );

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let (debug_utils, debug_messenger) = if validation {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = match create_debug_messenger(&debug_utils) {
                Ok(messenger) => messenger,
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            };
            info!("Validation layers enabled");
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            surface_loader,
            debug_utils,
            debug_messenger,
        })
    }

    /// Returns the Vulkan instance dispatch table.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the loader entry.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns the `VK_KHR_surface` loader.
    #[inline]
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Returns true if `name` is among `layers`.
pub fn has_layer(layers: &[vk::LayerProperties], name: &CStr) -> bool {
    layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|layer_name| layer_name == name))
}

fn log_instance_extensions(entry: &Entry) {
    match unsafe { entry.enumerate_instance_extension_properties(None) } {
        Ok(available) => {
            debug!("Instance can support {} extension(s):", available.len());
            for extension in &available {
                if let Ok(name) = extension.extension_name_as_c_str() {
                    debug!("\t{}", name.to_string_lossy());
                }
            }
        }
        Err(e) => warn!("Could not enumerate instance extensions: {}", e),
    }
}

fn create_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> RhiResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
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
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe {
        debug_utils
            .create_debug_utils_messenger(&create_info, None)
            .inspect_err(|e| error!("Failed to create debug messenger: {}", e))?
    };

    Ok(messenger)
}

/// Forwards validation layer messages to `tracing`.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[Vulkan {}] {}", type_str, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[Vulkan {}] {}", type_str, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("[Vulkan {}] {}", type_str, message),
        _ => debug!("[Vulkan {}] {}", type_str, message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &CStr) -> vk::LayerProperties {
        let mut properties = vk::LayerProperties::default();
        for (dst, src) in properties.layer_name.iter_mut().zip(name.to_bytes()) {
            *dst = *src as c_char;
        }
        properties
    }

    #[test]
    fn test_has_layer() {
        let layers = [layer(c"VK_LAYER_other"), layer(VALIDATION_LAYER_NAME)];
        assert!(has_layer(&layers, VALIDATION_LAYER_NAME));
        assert!(!has_layer(&layers[..1], VALIDATION_LAYER_NAME));
        assert!(!has_layer(&[], VALIDATION_LAYER_NAME));
    }

    #[test]
    fn test_instance_creation_without_validation() {
        // Needs a Vulkan loader on the machine.
        match Instance::new("Engine test", &[], false) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(RhiError::VulkanError(e)) => {
                eprintln!("Skipping test: no usable Vulkan driver ({})", e);
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }
}
