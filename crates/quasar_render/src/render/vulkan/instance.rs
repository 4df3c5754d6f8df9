//! Vulkan instance creation and the validation message bridge

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};

use super::{VulkanError, VulkanResult};
use crate::platform::PlatformCapabilities;

const VALIDATION_LAYER: &[u8] = b"VK_LAYER_KHRONOS_validation\0";
const ENGINE_NAME: &[u8] = b"Quasar\0";

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create an instance with the window-system extensions plus whatever the
    /// platform needs. Validation is enabled only if the layer is installed.
    pub fn new(
        app_name: &str,
        app_version: u32,
        window_extensions: &[String],
        platform: &PlatformCapabilities,
        enable_validation: bool,
    ) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| VulkanError::Loading(e.to_string()))?;

        let app_name = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("application name contains NUL".to_string()))?;
        let engine_name = CStr::from_bytes_with_nul(ENGINE_NAME)
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(app_version)
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let window_extensions: Vec<CString> = window_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<_, _>>()
            .map_err(|_| VulkanError::InitializationFailed("extension name contains NUL".to_string()))?;

        let mut extensions: Vec<*const c_char> = window_extensions.iter().map(|ext| ext.as_ptr()).collect();
        extensions.extend(platform.extra_instance_extensions().iter().map(|ext| ext.as_ptr()));

        let validation = enable_validation && Self::validation_layer_available(&entry);
        if enable_validation && !validation {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer = CStr::from_bytes_with_nul(VALIDATION_LAYER)
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let layers: Vec<*const c_char> = if validation { vec![layer.as_ptr()] } else { Vec::new() };

        // Messages emitted during vkCreateInstance itself
        let mut messenger_info = Self::messenger_create_info();
        let mut create_info = vk::InstanceCreateInfo::builder()
            .flags(platform.instance_create_flags())
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        if validation {
            create_info = create_info.push_next(&mut messenger_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| match e {
            vk::Result::ERROR_EXTENSION_NOT_PRESENT => VulkanError::MissingExtension {
                name: "instance extension required by the window system".to_string(),
            },
            other => VulkanError::Api(other),
        })?;

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = match unsafe {
                debug_utils.create_debug_utils_messenger(&Self::messenger_create_info(), None)
            } {
                Ok(messenger) => messenger,
                Err(e) => {
                    // Not yet owned by Self, so Drop will not run for it
                    unsafe { instance.destroy_instance(None) };
                    return Err(VulkanError::Api(e));
                }
            };
            Some((debug_utils, messenger))
        } else {
            None
        };

        log::info!(
            "Created Vulkan instance (validation {})",
            if debug.is_some() { "on" } else { "off" }
        );

        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        #[allow(unused_unsafe)]
        let Ok(layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
            return false;
        };
        layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_bytes_with_nul() == VALIDATION_LAYER
        })
    }

    fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
    }

    /// Vulkan entry point
    pub const fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Vulkan instance
    pub const fn instance(&self) -> &Instance {
        &self.instance
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

/// Log level used for a validation message of the given severity
pub(crate) fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Trace
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    log::log!(severity_level(message_severity), "[Vulkan] {message_type:?} - {message}");

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;
        assert_eq!(severity_level(Severity::ERROR), log::Level::Error);
        assert_eq!(severity_level(Severity::WARNING), log::Level::Warn);
        assert_eq!(severity_level(Severity::INFO), log::Level::Info);
        assert_eq!(severity_level(Severity::VERBOSE), log::Level::Trace);
    }
}
