//! Fullscreen capability.
//!
//! Browsers expose fullscreen under four naming schemes. [`VendorFullscreen`] fans out
//! over them once, behind [`FullscreenCapability`], so callers only ever see a boolean.
//! A missing API is reported as `false`, never as a panic.

use tracing::{debug, warn};

use crate::error::{ProctorError, ProctorResult};

/// Normalized fullscreen surface.
pub trait FullscreenCapability: Send + Sync {
    /// Ask the host to enter fullscreen. `false` if unsupported or refused.
    fn request(&self) -> bool;
    fn exit(&self) -> bool;
    fn is_fullscreen(&self) -> bool;
    /// Whether any fullscreen API exists on the host at all.
    fn is_supported(&self) -> bool;
}

/// Naming scheme of a fullscreen API family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FullscreenVendor {
    Standard,
    Webkit,
    Moz,
    Ms,
}

impl FullscreenVendor {
    /// Probe order.
    pub const ALL: [FullscreenVendor; 4] = [
        FullscreenVendor::Standard,
        FullscreenVendor::Webkit,
        FullscreenVendor::Moz,
        FullscreenVendor::Ms,
    ];

    /// Document property holding the current fullscreen element.
    pub fn element_property(&self) -> &'static str {
        match self {
            FullscreenVendor::Standard => "fullscreenElement",
            FullscreenVendor::Webkit => "webkitFullscreenElement",
            FullscreenVendor::Moz => "mozFullScreenElement",
            FullscreenVendor::Ms => "msFullscreenElement",
        }
    }

    /// Method on the document element that enters fullscreen.
    pub fn request_method(&self) -> &'static str {
        match self {
            FullscreenVendor::Standard => "requestFullscreen",
            FullscreenVendor::Webkit => "webkitRequestFullscreen",
            FullscreenVendor::Moz => "mozRequestFullScreen",
            FullscreenVendor::Ms => "msRequestFullscreen",
        }
    }

    /// Method on the document that leaves fullscreen.
    pub fn exit_method(&self) -> &'static str {
        match self {
            FullscreenVendor::Standard => "exitFullscreen",
            FullscreenVendor::Webkit => "webkitExitFullscreen",
            FullscreenVendor::Moz => "mozCancelFullScreen",
            FullscreenVendor::Ms => "msExitFullscreen",
        }
    }
}

/// Raw, name-addressed access to the host document. Implemented per host.
pub trait DocumentBindings: Send + Sync {
    fn has_method(&self, name: &str) -> bool;
    /// Call a zero-argument method. `false` if the host rejected the call.
    fn invoke(&self, name: &str) -> bool;
    /// Whether the named property currently holds a non-null element.
    fn element_present(&self, property: &str) -> bool;
}

/// [`FullscreenCapability`] over vendor-prefixed [`DocumentBindings`].
pub struct VendorFullscreen<B: DocumentBindings> {
    bindings: B,
}

impl<B: DocumentBindings> VendorFullscreen<B> {
    pub fn new(bindings: B) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &B {
        &self.bindings
    }

    fn find_method(&self, pick: fn(&FullscreenVendor) -> &'static str) -> Option<&'static str> {
        FullscreenVendor::ALL
            .iter()
            .map(pick)
            .find(|name| self.bindings.has_method(name))
    }

    /// Like [`FullscreenCapability::request`] but reports why it could not run.
    pub fn try_request(&self) -> ProctorResult<bool> {
        let method = self
            .find_method(FullscreenVendor::request_method)
            .ok_or_else(|| ProctorError::CapabilityUnavailable("Fullscreen API".to_string()))?;
        debug!(method, "[FULLSCREEN] Requesting fullscreen");
        Ok(self.bindings.invoke(method))
    }

    pub fn try_exit(&self) -> ProctorResult<bool> {
        let method = self
            .find_method(FullscreenVendor::exit_method)
            .ok_or_else(|| ProctorError::CapabilityUnavailable("Fullscreen exit API".to_string()))?;
        debug!(method, "[FULLSCREEN] Exiting fullscreen");
        Ok(self.bindings.invoke(method))
    }
}

impl<B: DocumentBindings> FullscreenCapability for VendorFullscreen<B> {
    fn request(&self) -> bool {
        match self.try_request() {
            Ok(granted) => granted,
            Err(e) => {
                warn!("[FULLSCREEN] {}", e);
                false
            }
        }
    }

    fn exit(&self) -> bool {
        match self.try_exit() {
            Ok(done) => done,
            Err(e) => {
                warn!("[FULLSCREEN] {}", e);
                false
            }
        }
    }

    fn is_fullscreen(&self) -> bool {
        FullscreenVendor::ALL
            .iter()
            .any(|v| self.bindings.element_present(v.element_property()))
    }

    fn is_supported(&self) -> bool {
        self.find_method(FullscreenVendor::request_method).is_some()
    }
}
