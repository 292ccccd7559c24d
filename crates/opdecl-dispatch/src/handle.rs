//! Scoped revocation tokens.

use std::fmt;

type Revoker = Box<dyn FnOnce() + Send>;

/// Proof of one registration; dropping it revokes that registration.
///
/// Handles are move-only. Revocation runs at most once: either through
/// [`RegistrationHandle::revoke`] or when the handle is dropped. An empty
/// handle revokes nothing.
#[must_use = "dropping a registration handle immediately revokes the registration"]
pub struct RegistrationHandle {
    revoker: Option<Revoker>,
}

impl RegistrationHandle {
    pub fn new(revoker: impl FnOnce() + Send + 'static) -> Self {
        Self {
            revoker: Some(Box::new(revoker)),
        }
    }

    pub fn empty() -> Self {
        Self { revoker: None }
    }

    pub fn is_empty(&self) -> bool {
        self.revoker.is_none()
    }

    /// Revoke now instead of at end of scope.
    pub fn revoke(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(revoker) = self.revoker.take() {
            revoker();
        }
    }
}

impl Default for RegistrationHandle {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("armed", &self.revoker.is_some())
            .finish()
    }
}
