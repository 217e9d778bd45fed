//! In-memory scheduler API for development and testing.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::{
    AcceptedApplication, RegisterResourceManagerRequest, RegisterResourceManagerResponse,
    ResourceManagerCallback, SchedulerApi, ShimError, UpdateRequest, UpdateResponse,
};

#[derive(Default)]
struct State {
    updates: Vec<UpdateRequest>,
    registrations: Vec<RegisterResourceManagerRequest>,
    reloads: Vec<String>,
    callback: Option<Arc<dyn ResourceManagerCallback>>,
    fail_with: Option<String>,
}

/// Scheduler API that records every request.
///
/// With auto-accept enabled, every application in an update is accepted
/// through the registered callback before `update` returns.
#[derive(Default)]
pub struct InMemorySchedulerApi {
    state: Mutex<State>,
    auto_accept: bool,
}

impl InMemorySchedulerApi {
    /// Recorder that never answers on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: accept every submitted application.
    #[must_use]
    pub const fn with_auto_accept(mut self) -> Self {
        self.auto_accept = true;
        self
    }

    /// Make every subsequent call fail with `reason`, or succeed with `None`.
    pub fn set_failure(&self, reason: Option<String>) {
        self.state.lock().fail_with = reason;
    }

    /// Recorded update requests.
    #[must_use]
    pub fn updates(&self) -> Vec<UpdateRequest> {
        self.state.lock().updates.clone()
    }

    /// Recorded registrations.
    #[must_use]
    pub fn registrations(&self) -> Vec<RegisterResourceManagerRequest> {
        self.state.lock().registrations.clone()
    }

    /// Resource manager ids passed to `reload_configuration`.
    #[must_use]
    pub fn reloads(&self) -> Vec<String> {
        self.state.lock().reloads.clone()
    }

    /// Deliver `response` to the registered callback.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::SchedulerApi`] when no resource manager is
    /// registered, or the callback's error.
    pub fn respond(&self, response: UpdateResponse) -> Result<(), ShimError> {
        let callback = self
            .state
            .lock()
            .callback
            .clone()
            .ok_or_else(|| ShimError::SchedulerApi("no resource manager registered".into()))?;
        callback.recv_update_response(response)
    }

    fn check_failure(state: &State) -> Result<(), ShimError> {
        state
            .fail_with
            .as_ref()
            .map_or(Ok(()), |reason| Err(ShimError::SchedulerApi(reason.clone())))
    }
}

impl SchedulerApi for InMemorySchedulerApi {
    fn update(&self, request: UpdateRequest) -> Result<(), ShimError> {
        let accepted: Vec<AcceptedApplication> = request
            .new_applications
            .iter()
            .map(|app| AcceptedApplication {
                application_id: app.application_id.clone(),
            })
            .collect();
        let callback = {
            let mut state = self.state.lock();
            Self::check_failure(&state)?;
            debug!(apps = request.new_applications.len(), "update received");
            state.updates.push(request);
            state.callback.clone()
        };
        if self.auto_accept && !accepted.is_empty() {
            if let Some(callback) = callback {
                callback.recv_update_response(UpdateResponse {
                    accepted,
                    rejected: Vec::new(),
                })?;
            }
        }
        Ok(())
    }

    fn register_resource_manager(
        &self,
        request: RegisterResourceManagerRequest,
        callback: Arc<dyn ResourceManagerCallback>,
    ) -> Result<RegisterResourceManagerResponse, ShimError> {
        let mut state = self.state.lock();
        Self::check_failure(&state)?;
        debug!(rm_id = %request.rm_id, "resource manager registered");
        state.registrations.push(request);
        state.callback = Some(callback);
        Ok(RegisterResourceManagerResponse::default())
    }

    fn reload_configuration(&self, rm_id: &str) -> Result<(), ShimError> {
        let mut state = self.state.lock();
        Self::check_failure(&state)?;
        state.reloads.push(rm_id.to_string());
        Ok(())
    }
}
