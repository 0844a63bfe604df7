//! Drives one fingerprint enrollment lifecycle against the daemon.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::error::ServiceError;
use crate::fingerd::FingerService;

use super::model::EnrollmentModel;
use super::status::{EnrollStage, EnrollStatus};

/// Outcome of starting an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// No fingerprint reader present. Non-fatal; callers render a
    /// disabled state.
    NoDevice,
}

/// Owns the claim -> enroll -> retry/finish lifecycle for one session.
///
/// The acting user identity is fixed at construction; it is never read from
/// the process environment inside the component.
pub struct EnrollmentController {
    service: Arc<dyn FingerService>,
    model: Arc<EnrollmentModel>,
    user: String,
}

impl EnrollmentController {
    /// Create a controller for `user` and probe device availability into
    /// the model.
    pub async fn new(
        service: Arc<dyn FingerService>,
        model: Arc<EnrollmentModel>,
        user: impl Into<String>,
    ) -> Self {
        let controller = Self {
            service,
            model,
            user: user.into(),
        };

        let valid = match controller.service.default_device().await {
            Ok(device) => !device.is_empty(),
            Err(e) => {
                warn!("failed to query default device: {}", e);
                false
            }
        };
        controller.model.set_valid(valid);

        controller
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn model(&self) -> &Arc<EnrollmentModel> {
        &self.model
    }

    /// Refresh the mirrored enrolled-thumb list for `user`.
    ///
    /// A failed list call is recorded as an empty list; callers cannot tell
    /// the two apart.
    pub async fn refresh_enroll_list(&self, user: &str) {
        let thumbs = match self.service.list_fingers(user).await {
            Ok(thumbs) => thumbs,
            Err(e) => {
                error!("failed to list enrolled thumbs for '{}': {}", user, e);
                Vec::new()
            }
        };
        self.model.set_thumbs(user, thumbs);
    }

    /// Claim the device exclusively and start enrolling `thumb` for `user`,
    /// then refresh the enrolled list.
    pub async fn start_enroll(
        &self,
        user: &str,
        thumb: &str,
    ) -> Result<StartOutcome, ServiceError> {
        let devices = self.service.devices().await?;
        if devices.is_empty() {
            info!("no fingerprint devices present, enrollment unavailable");
            self.model.set_valid(false);
            return Ok(StartOutcome::NoDevice);
        }

        if let Err(e) = self.service.claim(user, true).await {
            error!("failed to claim device for '{}': {}", user, e);
            return Err(ServiceError::ClaimFailed(e.to_string()));
        }

        info!("starting enrollment of '{}' for '{}'", thumb, user);
        self.service.enroll(user, thumb).await?;
        self.refresh_enroll_list(user).await;

        Ok(StartOutcome::Started)
    }

    /// Restart enrollment for `thumb` on a background task.
    ///
    /// StopEnroll and Enroll run sequentially; status transitions to
    /// `Ready` only when both succeeded. A StopEnroll failure means Enroll
    /// is never attempted and the prior status is left untouched.
    ///
    /// The task is not cancelled by [`stop_enroll`](Self::stop_enroll); a
    /// session stopped meanwhile simply has the eventual result ignored.
    pub fn re_enroll(&self, thumb: &str) -> JoinHandle<bool> {
        let service = Arc::clone(&self.service);
        let model = Arc::clone(&self.model);
        let user = self.user.clone();
        let thumb = thumb.to_string();

        tokio::spawn(async move {
            if let Err(e) = service.stop_enroll().await {
                error!("StopEnroll failed, aborting re-enrollment: {}", e);
                return false;
            }

            if let Err(e) = service.enroll(&user, &thumb).await {
                error!("Enroll failed during re-enrollment of '{}': {}", thumb, e);
                return false;
            }

            model.set_status(EnrollStatus::Ready);
            true
        })
    }

    /// Stop enrollment and release the exclusive claim.
    ///
    /// Both steps are always attempted so a failed stop cannot leak the
    /// claim.
    pub async fn stop_enroll(&self) -> Result<(), ServiceError> {
        let stopped = self.service.stop_enroll().await;
        if let Err(e) = &stopped {
            warn!("StopEnroll failed: {}", e);
        }

        let released = self.service.claim(&self.user, false).await;
        if let Err(e) = &released {
            warn!("failed to release device claim for '{}': {}", self.user, e);
        }

        stopped.and(released)
    }

    /// Delete one enrolled thumb, then refresh the mirrored list.
    pub async fn delete_finger(&self, user: &str, thumb: &str) -> Result<(), ServiceError> {
        let result = self.service.delete_finger(user, thumb).await;
        if let Err(e) = &result {
            error!("failed to delete thumb '{}' for '{}': {}", thumb, user, e);
        }

        // The remote list is authoritative, so refresh even after a failed
        // delete.
        self.refresh_enroll_list(user).await;
        result
    }

    /// Delete every enrolled thumb of `user`, then refresh the mirrored
    /// list.
    pub async fn delete_all_fingers(&self, user: &str) -> Result<(), ServiceError> {
        let result = self.service.delete_all_fingers(user).await;
        if let Err(e) = &result {
            error!("failed to delete all thumbs for '{}': {}", user, e);
        }

        self.refresh_enroll_list(user).await;
        result
    }

    /// Entry point for the coarse enrollment status push.
    pub fn handle_enroll_status(&self, value: &str, done: bool) {
        self.model.set_status(EnrollStatus::from_signal(value, done));
    }

    /// Entry point for the staged diagnostic push.
    pub fn handle_enroll_stage(&self, code: i32, message: &str) {
        self.model.set_stage(EnrollStage::from_signal(code, message));
    }

    /// Entry point for the touch pressure push.
    pub fn handle_touch(&self, id: &str, pressed: bool) {
        self.model.touch(id, pressed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockFinger {
        calls: Mutex<Vec<String>>,
        devices: Mutex<Vec<String>>,
        fingers: Mutex<Vec<String>>,
        failing: Mutex<Vec<&'static str>>,
    }

    impl MockFinger {
        fn with_device() -> Self {
            let mock = Self::default();
            mock.devices.lock().unwrap().push("dev0".to_string());
            mock
        }

        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn fails(&self, op: &'static str) -> bool {
            self.failing.lock().unwrap().contains(&op)
        }

        fn set_fail(&self, op: &'static str) {
            self.failing.lock().unwrap().push(op);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn err(op: &str) -> ServiceError {
            ServiceError::CallFailed(format!("{} rejected", op))
        }
    }

    #[async_trait]
    impl FingerService for MockFinger {
        async fn devices(&self) -> Result<Vec<String>, ServiceError> {
            self.log("Devices");
            Ok(self.devices.lock().unwrap().clone())
        }

        async fn default_device(&self) -> Result<String, ServiceError> {
            self.log("DefaultDevice");
            Ok(self
                .devices
                .lock()
                .unwrap()
                .first()
                .cloned()
                .unwrap_or_default())
        }

        async fn claim(&self, user: &str, claimed: bool) -> Result<(), ServiceError> {
            self.log(format!("Claim({},{})", user, claimed));
            if claimed && self.fails("claim") {
                return Err(Self::err("Claim"));
            }
            Ok(())
        }

        async fn enroll(&self, user: &str, thumb: &str) -> Result<(), ServiceError> {
            self.log(format!("Enroll({},{})", user, thumb));
            if self.fails("enroll") {
                return Err(Self::err("Enroll"));
            }
            Ok(())
        }

        async fn stop_enroll(&self) -> Result<(), ServiceError> {
            self.log("StopEnroll");
            if self.fails("stop") {
                return Err(Self::err("StopEnroll"));
            }
            Ok(())
        }

        async fn list_fingers(&self, user: &str) -> Result<Vec<String>, ServiceError> {
            self.log(format!("ListFingers({})", user));
            if self.fails("list") {
                return Err(Self::err("ListFingers"));
            }
            Ok(self.fingers.lock().unwrap().clone())
        }

        async fn delete_finger(&self, user: &str, thumb: &str) -> Result<(), ServiceError> {
            self.log(format!("DeleteFinger({},{})", user, thumb));
            if self.fails("delete") {
                return Err(Self::err("DeleteFinger"));
            }
            self.fingers.lock().unwrap().retain(|f| f != thumb);
            Ok(())
        }

        async fn delete_all_fingers(&self, user: &str) -> Result<(), ServiceError> {
            self.log(format!("DeleteAllFingers({})", user));
            if self.fails("delete-all") {
                return Err(Self::err("DeleteAllFingers"));
            }
            self.fingers.lock().unwrap().clear();
            Ok(())
        }
    }

    async fn controller_for(mock: &Arc<MockFinger>) -> EnrollmentController {
        EnrollmentController::new(
            Arc::clone(mock) as Arc<dyn FingerService>,
            Arc::new(EnrollmentModel::new()),
            "1000",
        )
        .await
    }

    #[tokio::test]
    async fn start_enroll_skips_claim_and_enroll_without_devices() {
        let mock = Arc::new(MockFinger::default());
        let controller = controller_for(&mock).await;

        let outcome = controller
            .start_enroll("1000", "right-thumb")
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::NoDevice);
        assert!(!controller.model().is_valid());
        let calls = mock.calls();
        assert!(!calls.iter().any(|c| c.starts_with("Claim")));
        assert!(!calls.iter().any(|c| c.starts_with("Enroll")));
    }

    #[tokio::test]
    async fn claim_precedes_enroll() {
        let mock = Arc::new(MockFinger::with_device());
        let controller = controller_for(&mock).await;

        let outcome = controller
            .start_enroll("1000", "right-thumb")
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::Started);
        let calls = mock.calls();
        let claim_at = calls
            .iter()
            .position(|c| c == "Claim(1000,true)")
            .expect("claim issued");
        let enroll_at = calls
            .iter()
            .position(|c| c == "Enroll(1000,right-thumb)")
            .expect("enroll issued");
        assert!(claim_at < enroll_at);
    }

    #[tokio::test]
    async fn claim_failure_aborts_before_enroll() {
        let mock = Arc::new(MockFinger::with_device());
        mock.set_fail("claim");
        let controller = controller_for(&mock).await;

        let result = controller.start_enroll("1000", "right-thumb").await;

        assert!(matches!(result, Err(ServiceError::ClaimFailed(_))));
        assert!(!mock.calls().iter().any(|c| c.starts_with("Enroll")));
    }

    #[tokio::test]
    async fn delete_all_then_refresh_reports_empty_list() {
        let mock = Arc::new(MockFinger::with_device());
        mock.fingers
            .lock()
            .unwrap()
            .extend(["left-thumb".to_string(), "right-thumb".to_string()]);
        let controller = controller_for(&mock).await;

        controller.refresh_enroll_list("1000").await;
        assert_eq!(controller.model().thumbs("1000").len(), 2);

        controller.delete_all_fingers("1000").await.unwrap();
        assert!(controller.model().thumbs("1000").is_empty());
    }

    #[tokio::test]
    async fn delete_finger_refreshes_even_on_failure() {
        let mock = Arc::new(MockFinger::with_device());
        mock.fingers.lock().unwrap().push("left-thumb".to_string());
        mock.set_fail("delete");
        let controller = controller_for(&mock).await;

        let result = controller.delete_finger("1000", "left-thumb").await;

        assert!(result.is_err());
        assert!(mock
            .calls()
            .iter()
            .any(|c| c.starts_with("ListFingers")));
        // Delete was rejected, so the refreshed list still holds the thumb.
        assert_eq!(
            controller.model().thumbs("1000"),
            vec!["left-thumb".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_list_refresh_is_recorded_as_empty() {
        let mock = Arc::new(MockFinger::with_device());
        mock.fingers.lock().unwrap().push("left-thumb".to_string());
        let controller = controller_for(&mock).await;

        controller.refresh_enroll_list("1000").await;
        assert_eq!(controller.model().thumbs("1000").len(), 1);

        mock.set_fail("list");
        controller.refresh_enroll_list("1000").await;
        assert!(controller.model().thumbs("1000").is_empty());
    }

    #[tokio::test]
    async fn re_enroll_aborts_when_stop_fails() {
        let mock = Arc::new(MockFinger::with_device());
        mock.set_fail("stop");
        let controller = controller_for(&mock).await;
        controller.model().set_status(EnrollStatus::Next);

        let succeeded = controller.re_enroll("right-thumb").await.unwrap();

        assert!(!succeeded);
        assert!(!mock.calls().iter().any(|c| c.starts_with("Enroll")));
        assert_eq!(controller.model().status(), EnrollStatus::Next);
    }

    #[tokio::test]
    async fn re_enroll_transitions_to_ready_when_both_calls_succeed() {
        let mock = Arc::new(MockFinger::with_device());
        let controller = controller_for(&mock).await;
        controller.model().set_status(EnrollStatus::Next);

        let succeeded = controller.re_enroll("right-thumb").await.unwrap();

        assert!(succeeded);
        let calls = mock.calls();
        let stop_at = calls.iter().position(|c| c == "StopEnroll").unwrap();
        let enroll_at = calls
            .iter()
            .position(|c| c == "Enroll(1000,right-thumb)")
            .unwrap();
        assert!(stop_at < enroll_at);
        assert_eq!(controller.model().status(), EnrollStatus::Ready);
    }

    #[tokio::test]
    async fn re_enroll_leaves_status_alone_when_enroll_fails() {
        let mock = Arc::new(MockFinger::with_device());
        mock.set_fail("enroll");
        let controller = controller_for(&mock).await;
        controller.model().set_status(EnrollStatus::Retry);

        let succeeded = controller.re_enroll("right-thumb").await.unwrap();

        assert!(!succeeded);
        assert_eq!(controller.model().status(), EnrollStatus::Retry);
    }

    #[tokio::test]
    async fn stop_enroll_releases_claim_even_after_failed_stop() {
        let mock = Arc::new(MockFinger::with_device());
        mock.set_fail("stop");
        let controller = controller_for(&mock).await;

        let result = controller.stop_enroll().await;

        assert!(result.is_err());
        assert!(mock.calls().iter().any(|c| c == "Claim(1000,false)"));
    }

    #[tokio::test]
    async fn controller_probe_marks_model_valid_with_device() {
        let mock = Arc::new(MockFinger::with_device());
        let controller = controller_for(&mock).await;
        assert!(controller.model().is_valid());
    }

    #[tokio::test]
    async fn status_handler_applies_coarse_mapping() {
        let mock = Arc::new(MockFinger::with_device());
        let controller = controller_for(&mock).await;

        controller.handle_enroll_status("enroll-completed", true);
        assert_eq!(controller.model().status(), EnrollStatus::Finished);

        controller.handle_enroll_status("anything-else", true);
        assert_eq!(controller.model().status(), EnrollStatus::Next);
    }
}
