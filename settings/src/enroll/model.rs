//! Shared enrollment state with change notification.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::status::{EnrollStage, EnrollStatus};

/// Change notifications emitted by [`EnrollmentModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    StatusChanged(EnrollStatus),
    StageChanged(EnrollStage),
    Touch { id: String, pressed: bool },
    ThumbsChanged { user: String },
    ValidChanged(bool),
}

struct State {
    status: EnrollStatus,
    stage: EnrollStage,
    valid: bool,
    thumbs: HashMap<String, Vec<String>>,
}

/// Last-known enrollment status, diagnostic stage, device validity and the
/// per-user enrolled-thumb lists.
///
/// Setters suppress notifications for values identical to the cached state.
/// Touch events are the exception: every press/lift is forwarded because
/// duplicates carry no idempotent guarantee.
pub struct EnrollmentModel {
    state: Mutex<State>,
    tx: broadcast::Sender<ModelEvent>,
}

impl EnrollmentModel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(State {
                status: EnrollStatus::Ready,
                stage: EnrollStage::Default,
                valid: false,
                thumbs: HashMap::new(),
            }),
            tx,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.tx.subscribe()
    }

    fn notify(&self, event: ModelEvent) {
        // No receivers is fine; state stays current either way.
        let _ = self.tx.send(event);
    }

    pub fn status(&self) -> EnrollStatus {
        self.state.lock().unwrap().status
    }

    pub fn set_status(&self, status: EnrollStatus) {
        let mut state = self.state.lock().unwrap();
        if state.status == status {
            return;
        }
        state.status = status;
        drop(state);

        self.notify(ModelEvent::StatusChanged(status));
    }

    pub fn stage(&self) -> EnrollStage {
        self.state.lock().unwrap().stage
    }

    pub fn set_stage(&self, stage: EnrollStage) {
        let mut state = self.state.lock().unwrap();
        if state.stage == stage {
            return;
        }
        state.stage = stage;
        drop(state);

        self.notify(ModelEvent::StageChanged(stage));
    }

    /// Forward one touch pressure event. Never de-duplicated.
    pub fn touch(&self, id: &str, pressed: bool) {
        self.notify(ModelEvent::Touch {
            id: id.to_string(),
            pressed,
        });
    }

    /// Whether a usable device was present at the last probe.
    pub fn is_valid(&self) -> bool {
        self.state.lock().unwrap().valid
    }

    pub fn set_valid(&self, valid: bool) {
        let mut state = self.state.lock().unwrap();
        if state.valid == valid {
            return;
        }
        state.valid = valid;
        drop(state);

        self.notify(ModelEvent::ValidChanged(valid));
    }

    /// Mirrored enrolled-thumb list for `user` (empty when never refreshed).
    pub fn thumbs(&self, user: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .thumbs
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the mirrored list for `user` with the remote answer.
    pub fn set_thumbs(&self, user: &str, thumbs: Vec<String>) {
        self.state
            .lock()
            .unwrap()
            .thumbs
            .insert(user.to_string(), thumbs);

        self.notify(ModelEvent::ThumbsChanged {
            user: user.to_string(),
        });
    }
}

impl Default for EnrollmentModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn identical_status_is_not_renotified() {
        let model = EnrollmentModel::new();
        let mut events = model.subscribe();

        model.set_status(EnrollStatus::Next);
        model.set_status(EnrollStatus::Next);

        assert_eq!(
            events.try_recv().unwrap(),
            ModelEvent::StatusChanged(EnrollStatus::Next)
        );
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn identical_stage_is_not_renotified() {
        let model = EnrollmentModel::new();
        let mut events = model.subscribe();

        let stage = EnrollStage::StagePassed { progress: 40 };
        model.set_stage(stage);
        model.set_stage(stage);

        assert_eq!(events.try_recv().unwrap(), ModelEvent::StageChanged(stage));
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn every_touch_event_is_forwarded() {
        let model = EnrollmentModel::new();
        let mut events = model.subscribe();

        model.touch("dev0", true);
        model.touch("dev0", true);

        let expected = ModelEvent::Touch {
            id: "dev0".to_string(),
            pressed: true,
        };
        assert_eq!(events.try_recv().unwrap(), expected);
        assert_eq!(events.try_recv().unwrap(), expected);
    }

    #[test]
    fn thumbs_are_tracked_per_user() {
        let model = EnrollmentModel::new();

        model.set_thumbs("1000", vec!["left-thumb".to_string()]);
        model.set_thumbs("1001", vec!["right-thumb".to_string()]);

        assert_eq!(model.thumbs("1000"), vec!["left-thumb".to_string()]);
        assert_eq!(model.thumbs("1001"), vec!["right-thumb".to_string()]);
        assert!(model.thumbs("1002").is_empty());
    }
}
