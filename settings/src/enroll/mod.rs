//! Fingerprint enrollment state machine.

pub mod controller;
pub mod model;
pub mod status;

use std::sync::Arc;

use log::warn;

use crate::fingerd;

pub use controller::{EnrollmentController, StartOutcome};
pub use model::{EnrollmentModel, ModelEvent};
pub use status::{stage_prompt, EnrollStage, EnrollStatus, RetryReason, StagePrompt};

/// Forward the daemon's push signals into the model from background tasks.
///
/// The tasks live until the signal streams end (daemon gone or connection
/// closed); a stopped session just stops producing events.
pub fn spawn_signal_forwarders(client: fingerd::Client, model: Arc<EnrollmentModel>) {
    let stage_client = client.clone();
    let stage_model = Arc::clone(&model);
    tokio::spawn(async move {
        let result = stage_client
            .listen_enroll_status(move |evt| {
                stage_model.set_stage(EnrollStage::from_signal(evt.code, &evt.message));
            })
            .await;
        if let Err(e) = result {
            warn!("enroll status listener ended: {}", e);
        }
    });

    tokio::spawn(async move {
        let result = client
            .listen_touch(move |evt| {
                model.touch(&evt.id, evt.pressed);
            })
            .await;
        if let Err(e) = result {
            warn!("touch listener ended: {}", e);
        }
    });
}
