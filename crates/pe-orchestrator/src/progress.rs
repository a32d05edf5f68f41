//! Live progress a caller can poll while [`crate::Orchestrator::run`] is
//! still in flight (§4.8 step 5).

use tokio::sync::{watch, Mutex};

use pe_core::model::Source;

#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
    pub current_entity: Option<String>,
    pub current_source: Option<Source>,
}

/// Guards progress mutation behind a `Mutex` and republishes the updated
/// snapshot on a `watch` channel so a caller can observe it without polling
/// the orchestrator itself.
pub struct ProgressTracker {
    state: Mutex<Progress>,
    sender: watch::Sender<Progress>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> (Self, watch::Receiver<Progress>) {
        let initial = Progress {
            total,
            ..Progress::default()
        };
        let (sender, receiver) = watch::channel(initial.clone());
        (
            Self {
                state: Mutex::new(initial),
                sender,
            },
            receiver,
        )
    }

    pub async fn record(&self, entity_name: &str, source: Source, success: bool) {
        let mut state = self.state.lock().await;
        state.completed += 1;
        if success {
            state.successful += 1;
        } else {
            state.failed += 1;
        }
        state.current_entity = Some(entity_name.to_string());
        state.current_source = Some(source);
        let _ = self.sender.send(state.clone());
    }
}
