use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError, channel};
use std::thread;
use std::time::Duration;

use crate::remote::{RepoConfig, RepositoryApi};

use super::{
    CatalogLayout, CatalogUpdateWorkflow, PendingRegistration, UploadOutcome, UploadRequest,
    UploadStage, WorkflowError, WorkflowFailure,
};

pub type SharedRepository = Arc<dyn RepositoryApi + Send + Sync>;

/// What the worker should run.
#[derive(Debug)]
pub enum UploadWork {
    /// All five stages.
    Submit(UploadRequest),
    /// Only the catalog stages, for an asset already uploaded.
    Register(PendingRegistration),
}

#[derive(Debug)]
pub enum JobEvent {
    Progress(UploadStage),
    Finished(Result<UploadOutcome, WorkflowFailure>),
}

/// Workflow running on a background thread.
///
/// Dropping the job drops the receiver; the worker keeps going but its
/// remaining messages are discarded.
pub struct UploadJob {
    events: Receiver<JobEvent>,
    finished: bool,
}

impl UploadJob {
    pub fn spawn(
        repo: SharedRepository,
        config: RepoConfig,
        layout: CatalogLayout,
        work: UploadWork,
    ) -> Self {
        let (tx, rx) = channel();
        thread::spawn(move || {
            let progress_tx = tx.clone();
            let progress = move |stage: &UploadStage| {
                let _ = progress_tx.send(JobEvent::Progress(stage.clone()));
            };
            let workflow = CatalogUpdateWorkflow::new(repo.as_ref(), &config, &layout);
            let result = match &work {
                UploadWork::Submit(request) => workflow.run(request, progress),
                UploadWork::Register(pending) => workflow.register(pending, progress),
            };
            let _ = tx.send(JobEvent::Finished(result));
        });
        Self {
            events: rx,
            finished: false,
        }
    }

    /// Next event without blocking, if one is queued.
    pub fn try_next(&mut self) -> Option<JobEvent> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.lost()),
        }
    }

    /// Block up to `timeout` for the next event.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<JobEvent> {
        if self.finished {
            return None;
        }
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.observe(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.lost()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, event: JobEvent) -> JobEvent {
        if matches!(event, JobEvent::Finished(_)) {
            self.finished = true;
        }
        event
    }

    fn lost(&mut self) -> JobEvent {
        self.finished = true;
        tracing::error!("Upload worker exited without reporting a result");
        JobEvent::Finished(Err(WorkflowFailure {
            error: WorkflowError::Interrupted,
            pending: None,
        }))
    }
}
