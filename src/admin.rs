//! Gated admin flow: password, repository credentials, upload form, progress.
//!
//! The flow owns at most one background [`UploadJob`]; the owner calls
//! [`AdminFlow::poll`] to move progress and results onto its own thread.

use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::{AssetRecord, Category};
use crate::remote::{CredentialProvider, CredentialStoreError, RepoConfig};
use crate::workflow::{
    CatalogLayout, JobEvent, PendingRegistration, SharedRepository, UploadJob, UploadRequest,
    UploadStage, UploadWork,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminStep {
    Auth,
    Config,
    Upload,
    Processing,
    Success,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("Could not access repository. Check credentials.")]
    AccessDenied,
    #[error("Please select an audio file")]
    NoFileSelected,
    #[error("Could not read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not save credentials: {0}")]
    Credentials(#[from] CredentialStoreError),
    #[error("Nothing to retry")]
    NothingPending,
    #[error("Action not available during {0:?}")]
    WrongStep(AdminStep),
}

/// Upload form fields; retained across failed attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadForm {
    pub file: Option<PathBuf>,
    pub title: String,
    pub category: Category,
    pub description: String,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self {
            file: None,
            title: String::new(),
            category: Category::UiEffects,
            description: String::new(),
        }
    }
}

/// What changed during a [`AdminFlow::poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminEvent {
    Progress(UploadStage),
    Uploaded(AssetRecord),
    Failed(String),
}

pub struct AdminFlow<C: CredentialProvider> {
    credentials: C,
    repo: SharedRepository,
    layout: CatalogLayout,
    password: String,
    step: AdminStep,
    config: RepoConfig,
    form: UploadForm,
    error: Option<String>,
    status: Option<String>,
    job: Option<UploadJob>,
    pending: Option<PendingRegistration>,
    last_uploaded: Option<AssetRecord>,
}

impl<C: CredentialProvider> AdminFlow<C> {
    pub fn new(credentials: C, repo: SharedRepository, layout: CatalogLayout, password: &str) -> Self {
        Self {
            credentials,
            repo,
            layout,
            password: password.to_string(),
            step: AdminStep::Auth,
            config: RepoConfig::default(),
            form: UploadForm::default(),
            error: None,
            status: None,
            job: None,
            pending: None,
            last_uploaded: None,
        }
    }

    /// Reset to the password gate and reload saved credentials.
    pub fn open(&mut self) {
        self.step = AdminStep::Auth;
        self.form = UploadForm::default();
        self.error = None;
        self.status = None;
        self.job = None;
        self.pending = None;
        self.last_uploaded = None;
        self.config = match self.credentials.load() {
            Ok(saved) => saved.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "Saved repository credentials unavailable");
                RepoConfig::default()
            }
        };
    }

    pub fn submit_password(&mut self, password: &str) -> Result<AdminStep, AdminError> {
        self.expect_step(AdminStep::Auth)?;
        if password != self.password {
            return self.fail(AdminError::IncorrectPassword);
        }
        self.error = None;
        self.step = if self.config.is_complete() {
            AdminStep::Upload
        } else {
            AdminStep::Config
        };
        Ok(self.step)
    }

    /// Verify access, then persist the credentials and continue to the form.
    pub fn submit_config(&mut self, config: RepoConfig) -> Result<AdminStep, AdminError> {
        self.expect_step(AdminStep::Config)?;
        if !config.is_complete() || !self.repo.check_access(&config) {
            tracing::info!(repo = %config.slug(), "Repository access check failed");
            self.config = config;
            return self.fail(AdminError::AccessDenied);
        }
        if let Err(err) = self.credentials.save(&config) {
            self.config = config;
            return self.fail(AdminError::Credentials(err));
        }
        tracing::info!(repo = %config.slug(), "Repository credentials saved");
        self.config = config;
        self.error = None;
        self.step = AdminStep::Upload;
        Ok(self.step)
    }

    pub fn edit_config(&mut self) -> Result<AdminStep, AdminError> {
        self.expect_step(AdminStep::Upload)?;
        self.error = None;
        self.step = AdminStep::Config;
        Ok(self.step)
    }

    /// Start the upload job for the current form.
    pub fn submit_upload(&mut self, form: UploadForm) -> Result<AdminStep, AdminError> {
        self.expect_step(AdminStep::Upload)?;
        self.form = form;
        let Some(path) = self.form.file.clone() else {
            return self.fail(AdminError::NoFileSelected);
        };
        let request = match UploadRequest::from_path(
            &path,
            &self.form.title,
            self.form.category,
            &self.form.description,
        ) {
            Ok(request) => request,
            Err(source) => return self.fail(AdminError::ReadFile { path, source }),
        };
        self.pending = None;
        self.start_job(UploadWork::Submit(request));
        Ok(self.step)
    }

    /// Register an already uploaded asset again after a catalog failure.
    pub fn retry_registration(&mut self) -> Result<AdminStep, AdminError> {
        self.expect_step(AdminStep::Upload)?;
        let Some(pending) = self.pending.clone() else {
            return self.fail(AdminError::NothingPending);
        };
        self.start_job(UploadWork::Register(pending));
        Ok(self.step)
    }

    /// Drain queued progress and results from the running job.
    pub fn poll(&mut self) -> Vec<AdminEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.job.as_mut().and_then(UploadJob::try_next) {
            events.push(self.apply(event));
        }
        events
    }

    /// Like [`AdminFlow::poll`], but blocks up to `timeout` for the first event.
    pub fn wait(&mut self, timeout: Duration) -> Vec<AdminEvent> {
        match self.job.as_mut().and_then(|job| job.next_timeout(timeout)) {
            Some(event) => {
                let mut events = vec![self.apply(event)];
                events.extend(self.poll());
                events
            }
            None => Vec::new(),
        }
    }

    fn apply(&mut self, event: JobEvent) -> AdminEvent {
        match event {
            JobEvent::Progress(stage) => {
                self.status = Some(stage.to_string());
                AdminEvent::Progress(stage)
            }
            JobEvent::Finished(Ok(outcome)) => {
                self.job = None;
                self.pending = None;
                self.error = None;
                self.status = None;
                self.step = AdminStep::Success;
                self.last_uploaded = Some(outcome.record.clone());
                AdminEvent::Uploaded(outcome.record)
            }
            JobEvent::Finished(Err(failure)) => {
                self.job = None;
                let message = failure.error.to_string();
                if failure.pending.is_some() {
                    self.pending = failure.pending;
                }
                self.error = Some(message.clone());
                self.status = None;
                self.step = AdminStep::Upload;
                AdminEvent::Failed(message)
            }
        }
    }

    pub fn upload_another(&mut self) -> Result<AdminStep, AdminError> {
        self.expect_step(AdminStep::Success)?;
        self.form = UploadForm::default();
        self.error = None;
        self.step = AdminStep::Upload;
        Ok(self.step)
    }

    /// Abandon any running job; its later messages are discarded.
    pub fn close(&mut self) {
        if self.job.take().is_some() {
            tracing::info!("Admin flow closed while an upload was running");
        }
        self.status = None;
        self.step = AdminStep::Auth;
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub fn step(&self) -> AdminStep {
        self.step
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn form(&self) -> &UploadForm {
        &self.form
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn pending(&self) -> Option<&PendingRegistration> {
        self.pending.as_ref()
    }

    pub fn last_uploaded(&self) -> Option<&AssetRecord> {
        self.last_uploaded.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    fn start_job(&mut self, work: UploadWork) {
        self.error = None;
        self.status = Some("Starting upload...".into());
        self.job = Some(UploadJob::spawn(
            self.repo.clone(),
            self.config.clone(),
            self.layout.clone(),
            work,
        ));
        self.step = AdminStep::Processing;
    }

    fn expect_step(&self, step: AdminStep) -> Result<(), AdminError> {
        if self.step == step {
            Ok(())
        } else {
            Err(AdminError::WrongStep(self.step))
        }
    }

    fn fail(&mut self, error: AdminError) -> Result<AdminStep, AdminError> {
        self.error = Some(error.to_string());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::catalog::DEFAULT_MARKER;
    use crate::remote::MemoryCredentials;
    use crate::remote::memory::{FailPoint, InMemoryRepository, RemoteCall};
    use tempfile::tempdir;

    fn repo() -> Arc<InMemoryRepository> {
        let repo = Arc::new(InMemoryRepository::new("octo", "vault", "ghp_token"));
        repo.seed_text("constants.ts", &format!("{DEFAULT_MARKER}\n];\n"));
        repo
    }

    fn flow(
        credentials: MemoryCredentials,
        repo: &Arc<InMemoryRepository>,
    ) -> AdminFlow<MemoryCredentials> {
        let mut flow = AdminFlow::new(credentials, repo.clone(), CatalogLayout::default(), "sounds");
        flow.open();
        flow
    }

    fn wait_for_result(flow: &mut AdminFlow<MemoryCredentials>) -> Vec<AdminEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while flow.is_busy() {
            assert!(Instant::now() < deadline, "upload did not finish");
            events.extend(flow.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        events
    }

    fn form_with_file(dir: &std::path::Path) -> UploadForm {
        let path = dir.join("Magic Chime.mp3");
        std::fs::write(&path, b"not audio").unwrap();
        UploadForm {
            file: Some(path),
            title: "Magic Chime".into(),
            category: Category::UiEffects,
            description: "test".into(),
        }
    }

    #[test]
    fn wrong_password_stays_on_gate() {
        let repo = repo();
        let mut flow = flow(MemoryCredentials::default(), &repo);
        assert!(matches!(
            flow.submit_password("nope"),
            Err(AdminError::IncorrectPassword)
        ));
        assert_eq!(flow.step(), AdminStep::Auth);
        assert_eq!(flow.error(), Some("Incorrect password"));
    }

    #[test]
    fn password_leads_to_config_without_saved_credentials() {
        let repo = repo();
        let mut flow = flow(MemoryCredentials::default(), &repo);
        assert_eq!(flow.submit_password("sounds").unwrap(), AdminStep::Config);
    }

    #[test]
    fn password_skips_config_with_saved_credentials() {
        let repo = repo();
        let mut flow = flow(MemoryCredentials::with_config(repo.config()), &repo);
        assert_eq!(flow.submit_password("sounds").unwrap(), AdminStep::Upload);
    }

    #[test]
    fn rejected_credentials_are_not_saved() {
        let repo = repo();
        let mut flow = flow(MemoryCredentials::default(), &repo);
        flow.submit_password("sounds").unwrap();
        let err = flow
            .submit_config(RepoConfig::new("ghp_token", "octo", "missing"))
            .unwrap_err();
        assert!(matches!(err, AdminError::AccessDenied));
        assert_eq!(flow.error(), Some("Could not access repository. Check credentials."));
        assert_eq!(flow.step(), AdminStep::Config);
        assert!(flow.credentials().saved().is_none());
    }

    #[test]
    fn accepted_credentials_are_saved() {
        let repo = repo();
        let mut flow = flow(MemoryCredentials::default(), &repo);
        flow.submit_password("sounds").unwrap();
        assert_eq!(flow.submit_config(repo.config()).unwrap(), AdminStep::Upload);
        assert_eq!(flow.credentials().saved(), Some(repo.config()));
        assert_eq!(flow.edit_config().unwrap(), AdminStep::Config);
    }

    #[test]
    fn upload_without_file_is_rejected_inline() {
        let repo = repo();
        let mut flow = flow(MemoryCredentials::with_config(repo.config()), &repo);
        flow.submit_password("sounds").unwrap();
        let err = flow.submit_upload(UploadForm::default()).unwrap_err();
        assert!(matches!(err, AdminError::NoFileSelected));
        assert_eq!(flow.step(), AdminStep::Upload);
    }

    #[test]
    fn successful_upload_reaches_success_then_resets_form() {
        let dir = tempdir().unwrap();
        let repo = repo();
        let mut flow = flow(MemoryCredentials::with_config(repo.config()), &repo);
        flow.submit_password("sounds").unwrap();
        assert_eq!(
            flow.submit_upload(form_with_file(dir.path())).unwrap(),
            AdminStep::Processing
        );
        let events = wait_for_result(&mut flow);
        assert_eq!(flow.step(), AdminStep::Success);
        assert!(matches!(events.last(), Some(AdminEvent::Uploaded(record)) if record.filename == "magic-chime.mp3"));
        assert!(
            events
                .iter()
                .any(|event| matches!(event, AdminEvent::Progress(UploadStage::InjectingRecord)))
        );
        assert_eq!(flow.upload_another().unwrap(), AdminStep::Upload);
        assert_eq!(flow.form(), &UploadForm::default());
    }

    #[test]
    fn failed_registration_returns_to_form_and_retry_skips_asset_upload() {
        let dir = tempdir().unwrap();
        let repo = repo();
        repo.fail_next(FailPoint::Update);
        let mut flow = flow(MemoryCredentials::with_config(repo.config()), &repo);
        flow.submit_password("sounds").unwrap();
        let form = form_with_file(dir.path());
        flow.submit_upload(form.clone()).unwrap();
        let events = wait_for_result(&mut flow);
        assert!(matches!(events.last(), Some(AdminEvent::Failed(_))));
        assert_eq!(flow.step(), AdminStep::Upload);
        assert_eq!(flow.form(), &form);
        assert!(flow.error().is_some());
        assert!(flow.pending().is_some());

        flow.retry_registration().unwrap();
        wait_for_result(&mut flow);
        assert_eq!(flow.step(), AdminStep::Success);
        let asset_writes = repo
            .calls()
            .into_iter()
            .filter(|call| matches!(call, RemoteCall::WriteNew(_)))
            .count();
        assert_eq!(asset_writes, 1);
    }

    #[test]
    fn closing_discards_running_job() {
        let dir = tempdir().unwrap();
        let repo = repo();
        let mut flow = flow(MemoryCredentials::with_config(repo.config()), &repo);
        flow.submit_password("sounds").unwrap();
        flow.submit_upload(form_with_file(dir.path())).unwrap();
        flow.close();
        assert!(!flow.is_busy());
        assert!(flow.poll().is_empty());
        assert_eq!(flow.step(), AdminStep::Auth);
    }

    #[test]
    fn wait_returns_stage_events_in_order() {
        let dir = tempdir().unwrap();
        let repo = repo();
        let mut flow = flow(MemoryCredentials::with_config(repo.config()), &repo);
        flow.submit_password("sounds").unwrap();
        flow.submit_upload(form_with_file(dir.path())).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut stages = Vec::new();
        while flow.is_busy() {
            assert!(Instant::now() < deadline, "upload did not finish");
            for event in flow.wait(Duration::from_millis(50)) {
                if let AdminEvent::Progress(stage) = event {
                    stages.push(stage.number());
                }
            }
        }
        assert_eq!(stages, vec![1, 2, 3, 4, 5]);
        assert_eq!(flow.step(), AdminStep::Success);
        assert!(flow.wait(Duration::from_millis(1)).is_empty());
    }
}
