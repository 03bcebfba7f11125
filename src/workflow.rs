//! Listing submission workflow
//!
//! Publishing one listing is a fixed sequence of dependent calls:
//!
//! ```text
//! Idle -> FetchingAccount -> CreatingDraft -> UploadingImage(1)
//!      -> UploadingImage(2) -> UploadingArchive -> Succeeded -> Idle
//! ```
//!
//! Any step may move the workflow to `Failed`. Every transition is reported
//! to a [`ProgressReporter`]. Nothing is retried, and a draft created before
//! a later step failed is left on the server as is.

use std::fmt;

use tracing::{error, info, warn};

use crate::Result;
use crate::api::ApiClient;
use crate::auth::{AccessToken, CredentialStore};
use crate::error::Error;
use crate::listing::{ListingForm, ListingSubmission};

/// Message shown when a failure looks like an expired or revoked token
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// One network step of the submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FetchingAccount,
    CreatingDraft,
    /// Image upload with its display rank
    UploadingImage(u8),
    UploadingArchive,
}

impl Step {
    /// Progress label for the step
    pub fn label(&self) -> String {
        match self {
            Step::FetchingAccount => "Fetching your shop information...".to_string(),
            Step::CreatingDraft => "Creating draft listing...".to_string(),
            Step::UploadingImage(rank) => format!("Uploading preview image {}...", rank),
            Step::UploadingArchive => "Uploading product archive...".to_string(),
        }
    }

    /// Name of the operation, used to prefix failure messages
    pub fn operation(&self) -> String {
        match self {
            Step::FetchingAccount => "Fetching account".to_string(),
            Step::CreatingDraft => "Creating draft listing".to_string(),
            Step::UploadingImage(rank) => format!("Uploading image {}", rank),
            Step::UploadingArchive => "Uploading archive".to_string(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.operation())
    }
}

/// Why a submission stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    /// Step that failed
    pub step: Step,
    /// User-facing message
    pub message: String,
    /// The stored token was discarded because the session looked expired
    pub auth_expired: bool,
    /// Draft left behind on the server, if one was created
    pub draft_listing_id: Option<u64>,
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Workflow state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    InProgress(Step),
    Succeeded { listing_id: u64 },
    Failed(SubmissionFailure),
}

impl SubmissionState {
    /// Whether a submission is currently running
    pub fn is_busy(&self) -> bool {
        matches!(self, SubmissionState::InProgress(_))
    }
}

/// Receives every state transition
pub trait ProgressReporter {
    fn report(&self, state: &SubmissionState);
}

impl<F> ProgressReporter for F
where
    F: Fn(&SubmissionState),
{
    fn report(&self, state: &SubmissionState) {
        self(state)
    }
}

/// Reporter that ignores all events
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _state: &SubmissionState) {}
}

/// Drives one listing through the submission sequence
///
/// `submit` takes `&mut self`, so a workflow instance runs at most one
/// submission at a time.
pub struct SubmissionWorkflow<'a> {
    api: &'a ApiClient,
    credentials: &'a CredentialStore,
    state: SubmissionState,
}

type StepResult<T> = std::result::Result<T, (Step, Error)>;

impl<'a> SubmissionWorkflow<'a> {
    pub fn new(api: &'a ApiClient, credentials: &'a CredentialStore) -> Self {
        Self {
            api,
            credentials,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Validate the form and run the full sequence.
    ///
    /// The outcome of any earlier run is reset to `Idle` first. Validation and
    /// login failures are returned before any request is made and leave the
    /// workflow `Idle`. Failures during the sequence are returned as
    /// [`Error::Submission`].
    pub async fn submit(
        &mut self,
        form: ListingForm,
        progress: &dyn ProgressReporter,
    ) -> Result<u64> {
        if self.state != SubmissionState::Idle {
            self.transition(SubmissionState::Idle, progress);
        }

        let submission = form.validate()?;
        if self.credentials.load().is_none() {
            return Err(Error::NotAuthenticated);
        }

        info!("Submitting listing '{}'", submission.title);

        let mut draft_listing_id = None;
        match self.run(&submission, &mut draft_listing_id, progress).await {
            Ok(listing_id) => {
                info!("Draft listing {} created", listing_id);
                self.transition(SubmissionState::Succeeded { listing_id }, progress);
                self.transition(SubmissionState::Idle, progress);
                Ok(listing_id)
            }
            Err((step, err)) => {
                let failure = self.classify_failure(step, err, draft_listing_id);
                self.transition(SubmissionState::Failed(failure.clone()), progress);
                Err(Error::Submission(failure))
            }
        }
    }

    async fn run(
        &mut self,
        submission: &ListingSubmission,
        draft_listing_id: &mut Option<u64>,
        progress: &dyn ProgressReporter,
    ) -> StepResult<u64> {
        let api = self.api;

        let step = self.enter(Step::FetchingAccount, progress);
        let token = self.current_token(step)?;
        let me = api.get_me(&token).await.map_err(|e| (step, e))?;
        let shop_id = me.shop().ok_or((step, Error::NoShopAssociated))?;

        let step = self.enter(Step::CreatingDraft, progress);
        let token = self.current_token(step)?;
        let created = api
            .create_listing(shop_id, submission, &token)
            .await
            .map_err(|e| (step, e))?;
        let listing_id = created.listing_id;
        *draft_listing_id = Some(listing_id);

        for (rank, image) in (1u8..).zip(submission.images.iter()) {
            let step = self.enter(Step::UploadingImage(rank), progress);
            let token = self.current_token(step)?;
            api.upload_image(listing_id, image, rank, &token)
                .await
                .map_err(|e| (step, e))?;
        }

        let step = self.enter(Step::UploadingArchive, progress);
        let token = self.current_token(step)?;
        api.upload_file(listing_id, &submission.archive, &token)
            .await
            .map_err(|e| (step, e))?;

        Ok(listing_id)
    }

    fn enter(&mut self, step: Step, progress: &dyn ProgressReporter) -> Step {
        info!("{}", step.label());
        self.transition(SubmissionState::InProgress(step), progress);
        step
    }

    fn transition(&mut self, state: SubmissionState, progress: &dyn ProgressReporter) {
        progress.report(&state);
        self.state = state;
    }

    /// Token for the next call; a call in flight keeps the value it was given
    fn current_token(&self, step: Step) -> StepResult<AccessToken> {
        self.credentials
            .load()
            .ok_or((step, Error::NotAuthenticated))
    }

    fn classify_failure(
        &self,
        step: Step,
        err: Error,
        draft_listing_id: Option<u64>,
    ) -> SubmissionFailure {
        error!(step = %step, draft_listing_id = ?draft_listing_id, "Listing submission failed: {}", err);
        if let Some(listing_id) = draft_listing_id {
            warn!(
                "Draft listing {} was left incomplete; finish or delete it manually",
                listing_id
            );
        }

        let auth_expired = err.is_auth_expired();
        let message = if auth_expired {
            self.credentials.clear();
            SESSION_EXPIRED_MESSAGE.to_string()
        } else {
            format!("{} failed: {}", step.operation(), err)
        };

        SubmissionFailure {
            step,
            message,
            auth_expired,
            draft_listing_id,
        }
    }
}
