//! Feedback from signed-in accounts.

use secure_commerce_core::{AccountId, TextError, clean_text};

use super::ServiceError;
use crate::db::Repositories;
use crate::models::Feedback;

/// Stores feedback messages.
pub struct FeedbackService<'a> {
    repos: &'a Repositories,
}

impl<'a> FeedbackService<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories) -> Self {
        Self { repos }
    }

    /// Store `message` from `author`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::BadRequest` for a blank message and
    /// `ServiceError::Invalid` for one that is too short, too long or
    /// contains markup.
    pub async fn submit(&self, author: AccountId, message: &str) -> Result<Feedback, ServiceError> {
        let message = clean_text(message, 2, 1000, "feedback").map_err(|e| match e {
            TextError::Empty { .. } => ServiceError::bad_request("Feedback message is required."),
            TextError::Unsafe { .. } | TextError::Length { .. } => ServiceError::invalid(
                "Feedback must be 2-1000 characters with no invalid characters.",
            ),
        })?;

        let feedback = self.repos.feedback.create(author, &message).await?;
        tracing::info!(feedback_id = %feedback.id, account_id = %author, "feedback received");
        Ok(feedback)
    }
}
