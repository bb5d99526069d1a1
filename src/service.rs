//! Submission pipeline: validate, normalize, classify, summarize, persist.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::ml::SentimentClassifier;
use crate::normalize::normalize;
use crate::store::{CommentStore, VersionToken};
use crate::summarize::{summarize, SummaryStrategy};
use crate::table::CommentRecord;

/// User id recorded when a submission does not carry one.
pub const ANONYMOUS_USER: &str = "Anonymous";

/// Analysis always happened; `saved` says whether the row reached the store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmissionOutcome {
    #[schema(value_type = String)]
    pub submission_id: Uuid,
    pub record: CommentRecord,
    pub saved: bool,
    #[schema(value_type = Option<String>)]
    pub version: Option<VersionToken>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct CommentService {
    classifier: Arc<SentimentClassifier>,
    store: CommentStore,
    strategy: SummaryStrategy,
}

impl CommentService {
    pub fn new(classifier: Arc<SentimentClassifier>, store: CommentStore, strategy: SummaryStrategy) -> Self {
        Self {
            classifier,
            store,
            strategy,
        }
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    /// Builds the record for a submission without touching the store.
    pub fn analyze(&self, user_id: Option<&str>, comment: &str) -> Result<CommentRecord, ValidationError> {
        if comment.trim().is_empty() {
            return Err(ValidationError::EmptyComment);
        }

        // An all-emoji comment normalizes to "" and is still classified.
        let cleaned = normalize(comment);
        let result = self.classifier.classify(&cleaned);
        let problem_summary = summarize(comment, result.label, self.strategy);

        let user_id = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(ANONYMOUS_USER)
            .to_string();

        Ok(CommentRecord {
            user_id,
            comment: comment.to_string(),
            sentiment: result.label,
            score: result.confidence,
            problem_summary,
        })
    }

    /// Analyzes, then fetches the current table and commits the new row against
    /// the token from that same fetch.
    pub async fn submit(&self, user_id: Option<&str>, comment: &str) -> Result<SubmissionOutcome, ValidationError> {
        let submission_id = Uuid::new_v4();
        let record = self.analyze(user_id, comment)?;
        info!(
            %submission_id,
            sentiment = %record.sentiment,
            score = record.score,
            "comment analyzed"
        );

        let snapshot = self.store.fetch().await;
        match self
            .store
            .append_and_commit(snapshot.table, record.clone(), snapshot.version.as_ref())
            .await
        {
            Ok(receipt) => {
                info!(%submission_id, rows = receipt.rows, "comment saved");
                Ok(SubmissionOutcome {
                    submission_id,
                    record,
                    saved: true,
                    version: receipt.version,
                    error: None,
                })
            }
            Err(failure) => {
                warn!(%submission_id, error = %failure, "comment analyzed but not saved");
                Ok(SubmissionOutcome {
                    submission_id,
                    record: *failure.record,
                    saved: false,
                    version: None,
                    error: Some(failure.reason.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{tests::test_model, Sentiment};
    use crate::store::memory::MemoryBlob;

    fn service(blob: MemoryBlob, strategy: SummaryStrategy) -> CommentService {
        CommentService::new(
            Arc::new(test_model()),
            CommentStore::new(Arc::new(blob)),
            strategy,
        )
    }

    #[test]
    fn test_empty_comment_rejected() {
        let svc = service(MemoryBlob::missing(), SummaryStrategy::Aspect);
        assert_eq!(svc.analyze(Some("alice"), "   \n\t").unwrap_err(), ValidationError::EmptyComment);
    }

    #[test]
    fn test_negative_comment_gets_summary() {
        let svc = service(MemoryBlob::missing(), SummaryStrategy::Aspect);
        let record = svc.analyze(Some(" bob "), "Terrible search, bad results").unwrap();
        assert_eq!(record.user_id, "bob");
        assert_eq!(record.sentiment, Sentiment::Negative);
        assert_eq!(record.problem_summary, "Key problems: terrible search; bad results...");
    }

    #[test]
    fn test_positive_comment_has_no_summary_and_default_user() {
        let svc = service(MemoryBlob::missing(), SummaryStrategy::Truncate);
        let record = svc.analyze(None, "good and great @team #launch").unwrap();
        assert_eq!(record.user_id, ANONYMOUS_USER);
        assert_eq!(record.sentiment, Sentiment::Positive);
        assert_eq!(record.problem_summary, "");
        assert_eq!(record.comment, "good and great @team #launch");
    }

    #[test]
    fn test_emoji_only_comment_still_classified() {
        let svc = service(MemoryBlob::missing(), SummaryStrategy::Aspect);
        let record = svc.analyze(Some(""), "🔥🔥🔥").unwrap();
        assert_eq!(record.sentiment, Sentiment::Neutral);
        assert!(record.score >= 1.0 / 3.0);
    }

    #[tokio::test]
    async fn test_submit_saves_to_store() {
        let svc = service(MemoryBlob::empty_table().unwrap(), SummaryStrategy::Aspect);
        let outcome = svc.submit(Some("carol"), "great docs").await.unwrap();
        assert!(outcome.saved);
        assert!(outcome.error.is_none());

        let snapshot = svc.store().fetch().await;
        assert_eq!(snapshot.table.len(), 1);
        assert_eq!(snapshot.table.records().next().unwrap(), &outcome.record);
        assert_eq!(snapshot.version, outcome.version);
    }

    #[tokio::test]
    async fn test_submit_without_remote_table_is_analyzed_not_saved() {
        let svc = service(MemoryBlob::missing(), SummaryStrategy::Aspect);
        let outcome = svc.submit(Some("dave"), "bad login flow").await.unwrap();
        assert!(!outcome.saved);
        assert_eq!(outcome.record.sentiment, Sentiment::Negative);
        assert!(outcome.error.unwrap().contains("no version token"));
    }
}
