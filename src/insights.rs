//! Read-side views over the comment table: filters, pages and sentiment counts.

use serde::Serialize;
use utoipa::ToSchema;

use crate::ml::Sentiment;
use crate::table::{CommentRecord, CommentTable};

pub const DEFAULT_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    /// Empty means every sentiment.
    pub sentiments: Vec<Sentiment>,
    /// Case-insensitive substring of `user_id`.
    pub user_query: Option<String>,
}

impl CommentFilter {
    pub fn matches(&self, record: &CommentRecord) -> bool {
        if !self.sentiments.is_empty() && !self.sentiments.contains(&record.sentiment) {
            return false;
        }
        match self.user_query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => record.user_id.to_lowercase().contains(&query.to_lowercase()),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SentimentCounts {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentCounts {
    pub fn from_table(table: &CommentTable) -> Self {
        table.records().fold(Self::default(), |mut counts, record| {
            counts.total += 1;
            match record.sentiment {
                Sentiment::Positive => counts.positive += 1,
                Sentiment::Negative => counts.negative += 1,
                Sentiment::Neutral => counts.neutral += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListedComment {
    /// Row position in the table, 0-based.
    pub id: usize,
    #[serde(flatten)]
    pub record: CommentRecord,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentPage {
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub matching: usize,
    pub comments: Vec<ListedComment>,
    pub counts: SentimentCounts,
}

/// `page` is 1-based and clamped into range; a zero `per_page` uses the default.
pub fn list_comments(table: &CommentTable, filter: &CommentFilter, page: usize, per_page: usize) -> CommentPage {
    let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };

    let matching: Vec<ListedComment> = table
        .records()
        .enumerate()
        .filter(|(_, record)| filter.matches(record))
        .map(|(id, record)| ListedComment {
            id,
            record: record.clone(),
        })
        .collect();

    let total_pages = matching.len().div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));
    let comments = matching
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    CommentPage {
        page,
        per_page,
        total_pages,
        matching: matching.len(),
        comments,
        counts: SentimentCounts::from_table(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CommentTable {
        let mut table = CommentTable::new();
        let rows = [
            ("Alice", Sentiment::Positive),
            ("bob", Sentiment::Negative),
            ("alina", Sentiment::Neutral),
            ("Unknown", Sentiment::Negative),
        ];
        for (i, (user, sentiment)) in rows.iter().cycle().take(23).enumerate() {
            table.append(CommentRecord {
                user_id: user.to_string(),
                comment: format!("comment {}", i),
                sentiment: *sentiment,
                score: 0.8,
                problem_summary: String::new(),
            });
        }
        table
    }

    #[test]
    fn test_counts_cover_whole_table() {
        let counts = SentimentCounts::from_table(&table());
        assert_eq!(
            counts,
            SentimentCounts {
                total: 23,
                positive: 6,
                negative: 11,
                neutral: 6,
            }
        );
    }

    #[test]
    fn test_pagination_and_clamping() {
        let table = table();
        let all = CommentFilter::default();

        let first = list_comments(&table, &all, 1, 10);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.comments.len(), 10);
        assert_eq!(first.comments[0].id, 0);

        let last = list_comments(&table, &all, 99, 10);
        assert_eq!(last.page, 3);
        assert_eq!(last.comments.len(), 3);
        assert_eq!(last.comments[0].id, 20);

        assert_eq!(list_comments(&table, &all, 0, 0).per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_filter_by_sentiment_and_user() {
        let table = table();
        let filter = CommentFilter {
            sentiments: vec![Sentiment::Positive, Sentiment::Neutral],
            user_query: Some("ALI".to_string()),
        };
        let page = list_comments(&table, &filter, 1, 50);
        assert_eq!(page.matching, 12);
        assert!(page.comments.iter().all(|c| c.record.user_id.to_lowercase().starts_with("ali")));
    }

    #[test]
    fn test_empty_table_has_one_empty_page() {
        let page = list_comments(&CommentTable::new(), &CommentFilter::default(), 3, 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.comments.is_empty());
    }
}
