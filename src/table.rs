//! The comment table and its CSV encoding.
//!
//! Older snapshots of the CSV may lack columns (`user_id` arrived late) or carry
//! columns this service does not know about. Missing columns get defaults on read;
//! unknown columns are kept verbatim so a full-table rewrite never drops them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::TableError;
use crate::ml::Sentiment;

pub const COL_USER_ID: &str = "user_id";
pub const COL_COMMENT: &str = "comment";
pub const COL_SENTIMENT: &str = "sentiment";
pub const COL_SCORE: &str = "score";
pub const COL_PROBLEM_SUMMARY: &str = "ProblemSummary";

/// Canonical column order of the persisted CSV.
pub const COLUMNS: [&str; 5] = [COL_USER_ID, COL_COMMENT, COL_SENTIMENT, COL_SCORE, COL_PROBLEM_SUMMARY];

/// Default for rows written before `user_id` existed.
pub const UNKNOWN_USER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommentRecord {
    #[schema(example = "alice")]
    pub user_id: String,
    #[schema(example = "The export button is bad and slow")]
    pub comment: String,
    pub sentiment: Sentiment,
    #[schema(example = 0.87)]
    pub score: f64,
    #[schema(example = "Key problems: bad and slow...")]
    pub problem_summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub record: CommentRecord,
    /// Cells for `CommentTable::extra_columns`, same order and length.
    pub extra: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentTable {
    extra_columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl CommentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CommentRecord> {
        self.rows.iter().map(|row| &row.record)
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    /// Header as written by `encode`: canonical columns then any extras.
    pub fn header(&self) -> Vec<&str> {
        COLUMNS
            .iter()
            .copied()
            .chain(self.extra_columns.iter().map(String::as_str))
            .collect()
    }

    pub fn append(&mut self, record: CommentRecord) {
        let extra = vec![String::new(); self.extra_columns.len()];
        self.rows.push(TableRow { record, extra });
    }

    pub fn encode(&self) -> Result<String, TableError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.header())?;

        for row in &self.rows {
            let r = &row.record;
            let score = r.score.to_string();
            let cells = [
                r.user_id.as_str(),
                r.comment.as_str(),
                r.sentiment.as_str(),
                score.as_str(),
                r.problem_summary.as_str(),
            ];
            writer.write_record(cells.iter().copied().chain(row.extra.iter().map(String::as_str)))?;
        }

        let bytes = writer.into_inner().map_err(|e| TableError::Csv(e.into_error().into()))?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn decode(text: &str) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();

        let position: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
        let extra_positions: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !COLUMNS.contains(h))
            .map(|(i, _)| i)
            .collect();
        let extra_columns = extra_positions.iter().map(|&i| headers[i].to_string()).collect();

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let cell = |column: &str| cell_value(&record, &position, column);

            let user_id = match cell(COL_USER_ID).map(str::trim) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => UNKNOWN_USER.to_string(),
            };
            let sentiment = match cell(COL_SENTIMENT).map(str::trim) {
                None | Some("") => Sentiment::Neutral,
                Some(value) => Sentiment::parse(value).ok_or_else(|| TableError::InvalidCell {
                    row: index,
                    column: COL_SENTIMENT,
                    value: value.to_string(),
                })?,
            };
            let score = match cell(COL_SCORE).map(str::trim) {
                None | Some("") => 0.0,
                Some(value) => value.parse::<f64>().map_err(|_| TableError::InvalidCell {
                    row: index,
                    column: COL_SCORE,
                    value: value.to_string(),
                })?,
            };

            rows.push(TableRow {
                record: CommentRecord {
                    user_id,
                    comment: cell(COL_COMMENT).unwrap_or_default().to_string(),
                    sentiment,
                    score,
                    problem_summary: cell(COL_PROBLEM_SUMMARY).unwrap_or_default().to_string(),
                },
                extra: extra_positions
                    .iter()
                    .map(|&i| record.get(i).unwrap_or_default().to_string())
                    .collect(),
            });
        }

        Ok(Self { extra_columns, rows })
    }
}

fn cell_value<'r>(record: &'r csv::StringRecord, position: &HashMap<&str, usize>, column: &str) -> Option<&'r str> {
    position.get(column).and_then(|&i| record.get(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str, comment: &str, sentiment: Sentiment, score: f64, summary: &str) -> CommentRecord {
        CommentRecord {
            user_id: user.to_string(),
            comment: comment.to_string(),
            sentiment,
            score,
            problem_summary: summary.to_string(),
        }
    }

    #[test]
    fn test_empty_table_encodes_header_only() {
        let encoded = CommentTable::new().encode().unwrap();
        assert_eq!(encoded, "user_id,comment,sentiment,score,ProblemSummary\n");
    }

    #[test]
    fn test_round_trip_with_optional_fields_missing() {
        let mut table = CommentTable::new();
        table.append(record("alice", "Love it, really", Sentiment::Positive, 0.912345678901, ""));
        table.append(record("Anonymous", "multi\nline \"quoted\"", Sentiment::Neutral, 0.4, ""));
        table.append(record("bob", "bad sync", Sentiment::Negative, 0.77, "Key problems: bad sync..."));

        let decoded = CommentTable::decode(&table.encode().unwrap()).unwrap();
        assert_eq!(decoded, table);
        assert_eq!(decoded.records().nth(2).unwrap().problem_summary, "Key problems: bad sync...");
    }

    #[test]
    fn test_legacy_rows_get_defaults() {
        let legacy = "comment,sentiment,score\nGreat app,Positive,0.9\nmeh,neutral,\n";
        let table = CommentTable::decode(legacy).unwrap();

        let records: Vec<_> = table.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, UNKNOWN_USER);
        assert_eq!(records[0].sentiment, Sentiment::Positive);
        assert_eq!(records[0].problem_summary, "");
        assert_eq!(records[1].score, 0.0);
    }

    #[test]
    fn test_blank_user_id_cell_is_unknown() {
        let text = "comment,sentiment,score,ProblemSummary,user_id\nhi,neutral,0.5,,\n";
        let table = CommentTable::decode(text).unwrap();
        assert_eq!(table.records().next().unwrap().user_id, UNKNOWN_USER);
    }

    #[test]
    fn test_extra_columns_survive_rewrite() {
        let text = "user_id,comment,sentiment,score,ProblemSummary,channel\ncarol,ok,neutral,0.5,,email\n";
        let mut table = CommentTable::decode(text).unwrap();
        assert_eq!(table.extra_columns(), ["channel".to_string()]);

        table.append(record("dave", "fine", Sentiment::Neutral, 0.6, ""));
        let encoded = table.encode().unwrap();
        assert_eq!(
            encoded,
            "user_id,comment,sentiment,score,ProblemSummary,channel\n\
             carol,ok,neutral,0.5,,email\n\
             dave,fine,neutral,0.6,,\n"
        );
    }

    #[test]
    fn test_invalid_score_is_an_error() {
        let text = "user_id,comment,sentiment,score,ProblemSummary\nx,y,positive,high,\n";
        let err = CommentTable::decode(text).unwrap_err();
        assert!(matches!(err, TableError::InvalidCell { column: COL_SCORE, .. }));
    }
}
