//! CSV payloads handed to the summarizer.

use csv::WriterBuilder;
use thiserror::Error;

use crate::domain::feedback::{FeedbackRecord, SummaryRow};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer could not be finalized: {0}")]
    Buffer(String),
}

/// Comment-cache input: the prompt block, a blank line, then one row per comment.
pub fn comments_csv(prompt: &str, records: &[FeedbackRecord]) -> Result<String, InputError> {
    let mut header = writer();
    header.write_record(["prompt"])?;
    header.write_record([prompt])?;

    let mut body = writer();
    body.write_record(["comment", "user_id"])?;
    for record in records {
        body.write_record([record.comment.as_deref().unwrap_or_default(), record.user_id.as_str()])?;
    }

    let mut output = finish(header)?;
    output.push('\n');
    output.push_str(&finish(body)?);
    Ok(output)
}

/// Summary rows as digest or issue-report input. Dated output lets the
/// summarizer see how a cohort moved across the period.
pub fn summaries_csv(rows: &[SummaryRow], with_dates: bool) -> Result<String, InputError> {
    let mut out = writer();
    if with_dates {
        out.write_record(["summary_date", "category", "prompt", "n_comments", "summary"])?;
        for row in rows {
            let date = row.summary_date.format("%Y-%m-%d").to_string();
            let count = row.comment_count.to_string();
            out.write_record([
                date.as_str(),
                row.category.as_str(),
                row.prompt.as_str(),
                count.as_str(),
                row.summary.as_str(),
            ])?;
        }
    } else {
        out.write_record(["category", "prompt", "n_comments", "summary"])?;
        for row in rows {
            let count = row.comment_count.to_string();
            out.write_record([
                row.category.as_str(),
                row.prompt.as_str(),
                count.as_str(),
                row.summary.as_str(),
            ])?;
        }
    }
    finish(out)
}

fn writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new().flexible(true).from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, InputError> {
    let bytes = writer.into_inner().map_err(|err| InputError::Buffer(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| InputError::Buffer(err.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{comments_csv, summaries_csv};
    use crate::domain::feedback::{FeedbackRecord, SummaryRow};

    fn summary(day: u32, summary: &str) -> SummaryRow {
        SummaryRow {
            summary_date: NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date"),
            origin: "docs".to_owned(),
            category: "api".to_owned(),
            prompt: "summarize".to_owned(),
            comment_count: 4,
            summary: summary.to_owned(),
        }
    }

    #[test]
    fn dated_summaries_lead_with_summary_date() {
        let csv = summaries_csv(&[summary(3, "Users want examples")], true).expect("csv");

        assert_eq!(
            csv,
            "summary_date,category,prompt,n_comments,summary\n2026-10-03,api,summarize,4,Users want examples\n"
        );
    }

    #[test]
    fn undated_summaries_quote_embedded_commas() {
        let csv = summaries_csv(&[summary(3, "slow, flaky")], false).expect("csv");

        assert_eq!(csv, "category,prompt,n_comments,summary\napi,summarize,4,\"slow, flaky\"\n");
    }

    #[test]
    fn comment_input_separates_prompt_and_comments_with_blank_line() {
        let record = FeedbackRecord {
            workspace: "T1".to_owned(),
            prompt: "summarize".to_owned(),
            thumb_up: false,
            comment: Some("too long".to_owned()),
            origin: "docs".to_owned(),
            category: "api".to_owned(),
            in_production: true,
            user_id: "U9".to_owned(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("timestamp"),
        };

        let csv = comments_csv("summarize", &[record]).expect("csv");

        assert_eq!(csv, "prompt\nsummarize\n\ncomment,user_id\ntoo long,U9\n");
    }
}
