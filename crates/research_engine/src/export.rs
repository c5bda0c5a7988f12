//! File exports of answers and of the whole transcript.

use std::path::PathBuf;

use research_core::{escape_attr, escape_text, DisplayMessage, JobContext, Reference};
use research_logging::{research_error, research_info};
use serde_json::json;

use crate::filename::report_filename;
use crate::persist::{PersistError, ReportWriter};
use crate::ChatSession;

const DEFAULT_TITLE: &str = "Deep research report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Html => "html",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub transcript_filename: String,
    pub manifest_filename: Option<String>,
    pub delimiter_start: String,
    pub delimiter_end: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
            transcript_filename: "transcript.md".to_string(),
            manifest_filename: Some("manifest.json".to_string()),
            delimiter_start: "===== ANSWER START =====".to_string(),
            delimiter_end: "===== ANSWER END =====".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub answer_count: usize,
    pub reference_count: usize,
    pub output_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("there is no answer to export")]
    NothingToExport,
    #[error("no answer number {0}")]
    NoSuchAnswer(usize),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Writes the answers of one [`ChatSession`] to disk.
pub struct ReportExporter<'a> {
    session: &'a ChatSession,
    options: ExportOptions,
}

impl<'a> ReportExporter<'a> {
    pub fn new(session: &'a ChatSession, options: ExportOptions) -> Self {
        Self { session, options }
    }

    /// Exports answer `number` (1-based, oldest first), or the latest answer when `None`.
    pub fn export_answer(
        &self,
        number: Option<usize>,
        format: ExportFormat,
    ) -> Result<PathBuf, ExportError> {
        let view = self.session.view();
        let answers: Vec<&DisplayMessage> = view.answers().collect();
        let message = match number {
            None => answers.last().copied().ok_or(ExportError::NothingToExport)?,
            Some(n) => n
                .checked_sub(1)
                .and_then(|index| answers.get(index).copied())
                .ok_or(ExportError::NoSuchAnswer(n))?,
        };

        let context = view.job_context.clone().or_else(|| JobContext::infer(&message.body));
        let title = context
            .as_ref()
            .map(JobContext::title)
            .unwrap_or(DEFAULT_TITLE);
        let document = match format {
            ExportFormat::Markdown => markdown_document(title, message, context.as_ref()),
            ExportFormat::Html => html_document(title, message, context.as_ref()),
        };

        let filename = report_filename(Some(title), &message.body, format.extension());
        let writer = ReportWriter::new(self.options.output_dir.clone());
        match writer.save(&filename, &document) {
            Ok(path) => {
                research_info!("Exported answer to {}", path.display());
                Ok(path)
            }
            Err(err) => {
                research_error!("Export of {} failed: {}", filename, err);
                Err(err.into())
            }
        }
    }

    /// Concatenates every answer between delimiters and writes a JSON manifest beside it.
    pub fn export_transcript(&self) -> Result<ExportSummary, ExportError> {
        let view = self.session.view();
        let answers: Vec<&DisplayMessage> = view.answers().collect();
        if answers.is_empty() {
            return Err(ExportError::NothingToExport);
        }
        let context = view.job_context.as_ref();

        let mut buffer = String::new();
        let mut entries = Vec::with_capacity(answers.len());
        for (index, answer) in answers.iter().enumerate() {
            let number = index + 1;
            let timestamp = answer.timestamp.as_deref().unwrap_or("-");
            buffer.push_str(&self.options.delimiter_start);
            buffer.push('\n');
            buffer.push_str(&format!(
                "answer: {number}\ntimestamp: {timestamp}\nreferences: {}\n\n",
                answer.references.len()
            ));
            buffer.push_str(answer.resolved_markdown(context).trim_end());
            buffer.push('\n');
            buffer.push_str(&self.options.delimiter_end);
            buffer.push_str("\n\n");

            entries.push(json!({
                "answer": number,
                "timestamp": answer.timestamp,
                "job_id": answer.job_id,
                "references": answer.references,
            }));
        }
        let reference_count = answers.iter().map(|a| a.references.len()).sum();

        let writer = ReportWriter::new(self.options.output_dir.clone());
        let output_path = writer.save(&self.options.transcript_filename, &buffer)?;
        let manifest_path = match &self.options.manifest_filename {
            Some(name) => {
                let manifest = json!({
                    "answer_count": answers.len(),
                    "reference_count": reference_count,
                    "title": context.map(JobContext::title),
                    "answers": entries,
                });
                Some(writer.save(name, &manifest.to_string())?)
            }
            None => None,
        };

        research_info!(
            "Exported transcript with {} answers to {}",
            answers.len(),
            output_path.display()
        );
        Ok(ExportSummary {
            answer_count: answers.len(),
            reference_count,
            output_path,
            manifest_path,
        })
    }
}

/// Title heading, the body with citations as markdown links, then a numbered reference list.
pub fn markdown_document(title: &str, message: &DisplayMessage, job: Option<&JobContext>) -> String {
    let mut doc = format!("# {title}\n\n");
    doc.push_str(message.resolved_markdown(job).trim_end());
    doc.push('\n');
    if !message.references.is_empty() {
        doc.push_str("\n## References\n\n");
        for (index, reference) in message.references.iter().enumerate() {
            let entry = if reference.url.is_empty() {
                reference.title.clone()
            } else {
                format!("[{}]({})", reference_label(reference), reference.url)
            };
            doc.push_str(&format!("{}. {entry}\n", index + 1));
        }
    }
    doc
}

pub fn html_document(title: &str, message: &DisplayMessage, job: Option<&JobContext>) -> String {
    let title = escape_text(title);
    let mut doc = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<div class=\"answer\">{}</div>\n",
        message.render_html(job)
    );
    if !message.references.is_empty() {
        doc.push_str("<h2>References</h2>\n<ol class=\"references\">\n");
        for reference in &message.references {
            let label = escape_text(reference_label(reference));
            if reference.url.is_empty() {
                doc.push_str(&format!("<li>{label}</li>\n"));
            } else {
                doc.push_str(&format!(
                    "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{label}</a></li>\n",
                    escape_attr(&reference.url)
                ));
            }
        }
        doc.push_str("</ol>\n");
    }
    doc.push_str("</body>\n</html>\n");
    doc
}

fn reference_label(reference: &Reference) -> &str {
    if reference.title.is_empty() {
        &reference.url
    } else {
        &reference.title
    }
}
