//! Results document written by the analysis tool

use plugci_errors::Error;
use plugci_types::{LintCode, LintFinding};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::exit::strip_prefix_all;

#[derive(Debug, Deserialize)]
struct ResultsDocument {
    // Required; absent or null means the tool did not finish writing
    #[serde(default)]
    totals: Option<serde_json::Value>,
    #[serde(default)]
    files: BTreeMap<String, FileMessages>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileMessages {
    Wrapped { messages: Vec<Message> },
    Bare(Vec<Message>),
}

impl FileMessages {
    fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Wrapped { messages } | Self::Bare(messages) => messages,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    line: Option<u32>,
    message: String,
}

/// Parse a results document into lint findings for `api`
///
/// Files are reported in path order, messages in document order.
///
/// # Errors
///
/// Returns an error when the document is not valid JSON or its `totals`
/// is missing or null.
pub fn parse_results(bytes: &[u8], api: &str, source_prefix: &str) -> Result<Vec<LintFinding>, Error> {
    let document: ResultsDocument = serde_json::from_slice(bytes)?;
    if document.totals.is_none() {
        return Err(Error::Internal("results document has no totals".to_string()));
    }
    let findings = document
        .files
        .into_iter()
        .flat_map(|(file, messages)| {
            let file = strip_prefix_all(&file, source_prefix);
            messages.into_messages().into_iter().map(move |m| {
                LintFinding::new(LintCode::StaticAnalysis, m.message)
                    .with_file(file.clone())
                    .with_line(m.line)
                    .with_target(api)
            })
        })
        .collect();
    Ok(findings)
}
