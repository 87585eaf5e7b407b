//! Header summaries: the most recent messages of a folder, or the ones matching a search.

use log::debug;

use crate::conn::MailSession;
use crate::error::Result;
use crate::parse::{normalize_date, parse_header_block};
use crate::session::OpenFolder;
use crate::types::{Header, MessageId, Section, Seq, SequenceSet};
use crate::utils::quote;

/// The sequence numbers of the `count` most recent messages out of `total`, or `None` when there
/// is nothing to fetch.
pub fn recent_window(total: u32, count: u32) -> Option<SequenceSet> {
    if total == 0 || count == 0 {
        return None;
    }
    let from = total.saturating_sub(count).saturating_add(1).max(1);
    Some(SequenceSet::Range(from, total))
}

/// `SEARCH` criteria matching `query` in either the `To` or the `From` field.
pub fn search_criteria(query: &str) -> Result<String> {
    let quoted = quote(query)?;
    Ok(format!("OR TO {} FROM {}", quoted, quoted))
}

/// Build the summary of message `seq` from its header block.
///
/// This never fails: whatever cannot be parsed is described in [`Header::problem`] and the
/// affected fields are left as recovered.
pub fn header_record(seq: Seq, block: &[u8]) -> Header {
    let (fields, problem) = parse_header_block(block);
    let from = fields.first("from").unwrap_or_default();
    let to = fields.first("to").unwrap_or_default();
    let subject = fields.first("subject").unwrap_or_default();
    let raw_date = fields.first("date").unwrap_or_default();

    let id = MessageId::derive(subject, from, to, raw_date);
    let mut problem = problem.map(|p| p.to_string());
    let date = if raw_date.is_empty() {
        String::new()
    } else {
        normalize_date(raw_date).unwrap_or_else(|e| {
            problem.get_or_insert_with(|| e.to_string());
            raw_date.to_string()
        })
    };

    Header {
        seq,
        id,
        from: from.to_string(),
        to: to.to_string(),
        subject: subject.to_string(),
        date,
        problem,
    }
}

// Fetch the summary fields of `set`, newest first. Responses for messages outside the set are
// unsolicited and dropped.
fn fetch_headers<S: MailSession>(
    folder: &mut OpenFolder<'_, S>,
    set: &SequenceSet,
) -> Result<Vec<Header>> {
    let parts = folder.fetch(set, Section::SummaryHeaders)?;
    let mut headers: Vec<Header> = parts
        .into_iter()
        .filter(|part| set.contains(part.seq))
        .map(|part| header_record(part.seq, &part.data))
        .collect();
    headers.sort_unstable_by(|a, b| b.seq.cmp(&a.seq));
    headers.dedup_by_key(|h| h.seq);

    let unclean = headers.iter().filter(|h| !h.is_clean()).count();
    if unclean > 0 {
        debug!("{}: {} of {} headers could not be fully parsed", folder.name(), unclean, headers.len());
    }
    Ok(headers)
}

/// The headers of the `count` most recent messages in the open folder, newest first.
pub fn fetch_recent<S: MailSession>(
    folder: &mut OpenFolder<'_, S>,
    count: u32,
) -> Result<Vec<Header>> {
    match recent_window(folder.exists(), count) {
        Some(window) => fetch_headers(folder, &window),
        None => Ok(Vec::new()),
    }
}

/// The headers of every message whose `To` or `From` contains `query`, newest first.
pub fn search<S: MailSession>(folder: &mut OpenFolder<'_, S>, query: &str) -> Result<Vec<Header>> {
    let criteria = search_criteria(query)?;
    if folder.exists() == 0 {
        return Ok(Vec::new());
    }
    let found = folder.search(&criteria)?;
    debug!("{}: {} messages match {:?}", folder.name(), found.len(), query);
    if found.is_empty() {
        return Ok(Vec::new());
    }
    fetch_headers(folder, &SequenceSet::List(found))
}
