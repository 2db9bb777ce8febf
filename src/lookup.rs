//! Registry lookup collaborator
//!
//! `Lookup` is the seam between the resolver/monitor and the certification
//! registry: a query returns an ordered list of candidate records, an empty
//! list is a valid answer, and only transport failure is an error. The real
//! implementation posts the registry's search form and extracts the result
//! table; tests substitute an in-memory implementation.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::model::Record;
use crate::types::{CertwatchError, Result};

/// Marker the registry renders instead of a table when nothing matched
const NO_RESULT_MARKER: &str = "검색된 건이 없습니다.";

#[async_trait]
pub trait Lookup: Send + Sync {
    /// Query candidate records for a model name
    ///
    /// Must not fail on "no results"; that is `Ok(vec![])`. `Err` means the
    /// registry could not be reached or answered abnormally.
    async fn lookup(&self, query: &str) -> Result<Vec<Record>>;
}

/// Lookup against the Crefia terminal-certification registry
pub struct HttpLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpLookup {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CertwatchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Lookup for HttpLookup {
    async fn lookup(&self, query: &str) -> Result<Vec<Record>> {
        let response = self
            .client
            .post(&self.url)
            .form(&[
                ("searchKey", "03"),
                ("searchValue", query),
                ("currentPage", "1"),
            ])
            .send()
            .await
            .map_err(|e| CertwatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CertwatchError::Transport(format!(
                "registry answered {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CertwatchError::Transport(e.to_string()))?;

        let records = parse_results(&body);
        debug!(query, count = records.len(), "Registry lookup completed");
        Ok(records)
    }
}

/// Extract records from the registry's result page
///
/// Registry columns: cert number (2), identifier (3), model name (5),
/// certification and expiry dates together in column 6. Rows with fewer than
/// eight cells are header or filler rows and are skipped.
pub fn parse_results(html: &str) -> Vec<Record> {
    if html.contains(NO_RESULT_MARKER) {
        return Vec::new();
    }

    let body = match section(html, "<tbody", "</tbody>") {
        Some(b) => b,
        None => return Vec::new(),
    };

    let mut records = Vec::new();
    for row in sections(body, "<tr", "</tr>") {
        let cells: Vec<String> = sections(row, "<td", "</td>")
            .into_iter()
            .map(cell_text)
            .collect();
        if cells.len() < 8 {
            continue;
        }

        let first_token = |s: &str| s.split_whitespace().next().unwrap_or("").to_string();
        let mut dates = cells[6].split_whitespace();
        let certified_date = dates.next().unwrap_or("").to_string();
        let expiry_date = dates.next().unwrap_or("").to_string();

        records.push(Record {
            name: first_token(&cells[5]),
            cert_number: cells[2].trim().to_string(),
            identifier: first_token(&cells[3]),
            certified_date,
            expiry_date,
        });
    }
    records
}

/// Slice of `input` between the first `open` tag and the following `close`
fn section<'a>(input: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = input.find(open)?;
    let after_open = input[start..].find('>')? + start + 1;
    let end = input[after_open..].find(close)? + after_open;
    Some(&input[after_open..end])
}

/// All slices of `input` between successive `open`/`close` tag pairs
fn sections<'a>(mut input: &'a str, open: &str, close: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    while let Some(inner) = section(input, open, close) {
        out.push(inner);
        let consumed = inner.as_ptr() as usize - input.as_ptr() as usize + inner.len();
        input = &input[consumed..];
    }
    out
}

/// Strip markup from a table cell, decode entities and collapse whitespace
fn cell_text(cell: &str) -> String {
    let mut text = String::with_capacity(cell.len());
    let mut in_tag = false;
    for c in cell.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode the standard HTML entities; a stray `&` passes through unchanged
fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let end = match rest.find(';') {
            Some(end) if end <= 8 => end,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };

        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse::<u32>().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULT_PAGE: &str = r#"
        <table>
          <tbody>
            <tr>
              <td>1</td><td>vendor</td><td>KSEL-2024-0001</td>
              <td>ID-100 extra</td><td>type</td>
              <td>KTC-K501 note</td>
              <td>2024-01-15 2027-01-14</td><td>status</td>
            </tr>
            <tr>
              <td>2</td><td>vendor</td><td>KSEL-2024-0002</td>
              <td>ID-200</td><td>type</td>
              <td>KTC-K502</td>
              <td>2024-02-01</td><td>status</td>
            </tr>
          </tbody>
        </table>
    "#;

    #[test]
    fn parses_result_rows() {
        let records = parse_results(RESULT_PAGE);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].name, "KTC-K501");
        assert_eq!(records[0].cert_number, "KSEL-2024-0001");
        assert_eq!(records[0].identifier, "ID-100");
        assert_eq!(records[0].certified_date, "2024-01-15");
        assert_eq!(records[0].expiry_date, "2027-01-14");

        // Second row has no expiry date yet
        assert_eq!(records[1].expiry_date, "");
    }

    #[test]
    fn no_result_marker_yields_empty() {
        let page = format!("<html><body>{NO_RESULT_MARKER}</body></html>");
        assert!(parse_results(&page).is_empty());
    }

    #[test]
    fn entity_encoded_name_matches_its_plain_form() {
        let page = "<tbody><tr>\
            <td>1</td><td>vendor &amp; co</td><td>KSEL-2024-0003</td>\
            <td>ID-300</td><td>type</td>\
            <td>A&amp;B-100</td>\
            <td>2024-03-01 2027-02-28</td><td>status</td>\
            </tr></tbody>";

        let records = parse_results(page);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "A&B-100");
    }

    #[test]
    fn cell_text_decodes_entities_and_keeps_stray_ampersands() {
        assert_eq!(cell_text("A&amp;B"), "A&B");
        assert_eq!(cell_text("&lt;x&gt; &quot;q&quot;"), "<x> \"q\"");
        assert_eq!(cell_text("&#65;&#x42;"), "AB");
        assert_eq!(cell_text("a&nbsp;b"), "a b");
        assert_eq!(cell_text("R&D dept"), "R&D dept");
        assert_eq!(cell_text("&bogus; &"), "&bogus; &");
    }

    #[test]
    fn short_rows_are_skipped() {
        let page = "<tbody><tr><td>only</td><td>four</td><td>cells</td><td>here</td></tr></tbody>";
        assert!(parse_results(page).is_empty());
    }

    #[tokio::test]
    async fn http_lookup_posts_search_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("searchValue=KTC-K501"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULT_PAGE))
            .mount(&server)
            .await;

        let lookup = HttpLookup::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let records = lookup.lookup("KTC-K501").await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn http_lookup_maps_server_error_to_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let lookup = HttpLookup::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = lookup.lookup("KTC-K501").await.unwrap_err();
        assert!(matches!(err, CertwatchError::Transport(_)));
    }
}
