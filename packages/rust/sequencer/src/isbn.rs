//! ISBN recognition.
//!
//! Two strictness levels:
//!
//! - [`strict_isbn10`]: the whole candidate, with hyphens and spaces removed,
//!   must be a checksum-valid ISBN-10.
//! - [`scan_line`]: OCR-tolerant search. Common OCR confusions are mapped back
//!   to digits, then every run of digits/`X` (hyphens allowed between them) is
//!   searched for checksum-valid ISBNs: a 13-digit run as a whole, embedded
//!   `978`/`979` ISBN-13s in longer runs, then ISBN-10 windows in the rest.

use std::sync::LazyLock;

use regex::Regex;

static RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9X](?:-?[0-9X])*").expect("valid regex"));

/// Checksum test for a normalized 10-character ISBN (`X` only as check digit).
pub fn is_valid_isbn10(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 10 || !bytes[..9].iter().all(u8::is_ascii_digit) {
        return false;
    }
    let check = match bytes[9] {
        b'X' => 10,
        b @ b'0'..=b'9' => u32::from(b - b'0'),
        _ => return false,
    };
    let sum: u32 = bytes[..9]
        .iter()
        .enumerate()
        .map(|(i, b)| (i as u32 + 1) * u32::from(b - b'0'))
        .sum();
    sum % 11 == check
}

/// Checksum test for a normalized 13-digit ISBN.
pub fn is_valid_isbn13(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let sum: u32 = bytes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 { digit } else { digit * 3 }
        })
        .sum();
    sum % 10 == 0
}

/// Strict ISBN-10 recognition of a single candidate token.
///
/// Returns the normalized ISBN (digits, upper-case `X`) when valid.
pub fn strict_isbn10(candidate: &str) -> Option<String> {
    let normalized: String = candidate
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    is_valid_isbn10(&normalized).then_some(normalized)
}

/// Map characters OCR commonly confuses with ISBN digits back to digits.
pub fn ocr_correct(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'I' | 'l' => '1',
            'O' | 'D' => '0',
            'A' => '8',
            'S' => '5',
            '/' | '\\' | 'x' => 'X',
            other => other,
        })
        .collect()
}

/// OCR-tolerant scan of one line of text. Results keep first-seen order
/// and contain no duplicates.
pub fn scan_line(line: &str) -> Vec<String> {
    let mut found = Vec::new();
    collect_line(line, &mut found);
    found
}

/// Scan several lines, deduplicating across all of them.
pub fn scan_lines<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut found = Vec::new();
    for line in lines {
        collect_line(line.as_ref(), &mut found);
    }
    found
}

fn collect_line(line: &str, found: &mut Vec<String>) {
    let corrected = ocr_correct(line);
    for run in RUN_RE.find_iter(&corrected) {
        let digits: String = run.as_str().chars().filter(|c| *c != '-').collect();
        for isbn in candidates(&digits) {
            if !found.contains(&isbn) {
                found.push(isbn);
            }
        }
    }
}

fn candidates(run: &str) -> Vec<String> {
    let len = run.len();
    if len < 10 {
        return Vec::new();
    }
    let mut covered = vec![false; len];
    let mut found = Vec::new();

    // ISBN-13s first: the whole run, or an embedded 978/979 prefix.
    let mut start = 0;
    while start + 13 <= len {
        let window = &run[start..start + 13];
        let prefixed = window.starts_with("978") || window.starts_with("979");
        if (len == 13 || prefixed) && is_valid_isbn13(window) {
            covered[start..start + 13].fill(true);
            found.push((start, window.to_string()));
            start += 13;
        } else {
            start += 1;
        }
    }

    // Then ISBN-10s in whatever the ISBN-13s left over.
    let mut start = 0;
    while start + 10 <= len {
        let window = &run[start..start + 10];
        if !covered[start..start + 10].contains(&true) && is_valid_isbn10(window) {
            covered[start..start + 10].fill(true);
            found.push((start, window.to_string()));
            start += 10;
        } else {
            start += 1;
        }
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, isbn)| isbn).collect()
}
