//! Field delimiter detection over a prefix of the upload.

/// How much of the stream is inspected.
pub const SNIFF_SAMPLE_BYTES: usize = 1024;

/// Separators considered, in tie-break order.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Infers the separator from `sample`.
///
/// A candidate qualifies when it occurs the same non-zero number of times
/// (outside double quotes) on every sampled line; the qualifying candidate
/// with the highest count wins. Returns `None` when nothing qualifies, which
/// the caller treats as a single-column table.
pub fn sniff_delimiter(sample: &[u8]) -> Option<u8> {
    let text = String::from_utf8_lossy(sample);
    let mut lines: Vec<&str> = text.split('\n').collect();
    // A full sample most likely ends mid-line.
    if sample.len() >= SNIFF_SAMPLE_BYTES && lines.len() > 1 {
        lines.pop();
    }
    let lines: Vec<&str> = lines
        .into_iter()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let mut best: Option<(u8, usize)> = None;
    for candidate in CANDIDATE_DELIMITERS {
        let mut counts = lines.iter().map(|line| count_unquoted(line, candidate));
        let Some(first) = counts.next() else {
            continue;
        };
        if first == 0 || !counts.all(|count| count == first) {
            continue;
        }
        if best.is_none_or(|(_, count)| first > count) {
            best = Some((candidate, first));
        }
    }
    best.map(|(delimiter, _)| delimiter)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}
