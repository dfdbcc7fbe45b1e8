//! Separator and enclosing character inference from a content sample.

/// Separators tried by auto-detection, in tie-break order.
pub const SEPARATOR_CANDIDATES: [char; 3] = [',', '\t', ';'];

/// Separator used when the sample gives no evidence.
pub const DEFAULT_SEPARATOR: char = ',';

/// Enclosing character recognized by auto-detection.
pub const DEFAULT_ENCLOSING: char = '"';

/// Lines of the sample that are inspected.
pub const MAX_SAMPLE_LINES: usize = 10;

const LF: u32 = 0x0A;
const CR: u32 = 0x0D;

type Counts = [usize; SEPARATOR_CANDIDATES.len()];

/// Picks the most plausible separator for `sample`.
///
/// Candidates are counted per line outside enclosed fields. A candidate
/// with the same non-zero count on every sampled line wins over one with
/// varying counts; among equals the higher count wins, then the earlier
/// candidate. `complete` tells whether the sample holds the whole input, in
/// which case a last line without terminator is inspected too.
///
/// # Examples
/// ```
/// use csvtable::sheet::text::detect::detect_separator;
///
/// let sample: Vec<u32> = "a;b;c\n1;2;3".chars().map(u32::from).collect();
/// assert_eq!(detect_separator(&sample, Some('"'), true), ';');
/// ```
pub fn detect_separator(sample: &[u32], enclosing: Option<char>, complete: bool) -> char {
    let lines = count_candidates(sample, enclosing.map(u32::from), complete);
    let Some(first) = lines.first() else {
        return DEFAULT_SEPARATOR;
    };

    let mut best: Option<((bool, usize), char)> = None;
    for (k, candidate) in SEPARATOR_CANDIDATES.iter().enumerate() {
        let total: usize = lines.iter().map(|counts| counts[k]).sum();
        if total == 0 {
            continue;
        }
        let consistent = lines.iter().all(|counts| counts[k] == first[k]);
        let score = (consistent, if consistent { first[k] } else { total });
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, *candidate));
        }
    }
    best.map_or(DEFAULT_SEPARATOR, |(_, c)| c)
}

/// Per-line candidate counts of the first non-empty lines.
///
/// Quotes follow the tokenizer: an enclosing character opens a quoted field
/// only as the first code point of a field, where any candidate counts as a
/// field boundary. A doubled enclosing character inside quotes is literal.
fn count_candidates(sample: &[u32], enclosing: Option<u32>, complete: bool) -> Vec<Counts> {
    let mut lines = Vec::new();
    let mut counts = Counts::default();
    let mut line_len = 0usize;
    let mut in_quotes = false;
    let mut at_field_start = true;

    let mut cps = sample.iter().copied().peekable();
    while let Some(cp) = cps.next() {
        if lines.len() == MAX_SAMPLE_LINES {
            return lines;
        }
        line_len += 1;
        if in_quotes {
            if Some(cp) == enclosing && cps.next_if_eq(&cp).is_none() {
                in_quotes = false;
            }
            continue;
        }
        if at_field_start && Some(cp) == enclosing {
            in_quotes = true;
            at_field_start = false;
        } else if cp == LF || cp == CR {
            if cp == CR {
                cps.next_if_eq(&LF);
            }
            if line_len > 1 {
                lines.push(counts);
            }
            counts = Counts::default();
            line_len = 0;
            at_field_start = true;
        } else if let Some(k) = SEPARATOR_CANDIDATES.iter().position(|c| u32::from(*c) == cp) {
            counts[k] += 1;
            at_field_start = true;
        } else {
            at_field_start = false;
        }
    }

    if complete && line_len > 0 && lines.len() < MAX_SAMPLE_LINES {
        lines.push(counts);
    }
    lines
}

/// Returns `"` if any field of the sample starts with it.
pub fn detect_enclosing(sample: &[u32], separator: char) -> Option<char> {
    let separator = u32::from(separator);
    let quote = u32::from(DEFAULT_ENCLOSING);
    let mut at_field_start = true;
    for &cp in sample {
        if at_field_start && cp == quote {
            return Some(DEFAULT_ENCLOSING);
        }
        at_field_start = cp == separator || cp == LF || cp == CR;
    }
    None
}
