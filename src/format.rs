//! Abstract reflow: one sentence per line.
//!
//! Feed abstracts arrive hard-wrapped at arbitrary columns.  [`format_text`]
//! joins them back into one paragraph and then breaks after every `.`, `!`
//! or `?` that is followed by whitespace.  This is a heuristic, not sentence
//! detection: the only abbreviations it knows about are `Fig.` and `et al.`.

/// Break inserted at sentence ends.
const BREAK: &str = "\n";

/// Reflow `text` into sentence-per-line form.
pub fn format_text(text: &str) -> String {
    let mut out = text.replace('\r', "").replace('\n', " ").replace("  ", " ");

    for mark in ['.', '!', '?'] {
        for ws in [' ', '\n', '\t'] {
            out = out.replace(&format!("{mark}{ws}"), &format!("{mark}{BREAK}"));
        }
    }

    out.replace(&format!("Fig.{BREAK}"), "Fig. ")
        .replace(&format!("et al.{BREAK}"), "et al. ")
        .replace(&format!("et al,.{BREAK}"), "et al. ")
        .replace("<p>", "")
        .replace("</p>", "")
}
