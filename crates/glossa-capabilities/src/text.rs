use once_cell::sync::Lazy;
use regex::Regex;

static BR_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));
static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"));

/// Converts `<br>` markers and CR/CRLF endings to `\n`.
pub fn normalize_line_breaks(input: &str) -> String {
    let unified = input.replace("\r\n", "\n").replace('\r', "\n");
    BR_TAG.replace_all(&unified, "\n").into_owned()
}

/// Line-break normalization plus trailing whitespace removal, with runs of
/// blank lines collapsed to a single paragraph break.
pub fn tidy_paragraphs(input: &str) -> String {
    let normalized = normalize_line_breaks(input);
    let joined = normalized
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN.replace_all(joined.trim(), "\n\n").into_owned()
}

/// Line-break normalization with surrounding whitespace trimmed.
pub fn trimmed(input: &str) -> String {
    normalize_line_breaks(input).trim().to_owned()
}

/// English display name for common BCP 47 language tags; unknown tags are
/// returned unchanged.
pub fn language_name(tag: &str) -> String {
    let primary = tag.split(['-', '_']).next().unwrap_or(tag).to_ascii_lowercase();
    let name = match primary.as_str() {
        "ar" => "Arabic",
        "de" => "German",
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "hi" => "Hindi",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "nl" => "Dutch",
        "pl" => "Polish",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "tr" => "Turkish",
        "uk" => "Ukrainian",
        "vi" => "Vietnamese",
        "zh" => "Chinese",
        _ => return tag.to_owned(),
    };
    name.to_owned()
}
