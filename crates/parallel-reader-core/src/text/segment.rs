//! Rule-based sentence boundary detection.
//!
//! A boundary follows a run of terminators (plus any closing quotes or
//! brackets) when whitespace comes next. Full-width CJK terminators end a
//! sentence even without whitespace, and a line break always does. No
//! boundary is placed before a lowercase continuation ("Stop!" she said), nor
//! after a dot that closes a known abbreviation in the book's language.

use crate::config::Lang;

use super::{is_line_break, normalize_whitespace};

const ENGLISH_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "e.g", "i.e", "fig", "gen",
    "col", "capt", "lt", "sgt", "rev", "hon", "gov", "sen", "rep", "inc", "ltd", "co", "corp",
    "approx", "dept", "est",
];
const PORTUGUESE_ABBREVIATIONS: &[&str] = &[
    "sr", "sra", "srta", "dr", "dra", "prof", "profa", "sto", "sta", "av", "pág", "ex", "exa",
    "v.ex", "cia", "ltda",
];
const SPANISH_ABBREVIATIONS: &[&str] = &[
    "sr", "sra", "srta", "dr", "dra", "prof", "ud", "uds", "av", "pág", "dña", "d", "cía",
];
const FRENCH_ABBREVIATIONS: &[&str] = &["m", "mm", "mme", "mlle", "dr", "pr", "st", "ste", "av", "cf"];
const GERMAN_ABBREVIATIONS: &[&str] = &[
    "hr", "fr", "dr", "prof", "bzw", "z.b", "u.a", "ca", "nr", "str", "vgl", "evtl",
];
const ITALIAN_ABBREVIATIONS: &[&str] = &["sig", "sigg", "dott", "prof", "ing", "avv", "geom"];

fn abbreviations_for(lang: &Lang) -> &'static [&'static str] {
    match lang.primary().as_str() {
        "pt" => PORTUGUESE_ABBREVIATIONS,
        "es" => SPANISH_ABBREVIATIONS,
        "fr" => FRENCH_ABBREVIATIONS,
        "de" => GERMAN_ABBREVIATIONS,
        "it" => ITALIAN_ABBREVIATIONS,
        _ => ENGLISH_ABBREVIATIONS,
    }
}

/// Sentence-final punctuation that needs whitespace after it.
const fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…' | '‼' | '⁇' | '⁈' | '⁉' | '؟' | '।' | '॥') || is_full_width_terminator(c)
}

/// Ends a sentence even when text follows immediately.
const fn is_full_width_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '｡')
}

/// Dot-like terminators that may belong to an abbreviation or an ellipsis.
const fn is_dot(c: char) -> bool {
    matches!(c, '.' | '…')
}

const fn is_closer(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | ')' | ']' | '}' | '»' | '”' | '’' | '」' | '』' | '）' | '】'
    )
}

/// Split plain text into normalized, non-empty sentences.
pub fn split_sentences(text: &str, lang: &Lang) -> Vec<String> {
    let abbreviations = abbreviations_for(lang);
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut push = |raw: &str| {
        let sentence = normalize_whitespace(raw);
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
    };

    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];

        if is_line_break(c) {
            push(&text[start..pos]);
            start = pos + c.len_utf8();
            i += 1;
            continue;
        }

        if !is_terminator(c) {
            i += 1;
            continue;
        }

        let mut end_idx = i;
        while end_idx < chars.len() && is_terminator(chars[end_idx].1) {
            end_idx += 1;
        }
        let run_is_dots = chars[i..end_idx].iter().all(|&(_, c)| is_dot(c));
        let run_is_full_width = chars[i..end_idx].iter().any(|&(_, c)| is_full_width_terminator(c));
        while end_idx < chars.len() && is_closer(chars[end_idx].1) {
            end_idx += 1;
        }
        let end = chars.get(end_idx).map_or(text.len(), |&(p, _)| p);

        let boundary = match chars.get(end_idx) {
            None => true,
            Some(_) if run_is_full_width => true,
            Some(&(_, next)) if !next.is_whitespace() => false,
            Some(_) if continues_lowercase(&chars[end_idx..]) => false,
            Some(_) if run_is_dots => !is_abbreviation(&text[start..pos], abbreviations),
            Some(_) => true,
        };

        if boundary {
            push(&text[start..end]);
            start = end;
        }
        i = end_idx;
    }
    push(&text[start..]);

    sentences
}

/// Whether the next word on the same line starts with a lowercase letter.
fn continues_lowercase(rest: &[(usize, char)]) -> bool {
    rest.iter()
        .map(|&(_, c)| c)
        .find(|c| !c.is_whitespace() || is_line_break(*c))
        .is_some_and(char::is_lowercase)
}

/// Whether the word right before a dot run is a known abbreviation.
fn is_abbreviation(before: &str, abbreviations: &[&str]) -> bool {
    let word = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    !word.is_empty() && abbreviations.contains(&word.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        split_sentences(text, &Lang::new("en"))
    }

    #[test]
    fn test_basic_terminators() {
        assert_eq!(split("Hello! How are you?"), ["Hello!", "How are you?"]);
        assert_eq!(split("I am fine. Thanks."), ["I am fine.", "Thanks."]);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        assert_eq!(split("  One   two.\t Three\u{a0}four.  "), ["One two.", "Three four."]);
    }

    #[test]
    fn test_line_breaks_are_hard_boundaries() {
        assert_eq!(split("Chapter One\nIt was dark."), ["Chapter One", "It was dark."]);
    }

    #[test]
    fn test_closing_quotes_stay_with_sentence() {
        assert_eq!(
            split("\"Stop!\" she said. \"Why?\" He left."),
            ["\"Stop!\" she said.", "\"Why?\"", "He left."]
        );
    }

    #[test]
    fn test_numbers_and_initialisms_do_not_split() {
        assert_eq!(split("Pi is 3.14 or so. The U.S.A. is big."), ["Pi is 3.14 or so.", "The U.S.A. is big."]);
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        assert_eq!(
            split("Mr. Smith met Dr. Watson. They talked."),
            ["Mr. Smith met Dr. Watson.", "They talked."]
        );
    }

    #[test]
    fn test_abbreviations_follow_language() {
        let pt = Lang::new("pt-BR");
        assert_eq!(
            split_sentences("A Sra. Silva chegou. Ela sorriu.", &pt),
            ["A Sra. Silva chegou.", "Ela sorriu."]
        );
    }

    #[test]
    fn test_ellipsis_before_lowercase_continues() {
        assert_eq!(split("Wait... what was that? Nothing."), ["Wait... what was that?", "Nothing."]);
        assert_eq!(split("Wait… What?"), ["Wait…", "What?"]);
    }

    #[test]
    fn test_repeated_terminators_form_one_run() {
        assert_eq!(split("Really?! Yes."), ["Really?!", "Yes."]);
    }

    #[test]
    fn test_full_width_terminators() {
        assert_eq!(
            split_sentences("你好。今天天气很好！", &Lang::new("zh-CN")),
            ["你好。", "今天天气很好！"]
        );
    }

    #[test]
    fn test_text_without_terminator() {
        assert_eq!(split("no punctuation here"), ["no punctuation here"]);
        assert!(split("   \n  ").is_empty());
    }
}
