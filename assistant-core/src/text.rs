//! Small text transforms applied to queries, answers and file names.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

const QUESTION_WORDS: &[&str] = &[
    "how", "what", "who", "where", "when", "why", "which", "whose", "whom", "can you", "what's",
    "where's", "how's",
];

/// Trim every line and drop the empty ones.
pub fn answer_modifier(answer: &str) -> String {
    answer
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize a recognized or typed query: lowercase, terminal `?` for
/// questions and `.` otherwise, first letter capitalized.
pub fn query_modifier(query: &str) -> String {
    let mut q = query.trim().to_lowercase();
    if q.is_empty() {
        return q;
    }

    let is_question = QUESTION_WORDS
        .iter()
        .any(|w| q.contains(&format!("{} ", w)));

    if q.ends_with(['.', '?', '!']) {
        q.pop();
    }
    q.push(if is_question { '?' } else { '.' });

    capitalize(&q)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Date and time block handed to the models so they can answer "what day is it".
pub fn realtime_information<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Please use this real-time information if needed,\n\
         Day: {}\n\
         Date: {:02}\n\
         Month: {}\n\
         Year: {}\n\
         Time: {:02} hours: {:02} minutes: {:02} seconds.\n",
        now.format("%A"),
        now.day(),
        now.format("%B"),
        now.year(),
        now.hour(),
        now.minute(),
        now.second(),
    )
}

/// File stem for generated images: alphanumerics kept, everything else `_`.
pub fn sanitize_filename(prompt: &str) -> String {
    let mapped: String = prompt
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let cleaned = mapped.replace("__", "_");
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "generated_image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name for AI-written content: `"Leave Letter"` -> `leave_letter.txt`.
///
/// Only alphanumerics and `-` survive, so the name never contains a path
/// separator or a `.`/`..` component.
pub fn content_filename(topic: &str) -> String {
    let mapped: String = topic
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = mapped.trim_matches('_');
    let stem = if stem.is_empty() { "content" } else { stem };
    format!("{}.txt", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_answer_modifier_drops_blank_lines() {
        assert_eq!(answer_modifier("  a \n\n   \n b\n"), "a\nb");
        assert_eq!(answer_modifier(""), "");
    }

    #[test]
    fn test_query_modifier_questions() {
        assert_eq!(query_modifier("what is the time"), "What is the time?");
        assert_eq!(query_modifier("How are you."), "How are you?");
        assert_eq!(query_modifier("can you open chrome"), "Can you open chrome?");
    }

    #[test]
    fn test_query_modifier_statements() {
        assert_eq!(query_modifier("open chrome"), "Open chrome.");
        assert_eq!(query_modifier("Play despacito!"), "Play despacito.");
        assert_eq!(query_modifier("   "), "");
    }

    #[test]
    fn test_question_word_needs_following_space() {
        // "what" at the very end has no trailing space.
        assert_eq!(query_modifier("tell me what"), "Tell me what.");
    }

    #[test]
    fn test_realtime_information_fields() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let info = realtime_information(&now);
        assert!(info.contains("Day: Tuesday"));
        assert!(info.contains("Date: 05"));
        assert!(info.contains("Month: March"));
        assert!(info.contains("Year: 2024"));
        assert!(info.contains("Time: 07 hours: 08 minutes: 09 seconds."));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a cat, on mars"), "a_cat_on_mars");
        assert_eq!(sanitize_filename("!!!"), "generated_image");
        assert_eq!(sanitize_filename("iron man"), "iron_man");
    }

    #[test]
    fn test_content_filename() {
        assert_eq!(content_filename("Leave Letter"), "leave_letter.txt");
        assert_eq!(content_filename(""), "content.txt");
        assert_eq!(content_filename("cover-letter"), "cover-letter.txt");
    }

    #[test]
    fn test_content_filename_stays_a_plain_name() {
        assert_eq!(content_filename("/tmp/outside/escaped"), "tmp_outside_escaped.txt");
        assert_eq!(content_filename("../sibling"), "sibling.txt");
        assert_eq!(content_filename(".."), "content.txt");
        assert_eq!(content_filename("a\\b"), "a_b.txt");
    }
}
