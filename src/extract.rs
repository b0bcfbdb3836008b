use crate::level::Level;

/// Slice the section for `level` out of a multi-level answer.
///
/// The section runs from the level's marker up to the earliest later
/// occurrence of any other marker, or to the end of the text. Markers are
/// matched literally. When the level's marker is absent the whole text is
/// returned untouched.
pub fn extract_section(full_text: &str, level: Level) -> String {
    let marker = level.marker();
    let Some(start) = full_text.find(marker) else {
        tracing::debug!(level = %level, "section marker not found, keeping full response");
        return full_text.to_string();
    };

    let body_start = start + marker.len();
    let end = Level::ALL
        .iter()
        .filter(|other| **other != level)
        .filter_map(|other| {
            full_text
                .match_indices(other.marker())
                .map(|(idx, _)| idx)
                .find(|idx| *idx > start)
        })
        .min()
        .unwrap_or(full_text.len())
        .max(body_start);

    full_text[body_start..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_sections() -> String {
        format!(
            "{} Data is information.\n\n{} Data is a collection of observations.\n\n{} Data is a sample from a distribution.\n",
            Level::Beginner.marker(),
            Level::Intermediate.marker(),
            Level::Advanced.marker()
        )
    }

    #[test]
    fn returns_each_body_for_its_level() {
        let text = three_sections();
        assert_eq!(extract_section(&text, Level::Beginner), "Data is information.");
        assert_eq!(
            extract_section(&text, Level::Intermediate),
            "Data is a collection of observations."
        );
        assert_eq!(
            extract_section(&text, Level::Advanced),
            "Data is a sample from a distribution."
        );
    }

    #[test]
    fn missing_marker_returns_full_text() {
        let text = "  Overfitting is memorising noise.  ";
        for level in Level::ALL {
            assert_eq!(extract_section(text, level), text);
        }
    }

    #[test]
    fn only_requested_marker_present() {
        let text = "🚀 Advanced: Overfitting occurs when...";
        assert_eq!(extract_section(text, Level::Advanced), "Overfitting occurs when...");
        assert_eq!(extract_section(text, Level::Beginner), text);
    }

    #[test]
    fn earlier_markers_do_not_bound_the_section() {
        let text = format!(
            "{} late one\n{} first\n{} middle",
            Level::Advanced.marker(),
            Level::Beginner.marker(),
            Level::Intermediate.marker()
        );
        assert_eq!(extract_section(&text, Level::Intermediate), "middle");
        assert_eq!(extract_section(&text, Level::Beginner), "first");
        assert_eq!(extract_section(&text, Level::Advanced), "late one");
    }

    #[test]
    fn marker_match_is_literal() {
        let text = "🚀 advanced: lower case label";
        assert_eq!(extract_section(text, Level::Advanced), text);
        let spaced = "🚀  Advanced: extra space";
        assert_eq!(extract_section(spaced, Level::Advanced), spaced);
    }

    #[test]
    fn uses_first_occurrence_of_own_marker() {
        let text = format!(
            "{} one {} two {} three",
            Level::Beginner.marker(),
            Level::Beginner.marker(),
            Level::Intermediate.marker()
        );
        let expected = format!("one {} two", Level::Beginner.marker());
        assert_eq!(extract_section(&text, Level::Beginner), expected);
    }
}
