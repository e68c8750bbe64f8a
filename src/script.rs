use serde::{Deserialize, Serialize};

/// One scene of the promo: a headline plus an optional supporting line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Parse a script into scenes, one scene per non-empty line.
///
/// Each line splits on the first `|` into a trimmed title and a trimmed
/// body; lines without `|` are title-only. Scene order equals source line
/// order. There are no error cases: malformed lines degrade (a `|body`
/// line keeps an empty title and simply renders blank).
pub fn parse_script(text: &str) -> Vec<Scene> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('|') {
            Some((title, body)) => Scene {
                title: title.trim().to_owned(),
                body: Some(body.trim().to_owned()),
            },
            None => Scene {
                title: line.to_owned(),
                body: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_count_equals_non_empty_lines() {
        let script = "First\n\n   \nSecond|with body\n\t\nThird\n";
        let scenes = parse_script(script);
        assert_eq!(scenes.len(), 3);
    }

    #[test]
    fn splits_on_first_delimiter_only() {
        let scenes = parse_script("Launch day | fast | cheap");
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].title, "Launch day");
        assert_eq!(scenes[0].body.as_deref(), Some("fast | cheap"));
    }

    #[test]
    fn line_without_delimiter_is_title_only() {
        let scenes = parse_script("Just a headline");
        assert_eq!(scenes[0].title, "Just a headline");
        assert_eq!(scenes[0].body, None);
    }

    #[test]
    fn segments_are_trimmed() {
        let scenes = parse_script("  Padded title  |  padded body  ");
        assert_eq!(scenes[0].title, "Padded title");
        assert_eq!(scenes[0].body.as_deref(), Some("padded body"));
    }

    #[test]
    fn leading_delimiter_keeps_empty_title() {
        let scenes = parse_script("|only body");
        assert_eq!(scenes[0].title, "");
        assert_eq!(scenes[0].body.as_deref(), Some("only body"));
    }

    #[test]
    fn order_matches_source_lines() {
        let scenes = parse_script("A|one\nB|two\nC");
        let titles: Vec<&str> = scenes.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn empty_and_blank_scripts_yield_no_scenes() {
        assert!(parse_script("").is_empty());
        assert!(parse_script("\n  \n\t\n").is_empty());
    }
}
