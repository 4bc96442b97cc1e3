//! Glob patterns over object urls.
//!
//! Supported syntax:
//!
//! - `?` matches one character other than `/`
//! - `*` matches any run of characters other than `/`
//! - `**` matches any run of characters, including `/`; `**/` also matches
//!   no directory at all

/// A compiled glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    chars: Vec<char>,
}

impl Pattern {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            chars: pattern.chars().collect(),
        }
    }

    /// The pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern matches every url.
    pub fn matches_all(&self) -> bool {
        self.source == "**"
    }

    /// Test a url against the pattern.
    pub fn matches(&self, url: &str) -> bool {
        if self.matches_all() {
            return true;
        }
        let text: Vec<char> = url.chars().collect();
        match_from(&self.chars, &text)
    }
}

fn match_from(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') if pattern.get(1) == Some(&'*') => {
            let rest = &pattern[2..];
            if rest.first() == Some(&'/') && match_from(&rest[1..], text) {
                return true;
            }
            (0..=text.len()).any(|skip| match_from(rest, &text[skip..]))
        }
        Some('*') => {
            let rest = &pattern[1..];
            for skip in 0..=text.len() {
                if match_from(rest, &text[skip..]) {
                    return true;
                }
                if text.get(skip) == Some(&'/') {
                    break;
                }
            }
            false
        }
        Some('?') => match text.first() {
            Some(c) if *c != '/' => match_from(&pattern[1..], &text[1..]),
            _ => false,
        },
        Some(c) => text.first() == Some(c) && match_from(&pattern[1..], &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal() {
        let p = Pattern::new("textures/logo.png");
        assert!(p.matches("textures/logo.png"));
        assert!(!p.matches("textures/logo.pn"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let p = Pattern::new("textures/*.png");
        assert!(p.matches("textures/logo.png"));
        assert!(!p.matches("textures/ui/logo.png"));
        assert!(!p.matches("models/logo.png"));
    }

    #[test]
    fn test_double_star() {
        let p = Pattern::new("**/*.png");
        assert!(p.matches("logo.png"));
        assert!(p.matches("textures/ui/logo.png"));
        assert!(!p.matches("textures/ui/logo.dds"));

        let p = Pattern::new("textures/**/icon?.png");
        assert!(p.matches("textures/icon1.png"));
        assert!(p.matches("textures/a/b/icon2.png"));
        assert!(!p.matches("textures/a/icon10.png"));

        assert!(Pattern::new("**").matches("anything/at/all"));
    }

    #[test]
    fn test_question_mark_excludes_separator() {
        let p = Pattern::new("a?b");
        assert!(p.matches("axb"));
        assert!(!p.matches("a/b"));
    }
}
