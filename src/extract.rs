//! Candidate URL extraction from listing pages

use crate::config::SourceConfig;
use regex::Regex;

/// Pulls raw candidate URLs out of page content
pub trait Extractor: Send + Sync {
    /// All matches in document order, duplicates included
    fn extract(&self, content: &str) -> Vec<String>;
}

/// Regex extractor returning one capture group per match
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    regex: Regex,
    group: usize,
}

impl RegexExtractor {
    pub fn new(pattern: &str, group: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            group,
        })
    }

    pub fn from_config(source: &SourceConfig) -> Result<Self, regex::Error> {
        Self::new(&source.pattern, source.capture_group)
    }
}

impl Extractor for RegexExtractor {
    fn extract(&self, content: &str) -> Vec<String> {
        self.regex
            .captures_iter(content)
            .filter_map(|caps| caps.get(self.group))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="item">
          <img class="progressive__img" src="http://h1.example.cn/bing/Aurora_1920x1080.jpg?imageslim">
          <img alt="x" src="http://h1.example.cn/bing/Fjord_1920x1080.jpg">
          <img data-src="lazy.jpg">
          <img src="">
        </div>
    "#;

    #[test]
    fn test_default_pattern_picks_src() {
        let extractor = RegexExtractor::from_config(&SourceConfig::default()).unwrap();
        let urls = extractor.extract(PAGE);

        assert_eq!(
            urls,
            vec![
                "http://h1.example.cn/bing/Aurora_1920x1080.jpg?imageslim",
                "http://h1.example.cn/bing/Fjord_1920x1080.jpg",
            ]
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let extractor = RegexExtractor::new(r#"href="([^"]+)""#, 1).unwrap();
        let urls = extractor.extract(r#"<a href="a"></a><a href="a"></a>"#);
        assert_eq!(urls, vec!["a", "a"]);
    }

    #[test]
    fn test_no_matches() {
        let extractor = RegexExtractor::from_config(&SourceConfig::default()).unwrap();
        assert!(extractor.extract("<html><body>nothing here</body></html>").is_empty());
    }
}
