//! User-agent classification
//!
//! A lightweight rule-based classifier covering the agents that show up in
//! web access logs: desktop and mobile browsers, common HTTP client
//! libraries, and in-app agents. Anything it cannot place is reported as
//! [`UNKNOWN`] rather than as an error.

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

/// Label used for every component the classifier cannot recognise
pub const UNKNOWN: &str = "Unknown";

/// Longest user-agent string the classifier will look at
const MAX_PARSE_LEN: usize = 1_048_576;

/// Browser rules in priority order: the first token found wins.
/// Chromium derivatives must precede Chrome, and Chrome must precede Safari.
const BROWSER_RULES: &[(&str, &str)] = &[
    ("curl", "curl/"),
    ("Wget", "wget/"),
    ("okhttp", "okhttp/"),
    ("Go-http-client", "go-http-client/"),
    ("Opera", "opr/"),
    ("Opera", "opera/"),
    ("Edge", "edg/"),
    ("Edge", "edge/"),
    ("Edge", "edga/"),
    ("Edge", "edgios/"),
    ("UCBrowser", "ucbrowser/"),
    ("Firefox", "firefox/"),
    ("Firefox", "fxios/"),
    ("Chrome", "crios/"),
    ("Chrome", "chrome/"),
    ("Safari", "version/"),
];

/// Structured description of a user agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    pub browser: String,
    pub engine: String,
    pub engine_version: String,
    pub os: String,
    pub platform: String,
    pub mobile: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("no user agent present")]
    Missing,
    #[error("user agent longer than 1 MiB")]
    TooLong,
}

/// User-agent attribute used as the count key
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Category {
    #[default]
    Browser,
    Engine,
    EngineVersion,
    Os,
    Platform,
    Mobile,
}

impl UserAgent {
    /// The attribute selected by `category`, as a count key
    pub fn label(&self, category: Category) -> &str {
        match category {
            Category::Browser => &self.browser,
            Category::Engine => &self.engine,
            Category::EngineVersion => &self.engine_version,
            Category::Os => &self.os,
            Category::Platform => &self.platform,
            Category::Mobile => {
                if self.mobile {
                    "true"
                } else {
                    "false"
                }
            }
        }
    }
}

/// Classifier with its compiled rules. Built once per partition.
#[derive(Debug, Clone)]
pub struct UserAgentParser {
    engine_token: Regex,
}

impl UserAgentParser {
    pub fn new() -> Result<Self> {
        let engine_token =
            Regex::new(r"(?i)\b(trident|edge|presto|applewebkit|gecko)/([0-9][0-9a-z._]*)")
                .context("Failed to compile user-agent engine rules")?;
        Ok(Self { engine_token })
    }

    /// Classify a raw user-agent string
    pub fn parse(&self, raw: &str) -> std::result::Result<UserAgent, ClassifyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Err(ClassifyError::Missing);
        }
        if trimmed.len() > MAX_PARSE_LEN {
            return Err(ClassifyError::TooLong);
        }

        let ua_lower = trimmed.to_lowercase();
        let browser = detect_browser(trimmed, &ua_lower);
        let (engine, engine_version) = self.detect_engine(trimmed);
        let os = detect_os(&ua_lower);
        let platform = detect_platform(&ua_lower);
        let mobile = ua_lower.contains("mobile")
            || matches!(platform, "iPhone" | "iPad" | "Android");

        Ok(UserAgent {
            browser: browser.to_string(),
            engine,
            engine_version,
            os: os.to_string(),
            platform: platform.to_string(),
            mobile,
        })
    }

    fn detect_engine(&self, ua: &str) -> (String, String) {
        let mut best: Option<(usize, &str, &str)> = None;
        for caps in self.engine_token.captures_iter(ua) {
            let (Some(token), Some(version)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let (rank, name) = match token.as_str().to_lowercase().as_str() {
                "trident" => (0, "Trident"),
                "edge" => (1, "EdgeHTML"),
                "presto" => (2, "Presto"),
                "applewebkit" => (3, "Webkit"),
                _ => (4, "Gecko"),
            };
            if best.map_or(true, |(best_rank, _, _)| rank < best_rank) {
                best = Some((rank, name, version.as_str()));
            }
        }

        match best {
            Some((_, name, version)) => (name.to_string(), version.to_string()),
            None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        }
    }
}

fn detect_browser(ua: &str, ua_lower: &str) -> &'static str {
    for (family, token) in BROWSER_RULES {
        if extract_version_token(ua, ua_lower, token).is_none() {
            continue;
        }
        if *family == "Safari" && (!ua_lower.contains("safari/") || ua_lower.contains("chrome/"))
        {
            continue;
        }
        return family;
    }

    if ua_lower.contains("msie ") || (ua_lower.contains("trident/") && ua_lower.contains("rv:")) {
        "Internet Explorer"
    } else if ua_lower.contains("mozilla/") {
        "Mozilla"
    } else {
        UNKNOWN
    }
}

fn detect_os(ua_lower: &str) -> &'static str {
    if ua_lower.contains("windows phone") {
        "Windows Phone"
    } else if ua_lower.contains("windows") {
        "Windows"
    } else if ua_lower.contains("android") {
        "Android"
    } else if ua_lower.contains("iphone os") || ua_lower.contains("cpu os ") {
        "iOS"
    } else if ua_lower.contains("mac os x") {
        "macOS"
    } else if ua_lower.contains("cros ") {
        "Chrome OS"
    } else if ua_lower.contains("linux") {
        "Linux"
    } else {
        UNKNOWN
    }
}

fn detect_platform(ua_lower: &str) -> &'static str {
    if ua_lower.contains("ipad") {
        "iPad"
    } else if ua_lower.contains("iphone") {
        "iPhone"
    } else if ua_lower.contains("android") {
        "Android"
    } else if ua_lower.contains("windows") {
        "Windows"
    } else if ua_lower.contains("macintosh") || ua_lower.contains("mac os x") {
        "Mac"
    } else if ua_lower.contains("x11") || ua_lower.contains("linux") {
        "Linux"
    } else {
        UNKNOWN
    }
}

/// Version text that directly follows `token`, if any
fn extract_version_token(ua: &str, ua_lower: &str, token: &str) -> Option<String> {
    let start = ua_lower.find(token)? + token.len();
    // Offsets only carry over when lowercasing touched nothing but ASCII
    if ua_lower != ua.to_ascii_lowercase() || !ua.is_char_boundary(start) {
        return ua_lower[start..]
            .split(|ch: char| !is_version_char(ch))
            .next()
            .filter(|v| !v.is_empty())
            .map(str::to_string);
    }
    let end = ua[start..]
        .char_indices()
        .find(|(_, ch)| !is_version_char(*ch))
        .map_or(ua.len(), |(idx, _)| start + idx);
    if end == start {
        None
    } else {
        Some(ua[start..end].to_string())
    }
}

fn is_version_char(ch: char) -> bool {
    matches!(ch, '0'..='9' | 'A'..='Z' | 'a'..='z' | '.' | '_' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ua: &str) -> UserAgent {
        UserAgentParser::new().unwrap().parse(ua).unwrap()
    }

    #[test]
    fn test_desktop_chrome() {
        let agent = parse("Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/54.0.2840.71 Safari/537.36");
        assert_eq!(agent.browser, "Chrome");
        assert_eq!(agent.engine, "Webkit");
        assert_eq!(agent.engine_version, "537.36");
        assert_eq!(agent.os, "Windows");
        assert_eq!(agent.platform, "Windows");
        assert!(!agent.mobile);
    }

    #[test]
    fn test_firefox_uses_gecko() {
        let agent = parse(
            "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/118.0",
        );
        assert_eq!(agent.browser, "Firefox");
        assert_eq!(agent.engine, "Gecko");
        assert_eq!(agent.engine_version, "20100101");
        assert_eq!(agent.os, "Linux");
        assert_eq!(agent.platform, "Linux");
    }

    #[test]
    fn test_mobile_safari() {
        let agent = parse("Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1");
        assert_eq!(agent.browser, "Safari");
        assert_eq!(agent.os, "iOS");
        assert_eq!(agent.platform, "iPhone");
        assert!(agent.mobile);
    }

    #[test]
    fn test_edge_before_chrome() {
        let agent = parse("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91");
        assert_eq!(agent.browser, "Edge");
    }

    #[test]
    fn test_internet_explorer_trident() {
        let agent = parse("Mozilla/5.0 (Windows NT 6.1; WOW64; Trident/7.0; rv:11.0) like Gecko");
        assert_eq!(agent.browser, "Internet Explorer");
        assert_eq!(agent.engine, "Trident");
        assert_eq!(agent.engine_version, "7.0");
    }

    #[test]
    fn test_in_app_agent_is_unknown_browser_on_android() {
        let agent = parse("mukewang/5.0.0 (Android 5.1.1; Xiaomi Redmi 3 Build/LMY47V),Network 2G/3G");
        assert_eq!(agent.browser, UNKNOWN);
        assert_eq!(agent.engine, UNKNOWN);
        assert_eq!(agent.engine_version, UNKNOWN);
        assert_eq!(agent.os, "Android");
        assert_eq!(agent.platform, "Android");
        assert!(agent.mobile);
    }

    #[test]
    fn test_http_clients() {
        assert_eq!(parse("curl/8.1.0").browser, "curl");
        assert_eq!(parse("okhttp/3.12.1").browser, "okhttp");
        assert_eq!(parse("Go-http-client/1.1").browser, "Go-http-client");
    }

    #[test]
    fn test_garbage_is_unknown_not_error() {
        let agent = parse("\u{1F600}\u{0}::;;(((");
        assert_eq!(agent.browser, UNKNOWN);
        assert_eq!(agent.os, UNKNOWN);
        assert_eq!(agent.platform, UNKNOWN);
    }

    #[test]
    fn test_missing_agent_is_rejected() {
        let parser = UserAgentParser::new().unwrap();
        assert_eq!(parser.parse(""), Err(ClassifyError::Missing));
        assert_eq!(parser.parse("   "), Err(ClassifyError::Missing));
        assert_eq!(parser.parse("-"), Err(ClassifyError::Missing));
        let huge = "a".repeat(MAX_PARSE_LEN + 1);
        assert_eq!(parser.parse(&huge), Err(ClassifyError::TooLong));
    }

    #[test]
    fn test_label_per_category() {
        let agent = parse("curl/8.1.0");
        assert_eq!(agent.label(Category::Browser), "curl");
        assert_eq!(agent.label(Category::Os), UNKNOWN);
        assert_eq!(agent.label(Category::Mobile), "false");
    }

    #[test]
    fn test_non_ascii_lowercase_does_not_panic() {
        // 'İ' lowercases to two chars, shifting byte offsets
        let agent = parse("İİİ Chrome/99.0 Safari/537.36");
        assert_eq!(agent.browser, "Chrome");
    }

    #[test]
    fn test_version_survives_length_preserving_lowercase() {
        // 'İ' grows by one byte and 'Ω' shrinks by one, so the total length
        // is unchanged while the offsets in between are shifted
        let ua = "İ Firefox/49.0 Ω";
        let ua_lower = ua.to_lowercase();
        assert_eq!(ua.len(), ua_lower.len());
        assert_eq!(
            extract_version_token(ua, &ua_lower, "firefox/").as_deref(),
            Some("49.0")
        );
        assert_eq!(parse(ua).browser, "Firefox");
    }
}
