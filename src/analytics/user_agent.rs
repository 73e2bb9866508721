//! User-agent classification into platform and browser+version.

use serde::Serialize;
use woothee::parser::Parser;

const UNKNOWN: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedAgent {
    /// Operating-system family, or `"UNKNOWN"`.
    pub platform: String,
    /// `{browser-family}-{major.minor.patch}`; version components that are
    /// absent are simply not emitted.
    pub browser: String,
}

/// Classify a raw user-agent string. Unparseable input yields the
/// `UNKNOWN` platform and an `UNKNOWN-` browser rather than an error.
pub fn classify(user_agent: &str) -> ClassifiedAgent {
    let parser = Parser::new();
    let result = parser.parse(user_agent).unwrap_or_default();

    let platform = if result.os.is_empty() || result.os == UNKNOWN {
        UNKNOWN.to_string()
    } else {
        result.os.to_string()
    };

    let name = if result.name.is_empty() {
        UNKNOWN
    } else {
        result.name
    };

    ClassifiedAgent {
        platform,
        browser: format!("{}-{}", name, trim_version(&result.version)),
    }
}

/// Keep at most major.minor.patch of a dotted version string; an unknown
/// version collapses to the empty string.
fn trim_version(raw: &str) -> String {
    if raw.is_empty() || raw == UNKNOWN {
        return String::new();
    }
    raw.split('.').take(3).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

    #[test]
    fn classifies_chrome_on_windows() {
        let agent = classify(CHROME_UA);
        assert_eq!(agent.browser, "Chrome-91.0.4472");
        assert_ne!(agent.platform, UNKNOWN);
    }

    #[test]
    fn version_is_truncated_to_three_components() {
        assert_eq!(trim_version("91.0.4472.124"), "91.0.4472");
        assert_eq!(trim_version("91.0"), "91.0");
        assert_eq!(trim_version("91"), "91");
        assert_eq!(trim_version("UNKNOWN"), "");
        assert_eq!(trim_version(""), "");
    }

    #[test]
    fn garbage_degrades_to_unknown() {
        let agent = classify("definitely not a browser");
        assert_eq!(agent.platform, UNKNOWN);
        assert_eq!(agent.browser, "UNKNOWN-");
    }
}
