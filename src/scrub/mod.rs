//! Privacy scrubbing.
//!
//! The pipeline treats the detection engine as a black box behind
//! [`PiiScrubber`]: text in, scrubbed text plus detected categories out.
//! Engine failure is non-fatal — the pipeline passes the original text
//! through and raises an observable fallback flag.
//!
//! [`PatternScrubber`] is the bundled engine: regex detectors for the
//! common structured categories, each replaced with a fixed placeholder
//! token. Placeholders are plain uppercase tags in angle brackets and are
//! never themselves matched by a detector, so scrubbing already-scrubbed
//! text is a no-op.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::Result;

/// Category of detected personally-identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiCategory {
    Url,
    Email,
    CreditCard,
    Ssn,
    Phone,
    IpAddress,
}

impl PiiCategory {
    /// The fixed placeholder token substituted for detected spans.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiCategory::Url => "<URL>",
            PiiCategory::Email => "<EMAIL_ADDRESS>",
            PiiCategory::CreditCard => "<CREDIT_CARD>",
            PiiCategory::Ssn => "<SSN>",
            PiiCategory::Phone => "<PHONE_NUMBER>",
            PiiCategory::IpAddress => "<IP_ADDRESS>",
        }
    }
}

/// Result of scrubbing one piece of text.
#[derive(Debug, Clone)]
pub struct ScrubOutcome {
    /// Text with detected spans replaced by placeholders.
    pub text: String,
    /// Categories detected at least once, in detection order.
    pub categories: Vec<PiiCategory>,
}

impl ScrubOutcome {
    /// Outcome for text with nothing detected.
    pub fn clean(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            categories: Vec::new(),
        }
    }
}

/// Contract for the external PII detection engine.
#[async_trait]
pub trait PiiScrubber: Send + Sync {
    /// Engine name for logging/debugging.
    fn name(&self) -> &str;

    /// Detect PII spans in `text` and replace them with placeholders.
    async fn scrub(&self, text: &str) -> Result<ScrubOutcome>;
}

// ============================================================================
// PatternScrubber
// ============================================================================

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"https?://[^\s<>"]+"#).expect("url regex"))
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
    })
}

fn credit_card_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\b(?:\d{4}[ -]?){3}\d{4}\b").expect("credit card regex"))
}

fn ssn_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn regex"))
}

fn phone_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\b(?:\+?1[ .-])?(?:\(\d{3}\)|\d{3})[ .-]\d{3}[ .-]\d{4}\b")
            .expect("phone regex")
    })
}

fn ip_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ip regex"))
}

/// Built-in regex scrubbing engine.
///
/// Detectors run in a fixed order from most to least specific (URLs
/// first, so addresses embedded in a URL are folded into its
/// placeholder; card numbers before phone numbers, so digit runs are
/// claimed by the longer pattern).
#[derive(Debug, Default)]
pub struct PatternScrubber;

impl PatternScrubber {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous scrub pass, shared by the trait impl and tests.
    fn scrub_sync(&self, text: &str) -> ScrubOutcome {
        if text.trim().is_empty() {
            return ScrubOutcome::clean(text);
        }

        let detectors: [(PiiCategory, &Regex); 6] = [
            (PiiCategory::Url, url_regex()),
            (PiiCategory::Email, email_regex()),
            (PiiCategory::CreditCard, credit_card_regex()),
            (PiiCategory::Ssn, ssn_regex()),
            (PiiCategory::Phone, phone_regex()),
            (PiiCategory::IpAddress, ip_regex()),
        ];

        let mut scrubbed = text.to_string();
        let mut categories = Vec::new();
        for (category, regex) in detectors {
            if regex.is_match(&scrubbed) {
                scrubbed = regex
                    .replace_all(&scrubbed, category.placeholder())
                    .into_owned();
                categories.push(category);
            }
        }

        ScrubOutcome {
            text: scrubbed,
            categories,
        }
    }
}

#[async_trait]
impl PiiScrubber for PatternScrubber {
    fn name(&self) -> &str {
        "pattern"
    }

    async fn scrub(&self, text: &str) -> Result<ScrubOutcome> {
        Ok(self.scrub_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_replaced() {
        let outcome = PatternScrubber::new().scrub_sync("My email is john.doe@company.com");
        assert_eq!(outcome.text, "My email is <EMAIL_ADDRESS>");
        assert_eq!(outcome.categories, vec![PiiCategory::Email]);
    }

    #[test]
    fn phone_and_email_together() {
        let outcome =
            PatternScrubber::new().scrub_sync("Reach me at jane@corp.io or 555-123-4567 today");
        assert_eq!(
            outcome.text,
            "Reach me at <EMAIL_ADDRESS> or <PHONE_NUMBER> today"
        );
        assert!(outcome.categories.contains(&PiiCategory::Email));
        assert!(outcome.categories.contains(&PiiCategory::Phone));
    }

    #[test]
    fn scrubbing_is_idempotent() {
        let scrubber = PatternScrubber::new();
        let first = scrubber.scrub_sync("ssn 123-45-6789, card 4111 1111 1111 1111");
        let second = scrubber.scrub_sync(&first.text);
        assert_eq!(first.text, second.text);
        assert!(second.categories.is_empty());
    }

    #[test]
    fn url_claims_embedded_address() {
        let outcome = PatternScrubber::new().scrub_sync("see https://10.0.0.1/admin?u=a@b.io now");
        assert_eq!(outcome.text, "see <URL> now");
        assert_eq!(outcome.categories, vec![PiiCategory::Url]);
    }

    #[test]
    fn blank_text_passes_through() {
        let outcome = PatternScrubber::new().scrub_sync("   ");
        assert_eq!(outcome.text, "   ");
        assert!(outcome.categories.is_empty());
    }

    #[test]
    fn ip_address_is_replaced() {
        let outcome = PatternScrubber::new().scrub_sync("host is 192.168.0.12");
        assert_eq!(outcome.text, "host is <IP_ADDRESS>");
    }
}
