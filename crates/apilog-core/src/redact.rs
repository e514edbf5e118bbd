use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Placeholder written in place of a redacted query value.
pub const REDACTED: &str = "{truncated}";

static TOKEN_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:access_)?token=)[^&#]*").expect("valid token regex")
});

/// Replace bearer tokens carried in the query string with [`REDACTED`].
///
/// Hosted payment pages take their token as `?token=...`; the URL must be
/// scrubbed before it is handed to the log.
pub fn redact_url(url: &str) -> Cow<'_, str> {
    TOKEN_PARAM.replace_all(url, format!("${{1}}{REDACTED}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_token_in_middle() {
        let url = "https://hpp.test/paymentmethod/embed?token=eyJhbGc.abc&countryCode=AU";
        assert_eq!(
            redact_url(url),
            "https://hpp.test/paymentmethod/embed?token={truncated}&countryCode=AU"
        );
    }

    #[test]
    fn test_redacts_trailing_and_access_token() {
        let url = "https://pcp.test/embed?feepricing=true&access_token=secret";
        assert_eq!(
            redact_url(url),
            "https://pcp.test/embed?feepricing=true&access_token={truncated}"
        );
        assert_eq!(
            redact_url("https://x.test/?TOKEN=abc#frag"),
            "https://x.test/?TOKEN={truncated}#frag"
        );
    }

    #[test]
    fn test_leaves_other_params_alone() {
        let url = "https://api.test/v2/billing/customers?tokenType=card&page=2";
        assert!(matches!(redact_url(url), Cow::Borrowed(_)));
        assert_eq!(redact_url(url), url);
    }
}
