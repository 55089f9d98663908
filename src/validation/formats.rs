//! Format predicates shared by the configuration self-check and the validator.

use regex::Regex;
use std::net::IpAddr;
use std::sync::OnceLock;

static DOMAIN_REGEX: OnceLock<Regex> = OnceLock::new();
static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

const MAX_DOMAIN_LENGTH: usize = 253;

fn domain_regex() -> &'static Regex {
    DOMAIN_REGEX.get_or_init(|| {
        Regex::new(
            r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9](?:[a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?$",
        )
        .expect("static regex pattern is valid")
    })
}

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("static regex pattern is valid")
    })
}

pub fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty() && domain.len() <= MAX_DOMAIN_LENGTH && domain_regex().is_match(domain)
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// IPv4 or IPv6.
pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok()
}

/// Absolute URL with one of `schemes` and a host.
pub fn is_valid_url(value: &str, schemes: &[&str]) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => schemes.contains(&parsed.scheme()) && parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

pub fn is_valid_http_url(value: &str) -> bool {
    is_valid_url(value, &["http", "https"])
}

pub fn is_valid_ldap_url(value: &str) -> bool {
    is_valid_url(value, &["ldap", "ldaps"])
}

/// Loose IANA zone check: `UTC`/`GMT` or `Area/Location`.
pub fn is_plausible_timezone(tz: &str) -> bool {
    matches!(tz, "UTC" | "GMT" | "Etc/UTC")
        || tz.split('/').count() >= 2
            && tz
                .split('/')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || "_-+".contains(c)))
}

/// `<digits><unit>` where unit is one of `units` (compared as written).
pub fn matches_size(value: &str, units: &[&str]) -> bool {
    units.iter().any(|unit| {
        value
            .strip_suffix(unit)
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("lab.home.arpa"));
        assert!(is_valid_domain("localhost"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("-bad.example.com"));
        assert!(!is_valid_domain("bad_domain.com"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(250))));
    }

    #[test]
    fn emails() {
        assert!(is_valid_email("admin@example.com"));
        assert!(!is_valid_email("admin@localhost"));
        assert!(!is_valid_email("not-an-email"));
    }

    #[test]
    fn ips() {
        assert!(is_valid_ip("192.168.1.10"));
        assert!(is_valid_ip("::1"));
        assert!(!is_valid_ip("999.1.1.1"));
    }

    #[test]
    fn urls() {
        assert!(is_valid_http_url("https://gitlab.example.com"));
        assert!(!is_valid_http_url("ftp://gitlab.example.com"));
        assert!(!is_valid_http_url("gitlab.example.com"));
        assert!(is_valid_ldap_url("ldaps://ldap.example.com:636"));
        assert!(!is_valid_ldap_url("https://ldap.example.com"));
    }

    #[test]
    fn timezones() {
        assert!(is_plausible_timezone("UTC"));
        assert!(is_plausible_timezone("Europe/Berlin"));
        assert!(is_plausible_timezone("America/Argentina/Buenos_Aires"));
        assert!(!is_plausible_timezone("Berlin"));
        assert!(!is_plausible_timezone("Europe/"));
    }

    #[test]
    fn sizes() {
        assert!(matches_size("256MB", &["MB", "GB"]));
        assert!(!matches_size("256mb", &["MB", "GB"]));
        assert!(!matches_size("MB", &["MB"]));
        assert!(!matches_size("1.5GB", &["MB", "GB"]));
    }
}
