//! Service-specific value checks, keyed by service id.

use super::formats::{is_valid_domain, is_valid_email, is_valid_http_url, is_valid_ip, is_valid_ldap_url, matches_size};
use super::{Finding, ValidationReport};
use crate::config::{FieldValue, FieldValues, Profile};

const ACME_ENVIRONMENTS: &[&str] = &["staging", "production"];
const REDIS_PERSISTENCE: &[&str] = &["rdb", "aof", "both", "none"];
const SMTP_PORTS: &[i64] = &[25, 465, 587, 2525];

pub(crate) fn check_service(id: &str, values: &FieldValues, profile: Profile, report: &mut ValidationReport) {
    let mut rules = Rules { id, values, report };
    match id {
        "traefik" => rules.traefik(profile),
        "postgresql" => rules.postgresql(),
        "redis" => rules.redis(),
        "nextcloud" => rules.nextcloud(),
        "pihole" => rules.pihole(),
        "vaultwarden" => rules.vaultwarden(),
        "gitlab" => rules.gitlab(),
        _ => {}
    }
}

struct Rules<'a> {
    id: &'a str,
    values: &'a FieldValues,
    report: &'a mut ValidationReport,
}

impl Rules<'_> {
    /// Non-empty string form of `key`.
    fn text(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string().trim().to_string())
    }

    fn error(&mut self, key: &str, message: String) {
        self.report.error(Finding::new(message).service(self.id).field(key));
    }

    fn warning(&mut self, key: &str, message: String) {
        self.report.warning(Finding::new(message).service(self.id).field(key));
    }

    fn size(&mut self, key: &str, units: &[&str], example: &str) {
        if let Some(value) = self.text(key) {
            if !matches_size(&value, units) {
                self.error(key, format!("Invalid {} format: {} (expected e.g. {})", key, value, example));
            }
        }
    }

    fn traefik(&mut self, profile: Profile) {
        if let Some(domain) = self.text("domain") {
            if !is_valid_domain(&domain) {
                self.error("domain", format!("Invalid domain format: {}", domain));
            }
        }
        for key in ["email", "acme_email"] {
            if let Some(email) = self.text(key) {
                if !is_valid_email(&email) {
                    self.error(key, format!("Invalid email format: {}", email));
                }
            }
        }
        if let Some(env) = self.text("acme_environment") {
            if !ACME_ENVIRONMENTS.contains(&env.as_str()) {
                self.error(
                    "acme_environment",
                    format!("Invalid ACME environment: {} (expected staging or production)", env),
                );
            } else if env == "staging" && profile.is_prod() {
                self.warning(
                    "acme_environment",
                    "ACME staging environment with the prod profile; certificates will not be trusted".to_string(),
                );
            }
        }
    }

    fn postgresql(&mut self) {
        if let Some(value) = self.values.get("max_connections").filter(|v| !v.is_empty()) {
            match value.as_i64() {
                Some(n) if !(10..=1000).contains(&n) => self.warning(
                    "max_connections",
                    format!("max_connections {} is outside the usual range (10-1000)", n),
                ),
                Some(_) => {}
                None => self.error("max_connections", format!("max_connections must be a number, got '{}'", value)),
            }
        }
        self.size("shared_buffers", &["MB", "GB"], "256MB or 1GB");
    }

    fn redis(&mut self) {
        if let Some(mode) = self.text("persistence") {
            if !REDIS_PERSISTENCE.contains(&mode.as_str()) {
                self.error(
                    "persistence",
                    format!("Invalid persistence mode: {} (expected one of {})", mode, REDIS_PERSISTENCE.join(", ")),
                );
            }
        }
        if let Some(value) = self.text("maxmemory") {
            if !matches_size(&value.to_lowercase(), &["mb", "gb"]) {
                self.error("maxmemory", format!("Invalid maxmemory format: {} (expected e.g. 256mb)", value));
            }
        }
    }

    fn nextcloud(&mut self) {
        self.size("upload_max_filesize", &["M", "G"], "512M or 10G");
        self.size("memory_limit", &["M", "G"], "512M or 1G");
    }

    fn pihole(&mut self) {
        let upstream: Vec<String> = match self.values.get("upstream_dns") {
            Some(FieldValue::List(items)) => items.clone(),
            Some(value) if !value.is_empty() => value.to_string().split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        for entry in upstream.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            if !is_valid_ip(entry) && !is_valid_domain(entry) {
                self.error("upstream_dns", format!("Invalid upstream DNS server: {}", entry));
            }
        }

        if let Some(ip) = self.text("server_ip") {
            if !is_valid_ip(&ip) {
                self.error("server_ip", format!("Invalid IP address: {}", ip));
            }
        }

        if let Some(port) = self.values.get("dns_port").and_then(FieldValue::as_i64) {
            if port != 53 {
                self.warning(
                    "dns_port",
                    format!("DNS port {} is non-standard; clients expect port 53", port),
                );
            }
        }
    }

    fn vaultwarden(&mut self) {
        if let Some(host) = self.text("smtp_host") {
            if !is_valid_domain(&host) && !is_valid_ip(&host) {
                self.error("smtp_host", format!("Invalid SMTP host: {}", host));
            }
        }
        if let Some(port) = self.values.get("smtp_port").and_then(FieldValue::as_i64) {
            if !SMTP_PORTS.contains(&port) {
                self.warning("smtp_port", format!("Unusual SMTP port: {}", port));
            }
        }
    }

    fn gitlab(&mut self) {
        if let Some(url) = self.text("external_url") {
            if !is_valid_http_url(&url) {
                self.error("external_url", format!("Invalid external URL: {}", url));
            }
        }
        if self.values.get("ldap_enabled").is_some_and(FieldValue::is_truthy) {
            match self.text("ldap_host") {
                None => self.error("ldap_host", "LDAP host is required when LDAP is enabled".to_string()),
                Some(host) if !is_valid_ldap_url(&host) => {
                    self.error("ldap_host", format!("Invalid LDAP URL: {}", host))
                }
                Some(_) => {}
            }
        }
    }
}
