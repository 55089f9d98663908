/// Known image for services that ship without a usable compose template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyImage {
    pub image: &'static str,
    /// Named data volume and its mount path.
    pub data_volume: Option<(&'static str, &'static str)>,
    /// Container port of the web UI.
    pub web_port: Option<u16>,
}

const fn entry(
    image: &'static str,
    data_volume: Option<(&'static str, &'static str)>,
    web_port: Option<u16>,
) -> LegacyImage {
    LegacyImage {
        image,
        data_volume,
        web_port,
    }
}

static LEGACY_IMAGES: &[(&str, LegacyImage)] = &[
    ("traefik", entry("traefik:v3.1", Some(("letsencrypt", "/letsencrypt")), None)),
    ("postgresql", entry("postgres:16", Some(("postgres-data", "/var/lib/postgresql/data")), None)),
    ("redis", entry("redis:7-alpine", Some(("redis-data", "/data")), None)),
    ("mongodb", entry("mongo:7", Some(("mongodb-data", "/data/db")), None)),
    ("grafana", entry("grafana/grafana:latest", Some(("grafana-data", "/var/lib/grafana")), Some(3000))),
    ("prometheus", entry("prom/prometheus:latest", Some(("prometheus-data", "/prometheus")), Some(9090))),
    ("pihole", entry("pihole/pihole:latest", Some(("pihole-data", "/etc/pihole")), Some(80))),
    ("vaultwarden", entry("vaultwarden/server:latest", Some(("vaultwarden-data", "/data")), Some(80))),
    ("gitlab", entry("gitlab/gitlab-ce:latest", Some(("gitlab-data", "/var/opt/gitlab")), Some(80))),
    ("jenkins", entry("jenkins/jenkins:lts", Some(("jenkins-data", "/var/jenkins_home")), Some(8080))),
    ("n8n", entry("docker.n8n.io/n8nio/n8n", Some(("n8n-data", "/home/node/.n8n")), Some(5678))),
    ("uptime_kuma", entry("louislam/uptime-kuma:1", Some(("uptime-kuma", "/app/data")), Some(3001))),
    ("glance", entry("glanceapp/glance:latest", Some(("glance-data", "/app/data")), Some(8080))),
    ("cloudflared", entry("cloudflare/cloudflared:latest", None, None)),
    ("headscale", entry("headscale/headscale:latest", Some(("headscale-data", "/var/lib/headscale")), Some(8080))),
    ("vault", entry("hashicorp/vault:latest", Some(("vault-data", "/vault/data")), Some(8200))),
    (
        "nginx_proxy_manager",
        entry("jc21/nginx-proxy-manager:latest", Some(("nginx-data", "/data")), Some(81)),
    ),
    ("caddy", entry("caddy:2-alpine", Some(("caddy-data", "/data")), None)),
];

pub fn legacy_image(service_id: &str) -> Option<&'static LegacyImage> {
    LEGACY_IMAGES
        .iter()
        .find(|(id, _)| *id == service_id)
        .map(|(_, image)| image)
}

/// Image for `service_id`, defaulting to `{id}:latest`.
pub fn legacy_image_name(service_id: &str) -> String {
    legacy_image(service_id)
        .map(|l| l.image.to_string())
        .unwrap_or_else(|| format!("{}:latest", service_id))
}
