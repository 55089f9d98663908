/// Service id of the reverse proxy whose presence turns on routing labels.
pub const PROXY_SERVICE: &str = "traefik";

/// Routing labels that publish `router` at `https://{host}` through the
/// proxy, forwarding to container `port`.
pub fn traefik_labels(router: &str, host: &str, port: u16, network: &str) -> Vec<String> {
    vec![
        "traefik.enable=true".to_string(),
        format!("traefik.docker.network={}", network),
        format!("traefik.http.routers.{}.rule=Host(`{}`)", router, host),
        format!("traefik.http.routers.{}.entrypoints=websecure", router),
        format!("traefik.http.routers.{}.tls.certresolver=letsencrypt", router),
        format!("traefik.http.routers.{}.middlewares=secure-headers@docker", router),
        format!("traefik.http.services.{}.loadbalancer.server.port={}", router, port),
    ]
}

/// Append `extra` labels, skipping keys `labels` already sets.
pub fn merge_labels(labels: &mut Vec<String>, extra: Vec<String>) {
    for label in extra {
        let key = label.split_once('=').map_or(label.as_str(), |(k, _)| k);
        let taken = labels
            .iter()
            .any(|l| l.split_once('=').map_or(l.as_str(), |(k, _)| k) == key);
        if !taken {
            labels.push(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_labels() {
        let labels = traefik_labels("grafana", "grafana.example.com", 3000, "homelab");
        assert_eq!(labels[0], "traefik.enable=true");
        assert!(labels.contains(&"traefik.docker.network=homelab".to_string()));
        assert!(labels.contains(&"traefik.http.routers.grafana.rule=Host(`grafana.example.com`)".to_string()));
        assert!(labels.contains(&"traefik.http.services.grafana.loadbalancer.server.port=3000".to_string()));
    }

    #[test]
    fn template_labels_win() {
        let mut labels = vec!["traefik.enable=false".to_string()];
        merge_labels(&mut labels, traefik_labels("x", "x.example.com", 80, "homelab"));
        assert_eq!(labels[0], "traefik.enable=false");
        assert_eq!(labels.iter().filter(|l| l.starts_with("traefik.enable")).count(), 1);
        assert_eq!(labels.len(), 7);
    }
}
