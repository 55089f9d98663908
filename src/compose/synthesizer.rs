//! Per-service fragment synthesis.
//!
//! Every enabled service yields a fragment. Optional parts that fail to
//! synthesize are dropped and recorded as a [`SynthesisDegradation`]; the
//! mandatory image, container name, restart policy and networks are always
//! present.

use super::duration::parse_duration_string;
use super::environment::{env_key, EnvTable};
use super::labels::{merge_labels, traefik_labels, PROXY_SERVICE};
use super::legacy::{legacy_image, legacy_image_name};
use super::manifest::{DependsOn, Healthcheck, ManifestFragment};
use super::template::TemplateContext;
use crate::config::{FieldValue, FieldValues, LabConfig, ServiceConfig};
use crate::schema::{
    CommandSpec, ComposeTemplate, ConditionContext, DependsOnCondition, EnvStrategy, ExposeSpec, RestartPolicy,
    SchemaSet, ServiceSchema,
};
use crate::secret::SecretGenerator;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Network every fragment joins unless its template names others.
pub const DEFAULT_NETWORK: &str = "homelab";

/// Optional part of a fragment that can be dropped on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisPart {
    Environment,
    Ports,
    Volumes,
    Labels,
    DependsOn,
    Healthcheck,
}

impl fmt::Display for SynthesisPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SynthesisPart::Environment => "environment",
            SynthesisPart::Ports => "ports",
            SynthesisPart::Volumes => "volumes",
            SynthesisPart::Labels => "labels",
            SynthesisPart::DependsOn => "depends_on",
            SynthesisPart::Healthcheck => "healthcheck",
        })
    }
}

/// A fragment part that was omitted, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisDegradation {
    pub service: String,
    pub part: SynthesisPart,
    pub reason: String,
}

impl fmt::Display for SynthesisDegradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: omitted {} ({})", self.service, self.part, self.reason)
    }
}

/// State shared by every synthesis call of one build.
pub struct SynthesisContext<'a> {
    pub config: &'a LabConfig,
    pub schemas: &'a SchemaSet,
    pub network: &'a str,
    pub secrets: &'a dyn SecretGenerator,
    pub env: EnvTable,
    degradations: Vec<SynthesisDegradation>,
}

impl<'a> SynthesisContext<'a> {
    pub fn new(config: &'a LabConfig, schemas: &'a SchemaSet, secrets: &'a dyn SecretGenerator, env: EnvTable) -> Self {
        Self {
            config,
            schemas,
            network: DEFAULT_NETWORK,
            secrets,
            env,
            degradations: Vec::new(),
        }
    }

    pub fn with_network(mut self, network: &'a str) -> Self {
        self.network = network;
        self
    }

    /// Condition context for `service_id`, schema defaults included.
    pub fn condition_context(&self, service_id: &str) -> ConditionContext {
        self.config.condition_context_with_schemas(service_id, self.schemas)
    }

    pub fn degrade(&mut self, service: &str, part: SynthesisPart, reason: String) {
        tracing::warn!("Service '{}': omitting {} ({})", service, part, reason);
        self.degradations.push(SynthesisDegradation {
            service: service.to_string(),
            part,
            reason,
        });
    }

    pub fn degradations(&self) -> &[SynthesisDegradation] {
        &self.degradations
    }

    pub fn into_parts(self) -> (EnvTable, Vec<SynthesisDegradation>) {
        (self.env, self.degradations)
    }

    fn template<'t>(
        &'t mut self,
        service_id: &'t str,
        values: &'t FieldValues,
        schema: Option<&'t ServiceSchema>,
    ) -> TemplateContext<'t> {
        TemplateContext {
            service_id,
            values,
            core: &self.config.core,
            schema,
            env: &mut self.env,
            secrets: self.secrets,
        }
    }

    /// Keep `result` or record its failure against `part`.
    fn part<T: Default>(&mut self, service: &str, part: SynthesisPart, result: Result<T, String>) -> T {
        result.unwrap_or_else(|reason| {
            self.degrade(service, part, reason);
            T::default()
        })
    }
}

/// Strategy turning one service's configuration into a fragment.
pub trait FragmentSynthesizer {
    fn synthesize(&self, service_id: &str, service: &ServiceConfig, ctx: &mut SynthesisContext<'_>) -> ManifestFragment;
}

/// Pick the strategy for a service: its schema's compose template when usable,
/// otherwise the legacy table.
pub fn synthesize(
    service_id: &str,
    service: &ServiceConfig,
    schema: Option<&ServiceSchema>,
    ctx: &mut SynthesisContext<'_>,
) -> ManifestFragment {
    match schema.and_then(SchemaDriven::new) {
        Some(strategy) => strategy.synthesize(service_id, service, ctx),
        None => {
            tracing::debug!("Service '{}' has no usable compose template, using legacy synthesis", service_id);
            LegacyFallback.synthesize(service_id, service, ctx)
        }
    }
}

/// Synthesis from a schema's compose template.
pub struct SchemaDriven<'s> {
    schema: &'s ServiceSchema,
    template: &'s ComposeTemplate,
}

impl<'s> SchemaDriven<'s> {
    pub fn new(schema: &'s ServiceSchema) -> Option<Self> {
        schema
            .usable_compose()
            .map(|template| Self { schema, template })
    }
}

impl FragmentSynthesizer for SchemaDriven<'_> {
    fn synthesize(&self, service_id: &str, service: &ServiceConfig, ctx: &mut SynthesisContext<'_>) -> ManifestFragment {
        let values = service.effective_values(ctx.config.profile);
        let template = self.template;
        let network = ctx.network;

        let condition_ctx = ctx.condition_context(service_id);
        let (mut fragment, ports, volumes, labels) = {
            let mut t = ctx.template(service_id, &values, Some(self.schema));
            let image = t.substitute(&template.image);
            let container_name = template
                .container_name
                .as_deref()
                .map(|name| t.substitute(name))
                .unwrap_or_else(|| service_id.to_string());

            let mut fragment = ManifestFragment::new(image, container_name, template.restart, network);
            if !template.networks.is_empty() {
                fragment.networks = template.networks.iter().map(|n| t.substitute(n)).collect();
            }
            fragment.command = template.command.as_ref().map(|c| substitute_command(&mut t, c));
            fragment.entrypoint = template.entrypoint.as_ref().map(|c| substitute_command(&mut t, c));
            fragment.privileged = template.privileged;
            fragment.cap_add = template.cap_add.clone();
            fragment.dns = template.dns.iter().map(|d| t.substitute(d)).collect();
            fragment.devices = template.devices.iter().map(|d| t.substitute(d)).collect();

            let ports = template
                .ports
                .iter()
                .map(|p| t.substitute(p))
                .map(|p| check_port_spec(&p).map(|()| p))
                .collect::<Result<Vec<_>, _>>();
            let volumes = template
                .volumes
                .iter()
                .map(|v| t.substitute(v))
                .map(|v| if v.trim().is_empty() { Err("empty volume spec".to_string()) } else { Ok(v) })
                .collect::<Result<Vec<_>, _>>();
            let labels: Vec<String> = template
                .labels
                .iter()
                .filter(|label| label.condition.as_ref().map_or(true, |c| c.evaluate(&condition_ctx)))
                .map(|label| t.substitute(&label.text))
                .collect();
            (fragment, ports, volumes, labels)
        };

        let environment = self.environment(service_id, &values, ctx);
        fragment.environment = match environment {
            Ok(entries) => apply_custom_env(entries, service),
            Err(reason) => {
                ctx.degrade(service_id, SynthesisPart::Environment, reason);
                Vec::new()
            }
        };

        fragment.ports = ctx.part(service_id, SynthesisPart::Ports, ports);
        fragment.volumes = ctx.part(service_id, SynthesisPart::Volumes, volumes);

        let proxy = self.proxy_labels(service_id, service, &values, ctx);
        fragment.labels = ctx.part(
            service_id,
            SynthesisPart::Labels,
            proxy.map(|extra| {
                let mut labels = labels;
                merge_labels(&mut labels, extra);
                labels
            }),
        );

        let depends_on = self.depends_on(service_id, ctx.config);
        fragment.depends_on = ctx.part(service_id, SynthesisPart::DependsOn, depends_on);

        let healthcheck = match &template.healthcheck {
            Some(spec) => {
                let mut t = ctx.template(service_id, &values, Some(self.schema));
                let test: Vec<String> = spec.test.iter().map(|s| t.substitute(s)).collect();
                check_healthcheck(Healthcheck {
                    test,
                    interval: spec.interval.clone(),
                    timeout: spec.timeout.clone(),
                    retries: spec.retries,
                    start_period: spec.start_period.clone(),
                })
                .map(Some)
            }
            None => Ok(None),
        };
        fragment.healthcheck = ctx.part(service_id, SynthesisPart::Healthcheck, healthcheck);

        fragment
    }
}

impl SchemaDriven<'_> {
    fn environment(
        &self,
        service_id: &str,
        values: &FieldValues,
        ctx: &mut SynthesisContext<'_>,
    ) -> Result<Vec<(String, String)>, String> {
        let config = ctx.config;
        let condition_ctx = ctx.condition_context(service_id);
        let mut entries = Vec::new();

        for source in &self.template.environment {
            if let Some(condition) = &source.condition {
                if !condition.evaluate(&condition_ctx) {
                    tracing::debug!("Service '{}': skipping {} (condition false)", service_id, source.key);
                    continue;
                }
            }

            let value = match &source.strategy {
                EnvStrategy::Literal(value) => value.clone(),
                EnvStrategy::FromField(field) => ctx
                    .template(service_id, values, Some(self.schema))
                    .field_or_reference(field),
                EnvStrategy::FromService { service, field } => {
                    let key = env_key(service, field);
                    if let Some(value) = config.effective_values(service).get(field).filter(|v| !v.is_empty()) {
                        ctx.env.export(&key, &value.to_string());
                    }
                    format!("${{{}}}", key)
                }
                EnvStrategy::Template(text) => ctx.template(service_id, values, Some(self.schema)).substitute(text),
                EnvStrategy::ValueMap { field, map } => {
                    let selector = values.get(field).map(ToString::to_string).unwrap_or_default();
                    map.get(&selector)
                        .or_else(|| map.get("default"))
                        .cloned()
                        .ok_or_else(|| {
                            format!(
                                "{}: value '{}' of field '{}' has no mapping",
                                source.key, selector, field
                            )
                        })?
                }
                EnvStrategy::Generate { kind, length } => {
                    let key = env_key(service_id, &source.key);
                    let secrets = ctx.secrets;
                    ctx.env.get_or_generate(&key, || secrets.generate_kind(*kind, *length));
                    format!("${{{}}}", key)
                }
            };
            entries.push((source.key.clone(), value));
        }

        Ok(entries)
    }

    fn proxy_labels(
        &self,
        service_id: &str,
        service: &ServiceConfig,
        values: &FieldValues,
        ctx: &mut SynthesisContext<'_>,
    ) -> Result<Vec<String>, String> {
        let Some(expose) = &self.template.expose else {
            return Ok(Vec::new());
        };
        if service_id == PROXY_SERVICE || !ctx.config.is_enabled(PROXY_SERVICE) {
            return Ok(Vec::new());
        }

        let port = expose_port(expose, &mut ctx.template(service_id, values, Some(self.schema)))?;
        let host = proxy_host(ctx.config, service_id, service, expose.subdomain.as_deref());
        Ok(traefik_labels(service_id, &host, port, ctx.network))
    }

    fn depends_on(&self, service_id: &str, config: &LabConfig) -> Result<IndexMap<String, DependsOn>, String> {
        let mut depends_on = IndexMap::new();
        let declared = self
            .template
            .depends_on
            .iter()
            .map(|(dep, entry)| (dep.as_str(), entry.condition()));
        let implied = self
            .schema
            .dependencies
            .iter()
            .map(|dep| (dep.as_str(), DependsOnCondition::ServiceStarted));

        for (dep, condition) in declared.chain(implied) {
            if dep == service_id {
                return Err(format!("'{}' cannot depend on itself", service_id));
            }
            if depends_on.contains_key(dep) {
                continue;
            }
            if !config.is_enabled(dep) {
                tracing::debug!("Service '{}': dependency '{}' is not enabled, skipping", service_id, dep);
                continue;
            }
            depends_on.insert(dep.to_string(), DependsOn { condition });
        }
        Ok(depends_on)
    }
}

/// Synthesis for services without a usable compose template.
pub struct LegacyFallback;

impl FragmentSynthesizer for LegacyFallback {
    fn synthesize(&self, service_id: &str, service: &ServiceConfig, ctx: &mut SynthesisContext<'_>) -> ManifestFragment {
        let mut fragment = ManifestFragment::new(
            legacy_image_name(service_id),
            service_id.to_string(),
            RestartPolicy::UnlessStopped,
            ctx.network,
        );
        fragment.environment = apply_custom_env(Vec::new(), service);

        let known = legacy_image(service_id);
        if let Some((name, path)) = known.and_then(|l| l.data_volume) {
            fragment.volumes.push(format!("{}:{}", name, path));
        }
        if let Some(port) = known.and_then(|l| l.web_port) {
            if service_id != PROXY_SERVICE && ctx.config.is_enabled(PROXY_SERVICE) {
                let host = proxy_host(ctx.config, service_id, service, None);
                fragment.labels = traefik_labels(service_id, &host, port, ctx.network);
            }
        }
        fragment
    }
}

fn substitute_command(t: &mut TemplateContext<'_>, command: &CommandSpec) -> CommandSpec {
    match command {
        CommandSpec::Shell(line) => CommandSpec::Shell(t.substitute(line)),
        CommandSpec::Exec(args) => CommandSpec::Exec(args.iter().map(|a| t.substitute(a)).collect()),
    }
}

/// Schema entries with `custom_env` applied on top; custom keys win and
/// empty values become bare `KEY` entries.
fn apply_custom_env(entries: Vec<(String, String)>, service: &ServiceConfig) -> Vec<String> {
    let mut merged: IndexMap<String, String> = entries.into_iter().collect();
    for (key, value) in &service.custom_env {
        merged.insert(key.clone(), value.clone());
    }
    merged
        .into_iter()
        .map(|(key, value)| if value.is_empty() { key } else { format!("{}={}", key, value) })
        .collect()
}

/// `[ip:]host:container[/tcp|udp]`, or a bare container port. Specs that still
/// carry a placeholder are passed through for the compose runner to resolve.
fn check_port_spec(spec: &str) -> Result<(), String> {
    if spec.contains("${") {
        return Ok(());
    }

    let (ports, protocol) = match spec.rsplit_once('/') {
        Some((ports, protocol)) => (ports, Some(protocol)),
        None => (spec, None),
    };
    if let Some(protocol) = protocol {
        if protocol != "tcp" && protocol != "udp" {
            return Err(format!("port '{}' has unknown protocol '{}'", spec, protocol));
        }
    }

    let parts: Vec<&str> = if ports.starts_with('[') {
        // [ipv6]:host:container
        match ports.split_once("]:") {
            Some((_, rest)) => rest.split(':').collect(),
            None => return Err(format!("port '{}' is malformed", spec)),
        }
    } else {
        ports.split(':').collect()
    };
    let numbers: &[&str] = match parts.len() {
        1 | 2 => &parts,
        3 => &parts[1..],
        _ => return Err(format!("port '{}' is malformed", spec)),
    };

    for number in numbers {
        match number.parse::<u32>() {
            Ok(p) if (1..=65535).contains(&p) => {}
            _ => return Err(format!("port '{}' has invalid port number '{}'", spec, number)),
        }
    }
    Ok(())
}

fn check_healthcheck(healthcheck: Healthcheck) -> Result<Healthcheck, String> {
    if healthcheck.test.is_empty() {
        return Err("healthcheck test is empty".to_string());
    }
    let timings = [
        Some(("interval", &healthcheck.interval)),
        Some(("timeout", &healthcheck.timeout)),
        healthcheck.start_period.as_ref().map(|p| ("start_period", p)),
    ];
    for (name, value) in timings.into_iter().flatten() {
        if parse_duration_string(value).is_none() {
            return Err(format!("healthcheck {} '{}' is not a duration", name, value));
        }
    }
    Ok(healthcheck)
}

fn expose_port(expose: &ExposeSpec, t: &mut TemplateContext<'_>) -> Result<u16, String> {
    let text = match &expose.port {
        FieldValue::String(text) => t.substitute(text),
        other => other.to_string(),
    };
    text.trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| format!("exposed port '{}' is not a valid port", text))
}

/// Public host name: an explicit `domain` field, else `{subdomain}.{core.domain}`.
fn proxy_host(config: &LabConfig, service_id: &str, service: &ServiceConfig, subdomain: Option<&str>) -> String {
    match subdomain {
        Some(sub) if !has_explicit_domain(config, service) => format!("{}.{}", sub, config.core.domain),
        _ => config.service_host(service_id, service),
    }
}

fn has_explicit_domain(config: &LabConfig, service: &ServiceConfig) -> bool {
    service
        .effective_values(config.profile)
        .get("domain")
        .and_then(FieldValue::as_str)
        .is_some_and(|d| !d.trim().is_empty())
}
