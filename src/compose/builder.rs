use super::environment::EnvTable;
use super::manifest::Manifest;
use super::synthesizer::{synthesize, SynthesisContext, SynthesisDegradation, DEFAULT_NETWORK};
use crate::config::LabConfig;
use crate::dependency::DependencyGraph;
use crate::error::Result;
use crate::schema::SchemaSet;
use crate::secret::{RandomSecretGenerator, SecretGenerator};
use std::collections::BTreeMap;

/// Result of one manifest build.
#[derive(Debug, Clone)]
pub struct ManifestOutput {
    pub manifest: Manifest,
    /// Values created or exported during the build that are not yet stored
    /// anywhere; callers persist them to `.env`.
    pub secrets: BTreeMap<String, String>,
    pub degradations: Vec<SynthesisDegradation>,
}

/// Synthesizes the manifest for every enabled service of a configuration.
pub struct ManifestBuilder<'a> {
    schemas: &'a SchemaSet,
    secrets: &'a dyn SecretGenerator,
    network: String,
    known_env: BTreeMap<String, String>,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(schemas: &'a SchemaSet) -> Self {
        Self {
            schemas,
            secrets: &RandomSecretGenerator,
            network: DEFAULT_NETWORK.to_string(),
            known_env: BTreeMap::new(),
        }
    }

    pub fn with_secret_generator(mut self, secrets: &'a dyn SecretGenerator) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Values that already exist outside the config (e.g. an existing `.env`).
    /// They are reused instead of generating new secrets.
    pub fn with_known_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.known_env = env;
        self
    }

    /// Enabled services in dependency order: those with schemas are
    /// topologically sorted, the rest follow in configuration order.
    pub fn synthesis_order(&self, config: &LabConfig) -> Result<Vec<String>> {
        let enabled = config.enabled_ids();
        let (known, unknown): (Vec<String>, Vec<String>) =
            enabled.into_iter().partition(|id| self.schemas.contains_key(id));

        let graph = DependencyGraph::from_schemas(self.schemas);
        let mut order: Vec<String> = graph
            .resolve(&known, false)?
            .into_iter()
            .filter(|id| config.is_enabled(id))
            .collect();
        order.extend(unknown);
        Ok(order)
    }

    pub fn build(&self, config: &LabConfig) -> Result<ManifestOutput> {
        let order = self.synthesis_order(config)?;
        Ok(self.build_ordered(config, &order))
    }

    /// Synthesize exactly `order`, in that order. Every listed service gets a
    /// fragment, even when disabled or unknown.
    pub fn build_ordered<S: AsRef<str>>(&self, config: &LabConfig, order: &[S]) -> ManifestOutput {
        let mut known = config.env_vars.clone();
        known.extend(self.known_env.clone());

        let mut ctx = SynthesisContext::new(config, self.schemas, self.secrets, EnvTable::new(known)).with_network(&self.network);
        let mut manifest = Manifest::new(&self.network);

        for id in order.iter().map(AsRef::as_ref) {
            let service = config.service(id).cloned().unwrap_or_default();
            let fragment = synthesize(id, &service, self.schemas.get(id), &mut ctx);
            manifest.add_fragment(id, fragment);
        }

        let (env, degradations) = ctx.into_parts();
        tracing::debug!(
            "Synthesized {} service(s) with {} degradation(s)",
            manifest.services.len(),
            degradations.len()
        );

        ManifestOutput {
            manifest,
            secrets: env.into_generated(),
            degradations,
        }
    }
}
