use super::DependencyTree;
use crate::error::{Error, Result};
use crate::schema::SchemaSet;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet, VecDeque};

/// Default recursion limit for [`DependencyGraph::get_dependency_tree`].
pub const DEFAULT_TREE_DEPTH: usize = 10;

#[derive(Debug, Clone)]
struct ServiceMeta {
    name: String,
    category: Option<String>,
}

/// Service dependency graph built from loaded schemas.
///
/// Services keep their load order; that order is the tie-break whenever
/// several services are ready at once during a topological sort, so
/// resolution output is deterministic for a given schema directory.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    services: IndexMap<String, ServiceMeta>,
    /// `edges[A] = {B, C}` means A depends on B and C
    edges: HashMap<String, IndexSet<String>>,
    /// `reverse[A] = {B, C}` means B and C depend on A
    reverse: HashMap<String, IndexSet<String>>,
    empty: IndexSet<String>,
}

/// Summary of one service's position in the graph.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyInfo {
    pub id: String,
    pub name: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub tree: DependencyTree,
    /// Everything `resolve([id])` pulls in besides `id` itself.
    pub required_services: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schemas(schemas: &SchemaSet) -> Self {
        let mut graph = Self::new();
        for (id, schema) in schemas {
            graph.add_service(
                id,
                &schema.name,
                Some(&schema.category),
                schema.dependencies.iter().map(String::as_str),
            );
        }
        graph
    }

    /// Register a service and its dependency edges. Dependencies need not be
    /// registered yet; unregistered ones are reported by [`Self::validate`].
    pub fn add_service<'a>(
        &mut self,
        id: &str,
        name: &str,
        category: Option<&str>,
        dependencies: impl IntoIterator<Item = &'a str>,
    ) {
        self.services.insert(
            id.to_string(),
            ServiceMeta {
                name: name.to_string(),
                category: category.map(str::to_string),
            },
        );
        let deps = self.edges.entry(id.to_string()).or_default();
        for dep in dependencies {
            deps.insert(dep.to_string());
            self.reverse
                .entry(dep.to_string())
                .or_default()
                .insert(id.to_string());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    /// Known service ids in load order.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Direct dependencies of `id` (empty if unknown).
    pub fn get_dependencies(&self, id: &str) -> &IndexSet<String> {
        self.edges.get(id).unwrap_or(&self.empty)
    }

    /// Services that directly depend on `id` (empty if unknown).
    pub fn get_dependents(&self, id: &str) -> &IndexSet<String> {
        self.reverse.get(id).unwrap_or(&self.empty)
    }

    /// Report missing dependencies and every distinct cycle.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for id in self.services.keys() {
            let mut missing: Vec<&str> = self
                .get_dependencies(id)
                .iter()
                .filter(|dep| !self.contains(dep))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                missing.sort();
                errors.push(format!(
                    "Service '{}' has missing dependencies: {}",
                    id,
                    missing.join(", ")
                ));
            }
        }

        for cycle in self.find_cycles() {
            errors.push(Error::CircularDependency(cycle).to_string());
        }

        errors
    }

    /// Expand `selected` to its dependency closure and order it so every
    /// service comes after its dependencies.
    ///
    /// With `include_dependents`, services that transitively depend on the
    /// original selection are pulled in too (along with their own
    /// dependencies, so the result stays closed).
    pub fn resolve<S: AsRef<str>>(
        &self,
        selected: &[S],
        include_dependents: bool,
    ) -> Result<Vec<String>> {
        let mut unknown: Vec<String> = Vec::new();
        for id in selected.iter().map(AsRef::as_ref) {
            if !self.contains(id) && !unknown.iter().any(|u| u == id) {
                unknown.push(id.to_string());
            }
        }
        if !unknown.is_empty() {
            return Err(Error::MissingDependency {
                service: "selection".to_string(),
                missing: unknown,
            });
        }

        let mut closed: IndexSet<String> = IndexSet::new();
        let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
        self.expand_dependencies(
            selected.iter().map(|s| s.as_ref().to_string()),
            &mut closed,
            &mut missing,
        );

        if include_dependents {
            let mut seen: HashSet<String> = selected.iter().map(|s| s.as_ref().to_string()).collect();
            let mut queue: VecDeque<String> = seen.iter().cloned().collect();
            let mut added = Vec::new();
            while let Some(id) = queue.pop_front() {
                for dependent in self.get_dependents(&id) {
                    if self.contains(dependent) && seen.insert(dependent.clone()) {
                        added.push(dependent.clone());
                        queue.push_back(dependent.clone());
                    }
                }
            }
            self.expand_dependencies(added.into_iter(), &mut closed, &mut missing);
        }

        if !missing.is_empty() {
            let mut errors: Vec<Error> = missing
                .into_iter()
                .map(|(service, missing)| Error::MissingDependency { service, missing })
                .collect();
            return Err(if errors.len() == 1 {
                errors.remove(0)
            } else {
                Error::Multiple(errors)
            });
        }

        self.topological_order(&closed)
    }

    fn expand_dependencies(
        &self,
        start: impl Iterator<Item = String>,
        closed: &mut IndexSet<String>,
        missing: &mut BTreeMap<String, Vec<String>>,
    ) {
        let mut queue: VecDeque<String> = VecDeque::new();
        for id in start {
            if closed.insert(id.clone()) {
                queue.push_back(id);
            }
        }

        while let Some(id) = queue.pop_front() {
            for dep in self.get_dependencies(&id) {
                if !self.contains(dep) {
                    missing.entry(id.clone()).or_default().push(dep.clone());
                } else if closed.insert(dep.clone()) {
                    queue.push_back(dep.clone());
                }
            }
        }
    }

    /// Kahn's algorithm over the subgraph induced by `subset`. Among ready
    /// services the earliest-loaded goes first.
    fn topological_order(&self, subset: &IndexSet<String>) -> Result<Vec<String>> {
        let position = |id: &str| self.services.get_index_of(id).unwrap_or(usize::MAX);

        let mut in_degree: HashMap<&str, usize> = subset
            .iter()
            .map(|id| {
                let degree = self
                    .get_dependencies(id)
                    .iter()
                    .filter(|dep| subset.contains(*dep))
                    .count();
                (id.as_str(), degree)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(usize, &str)>> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| Reverse((position(id), id)))
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id.to_string());
            for dependent in self.get_dependents(id) {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((position(dependent), dependent.as_str())));
                    }
                }
            }
        }

        if order.len() != subset.len() {
            let residual: HashSet<&str> = in_degree
                .iter()
                .filter(|(_, &degree)| degree > 0)
                .map(|(&id, _)| id)
                .collect();
            let cycle = self
                .find_cycle_within(&residual)
                .unwrap_or_else(|| residual.iter().map(|s| s.to_string()).collect());
            return Err(Error::CircularDependency(cycle));
        }

        Ok(order)
    }

    /// First cycle among `nodes`, as a path closed by its starting node.
    fn find_cycle_within(&self, nodes: &HashSet<&str>) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for id in self.services.keys().filter(|id| nodes.contains(id.as_str())) {
            if !visited.contains(id.as_str()) {
                let mut found = Vec::new();
                self.cycle_dfs(id, nodes, &mut visited, &mut rec_stack, &mut path, &mut found, true);
                if let Some(cycle) = found.into_iter().next() {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Every distinct cycle among known services.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let nodes: HashSet<&str> = self.services.keys().map(String::as_str).collect();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();
        let mut found = Vec::new();

        for id in self.services.keys() {
            if !visited.contains(id.as_str()) {
                self.cycle_dfs(id, &nodes, &mut visited, &mut rec_stack, &mut path, &mut found, false);
            }
        }

        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter(|cycle| seen.insert(canonical_cycle(cycle)))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn cycle_dfs<'a>(
        &'a self,
        node: &'a str,
        nodes: &HashSet<&str>,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        found: &mut Vec<Vec<String>>,
        stop_at_first: bool,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for dep in self.get_dependencies(node) {
            let dep = dep.as_str();
            if !nodes.contains(dep) {
                continue;
            }
            if rec_stack.contains(dep) {
                let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(dep.to_string());
                found.push(cycle);
                if stop_at_first {
                    return true;
                }
            } else if !visited.contains(dep)
                && self.cycle_dfs(dep, nodes, visited, rec_stack, path, found, stop_at_first)
            {
                return true;
            }
        }

        rec_stack.remove(node);
        path.pop();
        false
    }

    /// Nested dependency structure for display.
    ///
    /// Recursion stops at `max_depth` or when a service reappears on the
    /// current path; such nodes are marked `truncated`.
    pub fn get_dependency_tree(&self, id: &str, max_depth: usize) -> Option<DependencyTree> {
        if !self.contains(id) {
            return None;
        }
        let mut path = Vec::new();
        Some(self.build_tree(id, 0, max_depth, &mut path))
    }

    fn build_tree(&self, id: &str, depth: usize, max_depth: usize, path: &mut Vec<String>) -> DependencyTree {
        let meta = self.services.get(id);
        let mut node = DependencyTree {
            id: id.to_string(),
            name: meta.map_or_else(|| id.to_string(), |m| m.name.clone()),
            category: meta.and_then(|m| m.category.clone()),
            dependencies: Vec::new(),
            truncated: false,
            missing: meta.is_none(),
        };

        if depth >= max_depth || path.iter().any(|p| p == id) {
            node.truncated = true;
            return node;
        }

        path.push(id.to_string());
        node.dependencies = self
            .get_dependencies(id)
            .iter()
            .map(|dep| self.build_tree(dep, depth + 1, max_depth, path))
            .collect();
        path.pop();

        node
    }

    /// Split `ids` into teardown batches.
    ///
    /// A service is removable once none of its dependencies outside the
    /// removal set are still present. Every removable service goes into the
    /// first batch; services held by an outside dependency are emitted
    /// together as a final best-effort batch. Unknown dependencies never
    /// block.
    pub fn suggest_removal_order<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Vec<String>> {
        let removal: IndexSet<String> = ids.iter().map(|s| s.as_ref().to_string()).collect();
        let mut remaining: IndexSet<String> = removal.clone();
        let mut batches = Vec::new();

        while !remaining.is_empty() {
            let batch: Vec<String> = remaining
                .iter()
                .filter(|id| self.outside_blockers(id, &removal) == 0)
                .cloned()
                .collect();

            if batch.is_empty() {
                batches.push(remaining.into_iter().collect());
                break;
            }

            for id in &batch {
                remaining.shift_remove(id);
            }
            batches.push(batch);
        }

        batches
    }

    /// Known dependencies of `id` that are not part of `removal`.
    fn outside_blockers(&self, id: &str, removal: &IndexSet<String>) -> usize {
        self.get_dependencies(id)
            .iter()
            .filter(|dep| self.contains(dep) && !removal.contains(dep.as_str()))
            .count()
    }

    pub fn dependency_info(&self, id: &str) -> Result<DependencyInfo> {
        let meta = self
            .services
            .get(id)
            .ok_or_else(|| Error::ServiceNotFound(id.to_string()))?;
        let tree = self
            .get_dependency_tree(id, DEFAULT_TREE_DEPTH)
            .ok_or_else(|| Error::ServiceNotFound(id.to_string()))?;
        let required_services = self
            .resolve(&[id], false)?
            .into_iter()
            .filter(|s| s != id)
            .collect();

        Ok(DependencyInfo {
            id: id.to_string(),
            name: meta.name.clone(),
            dependencies: self.get_dependencies(id).iter().cloned().collect(),
            dependents: self.get_dependents(id).iter().cloned().collect(),
            tree,
            required_services,
        })
    }
}

/// Rotation-independent form of a closed cycle path.
fn canonical_cycle(cycle: &[String]) -> Vec<String> {
    let members = &cycle[..cycle.len().saturating_sub(1)];
    let Some(start) = members
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };
    members[start..]
        .iter()
        .chain(members[..start].iter())
        .cloned()
        .collect()
}
