// src/resolver/engine.rs

//! Closure computation
//!
//! A request moves through a fixed sequence of states:
//!
//! ```text
//! Selected -> ExpandingRequires <-> ResolvingAmbiguities
//!          -> ApplyingObsoletes (-> ExpandingRequires while incomplete)
//!          -> PruningAlreadySatisfied -> Closed | Conflict | Unresolvable
//! ```
//!
//! Resolution is greedy: every requirement is settled once, by the plan, by
//! an installed package or by the preferred provider on the active media.
//! Failed branches are dropped (or fail the request in strict mode) instead
//! of being backtracked.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{Capability, RecordRef};
use crate::index::CapabilityIndex;
use crate::medium::MediumRegistry;
use crate::version::VersionError;

use super::conflict::{ChoiceSet, Conflict, Unresolved};
use super::graph::DependencyGraph;
use super::installed::InstalledSet;
use super::plan::{Action, Outcome, PlanStep, Reason, Resolution, ResolutionPlan, Skipped};
use super::policy::{Precedence, ResolvePolicy};
use super::ResolveError;

/// One thing the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A package name
    Name(String),
    /// An absolute path contained in the wanted package
    File(String),
    /// A (possibly versioned) capability
    Capability(Capability),
}

impl Selection {
    /// `/path` selects by file, `name op version` by capability, anything
    /// else by name
    pub fn parse(spec: &str) -> Result<Self, VersionError> {
        let spec = spec.trim();
        if spec.starts_with('/') {
            Ok(Selection::File(spec.to_string()))
        } else if spec.contains(|c: char| c.is_whitespace() || "<>=[".contains(c)) {
            Ok(Selection::Capability(Capability::parse(spec)?))
        } else {
            Ok(Selection::Name(spec.to_string()))
        }
    }
}

/// A resolution request
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub selections: Vec<Selection>,
    /// Select every installed package with a newer candidate
    pub upgrade_all: bool,
    /// Only update media take part
    pub update_only: bool,
    /// Removable media do not take part
    pub exclude_removable: bool,
    /// Names with no package of that name fall back to providers
    pub search_provides: bool,
    /// Answers to choice sets: capability -> package name
    decisions: BTreeMap<String, String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request installation of `specs` (names, files or capabilities)
    pub fn install<I, S>(specs: I) -> Result<Self, VersionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        specs
            .into_iter()
            .try_fold(Self::new(), |req, spec| req.select(spec.as_ref()))
    }

    pub fn select(mut self, spec: &str) -> Result<Self, VersionError> {
        self.selections.push(Selection::parse(spec)?);
        Ok(self)
    }

    pub fn upgrade_all(mut self) -> Self {
        self.upgrade_all = true;
        self
    }

    pub fn update_only(mut self) -> Self {
        self.update_only = true;
        self
    }

    pub fn search_provides(mut self) -> Self {
        self.search_provides = true;
        self
    }

    /// Answer the choice set for `capability` with `package`
    pub fn choose(mut self, capability: &str, package: &str) -> Self {
        let key = Capability::parse(capability)
            .map(|c| c.to_display_string())
            .unwrap_or_else(|_| capability.to_string());
        self.decisions.insert(key, package.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty() && !self.upgrade_all
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Selected,
    ExpandingRequires,
    ResolvingAmbiguities,
    ApplyingObsoletes,
    PruningAlreadySatisfied,
}

/// Computes installation closures over an index snapshot
pub struct Resolver<'a> {
    index: &'a CapabilityIndex,
    registry: &'a MediumRegistry,
    installed: &'a InstalledSet,
    policy: ResolvePolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(
        index: &'a CapabilityIndex,
        registry: &'a MediumRegistry,
        installed: &'a InstalledSet,
    ) -> Self {
        Self {
            index,
            registry,
            installed,
            policy: ResolvePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ResolvePolicy {
        &self.policy
    }

    /// Resolve `request` into a plan
    ///
    /// An empty request yields an empty plan. Otherwise at least one medium
    /// must be active.
    pub fn resolve(&self, request: &Request) -> Result<Resolution, ResolveError> {
        if request.is_empty() {
            debug!("empty selection, nothing to do");
            return Ok(Resolution::empty());
        }

        let active: BTreeSet<String> = self
            .registry
            .active_media(!request.exclude_removable, request.update_only)
            .into_iter()
            .map(|m| m.name.clone())
            .collect();
        if active.is_empty() {
            return Err(ResolveError::NoMediaAvailable);
        }

        let mut run = Run::new(self, request, active);
        let mut state = State::Selected;
        let mut rounds = 0usize;

        loop {
            debug!("resolver state: {:?}", state);
            state = match state {
                State::Selected => {
                    run.select();
                    State::ExpandingRequires
                }
                State::ExpandingRequires => {
                    while let Some(idx) = run.queue.pop_front() {
                        run.expand(idx);
                    }
                    State::ResolvingAmbiguities
                }
                State::ResolvingAmbiguities => {
                    run.resolve_pending();
                    if run.queue.is_empty() {
                        State::ApplyingObsoletes
                    } else {
                        State::ExpandingRequires
                    }
                }
                State::ApplyingObsoletes => {
                    run.apply_obsoletes();
                    rounds += 1;
                    if run.requeue_incomplete() && rounds <= run.planned.len() + 1 {
                        State::ExpandingRequires
                    } else {
                        State::PruningAlreadySatisfied
                    }
                }
                State::PruningAlreadySatisfied => {
                    run.prune();
                    break;
                }
            };
        }

        run.finish()
    }
}

#[derive(Debug)]
struct Planned {
    record: RecordRef,
    reason: Reason,
    root: bool,
    auto_selected: bool,
    /// Installed package of the same name this one replaces
    replaces: Option<RecordRef>,
    failed: bool,
    pending: bool,
    obsoletes_applied: bool,
}

#[derive(Debug)]
struct Pending {
    from: usize,
    requirement: Capability,
    candidates: Vec<RecordRef>,
}

#[derive(Debug)]
struct Removal {
    record: RecordRef,
    reason: Reason,
    cause: usize,
}

enum Pick {
    One(RecordRef),
    Choice(ChoiceSet),
}

/// Working state of one resolution
struct Run<'r, 'a> {
    resolver: &'r Resolver<'a>,
    request: &'r Request,
    active: BTreeSet<String>,
    planned: Vec<Planned>,
    by_name: HashMap<String, usize>,
    edges: BTreeSet<(usize, usize)>,
    queue: VecDeque<usize>,
    pending: Vec<Pending>,
    removals: BTreeMap<String, Removal>,
    unresolved: Vec<Unresolved>,
    choices: Vec<ChoiceSet>,
    conflicts: Vec<Conflict>,
    skipped: Vec<Skipped>,
    warnings: Vec<String>,
}

impl<'r, 'a> Run<'r, 'a> {
    fn new(resolver: &'r Resolver<'a>, request: &'r Request, active: BTreeSet<String>) -> Self {
        Self {
            resolver,
            request,
            active,
            planned: Vec::new(),
            by_name: HashMap::new(),
            edges: BTreeSet::new(),
            queue: VecDeque::new(),
            pending: Vec::new(),
            removals: BTreeMap::new(),
            unresolved: Vec::new(),
            choices: Vec::new(),
            conflicts: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn policy(&self) -> &ResolvePolicy {
        &self.resolver.policy
    }

    fn is_active(&self, record: &RecordRef) -> bool {
        self.active.contains(&record.medium)
    }

    fn is_removable(&self, record: &RecordRef) -> bool {
        self.resolver
            .registry
            .get(&record.medium)
            .is_some_and(|m| m.is_removable())
    }

    fn candidates_for(&self, capability: &Capability) -> Vec<RecordRef> {
        self.resolver
            .index
            .find_providers(capability)
            .into_iter()
            .filter(|r| self.is_active(r))
            .collect()
    }

    /// Newest installed package named `name`
    fn installed_named(&self, name: &str) -> Option<RecordRef> {
        self.resolver
            .installed
            .find_by_name(name)
            .into_iter()
            .max_by(|a, b| a.evr().cmp(&b.evr()))
            .cloned()
    }

    fn record_unresolved(&mut self, capability: String, required_by: Option<String>) {
        let entry = Unresolved {
            capability,
            required_by,
        };
        if !self.unresolved.contains(&entry) {
            self.unresolved.push(entry);
        }
    }

    // --- Selected -------------------------------------------------------

    fn select(&mut self) {
        let request = self.request;

        for selection in &request.selections {
            match selection {
                Selection::Name(name) => {
                    let mut candidates: Vec<RecordRef> = self
                        .resolver
                        .index
                        .find_by_name(name)
                        .into_iter()
                        .filter(|r| self.is_active(r))
                        .collect();
                    if candidates.is_empty() && request.search_provides {
                        candidates = self.candidates_for(&Capability::unversioned(name.as_str()));
                    }
                    if candidates.is_empty() {
                        info!("no package named {}", name);
                        self.record_unresolved(name.clone(), None);
                        continue;
                    }
                    self.select_root(&Capability::unversioned(name.as_str()), candidates);
                }
                Selection::File(path) => {
                    let candidates: Vec<RecordRef> = self
                        .resolver
                        .index
                        .find_by_file(path)
                        .into_iter()
                        .filter(|r| self.is_active(r))
                        .collect();
                    if candidates.is_empty() {
                        info!("no package contains {}", path);
                        self.record_unresolved(path.clone(), None);
                        continue;
                    }
                    for candidate in &candidates {
                        info!("selecting {} by selection on files", candidate.fullname());
                    }
                    self.select_root(&Capability::unversioned(path.as_str()), candidates);
                }
                Selection::Capability(capability) => {
                    let candidates = self.candidates_for(capability);
                    if candidates.is_empty() {
                        info!("no package provides {}", capability.to_display_string());
                        self.record_unresolved(capability.to_display_string(), None);
                        continue;
                    }
                    self.select_root(capability, candidates);
                }
            }
        }

        if request.upgrade_all {
            self.select_upgrades();
        }
    }

    fn select_root(&mut self, capability: &Capability, candidates: Vec<RecordRef>) {
        let record = match self.tie_break(capability, None, candidates) {
            Pick::One(record) => record,
            Pick::Choice(choice) => {
                self.push_choice(choice);
                return;
            }
        };

        if let Some(installed) = self.installed_named(&record.name) {
            match record.evr().cmp(&installed.evr()) {
                std::cmp::Ordering::Equal => {
                    info!("package {} is already installed", record.fullname());
                    self.skipped.push(Skipped {
                        package: record.fullname(),
                        reason: "everything already installed".to_string(),
                    });
                    return;
                }
                std::cmp::Ordering::Less => {
                    info!(
                        "package {} is already installed with a better version ({})",
                        record.fullname(),
                        installed.fullname()
                    );
                    self.skipped.push(Skipped {
                        package: record.fullname(),
                        reason: "better version already installed".to_string(),
                    });
                    return;
                }
                std::cmp::Ordering::Greater => {}
            }
        }

        let idx = self.add_planned(record, Reason::Explicit);
        self.planned[idx].root = true;
    }

    fn select_upgrades(&mut self) {
        let names: BTreeSet<String> = self
            .resolver
            .installed
            .iter()
            .map(|p| p.name.clone())
            .collect();

        for name in names {
            let Some(installed) = self.installed_named(&name) else {
                continue;
            };
            let candidates: Vec<RecordRef> = self
                .resolver
                .index
                .find_by_name(&name)
                .into_iter()
                .filter(|r| self.is_active(r))
                .collect();
            let Some(best) = self.prefer(candidates).into_iter().next() else {
                continue;
            };
            if best.evr() > installed.evr() && !self.by_name.contains_key(&name) {
                debug!("auto-selecting {} to upgrade {}", best.fullname(), installed.fullname());
                let idx = self.add_planned(best, Reason::Explicit);
                self.planned[idx].root = true;
                self.planned[idx].auto_selected = true;
            }
        }
    }

    fn add_planned(&mut self, record: RecordRef, reason: Reason) -> usize {
        if let Some(&idx) = self.by_name.get(&record.name) {
            return idx;
        }
        let idx = self.planned.len();
        debug!("adding {} ({})", record.fullname(), reason);
        self.by_name.insert(record.name.clone(), idx);
        self.planned.push(Planned {
            replaces: self.installed_named(&record.name),
            record,
            reason,
            root: false,
            auto_selected: false,
            failed: false,
            pending: false,
            obsoletes_applied: false,
        });
        self.queue.push_back(idx);
        idx
    }

    // --- ExpandingRequires ----------------------------------------------

    fn expand(&mut self, idx: usize) {
        if self.planned[idx].failed {
            return;
        }
        let record = Arc::clone(&self.planned[idx].record);

        for requirement in &record.requires {
            if requirement.is_rpmlib() || self.satisfy_from_plan(idx, requirement) {
                continue;
            }
            if self.installed_satisfies(requirement) {
                debug!(
                    "{} of {} already satisfied by installed packages",
                    requirement.to_display_string(),
                    record.fullname()
                );
                continue;
            }

            let candidates = self.candidates_for(requirement);
            if candidates.is_empty() {
                warn!(
                    "unable to satisfy {} required by {}",
                    requirement.to_display_string(),
                    record.fullname()
                );
                self.record_unresolved(requirement.to_display_string(), Some(record.fullname()));
                self.planned[idx].failed = true;
                continue;
            }

            self.pending.push(Pending {
                from: idx,
                requirement: requirement.clone(),
                candidates,
            });
        }
    }

    /// Link `idx` to a planned package satisfying `requirement`, if any
    fn satisfy_from_plan(&mut self, idx: usize, requirement: &Capability) -> bool {
        let provider = self
            .planned
            .iter()
            .position(|p| p.record.satisfies(requirement));
        match provider {
            Some(j) => {
                self.edges.insert((idx, j));
                true
            }
            None => false,
        }
    }

    /// Is `requirement` met by an installed package that stays installed?
    fn installed_satisfies(&self, requirement: &Capability) -> bool {
        self.resolver
            .installed
            .providers(requirement)
            .into_iter()
            .any(|installed| self.installed_stays(installed))
    }

    fn installed_stays(&self, installed: &RecordRef) -> bool {
        if self.removals.contains_key(&installed.fullname()) {
            return false;
        }
        // replaced by an upgrade of the same name
        if let Some(&j) = self.by_name.get(&installed.name)
            && self.planned[j].record.fullname() != installed.fullname()
        {
            return false;
        }
        if self.policy().precedence == Precedence::ObsoletesFirst {
            return !self.planned.iter().any(|p| {
                p.record.name != installed.name && installed.matched_by(&p.record.obsoletes)
            });
        }
        true
    }

    // --- ResolvingAmbiguities -------------------------------------------

    fn resolve_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);

        for item in pending {
            if self.planned[item.from].failed {
                continue;
            }
            // an earlier pick may already cover it
            if self.satisfy_from_plan(item.from, &item.requirement) {
                continue;
            }

            let required_by = self.planned[item.from].record.fullname();
            match self.tie_break(&item.requirement, Some(&required_by), item.candidates) {
                Pick::One(record) => {
                    let j = self.add_planned(record, Reason::Dependency);
                    if self.planned[j].record.satisfies(&item.requirement) {
                        self.edges.insert((item.from, j));
                    } else {
                        self.conflicts.push(Conflict::IncompatibleVersions {
                            planned: self.planned[j].record.fullname(),
                            required: item.requirement.to_display_string(),
                            required_by,
                        });
                        self.planned[item.from].failed = true;
                    }
                }
                Pick::Choice(choice) => {
                    self.planned[item.from].pending = true;
                    self.push_choice(choice);
                }
            }
        }
    }

    fn push_choice(&mut self, choice: ChoiceSet) {
        info!("{}", choice);
        if !self.choices.contains(&choice) {
            self.choices.push(choice);
        }
    }

    /// Providers reduced to the best candidate per package name
    ///
    /// Non-removable media win over removable ones; within a name the
    /// highest version wins, earlier media breaking ties.
    fn prefer(&self, candidates: Vec<RecordRef>) -> Vec<RecordRef> {
        let mut candidates = candidates;
        if candidates.iter().any(|c| !self.is_removable(c)) {
            candidates.retain(|c| !self.is_removable(c));
        }

        let mut best: Vec<RecordRef> = Vec::new();
        for candidate in candidates {
            match best.iter_mut().find(|b| b.name == candidate.name) {
                Some(current) => {
                    if candidate.evr() > current.evr() {
                        *current = candidate;
                    }
                }
                None => best.push(candidate),
            }
        }
        best
    }

    fn tie_break(
        &self,
        requirement: &Capability,
        required_by: Option<&str>,
        candidates: Vec<RecordRef>,
    ) -> Pick {
        let mut best = self.prefer(candidates);
        if best.len() == 1 {
            return Pick::One(best.remove(0));
        }

        if let Some(exact) = best.iter().find(|b| b.name == requirement.name) {
            return Pick::One(Arc::clone(exact));
        }

        let installed = self.resolver.installed;
        let localized: Vec<RecordRef> = best
            .iter()
            .filter(|b| self.policy().unselected_locale(b, installed).is_none())
            .cloned()
            .collect();
        if !localized.is_empty() {
            best = localized;
        }
        if best.len() == 1 {
            return Pick::One(best.remove(0));
        }

        best.sort_by(|a, b| a.name.cmp(&b.name));
        let key = requirement.to_display_string();

        if let Some(answer) = self.request.decisions.get(&key)
            && let Some(chosen) = best
                .iter()
                .find(|b| &b.name == answer || &b.fullname() == answer)
        {
            debug!("choice for {} answered with {}", key, chosen.fullname());
            return Pick::One(Arc::clone(chosen));
        }

        if self.policy().auto_choose {
            debug!("choosing {} for {}", best[0].fullname(), key);
            return Pick::One(best.remove(0));
        }

        Pick::Choice(ChoiceSet {
            capability: key,
            required_by: required_by.map(str::to_string),
            candidates: best.iter().map(|b| b.name.clone()).collect(),
        })
    }

    // --- ApplyingObsoletes ----------------------------------------------

    fn apply_obsoletes(&mut self) {
        let installed = self.resolver.installed;

        for idx in 0..self.planned.len() {
            if self.planned[idx].obsoletes_applied {
                continue;
            }
            self.planned[idx].obsoletes_applied = true;
            let record = Arc::clone(&self.planned[idx].record);

            for old in installed.iter() {
                if old.name == record.name || self.removals.contains_key(&old.fullname()) {
                    continue;
                }
                if old.matched_by(&record.obsoletes) {
                    info!(
                        "selecting {} using obsoletes to remove {}",
                        record.fullname(),
                        old.fullname()
                    );
                    self.removals.insert(
                        old.fullname(),
                        Removal {
                            record: Arc::clone(old),
                            reason: Reason::Obsoletes,
                            cause: idx,
                        },
                    );
                }
            }

            if let Some(old) = self.planned[idx].replaces.clone()
                && !upgrades_cleanly(&old, &record)
            {
                let message = format!(
                    "removing {} to upgrade to {} since it will not upgrade correctly!",
                    old.fullname(),
                    record.fullname()
                );
                warn!("{}", message);
                self.warnings.push(message);
                self.removals.insert(
                    old.fullname(),
                    Removal {
                        record: old,
                        reason: Reason::ConflictResolution,
                        cause: idx,
                    },
                );
            }
        }
    }

    /// Queue planned packages whose requirements lost their provider
    fn requeue_incomplete(&mut self) -> bool {
        let mut again = false;

        for idx in 0..self.planned.len() {
            let p = &self.planned[idx];
            if p.failed || p.pending {
                continue;
            }
            let broken = p.record.requires.iter().any(|req| {
                !req.is_rpmlib()
                    && !self.planned.iter().any(|q| q.record.satisfies(req))
                    && !self.installed_satisfies(req)
            });
            if broken {
                debug!("re-expanding {}", p.record.fullname());
                self.queue.push_back(idx);
                again = true;
            }
        }
        again
    }

    // --- PruningAlreadySatisfied ----------------------------------------

    fn prune(&mut self) {
        for idx in 0..self.planned.len() {
            if !self.planned[idx].auto_selected {
                continue;
            }
            let record = Arc::clone(&self.planned[idx].record);

            let reason = if let Some(old) = &self.planned[idx].replaces
                && !self.policy().update_ratio_ok(old, &record)
            {
                Some(format!(
                    "avoid selecting {} as not enough files will be updated",
                    record.fullname()
                ))
            } else {
                self.policy()
                    .unselected_locale(&record, self.resolver.installed)
                    .map(|_| {
                        format!(
                            "avoid selecting {} as its locales language is not already selected",
                            record.fullname()
                        )
                    })
            };

            if let Some(reason) = reason {
                info!("{}", reason);
                self.planned[idx].root = false;
                self.skipped.push(Skipped {
                    package: record.fullname(),
                    reason,
                });
            }
        }
    }

    // --- Closed / Conflict / Unresolvable -------------------------------

    /// Link every planned package to a planned provider of each requirement
    ///
    /// A requirement first met by an installed package may since be met by
    /// a planned upgrade of it.
    fn link_planned_providers(&mut self) {
        let count = self.planned.len();
        for idx in 0..count {
            let record = Arc::clone(&self.planned[idx].record);
            for requirement in record.requires.iter().filter(|r| !r.is_rpmlib()) {
                let provider = (0..count).find(|&j| {
                    let p = &self.planned[j];
                    j != idx && !p.failed && !p.pending && p.record.satisfies(requirement)
                });
                if let Some(j) = provider {
                    self.edges.insert((idx, j));
                }
            }
        }
    }

    fn finish(mut self) -> Result<Resolution, ResolveError> {
        self.link_planned_providers();
        let count = self.planned.len();
        let mut graph = DependencyGraph::with_nodes(count);
        for &(from, to) in &self.edges {
            graph.add_edge(from, to);
        }

        let bad = graph.tainted(|i| self.planned[i].failed || self.planned[i].pending);
        let roots: Vec<usize> = (0..count).filter(|&i| self.planned[i].root).collect();
        let keep = graph.reachable(roots, |i| !bad[i]);

        // pruned selections still needed by something else stay in
        self.skipped
            .retain(|s| !(0..count).any(|i| keep[i] && self.planned[i].record.fullname() == s.package));

        self.check_conflicts(&keep);

        if self.policy().strict {
            if !self.unresolved.is_empty() {
                return Err(ResolveError::Unresolvable {
                    missing: self.unresolved,
                });
            }
            if !self.choices.is_empty() {
                return Err(ResolveError::ChoiceRequired {
                    choices: self.choices,
                });
            }
            if !self.conflicts.is_empty() {
                return Err(ResolveError::Conflict {
                    conflicts: self.conflicts,
                });
            }
        }

        let components = graph.install_order();
        let mut steps = Vec::new();

        for (component, ids) in components.iter().enumerate() {
            for &id in ids {
                if !keep[id] {
                    continue;
                }
                let planned = &self.planned[id];
                let action = match &planned.replaces {
                    Some(old) if !self.removals.contains_key(&old.fullname()) => Action::Upgrade,
                    _ => Action::Install,
                };
                let reason = if planned.root {
                    Reason::Explicit
                } else {
                    Reason::Dependency
                };
                steps.push(PlanStep {
                    action,
                    package: Arc::clone(&planned.record),
                    reason,
                    related: planned.replaces.clone(),
                    component,
                });
            }
        }

        for removal in self.removals.values() {
            if !keep[removal.cause] {
                continue;
            }
            steps.push(PlanStep {
                action: Action::Remove,
                package: Arc::clone(&removal.record),
                reason: removal.reason,
                related: Some(Arc::clone(&self.planned[removal.cause].record)),
                component: components.len(),
            });
        }

        let outcome = if !self.conflicts.is_empty() {
            Outcome::Conflict
        } else if !self.unresolved.is_empty() {
            Outcome::Unresolvable
        } else {
            Outcome::Closed
        };

        let plan = ResolutionPlan { steps };
        info!(
            "resolution {}: {} steps, {} unresolved, {} conflicts, {} choices",
            outcome,
            plan.len(),
            self.unresolved.len(),
            self.conflicts.len(),
            self.choices.len()
        );

        Ok(Resolution {
            outcome,
            plan,
            unresolved: self.unresolved,
            conflicts: self.conflicts,
            choices: self.choices,
            skipped: self.skipped,
            warnings: self.warnings,
        })
    }

    fn check_conflicts(&mut self, keep: &[bool]) {
        let kept: Vec<usize> = (0..self.planned.len()).filter(|&i| keep[i]).collect();

        for (pos, &a) in kept.iter().enumerate() {
            for &b in &kept[pos + 1..] {
                let (ra, rb) = (&self.planned[a].record, &self.planned[b].record);
                if ra.name == rb.name {
                    continue;
                }
                let hit = ra
                    .conflicts
                    .iter()
                    .find(|c| rb.satisfies(c))
                    .map(|c| (ra, rb, c))
                    .or_else(|| rb.conflicts.iter().find(|c| ra.satisfies(c)).map(|c| (rb, ra, c)));
                if let Some((x, y, cap)) = hit {
                    self.conflicts.push(Conflict::Planned {
                        package: x.fullname(),
                        conflicts_with: y.fullname(),
                        capability: cap.to_display_string(),
                    });
                }
            }
        }

        let installed = self.resolver.installed;
        for old in installed.iter() {
            if self
                .removals
                .get(&old.fullname())
                .is_some_and(|r| keep[r.cause])
            {
                continue;
            }
            if let Some(&j) = self.by_name.get(&old.name)
                && keep[j]
            {
                continue;
            }

            for &a in &kept {
                let record = Arc::clone(&self.planned[a].record);
                let capability = record
                    .conflicts
                    .iter()
                    .find(|c| old.satisfies(c))
                    .or_else(|| old.conflicts.iter().find(|c| record.satisfies(c)));
                let Some(capability) = capability else {
                    continue;
                };

                if self.policy().remove_conflicting_installed {
                    info!(
                        "removing {} to resolve conflict with {}",
                        old.fullname(),
                        record.fullname()
                    );
                    self.removals.insert(
                        old.fullname(),
                        Removal {
                            record: Arc::clone(old),
                            reason: Reason::ConflictResolution,
                            cause: a,
                        },
                    );
                    break;
                }
                self.conflicts.push(Conflict::Installed {
                    package: record.fullname(),
                    installed: old.fullname(),
                    capability: capability.to_display_string(),
                });
            }
        }
    }
}

/// Can `new` replace `old` in place? Architectures must be compatible and,
/// when both complete file lists are known, `new` must ship every file of
/// `old`.
fn upgrades_cleanly(old: &RecordRef, new: &RecordRef) -> bool {
    let arch_ok = old.arch == new.arch || old.arch == "noarch" || new.arch == "noarch";
    let files_ok = !old.has_file_list()
        || !new.has_file_list()
        || old.files.iter().all(|f| new.files.contains(f));
    arch_ok && files_ok
}
