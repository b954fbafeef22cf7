// Task planning
//
// A planner turns a task description into sub-tasks assigned to registered
// agents. Whatever the strategy, its output passes through `validate_plan`
// before the task store accepts it.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use super::prompts::library;
use super::reasoning::{reason_with_fallback, ReasoningGateway};
use super::types::PlanRequest;
use crate::config::{PlannerConfig, PlannerStrategy};
use crate::domain::agent::{Agent, AgentId};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::task::{SubtaskId, SubtaskPlan};

#[async_trait]
pub trait TaskPlanner: Send + Sync {
    /// Decompose `request` using the registry snapshot `agents`
    async fn plan(&self, request: &PlanRequest, agents: &[Agent]) -> DomainResult<Vec<SubtaskPlan>>;
}

/// Never decomposes: the task has nothing to delegate
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPlanner;

#[async_trait]
impl TaskPlanner for NoopPlanner {
    async fn plan(&self, _request: &PlanRequest, _agents: &[Agent]) -> DomainResult<Vec<SubtaskPlan>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
struct Category {
    tag: String,
    keywords: Vec<String>,
}

/// Rule-based decomposition
///
/// Sentences (and clauses introduced by "then") become sequential stages;
/// inside a stage, steps joined by "and" or commas run in parallel. Each
/// step is classified by keyword into a category and handed to an agent
/// advertising that category. Steps matching no category stay with the
/// orchestrator and produce no sub-task.
#[derive(Debug, Clone)]
pub struct CapabilityPlanner {
    categories: Vec<Category>,
}

impl CapabilityPlanner {
    pub fn new(categories: &BTreeMap<String, Vec<String>>) -> Self {
        let categories = categories
            .iter()
            .map(|(tag, keywords)| Category {
                tag: tag.to_lowercase(),
                keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { categories }
    }

    pub fn with_default_categories() -> Self {
        Self::new(&PlannerConfig::default().categories)
    }

    /// Splits a description into stages of parallel steps
    fn stages(description: &str) -> Vec<Vec<String>> {
        split_sentences(description)
            .iter()
            .flat_map(|sentence| split_on_word(sentence, "then"))
            .map(|stage| {
                split_on_word(&stage, "and")
                    .iter()
                    .flat_map(|part| part.split(','))
                    .map(|step| step.trim().to_string())
                    .filter(|step| !step.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|steps| !steps.is_empty())
            .collect()
    }

    /// First word (in reading order) that is an inflection of a category keyword decides
    fn classify(&self, step: &str) -> Option<&Category> {
        words(step).find_map(|word| {
            self.categories.iter().find(|category| {
                category
                    .keywords
                    .iter()
                    .any(|keyword| is_inflection_of(&word, keyword))
            })
        })
    }

    fn is_capable(agent: &Agent, category: &Category) -> bool {
        agent.has_capability(&category.tag)
            || category
                .keywords
                .iter()
                .any(|keyword| agent.has_capability(keyword))
    }
}

#[async_trait]
impl TaskPlanner for CapabilityPlanner {
    async fn plan(&self, request: &PlanRequest, agents: &[Agent]) -> DomainResult<Vec<SubtaskPlan>> {
        let mut plan = Vec::new();
        let mut load: HashMap<&AgentId, usize> = HashMap::new();
        let mut previous_stage: Vec<SubtaskId> = Vec::new();

        for stage in Self::stages(&request.description) {
            let mut current_stage = Vec::new();

            for step in stage {
                let Some(category) = self.classify(&step) else {
                    tracing::debug!(task_id = %request.task_id, step = %step, "Step kept by orchestrator");
                    continue;
                };

                let agent = agents
                    .iter()
                    .filter(|agent| Self::is_capable(agent, category))
                    .min_by_key(|agent| load.get(&agent.id).copied().unwrap_or(0))
                    .ok_or_else(|| {
                        DomainError::NoCapableAgent(format!("'{}' (category '{}')", step, category.tag))
                    })?;
                *load.entry(&agent.id).or_insert(0) += 1;

                let id = SubtaskId(plan.len() as u32 + 1);
                plan.push(
                    SubtaskPlan::new(id, step, agent.id.as_str())
                        .depending_on(previous_stage.iter().copied()),
                );
                current_stage.push(id);
            }

            if !current_stage.is_empty() {
                previous_stage = current_stage;
            }
        }

        Ok(plan)
    }
}

#[derive(Debug, Deserialize)]
struct ProposedPlan {
    #[serde(default)]
    subtasks: Vec<ProposedSubtask>,
}

#[derive(Debug, Deserialize)]
struct ProposedSubtask {
    key: String,
    description: String,
    agent_id: String,
    #[serde(default)]
    depends_on: Vec<String>,
}

/// Asks the reasoning gateway for a plan
///
/// Degraded gateway responses and unreadable plans fall back to the
/// capability rules. A readable plan is returned as-is, so a cyclic proposal
/// is rejected by validation rather than silently replaced.
pub struct ReasoningPlanner {
    gateway: Arc<dyn ReasoningGateway>,
    fallback: CapabilityPlanner,
    system_prompt: String,
    timeout: Duration,
}

impl ReasoningPlanner {
    pub fn new(
        gateway: Arc<dyn ReasoningGateway>,
        fallback: CapabilityPlanner,
        system_prompt: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            fallback,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    /// Maps a proposed plan's string keys onto sub-task ids
    fn parse_plan(action: &str) -> DomainResult<Vec<SubtaskPlan>> {
        let proposed: ProposedPlan = serde_json::from_str(action)
            .map_err(|e| DomainError::InvalidPlan(format!("unreadable plan: {}", e)))?;

        let ids: HashMap<&str, SubtaskId> = proposed
            .subtasks
            .iter()
            .enumerate()
            .map(|(index, subtask)| (subtask.key.as_str(), SubtaskId(index as u32 + 1)))
            .collect();
        if ids.len() != proposed.subtasks.len() {
            return Err(DomainError::InvalidPlan("duplicate sub-task keys".to_string()));
        }

        proposed
            .subtasks
            .iter()
            .map(|subtask| {
                let depends_on = subtask
                    .depends_on
                    .iter()
                    .map(|key| {
                        ids.get(key.as_str()).copied().ok_or_else(|| {
                            DomainError::InvalidPlan(format!(
                                "'{}' depends on unknown key '{}'",
                                subtask.key, key
                            ))
                        })
                    })
                    .collect::<DomainResult<BTreeSet<_>>>()?;

                Ok(SubtaskPlan {
                    id: ids[subtask.key.as_str()],
                    description: subtask.description.clone(),
                    agent_id: subtask.agent_id.clone(),
                    depends_on,
                })
            })
            .collect()
    }
}

#[async_trait]
impl TaskPlanner for ReasoningPlanner {
    async fn plan(&self, request: &PlanRequest, agents: &[Agent]) -> DomainResult<Vec<SubtaskPlan>> {
        let template = library::task_decomposition();
        let roster: Vec<serde_json::Value> = agents
            .iter()
            .map(|agent| {
                serde_json::json!({
                    "agent_id": agent.id,
                    "description": agent.description,
                    "capabilities": agent.capabilities,
                })
            })
            .collect();
        let variables = HashMap::from([
            ("description".to_string(), request.description.clone()),
            ("priority".to_string(), request.priority.to_string()),
            ("agents".to_string(), serde_json::Value::from(roster.clone()).to_string()),
        ]);
        let context = serde_json::json!({
            "task_id": request.task_id,
            "description": request.description,
            "priority": request.priority,
            "agents": roster,
            "instructions": template.render(&variables),
        });
        let system_prompt = format!("{}\n\n{}", self.system_prompt, template.system);

        let step = reason_with_fallback(self.gateway.as_ref(), self.timeout, &system_prompt, &context).await;
        if step.degraded {
            tracing::warn!(task_id = %request.task_id, "Reasoning unavailable, using capability rules");
            return self.fallback.plan(request, agents).await;
        }

        match Self::parse_plan(&step.action) {
            Ok(plan) => {
                tracing::info!(
                    task_id = %request.task_id,
                    thought = %step.thought,
                    prompt = %format!("{}@{}", template.name, template.version),
                    "Plan proposed by reasoning gateway"
                );
                Ok(plan)
            }
            Err(e) => {
                tracing::warn!(task_id = %request.task_id, error = %e, "Discarding proposed plan");
                self.fallback.plan(request, agents).await
            }
        }
    }
}

/// Builds the planner selected by configuration
pub fn build_planner(
    config: &PlannerConfig,
    gateway: Arc<dyn ReasoningGateway>,
    system_prompt: &str,
    gateway_timeout: Duration,
) -> Arc<dyn TaskPlanner> {
    match config.strategy {
        PlannerStrategy::None => Arc::new(NoopPlanner),
        PlannerStrategy::Capability => Arc::new(CapabilityPlanner::new(&config.categories)),
        PlannerStrategy::Reasoning => Arc::new(ReasoningPlanner::new(
            gateway,
            CapabilityPlanner::new(&config.categories),
            system_prompt,
            gateway_timeout,
        )),
    }
}

/// Checks a plan and returns its sub-tasks in a dispatchable order
///
/// Rejects duplicate ids and dangling dependencies (`InvalidPlan`),
/// assignments to agents missing from the snapshot (`NoCapableAgent`), and
/// dependency cycles (`CyclicDependency`, detected with Kahn's algorithm).
pub fn validate_plan(plan: &[SubtaskPlan], agents: &[Agent]) -> DomainResult<Vec<SubtaskId>> {
    let mut in_degree: BTreeMap<SubtaskId, usize> = BTreeMap::new();
    for subtask in plan {
        if in_degree.insert(subtask.id, subtask.depends_on.len()).is_some() {
            return Err(DomainError::InvalidPlan(format!(
                "duplicate sub-task id {}",
                subtask.id
            )));
        }
    }

    let registered: HashSet<&str> = agents.iter().map(|agent| agent.id.as_str()).collect();
    let mut dependents: HashMap<SubtaskId, Vec<SubtaskId>> = HashMap::new();
    for subtask in plan {
        if !registered.contains(subtask.agent_id.as_str()) {
            return Err(DomainError::NoCapableAgent(format!(
                "{} is assigned to unregistered agent '{}'",
                subtask.id, subtask.agent_id
            )));
        }
        for dep in &subtask.depends_on {
            if !in_degree.contains_key(dep) {
                return Err(DomainError::InvalidPlan(format!(
                    "{} depends on unknown sub-task {}",
                    subtask.id, dep
                )));
            }
            dependents.entry(*dep).or_default().push(subtask.id);
        }
    }

    let mut queue: VecDeque<SubtaskId> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(plan.len());

    while let Some(id) = queue.pop_front() {
        order.push(id);
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if order.len() < plan.len() {
        let cycle: Vec<SubtaskId> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id)
            .collect();
        return Err(DomainError::CyclicDependency(cycle));
    }

    Ok(order)
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let boundary = match c {
            ';' | '\n' => true,
            '.' => chars.peek().map_or(true, |next| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            sentences.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    sentences.push(current);

    sentences
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits on a standalone word, ignoring case and surrounding commas
fn split_on_word(text: &str, separator: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        if word.trim_matches(',').eq_ignore_ascii_case(separator) {
            parts.push(current.join(" "));
            current.clear();
        } else {
            current.push(word);
        }
    }
    parts.push(current.join(" "));

    parts
        .into_iter()
        .map(|part| part.trim().trim_matches(',').trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

const INFLECTIONS: [&str; 6] = ["s", "es", "ed", "d", "ing", "ion"];

/// `word` equals `keyword` or `keyword` plus a regular suffix ("tests",
/// "fixed", "coding", "validation"); a final `e` may be dropped before it
fn is_inflection_of(word: &str, keyword: &str) -> bool {
    if word == keyword {
        return true;
    }
    let stems = [Some(keyword), keyword.strip_suffix('e')];
    stems.into_iter().flatten().any(|stem| {
        word.strip_prefix(stem)
            .map_or(false, |suffix| INFLECTIONS.contains(&suffix))
    })
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}
