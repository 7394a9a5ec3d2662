//! Agent collaboration bookkeeping.
//!
//! Keeps a process-local registry of agents, their capabilities, and the
//! tasks currently handed to them, fed by the runtime's lifecycle events.
//! Nothing here is persisted; the registry dies with the process.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use agentrun_core::{AgentAvailability, RuntimeError, RuntimeEvent, TaskId};

use crate::bus::EventBus;

/// One agent's registration state.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    /// Agent identifier.
    pub agent_id: String,
    /// Current availability.
    pub availability: AgentAvailability,
    /// Capability tags the agent registered with.
    pub capabilities: BTreeSet<String>,
    /// Tasks currently handed to this agent, oldest first.
    pub current_tasks: Vec<TaskId>,
}

impl AgentState {
    fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            availability: AgentAvailability::Idle,
            capabilities: BTreeSet::new(),
            current_tasks: Vec::new(),
        }
    }
}

/// Event-driven registry of collaborating agents.
pub struct AgentCollaboration {
    bus: EventBus,
    agents: Arc<RwLock<HashMap<String, AgentState>>>,
}

impl AgentCollaboration {
    /// Create a registry on the given bus.
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            agents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawn the listener applying task lifecycle events to the registry.
    pub fn spawn(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let agents = self.agents.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => Self::apply(&agents, event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Collaboration listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn apply(agents: &RwLock<HashMap<String, AgentState>>, event: RuntimeEvent) {
        match event {
            RuntimeEvent::TaskStarted {
                task_id,
                agent_id: Some(agent_id),
            } => {
                let mut agents = agents.write().await;
                let agent = agents
                    .entry(agent_id.clone())
                    .or_insert_with(|| AgentState::new(agent_id));
                if !agent.current_tasks.contains(&task_id) {
                    agent.current_tasks.push(task_id);
                }
                agent.availability = AgentAvailability::Busy;
            }
            RuntimeEvent::TaskCompleted {
                task_id,
                agent_id: Some(agent_id),
                ..
            }
            | RuntimeEvent::TaskFailed {
                task_id,
                agent_id: Some(agent_id),
                ..
            } => {
                let mut agents = agents.write().await;
                if let Some(agent) = agents.get_mut(&agent_id) {
                    agent.current_tasks.retain(|id| id != &task_id);
                    if agent.current_tasks.is_empty()
                        && agent.availability == AgentAvailability::Busy
                    {
                        agent.availability = AgentAvailability::Idle;
                    }
                }
            }
            other => {
                debug!(event_type = other.event_type(), "Ignoring event");
            }
        }
    }

    /// Register an agent with its capability tags.
    pub async fn register_agent(
        &self,
        agent_id: impl Into<String>,
        capabilities: impl IntoIterator<Item = String>,
    ) {
        let agent_id = agent_id.into();
        let capabilities: BTreeSet<String> = capabilities.into_iter().collect();
        {
            let mut agents = self.agents.write().await;
            let agent = agents
                .entry(agent_id.clone())
                .or_insert_with(|| AgentState::new(agent_id.clone()));
            agent.capabilities = capabilities.clone();
        }
        self.bus.publish(RuntimeEvent::AgentRegistered {
            agent_id,
            capabilities: capabilities.into_iter().collect(),
        });
    }

    /// Change an agent's availability.
    pub async fn set_availability(
        &self,
        agent_id: &str,
        availability: AgentAvailability,
    ) -> Result<(), RuntimeError> {
        {
            let mut agents = self.agents.write().await;
            let agent = agents
                .get_mut(agent_id)
                .ok_or_else(|| RuntimeError::AgentNotFound(agent_id.to_string()))?;
            agent.availability = availability;
        }
        self.bus.publish(RuntimeEvent::AgentStatusChanged {
            agent_id: agent_id.to_string(),
            availability,
        });
        Ok(())
    }

    /// Hand a task from one agent to another.
    pub async fn handoff_task(
        &self,
        task_id: &TaskId,
        from_agent: &str,
        to_agent: &str,
    ) -> Result<(), RuntimeError> {
        {
            let mut agents = self.agents.write().await;
            if !agents.contains_key(to_agent) {
                return Err(RuntimeError::AgentNotFound(to_agent.to_string()));
            }
            let from = agents
                .get_mut(from_agent)
                .ok_or_else(|| RuntimeError::AgentNotFound(from_agent.to_string()))?;
            let position = from
                .current_tasks
                .iter()
                .position(|id| id == task_id)
                .ok_or_else(|| RuntimeError::TaskNotFound(task_id.clone()))?;
            from.current_tasks.remove(position);
            if from.current_tasks.is_empty() && from.availability == AgentAvailability::Busy {
                from.availability = AgentAvailability::Idle;
            }

            let Some(to) = agents.get_mut(to_agent) else {
                return Err(RuntimeError::AgentNotFound(to_agent.to_string()));
            };
            to.current_tasks.push(task_id.clone());
            to.availability = AgentAvailability::Busy;
        }
        self.bus.publish(RuntimeEvent::TaskHandoff {
            task_id: task_id.clone(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
        });
        Ok(())
    }

    /// Snapshot of one agent.
    pub async fn agent(&self, agent_id: &str) -> Option<AgentState> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// Snapshot of the whole registry, sorted by agent id.
    pub async fn snapshot(&self) -> Vec<AgentState> {
        let agents = self.agents.read().await;
        let mut all: Vec<AgentState> = agents.values().cloned().collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }
}
