// In-memory collaborator fakes shared by the engine tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use leadflow_shared::{Agent, FollowUpReminder, Lead, LeadTask, ReminderStatus, WorkflowExecution};

use super::collaborators::{
    AgentPool, ExecutionLog, LeadProvider, NewReminder, Notifier, ReminderStore, RuleStore,
};
use super::rules::{RuleType, WorkflowRule};
use super::EngineError;

pub struct World {
    pub rules: Arc<InMemoryRules>,
    pub leads: Arc<InMemoryLeads>,
    pub agents: Arc<InMemoryAgents>,
    pub notifier: Arc<RecordingNotifier>,
    pub reminders: Arc<InMemoryReminders>,
    pub log: Arc<InMemoryLog>,
}

impl World {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(InMemoryRules::default()),
            leads: Arc::new(InMemoryLeads::default()),
            agents: Arc::new(InMemoryAgents::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            reminders: Arc::new(InMemoryReminders::default()),
            log: Arc::new(InMemoryLog::default()),
        }
    }

    pub fn seed_lead(&self, country: &str, status: &str, balance: f64) -> Lead {
        let lead = Lead {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Bell".into(),
            email: format!("ada+{}@example.com", &Uuid::new_v4().simple().to_string()[..8]),
            phone: None,
            country: country.into(),
            status: status.into(),
            kyc_status: "pending".into(),
            balance: Decimal::from_f64(balance).unwrap_or_default(),
            assigned_agent: None,
            source: None,
            last_contact_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.leads.insert(lead.clone());
        lead
    }

    pub fn seed_agent(&self, email: &str) -> Agent {
        let agent = Agent {
            id: Uuid::new_v4(),
            email: email.into(),
            first_name: "Anna".into(),
            last_name: "Reed".into(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.agents.insert(agent.clone());
        agent
    }
}

#[derive(Default)]
pub struct InMemoryRules {
    rules: Mutex<Vec<WorkflowRule>>,
}

#[async_trait]
impl RuleStore for InMemoryRules {
    async fn list_rules(
        &self,
        rule_type: Option<RuleType>,
    ) -> Result<Vec<WorkflowRule>, EngineError> {
        let rules = self.rules.lock().unwrap();
        Ok(rules
            .iter()
            .filter(|r| rule_type.map_or(true, |t| r.rule_type == t))
            .cloned()
            .collect())
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<WorkflowRule>, EngineError> {
        Ok(self.rules.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn create_rule(&self, rule: &WorkflowRule) -> Result<(), EngineError> {
        self.rules.lock().unwrap().push(rule.clone());
        Ok(())
    }

    async fn update_rule(&self, rule: &WorkflowRule) -> Result<(), EngineError> {
        let mut rules = self.rules.lock().unwrap();
        if let Some(existing) = rules.iter_mut().find(|r| r.id == rule.id) {
            *existing = rule.clone();
        }
        Ok(())
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool, EngineError> {
        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        Ok(rules.len() < before)
    }
}

#[derive(Default)]
pub struct InMemoryLeads {
    leads: Mutex<HashMap<Uuid, Lead>>,
    tasks: Mutex<Vec<LeadTask>>,
}

impl InMemoryLeads {
    pub fn insert(&self, lead: Lead) {
        self.leads.lock().unwrap().insert(lead.id, lead);
    }

    pub fn get(&self, id: Uuid) -> Lead {
        self.leads.lock().unwrap().get(&id).cloned().expect("lead seeded")
    }

    pub fn set_agent(&self, lead_id: Uuid, agent_id: Uuid) {
        if let Some(lead) = self.leads.lock().unwrap().get_mut(&lead_id) {
            lead.assigned_agent = Some(agent_id);
        }
    }

    pub fn tasks(&self) -> Vec<LeadTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeadProvider for InMemoryLeads {
    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, EngineError> {
        Ok(self.leads.lock().unwrap().get(&id).cloned())
    }

    async fn open_leads(&self) -> Result<Vec<Lead>, EngineError> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.status != "converted" && l.status != "lost")
            .cloned()
            .collect())
    }

    async fn assign_agent(&self, lead_id: Uuid, agent_id: Uuid) -> Result<(), EngineError> {
        self.set_agent(lead_id, agent_id);
        Ok(())
    }

    async fn update_status(&self, lead_id: Uuid, status: &str) -> Result<(), EngineError> {
        if let Some(lead) = self.leads.lock().unwrap().get_mut(&lead_id) {
            lead.status = status.to_string();
        }
        Ok(())
    }

    async fn create_task(&self, task: &LeadTask) -> Result<(), EngineError> {
        self.tasks.lock().unwrap().push(task.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAgents {
    agents: Mutex<Vec<Agent>>,
    loads: Mutex<HashMap<Uuid, usize>>,
    cursor: AtomicUsize,
}

impl InMemoryAgents {
    pub fn insert(&self, agent: Agent) {
        self.agents.lock().unwrap().push(agent);
    }

    pub fn set_load(&self, agent_id: Uuid, load: usize) {
        self.loads.lock().unwrap().insert(agent_id, load);
    }
}

#[async_trait]
impl AgentPool for InMemoryAgents {
    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, EngineError> {
        Ok(self.agents.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn next_round_robin_agent(&self) -> Result<Agent, EngineError> {
        let agents = self.agents.lock().unwrap();
        let active: Vec<&Agent> = agents.iter().filter(|a| a.is_active).collect();
        if active.is_empty() {
            return Err(EngineError::Collaborator("no active agents".into()));
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % active.len();
        Ok(active[index].clone())
    }

    async fn least_loaded_agent(&self) -> Result<Agent, EngineError> {
        let agents = self.agents.lock().unwrap();
        let loads = self.loads.lock().unwrap();
        agents
            .iter()
            .filter(|a| a.is_active)
            .min_by_key(|a| loads.get(&a.id).copied().unwrap_or(0))
            .cloned()
            .ok_or_else(|| EngineError::Collaborator("no active agents".into()))
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), EngineError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(EngineError::Collaborator(message));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryReminders {
    reminders: Mutex<Vec<FollowUpReminder>>,
}

impl InMemoryReminders {
    pub fn all(&self) -> Vec<FollowUpReminder> {
        self.reminders.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminders {
    async fn create_reminder(
        &self,
        reminder: NewReminder,
    ) -> Result<FollowUpReminder, EngineError> {
        let row = FollowUpReminder {
            id: Uuid::new_v4(),
            lead_id: reminder.lead_id,
            assigned_to: reminder.assigned_to,
            reminder_type: reminder.reminder_type,
            title: reminder.title,
            description: None,
            due_date: reminder.due_date,
            status: ReminderStatus::Pending,
            priority: reminder.priority,
            created_by: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.reminders.lock().unwrap().push(row.clone());
        Ok(row)
    }
}

/// Records every append/update so tests can assert on the full status
/// trajectory of an execution, not just its final shape.
#[derive(Default)]
pub struct InMemoryLog {
    history: Mutex<Vec<WorkflowExecution>>,
}

impl InMemoryLog {
    pub fn statuses(&self, execution_id: Uuid) -> Vec<leadflow_shared::ExecutionStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.id == execution_id)
            .map(|e| e.status)
            .collect()
    }

    pub fn executions(&self) -> Vec<WorkflowExecution> {
        let history = self.history.lock().unwrap();
        let mut latest: Vec<WorkflowExecution> = Vec::new();
        for entry in history.iter() {
            match latest.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => latest.push(entry.clone()),
            }
        }
        latest
    }
}

#[async_trait]
impl ExecutionLog for InMemoryLog {
    async fn append(&self, execution: &WorkflowExecution) -> Result<(), EngineError> {
        self.history.lock().unwrap().push(execution.clone());
        Ok(())
    }

    async fn update(&self, execution: &WorkflowExecution) -> Result<(), EngineError> {
        self.history.lock().unwrap().push(execution.clone());
        Ok(())
    }
}
