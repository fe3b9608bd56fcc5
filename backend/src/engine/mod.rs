// Workflow engine: rule-driven automation for lead handling
//
// A lead event (created, updated, inactive) selects the active rules of the
// relevant types, evaluates each rule's conditions against the lead, and
// dispatches the actions of every match. Escalations run on their own
// level/delay sequences driven by the periodic checker job.

pub mod actions;
pub mod collaborators;
pub mod conditions;
pub mod dispatcher;
pub mod escalation;
pub mod events;
pub mod rules;
pub mod selector;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use leadflow_shared::WorkflowExecution;

pub use actions::{ActionKind, ActionResult, AssignStrategy, WorkflowAction};
pub use collaborators::{
    AgentPool, ExecutionLog, LeadProvider, NewReminder, Notifier, ReminderStore, RuleStore,
};
pub use dispatcher::ActionDispatcher;
pub use escalation::{EscalationAction, EscalationLevel, EscalationRule, EscalationTrigger};
pub use events::{LeadEvent, LeadEventType};
pub use rules::{ConditionLogic, ConditionOperator, RuleType, WorkflowCondition, WorkflowRule};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("collaborator failure: {0}")]
    Collaborator(String),

    #[error("action timed out")]
    ActionTimeout,

    #[error("invalid escalation levels: {0}")]
    InvalidEscalationLevels(String),

    #[error("unknown lead {0}")]
    UnknownLead(Uuid),
}

impl EngineError {
    pub fn collaborator(err: impl std::fmt::Display) -> Self {
        Self::Collaborator(err.to_string())
    }
}

/// Entry point tying selection and dispatch together. All collaborators are
/// injected, so the engine itself carries no database or SMTP knowledge.
pub struct WorkflowEngine {
    rules: Arc<dyn RuleStore>,
    leads: Arc<dyn LeadProvider>,
    dispatcher: ActionDispatcher,
}

impl WorkflowEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        leads: Arc<dyn LeadProvider>,
        dispatcher: ActionDispatcher,
    ) -> Self {
        Self { rules, leads, dispatcher }
    }

    /// Runs every rule that matches the event's lead. A failure inside one
    /// rule's dispatch is recorded on that rule's execution and never stops
    /// the remaining rules; `Err` is reserved for not finding the lead or
    /// failing to read the rule set.
    pub async fn process_event(
        &self,
        event: &LeadEvent,
    ) -> Result<Vec<WorkflowExecution>, EngineError> {
        let lead = self
            .leads
            .get_lead(event.lead_id)
            .await?
            .ok_or(EngineError::UnknownLead(event.lead_id))?;
        let record = lead.to_record();

        let mut executions = Vec::new();
        for rule_type in event.event_type.rule_types() {
            let rules = self.rules.list_rules(Some(*rule_type)).await?;
            let matched = selector::select_rules(&rules, *rule_type, &record);
            if !matched.is_empty() {
                info!(
                    lead_id = %lead.id,
                    event = ?event.event_type,
                    rule_type = ?rule_type,
                    matched = matched.len(),
                    "dispatching matched workflow rules"
                );
            }
            for rule in matched {
                match self.dispatcher.dispatch(rule, &lead).await {
                    Ok(execution) => executions.push(execution),
                    Err(err) => {
                        error!(rule = %rule.name, lead_id = %lead.id, %err, "workflow dispatch errored");
                    }
                }
            }
        }
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use leadflow_shared::ExecutionStatus;
    use serde_json::json;

    fn engine(world: &World) -> WorkflowEngine {
        let dispatcher = ActionDispatcher::new(
            world.leads.clone(),
            world.agents.clone(),
            world.notifier.clone(),
            world.reminders.clone(),
            world.log.clone(),
        );
        WorkflowEngine::new(world.rules.clone(), world.leads.clone(), dispatcher)
    }

    fn us_assignment_rule(agent_id: uuid::Uuid) -> WorkflowRule {
        WorkflowRule::new("assign US leads", RuleType::LeadAssignment)
            .with_priority(1)
            .with_conditions(vec![WorkflowCondition::equals("country", json!("US"))])
            .with_actions(vec![WorkflowAction::AssignAgent {
                strategy: AssignStrategy::SpecificAgent { agent_id },
            }])
    }

    #[tokio::test]
    async fn us_lead_is_assigned_to_the_specific_agent() {
        let world = World::new();
        let agent = world.seed_agent("agent42@leadflow.test");
        let lead = world.seed_lead("US", "new", 0.0);
        world.rules.create_rule(&us_assignment_rule(agent.id)).await.unwrap();

        let executions =
            engine(&world).process_event(&LeadEvent::created(lead.id)).await.unwrap();

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        let result_data = executions[0].result_data.clone().unwrap();
        assert_eq!(result_data[0]["output"]["agent_id"], json!(agent.id));
        assert_eq!(world.leads.get(lead.id).assigned_agent, Some(agent.id));
    }

    #[tokio::test]
    async fn uk_lead_matches_nothing_and_nothing_runs() {
        let world = World::new();
        let agent = world.seed_agent("agent42@leadflow.test");
        let lead = world.seed_lead("UK", "new", 0.0);
        world.rules.create_rule(&us_assignment_rule(agent.id)).await.unwrap();

        let executions =
            engine(&world).process_event(&LeadEvent::created(lead.id)).await.unwrap();

        assert!(executions.is_empty());
        assert!(world.log.executions().is_empty());
        assert_eq!(world.leads.get(lead.id).assigned_agent, None);
    }

    #[tokio::test]
    async fn unknown_lead_is_an_error() {
        let world = World::new();
        let err = engine(&world)
            .process_event(&LeadEvent::created(uuid::Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownLead(_)));
    }

    #[tokio::test]
    async fn one_failing_rule_never_blocks_the_others() {
        let world = World::new();
        let lead = world.seed_lead("US", "new", 0.0);
        world.notifier.fail_with("smtp down");

        // higher-priority rule fails at runtime, the follow-up rule still runs
        let failing = WorkflowRule::new("notify", RuleType::EmailAutomation)
            .with_priority(10)
            .with_actions(vec![WorkflowAction::SendEmail {
                to: "{{email}}".into(),
                subject: "Hi".into(),
                body: "Hello".into(),
            }]);
        let surviving = WorkflowRule::new("tag contacted", RuleType::EmailAutomation)
            .with_priority(1)
            .with_actions(vec![WorkflowAction::UpdateStatus { status: "contacted".into() }]);
        world.rules.create_rule(&failing).await.unwrap();
        world.rules.create_rule(&surviving).await.unwrap();

        let executions =
            engine(&world).process_event(&LeadEvent::updated(lead.id)).await.unwrap();

        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
        assert_eq!(executions[1].status, ExecutionStatus::Completed);
        assert_eq!(world.leads.get(lead.id).status, "contacted");
    }

    #[tokio::test]
    async fn created_event_considers_assignment_then_email_rules() {
        let world = World::new();
        world.seed_agent("pool@leadflow.test");
        let lead = world.seed_lead("US", "new", 0.0);

        let assign = WorkflowRule::new("round robin", RuleType::LeadAssignment).with_actions(
            vec![WorkflowAction::AssignAgent { strategy: AssignStrategy::RoundRobin }],
        );
        let welcome = WorkflowRule::new("welcome mail", RuleType::EmailAutomation).with_actions(
            vec![WorkflowAction::SendEmail {
                to: "{{email}}".into(),
                subject: "Welcome {{first_name}}".into(),
                body: "An advisor will reach out.".into(),
            }],
        );
        // a follow_up rule must not fire on lead_created
        let follow_up = WorkflowRule::new("later", RuleType::FollowUp);
        world.rules.create_rule(&assign).await.unwrap();
        world.rules.create_rule(&welcome).await.unwrap();
        world.rules.create_rule(&follow_up).await.unwrap();

        let executions =
            engine(&world).process_event(&LeadEvent::created(lead.id)).await.unwrap();

        assert_eq!(executions.len(), 2);
        assert!(world.leads.get(lead.id).assigned_agent.is_some());
        assert_eq!(world.notifier.sent().len(), 1);
    }
}
