// Action dispatch: runs a matched rule's action sequence against a lead

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};

use leadflow_shared::{Lead, LeadTask, WorkflowExecution};

use super::actions::{ActionResult, WorkflowAction};
use super::collaborators::{AgentPool, ExecutionLog, LeadProvider, NewReminder, Notifier, ReminderStore};
use super::rules::WorkflowRule;
use super::EngineError;

const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes rule actions sequentially against a lead, recording the attempt
/// as a `WorkflowExecution` audit row.
///
/// Parameter validation runs before anything else: an invalid action fails
/// the whole execution without running any action, including the valid ones
/// before it. At runtime the sequence is fail-fast, and there is no rollback
/// of the side effects already applied.
pub struct ActionDispatcher {
    leads: Arc<dyn LeadProvider>,
    agents: Arc<dyn AgentPool>,
    notifier: Arc<dyn Notifier>,
    reminders: Arc<dyn ReminderStore>,
    log: Arc<dyn ExecutionLog>,
    action_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(
        leads: Arc<dyn LeadProvider>,
        agents: Arc<dyn AgentPool>,
        notifier: Arc<dyn Notifier>,
        reminders: Arc<dyn ReminderStore>,
        log: Arc<dyn ExecutionLog>,
    ) -> Self {
        Self {
            leads,
            agents,
            notifier,
            reminders,
            log,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Runs `rule` against `lead`. The returned execution is terminal
    /// (completed or failed); `Err` is reserved for audit-log persistence
    /// failures.
    pub async fn dispatch(
        &self,
        rule: &WorkflowRule,
        lead: &Lead,
    ) -> Result<WorkflowExecution, EngineError> {
        let mut execution = WorkflowExecution::pending(rule.id, lead.id);
        self.log.append(&execution).await?;

        for action in &rule.actions {
            if let Err(err) = action.validate() {
                warn!(rule = %rule.name, lead_id = %lead.id, %err, "rejecting execution with invalid action");
                execution.fail(err.to_string());
                self.log.update(&execution).await?;
                return Ok(execution);
            }
        }

        execution.start();
        self.log.update(&execution).await?;
        info!(rule = %rule.name, lead_id = %lead.id, execution_id = %execution.id, "executing workflow rule");

        // Later actions see the lead as mutated by earlier ones.
        let mut lead = lead.clone();
        let mut results: Vec<ActionResult> = Vec::with_capacity(rule.actions.len());
        for action in &rule.actions {
            let started = Instant::now();
            let outcome =
                tokio::time::timeout(self.action_timeout, self.execute_action(action, &mut lead))
                    .await
                    .unwrap_or(Err(EngineError::ActionTimeout));
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => results.push(ActionResult {
                    action: action.kind().as_str().to_string(),
                    output,
                    duration_ms,
                }),
                Err(err) => {
                    warn!(rule = %rule.name, lead_id = %lead.id, action = action.kind().as_str(), %err, "workflow action failed");
                    execution.fail(format!("{}: {err}", action.kind().as_str()));
                    execution.result_data = Some(json!(results));
                    self.log.update(&execution).await?;
                    return Ok(execution);
                }
            }
        }

        execution.complete(json!(results));
        self.log.update(&execution).await?;
        Ok(execution)
    }

    async fn execute_action(
        &self,
        action: &WorkflowAction,
        lead: &mut Lead,
    ) -> Result<Value, EngineError> {
        match action {
            WorkflowAction::AssignAgent { strategy } => {
                let agent = match strategy {
                    super::actions::AssignStrategy::RoundRobin => {
                        self.agents.next_round_robin_agent().await?
                    }
                    super::actions::AssignStrategy::WorkloadBased => {
                        self.agents.least_loaded_agent().await?
                    }
                    super::actions::AssignStrategy::SpecificAgent { agent_id } => self
                        .agents
                        .get_agent(*agent_id)
                        .await?
                        .ok_or_else(|| EngineError::Collaborator(format!("agent {agent_id} not found")))?,
                };
                self.leads.assign_agent(lead.id, agent.id).await?;
                lead.assigned_agent = Some(agent.id);
                Ok(json!({"agent_id": agent.id, "agent": agent.display_name()}))
            }
            WorkflowAction::SendEmail { to, subject, body } => {
                let record = lead.to_record();
                let to = render_template(to, &record);
                let subject = render_template(subject, &record);
                let body = render_template(body, &record);
                self.notifier.send_email(&to, &subject, &body).await?;
                Ok(json!({"to": to, "subject": subject}))
            }
            WorkflowAction::CreateTask { title, description, assigned_to } => {
                let record = lead.to_record();
                let assignee = assigned_to.or(lead.assigned_agent);
                let task = LeadTask::new(
                    lead.id,
                    assignee,
                    &render_template(title, &record),
                    description.as_deref(),
                );
                self.leads.create_task(&task).await?;
                Ok(json!({"task_id": task.id, "title": task.title}))
            }
            WorkflowAction::UpdateStatus { status } => {
                self.leads.update_status(lead.id, status).await?;
                lead.status = status.clone();
                Ok(json!({"status": status}))
            }
            WorkflowAction::CreateReminder {
                reminder_type,
                title,
                due_in_hours,
                priority,
                assigned_to,
            } => {
                let assignee = assigned_to.or(lead.assigned_agent).ok_or_else(|| {
                    EngineError::Collaborator("reminder has no assignee and lead has no agent".into())
                })?;
                let record = lead.to_record();
                let reminder = self
                    .reminders
                    .create_reminder(NewReminder {
                        lead_id: lead.id,
                        assigned_to: assignee,
                        reminder_type: *reminder_type,
                        title: render_template(title, &record),
                        due_date: Utc::now() + chrono::Duration::hours(*due_in_hours),
                        priority: *priority,
                    })
                    .await?;
                Ok(json!({"reminder_id": reminder.id, "due_date": reminder.due_date}))
            }
            WorkflowAction::Escalate { escalate_to, message } => {
                let record = lead.to_record();
                let body = render_template(message, &record);
                let subject =
                    format!("Lead escalated: {} {}", lead.first_name, lead.last_name);
                let mut notified: Vec<String> = Vec::new();
                for agent_id in escalate_to {
                    let agent = self.agents.get_agent(*agent_id).await?.ok_or_else(|| {
                        EngineError::Collaborator(format!("escalation target {agent_id} not found"))
                    })?;
                    self.notifier.send_email(&agent.email, &subject, &body).await?;
                    notified.push(agent.email);
                }
                Ok(json!({"notified": notified}))
            }
        }
    }
}

/// Replaces `{{field}}` placeholders with values from the lead record.
/// Unknown fields are left in place so broken templates stay visible.
pub fn render_template(template: &str, record: &Value) -> String {
    let re = Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid");
    re.replace_all(template, |caps: &regex::Captures| {
        match record.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => caps[0].to_string(),
            Some(other) => other.to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::actions::AssignStrategy;
    use crate::engine::rules::{RuleType, WorkflowRule};
    use crate::engine::testing::*;
    use leadflow_shared::{ExecutionStatus, ReminderPriority, ReminderType};

    fn dispatcher(world: &World) -> ActionDispatcher {
        ActionDispatcher::new(
            world.leads.clone(),
            world.agents.clone(),
            world.notifier.clone(),
            world.reminders.clone(),
            world.log.clone(),
        )
    }

    #[tokio::test]
    async fn successful_run_completes_with_one_result_per_action() {
        let world = World::new();
        let lead = world.seed_lead("US", "new", 2500.0);
        let agent = world.seed_agent("anna@leadflow.test");

        let rule = WorkflowRule::new("welcome", RuleType::LeadAssignment).with_actions(vec![
            WorkflowAction::AssignAgent {
                strategy: AssignStrategy::SpecificAgent { agent_id: agent.id },
            },
            WorkflowAction::SendEmail {
                to: "{{email}}".into(),
                subject: "Welcome {{first_name}}".into(),
                body: "Your advisor will call shortly.".into(),
            },
        ]);

        let execution = dispatcher(&world).dispatch(&rule, &lead).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);

        let results = execution.result_data.unwrap();
        assert_eq!(results.as_array().unwrap().len(), 2);
        assert_eq!(results[0]["action"], "assign_agent");
        assert_eq!(results[1]["action"], "send_email");

        // side effects landed
        assert_eq!(world.leads.get(lead.id).assigned_agent, Some(agent.id));
        let sent = world.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, lead.email);
        assert_eq!(sent[0].subject, "Welcome Ada");
    }

    #[tokio::test]
    async fn workload_assignment_picks_the_least_loaded_agent() {
        let world = World::new();
        let lead = world.seed_lead("US", "new", 1000.0);
        let busy = world.seed_agent("busy@leadflow.test");
        let idle = world.seed_agent("idle@leadflow.test");
        world.agents.set_load(busy.id, 7);
        world.agents.set_load(idle.id, 2);

        let rule = WorkflowRule::new("balance-load", RuleType::LeadAssignment).with_actions(vec![
            WorkflowAction::AssignAgent { strategy: AssignStrategy::WorkloadBased },
        ]);

        let execution = dispatcher(&world).dispatch(&rule, &lead).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(world.leads.get(lead.id).assigned_agent, Some(idle.id));

        let results = execution.result_data.unwrap();
        assert_eq!(results[0]["output"]["agent_id"], json!(idle.id));
    }

    #[tokio::test]
    async fn invalid_action_fails_before_any_side_effect()  {
        let world = World::new();
        let lead = world.seed_lead("US", "new", 100.0);

        // first action is fine, second is invalid: nothing may run
        let rule = WorkflowRule::new("broken", RuleType::EmailAutomation).with_actions(vec![
            WorkflowAction::SendEmail {
                to: "{{email}}".into(),
                subject: "Hi".into(),
                body: "Hello".into(),
            },
            WorkflowAction::UpdateStatus { status: "vip".into() },
        ]);

        let execution = dispatcher(&world).dispatch(&rule, &lead).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error_message.unwrap().contains("unknown lead status"));
        assert!(world.notifier.sent().is_empty());
        // the audit row never reached the running state
        assert!(!world.log.statuses(execution.id).contains(&ExecutionStatus::Running));
    }

    #[tokio::test]
    async fn runtime_failure_is_fail_fast_without_rollback() {
        let world = World::new();
        let lead = world.seed_lead("US", "new", 100.0);
        world.notifier.fail_with("smtp unreachable");

        let rule = WorkflowRule::new("contact", RuleType::EmailAutomation).with_actions(vec![
            WorkflowAction::UpdateStatus { status: "contacted".into() },
            WorkflowAction::SendEmail {
                to: "{{email}}".into(),
                subject: "Hi".into(),
                body: "Hello".into(),
            },
            WorkflowAction::CreateTask { title: "never runs".into(), description: None, assigned_to: None },
        ]);

        let execution = dispatcher(&world).dispatch(&rule, &lead).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error_message.unwrap().starts_with("send_email"));

        // the first action's effect stays applied
        assert_eq!(world.leads.get(lead.id).status, "contacted");
        // the third action never ran
        assert!(world.leads.tasks().is_empty());
        // partial results cover only the action that succeeded
        assert_eq!(execution.result_data.unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_action_list_completes_as_a_noop() {
        let world = World::new();
        let lead = world.seed_lead("US", "new", 100.0);
        let rule = WorkflowRule::new("noop", RuleType::FollowUp);

        let execution = dispatcher(&world).dispatch(&rule, &lead).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.result_data.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn reminder_defaults_to_the_leads_agent() {
        let world = World::new();
        let agent = world.seed_agent("anna@leadflow.test");
        let mut lead = world.seed_lead("UK", "contacted", 0.0);
        world.leads.set_agent(lead.id, agent.id);
        lead.assigned_agent = Some(agent.id);

        let rule = WorkflowRule::new("follow-up", RuleType::FollowUp).with_actions(vec![
            WorkflowAction::CreateReminder {
                reminder_type: ReminderType::Call,
                title: "Call {{first_name}}".into(),
                due_in_hours: 48,
                priority: ReminderPriority::High,
                assigned_to: None,
            },
        ]);

        let execution = dispatcher(&world).dispatch(&rule, &lead).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        let reminders = world.reminders.all();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].assigned_to, agent.id);
        assert_eq!(reminders[0].title, "Call Ada");
    }

    #[tokio::test]
    async fn slow_action_times_out_and_fails_the_execution() {
        let world = World::new();
        let lead = world.seed_lead("US", "new", 100.0);
        world.notifier.delay(Duration::from_millis(200));

        let rule = WorkflowRule::new("slow", RuleType::EmailAutomation).with_actions(vec![
            WorkflowAction::SendEmail {
                to: "{{email}}".into(),
                subject: "Hi".into(),
                body: "Hello".into(),
            },
        ]);

        let execution = dispatcher(&world)
            .with_action_timeout(Duration::from_millis(20))
            .dispatch(&rule, &lead)
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error_message.unwrap().contains("timed out"));
    }

    #[test]
    fn template_rendering() {
        let record = json!({"first_name": "Ada", "balance": 2500.5, "phone": null});
        assert_eq!(render_template("Hi {{first_name}}", &record), "Hi Ada");
        assert_eq!(render_template("Balance: {{balance}}", &record), "Balance: 2500.5");
        // null and unknown fields keep the placeholder
        assert_eq!(render_template("{{phone}} / {{missing}}", &record), "{{phone}} / {{missing}}");
    }
}
