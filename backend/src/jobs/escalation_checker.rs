// Escalation Checker Job - advances triggered escalations through their levels

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::dispatcher::render_template;
use crate::engine::escalation::{tick, EscalationAction, EscalationLevel, EscalationRule};
use crate::engine::{AgentPool, EngineError, LeadProvider, Notifier};
use crate::stores::escalations::EscalationState;
use crate::stores::PgEscalationStore;

use leadflow_shared::Lead;

pub struct EscalationCheckerJob {
    store: Arc<PgEscalationStore>,
    leads: Arc<dyn LeadProvider>,
    agents: Arc<dyn AgentPool>,
    notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Default)]
pub struct EscalationCheckResult {
    pub states_opened: i32,
    pub states_checked: i32,
    pub levels_fired: i32,
    pub errors: Vec<String>,
}

impl EscalationCheckerJob {
    pub fn new(
        store: Arc<PgEscalationStore>,
        leads: Arc<dyn LeadProvider>,
        agents: Arc<dyn AgentPool>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { store, leads, agents, notifier }
    }

    pub async fn run(&self) -> Result<EscalationCheckResult, EngineError> {
        let mut result = EscalationCheckResult::default();
        let now = Utc::now();

        let rules: HashMap<_, _> = self
            .store
            .list_rules(true)
            .await?
            .into_iter()
            .map(|rule| (rule.id, rule))
            .collect();
        if !rules.is_empty() {
            self.open_triggered(&rules, now, &mut result).await;
        }

        let states = self.store.open_states().await?;
        result.states_checked = states.len() as i32;

        for state in states {
            let Some(rule) = rules.get(&state.escalation_rule_id) else {
                // rule was deactivated or deleted after the state opened
                continue;
            };
            if let Err(e) = self.advance(rule, &state, now, &mut result).await {
                result
                    .errors
                    .push(format!("escalation {} for lead {}: {}", rule.name, state.lead_id, e));
            }
        }

        Ok(result)
    }

    /// Opens an escalation state for every open lead matching an active
    /// rule's trigger. `open_state` is keyed on (rule, lead), so a lead
    /// that keeps matching across passes holds exactly one state per rule.
    async fn open_triggered(
        &self,
        rules: &HashMap<Uuid, EscalationRule>,
        now: DateTime<Utc>,
        result: &mut EscalationCheckResult,
    ) {
        let leads = match self.leads.open_leads().await {
            Ok(leads) => leads,
            Err(e) => {
                result.errors.push(format!("failed to load open leads: {e}"));
                return;
            }
        };

        for rule in rules.values() {
            for lead in &leads {
                if !rule.trigger_condition.matches(lead, now) {
                    continue;
                }
                match self.store.open_state(rule.id, lead.id, now).await {
                    Ok(true) => {
                        result.states_opened += 1;
                        info!(rule = %rule.name, lead_id = %lead.id, "escalation triggered");
                    }
                    Ok(false) => {}
                    Err(e) => {
                        result.errors.push(format!(
                            "failed to open escalation {} for lead {}: {}",
                            rule.name, lead.id, e
                        ));
                    }
                }
            }
        }
    }

    async fn advance(
        &self,
        rule: &EscalationRule,
        state: &EscalationState,
        now: DateTime<Utc>,
        result: &mut EscalationCheckResult,
    ) -> Result<(), EngineError> {
        for level in tick(rule, state.triggered_at, now, &state.levels_fired) {
            let completed = state.levels_fired.len() + 1 == rule.escalation_levels.len();
            // compare-and-set first: a concurrent tick that already recorded
            // this level must not fire its side effects twice
            let won = self
                .store
                .mark_level_fired(state.id, &state.levels_fired, level.level, completed)
                .await?;
            if !won {
                warn!(
                    rule = %rule.name,
                    lead_id = %state.lead_id,
                    level = level.level,
                    "escalation level already recorded by a concurrent tick"
                );
                continue;
            }

            let Some(lead) = self.leads.get_lead(state.lead_id).await? else {
                result.errors.push(format!("lead {} vanished mid-escalation", state.lead_id));
                continue;
            };
            self.fire_level(rule, level, &lead).await?;
            result.levels_fired += 1;
            info!(rule = %rule.name, lead_id = %lead.id, level = level.level, "escalation level fired");
        }
        Ok(())
    }

    async fn fire_level(
        &self,
        rule: &EscalationRule,
        level: &EscalationLevel,
        lead: &Lead,
    ) -> Result<(), EngineError> {
        let record = lead.to_record();
        let body = render_template(&level.message_template, &record);
        let subject = format!(
            "[Escalation L{}] {} - {} {}",
            level.level, rule.name, lead.first_name, lead.last_name
        );

        if level.action == EscalationAction::Reassign {
            if let Some(new_owner) = level.escalate_to.first() {
                self.leads.assign_agent(lead.id, *new_owner).await?;
            }
        }

        for agent_id in &level.escalate_to {
            match self.agents.get_agent(*agent_id).await? {
                Some(agent) => {
                    if let Err(e) = self.notifier.send_email(&agent.email, &subject, &body).await {
                        error!(agent = %agent.email, %e, "failed to send escalation notification");
                    }
                }
                None => {
                    error!(agent_id = %agent_id, "escalation recipient no longer exists");
                }
            }
        }

        Ok(())
    }
}
