use crate::config::SmtpConfig;
use crate::engine::{EngineError, Notifier};
use async_trait::async_trait;
use lettre::{
    message::Mailbox,
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl EmailService {
    pub fn new(smtp_config: &SmtpConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let creds = Credentials::new(
            smtp_config.username.clone(),
            smtp_config.password.clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_config.host)
            .port(smtp_config.port)
            .credentials(creds)
            .pool_config(PoolConfig::new().max_size(10))
            .timeout(Some(Duration::from_secs(10)))
            .build();

        Ok(EmailService {
            transport,
            from_email: smtp_config.from_email.clone(),
            from_name: smtp_config.from_name.clone(),
        })
    }

    pub async fn send(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()?;
        let to = to_email.parse::<Mailbox>()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!("Email sent successfully to {}", to_email);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", to_email, e);
                Err(Box::new(e))
            }
        }
    }

    /// Body for the overdue-reminder nudge sent to the assignee.
    pub fn overdue_reminder_body(lead_name: &str, title: &str, due_date: &str) -> String {
        format!(
            "The reminder \"{title}\" for lead {lead_name} was due on {due_date} and is still open.\n\
             Please follow up or close the reminder."
        )
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), EngineError> {
        self.send(to, subject, body)
            .await
            .map_err(|e| EngineError::Collaborator(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overdue_body_names_the_lead_and_reminder() {
        let body = EmailService::overdue_reminder_body("Ada Bell", "Call back", "2026-08-20");
        assert!(body.contains("Ada Bell"));
        assert!(body.contains("Call back"));
        assert!(body.contains("2026-08-20"));
    }
}
