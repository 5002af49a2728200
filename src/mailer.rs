use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected message: {0}")]
    Rejected(String),
}

/// Outbound email seam. All sends are best-effort: booking flows log
/// failures and carry on, they never roll back on a mail error.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError>;
}

/// Resend HTTP API (https://resend.com).
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError> {
        let resp = self
            .http
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MailerError::Rejected(format!("{status}: {body}")));
        }
        Ok(())
    }
}

/// Dev fallback when no API key is configured: log instead of sending.
/// Magic-link sign-in still works locally, the link just lands in the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError> {
        tracing::info!(%to, %subject, "email not sent (no RESEND_API_KEY); body:\n{html}");
        Ok(())
    }
}

pub fn from_config(cfg: &Config) -> Arc<dyn Mailer> {
    match &cfg.resend_api_key {
        Some(key) => Arc::new(ResendMailer {
            http: reqwest::Client::new(),
            api_key: key.clone(),
            from: format!("{} <{}>", cfg.clinic_name, cfg.from_email),
        }),
        None => Arc::new(LogMailer),
    }
}

/* -------------------------
   Templates
--------------------------*/

fn wrap(clinic_name: &str, inner: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #0891b2;">{clinic_name}</h2>
  {inner}
  <hr style="border: none; border-top: 1px solid #e5e7eb; margin: 20px 0;">
  <p style="color: #6b7280; font-size: 12px;">{clinic_name} - This message was sent automatically.</p>
</div>"#
    )
}

pub fn magic_link_email(clinic_name: &str, link: &str, ttl_minutes: i64) -> (String, String) {
    let subject = format!("Sign in to {clinic_name}");
    let inner = format!(
        r#"<p>Click the link below to sign in. It is valid for {ttl_minutes} minutes and can be used once.</p>
  <p><a href="{link}">Sign in to {clinic_name}</a></p>
  <p>If you did not request this email you can safely ignore it.</p>"#
    );
    (subject, wrap(clinic_name, &inner))
}

pub fn confirmation_email(
    clinic_name: &str,
    patient_name: &str,
    doctor_name: &str,
    specialization: &str,
    date: &str,
    time: &str,
) -> (String, String) {
    let subject = format!("Appointment confirmed - {clinic_name}");
    let inner = format!(
        r#"<p>Dear <strong>{patient_name}</strong>,</p>
  <p>Your appointment is confirmed:</p>
  <div style="background: #f0f9ff; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <p style="margin: 5px 0;"><strong>Doctor:</strong> Dr. {doctor_name}</p>
    <p style="margin: 5px 0;"><strong>Specialization:</strong> {specialization}</p>
    <p style="margin: 5px 0;"><strong>Date:</strong> {date}</p>
    <p style="margin: 5px 0;"><strong>Time:</strong> {time}</p>
  </div>
  <p>To change or cancel, sign in to the portal or contact the clinic.</p>"#
    );
    (subject, wrap(clinic_name, &inner))
}

pub fn cancellation_email(
    clinic_name: &str,
    patient_name: &str,
    doctor_name: &str,
    date: &str,
    time: &str,
    by_clinic: bool,
) -> (String, String) {
    let subject = format!("Appointment cancelled - {clinic_name}");
    let lead = if by_clinic {
        "The clinic has cancelled the following appointment:"
    } else {
        "We confirm the cancellation of your appointment:"
    };
    let inner = format!(
        r#"<p>Dear <strong>{patient_name}</strong>,</p>
  <p>{lead}</p>
  <div style="background: #fef2f2; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <p style="margin: 5px 0;"><strong>Doctor:</strong> Dr. {doctor_name}</p>
    <p style="margin: 5px 0;"><strong>Date:</strong> {date}</p>
    <p style="margin: 5px 0;"><strong>Time:</strong> {time}</p>
    <p style="margin: 5px 0; color: #dc2626;"><strong>Status:</strong> Cancelled</p>
  </div>
  <p>To book a new appointment, sign in to the portal.</p>"#
    );
    (subject, wrap(clinic_name, &inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_link_email_contains_link() {
        let (subject, html) =
            magic_link_email("Clinic", "http://localhost:5173/auth/callback?token=abc", 15);
        assert!(subject.contains("Clinic"));
        assert!(html.contains("token=abc"));
        assert!(html.contains("15 minutes"));
    }

    #[test]
    fn test_confirmation_email_fields() {
        let (_, html) =
            confirmation_email("Clinic", "Ada Lovelace", "Grace Hopper", "Cardiology", "2026-09-01", "10:30");
        assert!(html.contains("Ada Lovelace"));
        assert!(html.contains("Dr. Grace Hopper"));
        assert!(html.contains("Cardiology"));
        assert!(html.contains("2026-09-01"));
        assert!(html.contains("10:30"));
    }

    #[test]
    fn test_cancellation_email_variants() {
        let (_, by_patient) =
            cancellation_email("Clinic", "A", "B", "2026-09-01", "10:30", false);
        let (_, by_clinic) = cancellation_email("Clinic", "A", "B", "2026-09-01", "10:30", true);
        assert!(by_patient.contains("We confirm the cancellation"));
        assert!(by_clinic.contains("The clinic has cancelled"));
    }
}
