use crate::{
    config::SenderProfile, email_template::render_contact_email, ValidatedContactSubmission,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

#[async_trait]
pub trait EmailRelay {
    async fn send(&self, api_key: &str, email: &OutboundEmail)
        -> Result<RelayOutcome, RelayError>;
}

pub struct ResendRelay {
    url: String,
}

impl ResendRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl EmailRelay for ResendRelay {
    async fn send(
        &self,
        api_key: &str,
        email: &OutboundEmail,
    ) -> Result<RelayOutcome, RelayError> {
        let response = Client::new()
            .post(&self.url)
            .bearer_auth(api_key)
            .json(email)
            .send()
            .await
            .map_err(RelayError::Transport)?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|error| RelayError::InvalidResponse { status, error })?;
        if status.is_success() {
            Ok(RelayOutcome::Delivered {
                message_id: payload.get("id").and_then(Value::as_str).map(String::from),
            })
        } else {
            Ok(RelayOutcome::Rejected {
                status,
                details: payload,
            })
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
}

impl OutboundEmail {
    pub fn compose(
        sender: &SenderProfile,
        recipient: &str,
        submission: &ValidatedContactSubmission,
    ) -> Result<Self, tinytemplate::error::Error> {
        Ok(Self {
            from: sender.from.to_string(),
            to: vec![recipient.into()],
            reply_to: submission.email.into(),
            subject: format!("New Contact Form Message from {}", submission.name),
            html: render_contact_email(
                sender.template,
                submission.name,
                submission.email,
                submission.message,
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    Delivered { message_id: Option<String> },
    Rejected { status: StatusCode, details: Value },
}

#[derive(Debug)]
pub enum RelayError {
    Transport(reqwest::Error),
    InvalidResponse {
        status: StatusCode,
        error: reqwest::Error,
    },
}

impl Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Transport(error) => write!(f, "Error sending request to Resend: {error}"),
            RelayError::InvalidResponse { status, error } => {
                write!(f, "Unreadable response from Resend (status {status}): {error}")
            }
        }
    }
}

impl std::error::Error for RelayError {}

#[cfg(test)]
pub mod test_support {
    use super::{EmailRelay, OutboundEmail, RelayError, RelayOutcome};
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub struct StubRelay {
        outcome: RelayOutcome,
        sent: Mutex<Vec<(String, OutboundEmail)>>,
    }

    impl StubRelay {
        pub fn delivering(message_id: &str) -> Self {
            Self::answering(RelayOutcome::Delivered {
                message_id: Some(message_id.into()),
            })
        }

        pub fn answering(outcome: RelayOutcome) -> Self {
            Self {
                outcome,
                sent: Default::default(),
            }
        }

        pub fn sent(&self) -> Vec<(String, OutboundEmail)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailRelay for StubRelay {
        async fn send(
            &self,
            api_key: &str,
            email: &OutboundEmail,
        ) -> Result<RelayOutcome, RelayError> {
            self.sent
                .lock()
                .unwrap()
                .push((api_key.into(), email.clone()));
            Ok(self.outcome.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EmailRelay, OutboundEmail, RelayError, RelayOutcome, ResendRelay};
    use crate::{
        config::{SenderProfile, TemplateVariant},
        ValidatedContactSubmission,
    };
    use googletest::prelude::*;
    use serde_json::json;
    use test_support::{fake_resend::FakeResend, unused_local_url};

    const FAKE_API_KEY: &str = "re_fake_api_key";

    fn arbitrary_email() -> OutboundEmail {
        OutboundEmail {
            from: "My Website <onboarding@resend.dev>".into(),
            to: vec!["owner@example.com".into()],
            reply_to: "al@example.com".into(),
            subject: "New Contact Form Message from Al".into(),
            html: "<p>Hello</p>".into(),
        }
    }

    #[test]
    fn composes_payload_from_submission() -> Result<()> {
        let submission = ValidatedContactSubmission {
            name: "Al",
            email: "al@example.com",
            message: "Hi\nthere",
        };

        let email = OutboundEmail::compose(
            &SenderProfile::for_variant(TemplateVariant::Classic),
            "owner@example.com",
            &submission,
        )?;

        verify_that!(
            email,
            matches_pattern!(OutboundEmail {
                from: eq("Portfolio Contact <onboarding@resend.dev>"),
                to: elements_are![eq("owner@example.com")],
                reply_to: eq("al@example.com"),
                subject: eq("New Contact Form Message from Al"),
                html: contains_substring("Hi<br>there"),
            })
        )
    }

    #[tokio::test]
    async fn returns_message_id_when_resend_accepts_email() -> Result<()> {
        let fake_resend = FakeResend::new(FAKE_API_KEY)
            .with_message_id("49a3999c-0ce1-4ea6-ab68-afcd6dc2e794")
            .start()
            .await;
        let subject = ResendRelay::new(fake_resend.emails_url());

        let outcome = subject.send(FAKE_API_KEY, &arbitrary_email()).await?;

        verify_that!(
            outcome,
            eq(RelayOutcome::Delivered {
                message_id: Some("49a3999c-0ce1-4ea6-ab68-afcd6dc2e794".into())
            })
        )
    }

    #[tokio::test]
    async fn posts_payload_with_bearer_token() -> Result<()> {
        let fake_resend = FakeResend::new(FAKE_API_KEY).start().await;
        let subject = ResendRelay::new(fake_resend.emails_url());

        subject.send(FAKE_API_KEY, &arbitrary_email()).await?;

        verify_that!(
            fake_resend.received_emails(),
            elements_are![matches_pattern!(test_support::fake_resend::ReceivedEmail {
                authorization: some(eq(format!("Bearer {FAKE_API_KEY}"))),
                payload: eq(json!({
                    "from": "My Website <onboarding@resend.dev>",
                    "to": ["owner@example.com"],
                    "reply_to": "al@example.com",
                    "subject": "New Contact Form Message from Al",
                    "html": "<p>Hello</p>",
                })),
            })]
        )
    }

    #[tokio::test]
    async fn returns_status_and_details_when_resend_rejects_email() -> Result<()> {
        let details = json!({
            "statusCode": 422,
            "name": "validation_error",
            "message": "Invalid `to` field",
        });
        let fake_resend = FakeResend::new(FAKE_API_KEY)
            .reject_with(422, details.clone())
            .start()
            .await;
        let subject = ResendRelay::new(fake_resend.emails_url());

        let outcome = subject.send(FAKE_API_KEY, &arbitrary_email()).await?;

        verify_that!(
            outcome,
            eq(RelayOutcome::Rejected {
                status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
                details
            })
        )
    }

    #[tokio::test]
    async fn rejects_when_api_key_is_wrong() -> Result<()> {
        let fake_resend = FakeResend::new(FAKE_API_KEY).start().await;
        let subject = ResendRelay::new(fake_resend.emails_url());

        let outcome = subject.send("re_wrong_key", &arbitrary_email()).await?;

        verify_that!(
            outcome,
            matches_pattern!(RelayOutcome::Rejected {
                status: eq(reqwest::StatusCode::UNAUTHORIZED),
            })
        )
    }

    #[tokio::test]
    async fn fails_when_resend_returns_invalid_response() -> Result<()> {
        let fake_resend = FakeResend::new(FAKE_API_KEY)
            .return_invalid_response()
            .start()
            .await;
        let subject = ResendRelay::new(fake_resend.emails_url());

        let result = subject.send(FAKE_API_KEY, &arbitrary_email()).await;

        verify_that!(
            result,
            err(matches_pattern!(RelayError::InvalidResponse {
                status: eq(reqwest::StatusCode::OK),
            }))
        )
    }

    #[tokio::test]
    async fn fails_when_resend_is_unreachable() -> Result<()> {
        let subject = ResendRelay::new(unused_local_url().await);

        let result = subject.send(FAKE_API_KEY, &arbitrary_email()).await;

        verify_that!(result, err(matches_pattern!(RelayError::Transport(anything()))))
    }
}
