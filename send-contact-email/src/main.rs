mod config;
mod email_template;
mod resend;

use config::RelayConfig;
use lambda_http::{
    http::{header, response::Builder, Method, StatusCode},
    run, service_fn, Body, Error, Request, Response,
};
use regex::Regex;
use resend::{EmailRelay, OutboundEmail, RelayError, RelayOutcome, ResendRelay};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{error, info, warn};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const ALLOWED_METHODS: &str = "POST, OPTIONS";

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = RelayConfig::from_env();
    info!(
        "Relaying contact form messages with the {} template",
        config.sender.template
    );
    let handler = ContactSubmissionHandler::new(config);
    run(service_fn(|event| handler.handle(event))).await
}

struct ContactSubmissionHandler<RelayT: EmailRelay> {
    config: RelayConfig,
    relay: RelayT,
}

impl ContactSubmissionHandler<ResendRelay> {
    fn new(config: RelayConfig) -> Self {
        let relay = ResendRelay::new(config.resend_url.to_string());
        Self::with_relay(config, relay)
    }
}

impl<RelayT: EmailRelay> ContactSubmissionHandler<RelayT> {
    fn with_relay(config: RelayConfig, relay: RelayT) -> Self {
        Self { config, relay }
    }

    async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        if *event.method() == Method::OPTIONS {
            return Ok(with_cors_headers(Response::builder()).body(Body::Empty)?);
        }
        let result = if *event.method() == Method::POST {
            self.process_submission(event.body()).await
        } else {
            Err(ContactFormError::MethodNotAllowed(event.method().clone()))
        };
        match result {
            Ok(message_id) => json_response(
                StatusCode::OK,
                &SuccessBody {
                    success: true,
                    message_id,
                    message: "Email sent successfully",
                },
            ),
            Err(error) => {
                error.log();
                error.into_response()
            }
        }
    }

    async fn process_submission(&self, body: &[u8]) -> Result<Option<String>, ContactFormError> {
        let submission: ContactSubmission =
            serde_json::from_slice(body).map_err(ContactFormError::InvalidPayload)?;
        let validated_submission = submission.validate()?;
        let (api_key, recipient) = self.required_configuration()?;
        let email = OutboundEmail::compose(&self.config.sender, recipient, &validated_submission)
            .map_err(|error| {
                ContactFormError::InternalError(format!("Error rendering email: {error}"))
            })?;
        match self.relay.send(api_key, &email).await? {
            RelayOutcome::Delivered { message_id } => {
                info!(
                    "Email sent successfully: message {} from {} <{}>",
                    message_id.as_deref().unwrap_or("(no id)"),
                    validated_submission.name,
                    validated_submission.email
                );
                Ok(message_id)
            }
            RelayOutcome::Rejected { status, details } => {
                Err(ContactFormError::ProviderRejected { status, details })
            }
        }
    }

    fn required_configuration(&self) -> Result<(&str, &str), ContactFormError> {
        match (&self.config.api_key, &self.config.recipient) {
            (Some(api_key), Some(recipient)) => Ok((api_key.as_str(), recipient.as_str())),
            (api_key, recipient) => Err(ContactFormError::MissingConfiguration {
                has_api_key: api_key.is_some(),
                has_recipient: recipient.is_some(),
            }),
        }
    }
}

fn with_cors_headers(builder: Builder) -> Builder {
    builder
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS)
}

fn json_response(status: StatusCode, body: &impl Serialize) -> Result<Response<Body>, Error> {
    Ok(with_cors_headers(Response::builder())
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(serde_json::to_string(body)?.into())?)
}

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| Regex::new(EMAIL_PATTERN).unwrap())
}

#[derive(Deserialize, Debug)]
struct ContactSubmission {
    name: Option<String>,
    email: Option<String>,
    message: Option<String>,
}

impl ContactSubmission {
    fn validate(&self) -> Result<ValidatedContactSubmission, ContactFormError> {
        let (Some(name), Some(email), Some(message)) = (
            non_empty(&self.name),
            non_empty(&self.email),
            non_empty(&self.message),
        ) else {
            return Err(ContactFormError::MissingFields);
        };
        if !email_regex().is_match(email) {
            return Err(ContactFormError::InvalidEmail(email.into()));
        }

        Ok(ValidatedContactSubmission {
            name,
            email,
            message,
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

struct ValidatedContactSubmission<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl<'a> ErrorBody<'a> {
    fn new(error: &'a str) -> Self {
        Self {
            error,
            details: None,
        }
    }

    fn with_details(error: &'a str, details: impl Into<Value>) -> Self {
        Self {
            error,
            details: Some(details.into()),
        }
    }
}

#[derive(Debug)]
enum ContactFormError {
    InvalidPayload(serde_json::Error),
    MissingFields,
    InvalidEmail(String),
    MethodNotAllowed(Method),
    MissingConfiguration {
        has_api_key: bool,
        has_recipient: bool,
    },
    ProviderRejected {
        status: StatusCode,
        details: Value,
    },
    InternalError(String),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::MissingFields
            | ContactFormError::InvalidEmail(_)
            | ContactFormError::MethodNotAllowed(_) => {
                warn!("Client error sending contact form email: {self}");
            }
            ContactFormError::InvalidPayload(error) => {
                error!("Internal error reading contact form request body: {error}");
            }
            ContactFormError::MissingConfiguration {
                has_api_key,
                has_recipient,
            } => {
                error!(
                    "Missing environment variables: has_resend_key={has_api_key}, has_my_email={has_recipient}"
                );
            }
            ContactFormError::ProviderRejected { status, details } => {
                error!("Resend API error: status {status}, {details}");
            }
            ContactFormError::InternalError(description) => {
                error!("Internal error sending contact form email: {description}");
            }
        }
    }

    fn into_response(self) -> Result<Response<Body>, Error> {
        match self {
            ContactFormError::MissingFields => json_response(
                StatusCode::BAD_REQUEST,
                &ErrorBody::with_details(
                    "Missing required fields",
                    "Name, email, and message are all required",
                ),
            ),
            ContactFormError::InvalidEmail(_) => json_response(
                StatusCode::BAD_REQUEST,
                &ErrorBody::with_details(
                    "Invalid email format",
                    "Please provide a valid email address",
                ),
            ),
            ContactFormError::MethodNotAllowed(_) => Ok(with_cors_headers(Response::builder())
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ALLOW, ALLOWED_METHODS)
                .body(serde_json::to_string(&ErrorBody::new("Method not allowed"))?.into())?),
            ContactFormError::MissingConfiguration { .. } => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorBody::new("Server configuration error"),
            ),
            ContactFormError::ProviderRejected { status, details } => json_response(
                status,
                &ErrorBody::with_details("Failed to send email", details),
            ),
            ContactFormError::InvalidPayload(_) | ContactFormError::InternalError(_) => {
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &ErrorBody::new("Internal server error"),
                )
            }
        }
    }
}

impl From<RelayError> for ContactFormError {
    fn from(error: RelayError) -> Self {
        ContactFormError::InternalError(error.to_string())
    }
}

impl std::fmt::Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::InvalidPayload(error) => write!(f, "Invalid request body: {error}"),
            ContactFormError::MissingFields => write!(f, "Missing fields in request"),
            ContactFormError::InvalidEmail(email) => write!(f, "Invalid email address {email}"),
            ContactFormError::MethodNotAllowed(method) => write!(f, "Method {method} not allowed"),
            ContactFormError::MissingConfiguration { .. } => {
                write!(f, "Server configuration error")
            }
            ContactFormError::ProviderRejected { status, .. } => {
                write!(f, "Resend rejected the email with status {status}")
            }
            ContactFormError::InternalError(description) => {
                write!(f, "Internal error: {description}")
            }
        }
    }
}

impl std::error::Error for ContactFormError {}
