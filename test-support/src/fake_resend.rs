use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use log::{debug, info};
use serde_json::{json, Value};
use std::{
    borrow::Cow,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

const EMAILS_PATH: &str = "/emails";
const DEFAULT_MESSAGE_ID: &str = "4ef9a417-02e9-4d39-ad75-9611e0fcc33c";

#[derive(Clone)]
pub struct FakeResend {
    required_api_key: Cow<'static, str>,
    message_id: Cow<'static, str>,
    rejection: Option<(StatusCode, Value)>,
    return_invalid_response: bool,
    received: Arc<Mutex<Vec<ReceivedEmail>>>,
}

#[derive(Clone, Debug)]
pub struct ReceivedEmail {
    pub authorization: Option<String>,
    pub payload: Value,
}

pub struct RunningFakeResend {
    emails_url: String,
    received: Arc<Mutex<Vec<ReceivedEmail>>>,
}

impl FakeResend {
    pub fn new(required_api_key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            required_api_key: required_api_key.into(),
            message_id: DEFAULT_MESSAGE_ID.into(),
            rejection: None,
            return_invalid_response: false,
            received: Default::default(),
        }
    }

    pub fn with_message_id(self, message_id: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message_id: message_id.into(),
            ..self
        }
    }

    pub fn reject_with(self, status: u16, details: Value) -> Self {
        Self {
            rejection: Some((StatusCode::from_u16(status).unwrap(), details)),
            ..self
        }
    }

    pub fn return_invalid_response(self) -> Self {
        Self {
            return_invalid_response: true,
            ..self
        }
    }

    pub async fn start(self) -> RunningFakeResend {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        info!("Fake Resend listening on {address}");
        let received = self.received.clone();
        let app = Router::new()
            .route(EMAILS_PATH, post(send_email))
            .with_state(self);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        RunningFakeResend {
            emails_url: format!("http://{address}{EMAILS_PATH}"),
            received,
        }
    }
}

impl RunningFakeResend {
    pub fn emails_url(&self) -> String {
        self.emails_url.clone()
    }

    pub fn received_emails(&self) -> Vec<ReceivedEmail> {
        self.received.lock().unwrap().clone()
    }
}

async fn send_email(
    State(state): State<FakeResend>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    debug!("Got email payload:\n{payload}");
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let authorized = authorization.as_deref()
        == Some(format!("Bearer {}", state.required_api_key).as_str());
    state.received.lock().unwrap().push(ReceivedEmail {
        authorization,
        payload,
    });

    if !authorized {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "statusCode": 401,
                "name": "validation_error",
                "message": "API key is invalid",
            })),
        )
            .into_response()
    } else if state.return_invalid_response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "Invalid response",
        )
            .into_response()
    } else if let Some((status, details)) = state.rejection {
        (status, Json(details)).into_response()
    } else {
        (StatusCode::OK, Json(json!({ "id": state.message_id }))).into_response()
    }
}
