//! Messages exchanged between a controller and its workers.
//!
//! Three channels are in play and never share a message type:
//!
//! - the worker's default channel carries [`Signal`]s (readiness, chatter, fatal failures),
//! - the controller's request channel carries [`Envelope`]s,
//! - each request brings its own single-use reply channel carrying one [`Response`].
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{Error, Result};

pub type RequestId = Uuid;

/// Worker to controller message on the default channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Initialization finished; sent exactly once. Serializes as `"ready"`.
    Ready,
    /// Anything the worker wants to say before it is ready.
    Notice(String),
    /// Initialization failed; the worker exits after sending this.
    Failed(String),
}

/// An action name plus its arguments. On the wire: `[action, payload]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "(String, Value)", from = "(String, Value)")]
pub struct Request {
    pub action: String,
    pub payload: Value,
}

impl Request {
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }
}

impl From<(String, Value)> for Request {
    fn from((action, payload): (String, Value)) -> Self {
        Self { action, payload }
    }
}

impl From<Request> for (String, Value) {
    fn from(request: Request) -> Self {
        (request.action, request.payload)
    }
}

impl From<Action> for Request {
    fn from(action: Action) -> Self {
        let name = action.name();
        let payload = match action {
            Action::Ping | Action::Query | Action::Inc | Action::Dec => Value::Null,
            Action::Crunch { limit } => serde_json::json!({ "limit": limit }),
            Action::Attach { canvas } => serde_json::json!({ "canvas": canvas }),
        };
        Self::new(name, payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Err,
}

/// Outcome of a single request. On the wire: `["Ok", value]` or `["Err", message]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "(Status, Value)", from = "(Status, Value)")]
pub enum Response {
    Ok(Value),
    Err(String),
}

impl Response {
    pub fn status(&self) -> Status {
        match self {
            Response::Ok(_) => Status::Ok,
            Response::Err(_) => Status::Err,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    pub fn into_result(self) -> Result<Value> {
        match self {
            Response::Ok(value) => Ok(value),
            Response::Err(message) => Err(Error::Rejected(message)),
        }
    }
}

impl From<(Status, Value)> for Response {
    fn from((status, value): (Status, Value)) -> Self {
        match (status, value) {
            (Status::Ok, value) => Response::Ok(value),
            (Status::Err, Value::String(message)) => Response::Err(message),
            (Status::Err, other) => Response::Err(other.to_string()),
        }
    }
}

impl From<Response> for (Status, Value) {
    fn from(response: Response) -> Self {
        match response {
            Response::Ok(value) => (Status::Ok, value),
            Response::Err(message) => (Status::Err, Value::String(message)),
        }
    }
}

/// Rendering surface handed to the compute module by `attach`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

/// The closed set of actions a worker understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Ping,
    Crunch { limit: u32 },
    Attach { canvas: Surface },
    Query,
    Inc,
    Dec,
}

impl Action {
    pub const DEFAULT_CRUNCH_LIMIT: u32 = 1_000;

    pub fn name(&self) -> &'static str {
        match self {
            Action::Ping => "ping",
            Action::Crunch { .. } => "crunch",
            Action::Attach { .. } => "attach",
            Action::Query => "query",
            Action::Inc => "inc",
            Action::Dec => "dec",
        }
    }
}

#[derive(Deserialize)]
struct CrunchArgs {
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct AttachArgs {
    canvas: Surface,
}

fn parse_args<T: DeserializeOwned>(action: &'static str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|source| Error::InvalidPayload { action, source })
}

impl TryFrom<Request> for Action {
    type Error = Error;

    fn try_from(request: Request) -> Result<Self> {
        let Request { action, payload } = request;
        match action.as_str() {
            "ping" => Ok(Action::Ping),
            "crunch" => {
                let limit = match payload {
                    Value::Null => None,
                    payload => parse_args::<CrunchArgs>("crunch", payload)?.limit,
                };
                Ok(Action::Crunch {
                    limit: limit.unwrap_or(Action::DEFAULT_CRUNCH_LIMIT),
                })
            }
            "attach" => {
                let AttachArgs { canvas } = parse_args("attach", payload)?;
                Ok(Action::Attach { canvas })
            }
            "query" => Ok(Action::Query),
            "inc" => Ok(Action::Inc),
            "dec" => Ok(Action::Dec),
            _ => Err(Error::UnknownAction(action)),
        }
    }
}

/// Notification pushed by a worker over an event wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub value: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A request waiting in a worker's inbox.
#[derive(Debug)]
pub(crate) struct Dispatch {
    /// Identifier
    pub id: RequestId,

    /// Request
    pub request: Request,

    /// Reply channel, used exactly once
    pub reply: oneshot::Sender<Response>,

    /// Instant when this entry was queued
    pub queued_at: Instant,
}

impl Dispatch {
    pub fn new(request: Request, reply: oneshot::Sender<Response>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            reply,
            queued_at: Instant::now(),
        }
    }
}

/// Controller to worker message.
#[derive(Debug)]
pub(crate) enum Envelope {
    Request(Dispatch),
    WireUp(mpsc::UnboundedSender<Event>),
    Shutdown,
}
