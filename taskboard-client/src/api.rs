/// Board API access
///
/// [`BoardApi`] is the seam between the reconciliation layer and the
/// network. [`HttpBoardApi`] speaks to the REST endpoints and the SSE event
/// stream; tests substitute an in-process implementation.
///
/// # Status mapping
///
/// | Status | Error |
/// |--------|-------|
/// | 401 | [`ClientError::Unauthorized`] |
/// | 404 | [`ClientError::NotFound`] |
/// | 409 | [`ClientError::Conflict`] |
/// | other non-2xx | [`ClientError::Api`] |
///
/// # Example
///
/// ```no_run
/// use taskboard_client::api::{BoardApi, HttpBoardApi};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpBoardApi::login(
///     "http://localhost:3000",
///     "ada@example.com",
///     "secret123",
///     Duration::from_secs(30),
/// )
/// .await?;
///
/// for task in api.list_tasks().await? {
///     println!("{} (v{})", task.title, task.version);
/// }
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use reqwest_eventsource::{retry, Event, EventSource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskboard_shared::board::NewTask;
use taskboard_shared::events::BoardEvent;
use taskboard_shared::models::{ActionLogDetails, Task, TaskChanges, TaskDetails, UserSummary};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Stream of decoded board events
pub type EventStream = BoxStream<'static, ClientResult<BoardEvent>>;

/// Operations the client performs against the board
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// Tasks visible to the caller, newest first
    async fn list_tasks(&self) -> ClientResult<Vec<Task>>;

    /// Current server state of one task
    async fn get_task(&self, task_id: Uuid) -> ClientResult<Task>;

    async fn create_task(&self, task: &NewTask) -> ClientResult<Task>;

    /// Version-checked update
    async fn update_task(
        &self,
        task_id: Uuid,
        version: i64,
        changes: &TaskChanges,
    ) -> ClientResult<Task>;

    /// Returns the id of the removed task
    async fn delete_task(&self, task_id: Uuid) -> ClientResult<Uuid>;

    /// Version-checked assignment to the least-loaded user
    async fn smart_assign(&self, task_id: Uuid, version: i64) -> ClientResult<Task>;

    /// Newest activity entries, newest first
    async fn recent_activity(&self) -> ClientResult<Vec<ActionLogDetails>>;

    async fn list_users(&self) -> ClientResult<Vec<UserSummary>>;

    /// Opens the live event stream
    ///
    /// Only events published after the stream opens are delivered.
    async fn subscribe(&self) -> ClientResult<EventStream>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    user: UserSummary,
    token: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    version: i64,

    #[serde(flatten)]
    changes: &'a TaskChanges,
}

#[derive(Serialize)]
struct SmartAssignRequest {
    version: i64,
}

#[derive(Deserialize)]
struct DeleteResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// REST + SSE implementation of [`BoardApi`]
#[derive(Clone)]
pub struct HttpBoardApi {
    http: Client,
    base_url: String,
    token: String,
    user: Option<UserSummary>,
    request_timeout: Duration,
}

impl HttpBoardApi {
    /// Uses an existing bearer token
    pub fn with_token(
        base_url: impl Into<String>,
        token: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            // No client-wide timeout: it would also cut off the event stream
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            user: None,
            request_timeout,
        }
    }

    /// Logs in with email and password
    pub async fn login(
        base_url: &str,
        email: &str,
        password: &str,
        request_timeout: Duration,
    ) -> ClientResult<Self> {
        let mut api = Self::with_token(base_url, String::new(), request_timeout);

        let response = api
            .http
            .post(api.url("/api/auth/login"))
            .timeout(request_timeout)
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let auth: AuthResponse = decode(response).await?;

        tracing::info!(user_id = %auth.user.id, username = %auth.user.username, "Logged in");

        api.token = auth.token;
        api.user = Some(auth.user);
        Ok(api)
    }

    /// The logged-in user, when created through [`HttpBoardApi::login`]
    pub fn user(&self) -> Option<&UserSummary> {
        self.user.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.request(self.http.get(self.url(path))).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn list_tasks(&self) -> ClientResult<Vec<Task>> {
        let tasks: Vec<TaskDetails> = self.get_json("/api/tasks").await?;
        Ok(tasks.into_iter().map(|details| details.task).collect())
    }

    async fn get_task(&self, task_id: Uuid) -> ClientResult<Task> {
        let details: TaskDetails = self.get_json(&format!("/api/tasks/{}", task_id)).await?;
        Ok(details.task)
    }

    async fn create_task(&self, task: &NewTask) -> ClientResult<Task> {
        let response = self
            .request(self.http.post(self.url("/api/tasks")))
            .json(task)
            .send()
            .await?;
        decode(response).await
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        version: i64,
        changes: &TaskChanges,
    ) -> ClientResult<Task> {
        let response = self
            .request(self.http.put(self.url(&format!("/api/tasks/{}", task_id))))
            .json(&UpdateRequest { version, changes })
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_task(&self, task_id: Uuid) -> ClientResult<Uuid> {
        let response = self
            .request(self.http.delete(self.url(&format!("/api/tasks/{}", task_id))))
            .send()
            .await?;
        let deleted: DeleteResponse = decode(response).await?;
        Ok(deleted.id)
    }

    async fn smart_assign(&self, task_id: Uuid, version: i64) -> ClientResult<Task> {
        let response = self
            .request(
                self.http
                    .put(self.url(&format!("/api/tasks/{}/smart-assign", task_id))),
            )
            .json(&SmartAssignRequest { version })
            .send()
            .await?;
        decode(response).await
    }

    async fn recent_activity(&self) -> ClientResult<Vec<ActionLogDetails>> {
        self.get_json("/api/activity").await
    }

    async fn list_users(&self) -> ClientResult<Vec<UserSummary>> {
        self.get_json("/api/users").await
    }

    async fn subscribe(&self) -> ClientResult<EventStream> {
        let request = self.http.get(self.url("/api/events")).bearer_auth(&self.token);
        let mut source =
            EventSource::new(request).map_err(|e| ClientError::Stream(e.to_string()))?;
        // Reconnecting is the session's job: it has to re-fetch the board
        source.set_retry_policy(Box::new(retry::Never));

        match source.next().await {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                source.close();
                return Err(stream_error(e));
            }
            None => {
                return Err(ClientError::Stream(
                    "event stream closed before opening".to_string(),
                ))
            }
        }

        tracing::debug!("Event stream connected");

        let events = source.filter_map(|item| async move {
            match item {
                Ok(Event::Open) => None,
                Ok(Event::Message(message)) => {
                    tracing::trace!(event = %message.event, "Board event received");
                    Some(decode_event(&message.data))
                }
                Err(reqwest_eventsource::Error::StreamEnded) => None,
                Err(e) => Some(Err(stream_error(e))),
            }
        });

        Ok(events.boxed())
    }
}

/// Payload of one `data:` frame on the event stream
fn decode_event(data: &str) -> ClientResult<BoardEvent> {
    Ok(serde_json::from_str(data)?)
}

fn stream_error(err: reqwest_eventsource::Error) -> ClientError {
    match err {
        reqwest_eventsource::Error::Transport(e) => ClientError::Http(e),
        reqwest_eventsource::Error::InvalidStatusCode(status, ..) => {
            status_error(status, status.canonical_reason().unwrap_or_default())
        }
        other => ClientError::Stream(other.to_string()),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Turns a non-2xx response into the matching [`ClientError`]
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::CONFLICT => ClientError::Conflict { message },
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        _ => ClientError::Api { status, message },
    }
}
