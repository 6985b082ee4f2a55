//! Worker authentication at the gRPC boundary.
//!
//! Workers send two metadata entries on every call: their name
//! (`x-worker-name`) and the session token handed out when they registered
//! (`x-worker-session`). [`WorkerAuthInterceptor`] resolves the session once
//! per request and attaches the resulting [`WorkerIdentity`] to the request
//! extensions. Handlers take it from there and pass it on explicitly.

use std::sync::Arc;

use dashmap::DashMap;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};
use uuid::Uuid;

use crate::error::CoordinatorError;
use crate::model::Group;

pub const WORKER_NAME_HEADER: &str = "x-worker-name";
pub const WORKER_SESSION_HEADER: &str = "x-worker-session";

/// Authenticated caller of a worker RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub worker_name: String,
    pub group: Option<Group>,
}

impl WorkerIdentity {
    pub fn new(worker_id: impl Into<String>, worker_name: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_name: worker_name.into(),
            group: None,
        }
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    /// Fails with [`CoordinatorError::Forbidden`] unless both worker id and
    /// worker name are present.
    pub fn ensure_complete(&self) -> Result<&Self, CoordinatorError> {
        if self.worker_id.trim().is_empty() || self.worker_name.trim().is_empty() {
            return Err(CoordinatorError::Forbidden);
        }
        Ok(self)
    }
}

/// Extract the identity attached by the interceptor.
pub fn caller<T>(request: &Request<T>) -> Result<WorkerIdentity, CoordinatorError> {
    request
        .extensions()
        .get::<WorkerIdentity>()
        .cloned()
        .ok_or(CoordinatorError::Forbidden)
}

/// Open worker sessions, keyed by token.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, WorkerIdentity>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session with a fresh random token.
    pub fn open(&self, identity: WorkerIdentity) -> String {
        let token = Uuid::new_v4().to_string();
        self.insert(token.clone(), identity);
        token
    }

    /// Register a session under a known token (seeded workers).
    pub fn insert(&self, token: String, identity: WorkerIdentity) {
        tracing::debug!(worker = %identity.worker_name, "Worker session opened");
        self.sessions.insert(token, identity);
    }

    pub fn close(&self, token: &str) -> Option<WorkerIdentity> {
        self.sessions.remove(token).map(|(_, identity)| identity)
    }

    pub fn resolve(&self, token: &str) -> Option<WorkerIdentity> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Resolves worker credentials from request metadata.
#[derive(Debug, Clone)]
pub struct WorkerAuthInterceptor {
    sessions: SessionRegistry,
}

impl WorkerAuthInterceptor {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }
}

impl Interceptor for WorkerAuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata();
        let name = metadata
            .get(WORKER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let session = metadata
            .get(WORKER_SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let (name, session) = match (name, session) {
            (Some(name), Some(session)) => (name, session),
            _ => return Err(Status::unauthenticated("Missing worker credentials")),
        };

        let identity = self
            .sessions
            .resolve(&session)
            .filter(|identity| identity.worker_name == name)
            .ok_or_else(|| {
                tracing::warn!(worker = %name, "Rejected worker with unknown session");
                Status::unauthenticated("Invalid worker session")
            })?;

        request.extensions_mut().insert(identity);
        Ok(request)
    }
}

/// Client side: stamps worker credentials on every outgoing request.
#[derive(Debug, Clone)]
pub struct WorkerCredentials {
    name: MetadataValue<Ascii>,
    session: MetadataValue<Ascii>,
}

impl WorkerCredentials {
    pub fn new(name: &str, session: &str) -> Result<Self, CoordinatorError> {
        let invalid = |field: &str| {
            CoordinatorError::Internal(format!("{} is not valid request metadata", field))
        };
        Ok(Self {
            name: name.parse().map_err(|_| invalid("worker name"))?,
            session: session.parse().map_err(|_| invalid("worker session"))?,
        })
    }
}

impl Interceptor for WorkerCredentials {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        metadata.insert(WORKER_NAME_HEADER, self.name.clone());
        metadata.insert(WORKER_SESSION_HEADER, self.session.clone());
        Ok(request)
    }
}
