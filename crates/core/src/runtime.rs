use std::{future::Future, sync::Arc};

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    backend::{AssistantBackend, BackendError, QueryReply},
    error::{Result, TubetalkError},
    history::Message,
    session::{IngestRequest, QueryRequest, Rejection, RequestTicket, Session, Status},
};

/// Something the user did.
#[derive(Debug, Clone)]
pub enum UserAction {
    EditReference(String),
    LoadVideo,
    EditDraft(String),
    Submit(String),
    SubmitDraft,
}

/// Something the front end should render.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    MessageAppended(Message),
    StateChanged(Status),
    Rejected(Rejection),
}

#[derive(Debug)]
enum Settlement {
    Ingestion {
        ticket: RequestTicket,
        outcome: std::result::Result<(), BackendError>,
    },
    Answer {
        ticket: RequestTicket,
        outcome: std::result::Result<QueryReply, BackendError>,
    },
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub greeting: bool,
    pub action_buffer: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            greeting: true,
            action_buffer: 16,
        }
    }
}

pub struct SessionHandle {
    pub session_id: Uuid,
    pub updates: mpsc::UnboundedReceiver<SessionUpdate>,
    actions: mpsc::Sender<UserAction>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<Session>,
}

impl SessionHandle {
    pub fn sender(&self) -> mpsc::Sender<UserAction> {
        self.actions.clone()
    }

    pub async fn send(&self, action: UserAction) -> Result<()> {
        self.actions
            .send(action)
            .await
            .map_err(|_| TubetalkError::RuntimeStopped {
                reason: "session task is no longer receiving actions".to_string(),
            })
    }

    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.updates.recv().await
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Stop taking actions, let any outstanding request settle, and hand
    /// back the final state. Every update emitted on the way goes to
    /// `on_update`. All senders from [`SessionHandle::sender`] must be
    /// dropped first.
    pub async fn finish(self, mut on_update: impl FnMut(SessionUpdate)) -> Result<Session> {
        let SessionHandle {
            mut updates,
            actions,
            shutdown_tx: _shutdown_tx,
            task,
            ..
        } = self;
        drop(actions);

        while let Some(update) = updates.recv().await {
            on_update(update);
        }
        task.await.map_err(|e| TubetalkError::RuntimeStopped {
            reason: e.to_string(),
        })
    }

    /// Stop the session now and hand back its final state. An outstanding
    /// request's result is dropped.
    pub async fn join(self) -> Result<Session> {
        self.shutdown();
        self.task.await.map_err(|e| TubetalkError::RuntimeStopped {
            reason: e.to_string(),
        })
    }
}

/// Spawn the task that owns a new session and drives it against `backend`.
pub fn start_session(
    backend: Arc<dyn AssistantBackend>,
    options: SessionOptions,
) -> SessionHandle {
    let session = if options.greeting {
        Session::new()
    } else {
        Session::blank()
    };
    let session_id = session.id();

    let (actions_tx, actions_rx) = mpsc::channel::<UserAction>(options.action_buffer.max(1));
    let (updates_tx, updates_rx) = mpsc::unbounded_channel::<SessionUpdate>();
    let (settlements_tx, settlements_rx) = mpsc::unbounded_channel::<Settlement>();
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    // Opening messages are part of the conversation the front end renders.
    for message in session.messages() {
        let _ = updates_tx.send(SessionUpdate::MessageAppended(message.clone()));
    }
    let _ = updates_tx.send(SessionUpdate::StateChanged(session.status()));

    let runtime = SessionRuntime {
        session,
        backend,
        updates: updates_tx,
        settlements: settlements_tx,
    };

    let span = tracing::info_span!("session", id = %session_id);
    let task = tokio::spawn(
        runtime
            .run(actions_rx, settlements_rx, shutdown_rx)
            .instrument(span),
    );

    SessionHandle {
        session_id,
        updates: updates_rx,
        actions: actions_tx,
        shutdown_tx,
        task,
    }
}

struct SessionRuntime {
    session: Session,
    backend: Arc<dyn AssistantBackend>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    settlements: mpsc::UnboundedSender<Settlement>,
}

impl SessionRuntime {
    async fn run(
        mut self,
        mut actions: mpsc::Receiver<UserAction>,
        mut settlements: mpsc::UnboundedReceiver<Settlement>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Session {
        tracing::debug!("session started");
        // Once the front end stops sending actions, the outstanding request
        // (if any) still settles before the session ends.
        let mut closing = false;
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                action = actions.recv(), if !closing => match action {
                    Some(action) => self.on_action(action),
                    None if self.session.outstanding().is_none() => break,
                    None => {
                        tracing::debug!("actions closed, waiting for outstanding request");
                        closing = true;
                    }
                },
                Some(settlement) = settlements.recv() => {
                    self.on_settlement(settlement);
                    if closing && self.session.outstanding().is_none() {
                        break;
                    }
                }
            }
        }

        if let Some(ticket) = self.session.outstanding() {
            tracing::debug!(seq = ticket.seq, "session ended with a request outstanding");
        }
        tracing::debug!("session stopped");
        self.session
    }

    fn on_action(&mut self, action: UserAction) {
        match action {
            UserAction::EditReference(raw) => self.session.set_reference(raw),
            UserAction::EditDraft(text) => self.session.set_draft(text),
            UserAction::LoadVideo => match self.observe(Session::load_video) {
                Ok(request) => self.dispatch_ingestion(request),
                Err(rejection) => self.reject(rejection),
            },
            UserAction::Submit(text) => match self.observe(|s| s.submit(&text)) {
                Ok(request) => self.dispatch_query(request),
                Err(rejection) => self.reject(rejection),
            },
            UserAction::SubmitDraft => match self.observe(Session::submit_draft) {
                Ok(request) => self.dispatch_query(request),
                Err(rejection) => self.reject(rejection),
            },
        }
    }

    fn on_settlement(&mut self, settlement: Settlement) {
        match settlement {
            Settlement::Ingestion { ticket, outcome } => {
                self.observe(|s| s.ingestion_settled(ticket, outcome));
            }
            Settlement::Answer { ticket, outcome } => {
                self.observe(|s| s.answer_settled(ticket, outcome));
            }
        }
    }

    /// Run one transition and publish whatever it changed.
    fn observe<T>(&mut self, transition: impl FnOnce(&mut Session) -> T) -> T {
        let seen = self.session.history().len();
        let status = self.session.status();

        let out = transition(&mut self.session);

        for message in &self.session.messages()[seen..] {
            self.publish(SessionUpdate::MessageAppended(message.clone()));
        }
        let now = self.session.status();
        if now != status {
            self.publish(SessionUpdate::StateChanged(now));
        }
        out
    }

    fn reject(&self, rejection: Rejection) {
        tracing::debug!(%rejection, "action rejected");
        self.publish(SessionUpdate::Rejected(rejection));
    }

    fn publish(&self, update: SessionUpdate) {
        if self.updates.send(update).is_err() {
            tracing::trace!("front end dropped its update receiver");
        }
    }

    fn dispatch_ingestion(&self, request: IngestRequest) {
        let backend = Arc::clone(&self.backend);
        let IngestRequest { ticket, video_id } = request;
        self.dispatch(
            ticket,
            async move { backend.load_video(&video_id).await },
            |ticket, outcome| Settlement::Ingestion { ticket, outcome },
        );
    }

    fn dispatch_query(&self, request: QueryRequest) {
        let backend = Arc::clone(&self.backend);
        let QueryRequest { ticket, query } = request;
        self.dispatch(
            ticket,
            async move { backend.ask(&query).await },
            |ticket, outcome| Settlement::Answer { ticket, outcome },
        );
    }

    /// Run a request to completion and feed its outcome back to the loop.
    /// A request task that dies without an outcome still settles, as an
    /// aborted request.
    fn dispatch<T, F>(
        &self,
        ticket: RequestTicket,
        request: F,
        settle: fn(RequestTicket, std::result::Result<T, BackendError>) -> Settlement,
    ) where
        T: Send + 'static,
        F: Future<Output = std::result::Result<T, BackendError>> + Send + 'static,
    {
        let settlements = self.settlements.clone();
        let request = tokio::spawn(request.in_current_span());
        tokio::spawn(
            async move {
                let outcome = match request.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(BackendError::Aborted {
                        reason: e.to_string(),
                    }),
                };
                if settlements.send(settle(ticket, outcome)).is_err() {
                    tracing::debug!(seq = ticket.seq, "session gone before request settled");
                }
            }
            .in_current_span(),
        );
    }
}
