use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    backend::{BackendError, QueryReply},
    history::{History, Message, Notice},
    intake::{VideoId, extract_video_id},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Ingestion,
    Query,
}

/// Identifies one outstanding request. Settlements must present the
/// ticket that is currently outstanding or they are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestTicket {
    pub seq: u64,
    pub kind: RequestKind,
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub ticket: RequestTicket,
    pub video_id: VideoId,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub ticket: RequestTicket,
    pub query: String,
}

#[derive(Debug, Clone)]
enum Pending {
    Ingestion {
        ticket: RequestTicket,
        video_id: VideoId,
    },
    Query {
        ticket: RequestTicket,
    },
}

impl Pending {
    fn ticket(&self) -> RequestTicket {
        match self {
            Pending::Ingestion { ticket, .. } | Pending::Query { ticket } => *ticket,
        }
    }
}

/// Why a user action was not accepted. Rejections never issue a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("a video transcript is still loading")]
    IngestionInFlight,

    #[error("still waiting for the previous answer")]
    QueryInFlight,

    #[error("not a recognized video reference")]
    MalformedReference,

    #[error("no video is loaded yet")]
    NoVideo,

    #[error("question is empty")]
    EmptyQuestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// A transcript ingestion is outstanding.
    Idle,
    AwaitingVideo,
    Ready,
    AwaitingAnswer,
}

impl ConversationState {
    pub fn accepts_questions(&self) -> bool {
        *self == ConversationState::Ready
    }
}

/// User-facing status signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub state: ConversationState,
    pub loading: bool,
    pub typing: bool,
    pub video_loaded: bool,
    pub video_id: Option<VideoId>,
    pub last_failure: Option<Notice>,
}

/// All state of one conversation about one video at a time.
///
/// Every method is a synchronous transition with no I/O. Methods that
/// start a request hand back what to send; the caller performs the call
/// and reports the outcome through the matching `*_settled` method.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    reference: String,
    video_id: Option<VideoId>,
    history: History,
    draft: String,
    pending: Option<Pending>,
    next_seq: u64,
    last_failure: Option<Notice>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session that opens with the greeting notice.
    pub fn new() -> Self {
        let mut session = Self::blank();
        session.history.push_notice(Notice::Greeting);
        session
    }

    /// A fresh session with an empty history.
    pub fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: String::new(),
            video_id: None,
            history: History::new(),
            draft: String::new(),
            pending: None,
            next_seq: 0,
            last_failure: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn video_id(&self) -> Option<&VideoId> {
        self.video_id.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn messages(&self) -> &[Message] {
        self.history.as_slice()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn ingestion_in_flight(&self) -> bool {
        matches!(self.pending, Some(Pending::Ingestion { .. }))
    }

    pub fn query_in_flight(&self) -> bool {
        matches!(self.pending, Some(Pending::Query { .. }))
    }

    pub fn outstanding(&self) -> Option<RequestTicket> {
        self.pending.as_ref().map(Pending::ticket)
    }

    pub fn state(&self) -> ConversationState {
        match (&self.pending, &self.video_id) {
            (Some(Pending::Ingestion { .. }), _) => ConversationState::Idle,
            (Some(Pending::Query { .. }), _) => ConversationState::AwaitingAnswer,
            (None, None) => ConversationState::AwaitingVideo,
            (None, Some(_)) => ConversationState::Ready,
        }
    }

    pub fn status(&self) -> Status {
        Status {
            state: self.state(),
            loading: self.ingestion_in_flight(),
            typing: self.query_in_flight(),
            video_loaded: self.video_id.is_some(),
            video_id: self.video_id.clone(),
            last_failure: self.last_failure,
        }
    }

    /// Edit the raw video reference. Editing is never rejected.
    pub fn set_reference(&mut self, raw: impl Into<String>) {
        self.reference = raw.into();
    }

    /// Edit the question being typed.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    fn busy(&self) -> Option<Rejection> {
        match self.pending {
            Some(Pending::Ingestion { .. }) => Some(Rejection::IngestionInFlight),
            Some(Pending::Query { .. }) => Some(Rejection::QueryInFlight),
            None => None,
        }
    }

    fn issue(&mut self, kind: RequestKind) -> RequestTicket {
        self.next_seq += 1;
        RequestTicket {
            seq: self.next_seq,
            kind,
        }
    }

    /// Validate the current reference and start ingesting its transcript.
    ///
    /// A malformed reference appends [`Notice::InvalidReference`] and drops
    /// any loaded video without touching the in-flight flags.
    pub fn load_video(&mut self) -> Result<IngestRequest, Rejection> {
        if let Some(rejection) = self.busy() {
            tracing::debug!(session = %self.id, %rejection, "load rejected");
            return Err(rejection);
        }

        let Some(video_id) = extract_video_id(&self.reference) else {
            tracing::debug!(session = %self.id, reference = %self.reference, "malformed reference");
            self.video_id = None;
            self.last_failure = Some(Notice::InvalidReference);
            self.history.push_notice(Notice::InvalidReference);
            return Err(Rejection::MalformedReference);
        };

        let ticket = self.issue(RequestKind::Ingestion);
        self.video_id = None;
        self.pending = Some(Pending::Ingestion {
            ticket,
            video_id: video_id.clone(),
        });
        self.history.push_notice(Notice::LoadingStarted);
        tracing::debug!(session = %self.id, %video_id, seq = ticket.seq, "ingestion started");

        Ok(IngestRequest { ticket, video_id })
    }

    /// Apply the outcome of an ingestion request. Returns `false` if the
    /// ticket is not the outstanding ingestion and nothing was applied.
    pub fn ingestion_settled(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<(), BackendError>,
    ) -> bool {
        let video_id = match self.pending.take() {
            Some(Pending::Ingestion {
                ticket: outstanding,
                video_id,
            }) if outstanding == ticket => video_id,
            other => {
                tracing::warn!(session = %self.id, seq = ticket.seq, "discarding stale ingestion settlement");
                self.pending = other;
                return false;
            }
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(session = %self.id, %video_id, "video ready");
                self.video_id = Some(video_id);
                self.last_failure = None;
                self.history.push_notice(Notice::TranscriptLoaded);
            }
            Err(e) => {
                tracing::warn!(session = %self.id, %video_id, error = %e, "ingestion failed");
                self.video_id = None;
                self.last_failure = Some(Notice::LoadFailed);
                self.history.push_notice(Notice::LoadFailed);
            }
        }
        true
    }

    /// Record a question and start the query for it.
    pub fn submit(&mut self, text: &str) -> Result<QueryRequest, Rejection> {
        if let Some(rejection) = self.busy() {
            return Err(rejection);
        }
        if self.video_id.is_none() {
            return Err(Rejection::NoVideo);
        }

        let query = text.trim();
        if query.is_empty() {
            return Err(Rejection::EmptyQuestion);
        }
        let query = query.to_string();

        self.history.push_user(query.clone());
        self.draft.clear();
        let ticket = self.issue(RequestKind::Query);
        self.pending = Some(Pending::Query { ticket });
        tracing::debug!(session = %self.id, seq = ticket.seq, "query issued");

        Ok(QueryRequest { ticket, query })
    }

    /// Submit the current draft.
    pub fn submit_draft(&mut self) -> Result<QueryRequest, Rejection> {
        let draft = self.draft.clone();
        self.submit(&draft)
    }

    /// Apply the outcome of a query request. Returns `false` if the ticket
    /// is not the outstanding query and nothing was applied.
    pub fn answer_settled(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<QueryReply, BackendError>,
    ) -> bool {
        match self.pending.take() {
            Some(Pending::Query {
                ticket: outstanding,
            }) if outstanding == ticket => {}
            other => {
                tracing::warn!(session = %self.id, seq = ticket.seq, "discarding stale answer");
                self.pending = other;
                return false;
            }
        }

        match outcome {
            Ok(reply) => {
                self.last_failure = None;
                match reply.text() {
                    Some(answer) => {
                        self.history.push_assistant(answer);
                    }
                    None => {
                        self.history.push_notice(Notice::NoAnswer);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "query failed");
                self.last_failure = Some(Notice::QueryFailed);
                self.history.push_notice(Notice::QueryFailed);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::history::Origin;

    const URL: &str = "https://youtube.com/watch?v=abc123";

    fn not_found() -> BackendError {
        BackendError::Status {
            endpoint: "load_video",
            status: StatusCode::NOT_FOUND,
        }
    }

    fn server_error() -> BackendError {
        BackendError::Status {
            endpoint: "chat",
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn count_notice(session: &Session, notice: Notice) -> usize {
        session
            .messages()
            .iter()
            .filter(|m| m.notice() == Some(notice))
            .count()
    }

    fn ready_session() -> Session {
        let mut session = Session::blank();
        session.set_reference(URL);
        let req = session.load_video().unwrap();
        assert!(session.ingestion_settled(req.ticket, Ok(())));
        session
    }

    #[test]
    fn starts_awaiting_video_with_greeting() {
        let session = Session::new();
        assert_eq!(session.state(), ConversationState::AwaitingVideo);
        assert_eq!(session.history().len(), 1);
        assert_eq!(
            session.history().last().unwrap().notice(),
            Some(Notice::Greeting)
        );
        assert!(!session.ingestion_in_flight());
        assert!(!session.query_in_flight());
    }

    #[test]
    fn malformed_reference_sends_nothing() {
        let mut session = Session::blank();
        session.set_reference("https://youtube.com/watch");

        assert_eq!(session.load_video().unwrap_err(), Rejection::MalformedReference);
        assert!(!session.ingestion_in_flight());
        assert_eq!(session.outstanding(), None);
        assert_eq!(session.video_id(), None);
        assert_eq!(
            session.history().last().unwrap().notice(),
            Some(Notice::InvalidReference)
        );
        assert_eq!(session.status().last_failure, Some(Notice::InvalidReference));
    }

    #[test]
    fn successful_ingestion_round_trip() {
        let mut session = Session::blank();
        session.set_reference(URL);

        let req = session.load_video().unwrap();
        assert_eq!(req.video_id.as_str(), "abc123");
        assert_eq!(req.ticket.kind, RequestKind::Ingestion);
        assert!(session.ingestion_in_flight());
        assert_eq!(session.state(), ConversationState::Idle);
        assert!(session.status().loading);
        assert_eq!(
            session.history().last().unwrap().notice(),
            Some(Notice::LoadingStarted)
        );

        assert!(session.ingestion_settled(req.ticket, Ok(())));
        assert!(!session.ingestion_in_flight());
        assert_eq!(session.video_id().map(VideoId::as_str), Some("abc123"));
        assert_eq!(session.state(), ConversationState::Ready);
        assert!(session.status().video_loaded);
        assert_eq!(
            session.history().last().unwrap().notice(),
            Some(Notice::TranscriptLoaded)
        );
        assert_eq!(count_notice(&session, Notice::TranscriptLoaded), 1);
    }

    #[test]
    fn failed_ingestion_returns_to_awaiting_video() {
        let mut session = Session::blank();
        session.set_reference(URL);
        let req = session.load_video().unwrap();

        assert!(session.ingestion_settled(req.ticket, Err(not_found())));
        assert!(!session.ingestion_in_flight());
        assert_eq!(session.video_id(), None);
        assert!(!session.status().video_loaded);
        assert_eq!(session.state(), ConversationState::AwaitingVideo);

        let last = session.history().last().unwrap();
        assert_eq!(last.notice(), Some(Notice::LoadFailed));
        assert_ne!(last.text(), Notice::InvalidReference.text());
        assert_eq!(count_notice(&session, Notice::LoadFailed), 1);
    }

    #[test]
    fn failed_reload_drops_previous_video() {
        let mut session = ready_session();
        session.set_reference("https://youtube.com/watch?v=other");
        let req = session.load_video().unwrap();
        assert_eq!(session.video_id(), None);

        session.ingestion_settled(req.ticket, Err(not_found()));
        assert_eq!(session.video_id(), None);
        assert_eq!(session.state(), ConversationState::AwaitingVideo);
    }

    #[test]
    fn resubmitting_while_loading_is_rejected() {
        let mut session = Session::blank();
        session.set_reference(URL);
        let first = session.load_video().unwrap();
        let len = session.history().len();

        session.set_reference("https://youtube.com/watch?v=different");
        assert_eq!(session.load_video().unwrap_err(), Rejection::IngestionInFlight);
        session.set_reference("garbage");
        assert_eq!(session.load_video().unwrap_err(), Rejection::IngestionInFlight);
        assert_eq!(session.history().len(), len);
        assert_eq!(session.outstanding(), Some(first.ticket));

        session.ingestion_settled(first.ticket, Ok(()));
        assert_eq!(session.video_id().map(VideoId::as_str), Some("abc123"));
    }

    #[test]
    fn submit_round_trip() {
        let mut session = ready_session();
        session.set_draft("What is this about?");
        let before = session.history().len();

        let req = session.submit_draft().unwrap();
        assert_eq!(req.query, "What is this about?");
        assert_eq!(session.draft(), "");
        assert_eq!(session.state(), ConversationState::AwaitingAnswer);
        assert!(session.status().typing);

        let user = &session.messages()[before];
        assert_eq!(user.origin(), Origin::User);
        assert_eq!(user.text(), "What is this about?");
        assert_eq!(session.history().len(), before + 1);

        assert!(session.answer_settled(req.ticket, Ok(QueryReply::answer("It's about X"))));
        assert_eq!(session.state(), ConversationState::Ready);
        let answer = session.history().last().unwrap();
        assert_eq!(answer.origin(), Origin::Assistant);
        assert_eq!(answer.text(), "It's about X");
        assert_eq!(answer.notice(), None);
        assert_eq!(session.history().len(), before + 2);
    }

    #[test]
    fn submit_trims_text() {
        let mut session = ready_session();
        let req = session.submit("  why?\n").unwrap();
        assert_eq!(req.query, "why?");
        assert_eq!(session.messages()[session.history().len() - 1].text(), "why?");
    }

    #[test]
    fn missing_answer_uses_fallback() {
        let mut session = ready_session();
        let req = session.submit("anything?").unwrap();

        session.answer_settled(req.ticket, Ok(QueryReply::default()));
        let last = session.history().last().unwrap();
        assert_eq!(last.notice(), Some(Notice::NoAnswer));
        assert!(!last.text().is_empty());
        assert_eq!(session.state(), ConversationState::Ready);
    }

    #[test]
    fn failed_query_keeps_video_ready() {
        let mut session = ready_session();
        let req = session.submit("anything?").unwrap();

        session.answer_settled(req.ticket, Err(server_error()));
        let last = session.history().last().unwrap();
        assert_eq!(last.origin(), Origin::Assistant);
        assert_eq!(last.notice(), Some(Notice::QueryFailed));
        assert_eq!(session.state(), ConversationState::Ready);
        assert!(session.video_id().is_some());
        assert_eq!(session.status().last_failure, Some(Notice::QueryFailed));

        let req = session.submit("again").unwrap();
        session.answer_settled(req.ticket, Ok(QueryReply::answer("ok")));
        assert_eq!(session.status().last_failure, None);
    }

    #[test]
    fn submit_outside_ready_is_a_no_op() {
        let mut session = Session::blank();
        assert_eq!(session.submit("hello").unwrap_err(), Rejection::NoVideo);
        assert!(session.history().is_empty());

        session.set_reference(URL);
        let ingest = session.load_video().unwrap();
        let len = session.history().len();
        assert_eq!(session.submit("hello").unwrap_err(), Rejection::IngestionInFlight);
        assert_eq!(session.history().len(), len);
        session.ingestion_settled(ingest.ticket, Ok(()));

        let query = session.submit("first").unwrap();
        let len = session.history().len();
        assert_eq!(session.submit("second").unwrap_err(), Rejection::QueryInFlight);
        assert_eq!(session.load_video().unwrap_err(), Rejection::QueryInFlight);
        assert_eq!(session.history().len(), len);
        assert_eq!(session.outstanding(), Some(query.ticket));
    }

    #[test]
    fn blank_question_is_ignored() {
        let mut session = ready_session();
        let len = session.history().len();
        session.set_draft("   ");
        assert_eq!(session.submit_draft().unwrap_err(), Rejection::EmptyQuestion);
        assert_eq!(session.history().len(), len);
        assert_eq!(session.draft(), "   ");
        assert_eq!(session.state(), ConversationState::Ready);
    }

    #[test]
    fn stale_settlements_are_discarded() {
        let mut session = ready_session();
        let first = session.submit("one").unwrap();
        session.answer_settled(first.ticket, Ok(QueryReply::answer("1")));

        let second = session.submit("two").unwrap();
        let len = session.history().len();
        assert!(!session.answer_settled(first.ticket, Ok(QueryReply::answer("late"))));
        assert!(!session.ingestion_settled(first.ticket, Ok(())));
        assert_eq!(session.history().len(), len);
        assert_eq!(session.outstanding(), Some(second.ticket));

        assert!(session.answer_settled(second.ticket, Ok(QueryReply::answer("2"))));
        assert!(!session.answer_settled(second.ticket, Ok(QueryReply::answer("dup"))));
        assert_eq!(session.history().last().unwrap().text(), "2");
    }

    #[test]
    fn answers_follow_question_order() {
        let mut session = ready_session();
        for (q, a) in [("q1", "a1"), ("q2", "a2"), ("q3", "a3")] {
            let req = session.submit(q).unwrap();
            session.answer_settled(req.ticket, Ok(QueryReply::answer(a)));
        }

        let tail: Vec<&str> = session.messages()[2..].iter().map(Message::text).collect();
        assert_eq!(tail, vec!["q1", "a1", "q2", "a2", "q3", "a3"]);
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        LoadGood,
        LoadBad,
        IngestOk,
        IngestErr,
        Ask,
        AnswerOk,
        AnswerErr,
    }

    const STEPS: [Step; 7] = [
        Step::LoadGood,
        Step::LoadBad,
        Step::IngestOk,
        Step::IngestErr,
        Step::Ask,
        Step::AnswerOk,
        Step::AnswerErr,
    ];

    fn apply(session: &mut Session, step: Step) {
        let outstanding = session.outstanding();
        match step {
            Step::LoadGood => {
                session.set_reference(URL);
                let _ = session.load_video();
            }
            Step::LoadBad => {
                session.set_reference("nope");
                let _ = session.load_video();
            }
            Step::IngestOk | Step::IngestErr => {
                if let Some(t) = outstanding.filter(|t| t.kind == RequestKind::Ingestion) {
                    let outcome = match step {
                        Step::IngestOk => Ok(()),
                        _ => Err(not_found()),
                    };
                    assert!(session.ingestion_settled(t, outcome));
                    assert!(!session.ingestion_in_flight());
                }
            }
            Step::Ask => {
                let _ = session.submit("question");
            }
            Step::AnswerOk | Step::AnswerErr => {
                if let Some(t) = outstanding.filter(|t| t.kind == RequestKind::Query) {
                    let outcome = match step {
                        Step::AnswerOk => Ok(QueryReply::answer("answer")),
                        _ => Err(server_error()),
                    };
                    assert!(session.answer_settled(t, outcome));
                    assert_eq!(session.state(), ConversationState::Ready);
                }
            }
        }
    }

    fn check_invariants(before: &[Message], session: &Session) {
        assert!(!(session.ingestion_in_flight() && session.query_in_flight()));
        if session.query_in_flight() {
            assert!(session.video_id().is_some());
        }
        if session.ingestion_in_flight() {
            assert!(session.video_id().is_none());
        }
        assert!(session.messages().len() >= before.len());
        assert_eq!(&session.messages()[..before.len()], before);
        assert!(session.messages().len() - before.len() <= 2);
    }

    #[test]
    fn invariants_hold_for_every_short_sequence() {
        fn walk(session: &Session, depth: usize) {
            if depth == 0 {
                return;
            }
            for step in STEPS {
                let mut next = session.clone();
                let before = next.messages().to_vec();
                apply(&mut next, step);
                check_invariants(&before, &next);
                walk(&next, depth - 1);
            }
        }

        walk(&Session::new(), 5);
    }
}
