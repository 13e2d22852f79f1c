//! Fill session types
//!
//! The session model, its state machine and the request/response shapes
//! the HTTP layer exchanges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{FillError, PageSize};
use crate::extract::{ChoiceGroup, FieldDescriptor, FillMode};
use crate::pdf::PdfTemplate;
use crate::record::SourceRecord;
use crate::template::TemplateBytes;

/// Session expiry time in hours
pub const SESSION_EXPIRY_HOURS: i64 = 8;

/// Maximum number of live sessions (0 = unlimited)
pub const MAX_SESSIONS: usize = 64;

// ============================================================================
// Request Types
// ============================================================================

/// Open a fill session for a template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub template_url: String,
    #[serde(default)]
    pub record: SourceRecord,
    pub document_kind: String,
}

/// Replace a field value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub value: String,
}

/// Select an option of a choice group, or clear the group with `null`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceUpdate {
    pub option: Option<String>,
}

// ============================================================================
// Session Types
// ============================================================================

/// Lifecycle of a fill session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Template is being fetched and opened
    Loading,
    /// Fill mode decided
    Classified,
    /// Fields and choices detected
    Extracted,
    /// Waiting for edits
    Editable,
    /// An output document is being produced
    Synthesizing,
    /// Last synthesis succeeded, still editable
    Done,
    /// Template could not be loaded
    LoadFailed,
    /// Nothing detected, or detection failed
    ExtractFailed,
}

impl SessionState {
    /// Fields and groups are final enough to draw
    pub fn is_renderable(&self) -> bool {
        matches!(
            self,
            Self::Extracted | Self::Editable | Self::Synthesizing | Self::Done | Self::ExtractFailed
        )
    }

    /// Still working towards a renderable state
    pub fn is_preparing(&self) -> bool {
        matches!(self, Self::Loading | Self::Classified)
    }

    fn accepts_edits(&self) -> bool {
        matches!(self, Self::Editable | Self::Done | Self::ExtractFailed)
    }
}

/// What the caller wants the output for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Flattened, as an attachment
    Download,
    /// Flattened, shown inline for printing
    Print,
    /// Flattened display copy; an AcroForm session keeps its editable copy
    Preview,
}

impl OutputKind {
    pub fn is_inline(&self) -> bool {
        !matches!(self, Self::Download)
    }
}

/// A synthesized document ready to be sent
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub kind: OutputKind,
}

/// One fill session
#[derive(Clone)]
pub struct FillSession {
    /// Unique session ID
    pub id: Uuid,

    pub template_url: String,

    /// Document kind, used in output filenames
    pub document_kind: String,

    pub record: SourceRecord,

    pub state: SessionState,

    /// State to return to when a synthesis ends
    resume_state: SessionState,

    pub mode: Option<FillMode>,

    /// Validated template bytes, shared by every consumer
    pub template: Option<TemplateBytes>,

    /// Opened template: the drawing surface for previews
    pub pdf: Option<PdfTemplate>,

    pub page_sizes: Vec<PageSize>,

    pub fields: Vec<FieldDescriptor>,

    pub groups: Vec<ChoiceGroup>,

    pub warnings: Vec<String>,

    /// Why loading failed
    pub error: Option<String>,

    /// Unflattened copy from the last AcroForm preview
    pub editable_copy: Option<Vec<u8>>,

    /// Session creation time
    pub created_at: DateTime<Utc>,

    /// Session expiry time
    pub expires_at: DateTime<Utc>,
}

impl FillSession {
    pub fn new(request: &CreateSessionRequest, expiry_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            template_url: request.template_url.clone(),
            document_kind: request.document_kind.clone(),
            record: request.record.clone(),
            state: SessionState::Loading,
            resume_state: SessionState::Loading,
            mode: None,
            template: None,
            pdf: None,
            page_sizes: Vec::new(),
            fields: Vec::new(),
            groups: Vec::new(),
            warnings: Vec::new(),
            error: None,
            editable_copy: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(expiry_hours),
        }
    }

    /// Check if session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Record a terminal load failure; nothing from the template is kept
    pub fn fail_load(&mut self, error: &FillError) {
        self.state = SessionState::LoadFailed;
        self.error = Some(error.to_string());
        self.template = None;
        self.pdf = None;
        self.page_sizes.clear();
    }

    /// Allow a user edit, reopening a finished session
    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Synthesizing => Err(SessionError::Busy),
            state if state.accepts_edits() => {
                if state == SessionState::Done {
                    self.state = SessionState::Editable;
                }
                Ok(())
            }
            state => Err(SessionError::InvalidState {
                state,
                action: "edit",
            }),
        }
    }

    /// Enter `Synthesizing`; a second request while one runs is rejected
    pub fn begin_synthesis(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Synthesizing => Err(SessionError::Busy),
            state if state.accepts_edits() => {
                self.resume_state = state;
                self.state = SessionState::Synthesizing;
                Ok(())
            }
            state => Err(SessionError::InvalidState {
                state,
                action: "synthesize",
            }),
        }
    }

    /// Leave `Synthesizing`
    pub fn finish_synthesis(&mut self, succeeded: bool) {
        if self.state != SessionState::Synthesizing {
            return;
        }
        self.state = if succeeded {
            SessionState::Done
        } else {
            self.resume_state
        };
    }

    pub fn field_mut(&mut self, field_id: &str) -> Option<&mut FieldDescriptor> {
        self.fields.iter_mut().find(|f| f.id == field_id)
    }

    pub fn group_mut(&mut self, key: &str) -> Option<&mut ChoiceGroup> {
        self.groups.iter_mut().find(|g| g.key == key)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            template_url: self.template_url.clone(),
            document_kind: self.document_kind.clone(),
            state: self.state,
            mode: self.mode,
            pages: self.page_sizes.clone(),
            fields: self.fields.clone(),
            groups: self.groups.clone(),
            warnings: self.warnings.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Client view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub template_url: String,
    pub document_kind: String,
    pub state: SessionState,
    pub mode: Option<FillMode>,
    pub pages: Vec<PageSize>,
    pub fields: Vec<FieldDescriptor>,
    pub groups: Vec<ChoiceGroup>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Session error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session limit reached: {0}")]
    CapacityExceeded(usize),

    #[error("A synthesis is already in progress")]
    Busy,

    #[error("Cannot {action} while session is {state:?}")]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },

    #[error("Field not found: {0}")]
    UnknownField(String),

    #[error("Choice group not found: {0}")]
    UnknownGroup(String),

    #[error("Group {group} has no option {option}")]
    UnknownOption { group: String, option: String },

    #[error(transparent)]
    Fill(#[from] FillError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> FillSession {
        let request = CreateSessionRequest {
            template_url: "https://forms.test/intake.pdf".to_string(),
            record: SourceRecord::default(),
            document_kind: "intake".to_string(),
        };
        FillSession::new(&request, SESSION_EXPIRY_HOURS)
    }

    #[test]
    fn test_new_session_is_loading() {
        let session = session();
        assert_eq!(session.state, SessionState::Loading);
        assert!(session.state.is_preparing());
        assert!(!session.state.is_renderable());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_second_synthesis_rejected() {
        let mut session = session();
        session.state = SessionState::Editable;

        session.begin_synthesis().unwrap();
        assert!(matches!(session.begin_synthesis(), Err(SessionError::Busy)));
        assert!(matches!(session.begin_edit(), Err(SessionError::Busy)));

        session.finish_synthesis(true);
        assert_eq!(session.state, SessionState::Done);
    }

    #[test]
    fn test_failed_synthesis_restores_state() {
        let mut session = session();
        session.state = SessionState::ExtractFailed;

        session.begin_synthesis().unwrap();
        session.finish_synthesis(false);
        assert_eq!(session.state, SessionState::ExtractFailed);
    }

    #[test]
    fn test_edit_reopens_done_session() {
        let mut session = session();
        session.state = SessionState::Done;

        session.begin_edit().unwrap();
        assert_eq!(session.state, SessionState::Editable);
    }

    #[test]
    fn test_no_edits_before_extraction() {
        let mut session = session();
        assert!(matches!(
            session.begin_edit(),
            Err(SessionError::InvalidState { action: "edit", .. })
        ));

        session.fail_load(&FillError::Load("404".into()));
        assert_eq!(session.state, SessionState::LoadFailed);
        assert!(session.begin_synthesis().is_err());
        assert!(session.error.as_deref().unwrap().contains("404"));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let json = serde_json::to_value(session().summary()).unwrap();
        assert_eq!(json["state"], "loading");
        assert_eq!(json["documentKind"], "intake");
        assert!(json.get("error").is_none());
    }
}
