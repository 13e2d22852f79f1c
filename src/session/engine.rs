//! Fill engine
//!
//! Drives a session through load, classification and extraction, then
//! serves previews, edits and synthesis on top of it. All sessions share one
//! loader, one resolver and one raster cache.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::acroform::{field_descriptors, read_interactive_fields};
use crate::document::{FillError, FillResult, PageSize, TextLayer};
use crate::extract::{
    ChoiceExtractor, ChoiceGroup, FieldDescriptor, FillMode, ModeClassifier, PlaceholderExtractor,
};
use crate::overlay::{layout_page, OverlayRenderer, PageFrame, PageOverlay, Surface};
use crate::pdf::PdfTemplate;
use crate::profile::{FillProfile, OffsetCorrection};
use crate::resolver::FieldResolver;
use crate::synth::{output_filename_today, preview_acroform, synthesize};
use crate::template::{TemplateBytes, TemplateLoader};

use super::manager::SessionManager;
use super::types::{
    CreateSessionRequest, FillSession, OutputKind, SessionError, SessionState, SessionSummary,
    SynthesisOutput,
};

/// Interval between expiry sweeps
const CLEANUP_INTERVAL_SECS: u64 = 300;

/// Runs fill sessions end to end
#[derive(Clone)]
pub struct FillEngine {
    inner: Arc<FillEngineInner>,
}

struct FillEngineInner {
    sessions: SessionManager,
    loader: TemplateLoader,
    resolver: FieldResolver,
    classifier: ModeClassifier,
    placeholders: PlaceholderExtractor,
    choices: ChoiceExtractor,
    renderer: OverlayRenderer,
}

/// Everything needed to draw one session's pages
struct DrawingSurface {
    pdf: PdfTemplate,
    page_sizes: Vec<PageSize>,
    fields: Vec<FieldDescriptor>,
    groups: Vec<ChoiceGroup>,
    offset: OffsetCorrection,
}

impl DrawingSurface {
    fn overlay(&self, page: usize, zoom: f32) -> FillResult<PageOverlay> {
        let size = self
            .page_sizes
            .get(page)
            .copied()
            .ok_or(FillError::PageNotFound(page))?;
        Ok(layout_page(page, size, zoom, &self.fields, &self.groups, self.offset))
    }
}

impl FillEngine {
    pub fn new(
        sessions: SessionManager,
        loader: TemplateLoader,
        profile: Arc<FillProfile>,
        renderer: OverlayRenderer,
    ) -> FillResult<Self> {
        let resolver = FieldResolver::new(profile);
        Ok(Self {
            inner: Arc::new(FillEngineInner {
                classifier: ModeClassifier::new(resolver.clone())?,
                placeholders: PlaceholderExtractor::new(resolver.clone()),
                choices: ChoiceExtractor::new(resolver.clone()),
                resolver,
                sessions,
                loader,
                renderer,
            }),
        })
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.inner.renderer
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create a session and prepare it in the background
    pub async fn start_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionSummary, SessionError> {
        let session = self.inner.sessions.create_session(request).await?;
        let engine = self.clone();
        let id = session.id;
        tokio::spawn(async move {
            if let Err(e) = engine.prepare(id).await {
                tracing::debug!(session_id = %id, error = %e, "Background preparation ended");
            }
        });
        Ok(session.summary())
    }

    /// Create and prepare a session before returning
    ///
    /// A template that fails to load leaves no session behind.
    pub async fn open_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionSummary, SessionError> {
        let id = self.inner.sessions.create_session(request).await?.id;
        if let Err(e) = self.prepare(id).await {
            let _ = self.inner.sessions.remove_session(id).await;
            return Err(e);
        }
        self.summary(id).await
    }

    /// Load, classify and extract
    ///
    /// Only a load failure is an error; detection problems end in
    /// `ExtractFailed` with a warning on the session.
    pub async fn prepare(&self, id: Uuid) -> Result<SessionState, SessionError> {
        let session = self.inner.sessions.get_session(id).await?;

        let (bytes, pdf, page_sizes) = match self.load(&session.template_url, id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(session_id = %id, error = %e, "Template load failed");
                self.inner
                    .sessions
                    .update_session(id, |s| {
                        s.fail_load(&e);
                        Ok(())
                    })
                    .await?;
                return Err(e.into());
            }
        };

        let pages = match pdf.all_pages().await {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Text layer unreadable");
                let warning = format!("Text layer could not be read: {}", e);
                return self
                    .inner
                    .sessions
                    .update_session(id, |s| {
                        s.template = Some(bytes);
                        s.pdf = Some(pdf);
                        s.page_sizes = page_sizes;
                        s.mode = Some(FillMode::Placeholder);
                        s.warnings.push(warning);
                        s.state = SessionState::ExtractFailed;
                        Ok(s.state)
                    })
                    .await;
            }
        };

        let mode = self
            .inner
            .classifier
            .classify(&pages, || Ok(interactive_names(&bytes, id)))?;

        self.inner
            .sessions
            .update_session(id, |s| {
                s.template = Some(bytes.clone());
                s.pdf = Some(pdf);
                s.page_sizes = page_sizes;
                s.mode = Some(mode);
                s.state = SessionState::Classified;
                Ok(())
            })
            .await?;

        let mut warnings = Vec::new();
        let (fields, groups) = match mode {
            FillMode::Placeholder => {
                let fields = self.inner.placeholders.extract(&pages, &session.record);
                let mut groups = self.inner.choices.extract(&pages);
                self.inner.choices.autofill(&mut groups, &session.record);
                (fields, groups)
            }
            FillMode::Acroform => match read_interactive_fields(&bytes) {
                Ok(interactive) => (
                    field_descriptors(&interactive, &self.inner.resolver, &session.record),
                    Vec::new(),
                ),
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Interactive fields unreadable");
                    warnings.push(format!("Interactive fields could not be read: {}", e));
                    (Vec::new(), Vec::new())
                }
            },
        };

        tracing::info!(
            session_id = %id,
            mode = ?mode,
            fields = fields.len(),
            groups = groups.len(),
            "Extraction finished"
        );

        let empty = fields.is_empty() && groups.is_empty();
        if empty {
            tracing::warn!(session_id = %id, "No fillable fields or choices detected");
            warnings.push("No fillable fields or choices detected".to_string());
        }

        self.inner
            .sessions
            .update_session(id, |s| {
                s.fields = fields;
                s.groups = groups;
                s.state = SessionState::Extracted;
                Ok(())
            })
            .await?;

        self.inner
            .sessions
            .update_session(id, |s| {
                s.warnings.extend(warnings);
                s.state = if empty {
                    SessionState::ExtractFailed
                } else {
                    SessionState::Editable
                };
                Ok(s.state)
            })
            .await
    }

    async fn load(
        &self,
        url: &str,
        id: Uuid,
    ) -> FillResult<(TemplateBytes, PdfTemplate, Vec<PageSize>)> {
        let bytes = self.inner.loader.load(url).await?;
        let pdf = PdfTemplate::open(bytes.clone(), id.to_string())
            .await
            .map_err(|e| FillError::Load(e.to_string()))?;
        let page_sizes = (0..pdf.page_count())
            .map(|page| pdf.page_size(page))
            .collect::<FillResult<Vec<_>>>()
            .map_err(|e| FillError::Load(e.to_string()))?;

        tracing::debug!(session_id = %id, pages = page_sizes.len(), bytes = bytes.len(), "Template opened");
        Ok((bytes, pdf, page_sizes))
    }

    pub async fn summary(&self, id: Uuid) -> Result<SessionSummary, SessionError> {
        Ok(self.inner.sessions.get_session(id).await?.summary())
    }

    /// Remove a session and its cached rasters
    pub async fn delete_session(&self, id: Uuid) -> Result<(), SessionError> {
        self.inner.sessions.remove_session(id).await?;
        self.inner.renderer.invalidate(&id.to_string()).await;
        Ok(())
    }

    // ========================================================================
    // Preview
    // ========================================================================

    /// Wait, within the retry policy, for a session to become drawable
    async fn surface(&self, id: Uuid) -> Result<DrawingSurface, SessionError> {
        self.inner.sessions.get_session(id).await?;

        let sessions = self.inner.sessions.clone();
        let resolver = self.inner.resolver.clone();
        let surface = self
            .inner
            .renderer
            .acquire(|| {
                let sessions = sessions.clone();
                let resolver = resolver.clone();
                async move {
                    match sessions.get_session(id).await {
                        Err(e) => Surface::Failed(e.to_string()),
                        Ok(s) => drawing_surface(s, &resolver),
                    }
                }
            })
            .await?;
        Ok(surface)
    }

    /// Rendered page with its overlay controls
    pub async fn render_page(
        &self,
        id: Uuid,
        page: usize,
        zoom: f32,
    ) -> Result<PageFrame, SessionError> {
        let surface = self.surface(id).await?;
        let overlay = surface.overlay(page, zoom)?;
        Ok(self
            .inner
            .renderer
            .frame(&id.to_string(), &surface.pdf, overlay)
            .await?)
    }

    /// Overlay controls only, for a zoom change over an already drawn page
    pub async fn overlay(
        &self,
        id: Uuid,
        page: usize,
        zoom: f32,
    ) -> Result<PageOverlay, SessionError> {
        Ok(self.surface(id).await?.overlay(page, zoom)?)
    }

    // ========================================================================
    // Edits
    // ========================================================================

    pub async fn update_field(
        &self,
        id: Uuid,
        field_id: &str,
        value: String,
    ) -> Result<FieldDescriptor, SessionError> {
        self.inner
            .sessions
            .update_session(id, |s| {
                s.begin_edit()?;
                s.editable_copy = None;
                let field = s
                    .field_mut(field_id)
                    .ok_or_else(|| SessionError::UnknownField(field_id.to_string()))?;
                field.current_value = value;
                Ok(field.clone())
            })
            .await
    }

    /// Select an option, or clear the group when `option` is `None`
    pub async fn select_option(
        &self,
        id: Uuid,
        group_key: &str,
        option: Option<&str>,
    ) -> Result<ChoiceGroup, SessionError> {
        self.inner
            .sessions
            .update_session(id, |s| {
                s.begin_edit()?;
                let group = s
                    .group_mut(group_key)
                    .ok_or_else(|| SessionError::UnknownGroup(group_key.to_string()))?;
                match option {
                    Some(token) => {
                        if !group.select(token) {
                            return Err(SessionError::UnknownOption {
                                group: group_key.to_string(),
                                option: token.to_string(),
                            });
                        }
                    }
                    None => group.clear(),
                }
                Ok(group.clone())
            })
            .await
    }

    // ========================================================================
    // Synthesis
    // ========================================================================

    /// Build an output document from the session's current state
    pub async fn synthesize(
        &self,
        id: Uuid,
        kind: OutputKind,
    ) -> Result<SynthesisOutput, SessionError> {
        let snapshot = self
            .inner
            .sessions
            .update_session(id, |s| {
                s.begin_synthesis()?;
                Ok(s.clone())
            })
            .await?;

        let result = run_synthesis(&snapshot, kind).await;

        let succeeded = result.is_ok();
        self.inner
            .sessions
            .update_session(id, |s| {
                s.finish_synthesis(succeeded);
                if let Ok((_, Some(editable))) = &result {
                    s.editable_copy = Some(editable.clone());
                }
                Ok(())
            })
            .await?;

        match result {
            Ok((bytes, _)) => {
                let filename = output_filename_today(&snapshot.record, &snapshot.document_kind);
                tracing::info!(
                    session_id = %id,
                    kind = ?kind,
                    filename = %filename,
                    bytes = bytes.len(),
                    "Output synthesized"
                );
                Ok(SynthesisOutput {
                    bytes,
                    filename,
                    kind,
                })
            }
            Err(e) => {
                tracing::error!(session_id = %id, kind = ?kind, error = %e, "Synthesis failed");
                Err(e.into())
            }
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Start background cleanup task
    pub fn start_cleanup_task(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));

            loop {
                interval.tick().await;
                for id in self.inner.sessions.cleanup_expired().await {
                    self.inner.renderer.invalidate(&id.to_string()).await;
                }
            }
        })
    }
}

fn drawing_surface(session: FillSession, resolver: &FieldResolver) -> Surface<DrawingSurface> {
    match session.state {
        SessionState::LoadFailed => Surface::Failed(
            session
                .error
                .unwrap_or_else(|| "Template failed to load".to_string()),
        ),
        state if state.is_renderable() => match session.pdf {
            Some(pdf) => Surface::Ready(DrawingSurface {
                pdf,
                page_sizes: session.page_sizes,
                offset: resolver.offset_for(&session.record),
                fields: session.fields,
                groups: session.groups,
            }),
            None => Surface::Failed("Template is not open".to_string()),
        },
        _ => Surface::Pending,
    }
}

/// Interactive field names for classification; unreadable forms count as none
fn interactive_names(bytes: &TemplateBytes, id: Uuid) -> Vec<String> {
    match read_interactive_fields(bytes) {
        Ok(fields) => fields.into_iter().map(|f| f.name).collect(),
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "Interactive fields unreadable");
            Vec::new()
        }
    }
}

/// Output bytes plus, for an AcroForm preview, the unflattened copy
async fn run_synthesis(
    session: &FillSession,
    kind: OutputKind,
) -> FillResult<(Vec<u8>, Option<Vec<u8>>)> {
    let template = session
        .template
        .clone()
        .ok_or_else(|| FillError::Synthesis("Template is not loaded".to_string()))?;
    let mode = session.mode.unwrap_or(FillMode::Placeholder);
    let fields = session.fields.clone();
    let groups = session.groups.clone();

    tokio::task::spawn_blocking(move || match (mode, kind) {
        (FillMode::Acroform, OutputKind::Preview) => preview_acroform(&template, &fields)
            .map(|preview| (preview.display, Some(preview.editable)))
            .map_err(|e| FillError::Synthesis(e.to_string())),
        _ => synthesize(&template, mode, &fields, &groups).map(|bytes| (bytes, None)),
    })
    .await
    .map_err(|e| FillError::Synthesis(format!("Task join error: {}", e)))?
}
