//! Chunk assembly service: init, chunk, finalize, status, and sweep.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info, warn};

use casitas_core::config::UploadConfig;
use casitas_core::error::{AppError, ErrorKind};
use casitas_core::traits::{
    Clock, MediaStore, MediaStoreDiagnostics, RecordStore, SessionStore, StorageProvider,
};
use casitas_core::types::{UploadId, media_folder};
use casitas_entity::upload::{ChunkSlot, SessionState, UploadSession};
use casitas_storage::chunked::{ChunkAssembler, ChunkedUploadHandler, OrphanChunkCleanup};

use super::request::{
    ChunkAccepted, ChunkRequest, FinalizeRequest, Finalized, InitRequest, Initialized,
    SessionStatus, SweepReport,
};
use crate::error::UploadError;

/// Stateful core of the chunk assembly service.
///
/// Sessions live in an injected [`SessionStore`]; chunk files live in an
/// injected scratch [`StorageProvider`] under paths derived from the upload
/// id, so concurrent uploads never touch each other's files.
#[derive(Clone)]
pub struct AssemblyService {
    sessions: Arc<dyn SessionStore<UploadSession>>,
    chunks: ChunkedUploadHandler,
    assembler: ChunkAssembler,
    cleanup: OrphanChunkCleanup,
    media: Arc<dyn MediaStore>,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: UploadConfig,
}

impl std::fmt::Debug for AssemblyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyService")
            .field("media", &self.media.provider_type())
            .field("records", &self.records.provider_type())
            .finish()
    }
}

/// Turn a blank string into `None`.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_upload_id(raw: String) -> Result<UploadId, UploadError> {
    UploadId::parse(raw).map_err(|e| UploadError::InvalidUploadId(e.message))
}

/// Map a session-level rule violation to the request error it represents.
fn session_rule(err: AppError) -> UploadError {
    match err.kind {
        ErrorKind::Conflict => UploadError::SessionClosed(err.message),
        _ => UploadError::InvalidChunk(err.message),
    }
}

impl AssemblyService {
    /// Creates a new assembly service.
    pub fn new(
        config: UploadConfig,
        scratch: Arc<dyn StorageProvider>,
        sessions: Arc<dyn SessionStore<UploadSession>>,
        media: Arc<dyn MediaStore>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let chunks = ChunkedUploadHandler::new(scratch.clone());
        Self {
            assembler: ChunkAssembler::new(chunks.clone()),
            cleanup: OrphanChunkCleanup::new(scratch),
            chunks,
            sessions,
            media,
            records,
            clock,
            config,
        }
    }

    /// Upload settings in effect.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Credential state of the media store, for error diagnostics.
    pub fn media_diagnostics(&self) -> MediaStoreDiagnostics {
        self.media.diagnostics()
    }

    /// Open (or reset) the session for an upload id.
    ///
    /// Re-using an id discards the previous session and its scratch files,
    /// unless that session is being finalized.
    pub async fn init(&self, req: InitRequest) -> Result<Initialized, UploadError> {
        let upload_id = present(req.upload_id);
        let file_name = present(req.file_name);
        let record_id = present(req.record_id);
        let file_size = req.file_size.filter(|&s| s > 0);

        let mut missing = Vec::new();
        if upload_id.is_none() {
            missing.push("uploadId");
        }
        if file_name.is_none() {
            missing.push("fileName");
        }
        if file_size.is_none() {
            missing.push("fileSize");
        }
        if record_id.is_none() {
            missing.push("recordId");
        }
        let (Some(upload_id), Some(file_name), Some(file_size), Some(record_id)) =
            (upload_id, file_name, file_size, record_id)
        else {
            return Err(UploadError::MissingFields(missing));
        };
        let upload_id = parse_upload_id(upload_id)?;

        let existing = self
            .sessions
            .get(upload_id.as_str())
            .await
            .map_err(UploadError::Storage)?;
        let reset = match existing {
            Some(previous) if previous.finalizing => {
                return Err(UploadError::FinalizeInProgress(upload_id.to_string()));
            }
            Some(previous) => {
                warn!(
                    upload_id = %upload_id,
                    received_chunks = previous.received_indices().len(),
                    state = %previous.state,
                    "Re-init of existing upload; discarding previous session"
                );
                self.cleanup
                    .cleanup_upload(&upload_id)
                    .await
                    .map_err(UploadError::Storage)?;
                true
            }
            None => false,
        };

        let mut session = UploadSession::new(
            upload_id.clone(),
            file_name,
            file_size,
            self.config.chunk_size_bytes,
            record_id,
            self.clock.now(),
        )
        .with_field_name(req.field_name);
        if let Some(total) = req.total_chunks {
            session
                .declare_total_chunks(total)
                .map_err(|e| UploadError::InvalidChunk(e.message))?;
        }
        let total_chunks = session.expected_chunks();

        info!(
            upload_id = %upload_id,
            file_name = %session.file_name,
            record_id = %session.record_id,
            bytes = file_size,
            total_chunks,
            "Upload session initialized"
        );

        self.sessions
            .set(session)
            .await
            .map_err(UploadError::Storage)?;

        Ok(Initialized {
            message: "Upload initialized".to_string(),
            upload_id: upload_id.to_string(),
            chunk_size: self.config.chunk_size_bytes,
            total_chunks,
            reset,
        })
    }

    /// Store one chunk. Resending an index overwrites the earlier chunk.
    pub async fn receive_chunk(&self, req: ChunkRequest) -> Result<ChunkAccepted, UploadError> {
        let upload_id = present(req.upload_id).ok_or(UploadError::MissingFields(vec!["uploadId"]))?;
        let upload_id = parse_upload_id(upload_id)?;

        let session = self
            .sessions
            .get(upload_id.as_str())
            .await
            .map_err(UploadError::Storage)?
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))?;

        let data = req
            .data
            .filter(|d| !d.is_empty())
            .ok_or(UploadError::NoChunkData)?;
        let index = req
            .chunk_index
            .ok_or(UploadError::MissingFields(vec!["chunkIndex"]))?;
        let total = req.total_chunks;

        // Validate against a copy before touching the disk.
        let mut draft = session;
        if let Some(total) = total {
            draft.declare_total_chunks(total).map_err(session_rule)?;
        }
        draft
            .record_chunk(
                index,
                ChunkSlot {
                    path: String::new(),
                    bytes: 0,
                },
            )
            .map_err(session_rule)?;

        let slot = self
            .chunks
            .write_chunk(&upload_id, index, data)
            .await
            .map_err(UploadError::Storage)?;
        let bytes = slot.bytes;

        let updated = self
            .sessions
            .update(
                upload_id.as_str(),
                Box::new(move |s: &mut UploadSession| {
                    if let Some(total) = total {
                        s.declare_total_chunks(total)?;
                    }
                    s.record_chunk(index, slot)?;
                    Ok(())
                }),
            )
            .await
            .map_err(|e| {
                if e.kind == ErrorKind::Conflict || e.kind == ErrorKind::Validation {
                    session_rule(e)
                } else {
                    UploadError::Storage(e)
                }
            })?
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))?;

        let received_chunks = updated.received_indices().len();
        debug!(
            upload_id = %upload_id,
            chunk_index = index,
            bytes,
            received_chunks,
            "Chunk received"
        );

        Ok(ChunkAccepted {
            message: format!("Chunk {index} received"),
            chunk_index: index,
            received_chunks,
        })
    }

    /// Assemble, store, and record an upload; returns the permanent URL.
    ///
    /// Each step persists its result on the session before the next one
    /// runs, so a failed finalize can be retried and resumes where it
    /// stopped: an assembled file is not re-assembled and a stored file is
    /// not uploaded twice.
    pub async fn finalize(&self, req: FinalizeRequest) -> Result<Finalized, UploadError> {
        let upload_id = present(req.upload_id);
        let record_id = present(req.record_id);
        let (upload_id, record_id) = match (upload_id, record_id) {
            (Some(u), Some(r)) => (u, r),
            (u, r) => {
                let mut missing = Vec::new();
                if u.is_none() {
                    missing.push("uploadId");
                }
                if r.is_none() {
                    missing.push("recordId");
                }
                return Err(UploadError::MissingFields(missing));
            }
        };
        let upload_id = parse_upload_id(upload_id)?;

        let claimed = self
            .sessions
            .update(
                upload_id.as_str(),
                Box::new(|s: &mut UploadSession| s.begin_finalize()),
            )
            .await
            .map_err(|e| match e.kind {
                ErrorKind::Conflict => UploadError::FinalizeInProgress(upload_id.to_string()),
                _ => UploadError::Storage(e),
            })?
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))?;

        if claimed.record_id != record_id {
            warn!(
                upload_id = %upload_id,
                session_record_id = %claimed.record_id,
                record_id = %record_id,
                "Finalize names a different record than init; using the finalize record"
            );
        }
        let file_name = present(req.file_name).unwrap_or_else(|| claimed.file_name.clone());
        let field_name = present(req.field_name).or_else(|| claimed.field_name.clone());

        let result = self
            .run_finalize(claimed, &file_name, &record_id, field_name.as_deref())
            .await;

        match &result {
            Ok(_) => {
                self.sessions
                    .delete(upload_id.as_str())
                    .await
                    .map_err(UploadError::Storage)?;
            }
            Err(e) => {
                warn!(upload_id = %upload_id, error = %e, "Finalize failed");
                let released = self
                    .sessions
                    .update(
                        upload_id.as_str(),
                        Box::new(|s: &mut UploadSession| {
                            s.end_finalize();
                            Ok(())
                        }),
                    )
                    .await;
                if let Err(release_err) = released {
                    error!(
                        upload_id = %upload_id,
                        error = %release_err,
                        "Failed to release finalize guard; retries conflict until the session expires"
                    );
                }
            }
        }
        result
    }

    async fn run_finalize(
        &self,
        mut session: UploadSession,
        file_name: &str,
        record_id: &str,
        field_name: Option<&str>,
    ) -> Result<Finalized, UploadError> {
        let upload_id = session.upload_id.clone();

        if session.state == SessionState::Receiving {
            if let Some(missing) = session.first_missing_chunk() {
                return Err(UploadError::MissingChunk(missing));
            }
            let (path, bytes) = self
                .assembler
                .assemble(&upload_id, &session.chunk_paths())
                .await
                .map_err(UploadError::Storage)?;
            session = self
                .advance(&upload_id, SessionState::Assembled { path, bytes })
                .await?;
        }

        if let SessionState::Assembled { path, bytes } = session.state.clone() {
            let data = self
                .chunks
                .read_assembled(&path)
                .await
                .map_err(UploadError::Storage)?;
            let folder = media_folder(&self.config.media_namespace, self.clock.now());
            let stored = self
                .media
                .upload(data, &folder, file_name)
                .await
                .map_err(UploadError::MediaStore)?;
            info!(
                upload_id = %upload_id,
                url = %stored.secure_url,
                folder = %folder,
                bytes,
                "Stored assembled upload in media store"
            );
            let url = stored.secure_url;
            session = match self
                .advance(&upload_id, SessionState::Stored { url: url.clone() })
                .await
            {
                Ok(session) => session,
                Err(e) => {
                    error!(
                        upload_id = %upload_id,
                        url = %url,
                        error = %e,
                        "Media stored but the session could not record it; the media URL is orphaned"
                    );
                    return Err(e);
                }
            };
            if let Err(e) = self.chunks.delete_assembled(&upload_id).await {
                warn!(upload_id = %upload_id, error = %e, "Failed to delete assembled file");
            }
        }

        let SessionState::Stored { url } = session.state else {
            return Err(UploadError::Storage(AppError::internal(format!(
                "Upload {upload_id} is in an unexpected state"
            ))));
        };

        if let Err(e) = self.record_url(record_id, field_name, &url).await {
            error!(
                upload_id = %upload_id,
                record_id,
                url = %url,
                error = %e,
                "Media stored but record update failed; the media URL is orphaned until finalize is retried"
            );
            return Err(e);
        }

        info!(upload_id = %upload_id, record_id, url = %url, "Upload finalized");
        Ok(Finalized { url })
    }

    /// Persist a state transition on the stored session.
    async fn advance(&self, upload_id: &UploadId, next: SessionState) -> Result<UploadSession, UploadError> {
        self.sessions
            .update(
                upload_id.as_str(),
                Box::new(move |s: &mut UploadSession| s.transition(next)),
            )
            .await
            .map_err(UploadError::Storage)?
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))
    }

    async fn record_url(&self, record_id: &str, field_name: Option<&str>, url: &str) -> Result<(), UploadError> {
        let to_upload_error = |e: AppError| {
            if e.is_not_found() {
                UploadError::RecordNotFound(record_id.to_string())
            } else {
                UploadError::RecordStore(e)
            }
        };

        self.records
            .get_evidence_list(record_id)
            .await
            .map_err(to_upload_error)?;
        self.records
            .append_evidence(record_id, url)
            .await
            .map_err(to_upload_error)?;
        if let Some(slot) = field_name {
            self.records
                .set_evidence_slot(record_id, slot, url)
                .await
                .map_err(to_upload_error)?;
        }
        Ok(())
    }

    /// Describe a session for diagnostics and resume.
    pub async fn status(&self, upload_id: &str) -> Result<SessionStatus, UploadError> {
        let upload_id = parse_upload_id(upload_id.to_string())?;
        let session = self
            .sessions
            .get(upload_id.as_str())
            .await
            .map_err(UploadError::Storage)?
            .ok_or_else(|| UploadError::SessionNotFound(upload_id.to_string()))?;

        Ok(SessionStatus {
            upload_id: upload_id.to_string(),
            total_chunks: session.expected_chunks(),
            received_chunks: session.received_indices(),
            state: session.state.as_str().to_string(),
            file_name: session.file_name,
            record_id: session.record_id,
            field_name: session.field_name,
            finalizing: session.finalizing,
            received_bytes: session.received_bytes,
            created_at: session.created_at,
        })
    }

    /// Drop sessions older than the retention window, with their scratch
    /// files, then remove scratch data that belongs to no live session.
    pub async fn sweep(&self) -> Result<SweepReport, AppError> {
        let now = self.clock.now();
        let cutoff = now - Duration::hours(self.config.session_retention_hours as i64);

        let expired = self.sessions.sweep(cutoff).await?;
        for session in &expired {
            info!(
                upload_id = %session.upload_id,
                state = %session.state,
                received_chunks = session.received_indices().len(),
                created_at = %session.created_at,
                "Swept expired upload session"
            );
            if let Err(e) = self.cleanup.cleanup_upload(&session.upload_id).await {
                warn!(upload_id = %session.upload_id, error = %e, "Failed to remove swept scratch files");
            }
        }

        let live = self.sessions.keys().await?;
        let orphans_removed = self
            .cleanup
            .sweep_orphans(cutoff, |id| live.iter().any(|k| k == id))
            .await?;

        Ok(SweepReport {
            sessions_removed: expired.len(),
            orphans_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use casitas_cache::MemorySessionStore;
    use casitas_core::traits::ManualClock;
    use casitas_database::MemoryRecordStore;
    use casitas_storage::{LocalStorageProvider, MemoryMediaStore};
    use chrono::{DateTime, Utc};

    use super::*;

    const CHUNK: u64 = 4;

    struct Harness {
        service: AssemblyService,
        sessions: Arc<MemorySessionStore<UploadSession>>,
        media: MemoryMediaStore,
        records: MemoryRecordStore,
        clock: Arc<ManualClock>,
        scratch: Arc<LocalStorageProvider>,
        _dir: tempfile::TempDir,
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-12T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Arc::new(LocalStorageProvider::new(dir.path()).await.unwrap());
        let sessions = Arc::new(MemorySessionStore::new());
        let media = MemoryMediaStore::new("https://media.test");
        let records = MemoryRecordStore::new();
        records.insert_record("r1").await;
        let clock = Arc::new(ManualClock::new(start()));
        let config = UploadConfig {
            chunk_size_bytes: CHUNK,
            ..UploadConfig::default()
        };
        let service = AssemblyService::new(
            config,
            scratch.clone(),
            sessions.clone(),
            Arc::new(media.clone()),
            Arc::new(records.clone()),
            clock.clone(),
        );
        Harness {
            service,
            sessions,
            media,
            records,
            clock,
            scratch,
            _dir: dir,
        }
    }

    fn init_req(id: &str, size: u64) -> InitRequest {
        InitRequest {
            upload_id: Some(id.into()),
            file_name: Some("a.jpg".into()),
            file_size: Some(size),
            record_id: Some("r1".into()),
            ..InitRequest::default()
        }
    }

    fn chunk_req(id: &str, index: u32, total: u32, data: &'static str) -> ChunkRequest {
        ChunkRequest {
            upload_id: Some(id.into()),
            chunk_index: Some(index),
            total_chunks: Some(total),
            data: Some(Bytes::from(data)),
        }
    }

    fn finalize_req(id: &str) -> FinalizeRequest {
        FinalizeRequest {
            upload_id: Some(id.into()),
            file_name: Some("a.jpg".into()),
            record_id: Some("r1".into()),
            field_name: None,
        }
    }

    #[tokio::test]
    async fn test_round_trip_in_any_order() {
        let h = harness().await;
        h.service.init(init_req("u1", 10)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 2, 3, "ij")).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 3, "abcd")).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 1, 3, "efgh")).await.unwrap();

        let before = h.records.get_evidence_list("r1").await.unwrap().len();
        let done = h.service.finalize(finalize_req("u1")).await.unwrap();

        assert!(done.url.starts_with("https://media.test/casitas/3/semana_11/"));
        assert_eq!(h.media.get(&done.url).await, Some(Bytes::from("abcdefghij")));
        let after = h.records.get_evidence_list("r1").await.unwrap();
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&done.url));

        // Session and scratch files are gone.
        assert!(h.sessions.get("u1").await.unwrap().is_none());
        assert!(h.scratch.list("_chunks").await.unwrap().is_empty());
        assert!(h.scratch.list("_assembled").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_chunk_reports_smallest_gap() {
        let h = harness().await;
        h.service.init(init_req("u1", 12)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 3, "abcd")).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 2, 3, "ijkl")).await.unwrap();

        let err = h.service.finalize(finalize_req("u1")).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingChunk(1)), "{err:?}");
        assert!(h.media.is_empty().await);

        // The guard was released and the session is still receiving.
        let status = h.service.status("u1").await.unwrap();
        assert!(!status.finalizing);
        assert_eq!(status.state, "receiving");
        assert_eq!(status.received_chunks, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_missing_chunk_without_announced_total_uses_declared_size() {
        let h = harness().await;
        h.service.init(init_req("u1", 8)).await.unwrap();
        h.service
            .receive_chunk(ChunkRequest {
                total_chunks: None,
                ..chunk_req("u1", 0, 0, "abcd")
            })
            .await
            .unwrap();

        let err = h.service.finalize(finalize_req("u1")).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingChunk(1)));
    }

    #[tokio::test]
    async fn test_resent_chunk_overwrites() {
        let h = harness().await;
        h.service.init(init_req("u1", 8)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 2, "AAAA")).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 1, 2, "BBBB")).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 2, "CCCC")).await.unwrap();

        let done = h.service.finalize(finalize_req("u1")).await.unwrap();
        assert_eq!(h.media.get(&done.url).await, Some(Bytes::from("CCCCBBBB")));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let h = harness().await;
        h.service.init(init_req("a", 4)).await.unwrap();
        h.service.init(init_req("b", 4)).await.unwrap();
        h.service.receive_chunk(chunk_req("a", 0, 1, "aaaa")).await.unwrap();
        h.service.receive_chunk(chunk_req("b", 0, 1, "bbbb")).await.unwrap();

        let a = h.service.finalize(finalize_req("a")).await.unwrap();
        assert_eq!(h.media.get(&a.url).await, Some(Bytes::from("aaaa")));
        assert_eq!(h.service.status("b").await.unwrap().received_chunks, vec![0]);

        let b = h.service.finalize(finalize_req("b")).await.unwrap();
        assert_eq!(h.media.get(&b.url).await, Some(Bytes::from("bbbb")));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let h = harness().await;

        let err = h.service.init(InitRequest::default()).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingFields(ref f) if f.len() == 4));

        let err = h.service.init(init_req("../x", 4)).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidUploadId(_)));

        let err = h
            .service
            .receive_chunk(chunk_req("ghost", 0, 1, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::SessionNotFound(_)));

        h.service.init(init_req("u1", 4)).await.unwrap();
        let err = h
            .service
            .receive_chunk(ChunkRequest {
                data: None,
                ..chunk_req("u1", 0, 1, "x")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NoChunkData));

        let err = h
            .service
            .receive_chunk(chunk_req("u1", 5, 1, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidChunk(_)), "{err:?}");
        assert!(h.service.status("u1").await.unwrap().received_chunks.is_empty());
        h.service.receive_chunk(chunk_req("u1", 0, 1, "abcd")).await.unwrap();
        let err = h
            .service
            .receive_chunk(chunk_req("u1", 0, 3, "abcd"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidChunk(_)));

        let err = h
            .service
            .finalize(FinalizeRequest {
                record_id: None,
                ..finalize_req("u1")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingFields(ref f) if f == &vec!["recordId"]));

        let err = h.service.finalize(finalize_req("ghost")).await.unwrap_err();
        assert!(matches!(err, UploadError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_chunk_index_beyond_declared_size_is_rejected() {
        let h = harness().await;
        h.service.init(init_req("u1", 8)).await.unwrap();

        let err = h
            .service
            .receive_chunk(ChunkRequest {
                total_chunks: None,
                ..chunk_req("u1", 20_000_000, 0, "x")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidChunk(_)), "{err:?}");

        let err = h
            .service
            .receive_chunk(chunk_req("u1", 0, u32::MAX, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidChunk(_)), "{err:?}");

        let session = h.sessions.get("u1").await.unwrap().unwrap();
        assert!(session.chunks.is_empty());
        assert!(session.total_chunks.is_none());
        assert!(h.scratch.list("_chunks").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_during_finalize_conflicts() {
        let h = harness().await;
        h.service.init(init_req("u1", 4)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 1, "abcd")).await.unwrap();
        h.sessions
            .update("u1", Box::new(|s: &mut UploadSession| s.begin_finalize()))
            .await
            .unwrap();

        let err = h
            .service
            .receive_chunk(chunk_req("u1", 0, 1, "late"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::SessionClosed(_)), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        h.sessions
            .update(
                "u1",
                Box::new(|s: &mut UploadSession| {
                    s.end_finalize();
                    Ok(())
                }),
            )
            .await
            .unwrap();
        let done = h.service.finalize(finalize_req("u1")).await.unwrap();
        assert_eq!(h.media.get(&done.url).await, Some(Bytes::from("abcd")));
    }

    #[tokio::test]
    async fn test_reinit_resets_session_and_scratch() {
        let h = harness().await;
        h.service.init(init_req("u1", 8)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 2, "abcd")).await.unwrap();

        let again = h.service.init(init_req("u1", 8)).await.unwrap();
        assert!(again.reset);
        assert!(h.service.status("u1").await.unwrap().received_chunks.is_empty());
        assert!(h.scratch.list("_chunks").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reinit_while_finalizing_conflicts() {
        let h = harness().await;
        h.service.init(init_req("u1", 4)).await.unwrap();
        h.sessions
            .update("u1", Box::new(|s: &mut UploadSession| s.begin_finalize()))
            .await
            .unwrap();

        let err = h.service.init(init_req("u1", 4)).await.unwrap_err();
        assert!(matches!(err, UploadError::FinalizeInProgress(_)));
        let err = h.service.finalize(finalize_req("u1")).await.unwrap_err();
        assert!(matches!(err, UploadError::FinalizeInProgress(_)));
    }

    #[tokio::test]
    async fn test_media_failure_is_retryable_without_reassembly() {
        let h = harness().await;
        h.service.init(init_req("u1", 4)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 1, "abcd")).await.unwrap();

        h.media.set_unavailable(true);
        let err = h.service.finalize(finalize_req("u1")).await.unwrap_err();
        assert!(matches!(err, UploadError::MediaStore(_)));
        assert_eq!(h.service.status("u1").await.unwrap().state, "assembled");

        h.media.set_unavailable(false);
        let done = h.service.finalize(finalize_req("u1")).await.unwrap();
        assert_eq!(h.media.get(&done.url).await, Some(Bytes::from("abcd")));
    }

    #[tokio::test]
    async fn test_record_failure_retries_without_second_media_write() {
        let h = harness().await;
        h.service.init(init_req("u1", 4)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 1, "abcd")).await.unwrap();

        h.records.set_unavailable(true);
        let err = h.service.finalize(finalize_req("u1")).await.unwrap_err();
        assert!(matches!(err, UploadError::RecordStore(_)));
        assert_eq!(h.media.len().await, 1);
        assert_eq!(h.service.status("u1").await.unwrap().state, "stored");

        h.records.set_unavailable(false);
        let done = h.service.finalize(finalize_req("u1")).await.unwrap();
        assert_eq!(h.media.len().await, 1);
        assert_eq!(h.records.get_evidence_list("r1").await.unwrap(), vec![done.url]);
    }

    #[tokio::test]
    async fn test_unknown_record_is_not_found() {
        let h = harness().await;
        h.service.init(init_req("u1", 4)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 1, "abcd")).await.unwrap();

        let err = h
            .service
            .finalize(FinalizeRequest {
                record_id: Some("missing".into()),
                ..finalize_req("u1")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::RecordNotFound(ref r) if r == "missing"));
    }

    #[tokio::test]
    async fn test_field_name_fills_evidence_slot() {
        let h = harness().await;
        h.service
            .init(InitRequest {
                field_name: Some("foto_fachada".into()),
                ..init_req("u1", 4)
            })
            .await
            .unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 1, "abcd")).await.unwrap();
        let done = h.service.finalize(finalize_req("u1")).await.unwrap();

        let record = h.records.record("r1").await.unwrap();
        assert_eq!(record.evidence_slots["foto_fachada"], done.url);
        assert_eq!(record.evidence_urls, vec![done.url]);
    }

    #[tokio::test]
    async fn test_sweep_discards_expired_sessions_and_files() {
        let h = harness().await;
        h.service.init(init_req("old", 8)).await.unwrap();
        h.service.receive_chunk(chunk_req("old", 0, 2, "abcd")).await.unwrap();

        h.clock.advance(Duration::hours(23));
        h.service.init(init_req("fresh", 4)).await.unwrap();
        h.clock.advance(Duration::hours(2));

        let report = h.service.sweep().await.unwrap();
        assert_eq!(report.sessions_removed, 1);

        let err = h.service.finalize(finalize_req("old")).await.unwrap_err();
        assert!(matches!(err, UploadError::SessionNotFound(_)));
        assert!(h.service.status("fresh").await.is_ok());
        assert!(!h.scratch.exists("_chunks/old").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_spares_session_being_finalized() {
        let h = harness().await;
        h.service.init(init_req("u1", 4)).await.unwrap();
        h.service.receive_chunk(chunk_req("u1", 0, 1, "abcd")).await.unwrap();
        h.sessions
            .update("u1", Box::new(|s: &mut UploadSession| s.begin_finalize()))
            .await
            .unwrap();

        h.clock.advance(Duration::hours(25));
        let report = h.service.sweep().await.unwrap();
        assert_eq!(report.sessions_removed, 0);
        assert!(h.scratch.exists("_chunks/u1").await.unwrap());

        h.sessions
            .update(
                "u1",
                Box::new(|s: &mut UploadSession| {
                    s.end_finalize();
                    Ok(())
                }),
            )
            .await
            .unwrap();
        let done = h.service.finalize(finalize_req("u1")).await.unwrap();
        assert_eq!(h.media.get(&done.url).await, Some(Bytes::from("abcd")));
    }
}
