//! Single-worker access to the cache.
//!
//! Every history operation takes the cache lock without waiting. A request
//! that arrives while another holds it is rejected with `CoreError::Busy`.
//! Renders run on the blocking pool with the guard moved in, so reading the
//! index, transforming and advancing happen as one critical section.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, info_span};
use uuid::Uuid;

use crate::editing::{EditOutcome, Editor};
use crate::error::{CoreError, Result};
use crate::history::CacheHandler;
use crate::progress::ProgressSink;
use crate::types::EditOperation;

#[derive(Clone)]
pub struct EditSession {
    editor: Editor,
    cache: Arc<Mutex<CacheHandler>>,
}

impl EditSession {
    pub fn new(editor: Editor, cache: CacheHandler) -> Self {
        Self {
            editor,
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn is_busy(&self) -> bool {
        self.cache.try_lock().is_err()
    }

    fn lock(&self) -> Result<OwnedMutexGuard<CacheHandler>> {
        self.cache.clone().try_lock_owned().map_err(|_| CoreError::Busy)
    }

    /// Apply an operation built from the current artifact's path.
    pub async fn apply<F>(&self, build: F, progress: Option<ProgressSink>) -> Result<EditOutcome>
    where
        F: FnOnce(PathBuf) -> EditOperation + Send + 'static,
    {
        let mut guard = self.lock()?;
        let editor = self.editor.clone();
        let job = Uuid::new_v4();

        run_blocking(move || {
            let _span = info_span!("edit_job", %job).entered();
            let op = build(guard.current_path()?);
            info!(operation = op.name(), index = guard.current_index(), "edit started");
            guard.apply(&editor, &op, progress)
        })
        .await
    }

    pub async fn open(&self, source: PathBuf) -> Result<PathBuf> {
        let mut guard = self.lock()?;
        run_blocking(move || guard.open(&source)).await
    }

    pub async fn save(&self, output: PathBuf, overwrite: bool) -> Result<PathBuf> {
        let mut guard = self.lock()?;
        run_blocking(move || guard.save(&output, overwrite)).await
    }

    pub fn undo(&self) -> Result<PathBuf> {
        self.lock()?.undo()
    }

    pub fn redo(&self) -> Result<PathBuf> {
        self.lock()?.redo()
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear_history(None)
    }

    pub fn current_index(&self) -> Result<usize> {
        Ok(self.lock()?.current_index())
    }

    pub fn current_path(&self) -> Result<PathBuf> {
        self.lock()?.current_path()
    }

    pub fn previous_session(&self) -> Result<usize> {
        Ok(self.lock()?.scan_previous_session())
    }

    pub fn restore_session(&self) -> Result<usize> {
        Ok(self.lock()?.restore_session())
    }

    pub fn discard_previous_session(&self) -> Result<()> {
        self.lock()?.discard_previous_session()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.lock()?.shutdown()
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| CoreError::Transform(format!("edit worker stopped: {e}")))?
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::progress::{progress_channel, ProgressEvent};
    use crate::testing::{stream, write_source, FakeProvider};
    use crate::types::TimeInterval;
    use std::time::Duration;
    use tempfile::TempDir;

    fn session_with(provider: Arc<FakeProvider>, dir: &TempDir) -> EditSession {
        let config = EditorConfig::default().with_cache_dir(dir.path().join("cache"));
        let editor = Editor::new(provider, config.clone());
        EditSession::new(editor, CacheHandler::new(config).unwrap())
    }

    fn speed_up(factor: f64) -> impl FnOnce(PathBuf) -> EditOperation + Send + 'static {
        move |path| EditOperation::SetSpeed {
            path,
            factor,
            interval: None,
        }
    }

    #[tokio::test]
    async fn open_apply_undo_redo() {
        let dir = TempDir::new().unwrap();
        let session = session_with(Arc::new(FakeProvider::default()), &dir);
        let source = write_source(dir.path(), "a.mp4", &stream(640, 480, 12.0));

        session.open(source).await.unwrap();
        let outcome = session
            .apply(
                |path| EditOperation::Trim {
                    path,
                    interval: TimeInterval::new(2, 10).unwrap(),
                },
                None,
            )
            .await
            .unwrap();
        assert!((outcome.expected_duration - 8.0).abs() < 1e-9);
        assert_eq!(session.current_index().unwrap(), 2);

        session.undo().unwrap();
        assert_eq!(session.current_index().unwrap(), 1);
        session.redo().unwrap();
        assert_eq!(session.current_index().unwrap(), 2);

        let saved = session
            .save(dir.path().join("final.mp4"), false)
            .await
            .unwrap();
        assert!(saved.exists());

        session.clear().unwrap();
        assert_eq!(session.current_index().unwrap(), 0);
    }

    #[tokio::test]
    async fn apply_without_open_file_fails() {
        let dir = TempDir::new().unwrap();
        let session = session_with(Arc::new(FakeProvider::default()), &dir);

        let result = session.apply(speed_up(2.0), None).await;
        assert!(matches!(result, Err(CoreError::NoActiveFile)));
    }

    #[tokio::test]
    async fn second_request_while_rendering_is_rejected() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::gated());
        let session = session_with(provider.clone(), &dir);
        let source = write_source(dir.path(), "a.mp4", &stream(640, 480, 12.0));
        session.open(source).await.unwrap();

        let worker = {
            let session = session.clone();
            tokio::spawn(async move { session.apply(speed_up(2.0), None).await })
        };
        while !provider.render_entered() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(session.is_busy());
        assert!(matches!(
            session.apply(speed_up(3.0), None).await,
            Err(CoreError::Busy)
        ));
        assert!(matches!(session.undo(), Err(CoreError::Busy)));
        assert!(matches!(session.current_index(), Err(CoreError::Busy)));

        provider.release();
        let outcome = worker.await.unwrap().unwrap();
        assert!((outcome.expected_duration - 6.0).abs() < 1e-9);
        assert!(!session.is_busy());
        assert_eq!(session.current_index().unwrap(), 2);
        assert_eq!(provider.renders().len(), 1);
    }

    #[tokio::test]
    async fn progress_stream_ends_with_done() {
        let dir = TempDir::new().unwrap();
        let session = session_with(Arc::new(FakeProvider::default()), &dir);
        let source = write_source(dir.path(), "a.mp4", &stream(640, 480, 12.0));
        session.open(source).await.unwrap();

        let (tx, mut rx) = progress_channel();
        session.apply(speed_up(4.0), Some(tx)).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.last(), Some(&ProgressEvent::Done));
        assert!(events.contains(&ProgressEvent::Elapsed(3.0)));
    }

    #[tokio::test]
    async fn dropped_progress_listener_does_not_abort_edit() {
        let dir = TempDir::new().unwrap();
        let session = session_with(Arc::new(FakeProvider::default()), &dir);
        let source = write_source(dir.path(), "a.mp4", &stream(640, 480, 12.0));
        session.open(source).await.unwrap();

        let (tx, rx) = progress_channel();
        drop(rx);
        session.apply(speed_up(2.0), Some(tx)).await.unwrap();
        assert_eq!(session.current_index().unwrap(), 2);
    }

    #[tokio::test]
    async fn restart_offers_previous_history() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let session = session_with(provider.clone(), &dir);
        let source = write_source(dir.path(), "a.mp4", &stream(640, 480, 12.0));
        session.open(source).await.unwrap();
        session.apply(speed_up(2.0), None).await.unwrap();
        drop(session);

        let session = session_with(provider, &dir);
        assert_eq!(session.previous_session().unwrap(), 2);
        assert_eq!(session.restore_session().unwrap(), 2);
        session.shutdown().unwrap();
        assert_eq!(session.previous_session().unwrap(), 0);
    }
}
