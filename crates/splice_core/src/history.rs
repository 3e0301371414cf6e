//! Numbered cache of rendered artifacts with linear undo/redo.
//!
//! Slot `n` lives at `{cache_dir}/temp{n}.{ext}`. Slots `1..=current_index`
//! form the live history; existing slots above it are redo candidates. The
//! index is never persisted, a restart recovers it by scanning for the
//! highest contiguous slot.
//!
//! New artifacts are written to `partial.{ext}` and renamed into their slot
//! only once complete, so an interrupted write never shows up as a slot.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::editing::{EditOutcome, Editor};
use crate::error::{CoreError, Result};
use crate::progress::ProgressSink;
use crate::types::EditOperation;
use crate::validate::{prepare_output, validate_path};

pub struct CacheHandler {
    config: EditorConfig,
    current_index: usize,
}

impl CacheHandler {
    /// Create the cache directory if needed. The index starts at 0 even when
    /// old slots are on disk; see [`CacheHandler::restore_session`].
    pub fn new(config: EditorConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.cache_dir)
            .map_err(|e| CoreError::io(&config.cache_dir, e))?;
        let cache = Self {
            config,
            current_index: 0,
        };
        remove_partial(&cache.partial_path());
        debug!(cache_dir = %cache.cache_dir().display(), "cache ready");
        Ok(cache)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn slot_path(&self, index: usize) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("temp{index}.{}", self.config.extension))
    }

    pub fn current_path(&self) -> Result<PathBuf> {
        if self.current_index == 0 {
            return Err(CoreError::NoActiveFile);
        }
        Ok(self.slot_path(self.current_index))
    }

    pub fn next_path(&self) -> PathBuf {
        self.slot_path(self.current_index + 1)
    }

    fn pending_path(&self) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("pending.{}", self.config.extension))
    }

    fn partial_path(&self) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("partial.{}", self.config.extension))
    }

    /// Move a finished write into `slot`.
    fn commit(&self, partial: &Path, slot: &Path) -> Result<()> {
        std::fs::rename(partial, slot).map_err(|e| {
            remove_partial(partial);
            CoreError::io(slot, e)
        })
    }

    pub fn can_undo(&self) -> bool {
        self.current_index > 1
    }

    pub fn can_redo(&self) -> bool {
        self.next_path().is_file()
    }

    // -----------------------------------------------------------------------
    // History operations
    // -----------------------------------------------------------------------

    /// Import `source` as the newest artifact, dropping any redo history.
    pub fn open(&mut self, source: &Path) -> Result<PathBuf> {
        validate_path(source, &self.config.allowed_extensions)?;
        if !source.is_file() {
            return Err(CoreError::FileNotFound(source.to_path_buf()));
        }
        self.prune_from(self.current_index + 1)?;

        let partial = self.partial_path();
        if let Err(e) = std::fs::copy(source, &partial) {
            remove_partial(&partial);
            return Err(CoreError::io(source, e));
        }
        let slot = self.next_path();
        self.commit(&partial, &slot)?;
        self.current_index += 1;
        info!(
            source = %source.display(),
            index = self.current_index,
            "opened file into cache"
        );
        Ok(slot)
    }

    /// Render `op` into the next slot and advance. On failure, or if the
    /// render never returns, the index and every slot are untouched.
    pub fn apply(
        &mut self,
        editor: &Editor,
        op: &EditOperation,
        progress: Option<ProgressSink>,
    ) -> Result<EditOutcome> {
        self.prune_from(self.current_index + 1)?;

        let partial = self.partial_path();
        match editor.render_to(op, &partial, true, progress) {
            Ok(outcome) => {
                let slot = self.next_path();
                self.commit(&outcome.output, &slot)?;
                self.current_index += 1;
                info!(
                    operation = op.name(),
                    index = self.current_index,
                    expected_duration = outcome.expected_duration,
                    "applied edit"
                );
                Ok(EditOutcome {
                    output: slot,
                    ..outcome
                })
            }
            Err(e) => {
                remove_partial(&partial);
                warn!(operation = op.name(), error = %e, "edit failed, history unchanged");
                Err(e)
            }
        }
    }

    /// Step back one artifact. The newer slot stays on disk for redo.
    pub fn undo(&mut self) -> Result<PathBuf> {
        if !self.can_undo() {
            return Err(CoreError::NothingToUndo);
        }
        self.current_index -= 1;
        debug!(index = self.current_index, "undo");
        self.current_path()
    }

    pub fn redo(&mut self) -> Result<PathBuf> {
        if !self.can_redo() {
            return Err(CoreError::NothingToRedo);
        }
        self.current_index += 1;
        debug!(index = self.current_index, "redo");
        self.current_path()
    }

    /// Copy the current artifact to `output` through a side file, leaving
    /// the index and redo history as they were.
    pub fn save(&mut self, output: &Path, overwrite: bool) -> Result<PathBuf> {
        let current = self.current_path()?;
        let output = prepare_output(
            output,
            &self.config.extension,
            &self.config.allowed_extensions,
        )?;
        if output.exists() && !overwrite {
            return Err(CoreError::io(
                &output,
                io::Error::new(io::ErrorKind::AlreadyExists, "output file already exists"),
            ));
        }

        let pending = self.pending_path();
        if let Err(e) = std::fs::copy(&current, &pending) {
            remove_partial(&pending);
            return Err(CoreError::io(&current, e));
        }
        if let Err(e) = std::fs::rename(&pending, &output) {
            // Rename fails across filesystems; fall back to copy.
            debug!(error = %e, "rename failed, copying instead");
            let copied = std::fs::copy(&pending, &output);
            remove_partial(&pending);
            copied.map_err(|e| CoreError::io(&output, e))?;
        }
        info!(output = %output.display(), index = self.current_index, "saved current file");
        Ok(output)
    }

    /// Delete slots `1..=end_index` and reset the index. Every slot is
    /// attempted; failures are collected.
    ///
    /// Without `end_index` the whole history goes, redo slots above the
    /// current index included. An explicit `end_index` leaves slots above it
    /// on disk.
    pub fn clear_history(&mut self, end_index: Option<usize>) -> Result<()> {
        match end_index {
            Some(end) => self.sweep(end, false),
            None => self.sweep(self.current_index, true),
        }
    }

    fn sweep(&mut self, end: usize, prune_redo: bool) -> Result<()> {
        let mut failed = Vec::new();

        for index in 1..=end {
            let slot = self.slot_path(index);
            if let Err(e) = std::fs::remove_file(&slot) {
                warn!(path = %slot.display(), error = %e, "could not remove cache slot");
                failed.push(slot);
            }
        }
        if prune_redo {
            if let Err(e) = self.prune_from(end + 1) {
                warn!(error = %e, "could not prune redo slots");
                if let CoreError::Io { path, .. } = e {
                    failed.push(path);
                }
            }
        }
        remove_partial(&self.pending_path());
        remove_partial(&self.partial_path());

        self.current_index = 0;
        info!(cleared = end, failed = failed.len(), "cleared history");
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CoreError::CacheSweep(failed))
        }
    }

    /// Remove contiguous existing slots starting at `start`.
    pub fn prune_from(&self, start: usize) -> Result<usize> {
        let mut index = start;
        loop {
            let slot = self.slot_path(index);
            if !slot.is_file() {
                break;
            }
            std::fs::remove_file(&slot).map_err(|e| CoreError::io(&slot, e))?;
            index += 1;
        }
        let removed = index - start;
        if removed > 0 {
            debug!(start, removed, "pruned redo slots");
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Session recovery
    // -----------------------------------------------------------------------

    /// Highest contiguous slot left on disk, 0 when there is none.
    pub fn scan_previous_session(&self) -> usize {
        let mut index = 0;
        while self.slot_path(index + 1).is_file() {
            index += 1;
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.scan_previous_session() == 0
    }

    /// Adopt a leftover history, pointing the index at its newest slot.
    pub fn restore_session(&mut self) -> usize {
        self.current_index = self.scan_previous_session();
        info!(index = self.current_index, "restored previous session");
        self.current_index
    }

    pub fn discard_previous_session(&mut self) -> Result<()> {
        let found = self.scan_previous_session();
        self.sweep(found, true)
    }

    /// Explicit teardown: drop every artifact this handler knows about.
    pub fn shutdown(&mut self) -> Result<()> {
        let end = self.current_index.max(self.scan_previous_session());
        self.sweep(end, true)
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial file"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
