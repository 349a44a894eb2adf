//! Results of asset uploads handed to the core by the host.
//!
//! The core never touches the uploaded bytes; it only waits for the URL (and,
//! for audio, the duration) and then places a clip on the timeline.

use std::task::Poll;

use futures::future::BoxFuture;

use crate::error::UploadError;
use crate::state::persistence::poll_once;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Audio,
    Image,
}

/// What the upload collaborator returns.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAsset {
    pub url: String,
    /// Length of an audio asset
    pub duration_ms: Option<f64>,
    /// Natural pixel size of an image asset
    pub size: Option<[u32; 2]>,
}

pub type UploadFuture = BoxFuture<'static, Result<UploadedAsset, UploadError>>;

/// A dismissible alert shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// An upload still waiting for its result.
pub struct PendingUpload {
    pub kind: AssetKind,
    pub name: String,
    /// Timeline time the clip will be placed at
    pub at_ms: f64,
    future: UploadFuture,
}

impl std::fmt::Debug for PendingUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingUpload")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("at_ms", &self.at_ms)
            .finish_non_exhaustive()
    }
}

/// A finished upload.
#[derive(Debug)]
pub struct CompletedUpload {
    pub kind: AssetKind,
    pub name: String,
    pub at_ms: f64,
    pub result: Result<UploadedAsset, UploadError>,
}

#[derive(Debug, Default)]
pub struct UploadQueue {
    pending: Vec<PendingUpload>,
}

impl UploadQueue {
    pub fn push(&mut self, kind: AssetKind, name: &str, at_ms: f64, future: UploadFuture) {
        self.pending.push(PendingUpload {
            kind,
            name: name.to_string(),
            at_ms,
            future,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Polls every pending upload once and returns those that finished, in
    /// submission order.
    pub fn poll(&mut self) -> Vec<CompletedUpload> {
        let mut done = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for mut upload in self.pending.drain(..) {
            match poll_once(&mut upload.future) {
                Poll::Ready(result) => done.push(CompletedUpload {
                    kind: upload.kind,
                    name: upload.name,
                    at_ms: upload.at_ms,
                    result,
                }),
                Poll::Pending => still_pending.push(upload),
            }
        }
        self.pending = still_pending;
        done
    }
}

/// Imports a file from the local disk, standing in for an upload service on
/// native builds. Images report their pixel size; audio length is unknown.
#[cfg(not(target_arch = "wasm32"))]
pub fn local_file_upload(kind: AssetKind, path: std::path::PathBuf) -> UploadFuture {
    use futures::FutureExt;

    async move {
        let path = std::fs::canonicalize(&path)
            .map_err(|err| UploadError::Failed(format!("{}: {err}", path.display())))?;
        let size = match kind {
            AssetKind::Image => {
                let (w, h) = image::image_dimensions(&path)
                    .map_err(|err| UploadError::Rejected(format!("{}: {err}", path.display())))?;
                Some([w, h])
            }
            AssetKind::Audio => None,
        };
        Ok(UploadedAsset {
            url: format!("file://{}", path.display()),
            duration_ms: None,
            size,
        })
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_missing_local_file_fails() {
        let mut fut = local_file_upload(AssetKind::Audio, "/definitely/not/here.wav".into());
        assert!(matches!(poll_once(&mut fut), Poll::Ready(Err(UploadError::Failed(_)))));
    }

    #[test]
    fn test_ready_and_pending_uploads_split() {
        let mut queue = UploadQueue::default();
        let asset = UploadedAsset { url: "u".into(), duration_ms: Some(3000.0), size: None };
        queue.push(AssetKind::Audio, "vo", 0.0, futures::future::ready(Ok(asset)).boxed());
        queue.push(AssetKind::Image, "ref", 0.0, futures::future::pending().boxed());
        let done = queue.poll();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].name, "vo");
        assert_eq!(queue.len(), 1);
    }
}
