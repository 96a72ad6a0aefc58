use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::{
    error::{FlowError, GatewayError, Result},
    gateway::FileId,
    notice::NoticeBoard,
    store::{SessionId, SessionStore},
};

/// File extensions the analysis backend accepts, lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "png", "jpg", "jpeg", "heic", "mp4", "mov", "avi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Text,
    Image,
    Video,
}

impl MediaKind {
    /// Classify a file name by extension, ignoring case.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "png" | "jpg" | "jpeg" | "heic" => Some(Self::Image),
            "mp4" | "mov" | "avi" => Some(Self::Video),
            _ => None,
        }
    }

    /// Videos take noticeably longer to analyse; hosts show a hint for them.
    pub fn is_slow(self) -> bool {
        matches!(self, Self::Video)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub name: String,
    pub kind: MediaKind,
}

/// Moves a selected file to the backend and returns the id it was stored under.
#[async_trait]
pub trait FileIngestion: Send + Sync {
    async fn ingest(&self, file: &SelectedFile) -> std::result::Result<FileId, GatewayError>;
}

/// What the upload screen hands to the result screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub session_id: SessionId,
    pub file_id: FileId,
    pub kind: MediaKind,
}

pub struct UploadScreen {
    store: SessionStore,
    notices: NoticeBoard,
    selected: Option<SelectedFile>,
}

impl UploadScreen {
    pub fn new(store: SessionStore, notices: NoticeBoard) -> Self {
        Self {
            store,
            notices,
            selected: None,
        }
    }

    /// Entering the screen throws away the previous analysis and result and
    /// starts a new session.
    pub fn enter(&mut self) -> SessionId {
        self.selected = None;
        self.store.reset()
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn select_file(&mut self, name: &str) -> Result<&SelectedFile> {
        let Some(kind) = MediaKind::from_file_name(name) else {
            self.notices.error(
                "Unsupported file type",
                "Only text (.txt), image and video files can be uploaded.",
            );
            return Err(FlowError::UnsupportedFile(name.to_string()));
        };

        let selected = self.selected.insert(SelectedFile {
            name: name.to_string(),
            kind,
        });
        Ok(selected)
    }

    /// Hand the selected file to `ingestion`. The store is cleared again right
    /// before the transfer so nothing from an earlier run can leak into the
    /// result screen.
    pub async fn submit(&mut self, ingestion: &dyn FileIngestion) -> Result<UploadTicket> {
        let Some(file) = self.selected.clone() else {
            self.notices.warning(
                "Choose a file",
                "A text, image or video file is needed for the analysis.",
            );
            return Err(FlowError::NoFileSelected);
        };

        let session_id = self.store.reset();
        match ingestion.ingest(&file).await {
            Ok(file_id) => {
                info!(file_id = %file_id, kind = ?file.kind, "File uploaded");
                self.notices.success(
                    "Upload complete",
                    "The content is being analysed to build the map.",
                );
                Ok(UploadTicket {
                    session_id,
                    file_id,
                    kind: file.kind,
                })
            }
            Err(e) => {
                warn!(file = %file.name, "Upload failed: {}", e);
                self.notices.error("Upload failed", e.to_string());
                Err(FlowError::Gateway(e))
            }
        }
    }
}
