//! Pending attachments for the next outgoing message.

use crate::api::ApiClient;
use crate::models::UploadFile;
use uuid::Uuid;

/// Files accepted from a single selection or drop.
pub const MAX_FILES_PER_SELECTION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
}

impl AttachmentKind {
    pub fn of(file: &UploadFile) -> Self {
        if file.is_image() {
            Self::Image
        } else {
            Self::Document
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub id: String,
    pub file: UploadFile,
    pub kind: AttachmentKind,
    /// Local preview handle, images only.
    pub local_url: Option<String>,
    /// 1-based ordinal shown to the user as `Attachment-<index>`.
    pub index: usize,
}

impl PendingUpload {
    pub fn label(&self) -> String {
        attachment_label(self.index)
    }

    /// Upper-cased extension shown on a document icon.
    pub fn extension_label(&self) -> String {
        self.file
            .name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_uppercase()
    }

    pub fn icon_color(&self) -> &'static str {
        document_icon_color(&self.file.name)
    }
}

pub fn attachment_label(index: usize) -> String {
    format!("Attachment-{}", index)
}

pub fn document_icon_color(name: &str) -> &'static str {
    let name = name.to_ascii_lowercase();
    if name.ends_with(".doc") || name.ends_with(".docx") {
        "#4a89dc"
    } else if name.ends_with(".xls") || name.ends_with(".xlsx") {
        "#2ecc71"
    } else {
        "#e74c3c"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { url: String, markdown: String },
    Failed { reason: String },
}

/// Per-ordinal result of uploading the whole queue, in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub outcomes: Vec<(usize, UploadOutcome)>,
    /// Set when the backend asked for re-authentication mid-way.
    pub interrupted: bool,
}

impl UploadReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn fragments(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                UploadOutcome::Uploaded { markdown, .. } => Some(markdown.as_str()),
                UploadOutcome::Failed { .. } => None,
            })
            .collect()
    }

    /// Successful fragments joined with a single space.
    pub fn markdown(&self) -> String {
        self.fragments().join(" ")
    }

    pub fn dropped(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter_map(|(index, outcome)| match outcome {
                UploadOutcome::Failed { .. } => Some(*index),
                UploadOutcome::Uploaded { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub done: usize,
    pub total: usize,
}

impl UploadProgress {
    pub fn label(&self) -> String {
        format!("Uploading ({}/{})", self.done, self.total)
    }
}

/// Ordered queue of pending uploads. Ordinals are always `1..=len()` in queue
/// order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadQueue {
    items: Vec<PendingUpload>,
    released: Vec<String>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[PendingUpload] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Preview handles released since the last call; the host revokes these.
    pub fn take_released(&mut self) -> Vec<String> {
        std::mem::take(&mut self.released)
    }

    /// Queues at most [`MAX_FILES_PER_SELECTION`] of `files`; returns the ids
    /// of the queued entries.
    pub fn add_files(&mut self, files: Vec<UploadFile>) -> Vec<String> {
        if files.len() > MAX_FILES_PER_SELECTION {
            log::warn!(
                "{} files selected, only the first {} are queued",
                files.len(),
                MAX_FILES_PER_SELECTION
            );
        }
        files
            .into_iter()
            .take(MAX_FILES_PER_SELECTION)
            .map(|file| self.push(file))
            .collect()
    }

    fn push(&mut self, file: UploadFile) -> String {
        let id = format!("attachment-{}", Uuid::new_v4().simple());
        let kind = AttachmentKind::of(&file);
        let local_url = match kind {
            AttachmentKind::Image => Some(format!("local://{}/{}", id, file.name)),
            AttachmentKind::Document => None,
        };
        let index = self.items.len() + 1;
        log::debug!("Queued {} as {}", file.name, attachment_label(index));
        self.items.push(PendingUpload {
            id: id.clone(),
            file,
            kind,
            local_url,
            index,
        });
        id
    }

    /// Removes an entry, releases its preview and renumbers the rest.
    pub fn remove(&mut self, id: &str) -> Option<PendingUpload> {
        let position = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(position);
        if let Some(url) = &removed.local_url {
            self.released.push(url.clone());
        }
        self.renumber();
        Some(removed)
    }

    pub fn remove_ordinal(&mut self, index: usize) -> Option<PendingUpload> {
        let id = self.items.iter().find(|item| item.index == index)?.id.clone();
        self.remove(&id)
    }

    fn renumber(&mut self) {
        for (position, item) in self.items.iter_mut().enumerate() {
            item.index = position + 1;
        }
    }

    /// Empties the queue, releasing previews and handing back the entries in
    /// ordinal order.
    pub fn drain(&mut self) -> Vec<PendingUpload> {
        let mut items = std::mem::take(&mut self.items);
        items.sort_by_key(|item| item.index);
        self.released
            .extend(items.iter().filter_map(|item| item.local_url.clone()));
        items
    }

    /// Uploads every entry one after another in ordinal order and empties the
    /// queue. A failed entry is logged and recorded; the rest still upload.
    pub async fn upload_all(
        &mut self,
        api: &ApiClient,
        mut progress: impl FnMut(UploadProgress),
    ) -> UploadReport {
        let items = self.drain();
        let total = items.len();
        let mut report = UploadReport::default();

        for (done, item) in items.into_iter().enumerate() {
            progress(UploadProgress { done, total });
            let index = item.index;
            let result = match item.kind {
                AttachmentKind::Image => api.upload_image(item.file).await,
                AttachmentKind::Document => api.upload_document(item.file).await,
            };
            let outcome = match result {
                Ok(Some(uploaded)) => {
                    let label = attachment_label(index);
                    let markdown = match item.kind {
                        AttachmentKind::Image => format!("![{}]({})", label, uploaded.file_url),
                        AttachmentKind::Document => format!("[{}]({})", label, uploaded.file_url),
                    };
                    UploadOutcome::Uploaded {
                        url: uploaded.file_url,
                        markdown,
                    }
                }
                Ok(None) => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    log::error!("Upload failed for {}: {}", attachment_label(index), e);
                    UploadOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.outcomes.push((index, outcome));
        }
        progress(UploadProgress {
            done: report.outcomes.len(),
            total,
        });
        report
    }
}

/// Attachment Markdown first, then the typed text after a blank line.
pub fn compose_message(attachments: &str, text: &str) -> String {
    match (attachments.is_empty(), text.is_empty()) {
        (true, _) => text.to_string(),
        (false, true) => attachments.to_string(),
        (false, false) => format!("{}\n\n{}", attachments, text),
    }
}
