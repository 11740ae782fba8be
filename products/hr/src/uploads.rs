//! File uploads: per-kind policies, disk storage and the `uploads` ledger.

use std::path::{Component, Path, PathBuf};

use entity::{candidate_applications, employees, uploads};
use platform_api::{ApiError, ApiResult};
use platform_authz::Permission;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::Actor;
use crate::{db_error, now};

const MIB: usize = 1024 * 1024;

const PDF: &str = "application/pdf";
const DOC: &str = "application/msword";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLS: &str = "application/vnd.ms-excel";
const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const TXT: &str = "text/plain";
const JPEG: &str = "image/jpeg";
const PNG: &str = "image/png";
const GIF: &str = "image/gif";
const WEBP: &str = "image/webp";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UploadKind {
    Resume,
    Document,
    Avatar,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    pub folder: &'static str,
    pub max_bytes: usize,
    pub max_files: usize,
    pub mime_types: &'static [&'static str],
}

impl UploadKind {
    pub fn policy(self) -> UploadPolicy {
        match self {
            UploadKind::Resume => UploadPolicy {
                folder: "resumes",
                max_bytes: 10 * MIB,
                max_files: 1,
                mime_types: &[PDF, DOCX, DOC, TXT],
            },
            UploadKind::Document => UploadPolicy {
                folder: "documents",
                max_bytes: 20 * MIB,
                max_files: 5,
                mime_types: &[PDF, DOCX, DOC, XLSX, XLS, TXT, JPEG, PNG, GIF],
            },
            UploadKind::Avatar => UploadPolicy {
                folder: "avatars",
                max_bytes: 2 * MIB,
                max_files: 1,
                mime_types: &[JPEG, PNG, GIF, WEBP],
            },
        }
    }

    fn category(self) -> uploads::Category {
        match self {
            UploadKind::Resume => uploads::Category::Resume,
            UploadKind::Document => uploads::Category::Document,
            UploadKind::Avatar => uploads::Category::Avatar,
        }
    }
}

/// One multipart file part, fully buffered.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadPolicy {
    pub fn check(&self, files: &[IncomingFile]) -> ApiResult<()> {
        if files.is_empty() {
            return Err(ApiError::bad_request("No files uploaded"));
        }
        if files.len() > self.max_files {
            return Err(ApiError::rejected(
                "FILE_COUNT_EXCEEDED",
                format!("Too many files. Maximum is {}", self.max_files),
            ));
        }
        for file in files {
            if !self.mime_types.contains(&file.content_type.as_str()) {
                return Err(ApiError::rejected(
                    "INVALID_FILE_TYPE",
                    format!("File type {} is not allowed", file.content_type),
                ));
            }
            if file.bytes.len() > self.max_bytes {
                return Err(ApiError::rejected(
                    "FILE_SIZE_EXCEEDED",
                    format!(
                        "File too large. Maximum size is {}MB",
                        self.max_bytes / MIB
                    ),
                ));
            }
            if file.bytes.is_empty() {
                return Err(ApiError::bad_request("Uploaded file is empty"));
            }
        }
        Ok(())
    }
}

/// Lower-cased extension including the dot, or empty.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_str() {
        ".pdf" => PDF,
        ".doc" => DOC,
        ".docx" => DOCX,
        ".xls" => XLS,
        ".xlsx" => XLSX,
        ".txt" => TXT,
        ".jpg" | ".jpeg" => JPEG,
        ".png" => PNG,
        ".gif" => GIF,
        ".webp" => WEBP,
        _ => "application/octet-stream",
    }
}

fn plain_segment(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !segment.contains(['/', '\\'])
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: Uuid,
    pub original_name: String,
    pub file_name: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

impl From<uploads::Model> for StoredFile {
    fn from(upload: uploads::Model) -> Self {
        Self {
            url: format!("/api/files/{}", upload.relative_path()),
            id: upload.id,
            file_name: upload.stored_name,
            original_name: upload.original_name,
            mime_type: upload.mime_type,
            size_bytes: upload.size_bytes,
        }
    }
}

/// Files live under `root/<folder>/<stored name>`.
#[derive(Clone, Debug)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `file` to disk and record it.
    pub async fn save<C: ConnectionTrait>(
        &self,
        db: &C,
        org_id: Option<Uuid>,
        owner_id: Uuid,
        kind: UploadKind,
        stored_name: &str,
        file: &IncomingFile,
    ) -> ApiResult<uploads::Model> {
        let folder = kind.policy().folder;
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::internal(anyhow::Error::new(e)))?;
        tokio::fs::write(dir.join(stored_name), &file.bytes)
            .await
            .map_err(|e| ApiError::internal(anyhow::Error::new(e)))?;

        uploads::ActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(org_id),
            owner_id: Set(owner_id),
            category: Set(kind.category()),
            folder: Set(folder.to_string()),
            stored_name: Set(stored_name.to_string()),
            original_name: Set(file.file_name.clone()),
            mime_type: Set(file.content_type.clone()),
            size_bytes: Set(file.bytes.len() as i64),
            created_at: Set(now()),
        }
        .insert(db)
        .await
        .map_err(db_error)
    }

    /// Map a `/api/files/:folder/:filename` request onto disk.
    pub async fn resolve(&self, folder: &str, filename: &str) -> ApiResult<PathBuf> {
        if !plain_segment(folder) || !plain_segment(filename) {
            return Err(ApiError::forbidden("Access denied"));
        }
        let path = self.root.join(folder).join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(ApiError::not_found("File not found")),
        }
    }
}

#[instrument(skip(db, store, files), fields(user_id = %actor.user_id))]
pub async fn upload_documents<C: ConnectionTrait>(
    db: &C,
    store: &UploadStore,
    actor: &Actor,
    files: Vec<IncomingFile>,
) -> ApiResult<Vec<StoredFile>> {
    actor.require(Permission::FilesUpload)?;
    UploadKind::Document.policy().check(&files)?;
    let mut stored = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let name = format!(
            "doc-{}-{}-{index}{}",
            actor.user_id,
            now().timestamp_millis(),
            extension_of(&file.file_name)
        );
        let upload = store
            .save(db, Some(actor.org_id), actor.user_id, UploadKind::Document, &name, file)
            .await?;
        stored.push(StoredFile::from(upload));
    }
    info!(count = stored.len(), "documents uploaded");
    Ok(stored)
}

/// Replace the caller's avatar. The employee profile, when present, points at
/// the new file.
#[instrument(skip(db, store, files), fields(user_id = %actor.user_id))]
pub async fn upload_avatar<C: ConnectionTrait>(
    db: &C,
    store: &UploadStore,
    actor: &Actor,
    files: Vec<IncomingFile>,
) -> ApiResult<StoredFile> {
    actor.require(Permission::FilesUpload)?;
    if files.is_empty() {
        return Err(ApiError::bad_request("No avatar file uploaded"));
    }
    UploadKind::Avatar.policy().check(&files)?;
    let file = &files[0];
    let name = format!("avatar-{}{}", actor.user_id, extension_of(&file.file_name));
    let upload = store
        .save(db, Some(actor.org_id), actor.user_id, UploadKind::Avatar, &name, file)
        .await?;
    if let Some(employee_id) = actor.employee_id {
        if let Some(employee) = employees::Entity::find_by_id(employee_id)
            .one(db)
            .await
            .map_err(db_error)?
        {
            let mut active: employees::ActiveModel = employee.into();
            active.avatar_path = Set(Some(upload.relative_path()));
            active.updated_at = Set(now());
            active.update(db).await.map_err(db_error)?;
        }
    }
    Ok(StoredFile::from(upload))
}

/// Locate a stored file the actor may read. Anything outside the actor's
/// reach answers "File not found", the same as a missing file.
///
/// Avatars are visible org-wide. Documents are visible to their owner and
/// to HR/Admin of the owning org. Resumes are visible to recruiters of an org
/// the candidate applied to.
#[instrument(skip(db, store), fields(user_id = %actor.user_id))]
pub async fn open_file<C: ConnectionTrait>(
    db: &C,
    store: &UploadStore,
    actor: &Actor,
    folder: &str,
    filename: &str,
) -> ApiResult<(uploads::Model, PathBuf)> {
    if !plain_segment(folder) || !plain_segment(filename) {
        return Err(ApiError::forbidden("Access denied"));
    }
    let missing = || ApiError::not_found("File not found");
    let upload = uploads::Entity::find()
        .filter(uploads::Column::Folder.eq(folder))
        .filter(uploads::Column::StoredName.eq(filename))
        .order_by_desc(uploads::Column::CreatedAt)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(missing)?;

    let readable = match upload.category {
        uploads::Category::Avatar => upload.org_id == Some(actor.org_id),
        uploads::Category::Document => {
            upload.org_id == Some(actor.org_id)
                && (upload.owner_id == actor.user_id || actor.is_hr_admin())
        }
        uploads::Category::Resume => {
            actor.require(Permission::RecruitmentRead).is_ok()
                && candidate_applications::Entity::find()
                    .filter(candidate_applications::Column::CandidateId.eq(upload.owner_id))
                    .filter(candidate_applications::Column::OrgId.eq(actor.org_id))
                    .count(db)
                    .await
                    .map_err(db_error)?
                    > 0
        }
    };
    if !readable {
        return Err(missing());
    }
    let path = store.resolve(folder, filename).await?;
    Ok((upload, path))
}

pub async fn list_documents<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<Vec<StoredFile>> {
    actor.require(Permission::FilesUpload)?;
    let rows = uploads::Entity::find()
        .filter(uploads::Column::OwnerId.eq(actor.user_id))
        .filter(uploads::Column::Category.eq(uploads::Category::Document))
        .order_by_desc(uploads::Column::CreatedAt)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().map(StoredFile::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content_type: &str, size: usize) -> IncomingFile {
        IncomingFile {
            field: "documents".into(),
            file_name: "report.PDF".into(),
            content_type: content_type.into(),
            bytes: vec![1; size],
        }
    }

    fn code(err: ApiError) -> &'static str {
        err.code()
    }

    #[test]
    fn policy_rejections_carry_codes() {
        let documents = UploadKind::Document.policy();
        assert!(documents.check(&[file(PDF, 10)]).is_ok());
        assert_eq!(
            code(documents.check(&[file("application/zip", 10)]).unwrap_err()),
            "INVALID_FILE_TYPE"
        );
        assert_eq!(
            code(documents.check(&vec![file(PDF, 10); 6]).unwrap_err()),
            "FILE_COUNT_EXCEEDED"
        );
        let avatar = UploadKind::Avatar.policy();
        assert_eq!(
            code(avatar.check(&[file(PNG, 2 * MIB + 1)]).unwrap_err()),
            "FILE_SIZE_EXCEEDED"
        );
        assert!(avatar.check(&[file(PNG, 0)]).is_err());
        assert!(avatar.check(&[]).is_err());
    }

    #[test]
    fn names_and_types() {
        assert_eq!(extension_of("report.PDF"), ".pdf");
        assert_eq!(extension_of("README"), "");
        assert_eq!(content_type_for("photo.JPG"), JPEG);
        assert_eq!(content_type_for("blob.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn resolve_refuses_traversal_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("documents")).await.unwrap();
        tokio::fs::write(dir.path().join("documents/a.txt"), b"hi").await.unwrap();
        let store = UploadStore::new(dir.path());

        assert!(store.resolve("documents", "a.txt").await.is_ok());
        assert!(matches!(
            store.resolve("..", "secret").await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            store.resolve("documents", "../../etc/passwd").await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            store.resolve("documents", "missing.txt").await,
            Err(ApiError::NotFound(_))
        ));
    }
}
