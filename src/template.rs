//! Template & Artifact Loader: resolve a template from disk, validate it, and upload it when it's
//! too large to pass inline.
//!
//! Grounded on the CLI teacher's `template.rs` (async file reads via `tokio::fs`, errors carrying
//! the source path) and `s3.rs` (the upload shape), generalized onto the Provider Abstraction.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{
    error::{ErrorCode, FogError},
    provider::{ObjectStoreApi, OperationContext, TemplateSource},
};

/// The inline-vs-upload boundary from the data model: templates at or under this size are passed
/// as `TemplateBody`; larger ones must be uploaded and passed as `TemplateURL`.
pub const INLINE_MAX_BYTES: usize = 51_200;

/// The extensions tried, in order, when `LoadTemplate` is given a bare stem.
const CANDIDATE_EXTENSIONS: &[&str] = &["", ".yaml", ".yml", ".json", ".template"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SizeClass {
    Inline,
    RequiresUpload,
}

/// A loaded template: its content, where it came from locally, and whether it needs uploading.
#[derive(Clone, Debug)]
pub struct Template {
    pub content: String,
    pub local_path: PathBuf,
    pub remote_url: Option<String>,
}

impl Template {
    #[must_use]
    pub fn size_class(&self) -> SizeClass {
        if self.content.len() <= INLINE_MAX_BYTES {
            SizeClass::Inline
        } else {
            SizeClass::RequiresUpload
        }
    }

    #[must_use]
    pub fn basename(&self) -> String {
        self.local_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_string())
    }
}

/// An immutable reference to a template that's been uploaded to the object store.
#[derive(Clone, Debug)]
pub struct UploadedTemplate {
    pub url: String,
    pub bucket: String,
    pub key: String,
}

/// Resolve `path_or_name` against `template_dir`, trying `stem`, then `stem<ext>` for each
/// extension in [`CANDIDATE_EXTENSIONS`], and return the first readable match.
pub async fn load_template(template_dir: &Path, path_or_name: &str) -> Result<Template, FogError> {
    let stem = template_dir.join(path_or_name);

    let mut last_candidate = stem.clone();
    for ext in CANDIDATE_EXTENSIONS {
        let candidate = if ext.is_empty() {
            stem.clone()
        } else {
            let mut with_ext = stem.clone().into_os_string();
            with_ext.push(ext);
            PathBuf::from(with_ext)
        };
        last_candidate = candidate.clone();

        match fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => {
                let content = fs::read_to_string(&candidate).await.map_err(|error| {
                    FogError::new(ErrorCode::FileInvalid, format!("couldn't read template `{}`", candidate.display()))
                        .with_cause(error)
                })?;
                return Ok(Template {
                    content,
                    local_path: candidate,
                    remote_url: None,
                });
            }
            _ => continue,
        }
    }

    Err(FogError::new(
        ErrorCode::TemplateNotFound,
        format!("no template found for `{path_or_name}` under `{}`", template_dir.display()),
    )
    .with_field("candidate", last_candidate.display().to_string()))
}

/// Delegate validation to the stack API; wrap any failure as `TemplateInvalid`.
pub async fn validate_template(
    stack: &dyn crate::provider::StackApi,
    ctx: &OperationContext,
    source: &TemplateSource,
) -> Result<(), FogError> {
    stack.validate_template(ctx, source).await.map_err(|error| {
        FogError::new(ErrorCode::TemplateInvalid, "template failed provider-side validation")
            .with_cause(error)
    })
}

/// Upload `template` to `bucket` under a deterministic, collision-resistant key. Called exactly
/// once per deployment when the template requires upload, or when a bucket was explicitly given.
/// Never overwrites an existing object: the key embeds the current time in nanoseconds, which is
/// why this crate never caches or reuses upload results across deployments.
pub async fn upload_template(
    object_store: &dyn ObjectStoreApi,
    ctx: &OperationContext,
    template: &Template,
    bucket: &str,
    unix_nanos: u128,
) -> Result<UploadedTemplate, FogError> {
    let key = format!("fog/{}-{unix_nanos}", template.basename());
    object_store
        .put_object(ctx, bucket, &key, template.content.clone().into_bytes())
        .await
        .map_err(|error| {
            FogError::new(ErrorCode::TemplateUploadFailed, "failed to upload template")
                .with_cause(error)
        })?;

    Ok(UploadedTemplate {
        url: format!("https://{bucket}.s3.amazonaws.com/{key}"),
        bucket: bucket.to_string(),
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_template_tries_extensions_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stack.yaml"), "Resources: {}").unwrap();

        let template = load_template(dir.path(), "stack").await.unwrap();
        assert_eq!(template.content, "Resources: {}");
        assert_eq!(template.local_path, dir.path().join("stack.yaml"));
    }

    #[tokio::test]
    async fn load_template_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_template(dir.path(), "missing").await.unwrap_err();
        assert_eq!(error.code(), ErrorCode::TemplateNotFound);
    }

    #[test]
    fn size_class_boundary_is_inline_at_exactly_the_limit() {
        let at_limit = Template {
            content: "a".repeat(INLINE_MAX_BYTES),
            local_path: PathBuf::from("t.yaml"),
            remote_url: None,
        };
        assert_eq!(at_limit.size_class(), SizeClass::Inline);

        let over_limit = Template {
            content: "a".repeat(INLINE_MAX_BYTES + 1),
            local_path: PathBuf::from("t.yaml"),
            remote_url: None,
        };
        assert_eq!(over_limit.size_class(), SizeClass::RequiresUpload);
    }
}
