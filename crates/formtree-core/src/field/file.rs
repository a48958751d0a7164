use crate::{
    context::FormContext,
    error::{EngineError, FieldError},
    record::Record,
    value::{FileUpload, Value},
};

///
/// FileSettings
///
/// File and image field configuration. `path_prefix` is stamped onto stored
/// paths (and stripped for form display); the allow-list is checked before
/// anything reaches blob storage.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileSettings {
    pub multiple: bool,
    pub allowed_extensions: Vec<String>,
    pub path_prefix: String,
    /// Disk and dir fall back to `EngineConfig` when unset.
    pub disk: Option<String>,
    pub dir: Option<String>,
    pub keep_original_name: bool,
}

impl FileSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    #[must_use]
    pub fn allowed_extensions(mut self, extensions: &[&str]) -> Self {
        self.allowed_extensions = extensions.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn disk(mut self, disk: impl Into<String>) -> Self {
        self.disk = Some(disk.into());
        self
    }

    #[must_use]
    pub fn dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn keep_original_name(mut self) -> Self {
        self.keep_original_name = true;
        self
    }

    /// An empty allow-list allows everything.
    #[must_use]
    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.is_empty()
            || self.allowed_extensions.iter().any(|ext| ext == extension)
    }

    /// `accept` attribute form of the allow-list: `.jpg,.png`.
    #[must_use]
    pub fn accept(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Stamp the path prefix. Symmetric with [`FileSettings::unprefixed`]
    /// for every path and prefix, so stamping happens exactly once per
    /// value on its way to the record. Empty values stay empty.
    #[must_use]
    pub fn prefixed(&self, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }

        format!("{}{value}", self.path_prefix)
    }

    /// Strip the path prefix, the inverse of [`FileSettings::prefixed`].
    #[must_use]
    pub fn unprefixed(&self, value: &str) -> String {
        value.strip_prefix(&self.path_prefix).unwrap_or(value).to_string()
    }
}

/// Validate and persist one upload, returning the prefixed stored path.
/// An upload whose extension is outside a non-empty allow-list aborts with
/// a validation error naming the extension.
pub fn store_upload(
    ctx: &FormContext,
    column: &str,
    settings: &FileSettings,
    upload: &FileUpload,
) -> Result<String, EngineError> {
    let extension = upload.extension().unwrap_or_default();

    if !settings.is_allowed(&extension) {
        return Err(FieldError::ExtensionNotAllowed {
            column: column.to_string(),
            extension,
        }
        .into());
    }

    let storage = ctx.require_storage()?;
    let disk = settings
        .disk
        .as_deref()
        .unwrap_or(&ctx.config().upload_disk);
    let dir = settings.dir.as_deref().unwrap_or(&ctx.config().upload_dir);

    let stored = storage.store(upload, dir, disk, settings.keep_original_name)?;

    Ok(settings.prefixed(&stored))
}

/// Paths the client asked to retain, submitted under `hidden_<column>`.
fn retained_paths(ctx: &FormContext, column: &str, settings: &FileSettings) -> Vec<String> {
    let hidden = format!("hidden_{column}");

    match ctx.value(&hidden) {
        None => Vec::new(),
        Some(Value::List(items)) => items
            .iter()
            .map(|item| settings.prefixed(&item.to_key_string()))
            .filter(|path| !path.is_empty())
            .collect(),
        Some(single) => {
            let path = settings.prefixed(&single.to_key_string());
            if path.is_empty() { Vec::new() } else { vec![path] }
        }
    }
}

fn submitted_uploads<'v>(value: &'v Value, column: &str) -> Result<Vec<&'v FileUpload>, EngineError> {
    match value {
        Value::Upload(upload) => Ok(vec![upload]),
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_upload().ok_or_else(|| {
                    FieldError::UploadExpected {
                        column: column.to_string(),
                    }
                    .into()
                })
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(FieldError::UploadExpected {
            column: column.to_string(),
        }
        .into()),
    }
}

/// Default write behavior for file fields: store fresh uploads, merge with
/// retained paths, de-duplicate preserving first-seen order, and write the
/// result onto the record. Single-value fields replace the retained path
/// when a new upload arrives.
pub fn save(
    ctx: &FormContext,
    column: &str,
    settings: &FileSettings,
    record: &mut Record,
) -> Result<(), EngineError> {
    let retained = retained_paths(ctx, column, settings);

    if settings.multiple {
        let mut paths = retained;

        if let Some(value) = ctx.value(column) {
            for upload in submitted_uploads(value, column)? {
                paths.push(store_upload(ctx, column, settings, upload)?);
            }
        }

        // Every entry is already prefixed exactly once (retained paths by
        // retained_paths, fresh ones by store_upload).
        let mut seen: Vec<String> = Vec::new();
        for path in paths {
            if !seen.contains(&path) {
                seen.push(path);
            }
        }

        record.set(column, Value::List(seen.into_iter().map(Value::Text).collect()));
        return Ok(());
    }

    let mut save_value = retained
        .into_iter()
        .next()
        .map_or(Value::Null, Value::Text);

    if let Some(value) = ctx.value(column) {
        match value {
            Value::Upload(upload) => {
                save_value = Value::Text(store_upload(ctx, column, settings, upload)?);
            }
            Value::Null => {}
            _ => {
                return Err(FieldError::ValueShape {
                    column: column.to_string(),
                    expected: "a single uploaded file",
                }
                .into());
            }
        }
    }

    record.set(column, save_value);
    Ok(())
}

/// Editable value: the stored path(s) with the prefix stripped.
#[must_use]
pub fn form_view_value(record: &Record, column: &str, settings: &FileSettings) -> Value {
    let stored = record.get(column);

    if settings.multiple {
        let items = stored
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .map(|item| Value::Text(settings.unprefixed(&item.to_key_string())))
            .collect();
        return Value::List(items);
    }

    match stored {
        Some(value) if !value.is_empty() => {
            Value::Text(settings.unprefixed(&value.to_key_string()))
        }
        _ => Value::Text(String::new()),
    }
}

/// Export projection: raw stored paths, multi-value joined with `;`.
#[must_use]
pub fn export_view_value(record: &Record, column: &str, settings: &FileSettings) -> String {
    let stored = record.get(column);

    if settings.multiple {
        return stored
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .map(Value::to_key_string)
            .collect::<Vec<_>>()
            .join(";");
    }

    stored.map(Value::to_key_string).unwrap_or_default()
}
