//! Alias and extension manifests.
//!
//! These are the documents a package carries in its signature's trusted
//! comment and in its archive (`alias.json` / `extension.json`). Once
//! installed they are the only local record of a package, and are what the
//! update diff compares against.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PackageKind;

/// Errors raised while parsing or validating a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The document is not valid JSON for the expected manifest shape.
    #[error("invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is empty.
    #[error("missing {0} in manifest")]
    MissingField(&'static str),
}

/// An OS/arch specific file shipped inside a package archive.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PackageFile {
    /// Target OS (lowercased on parse)
    pub os: String,
    /// Target architecture (lowercased on parse)
    pub arch: String,
    /// Path inside the archive, relative to the install directory
    pub path: String,
}

/// Manifest of an alias package.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AliasManifest {
    pub name: String,
    pub version: String,
    pub command_name: String,
    #[serde(default)]
    pub original_author: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub long_help: String,
    #[serde(default)]
    pub entrypoint: String,
    #[serde(default)]
    pub allow_args: bool,
    #[serde(default)]
    pub default_args: String,
    #[serde(default)]
    pub files: Vec<PackageFile>,
    #[serde(default)]
    pub is_reflective: bool,
    #[serde(default)]
    pub is_assembly: bool,
}

/// Declared argument of an extension command.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExtensionArgument {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub optional: bool,
}

/// One command registered by an extension.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExtCommand {
    pub command_name: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub long_help: String,
    #[serde(default)]
    pub files: Vec<PackageFile>,
    #[serde(default)]
    pub arguments: Vec<ExtensionArgument>,
    #[serde(default)]
    pub entrypoint: String,
    /// Command name of another extension that must be installed first
    #[serde(default)]
    pub depends_on: String,
    #[serde(default)]
    pub init: String,
}

/// Manifest of an extension package.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExtensionManifest {
    pub name: String,
    pub version: String,
    pub extension_author: String,
    pub original_author: String,
    pub repo_url: String,
    pub commands: Vec<ExtCommand>,
}

/// Wire shape accepting both the multi-command form and the older
/// single-command form (top-level `command_name`, no `commands`).
#[derive(Deserialize)]
struct RawExtensionManifest {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    extension_author: String,
    #[serde(default)]
    original_author: String,
    #[serde(default)]
    repo_url: String,
    #[serde(default)]
    commands: Vec<ExtCommand>,

    #[serde(default)]
    command_name: String,
    #[serde(default)]
    help: String,
    #[serde(default)]
    long_help: String,
    #[serde(default)]
    files: Vec<PackageFile>,
    #[serde(default)]
    arguments: Vec<ExtensionArgument>,
    #[serde(default)]
    entrypoint: String,
    #[serde(default)]
    depends_on: String,
    #[serde(default)]
    init: String,
}

impl<'de> Deserialize<'de> for ExtensionManifest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawExtensionManifest::deserialize(deserializer)?;
        let mut commands = raw.commands;
        if commands.is_empty() && !raw.command_name.is_empty() {
            commands.push(ExtCommand {
                command_name: raw.command_name,
                help: raw.help,
                long_help: raw.long_help,
                files: raw.files,
                arguments: raw.arguments,
                entrypoint: raw.entrypoint,
                depends_on: raw.depends_on,
                init: raw.init,
            });
        }
        Ok(Self {
            name: raw.name,
            version: raw.version,
            extension_author: raw.extension_author,
            original_author: raw.original_author,
            repo_url: raw.repo_url,
            commands,
        })
    }
}

impl AliasManifest {
    /// Parse and validate an alias manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] on malformed JSON or a missing name, command
    /// name, help text, or file os/arch/path.
    pub fn parse(data: &[u8]) -> Result<Self, ManifestError> {
        let mut alias: Self = serde_json::from_slice(data)?;
        if alias.name.is_empty() {
            return Err(ManifestError::MissingField("alias name"));
        }
        if alias.command_name.is_empty() {
            return Err(ManifestError::MissingField("command_name"));
        }
        if alias.help.is_empty() {
            return Err(ManifestError::MissingField("help"));
        }
        normalize_files(&mut alias.files)?;
        Ok(alias)
    }
}

impl ExtensionManifest {
    /// Parse and validate an extension manifest (either form).
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] on malformed JSON, a missing name, a command
    /// without a name or help text, or a file without os/arch/path.
    pub fn parse(data: &[u8]) -> Result<Self, ManifestError> {
        let mut ext: Self = serde_json::from_slice(data)?;
        if ext.name.is_empty() {
            return Err(ManifestError::MissingField("extension name"));
        }
        if ext.commands.is_empty() {
            return Err(ManifestError::MissingField("commands"));
        }
        for cmd in &mut ext.commands {
            if cmd.command_name.is_empty() {
                return Err(ManifestError::MissingField("command_name"));
            }
            if cmd.help.is_empty() {
                return Err(ManifestError::MissingField("help"));
            }
            normalize_files(&mut cmd.files)?;
        }
        Ok(ext)
    }

    /// Whether any command of this extension is named `name`.
    pub fn provides(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c.command_name == name)
    }

    /// All files declared by all commands, deduplicated by path.
    pub fn files(&self) -> Vec<&PackageFile> {
        let mut out: Vec<&PackageFile> = Vec::new();
        for file in self.commands.iter().flat_map(|c| c.files.iter()) {
            if !out.iter().any(|f| f.path == file.path) {
                out.push(file);
            }
        }
        out
    }
}

fn normalize_files(files: &mut [PackageFile]) -> Result<(), ManifestError> {
    for file in files {
        if file.os.is_empty() {
            return Err(ManifestError::MissingField("files.os"));
        }
        file.os = file.os.to_lowercase();
        if file.arch.is_empty() {
            return Err(ManifestError::MissingField("files.arch"));
        }
        file.arch = file.arch.to_lowercase();
        file.path = clean_relative_path(&file.path).ok_or(ManifestError::MissingField("files.path"))?;
    }
    Ok(())
}

/// Collapse a manifest path into a relative path that cannot leave its root.
///
/// `.`/`..` segments and leading separators are resolved as if the path were
/// rooted, so `../../etc/passwd` becomes `etc/passwd`. Returns `None` when
/// nothing is left.
pub fn clean_relative_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// A parsed manifest of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageManifest {
    /// Alias manifest
    Alias(AliasManifest),
    /// Extension manifest
    Extension(ExtensionManifest),
}

impl PackageManifest {
    /// Parse a manifest of the given kind.
    ///
    /// # Errors
    ///
    /// See [`AliasManifest::parse`] and [`ExtensionManifest::parse`].
    pub fn parse(kind: PackageKind, data: &[u8]) -> Result<Self, ManifestError> {
        match kind {
            PackageKind::Alias => AliasManifest::parse(data).map(Self::Alias),
            PackageKind::Extension => ExtensionManifest::parse(data).map(Self::Extension),
        }
    }

    /// Package name.
    pub fn name(&self) -> &str {
        match self {
            Self::Alias(a) => &a.name,
            Self::Extension(e) => &e.name,
        }
    }

    /// Version string.
    pub fn version(&self) -> &str {
        match self {
            Self::Alias(a) => &a.version,
            Self::Extension(e) => &e.version,
        }
    }

    /// Alias or extension.
    pub fn kind(&self) -> PackageKind {
        match self {
            Self::Alias(_) => PackageKind::Alias,
            Self::Extension(_) => PackageKind::Extension,
        }
    }

    /// One-line help of the primary command.
    pub fn help(&self) -> &str {
        match self {
            Self::Alias(a) => &a.help,
            Self::Extension(e) => e.commands.first().map_or("", |c| c.help.as_str()),
        }
    }

    /// Names of every console command the package registers.
    pub fn command_names(&self) -> Vec<&str> {
        match self {
            Self::Alias(a) => vec![a.command_name.as_str()],
            Self::Extension(e) => e.commands.iter().map(|c| c.command_name.as_str()).collect(),
        }
    }

    /// Whether the package registers a command named `name`.
    pub fn provides(&self, name: &str) -> bool {
        match self {
            Self::Alias(a) => a.command_name == name,
            Self::Extension(e) => e.provides(name),
        }
    }

    /// The alias manifest, if this is one.
    pub fn as_alias(&self) -> Option<&AliasManifest> {
        match self {
            Self::Alias(a) => Some(a),
            Self::Extension(_) => None,
        }
    }

    /// The extension manifest, if this is one.
    pub fn as_extension(&self) -> Option<&ExtensionManifest> {
        match self {
            Self::Extension(e) => Some(e),
            Self::Alias(_) => None,
        }
    }
}
