//! Manifest document model.
//!
//! A manifest is a TOML document with a `[course]` header table and an
//! ordered `[[artifact]]` array. Manifests are instantiated fresh from
//! their backing file on every read and are never cached or mutated in
//! place; deleting the file destroys the manifest.

use crate::checksum::Checksum;
use crate::error::ValidationError;
use crate::name::ManifestFileName;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Timestamp grammar for the `publish-date` header field.
pub const PUBLISH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

/// The `[course]` header table of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Course {
    /// Course name; first field of the generated file name.
    pub name: String,
    /// Technology code.
    pub technology: String,
    /// Release string.
    pub release: String,
    /// Ordered modalities.
    pub modality: Vec<String>,
    /// Generation number.
    pub generation: u32,
    /// Ordered locales.
    pub locale: Vec<String>,
    /// Human-readable description.
    pub description: String,
    /// Publishing organisation.
    pub publisher: String,
    /// Publication timestamp, matching [`PUBLISH_DATE_FORMAT`].
    pub publish_date: String,
}

/// Broad artifact classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    /// Deployable course content; carries content-type and target-directory.
    Content,
    /// Source material kept in the repository only.
    Source,
    /// Linux-side executable tooling.
    LinuxExe,
    /// Windows-side executable tooling.
    WindowsExe,
}

/// Content handling strategy for content artifacts. Closed set: an
/// unrecognized value fails parsing instead of silently falling through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Disk image, loop-mounted at its final name.
    Iso,
    /// Tar archive, copied as-is.
    Tar,
    /// Package installed through the package manager.
    Rpm,
    /// Plain file, optionally aliased to a final name.
    File,
    /// Document, optionally aliased to a final name.
    Pdf,
    /// Boot asset.
    Boot,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Iso => "iso",
            Self::Tar => "tar",
            Self::Rpm => "rpm",
            Self::File => "file",
            Self::Pdf => "pdf",
            Self::Boot => "boot",
        };
        write!(f, "{s}")
    }
}

/// One deployable unit referenced by a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Artifact {
    /// File name, unique within the owning manifest.
    pub filename: String,
    /// Declared digest of the artifact file.
    pub checksum: Checksum,
    /// Broad classification.
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    /// Role tags consulted by the usage gate.
    pub usage: Vec<String>,
    /// Content handling strategy; required when `type = "content"`.
    pub content_type: Option<ContentType>,
    /// Root-relative directory the file is copied into; required for content.
    pub target_directory: Option<String>,
    /// Root-relative alias/mount-point path; required for iso content.
    pub final_name: Option<String>,
    /// Additional root-relative hard link names for the deployed file.
    #[serde(default)]
    pub hardlink_names: Vec<String>,
}

/// Borrowed view of the fields every validated content artifact carries.
#[derive(Debug, Clone, Copy)]
pub struct ContentFields<'a> {
    /// Content handling strategy.
    pub content_type: ContentType,
    /// Root-relative target directory.
    pub target_directory: &'a str,
    /// Optional root-relative alias path.
    pub final_name: Option<&'a str>,
}

impl Artifact {
    /// Content view of this artifact, or `None` for non-content types.
    ///
    /// Returns `None` as well for a content artifact missing its
    /// required fields; validation rejects such manifests up front, so
    /// downstream code can treat `None` simply as "not deployable".
    pub fn content(&self) -> Option<ContentFields<'_>> {
        if self.artifact_type != ArtifactType::Content {
            return None;
        }
        Some(ContentFields {
            content_type: self.content_type?,
            target_directory: self.target_directory.as_deref()?,
            final_name: self.final_name.as_deref(),
        })
    }

    /// True if any declared usage tag equals `tag`.
    pub fn has_usage(&self, tag: &str) -> bool {
        self.usage.iter().any(|u| u == tag)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let field_err = |field: &'static str| ValidationError::ArtifactField {
            filename: self.filename.clone(),
            field,
        };
        if self.filename.trim().is_empty() {
            return Err(ValidationError::ArtifactField {
                filename: String::from("<unnamed>"),
                field: "filename",
            });
        }
        if !self.checksum.is_well_formed() {
            return Err(ValidationError::Artifact {
                filename: self.filename.clone(),
                reason: format!(
                    "checksum '{}' is neither NOCHECK nor a 64-char hex digest",
                    self.checksum
                ),
            });
        }
        if self.usage.is_empty() || self.usage.iter().any(|u| u.trim().is_empty()) {
            return Err(field_err("usage"));
        }
        if self.artifact_type == ArtifactType::Content {
            let content_type = self.content_type.ok_or_else(|| field_err("content-type"))?;
            match self.target_directory.as_deref() {
                Some(d) if !d.trim().is_empty() => {}
                _ => return Err(field_err("target-directory")),
            }
            if content_type == ContentType::Iso {
                match self.final_name.as_deref() {
                    Some(n) if !n.trim().is_empty() => {}
                    _ => return Err(field_err("final-name")),
                }
            }
        }
        Ok(())
    }
}

/// A fully validated course manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Header table.
    pub course: Course,
    /// Ordered artifact sequence.
    #[serde(rename = "artifact")]
    pub artifacts: Vec<Artifact>,
}

impl Manifest {
    /// Load and fully validate a manifest from its backing file.
    ///
    /// The file name must follow the manifest grammar and its encoded
    /// fields must equal the header fields exactly. On any failure no
    /// manifest object is returned.
    pub fn load(path: &Path) -> Result<Self, ValidationError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ValidationError::Extension(path.display().to_string()))?;
        let parsed_name = ManifestFileName::parse(file_name)?;

        let content = std::fs::read_to_string(path).map_err(|source| ValidationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest =
            toml::from_str(&content).map_err(|e| ValidationError::Parse(e.to_string()))?;

        manifest.validate(&parsed_name)?;
        Ok(manifest)
    }

    /// Validate header fields, artifacts, and the filename/header bijection.
    pub fn validate(&self, file_name: &ManifestFileName) -> Result<(), ValidationError> {
        self.validate_header()?;
        self.validate_file_name(file_name)?;

        let mut seen = HashSet::new();
        for artifact in &self.artifacts {
            artifact.validate()?;
            if !seen.insert(artifact.filename.as_str()) {
                return Err(ValidationError::Artifact {
                    filename: artifact.filename.clone(),
                    reason: String::from("duplicate artifact filename within manifest"),
                });
            }
        }
        Ok(())
    }

    fn validate_header(&self) -> Result<(), ValidationError> {
        let c = &self.course;
        let blank = |field: &'static str| ValidationError::BlankField(field);
        if c.name.trim().is_empty() {
            return Err(blank("name"));
        }
        if c.technology.trim().is_empty() {
            return Err(blank("technology"));
        }
        if c.release.trim().is_empty() {
            return Err(blank("release"));
        }
        if c.modality.is_empty() || c.modality.iter().any(|m| m.trim().is_empty()) {
            return Err(blank("modality"));
        }
        if c.locale.is_empty() || c.locale.iter().any(|l| l.trim().is_empty()) {
            return Err(blank("locale"));
        }
        if c.description.trim().is_empty() {
            return Err(blank("description"));
        }
        if c.publisher.trim().is_empty() {
            return Err(blank("publisher"));
        }
        if c.publish_date.trim().is_empty() {
            return Err(blank("publish-date"));
        }
        chrono::DateTime::parse_from_str(&c.publish_date, PUBLISH_DATE_FORMAT)
            .map_err(|_| ValidationError::PublishDate(c.publish_date.clone()))?;
        Ok(())
    }

    fn validate_file_name(&self, n: &ManifestFileName) -> Result<(), ValidationError> {
        let c = &self.course;
        let mismatch = |field: &'static str, encoded: String, header: String| {
            ValidationError::FieldMismatch {
                field,
                encoded,
                header,
            }
        };
        if n.name != c.name {
            return Err(mismatch("name", n.name.clone(), c.name.clone()));
        }
        if n.technology != c.technology {
            return Err(mismatch(
                "technology",
                n.technology.clone(),
                c.technology.clone(),
            ));
        }
        if n.release != c.release {
            return Err(mismatch("release", n.release.clone(), c.release.clone()));
        }
        if n.modalities != c.modality {
            return Err(mismatch(
                "modality",
                n.modalities.join("+"),
                c.modality.join("+"),
            ));
        }
        if n.generation != c.generation {
            return Err(mismatch(
                "generation",
                n.generation.to_string(),
                c.generation.to_string(),
            ));
        }
        if n.locales != c.locale {
            return Err(mismatch("locale", n.locales.join("+"), c.locale.join("+")));
        }
        Ok(())
    }

    /// The file name this manifest generates, in the given state.
    pub fn file_name(&self, state: crate::name::DeployState) -> ManifestFileName {
        ManifestFileName {
            name: self.course.name.clone(),
            technology: self.course.technology.clone(),
            release: self.course.release.clone(),
            modalities: self.course.modality.clone(),
            generation: self.course.generation,
            locales: self.course.locale.clone(),
            state,
        }
    }

    /// Content artifacts, in declaration order.
    pub fn content_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts
            .iter()
            .filter(|a| a.artifact_type == ArtifactType::Content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::DeployState;
    use std::io::Write;

    pub(crate) const SAMPLE: &str = r#"
[course]
name = "COURSE"
technology = "TECH"
release = "1"
modality = ["ILT"]
generation = 7
locale = ["en_US"]
description = "Sample course"
publisher = "Example Training"
publish-date = "2025-03-01 12:00:00+00:00"

[[artifact]]
filename = "disk.iso"
checksum = "NOCHECK"
type = "content"
usage = ["classroom"]
content-type = "iso"
target-directory = "content/course"
final-name = "content/mount/course"
"#;

    fn sample() -> Manifest {
        toml::from_str(SAMPLE).unwrap()
    }

    fn sample_name(state: DeployState) -> ManifestFileName {
        let mut n = ManifestFileName::parse("COURSE-TECH-1-ILT-7-en_US.cmf").unwrap();
        n.state = state;
        n
    }

    #[test]
    fn sample_manifest_validates() {
        sample().validate(&sample_name(DeployState::Active)).unwrap();
    }

    #[test]
    fn quiesced_name_matches_same_header() {
        sample()
            .validate(&sample_name(DeployState::Quiesced))
            .unwrap();
    }

    #[test]
    fn blank_publisher_is_rejected() {
        let mut m = sample();
        m.course.publisher = String::from("  ");
        assert!(matches!(
            m.validate(&sample_name(DeployState::Active)),
            Err(ValidationError::BlankField("publisher"))
        ));
    }

    #[test]
    fn bad_publish_date_is_rejected() {
        let mut m = sample();
        m.course.publish_date = String::from("March 1st 2025");
        assert!(matches!(
            m.validate(&sample_name(DeployState::Active)),
            Err(ValidationError::PublishDate(_))
        ));
    }

    #[test]
    fn publish_date_without_zone_is_rejected() {
        let mut m = sample();
        m.course.publish_date = String::from("2025-03-01 12:00:00");
        assert!(m.validate(&sample_name(DeployState::Active)).is_err());
    }

    #[test]
    fn filename_header_mismatch_is_rejected() {
        let m = sample();
        let n = ManifestFileName::parse("OTHER-TECH-1-ILT-7-en_US.cmf").unwrap();
        assert!(matches!(
            m.validate(&n),
            Err(ValidationError::FieldMismatch { field: "name", .. })
        ));
        let n = ManifestFileName::parse("COURSE-TECH-1-ILT-8-en_US.cmf").unwrap();
        assert!(matches!(
            m.validate(&n),
            Err(ValidationError::FieldMismatch {
                field: "generation",
                ..
            })
        ));
    }

    #[test]
    fn content_without_target_directory_is_rejected() {
        let mut m = sample();
        m.artifacts[0].target_directory = None;
        assert!(matches!(
            m.validate(&sample_name(DeployState::Active)),
            Err(ValidationError::ArtifactField {
                field: "target-directory",
                ..
            })
        ));
    }

    #[test]
    fn iso_without_final_name_is_rejected() {
        let mut m = sample();
        m.artifacts[0].final_name = None;
        assert!(matches!(
            m.validate(&sample_name(DeployState::Active)),
            Err(ValidationError::ArtifactField {
                field: "final-name",
                ..
            })
        ));
    }

    #[test]
    fn empty_usage_is_rejected() {
        let mut m = sample();
        m.artifacts[0].usage.clear();
        assert!(matches!(
            m.validate(&sample_name(DeployState::Active)),
            Err(ValidationError::ArtifactField { field: "usage", .. })
        ));
    }

    #[test]
    fn duplicate_artifact_filename_is_rejected() {
        let mut m = sample();
        let dup = m.artifacts[0].clone();
        m.artifacts.push(dup);
        assert!(matches!(
            m.validate(&sample_name(DeployState::Active)),
            Err(ValidationError::Artifact { .. })
        ));
    }

    #[test]
    fn malformed_checksum_is_rejected() {
        let mut m = sample();
        m.artifacts[0].checksum = Checksum::from("deadbeef");
        assert!(m.validate(&sample_name(DeployState::Active)).is_err());
    }

    #[test]
    fn unknown_content_type_fails_parsing() {
        let doc = SAMPLE.replace("content-type = \"iso\"", "content-type = \"squashfs\"");
        assert!(toml::from_str::<Manifest>(&doc).is_err());
    }

    #[test]
    fn load_rejects_mismatched_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WRONG-TECH-1-ILT-7-en_US.cmf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();
        assert!(matches!(
            Manifest::load(&path),
            Err(ValidationError::FieldMismatch { .. })
        ));
    }

    #[test]
    fn load_round_trips_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("COURSE-TECH-1-ILT-7-en_US.cmf");
        std::fs::write(&path, SAMPLE).unwrap();
        let m = Manifest::load(&path).unwrap();
        assert_eq!(m.artifacts.len(), 1);
        let content = m.artifacts[0].content().unwrap();
        assert_eq!(content.content_type, ContentType::Iso);
        assert_eq!(content.final_name, Some("content/mount/course"));
    }
}
