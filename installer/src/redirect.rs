//! Redirection of pip's editable-install artifacts to the original source.
//!
//! After an editable install of the staged copy, pip and setuptools leave
//! several files in site-packages that record the staging path. This module
//! finds them, rewrites the staging path to the original package path, and
//! fails if nothing was rewritten: a silent success would leave the install
//! pointing at a directory that is about to be deleted.
//!
//! The known artifact formats are a closed table of [`ArtifactRule`]s, each
//! pairing a glob pattern relative to site-packages with a
//! [`SubstitutionScope`] and an [`AfterRewrite`] action. Supporting a new pip layout means adding a row to
//! [`ARTIFACT_RULES`]; the scanning loop does not change.

use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace, warn};
use std::fmt;
use std::fs;

/// Which occurrences of the staging path may be rewritten in an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionScope {
    /// Every occurrence. Used for plain path lists and JSON metadata.
    Anywhere,
    /// Only occurrences immediately preceded by `'`, i.e. the start of a
    /// single-quoted string literal in generated Python code.
    QuotedLiteral,
}

/// Follow-up work once an artifact has been rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterRewrite {
    /// The rewritten file is all there is.
    Nothing,
    /// Delete `__pycache__/<stem>.*.pyc` next to the artifact.
    ///
    /// Python trusts a cached module while the source's size and mtime
    /// second are unchanged, which a same-length path rewrite can leave
    /// intact. The stale bytecode would keep importing from the staging path.
    PurgeBytecode,
}

/// Kinds of artifact pip can leave behind for an editable install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Legacy `<name>.egg-link` registration file.
    EggLink,
    /// The shared `easy-install.pth` path list.
    EasyInstallPth,
    /// Modern `__editable__.<name>-<version>.pth` path file.
    EditablePth,
    /// `direct_url.json` recording the install's origin URL.
    DirectUrl,
    /// Modern `__editable___<name>_<version>_finder.py` import hook.
    EditableFinder,
}

impl ArtifactKind {
    const fn label(self) -> &'static str {
        match self {
            Self::EggLink => "egg-link",
            Self::EasyInstallPth => "easy-install.pth",
            Self::EditablePth => "editable .pth",
            Self::DirectUrl => "direct_url.json",
            Self::EditableFinder => "editable finder",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One artifact format: where to find it and how to rewrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactRule {
    /// The artifact kind this rule matches.
    pub kind: ArtifactKind,
    /// Glob pattern relative to the site-packages directory.
    pub pattern: &'static str,
    /// Which occurrences of the staging path to rewrite.
    pub scope: SubstitutionScope,
    /// What to do once the artifact has been rewritten.
    pub after_rewrite: AfterRewrite,
}

/// Every artifact format pip is known to produce for editable installs.
pub const ARTIFACT_RULES: &[ArtifactRule] = &[
    ArtifactRule {
        kind: ArtifactKind::EggLink,
        pattern: "*.egg-link",
        scope: SubstitutionScope::Anywhere,
        after_rewrite: AfterRewrite::Nothing,
    },
    ArtifactRule {
        kind: ArtifactKind::EasyInstallPth,
        pattern: "easy-install.pth",
        scope: SubstitutionScope::Anywhere,
        after_rewrite: AfterRewrite::Nothing,
    },
    ArtifactRule {
        kind: ArtifactKind::EditablePth,
        pattern: "__editable__.*.pth",
        scope: SubstitutionScope::Anywhere,
        after_rewrite: AfterRewrite::Nothing,
    },
    ArtifactRule {
        kind: ArtifactKind::DirectUrl,
        pattern: "*.dist-info/direct_url.json",
        scope: SubstitutionScope::Anywhere,
        after_rewrite: AfterRewrite::Nothing,
    },
    ArtifactRule {
        kind: ArtifactKind::EditableFinder,
        pattern: "__editable___*_finder.py",
        scope: SubstitutionScope::QuotedLiteral,
        after_rewrite: AfterRewrite::PurgeBytecode,
    },
];

/// A file found under site-packages that matches an artifact rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCandidate {
    /// Path of the candidate file.
    pub path: Utf8PathBuf,
    /// The rule it matched.
    pub rule: ArtifactRule,
}

/// An artifact that was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedArtifact {
    /// Kind of the rewritten artifact.
    pub kind: ArtifactKind,
    /// Path of the rewritten artifact.
    pub path: Utf8PathBuf,
}

/// Outcome of a redirection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Artifacts whose content was rewritten.
    pub patched: Vec<PatchedArtifact>,
    /// Artifacts that still mention the staging path after rewriting.
    pub residual: Vec<Utf8PathBuf>,
    /// Stale bytecode deleted after rewriting its source.
    pub purged: Vec<Utf8PathBuf>,
}

impl PatchReport {
    /// Number of rewritten artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patched.len()
    }

    /// Returns true if nothing was rewritten.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patched.is_empty()
    }

    /// Paths of every rewritten artifact.
    pub fn paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.patched.iter().map(|artifact| artifact.path.as_path())
    }
}

/// Rewrites staging-path references under a site-packages directory.
#[derive(Debug, Clone)]
pub struct Redirector<'a> {
    rules: &'a [ArtifactRule],
    staging_aliases: Vec<&'a Utf8Path>,
    original_path: &'a Utf8Path,
}

impl<'a> Redirector<'a> {
    /// Create a redirector for the default [`ARTIFACT_RULES`].
    ///
    /// `staging_aliases` lists every spelling of the staging path; the first
    /// entry is the one reported in errors.
    #[must_use]
    pub fn new(staging_aliases: &[&'a Utf8Path], original_path: &'a Utf8Path) -> Self {
        Self {
            rules: ARTIFACT_RULES,
            staging_aliases: staging_aliases.to_vec(),
            original_path,
        }
    }

    /// Replace the artifact rules.
    #[must_use]
    pub fn with_rules(mut self, rules: &'a [ArtifactRule]) -> Self {
        self.rules = rules;
        self
    }

    /// List every existing file under `site_dir` that matches a rule.
    ///
    /// A pattern matching nothing contributes no candidates. Entries that
    /// cannot be read or whose paths are not UTF-8 are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::PatternFailed`] if a rule's pattern is not a
    /// valid glob.
    pub fn candidates(&self, site_dir: &Utf8Path) -> Result<Vec<ArtifactCandidate>> {
        let escaped_root = glob::Pattern::escape(site_dir.as_str());
        let mut candidates = Vec::new();

        for rule in self.rules {
            let pattern = format!("{escaped_root}/{}", rule.pattern);
            let entries = glob::glob(&pattern).map_err(|e| InstallerError::PatternFailed {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;

            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("skipping unreadable candidate: {e}");
                        continue;
                    }
                };
                match Utf8PathBuf::try_from(path) {
                    Ok(path) if path.is_file() => candidates.push(ArtifactCandidate {
                        path,
                        rule: *rule,
                    }),
                    Ok(path) => trace!("skipping non-file candidate {path}"),
                    Err(e) => warn!("skipping non UTF-8 candidate {}", e.as_path().display()),
                }
            }
        }

        debug!("{} artifact candidates under {site_dir}", candidates.len());
        Ok(candidates)
    }

    /// Rewrite every candidate under `site_dir` that references the staging
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::PatchFailed`] if a candidate cannot be read
    /// or written or its stale bytecode cannot be deleted, and [`InstallerError::NothingPatched`] if no candidate was
    /// rewritten.
    pub fn redirect(&self, site_dir: &Utf8Path) -> Result<PatchReport> {
        let mut report = PatchReport::default();

        for candidate in self.candidates(site_dir)? {
            let content = fs::read_to_string(&candidate.path).map_err(|source| {
                InstallerError::PatchFailed {
                    path: candidate.path.clone(),
                    source,
                }
            })?;

            if !self.references_staging(&content) {
                trace!("no staging reference in {}", candidate.path);
                continue;
            }
            let Some(rewritten) = self.rewrite(&content, candidate.rule.scope) else {
                warn!(
                    "{} references the staging directory outside any rewritable position",
                    candidate.path
                );
                report.residual.push(candidate.path);
                continue;
            };

            fs::write(&candidate.path, &rewritten).map_err(|source| {
                InstallerError::PatchFailed {
                    path: candidate.path.clone(),
                    source,
                }
            })?;
            debug!("patched {} ({})", candidate.path, candidate.rule.kind);
            if candidate.rule.after_rewrite == AfterRewrite::PurgeBytecode {
                report.purged.extend(purge_bytecode(&candidate.path)?);
            }

            if self.references_staging(&rewritten) {
                warn!("{} still references the staging directory", candidate.path);
                report.residual.push(candidate.path.clone());
            }
            report.patched.push(PatchedArtifact {
                kind: candidate.rule.kind,
                path: candidate.path,
            });
        }

        if report.is_empty() {
            return Err(InstallerError::NothingPatched {
                site_dir: site_dir.to_owned(),
                staging_path: self.primary_alias().to_owned(),
            });
        }
        Ok(report)
    }

    /// Apply the substitution to `content`.
    ///
    /// Returns `None` when the content does not contain a staging alias or
    /// the scope leaves it unchanged. Longer aliases are replaced first so a
    /// canonical path such as `/private/tmp/x` is not half-rewritten through
    /// its suffix `/tmp/x`.
    #[must_use]
    pub fn rewrite(&self, content: &str, scope: SubstitutionScope) -> Option<String> {
        if !self.references_staging(content) {
            return None;
        }

        let mut aliases = self.staging_aliases.clone();
        aliases.sort_by_key(|alias| std::cmp::Reverse(alias.as_str().len()));

        let rewritten = aliases.iter().fold(content.to_owned(), |text, alias| {
            substitute(&text, alias.as_str(), self.original_path.as_str(), scope)
        });
        (rewritten != content).then_some(rewritten)
    }

    fn references_staging(&self, content: &str) -> bool {
        self.staging_aliases
            .iter()
            .any(|alias| content.contains(alias.as_str()))
    }

    fn primary_alias(&self) -> &Utf8Path {
        self.staging_aliases
            .first()
            .copied()
            .unwrap_or_else(|| Utf8Path::new(""))
    }
}

/// Delete the cached bytecode of the Python module at `source`.
fn purge_bytecode(source: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let (Some(dir), Some(stem)) = (source.parent(), source.file_stem()) else {
        return Ok(Vec::new());
    };
    let pattern = format!(
        "{}/__pycache__/{}.*.pyc",
        glob::Pattern::escape(dir.as_str()),
        glob::Pattern::escape(stem)
    );
    let entries = glob::glob(&pattern).map_err(|e| InstallerError::PatternFailed {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut purged = Vec::new();
    for entry in entries.flatten() {
        let Ok(path) = Utf8PathBuf::try_from(entry) else {
            continue;
        };
        fs::remove_file(&path).map_err(|source| InstallerError::PatchFailed {
            path: path.clone(),
            source,
        })?;
        debug!("removed stale bytecode {path}");
        purged.push(path);
    }
    Ok(purged)
}

/// Replace `needle` with `replacement` in `content` according to `scope`.
///
/// # Examples
///
/// ```
/// use ro_editable::redirect::{SubstitutionScope, substitute};
///
/// let finder = "MAPPING = {'pkg': '/tmp/x/pkg'}  # built from /tmp/x/pkg";
/// let patched = substitute(finder, "/tmp/x/pkg", "/ro/pkg", SubstitutionScope::QuotedLiteral);
/// assert_eq!(patched, "MAPPING = {'pkg': '/ro/pkg'}  # built from /tmp/x/pkg");
/// ```
#[must_use]
pub fn substitute(
    content: &str,
    needle: &str,
    replacement: &str,
    scope: SubstitutionScope,
) -> String {
    match scope {
        SubstitutionScope::Anywhere => content.replace(needle, replacement),
        SubstitutionScope::QuotedLiteral => {
            content.replace(&format!("'{needle}"), &format!("'{replacement}"))
        }
    }
}

#[cfg(test)]
#[path = "redirect_tests.rs"]
mod tests;
