//! Full rebuild of one repository's presentations: clone, parse the manifest,
//! render each declared presentation, stage its assets, prune what is no
//! longer declared.

use std::fs;
use std::path::Path;
use std::process::Command;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::github::CodeHost;
use crate::store::Store;
use crate::types::{Presentation, Repository};
use crate::worker::manifest::Manifest;
use crate::worker::paths::{Resolution, contain, resolve_within};

#[derive(Debug, Default)]
pub struct BuildReport {
    /// Presentations rendered and staged this pass.
    pub built: Vec<String>,
    /// Entries skipped, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Stale presentation rows deleted after the pass.
    pub pruned: usize,
}

/// Rebuilds every presentation declared by the repository's manifest.
///
/// Credential or upstream-lookup failure aborts with no mutation. A bad,
/// missing, or malicious source/asset path skips that entry and the pass
/// continues. The scratch checkout is removed on every exit path.
pub fn build(
    store: &dyn Store,
    host: &dyn CodeHost,
    config: &ServerConfig,
    repo: &Repository,
) -> Result<BuildReport> {
    let account = store.get_account(&repo.account_id)?.ok_or(Error::NotFound)?;
    let token = account
        .access_token
        .clone()
        .ok_or_else(|| Error::CredentialMissing {
            username: account.username.clone(),
            provider: account.provider.clone(),
        })?;
    let hosted = host.get_repo(&token, &account.username, &repo.name)?;

    let prior = Utc::now();
    let scratch = tempfile::TempDir::new()?;
    git2::build::RepoBuilder::new().clone(&hosted.clone_url, scratch.path())?;

    let public_root = config.public_root();
    fs::create_dir_all(&public_root)?;

    let mut report = BuildReport::default();

    match Manifest::load(scratch.path())? {
        None => {
            // No manifest means no presentations declared; the prune below
            // clears everything this repository previously published.
            info!("No manifest in {}; nothing to build", repo.name);
        }
        Some(manifest) => {
            // Drop previously staged output so a rebuild never serves a mix
            // of old and new files under the same name.
            for presentation in store.list_presentations(&repo.id)? {
                remove_staged(&public_root, &presentation.id);
            }

            let root = scratch.path().canonicalize()?;
            for (name, entry) in manifest.entries() {
                let source_rel = entry.source_for(name);
                let source_path = match resolve_within(&root, &source_rel) {
                    Resolution::Outside => {
                        warn!("Malicious source: {}", source_rel);
                        report
                            .skipped
                            .push((name.to_string(), "source escapes checkout".to_string()));
                        continue;
                    }
                    Resolution::Missing => {
                        warn!("Source not found: {}", source_rel);
                        report
                            .skipped
                            .push((name.to_string(), "source not found".to_string()));
                        continue;
                    }
                    Resolution::Inside(path) if !path.is_file() => {
                        warn!("Source is not a file: {}", source_rel);
                        report
                            .skipped
                            .push((name.to_string(), "source is not a file".to_string()));
                        continue;
                    }
                    Resolution::Inside(path) => path,
                };

                let presentation = upsert_presentation(store, repo, name, &source_rel)?;
                let out_dir = public_root.join(&presentation.id);

                if let Err(e) = render(&config.renderer, &source_path, &out_dir) {
                    warn!("Renderer failed for {}/{}: {}", repo.name, name, e);
                    report.skipped.push((name.to_string(), e.to_string()));
                    continue;
                }

                stage_assets(&root, &entry.assets, &out_dir)?;
                report.built.push(name.to_string());
            }
        }
    }

    for stale in store.list_stale_presentations(&repo.id, prior)? {
        remove_staged(&public_root, &stale.id);
        store.delete_presentation(&stale.id)?;
        report.pruned += 1;
    }

    info!(
        "Built {} presentation(s) for {} ({} skipped, {} pruned)",
        report.built.len(),
        repo.name,
        report.skipped.len(),
        report.pruned
    );
    Ok(report)
}

fn upsert_presentation(
    store: &dyn Store,
    repo: &Repository,
    name: &str,
    source_rel: &str,
) -> Result<Presentation> {
    match store.get_presentation(&repo.id, name)? {
        Some(existing) => {
            store.update_presentation(&existing.id, source_rel)?;
            store
                .get_presentation(&repo.id, name)?
                .ok_or(Error::NotFound)
        }
        None => {
            let presentation = Presentation::new(&repo.id, name, source_rel);
            store.create_presentation(&presentation)?;
            Ok(presentation)
        }
    }
}

fn render(renderer: &Path, source: &Path, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    let status = Command::new(renderer).arg(source).arg(out_dir).status()?;
    if !status.success() {
        return Err(Error::RendererFailed(status.to_string()));
    }
    Ok(())
}

/// Copies every file matched by the asset globs into the presentation's
/// output namespace, preserving paths relative to the checkout root. Matches
/// resolving outside the checkout are rejected and logged.
fn stage_assets(root: &Path, patterns: &[String], out_dir: &Path) -> Result<()> {
    for pattern in patterns {
        let full_pattern = root.join(pattern);
        let matches = match glob::glob(&full_pattern.to_string_lossy()) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Invalid asset pattern '{}': {}", pattern, e);
                continue;
            }
        };

        for candidate in matches {
            let candidate = match candidate {
                Ok(path) => path,
                Err(e) => {
                    warn!("Unreadable asset match for '{}': {}", pattern, e);
                    continue;
                }
            };
            let Some(canonical) = contain(root, &candidate) else {
                warn!("Malicious asset: {}", candidate.display());
                continue;
            };

            let relative = canonical
                .strip_prefix(root)
                .map_err(|_| Error::PathTraversal(canonical.display().to_string()))?;
            let target = out_dir.join(relative);

            if canonical.is_dir() {
                copy_tree(&canonical, &target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&canonical, &target)?;
            }
        }
    }
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn remove_staged(public_root: &Path, presentation_id: &str) {
    let staged = public_root.join(presentation_id);
    if let Err(e) = fs::remove_dir_all(&staged) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove staged output {}: {}", staged.display(), e);
        }
    }
}
