//! Private-repo report workflow: manifest, categories, report file, Drive.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, instrument};

use crate::category::{CategorizedRepos, categorize};
use crate::drive::{DriveApi, DriveError, DriveFile, publish_report};
use crate::ini::CategoryMap;
use crate::manifest::read_private_repos;
use crate::pipeline::{PipelineEvent, PipelineResult, Stage};
use crate::report::{ReportSink, render_category_report};

/// Inputs of one private-repo report run.
#[derive(Debug, Clone)]
pub struct PrivateReposRequest {
    /// Release manifest to read.
    pub manifest: Utf8PathBuf,
    /// Release name; the report is `<release>.txt`.
    pub release: String,
    /// Category map from the projects file.
    pub categories: CategoryMap,
    /// Directory the report file is written into.
    pub output_dir: Utf8PathBuf,
    /// Drive folder to publish into; `None` skips the upload.
    pub folder_id: Option<String>,
}

impl PrivateReposRequest {
    /// File name of the report.
    pub fn report_name(&self) -> String {
        format!("{}.txt", self.release)
    }

    /// Full path of the report file.
    pub fn report_path(&self) -> Utf8PathBuf {
        self.output_dir.join(self.report_name())
    }
}

/// What the workflow produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateReposOutcome {
    /// Where the report was written.
    pub report_path: Utf8PathBuf,
    /// Categories with their sorted URLs.
    pub grouped: CategorizedRepos,
    /// The Drive file, when uploaded.
    pub uploaded: Option<DriveFile>,
}

/// Run the private-repo workflow. `drive` may be `None` to skip publishing.
#[instrument(skip_all, fields(manifest = %request.manifest, release = %request.release))]
pub fn run_private_repos(
    request: &PrivateReposRequest,
    drive: Option<&dyn DriveApi>,
    mut on_event: impl FnMut(PipelineEvent),
) -> PipelineResult<PrivateReposOutcome> {
    // resolve the folder before doing any work
    let upload = match drive {
        Some(api) => Some((api, request.folder_id.as_deref().ok_or(DriveError::MissingFolder)?)),
        None => None,
    };

    on_event(PipelineEvent::Started(Stage::Manifest));
    let repos = read_private_repos(&request.manifest)?;
    on_event(PipelineEvent::Finished(
        Stage::Manifest,
        format!("{} private repo(s)", repos.len()),
    ));

    on_event(PipelineEvent::Started(Stage::Categorize));
    let grouped = categorize(&repos, &request.categories)?;
    on_event(PipelineEvent::Finished(
        Stage::Categorize,
        format!("{} categor(ies)", grouped.len()),
    ));

    let report = render_category_report(&grouped);
    let report_path = request.report_path();
    on_event(PipelineEvent::Started(Stage::Write));
    ReportSink::File(report_path.clone()).write(&report)?;
    on_event(PipelineEvent::Finished(Stage::Write, report_path.to_string()));

    let uploaded = match upload {
        Some((api, folder_id)) => {
            on_event(PipelineEvent::Started(Stage::Upload));
            let file = publish_report(api, folder_id, &request.report_name(), report.as_bytes())?;
            on_event(PipelineEvent::Finished(
                Stage::Upload,
                format!("{} ({})", file.name, file.id),
            ));
            Some(file)
        }
        None => {
            on_event(PipelineEvent::Skipped(Stage::Upload, "upload disabled".to_string()));
            None
        }
    };

    info!(path = %report_path, uploaded = uploaded.is_some(), "private repo report complete");
    Ok(PrivateReposOutcome {
        report_path,
        grouped,
        uploaded,
    })
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
