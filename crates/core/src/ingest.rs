use crate::engine::RagEngine;
use crate::error::IngestError;
use crate::models::{DocumentIngestReport, IngestOutcome};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Documents are named by their file name, which must be unique in the corpus.
pub fn document_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

/// Ingests a single PDF file or every PDF below a folder, reporting per document.
pub async fn ingest_path(engine: &RagEngine, path: &Path) -> Result<Vec<DocumentIngestReport>, IngestError> {
    let files = if path.is_dir() {
        let files = discover_pdf_files(path);
        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no pdf files found in {}",
                path.display()
            )));
        }
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let loaded = async {
            let name = document_name(&file)?;
            let bytes = tokio::fs::read(&file).await?;
            Ok::<_, IngestError>((name, bytes))
        }
        .await;

        match loaded {
            Ok((name, bytes)) => reports.extend(engine.ingest_batch([(name, bytes)]).await),
            Err(error) => reports.push(DocumentIngestReport {
                document_name: file.display().to_string(),
                outcome: IngestOutcome::Failed {
                    reason: error.to_string(),
                },
            }),
        }
    }

    Ok(reports)
}
