//! Results packaging.
//!
//! One experiment's retrievable artifact is a single zip: every file
//! under its `output/` subtree (entry paths relative to `output/`), plus
//! the captured `stdout.txt`, `stderr.txt`, and `exitcode.txt` when they
//! exist. Absence of any optional file is an omission, not an error, and
//! an empty `output/` still yields a valid archive.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use bioreactor_core::error::CoreError;
use bioreactor_core::types::ExperimentId;

/// Fixed archive name inside the working directory. Lives next to
/// `output/`, never inside it, so it is not swept into its own entries.
pub const ARCHIVE_NAME: &str = "results.zip";

/// Capture files packaged alongside the output subtree.
pub const CAPTURE_FILES: [&str; 3] = ["stdout.txt", "stderr.txt", "exitcode.txt"];

/// Deterministic download filename for an experiment's archive.
pub fn download_filename(id: ExperimentId) -> String {
    format!("experiment_{id}_results.zip")
}

/// List the files under `output/`, as paths relative to it.
pub fn list_output_files(workdir: &Path) -> Result<Vec<String>, CoreError> {
    let output_dir = workdir.join("output");
    let mut files = Vec::new();
    if output_dir.is_dir() {
        collect_files(&output_dir, &output_dir, &mut files)
            .map_err(|e| CoreError::Internal(format!("listing output files: {e}")))?;
    }
    files.sort();
    Ok(files)
}

/// Write the results archive for `workdir` and return its path.
///
/// Blocking; callers on the async path run this via `spawn_blocking`.
pub fn package(workdir: &Path) -> Result<PathBuf, CoreError> {
    let archive_path = workdir.join(ARCHIVE_NAME);
    let internal = |e: std::io::Error| CoreError::Internal(format!("packaging results: {e}"));
    let zip_err = |e: zip::result::ZipError| CoreError::Internal(format!("packaging results: {e}"));

    let file = File::create(&archive_path).map_err(internal)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let output_dir = workdir.join("output");
    for relative in list_output_files(workdir)? {
        let mut source = File::open(output_dir.join(&relative)).map_err(internal)?;
        writer
            .start_file(format!("output/{relative}"), options)
            .map_err(zip_err)?;
        let mut buf = Vec::new();
        source.read_to_end(&mut buf).map_err(internal)?;
        writer.write_all(&buf).map_err(internal)?;
    }

    for name in CAPTURE_FILES {
        let path = workdir.join(name);
        // Optional: a stream that was never captured is simply omitted.
        let Ok(mut source) = File::open(&path) else {
            continue;
        };
        writer.start_file(name, options).map_err(zip_err)?;
        let mut buf = Vec::new();
        source.read_to_end(&mut buf).map_err(internal)?;
        writer.write_all(&buf).map_err(internal)?;
    }

    writer.finish().map_err(zip_err)?;
    Ok(archive_path)
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if path.is_file() {
            let relative = path
                .strip_prefix(root)
                .expect("walked path is under its root");
            // Zip entry paths always use forward slashes.
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(name);
        }
    }
    Ok(())
}
