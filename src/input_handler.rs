//! The pass-through media-type input handler consumes a request body into a file, acknowledging
//! the result as a small JSON body. Grounded in the original
//! `PassThroughMediaTypeInputHandler`: create missing parent directories, truncate-or-append the
//! target file, copy up to a known content length (or until EOF), and report success/failure as
//! JSON.

use std::path::{Path, PathBuf};

use serde_json::json;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Outcome of running the input handler: the status to use and the JSON body already rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct InputOutcome {
    /// HTTP status to use (200, 201 or 500)
    pub status: u16,
    /// `Content-Type` to use for the body (always `application/json`)
    pub content_type: &'static str,
    /// Rendered JSON acknowledgement body
    pub body: String,
}

fn ack_body(status: &str, message: &str, result: &str) -> String {
    json!({ "status": status, "message": message, "result": result }).to_string()
}

/// Writes `data` to `filename`, creating parent directories as needed. `append` selects
/// append-vs-truncate semantics for an existing file. `url_path` is echoed back in the `result`
/// field of the acknowledgement body.
pub async fn write_file_body(
    filename: impl AsRef<Path>,
    url_path: &str,
    append: bool,
    data: &[u8],
) -> InputOutcome {
    let filename = filename.as_ref();
    let existed = fs::metadata(filename).await.is_ok();

    if !existed {
        if let Some(parent) = filename.parent() {
            if let Err(err) = fs::create_dir_all(parent).await {
                error!(
                    "Unable to create directory to store file due to error: {}",
                    err
                );
                return InputOutcome {
                    status: 500,
                    content_type: "application/json",
                    body: ack_body("error", &err.to_string(), url_path),
                };
            }
        }
    }

    let file = open_for_write(filename, existed, append).await;
    let mut file = match file {
        Ok(file) => file,
        Err(err) => {
            error!("Unable to open file \"{:?}\" for writing: {}", filename, err);
            return InputOutcome {
                status: 500,
                content_type: "application/json",
                body: ack_body("error", &err.to_string(), url_path),
            };
        }
    };

    if let Err(err) = file.write_all(data).await {
        error!("Failed writing to file \"{:?}\": {}", filename, err);
        return InputOutcome {
            status: 500,
            content_type: "application/json",
            body: ack_body("error", &err.to_string(), url_path),
        };
    }

    InputOutcome {
        status: if existed { 200 } else { 201 },
        content_type: "application/json",
        body: ack_body("success", "", url_path),
    }
}

async fn open_for_write(path: &Path, existed: bool, append: bool) -> std::io::Result<File> {
    if existed && append {
        OpenOptions::new().append(true).open(path).await
    } else {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
    }
}

/// Convenience for building the destination path for a request's URL path underneath a base
/// directory, matching the way the reference file resource lays out stored uploads.
pub fn path_for_url(base_dir: impl AsRef<Path>, url_path: &str) -> PathBuf {
    let trimmed = url_path.trim_start_matches('/');
    base_dir.as_ref().join(trimmed)
}
