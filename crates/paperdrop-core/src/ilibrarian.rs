//! Upload of a PDF plus its title to an I, Librarian instance.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use crate::grobid::file_name;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no upload URL configured (set ILIBRARIAN_UPLOAD_URL)")]
    MissingUrl,
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload endpoint returned HTTP {0}")]
    Status(StatusCode),
}

/// Something that accepts a PDF and its title.
pub trait Uploader: Send + Sync {
    fn upload<'a>(
        &'a self,
        path: &'a Path,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send + 'a>>;
}

/// Login sent along with every upload.
#[derive(Clone, Default)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// HTTP client for the I, Librarian upload endpoint.
#[derive(Debug, Clone)]
pub struct ILibrarianClient {
    client: reqwest::Client,
    url: String,
    credentials: Credentials,
    timeout: Duration,
}

impl ILibrarianClient {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            credentials,
            timeout,
        }
    }

    fn form(&self, bytes: Vec<u8>, name: String, title: &str) -> Result<Form, reqwest::Error> {
        let part = Part::bytes(bytes)
            .file_name(name)
            .mime_str("application/pdf")?;
        let mut form = Form::new().part("file", part);
        // Unset credentials are left out of the form rather than sent empty.
        if let Some(user) = &self.credentials.user {
            form = form.text("user", user.clone());
        }
        if let Some(password) = &self.credentials.password {
            form = form.text("password", password.clone());
        }
        Ok(form.text("title", title.to_string()))
    }
}

impl Uploader for ILibrarianClient {
    fn upload<'a>(
        &'a self,
        path: &'a Path,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send + 'a>> {
        Box::pin(async move {
            if self.url.trim().is_empty() {
                return Err(UploadError::MissingUrl);
            }

            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| UploadError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
            let form = self.form(bytes, file_name(path), title)?;

            let resp = self
                .client
                .post(&self.url)
                .multipart(form)
                .timeout(self.timeout)
                .send()
                .await?;

            let status = resp.status();
            if status.is_client_error() || status.is_server_error() {
                return Err(UploadError::Status(status));
            }
            Ok(())
        })
    }
}
