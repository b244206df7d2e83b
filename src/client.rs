// src/client.rs

use crate::config::{Config, ConfigError};
use futures_util::StreamExt;
use reqwest::{Response, StatusCode};
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(
        "Could not connect to num2vid server at {url}. Make sure it is running \
         (start it with `num2vid serve`) and that flask_host/flask_port match its config."
    )]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server answered {status} for {url}")]
    Status { url: String, status: StatusCode },
    #[error("unable to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome of `Num2VidClient::submit`.
#[derive(Debug)]
pub enum Submission {
    /// The video was written to this path.
    Saved(PathBuf),
    /// No download path was given; the raw response is left to the caller.
    Response(Response),
}

/// Requests videos from a num2vid server.
#[derive(Debug, Clone)]
pub struct Num2VidClient {
    http: reqwest::Client,
    base_url: String,
}

impl Num2VidClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Num2VidClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds a client for the server at `flask_host`:`flask_port`.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Ok(Self::new(format!("http://{}:{}", config.host(), config.port()?)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn convert_url(&self, num: u64) -> String {
        format!("{}/convert/{}", self.base_url, num)
    }

    /// Submits `num` to the server and waits for the resulting video.
    ///
    /// With `download_path`, the body is streamed into that file and its path is
    /// returned; a non-success status is an error and no file is written.
    /// Without it, the response is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connection` if the server cannot be reached. If the
    /// download breaks off midway, the partial file is removed before the error
    /// is returned.
    pub async fn submit(
        &self,
        num: u64,
        download_path: Option<&Path>,
    ) -> Result<Submission, ClientError> {
        let url = self.convert_url(num);
        log::info!("Submitting num {} to {}", num, url);

        let response = self.http.get(&url).send().await.map_err(|source| {
            if source.is_connect() {
                ClientError::Connection {
                    url: self.base_url.clone(),
                    source,
                }
            } else {
                ClientError::Request {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let Some(path) = download_path else {
            return Ok(Submission::Response(response));
        };

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status(),
            });
        }

        let file = File::create(path).await.map_err(|source| ClientError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        if let Err(err) = write_body(response, file, &url, path).await {
            if let Err(e) = tokio::fs::remove_file(path).await {
                log::warn!("Could not remove partial download '{}': {}", path.display(), e);
            }
            return Err(err);
        }

        log::info!("Saved video for num {} to '{}'", num, path.display());
        Ok(Submission::Saved(path.to_path_buf()))
    }
}

/// Streams the response body into `file`, closing it before returning.
async fn write_body(
    response: Response,
    mut file: File,
    url: &str,
    path: &Path,
) -> Result<(), ClientError> {
    let write_err = |source| ClientError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|source| ClientError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk).await.map_err(write_err)?;
    }
    file.flush().await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpResponse, HttpServer};
    use futures_util::stream;
    use tempfile::tempdir;

    const STUB_BODY: &[u8] = b"\x00vid\xff";

    async fn stub_convert(num: web::Path<u64>) -> HttpResponse {
        match num.into_inner() {
            7 => HttpResponse::Ok().body(STUB_BODY),
            // Sends one chunk, then aborts the chunked body.
            13 => HttpResponse::Ok().streaming(stream::iter(vec![
                Ok(web::Bytes::from_static(STUB_BODY)),
                Err(io::Error::other("encoder vanished")),
            ])),
            _ => HttpResponse::NotFound().finish(),
        }
    }

    /// Starts a stub server on an ephemeral port and returns its base URL.
    fn spawn_stub_server() -> String {
        let server = HttpServer::new(|| {
            App::new().route("/convert/{num}", web::get().to(stub_convert))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    #[actix_web::test]
    async fn test_submit_saves_body_to_download_path() {
        let client = Num2VidClient::new(spawn_stub_server());
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        match client.submit(7, Some(&out)).await.unwrap() {
            Submission::Saved(path) => assert_eq!(path, out),
            other => panic!("expected a saved file, got {:?}", other),
        }
        assert_eq!(std::fs::read(&out).unwrap(), STUB_BODY);
    }

    #[actix_web::test]
    async fn test_submit_without_path_returns_response() {
        let client = Num2VidClient::new(spawn_stub_server());

        match client.submit(7, None).await.unwrap() {
            Submission::Response(response) => {
                assert_eq!(response.status(), StatusCode::OK);
                assert_eq!(response.bytes().await.unwrap().as_ref(), STUB_BODY);
            }
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_error_status_is_not_written() {
        let client = Num2VidClient::new(spawn_stub_server());
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let err = client.submit(8, Some(&out)).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status, .. } if status == StatusCode::NOT_FOUND
        ));
        assert!(!out.exists());
    }

    #[actix_web::test]
    async fn test_interrupted_download_leaves_no_file() {
        let client = Num2VidClient::new(spawn_stub_server());
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let err = client.submit(13, Some(&out)).await.unwrap_err();
        assert!(matches!(err, ClientError::Request { .. }), "{:?}", err);
        assert!(!out.exists());
    }

    #[actix_web::test]
    async fn test_unreachable_server_is_connection_error() {
        // Reserve a port, then release it so nothing is listening there.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = Num2VidClient::new(format!("http://127.0.0.1:{}", port));

        let err = client.submit(7, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));
        assert!(err.to_string().contains("num2vid serve"));
    }

    #[test]
    fn test_from_config_builds_urls() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("num2vid_config.json");
        let doc = r#"{"flask_host": "localhost", "flask_port": 8123}"#;
        std::fs::write(&config_path, doc).unwrap();
        let config = Config::open(&config_path).unwrap();

        let client = Num2VidClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8123");
        assert_eq!(client.convert_url(7), "http://localhost:8123/convert/7");
        assert_eq!(
            Num2VidClient::new("http://h:1/").convert_url(0),
            "http://h:1/convert/0"
        );
    }
}
