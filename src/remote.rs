use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::info;

use crate::command::{CommandRunner, RunPolicy, argv};
use crate::config::ResolvedConfig;
use crate::domain::{RemoteProtocol, RemoteUrl};
use crate::error::KiraError;

pub trait UrlFetcher {
    /// Downloads `url` into `destination_dir`, keeping its basename.
    fn fetch(&self, url: &RemoteUrl, destination_dir: &Path) -> Result<PathBuf, KiraError>;
}

/// HTTP(S) through reqwest, FTP through `wget`.
#[derive(Clone)]
pub struct HttpUrlFetcher<R: CommandRunner> {
    client: Client,
    runner: R,
    wget: String,
    command_retries: u32,
    http_retries: usize,
}

impl<R: CommandRunner> HttpUrlFetcher<R> {
    pub fn new(runner: R, config: &ResolvedConfig) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-plass/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()
            .map_err(|err| KiraError::Http(err.to_string()))?;

        Ok(Self {
            client,
            runner,
            wget: config.tools.wget.clone(),
            command_retries: config.command_retries,
            http_retries: config.http_retries,
        })
    }

    fn download_http(&self, url: &RemoteUrl, destination: &Path) -> Result<(), KiraError> {
        let address = url.url();
        let mut response = self.send_with_retries(|| self.client.get(&address))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "request failed".to_string());
            return Err(KiraError::HttpStatus { status, message });
        }
        let mut file = File::create(destination).map_err(|err| {
            KiraError::Filesystem(format!("create {}: {err}", destination.display()))
        })?;
        let bytes = std::io::copy(&mut response, &mut file)
            .map_err(|err| KiraError::Http(format!("{address}: {err}")))?;
        info!("Downloaded {bytes} bytes from {address}");
        Ok(())
    }

    fn download_ftp(&self, url: &RemoteUrl, destination_dir: &Path) -> Result<(), KiraError> {
        let args = argv([
            self.wget.clone(),
            "-P".to_string(),
            destination_dir.to_string_lossy().to_string(),
            url.url(),
        ]);
        self.runner
            .run(&args, RunPolicy::retrying(self.command_retries))?;
        Ok(())
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, KiraError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.http_retries && is_retryable_status(status) {
                        info!("HTTP status {status}, retrying");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.http_retries && is_retryable_error(&err) {
                        info!("HTTP request failed ({err}), retrying");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::Http(err.to_string()));
                }
            }
        }
    }
}

impl<R: CommandRunner> UrlFetcher for HttpUrlFetcher<R> {
    fn fetch(&self, url: &RemoteUrl, destination_dir: &Path) -> Result<PathBuf, KiraError> {
        info!("Getting reads from FTP / HTTP(S)");
        let local_path = destination_dir.join(url.basename());
        match url.protocol {
            RemoteProtocol::Ftp => self.download_ftp(url, destination_dir)?,
            RemoteProtocol::Http | RemoteProtocol::Https => {
                self.download_http(url, &local_path)?
            }
        }
        Ok(local_path)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::thread::JoinHandle;

    use assert_matches::assert_matches;

    use super::*;
    use crate::command::CommandOutput;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, argv: &[String], _policy: RunPolicy) -> Result<CommandOutput, KiraError> {
            self.calls.lock().unwrap().push(argv.to_vec());
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }

    /// Answers a single request with `status` and `body`, then closes.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            loop {
                line.clear();
                let read = reader.read_line(&mut line).unwrap();
                if read == 0 || line == "\r\n" {
                    break;
                }
            }
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
        });
        (format!("http://{address}"), handle)
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn ftp_goes_through_wget_and_keeps_basename() {
        let runner = RecordingRunner::default();
        let fetcher = HttpUrlFetcher::new(&runner, &ResolvedConfig::default()).unwrap();
        let url: RemoteUrl = "ftp://ftp.example.org/pub/run/sample.fq.gz".parse().unwrap();

        let path = fetcher.fetch(&url, Path::new("/scratch/run")).unwrap();
        assert_eq!(path, Path::new("/scratch/run/sample.fq.gz"));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            vec![
                "wget",
                "-P",
                "/scratch/run",
                "ftp://ftp.example.org/pub/run/sample.fq.gz"
            ]
        );
    }

    #[test]
    fn http_body_lands_under_basename() {
        let (base, server) = serve_once("200 OK", "@r1\nACGT\n+\nIIII\n");
        let runner = RecordingRunner::default();
        let fetcher = HttpUrlFetcher::new(&runner, &ResolvedConfig::default()).unwrap();
        let url: RemoteUrl = format!("{base}/reads/sample.fq?token=abc").parse().unwrap();
        let workdir = tempfile::tempdir().unwrap();

        let path = fetcher.fetch(&url, workdir.path()).unwrap();
        server.join().unwrap();

        assert_eq!(path, workdir.path().join("sample.fq"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "@r1\nACGT\n+\nIIII\n");
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn http_not_found_is_a_status_error() {
        let (base, server) = serve_once("404 Not Found", "no such file");
        let runner = RecordingRunner::default();
        let fetcher = HttpUrlFetcher::new(&runner, &ResolvedConfig::default()).unwrap();
        let url: RemoteUrl = format!("{base}/reads/missing.fq").parse().unwrap();
        let workdir = tempfile::tempdir().unwrap();

        let err = fetcher.fetch(&url, workdir.path()).unwrap_err();
        server.join().unwrap();

        assert_matches!(err, KiraError::HttpStatus { status: 404, .. });
        assert!(!workdir.path().join("missing.fq").exists());
    }
}
