use crate::http::config::{HttpConfig, ProxyConfig};
use crate::http_client::{HttpClient as TookHttpClient, HttpClientError as TookHttpClientError};
use http::Response as HttpResponse;
use http::{Request, Response};
use reqwest::blocking::{Client, ClientBuilder, Response as BlockingResponse};
use reqwest::redirect::Policy;
use reqwest::{Certificate, Proxy};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Blocking `reqwest` client used for every identity provider request.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpBuildError> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .tls_built_in_native_certs(true)
            .redirect(Policy::none());

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(conn_timeout) = config.conn_timeout {
            builder = builder.connect_timeout(conn_timeout);
        }
        let builder = with_proxy(builder, &config.proxy)?;

        let client = builder
            .build()
            .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))?;

        Ok(Self { client })
    }

    fn send(&self, request: Request<Vec<u8>>) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
        let req = self
            .client
            .request(request.method().clone(), request.uri().to_string().as_str())
            .headers(request.headers().clone())
            .body(request.body().to_vec());

        let res = req
            .send()
            .map_err(|err| HttpResponseError::TransportError(err.to_string()))?;

        try_build_response(res)
    }
}

fn with_proxy(builder: ClientBuilder, proxy: &ProxyConfig) -> Result<ClientBuilder, HttpBuildError> {
    let mut builder = builder;
    if let Some(url) = proxy.url() {
        debug!("using proxy {url}");
        let proxy = Proxy::all(url.as_str())
            .map_err(|err| HttpBuildError::InvalidProxy(err.to_string()))?;
        builder = builder.proxy(proxy);
    }
    if let Some(file) = proxy.ca_bundle_file() {
        builder = builder.add_root_certificate(read_certificate(file)?);
    }
    if let Some(dir) = proxy.ca_bundle_dir() {
        let entries = fs::read_dir(dir)
            .map_err(|err| HttpBuildError::Certificate(dir.display().to_string(), err.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "pem") {
                builder = builder.add_root_certificate(read_certificate(&path)?);
            }
        }
    }
    Ok(builder)
}

fn read_certificate(path: &Path) -> Result<Certificate, HttpBuildError> {
    let certificate_error =
        |err: String| HttpBuildError::Certificate(path.display().to_string(), err);
    let pem = fs::read(path).map_err(|err| certificate_error(err.to_string()))?;
    Certificate::from_pem(&pem).map_err(|err| certificate_error(err.to_string()))
}

fn try_build_response(res: BlockingResponse) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
    let status = res.status();
    let version = res.version();
    let headers = res.headers().clone();

    let body: Vec<u8> = res
        .bytes()
        .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))?
        .into();

    let mut response = http::Response::builder()
        .status(status)
        .version(version)
        .body(body)
        .map_err(|err| HttpResponseError::BuildingResponse(err.to_string()))?;
    *response.headers_mut() = headers;

    Ok(response)
}

impl TookHttpClient for HttpClient {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TookHttpClientError> {
        let response = self.send(req)?;

        Ok(response)
    }
}

impl From<HttpResponseError> for TookHttpClientError {
    fn from(err: HttpResponseError) -> Self {
        match err {
            HttpResponseError::TransportError(msg) => TookHttpClientError::TransportError(msg),
            HttpResponseError::BuildingResponse(msg) | HttpResponseError::ReadingResponse(msg) => {
                TookHttpClientError::InvalidResponse(msg)
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
    #[error("invalid proxy configuration: {0}")]
    InvalidProxy(String),
    #[error("could not load certificate `{0}`: {1}")]
    Certificate(String, String),
}

#[derive(thiserror::Error, Debug)]
enum HttpResponseError {
    #[error("could read response body: {0}")]
    ReadingResponse(String),
    #[error("could build response: {0}")]
    BuildingResponse(String),
    #[error("http transport error: `{0}`")]
    TransportError(String),
}
