//! getting bytes to the server
use {
    crate::{
        config::options::HttpConfig,
        error::{LayeraError, Result},
        files::FileBlob,
        upload::UploadSettings,
    },
    async_trait::async_trait,
    reqwest::{
        Body, Client, Response,
        header::{HeaderMap, HeaderName, HeaderValue},
        multipart::{Form, Part},
    },
    serde::{Deserialize, Serialize},
    serde_json::Value,
    std::{sync::Arc, time::Duration},
    tracing::debug,
};

/// how big the pieces of a streamed body are
const STREAM_PIECE: usize = 64 * 1024;

/// gets told the total number of bytes sent so far by the current request
pub type ProgressSink = Arc<dyn Fn(u64) + Send + Sync>;

/// the server side of an upload
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// send a whole file in one request
    async fn upload_whole(&self, file: &FileBlob, progress: ProgressSink) -> Result<Value>;

    /// open a chunked session, returning its id
    async fn init_session(&self, file: &FileBlob) -> Result<String>;

    /// send one chunk of a session
    async fn upload_chunk(
        &self,
        session_id: &str,
        index: u64,
        total_chunks: u64,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<()>;

    /// close a session once every chunk is in
    async fn finalize(&self, session_id: &str, file_name: &str) -> Result<Value>;
}

/// body of `/init`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InitRequest<'a> {
    /// the file name
    filename: &'a str,
    /// the size in bytes
    file_size: u64,
    /// the mime type
    mime_type: &'a str,
}

/// answer of `/init`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InitResponse {
    /// the session id
    session_id: String,
}

/// body of `/finalize`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FinalizeRequest<'a> {
    /// the session id
    session_id: &'a str,
    /// the file name
    filename: &'a str,
}

/// the reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// the http client
    client: Client,
    /// the upload endpoint, without a trailing slash
    url: String,
    /// headers sent with every request
    headers: HeaderMap,
}

impl HttpTransport {
    /// make a transport for the configured endpoint
    pub fn new(settings: &UploadSettings, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(http.user_agent.as_deref().unwrap_or("layera"))
            .timeout(Duration::from_secs(http.timeout_secs.unwrap_or(300)))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs.unwrap_or(10)))
            .pool_max_idle_per_host(http.pool_max_idle_per_host.unwrap_or(8))
            .build()?;

        Self::with_client(client, settings)
    }

    /// make a transport around an existing client
    pub fn with_client(client: Client, settings: &UploadSettings) -> Result<Self> {
        url::Url::parse(&settings.url)?;

        Ok(Self {
            client,
            url: settings.url.trim_end_matches('/').to_string(),
            headers: header_map(&settings.headers)?,
        })
    }

    /// the url of a sub-endpoint
    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.url, name)
    }

    /// fail on non-2xx and decode whatever came back
    async fn read_body(url: &str, response: Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(LayeraError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// turn configured headers into a header map
pub fn header_map(headers: &std::collections::BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| LayeraError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| LayeraError::InvalidHeader(format!("{name}: {e}")))?;
        map.insert(name, value);
    }

    Ok(map)
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload_whole(&self, file: &FileBlob, progress: ProgressSink) -> Result<Value> {
        let bytes = file.read_all().await?;
        let length = bytes.len() as u64;

        let pieces: Vec<Vec<u8>> = bytes.chunks(STREAM_PIECE).map(<[u8]>::to_vec).collect();
        let stream = futures::stream::iter(pieces.into_iter().scan(0u64, move |sent, piece| {
            *sent += piece.len() as u64;
            progress(*sent);
            Some(Ok::<_, std::io::Error>(piece))
        }));

        let part = Part::stream_with_length(Body::wrap_stream(stream), length)
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = Form::new()
            .part("file", part)
            .text("filename", file.name.clone());

        debug!(file = %file.name, bytes = length, "uploading file in one request");
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await?;

        Self::read_body(&self.url, response).await
    }

    async fn init_session(&self, file: &FileBlob) -> Result<String> {
        let url = self.endpoint("init");
        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&InitRequest {
                filename: &file.name,
                file_size: file.size,
                mime_type: &file.mime,
            })
            .send()
            .await?;

        let body = Self::read_body(&url, response).await?;
        let init: InitResponse = serde_json::from_value(body)
            .map_err(|_| LayeraError::Session(format!("{url} did not return a sessionId")))?;

        debug!(file = %file.name, session = %init.session_id, "opened upload session");
        Ok(init.session_id)
    }

    async fn upload_chunk(
        &self,
        session_id: &str,
        index: u64,
        total_chunks: u64,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<()> {
        let url = self.endpoint("chunk");
        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("chunk", part)
            .text("chunkIndex", index.to_string())
            .text("totalChunks", total_chunks.to_string())
            .text("sessionId", session_id.to_string());

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await?;

        Self::read_body(&url, response).await.map(|_| ())
    }

    async fn finalize(&self, session_id: &str, file_name: &str) -> Result<Value> {
        let url = self.endpoint("finalize");
        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&FinalizeRequest {
                session_id,
                filename: file_name,
            })
            .send()
            .await?;

        Self::read_body(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::BTreeMap};

    fn settings(url: &str) -> UploadSettings {
        UploadSettings {
            url: url.to_string(),
            ..UploadSettings::default()
        }
    }

    #[test]
    fn test_endpoints_ignore_trailing_slash() {
        let transport = HttpTransport::with_client(Client::new(), &settings("https://files.example/api/")).unwrap();

        assert_eq!(transport.endpoint("init"), "https://files.example/api/init");
        assert_eq!(transport.endpoint("finalize"), "https://files.example/api/finalize");
    }

    #[test]
    fn test_bad_url_is_rejected() {
        let err = HttpTransport::with_client(Client::new(), &settings("not a url")).unwrap_err();
        assert!(matches!(err, LayeraError::Url(_)));
    }

    #[test]
    fn test_header_map() {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        let map = header_map(&headers).unwrap();
        assert_eq!(map["authorization"], "Bearer abc");

        headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(header_map(&headers), Err(LayeraError::InvalidHeader(_))));
    }

    #[test]
    fn test_init_request_shape() {
        let json = serde_json::to_value(InitRequest {
            filename: "a.bin",
            file_size: 12,
            mime_type: "application/octet-stream",
        })
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "filename": "a.bin",
                "fileSize": 12,
                "mimeType": "application/octet-stream"
            })
        );
    }
}
