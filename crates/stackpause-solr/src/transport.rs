//! HTTP GET + JSON decode, behind a trait so the collection manager can
//! be driven by a scripted transport in tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{SolrError, SolrResult};

#[async_trait]
pub trait SolrTransport: Send + Sync {
    /// GET `url` with the query `params` and parse the body as JSON.
    ///
    /// The body is parsed whatever the HTTP status: Solr reports admin
    /// failures as JSON with a non-2xx status.
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> SolrResult<Value>;
}

/// Percent-encode `params` onto `url`.
pub fn with_query(url: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    format!("{url}?{}", query.join("&"))
}

// ── HTTP ───────────────────────────────────────────────────────────

/// One HTTP/1 connection per request.
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    /// Admin actions like BACKUP run synchronously on the server, so the
    /// default timeout is generous.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(&self, target: &str) -> SolrResult<Value> {
        let uri: http::Uri = target
            .parse()
            .map_err(|e| SolrError::Transport(format!("{target}: {e}")))?;
        let authority = uri
            .authority()
            .ok_or_else(|| SolrError::Transport(format!("{target}: missing host")))?
            .clone();
        let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .map_err(|e| SolrError::Transport(format!("{address}: {e}")))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| SolrError::Transport(format!("{address}: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", authority.as_str())
            .header("accept", "application/json")
            .header("user-agent", "stackpause/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| SolrError::Transport(format!("{target}: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| SolrError::Transport(format!("{target}: {e}")))?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| SolrError::Transport(format!("{target}: {e}")))?
            .to_bytes();
        debug!(%target, %status, bytes = body.len(), "solr response");

        serde_json::from_slice(&body).map_err(|e| SolrError::Decode {
            url: target.to_string(),
            reason: format!("HTTP {status}: {e}"),
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SolrTransport for HttpTransport {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> SolrResult<Value> {
        let target = with_query(url, params);
        tokio::time::timeout(self.timeout, self.exchange(&target))
            .await
            .map_err(|_| {
                SolrError::Transport(format!("{target}: timed out after {:?}", self.timeout))
            })?
    }
}

// ── Scripted (for testing) ─────────────────────────────────────────

/// A request seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolrRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl SolrRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Admin `action` parameter, if any.
    pub fn action(&self) -> Option<&str> {
        self.param("action")
    }

    /// Short form used in ordering assertions: `ACTION collection[/shard]`
    /// for admin calls, `GET url` otherwise.
    pub fn summary(&self) -> String {
        match self.action() {
            Some(action) => {
                let target = self
                    .param("collection")
                    .or_else(|| self.param("name"))
                    .unwrap_or("");
                match self.param("shard") {
                    Some(shard) => format!("{action} {target}/{shard}"),
                    None if target.is_empty() => action.to_string(),
                    None => format!("{action} {target}"),
                }
            }
            None => format!("GET {}", self.url),
        }
    }
}

type Matcher = Box<dyn Fn(&SolrRequest) -> bool + Send + Sync>;

struct Rule {
    matches: Matcher,
    /// Played in order; the last one repeats.
    replies: Vec<Result<Value, String>>,
}

/// In-memory transport that answers from scripted rules and records
/// every request. The first matching rule answers; unmatched requests
/// get a bare `responseHeader.status = 0`.
#[derive(Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<SolrRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests accepted by `matches` with `replies` in turn.
    pub fn on<F>(&self, matches: F, replies: Vec<Result<Value, String>>) -> &Self
    where
        F: Fn(&SolrRequest) -> bool + Send + Sync + 'static,
    {
        self.lock_rules().push(Rule {
            matches: Box::new(matches),
            replies,
        });
        self
    }

    /// Answer every admin call with `action` with `reply`.
    pub fn on_action(&self, action: &'static str, reply: Value) -> &Self {
        self.on(move |r| r.action() == Some(action), vec![Ok(reply)])
    }

    /// Answer admin `action` calls targeting `collection` with `reply`.
    pub fn on_collection_action(
        &self,
        action: &'static str,
        collection: &'static str,
        reply: Value,
    ) -> &Self {
        self.on(
            move |r| {
                r.action() == Some(action)
                    && (r.param("collection") == Some(collection)
                        || r.param("name") == Some(collection))
            },
            vec![Ok(reply)],
        )
    }

    /// Answer non-admin requests whose URL ends with `suffix`.
    pub fn on_url(&self, suffix: &'static str, reply: Value) -> &Self {
        self.on(move |r| r.url.ends_with(suffix), vec![Ok(reply)])
    }

    pub fn requests(&self) -> Vec<SolrRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// [`SolrRequest::summary`] of every request, in order.
    pub fn summaries(&self) -> Vec<String> {
        self.requests().iter().map(SolrRequest::summary).collect()
    }

    /// Summaries of requests other than the read-only LIST,
    /// CLUSTERSTATUS and STATUS actions.
    pub fn mutations(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| !matches!(r.action(), Some("LIST" | "CLUSTERSTATUS" | "STATUS")))
            .map(SolrRequest::summary)
            .collect()
    }

    fn lock_rules(&self) -> std::sync::MutexGuard<'_, Vec<Rule>> {
        self.rules.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SolrTransport for ScriptedTransport {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> SolrResult<Value> {
        let request = SolrRequest {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        };
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let mut rules = self.lock_rules();
        let Some(rule) = rules.iter_mut().find(|rule| (rule.matches)(&request)) else {
            return Ok(json!({"responseHeader": {"status": 0, "QTime": 0}}));
        };
        let reply = match rule.replies.len() {
            0 => Ok(json!({"responseHeader": {"status": 0, "QTime": 0}})),
            1 => rule.replies[0].clone(),
            _ => rule.replies.remove(0),
        };
        reply.map_err(|e| SolrError::Transport(format!("{}: {e}", request.summary())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn query_is_percent_encoded() {
        let url = with_query(
            "http://solr/solr/admin/collections",
            &[("action", "BACKUP".into()), ("location", "/data/backup".into())],
        );
        assert_eq!(
            url,
            "http://solr/solr/admin/collections?action=BACKUP&location=%2Fdata%2Fbackup"
        );
        assert_eq!(with_query("http://solr/solr", &[]), "http://solr/solr");
    }

    #[tokio::test]
    async fn scripted_replies_play_in_order_then_repeat() {
        let transport = ScriptedTransport::new();
        transport.on(
            |r| r.action() == Some("LIST"),
            vec![
                Ok(json!({"collections": ["a"]})),
                Err("connection reset".into()),
                Ok(json!({"collections": ["b"]})),
            ],
        );

        let params = [("action", "LIST".to_string())];
        let first = transport.get_json("http://x/solr", &params).await.unwrap();
        assert_eq!(first["collections"][0], "a");
        assert!(transport.get_json("http://x/solr", &params).await.is_err());
        for _ in 0..2 {
            let reply = transport.get_json("http://x/solr", &params).await.unwrap();
            assert_eq!(reply["collections"][0], "b");
        }
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test]
    async fn unmatched_requests_succeed_with_status_zero() {
        let transport = ScriptedTransport::new();
        let reply = transport
            .get_json("http://x/solr/articles/update", &[("commit", "true".into())])
            .await
            .unwrap();
        assert_eq!(reply["responseHeader"]["status"], 0);
        assert_eq!(transport.summaries(), vec!["GET http://x/solr/articles/update"]);
    }

    #[test]
    fn summary_names_target_and_shard() {
        let request = SolrRequest {
            url: "http://x/solr/admin/collections".into(),
            params: vec![
                ("action".into(), "DELETEREPLICA".into()),
                ("collection".into(), "articles".into()),
                ("shard".into(), "shard1".into()),
            ],
        };
        assert_eq!(request.summary(), "DELETEREPLICA articles/shard1");
    }

    #[tokio::test]
    async fn http_transport_parses_error_bodies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let body = r#"{"responseHeader":{"status":400},"success":false}"#;
            let response = format!(
                "HTTP/1.1 400 Bad Request\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });

        let transport = HttpTransport::new().with_timeout(Duration::from_secs(5));
        let reply = transport
            .get_json(
                &format!("http://{addr}/solr/admin/collections"),
                &[("action", "LIST".into()), ("wt", "json".into())],
            )
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /solr/admin/collections?action=LIST&wt=json HTTP/1.1"));
        assert_eq!(reply["success"], false);
        assert_eq!(reply["responseHeader"]["status"], 400);
    }

    #[tokio::test]
    async fn http_transport_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpTransport::new()
            .get_json(&format!("http://{addr}/solr"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SolrError::Transport(_)));
    }
}
