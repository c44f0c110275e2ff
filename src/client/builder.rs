use crate::client::error::{ClientError, ClientErrorKind};

use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

/// Connection string used when no remote is configured.
pub const DEFAULT_REMOTE: &str = "sc://localhost:15002";

const DEFAULT_USER_AGENT: &str = "_SPARK_ETL_VERIFY";

/// Parsed Spark Connect connection string.
///
/// Accepts URLs of the form `sc://<host>:<port>/;key1=value1;key2=value2`
/// as described by the
/// [Spark Connect client connection specification](https://github.com/apache/spark/blob/master/connector/connect/docs/client-connection-string.md).
///
/// Recognized keys:
/// - `token`: sent as an `authorization: Bearer <token>` header;
/// - `user_id`: defaults to `$USER`;
/// - `user_agent`: prefix of the client type reported to the server;
/// - `session_id`: UUID of a session to reuse;
/// - `use_ssl`: connect over TLS (requires the `tls` feature).
///
/// Any other key is forwarded verbatim as a gRPC metadata header, which is
/// how vendor routing keys such as `x-databricks-cluster-id` reach the server.
#[derive(Clone, Debug)]
pub struct ChannelBuilder {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) session_id: Uuid,
    pub(crate) user_id: Option<String>,
    pub(crate) user_agent: String,
    pub(crate) use_ssl: bool,
    pub(crate) headers: BTreeMap<String, String>,
}

impl ChannelBuilder {
    /// Validate a connection string.
    pub fn new(connection: &str) -> Result<ChannelBuilder, ClientError> {
        let url = Url::parse(connection).map_err(|source| {
            invalid(connection, Some(source), "failed to parse connection string")
        })?;

        if url.scheme() != "sc" {
            return Err(invalid(connection, None, "the connection string must start with 'sc://'"));
        }

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid(connection, None, "the hostname must not be empty"))?
            .to_string();

        let port = url
            .port()
            .ok_or_else(|| invalid(connection, None, "the port must not be empty"))?;

        let mut params = parse_params(&url);

        let session_id = match params.remove("session_id") {
            Some(session_id) => Uuid::from_str(&session_id).map_err(|source| {
                ClientError::new(ClientErrorKind::InvalidSessionID { source, session_id })
            })?,
            None => Uuid::new_v4(),
        };

        let use_ssl = params
            .remove("use_ssl")
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"));

        if use_ssl && !cfg!(feature = "tls") {
            return Err(ClientError::new(ClientErrorKind::TlsUnavailable));
        }

        if let Some(token) = params.remove("token") {
            params.insert("authorization".to_string(), format!("Bearer {token}"));
        }

        Ok(ChannelBuilder {
            host,
            port,
            session_id,
            user_id: params.remove("user_id").or_else(|| env::var("USER").ok()),
            user_agent: user_agent(params.remove("user_agent").as_deref()),
            use_ssl,
            headers: params,
        })
    }

    pub(crate) fn endpoint(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// gRPC metadata attached to every request.
    pub(crate) fn metadata(&self) -> Result<HeaderMap, ClientError> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_str(name).map_err(|_| {
                ClientError::new(ClientErrorKind::InvalidHeader { name: name.clone() })
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                ClientError::new(ClientErrorKind::InvalidHeader { name: name.clone() })
            })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

fn invalid(connection: &str, source: Option<url::ParseError>, msg: &str) -> ClientError {
    ClientError::new(ClientErrorKind::InvalidConnectionString {
        source,
        conn_string: connection.to_string(),
        msg: msg.to_string(),
    })
}

fn user_agent(prefix: Option<&str>) -> String {
    format!(
        "{} os/{} spark_etl_verify/{}",
        prefix.unwrap_or(DEFAULT_USER_AGENT),
        env::consts::OS.to_lowercase(),
        env!("CARGO_PKG_VERSION")
    )
}

fn parse_params(url: &Url) -> BTreeMap<String, String> {
    url.path()
        .split(';')
        .filter(|pair| !pair.is_empty() && *pair != "/")
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_string(), value.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_remote() {
        let cb = ChannelBuilder::new(DEFAULT_REMOTE).unwrap();

        assert_eq!(cb.endpoint(), "http://localhost:15002");
        assert!(cb.headers.is_empty());
        assert!(cb.user_agent.starts_with("_SPARK_ETL_VERIFY os/"));
    }

    #[test]
    fn test_invalid_scheme_error() {
        let connection = "http://127.0.0.1:15002";
        let err = ChannelBuilder::new(connection).unwrap_err();
        match err.kind {
            ClientErrorKind::InvalidConnectionString { msg, conn_string, source } => {
                assert!(msg.contains("must start with 'sc://'"));
                assert_eq!(conn_string, connection);
                assert!(source.is_none());
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn test_missing_host_error() {
        let err = ChannelBuilder::new("sc://:15002").unwrap_err();
        match err.kind {
            ClientErrorKind::InvalidConnectionString { msg, source, .. } => {
                assert!(msg.contains("failed to parse"));
                assert!(source.is_some());
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn test_missing_port_error() {
        let err = ChannelBuilder::new("sc://127.0.0.1").unwrap_err();
        match err.kind {
            ClientErrorKind::InvalidConnectionString { msg, .. } => {
                assert!(msg.contains("port must not be empty"));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn test_params_become_headers() {
        let connection = "sc://myhost.com:443/;token=ABCDEFG;user_agent=glue;user_id=etl;x-cluster-id=42";
        let cb = ChannelBuilder::new(connection).unwrap();

        assert_eq!(cb.user_id.as_deref(), Some("etl"));
        assert!(cb.user_agent.starts_with("glue "));

        let metadata = cb.metadata().unwrap();
        assert_eq!(metadata.get("authorization").unwrap(), "Bearer ABCDEFG");
        assert_eq!(metadata.get("x-cluster-id").unwrap(), "42");
        assert!(metadata.get("user_id").is_none());
    }

    #[test]
    fn test_session_id_reuse() {
        let id = "2f0a9e4c-3a63-4b1f-9f9a-0d5b8a2f8c11";
        let cb = ChannelBuilder::new(&format!("sc://localhost:15002/;session_id={id}")).unwrap();
        assert_eq!(cb.session_id().to_string(), id);

        let err = ChannelBuilder::new("sc://localhost:15002/;session_id=nope").unwrap_err();
        assert!(matches!(err.kind, ClientErrorKind::InvalidSessionID { .. }));
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn test_ssl_requires_tls_feature() {
        let err = ChannelBuilder::new("sc://127.0.0.1:443/;use_ssl=true").unwrap_err();
        assert!(matches!(err.kind, ClientErrorKind::TlsUnavailable));
    }

    #[test]
    fn test_invalid_header_name() {
        let cb = ChannelBuilder::new("sc://localhost:15002/;bad:header=1").unwrap();
        let err = cb.metadata().unwrap_err();
        assert!(matches!(err.kind, ClientErrorKind::InvalidHeader { .. }));
    }
}
