//! Spark Connect transport: connection strings, metadata headers and the
//! two RPCs the job needs (`ExecutePlan` and `Config`).

mod builder;
mod error;
mod middleware;

pub use builder::{ChannelBuilder, DEFAULT_REMOTE};
pub use error::ClientError;
pub(crate) use error::ClientErrorKind;

use crate::error::{EtlError, EtlErrorKind};
use crate::io;
use crate::spark;
use crate::spark::config_request;
use crate::spark::execute_plan_response::ResponseType;
use crate::spark::spark_connect_service_client::SparkConnectServiceClient;
use middleware::{HeadersLayer, HeadersMiddleware};

use arrow::array::RecordBatch;
use futures_util::TryStreamExt;
use tonic::transport::Channel;
use tower::ServiceBuilder;
use uuid::Uuid;

type Stub = SparkConnectServiceClient<HeadersMiddleware<Channel>>;

/// Everything an `ExecutePlan` stream produced.
#[derive(Debug, Default)]
pub struct ExecuteResult {
    pub operation_id: String,
    pub batches: Vec<RecordBatch>,
    /// Set when the plan was a SQL command; the relation stands for its output.
    pub relation: Option<spark::Relation>,
}

impl ExecuteResult {
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

#[derive(Clone, Debug)]
pub struct SparkClient {
    stub: Stub,
    builder: ChannelBuilder,
}

fn transport(source: tonic::transport::Error) -> EtlError {
    EtlError::new(EtlErrorKind::Transport(source))
}

impl SparkClient {
    /// Opens the gRPC channel described by `builder`.
    pub async fn connect(builder: ChannelBuilder) -> Result<SparkClient, EtlError> {
        let endpoint = builder.endpoint();
        let uri: http::Uri = endpoint.parse().map_err(|source| {
            EtlError::new(EtlErrorKind::InvalidConnectionUri { source, uri: endpoint.clone() })
        })?;

        let channel = Channel::builder(uri);

        #[cfg(feature = "tls")]
        let channel = if builder.use_ssl {
            channel
                .tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots())
                .map_err(transport)?
        } else {
            channel
        };

        let channel = channel.connect().await.map_err(transport)?;

        let service = ServiceBuilder::new()
            .layer(HeadersLayer::new(builder.metadata()?))
            .service(channel);

        tracing::debug!(endpoint = %endpoint, session_id = %builder.session_id, "Connected to Spark Connect");

        Ok(SparkClient { stub: SparkConnectServiceClient::new(service), builder })
    }

    pub fn session_id(&self) -> String {
        self.builder.session_id.to_string()
    }

    fn user_context(&self) -> spark::UserContext {
        let user = self.builder.user_id.clone().unwrap_or_default();
        spark::UserContext { user_id: user.clone(), user_name: user }
    }

    fn check_session(&self, response_session_id: &str) -> Result<(), ClientError> {
        let client_session_id = self.session_id();
        if response_session_id != client_session_id {
            return Err(ClientError::new(ClientErrorKind::SessionIDMismatch {
                client_session_id,
                request_session_id: response_session_id.to_string(),
            }));
        }
        Ok(())
    }

    /// Runs `plan` and drains the response stream.
    pub async fn execute_plan(&self, plan: spark::Plan) -> Result<ExecuteResult, EtlError> {
        let operation_id = Uuid::new_v4().to_string();
        let request = spark::ExecutePlanRequest {
            session_id: self.session_id(),
            user_context: Some(self.user_context()),
            plan: Some(plan),
            client_type: Some(self.builder.user_agent.clone()),
            operation_id: Some(operation_id.clone()),
            tags: vec![],
        };

        let mut stub = self.stub.clone();
        let mut stream = stub
            .execute_plan(request)
            .await
            .map_err(|status| {
                ClientError::new(ClientErrorKind::ExecutePlanRequest {
                    status,
                    operation: operation_id.clone(),
                })
            })?
            .into_inner();

        let mut result = ExecuteResult { operation_id, ..Default::default() };

        while let Some(response) = stream
            .try_next()
            .await
            .map_err(|status| ClientError::new(ClientErrorKind::Stream(status)))?
        {
            self.check_session(&response.session_id)?;

            match response.response_type {
                Some(ResponseType::ArrowBatch(batch)) => {
                    let batches = io::deserialize(&batch.data, batch.row_count)
                        .map_err(ClientError::from)?;
                    result.batches.extend(batches);
                }
                Some(ResponseType::SqlCommandResult(command)) => {
                    result.relation = command.relation;
                }
                Some(ResponseType::ResultComplete(_)) => break,
                None => {}
            }
        }

        tracing::trace!(operation_id = %result.operation_id, rows = result.row_count(), "ExecutePlan finished");

        Ok(result)
    }

    /// Sets session options. Failures on individual keys (static options on
    /// a running server) are ignored by the server and reported as warnings.
    pub async fn set_config(&self, pairs: &[(String, String)]) -> Result<Vec<String>, EtlError> {
        let request = spark::ConfigRequest {
            session_id: self.session_id(),
            user_context: Some(self.user_context()),
            operation: Some(config_request::Operation {
                op_type: Some(config_request::operation::OpType::Set(config_request::Set {
                    pairs: pairs
                        .iter()
                        .map(|(key, value)| spark::KeyValue { key: key.clone(), value: Some(value.clone()) })
                        .collect(),
                    silent: Some(true),
                })),
            }),
            client_type: Some(self.builder.user_agent.clone()),
        };

        let mut stub = self.stub.clone();
        let response = stub
            .config(request)
            .await
            .map_err(|status| {
                ClientError::new(ClientErrorKind::ConfigRequest {
                    status,
                    keys: pairs.iter().map(|(key, _)| key.clone()).collect(),
                })
            })?
            .into_inner();

        self.check_session(&response.session_id)?;

        Ok(response.warnings)
    }
}
