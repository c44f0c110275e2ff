//! Spark session bootstrap and the small DataFrame surface the job uses.

use crate::catalog::{NamespaceIdent, TableIdent};
use crate::client::{ChannelBuilder, ExecuteResult, SparkClient};
use crate::client::{ClientError, ClientErrorKind};
use crate::config::EngineOptions;
use crate::engine::{CatalogEngine, SaveMode};
use crate::error::EtlError;
use crate::io;
use crate::spark;
use crate::spark::write_operation::save_table::TableSaveMethod;
use crate::spark::write_operation::{SaveTable, SaveType};

use arrow::array::RecordBatch;
use std::collections::HashMap;

/// Builds a [`SparkSession`] from a Spark Connect connection string.
///
/// ```no_run
/// # async fn demo() -> Result<(), spark_etl_verify::EtlError> {
/// use spark_etl_verify::{EngineOptions, SparkSessionBuilder};
///
/// let session = SparkSessionBuilder::new("sc://localhost:15002")
///     .options(EngineOptions::default())
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SparkSessionBuilder {
    connection: String,
    options: EngineOptions,
}

impl SparkSessionBuilder {
    pub fn new(connection: &str) -> Self {
        SparkSessionBuilder {
            connection: connection.to_string(),
            options: EngineOptions::new(crate::config::APP_NAME),
        }
    }

    pub fn app_name(mut self, name: &str) -> Self {
        self.options = self.options.with("spark.app.name", name);
        self
    }

    pub fn config(mut self, key: &str, value: &str) -> Self {
        self.options = self.options.with(key, value);
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Connects and applies the configured options to the session.
    pub async fn build(self) -> Result<SparkSession, EtlError> {
        let channel = ChannelBuilder::new(&self.connection)?;
        let client = SparkClient::connect(channel).await?;

        let warnings = client.set_config(self.options.pairs()).await?;
        for warning in warnings {
            tracing::warn!(%warning, "Spark rejected a session option");
        }

        tracing::info!(session_id = %client.session_id(), "Spark session created");

        Ok(SparkSession { client })
    }
}

/// An owned Spark Connect session. Dropping it closes the channel.
#[derive(Clone, Debug)]
pub struct SparkSession {
    client: SparkClient,
}

impl SparkSession {
    pub fn session_id(&self) -> String {
        self.client.session_id()
    }

    /// Runs a SQL statement eagerly and returns a DataFrame over its result.
    pub async fn sql(&self, query: &str) -> Result<DataFrame, EtlError> {
        tracing::debug!(query, "Executing SQL command");

        let result = self.client.execute_plan(sql_command_plan(query)).await?;
        let relation = result.relation.ok_or_else(|| {
            ClientError::new(ClientErrorKind::MissingSqlCommandResult(query.to_string()))
        })?;

        Ok(DataFrame { session: self.clone(), relation })
    }

    pub fn create_dataframe(&self, batch: &RecordBatch) -> Result<DataFrame, EtlError> {
        Ok(DataFrame { session: self.clone(), relation: local_relation(batch)? })
    }

    async fn execute(&self, plan: spark::Plan) -> Result<ExecuteResult, EtlError> {
        self.client.execute_plan(plan).await
    }
}

#[derive(Clone, Debug)]
pub struct DataFrame {
    session: SparkSession,
    relation: spark::Relation,
}

impl DataFrame {
    pub async fn collect(&self) -> Result<Vec<RecordBatch>, EtlError> {
        let plan = spark::Plan { op_type: Some(spark::plan::OpType::Root(self.relation.clone())) };
        Ok(self.session.execute(plan).await?.batches)
    }

    pub fn write(self) -> DataFrameWriter {
        DataFrameWriter {
            frame: self,
            mode: SaveMode::default(),
            format: None,
            options: HashMap::new(),
        }
    }
}

pub struct DataFrameWriter {
    frame: DataFrame,
    mode: SaveMode,
    format: Option<String>,
    options: HashMap<String, String>,
}

impl DataFrameWriter {
    pub fn mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Saves the DataFrame as a catalog table.
    pub async fn save_as_table(self, table_name: &str) -> Result<(), EtlError> {
        let plan = write_plan(self.frame.relation, self.mode, self.format, self.options, table_name);
        self.frame.session.execute(plan).await?;
        Ok(())
    }
}

fn command_plan(command: spark::command::CommandType) -> spark::Plan {
    spark::Plan {
        op_type: Some(spark::plan::OpType::Command(spark::Command { command_type: Some(command) })),
    }
}

fn write_plan(
    input: spark::Relation,
    mode: SaveMode,
    format: Option<String>,
    options: HashMap<String, String>,
    table_name: &str,
) -> spark::Plan {
    let write = spark::WriteOperation {
        input: Some(input),
        source: format,
        save_type: Some(SaveType::Table(SaveTable {
            table_name: table_name.to_string(),
            save_method: TableSaveMethod::SaveAsTable.into(),
        })),
        mode: spark::write_operation::SaveMode::from(mode).into(),
        sort_column_names: vec![],
        partitioning_columns: vec![],
        options,
    };

    command_plan(spark::command::CommandType::WriteOperation(write))
}

fn sql_command_plan(query: &str) -> spark::Plan {
    command_plan(spark::command::CommandType::SqlCommand(spark::SqlCommand { sql: query.to_string() }))
}

fn local_relation(batch: &RecordBatch) -> Result<spark::Relation, ClientError> {
    let data = io::serialize(std::slice::from_ref(batch))?;

    Ok(spark::Relation {
        common: None,
        rel_type: Some(spark::relation::RelType::LocalRelation(spark::LocalRelation {
            data: Some(data),
            schema: None,
        })),
    })
}

impl CatalogEngine for SparkSession {
    async fn ensure_namespace(&self, namespace: &NamespaceIdent) -> Result<(), EtlError> {
        self.sql(&format!("CREATE DATABASE IF NOT EXISTS {}", namespace.qualified())).await?;
        Ok(())
    }

    async fn use_namespace(&self, namespace: &NamespaceIdent) -> Result<(), EtlError> {
        self.sql(&format!("USE {}", namespace.qualified())).await?;
        Ok(())
    }

    async fn write_table(&self, table: &TableIdent, batch: RecordBatch, mode: SaveMode) -> Result<(), EtlError> {
        self.create_dataframe(&batch)?
            .write()
            .mode(mode)
            .save_as_table(&table.unqualified())
            .await
    }

    async fn scan_table(&self, table: &TableIdent) -> Result<Vec<RecordBatch>, EtlError> {
        self.sql(&format!("SELECT * FROM {}", table.unqualified()))
            .await?
            .collect()
            .await
    }
}
