//! BigQuery warehouse backed by `gcp-bigquery-client`.
//!
//! Metadata comes from the tables API; renames, ALTERs and the
//! create-as-select copy run as query jobs. Query jobs are awaited to
//! completion before returning so the runner stays strictly sequential.
//! Only resources of type `TABLE` are described; views and external
//! tables are left alone.

use async_trait::async_trait;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::clustering::Clustering;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::table::Table;
use gcp_bigquery_client::table::ListOptions;
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use gcp_bigquery_client::Client;
use std::path::Path;
use tracing::{debug, info};

use crate::config::WarehouseConfig;
use crate::core::{Partitioning, RebuildSpec, TableDescriptor, TableId, Warehouse};
use crate::error::{MigrateError, Result};
use crate::plan::ddl;

/// Warehouse implementation talking to the BigQuery REST API.
pub struct BigQueryWarehouse {
    client: Client,
    /// Project billed for query jobs.
    project: String,
}

impl BigQueryWarehouse {
    /// Connect using the configured service account key, or application
    /// default credentials when no key file is configured.
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        let client = match &config.credentials_path {
            Some(path) => Self::client_from_key_file(path).await?,
            None => {
                info!("No credentials_path configured, using application default credentials");
                Client::from_application_default_credentials().await?
            }
        };

        Ok(Self {
            client,
            project: config.project.clone(),
        })
    }

    async fn client_from_key_file(path: &Path) -> Result<Client> {
        let key = std::fs::read_to_string(path)?;
        let service_account_key = parse_service_account_key(key).map_err(|e| {
            MigrateError::Config(format!(
                "Invalid service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Client::from_service_account_key(service_account_key, false).await?)
    }

    /// Run a statement as a query job and wait for it to finish, however long
    /// that takes.
    async fn run_statement(&self, sql: String) -> Result<()> {
        debug!("Executing statement:\n{}", sql);
        let response = self
            .client
            .job()
            .query(&self.project, QueryRequest::new(sql))
            .await?;

        if response.job_complete.unwrap_or(false) {
            return Ok(());
        }

        let job_ref = response.job_reference.ok_or_else(|| {
            MigrateError::warehouse("query", &self.project, "incomplete job without a job reference")
        })?;
        let job_id = job_ref.job_id.clone().ok_or_else(|| {
            MigrateError::warehouse("query", &self.project, "incomplete job without a job id")
        })?;

        // getQueryResults long-polls server-side, so no client sleep is needed.
        let mut polls: u64 = 0;
        loop {
            polls += 1;
            let params = GetQueryResultsParameters {
                location: job_ref.location.clone(),
                ..Default::default()
            };
            let results = self
                .client
                .job()
                .get_query_results(&self.project, &job_id, params)
                .await?;
            if results.job_complete.unwrap_or(false) {
                debug!("Job {} complete after {} polls", job_id, polls);
                return Ok(());
            }
            if polls % 10 == 0 {
                info!("Job {} still running ({} polls)", job_id, polls);
            }
        }
    }

    fn describe(id: &TableId, table: Table) -> Result<TableDescriptor> {
        if let Some(kind) = table.r#type.as_deref() {
            if kind != TABLE_TYPE {
                return Err(MigrateError::warehouse(
                    "get",
                    id.to_string(),
                    format!("resource type is {}, not {}", kind, TABLE_TYPE),
                ));
            }
        }

        // The flag is reported on the table and, for older tables, on the
        // partitioning spec.
        let table_filter = table.require_partition_filter.unwrap_or(false);
        let partitioning = if let Some(tp) = &table.time_partitioning {
            Partitioning::Time {
                field: tp
                    .field
                    .clone()
                    .unwrap_or_else(|| "_PARTITIONTIME".to_string()),
                require_filter: table_filter || tp.require_partition_filter.unwrap_or(false),
            }
        } else if table.range_partitioning.is_some() {
            Partitioning::Range
        } else {
            Partitioning::None
        };

        let clustering = table
            .clustering
            .and_then(|c| c.fields)
            .unwrap_or_default();

        let columns = table
            .schema
            .fields
            .unwrap_or_default()
            .into_iter()
            .map(|f| f.name)
            .collect();

        Ok(TableDescriptor {
            id: id.clone(),
            partitioning,
            clustering,
            columns,
            num_rows: parse_count(table.num_rows.as_deref()),
            num_bytes: parse_count(table.num_bytes.as_deref()).unwrap_or(0),
        })
    }
}

const TABLE_TYPE: &str = "TABLE";

/// Counts arrive as decimal strings; absent or malformed counts are unknown.
fn parse_count(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.parse().ok())
}

fn is_not_found(err: &BQError) -> bool {
    matches!(err, BQError::ResponseError { error } if error.error.code == 404)
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn dataset_exists(&self, project: &str, dataset: &str) -> Result<bool> {
        match self.client.dataset().get(project, dataset).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_tables(&self, project: &str, dataset: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut options = ListOptions::default();

        loop {
            let page = self.client.table().list(project, dataset, options).await?;
            for entry in page.tables.unwrap_or_default() {
                match entry.r#type.as_deref() {
                    None | Some(TABLE_TYPE) => names.push(entry.table_reference.table_id),
                    Some(kind) => debug!(
                        "Skipping {} {}",
                        kind.to_lowercase(),
                        entry.table_reference.table_id
                    ),
                }
            }
            match page.next_page_token {
                Some(token) => options = ListOptions::default().page_token(token),
                None => break,
            }
        }

        Ok(names)
    }

    async fn get_table(&self, id: &TableId) -> Result<Option<TableDescriptor>> {
        match self
            .client
            .table()
            .get(&id.project, &id.dataset, &id.table, None)
            .await
        {
            Ok(table) => Self::describe(id, table).map(Some),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_partitioned_copy(&self, spec: &RebuildSpec) -> Result<()> {
        self.run_statement(ddl::create_partitioned_copy(spec)?).await
    }

    async fn require_partition_filter(&self, id: &TableId) -> Result<()> {
        self.run_statement(ddl::require_partition_filter(id)?).await
    }

    async fn set_clustering(&self, id: &TableId, fields: &[String]) -> Result<()> {
        // Clustering has no DDL form; patch the table resource instead.
        let mut table = self
            .client
            .table()
            .get(&id.project, &id.dataset, &id.table, None)
            .await?;
        table.clustering = Some(Clustering {
            fields: Some(fields.to_vec()),
        });
        self.client
            .table()
            .patch(&id.project, &id.dataset, &id.table, table)
            .await?;
        Ok(())
    }

    async fn rename_table(&self, id: &TableId, new_name: &str) -> Result<()> {
        self.run_statement(ddl::rename_table(id, new_name)?).await
    }

    async fn delete_table(&self, id: &TableId) -> Result<()> {
        self.client
            .table()
            .delete(&id.project, &id.dataset, &id.table)
            .await?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "bigquery"
    }
}
