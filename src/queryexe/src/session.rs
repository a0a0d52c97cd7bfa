use crate::dataset::Dataset;
use crate::query::{Executor, TranslateAndValidate};
use crate::remote::{RemoteEndpoint, RemoteService};
use common::catalog::MemCatalog;
use common::config::MedConfig;
use common::{MedError, QueryResult, RelNode, Tuple};
use optimizer::{MedDataServer, Planner};
use parser::parse_query;
use serde_json::Value;
use std::sync::Arc;

/// Runs queries against one configured remote system: parse, translate,
/// plan with the data server's rules, execute.
pub struct MedSession {
    server: MedDataServer<MemCatalog>,
    planner: Planner,
    service: Arc<dyn RemoteService>,
}

impl MedSession {
    /// Creates a session from parts.
    ///
    /// # Arguments
    ///
    /// * `server` - Data server that creates scans and registers rules.
    /// * `service` - Remote system the planned scans call.
    pub fn new(server: MedDataServer<MemCatalog>, service: Arc<dyn RemoteService>) -> Self {
        let planner = server.planner();
        info!("Registered rules: {}", planner.rule_names().join(", "));
        Self {
            server,
            planner,
            service,
        }
    }

    /// Creates a session over the objects and csv files of a configuration.
    pub fn from_config(config: &MedConfig) -> Result<Self, MedError> {
        let catalog = MemCatalog::new(config.objects.clone());
        let dataset = Dataset::from_config(config, &catalog)?;
        let service: Arc<dyn RemoteService> = Arc::new(RemoteEndpoint::new(catalog.clone(), dataset));
        Ok(MedSession::new(
            MedDataServer::from_config(catalog, config),
            service,
        ))
    }

    pub fn server(&self) -> &MedDataServer<MemCatalog> {
        &self.server
    }

    /// Parses and translates a query without planning it.
    pub fn translate(&self, sql: &str) -> Result<RelNode, MedError> {
        let select = parse_query(sql)?;
        TranslateAndValidate::from_sql(&select, &self.server)
    }

    /// Parses, translates and plans a query.
    ///
    /// # Arguments
    ///
    /// * `sql` - Query text.
    pub fn plan(&self, sql: &str) -> Result<RelNode, MedError> {
        let rel = self.translate(sql)?;
        debug!("Logical plan:\n{}", rel.explain());
        let planned = self.planner.optimize(rel)?;
        debug!("Planned:\n{}", planned.explain());
        Ok(planned)
    }

    /// Explain output of the planned query.
    pub fn explain(&self, sql: &str) -> Result<String, MedError> {
        Ok(self.plan(sql)?.explain())
    }

    fn executor(&self, rel: &RelNode) -> Result<Executor, MedError> {
        let mut executor = Executor::new_ref();
        executor.configure_service(&self.service);
        executor.configure_rel(rel)?;
        Ok(executor)
    }

    /// Runs a planned tree and returns its rows.
    pub fn execute_rel(&self, rel: &RelNode) -> Result<Vec<Tuple>, MedError> {
        self.executor(rel)?.collect()
    }

    /// Runs a query and returns its rows.
    pub fn rows(&self, sql: &str) -> Result<Vec<Tuple>, MedError> {
        self.execute_rel(&self.plan(sql)?)
    }

    /// Runs a query and formats its rows as a table.
    pub fn run(&self, sql: &str) -> Result<QueryResult, MedError> {
        self.executor(&self.plan(sql)?)?.execute()
    }

    /// Runs a query and renders its rows as json.
    pub fn run_json(&self, sql: &str) -> Result<Value, MedError> {
        self.executor(&self.plan(sql)?)?.execute_json()
    }
}
