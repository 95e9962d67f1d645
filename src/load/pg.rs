use postgres::{types::ToSql, Client, Config, NoTls, Statement};
use std::{collections::HashMap, time::Duration};

use super::Warehouse;
use crate::{
    config::{Credentials, WarehouseConfig},
    error::BackendError,
    transform::FieldValue,
};

/// Synchronous session against the Postgres warehouse. The client runs
/// outside any explicit transaction, so every statement autocommits.
pub struct PostgresWarehouse {
    client: Client,
    /// Prepared once per statement text; a load reuses one upsert for every row.
    prepared: HashMap<String, Statement>,
}

impl PostgresWarehouse {
    pub fn connect(config: &WarehouseConfig, credentials: &Credentials) -> Result<Self, BackendError> {
        let mut pg = Config::new();
        pg.user(&credentials.user)
            .host(&credentials.host)
            .password(&credentials.password)
            .dbname(&config.db_name)
            .application_name("grazing_etl")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .options(&format!(
                "-c statement_timeout={}",
                config.statement_timeout_secs * 1000
            ));
        let client = pg.connect(NoTls)?;
        Ok(Self {
            client,
            prepared: HashMap::new(),
        })
    }
}

/// Owned driver value for one bound parameter. Nulls are typed as text, the
/// only nullable column.
fn to_param(value: &FieldValue<'_>) -> Box<dyn ToSql + Sync> {
    match value {
        FieldValue::Null => Box::new(None::<String>),
        FieldValue::Text(s) => Box::new(s.to_string()),
        FieldValue::Number(n) => Box::new(*n),
        FieldValue::Date(d) => Box::new(*d),
    }
}

impl Warehouse for PostgresWarehouse {
    fn probe(&mut self, sql: &str) -> Result<(), BackendError> {
        self.client.simple_query(sql)?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[FieldValue<'_>]) -> Result<u64, BackendError> {
        let statement = match self.prepared.get(sql) {
            Some(statement) => statement.clone(),
            None => {
                let statement = self.client.prepare(sql)?;
                self.prepared.insert(sql.to_string(), statement.clone());
                statement
            }
        };
        let owned: Vec<Box<dyn ToSql + Sync>> = params.iter().map(to_param).collect();
        let bound: Vec<&(dyn ToSql + Sync)> = owned.iter().map(|p| p.as_ref()).collect();
        Ok(self.client.execute(&statement, &bound)?)
    }
}
