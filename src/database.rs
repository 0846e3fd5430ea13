use crate::prelude::*;
use chrono::{Local, TimeZone};
use sqlx::{any::AnyConnectOptions, Any, Pool};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Rows flowing from the poller to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Stats(StatsRow),
    Comment(CommentRow),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

/// One measurement row: the poll stamp, the device bus address and the
/// scaled value of every monitored channel that was present this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    /// Local-time `MM/DD/YYYY HH:MM:SS`; the graphing reader depends on
    /// this exact format.
    pub stamp: String,
    pub addr: u16,
    pub values: Vec<(String, f64)>,
}

impl StatsRow {
    pub fn new(poll_time: i64, addr: u16, values: Vec<(String, f64)>) -> Self {
        Self {
            stamp: format_stamp(poll_time),
            addr,
            values,
        }
    }

    pub fn value(&self, channel: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, v)| *v)
    }
}

/// One operational event.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
    pub stamp: String,
    pub addr: Option<u16>,
    pub comment: String,
}

impl CommentRow {
    pub fn new(addr: Option<u16>, comment: impl Into<String>) -> Self {
        Self {
            stamp: format_stamp(Local::now().timestamp()),
            addr,
            comment: comment.into(),
        }
    }
}

/// Formats a unix timestamp as the local-time stamp the store expects.
pub fn format_stamp(secs: i64) -> String {
    Local
        .timestamp_opt(secs, 0)
        .earliest()
        .map(|dt| dt.format("%m/%d/%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

enum DatabaseType {
    MySQL,
    Postgres,
    SQLite,
}

#[derive(Clone, Debug)]
pub struct Database {
    config: config::Database,
    channels: Channels,
    pool: Arc<RwLock<Option<Pool<Any>>>>,
}

impl Database {
    pub fn new(config: config::Database, channels: Channels) -> Self {
        Self {
            config,
            channels,
            pool: Arc::new(RwLock::new(None)),
        }
    }

    /// Connects and migrates. Failure here is fatal: without the store we
    /// cannot even record comments.
    pub async fn prepare(&self) -> Result<()> {
        info!("initializing database");
        self.connect().await?;
        self.migrate().await?;
        Ok(())
    }

    /// Runs the inserter until shutdown.
    pub async fn start(&self) -> Result<()> {
        self.inserter().await?;
        info!("database loop exiting");
        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_database.send(ChannelData::Shutdown);
    }

    fn database(&self) -> Result<DatabaseType> {
        let prefix: Vec<&str> = self.config.url().splitn(2, ':').collect();
        match prefix[0] {
            "sqlite" => Ok(DatabaseType::SQLite),
            "mysql" => Ok(DatabaseType::MySQL),
            "postgres" => Ok(DatabaseType::Postgres),
            _ => Err(anyhow!("unsupported database {}", self.config.url())),
        }
    }

    async fn connect(&self) -> Result<()> {
        sqlx::any::install_default_drivers();
        let options = AnyConnectOptions::from_str(self.config.url())?;
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;
        *self
            .pool
            .write()
            .map_err(|_| anyhow!("failed to acquire pool write lock"))? = Some(pool);
        Ok(())
    }

    pub async fn connection(&self) -> Result<Pool<Any>> {
        match &*self
            .pool
            .read()
            .map_err(|_| anyhow!("failed to acquire pool read lock"))?
        {
            Some(pool) => Ok(pool.clone()),
            None => Err(anyhow!("database not connected")),
        }
    }

    async fn migrate(&self) -> Result<()> {
        use DatabaseType::*;

        let pool = self.connection().await?;

        let migrator = match self.database()? {
            SQLite => sqlx::migrate!("db/migrations/sqlite"),
            MySQL => sqlx::migrate!("db/migrations/mysql"),
            Postgres => sqlx::migrate!("db/migrations/postgres"),
        };

        migrator.run(&pool).await?;

        Ok(())
    }

    async fn inserter(&self) -> Result<()> {
        let mut receiver = self.channels.to_database.subscribe();

        loop {
            use ChannelData::*;

            let data = match receiver.recv().await {
                Ok(data) => data,
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("database inserter lagged, {} rows lost", n);
                    continue;
                }
            };

            match data {
                Shutdown => break,
                row => {
                    let mut retry_count = 0;
                    let max_retries = 3;
                    let mut backoff = 1;

                    while retry_count < max_retries {
                        match self.insert(&row).await {
                            Ok(_) => break,
                            Err(err) => {
                                error!("INSERT failed: {:?} - retrying in {}s", err, backoff);
                                tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                                retry_count += 1;
                                backoff *= 2;
                            }
                        }
                    }

                    if retry_count == max_retries {
                        error!("failed to insert row after {} retries", max_retries);
                    }
                }
            }
        }

        Ok(())
    }

    async fn insert(&self, data: &ChannelData) -> Result<()> {
        match data {
            ChannelData::Stats(row) => self.append_stats(row).await,
            ChannelData::Comment(row) => self.append_comment(row).await,
            ChannelData::Shutdown => Ok(()),
        }
    }

    /// Appends one `stats` row; the column list follows the channels
    /// present in the row.
    pub async fn append_stats(&self, row: &StatsRow) -> Result<()> {
        let pool = self.connection().await?;
        let database = self.database()?;

        let query = stats_sql(&database, row);
        let mut q = sqlx::query(&query).bind(&row.stamp).bind(row.addr as i32);
        for (_, value) in &row.values {
            q = q.bind(*value);
        }
        q.execute(&pool).await?;

        Ok(())
    }

    /// Appends one `comments` row.
    pub async fn append_comment(&self, row: &CommentRow) -> Result<()> {
        let pool = self.connection().await?;
        let database = self.database()?;

        let query = comments_sql(&database);
        sqlx::query(&query)
            .bind(&row.stamp)
            .bind(row.addr.map(|a| a as i32))
            .bind(&row.comment)
            .execute(&pool)
            .await?;

        Ok(())
    }
}

/// Quotes a column identifier for the backend. The channel columns
/// contain dashes (`E-Total`), so quoting is not optional.
fn quote_ident(database: &DatabaseType, ident: &str) -> String {
    match database {
        DatabaseType::MySQL => format!("`{}`", ident),
        _ => format!("\"{}\"", ident),
    }
}

fn placeholder(database: &DatabaseType, n: usize) -> String {
    match database {
        DatabaseType::MySQL => "?".to_string(),
        _ => format!("${}", n),
    }
}

/// The `stamp` value arrives as a local-time string; Postgres and MySQL
/// need an explicit conversion into their timestamp types.
fn stamp_expr(database: &DatabaseType, n: usize) -> String {
    match database {
        DatabaseType::Postgres => format!("CAST(${} AS timestamp)", n),
        DatabaseType::MySQL => "STR_TO_DATE(?, '%m/%d/%Y %H:%i:%s')".to_string(),
        DatabaseType::SQLite => format!("${}", n),
    }
}

fn stats_sql(database: &DatabaseType, row: &StatsRow) -> String {
    let mut columns = vec!["stamp".to_string(), "addr".to_string()];
    let mut values = vec![stamp_expr(database, 1), placeholder(database, 2)];

    for (i, (name, _)) in row.values.iter().enumerate() {
        columns.push(quote_ident(database, name));
        values.push(placeholder(database, i + 3));
    }

    format!(
        "INSERT INTO stats ({}) VALUES ({})",
        columns.join(", "),
        values.join(", ")
    )
}

fn comments_sql(database: &DatabaseType) -> String {
    format!(
        "INSERT INTO comments (stamp, addr, comment) VALUES ({}, {}, {})",
        stamp_expr(database, 1),
        placeholder(database, 2),
        placeholder(database, 3)
    )
}
