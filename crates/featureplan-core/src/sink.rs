//! Sinks
//!
//! A sink is a destination table identified by a system name and a property
//! map. Sinks are only written to, so they have no boundedness and no bounded
//! view.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Destination of materialized features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Sink {
    #[serde(rename = "MySQLSink")]
    MySql(MySqlSink),
    #[serde(rename = "FileSystemSink")]
    FileSystem(FileSystemSink),
    #[serde(rename = "KafkaSink")]
    Kafka(KafkaSink),
    #[serde(rename = "PrintSink")]
    Print(PrintSink),
    #[serde(rename = "BlackHoleSink")]
    BlackHole(BlackHoleSink),
}

impl Sink {
    /// Identifies the underlying system, e.g. `mysql` or `kafka`
    pub fn system_name(&self) -> &'static str {
        match self {
            Self::MySql(_) => "mysql",
            Self::FileSystem(_) => "filesystem",
            Self::Kafka(_) => "kafka",
            Self::Print(_) => "print",
            Self::BlackHole(_) => "blackhole",
        }
    }

    /// Properties that identify the physical destination
    ///
    /// Credentials are not part of the identity and never appear here.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        match self {
            Self::MySql(sink) => {
                properties.insert("host".to_string(), sink.host.clone());
                properties.insert("port".to_string(), sink.port.to_string());
                properties.insert("database".to_string(), sink.database.clone());
                properties.insert("table".to_string(), sink.table.clone());
            }
            Self::FileSystem(sink) => {
                properties.insert("path".to_string(), sink.path.clone());
            }
            Self::Kafka(sink) => {
                properties.insert("bootstrap_server".to_string(), sink.bootstrap_server.clone());
                properties.insert("topic".to_string(), sink.topic.clone());
                if let Some(key_format) = &sink.key_format {
                    properties.insert("key_format".to_string(), key_format.clone());
                }
                properties.insert("value_format".to_string(), sink.value_format.clone());
            }
            Self::Print(_) | Self::BlackHole(_) => {}
        }
        properties
    }

    pub fn data_format(&self) -> Option<&str> {
        match self {
            Self::FileSystem(sink) => Some(&sink.data_format),
            Self::Kafka(sink) => Some(&sink.value_format),
            Self::MySql(_) | Self::Print(_) | Self::BlackHole(_) => None,
        }
    }

    /// Short description used in logs and plans, e.g. `mysql://db:3306/shop.orders`
    pub fn describe(&self) -> String {
        match self {
            Self::MySql(sink) => format!(
                "mysql://{}:{}/{}.{}",
                sink.host, sink.port, sink.database, sink.table
            ),
            Self::FileSystem(sink) => format!("file://{} ({})", sink.path, sink.data_format),
            Self::Kafka(sink) => format!("kafka://{}/{}", sink.bootstrap_server, sink.topic),
            Self::Print(_) => "print".to_string(),
            Self::BlackHole(_) => "blackhole".to_string(),
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MySqlSink {
    pub database: String,
    pub table: String,
    pub host: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    /// Passed through to the processor untouched
    #[serde(default)]
    pub extra_config: BTreeMap<String, String>,
}

impl MySqlSink {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            host: host.into(),
            username: username.into(),
            password: password.into(),
            port: default_mysql_port(),
            extra_config: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemSink {
    pub path: String,
    pub data_format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaSink {
    pub bootstrap_server: String,
    pub topic: String,
    #[serde(default)]
    pub key_format: Option<String>,
    pub value_format: String,
    #[serde(default)]
    pub producer_properties: BTreeMap<String, String>,
}

/// Writes rows to the processor's standard output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSink {}

/// Discards every row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackHoleSink {}

impl From<MySqlSink> for Sink {
    fn from(sink: MySqlSink) -> Self {
        Self::MySql(sink)
    }
}

impl From<FileSystemSink> for Sink {
    fn from(sink: FileSystemSink) -> Self {
        Self::FileSystem(sink)
    }
}

impl From<KafkaSink> for Sink {
    fn from(sink: KafkaSink) -> Self {
        Self::Kafka(sink)
    }
}

impl From<PrintSink> for Sink {
    fn from(sink: PrintSink) -> Self {
        Self::Print(sink)
    }
}

impl From<BlackHoleSink> for Sink {
    fn from(sink: BlackHoleSink) -> Self {
        Self::BlackHole(sink)
    }
}
