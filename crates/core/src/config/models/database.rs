use serde::{Deserialize, Serialize};

pub const BACKEND_MEMORY: &str = "memory";
pub const BACKEND_SQLITE: &str = "sqlite";

/// Task state store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `memory` or `sqlite`
    pub backend: String,
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: BACKEND_MEMORY.to_string(),
            url: "sqlite://scheduler.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn is_sqlite(&self) -> bool {
        self.backend == BACKEND_SQLITE
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.backend.as_str() {
            BACKEND_MEMORY => {}
            BACKEND_SQLITE => {
                if self.url.is_empty() {
                    return Err(anyhow::anyhow!("数据库URL不能为空"));
                }
                if !self.url.starts_with("sqlite:") {
                    return Err(anyhow::anyhow!("数据库URL必须是SQLite格式"));
                }
            }
            other => return Err(anyhow::anyhow!("不支持的存储后端: {}", other)),
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }

        Ok(())
    }
}
