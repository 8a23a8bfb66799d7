use std::str::FromStr;

/// 日志类型，决定上下文中哪些字段可以被输出
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum LogType {
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogType {
    type Err = crate::errors::SchedulerError;

    fn from_str(level: &str) -> Result<Self, Self::Err> {
        match level.to_lowercase().as_str() {
            "debug" => Ok(LogType::Debug),
            "info" => Ok(LogType::Info),
            "warn" | "warning" => Ok(LogType::Warn),
            "error" => Ok(LogType::Error),
            _ => Err(crate::errors::SchedulerError::Configuration(format!(
                "Invalid log type: {level}"
            ))),
        }
    }
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Debug => "DEBUG",
            LogType::Info => "INFO",
            LogType::Warn => "WARN",
            LogType::Error => "ERROR",
        }
    }
}
