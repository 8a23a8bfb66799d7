use std::collections::HashMap;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{info, warn};

use task_scheduler_core::{
    models::{ExecutionOptions, JobExecution},
    traits::TaskExecutor,
    SchedulerError, SchedulerResult,
};

/// Shell任务参数，来自任务数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellTaskParams {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

/// HTTP任务参数，来自任务数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTaskParams {
    pub url: String,
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

fn parse_params<T: serde::de::DeserializeOwned>(job: &JobExecution, kind: &str) -> SchedulerResult<T> {
    let payload = job.payload.clone().ok_or_else(|| {
        SchedulerError::TaskExecution(format!("任务 {} 缺少{kind}参数", job.task_code))
    })?;
    serde_json::from_value(payload)
        .map_err(|e| SchedulerError::TaskExecution(format!("解析{kind}任务参数失败: {e}")))
}

/// 执行任务数据中描述的命令，非零退出码视为失败
pub struct ShellExecutor {
    name: String,
    options: Option<ExecutionOptions>,
}

impl ShellExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: Option<ExecutionOptions>) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_options(&self) -> Option<ExecutionOptions> {
        self.options
    }

    async fn execute(&self, job: &JobExecution) -> SchedulerResult<Value> {
        let start_time = Instant::now();
        let params: ShellTaskParams = parse_params(job, "Shell")?;

        info!(
            task.code = %job.task_code,
            "执行Shell任务: command={}, args={:?}",
            params.command, params.args
        );

        let mut cmd = Command::new(&params.command);
        cmd.args(&params.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &params.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &params.env_vars {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| SchedulerError::TaskExecution(format!("启动Shell命令失败: {e}")))?;

        let exit_code = output.status.code();
        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let duration_ms = start_time.elapsed().as_millis() as u64;

        if !output.status.success() {
            warn!(
                task.code = %job.task_code,
                "Shell任务失败: exit_code={exit_code:?}, duration={duration_ms}ms"
            );
            let detail = if stderr.is_empty() {
                String::new()
            } else {
                format!(": {stderr}")
            };
            return Err(SchedulerError::TaskExecution(format!(
                "命令执行失败，退出码 {exit_code:?}{detail}"
            )));
        }

        info!(
            task.code = %job.task_code,
            "Shell任务执行完成: exit_code={exit_code:?}, duration={duration_ms}ms"
        );
        Ok(json!({
            "exit_code": exit_code,
            "stdout": stdout,
            "stderr": stderr,
            "duration_ms": duration_ms,
        }))
    }
}

/// 发送任务数据中描述的HTTP请求，非2xx响应视为失败
pub struct HttpExecutor {
    name: String,
    options: Option<ExecutionOptions>,
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_options(mut self, options: Option<ExecutionOptions>) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl TaskExecutor for HttpExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_options(&self) -> Option<ExecutionOptions> {
        self.options
    }

    async fn execute(&self, job: &JobExecution) -> SchedulerResult<Value> {
        let start_time = Instant::now();
        let params: HttpTaskParams = parse_params(job, "HTTP")?;
        let method = params.method.as_deref().unwrap_or("GET").to_uppercase();

        info!(task.code = %job.task_code, "执行HTTP任务: method={}, url={}", method, params.url);

        let mut request = match method.as_str() {
            "GET" => self.client.get(&params.url),
            "POST" => self.client.post(&params.url),
            "PUT" => self.client.put(&params.url),
            "DELETE" => self.client.delete(&params.url),
            "PATCH" => self.client.patch(&params.url),
            "HEAD" => self.client.head(&params.url),
            _ => {
                return Err(SchedulerError::TaskExecution(format!(
                    "不支持的HTTP方法: {method}"
                )));
            }
        };
        for (key, value) in &params.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &params.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SchedulerError::TaskExecution(format!("HTTP请求失败: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("读取响应体失败: {e}"));
        let duration_ms = start_time.elapsed().as_millis() as u64;

        if !status.is_success() {
            return Err(SchedulerError::TaskExecution(format!(
                "HTTP请求失败，状态码: {}",
                status.as_u16()
            )));
        }

        info!(
            task.code = %job.task_code,
            "HTTP任务执行完成: status={}, duration={duration_ms}ms",
            status.as_u16()
        );
        Ok(json!({
            "status": status.as_u16(),
            "body": body,
            "duration_ms": duration_ms,
        }))
    }
}
