use crate::process::WorkerProcess;
use crate::readiness::wait_until_ready;
use mplz_proxy_core::{
    AnalyzeRequest, LoadRequest, ProxyCommand, ProxyConfig, ProxyError, Result, ANALYZE_PATH,
    LOAD_PATH,
};
use reqwest::{Client, Response};
use std::io::Write;
use tracing::{info, warn};

/// Client for one mplz worker process.
///
/// Construction spawns the worker and waits for it; `load` and `analyze`
/// relay commands over HTTP and print the worker's reply; `kill` stops the
/// worker. Calls after `kill` are not guarded and fail at the HTTP layer.
pub struct GameProxy {
    config: ProxyConfig,
    worker: WorkerProcess,
    http: Client,
    output: Box<dyn Write + Send>,
}

impl GameProxy {
    /// Launches `cargo run --bin=mplz` and waits three seconds.
    pub async fn new() -> Result<Self> {
        Self::with_config(ProxyConfig::default()).await
    }

    pub async fn with_config(config: ProxyConfig) -> Result<Self> {
        Self::with_output(config, Box::new(std::io::stdout())).await
    }

    /// Like `with_config`, but response bodies go to `output` instead of
    /// standard output.
    pub async fn with_output(config: ProxyConfig, output: Box<dyn Write + Send>) -> Result<Self> {
        config.validate()?;
        let addr = config.socket_addr()?;
        let http = Client::builder().no_proxy().build()?;

        let mut worker = WorkerProcess::spawn(&config.worker, config.kill_on_drop)?;

        if let Err(e) = wait_until_ready(&config.readiness, &addr).await {
            if let Err(kill_err) = worker.kill() {
                warn!(pid = ?worker.id(), error = %kill_err, "Failed to kill unready worker");
            }
            return Err(e);
        }

        info!(pid = ?worker.id(), base_url = %config.base_url, "Worker ready");

        Ok(Self {
            config,
            worker,
            http,
            output,
        })
    }

    /// Asks the worker to load `file_name`. The name is the raw request body.
    pub async fn load(&mut self, file_name: &str) -> Result<()> {
        let request = LoadRequest::new(file_name);
        let url = self.config.endpoint(LOAD_PATH);

        info!(endpoint = %url, file_name, "Sending load");
        let response = self.http.post(&url).body(request.into_body()).send().await?;
        self.print_response(&url, response).await
    }

    pub async fn analyze(
        &mut self,
        result_file: &str,
        iteration: u32,
        simulation_turn: u32,
    ) -> Result<()> {
        let request = AnalyzeRequest::new(result_file, iteration, simulation_turn);
        let url = self.config.endpoint(ANALYZE_PATH);

        info!(
            endpoint = %url,
            file_name = %request.file_name,
            iteration,
            simulation_turn,
            "Sending analyze"
        );
        let response = self.http.post(&url).json(&request).send().await?;
        self.print_response(&url, response).await
    }

    pub async fn execute(&mut self, command: ProxyCommand) -> Result<()> {
        match command {
            ProxyCommand::Load(request) => self.load(&request.file_name).await,
            ProxyCommand::Analyze(request) => {
                self.analyze(&request.file_name, request.iteration, request.simulation_turn)
                    .await
            }
        }
    }

    /// Force-kills the worker without waiting for it to exit.
    pub fn kill(&mut self) -> Result<()> {
        self.worker.kill()
    }

    pub fn worker(&self) -> &WorkerProcess {
        &self.worker
    }

    pub fn worker_mut(&mut self) -> &mut WorkerProcess {
        &mut self.worker
    }

    async fn print_response(&mut self, url: &str, response: Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(endpoint = %url, status = %status, "Worker rejected request");
            return Err(ProxyError::Status { status, body });
        }

        info!(endpoint = %url, status = %status, bytes = body.len(), "Worker replied");
        writeln!(self.output, "{}", body).map_err(ProxyError::Output)?;
        self.output.flush().map_err(ProxyError::Output)
    }
}

impl std::fmt::Debug for GameProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameProxy")
            .field("config", &self.config)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}
