use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const SYNC_ERRORS_TOTAL: &str = "fundcat_sync_errors_total";

pub(crate) const JOB_SYNC_FUND: &str = "sync_fund";
pub(crate) const JOB_UPDATE_4433: &str = "update_4433";
pub(crate) const JOB_SYNC_MANAGERS: &str = "sync_fund_managers";
pub(crate) const JOB_SYNC_INDUSTRIES: &str = "sync_industry_list";

pub(crate) fn record_sync_error(job: &'static str, stage: &'static str) {
    counter!(SYNC_ERRORS_TOTAL, 1, "job" => job, "stage" => stage);
}

fn describe() {
    describe_counter!(
        SYNC_ERRORS_TOTAL,
        "Sync failures by job and stage; per-fund failures count once per fund."
    );
}

/// Installs the process-wide Prometheus recorder.
///
/// With a listen address the exporter serves `/metrics` itself and no handle is returned;
/// otherwise the caller renders through the handle. Must run inside a tokio runtime.
pub fn install_metrics(listen_addr: Option<&str>) -> Result<Option<PrometheusHandle>> {
    let handle = match listen_addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .with_context(|| format!("parsing metrics listen address {addr}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("starting metrics exporter")?;
            None
        }
        None => {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            metrics::set_boxed_recorder(Box::new(recorder))
                .map_err(|err| anyhow!("installing metrics recorder: {err}"))?;
            Some(handle)
        }
    };
    describe();
    Ok(handle)
}

/// Test-only view of the global recorder; every test shares one instance.
#[cfg(test)]
pub(crate) fn test_recorder() -> &'static PrometheusHandle {
    use std::sync::OnceLock;

    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE.get_or_init(|| {
        install_metrics(None)
            .expect("install recorder")
            .expect("local recorder handle")
    })
}

/// Current value of the error counter for one label pair, read from the rendered exposition.
#[cfg(test)]
pub(crate) fn sync_errors(job: &str, stage: &str) -> u64 {
    let job_label = format!("job=\"{job}\"");
    let stage_label = format!("stage=\"{stage}\"");
    test_recorder()
        .render()
        .lines()
        .filter(|line| line.starts_with(&format!("{SYNC_ERRORS_TOTAL}{{")))
        .filter(|line| line.contains(&job_label) && line.contains(&stage_label))
        .filter_map(|line| line.rsplit(' ').next())
        .filter_map(|value| value.parse::<f64>().ok())
        .map(|value| value as u64)
        .sum()
}
