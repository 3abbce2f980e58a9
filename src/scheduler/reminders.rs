use crate::application::ServiceDependencies;
use crate::application::reminder::run_reminder_sweep;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// 返却リマインドのスケジューラーを開始する
///
/// cron式（秒 分 時 日 月 曜日、UTC）で`run_reminder_sweep`を起動する。
/// スイープの失敗はログに残し、次回の起動で再度スキャンする。
///
/// 返したJobSchedulerはプロセスの終了まで保持すること。
pub async fn start_reminder_scheduler(
    deps: ServiceDependencies,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let deps = deps.clone();

        Box::pin(async move {
            let today = Utc::now().date_naive();
            if let Err(e) = run_reminder_sweep(&deps, today).await {
                tracing::error!("Error running reminder sweep: {}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(cron, "reminder scheduler started");

    Ok(scheduler)
}
