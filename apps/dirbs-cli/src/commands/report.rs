//! `report` (SPEC_FULL.md §4.2): recent job runs from `job_metadata`.

use crate::error::DirbsError;
use dirbs_infra_db::{DbClient, JobRepository};

pub async fn run(db: &DbClient, command: Option<&str>, limit: i64) -> Result<(), DirbsError> {
    let repo = JobRepository::new(db.pool().clone());
    let jobs = repo.query(command, limit).await?;

    println!("run_id\tcommand\tsubcommand\tstatus\tstart_time\tend_time");
    for job in &jobs {
        println!(
            "{}\t{}\t{}\t{:?}\t{}\t{}",
            job.run_id,
            job.command,
            job.subcommand.as_deref().unwrap_or(""),
            job.status,
            job.start_time,
            job.end_time.map_or_else(String::new, |t| t.to_string()),
        );
    }

    Ok(())
}
