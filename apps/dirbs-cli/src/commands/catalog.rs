//! `catalog` (SPEC_FULL.md §4.3 "side effect: every submitted file is
//! recorded"): lists observed input files from the data catalog.

use crate::error::DirbsError;
use dirbs_infra_db::{DataCatalogRepository, DbClient};
use tracing::info;

pub async fn run(db: &DbClient) -> Result<(), DirbsError> {
    let repo = DataCatalogRepository::new(db.pool().clone());
    let entries = repo.list().await?;

    for entry in &entries {
        info!(
            filename = %entry.filename,
            md5 = %entry.md5,
            size_bytes = entry.size_bytes,
            is_valid = entry.is_valid,
            first_seen = %entry.first_seen,
            last_seen = %entry.last_seen,
            "catalog entry"
        );
    }

    println!("filename\tmd5\tsize_bytes\tis_valid\tfirst_seen\tlast_seen");
    for entry in &entries {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            entry.filename, entry.md5, entry.size_bytes, entry.is_valid, entry.first_seen, entry.last_seen
        );
    }

    Ok(())
}
