//! Decides whether a source file needs organizing at all.
//!
//! Order: a completed record for the same path wins, then a successful
//! record with the same content hash at a different path. Hash failures
//! degrade to `New` without a fingerprint.

use std::path::Path;

use mediasort_core::ContentFingerprint;
use mediasort_db::repo::processed_files::{self, ProcessedFileRow};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{OrganizeError, hasher};

#[derive(Debug, Clone)]
pub enum Decision {
    New,
    AlreadyProcessed,
    DuplicateOf(ProcessedFileRow),
}

#[derive(Debug, Clone)]
pub struct GateResult {
    pub decision: Decision,
    pub fingerprint: Option<ContentFingerprint>,
}

pub struct DeduplicationGate {
    pool: SqlitePool,
    skip_processed: bool,
    check_hash: bool,
}

impl DeduplicationGate {
    pub fn new(pool: SqlitePool, skip_processed: bool, check_hash: bool) -> Self {
        Self {
            pool,
            skip_processed,
            check_hash,
        }
    }

    pub async fn check(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<GateResult, OrganizeError> {
        let source = path.to_string_lossy();

        if self.skip_processed && processed_files::has_been_processed(&self.pool, &source).await? {
            debug!(path = %path.display(), "already processed");
            return Ok(GateResult {
                decision: Decision::AlreadyProcessed,
                fingerprint: None,
            });
        }

        let fingerprint = match hasher::fingerprint(path, cancel).await {
            Ok(fp) => fp,
            Err(OrganizeError::Cancelled) => return Err(OrganizeError::Cancelled),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hashing failed, continuing without dedup");
                return Ok(GateResult {
                    decision: Decision::New,
                    fingerprint: None,
                });
            }
        };

        if self.check_hash {
            if let Some(existing) =
                processed_files::find_by_hash(&self.pool, &fingerprint.hash_hex()).await?
            {
                if existing.source_path != source {
                    debug!(
                        path = %path.display(),
                        original = %existing.source_path,
                        "content already organized"
                    );
                    return Ok(GateResult {
                        decision: Decision::DuplicateOf(existing),
                        fingerprint: Some(fingerprint),
                    });
                }
            }
        }

        Ok(GateResult {
            decision: Decision::New,
            fingerprint: Some(fingerprint),
        })
    }
}
