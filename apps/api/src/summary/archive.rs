use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::errors::AppError;
use crate::models::paper::AiSummary;

/// Secondary copy of generated summaries outside the database.
#[async_trait]
pub trait SummaryArchive: Send + Sync {
    async fn archive(&self, arxiv_id: &str, summary: &AiSummary) -> Result<(), AppError>;
}

/// Object key for a paper's analysis; old-style ids (`hep-th/9901001`) are flattened.
pub fn archive_key(arxiv_id: &str) -> String {
    format!("llm_summarized/{}_analysis.json", arxiv_id.replace('/', "_"))
}

pub struct S3SummaryArchive {
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl S3SummaryArchive {
    pub fn new(s3: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { s3, bucket }
    }
}

#[async_trait]
impl SummaryArchive for S3SummaryArchive {
    async fn archive(&self, arxiv_id: &str, summary: &AiSummary) -> Result<(), AppError> {
        let key = archive_key(arxiv_id);
        let body = serde_json::to_vec_pretty(summary).map_err(anyhow::Error::from)?;

        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        info!("Archived AI summary to s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
