//! ARN construction and parsing for streams and consumers.
//!
//! Stream ARNs look like `arn:aws:kinesis:us-east-1:000000000000:stream/name`
//! and consumer ARNs append `/consumer/<name>:<creation-epoch-seconds>`.
//! Several operations accept a resource by ARN instead of (or as well as) by
//! name, so parsing has to recover the region, account, and names exactly.

use crate::error::{KinesisError, Result};

/// Identity of a stream recovered from (or used to build) its ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamArn {
    pub region: String,
    pub account_id: String,
    pub stream_name: String,
}

impl StreamArn {
    pub fn new(region: &str, account_id: &str, stream_name: &str) -> Self {
        Self {
            region: region.to_string(),
            account_id: account_id.to_string(),
            stream_name: stream_name.to_string(),
        }
    }

    /// Parse `arn:aws:kinesis:<region>:<account>:stream/<name>`.
    pub fn parse(arn: &str) -> Result<Self> {
        let invalid = || KinesisError::InvalidArgument(format!("Invalid stream ARN: {}", arn));

        let mut parts = arn.splitn(6, ':');
        let (arn_tag, partition, service, region, account, resource) = (
            parts.next().ok_or_else(invalid)?,
            parts.next().ok_or_else(invalid)?,
            parts.next().ok_or_else(invalid)?,
            parts.next().ok_or_else(invalid)?,
            parts.next().ok_or_else(invalid)?,
            parts.next().ok_or_else(invalid)?,
        );
        if arn_tag != "arn" || partition != "aws" || service != "kinesis" {
            return Err(invalid());
        }
        let stream_name = resource.strip_prefix("stream/").ok_or_else(invalid)?;
        if region.is_empty() || account.is_empty() || stream_name.is_empty() {
            return Err(invalid());
        }
        // Consumer ARNs share the prefix; reject them here.
        if stream_name.contains('/') {
            return Err(invalid());
        }
        Ok(Self::new(region, account, stream_name))
    }

    pub fn to_arn_string(&self) -> String {
        format!(
            "arn:aws:kinesis:{}:{}:stream/{}",
            self.region, self.account_id, self.stream_name
        )
    }
}

/// Identity of a registered consumer recovered from its ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerArn {
    pub stream: StreamArn,
    pub consumer_name: String,
    pub creation_secs: i64,
}

impl ConsumerArn {
    /// Parse `arn:aws:kinesis:<region>:<acct>:stream/<s>/consumer/<c>:<secs>`.
    pub fn parse(arn: &str) -> Result<Self> {
        let invalid = || KinesisError::InvalidArgument(format!("Invalid consumer ARN: {}", arn));

        let (stream_part, consumer_part) = arn.split_once("/consumer/").ok_or_else(invalid)?;
        let stream = StreamArn::parse(stream_part)?;
        let (consumer_name, secs) = consumer_part.rsplit_once(':').ok_or_else(invalid)?;
        if consumer_name.is_empty() {
            return Err(invalid());
        }
        let creation_secs = secs.parse::<i64>().map_err(|_| invalid())?;
        Ok(Self {
            stream,
            consumer_name: consumer_name.to_string(),
            creation_secs,
        })
    }

    pub fn to_arn_string(&self) -> String {
        format!(
            "{}/consumer/{}:{}",
            self.stream.to_arn_string(),
            self.consumer_name,
            self.creation_secs
        )
    }
}
