//! IAM lookups used before launching instances

use crate::error::{AwsError, Result};
use aws_config::SdkConfig;
use aws_sdk_iam::Client;
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata};

/// What a failed lookup means for provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupFailure {
    Missing,
    /// The caller may not read IAM; RunInstances still checks the profile
    Unreadable,
    Other,
}

pub(crate) fn classify(code: Option<&str>) -> LookupFailure {
    match code {
        Some("NoSuchEntity") => LookupFailure::Missing,
        Some("AccessDenied") | Some("AccessDeniedException") => LookupFailure::Unreadable,
        _ => LookupFailure::Other,
    }
}

pub struct Iam {
    client: Client,
}

impl Iam {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Confirm the instance profile named by the template exists
    pub async fn ensure_instance_profile(&self, name: &str) -> Result<()> {
        let Err(e) = self
            .client
            .get_instance_profile()
            .instance_profile_name(name)
            .send()
            .await
        else {
            return Ok(());
        };

        match classify(e.code()) {
            LookupFailure::Missing => Err(AwsError::RoleNotFound(name.to_string())),
            LookupFailure::Unreadable => {
                tracing::warn!(
                    instance_profile = name,
                    "iam:GetInstanceProfile denied, leaving the check to RunInstances"
                );
                Ok(())
            }
            LookupFailure::Other => Err(AwsError::Api(DisplayErrorContext(&e).to_string())),
        }
    }
}
