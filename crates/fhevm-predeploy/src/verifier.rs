//! Settles deployment records against their predictions.

use tracing::error;

use crate::{DeploymentRecord, DeploymentStatus, PredeployError, Result};

/// Settles a pending record against its prediction.
///
/// A record whose actual address equals the predicted one becomes
/// [`DeploymentStatus::Confirmed`]. Anything else becomes [`DeploymentStatus::Mismatched`] and
/// yields [`PredeployError::NonceDrift`]: every later prediction of the same identity is wrong
/// from here on, so the caller must stop. `predicted_nonce` is the nonce the prediction assumed.
///
/// Records that are not pending are left untouched.
pub fn verify(record: &mut DeploymentRecord, predicted_nonce: u64) -> Result<()> {
    match record.status {
        DeploymentStatus::Pending => {}
        DeploymentStatus::Confirmed => return Ok(()),
        DeploymentStatus::Mismatched | DeploymentStatus::Failed => {
            return Err(PredeployError::DeploymentFailure {
                component: record.component.clone(),
                reason: record.failure.clone().unwrap_or_else(|| record.status.to_string()),
                tx_hash: record.tx_hash,
            })
        }
    }

    match record.actual {
        Some(actual) if actual == record.predicted => {
            record.status = DeploymentStatus::Confirmed;
            Ok(())
        }
        Some(actual) => {
            let error = PredeployError::NonceDrift {
                component: record.component.clone(),
                nonce: predicted_nonce,
                predicted: record.predicted,
                actual,
            };
            error!(
                component = %record.component,
                predicted = %record.predicted,
                %actual,
                predicted_nonce,
                used_nonce = record.nonce,
                "Deployed address does not match prediction"
            );
            record.status = DeploymentStatus::Mismatched;
            record.failure = Some(error.to_string());
            Err(error)
        }
        None => {
            let error = PredeployError::DeploymentFailure {
                component: record.component.clone(),
                reason: "no deployed address to verify".to_string(),
                tx_hash: record.tx_hash,
            };
            record.status = DeploymentStatus::Failed;
            record.failure = Some(error.to_string());
            Err(error)
        }
    }
}
