//! Field-by-field comparison between a desired compute spec and the latest
//! realized launch resource version. Pure; no I/O beyond the values passed
//! in. Every field is always evaluated so that all drift reasons can be
//! reported, not just the first.

use models::{DesiredComputeSpec, LaunchVersion, VolumeSpec};

use std::fmt;

/// One differing field between the desired spec and the realized version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DriftReason {
    /// There is no latest version to compare against; a resource must be
    /// created.
    MissingLaunchResource,
    ImageId { current: String, desired: String },
    InstanceType { current: String, desired: String },
    InstanceProfile { current: String, desired: String },
    KeyName { current: String, desired: String },
    SecurityGroups {
        current: Vec<String>,
        desired: Vec<String>,
    },
    UserData,
    Volumes,
    LicenseCount { current: usize, desired: usize },
    /// A desired license configuration ARN is not realized.
    LicenseConfiguration { arn: String },
    Placement,
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftReason::MissingLaunchResource => write!(f, "launch resource does not exist"),
            DriftReason::ImageId { current, desired } => {
                write!(f, "image-id has changed from '{}' to '{}'", current, desired)
            }
            DriftReason::InstanceType { current, desired } => write!(
                f,
                "instance-type has changed from '{}' to '{}'",
                current, desired
            ),
            DriftReason::InstanceProfile { current, desired } => write!(
                f,
                "instance-profile has changed from '{}' to '{}'",
                current, desired
            ),
            DriftReason::KeyName { current, desired } => {
                write!(f, "key-pair has changed from '{}' to '{}'", current, desired)
            }
            DriftReason::SecurityGroups { current, desired } => write!(
                f,
                "security-groups have changed from {:?} to {:?}",
                current, desired
            ),
            DriftReason::UserData => write!(f, "user-data has changed"),
            DriftReason::Volumes => write!(f, "volumes have changed"),
            DriftReason::LicenseCount { current, desired } => write!(
                f,
                "number of license specifications has changed from {} to {}",
                current, desired
            ),
            DriftReason::LicenseConfiguration { arn } => {
                write!(f, "license specification '{}' is not realized", arn)
            }
            DriftReason::Placement => write!(f, "placement configuration has changed"),
        }
    }
}

/// The outcome of a drift evaluation: empty means no drift.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DriftReport {
    reasons: Vec<DriftReason>,
}

impl DriftReport {
    pub fn drifted(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[DriftReason] {
        &self.reasons
    }

    /// Human-readable rendering of each reason, for the status layer.
    pub fn descriptions(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }
}

/// Compares `desired` against the realized configuration of `latest`.
///
/// A missing latest version is unconditional drift. Scalar string fields use
/// exact equality (absent realized values compare as empty); security groups
/// compare as order-independent sets; volumes compare as sequences sorted by
/// device name; license specifications compare count first, then require
/// every desired ARN to be realized; placement is normalized to an all-empty
/// value on both sides before structural comparison.
pub fn compare(desired: &DesiredComputeSpec, latest: Option<&LaunchVersion>) -> DriftReport {
    let mut reasons = Vec::new();

    let latest = match latest {
        Some(latest) => latest,
        None => {
            return DriftReport {
                reasons: vec![DriftReason::MissingLaunchResource],
            }
        }
    };
    let realized = &latest.config;

    let current_image = realized.image_id.clone().unwrap_or_default();
    if current_image != desired.image_id {
        reasons.push(DriftReason::ImageId {
            current: current_image,
            desired: desired.image_id.clone(),
        });
    }

    let current_type = realized.instance_type.clone().unwrap_or_default();
    if current_type != desired.instance_type {
        reasons.push(DriftReason::InstanceType {
            current: current_type,
            desired: desired.instance_type.clone(),
        });
    }

    let current_profile = realized.instance_profile_arn.clone().unwrap_or_default();
    if current_profile != desired.instance_profile_arn {
        reasons.push(DriftReason::InstanceProfile {
            current: current_profile,
            desired: desired.instance_profile_arn.clone(),
        });
    }

    let current_key = realized.key_name.clone().unwrap_or_default();
    if current_key != desired.key_name {
        reasons.push(DriftReason::KeyName {
            current: current_key,
            desired: desired.key_name.clone(),
        });
    }

    if !string_set_equal(&realized.security_groups, &desired.security_groups) {
        reasons.push(DriftReason::SecurityGroups {
            current: realized.security_groups.clone(),
            desired: desired.security_groups.clone(),
        });
    }

    // Opaque payload, compared byte-for-byte. Encodings are not normalized;
    // callers must render user data deterministically.
    if realized.user_data.clone().unwrap_or_default() != desired.user_data {
        reasons.push(DriftReason::UserData);
    }

    if canonical_volumes(&realized.volumes) != canonical_volumes(&desired.volumes) {
        reasons.push(DriftReason::Volumes);
    }

    if realized.license_specifications.len() != desired.license_specifications.len() {
        reasons.push(DriftReason::LicenseCount {
            current: realized.license_specifications.len(),
            desired: desired.license_specifications.len(),
        });
    }
    for arn in &desired.license_specifications {
        if !realized.license_specifications.contains(arn) {
            reasons.push(DriftReason::LicenseConfiguration { arn: arn.clone() });
        }
    }

    let current_placement = realized.placement.clone().unwrap_or_default();
    let desired_placement = desired.placement.clone().unwrap_or_default();
    if current_placement != desired_placement {
        reasons.push(DriftReason::Placement);
    }

    DriftReport { reasons }
}

fn string_set_equal(left: &[String], right: &[String]) -> bool {
    let mut left = left.to_vec();
    let mut right = right.to_vec();
    left.sort();
    right.sort();
    left == right
}

fn canonical_volumes(volumes: &[VolumeSpec]) -> Vec<VolumeSpec> {
    let mut volumes = volumes.to_vec();
    volumes.sort_by(|a, b| a.name.cmp(&b.name));
    volumes
}
