use models::ClientError;

use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
///
/// Discovery failures abort the pass; mutation failures are wrapped with the
/// operation that produced them and surfaced without any internal retry.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to list launch resources: '{}'", source))]
    DiscoverLaunchResources { source: ClientError },

    #[snafu(display("failed to list scaling groups: '{}'", source))]
    DiscoverScalingGroups { source: ClientError },

    #[snafu(display("failed to resolve role '{}': '{}'", name, source))]
    ResolveRole { name: String, source: ClientError },

    #[snafu(display("failed to resolve instance profile '{}': '{}'", name, source))]
    ResolveInstanceProfile { name: String, source: ClientError },

    #[snafu(display("failed to resolve vpc for cluster '{}': '{}'", cluster_name, source))]
    ResolveClusterVpc {
        cluster_name: String,
        source: ClientError,
    },

    #[snafu(display(
        "failed to list recommendation events for scaling group '{}': '{}'",
        scaling_group,
        source
    ))]
    ListRecommendationEvents {
        scaling_group: String,
        source: ClientError,
    },

    #[snafu(display("failed to create launch resource '{}': '{}'", name, source))]
    CreateLaunchResource { name: String, source: ClientError },

    #[snafu(display("failed to create a new version of launch resource '{}': '{}'", name, source))]
    CreateLaunchVersion { name: String, source: ClientError },

    #[snafu(display(
        "failed to promote version '{}' of launch resource '{}': '{}'",
        version,
        name,
        source
    ))]
    PromoteDefaultVersion {
        name: String,
        version: i64,
        source: ClientError,
    },

    #[snafu(display("failed to delete launch resource '{}': '{}'", name, source))]
    DeleteLaunchResource { name: String, source: ClientError },

    #[snafu(display("failed to delete launch resource versions of '{}': '{}'", name, source))]
    DeleteLaunchVersions { name: String, source: ClientError },
}
