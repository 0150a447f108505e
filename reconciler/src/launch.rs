use crate::config::ReconcilerConfig;
use crate::drift::{self, DriftReport};
use crate::error::{self, Result};
use crate::versions;

use models::{
    ClientError, CloudResourceClient, DesiredComputeSpec, LaunchResource, LaunchVersion,
    ScalingGroupSnapshot,
};

use snafu::ResultExt;
use tracing::{event, instrument, Level};

/// Input to [`LaunchResourceManager::delete`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteConfigurationInput {
    pub name: String,
    /// Delete the whole resource rather than pruning old versions.
    pub delete_all: bool,
    /// Versions to retain during retention cleanup. Zero selects the
    /// configured default.
    pub retain_versions: usize,
}

/// Orchestrates discovery, drift evaluation, version creation/promotion,
/// rotation decisions and retention cleanup for one node group's launch
/// resource. State is private to a single reconciliation pass.
pub struct LaunchResourceManager<C: CloudResourceClient> {
    client: C,
    /// Node group identity rendering, used for logging only.
    owner: String,
    config: ReconcilerConfig,
    target_resource: Option<LaunchResource>,
    target_versions: Vec<LaunchVersion>,
    latest_version: Option<LaunchVersion>,
    resource_list: Vec<LaunchResource>,
}

impl<C: CloudResourceClient> LaunchResourceManager<C> {
    pub fn new(client: C, owner: String, config: ReconcilerConfig) -> Self {
        LaunchResourceManager {
            client,
            owner,
            config,
            target_resource: None,
            target_versions: Vec::new(),
            latest_version: None,
            resource_list: Vec::new(),
        }
    }

    /// Locates the launch resource the given scaling group points at.
    ///
    /// The full account inventory is always fetched; with no scaling group
    /// there is nothing further to match and discovery ends with an empty
    /// result. Name matching is case-insensitive. A failure to list versions
    /// of an already-matched resource is logged but does not abort
    /// discovery: losing version history must not block recognizing that a
    /// live resource exists.
    #[instrument(skip(self, scaling_group), fields(group = %self.owner), err)]
    pub async fn discover(&mut self, scaling_group: Option<&ScalingGroupSnapshot>) -> Result<()> {
        self.resource_list = self
            .client
            .list_launch_resources()
            .await
            .context(error::DiscoverLaunchResourcesSnafu)?;

        let target_name = match scaling_group.and_then(|group| group.launch_resource_ref()) {
            Some(target_ref) => target_ref.name.clone(),
            None => return Ok(()),
        };

        let matched = self
            .resource_list
            .iter()
            .find(|resource| resource.name.eq_ignore_ascii_case(&target_name))
            .cloned();

        if let Some(resource) = matched {
            match self.client.list_launch_versions(&resource.name).await {
                Ok(fetched) => {
                    self.latest_version = resource.latest_version_number.and_then(|latest| {
                        fetched
                            .iter()
                            .find(|version| version.version_number == latest)
                            .cloned()
                    });
                    self.target_versions = fetched;
                }
                Err(err) => {
                    event!(
                        Level::WARN,
                        group = %self.owner,
                        name = %resource.name,
                        error = %err,
                        "failed to list launch resource versions"
                    );
                }
            }
            self.target_resource = Some(resource);
        }

        Ok(())
    }

    /// Realizes `spec` under `name`. Launch resources are immutable-version
    /// objects: when one already exists this mints a new version and promotes
    /// it to default rather than mutating fields in place. If promotion fails
    /// after creation succeeds, the orphaned version is left for the next
    /// pass's retention logic; it is not rolled back.
    #[instrument(skip(self, spec), fields(group = %self.owner), err)]
    pub async fn create(&mut self, name: &str, spec: &DesiredComputeSpec) -> Result<()> {
        if !self.provisioned() {
            self.client
                .create_launch_resource(name, spec)
                .await
                .context(error::CreateLaunchResourceSnafu { name })?;
            event!(Level::INFO, group = %self.owner, %name, "created launch resource");
        } else {
            let version = self
                .client
                .create_launch_version(name, spec)
                .await
                .context(error::CreateLaunchVersionSnafu { name })?;
            let promoted = self
                .client
                .promote_default_version(name, version)
                .await
                .context(error::PromoteDefaultVersionSnafu { name, version })?;
            event!(
                Level::INFO,
                group = %self.owner,
                %name,
                version,
                "created and promoted launch resource version"
            );
            self.target_resource = Some(promoted);
        }

        Ok(())
    }

    /// Deletes the named resource outright, or prunes versions beyond the
    /// retention tail.
    ///
    /// Full deletion is idempotent: a resource already absent from the
    /// provider is success. Retention cleanup deletes everything strictly
    /// older than the retained newest entries in one batch call, and is a
    /// no-op when nothing is eligible.
    #[instrument(skip(self), fields(group = %self.owner), err)]
    pub async fn delete(&mut self, input: &DeleteConfigurationInput) -> Result<()> {
        if input.delete_all {
            if let Err(err) = self.client.delete_launch_resource(&input.name).await {
                if !matches!(err, ClientError::ResourceNotFound { .. }) {
                    return Err(err).context(error::DeleteLaunchResourceSnafu {
                        name: input.name.clone(),
                    });
                }
            }
            return Ok(());
        }

        let retain = if input.retain_versions == 0 {
            self.config.retained_versions()
        } else {
            input.retain_versions
        };

        let deletable = versions::retention_candidates(&self.target_versions, retain);
        if deletable.is_empty() {
            return Ok(());
        }

        event!(
            Level::INFO,
            group = %self.owner,
            name = %input.name,
            versions = ?deletable,
            "deleting launch resource versions"
        );

        self.client
            .delete_launch_versions(&input.name, &deletable)
            .await
            .context(error::DeleteLaunchVersionsSnafu {
                name: input.name.clone(),
            })
    }

    /// Evaluates drift of the latest discovered version against `spec`,
    /// logging one event per differing field.
    pub fn drifted(&self, spec: &DesiredComputeSpec) -> DriftReport {
        let report = drift::compare(spec, self.latest_version.as_ref());
        for reason in report.reasons() {
            event!(Level::INFO, group = %self.owner, reason = %reason, "detected drift");
        }
        if !report.drifted() {
            event!(Level::DEBUG, group = %self.owner, "drift not detected");
        }
        report
    }

    /// Whether any live instance is out of date with respect to the latest
    /// version: one stale instance is enough to flag the whole group. A
    /// group with zero instances never needs rotation; a group with
    /// instances but no latest version always does.
    pub fn rotation_needed(&self, scaling_group: &ScalingGroupSnapshot) -> bool {
        if scaling_group.instances.is_empty() {
            return false;
        }

        let latest = match &self.latest_version {
            Some(latest) => latest.version_number.to_string(),
            None => return true,
        };
        let target_name = self.name();

        scaling_group.instances.iter().any(|instance| {
            match &instance.launch_ref {
                None => true,
                Some(assigned) => {
                    assigned.name != target_name
                        || assigned.version.as_deref().unwrap_or_default() != latest
                }
            }
        })
    }

    pub fn provisioned(&self) -> bool {
        self.target_resource.is_some()
    }

    /// The discovered resource's name, or empty when nothing is provisioned.
    pub fn name(&self) -> &str {
        self.target_resource
            .as_ref()
            .map(|resource| resource.name.as_str())
            .unwrap_or_default()
    }

    pub fn latest_version(&self) -> Option<&LaunchVersion> {
        self.latest_version.as_ref()
    }

    pub fn target_versions(&self) -> &[LaunchVersion] {
        &self.target_versions
    }

    pub fn resource_list(&self) -> &[LaunchResource] {
        &self.resource_list
    }
}
