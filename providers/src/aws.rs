/*!
  AWS-backed implementation of the `CloudResourceClient` capability. Launch
  resources are realized as EC2 launch templates; scaling groups come from
  EC2 Auto Scaling; IAM resolves roles and instance profiles; the cluster
  VPC id is read from the EKS control plane.
!*/

use crate::error::IntoClientError;
use crate::events;

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_autoscaling::model::{
    AutoScalingGroup, Instance, LaunchTemplateSpecification as AsgLaunchTemplateSpecification,
};
use aws_sdk_ec2::model::{
    InstanceType, LaunchTemplate, LaunchTemplateBlockDeviceMapping,
    LaunchTemplateBlockDeviceMappingRequest, LaunchTemplateEbsBlockDeviceRequest,
    LaunchTemplateIamInstanceProfileSpecificationRequest,
    LaunchTemplateLicenseConfigurationRequest, LaunchTemplatePlacement,
    LaunchTemplatePlacementRequest, LaunchTemplateVersion as Ec2LaunchTemplateVersion,
    RequestLaunchTemplateData, ResponseLaunchTemplateData, Tenancy, VolumeType,
};
use aws_sdk_ec2::types::SdkError;
use aws_sdk_ec2::Region;
use aws_sdk_iam::error::{GetInstanceProfileErrorKind, GetRoleErrorKind};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use models::{
    ClientError, ClientResult, CloudResourceClient, DesiredComputeSpec, GroupInstance,
    IamInstanceProfile, IamRole, LaunchResource, LaunchResourceRef, LaunchVersion, PlacementSpec,
    RealizedLaunchConfig, ScalingGroupSnapshot, SpotRecommendationEvent, VolumeSpec,
};
use tracing::instrument;

// Error code EC2 returns when deleting a launch template that no longer
// exists. Surfaced as the typed not-found condition so deletion stays
// idempotent.
const LAUNCH_TEMPLATE_NOT_FOUND_CODE: &str = "InvalidLaunchTemplateName.NotFoundException";

/// The production `CloudResourceClient`. Cheap to clone; every pass may hold
/// its own copy without shared mutable state.
#[derive(Clone)]
pub struct AwsCloudClient {
    ec2: aws_sdk_ec2::Client,
    autoscaling: aws_sdk_autoscaling::Client,
    iam: aws_sdk_iam::Client,
    eks: aws_sdk_eks::Client,
    kube: kube::Client,
}

impl AwsCloudClient {
    /// Builds a client for `region` from ambient AWS credentials. The
    /// Kubernetes client is used to read spot recommendation events.
    pub async fn new(region: &str, kube_client: kube::Client) -> Self {
        let region_provider =
            RegionProviderChain::first_try(Some(Region::new(region.to_string())));
        let shared_config = aws_config::from_env().region(region_provider).load().await;
        AwsCloudClient {
            ec2: aws_sdk_ec2::Client::new(&shared_config),
            autoscaling: aws_sdk_autoscaling::Client::new(&shared_config),
            iam: aws_sdk_iam::Client::new(&shared_config),
            eks: aws_sdk_eks::Client::new(&shared_config),
            kube: kube_client,
        }
    }
}

#[async_trait]
impl CloudResourceClient for AwsCloudClient {
    async fn list_launch_resources(&self) -> ClientResult<Vec<LaunchResource>> {
        let output = self
            .ec2
            .describe_launch_templates()
            .send()
            .await
            .context("DescribeLaunchTemplates")?;
        Ok(output
            .launch_templates()
            .unwrap_or_default()
            .iter()
            .map(launch_resource)
            .collect())
    }

    async fn list_launch_versions(&self, name: &str) -> ClientResult<Vec<LaunchVersion>> {
        let output = self
            .ec2
            .describe_launch_template_versions()
            .launch_template_name(name)
            .send()
            .await
            .context("DescribeLaunchTemplateVersions")?;
        Ok(output
            .launch_template_versions()
            .unwrap_or_default()
            .iter()
            .map(launch_version)
            .collect())
    }

    #[instrument(skip(self, spec), err)]
    async fn create_launch_resource(
        &self,
        name: &str,
        spec: &DesiredComputeSpec,
    ) -> ClientResult<()> {
        self.ec2
            .create_launch_template()
            .launch_template_name(name)
            .launch_template_data(request_data(spec))
            .send()
            .await
            .context("CreateLaunchTemplate")?;
        Ok(())
    }

    #[instrument(skip(self, spec), err)]
    async fn create_launch_version(
        &self,
        name: &str,
        spec: &DesiredComputeSpec,
    ) -> ClientResult<i64> {
        let output = self
            .ec2
            .create_launch_template_version()
            .launch_template_name(name)
            .launch_template_data(request_data(spec))
            .send()
            .await
            .context("CreateLaunchTemplateVersion")?;
        output
            .launch_template_version()
            .and_then(|version| version.version_number())
            .ok_or_else(|| ClientError::Malformed {
                operation: "CreateLaunchTemplateVersion".to_string(),
                reason: "response missing version number".to_string(),
            })
    }

    #[instrument(skip(self), err)]
    async fn promote_default_version(
        &self,
        name: &str,
        version: i64,
    ) -> ClientResult<LaunchResource> {
        let output = self
            .ec2
            .modify_launch_template()
            .launch_template_name(name)
            .default_version(version.to_string())
            .send()
            .await
            .context("ModifyLaunchTemplate")?;
        output
            .launch_template()
            .map(launch_resource)
            .ok_or_else(|| ClientError::Malformed {
                operation: "ModifyLaunchTemplate".to_string(),
                reason: "response missing launch template".to_string(),
            })
    }

    #[instrument(skip(self), err)]
    async fn delete_launch_resource(&self, name: &str) -> ClientResult<()> {
        match self
            .ec2
            .delete_launch_template()
            .launch_template_name(name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err))
                if err.err().code() == Some(LAUNCH_TEMPLATE_NOT_FOUND_CODE) =>
            {
                Err(ClientError::ResourceNotFound {
                    name: name.to_string(),
                })
            }
            Err(err) => Err(ClientError::Api {
                operation: "DeleteLaunchTemplate".to_string(),
                source: Box::new(err),
            }),
        }
    }

    #[instrument(skip(self), err)]
    async fn delete_launch_versions(&self, name: &str, versions: &[i64]) -> ClientResult<()> {
        self.ec2
            .delete_launch_template_versions()
            .launch_template_name(name)
            .set_versions(Some(
                versions.iter().map(ToString::to_string).collect(),
            ))
            .send()
            .await
            .context("DeleteLaunchTemplateVersions")?;
        Ok(())
    }

    async fn list_scaling_groups(&self) -> ClientResult<Vec<ScalingGroupSnapshot>> {
        let output = self
            .autoscaling
            .describe_auto_scaling_groups()
            .send()
            .await
            .context("DescribeAutoScalingGroups")?;
        Ok(output
            .auto_scaling_groups()
            .unwrap_or_default()
            .iter()
            .map(group_snapshot)
            .collect())
    }

    async fn list_recommendation_events(
        &self,
        scaling_group: &str,
    ) -> ClientResult<Vec<SpotRecommendationEvent>> {
        events::list_spot_recommendations(&self.kube, scaling_group).await
    }

    async fn resolve_role(&self, name: &str) -> ClientResult<Option<IamRole>> {
        match self.iam.get_role().role_name(name).send().await {
            Ok(output) => Ok(output.role().map(|role| IamRole {
                name: role.role_name().unwrap_or_default().to_string(),
                arn: role.arn().unwrap_or_default().to_string(),
            })),
            Err(SdkError::ServiceError(err))
                if matches!(err.err().kind, GetRoleErrorKind::NoSuchEntityException(_)) =>
            {
                Ok(None)
            }
            Err(err) => Err(ClientError::Api {
                operation: "GetRole".to_string(),
                source: Box::new(err),
            }),
        }
    }

    async fn resolve_instance_profile(
        &self,
        name: &str,
    ) -> ClientResult<Option<IamInstanceProfile>> {
        match self
            .iam
            .get_instance_profile()
            .instance_profile_name(name)
            .send()
            .await
        {
            Ok(output) => Ok(output.instance_profile().map(|profile| IamInstanceProfile {
                name: profile.instance_profile_name().unwrap_or_default().to_string(),
                arn: profile.arn().unwrap_or_default().to_string(),
            })),
            Err(SdkError::ServiceError(err))
                if matches!(
                    err.err().kind,
                    GetInstanceProfileErrorKind::NoSuchEntityException(_)
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(ClientError::Api {
                operation: "GetInstanceProfile".to_string(),
                source: Box::new(err),
            }),
        }
    }

    async fn resolve_cluster_vpc(&self, cluster_name: &str) -> ClientResult<Option<String>> {
        let output = self
            .eks
            .describe_cluster()
            .name(cluster_name)
            .send()
            .await
            .context("DescribeCluster")?;
        Ok(output
            .cluster()
            .and_then(|cluster| cluster.resources_vpc_config())
            .and_then(|config| config.vpc_id())
            .map(str::to_string))
    }
}

fn convert_timestamp(timestamp: &aws_sdk_ec2::types::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp.secs(), timestamp.subsec_nanos())
        .single()
}

fn launch_resource(template: &LaunchTemplate) -> LaunchResource {
    LaunchResource {
        name: template.launch_template_name().unwrap_or_default().to_string(),
        id: template.launch_template_id().map(str::to_string),
        latest_version_number: template.latest_version_number(),
        created: template.create_time().and_then(convert_timestamp),
    }
}

fn launch_version(version: &Ec2LaunchTemplateVersion) -> LaunchVersion {
    LaunchVersion {
        version_number: version.version_number().unwrap_or_default(),
        created: version.create_time().and_then(convert_timestamp),
        config: realized_config(version.launch_template_data()),
    }
}

fn realized_config(data: Option<&ResponseLaunchTemplateData>) -> RealizedLaunchConfig {
    let data = match data {
        Some(data) => data,
        None => return RealizedLaunchConfig::default(),
    };
    RealizedLaunchConfig {
        image_id: data.image_id().map(str::to_string),
        instance_type: data.instance_type().map(|kind| kind.as_str().to_string()),
        key_name: data.key_name().map(str::to_string),
        instance_profile_arn: data
            .iam_instance_profile()
            .and_then(|profile| profile.arn())
            .map(str::to_string),
        security_groups: data.security_group_ids().unwrap_or_default().to_vec(),
        user_data: data.user_data().map(str::to_string),
        volumes: data
            .block_device_mappings()
            .unwrap_or_default()
            .iter()
            .map(volume_spec)
            .collect(),
        license_specifications: data
            .license_specifications()
            .unwrap_or_default()
            .iter()
            .filter_map(|license| license.license_configuration_arn().map(str::to_string))
            .collect(),
        placement: data.placement().map(placement_spec),
    }
}

fn volume_spec(mapping: &LaunchTemplateBlockDeviceMapping) -> VolumeSpec {
    let ebs = mapping.ebs();
    VolumeSpec {
        name: mapping.device_name().unwrap_or_default().to_string(),
        volume_type: ebs
            .and_then(|ebs| ebs.volume_type())
            .map(|kind| kind.as_str().to_string())
            .unwrap_or_default(),
        size: ebs.and_then(|ebs| ebs.volume_size()).unwrap_or_default(),
        iops: ebs.and_then(|ebs| ebs.iops()),
        snapshot_id: ebs.and_then(|ebs| ebs.snapshot_id()).map(str::to_string),
        delete_on_termination: ebs.and_then(|ebs| ebs.delete_on_termination()),
        encrypted: ebs.and_then(|ebs| ebs.encrypted()),
    }
}

fn placement_spec(placement: &LaunchTemplatePlacement) -> PlacementSpec {
    PlacementSpec {
        availability_zone: placement.availability_zone().unwrap_or_default().to_string(),
        host_resource_group_arn: placement
            .host_resource_group_arn()
            .unwrap_or_default()
            .to_string(),
        tenancy: placement
            .tenancy()
            .map(|tenancy| tenancy.as_str().to_string())
            .unwrap_or_default(),
    }
}

fn request_data(spec: &DesiredComputeSpec) -> RequestLaunchTemplateData {
    RequestLaunchTemplateData::builder()
        .iam_instance_profile(
            LaunchTemplateIamInstanceProfileSpecificationRequest::builder()
                .arn(&spec.instance_profile_arn)
                .build(),
        )
        .image_id(&spec.image_id)
        .instance_type(InstanceType::from(spec.instance_type.as_str()))
        .key_name(&spec.key_name)
        .set_security_group_ids(Some(spec.security_groups.clone()))
        .user_data(&spec.user_data)
        .set_block_device_mappings(Some(
            spec.volumes.iter().map(block_device_request).collect(),
        ))
        .set_license_specifications(Some(
            spec.license_specifications
                .iter()
                .map(|arn| {
                    LaunchTemplateLicenseConfigurationRequest::builder()
                        .license_configuration_arn(arn)
                        .build()
                })
                .collect(),
        ))
        .placement(placement_request(spec.placement.as_ref()))
        .build()
}

fn block_device_request(volume: &VolumeSpec) -> LaunchTemplateBlockDeviceMappingRequest {
    LaunchTemplateBlockDeviceMappingRequest::builder()
        .device_name(&volume.name)
        .ebs(
            LaunchTemplateEbsBlockDeviceRequest::builder()
                .volume_type(VolumeType::from(volume.volume_type.as_str()))
                .volume_size(volume.size)
                .set_iops(volume.iops)
                .set_snapshot_id(volume.snapshot_id.clone())
                .set_delete_on_termination(volume.delete_on_termination)
                .set_encrypted(volume.encrypted)
                .build(),
        )
        .build()
}

fn placement_request(placement: Option<&PlacementSpec>) -> LaunchTemplatePlacementRequest {
    match placement {
        None => LaunchTemplatePlacementRequest::builder().build(),
        Some(placement) => LaunchTemplatePlacementRequest::builder()
            .availability_zone(&placement.availability_zone)
            .host_resource_group_arn(&placement.host_resource_group_arn)
            .tenancy(Tenancy::from(placement.tenancy.as_str()))
            .build(),
    }
}

fn group_snapshot(group: &AutoScalingGroup) -> ScalingGroupSnapshot {
    ScalingGroupSnapshot {
        name: group.auto_scaling_group_name().unwrap_or_default().to_string(),
        tags: group
            .tags()
            .unwrap_or_default()
            .iter()
            .filter_map(|tag| match (tag.key(), tag.value()) {
                (Some(key), Some(value)) => Some((key.to_string(), value.to_string())),
                _ => None,
            })
            .collect(),
        min_size: group.min_size().unwrap_or_default(),
        max_size: group.max_size().unwrap_or_default(),
        desired_capacity: group.desired_capacity().unwrap_or_default(),
        instances: group
            .instances()
            .unwrap_or_default()
            .iter()
            .map(group_instance)
            .collect(),
        launch_ref: group.launch_template().map(launch_ref),
        mixed_instances_ref: group
            .mixed_instances_policy()
            .and_then(|policy| policy.launch_template())
            .and_then(|policy| policy.launch_template_specification())
            .map(launch_ref),
    }
}

fn group_instance(instance: &Instance) -> GroupInstance {
    GroupInstance {
        id: instance.instance_id().unwrap_or_default().to_string(),
        launch_ref: instance.launch_template().map(launch_ref),
    }
}

fn launch_ref(spec: &AsgLaunchTemplateSpecification) -> LaunchResourceRef {
    LaunchResourceRef {
        name: spec.launch_template_name().unwrap_or_default().to_string(),
        version: spec.version().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_autoscaling::model::TagDescription;
    use aws_sdk_ec2::model::LaunchTemplateEbsBlockDevice;

    #[test]
    fn converts_launch_template_timestamps() {
        let timestamp = aws_sdk_ec2::types::DateTime::from_secs(1_681_290_000);
        let converted = convert_timestamp(&timestamp).unwrap();
        assert_eq!(converted, Utc.timestamp_opt(1_681_290_000, 0).unwrap());
    }

    #[test]
    fn maps_block_device_mappings_to_volumes() {
        let mapping = LaunchTemplateBlockDeviceMapping::builder()
            .device_name("/dev/xvda")
            .ebs(
                LaunchTemplateEbsBlockDevice::builder()
                    .volume_type(VolumeType::Gp3)
                    .volume_size(40)
                    .iops(3000)
                    .encrypted(true)
                    .build(),
            )
            .build();

        let volume = volume_spec(&mapping);
        assert_eq!(volume.name, "/dev/xvda");
        assert_eq!(volume.volume_type, "gp3");
        assert_eq!(volume.size, 40);
        assert_eq!(volume.iops, Some(3000));
        assert_eq!(volume.encrypted, Some(true));
        assert!(volume.snapshot_id.is_none());
    }

    #[test]
    fn missing_template_data_realizes_as_empty() {
        assert_eq!(realized_config(None), RealizedLaunchConfig::default());
    }

    #[test]
    fn request_data_carries_the_desired_spec() {
        let spec = DesiredComputeSpec {
            image_id: "ami-012345".to_string(),
            instance_type: "m5.large".to_string(),
            key_name: "fleet-key".to_string(),
            instance_profile_arn: "arn:aws:iam::111122223333:instance-profile/nodes".to_string(),
            security_groups: vec!["sg-1".to_string()],
            user_data: "IyEvYmluL2Jhc2g=".to_string(),
            ..Default::default()
        };

        let data = request_data(&spec);
        assert_eq!(data.image_id(), Some("ami-012345"));
        assert_eq!(data.key_name(), Some("fleet-key"));
        assert_eq!(data.security_group_ids(), Some(&["sg-1".to_string()][..]));
        assert_eq!(
            data.iam_instance_profile().and_then(|profile| profile.arn()),
            Some("arn:aws:iam::111122223333:instance-profile/nodes")
        );
    }

    #[test]
    fn absent_placement_becomes_an_empty_request() {
        let request = placement_request(None);
        assert!(request.availability_zone().is_none());
        assert!(request.tenancy().is_none());
    }

    #[test]
    fn group_snapshots_keep_complete_tags_only() {
        let group = AutoScalingGroup::builder()
            .auto_scaling_group_name("scaling-group-1")
            .min_size(3)
            .max_size(6)
            .desired_capacity(3)
            .tags(
                TagDescription::builder()
                    .key("nodegroups.fleetman.dev/cluster-name")
                    .value("some-cluster")
                    .build(),
            )
            .tags(TagDescription::builder().key("orphan-key").build())
            .build();

        let snapshot = group_snapshot(&group);
        assert_eq!(snapshot.name, "scaling-group-1");
        assert_eq!(snapshot.min_size, 3);
        assert_eq!(snapshot.max_size, 6);
        assert_eq!(snapshot.tags.len(), 1);
        assert_eq!(
            snapshot.tags.get("nodegroups.fleetman.dev/cluster-name"),
            Some(&"some-cluster".to_string())
        );
    }

    #[test]
    fn instance_launch_references_are_mapped() {
        let instance = Instance::builder()
            .instance_id("i-00000000000000001")
            .launch_template(
                AsgLaunchTemplateSpecification::builder()
                    .launch_template_name("some-group-lt")
                    .version("3")
                    .build(),
            )
            .build();

        let mapped = group_instance(&instance);
        assert_eq!(mapped.id, "i-00000000000000001");
        let launch_ref = mapped.launch_ref.unwrap();
        assert_eq!(launch_ref.name, "some-group-lt");
        assert_eq!(launch_ref.version.as_deref(), Some("3"));
    }
}
