/// Helper macro to avoid retyping the base domain-like name of our system when
/// creating further string constants from it. When given no parameters, this
/// returns the base domain-like name of the system. When given a string literal
/// parameter it adds `/parameter` to the end.
#[macro_export]
macro_rules! fleetman_domain {
    () => {
        "nodegroups.fleetman.dev"
    };
    ($s:literal) => {
        concat!(fleetman_domain!(), "/", $s)
    };
}

pub const FLEETMAN_DOMAIN_LIKE_NAME: &str = fleetman_domain!();

// Ownership tag keys. A scaling group carrying all three, with values matching
// a node group's identity, is attributed to that node group.
pub const TAG_CLUSTER_NAME: &str = fleetman_domain!("cluster-name");
pub const TAG_GROUP_NAME: &str = fleetman_domain!("group-name");
pub const TAG_GROUP_NAMESPACE: &str = fleetman_domain!("group-namespace");
