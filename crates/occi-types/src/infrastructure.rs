//! Well-known OCCI Core and Infrastructure identifiers, plus link accessors
//! for compute resources.

use crate::category::Kind;
use crate::resource::{Link, Resource};

pub const CORE_SCHEME: &str = "http://schemas.ogf.org/occi/core#";
pub const INFRASTRUCTURE_SCHEME: &str = "http://schemas.ogf.org/occi/infrastructure#";

pub const ENTITY_KIND: &str = "http://schemas.ogf.org/occi/core#entity";
pub const RESOURCE_KIND: &str = "http://schemas.ogf.org/occi/core#resource";
pub const LINK_KIND: &str = "http://schemas.ogf.org/occi/core#link";

pub const COMPUTE_KIND: &str = "http://schemas.ogf.org/occi/infrastructure#compute";
pub const NETWORK_KIND: &str = "http://schemas.ogf.org/occi/infrastructure#network";
pub const STORAGE_KIND: &str = "http://schemas.ogf.org/occi/infrastructure#storage";
pub const NETWORKINTERFACE_KIND: &str =
    "http://schemas.ogf.org/occi/infrastructure#networkinterface";
pub const STORAGELINK_KIND: &str = "http://schemas.ogf.org/occi/infrastructure#storagelink";
pub const SECURITYGROUPLINK_KIND: &str =
    "http://schemas.ogf.org/occi/infrastructure#securitygrouplink";

pub const OS_TPL_MIXIN: &str = "http://schemas.ogf.org/occi/infrastructure#os_tpl";
pub const RESOURCE_TPL_MIXIN: &str = "http://schemas.ogf.org/occi/infrastructure#resource_tpl";
pub const IPNETWORK_MIXIN: &str = "http://schemas.ogf.org/occi/infrastructure/network#ipnetwork";
pub const IPNETWORKINTERFACE_MIXIN: &str =
    "http://schemas.ogf.org/occi/infrastructure/networkinterface#ipnetworkinterface";
pub const AVAILABILITY_ZONE_MIXIN: &str =
    "http://schemas.ogf.org/occi/infrastructure#availability_zone";

/// Link kinds whose source is always a compute resource.
pub const COMPUTE_LINK_KINDS: [&str; 3] = [
    NETWORKINTERFACE_KIND,
    STORAGELINK_KIND,
    SECURITYGROUPLINK_KIND,
];

/// Source kind implied by a link kind when the wire carries no hint: links
/// of the compute link kinds (or their descendants) start at a compute.
pub fn implied_source_kind(link_kind: &Kind) -> Option<&'static str> {
    COMPUTE_LINK_KINDS
        .iter()
        .any(|id| link_kind.is_related_to(id))
        .then_some(COMPUTE_KIND)
}

/// Typed access to the links of a compute resource.
pub trait ComputeLinks {
    fn networkinterfaces(&self) -> Vec<&Link>;
    fn storagelinks(&self) -> Vec<&Link>;
    fn securitygrouplinks(&self) -> Vec<&Link>;
}

impl ComputeLinks for Resource {
    fn networkinterfaces(&self) -> Vec<&Link> {
        self.links_by_related_identifier(NETWORKINTERFACE_KIND)
    }

    fn storagelinks(&self) -> Vec<&Link> {
        self.links_by_related_identifier(STORAGELINK_KIND)
    }

    fn securitygrouplinks(&self) -> Vec<&Link> {
        self.links_by_related_identifier(SECURITYGROUPLINK_KIND)
    }
}
