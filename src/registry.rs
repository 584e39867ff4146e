// Resource registry: ordered mounts resolved first-match

use std::collections::HashMap;

use crate::error::Error;
use crate::mounted::{Match, MountedResource};

/// Outcome of resolving a request against the mount table.
pub enum Resolution {
    /// A mount matched both method and path.
    Found(Match),
    /// Some mount's path matched but none accepted the method.
    MethodNotAllowed,
    /// No mount's path matched at all.
    NotFound,
}

/// Ordered collection of mounted resources. Resolution walks mounts in
/// insertion order and stops at the first full match, so more specific
/// patterns must be mounted before broader ones.
#[derive(Default)]
pub struct ResourceRegistry {
    mounts: Vec<MountedResource>,
    by_name: HashMap<String, usize>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mount. Duplicate names are a configuration error.
    pub fn add(&mut self, mount: MountedResource) -> Result<(), Error> {
        if self.by_name.contains_key(mount.name()) {
            return Err(Error::Configuration(format!(
                "a resource named {} is already mounted",
                mount.name()
            )));
        }
        self.by_name.insert(mount.name().to_string(), self.mounts.len());
        self.mounts.push(mount);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MountedResource> {
        self.by_name.get(name).map(|&i| &self.mounts[i])
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountedResource> {
        self.mounts.iter()
    }

    /// Resolve a request. A second, method-blind pass distinguishes a
    /// wrong method on a known path from a path nothing is mounted at.
    pub fn resolve(&self, method: &str, path: &str) -> Resolution {
        for mount in &self.mounts {
            if let Some(found) = mount.matches(method, path) {
                return Resolution::Found(found);
            }
        }
        for mount in &self.mounts {
            if mount.match_path(path).is_some() {
                return Resolution::MethodNotAllowed;
            }
        }
        Resolution::NotFound
    }
}
