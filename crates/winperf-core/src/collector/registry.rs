//! Explicit table of the collectors this agent can run.

use super::{Collector, SchedulerError, adfs, logical_disk};

/// Constructs an unbuilt collector.
pub type CollectorFactory = fn() -> Box<dyn Collector>;

/// Closed set of `{name -> factory}` entries, in registration order.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<(&'static str, CollectorFactory)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every collector shipped with the agent.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.entries.push((adfs::NAME, || Box::new(adfs::new())));
        registry
            .entries
            .push((logical_disk::NAME, || Box::new(logical_disk::new())));
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: CollectorFactory) -> Result<(), SchedulerError> {
        if self.contains(name) {
            return Err(SchedulerError::DuplicateCollector(name.to_string()));
        }
        self.entries.push((name, factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    /// Instantiates every entry, marking those in `enabled` as enabled.
    ///
    /// Unknown names are rejected; repeated names count once.
    pub fn instantiate<S: AsRef<str>>(
        &self,
        enabled: &[S],
    ) -> Result<Vec<(Box<dyn Collector>, bool)>, SchedulerError> {
        if let Some(unknown) = enabled.iter().find(|n| !self.contains(n.as_ref())) {
            return Err(SchedulerError::UnknownCollector(unknown.as_ref().to_string()));
        }
        Ok(self
            .entries
            .iter()
            .map(|(name, factory)| {
                let on = enabled.iter().any(|n| n.as_ref() == *name);
                (factory(), on)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let names: Vec<_> = Registry::builtin().names().collect();
        assert_eq!(names, vec!["adfs", "logical_disk"]);
    }

    #[test]
    fn test_instantiate_rejects_unknown() {
        let err = Registry::builtin()
            .instantiate(&["logical_disk", "gpu"])
            .err()
            .unwrap();
        assert_eq!(err, SchedulerError::UnknownCollector("gpu".to_string()));
    }

    #[test]
    fn test_instantiate_marks_enabled_once() {
        let collectors = Registry::builtin()
            .instantiate(&["logical_disk", "logical_disk"])
            .unwrap();
        let flags: Vec<_> = collectors.iter().map(|(c, on)| (c.name(), *on)).collect();
        assert_eq!(flags, vec![("adfs", false), ("logical_disk", true)]);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = Registry::builtin();
        let err = registry
            .register("adfs", || Box::new(adfs::new()))
            .unwrap_err();
        assert_eq!(err, SchedulerError::DuplicateCollector("adfs".to_string()));
    }
}
