//! Environment lookup used by availability checks.

use std::collections::HashSet;

/// Answers "is this configuration key present?".
pub trait Environment: Send + Sync {
    fn has(&self, key: &str) -> bool;
}

/// The process environment. Empty values count as missing.
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn has(&self, key: &str) -> bool {
        std::env::var_os(key).is_some_and(|v| !v.is_empty())
    }
}

/// A fixed key set.
#[derive(Debug, Default, Clone)]
pub struct StaticEnv {
    keys: HashSet<String>,
}

impl StaticEnv {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Environment for StaticEnv {
    fn has(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Keys declared in config, then the process environment.
pub struct ConfiguredEnv {
    declared: StaticEnv,
}

impl ConfiguredEnv {
    pub fn new(declared: &[String]) -> Self {
        Self {
            declared: StaticEnv::new(declared.iter().cloned()),
        }
    }
}

impl Environment for ConfiguredEnv {
    fn has(&self, key: &str) -> bool {
        self.declared.has(key) || ProcessEnv.has(key)
    }
}
