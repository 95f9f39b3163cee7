use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Permission bits an admin may hold. Which resource requires which bit is decided by the
/// resource that declares the method, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    ManageAdmins,
    Console,
    ManageSaves,
    ManageModules,
    ViewMap,
    ControlServer,
    ViewMetrics,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 7] = [
        PermissionKind::ManageAdmins,
        PermissionKind::Console,
        PermissionKind::ManageSaves,
        PermissionKind::ManageModules,
        PermissionKind::ViewMap,
        PermissionKind::ControlServer,
        PermissionKind::ViewMetrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionKind::ManageAdmins => "manage_admins",
            PermissionKind::Console => "console",
            PermissionKind::ManageSaves => "manage_saves",
            PermissionKind::ManageModules => "manage_modules",
            PermissionKind::ViewMap => "view_map",
            PermissionKind::ControlServer => "control_server",
            PermissionKind::ViewMetrics => "view_metrics",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown permission '{}'", s))
    }
}

/// Per-admin permission bitset. Kinds absent from the map read as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<PermissionKind, bool>);

impl PermissionSet {
    pub fn none() -> Self {
        Self(PermissionKind::ALL.iter().map(|k| (*k, false)).collect())
    }

    pub fn full() -> Self {
        Self(PermissionKind::ALL.iter().map(|k| (*k, true)).collect())
    }

    pub fn get(&self, kind: PermissionKind) -> bool {
        self.0.get(&kind).copied().unwrap_or(false)
    }

    pub fn set(&mut self, kind: PermissionKind, granted: bool) {
        self.0.insert(kind, granted);
    }

    pub fn with(mut self, kind: PermissionKind, granted: bool) -> Self {
        self.set(kind, granted);
        self
    }

    /// Overlay `other` onto `self`; kinds missing from `other` keep their current value.
    pub fn merge(&mut self, other: &PermissionSet) {
        for (k, v) in other.0.iter() {
            self.0.insert(*k, *v);
        }
    }

    pub fn is_full(&self) -> bool {
        PermissionKind::ALL.iter().all(|k| self.get(*k))
    }

    pub fn granted(&self) -> impl Iterator<Item = PermissionKind> + '_ {
        PermissionKind::ALL.iter().copied().filter(move |k| self.get(*k))
    }
}
