//! Installer strategy selection

use crate::errors::DeployError;
use crate::install::InstallerKind;
use crate::platform::Platform;

/// Outcome of installer selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub platform: Platform,
    pub installer: InstallerKind,

    /// Effective multi-user mode, after the installer's constraints
    pub multiuser: bool,
}

/// Installer used when none is given explicitly
pub fn default_installer(platform: Platform, multiuser: bool) -> InstallerKind {
    match (platform, multiuser) {
        (_, true) => InstallerKind::Operator,
        (Platform::Minikube, false) => InstallerKind::Helm,
        (Platform::Minishift, false) => InstallerKind::MinishiftAddon,
    }
}

/// Resolve platform, installer and multi-user mode from raw option values.
///
/// An explicit installer always wins. The operator only runs multi-user and the
/// minishift addon only single-user, whatever was requested. Unknown values fail
/// with `UnsupportedConfiguration`.
pub fn select_installer(
    platform: &str,
    multiuser: bool,
    installer: &str,
) -> Result<Selection, DeployError> {
    let platform: Platform = platform.parse()?;
    let installer = match installer.trim() {
        "" => default_installer(platform, multiuser),
        explicit => explicit.parse()?,
    };
    let multiuser = match installer {
        InstallerKind::Operator => true,
        InstallerKind::MinishiftAddon => false,
        InstallerKind::Helm => multiuser,
    };
    Ok(Selection {
        platform,
        installer,
        multiuser,
    })
}
